use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

lazy_static! {
    /// Hash checked against when there is no stored hash, so that a miss costs
    /// the same argon2 work as a real verification.
    static ref DUMMY_HASH: Option<String> = hash_password("dummy-password-for-timing").ok();
}

#[cfg(test)]
thread_local! {
    static VERIFICATIONS: std::cell::Cell<usize> = std::cell::Cell::new(0);
}

/// Number of argon2 verifications run on the current thread.
#[cfg(test)]
pub(crate) fn verifications_on_this_thread() -> usize {
    VERIFICATIONS.with(|c| c.get())
}

/// Hashes a plaintext password into an argon2 PHC string with a fresh salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow!("hash password: {e}")
        })?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow!("parse stored password hash: {e}")
    })?;
    #[cfg(test)]
    VERIFICATIONS.with(|c| c.set(c.get() + 1));
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Runs a throwaway verification of `plain` for callers that have no hash.
pub fn verify_dummy(plain: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
}
