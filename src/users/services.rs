use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{SessionGrant, UserView},
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User},
};
use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, verify_dummy, verify_password},
    },
    config::PasswordPolicy,
    error::{AccountError, AccountResult},
};

pub const FULL_NAME_MAX_CHARS: usize = 50;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User lifecycle operations over a [`UserStore`].
pub struct IdentityService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
    policy: PasswordPolicy,
}

impl IdentityService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys, policy: PasswordPolicy) -> Self {
        Self {
            store,
            keys,
            policy,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// Creates an active account and returns its id.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> AccountResult<Uuid> {
        let email = normalize_email(email);
        let full_name = full_name.trim();

        let mut errors = Vec::new();
        if email.is_empty() {
            errors.push("Email is required.".to_string());
        } else if !is_valid_email(&email) {
            errors.push(format!("Email '{email}' is invalid."));
        }
        if full_name.is_empty() {
            errors.push("FullName is required.".to_string());
        } else if full_name.chars().count() > FULL_NAME_MAX_CHARS {
            errors.push(format!(
                "FullName must be at most {FULL_NAME_MAX_CHARS} characters."
            ));
        }
        errors.extend(self.policy.check(password));
        if !errors.is_empty() {
            warn!(email = %email, count = errors.len(), "registration rejected");
            return Err(AccountError::Validation(errors));
        }

        let taken = || AccountError::validation(format!("Email '{email}' is already taken."));
        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(taken());
        }

        let password_hash = hash_password(password)?;
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash,
            full_name: full_name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };

        let user = match self.store.insert(new_user).await {
            Ok(u) => u,
            Err(StoreError::DuplicateEmail) => {
                warn!(email = %email, "email taken by a concurrent registration");
                return Err(taken());
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.id)
    }

    /// Verifies credentials, stamps the login time and issues an access token.
    ///
    /// Unknown emails and wrong passwords produce the same error. A blocked
    /// account is refused whatever the password. Every path runs one argon2
    /// verification.
    pub async fn login(&self, email: &str, password: &str) -> AccountResult<SessionGrant> {
        let email = normalize_email(email);

        let Some(user) = self.store.find_by_email(&email).await? else {
            verify_dummy(password);
            warn!(email = %email, "login unknown email");
            return Err(AccountError::InvalidCredentials);
        };

        let password_ok = verify_password(password, &user.password_hash)?;

        if !user.is_active {
            warn!(user_id = %user.id, "login on inactive account");
            return Err(AccountError::AccountInactive);
        }

        if !password_ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AccountError::InvalidCredentials);
        }

        self.store
            .record_login(user.id, OffsetDateTime::now_utc())
            .await?;
        let signed = self.keys.sign(user.id)?;

        info!(user_id = %user.id, "user logged in");
        Ok(SessionGrant {
            user_id: user.id,
            access_token: signed.token,
            token_type: "Bearer",
            expires_in: signed.expires_in,
        })
    }

    pub async fn list_users(&self) -> AccountResult<Vec<UserView>> {
        let users = self.store.list().await?;
        Ok(users.into_iter().map(UserView::from).collect())
    }

    pub async fn set_active(&self, user_id: Uuid, active: bool) -> AccountResult<()> {
        let matched = self.store.set_active(&[user_id], active).await?;
        if matched.is_empty() {
            return Err(AccountError::NotFound(user_id));
        }
        info!(user_id = %user_id, active, "user active flag changed");
        Ok(())
    }

    /// Returns how many of `user_ids` existed and were updated.
    pub async fn bulk_set_active(&self, user_ids: &[Uuid], active: bool) -> AccountResult<usize> {
        let matched = self.store.set_active(user_ids, active).await?;
        info!(
            requested = user_ids.len(),
            updated = matched.len(),
            active,
            "bulk active flag changed"
        );
        Ok(matched.len())
    }

    /// Deletes every listed user that exists. A failure rolls back the batch.
    pub async fn bulk_delete(&self, user_ids: &[Uuid]) -> AccountResult<usize> {
        match self.store.delete_many(user_ids).await {
            Ok(deleted) => {
                info!(
                    requested = user_ids.len(),
                    deleted = deleted.len(),
                    "bulk delete"
                );
                Ok(deleted.len())
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "bulk delete aborted");
                Err(AccountError::BatchAborted(format!("{e:#}")))
            }
        }
    }

    /// The user, if it exists and is not blocked.
    pub async fn find_active(&self, user_id: Uuid) -> AccountResult<Option<User>> {
        Ok(self
            .store
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_active))
    }
}
