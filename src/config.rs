use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

/// One year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Password rules applied on registration.
///
/// Defaults mirror the development policy the service has always shipped
/// with: any non-empty password is accepted.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub required_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            required_length: 1,
            require_digit: false,
            require_lowercase: false,
            require_uppercase: false,
            require_non_alphanumeric: false,
        }
    }
}

impl PasswordPolicy {
    /// Returns one message per violated rule; empty when the password passes.
    pub fn check(&self, password: &str) -> Vec<String> {
        let mut errors = Vec::new();
        if password.chars().count() < self.required_length {
            errors.push(format!(
                "Passwords must be at least {} characters.",
                self.required_length
            ));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Passwords must have at least one digit ('0'-'9').".into());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            errors.push("Passwords must have at least one lowercase ('a'-'z').".into());
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push("Passwords must have at least one uppercase ('A'-'Z').".into());
        }
        if self.require_non_alphanumeric && password.chars().all(|c| c.is_alphanumeric()) {
            errors.push("Passwords must have at least one non alphanumeric character.".into());
        }
        errors
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordPolicy,
    /// Require a bearer token from an active user on the management endpoints.
    pub auth_required: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "user-accounts".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "user-accounts-api".into()),
            ttl_minutes: clamp_ttl_minutes(env_or("JWT_TTL_MINUTES", 60)),
        };
        let defaults = PasswordPolicy::default();
        let password = PasswordPolicy {
            required_length: env_or("PASSWORD_REQUIRED_LENGTH", defaults.required_length),
            require_digit: env_or("PASSWORD_REQUIRE_DIGIT", defaults.require_digit),
            require_lowercase: env_or("PASSWORD_REQUIRE_LOWERCASE", defaults.require_lowercase),
            require_uppercase: env_or("PASSWORD_REQUIRE_UPPERCASE", defaults.require_uppercase),
            require_non_alphanumeric: env_or(
                "PASSWORD_REQUIRE_NON_ALPHANUMERIC",
                defaults.require_non_alphanumeric,
            ),
        };
        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            jwt,
            password,
            auth_required: env_or("AUTH_REQUIRED", false),
        })
    }
}

fn clamp_ttl_minutes(minutes: i64) -> i64 {
    minutes.clamp(1, MAX_TTL_MINUTES)
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_accepts_any_non_empty_password() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("x").is_empty());
        assert!(policy.check("pw").is_empty());
        assert_eq!(policy.check(""), vec!["Passwords must be at least 1 characters."]);
    }

    #[test]
    fn strict_policy_reports_every_violation() {
        let policy = PasswordPolicy {
            required_length: 8,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        };
        assert_eq!(policy.check("abc").len(), 4);
        assert!(policy.check("Abcdef1!").is_empty());
    }

    #[test]
    fn token_ttl_is_clamped() {
        assert_eq!(clamp_ttl_minutes(60), 60);
        assert_eq!(clamp_ttl_minutes(0), 1);
        assert_eq!(clamp_ttl_minutes(-5), 1);
        assert_eq!(clamp_ttl_minutes(i64::MAX), MAX_TTL_MINUTES);
    }

    #[test]
    fn env_or_falls_back_on_unparsable_values() {
        std::env::set_var("USER_ACCOUNTS_TEST_BOGUS_NUMBER", "not-a-number");
        assert_eq!(env_or("USER_ACCOUNTS_TEST_BOGUS_NUMBER", 7u32), 7);
        assert_eq!(env_or("USER_ACCOUNTS_TEST_UNSET_FLAG", true), true);
    }
}
