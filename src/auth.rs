//! Password hashing and session tokens.
//!
//! Hashing and verification are CPU-bound; callers on the async path run them
//! through `tokio::task::spawn_blocking`.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::errors::TrackerError;
use crate::models::{Session, User};
use crate::store::Db;

pub const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_BYTES: usize = 32;

/// Message shared by every login failure so callers cannot tell which
/// emails are registered.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub session_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(24),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AuthSettings {
    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.session_ttl
    }
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).context("Failed to hash password")
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| anyhow::anyhow!("Failed to read random bytes: {}", e))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Strips an optional `Bearer ` prefix from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    (!token.is_empty()).then_some(token)
}

pub fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), TrackerError> {
    if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(TrackerError::validation(
            "Email, password, and name are required",
        ));
    }
    if !email.contains('@') {
        return Err(TrackerError::validation("Email address is invalid"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(TrackerError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl Db {
    /// Issues a fresh token. Expired sessions of every user are purged first
    /// so tokens that are never presented again do not pile up.
    pub fn issue_session(&self, user_id: Uuid, settings: &AuthSettings) -> Result<Session> {
        let now = Utc::now();
        let purged = self.delete_expired_sessions(now)?;
        if purged > 0 {
            tracing::debug!(purged, "expired sessions removed");
        }
        let token = generate_token()?;
        let session = self.create_session(user_id, &token, settings.expiry_from(now))?;
        tracing::debug!(%user_id, expires_at = %session.expires_at, "session issued");
        Ok(session)
    }

    /// Resolves a bearer token to its user. Expired sessions are removed on
    /// sight.
    pub fn validate_session(&self, token: &str) -> Result<User> {
        let session = self
            .find_session(token)?
            .ok_or_else(|| TrackerError::Unauthorized("Invalid or expired session".into()))?;
        if session.is_expired(Utc::now()) {
            self.delete_session(token)?;
            return Err(TrackerError::Unauthorized("Invalid or expired session".into()).into());
        }
        self.get_user(session.user_id)?
            .ok_or_else(|| TrackerError::Unauthorized("Invalid or expired session".into()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;

    #[test]
    fn test_hash_and_verify() -> Result<()> {
        let hash = hash_password("hunter22", 4)?;
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-bcrypt-hash"));
        Ok(())
    }

    #[test]
    fn test_tokens_are_unique_and_url_safe() -> Result<()> {
        let a = generate_token()?;
        let b = generate_token()?;
        assert_ne!(a, b);
        assert_eq!(URL_SAFE_NO_PAD.decode(&a)?.len(), TOKEN_BYTES);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
        Ok(())
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token(""), None);
    }

    #[test]
    fn test_registration_rules() {
        assert!(validate_registration("Ada", "ada@example.com", "secret").is_ok());
        assert!(validate_registration("", "ada@example.com", "secret").is_err());
        assert!(validate_registration("Ada", "ada.example.com", "secret").is_err());
        let err = validate_registration("Ada", "ada@example.com", "short").unwrap_err();
        assert!(err.to_string().contains("at least 6"));
    }

    #[test]
    fn test_validate_session_round_trip() -> Result<()> {
        let db = Db::new_in_memory()?;
        let user = test_support::user(&db, "ada@example.com");
        let session = db.issue_session(user.id, &AuthSettings::default())?;
        assert_eq!(db.validate_session(&session.token)?.id, user.id);

        db.delete_session(&session.token)?;
        let err = db.validate_session(&session.token).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::Unauthorized(_))
        ));
        Ok(())
    }

    #[test]
    fn test_expired_session_is_rejected_and_removed() -> Result<()> {
        let db = Db::new_in_memory()?;
        let user = test_support::user(&db, "ada@example.com");
        let settings = AuthSettings {
            session_ttl: Duration::seconds(-1),
            ..Default::default()
        };
        let session = db.issue_session(user.id, &settings)?;
        assert!(db.validate_session(&session.token).is_err());
        assert!(db.find_session(&session.token)?.is_none());
        Ok(())
    }

    #[test]
    fn test_issuing_a_session_purges_stale_ones() -> Result<()> {
        let db = Db::new_in_memory()?;
        let ada = test_support::user(&db, "ada@example.com");
        let grace = test_support::user(&db, "grace@example.com");
        db.create_session(ada.id, "abandoned", Utc::now() - Duration::minutes(5))?;

        let session = db.issue_session(grace.id, &AuthSettings::default())?;
        assert!(db.find_session("abandoned")?.is_none());
        assert!(db.find_session(&session.token)?.is_some());
        Ok(())
    }
}
