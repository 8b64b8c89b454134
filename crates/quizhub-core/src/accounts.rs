use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tracing::{info, warn};

use quizhub_db::{Database, is_constraint_violation, users};
use quizhub_types::models::User;

use crate::error::{CoreError, CoreResult, Rejection};

const RESET_TOKEN_BYTES: usize = 32;

fn reset_token_ttl() -> Duration {
    Duration::hours(1)
}

#[derive(Clone)]
pub struct AccountService {
    db: Arc<Database>,
}

impl AccountService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn register(&self, username: &str, email: &str, password: &str, now: DateTime<Utc>) -> CoreResult<User> {
        let username = username.trim();
        let email = normalize_email(email);

        let name_len = username.chars().count();
        if !(3..=32).contains(&name_len) {
            return Err(CoreError::Validation("Username must be 3 to 32 characters".into()));
        }
        if !is_plausible_email(&email) {
            return Err(CoreError::Validation("Email address is not valid".into()));
        }
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        let id = self
            .db
            .with_tx(|conn| -> CoreResult<i64> {
                if users::get_by_email(conn, &email)?.is_some() {
                    return Err(Rejection::EmailTaken.into());
                }
                Ok(users::insert(conn, username, &email, &password_hash, now)?)
            })
            .map_err(|e| match e {
                CoreError::Storage(err) if is_constraint_violation(&err) => Rejection::EmailTaken.into(),
                other => other,
            })?;

        info!("User {} registered as '{}'", id, username);
        self.get(id)
    }

    pub fn authenticate(&self, email: &str, password: &str) -> CoreResult<User> {
        let email = normalize_email(email);
        let row = self
            .db
            .get_user_by_email(&email)?
            .ok_or(CoreError::InvalidCredentials)?;

        let parsed = PasswordHash::new(&row.password)
            .map_err(|e| anyhow::anyhow!("Stored hash for user {} is unreadable: {}", row.id, e))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| CoreError::InvalidCredentials)?;

        Ok(row.into())
    }

    pub fn get(&self, user_id: i64) -> CoreResult<User> {
        self.db
            .get_user_by_id(user_id)?
            .map(User::from)
            .ok_or(CoreError::NotFound)
    }

    /// Mint a one-hour reset token, retiring any earlier unused ones.
    ///
    /// Returns `None` for an unknown email; callers answer the same way in
    /// both cases so account existence does not leak.
    pub fn issue_reset_token(&self, email: &str, now: DateTime<Utc>) -> CoreResult<Option<String>> {
        let email = normalize_email(email);
        let token = generate_token();

        let issued = self.db.with_tx(|conn| -> CoreResult<Option<i64>> {
            let Some(user) = users::get_by_email(conn, &email)? else {
                return Ok(None);
            };
            let retired = users::invalidate_reset_tokens(conn, user.id, now)?;
            if retired > 0 {
                info!("Retired {} open reset tokens for user {}", retired, user.id);
            }
            users::insert_reset_token(conn, user.id, &token, now + reset_token_ttl(), now)?;
            Ok(Some(user.id))
        })?;

        Ok(issued.map(|user_id| {
            info!("Password reset token issued for user {}", user_id);
            token
        }))
    }

    /// Consume a reset token and set a new password, atomically.
    pub fn reset_password(&self, token: &str, new_password: &str, now: DateTime<Utc>) -> CoreResult<()> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        let user_id = self.db.with_tx(|conn| -> CoreResult<i64> {
            let row = users::get_reset_token(conn, token)?
                .filter(|t| t.used_at.is_none() && t.expires_at > now)
                .ok_or(Rejection::InvalidResetToken)?;

            users::update_password(conn, row.user_id, &password_hash)?;
            users::mark_reset_token_used(conn, row.id, now)?;
            Ok(row.user_id)
        });

        match user_id {
            Ok(id) => {
                info!("Password reset for user {}", id);
                Ok(())
            }
            Err(e) => {
                warn!("Password reset refused: {}", e);
                Err(e)
            }
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}

fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < 8 {
        return Err(CoreError::Validation("Password must be at least 8 characters".into()));
    }
    Ok(())
}

fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

fn generate_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
