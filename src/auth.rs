//! Password hashing, bearer tokens and account-field validation.
//!
//! Passwords are hashed with Argon2id. Bearer tokens are HS256 JWTs whose
//! `id` claim is the user id; every issued token is also recorded (as a
//! SHA-256 fingerprint) so it can be revoked before it expires.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, FieldError};

// ── passwords ────────────────────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Server(format!("password salt: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Server(format!("password hash: {e}")))
}

/// `false` for a wrong password or an unparseable stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

// ── tokens ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: String,
    pub iat: i64,
    pub exp: i64,
    /// Makes tokens issued within the same second distinct.
    pub jti: String,
}

pub fn issue_token(user_id: &str, secret: &str, ttl_days: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        id: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(ttl_days)).timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Server(format!("sign token: {e}")))
}

/// Signature and expiry check only; revocation is checked against the store.
pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .ok()
    .map(|data| data.claims)
}

/// Stored form of a token.
pub fn token_fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// ── field validation ─────────────────────────────────────────────────────────

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose shape check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Push an error when trimmed `value` is shorter than `min` characters.
pub fn check_min_len(errors: &mut Vec<FieldError>, field: &str, value: &str, min: usize, msg: &str) {
    if value.trim().chars().count() < min {
        errors.push(FieldError::new(field, msg));
    }
}

pub fn check_email(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if !is_valid_email(value.trim()) {
        errors.push(FieldError::new(field, "Please include a valid email"));
    }
}
