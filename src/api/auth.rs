//! `/api/auth/*` handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::extract::{ApiJson, AuthUser};
use super::{ApiState, blocking};
use crate::auth::{self, check_email, check_min_len, normalize_email};
use crate::error::{ApiError, AppError, FieldError};
use crate::store::users::{NewUser, User};

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: String,
    age: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn validate_registration(req: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_min_len(&mut errors, "username", &req.username, 3, "Username must be at least 3 characters");
    check_email(&mut errors, "email", &req.email);
    if req.password.chars().count() < 6 {
        errors.push(FieldError::new("password", "Password must be at least 6 characters"));
    }
    check_min_len(&mut errors, "name", &req.name, 2, "Name must be at least 2 characters");
    match req.age {
        None => errors.push(FieldError::new("age", "Age is required")),
        Some(age) if !(1..=120).contains(&age) => {
            errors.push(FieldError::new("age", "Please provide a valid age between 1 and 120"))
        }
        Some(_) => {}
    }
    errors
}

/// Sign a token for `user_id` and record its fingerprint.
pub(super) async fn issue_session_token(state: &ApiState, user_id: &str) -> Result<String, ApiError> {
    let token = auth::issue_token(user_id, &state.config.auth.jwt_secret, state.config.auth.token_ttl_days)?;
    let fingerprint = auth::token_fingerprint(&token);
    let user_id = user_id.to_string();
    let ttl = chrono::Duration::days(state.config.auth.token_ttl_days);
    state.db(move |s| s.add_token(&user_id, &fingerprint, ttl)).await?;
    Ok(token)
}

/// POST /api/auth/register
pub(super) async fn register(
    State(state): State<ApiState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let errors = validate_registration(&req);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let email = normalize_email(&req.email);
    let lookup = email.clone();
    if state.db(move |s| s.find_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".into()));
    }

    let password = req.password;
    let password_hash = blocking(move || auth::hash_password(&password)).await?;
    let is_admin = state.config.auth.admin_emails.contains(&email);
    let new = NewUser {
        username: req.username.trim().to_string(),
        email,
        password_hash,
        name: req.name.trim().to_string(),
        age: req.age.unwrap_or_default() as u32,
        is_admin,
    };
    // Two racing registrations both pass the lookup; the UNIQUE index rejects the second.
    let user = state.db(move |s| s.create_user(new)).await.map_err(|e| match e {
        ApiError::Internal(AppError::Store(msg)) if msg.contains("UNIQUE") => {
            ApiError::BadRequest("User already exists".into())
        }
        other => other,
    })?;

    let token = issue_session_token(&state, &user.id).await?;
    info!(user_id = %user.id, is_admin, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": token,
            "user": {
                "id": user.id,
                "username": user.username,
                "email": user.email,
                "name": user.name,
                "age": user.age,
            },
        })),
    ))
}

/// POST /api/auth/login
pub(super) async fn login(
    State(state): State<ApiState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("Please provide email and password".into()));
    }
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let email = normalize_email(&req.email);
    let user: User = state.db(move |s| s.find_user_by_email(&email)).await?.ok_or_else(invalid)?;

    let password = req.password;
    let hash = user.password_hash.clone();
    let matches = blocking(move || Ok(auth::verify_password(&password, &hash))).await?;
    if !matches {
        return Err(invalid());
    }

    let token = issue_session_token(&state, &user.id).await?;
    info!(user_id = %user.id, "user logged in");

    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "name": user.name,
            "age": user.age,
            "profilePicture": user.profile_picture,
        },
    })))
}

/// POST /api/auth/logout
pub(super) async fn logout(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller.user.id.clone();
    let fingerprint = auth::token_fingerprint(&caller.token);
    state.db(move |s| s.remove_token(&user_id, &fingerprint)).await?;
    info!(user_id = %caller.user.id, "user logged out");
    Ok(Json(json!({ "success": true, "message": "Logged out successfully" })))
}

/// POST /api/auth/logout-all and /api/users/logout-all
pub(super) async fn logout_all(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller.user.id.clone();
    let revoked = state.db(move |s| s.clear_tokens(&user_id)).await?;
    info!(user_id = %caller.user.id, revoked, "user logged out everywhere");
    Ok(Json(json!({ "success": true, "message": "Logged out from all devices successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(age: Option<i64>) -> RegisterRequest {
        RegisterRequest {
            username: "kid".into(),
            email: "kid@school.org".into(),
            password: "secret1".into(),
            name: "Kid".into(),
            age,
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(validate_registration(&request(Some(9))).is_empty());
    }

    #[test]
    fn age_bounds_enforced() {
        let fields: Vec<_> = validate_registration(&request(Some(0))).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["age"]);
        assert_eq!(validate_registration(&request(Some(121))).len(), 1);
        assert_eq!(validate_registration(&request(None))[0].msg, "Age is required");
    }

    #[test]
    fn every_bad_field_reported() {
        let req = RegisterRequest {
            username: "ab".into(),
            email: "nope".into(),
            password: "12345".into(),
            name: "K".into(),
            age: Some(5),
        };
        let fields: Vec<_> = validate_registration(&req).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["username", "email", "password", "name"]);
    }
}
