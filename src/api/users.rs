//! `/api/users/*` handlers: profile, password, privacy and the public age
//! lookup.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::extract::{ApiJson, AuthUser};
use super::{ApiState, blocking};
use crate::auth::{self, check_email, check_min_len, normalize_email};
use crate::error::{ApiError, AppError, FieldError};
use crate::store::users::{PrivacyUpdate, ProfileUpdate, User};

/// Public URL prefix of stored profile pictures.
pub(crate) const PROFILE_URL_PREFIX: &str = "/uploads/profiles/";

fn profile_json(user: &User) -> Value {
    json!({
        "_id": user.id,
        "name": user.name,
        "username": user.username,
        "email": user.email,
        "age": user.age,
        "profilePicture": user.profile_picture,
        "privacySettings": user.privacy,
    })
}

/// GET /api/users/me
pub(super) async fn me(caller: AuthUser) -> Json<Value> {
    Json(json!({ "data": profile_json(&caller.user) }))
}

/// GET /api/users/{id}/age
pub(super) async fn age(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .db(move |s| s.find_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(json!({ "age": user.age })))
}

// ── profile ──────────────────────────────────────────────────────────────────

/// Image types accepted for profile pictures, with the extension they are
/// stored under.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

struct Upload {
    extension: &'static str,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct ProfileForm {
    name: Option<String>,
    username: Option<String>,
    email: Option<String>,
    age: Option<String>,
    picture: Option<Upload>,
}

async fn read_profile_form(mut multipart: Multipart, max_bytes: usize) -> Result<ProfileForm, ApiError> {
    let mut form = ProfileForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "profilePicture" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let extension = image_extension(&content_type).ok_or_else(|| {
                ApiError::BadRequest("Only image files (jpeg, png, gif, webp) are allowed".into())
            })?;
            let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
            if bytes.len() > max_bytes {
                return Err(ApiError::BadRequest("File too large".into()));
            }
            if !bytes.is_empty() {
                form.picture = Some(Upload { extension, bytes: bytes.to_vec() });
            }
            continue;
        }
        let value = field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        match name.as_str() {
            "name" => form.name = value,
            "username" => form.username = value,
            "email" => form.email = value,
            "age" => form.age = value,
            _ => {}
        }
    }
    Ok(form)
}

fn validate_profile(form: &ProfileForm) -> Result<Option<u32>, Vec<FieldError>> {
    let mut errors = Vec::new();
    if let Some(name) = &form.name {
        check_min_len(&mut errors, "name", name, 2, "Name must be at least 2 characters");
    }
    if let Some(username) = &form.username {
        check_min_len(&mut errors, "username", username, 3, "Username must be at least 3 characters");
    }
    if let Some(email) = &form.email {
        check_email(&mut errors, "email", email);
    }
    let age = match &form.age {
        None => None,
        Some(raw) => match raw.parse::<u32>() {
            Ok(age) if age <= 120 => Some(age),
            _ => {
                errors.push(FieldError::new("age", "Age must be between 0 and 120"));
                None
            }
        },
    };
    if errors.is_empty() { Ok(age) } else { Err(errors) }
}

/// File name of a previously stored picture, if it lives under the
/// profile uploads path. Full URLs are reduced to their last segment.
pub(crate) fn stored_profile_file(stored: &str) -> Option<String> {
    if !stored.contains(PROFILE_URL_PREFIX) {
        return None;
    }
    let path = stored.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    (!name.is_empty() && name != "..").then(|| name.to_string())
}

fn remove_old_picture(dir: &FsPath, stored: &str) {
    let Some(file) = stored_profile_file(stored) else {
        return;
    };
    let path = dir.join(file);
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(&path) {
        Ok(()) => info!(path = %path.display(), "deleted old profile picture"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete old profile picture"),
    }
}

/// Store `update`. On failure the freshly written picture, if any, is
/// removed again.
async fn apply_profile_update(
    state: &ApiState,
    user_id: String,
    update: ProfileUpdate,
    written: Option<PathBuf>,
) -> Result<User, ApiError> {
    let result = state
        .db(move |s| s.update_profile(&user_id, &update))
        .await
        .map_err(|e| match e {
            // Another account can take the address after the handler checked it.
            ApiError::Internal(AppError::Store(msg)) if msg.contains("UNIQUE") => {
                ApiError::BadRequest("Email already in use".into())
            }
            other => other,
        })
        .and_then(|user| user.ok_or_else(|| ApiError::NotFound("User not found".into())));

    if let (Err(_), Some(path)) = (&result, written) {
        blocking(move || {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove unused profile picture");
            }
            Ok(())
        })
        .await?;
    }
    result
}

/// PUT /api/users/profile (multipart)
pub(super) async fn update_profile(
    State(state): State<ApiState>,
    caller: AuthUser,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = read_profile_form(multipart, state.config.max_upload_bytes).await?;
    let age = validate_profile(&form).map_err(ApiError::Validation)?;

    let email = form.email.as_deref().map(normalize_email);
    if let Some(email) = email.clone().filter(|e| *e != caller.user.email) {
        if state.db(move |s| s.find_user_by_email(&email)).await?.is_some() {
            return Err(ApiError::BadRequest("Email already in use".into()));
        }
    }

    let dir: PathBuf = state.config.profile_uploads_dir();
    let (profile_picture, written) = match form.picture {
        Some(upload) => {
            let file_name = format!("profile-{}.{}", uuid::Uuid::new_v4(), upload.extension);
            let target = dir.join(&file_name);
            let write_dir = dir.clone();
            let write_target = target.clone();
            blocking(move || {
                std::fs::create_dir_all(&write_dir)?;
                std::fs::write(&write_target, &upload.bytes)?;
                Ok::<_, AppError>(())
            })
            .await?;
            (Some(format!("{PROFILE_URL_PREFIX}{file_name}")), Some(target))
        }
        None => (None, None),
    };

    let update = ProfileUpdate {
        name: form.name,
        username: form.username,
        email,
        age,
        profile_picture: profile_picture.clone(),
    };
    let updated = apply_profile_update(&state, caller.user.id.clone(), update, written).await?;

    if let (Some(new_path), Some(old)) = (&profile_picture, caller.user.profile_picture) {
        info!(user_id = %updated.id, path = %new_path, "set new profile picture");
        blocking(move || {
            remove_old_picture(&dir, &old);
            Ok(())
        })
        .await?;
    }

    Ok(Json(json!({ "success": true, "data": profile_json(&updated) })))
}

// ── password & privacy ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PasswordRequest {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
    #[serde(default)]
    confirm_password: Option<String>,
}

fn validate_password_change(req: &PasswordRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if req.current_password.is_empty() {
        errors.push(FieldError::new("currentPassword", "Current password is required"));
    }
    if req.new_password.chars().count() < 6 {
        errors.push(FieldError::new("newPassword", "New password must be at least 6 characters"));
    }
    if req.confirm_password.as_deref() != Some(req.new_password.as_str()) {
        errors.push(FieldError::new("confirmPassword", "Passwords do not match"));
    }
    errors
}

/// PUT /api/users/password
pub(super) async fn update_password(
    State(state): State<ApiState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<PasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let errors = validate_password_change(&req);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let current = req.current_password;
    let hash = caller.user.password_hash.clone();
    if !blocking(move || Ok(auth::verify_password(&current, &hash))).await? {
        return Err(ApiError::BadRequest("Current password is incorrect".into()));
    }

    let new_password = req.new_password;
    let new_hash = blocking(move || auth::hash_password(&new_password)).await?;
    let user_id = caller.user.id.clone();
    state.db(move |s| s.set_password_hash(&user_id, &new_hash)).await?;
    info!(user_id = %caller.user.id, "password updated");

    Ok(Json(json!({ "success": true, "message": "Password updated successfully" })))
}

/// PUT /api/users/privacy
pub(super) async fn update_privacy(
    State(state): State<ApiState>,
    caller: AuthUser,
    ApiJson(update): ApiJson<PrivacyUpdate>,
) -> Result<Json<Value>, ApiError> {
    let privacy = caller.user.privacy.merged(&update);
    let user_id = caller.user.id.clone();
    state.db(move |s| s.set_privacy(&user_id, &privacy)).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Privacy settings updated successfully",
        "data": { "privacySettings": privacy },
    })))
}
