//! Request extractors: the authenticated caller and JSON bodies whose
//! rejections use the API error shape.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::{HeaderMap, header, request::Parts},
};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ApiState;
use crate::auth;
use crate::error::ApiError;
use crate::store::users::User;

const NO_TOKEN: &str = "Not authorized, no token provided";
const TOKEN_FAILED: &str = "Not authorized, token failed";

/// The caller of a protected route, with the bearer token they presented.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| ApiError::Unauthorized(NO_TOKEN.into()))?;
        let claims = auth::verify_token(&token, &state.config.auth.jwt_secret)
            .ok_or_else(|| ApiError::Unauthorized(TOKEN_FAILED.into()))?;

        let fingerprint = auth::token_fingerprint(&token);
        let user_id = claims.id;
        let (user, known) = state
            .db(move |s| {
                let user = s.find_user_by_id(&user_id)?;
                let known = s.has_token(&user_id, &fingerprint)?;
                Ok((user, known))
            })
            .await?;

        let user = user.ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        if !known {
            debug!(user_id = %user.id, "revoked or unknown token presented");
            return Err(ApiError::Unauthorized(TOKEN_FAILED.into()));
        }
        Ok(AuthUser { user, token })
    }
}

/// `Json<T>` whose rejection is a 400 with the standard error body.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
