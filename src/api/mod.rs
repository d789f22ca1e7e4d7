//! HTTP API: axum router, shared request state and the server loop.
//!
//! ## URL layout
//!
//! ```text
//! POST /api/auth/register | login | logout | logout-all
//! GET  /api/users/me          PUT /api/users/profile | password | privacy
//! GET  /api/users/{id}/age    POST /api/users/logout-all
//! GET  /api/progress          POST /api/progress
//! GET  /api/progress/stats/{game_type}
//! POST /api/support/ticket    GET /api/support/tickets
//! GET  /api/support/ticket/{id}
//! POST /api/support/ticket/{id}/respond
//! PUT  /api/support/ticket/{id}/status
//! POST /api/analysis/save     GET /api/analysis/history | {id}
//! POST /api/typing/text | level | score
//! POST /api/generate-image
//! POST /api/dyslexia/run
//! GET  /api/health
//! GET  /uploads/{*path}
//! ```

mod analysis;
mod auth;
pub mod extract;
mod media;
mod progress;
mod support;
mod typing;
mod uploads;
mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{ApiError, AppError};
use crate::llm::{ImageProvider, LlmProvider};
use crate::speech::Transcriber;
use crate::store::Store;

/// Multipart framing allowance on top of the largest accepted file.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone; all fields are reference-counted.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub store: Store,
    pub llm: Arc<LlmProvider>,
    pub images: Arc<ImageProvider>,
    pub transcriber: Arc<Transcriber>,
}

impl ApiState {
    pub fn new(
        config: Config,
        store: Store,
        llm: LlmProvider,
        images: ImageProvider,
        transcriber: Transcriber,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            llm: Arc::new(llm),
            images: Arc::new(images),
            transcriber: Arc::new(transcriber),
        }
    }

    /// Run a store operation off the async executor.
    pub async fn db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T, AppError> + Send + 'static,
    {
        let store = self.store.clone();
        blocking(move || f(&store)).await
    }
}

/// Run CPU-bound or blocking work (hashing, SQLite, file I/O) on the
/// blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Server(format!("blocking task failed: {e}")))?
        .map_err(ApiError::from)
}

// ── Server loop ───────────────────────────────────────────────────────────────

pub async fn run(state: ApiState, shutdown: CancellationToken) -> Result<(), AppError> {
    let bind_addr = state.config.bind.clone();
    let router = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "api listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

    info!("api shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: ApiState) -> Router {
    let body_limit = state.config.max_upload_bytes + BODY_LIMIT_SLACK;

    Router::new()
        // auth
        .route("/api/auth/register",                  post(auth::register))
        .route("/api/auth/login",                     post(auth::login))
        .route("/api/auth/logout",                    post(auth::logout))
        .route("/api/auth/logout-all",                post(auth::logout_all))
        // users
        .route("/api/users/me",                       get(users::me))
        .route("/api/users/profile",                  put(users::update_profile))
        .route("/api/users/password",                 put(users::update_password))
        .route("/api/users/privacy",                  put(users::update_privacy))
        .route("/api/users/logout-all",               post(auth::logout_all))
        .route("/api/users/{id}/age",                 get(users::age))
        // progress
        .route("/api/progress",                       get(progress::summary).post(progress::save))
        .route("/api/progress/stats/{game_type}",     get(progress::stats))
        // support
        .route("/api/support/ticket",                 post(support::create))
        .route("/api/support/tickets",                get(support::list))
        .route("/api/support/ticket/{id}",            get(support::detail))
        .route("/api/support/ticket/{id}/respond",    post(support::respond))
        .route("/api/support/ticket/{id}/status",     put(support::set_status))
        // analysis
        .route("/api/analysis/save",                  post(analysis::save))
        .route("/api/analysis/history",               get(analysis::history))
        .route("/api/analysis/{id}",                  get(analysis::detail))
        // games and media
        .route("/api/typing/text",                    post(typing::text))
        .route("/api/typing/level",                   post(typing::level))
        .route("/api/typing/score",                   post(typing::score_segment))
        .route("/api/generate-image",                 post(media::generate_image))
        .route("/api/dyslexia/run",                   post(media::dyslexia_run))
        .route("/api/health",                         get(health))
        .route("/uploads/{*path}",                    get(uploads::serve))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// GET /api/health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
