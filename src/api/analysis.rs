//! `/api/analysis/*` handlers. Results are computed client-side or by an
//! external service and only stored here.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

use super::ApiState;
use super::extract::{ApiJson, AuthUser};
use crate::error::ApiError;
use crate::store::analyses::{Analysis, AnalysisMetadata, AnalysisResults};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SaveRequest {
    #[serde(default)]
    original_filename: String,
    #[serde(default)]
    results: AnalysisResults,
    #[serde(default)]
    metadata: AnalysisMetadata,
}

/// POST /api/analysis/save
pub(super) async fn save(
    State(state): State<ApiState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<SaveRequest>,
) -> Result<(StatusCode, Json<Analysis>), ApiError> {
    let filename = req.original_filename.trim().to_string();
    if filename.is_empty() {
        return Err(ApiError::BadRequest("originalFilename is required".into()));
    }
    let user_id = caller.user.id.clone();
    let analysis = state
        .db(move |s| s.insert_analysis(&user_id, &filename, req.results, req.metadata))
        .await?;
    info!(user_id = %analysis.user_id, analysis_id = %analysis.id, "analysis saved");
    Ok((StatusCode::CREATED, Json(analysis)))
}

/// GET /api/analysis/history
pub(super) async fn history(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> Result<Json<Vec<Analysis>>, ApiError> {
    let user_id = caller.user.id.clone();
    Ok(Json(state.db(move |s| s.list_analyses(&user_id)).await?))
}

/// GET /api/analysis/{id}
pub(super) async fn detail(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Analysis>, ApiError> {
    let analysis = state
        .db(move |s| s.find_analysis(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis not found".into()))?;
    if analysis.user_id != caller.user.id {
        return Err(ApiError::Forbidden("Access denied".into()));
    }
    Ok(Json(analysis))
}
