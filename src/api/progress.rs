//! `/api/progress*` handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::ApiState;
use super::extract::{ApiJson, AuthUser};
use crate::error::ApiError;
use crate::games::aggregate::{self, ProgressSummary, TimeFrame};
use crate::store::progress::{AgeGroup, GameProgress, GameType, NewProgress, ProgressQuery};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SummaryQuery {
    game: Option<String>,
    time_frame: Option<String>,
}

fn parse_game_filter(game: Option<&str>) -> Result<Option<GameType>, ApiError> {
    match game {
        None | Some("all") => Ok(None),
        Some(other) => other
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest("Invalid game type".into())),
    }
}

/// GET /api/progress?game=all|seguin|monkey|jigsaw&timeFrame=week|month|year
pub(super) async fn summary(
    State(state): State<ApiState>,
    caller: AuthUser,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<ProgressSummary>, ApiError> {
    let game = parse_game_filter(q.game.as_deref())?;
    let now = Utc::now();
    let window = ProgressQuery {
        game,
        from: Some(TimeFrame::from_query(q.time_frame.as_deref()).start(now)),
        to: Some(now),
    };

    let user_id = caller.user.id.clone();
    let (all, windowed) = state
        .db(move |s| {
            let all = s.list_progress(&user_id, &ProgressQuery::default())?;
            let windowed = s.list_progress(&user_id, &window)?;
            Ok((all, windowed))
        })
        .await?;

    debug!(user_id = %caller.user.id, total = all.len(), windowed = windowed.len(), "progress summary");
    Ok(Json(aggregate::summarize(&all, &windowed)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SaveRequest {
    game_type: Option<String>,
    completion_time: Option<f64>,
    accuracy: Option<f64>,
    level: Option<i64>,
    age_group: Option<String>,
    puzzle_size: Option<String>,
    total_pieces: Option<u32>,
}

fn new_progress(req: SaveRequest) -> Result<NewProgress, ApiError> {
    let (Some(game_type), Some(completion_time)) = (req.game_type, req.completion_time) else {
        return Err(ApiError::BadRequest("Please provide all required fields".into()));
    };
    let game_type: GameType =
        game_type.parse().map_err(|_| ApiError::BadRequest("Invalid game type".into()))?;
    if !completion_time.is_finite() || completion_time < 0.0 {
        return Err(ApiError::BadRequest("Completion time must be a non-negative number".into()));
    }
    let accuracy = req.accuracy.unwrap_or(100.0);
    if !(0.0..=100.0).contains(&accuracy) {
        return Err(ApiError::BadRequest("Accuracy must be between 0 and 100".into()));
    }

    let mut new = NewProgress {
        game_type,
        completion_time,
        accuracy,
        level: req.level.unwrap_or(1),
        date: Utc::now(),
        age_group: None,
        puzzle_size: None,
        total_pieces: None,
    };
    if game_type == GameType::Jigsaw {
        let (Some(age_group), Some(puzzle_size), Some(total_pieces)) =
            (req.age_group, req.puzzle_size, req.total_pieces)
        else {
            return Err(ApiError::BadRequest(
                "Jigsaw progress requires ageGroup, puzzleSize and totalPieces".into(),
            ));
        };
        let age_group: AgeGroup =
            age_group.parse().map_err(|_| ApiError::BadRequest("Invalid age group".into()))?;
        new.age_group = Some(age_group);
        new.puzzle_size = Some(puzzle_size);
        new.total_pieces = Some(total_pieces);
    }
    Ok(new)
}

/// POST /api/progress
pub(super) async fn save(
    State(state): State<ApiState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<SaveRequest>,
) -> Result<(StatusCode, Json<GameProgress>), ApiError> {
    let new = new_progress(req)?;
    let user_id = caller.user.id.clone();
    let record = state.db(move |s| s.insert_progress(&user_id, new)).await?;
    info!(user_id = %record.user_id, game = %record.game_type, time = record.completion_time, "progress saved");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/progress/stats/{game_type}
pub(super) async fn stats(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(game_type): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let game: GameType =
        game_type.parse().map_err(|_| ApiError::BadRequest("Invalid game type".into()))?;
    let user_id = caller.user.id.clone();
    let query = ProgressQuery { game: Some(game), ..Default::default() };
    let records = state.db(move |s| s.list_progress(&user_id, &query)).await?;

    let body = match aggregate::game_stats(records) {
        Some(stats) => serde_json::to_value(stats)
            .map_err(|e| crate::error::AppError::Server(format!("encode stats: {e}")))?,
        None => json!({
            "message": "No progress data found for this game",
            "data": {
                "bestTime": null,
                "averageTime": null,
                "totalSessions": 0,
                "weeklyProgress": [],
            },
        }),
    };
    Ok(Json(body))
}
