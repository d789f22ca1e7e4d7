//! `/api/typing/*`: text generation and level replay for the typing game.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::ApiState;
use super::extract::ApiJson;
use crate::error::ApiError;
use crate::games::difficulty::{
    AgeBand, DifficultyTracker, Level, Sample, accelerate, accuracy_percentage, count_errors, wpm,
};
use crate::games::typing::{self, TypingText};

fn parse_band(raw: &str) -> Result<AgeBand, ApiError> {
    raw.parse().map_err(|_| ApiError::BadRequest("Invalid age group".into()))
}

fn parse_level(raw: Option<&str>, band: AgeBand) -> Result<Level, ApiError> {
    match raw {
        None => Ok(band.initial_level()),
        Some(raw) => raw.parse().map_err(|_| ApiError::BadRequest("Invalid level".into())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TextRequest {
    #[serde(default)]
    age_group: String,
    level: Option<String>,
}

/// POST /api/typing/text
pub(super) async fn text(
    State(state): State<ApiState>,
    ApiJson(req): ApiJson<TextRequest>,
) -> Result<Json<TypingText>, ApiError> {
    let band = parse_band(&req.age_group)?;
    let level = parse_level(req.level.as_deref(), band)?;
    Ok(Json(typing::generate(&state.llm, band, level).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LevelRequest {
    #[serde(default)]
    age_group: String,
    current_level: Option<String>,
    #[serde(default)]
    history: Vec<Sample>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LevelResponse {
    level: Level,
    average_accuracy: f64,
    average_wpm: f64,
    initial_timer: u32,
    min_timer: u32,
}

fn replay(band: AgeBand, start: Level, history: &[Sample]) -> LevelResponse {
    let mut tracker = DifficultyTracker::starting_at(band, start);
    for sample in history {
        tracker.record(*sample);
    }
    let (average_accuracy, average_wpm) = tracker.averages();
    LevelResponse {
        level: tracker.level(),
        average_accuracy,
        average_wpm,
        initial_timer: band.initial_timer(),
        min_timer: band.min_timer(),
    }
}

/// POST /api/typing/level
pub(super) async fn level(ApiJson(req): ApiJson<LevelRequest>) -> Result<Json<LevelResponse>, ApiError> {
    let band = parse_band(&req.age_group)?;
    let start = parse_level(req.current_level.as_deref(), band)?;
    Ok(Json(replay(band, start, &req.history)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ScoreRequest {
    #[serde(default)]
    age_group: String,
    #[serde(default)]
    typed: String,
    #[serde(default)]
    expected: String,
    #[serde(default)]
    seconds: f64,
    time_left: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ScoreResponse {
    errors: usize,
    accuracy: f64,
    wpm: f64,
    /// Countdown after this tick; the band's starting timer when the
    /// request carried none.
    time_left: u32,
    initial_timer: u32,
    min_timer: u32,
}

/// Score one finished segment and advance the countdown.
fn score(band: AgeBand, req: &ScoreRequest) -> ScoreResponse {
    let errors = count_errors(&req.typed, &req.expected);
    let total = req.typed.chars().count().max(req.expected.chars().count());
    let accuracy = accuracy_percentage(errors, total);
    let wpm = wpm(req.typed.chars().count(), req.seconds);
    let time_left = match req.time_left {
        Some(left) => accelerate(band, left, accuracy, wpm),
        None => band.initial_timer(),
    };
    ScoreResponse {
        errors,
        accuracy,
        wpm,
        time_left,
        initial_timer: band.initial_timer(),
        min_timer: band.min_timer(),
    }
}

/// POST /api/typing/score
pub(super) async fn score_segment(ApiJson(req): ApiJson<ScoreRequest>) -> Result<Json<ScoreResponse>, ApiError> {
    let band = parse_band(&req.age_group)?;
    Ok(Json(score(band, &req)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_from_initial_level() {
        let history = [Sample { accuracy: 95.0, wpm: 12.0 }];
        let out = replay(AgeBand::FiveToSeven, Level::Letters, &history);
        assert_eq!(out.level, Level::Simple);
        assert_eq!(out.average_accuracy, 95.0);
    }

    #[test]
    fn empty_history_keeps_level() {
        let out = replay(AgeBand::ElevenToTwelve, Level::Intermediate, &[]);
        assert_eq!(out.level, Level::Intermediate);
        assert_eq!(out.average_wpm, 0.0);
    }

    #[test]
    fn level_defaults_to_band_start() {
        assert_eq!(parse_level(None, AgeBand::EightToTen).unwrap(), Level::Simple);
        assert!(parse_level(Some("expert"), AgeBand::EightToTen).is_err());
        assert!(parse_band("4-5").is_err());
    }

    fn score_request(typed: &str, expected: &str, seconds: f64, time_left: Option<u32>) -> ScoreRequest {
        ScoreRequest {
            age_group: "8-10".into(),
            typed: typed.into(),
            expected: expected.into(),
            seconds,
            time_left,
        }
    }

    #[test]
    fn score_counts_errors_and_speed() {
        // 50 chars in 30s is 20 wpm
        let text = "a".repeat(50);
        let mut typed = text.clone();
        typed.replace_range(0..1, "b");
        let out = score(AgeBand::EightToTen, &score_request(&typed, &text, 30.0, None));
        assert_eq!(out.errors, 1);
        assert_eq!(out.accuracy, 98.0);
        assert_eq!(out.wpm, 20.0);
        assert_eq!(out.time_left, 120);
        assert_eq!(out.min_timer, 90);
    }

    #[test]
    fn strong_segment_speeds_up_countdown() {
        let text = "b".repeat(100);
        let fast = score(AgeBand::EightToTen, &score_request(&text, &text, 30.0, Some(100)));
        assert_eq!(fast.wpm, 40.0);
        assert_eq!(fast.time_left, 98);

        let floor = score(AgeBand::EightToTen, &score_request(&text, &text, 30.0, Some(91)));
        assert_eq!(floor.time_left, 90);

        let slow = score(AgeBand::EightToTen, &score_request(&text[..10], &text[..10], 30.0, Some(100)));
        assert_eq!(slow.time_left, 100);
    }

    #[test]
    fn short_typing_counts_missing_chars() {
        let out = score(AgeBand::FiveToSeven, &score_request("ab", "abcd", 0.0, None));
        assert_eq!(out.errors, 2);
        assert_eq!(out.accuracy, 50.0);
        assert_eq!(out.wpm, 0.0);
    }
}
