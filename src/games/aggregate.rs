//! Progress dashboard rollups over a user's game sessions.
//!
//! Everything here is pure: callers fetch the records and pass them in.
//! `all` is every record the user has, `windowed` the ones inside the
//! requested time frame (optionally filtered to one game), oldest first.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;

use super::{mean, round_half_up, round_to_tenth};
use crate::store::progress::{GameProgress, GameType};

/// Sessions needed before an improvement figure is reported.
const IMPROVEMENT_MIN_SESSIONS: usize = 3;
const RECENT_SESSIONS: usize = 10;
/// Placeholder until there is a population to rank against.
const PERCENTILE_PLACEHOLDER: u32 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFrame {
    Week,
    #[default]
    Month,
    Year,
}

impl TimeFrame {
    /// Unknown or missing values fall back to a month.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("week") => TimeFrame::Week,
            Some("year") => TimeFrame::Year,
            _ => TimeFrame::Month,
        }
    }

    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = match self {
            TimeFrame::Week => now.checked_sub_signed(Duration::days(7)),
            TimeFrame::Month => now.checked_sub_months(Months::new(1)),
            TimeFrame::Year => now.checked_sub_months(Months::new(12)),
        };
        start.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPoint {
    pub date: String,
    pub seguin: Option<f64>,
    pub monkey: Option<f64>,
    pub jigsaw: Option<f64>,
}

impl DayPoint {
    fn slot(&mut self, game: GameType) -> &mut Option<f64> {
        match game {
            GameType::Seguin => &mut self.seguin,
            GameType::Monkey => &mut self.monkey,
            GameType::Jigsaw => &mut self.jigsaw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmark {
    pub standard_time: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CognitiveSkill {
    pub name: &'static str,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub time_series_data: Vec<DayPoint>,
    pub game_distribution: BTreeMap<&'static str, i64>,
    pub average_completion_times: BTreeMap<&'static str, f64>,
    pub improvement_metrics: BTreeMap<&'static str, i64>,
    pub total_sessions: usize,
    pub benchmarks: BTreeMap<&'static str, Benchmark>,
    pub cognitive_skills: Vec<CognitiveSkill>,
}

pub fn summarize(all: &[GameProgress], windowed: &[GameProgress]) -> ProgressSummary {
    let mut average_completion_times = BTreeMap::new();
    let mut improvement_metrics = BTreeMap::new();
    for game in GameType::ALL {
        let times = completion_times(windowed, Some(game));
        if let Some(avg) = mean(&times) {
            average_completion_times.insert(game.as_str(), round_to_tenth(avg));
        }
        if let Some(pct) = improvement(&times) {
            improvement_metrics.insert(game.as_str(), pct);
        }
    }

    ProgressSummary {
        time_series_data: time_series(windowed),
        game_distribution: distribution(all),
        average_completion_times,
        improvement_metrics,
        total_sessions: all.len(),
        benchmarks: benchmarks(),
        cognitive_skills: if all.is_empty() { Vec::new() } else { cognitive_skills(windowed) },
    }
}

/// Share of each game in `all`, as whole percentages.
pub fn distribution(all: &[GameProgress]) -> BTreeMap<&'static str, i64> {
    let total = all.len();
    GameType::ALL
        .into_iter()
        .map(|game| {
            let pct = if total == 0 {
                0
            } else {
                let count = all.iter().filter(|r| r.game_type == game).count();
                round_half_up(count as f64 / total as f64 * 100.0) as i64
            };
            (game.as_str(), pct)
        })
        .collect()
}

/// One point per UTC day, keeping the last time recorded for each game.
pub fn time_series(windowed: &[GameProgress]) -> Vec<DayPoint> {
    let mut points: Vec<DayPoint> = Vec::new();
    for record in windowed {
        let date = record.date.format("%Y-%m-%d").to_string();
        let point = match points.iter_mut().position(|p| p.date == date) {
            Some(i) => &mut points[i],
            None => {
                points.push(DayPoint { date, seguin: None, monkey: None, jigsaw: None });
                let last = points.len() - 1;
                &mut points[last]
            }
        };
        *point.slot(record.game_type) = Some(record.completion_time);
    }
    points
}

/// Percentage drop from the mean of the first three times to the mean of
/// the last three. `times` must be oldest first.
pub fn improvement(times: &[f64]) -> Option<i64> {
    if times.len() < IMPROVEMENT_MIN_SESSIONS {
        return None;
    }
    let first = mean(&times[..IMPROVEMENT_MIN_SESSIONS])?;
    let last = mean(&times[times.len() - IMPROVEMENT_MIN_SESSIONS..])?;
    if first <= 0.0 {
        return None;
    }
    Some(round_half_up((first - last) / first * 100.0) as i64)
}

pub fn benchmarks() -> BTreeMap<&'static str, Benchmark> {
    GameType::ALL
        .into_iter()
        .map(|game| {
            let standard_time = match game {
                GameType::Seguin => 80,
                GameType::Monkey => 120,
                GameType::Jigsaw => 300,
            };
            (game.as_str(), Benchmark { standard_time })
        })
        .collect()
}

pub fn cognitive_skills(windowed: &[GameProgress]) -> Vec<CognitiveSkill> {
    let mut skills = Vec::new();

    if let Some(avg) = mean(&completion_times(windowed, Some(GameType::Seguin))) {
        skills.push(CognitiveSkill {
            name: "Pattern Recognition",
            value: skill_score(100.0 - avg / 120.0 * 100.0 + 50.0),
        });
    }
    if let Some(avg) = mean(&completion_times(windowed, Some(GameType::Jigsaw))) {
        skills.push(CognitiveSkill {
            name: "Visual Processing",
            value: skill_score(100.0 - avg / 400.0 * 100.0 + 40.0),
        });
    }

    let times = completion_times(windowed, None);
    if times.len() >= 3 {
        if let Some(avg) = mean(&times) {
            let variance = times.iter().map(|t| (t - avg).powi(2)).sum::<f64>() / times.len() as f64;
            skills.push(CognitiveSkill {
                name: "Focus",
                value: skill_score(100.0 - variance / 1000.0 * 100.0),
            });
        }
    }
    skills
}

fn skill_score(raw: f64) -> i64 {
    round_half_up(raw.clamp(0.0, 100.0)) as i64
}

fn completion_times(records: &[GameProgress], game: Option<GameType>) -> Vec<f64> {
    let mut matching: Vec<&GameProgress> = records
        .iter()
        .filter(|r| game.is_none_or(|g| r.game_type == g))
        .collect();
    matching.sort_by_key(|r| r.date);
    matching.into_iter().map(|r| r.completion_time).collect()
}

// ── per-game statistics ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub best_time: f64,
    pub average_time: f64,
    pub total_sessions: usize,
    pub percentile: u32,
    pub recent_sessions: Vec<GameProgress>,
}

/// `None` when the user has no sessions of this game. `records` must be
/// oldest first.
pub fn game_stats(records: Vec<GameProgress>) -> Option<GameStats> {
    let times: Vec<f64> = records.iter().map(|r| r.completion_time).collect();
    let average = mean(&times)?;
    let best = times.iter().copied().fold(f64::INFINITY, f64::min);
    let total = records.len();
    let recent = records.into_iter().skip(total.saturating_sub(RECENT_SESSIONS)).collect();
    Some(GameStats {
        best_time: best,
        average_time: round_to_tenth(average),
        total_sessions: total,
        percentile: PERCENTILE_PLACEHOLDER,
        recent_sessions: recent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(game: GameType, time: f64, date: DateTime<Utc>) -> GameProgress {
        GameProgress {
            id: format!("{game}-{time}-{}", date.timestamp()),
            user_id: "u".into(),
            game_type: game,
            completion_time: time,
            accuracy: 100.0,
            level: 1,
            date,
            age_group: None,
            puzzle_size: None,
            total_pieces: None,
            created_at: date,
        }
    }

    fn day(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
    }

    #[test]
    fn time_frame_parsing_and_start() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(TimeFrame::from_query(None), TimeFrame::Month);
        assert_eq!(TimeFrame::from_query(Some("decade")), TimeFrame::Month);
        assert_eq!(TimeFrame::Week.start(now), Utc.with_ymd_and_hms(2025, 3, 24, 12, 0, 0).unwrap());
        // Calendar month clamps to the shorter month's end.
        assert_eq!(TimeFrame::Month.start(now), Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());
        assert_eq!(TimeFrame::Year.start(now), Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn improvement_uses_first_and_last_three() {
        let times = [100.0, 90.0, 80.0, 70.0, 60.0];
        // first avg 90, last avg 70 -> 22.2%
        assert_eq!(improvement(&times), Some(22));
        assert_eq!(improvement(&[10.0, 20.0]), None);
        assert_eq!(improvement(&[0.0, 0.0, 0.0]), None);
    }

    #[test]
    fn regression_reports_negative_improvement() {
        assert_eq!(improvement(&[50.0, 50.0, 50.0, 75.0, 75.0, 75.0]), Some(-50));
    }

    #[test]
    fn distribution_over_all_records() {
        let all = vec![
            record(GameType::Seguin, 10.0, day(1, 1)),
            record(GameType::Seguin, 10.0, day(1, 2)),
            record(GameType::Monkey, 10.0, day(1, 3)),
        ];
        let dist = distribution(&all);
        assert_eq!(dist["seguin"], 67);
        assert_eq!(dist["monkey"], 33);
        assert_eq!(dist["jigsaw"], 0);

        let empty = distribution(&[]);
        assert!(empty.values().all(|v| *v == 0));
        assert_eq!(empty.len(), 3);
    }

    #[test]
    fn time_series_keeps_last_time_per_day() {
        let windowed = vec![
            record(GameType::Seguin, 50.0, day(2, 8)),
            record(GameType::Seguin, 45.0, day(2, 18)),
            record(GameType::Jigsaw, 200.0, day(2, 19)),
            record(GameType::Monkey, 90.0, day(3, 9)),
        ];
        let series = time_series(&windowed);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, "2025-03-02");
        assert_eq!(series[0].seguin, Some(45.0));
        assert_eq!(series[0].jigsaw, Some(200.0));
        assert_eq!(series[0].monkey, None);
        assert_eq!(series[1].monkey, Some(90.0));
    }

    #[test]
    fn summary_averages_and_skills() {
        let windowed = vec![
            record(GameType::Seguin, 60.0, day(1, 1)),
            record(GameType::Seguin, 61.0, day(2, 1)),
            record(GameType::Seguin, 62.25, day(3, 1)),
        ];
        let summary = summarize(&windowed, &windowed);
        assert_eq!(summary.average_completion_times["seguin"], 61.1);
        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.benchmarks["jigsaw"].standard_time, 300);
        assert!(!summary.improvement_metrics.contains_key("monkey"));

        let names: Vec<_> = summary.cognitive_skills.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Pattern Recognition", "Focus"]);
        // 100 - 61.083/120*100 + 50 = 99.1
        assert_eq!(summary.cognitive_skills[0].value, 99);
    }

    #[test]
    fn skills_clamp_to_range() {
        let slow = vec![record(GameType::Jigsaw, 2000.0, day(1, 1))];
        assert_eq!(cognitive_skills(&slow)[0].value, 0);
        let fast = vec![record(GameType::Seguin, 1.0, day(1, 1))];
        assert_eq!(cognitive_skills(&fast)[0].value, 100);
    }

    #[test]
    fn empty_user_has_no_skills() {
        let summary = summarize(&[], &[]);
        assert!(summary.cognitive_skills.is_empty());
        assert!(summary.time_series_data.is_empty());
        assert_eq!(summary.total_sessions, 0);
    }

    #[test]
    fn stats_keep_last_ten_sessions() {
        let records: Vec<_> = (1..=12)
            .map(|d| record(GameType::Monkey, 100.0 + d as f64, day(d, 1)))
            .collect();
        let stats = game_stats(records).unwrap();
        assert_eq!(stats.best_time, 101.0);
        assert_eq!(stats.average_time, 106.5);
        assert_eq!(stats.total_sessions, 12);
        assert_eq!(stats.recent_sessions.len(), 10);
        assert_eq!(stats.recent_sessions[0].completion_time, 103.0);
        assert_eq!(stats.percentile, 75);
        assert!(game_stats(Vec::new()).is_none());
    }
}
