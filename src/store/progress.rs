//! Game-session progress records. Immutable once written.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};

use super::{Store, UnknownVariant, new_id, store_err};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Seguin,
    Monkey,
    Jigsaw,
}

impl GameType {
    pub const ALL: [GameType; 3] = [GameType::Seguin, GameType::Monkey, GameType::Jigsaw];

    pub fn as_str(self) -> &'static str {
        match self {
            GameType::Seguin => "seguin",
            GameType::Monkey => "monkey",
            GameType::Jigsaw => "jigsaw",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seguin" => Ok(GameType::Seguin),
            "monkey" => Ok(GameType::Monkey),
            "jigsaw" => Ok(GameType::Jigsaw),
            other => Err(UnknownVariant { kind: "game type", value: other.to_string() }),
        }
    }
}

/// Jigsaw age grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "6-8")]
    SixToEight,
    #[serde(rename = "8-10")]
    EightToTen,
    #[serde(rename = "10-12")]
    TenToTwelve,
    #[serde(rename = "12-14")]
    TwelveToFourteen,
}

impl AgeGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            AgeGroup::SixToEight => "6-8",
            AgeGroup::EightToTen => "8-10",
            AgeGroup::TenToTwelve => "10-12",
            AgeGroup::TwelveToFourteen => "12-14",
        }
    }
}

impl FromStr for AgeGroup {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "6-8" => Ok(AgeGroup::SixToEight),
            "8-10" => Ok(AgeGroup::EightToTen),
            "10-12" => Ok(AgeGroup::TenToTwelve),
            "12-14" => Ok(AgeGroup::TwelveToFourteen),
            other => Err(UnknownVariant { kind: "age group", value: other.to_string() }),
        }
    }
}

text_enum_sql!(GameType);
text_enum_sql!(AgeGroup);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProgress {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub game_type: GameType,
    /// Seconds.
    pub completion_time: f64,
    /// Percentage correct, 0–100.
    pub accuracy: f64,
    pub level: i64,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_group: Option<AgeGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub puzzle_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pieces: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProgress {
    pub game_type: GameType,
    pub completion_time: f64,
    pub accuracy: f64,
    pub level: i64,
    pub date: DateTime<Utc>,
    pub age_group: Option<AgeGroup>,
    pub puzzle_size: Option<String>,
    pub total_pieces: Option<u32>,
}

/// Filter for [`Store::list_progress`]; unset bounds are open.
#[derive(Debug, Clone, Default)]
pub struct ProgressQuery {
    pub game: Option<GameType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<GameProgress> {
    Ok(GameProgress {
        id: row.get(0)?,
        user_id: row.get(1)?,
        game_type: row.get(2)?,
        completion_time: row.get(3)?,
        accuracy: row.get(4)?,
        level: row.get(5)?,
        date: row.get(6)?,
        age_group: row.get(7)?,
        puzzle_size: row.get(8)?,
        total_pieces: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl Store {
    pub fn insert_progress(&self, user_id: &str, new: NewProgress) -> Result<GameProgress, AppError> {
        let conn = self.conn()?;
        let record = GameProgress {
            id: new_id(),
            user_id: user_id.to_string(),
            game_type: new.game_type,
            completion_time: new.completion_time,
            accuracy: new.accuracy,
            level: new.level,
            date: new.date,
            age_group: new.age_group,
            puzzle_size: new.puzzle_size,
            total_pieces: new.total_pieces,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO game_progress (id, user_id, game_type, completion_time, accuracy, level, \
             date, age_group, puzzle_size, total_pieces, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.user_id,
                record.game_type,
                record.completion_time,
                record.accuracy,
                record.level,
                record.date,
                record.age_group,
                record.puzzle_size,
                record.total_pieces,
                record.created_at,
            ],
        )
        .map_err(store_err("insert progress"))?;
        Ok(record)
    }

    /// Records of `user_id` matching `query`, oldest first.
    pub fn list_progress(&self, user_id: &str, query: &ProgressQuery) -> Result<Vec<GameProgress>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, game_type, completion_time, accuracy, level, date, \
                 age_group, puzzle_size, total_pieces, created_at \
                 FROM game_progress \
                 WHERE user_id = ?1 \
                   AND (?2 IS NULL OR game_type = ?2) \
                   AND (?3 IS NULL OR date >= ?3) \
                   AND (?4 IS NULL OR date <= ?4) \
                 ORDER BY date ASC, rowid ASC",
            )
            .map_err(store_err("prepare list progress"))?;
        let rows = stmt
            .query_map(params![user_id, query.game, query.from, query.to], progress_from_row)
            .map_err(store_err("query progress"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(store_err("read progress row"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;
    use chrono::Duration;

    fn session(game_type: GameType, time: f64, date: DateTime<Utc>) -> NewProgress {
        NewProgress {
            game_type,
            completion_time: time,
            accuracy: 100.0,
            level: 1,
            date,
            age_group: None,
            puzzle_size: None,
            total_pieces: None,
        }
    }

    #[test]
    fn game_type_parse_and_display() {
        assert_eq!("monkey".parse::<GameType>().unwrap(), GameType::Monkey);
        assert!("chess".parse::<GameType>().is_err());
        assert_eq!(GameType::Jigsaw.to_string(), "jigsaw");
        assert_eq!("10-12".parse::<AgeGroup>().unwrap(), AgeGroup::TenToTwelve);
    }

    #[test]
    fn list_filters_by_game_and_window() {
        let (_tmp, store) = testing::store();
        let uid = testing::user(&store, "g@x.io");
        let now = Utc::now();

        store.insert_progress(&uid, session(GameType::Seguin, 50.0, now - Duration::days(40))).unwrap();
        store.insert_progress(&uid, session(GameType::Seguin, 40.0, now - Duration::days(2))).unwrap();
        store.insert_progress(&uid, session(GameType::Monkey, 90.0, now - Duration::days(1))).unwrap();

        let all = store.list_progress(&uid, &ProgressQuery::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].date <= w[1].date));

        let recent_seguin = store
            .list_progress(
                &uid,
                &ProgressQuery {
                    game: Some(GameType::Seguin),
                    from: Some(now - Duration::days(7)),
                    to: Some(now),
                },
            )
            .unwrap();
        assert_eq!(recent_seguin.len(), 1);
        assert_eq!(recent_seguin[0].completion_time, 40.0);
    }

    #[test]
    fn jigsaw_extras_round_trip() {
        let (_tmp, store) = testing::store();
        let uid = testing::user(&store, "j@x.io");
        let mut new = session(GameType::Jigsaw, 200.0, Utc::now());
        new.age_group = Some(AgeGroup::EightToTen);
        new.puzzle_size = Some("4x4".into());
        new.total_pieces = Some(16);
        store.insert_progress(&uid, new).unwrap();

        let rows = store.list_progress(&uid, &ProgressQuery::default()).unwrap();
        assert_eq!(rows[0].age_group, Some(AgeGroup::EightToTen));
        assert_eq!(rows[0].total_pieces, Some(16));
    }

    #[test]
    fn records_are_scoped_to_user() {
        let (_tmp, store) = testing::store();
        let a = testing::user(&store, "a@x.io");
        let b = testing::user(&store, "b@x.io");
        store.insert_progress(&a, session(GameType::Monkey, 10.0, Utc::now())).unwrap();
        assert!(store.list_progress(&b, &ProgressQuery::default()).unwrap().is_empty());
    }
}
