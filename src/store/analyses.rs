//! Saved behavior-analysis results. The analysis itself runs elsewhere;
//! this module only records what the client reports.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{Store, json_column_err, new_id, store_err};
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorDetection {
    pub detected: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Behaviors {
    pub armflapping: BehaviorDetection,
    pub headbanging: BehaviorDetection,
    pub spinning: BehaviorDetection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisResults {
    pub overall_score: Option<f64>,
    pub behaviors: Behaviors,
}

fn default_analysis_type() -> String {
    "autism_behavior".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    #[serde(default)]
    pub video_duration: Option<f64>,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
}

impl Default for AnalysisMetadata {
    fn default() -> Self {
        Self { video_duration: None, analysis_type: default_analysis_type() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub original_filename: String,
    pub results: AnalysisResults,
    pub metadata: AnalysisMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const ANALYSIS_COLUMNS: &str =
    "id, user_id, date, original_filename, results, metadata, created_at, updated_at";

fn analysis_from_row(row: &Row<'_>) -> rusqlite::Result<Analysis> {
    let results: String = row.get(4)?;
    let metadata: String = row.get(5)?;
    Ok(Analysis {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        original_filename: row.get(3)?,
        results: serde_json::from_str(&results).map_err(|e| json_column_err(4, e))?,
        metadata: serde_json::from_str(&metadata).map_err(|e| json_column_err(5, e))?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Store {
    pub fn insert_analysis(
        &self,
        user_id: &str,
        original_filename: &str,
        results: AnalysisResults,
        metadata: AnalysisMetadata,
    ) -> Result<Analysis, AppError> {
        let results_json = serde_json::to_string(&results)
            .map_err(|e| AppError::Store(format!("encode analysis results: {e}")))?;
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| AppError::Store(format!("encode analysis metadata: {e}")))?;

        let conn = self.conn()?;
        let now = Utc::now();
        let id = new_id();
        conn.execute(
            &format!("INSERT INTO analyses ({ANALYSIS_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?3, ?3)"),
            params![id, user_id, now, original_filename, results_json, metadata_json],
        )
        .map_err(store_err("insert analysis"))?;

        Ok(Analysis {
            id,
            user_id: user_id.to_string(),
            date: now,
            original_filename: original_filename.to_string(),
            results,
            metadata,
            created_at: now,
            updated_at: now,
        })
    }

    /// Analyses of `user_id`, newest first.
    pub fn list_analyses(&self, user_id: &str) -> Result<Vec<Analysis>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE user_id = ?1 \
                 ORDER BY date DESC, rowid DESC"
            ))
            .map_err(store_err("prepare list analyses"))?;
        let rows = stmt
            .query_map(params![user_id], analysis_from_row)
            .map_err(store_err("query analyses"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(store_err("read analysis row"))
    }

    pub fn find_analysis(&self, id: &str) -> Result<Option<Analysis>, AppError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE id = ?1"),
            params![id],
            analysis_from_row,
        )
        .optional()
        .map_err(store_err("find analysis"))
    }
}
