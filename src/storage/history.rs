use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detect::engine::BatchAnalysis;
use crate::record::LogRecord;
use crate::storage::Pool;

/// One anomalous record as kept in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnomaly {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub log_id: String,
    pub level: String,
    pub source: String,
    pub message: String,
    pub score: f64,
    pub root_causes: Vec<String>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AnalysisStore {
    pool: Pool,
}

impl AnalysisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Record the anomalous results of one batch. `records` is the batch input,
    /// parallel to `analysis.results`. Returns the batch id.
    pub fn record_batch(&self, records: &[LogRecord], analysis: &BatchAnalysis) -> Result<Uuid> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let batch_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        for (record, result) in records.iter().zip(&analysis.results) {
            if !result.is_anomaly {
                continue;
            }
            tx.execute(
                "INSERT INTO analysis_results
                    (id, batch_id, log_id, level, source, message, score,
                     root_causes_json, recommendations_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    Uuid::new_v4().to_string(),
                    batch_id.to_string(),
                    result.log_id,
                    record.level,
                    record.source,
                    record.message(),
                    result.score,
                    serde_json::to_string(&result.root_causes)?,
                    serde_json::to_string(&result.recommendations)?,
                    now,
                ],
            )?;
        }

        tx.commit().context("failed to commit analysis batch")?;
        Ok(batch_id)
    }

    /// Most recent anomalies first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<StoredAnomaly>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, batch_id, log_id, level, source, message, score,
                    root_causes_json, recommendations_json, created_at
             FROM analysis_results
             ORDER BY seq DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut anomalies = Vec::new();
        for row in rows {
            let (id, batch_id, log_id, level, source, message, score, causes, recs, created_at) =
                row?;
            anomalies.push(StoredAnomaly {
                id: Uuid::parse_str(&id).context("corrupt anomaly id")?,
                batch_id: Uuid::parse_str(&batch_id).context("corrupt batch id")?,
                log_id,
                level,
                source,
                message,
                score,
                root_causes: serde_json::from_str(&causes)?,
                recommendations: serde_json::from_str(&recs)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .context("corrupt created_at")?
                    .with_timezone(&Utc),
            });
        }
        Ok(anomalies)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM analysis_results", [], |r| r.get(0))?;
        Ok(n as usize)
    }
}
