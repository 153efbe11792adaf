//! Scenario-resolution records.
//!
//! After the fact, an operator can mark which scenario actually played out
//! for a stored analysis. The agent itself never writes here.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::info;

use crate::AnalysisStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResolution {
    pub analysis_id: i64,
    pub resolved_scenario: String,
    pub resolved_at: String,
    pub notes: Option<String>,
}

impl AnalysisStore {
    /// Record the observed outcome for an analysis. Upserts so a correction
    /// replaces the earlier note.
    pub async fn record_resolution(
        &self,
        analysis_id: i64,
        resolved_scenario: &str,
        notes: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scenario_resolutions (analysis_id, resolved_scenario, resolved_at, notes)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(analysis_id) DO UPDATE SET
                resolved_scenario = excluded.resolved_scenario,
                resolved_at = excluded.resolved_at,
                notes = excluded.notes
            "#,
        )
        .bind(analysis_id)
        .bind(resolved_scenario)
        .bind(Utc::now().to_rfc3339())
        .bind(notes)
        .execute(self.pool())
        .await?;

        info!(analysis_id, resolved_scenario, "scenario resolution recorded");
        Ok(())
    }

    pub async fn get_resolution(&self, analysis_id: i64) -> Result<Option<ScenarioResolution>> {
        let row = sqlx::query(
            "SELECT analysis_id, resolved_scenario, resolved_at, notes \
             FROM scenario_resolutions WHERE analysis_id = ?",
        )
        .bind(analysis_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(match row {
            Some(row) => Some(ScenarioResolution {
                analysis_id: row.try_get("analysis_id")?,
                resolved_scenario: row.try_get("resolved_scenario")?,
                resolved_at: row.try_get("resolved_at")?,
                notes: row.try_get("notes")?,
            }),
            None => None,
        })
    }
}
