//! Append-only persistence for gate evaluations.
//!
//! Every evaluation is recorded with its inputs, per-gate results, and the
//! permission outcome, so the gate's selectivity can be audited after the
//! fact.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

use crate::{GateEvaluation, GateInputs};

#[derive(Clone)]
pub struct GateLog {
    pool: SqlitePool,
}

/// Per-gate failure counts over a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateFailureStats {
    pub alignment: i64,
    pub dominance: i64,
    pub regime_risk: i64,
    pub structural_location: i64,
    pub overconfidence: i64,
}

impl GateLog {
    pub async fn new(database_url: &str) -> Result<GateLog> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Append-only, single-writer log; one connection keeps in-memory
        // databases coherent as well
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let log = GateLog { pool };
        log.init_schema().await?;
        Ok(log)
    }

    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    /// Record one evaluation; returns the log row id
    pub async fn log_evaluation(
        &self,
        evaluation: &GateEvaluation,
        inputs: &GateInputs<'_>,
    ) -> Result<i64> {
        let (prob_cont, prob_pull, prob_fail, active_state) = match inputs.probabilities {
            Some(p) => (
                p.p_continuation,
                p.p_pullback,
                p.p_failure,
                p.active_state.label().to_string(),
            ),
            None => (0.0, 0.0, 0.0, "UNKNOWN".to_string()),
        };

        let blocked_reasons = serde_json::to_string(&evaluation.permission.reasons)?;
        let support_json = serde_json::to_string(inputs.htf_support)?;
        let resistance_json = serde_json::to_string(inputs.htf_resistance)?;

        let result = sqlx::query(
            r#"
            INSERT INTO gate_evaluations (
                symbol, timestamp,
                alignment, is_unstable,
                prob_continuation, prob_pullback, prob_failure,
                active_state, current_price,
                gate1_alignment, gate2_dominance, gate3_regime_risk,
                gate4_structural_location, gate5_overconfidence,
                execution_status, blocked_reasons, permission_granted,
                dominant_trend, htf_support_levels, htf_resistance_levels
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&evaluation.symbol)
        .bind(evaluation.timestamp.to_rfc3339())
        .bind(inputs.alignment.label())
        .bind(inputs.is_unstable)
        .bind(prob_cont)
        .bind(prob_pull)
        .bind(prob_fail)
        .bind(active_state)
        .bind(inputs.current_price)
        .bind(evaluation.gates.alignment.as_str())
        .bind(evaluation.gates.dominance.as_str())
        .bind(evaluation.gates.regime_risk.as_str())
        .bind(evaluation.gates.structural_location.as_str())
        .bind(evaluation.gates.overconfidence.as_str())
        .bind(evaluation.permission.status.as_str())
        .bind(blocked_reasons)
        .bind(evaluation.is_allowed())
        .bind(inputs.dominant_trend.as_str())
        .bind(support_json)
        .bind(resistance_json)
        .execute(&self.pool)
        .await?;

        let log_id = result.last_insert_rowid();
        info!(
            symbol = %evaluation.symbol,
            log_id,
            status = evaluation.permission.status.as_str(),
            "gate evaluation logged"
        );
        Ok(log_id)
    }

    pub async fn allowed_count(&self, symbol: Option<&str>, days: i64) -> Result<i64> {
        self.count_by_permission(symbol, days, true).await
    }

    pub async fn blocked_count(&self, symbol: Option<&str>, days: i64) -> Result<i64> {
        self.count_by_permission(symbol, days, false).await
    }

    async fn count_by_permission(
        &self,
        symbol: Option<&str>,
        days: i64,
        granted: bool,
    ) -> Result<i64> {
        let count: i64 = match symbol {
            Some(symbol) => {
                sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM gate_evaluations
                    WHERE symbol = ?
                    AND permission_granted = ?
                    AND datetime(timestamp) >= datetime('now', '-' || ? || ' days')
                    "#,
                )
                .bind(symbol)
                .bind(granted)
                .bind(days)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM gate_evaluations
                    WHERE permission_granted = ?
                    AND datetime(timestamp) >= datetime('now', '-' || ? || ' days')
                    "#,
                )
                .bind(granted)
                .bind(days)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(count)
    }

    /// Which gates block most often
    pub async fn gate_failure_stats(&self, days: i64) -> Result<GateFailureStats> {
        let row = sqlx::query(
            r#"
            SELECT
                SUM(CASE WHEN gate1_alignment = 'FAIL' THEN 1 ELSE 0 END) as gate1_fails,
                SUM(CASE WHEN gate2_dominance = 'FAIL' THEN 1 ELSE 0 END) as gate2_fails,
                SUM(CASE WHEN gate3_regime_risk = 'FAIL' THEN 1 ELSE 0 END) as gate3_fails,
                SUM(CASE WHEN gate4_structural_location = 'FAIL' THEN 1 ELSE 0 END) as gate4_fails,
                SUM(CASE WHEN gate5_overconfidence = 'FAIL' THEN 1 ELSE 0 END) as gate5_fails
            FROM gate_evaluations
            WHERE datetime(timestamp) >= datetime('now', '-' || ? || ' days')
            "#,
        )
        .bind(days)
        .fetch_one(&self.pool)
        .await?;

        Ok(GateFailureStats {
            alignment: row.try_get::<Option<i64>, _>("gate1_fails")?.unwrap_or(0),
            dominance: row.try_get::<Option<i64>, _>("gate2_fails")?.unwrap_or(0),
            regime_risk: row.try_get::<Option<i64>, _>("gate3_fails")?.unwrap_or(0),
            structural_location: row.try_get::<Option<i64>, _>("gate4_fails")?.unwrap_or(0),
            overconfidence: row.try_get::<Option<i64>, _>("gate5_fails")?.unwrap_or(0),
        })
    }

    /// allowed / total; lower means the gate stays selective
    pub async fn selectivity_ratio(&self, symbol: Option<&str>, days: i64) -> Result<f64> {
        let allowed = self.allowed_count(symbol, days).await?;
        let blocked = self.blocked_count(symbol, days).await?;
        let total = allowed + blocked;
        if total == 0 {
            return Ok(0.0);
        }
        Ok((allowed as f64 / total as f64 * 1000.0).round() / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutionGate, GateInputs};
    use analysis_core::{Alignment, HtfLocation, Trend};
    use scenario_probability::{ScenarioInputs, ScenarioProbabilityCalculator};

    async fn log_for_test() -> GateLog {
        GateLog::new("sqlite::memory:").await.unwrap()
    }

    fn evaluate(
        alignment: Alignment,
        location: HtfLocation,
    ) -> (GateEvaluation, scenario_probability::ProbabilityResult) {
        let probs = ScenarioProbabilityCalculator::new().calculate(&ScenarioInputs {
            alignment,
            is_unstable: false,
            dominant_trend: Trend::Bullish,
            htf_location: location,
            current_price: Some(100.0),
            htf_support: &[95.0],
            htf_resistance: &[110.0],
        });
        let evaluation = ExecutionGate::default().evaluate(&GateInputs {
            symbol: "YESBANK",
            alignment,
            is_unstable: false,
            probabilities: Some(&probs),
            current_price: Some(100.0),
            htf_support: &[95.0],
            htf_resistance: &[110.0],
            htf_location: location,
            dominant_trend: Trend::Bullish,
        });
        (evaluation, probs)
    }

    #[tokio::test]
    async fn test_log_and_count() {
        let log = log_for_test().await;

        let (allowed, allowed_probs) = evaluate(Alignment::Full, HtfLocation::Mid);
        assert!(allowed.is_allowed());
        let (blocked, blocked_probs) = evaluate(Alignment::Conflict, HtfLocation::Mid);
        assert!(!blocked.is_allowed());

        let allowed_inputs = GateInputs {
            symbol: "YESBANK",
            alignment: Alignment::Full,
            is_unstable: false,
            probabilities: Some(&allowed_probs),
            current_price: Some(100.0),
            htf_support: &[95.0],
            htf_resistance: &[110.0],
            htf_location: HtfLocation::Mid,
            dominant_trend: Trend::Bullish,
        };
        let blocked_inputs = GateInputs {
            probabilities: Some(&blocked_probs),
            alignment: Alignment::Conflict,
            ..allowed_inputs.clone()
        };

        let id1 = log.log_evaluation(&allowed, &allowed_inputs).await.unwrap();
        let id2 = log.log_evaluation(&blocked, &blocked_inputs).await.unwrap();
        assert!(id2 > id1);

        assert_eq!(log.allowed_count(Some("YESBANK"), 30).await.unwrap(), 1);
        assert_eq!(log.blocked_count(Some("YESBANK"), 30).await.unwrap(), 1);
        assert_eq!(log.allowed_count(None, 30).await.unwrap(), 1);
        assert_eq!(log.selectivity_ratio(None, 30).await.unwrap(), 0.5);
    }

    #[tokio::test]
    async fn test_gate_failure_stats() {
        let log = log_for_test().await;
        let (blocked, probs) = evaluate(Alignment::Conflict, HtfLocation::Mid);
        let inputs = GateInputs {
            symbol: "TCS",
            alignment: Alignment::Conflict,
            is_unstable: false,
            probabilities: Some(&probs),
            current_price: None,
            htf_support: &[],
            htf_resistance: &[],
            htf_location: HtfLocation::Mid,
            dominant_trend: Trend::Bullish,
        };
        log.log_evaluation(&blocked, &inputs).await.unwrap();

        let stats = log.gate_failure_stats(30).await.unwrap();
        assert_eq!(stats.alignment, 1);
        assert_eq!(stats.dominance, 1);
        assert_eq!(stats.regime_risk, 1);
        assert_eq!(stats.structural_location, 0);
    }

    #[tokio::test]
    async fn test_empty_log_ratio_is_zero() {
        let log = log_for_test().await;
        assert_eq!(log.selectivity_ratio(None, 30).await.unwrap(), 0.0);
        let stats = log.gate_failure_stats(30).await.unwrap();
        assert_eq!(stats.alignment, 0);
    }
}
