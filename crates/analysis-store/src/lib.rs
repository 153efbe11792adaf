//! Persistent storage for per-timeframe analyses.
//!
//! Analyses are written once and never mutated. Symbol lookups are
//! case-insensitive and tolerate exchange prefixes ("NSE:TCS" and "tcs"
//! find the same rows). The scenario-resolution table lives alongside and
//! is only ever written through an explicit operator call.

mod resolution;

pub use resolution::ScenarioResolution;

use analysis_core::{Analysis, Timeframe, Trend};
use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

const EXCHANGE_PREFIXES: &[&str] = &["NSE:", "BSE:", "NASDAQ:", "NYSE:"];

/// Outcome of a trend-change comparison
#[derive(Debug, Clone)]
pub struct TrendChange {
    pub changed: bool,
    pub previous_trend: Option<String>,
    pub description: String,
    pub history: Vec<String>,
}

/// Store-level statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_analyses: i64,
    pub unique_symbols: i64,
    pub oldest_analysis: Option<String>,
    pub latest_analysis: Option<String>,
}

#[derive(Clone)]
pub struct AnalysisStore {
    pool: SqlitePool,
}

impl AnalysisStore {
    pub async fn new(database_url: &str) -> Result<AnalysisStore> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Writes serialize through a single handle; in-memory databases
        // also require it (each new connection would be a fresh database)
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = AnalysisStore { pool };
        store.init_schema().await?;
        info!(url = database_url, "analysis store initialized");
        Ok(store)
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

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Uppercase match patterns with and without the NSE prefix
    fn symbol_patterns(symbol: &str) -> Vec<String> {
        let upper = symbol.trim().to_uppercase();
        if EXCHANGE_PREFIXES.iter().any(|p| upper.starts_with(p)) {
            vec![upper]
        } else {
            vec![format!("NSE:{upper}"), upper]
        }
    }

    /// Persist one analysis. Returns the row id, or `None` when the same
    /// (symbol, timeframe, timestamp) was already stored.
    pub async fn store(&self, analysis: &Analysis) -> Result<Option<i64>> {
        let support = serde_json::to_string(&analysis.support)?;
        let resistance = serde_json::to_string(&analysis.resistance)?;
        let full = serde_json::to_string(analysis)?;

        let result = sqlx::query(
            r#"
            INSERT INTO analyses (
                symbol, timeframe, timestamp, trend,
                support_levels, resistance_levels,
                momentum, bias, price, full_analysis
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&analysis.symbol)
        .bind(analysis.timeframe.code())
        .bind(analysis.timestamp.to_rfc3339())
        .bind(analysis.trend.as_str())
        .bind(support)
        .bind(resistance)
        .bind(&analysis.momentum)
        .bind(&analysis.bias)
        .bind(analysis.price)
        .bind(full)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                info!(symbol = %analysis.symbol, timeframe = %analysis.timeframe, id, "analysis stored");
                Ok(Some(id))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                warn!(
                    symbol = %analysis.symbol,
                    timeframe = %analysis.timeframe,
                    "duplicate analysis skipped"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Most recent analysis for a symbol, optionally filtered by timeframe
    /// and maximum age in hours.
    pub async fn latest(
        &self,
        symbol: &str,
        timeframe: Option<Timeframe>,
        max_age_hours: Option<i64>,
    ) -> Result<Option<Analysis>> {
        let patterns = Self::symbol_patterns(symbol);
        let cutoff = max_age_hours.map(|hours| (Utc::now() - Duration::hours(hours)).to_rfc3339());

        let mut sql = String::from(
            "SELECT full_analysis, timestamp FROM analyses WHERE UPPER(symbol) IN (?, ?)",
        );
        if patterns.len() == 1 {
            sql = "SELECT full_analysis, timestamp FROM analyses WHERE UPPER(symbol) IN (?)"
                .to_string();
        }
        if timeframe.is_some() {
            sql.push_str(" AND timeframe = ?");
        }
        if cutoff.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT 1");

        let mut query = sqlx::query(&sql);
        for pattern in &patterns {
            query = query.bind(pattern);
        }
        if let Some(tf) = timeframe {
            query = query.bind(tf.code());
        }
        if let Some(cutoff) = &cutoff {
            query = query.bind(cutoff);
        }

        let row = query.fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                let raw: String = row.try_get("full_analysis")?;
                let stored_at: String = row.try_get("timestamp")?;
                debug!(%symbol, %stored_at, "latest analysis retrieved");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// Recent analyses for a symbol, newest first
    pub async fn list_by_symbol(&self, symbol: &str, limit: i64) -> Result<Vec<Analysis>> {
        let patterns = Self::symbol_patterns(symbol);
        let sql = if patterns.len() == 1 {
            "SELECT full_analysis FROM analyses WHERE UPPER(symbol) IN (?) \
             ORDER BY timestamp DESC LIMIT ?"
        } else {
            "SELECT full_analysis FROM analyses WHERE UPPER(symbol) IN (?, ?) \
             ORDER BY timestamp DESC LIMIT ?"
        };

        let mut query = sqlx::query(sql);
        for pattern in &patterns {
            query = query.bind(pattern);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("full_analysis")?;
                Ok(serde_json::from_str(&raw)?)
            })
            .collect()
    }

    /// All analyses within a time window, newest first
    pub async fn list_recent(&self, hours: i64, limit: i64) -> Result<Vec<Analysis>> {
        let cutoff = (Utc::now() - Duration::hours(hours)).to_rfc3339();
        let rows = sqlx::query(
            "SELECT full_analysis FROM analyses WHERE timestamp >= ? \
             ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("full_analysis")?;
                Ok(serde_json::from_str(&raw)?)
            })
            .collect()
    }

    /// Latest analysis per symbol, for side-by-side comparison
    pub async fn latest_for_symbols(
        &self,
        symbols: &[String],
        timeframe: Option<Timeframe>,
    ) -> Result<HashMap<String, Option<Analysis>>> {
        let mut result = HashMap::new();
        for symbol in symbols {
            result.insert(symbol.clone(), self.latest(symbol, timeframe, None).await?);
        }
        Ok(result)
    }

    /// Compare the current trend against the mode of the previous `lookback`
    /// stored trends.
    pub async fn trend_change(
        &self,
        symbol: &str,
        current_trend: Trend,
        lookback: i64,
    ) -> Result<TrendChange> {
        let analyses = self.list_by_symbol(symbol, lookback + 1).await?;

        if analyses.len() < 2 {
            return Ok(TrendChange {
                changed: false,
                previous_trend: None,
                description: "Insufficient data to determine trend change".to_string(),
                history: Vec::new(),
            });
        }

        // Skip the newest entry; it reflects the current assessment
        let history: Vec<String> = analyses[1..]
            .iter()
            .map(|a| a.trend.as_str().to_string())
            .collect();

        let previous = mode_of(&history);
        let changed = previous
            .as_deref()
            .map_or(false, |p| !p.eq_ignore_ascii_case(current_trend.as_str()));

        let description = match (&previous, changed) {
            (Some(prev), true) => format!("Trend changed from {prev} to {current_trend}"),
            _ => format!("Trend remains {current_trend}"),
        };

        Ok(TrendChange {
            changed,
            previous_trend: previous,
            description,
            history,
        })
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analyses")
            .fetch_one(&self.pool)
            .await?;
        let unique: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT symbol) FROM analyses")
            .fetch_one(&self.pool)
            .await?;
        let row = sqlx::query("SELECT MIN(timestamp) as oldest, MAX(timestamp) as newest FROM analyses")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            total_analyses: total,
            unique_symbols: unique,
            oldest_analysis: row.try_get("oldest")?,
            latest_analysis: row.try_get("newest")?,
        })
    }
}

/// Most frequent entry; ties break toward the most recent occurrence
/// (lowest index), which keeps the comparison deterministic.
fn mode_of(history: &[String]) -> Option<String> {
    // History is newest-first, so counts are in first-seen order and a
    // lower position means a more recent trend.
    let mut counts: Vec<(String, usize)> = Vec::new();
    for trend in history {
        match counts.iter_mut().find(|(t, _)| t == trend) {
            Some((_, count)) => *count += 1,
            None => counts.push((trend.clone(), 1)),
        }
    }
    let best = counts
        .iter()
        .enumerate()
        .max_by(|(index_a, (_, count_a)), (index_b, (_, count_b))| {
            count_a.cmp(count_b).then(index_b.cmp(index_a))
        })?;
    let (_, (trend, _)) = best;
    Some(trend.clone())
}
