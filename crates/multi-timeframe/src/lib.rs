//! Multi-timeframe aggregation and alignment classification.
//!
//! Runs the per-timeframe analyzer across a mode-dependent timeframe set,
//! highest timeframe first, then classifies cross-timeframe agreement with
//! top-down precedence: a disagreement involving the dominant timeframe is
//! a CONFLICT, a divergence among the lower timeframes only is PARTIAL.
//! Slots that fail are tolerated as long as at least one survives.

use analysis_core::{
    AgentError, Alignment, Analysis, HtfLocation, Timeframe, TimeframeMode, Trend,
};
use analysis_store::AnalysisStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default overextension proximity for the UNSTABLE check (percent)
pub const DEFAULT_UNSTABLE_PROXIMITY_PCT: f64 = 3.0;
/// Default proximity for HTF location detection (percent)
pub const DEFAULT_HTF_LOCATION_PCT: f64 = 2.0;

/// Momentum wording that reads as extreme extension
const EXTREME_BULLISH: &[&str] = &["strong bullish", "extreme", "overbought"];
const EXTREME_BEARISH: &[&str] = &["strong bearish", "extreme", "oversold"];

/// One per-timeframe analysis supplier; the orchestrator and scanner each
/// implement this over the full observe-reconcile-synthesize slice.
#[async_trait]
pub trait TimeframeAnalyzer: Send + Sync {
    async fn analyze_timeframe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Analysis, AgentError>;
}

/// A surviving analysis slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeSlot {
    pub timeframe: Timeframe,
    pub analysis: Analysis,
}

/// The aggregated multi-timeframe view for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtfAssessment {
    pub symbol: String,
    /// Surviving slots, highest timeframe first
    pub slots: Vec<TimeframeSlot>,
    /// Timeframes that failed and were skipped
    pub failed: Vec<Timeframe>,
    pub alignment: Alignment,
    pub dominant_timeframe: Timeframe,
    pub dominant_trend: Trend,
    pub is_unstable: bool,
    pub conflicts: Vec<String>,
    pub htf_location: HtfLocation,
    pub current_price: Option<f64>,
    pub htf_support: Vec<f64>,
    pub htf_resistance: Vec<f64>,
}

/// Aggregator with adjustable proximity constants
#[derive(Debug, Clone)]
pub struct MtfAggregator {
    unstable_proximity_pct: f64,
    htf_location_pct: f64,
}

impl Default for MtfAggregator {
    fn default() -> Self {
        MtfAggregator {
            unstable_proximity_pct: DEFAULT_UNSTABLE_PROXIMITY_PCT,
            htf_location_pct: DEFAULT_HTF_LOCATION_PCT,
        }
    }
}

impl MtfAggregator {
    pub fn new(unstable_proximity_pct: f64, htf_location_pct: f64) -> MtfAggregator {
        MtfAggregator {
            unstable_proximity_pct,
            htf_location_pct,
        }
    }

    /// Run fresh per-timeframe analyses in the mode's fixed order.
    pub async fn run(
        &self,
        analyzer: &dyn TimeframeAnalyzer,
        symbol: &str,
        mode: TimeframeMode,
    ) -> Result<MtfAssessment, AgentError> {
        let mut slots = Vec::new();
        let mut failed = Vec::new();

        for &timeframe in mode.timeframes() {
            match analyzer.analyze_timeframe(symbol, timeframe).await {
                Ok(analysis) => slots.push(TimeframeSlot {
                    timeframe,
                    analysis,
                }),
                Err(e) => {
                    warn!(symbol, %timeframe, error = %e, "timeframe slot failed, continuing");
                    failed.push(timeframe);
                }
            }
        }

        self.classify(symbol, slots, failed)
    }

    /// Reasoning-only mode: synthesize from stored analyses inside the
    /// freshness window. Any missing slot aborts with the missing list.
    pub async fn synthesize_from_stored(
        &self,
        store: &AnalysisStore,
        symbol: &str,
        mode: TimeframeMode,
        max_age_hours: i64,
    ) -> Result<MtfAssessment, AgentError> {
        let mut slots = Vec::new();
        let mut missing = Vec::new();

        for &timeframe in mode.timeframes() {
            match store
                .latest(symbol, Some(timeframe), Some(max_age_hours))
                .await
                .map_err(|e| AgentError::Storage(e.to_string()))?
            {
                Some(analysis) => slots.push(TimeframeSlot {
                    timeframe,
                    analysis,
                }),
                None => missing.push(timeframe.label()),
            }
        }

        if !missing.is_empty() {
            return Err(AgentError::Aggregation(format!(
                "insufficient stored data from last {max_age_hours} hours; missing: {}",
                missing.join(", ")
            )));
        }

        self.classify(symbol, slots, Vec::new())
    }

    /// Pure classification over surviving slots.
    pub fn classify(
        &self,
        symbol: &str,
        mut slots: Vec<TimeframeSlot>,
        failed: Vec<Timeframe>,
    ) -> Result<MtfAssessment, AgentError> {
        if slots.is_empty() {
            return Err(AgentError::Aggregation(format!(
                "all timeframes failed for {symbol}"
            )));
        }

        slots.sort_by(|a, b| b.timeframe.rank().cmp(&a.timeframe.rank()));

        let dominant = &slots[0];
        let dominant_timeframe = dominant.timeframe;
        let dominant_trend = dominant.analysis.trend;
        let htf_support = dominant.analysis.support.clone();
        let htf_resistance = dominant.analysis.resistance.clone();

        // A disagreement is only a CONFLICT when the run's highest intended
        // timeframe survived and is the one being contradicted; divergence
        // among lower timeframes alone reads as PARTIAL.
        let top_intended_rank = slots
            .iter()
            .map(|s| s.timeframe.rank())
            .chain(failed.iter().map(|t| t.rank()))
            .max()
            .expect("at least one slot");
        let dominant_is_top = dominant_timeframe.rank() == top_intended_rank;

        let mut conflicts = Vec::new();
        let divergent = slots[1..]
            .iter()
            .find(|s| s.analysis.trend != dominant_trend);
        let mut alignment = match divergent {
            None if slots.len() >= 2 => Alignment::Full,
            None => Alignment::Partial,
            Some(divergent) if dominant_is_top => {
                conflicts.push(format!(
                    "{} ({}) conflicts with {} ({})",
                    divergent.timeframe.label(),
                    divergent.analysis.trend,
                    dominant_timeframe.label(),
                    dominant_trend
                ));
                Alignment::Conflict
            }
            Some(divergent) => {
                conflicts.push(format!(
                    "{} ({}) diverges from {} ({})",
                    divergent.timeframe.label(),
                    divergent.analysis.trend,
                    dominant_timeframe.label(),
                    dominant_trend
                ));
                Alignment::Partial
            }
        };

        // Lowest timeframe carries the extension signal; its price is the
        // freshest reading available.
        let lowest = slots.last().expect("at least one slot");
        let current_price = lowest
            .analysis
            .price
            .or(dominant.analysis.price);

        let mut is_unstable = false;
        if let Some(price) = current_price {
            let momentum = lowest.analysis.momentum.to_lowercase();
            let extreme_bullish = EXTREME_BULLISH.iter().any(|kw| momentum.contains(kw));
            let extreme_bearish = EXTREME_BEARISH.iter().any(|kw| momentum.contains(kw));

            if extreme_bullish {
                for resistance in htf_resistance.iter().take(2) {
                    let distance_pct = ((resistance - price) / price) * 100.0;
                    if (0.0..=self.unstable_proximity_pct).contains(&distance_pct) {
                        if alignment == Alignment::Full {
                            alignment = Alignment::Unstable;
                        }
                        is_unstable = true;
                        conflicts.push(format!(
                            "{} overbought ({}) while price near {} resistance (Rs {resistance:.2})",
                            lowest.timeframe.label(),
                            lowest.analysis.momentum,
                            dominant_timeframe.label()
                        ));
                        break;
                    }
                }
            } else if extreme_bearish {
                for support in htf_support.iter().take(2) {
                    let distance_pct = ((price - support) / price) * 100.0;
                    if (0.0..=self.unstable_proximity_pct).contains(&distance_pct) {
                        if alignment == Alignment::Full {
                            alignment = Alignment::Unstable;
                        }
                        is_unstable = true;
                        conflicts.push(format!(
                            "{} oversold ({}) while price near {} support (Rs {support:.2})",
                            lowest.timeframe.label(),
                            lowest.analysis.momentum,
                            dominant_timeframe.label()
                        ));
                        break;
                    }
                }
            }
        }

        let htf_location = self.locate(current_price, &htf_support, &htf_resistance);

        info!(
            symbol,
            alignment = %alignment,
            dominant = dominant_timeframe.label(),
            is_unstable,
            location = %htf_location,
            "multi-timeframe classification complete"
        );

        Ok(MtfAssessment {
            symbol: symbol.to_string(),
            slots,
            failed,
            alignment,
            dominant_timeframe,
            dominant_trend,
            is_unstable,
            conflicts,
            htf_location,
            current_price,
            htf_support,
            htf_resistance,
        })
    }

    /// Price position relative to the dominant timeframe's first levels
    fn locate(&self, price: Option<f64>, support: &[f64], resistance: &[f64]) -> HtfLocation {
        let price = match price {
            Some(p) => p,
            None => return HtfLocation::Unknown,
        };
        if support.is_empty() && resistance.is_empty() {
            return HtfLocation::Unknown;
        }
        let fraction = self.htf_location_pct / 100.0;
        if let Some(first) = resistance.first() {
            if price >= first * (1.0 - fraction) {
                return HtfLocation::Resistance;
            }
        }
        if let Some(first) = support.first() {
            if price <= first * (1.0 + fraction) {
                return HtfLocation::Support;
            }
        }
        HtfLocation::Mid
    }
}
