//! Multi-instrument market scanner.
//!
//! Expands a free-text scope into candidate tickers, health-checks the
//! chart source, runs the full analysis pipeline per instrument under the
//! scanner's strict resolution mode (no web search), and ranks the
//! eligible signals. A single instrument failing never aborts the scan.

mod scope;

pub use scope::expand_scope;

use analysis_core::{AgentError, TimeframeMode};
use execution_gate::{ExecutionGate, GateEvaluation, GateInputs, GateLog};
use multi_timeframe::{MtfAggregator, MtfAssessment, TimeframeAnalyzer};
use scenario_probability::{ProbabilityResult, ScenarioInputs, ScenarioProbabilityCalculator};
use serde::{Deserialize, Serialize};
use symbol_resolver::{ResolutionMode, ResolutionStatus, SymbolResolver};
use tracing::{info, warn};
use verdict_composer::{
    GateOutcome, TrendState, Verdict, VerdictComposer, VerdictInputs, VerdictKind,
};

/// One scan request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Free-text scope ("bank nifty", "yesbank,kotakbank,sbin")
    pub scope: String,
    pub mode: TimeframeMode,
    /// Signals returned after ranking
    pub top_n: usize,
}

/// A ranked signal from one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSignal {
    pub symbol: String,
    pub verdict: Verdict,
    pub alignment: analysis_core::Alignment,
    pub active_state: analysis_core::ActiveState,
    pub active_probability: f64,
    pub gate_allowed: bool,
}

/// Aggregate scan outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub scanned: usize,
    pub skipped_unavailable: usize,
    pub failed: usize,
    pub eligible: usize,
    pub top: Vec<ScanSignal>,
}

pub struct MarketScanner<'a> {
    resolver: &'a SymbolResolver,
    aggregator: &'a MtfAggregator,
    gate: &'a ExecutionGate,
    gate_log: Option<&'a GateLog>,
    calculator: ScenarioProbabilityCalculator,
    composer: VerdictComposer,
}

impl<'a> MarketScanner<'a> {
    pub fn new(
        resolver: &'a SymbolResolver,
        aggregator: &'a MtfAggregator,
        gate: &'a ExecutionGate,
        gate_log: Option<&'a GateLog>,
    ) -> MarketScanner<'a> {
        MarketScanner {
            resolver,
            aggregator,
            gate,
            gate_log,
            calculator: ScenarioProbabilityCalculator::new(),
            composer: VerdictComposer::new(),
        }
    }

    /// Run one scan. Aborts only when the scope is empty or the chart
    /// source fails its health check.
    pub async fn scan(
        &self,
        analyzer: &dyn TimeframeAnalyzer,
        request: &ScanRequest,
    ) -> Result<ScanOutcome, AgentError> {
        let candidates = expand_scope(&request.scope);
        if candidates.is_empty() {
            return Err(AgentError::Resolution(format!(
                "scan scope '{}' produced no candidates",
                request.scope
            )));
        }

        if !self.resolver.health_check().await {
            return Err(AgentError::Perception(
                "market data source unavailable, scan aborted".to_string(),
            ));
        }

        info!(
            scope = %request.scope,
            candidates = candidates.len(),
            mode = request.mode.name(),
            "starting market scan"
        );

        let mut outcome = ScanOutcome {
            scanned: 0,
            skipped_unavailable: 0,
            failed: 0,
            eligible: 0,
            top: Vec::new(),
        };
        let mut signals = Vec::new();

        for candidate in &candidates {
            outcome.scanned += 1;
            match self.analyze_instrument(analyzer, candidate, request.mode).await {
                Ok(Some(signal)) => signals.push(signal),
                Ok(None) => outcome.skipped_unavailable += 1,
                Err(e) => {
                    warn!(symbol = %candidate, error = %e, "instrument failed, continuing scan");
                    outcome.failed += 1;
                }
            }
        }

        // Strict mode: eligibility applies the gate exactly as evaluated,
        // never relaxed to fill the result list.
        let mut eligible: Vec<ScanSignal> = signals
            .into_iter()
            .filter(|s| {
                s.gate_allowed
                    && matches!(
                        s.verdict.verdict,
                        VerdictKind::Opportunity | VerdictKind::Monitor
                    )
            })
            .collect();
        outcome.eligible = eligible.len();

        eligible.sort_by(|a, b| {
            b.verdict
                .confidence
                .cmp(&a.verdict.confidence)
                .then_with(|| {
                    b.active_probability
                        .partial_cmp(&a.active_probability)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        eligible.truncate(request.top_n);
        outcome.top = eligible;

        info!(
            scanned = outcome.scanned,
            skipped = outcome.skipped_unavailable,
            failed = outcome.failed,
            eligible = outcome.eligible,
            returned = outcome.top.len(),
            "market scan complete"
        );

        Ok(outcome)
    }

    /// Full pipeline for one instrument. `Ok(None)` means data was
    /// unavailable and the instrument was skipped.
    async fn analyze_instrument(
        &self,
        analyzer: &dyn TimeframeAnalyzer,
        candidate: &str,
        mode: TimeframeMode,
    ) -> Result<Option<ScanSignal>, AgentError> {
        let resolution = self.resolver.resolve(candidate, ResolutionMode::MarketScan).await;
        let symbol = match resolution.status {
            ResolutionStatus::DataUnavailable => {
                warn!(symbol = %candidate, "chart data unavailable, skipping");
                return Ok(None);
            }
            ResolutionStatus::Valid | ResolutionStatus::Resolved => resolution
                .symbol
                .ok_or_else(|| AgentError::Resolution("resolved without a symbol".to_string()))?,
            ResolutionStatus::Unknown => {
                return Err(AgentError::Resolution(format!(
                    "could not resolve {candidate}"
                )))
            }
        };

        let assessment = self.aggregator.run(analyzer, &symbol, mode).await?;
        let (probabilities, evaluation) = self.evaluate(&symbol, &assessment).await;

        let verdict = self.composer.compose(&VerdictInputs {
            alignment: assessment.alignment,
            active_state: probabilities.active_state.into(),
            gate: if evaluation.is_allowed() {
                GateOutcome::Pass
            } else {
                GateOutcome::Blocked
            },
            regime_flags: Default::default(),
            htf_location: assessment.htf_location,
            trend_state: TrendState::from_trend(assessment.dominant_trend),
        });

        Ok(Some(ScanSignal {
            symbol,
            active_probability: probabilities.active_probability().unwrap_or(0.0),
            active_state: probabilities.active_state,
            alignment: assessment.alignment,
            gate_allowed: evaluation.is_allowed(),
            verdict,
        }))
    }

    async fn evaluate(
        &self,
        symbol: &str,
        assessment: &MtfAssessment,
    ) -> (ProbabilityResult, GateEvaluation) {
        let probabilities = self.calculator.calculate(&ScenarioInputs {
            alignment: assessment.alignment,
            is_unstable: assessment.is_unstable,
            dominant_trend: assessment.dominant_trend,
            htf_location: assessment.htf_location,
            current_price: assessment.current_price,
            htf_support: &assessment.htf_support,
            htf_resistance: &assessment.htf_resistance,
        });

        let gate_inputs = GateInputs {
            symbol,
            alignment: assessment.alignment,
            is_unstable: assessment.is_unstable,
            probabilities: Some(&probabilities),
            current_price: assessment.current_price,
            htf_support: &assessment.htf_support,
            htf_resistance: &assessment.htf_resistance,
            htf_location: assessment.htf_location,
            dominant_trend: assessment.dominant_trend,
        };
        let evaluation = self.gate.evaluate(&gate_inputs);

        if let Some(log) = self.gate_log {
            if let Err(e) = log.log_evaluation(&evaluation, &gate_inputs).await {
                warn!(symbol, error = %e, "failed to log gate evaluation");
            }
        }

        (probabilities, evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{
        AgentError, Analysis, ChartClient, CompletionClient, DomSnapshot, NavigationResult,
        Structure, Timeframe, Trend,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use symbol_memory::SymbolMemory;
    use tempfile::tempdir;

    struct ScanChart {
        valid: HashSet<String>,
    }

    #[async_trait]
    impl ChartClient for ScanChart {
        async fn navigate(&self, symbol: &str, _timeframe: Timeframe) -> NavigationResult {
            NavigationResult {
                success: self.valid.contains(symbol),
                symbol: symbol.to_string(),
                url: None,
                error: None,
            }
        }

        async fn extract_chart_data(&self) -> Result<DomSnapshot, AgentError> {
            Ok(DomSnapshot {
                symbol: Some("OK".to_string()),
                price: Some("100".to_string()),
                ..Default::default()
            })
        }

        async fn switch_timeframe(&self, _timeframe: Timeframe) -> Result<(), AgentError> {
            Ok(())
        }
    }

    struct NoSearch;

    #[async_trait]
    impl CompletionClient for NoSearch {
        async fn generate_completion(
            &self,
            _system: &str,
            _user: &str,
        ) -> Result<String, AgentError> {
            panic!("scanner must never reach the completion client for search")
        }

        async fn fetch_search_page(&self, _query: &str) -> Result<String, AgentError> {
            panic!("scanner must never issue a web search")
        }
    }

    struct UniformAnalyzer {
        trend: Trend,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TimeframeAnalyzer for UniformAnalyzer {
        async fn analyze_timeframe(
            &self,
            symbol: &str,
            timeframe: Timeframe,
        ) -> Result<Analysis, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Analysis {
                symbol: symbol.to_string(),
                timeframe,
                timestamp: Utc::now(),
                trend: self.trend,
                structure: Structure::from_trend(self.trend),
                support: vec![90.0],
                resistance: vec![110.0],
                momentum: "moderate bullish".to_string(),
                momentum_condition: "expanding".to_string(),
                volume_trend: "increasing".to_string(),
                candlestick_pattern: "none".to_string(),
                price: Some(100.0),
                reasoning: String::new(),
                bias: String::new(),
                key_levels: String::new(),
                perception_confidence: Some(0.8),
                perception_completeness: Some(1.0),
                perception_conflicts: 0,
                critical_conflict: false,
                validation_warnings: Vec::new(),
            })
        }
    }

    fn resolver_for(valid: &[&str], dir: &tempfile::TempDir) -> SymbolResolver {
        SymbolResolver::new(
            Arc::new(ScanChart {
                valid: valid.iter().map(|s| s.to_string()).collect(),
            }),
            Arc::new(NoSearch),
            SymbolMemory::open(dir.path().join("cache.json")),
            0,
        )
    }

    #[tokio::test]
    async fn test_scan_skips_unavailable_and_ranks_the_rest() {
        let dir = tempdir().unwrap();
        // NIFTY validates the health check; 2 of 3 candidates have data
        let resolver = resolver_for(&["NIFTY", "HDFCBANK", "ICICIBANK"], &dir);
        let aggregator = MtfAggregator::default();
        let gate = ExecutionGate::default();
        let scanner = MarketScanner::new(&resolver, &aggregator, &gate, None);
        let analyzer = UniformAnalyzer {
            trend: Trend::Bullish,
            calls: AtomicUsize::new(0),
        };

        let outcome = scanner
            .scan(
                &analyzer,
                &ScanRequest {
                    scope: "hdfcbank,icicibank,sbin".to_string(),
                    mode: TimeframeMode::Swing,
                    top_n: 5,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.scanned, 3);
        assert_eq!(outcome.skipped_unavailable, 1);
        assert_eq!(outcome.failed, 0);
        // Full alignment, stable, mid location: gates pass, OPPORTUNITY
        assert_eq!(outcome.eligible, 2);
        assert_eq!(outcome.top.len(), 2);
        assert!(outcome.top.iter().all(|s| s.gate_allowed));
    }

    #[tokio::test]
    async fn test_scan_aborts_on_failed_health_check() {
        let dir = tempdir().unwrap();
        let resolver = resolver_for(&["HDFCBANK"], &dir); // no NIFTY
        let aggregator = MtfAggregator::default();
        let gate = ExecutionGate::default();
        let scanner = MarketScanner::new(&resolver, &aggregator, &gate, None);
        let analyzer = UniformAnalyzer {
            trend: Trend::Bullish,
            calls: AtomicUsize::new(0),
        };

        let err = scanner
            .scan(
                &analyzer,
                &ScanRequest {
                    scope: "hdfcbank".to_string(),
                    mode: TimeframeMode::Swing,
                    top_n: 5,
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unavailable"));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_conflicted_signals_are_not_eligible() {
        let dir = tempdir().unwrap();
        let resolver = resolver_for(&["NIFTY", "HDFCBANK"], &dir);
        let aggregator = MtfAggregator::default();
        let gate = ExecutionGate::default();
        let scanner = MarketScanner::new(&resolver, &aggregator, &gate, None);

        struct SplitAnalyzer;
        #[async_trait]
        impl TimeframeAnalyzer for SplitAnalyzer {
            async fn analyze_timeframe(
                &self,
                symbol: &str,
                timeframe: Timeframe,
            ) -> Result<Analysis, AgentError> {
                // Monthly bullish, lower timeframes bearish: CONFLICT
                let trend = if timeframe == Timeframe::Monthly {
                    Trend::Bullish
                } else {
                    Trend::Bearish
                };
                UniformAnalyzer {
                    trend,
                    calls: AtomicUsize::new(0),
                }
                .analyze_timeframe(symbol, timeframe)
                .await
            }
        }

        let outcome = scanner
            .scan(
                &SplitAnalyzer,
                &ScanRequest {
                    scope: "hdfcbank".to_string(),
                    mode: TimeframeMode::Swing,
                    top_n: 5,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.scanned, 1);
        assert_eq!(outcome.eligible, 0);
        assert!(outcome.top.is_empty());
    }

    #[tokio::test]
    async fn test_gate_log_records_each_instrument() {
        let dir = tempdir().unwrap();
        let resolver = resolver_for(&["NIFTY", "HDFCBANK", "ICICIBANK"], &dir);
        let aggregator = MtfAggregator::default();
        let gate = ExecutionGate::default();
        let log = GateLog::new("sqlite::memory:").await.unwrap();
        let scanner = MarketScanner::new(&resolver, &aggregator, &gate, Some(&log));
        let analyzer = UniformAnalyzer {
            trend: Trend::Bullish,
            calls: AtomicUsize::new(0),
        };

        scanner
            .scan(
                &analyzer,
                &ScanRequest {
                    scope: "hdfcbank,icicibank".to_string(),
                    mode: TimeframeMode::Swing,
                    top_n: 5,
                },
            )
            .await
            .unwrap();

        assert_eq!(log.allowed_count(None, 30).await.unwrap(), 2);
    }
}
