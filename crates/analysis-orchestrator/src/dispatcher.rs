//! Intent dispatch: one entry point per canonical intent.

use analysis_core::{
    AgentError, ChatTag, Observation, ObservationContext, ObservationType, TimeframeMode,
};
use execution_gate::ExecutionGate;
use intent_resolver::{split_instruction, CanonicalIntent, DialogueState, IntentResolver};
use market_scanner::{MarketScanner, ScanOutcome, ScanRequest};
use multi_timeframe::MtfAggregator;
use tracing::info;

use crate::context::MarketContext;
use crate::pipeline::{run_market_analysis, run_reasoning_only, MarketReport, SlotAnalyzer};
use crate::query::{handle_last_analysis_query, handle_trend_change_query};

/// What a dispatched request produced
#[derive(Debug)]
pub enum DispatchOutcome {
    Report(Box<MarketReport>),
    Scan(ScanOutcome),
    Text(String),
    /// Action work handed to the external planner, pre-decomposed
    Delegated(CanonicalIntent, Vec<String>),
}

/// Words stripped from a scan instruction to leave the scope
const SCAN_STRIP_WORDS: &[&str] = &["scan", "market", "intraday", "swing", "positional"];

/// Timeframe-mode detection shared by analysis and scan routes
pub fn detect_timeframe_mode(text: &str) -> TimeframeMode {
    let lower = text.to_lowercase();
    if ["intraday", "15m", "1h", "4h"].iter().any(|kw| lower.contains(kw)) {
        TimeframeMode::Intraday
    } else if ["positional", "monthly only", "long term"].iter().any(|kw| lower.contains(kw)) {
        TimeframeMode::Positional
    } else {
        TimeframeMode::Swing
    }
}

pub struct Dispatcher {
    resolver: IntentResolver,
    pub state: DialogueState,
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher {
            resolver: IntentResolver::new(),
            state: DialogueState::new(),
        }
    }

    /// Classify and route one user instruction.
    pub async fn dispatch(
        &mut self,
        ctx: &MarketContext,
        text: &str,
    ) -> Result<DispatchOutcome, AgentError> {
        let (intent, routed_text) = self.resolver.resolve(text, &self.state);
        info!(?intent, "dispatching instruction");

        let outcome = match intent {
            CanonicalIntent::MarketAnalysis => self.handle_market_analysis(ctx, &routed_text).await,
            CanonicalIntent::MarketScan => self.handle_market_scan(ctx, &routed_text).await,
            CanonicalIntent::ObserveScreen => self.handle_observe(ctx, &routed_text).await,
            CanonicalIntent::Followup => Ok(self.handle_followup()),
            CanonicalIntent::Greeting => Ok(DispatchOutcome::Text(
                "Hello. Ask me to analyze a symbol or scan a group.".to_string(),
            )),
            CanonicalIntent::Action
            | CanonicalIntent::ActionComposite
            | CanonicalIntent::Unknown => Ok(DispatchOutcome::Delegated(
                intent,
                split_instruction(intent, &routed_text),
            )),
        };

        if let Ok(outcome) = &outcome {
            let response = match outcome {
                DispatchOutcome::Text(text) => text.clone(),
                DispatchOutcome::Report(report) => report.verdict.summary.clone(),
                DispatchOutcome::Scan(scan) => format!("scan returned {} signals", scan.top.len()),
                DispatchOutcome::Delegated(..) => "delegated to planner".to_string(),
            };
            self.state
                .update_interaction(text, &format!("{intent:?}"), &response);
        }
        outcome
    }

    async fn handle_market_analysis(
        &mut self,
        ctx: &MarketContext,
        text: &str,
    ) -> Result<DispatchOutcome, AgentError> {
        let lower = text.to_lowercase();
        let mode = detect_timeframe_mode(text);

        // Memory-only trend question: no browser involved
        if lower.contains("trend") && lower.contains("chang") {
            return Ok(DispatchOutcome::Text(
                handle_trend_change_query(ctx, text).await?,
            ));
        }

        // Memory-only recall of the stored record, also browser-free
        if lower.contains("last analysis")
            || lower.contains("previous analysis")
            || lower.contains("what was")
        {
            return Ok(DispatchOutcome::Text(
                handle_last_analysis_query(ctx, text).await?,
            ));
        }

        // Reasoning-only request synthesizes from stored analyses
        if lower.contains("synthesize") || lower.contains("from stored") || lower.contains("reasoning")
        {
            let report = run_reasoning_only(ctx, text, mode).await?;
            return Ok(DispatchOutcome::Report(Box::new(report)));
        }

        let report = run_market_analysis(ctx, text, mode).await?;
        Ok(DispatchOutcome::Report(Box::new(report)))
    }

    async fn handle_market_scan(
        &mut self,
        ctx: &MarketContext,
        text: &str,
    ) -> Result<DispatchOutcome, AgentError> {
        let mode = detect_timeframe_mode(text);
        let mut scope = text.to_lowercase();
        for word in SCAN_STRIP_WORDS {
            scope = scope.replace(word, " ");
        }
        let scope = scope.split_whitespace().collect::<Vec<_>>().join(" ");
        if scope.is_empty() {
            let message =
                "Please specify what to scan (e.g., 'scan bank nifty', 'scan nifty 50')";
            ctx.chat.emit(ChatTag::Error, message);
            return Err(AgentError::Resolution(message.to_string()));
        }

        ctx.chat
            .emit(ChatTag::Info, &format!("Scanning: {scope} ({})", mode.name()));

        let aggregator = MtfAggregator::new(
            ctx.config.unstable_proximity_pct,
            ctx.config.htf_location_pct,
        );
        let gate = ExecutionGate::new(ctx.config.regime_risk_ceiling);
        let scanner = MarketScanner::new(&ctx.resolver, &aggregator, &gate, Some(&ctx.gate_log));
        let analyzer = SlotAnalyzer { ctx };

        let request = ScanRequest {
            scope,
            mode,
            top_n: ctx.config.scan_top_n,
        };
        let outcome = match scanner.scan(&analyzer, &request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                ctx.chat.emit(ChatTag::Error, &format!("Scan failed: {e}"));
                return Err(e);
            }
        };

        ctx.chat.emit(
            ChatTag::Success,
            &format!(
                "Scan completed: {} instruments, {} unavailable, {} eligible, top {}",
                outcome.scanned,
                outcome.skipped_unavailable,
                outcome.eligible,
                outcome.top.len()
            ),
        );
        for signal in &outcome.top {
            ctx.chat.emit(
                ChatTag::Analysis,
                &format!(
                    "{}: {} ({}, active {} at {:.2})",
                    signal.symbol,
                    signal.verdict.verdict.label(),
                    signal.verdict.confidence.label(),
                    signal.active_state,
                    signal.active_probability
                ),
            );
        }

        Ok(DispatchOutcome::Scan(outcome))
    }

    async fn handle_observe(
        &mut self,
        ctx: &MarketContext,
        text: &str,
    ) -> Result<DispatchOutcome, AgentError> {
        let observation = Observation::new(
            ObservationType::ScreenDescription,
            ObservationContext::Vision,
            None,
        )?;
        let result = ctx.vision.observe(observation).await;
        let response = result
            .result
            .clone()
            .or_else(|| result.error.clone())
            .unwrap_or_else(|| format!("observation returned no description for '{text}'"));
        self.state.update_observation(result);
        ctx.chat.emit(ChatTag::Observation, &response);
        Ok(DispatchOutcome::Text(response))
    }

    /// Drill into the stored last observation without a fresh screenshot
    fn handle_followup(&self) -> DispatchOutcome {
        let response = self
            .state
            .last_observation
            .as_ref()
            .and_then(|observation| {
                observation
                    .metadata
                    .as_ref()
                    .and_then(|m| m.raw_text.clone())
                    .or_else(|| observation.result.clone())
            })
            .unwrap_or_else(|| "No stored observation to expand.".to_string());
        DispatchOutcome::Text(response)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new()
    }
}
