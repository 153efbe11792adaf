//! The single-symbol analysis pipeline.

use analysis_core::{
    AgentError, Alignment, Analysis, ChatTag, Observation, Timeframe, TimeframeMode,
};
use async_trait::async_trait;
use execution_gate::{ExecutionGate, GateEvaluation, GateInputs, GateStatus};
use multi_timeframe::{MtfAggregator, MtfAssessment, TimeframeAnalyzer};
use scenario_probability::{
    ConsistencyFlag, ProbabilityResult, ScenarioInputs, ScenarioProbabilityCalculator,
};
use serde::Serialize;
use symbol_resolver::ResolutionMode;
use technical_analysis::TechnicalAnalyzer;
use tracing::{info, warn};
use verdict_composer::{GateOutcome, TrendState, Verdict, VerdictComposer, VerdictInputs};

use crate::context::MarketContext;
use intent_resolver::extract_symbol_hint;

/// Per-timeframe analysis over the live chart: navigate, scrape the DOM,
/// take a vision observation, synthesize, persist.
pub struct SlotAnalyzer<'a> {
    pub ctx: &'a MarketContext,
}

#[async_trait]
impl TimeframeAnalyzer for SlotAnalyzer<'_> {
    async fn analyze_timeframe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Analysis, AgentError> {
        let navigation = self.ctx.chart.navigate(symbol, timeframe).await;
        if !navigation.success {
            return Err(AgentError::Perception(format!(
                "chart navigation failed for {symbol} ({}): {}",
                timeframe.code(),
                navigation.error.unwrap_or_else(|| "unknown".to_string())
            )));
        }

        let mut dom = self.ctx.chart.extract_chart_data().await?;
        if dom.is_empty() {
            return Err(AgentError::Perception(format!(
                "chart data extraction was empty for {symbol} ({})",
                timeframe.code()
            )));
        }
        dom.timeframe = Some(timeframe);

        let observation = Observation::vision(format!(
            "Analyze {symbol} {} chart for trend, support/resistance, momentum, volume, \
             and candlestick patterns",
            timeframe.label()
        ));
        let vision_result = self.ctx.vision.observe(observation).await;
        let vlm_text = if vision_result.is_success() {
            vision_result.result
        } else {
            warn!(symbol, timeframe = timeframe.code(), "vision observation unavailable");
            None
        };

        TechnicalAnalyzer::new(self.ctx.llm.clone())
            .with_store(self.ctx.store.clone())
            .analyze(&dom, vlm_text.as_deref())
            .await
    }
}

/// Everything a finished cycle produced
#[derive(Debug, Clone, Serialize)]
pub struct MarketReport {
    pub symbol: String,
    pub assessment: MtfAssessment,
    pub probabilities: ProbabilityResult,
    pub consistency_flags: Vec<ConsistencyFlag>,
    pub gate: GateEvaluation,
    pub verdict: Verdict,
}

/// Full fresh-observation analysis cycle for one user request.
pub async fn run_market_analysis(
    ctx: &MarketContext,
    user_text: &str,
    mode: TimeframeMode,
) -> Result<MarketReport, AgentError> {
    let input = extract_symbol_hint(user_text).unwrap_or_else(|| user_text.to_string());

    let resolution = ctx.resolver.resolve(&input, ResolutionMode::SingleAnalysis).await;
    if !resolution.is_resolved() {
        let message = resolution
            .error
            .unwrap_or_else(|| format!("could not resolve '{input}'"));
        ctx.chat.emit(ChatTag::Error, &message);
        return Err(AgentError::Resolution(message));
    }
    let symbol = resolution.symbol.expect("resolved result carries a symbol");
    ctx.chat.emit(
        ChatTag::Success,
        &format!("Symbol resolved: {symbol} ({:?})", resolution.source),
    );

    let aggregator = MtfAggregator::new(
        ctx.config.unstable_proximity_pct,
        ctx.config.htf_location_pct,
    );
    let analyzer = SlotAnalyzer { ctx };
    let assessment = match aggregator.run(&analyzer, &symbol, mode).await {
        Ok(assessment) => assessment,
        Err(e) => {
            ctx.chat.emit(ChatTag::Error, &e.to_string());
            return Err(e);
        }
    };

    for timeframe in &assessment.failed {
        ctx.chat.emit(
            ChatTag::Warning,
            &format!(
                "{} timeframe unavailable; proceeding with surviving timeframes",
                timeframe.label()
            ),
        );
    }

    finish_cycle(ctx, assessment).await
}

/// Reasoning-only cycle: synthesize from stored analyses, no new charts.
pub async fn run_reasoning_only(
    ctx: &MarketContext,
    user_text: &str,
    mode: TimeframeMode,
) -> Result<MarketReport, AgentError> {
    let symbol = extract_symbol_hint(user_text)
        .unwrap_or_else(|| user_text.trim().to_uppercase());

    ctx.chat.emit(
        ChatTag::Info,
        &format!("Synthesizing {symbol} from stored analyses (no new charts fetched)"),
    );

    let aggregator = MtfAggregator::new(
        ctx.config.unstable_proximity_pct,
        ctx.config.htf_location_pct,
    );
    let assessment = match aggregator
        .synthesize_from_stored(&ctx.store, &symbol, mode, ctx.config.reasoning_max_age_hours)
        .await
    {
        Ok(assessment) => assessment,
        Err(e) => {
            ctx.chat.emit(ChatTag::Error, &e.to_string());
            return Err(e);
        }
    };

    finish_cycle(ctx, assessment).await
}

/// Shared tail: probabilities, consistency flags, gate, verdict, emission.
pub(crate) async fn finish_cycle(
    ctx: &MarketContext,
    assessment: MtfAssessment,
) -> Result<MarketReport, AgentError> {
    let symbol = assessment.symbol.clone();

    ctx.chat.emit(
        ChatTag::Info,
        &format!(
            "Dominant Trend: {} ({})",
            assessment.dominant_trend,
            assessment.dominant_timeframe.label()
        ),
    );
    let alignment_tag = match assessment.alignment {
        Alignment::Conflict | Alignment::Unstable => ChatTag::Warning,
        _ => ChatTag::Success,
    };
    ctx.chat
        .emit(alignment_tag, &format!("Alignment: {}", assessment.alignment));
    for conflict in &assessment.conflicts {
        ctx.chat.emit(ChatTag::Warning, conflict);
    }

    let calculator = ScenarioProbabilityCalculator::new();
    let inputs = ScenarioInputs {
        alignment: assessment.alignment,
        is_unstable: assessment.is_unstable,
        dominant_trend: assessment.dominant_trend,
        htf_location: assessment.htf_location,
        current_price: assessment.current_price,
        htf_support: &assessment.htf_support,
        htf_resistance: &assessment.htf_resistance,
    };
    let probabilities = calculator.calculate(&inputs);
    let consistency_flags = calculator.validate_consistency(&probabilities, &inputs);

    ctx.chat.emit(
        ChatTag::Info,
        &format!(
            "Scenario probabilities: continuation {:.2} / pullback {:.2} / failure {:.2} \
             (active: {})",
            probabilities.p_continuation,
            probabilities.p_pullback,
            probabilities.p_failure,
            probabilities.active_state
        ),
    );
    for flag in &consistency_flags {
        ctx.chat
            .emit(ChatTag::Warning, &format!("[{}] {}", flag.kind.label(), flag.message));
    }

    let gate = ExecutionGate::new(ctx.config.regime_risk_ceiling);
    let gate_inputs = GateInputs {
        symbol: &symbol,
        alignment: assessment.alignment,
        is_unstable: assessment.is_unstable,
        probabilities: Some(&probabilities),
        current_price: assessment.current_price,
        htf_support: &assessment.htf_support,
        htf_resistance: &assessment.htf_resistance,
        htf_location: assessment.htf_location,
        dominant_trend: assessment.dominant_trend,
    };
    let evaluation = gate.evaluate(&gate_inputs);
    if let Err(e) = ctx.gate_log.log_evaluation(&evaluation, &gate_inputs).await {
        warn!(symbol = %symbol, error = %e, "failed to log gate evaluation");
    }

    for (name, status) in evaluation.gates.as_pairs() {
        let tag = if status == GateStatus::Pass {
            ChatTag::Success
        } else {
            ChatTag::Error
        };
        ctx.chat.emit(tag, &format!("{name}: {}", status.as_str()));
    }
    ctx.chat.emit(
        ChatTag::Info,
        &format!(
            "Execution permission: {} (valid for {})",
            evaluation.permission.status.as_str(),
            evaluation.permission.valid_for
        ),
    );

    // Catalyst headlines are informational; failures are ignored
    if let Ok(headlines) = ctx.news.recent_headlines(&symbol, 5).await {
        for headline in headlines {
            ctx.chat.emit(ChatTag::Info, &format!("News: {headline}"));
        }
    }

    let composer = VerdictComposer::new();
    let verdict = composer.compose(&VerdictInputs {
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

    ctx.chat.emit(
        ChatTag::Analysis,
        &format!(
            "FINAL VERDICT: {} (confidence {})",
            verdict.verdict.label(),
            verdict.confidence.label()
        ),
    );
    ctx.chat.emit(ChatTag::Analysis, &verdict.summary);

    info!(symbol = %symbol, verdict = verdict.verdict.label(), "analysis cycle complete");

    Ok(MarketReport {
        symbol,
        assessment,
        probabilities,
        consistency_flags,
        gate: evaluation,
        verdict,
    })
}
