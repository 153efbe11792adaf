//! Final verdict composition.
//!
//! Maps the discrete end-of-cycle state (alignment, active scenario, gate
//! outcome, regime flags, HTF location, trend) to a single human-facing
//! verdict with a confidence level and a one-paragraph summary. Pure and
//! deterministic; the same inputs always compose the same paragraph.

use std::collections::BTreeSet;

use analysis_core::{ActiveState, Alignment, HtfLocation, RegimeFlag};
use serde::{Deserialize, Serialize};

/// Active scenario in the composer's strict vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrictActiveState {
    Continuation,
    Pullback,
    Reversal,
}

impl StrictActiveState {
    pub fn label(&self) -> &'static str {
        match self {
            StrictActiveState::Continuation => "CONTINUATION",
            StrictActiveState::Pullback => "PULLBACK",
            StrictActiveState::Reversal => "REVERSAL",
        }
    }
}

impl From<ActiveState> for StrictActiveState {
    /// Failure and conflict both read as reversal pressure here; a conflict
    /// alignment produces AVOID before the active state matters.
    fn from(state: ActiveState) -> StrictActiveState {
        match state {
            ActiveState::Continuation => StrictActiveState::Continuation,
            ActiveState::Pullback => StrictActiveState::Pullback,
            ActiveState::Failure | ActiveState::ConflictState => StrictActiveState::Reversal,
        }
    }
}

/// Trend in the composer's strict vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendState {
    Up,
    Down,
    Range,
}

impl TrendState {
    pub fn label(&self) -> &'static str {
        match self {
            TrendState::Up => "UP",
            TrendState::Down => "DOWN",
            TrendState::Range => "RANGE",
        }
    }

    pub fn from_trend(trend: analysis_core::Trend) -> TrendState {
        match trend {
            analysis_core::Trend::Bullish => TrendState::Up,
            analysis_core::Trend::Bearish => TrendState::Down,
            analysis_core::Trend::Sideways => TrendState::Range,
        }
    }
}

/// Gate outcome as seen by the composer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateOutcome {
    Pass,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictKind {
    Opportunity,
    Monitor,
    Caution,
    Avoid,
}

impl VerdictKind {
    pub fn label(&self) -> &'static str {
        match self {
            VerdictKind::Opportunity => "OPPORTUNITY",
            VerdictKind::Monitor => "MONITOR",
            VerdictKind::Caution => "CAUTION",
            VerdictKind::Avoid => "AVOID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VerdictConfidence {
    Low,
    Medium,
    High,
}

impl VerdictConfidence {
    pub fn label(&self) -> &'static str {
        match self {
            VerdictConfidence::High => "HIGH",
            VerdictConfidence::Medium => "MEDIUM",
            VerdictConfidence::Low => "LOW",
        }
    }
}

/// Strict composer inputs
#[derive(Debug, Clone)]
pub struct VerdictInputs {
    pub alignment: Alignment,
    pub active_state: StrictActiveState,
    pub gate: GateOutcome,
    pub regime_flags: BTreeSet<RegimeFlag>,
    pub htf_location: HtfLocation,
    pub trend_state: TrendState,
}

/// Composed verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub verdict: VerdictKind,
    pub summary: String,
    pub confidence: VerdictConfidence,
}

#[derive(Debug, Default)]
pub struct VerdictComposer;

impl VerdictComposer {
    pub fn new() -> VerdictComposer {
        VerdictComposer
    }

    pub fn compose(&self, inputs: &VerdictInputs) -> Verdict {
        let verdict = classify(inputs);
        let confidence = confidence(inputs);
        let summary = summarize(inputs, verdict);
        Verdict {
            verdict,
            summary,
            confidence,
        }
    }
}

fn classify(inputs: &VerdictInputs) -> VerdictKind {
    if inputs.alignment == Alignment::Conflict {
        return VerdictKind::Avoid;
    }
    if inputs.alignment == Alignment::Unstable
        || inputs.active_state == StrictActiveState::Reversal
        || !inputs.regime_flags.is_empty()
    {
        return VerdictKind::Caution;
    }
    if inputs.alignment.is_aligned()
        && matches!(
            inputs.active_state,
            StrictActiveState::Continuation | StrictActiveState::Pullback
        )
        && inputs.gate == GateOutcome::Pass
    {
        return VerdictKind::Opportunity;
    }
    VerdictKind::Monitor
}

fn confidence(inputs: &VerdictInputs) -> VerdictConfidence {
    if inputs.alignment == Alignment::Full && inputs.gate == GateOutcome::Pass {
        return VerdictConfidence::High;
    }
    if (inputs.alignment == Alignment::Partial || inputs.gate == GateOutcome::Blocked)
        && inputs.regime_flags.is_empty()
    {
        return VerdictConfidence::Medium;
    }
    VerdictConfidence::Low
}

fn summarize(inputs: &VerdictInputs, verdict: VerdictKind) -> String {
    let alignment_phrase = match inputs.alignment {
        Alignment::Full => "All timeframes agree on direction",
        Alignment::Partial => "Higher timeframes agree while the daily diverges",
        Alignment::Unstable => "Timeframes agree but price is overextended",
        Alignment::Conflict => "Higher timeframes disagree on direction",
    };

    let scenario_phrase = match inputs.active_state {
        StrictActiveState::Continuation => "the dominant structure favors continuation",
        StrictActiveState::Pullback => "the dominant structure favors rotation back into range",
        StrictActiveState::Reversal => "reversal pressure dominates the structure",
    };

    let location_phrase = match inputs.htf_location {
        HtfLocation::Resistance => " with price pressed against higher-timeframe resistance",
        HtfLocation::Support => " with price resting on higher-timeframe support",
        HtfLocation::Mid | HtfLocation::Unknown => "",
    };

    let gate_phrase = match inputs.gate {
        GateOutcome::Pass => "Structural conditions cleared every gate for this cycle",
        GateOutcome::Blocked => "One or more structural gates are blocking this cycle",
    };

    let regime_phrase = if inputs.regime_flags.is_empty() {
        String::new()
    } else {
        let names: Vec<&str> = inputs
            .regime_flags
            .iter()
            .map(|flag| match flag {
                RegimeFlag::RegimeChange => "regime change",
                RegimeFlag::EdgeDegradation => "edge degradation",
            })
            .collect();
        format!(" Regime flags active: {}.", names.join(", "))
    };

    let closing = match verdict {
        VerdictKind::Opportunity => "Structure supports close observation of follow-through.",
        VerdictKind::Monitor => "Watch for the blocking condition to resolve before re-checking.",
        VerdictKind::Caution => "Mean-reversion or invalidation risk is elevated; observe only.",
        VerdictKind::Avoid => "No coherent structure to evaluate until timeframes realign.",
    };

    format!(
        "{alignment_phrase} ({} trend) and {scenario_phrase}{location_phrase}. {gate_phrase}.{regime_phrase} {closing}",
        inputs.trend_state.label()
    )
}
