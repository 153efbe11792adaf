//! Deterministic scenario probability engine.
//!
//! Rule-based probability assignment for the three structural scenarios:
//! continuation, pullback/mean-reversion, failure/regime-change. No
//! predictions, no indicators, no learning; the same discrete inputs always
//! produce the same triple, and the triple always sums to exactly 1.00.

use analysis_core::{ActiveState, Alignment, HtfLocation, Trend};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Probability cap above which the validator flags overconfidence
pub const OVERCONFIDENCE_CAP: f64 = 0.70;

/// Discrete inputs to a probability calculation
#[derive(Debug, Clone)]
pub struct ScenarioInputs<'a> {
    pub alignment: Alignment,
    pub is_unstable: bool,
    pub dominant_trend: Trend,
    pub htf_location: HtfLocation,
    pub current_price: Option<f64>,
    pub htf_support: &'a [f64],
    pub htf_resistance: &'a [f64],
}

/// Structural justification strings, one per scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReasoning {
    pub continuation: String,
    pub pullback: String,
    pub failure: String,
}

/// Post-computation sum check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityValidation {
    pub sum_check: f64,
    pub consistent: bool,
    /// Set when the sum drifted and the failure leg was force-corrected
    pub forced_correction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyFlagKind {
    Contradiction,
    Warning,
    Overconfidence,
}

impl ConsistencyFlagKind {
    pub fn label(&self) -> &'static str {
        match self {
            ConsistencyFlagKind::Contradiction => "CONTRADICTION",
            ConsistencyFlagKind::Warning => "WARNING",
            ConsistencyFlagKind::Overconfidence => "OVERCONFIDENCE",
        }
    }
}

/// Non-fatal consistency finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyFlag {
    pub kind: ConsistencyFlagKind,
    pub message: String,
}

/// Deterministic probability triple with active state and reasoning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityResult {
    pub p_continuation: f64,
    pub p_pullback: f64,
    pub p_failure: f64,
    pub active_state: ActiveState,
    pub reasoning: ScenarioReasoning,
    pub validation: ProbabilityValidation,
}

impl ProbabilityResult {
    /// Probability of the active scenario (conflict state has none)
    pub fn active_probability(&self) -> Option<f64> {
        match self.active_state {
            ActiveState::Continuation => Some(self.p_continuation),
            ActiveState::Pullback => Some(self.p_pullback),
            ActiveState::Failure => Some(self.p_failure),
            ActiveState::ConflictState => None,
        }
    }

    pub fn max_probability(&self) -> f64 {
        self.p_continuation.max(self.p_pullback).max(self.p_failure)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rule-table probability calculator
#[derive(Debug, Default)]
pub struct ScenarioProbabilityCalculator;

impl ScenarioProbabilityCalculator {
    pub fn new() -> ScenarioProbabilityCalculator {
        ScenarioProbabilityCalculator
    }

    pub fn calculate(&self, inputs: &ScenarioInputs<'_>) -> ProbabilityResult {
        // Base table keyed on alignment state
        let (mut cont, mut pull, mut fail) = match (inputs.alignment, inputs.is_unstable) {
            (Alignment::Full, false) => (0.50, 0.30, 0.20),
            (Alignment::Full, true) => (0.30, 0.50, 0.20),
            (Alignment::Partial, _) => (0.35, 0.45, 0.20),
            (Alignment::Unstable, _) => (0.25, 0.55, 0.20),
            (Alignment::Conflict, _) => (0.25, 0.35, 0.40),
        };

        // HTF location adjustment; Unknown is a no-op rather than a guess
        match inputs.htf_location {
            HtfLocation::Resistance => {
                cont *= 0.85;
                pull *= 1.15;
                fail *= 1.05;
            }
            HtfLocation::Support => {
                if inputs.dominant_trend == Trend::Bullish {
                    cont *= 1.05;
                    pull *= 1.10;
                    fail *= 0.90;
                } else {
                    cont *= 0.90;
                    pull *= 0.95;
                    fail *= 1.15;
                }
            }
            HtfLocation::Mid | HtfLocation::Unknown => {}
        }

        // Overextension always raises the mean-reversion leg
        if inputs.is_unstable {
            pull *= 1.20;
            cont *= 0.85;
        }

        // Range-bound dominant trend elevates breakout/breakdown
        if inputs.dominant_trend == Trend::Sideways {
            cont *= 0.80;
            fail *= 1.25;
        }

        // Normalize, then pin the sum to exactly 1.00 through the failure leg
        let total = cont + pull + fail;
        cont = round2(cont / total);
        pull = round2(pull / total);
        fail = round2(1.0 - cont - pull);

        let sum = cont + pull + fail;
        let mut forced_correction = false;
        if (sum - 1.0).abs() > 0.01 {
            warn!(sum, "probability sum validation failed, forcing correction");
            fail = round2(1.0 - cont - pull);
            forced_correction = true;
        }

        let active_state = determine_active_state(cont, pull, fail, inputs);
        let reasoning = generate_reasoning(cont, pull, fail, inputs);
        let sum_check = round2(cont + pull + fail);

        ProbabilityResult {
            p_continuation: cont,
            p_pullback: pull,
            p_failure: fail,
            active_state,
            reasoning,
            validation: ProbabilityValidation {
                sum_check,
                consistent: (sum_check - 1.0).abs() <= 0.01,
                forced_correction,
            },
        }
    }

    /// Flag probability assignments that contradict structure. Non-fatal.
    pub fn validate_consistency(
        &self,
        result: &ProbabilityResult,
        inputs: &ScenarioInputs<'_>,
    ) -> Vec<ConsistencyFlag> {
        let mut flags = Vec::new();

        if result.p_continuation > 0.60 && inputs.dominant_trend == Trend::Bullish {
            if let (Some(price), Some(first_support)) =
                (inputs.current_price, inputs.htf_support.first())
            {
                if price < *first_support {
                    flags.push(ConsistencyFlag {
                        kind: ConsistencyFlagKind::Contradiction,
                        message: format!(
                            "High continuation probability ({:.2}) but price below HTF support",
                            result.p_continuation
                        ),
                    });
                }
            }
        }

        if result.p_failure > 0.50 && inputs.alignment == Alignment::Full {
            flags.push(ConsistencyFlag {
                kind: ConsistencyFlagKind::Warning,
                message: format!(
                    "High failure probability ({:.2}) despite full alignment",
                    result.p_failure
                ),
            });
        }

        if result.max_probability() > OVERCONFIDENCE_CAP {
            flags.push(ConsistencyFlag {
                kind: ConsistencyFlagKind::Overconfidence,
                message: format!(
                    "Scenario probability too high ({:.2}) - markets are uncertain",
                    result.max_probability()
                ),
            });
        }

        flags
    }
}

fn determine_active_state(
    cont: f64,
    pull: f64,
    fail: f64,
    inputs: &ScenarioInputs<'_>,
) -> ActiveState {
    if inputs.alignment == Alignment::Conflict {
        return ActiveState::ConflictState;
    }
    if inputs.is_unstable && inputs.alignment == Alignment::Unstable {
        return ActiveState::ConflictState;
    }
    // Ties resolve continuation > pullback > failure
    if cont >= pull && cont >= fail {
        ActiveState::Continuation
    } else if pull >= fail {
        ActiveState::Pullback
    } else {
        ActiveState::Failure
    }
}

fn generate_reasoning(cont: f64, pull: f64, fail: f64, inputs: &ScenarioInputs<'_>) -> ScenarioReasoning {
    let trend = inputs.dominant_trend;
    let alignment_lower = inputs.alignment.label().to_lowercase();

    let continuation = if cont >= 0.45 {
        format!("HTF trend {trend} and aligned; no structural break signaled")
    } else if cont >= 0.30 {
        format!("HTF trend {trend} intact but alignment weakening")
    } else {
        format!("Continuation probability reduced due to {alignment_lower} state")
    };

    let pullback = if inputs.is_unstable {
        "Price overextended near boundary; mean reversion risk elevated".to_string()
    } else if inputs.htf_location == HtfLocation::Resistance {
        "Price near HTF resistance; pullback zone approaching".to_string()
    } else if pull >= 0.45 {
        format!("Alignment {alignment_lower} suggests rotation likely")
    } else {
        format!("Standard pullback probability within {trend} structure")
    };

    let failure = if fail >= 0.40 {
        "Conflicting timeframes elevate regime change risk".to_string()
    } else if inputs.htf_location == HtfLocation::Support && trend == Trend::Bearish {
        "HTF support test increases breakdown probability".to_string()
    } else if trend == Trend::Sideways {
        "Range boundaries create breakout/breakdown potential".to_string()
    } else {
        "No HTF breakdown signaled; failure probability remains baseline".to_string()
    };

    ScenarioReasoning {
        continuation,
        pullback,
        failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(
        alignment: Alignment,
        is_unstable: bool,
        trend: Trend,
        location: HtfLocation,
    ) -> ScenarioInputs<'static> {
        ScenarioInputs {
            alignment,
            is_unstable,
            dominant_trend: trend,
            htf_location: location,
            current_price: None,
            htf_support: &[],
            htf_resistance: &[],
        }
    }

    fn sum(result: &ProbabilityResult) -> f64 {
        result.p_continuation + result.p_pullback + result.p_failure
    }

    #[test]
    fn test_full_alignment_stable_mid_baseline() {
        let calc = ScenarioProbabilityCalculator::new();
        let result = calc.calculate(&inputs(
            Alignment::Full,
            false,
            Trend::Bullish,
            HtfLocation::Mid,
        ));
        assert_eq!(result.p_continuation, 0.50);
        assert_eq!(result.p_pullback, 0.30);
        assert_eq!(result.p_failure, 0.20);
        assert_eq!(result.active_state, ActiveState::Continuation);
        assert!(result.validation.consistent);
    }

    #[test]
    fn test_conflict_base_probabilities_and_state() {
        let calc = ScenarioProbabilityCalculator::new();
        let result = calc.calculate(&inputs(
            Alignment::Conflict,
            false,
            Trend::Bullish,
            HtfLocation::Mid,
        ));
        assert_eq!(result.p_continuation, 0.25);
        assert_eq!(result.p_pullback, 0.35);
        assert_eq!(result.p_failure, 0.40);
        assert_eq!(result.active_state, ActiveState::ConflictState);
    }

    #[test]
    fn test_unstable_alignment_is_conflict_state() {
        let calc = ScenarioProbabilityCalculator::new();
        let result = calc.calculate(&inputs(
            Alignment::Unstable,
            true,
            Trend::Bullish,
            HtfLocation::Resistance,
        ));
        assert_eq!(result.active_state, ActiveState::ConflictState);
    }

    #[test]
    fn test_full_unstable_prefers_pullback() {
        let calc = ScenarioProbabilityCalculator::new();
        let result = calc.calculate(&inputs(
            Alignment::Full,
            true,
            Trend::Bullish,
            HtfLocation::Mid,
        ));
        assert_eq!(result.active_state, ActiveState::Pullback);
        assert!(result.p_pullback > result.p_continuation);
    }

    #[test]
    fn test_resistance_reduces_continuation() {
        let calc = ScenarioProbabilityCalculator::new();
        let mid = calc.calculate(&inputs(Alignment::Full, false, Trend::Bullish, HtfLocation::Mid));
        let near = calc.calculate(&inputs(
            Alignment::Full,
            false,
            Trend::Bullish,
            HtfLocation::Resistance,
        ));
        assert!(near.p_continuation < mid.p_continuation);
        assert!(near.p_pullback > mid.p_pullback);
    }

    #[test]
    fn test_support_direction_depends_on_trend() {
        let calc = ScenarioProbabilityCalculator::new();
        let bullish = calc.calculate(&inputs(
            Alignment::Partial,
            false,
            Trend::Bullish,
            HtfLocation::Support,
        ));
        let bearish = calc.calculate(&inputs(
            Alignment::Partial,
            false,
            Trend::Bearish,
            HtfLocation::Support,
        ));
        assert!(bullish.p_failure < bearish.p_failure);
    }

    #[test]
    fn test_unknown_location_is_a_noop() {
        let calc = ScenarioProbabilityCalculator::new();
        let mid = calc.calculate(&inputs(Alignment::Full, false, Trend::Bullish, HtfLocation::Mid));
        let unknown = calc.calculate(&inputs(
            Alignment::Full,
            false,
            Trend::Bullish,
            HtfLocation::Unknown,
        ));
        assert_eq!(mid.p_continuation, unknown.p_continuation);
        assert_eq!(mid.p_pullback, unknown.p_pullback);
        assert_eq!(mid.p_failure, unknown.p_failure);
    }

    #[test]
    fn test_sum_is_always_one() {
        let calc = ScenarioProbabilityCalculator::new();
        for alignment in [
            Alignment::Full,
            Alignment::Partial,
            Alignment::Unstable,
            Alignment::Conflict,
        ] {
            for unstable in [false, true] {
                for trend in [Trend::Bullish, Trend::Bearish, Trend::Sideways] {
                    for location in [
                        HtfLocation::Support,
                        HtfLocation::Mid,
                        HtfLocation::Resistance,
                        HtfLocation::Unknown,
                    ] {
                        let result =
                            calc.calculate(&inputs(alignment, unstable, trend, location));
                        assert!(
                            (sum(&result) - 1.0).abs() <= 0.01,
                            "sum drifted for {alignment:?}/{unstable}/{trend:?}/{location:?}: {}",
                            sum(&result)
                        );
                        assert!(result.validation.consistent);
                    }
                }
            }
        }
    }

    #[test]
    fn test_no_probability_exceeds_cap_without_flag() {
        let calc = ScenarioProbabilityCalculator::new();
        for alignment in [
            Alignment::Full,
            Alignment::Partial,
            Alignment::Unstable,
            Alignment::Conflict,
        ] {
            for trend in [Trend::Bullish, Trend::Bearish, Trend::Sideways] {
                let input = inputs(alignment, false, trend, HtfLocation::Mid);
                let result = calc.calculate(&input);
                if result.max_probability() > OVERCONFIDENCE_CAP {
                    let flags = calc.validate_consistency(&result, &input);
                    assert!(flags
                        .iter()
                        .any(|f| f.kind == ConsistencyFlagKind::Overconfidence));
                }
            }
        }
    }

    #[test]
    fn test_contradiction_flag_below_support() {
        let calc = ScenarioProbabilityCalculator::new();
        let support = [100.0];
        let input = ScenarioInputs {
            alignment: Alignment::Full,
            is_unstable: false,
            dominant_trend: Trend::Bullish,
            htf_location: HtfLocation::Mid,
            current_price: Some(95.0),
            htf_support: &support,
            htf_resistance: &[],
        };
        let mut result = calc.calculate(&input);
        result.p_continuation = 0.65; // forced for the check
        let flags = calc.validate_consistency(&result, &input);
        assert!(flags
            .iter()
            .any(|f| f.kind == ConsistencyFlagKind::Contradiction));
    }

    #[test]
    fn test_warning_flag_high_failure_under_full_alignment() {
        let calc = ScenarioProbabilityCalculator::new();
        let input = inputs(Alignment::Full, false, Trend::Bullish, HtfLocation::Mid);
        let mut result = calc.calculate(&input);
        result.p_failure = 0.55;
        let flags = calc.validate_consistency(&result, &input);
        assert!(flags.iter().any(|f| f.kind == ConsistencyFlagKind::Warning));
    }

    #[test]
    fn test_continuation_reasoning_thresholds() {
        let calc = ScenarioProbabilityCalculator::new();
        let aligned = calc.calculate(&inputs(
            Alignment::Full,
            false,
            Trend::Bullish,
            HtfLocation::Mid,
        ));
        assert!(aligned
            .reasoning
            .continuation
            .contains("no structural break signaled"));

        let conflicted = calc.calculate(&inputs(
            Alignment::Conflict,
            false,
            Trend::Bullish,
            HtfLocation::Mid,
        ));
        assert!(conflicted.reasoning.continuation.contains("reduced due to conflict state"));
    }
}
