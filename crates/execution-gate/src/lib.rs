//! Structural execution gate.
//!
//! Five independent binary predicates over the aggregated analysis state.
//! Execution is ALLOWED only when every gate passes, and the permission is
//! valid for exactly one decision cycle. The gate grants no trading
//! authority; it is a pure classifier consumed by the verdict composer and
//! the scanner's ranking.

mod logger;

pub use logger::GateLog;

use analysis_core::{ActiveState, Alignment, HtfLocation, Trend};
use chrono::{DateTime, Utc};
use scenario_probability::ProbabilityResult;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Permission lifetime markers
pub const VALID_FOR: &str = "ONE_DECISION_CYCLE";
pub const EXPIRES_AFTER: &str = "next_structure_change";

/// Default ceiling on the failure probability for the regime risk gate
pub const DEFAULT_REGIME_RISK_CEILING: f64 = 0.35;

/// Ceiling above which any probability reads as overconfident
pub const OVERCONFIDENCE_CEILING: f64 = 0.70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    Pass,
    Fail,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Pass => "PASS",
            GateStatus::Fail => "FAIL",
        }
    }

    fn from(pass: bool) -> GateStatus {
        if pass {
            GateStatus::Pass
        } else {
            GateStatus::Fail
        }
    }
}

/// Per-gate results in evaluation order
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateResults {
    pub alignment: GateStatus,
    pub dominance: GateStatus,
    pub regime_risk: GateStatus,
    pub structural_location: GateStatus,
    pub overconfidence: GateStatus,
}

impl GateResults {
    pub fn all_pass(&self) -> bool {
        self.as_pairs().iter().all(|(_, s)| *s == GateStatus::Pass)
    }

    /// Named pairs using the stable gate identifiers
    pub fn as_pairs(&self) -> [(&'static str, GateStatus); 5] {
        [
            ("Gate-1_Alignment", self.alignment),
            ("Gate-2_Dominance", self.dominance),
            ("Gate-3_RegimeRisk", self.regime_risk),
            ("Gate-4_StructuralLocation", self.structural_location),
            ("Gate-5_Overconfidence", self.overconfidence),
        ]
    }

    fn all_fail() -> GateResults {
        GateResults {
            alignment: GateStatus::Fail,
            dominance: GateStatus::Fail,
            regime_risk: GateStatus::Fail,
            structural_location: GateStatus::Fail,
            overconfidence: GateStatus::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Allowed,
    Blocked,
}

impl PermissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionStatus::Allowed => "ALLOWED",
            PermissionStatus::Blocked => "BLOCKED",
        }
    }
}

/// Advisory execution permission for one decision cycle
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPermission {
    pub status: PermissionStatus,
    pub reasons: Vec<String>,
    pub valid_for: &'static str,
    pub expires_after: &'static str,
}

/// One full gate evaluation
#[derive(Debug, Clone, Serialize)]
pub struct GateEvaluation {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub gates: GateResults,
    pub permission: ExecutionPermission,
}

impl GateEvaluation {
    pub fn is_allowed(&self) -> bool {
        self.permission.status == PermissionStatus::Allowed
    }
}

/// Inputs to one gate evaluation
#[derive(Debug, Clone)]
pub struct GateInputs<'a> {
    pub symbol: &'a str,
    pub alignment: Alignment,
    pub is_unstable: bool,
    pub probabilities: Option<&'a ProbabilityResult>,
    pub current_price: Option<f64>,
    pub htf_support: &'a [f64],
    pub htf_resistance: &'a [f64],
    pub htf_location: HtfLocation,
    pub dominant_trend: Trend,
}

/// Five-predicate execution gate
#[derive(Debug)]
pub struct ExecutionGate {
    regime_risk_ceiling: f64,
}

impl Default for ExecutionGate {
    fn default() -> Self {
        Self::new(DEFAULT_REGIME_RISK_CEILING)
    }
}

impl ExecutionGate {
    pub fn new(regime_risk_ceiling: f64) -> ExecutionGate {
        ExecutionGate {
            regime_risk_ceiling,
        }
    }

    pub fn evaluate(&self, inputs: &GateInputs<'_>) -> GateEvaluation {
        let timestamp = Utc::now();

        // Incomplete inputs never grant permission
        let probabilities = match inputs.probabilities {
            Some(p) => p,
            None => {
                return GateEvaluation {
                    symbol: inputs.symbol.to_string(),
                    timestamp,
                    gates: GateResults::all_fail(),
                    permission: ExecutionPermission {
                        status: PermissionStatus::Blocked,
                        reasons: vec!["INSUFFICIENT_DATA".to_string()],
                        valid_for: VALID_FOR,
                        expires_after: EXPIRES_AFTER,
                    },
                };
            }
        };

        let mut reasons = Vec::new();

        // Gate 1: aligned structure, not overextended
        let alignment_pass = inputs.alignment.is_aligned() && !inputs.is_unstable;
        if !alignment_pass {
            reasons.push(format!(
                "Alignment gate: {} (unstable={})",
                inputs.alignment, inputs.is_unstable
            ));
        }

        // Gate 2: active scenario must carry at least even odds
        let dominance_pass = probabilities
            .active_probability()
            .map_or(false, |p| p >= 0.50);
        if !dominance_pass {
            reasons.push(format!(
                "Dominance gate: active scenario {} below 0.50",
                probabilities.active_state
            ));
        }

        // Gate 3: regime change risk within the configured ceiling
        let regime_pass = probabilities.p_failure < self.regime_risk_ceiling;
        if !regime_pass {
            reasons.push(format!(
                "Regime risk gate: P(failure)={:.2} >= {:.2}",
                probabilities.p_failure, self.regime_risk_ceiling
            ));
        }

        // Gate 4: active scenario must not sit at the wrong HTF extreme
        let location_pass = structural_location_pass(
            probabilities.active_state,
            inputs.htf_location,
            inputs.dominant_trend,
        );
        if !location_pass {
            reasons.push(format!(
                "Structural location gate: {} active at HTF {}",
                probabilities.active_state, inputs.htf_location
            ));
        }

        // Gate 5: no probability may read as certainty
        let overconfidence_pass = probabilities.max_probability() <= OVERCONFIDENCE_CEILING;
        if !overconfidence_pass {
            reasons.push(format!(
                "Overconfidence gate: max probability {:.2} > {:.2}",
                probabilities.max_probability(),
                OVERCONFIDENCE_CEILING
            ));
        }

        let gates = GateResults {
            alignment: GateStatus::from(alignment_pass),
            dominance: GateStatus::from(dominance_pass),
            regime_risk: GateStatus::from(regime_pass),
            structural_location: GateStatus::from(location_pass),
            overconfidence: GateStatus::from(overconfidence_pass),
        };

        let status = if gates.all_pass() {
            PermissionStatus::Allowed
        } else {
            PermissionStatus::Blocked
        };

        info!(
            symbol = inputs.symbol,
            status = status.as_str(),
            reasons = reasons.len(),
            "execution gate evaluated"
        );

        GateEvaluation {
            symbol: inputs.symbol.to_string(),
            timestamp,
            gates,
            permission: ExecutionPermission {
                status,
                reasons,
                valid_for: VALID_FOR,
                expires_after: EXPIRES_AFTER,
            },
        }
    }
}

/// A continuation scenario pressed against the dominant boundary it would
/// have to break is structurally mislocated.
fn structural_location_pass(
    active: ActiveState,
    location: HtfLocation,
    trend: Trend,
) -> bool {
    match active {
        ActiveState::Continuation => !matches!(
            (location, trend),
            (HtfLocation::Resistance, Trend::Bullish)
                | (HtfLocation::Resistance, Trend::Sideways)
                | (HtfLocation::Support, Trend::Bearish)
        ),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_probability::{ScenarioInputs, ScenarioProbabilityCalculator};

    fn probabilities(
        alignment: Alignment,
        is_unstable: bool,
        trend: Trend,
        location: HtfLocation,
    ) -> ProbabilityResult {
        ScenarioProbabilityCalculator::new().calculate(&ScenarioInputs {
            alignment,
            is_unstable,
            dominant_trend: trend,
            htf_location: location,
            current_price: None,
            htf_support: &[],
            htf_resistance: &[],
        })
    }

    fn inputs<'a>(
        alignment: Alignment,
        is_unstable: bool,
        probs: &'a ProbabilityResult,
        location: HtfLocation,
        trend: Trend,
    ) -> GateInputs<'a> {
        GateInputs {
            symbol: "YESBANK",
            alignment,
            is_unstable,
            probabilities: Some(probs),
            current_price: Some(100.0),
            htf_support: &[],
            htf_resistance: &[],
            htf_location: location,
            dominant_trend: trend,
        }
    }

    #[test]
    fn test_baseline_full_alignment_allows() {
        let probs = probabilities(Alignment::Full, false, Trend::Bullish, HtfLocation::Mid);
        let evaluation = ExecutionGate::default().evaluate(&inputs(
            Alignment::Full,
            false,
            &probs,
            HtfLocation::Mid,
            Trend::Bullish,
        ));
        assert!(evaluation.gates.all_pass());
        assert!(evaluation.is_allowed());
        assert!(evaluation.permission.reasons.is_empty());
        assert_eq!(evaluation.permission.valid_for, "ONE_DECISION_CYCLE");
        assert_eq!(evaluation.permission.expires_after, "next_structure_change");
    }

    #[test]
    fn test_conflict_alignment_fails_alignment_gate() {
        let probs = probabilities(Alignment::Conflict, false, Trend::Bullish, HtfLocation::Mid);
        let evaluation = ExecutionGate::default().evaluate(&inputs(
            Alignment::Conflict,
            false,
            &probs,
            HtfLocation::Mid,
            Trend::Bullish,
        ));
        assert_eq!(evaluation.gates.alignment, GateStatus::Fail);
        // Conflict state has no active probability, dominance fails too
        assert_eq!(evaluation.gates.dominance, GateStatus::Fail);
        // P(failure)=0.40 breaches the default ceiling
        assert_eq!(evaluation.gates.regime_risk, GateStatus::Fail);
        assert!(!evaluation.is_allowed());
        assert!(!evaluation.permission.reasons.is_empty());
    }

    #[test]
    fn test_unstable_fails_alignment_gate() {
        let probs = probabilities(Alignment::Full, true, Trend::Bullish, HtfLocation::Mid);
        let evaluation = ExecutionGate::default().evaluate(&inputs(
            Alignment::Full,
            true,
            &probs,
            HtfLocation::Mid,
            Trend::Bullish,
        ));
        assert_eq!(evaluation.gates.alignment, GateStatus::Fail);
        assert!(!evaluation.is_allowed());
    }

    #[test]
    fn test_continuation_at_resistance_fails_location_gate() {
        let mut probs = probabilities(Alignment::Full, false, Trend::Bullish, HtfLocation::Mid);
        probs.active_state = ActiveState::Continuation;
        let evaluation = ExecutionGate::default().evaluate(&inputs(
            Alignment::Full,
            false,
            &probs,
            HtfLocation::Resistance,
            Trend::Bullish,
        ));
        assert_eq!(evaluation.gates.structural_location, GateStatus::Fail);
        assert!(!evaluation.is_allowed());
    }

    #[test]
    fn test_pullback_at_resistance_passes_location_gate() {
        let probs = probabilities(Alignment::Full, true, Trend::Bullish, HtfLocation::Mid);
        assert_eq!(probs.active_state, ActiveState::Pullback);
        let evaluation = ExecutionGate::default().evaluate(&inputs(
            Alignment::Full,
            true,
            &probs,
            HtfLocation::Resistance,
            Trend::Bullish,
        ));
        assert_eq!(evaluation.gates.structural_location, GateStatus::Pass);
    }

    #[test]
    fn test_missing_probabilities_blocks_with_insufficient_data() {
        let evaluation = ExecutionGate::default().evaluate(&GateInputs {
            symbol: "TCS",
            alignment: Alignment::Full,
            is_unstable: false,
            probabilities: None,
            current_price: None,
            htf_support: &[],
            htf_resistance: &[],
            htf_location: HtfLocation::Mid,
            dominant_trend: Trend::Bullish,
        });
        assert!(!evaluation.is_allowed());
        assert_eq!(evaluation.permission.reasons, vec!["INSUFFICIENT_DATA"]);
    }

    #[test]
    fn test_overconfidence_gate() {
        let mut probs = probabilities(Alignment::Full, false, Trend::Bullish, HtfLocation::Mid);
        probs.p_continuation = 0.75;
        let evaluation = ExecutionGate::default().evaluate(&inputs(
            Alignment::Full,
            false,
            &probs,
            HtfLocation::Mid,
            Trend::Bullish,
        ));
        assert_eq!(evaluation.gates.overconfidence, GateStatus::Fail);
    }

    #[test]
    fn test_gate_pair_names_are_stable() {
        let probs = probabilities(Alignment::Full, false, Trend::Bullish, HtfLocation::Mid);
        let evaluation = ExecutionGate::default().evaluate(&inputs(
            Alignment::Full,
            false,
            &probs,
            HtfLocation::Mid,
            Trend::Bullish,
        ));
        let names: Vec<&str> = evaluation.gates.as_pairs().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "Gate-1_Alignment",
                "Gate-2_Dominance",
                "Gate-3_RegimeRisk",
                "Gate-4_StructuralLocation",
                "Gate-5_Overconfidence"
            ]
        );
    }
}
