//! Per-dimension fusion and conflict detection.

use std::collections::BTreeMap;

use analysis_core::DomSnapshot;
use tracing::info;

use crate::brief::{generate_conflict_brief, generate_evidence_brief};
use crate::claims::{ConflictRecord, ConflictSeverity, Dimension, PerceptionClaim};
use crate::dom::extract_dom_claims;
use crate::vlm::extract_vlm_claims;

/// Dimensions that must be covered for full completeness
const TARGET_DIMENSIONS: &[Dimension] = &[
    Dimension::Trend,
    Dimension::Momentum,
    Dimension::Support,
    Dimension::Resistance,
    Dimension::Volume,
    Dimension::Structure,
];

const LEVEL_DIVERGENCE_MEDIUM_PCT: f64 = 5.0;
const LEVEL_DIVERGENCE_HIGH_PCT: f64 = 15.0;
const CONFIDENCE_FLOOR: f64 = 0.10;

/// Complete reconciliation output; replaces raw DOM+VLM in the LLM prompt
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    /// Winning claim per dimension
    pub facts: BTreeMap<Dimension, PerceptionClaim>,
    pub conflicts: Vec<ConflictRecord>,
    pub overall_confidence: f64,
    pub completeness: f64,
    pub evidence_brief: String,
    pub conflict_brief: String,
}

impl ReconciliationReport {
    pub fn has_critical_conflicts(&self) -> bool {
        self.conflicts
            .iter()
            .any(|c| c.severity == ConflictSeverity::Critical)
    }

    pub fn has_high_conflicts(&self) -> bool {
        self.conflicts
            .iter()
            .any(|c| c.severity >= ConflictSeverity::High)
    }
}

/// Reconciles DOM and VLM observations into trust-weighted facts
#[derive(Debug, Default)]
pub struct PerceptionReconciler;

impl PerceptionReconciler {
    pub fn new() -> PerceptionReconciler {
        PerceptionReconciler
    }

    pub fn reconcile(&self, dom: &DomSnapshot, vlm_text: Option<&str>) -> ReconciliationReport {
        let dom_claims = extract_dom_claims(dom);
        let vlm_claims = vlm_text.map(extract_vlm_claims).unwrap_or_default();

        let mut dom_by_dim: BTreeMap<Dimension, Vec<PerceptionClaim>> = BTreeMap::new();
        for claim in dom_claims {
            dom_by_dim.entry(claim.dimension).or_default().push(claim);
        }
        let mut vlm_by_dim: BTreeMap<Dimension, Vec<PerceptionClaim>> = BTreeMap::new();
        for claim in vlm_claims {
            vlm_by_dim.entry(claim.dimension).or_default().push(claim);
        }

        let mut report = ReconciliationReport::default();

        let dimensions: Vec<Dimension> = dom_by_dim
            .keys()
            .chain(vlm_by_dim.keys())
            .copied()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        for dimension in dimensions {
            let dom_dim = dom_by_dim.get(&dimension).map(Vec::as_slice).unwrap_or(&[]);
            let vlm_dim = vlm_by_dim.get(&dimension).map(Vec::as_slice).unwrap_or(&[]);

            let winner = match (dom_dim.is_empty(), vlm_dim.is_empty()) {
                (false, false) => {
                    if let Some(conflict) = detect_conflict(dimension, dom_dim, vlm_dim) {
                        report.conflicts.push(conflict);
                    }
                    if dimension.is_visual() {
                        best_claim(vlm_dim)
                    } else {
                        best_claim(dom_dim)
                    }
                }
                (false, true) => best_claim(dom_dim),
                (true, false) => best_claim(vlm_dim),
                (true, true) => None,
            };

            if let Some(winner) = winner {
                report.facts.insert(dimension, winner.clone());
            }
        }

        let covered = TARGET_DIMENSIONS
            .iter()
            .filter(|d| report.facts.contains_key(d))
            .count();
        report.completeness = covered as f64 / TARGET_DIMENSIONS.len() as f64;

        let avg = if report.facts.is_empty() {
            0.0
        } else {
            report.facts.values().map(|c| c.confidence).sum::<f64>() / report.facts.len() as f64
        };
        let penalty: f64 = report.conflicts.iter().map(|c| c.severity.penalty()).sum();
        report.overall_confidence = (avg - penalty).clamp(CONFIDENCE_FLOOR, 1.0);

        report.evidence_brief = generate_evidence_brief(&report);
        report.conflict_brief = generate_conflict_brief(&report);

        info!(
            facts = report.facts.len(),
            conflicts = report.conflicts.len(),
            confidence = format!("{:.2}", report.overall_confidence),
            completeness = format!("{:.0}%", report.completeness * 100.0),
            "reconciliation complete"
        );

        report
    }
}

/// Highest-confidence claim; ties break by source priority, then by first
/// occurrence, keeping the result stable for identical inputs.
fn best_claim(claims: &[PerceptionClaim]) -> Option<&PerceptionClaim> {
    claims.iter().fold(None, |best: Option<&PerceptionClaim>, claim| match best {
        None => Some(claim),
        Some(current) => {
            let better = claim.confidence > current.confidence
                || (claim.confidence == current.confidence
                    && claim.source.priority() > current.source.priority());
            if better {
                Some(claim)
            } else {
                Some(current)
            }
        }
    })
}

fn detect_conflict(
    dimension: Dimension,
    dom_claims: &[PerceptionClaim],
    vlm_claims: &[PerceptionClaim],
) -> Option<ConflictRecord> {
    match dimension {
        Dimension::Trend => check_trend_conflict(dom_claims, vlm_claims),
        Dimension::MomentumCondition => check_momentum_conflict(dom_claims, vlm_claims),
        Dimension::Support | Dimension::Resistance => {
            check_level_conflict(dimension, dom_claims, vlm_claims)
        }
        _ => None,
    }
}

fn check_trend_conflict(
    dom_claims: &[PerceptionClaim],
    vlm_claims: &[PerceptionClaim],
) -> Option<ConflictRecord> {
    let dom_trend = dom_claims.first()?.value.as_text().to_lowercase();
    let vlm_trend = vlm_claims.first()?.value.as_text().to_lowercase();
    if dom_trend == vlm_trend {
        return None;
    }

    let opposite = matches!(
        (dom_trend.as_str(), vlm_trend.as_str()),
        ("bullish", "bearish") | ("bearish", "bullish")
    );
    let severity = if opposite {
        ConflictSeverity::Critical
    } else {
        ConflictSeverity::Medium
    };

    Some(ConflictRecord {
        dimension: Dimension::Trend,
        dom_claim: dom_claims.first().cloned(),
        vlm_claim: vlm_claims.first().cloned(),
        severity,
        resolution: format!("VLM trend '{vlm_trend}' preferred (visual pattern authority)"),
        detail: format!("DOM suggests '{dom_trend}' but VLM sees '{vlm_trend}'"),
    })
}

fn check_momentum_conflict(
    dom_claims: &[PerceptionClaim],
    vlm_claims: &[PerceptionClaim],
) -> Option<ConflictRecord> {
    let dom_claim = dom_claims.first()?;
    let vlm_claim = vlm_claims.first()?;
    let dom_condition = dom_claim.value.as_text().to_lowercase();
    let vlm_condition = vlm_claim.value.as_text().to_lowercase();

    let exhausting = ["exhausting", "overbought", "overextended"];
    let improving = ["improving", "oversold", "bottoming"];
    let expanding = ["expanding", "accelerating"];

    let word_of = |condition: &str, words: &[&str]| words.iter().any(|w| condition.contains(w));

    let contradiction = (word_of(&dom_condition, &exhausting) && word_of(&vlm_condition, &expanding))
        || (word_of(&dom_condition, &improving) && word_of(&vlm_condition, &exhausting));
    if !contradiction {
        return None;
    }

    Some(ConflictRecord {
        dimension: Dimension::MomentumCondition,
        dom_claim: Some(dom_claim.clone()),
        vlm_claim: Some(vlm_claim.clone()),
        severity: ConflictSeverity::High,
        resolution: format!("DOM wins (RSI is numeric fact: {})", dom_claim.raw_text),
        detail: format!(
            "DOM says '{dom_condition}' (from RSI/indicator) but VLM says '{vlm_condition}' \
             (visual impression). DOM numeric data is authoritative for momentum condition."
        ),
    })
}

fn check_level_conflict(
    dimension: Dimension,
    dom_claims: &[PerceptionClaim],
    vlm_claims: &[PerceptionClaim],
) -> Option<ConflictRecord> {
    let dom_levels: Vec<f64> = dom_claims.iter().filter_map(|c| c.value.as_number()).collect();
    let vlm_levels: Vec<f64> = vlm_claims.iter().filter_map(|c| c.value.as_number()).collect();
    if dom_levels.is_empty() || vlm_levels.is_empty() {
        return None;
    }

    let dom_avg = dom_levels.iter().sum::<f64>() / dom_levels.len() as f64;
    let vlm_avg = vlm_levels.iter().sum::<f64>() / vlm_levels.len() as f64;
    if dom_avg == 0.0 {
        return None;
    }

    let pct_diff = ((dom_avg - vlm_avg).abs() / dom_avg) * 100.0;
    if pct_diff <= LEVEL_DIVERGENCE_MEDIUM_PCT {
        return None;
    }
    let severity = if pct_diff < LEVEL_DIVERGENCE_HIGH_PCT {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::High
    };

    Some(ConflictRecord {
        dimension,
        dom_claim: dom_claims.first().cloned(),
        vlm_claim: vlm_claims.first().cloned(),
        severity,
        resolution: format!("DOM levels preferred (machine-read, {pct_diff:.1}% divergence)"),
        detail: format!(
            "DOM {dimension}: {dom_levels:?} vs VLM {dimension}: {vlm_levels:?} ({pct_diff:.1}% apart)"
        ),
    })
}
