//! Deterministic brief rendering for LLM prompt injection.

use crate::claims::{Dimension, PerceptionClaim};
use crate::reconcile::ReconciliationReport;

fn trust_tag(confidence: f64) -> &'static str {
    if confidence >= 0.8 {
        "HIGH"
    } else if confidence >= 0.5 {
        "MEDIUM"
    } else {
        "LOW"
    }
}

fn push_fact_line(lines: &mut Vec<String>, dimension: Dimension, claim: &PerceptionClaim) {
    lines.push(format!(
        "  - {}: {} [trust={}, source={}]",
        dimension,
        claim.value,
        trust_tag(claim.confidence),
        claim.source.as_str()
    ));
}

fn push_section(
    lines: &mut Vec<String>,
    report: &ReconciliationReport,
    header: &str,
    dimensions: &[Dimension],
) {
    let facts: Vec<(Dimension, &PerceptionClaim)> = dimensions
        .iter()
        .filter_map(|d| report.facts.get(d).map(|c| (*d, c)))
        .collect();
    if facts.is_empty() {
        return;
    }
    lines.push(header.to_string());
    for (dimension, claim) in facts {
        push_fact_line(lines, dimension, claim);
    }
}

/// Evidence brief: facts grouped by category, tagged with trust and source
pub fn generate_evidence_brief(report: &ReconciliationReport) -> String {
    let mut lines = Vec::new();
    lines.push("RECONCILED PERCEPTION (trust-weighted from DOM + VLM):".to_string());
    lines.push(format!(
        "Overall Confidence: {:.0}%",
        report.overall_confidence * 100.0
    ));
    lines.push(format!(
        "Data Completeness: {:.0}%",
        report.completeness * 100.0
    ));
    lines.push(String::new());

    push_section(
        &mut lines,
        report,
        "DIRECTION:",
        &[Dimension::Trend, Dimension::Structure],
    );
    push_section(
        &mut lines,
        report,
        "MOMENTUM:",
        &[
            Dimension::Momentum,
            Dimension::MomentumCondition,
            Dimension::Rsi,
            Dimension::Macd,
        ],
    );

    // Key levels keep the winning claim's provenance inline
    let support = report.facts.get(&Dimension::Support);
    let resistance = report.facts.get(&Dimension::Resistance);
    if support.is_some() || resistance.is_some() {
        lines.push("KEY LEVELS:".to_string());
        if let Some(claim) = support {
            lines.push(format!(
                "  - support: {} [trust={}, {}]",
                claim.value,
                trust_tag(claim.confidence),
                claim.raw_text
            ));
        }
        if let Some(claim) = resistance {
            lines.push(format!(
                "  - resistance: {} [trust={}, {}]",
                claim.value,
                trust_tag(claim.confidence),
                claim.raw_text
            ));
        }
    }

    push_section(
        &mut lines,
        report,
        "VOLUME:",
        &[Dimension::Volume, Dimension::VolumeTrend],
    );
    push_section(
        &mut lines,
        report,
        "PATTERNS:",
        &[Dimension::CandlestickPattern, Dimension::ChartPattern],
    );

    lines.join("\n")
}

/// Conflict brief: one entry per conflict with severity icon and resolution
pub fn generate_conflict_brief(report: &ReconciliationReport) -> String {
    if report.conflicts.is_empty() {
        return "No conflicts detected between DOM and VLM observations.".to_string();
    }

    let mut lines = Vec::new();
    lines.push(format!("CONFLICTS DETECTED ({}):", report.conflicts.len()));
    for conflict in &report.conflicts {
        lines.push(format!(
            "  [{}] {}: {}",
            conflict.severity.icon(),
            conflict.dimension,
            conflict.detail
        ));
        lines.push(format!("      Resolution: {}", conflict.resolution));
    }
    lines.push(String::new());
    lines.push(
        "INSTRUCTION: Where conflicts exist, weight DOM numeric data higher than VLM visual impressions."
            .to_string(),
    );

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimSource, ClaimValue, ConflictRecord, ConflictSeverity};

    fn report_with_facts() -> ReconciliationReport {
        let mut report = ReconciliationReport::default();
        report.overall_confidence = 0.78;
        report.completeness = 0.67;
        report.facts.insert(
            Dimension::Trend,
            PerceptionClaim::new(
                Dimension::Trend,
                ClaimValue::Text("bullish".to_string()),
                ClaimSource::VlmSentiment,
                "strong uptrend",
            ),
        );
        report.facts.insert(
            Dimension::Support,
            PerceptionClaim::new(
                Dimension::Support,
                ClaimValue::Number(1400.0),
                ClaimSource::DomNumeric,
                "EMA 50=1400 (below price -> dynamic support)",
            ),
        );
        report
    }

    #[test]
    fn test_evidence_brief_sections() {
        let brief = generate_evidence_brief(&report_with_facts());
        assert!(brief.starts_with("RECONCILED PERCEPTION"));
        assert!(brief.contains("Overall Confidence: 78%"));
        assert!(brief.contains("DIRECTION:"));
        assert!(brief.contains("  - trend: bullish [trust=MEDIUM, source=vlm_sentiment]"));
        assert!(brief.contains("KEY LEVELS:"));
        assert!(brief.contains("support: 1400 [trust=HIGH, EMA 50=1400"));
        // No momentum facts, no section
        assert!(!brief.contains("MOMENTUM:"));
    }

    #[test]
    fn test_conflict_brief_empty_case() {
        let report = ReconciliationReport::default();
        assert_eq!(
            generate_conflict_brief(&report),
            "No conflicts detected between DOM and VLM observations."
        );
    }

    #[test]
    fn test_conflict_brief_lists_conflicts_with_icons() {
        let mut report = ReconciliationReport::default();
        report.conflicts.push(ConflictRecord {
            dimension: Dimension::MomentumCondition,
            dom_claim: None,
            vlm_claim: None,
            severity: ConflictSeverity::High,
            resolution: "DOM wins (RSI is numeric fact: RSI=72)".to_string(),
            detail: "DOM says 'exhausting' but VLM says 'expanding'".to_string(),
        });
        let brief = generate_conflict_brief(&report);
        assert!(brief.contains("CONFLICTS DETECTED (1):"));
        assert!(brief.contains("[!] momentum_condition:"));
        assert!(brief.contains("Resolution: DOM wins"));
        assert!(brief.ends_with(
            "INSTRUCTION: Where conflicts exist, weight DOM numeric data higher than VLM visual impressions."
        ));
    }
}
