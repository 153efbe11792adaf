use serde::{Deserialize, Serialize};
use std::fmt;

/// Source of a perception claim.
///
/// The weights encode the trust hierarchy: DOM numeric data is
/// authoritative, VLM output is advisory and never exceeds 0.60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSource {
    DomNumeric,
    DomText,
    VlmPattern,
    VlmLevel,
    VlmSentiment,
    Inferred,
}

impl ClaimSource {
    pub fn trust_weight(&self) -> f64 {
        match self {
            ClaimSource::DomNumeric => 0.95,
            ClaimSource::DomText => 0.85,
            ClaimSource::VlmPattern => 0.60,
            ClaimSource::VlmSentiment => 0.55,
            ClaimSource::VlmLevel => 0.40,
            ClaimSource::Inferred => 0.30,
        }
    }

    /// Tie-break rank when two claims carry equal confidence
    pub fn priority(&self) -> u8 {
        match self {
            ClaimSource::DomNumeric => 5,
            ClaimSource::DomText => 4,
            ClaimSource::VlmPattern => 3,
            ClaimSource::VlmSentiment => 2,
            ClaimSource::VlmLevel => 1,
            ClaimSource::Inferred => 0,
        }
    }

    pub fn is_dom(&self) -> bool {
        matches!(self, ClaimSource::DomNumeric | ClaimSource::DomText)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimSource::DomNumeric => "dom_numeric",
            ClaimSource::DomText => "dom_text",
            ClaimSource::VlmPattern => "vlm_pattern",
            ClaimSource::VlmLevel => "vlm_level",
            ClaimSource::VlmSentiment => "vlm_sentiment",
            ClaimSource::Inferred => "inferred",
        }
    }
}

/// The fixed dimension vocabulary claims are grouped under.
///
/// Declaration order drives report ordering, so keep it stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Price,
    Change,
    Rsi,
    Macd,
    Trend,
    Structure,
    Momentum,
    MomentumCondition,
    Support,
    Resistance,
    Volume,
    VolumeTrend,
    CandlestickPattern,
    ChartPattern,
}

impl Dimension {
    /// Visual dimensions prefer the VLM claim; everything else prefers DOM.
    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            Dimension::Trend
                | Dimension::Structure
                | Dimension::CandlestickPattern
                | Dimension::ChartPattern
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Price => "price",
            Dimension::Change => "change",
            Dimension::Rsi => "rsi",
            Dimension::Macd => "macd",
            Dimension::Trend => "trend",
            Dimension::Structure => "structure",
            Dimension::Momentum => "momentum",
            Dimension::MomentumCondition => "momentum_condition",
            Dimension::Support => "support",
            Dimension::Resistance => "resistance",
            Dimension::Volume => "volume",
            Dimension::VolumeTrend => "volume_trend",
            Dimension::CandlestickPattern => "candlestick_pattern",
            Dimension::ChartPattern => "chart_pattern",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Claimed value, numeric or textual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Number(f64),
    Text(String),
}

impl ClaimValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ClaimValue::Number(n) => Some(*n),
            ClaimValue::Text(t) => analysis_core::parse_numeric(t),
        }
    }

    pub fn as_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimValue::Number(n) => write!(f, "{n}"),
            ClaimValue::Text(t) => write!(f, "{t}"),
        }
    }
}

/// A single claim about the market from one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionClaim {
    pub dimension: Dimension,
    pub value: ClaimValue,
    pub source: ClaimSource,
    pub confidence: f64,
    pub raw_text: String,
}

impl PerceptionClaim {
    pub fn new(
        dimension: Dimension,
        value: ClaimValue,
        source: ClaimSource,
        raw_text: impl Into<String>,
    ) -> PerceptionClaim {
        PerceptionClaim {
            dimension,
            value,
            source,
            confidence: source.trust_weight(),
            raw_text: raw_text.into(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> PerceptionClaim {
        self.confidence = confidence;
        self
    }
}

/// How serious a DOM/VLM disagreement is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl ConflictSeverity {
    /// Confidence penalty applied per conflict
    pub fn penalty(&self) -> f64 {
        match self {
            ConflictSeverity::Critical => 0.15,
            ConflictSeverity::High => 0.10,
            ConflictSeverity::Medium => 0.05,
            ConflictSeverity::Low | ConflictSeverity::None => 0.0,
        }
    }

    /// Marker used in the conflict brief
    pub fn icon(&self) -> &'static str {
        match self {
            ConflictSeverity::Critical => "!!",
            ConflictSeverity::High => "!",
            ConflictSeverity::Medium => "~",
            ConflictSeverity::Low => ".",
            ConflictSeverity::None => "?",
        }
    }
}

/// A detected conflict between DOM and VLM claims on one dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub dimension: Dimension,
    pub dom_claim: Option<PerceptionClaim>,
    pub vlm_claim: Option<PerceptionClaim>,
    pub severity: ConflictSeverity,
    pub resolution: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlm_trust_never_exceeds_dom() {
        for vlm in [
            ClaimSource::VlmPattern,
            ClaimSource::VlmSentiment,
            ClaimSource::VlmLevel,
        ] {
            assert!(vlm.trust_weight() <= 0.60);
            assert!(vlm.trust_weight() < ClaimSource::DomText.trust_weight());
        }
    }

    #[test]
    fn test_source_priority_matches_trust_order() {
        assert!(ClaimSource::DomNumeric.priority() > ClaimSource::DomText.priority());
        assert!(ClaimSource::DomText.priority() > ClaimSource::VlmPattern.priority());
        assert!(ClaimSource::VlmPattern.priority() > ClaimSource::VlmSentiment.priority());
        assert!(ClaimSource::VlmSentiment.priority() > ClaimSource::VlmLevel.priority());
        assert!(ClaimSource::VlmLevel.priority() > ClaimSource::Inferred.priority());
    }

    #[test]
    fn test_visual_dimensions() {
        assert!(Dimension::Trend.is_visual());
        assert!(Dimension::ChartPattern.is_visual());
        assert!(!Dimension::Rsi.is_visual());
        assert!(!Dimension::Support.is_visual());
    }

    #[test]
    fn test_severity_penalties() {
        assert_eq!(ConflictSeverity::Critical.penalty(), 0.15);
        assert_eq!(ConflictSeverity::High.penalty(), 0.10);
        assert_eq!(ConflictSeverity::Medium.penalty(), 0.05);
        assert_eq!(ConflictSeverity::Low.penalty(), 0.0);
    }
}
