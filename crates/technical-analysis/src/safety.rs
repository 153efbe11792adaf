//! Trading-language rejection.

use analysis_core::{AgentError, Analysis};
use tracing::warn;

/// Phrases that mark a record as a trading instruction rather than a
/// structural description. Presence anywhere in the serialized record
/// blocks downstream use.
const FORBIDDEN_PHRASES: &[&str] = &[
    "buy now",
    "sell now",
    "execute trade",
    "place order",
    "market order",
    "limit order",
    "stop loss",
    "take profit",
];

pub fn validate_no_trading_language(analysis: &Analysis) -> Result<(), AgentError> {
    let serialized = serde_json::to_string(analysis)
        .map_err(|e| AgentError::Synthesis(format!("failed to serialize analysis: {e}")))?
        .to_lowercase();

    if let Some(phrase) = FORBIDDEN_PHRASES.iter().find(|p| serialized.contains(*p)) {
        warn!(symbol = %analysis.symbol, phrase, "analysis contains forbidden phrase");
        return Err(AgentError::SafetyRejection(format!(
            "analysis contains forbidden phrase: {phrase}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Structure, Timeframe, Trend};
    use chrono::Utc;

    fn analysis(bias: &str) -> Analysis {
        Analysis {
            symbol: "TCS".to_string(),
            timeframe: Timeframe::Daily,
            timestamp: Utc::now(),
            trend: Trend::Bullish,
            structure: Structure::HigherHighs,
            support: vec![3900.0],
            resistance: vec![4100.0],
            momentum: "moderate bullish".to_string(),
            momentum_condition: "expanding".to_string(),
            volume_trend: "increasing".to_string(),
            candlestick_pattern: "none".to_string(),
            price: Some(4000.0),
            reasoning: "Structure remains constructive.".to_string(),
            bias: bias.to_string(),
            key_levels: "3900 / 4100".to_string(),
            perception_confidence: None,
            perception_completeness: None,
            perception_conflicts: 0,
            critical_conflict: false,
            validation_warnings: Vec::new(),
        }
    }

    #[test]
    fn test_clean_record_passes() {
        assert!(validate_no_trading_language(&analysis("Watch 4100 for validation")).is_ok());
    }

    #[test]
    fn test_trading_phrase_rejects() {
        let err =
            validate_no_trading_language(&analysis("Buy now with a stop loss at 3900")).unwrap_err();
        assert!(matches!(err, AgentError::SafetyRejection(_)));
    }
}
