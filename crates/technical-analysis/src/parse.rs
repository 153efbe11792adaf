//! Completion parsing and repair.

use analysis_core::{
    parse_numeric, AgentError, Analysis, DomSnapshot, Structure, Timeframe, Trend,
};
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

/// Substring scan mirrors the synthesis contract: these words may not
/// appear in the free-text fields.
const FORBIDDEN_WORDS: &[&str] = &[
    "trade", "trading", "entry", "exit", "position", "buy", "sell", "long", "short",
];

fn strip_code_fence(response: &str) -> String {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() <= 2 {
        return trimmed.to_string();
    }
    lines[1..lines.len() - 1].join("\n")
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Accepts numbers or numeric strings; anything else is dropped
fn level_list(value: &Value, key: &str) -> Vec<f64> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => parse_numeric(s),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse the completion into an `Analysis`, repairing missing fields with
/// conservative defaults and recording consistency violations as warnings.
pub fn parse_analysis(response: &str, dom: &DomSnapshot) -> Result<Analysis, AgentError> {
    let cleaned = strip_code_fence(response);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        AgentError::Synthesis(format!("completion was not structured JSON: {e}"))
    })?;

    let symbol = text_field(&value, "symbol")
        .or_else(|| dom.symbol.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let timeframe = text_field(&value, "timeframe")
        .and_then(|code| Timeframe::from_code(&code))
        .or(dom.timeframe)
        .unwrap_or(Timeframe::Daily);

    let trend = text_field(&value, "trend")
        .and_then(|t| Trend::parse(&t))
        .ok_or_else(|| {
            AgentError::Synthesis("trend missing or unrecognized after repair".to_string())
        })?;

    let structure = text_field(&value, "structure")
        .and_then(|s| Structure::parse(&s))
        .unwrap_or_else(|| Structure::from_trend(trend));

    let support = level_list(&value, "support");
    let resistance = level_list(&value, "resistance");

    let momentum = text_field(&value, "momentum").unwrap_or_else(|| "neutral".to_string());
    let momentum_condition =
        text_field(&value, "momentum_condition").unwrap_or_else(|| "neutral".to_string());
    let volume_trend =
        text_field(&value, "volume_trend").unwrap_or_else(|| "unavailable".to_string());
    let candlestick_pattern =
        text_field(&value, "candlestick_pattern").unwrap_or_else(|| "none".to_string());

    let price = value
        .get("price")
        .and_then(Value::as_f64)
        .or_else(|| dom.price_value());

    let reasoning = text_field(&value, "reasoning").unwrap_or_default();
    let bias = text_field(&value, "bias").unwrap_or_default();
    let key_levels = text_field(&value, "key_levels").unwrap_or_default();

    let mut analysis = Analysis {
        symbol,
        timeframe,
        timestamp: Utc::now(),
        trend,
        structure,
        support,
        resistance,
        momentum,
        momentum_condition,
        volume_trend,
        candlestick_pattern,
        price,
        reasoning,
        bias,
        key_levels,
        perception_confidence: None,
        perception_completeness: None,
        perception_conflicts: 0,
        critical_conflict: false,
        validation_warnings: Vec::new(),
    };

    analysis.validation_warnings = validate_consistency(&analysis);
    if !analysis.validation_warnings.is_empty() {
        warn!(
            symbol = %analysis.symbol,
            warnings = ?analysis.validation_warnings,
            "analysis consistency issues detected"
        );
    }

    Ok(analysis)
}

/// Ordering, vocabulary, and momentum-completeness checks. Violations are
/// retained on the record, not fatal.
fn validate_consistency(analysis: &Analysis) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(price) = analysis.price {
        if let Some(max_support) = analysis
            .support
            .iter()
            .copied()
            .fold(None::<f64>, |max, s| Some(max.map_or(s, |m| m.max(s))))
        {
            if max_support > price {
                warnings.push(format!(
                    "Support level ({max_support}) above current price ({price}) - illogical"
                ));
            }
        }
        if let Some(min_resistance) = analysis
            .resistance
            .iter()
            .copied()
            .fold(None::<f64>, |min, r| Some(min.map_or(r, |m| m.min(r))))
        {
            if min_resistance < price {
                warnings.push(format!(
                    "Resistance level ({min_resistance}) below current price ({price}) - illogical"
                ));
            }
        }
    }

    if !analysis.momentum.is_empty() && analysis.momentum_condition.is_empty() {
        warnings.push(
            "Momentum condition missing (must be: expanding/exhausting/improving/neutral)"
                .to_string(),
        );
    }

    for (field, text) in [
        ("reasoning", &analysis.reasoning),
        ("bias", &analysis.bias),
        ("key_levels", &analysis.key_levels),
    ] {
        let lower = text.to_lowercase();
        if let Some(word) = FORBIDDEN_WORDS.iter().find(|w| lower.contains(*w)) {
            warnings.push(format!(
                "Phase violation: '{word}' found in {field} (use 'monitor/observe/validate' instead)"
            ));
        }
    }

    warnings
}
