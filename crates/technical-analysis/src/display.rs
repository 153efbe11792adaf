//! Structured point-by-point rendering of an analysis record.

use analysis_core::Analysis;

/// Render an analysis as the structured report shown in chat. No
/// paragraphs, no trade instructions.
pub fn format_analysis(analysis: &Analysis) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "MARKET ANALYSIS - {} ({})",
        analysis.symbol,
        analysis.timeframe.label()
    ));
    lines.push(String::new());

    lines.push("1. Trend".to_string());
    lines.push(format!("   - Direction: {}", capitalize(analysis.trend.as_str())));
    lines.push(format!("   - Structure: {}", analysis.structure));
    lines.push(String::new());

    lines.push("2. Momentum".to_string());
    lines.push(format!("   - Strength: {}", capitalize(&analysis.momentum)));
    lines.push(format!(
        "   - Condition: {}",
        capitalize(&analysis.momentum_condition)
    ));
    lines.push(String::new());

    lines.push("3. Volume".to_string());
    if analysis.volume_trend == "unavailable" {
        lines.push("   - Trend: Data unavailable".to_string());
    } else {
        let note = match analysis.volume_trend.as_str() {
            "increasing" => " ++ (confirming)",
            "decreasing" => " -- (weakening)",
            "spike" => " !! (climax/breakout)",
            "dry" => " .. (low interest)",
            _ => "",
        };
        lines.push(format!(
            "   - Trend: {}{note}",
            capitalize(&analysis.volume_trend)
        ));
    }
    lines.push(String::new());

    lines.push("4. Key Levels".to_string());
    if analysis.support.is_empty() {
        lines.push("   - Support: None identified".to_string());
    } else {
        lines.push("   - Support:".to_string());
        for level in &analysis.support {
            lines.push(format!("     * Rs {level}"));
        }
    }
    if analysis.resistance.is_empty() {
        lines.push("   - Resistance: None identified".to_string());
    } else {
        lines.push("   - Resistance:".to_string());
        for level in &analysis.resistance {
            lines.push(format!("     * Rs {level}"));
        }
    }
    lines.push(String::new());

    if analysis.candlestick_pattern != "none" && !analysis.candlestick_pattern.is_empty() {
        lines.push("5. Candlestick Pattern".to_string());
        lines.push(format!("   - {}", analysis.candlestick_pattern));
        lines.push(String::new());
    }

    lines.push("6. Context".to_string());
    if let Some(price) = analysis.price {
        lines.push(format!("   - Current Price: Rs {price}"));

        if !analysis.support.is_empty() && !analysis.resistance.is_empty() {
            let avg_support: f64 =
                analysis.support.iter().sum::<f64>() / analysis.support.len() as f64;
            let avg_resistance: f64 =
                analysis.resistance.iter().sum::<f64>() / analysis.resistance.len() as f64;
            let mid = (avg_support + avg_resistance) / 2.0;
            let location = if price > mid {
                "Near resistance"
            } else if price < mid {
                "Near support"
            } else {
                "Mid-range"
            };
            lines.push(format!("   - Price Location: {location}"));
        }
    }
    if !analysis.reasoning.is_empty() {
        lines.push(format!("   - Technical Setup: {}", analysis.reasoning));
    }
    lines.push(String::new());

    lines.push("7. Scenario Outlook (No trade instructions)".to_string());
    if analysis.bias.is_empty() {
        lines.push("   - Watch key levels for breakout/breakdown".to_string());
    } else {
        lines.push(format!("   - {}", analysis.bias));
    }
    lines.push(String::new());

    lines.push("---".to_string());
    lines.push("Educational analysis only. Not financial advice.".to_string());

    lines.join("\n")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Structure, Timeframe, Trend};
    use chrono::Utc;

    #[test]
    fn test_report_sections() {
        let analysis = Analysis {
            symbol: "YESBANK".to_string(),
            timeframe: Timeframe::Daily,
            timestamp: Utc::now(),
            trend: Trend::Bullish,
            structure: Structure::HigherHighs,
            support: vec![23.8],
            resistance: vec![25.1],
            momentum: "moderate bullish".to_string(),
            momentum_condition: "expanding".to_string(),
            volume_trend: "increasing".to_string(),
            candlestick_pattern: "hammer".to_string(),
            price: Some(24.5),
            reasoning: "Holding above support.".to_string(),
            bias: "Constructive while above 23.8.".to_string(),
            key_levels: "23.8 / 25.1".to_string(),
            perception_confidence: None,
            perception_completeness: None,
            perception_conflicts: 0,
            critical_conflict: false,
            validation_warnings: Vec::new(),
        };
        let report = format_analysis(&analysis);
        assert!(report.starts_with("MARKET ANALYSIS - YESBANK (Daily)"));
        assert!(report.contains("   - Direction: Bullish"));
        assert!(report.contains("     * Rs 23.8"));
        assert!(report.contains("5. Candlestick Pattern"));
        assert!(report.contains("   - Price Location: Near resistance"));
        assert!(report.ends_with("Educational analysis only. Not financial advice."));
    }

    #[test]
    fn test_report_without_volume_or_levels() {
        let analysis = Analysis {
            symbol: "TCS".to_string(),
            timeframe: Timeframe::Weekly,
            timestamp: Utc::now(),
            trend: Trend::Sideways,
            structure: Structure::RangeBound,
            support: Vec::new(),
            resistance: Vec::new(),
            momentum: "neutral".to_string(),
            momentum_condition: "neutral".to_string(),
            volume_trend: "unavailable".to_string(),
            candlestick_pattern: "none".to_string(),
            price: None,
            reasoning: String::new(),
            bias: String::new(),
            key_levels: String::new(),
            perception_confidence: None,
            perception_completeness: None,
            perception_conflicts: 0,
            critical_conflict: false,
            validation_warnings: Vec::new(),
        };
        let report = format_analysis(&analysis);
        assert!(report.contains("   - Trend: Data unavailable"));
        assert!(report.contains("   - Support: None identified"));
        assert!(report.contains("   - Watch key levels for breakout/breakdown"));
        assert!(!report.contains("5. Candlestick Pattern"));
    }
}
