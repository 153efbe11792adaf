//! Analysis prompt construction.

use analysis_core::{DomSnapshot, Timeframe};
use perception_reconciler::ReconciliationReport;

pub const SYSTEM_PROMPT: &str = "You are a professional technical analyst providing precise \
market analysis. Analyze charts accurately with specific support/resistance levels and clear \
trend identification.";

pub fn build_analysis_prompt(
    dom: &DomSnapshot,
    vlm_text: Option<&str>,
    reconciliation: &ReconciliationReport,
) -> String {
    let symbol = dom.symbol.as_deref().unwrap_or("Unknown");
    let price = dom.price.as_deref().unwrap_or("N/A");
    let change = dom.change.as_deref().unwrap_or("N/A");
    let timeframe = dom.timeframe.unwrap_or(Timeframe::Daily);

    let mut prompt = format!(
        "You are a professional technical analyst. Synthesize the following DOM data and \
         vision observation into a precise structural assessment.\n\n\
         CHART DATA (DOM - AUTHORITATIVE):\n\
         - Symbol: {symbol}\n\
         - Current Price: {price}\n\
         - Change: {change}\n\
         - Timeframe: {}\n",
        timeframe.code()
    );

    if dom.indicators.is_empty() {
        prompt.push_str("\nINDICATORS: None available from DOM\n");
    } else {
        prompt.push_str("\nINDICATORS (FROM DOM - AUTHORITATIVE):\n");
        for (name, value) in &dom.indicators {
            prompt.push_str(&format!("- {name}: {value}\n"));
        }
    }

    if let Some(volume) = &dom.volume {
        prompt.push_str(&format!("\nVOLUME: {volume}\n"));
    }

    if let Some(vlm) = vlm_text {
        prompt.push_str(&format!(
            "\nVISION OBSERVATION (ADVISORY - use to identify patterns, levels, candles):\n{vlm}\n"
        ));
    }

    prompt.push_str("\n--- RECONCILED PERCEPTION ---\n");
    prompt.push_str(&reconciliation.evidence_brief);
    prompt.push('\n');
    if !reconciliation.conflicts.is_empty() {
        prompt.push('\n');
        prompt.push_str(&reconciliation.conflict_brief);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nIMPORTANT: The reconciliation above resolves conflicts between DOM and VLM.\n\
         Use the trust-weighted facts above as your PRIMARY input. Where trust=HIGH, treat as fact.\n\
         Where trust=LOW (e.g., VLM-read price levels), verify against other evidence.\n\
         --- END RECONCILED PERCEPTION ---\n",
    );

    prompt.push_str(&format!(
        "\nTASK:\n\
         Provide a precise technical analysis for {symbol} on the {} timeframe.\n\n\
         RULES FOR SUPPORT/RESISTANCE LEVELS:\n\
         - If DOM provides OHLC (High/Low) data: use actual High as near resistance, actual Low as near support\n\
         - If Vision reports specific price levels from the chart Y-axis: use those exact numbers\n\
         - If indicators (EMA/SMA) are available: use their values as dynamic support/resistance\n\
         - ONLY if NO data is available from DOM or Vision: estimate levels based on current price\n\
         - ALL support levels MUST be BELOW current price\n\
         - ALL resistance levels MUST be ABOVE current price\n\n\
         RULES FOR VOLUME:\n\
         - If volume data is available, assess whether volume confirms the trend\n\
         - \"volume_trend\": \"increasing\" (confirms trend), \"decreasing\" (weakening), \
         \"spike\" (climax/breakout), \"dry\" (low interest)\n\
         - If no volume data: set volume_trend to \"unavailable\"\n\n\
         Respond ONLY with this JSON (no other text):\n\n\
         {{\n\
           \"symbol\": \"{symbol}\",\n\
           \"timeframe\": \"{}\",\n\
           \"trend\": \"<bullish|bearish|sideways>\",\n\
           \"structure\": \"<higher-highs|lower-lows|range-bound|consolidation>\",\n\
           \"support\": [<level_1>, <level_2>],\n\
           \"resistance\": [<level_1>, <level_2>],\n\
           \"momentum\": \"<strong bullish|moderate bullish|neutral|moderate bearish|strong bearish>\",\n\
           \"momentum_condition\": \"<expanding|exhausting|improving|neutral>\",\n\
           \"volume_trend\": \"<increasing|decreasing|spike|dry|unavailable>\",\n\
           \"candlestick_pattern\": \"<pattern name or none>\",\n\
           \"reasoning\": \"<2-3 sentences: what the chart structure shows>\",\n\
           \"bias\": \"<directional outlook with specific levels to monitor>\",\n\
           \"key_levels\": \"<critical price levels for validation or rejection>\"\n\
         }}\n\n\
         CRITICAL LOGIC RULES:\n\
         1. Support levels MUST be numeric and BELOW current price ({price})\n\
         2. Resistance levels MUST be numeric and ABOVE current price ({price})\n\
         3. If RSI is available and > 70: momentum_condition should be \"exhausting\"\n\
         4. If RSI is available and < 30: momentum_condition should be \"improving\"\n\
         5. NEVER use words: \"trade\", \"entry\", \"exit\", \"position\", \"buy\", \"sell\"\n\
         6. Use ONLY: \"monitor\", \"observe\", \"validate\", \"watch\"\n\
         7. Momentum MUST have both strength AND condition\n\
         8. Provide at least 2 support and 2 resistance levels as numbers\n",
        timeframe.code(),
        timeframe.code()
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use perception_reconciler::PerceptionReconciler;

    fn snapshot() -> DomSnapshot {
        DomSnapshot {
            symbol: Some("YESBANK".to_string()),
            price: Some("24.50".to_string()),
            change: Some("+2.1%".to_string()),
            timeframe: Some(Timeframe::Daily),
            indicators: [("RSI".to_string(), "62".to_string())].into_iter().collect(),
            volume: Some("18M".to_string()),
        }
    }

    #[test]
    fn test_prompt_carries_dom_vlm_and_briefs() {
        let dom = snapshot();
        let vlm = "Clear uptrend with support near 23";
        let reconciliation = PerceptionReconciler::new().reconcile(&dom, Some(vlm));
        let prompt = build_analysis_prompt(&dom, Some(vlm), &reconciliation);

        assert!(prompt.contains("Symbol: YESBANK"));
        assert!(prompt.contains("- RSI: 62"));
        assert!(prompt.contains("VISION OBSERVATION"));
        assert!(prompt.contains("--- RECONCILED PERCEPTION ---"));
        assert!(prompt.contains("--- END RECONCILED PERCEPTION ---"));
        assert!(prompt.contains("ALL support levels MUST be BELOW current price"));
        assert!(prompt.contains("NEVER use words"));
    }

    #[test]
    fn test_prompt_without_indicators_or_vlm() {
        let dom = DomSnapshot {
            symbol: Some("TCS".to_string()),
            price: Some("4,000".to_string()),
            timeframe: Some(Timeframe::Weekly),
            ..Default::default()
        };
        let reconciliation = PerceptionReconciler::new().reconcile(&dom, None);
        let prompt = build_analysis_prompt(&dom, None, &reconciliation);

        assert!(prompt.contains("INDICATORS: None available from DOM"));
        assert!(!prompt.contains("VISION OBSERVATION"));
        assert!(prompt.contains("on the 1W timeframe"));
    }
}
