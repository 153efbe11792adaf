//! Memory-only market queries. No browser, no probabilistic pipeline.

use analysis_core::{AgentError, ChatTag};
use intent_resolver::extract_symbol_hint;
use technical_analysis::format_analysis;

use crate::context::MarketContext;

/// "has NIFTY trend changed?" — compares the stored current trend against
/// the mode of the previous five analyses.
pub async fn handle_trend_change_query(
    ctx: &MarketContext,
    user_text: &str,
) -> Result<String, AgentError> {
    let symbol = extract_symbol_hint(user_text).ok_or_else(|| {
        AgentError::Resolution(
            "could not identify a symbol in the question (e.g., TCS, RELIANCE)".to_string(),
        )
    })?;

    let latest = ctx
        .store
        .latest(&symbol, None, None)
        .await
        .map_err(|e| AgentError::Storage(e.to_string()))?;

    let answer = match latest {
        None => format!("No previous analysis found for {symbol}."),
        Some(analysis) => {
            let change = ctx
                .store
                .trend_change(&symbol, analysis.trend, 5)
                .await
                .map_err(|e| AgentError::Storage(e.to_string()))?;
            if change.changed {
                format!(
                    "{symbol} trend changed: {} (previously {})",
                    change.description,
                    change.previous_trend.unwrap_or_else(|| "unknown".to_string())
                )
            } else {
                format!("{symbol} trend not changed: {}", change.description)
            }
        }
    };

    ctx.chat.emit(ChatTag::Analysis, &answer);
    Ok(answer)
}

/// "last analysis for X" — renders the stored record without re-observing.
pub async fn handle_last_analysis_query(
    ctx: &MarketContext,
    user_text: &str,
) -> Result<String, AgentError> {
    let symbol = extract_symbol_hint(user_text).ok_or_else(|| {
        AgentError::Resolution(
            "could not identify a symbol in the question (e.g., TCS, RELIANCE)".to_string(),
        )
    })?;

    let latest = ctx
        .store
        .latest(&symbol, None, None)
        .await
        .map_err(|e| AgentError::Storage(e.to_string()))?;

    let answer = match latest {
        None => format!("No previous analysis found for {symbol}."),
        Some(analysis) => format!(
            "Last analysis for {symbol} (analyzed at {}):\n\n{}",
            analysis.timestamp.to_rfc3339(),
            format_analysis(&analysis)
        ),
    };

    ctx.chat.emit(ChatTag::Analysis, &answer);
    Ok(answer)
}
