//! The per-timeframe analyzer.

use std::sync::Arc;

use analysis_core::{AgentError, Analysis, CompletionClient, DomSnapshot};
use analysis_store::AnalysisStore;
use perception_reconciler::PerceptionReconciler;
use tracing::{error, info};

use crate::parse::parse_analysis;
use crate::prompt::{build_analysis_prompt, SYSTEM_PROMPT};
use crate::safety::validate_no_trading_language;

/// Synthesizes DOM data and a vision observation into a structured record.
///
/// Vision proposes, the reconciler scores, DOM validates, the completion
/// client reasons. The analyzer never produces trading recommendations.
pub struct TechnicalAnalyzer {
    llm: Arc<dyn CompletionClient>,
    reconciler: PerceptionReconciler,
    store: Option<AnalysisStore>,
}

impl TechnicalAnalyzer {
    pub fn new(llm: Arc<dyn CompletionClient>) -> TechnicalAnalyzer {
        TechnicalAnalyzer {
            llm,
            reconciler: PerceptionReconciler::new(),
            store: None,
        }
    }

    /// Persist every accepted analysis through this store
    pub fn with_store(mut self, store: AnalysisStore) -> TechnicalAnalyzer {
        self.store = Some(store);
        self
    }

    /// Run the full synthesis for one (symbol, timeframe) observation pair.
    pub async fn analyze(
        &self,
        dom: &DomSnapshot,
        vlm_text: Option<&str>,
    ) -> Result<Analysis, AgentError> {
        let symbol = dom.symbol.as_deref().unwrap_or("Unknown");
        info!(symbol, "analyzing chart data");

        let reconciliation = self.reconciler.reconcile(dom, vlm_text);
        let prompt = build_analysis_prompt(dom, vlm_text, &reconciliation);

        let response = self
            .llm
            .generate_completion(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| AgentError::Synthesis(format!("completion failed: {e}")))?;

        let mut analysis = parse_analysis(&response, dom)?;

        analysis.perception_confidence = Some(reconciliation.overall_confidence);
        analysis.perception_completeness = Some(reconciliation.completeness);
        analysis.perception_conflicts = reconciliation.conflicts.len();
        analysis.critical_conflict = reconciliation.has_critical_conflicts();

        // A safety rejection terminates the cycle; nothing is persisted
        validate_no_trading_language(&analysis)?;

        if let Some(store) = &self.store {
            match store.store(&analysis).await {
                Ok(Some(id)) => info!(symbol = %analysis.symbol, id, "analysis persisted"),
                Ok(None) => {}
                Err(e) => error!(symbol = %analysis.symbol, error = %e, "failed to persist analysis"),
            }
        }

        info!(symbol = %analysis.symbol, timeframe = %analysis.timeframe, "analysis complete");
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Timeframe, Trend};
    use async_trait::async_trait;

    struct CannedLlm {
        response: String,
    }

    #[async_trait]
    impl CompletionClient for CannedLlm {
        async fn generate_completion(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
        ) -> Result<String, AgentError> {
            Ok(self.response.clone())
        }

        async fn fetch_search_page(&self, _query: &str) -> Result<String, AgentError> {
            Err(AgentError::Perception("not available in tests".to_string()))
        }
    }

    fn dom() -> DomSnapshot {
        DomSnapshot {
            symbol: Some("YESBANK".to_string()),
            price: Some("24.50".to_string()),
            change: Some("+1.0%".to_string()),
            timeframe: Some(Timeframe::Daily),
            indicators: [("RSI".to_string(), "72".to_string())].into_iter().collect(),
            volume: Some("18M".to_string()),
        }
    }

    fn llm(response: &str) -> Arc<CannedLlm> {
        Arc::new(CannedLlm {
            response: response.to_string(),
        })
    }

    const GOOD_RESPONSE: &str = r#"{
        "symbol": "YESBANK", "timeframe": "1D", "trend": "bullish",
        "structure": "higher-highs", "support": [23.8], "resistance": [25.1],
        "momentum": "moderate bullish", "momentum_condition": "exhausting",
        "volume_trend": "increasing", "candlestick_pattern": "none",
        "reasoning": "Holding above dynamic support.",
        "bias": "Constructive while above 23.8.",
        "key_levels": "23.8 / 25.1"
    }"#;

    #[tokio::test]
    async fn test_analyze_attaches_perception_metadata() {
        let analyzer = TechnicalAnalyzer::new(llm(GOOD_RESPONSE));
        // RSI=72 (DOM exhausting) vs VLM "healthy momentum" => HIGH conflict
        let analysis = analyzer
            .analyze(&dom(), Some("Healthy momentum, no exhaustion, clear uptrend"))
            .await
            .unwrap();
        assert_eq!(analysis.trend, Trend::Bullish);
        assert!(analysis.perception_confidence.is_some());
        assert_eq!(analysis.perception_conflicts, 1);
        assert!(!analysis.critical_conflict);
    }

    #[tokio::test]
    async fn test_analyze_persists_when_store_present() {
        let store = AnalysisStore::new("sqlite::memory:").await.unwrap();
        let analyzer = TechnicalAnalyzer::new(llm(GOOD_RESPONSE)).with_store(store.clone());
        analyzer.analyze(&dom(), None).await.unwrap();

        let stored = store
            .latest("YESBANK", Some(Timeframe::Daily), None)
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_trading_language_is_rejected_and_not_stored() {
        let bad = r#"{
            "symbol": "YESBANK", "timeframe": "1D", "trend": "bullish",
            "structure": "higher-highs", "support": [23.8], "resistance": [25.1],
            "momentum": "moderate bullish", "momentum_condition": "expanding",
            "volume_trend": "increasing", "candlestick_pattern": "none",
            "reasoning": "Buy now before the breakout.",
            "bias": "Aggressive", "key_levels": "23.8"
        }"#;
        let store = AnalysisStore::new("sqlite::memory:").await.unwrap();
        let analyzer = TechnicalAnalyzer::new(llm(bad)).with_store(store.clone());

        let err = analyzer.analyze(&dom(), None).await.unwrap_err();
        assert!(matches!(err, AgentError::SafetyRejection(_)));
        assert!(store.latest("YESBANK", None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unstructured_response_is_synthesis_error() {
        let analyzer = TechnicalAnalyzer::new(llm("I think it goes up from here"));
        let err = analyzer.analyze(&dom(), None).await.unwrap_err();
        assert!(matches!(err, AgentError::Synthesis(_)));
    }
}
