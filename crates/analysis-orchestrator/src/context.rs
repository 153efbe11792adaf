//! The capability bundle handed to every market operation.

use std::sync::Arc;

use analysis_core::{
    AgentError, ChartClient, ChatSink, CompletionClient, MarketConfig, NewsClient, VisionObserver,
};
use analysis_store::AnalysisStore;
use execution_gate::GateLog;
use symbol_memory::SymbolMemory;
use symbol_resolver::SymbolResolver;
use tracing::info;

/// Everything a market operation may touch. Constructed once per process
/// and passed by reference; components never reach back into the engine.
pub struct MarketContext {
    pub chat: Arc<dyn ChatSink>,
    pub chart: Arc<dyn ChartClient>,
    pub llm: Arc<dyn CompletionClient>,
    pub vision: Arc<dyn VisionObserver>,
    pub news: Arc<dyn NewsClient>,
    pub resolver: SymbolResolver,
    pub store: AnalysisStore,
    pub gate_log: GateLog,
    pub config: MarketConfig,
}

impl std::fmt::Debug for MarketContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketContext")
            .field("chat", &"<dyn ChatSink>")
            .field("chart", &"<dyn ChartClient>")
            .field("llm", &"<dyn CompletionClient>")
            .field("vision", &"<dyn VisionObserver>")
            .field("news", &"<dyn NewsClient>")
            .field("resolver", &"<SymbolResolver>")
            .field("store", &"<AnalysisStore>")
            .field("gate_log", &"<GateLog>")
            .field("config", &self.config)
            .finish()
    }
}

impl MarketContext {
    /// Validate safety toggles, open the stores, and assemble the context.
    pub async fn connect(
        config: MarketConfig,
        chat: Arc<dyn ChatSink>,
        chart: Arc<dyn ChartClient>,
        llm: Arc<dyn CompletionClient>,
        vision: Arc<dyn VisionObserver>,
        news: Arc<dyn NewsClient>,
    ) -> Result<MarketContext, AgentError> {
        config.validate()?;

        let memory = SymbolMemory::open(&config.symbol_cache_path);
        let resolver = SymbolResolver::new(
            chart.clone(),
            llm.clone(),
            memory,
            config.google_min_interval_secs,
        );
        let store = AnalysisStore::new(&config.analysis_db_url)
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;
        let gate_log = GateLog::new(&config.gate_log_db_url)
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;

        info!("market context connected");
        Ok(MarketContext {
            chat,
            chart,
            llm,
            vision,
            news,
            resolver,
            store,
            gate_log,
            config,
        })
    }
}
