use async_trait::async_trait;

use crate::error::AgentError;
use crate::observations::{Observation, ObservationResult};
use crate::types::{ChatTag, DomSnapshot, NavigationResult, Timeframe};

/// Read-only chart-site access through the browser worker.
///
/// Implementations own the automated chart session; every call may block up
/// to the worker's per-request timeout. Navigation never draws, clicks
/// coordinates, or manipulates the chart.
#[async_trait]
pub trait ChartClient: Send + Sync {
    /// Load the chart for a symbol at a timeframe
    async fn navigate(&self, symbol: &str, timeframe: Timeframe) -> NavigationResult;

    /// Extract the DOM record from the currently loaded chart
    async fn extract_chart_data(&self) -> Result<DomSnapshot, AgentError>;

    /// Switch the loaded chart's interval; navigation may already set it
    async fn switch_timeframe(&self, timeframe: Timeframe) -> Result<(), AgentError>;
}

/// Text-completion access. The core never depends on model identity.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn generate_completion(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AgentError>;

    /// Fetch the text of a web search results page through the browser
    /// worker. Used only by the symbol resolver's search layer.
    async fn fetch_search_page(&self, query: &str) -> Result<String, AgentError>;
}

/// Screenshot/VLM observation access
#[async_trait]
pub trait VisionObserver: Send + Sync {
    async fn observe(&self, observation: Observation) -> ObservationResult;
}

/// Outbound chat sink. Emission never blocks the pipeline and never fails
/// from the caller's point of view.
pub trait ChatSink: Send + Sync {
    fn emit(&self, tag: ChatTag, line: &str);
}

/// Optional news/catalyst collaborator
#[async_trait]
pub trait NewsClient: Send + Sync {
    async fn recent_headlines(&self, symbol: &str, limit: usize) -> Result<Vec<String>, AgentError>;
}

/// Default news client that reports nothing
pub struct NoNews;

#[async_trait]
impl NewsClient for NoNews {
    async fn recent_headlines(
        &self,
        _symbol: &str,
        _limit: usize,
    ) -> Result<Vec<String>, AgentError> {
        Ok(Vec::new())
    }
}
