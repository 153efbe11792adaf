//! Three-layer symbol resolution with strict web-search budgets.
//!
//! Layer 1 consults the symbol cache, layer 2 validates ticker-shaped input
//! by loading the chart, layer 3 falls back to one web search per session,
//! and only in single-analysis mode. The scanner path never searches the
//! web and reports unreachable data as DATA_UNAVAILABLE so a scan can move
//! on to the next instrument.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use analysis_core::{ChartClient, CompletionClient, Timeframe};
use serde::{Deserialize, Serialize};
use symbol_memory::{CacheConfidence, CacheSource, SymbolMemory};
use tracing::{info, warn};

/// Resolution mode: the side-effect budget for one resolve call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMode {
    SingleAnalysis,
    MarketScan,
    AutomatedScan,
    Backtest,
    Replay,
    MultiInstrument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStatus {
    /// Validated directly against the chart source
    Valid,
    /// Resolved through the cache or web search
    Resolved,
    /// Could not be resolved to any symbol
    Unknown,
    /// Chart source unreachable in scan mode
    DataUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionSource {
    Cache,
    TradingView,
    Google,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionConfidence {
    High,
    Medium,
    Low,
}

impl From<CacheConfidence> for ResolutionConfidence {
    fn from(confidence: CacheConfidence) -> ResolutionConfidence {
        match confidence {
            CacheConfidence::High => ResolutionConfidence::High,
            CacheConfidence::Medium => ResolutionConfidence::Medium,
            CacheConfidence::Low => ResolutionConfidence::Low,
        }
    }
}

/// Outcome of one resolution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub status: ResolutionStatus,
    pub symbol: Option<String>,
    pub source: ResolutionSource,
    pub confidence: ResolutionConfidence,
    pub original_input: String,
    pub error: Option<String>,
}

impl ResolutionResult {
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, ResolutionStatus::Valid | ResolutionStatus::Resolved)
    }
}

/// {all uppercase after normalization, no whitespace, alphanumeric, 2-15 chars}
pub fn is_ticker_shaped(normalized: &str) -> bool {
    !normalized.is_empty()
        && !normalized.contains(char::is_whitespace)
        && (2..=15).contains(&normalized.len())
        && normalized.chars().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Debug, Default)]
struct SearchBudget {
    attempts: u32,
    last_search: Option<Instant>,
}

pub struct SymbolResolver {
    chart: Arc<dyn ChartClient>,
    llm: Arc<dyn CompletionClient>,
    memory: Mutex<SymbolMemory>,
    min_interval: Duration,
    budget: Mutex<SearchBudget>,
}

impl SymbolResolver {
    pub fn new(
        chart: Arc<dyn ChartClient>,
        llm: Arc<dyn CompletionClient>,
        memory: SymbolMemory,
        min_interval_secs: u64,
    ) -> SymbolResolver {
        SymbolResolver {
            chart,
            llm,
            memory: Mutex::new(memory),
            min_interval: Duration::from_secs(min_interval_secs),
            budget: Mutex::new(SearchBudget::default()),
        }
    }

    pub async fn resolve(&self, user_input: &str, mode: ResolutionMode) -> ResolutionResult {
        info!(input = user_input, ?mode, "resolving symbol");
        let normalized = user_input.trim().to_uppercase();

        // Layer 1: cache
        if let Some(cached) = self.memory.lock().expect("memory lock").lookup(user_input) {
            return ResolutionResult {
                status: ResolutionStatus::Resolved,
                symbol: Some(cached.canonical_symbol),
                source: ResolutionSource::Cache,
                confidence: cached.confidence.into(),
                original_input: user_input.to_string(),
                error: None,
            };
        }

        // Layer 2: chart validation for ticker-shaped input
        if is_ticker_shaped(&normalized) {
            if let Some(result) = self.validate_via_chart(&normalized, user_input).await {
                self.memory.lock().expect("memory lock").store(
                    user_input,
                    &normalized,
                    CacheConfidence::High,
                    CacheSource::TradingView,
                );
                return result;
            }
        }

        // Layer 3: web search, under the strict budget
        if self.is_search_allowed(&normalized, mode) {
            if let Some(result) = self.resolve_via_search(user_input).await {
                if result.status == ResolutionStatus::Resolved {
                    if let Some(symbol) = &result.symbol {
                        self.memory.lock().expect("memory lock").store(
                            user_input,
                            symbol,
                            CacheConfidence::High,
                            CacheSource::Google,
                        );
                    }
                }
                return result;
            }
        }

        if mode == ResolutionMode::MarketScan {
            // Scanner-safe failure: the caller moves to the next instrument
            ResolutionResult {
                status: ResolutionStatus::DataUnavailable,
                symbol: None,
                source: ResolutionSource::TradingView,
                confidence: ResolutionConfidence::Low,
                original_input: user_input.to_string(),
                error: Some("chart data unavailable (scan mode, no web fallback)".to_string()),
            }
        } else {
            ResolutionResult {
                status: ResolutionStatus::Unknown,
                symbol: None,
                source: ResolutionSource::User,
                confidence: ResolutionConfidence::Low,
                original_input: user_input.to_string(),
                error: Some("could not resolve symbol".to_string()),
            }
        }
    }

    /// Validate a candidate by loading its chart and extracting symbol+price
    async fn validate_via_chart(
        &self,
        symbol: &str,
        original_input: &str,
    ) -> Option<ResolutionResult> {
        let navigation = self.chart.navigate(symbol, Timeframe::Daily).await;
        if !navigation.success {
            warn!(symbol, error = ?navigation.error, "chart validation failed");
            return None;
        }

        match self.chart.extract_chart_data().await {
            Ok(dom) if dom.symbol.is_some() && dom.price.is_some() => {
                info!(symbol, "chart validation passed");
                Some(ResolutionResult {
                    status: ResolutionStatus::Valid,
                    symbol: Some(symbol.to_string()),
                    source: ResolutionSource::TradingView,
                    confidence: ResolutionConfidence::High,
                    original_input: original_input.to_string(),
                    error: None,
                })
            }
            Ok(_) => {
                warn!(symbol, "chart loaded but symbol/price extraction was empty");
                None
            }
            Err(e) => {
                warn!(symbol, error = %e, "chart data extraction failed");
                None
            }
        }
    }

    /// Every condition must hold before a web search is permitted
    fn is_search_allowed(&self, normalized: &str, mode: ResolutionMode) -> bool {
        if mode != ResolutionMode::SingleAnalysis {
            info!(?mode, "web search blocked: not single-analysis mode");
            return false;
        }
        if is_ticker_shaped(normalized) {
            info!(input = normalized, "web search blocked: input is ticker-shaped");
            return false;
        }
        let budget = self.budget.lock().expect("budget lock");
        if budget.attempts > 0 {
            info!(attempts = budget.attempts, "web search blocked: already attempted this session");
            return false;
        }
        if let Some(last) = budget.last_search {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                info!(
                    remaining_secs = (self.min_interval - elapsed).as_secs(),
                    "web search blocked: rate limited"
                );
                return false;
            }
        }
        true
    }

    /// One web search, one LLM extraction, then layer-2 validation.
    /// Surrenders on any failure; there are no retries.
    async fn resolve_via_search(&self, user_input: &str) -> Option<ResolutionResult> {
        {
            let mut budget = self.budget.lock().expect("budget lock");
            budget.attempts += 1;
            budget.last_search = Some(Instant::now());
        }

        let query = format!("what is the NSE stock symbol for {user_input}");
        info!(%query, "attempting web search");

        let page_text = match self.llm.fetch_search_page(&query).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "web search page load failed");
                return None;
            }
        };

        let lower = page_text.to_lowercase();
        if lower.contains("not a robot") || lower.contains("captcha") {
            warn!("web search blocked by captcha");
            return None;
        }
        if page_text.trim().is_empty() {
            warn!("web search returned no text");
            return None;
        }

        let truncated: String = page_text.chars().take(2000).collect();
        let system_prompt =
            "You are a stock market expert. Extract NSE stock symbols from search results.";
        let user_prompt = format!(
            "Extract the NSE stock symbol from these search results.\n\n\
             User asked about: {user_input}\n\n\
             Search results:\n{truncated}\n\n\
             Reply with ONLY the NSE stock symbol (e.g., YESBANK, TATACONSUM, SBIN).\n\
             If you cannot find a clear NSE symbol, reply with \"UNKNOWN\"."
        );

        let candidate = match self.llm.generate_completion(system_prompt, &user_prompt).await {
            Ok(response) => response.trim().to_uppercase(),
            Err(e) => {
                warn!(error = %e, "symbol extraction completion failed");
                return None;
            }
        };

        if candidate == "UNKNOWN"
            || !(2..=15).contains(&candidate.len())
            || !candidate.chars().all(|c| c.is_ascii_alphabetic())
        {
            warn!(%candidate, "extracted candidate is not a plausible symbol");
            return None;
        }

        info!(%candidate, "extracted candidate symbol");

        match self.validate_via_chart(&candidate, user_input).await {
            Some(_) => Some(ResolutionResult {
                status: ResolutionStatus::Resolved,
                symbol: Some(candidate),
                source: ResolutionSource::Google,
                confidence: ResolutionConfidence::High,
                original_input: user_input.to_string(),
                error: None,
            }),
            None => Some(ResolutionResult {
                status: ResolutionStatus::Unknown,
                symbol: Some(candidate),
                source: ResolutionSource::Google,
                confidence: ResolutionConfidence::Low,
                original_input: user_input.to_string(),
                error: Some("search result failed chart validation".to_string()),
            }),
        }
    }

    /// Load the canonical index chart; callers gate scans on this
    pub async fn health_check(&self) -> bool {
        info!("chart source health check (NIFTY)");
        let healthy = self.validate_via_chart("NIFTY", "NIFTY").await.is_some();
        if healthy {
            info!("chart source health check passed");
        } else {
            warn!("chart source health check failed");
        }
        healthy
    }

    /// Reset the per-session search budget
    pub fn reset_session(&self) {
        let mut budget = self.budget.lock().expect("budget lock");
        budget.attempts = 0;
        budget.last_search = None;
    }
}
