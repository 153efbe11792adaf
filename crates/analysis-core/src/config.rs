use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Hard safety toggles. Every flag must stay false; the agent observes
/// charts, it never acts on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default)]
    pub allow_trading: bool,
    #[serde(default)]
    pub allow_chart_drawing: bool,
    #[serde(default)]
    pub allow_coordinate_clicks: bool,
    #[serde(default)]
    pub allow_chart_manipulation: bool,
}

impl SafetyConfig {
    fn enabled_toggles(&self) -> Vec<&'static str> {
        let mut enabled = Vec::new();
        if self.allow_trading {
            enabled.push("allow_trading");
        }
        if self.allow_chart_drawing {
            enabled.push("allow_chart_drawing");
        }
        if self.allow_coordinate_clicks {
            enabled.push("allow_coordinate_clicks");
        }
        if self.allow_chart_manipulation {
            enabled.push("allow_chart_manipulation");
        }
        enabled
    }
}

/// Market-module configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Minimum seconds between web-search attempts
    pub google_min_interval_secs: u64,
    /// Overextension proximity for UNSTABLE classification (percent)
    pub unstable_proximity_pct: f64,
    /// Proximity for HTF location detection (percent)
    pub htf_location_pct: f64,
    /// Freshness window for reasoning-only synthesis (hours)
    pub reasoning_max_age_hours: i64,
    /// Results returned by a market scan
    pub scan_top_n: usize,
    /// Regime risk gate ceiling on the failure probability
    pub regime_risk_ceiling: f64,

    pub symbol_cache_path: String,
    pub analysis_db_url: String,
    pub gate_log_db_url: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            safety: SafetyConfig::default(),
            google_min_interval_secs: 30,
            unstable_proximity_pct: 3.0,
            htf_location_pct: 2.0,
            reasoning_max_age_hours: 24,
            scan_top_n: 5,
            regime_risk_ceiling: 0.35,
            symbol_cache_path: "db/symbol_cache.json".to_string(),
            analysis_db_url: "sqlite:db/market_analyses.db".to_string(),
            gate_log_db_url: "sqlite:db/execution_gate_log.db".to_string(),
        }
    }
}

impl MarketConfig {
    /// Load defaults with environment overrides (reads `.env` if present)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(v) = std::env::var("MARKET_GOOGLE_MIN_INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                config.google_min_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("MARKET_SYMBOL_CACHE_PATH") {
            config.symbol_cache_path = v;
        }
        if let Ok(v) = std::env::var("MARKET_ANALYSIS_DB_URL") {
            config.analysis_db_url = v;
        }
        if let Ok(v) = std::env::var("MARKET_GATE_LOG_DB_URL") {
            config.gate_log_db_url = v;
        }
        if let Ok(v) = std::env::var("MARKET_SCAN_TOP_N") {
            if let Ok(n) = v.parse() {
                config.scan_top_n = n;
            }
        }
        config
    }

    /// Refuse to run with any safety toggle enabled
    pub fn validate(&self) -> Result<(), AgentError> {
        let enabled = self.safety.enabled_toggles();
        if !enabled.is_empty() {
            return Err(AgentError::Config(format!(
                "safety toggles must be false: {}",
                enabled.join(", ")
            )));
        }
        Ok(())
    }
}
