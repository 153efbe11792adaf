use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Chart timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    Min5,
    Min15,
    Hour1,
    Hour4,
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    /// Chart-site interval code
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::Min5 => "5",
            Timeframe::Min15 => "15",
            Timeframe::Hour1 => "60",
            Timeframe::Hour4 => "4h",
            Timeframe::Daily => "1D",
            Timeframe::Weekly => "1W",
            Timeframe::Monthly => "1M",
        }
    }

    pub fn from_code(code: &str) -> Option<Timeframe> {
        match code {
            "5" => Some(Timeframe::Min5),
            "15" => Some(Timeframe::Min15),
            "60" | "1h" => Some(Timeframe::Hour1),
            "4h" => Some(Timeframe::Hour4),
            "1D" => Some(Timeframe::Daily),
            "1W" => Some(Timeframe::Weekly),
            "1M" => Some(Timeframe::Monthly),
            _ => None,
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Min5 => "5-Minute",
            Timeframe::Min15 => "15-Minute",
            Timeframe::Hour1 => "Hourly",
            Timeframe::Hour4 => "4-Hour",
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
            Timeframe::Monthly => "Monthly",
        }
    }

    /// Dominance rank: the highest available timeframe leads a
    /// multi-timeframe run (Monthly > Weekly > Daily > intraday).
    pub fn rank(&self) -> u8 {
        match self {
            Timeframe::Min5 => 0,
            Timeframe::Min15 => 1,
            Timeframe::Hour1 => 2,
            Timeframe::Hour4 => 3,
            Timeframe::Daily => 4,
            Timeframe::Weekly => 5,
            Timeframe::Monthly => 6,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Timeframe set selection for a multi-timeframe run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeframeMode {
    Swing,
    Intraday,
    Positional,
}

impl TimeframeMode {
    /// Ordered set processed highest-first within a run
    pub fn timeframes(&self) -> &'static [Timeframe] {
        match self {
            TimeframeMode::Swing => &[Timeframe::Monthly, Timeframe::Weekly, Timeframe::Daily],
            TimeframeMode::Intraday => &[Timeframe::Hour1, Timeframe::Min15, Timeframe::Hour4],
            TimeframeMode::Positional => &[Timeframe::Monthly, Timeframe::Weekly],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeframeMode::Swing => "SWING",
            TimeframeMode::Intraday => "INTRADAY",
            TimeframeMode::Positional => "POSITIONAL",
        }
    }
}

/// Trend direction classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    pub fn parse(text: &str) -> Option<Trend> {
        match text.trim().to_lowercase().as_str() {
            "bullish" => Some(Trend::Bullish),
            "bearish" => Some(Trend::Bearish),
            "sideways" => Some(Trend::Sideways),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Sideways => "sideways",
        }
    }

    /// Bullish and bearish are opposites; sideways conflicts with neither.
    pub fn is_opposite(&self, other: Trend) -> bool {
        matches!(
            (self, other),
            (Trend::Bullish, Trend::Bearish) | (Trend::Bearish, Trend::Bullish)
        )
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Price structure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Structure {
    #[serde(rename = "higher-highs")]
    HigherHighs,
    #[serde(rename = "lower-lows")]
    LowerLows,
    #[serde(rename = "range-bound")]
    RangeBound,
    #[serde(rename = "consolidation")]
    Consolidation,
}

impl Structure {
    pub fn parse(text: &str) -> Option<Structure> {
        match text.trim().to_lowercase().as_str() {
            "higher-highs" | "higher highs" => Some(Structure::HigherHighs),
            "lower-lows" | "lower lows" => Some(Structure::LowerLows),
            "range-bound" | "range bound" => Some(Structure::RangeBound),
            "consolidation" => Some(Structure::Consolidation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Structure::HigherHighs => "higher-highs",
            Structure::LowerLows => "lower-lows",
            Structure::RangeBound => "range-bound",
            Structure::Consolidation => "consolidation",
        }
    }

    /// Conservative default when the synthesis omits structure
    pub fn from_trend(trend: Trend) -> Structure {
        match trend {
            Trend::Bullish => Structure::HigherHighs,
            Trend::Bearish => Structure::LowerLows,
            Trend::Sideways => Structure::RangeBound,
        }
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-timeframe technical analysis record.
///
/// Persisted once at creation and treated as immutable afterwards.
/// Invariants: every support level sits below `price`, every resistance
/// level above it; a stated momentum always carries a condition; the
/// free-text fields never contain trading-imperative language (violations
/// are captured in `validation_warnings` rather than silently dropped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub trend: Trend,
    pub structure: Structure,
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
    pub momentum: String,
    pub momentum_condition: String,
    pub volume_trend: String,
    pub candlestick_pattern: String,
    pub price: Option<f64>,
    pub reasoning: String,
    pub bias: String,
    pub key_levels: String,
    #[serde(default)]
    pub perception_confidence: Option<f64>,
    #[serde(default)]
    pub perception_completeness: Option<f64>,
    #[serde(default)]
    pub perception_conflicts: usize,
    #[serde(default)]
    pub critical_conflict: bool,
    #[serde(default)]
    pub validation_warnings: Vec<String>,
}

/// DOM record extracted from the chart page.
///
/// Every field except `timeframe` is optional; absence is normal and simply
/// reduces perception completeness downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub symbol: Option<String>,
    pub price: Option<String>,
    pub change: Option<String>,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    #[serde(default)]
    pub indicators: BTreeMap<String, String>,
    pub volume: Option<String>,
}

impl DomSnapshot {
    /// Numeric price, tolerating thousands separators from the page title
    pub fn price_value(&self) -> Option<f64> {
        parse_numeric(self.price.as_deref()?)
    }

    pub fn is_empty(&self) -> bool {
        self.symbol.is_none() && self.price.is_none()
    }
}

/// Parse a number from page text, stripping commas and currency prefixes.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let cleaned: String = text
        .replace(',', "")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Cross-timeframe trend agreement classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Full,
    Partial,
    Unstable,
    Conflict,
}

impl Alignment {
    pub fn label(&self) -> &'static str {
        match self {
            Alignment::Full => "FULL ALIGNMENT",
            Alignment::Partial => "PARTIAL ALIGNMENT",
            Alignment::Unstable => "UNSTABLE",
            Alignment::Conflict => "CONFLICT",
        }
    }

    /// Aligned enough to consider structural continuation
    pub fn is_aligned(&self) -> bool {
        matches!(self, Alignment::Full | Alignment::Partial)
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Where price sits relative to the dominant timeframe's levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtfLocation {
    Support,
    Mid,
    Resistance,
    /// No usable levels; treated as a no-op by probability adjustments
    Unknown,
}

impl HtfLocation {
    pub fn label(&self) -> &'static str {
        match self {
            HtfLocation::Support => "SUPPORT",
            HtfLocation::Mid => "MID",
            HtfLocation::Resistance => "RESISTANCE",
            HtfLocation::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for HtfLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Scenario selected by the probability engine for the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveState {
    Continuation,
    Pullback,
    Failure,
    ConflictState,
}

impl ActiveState {
    pub fn label(&self) -> &'static str {
        match self {
            ActiveState::Continuation => "CONTINUATION",
            ActiveState::Pullback => "PULLBACK",
            ActiveState::Failure => "FAILURE",
            ActiveState::ConflictState => "CONFLICT_STATE",
        }
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Regime condition flags surfaced to the verdict composer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegimeFlag {
    RegimeChange,
    EdgeDegradation,
}

/// Outcome of a chart navigation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    pub success: bool,
    pub symbol: String,
    pub url: Option<String>,
    pub error: Option<String>,
}

/// Severity tag for a line emitted to the chat sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatTag {
    Info,
    Warning,
    Error,
    Success,
    Observation,
    Analysis,
}

impl ChatTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatTag::Info => "INFO",
            ChatTag::Warning => "WARNING",
            ChatTag::Error => "ERROR",
            ChatTag::Success => "SUCCESS",
            ChatTag::Observation => "OBSERVATION",
            ChatTag::Analysis => "ANALYSIS",
        }
    }
}
