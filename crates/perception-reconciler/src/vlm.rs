//! VLM free-text claim extraction.
//!
//! The controlled vocabularies below are the contract with the VLM: only
//! phrases listed here produce claims, everything else is ignored as noise.
//! Price levels go through a plausibility filter (1 .. 1,000,000) because
//! the VLM reads small axis text and misfires on dates and percentages.

use std::sync::OnceLock;

use analysis_core::parse_numeric;
use regex::Regex;

use crate::claims::{ClaimSource, ClaimValue, Dimension, PerceptionClaim};

const LEVEL_MIN: f64 = 1.0;
const LEVEL_MAX: f64 = 1_000_000.0;

pub fn extract_vlm_claims(vlm_text: &str) -> Vec<PerceptionClaim> {
    let mut claims = Vec::new();
    if vlm_text.trim().is_empty() {
        return claims;
    }
    let text = vlm_text.to_lowercase();

    if let Some(trend) = extract_trend(&text) {
        claims.push(PerceptionClaim::new(
            Dimension::Trend,
            ClaimValue::Text(trend.to_string()),
            ClaimSource::VlmSentiment,
            find_context(vlm_text, trend),
        ));
    }

    if let Some(structure) = extract_structure(&text) {
        claims.push(PerceptionClaim::new(
            Dimension::Structure,
            ClaimValue::Text(structure.to_string()),
            ClaimSource::VlmPattern,
            find_context(vlm_text, structure),
        ));
    }

    if let Some(momentum) = extract_momentum(&text) {
        claims.push(PerceptionClaim::new(
            Dimension::Momentum,
            ClaimValue::Text(momentum.to_string()),
            ClaimSource::VlmSentiment,
            find_context(vlm_text, momentum),
        ));
    }

    if let Some(condition) = extract_momentum_condition(&text) {
        claims.push(PerceptionClaim::new(
            Dimension::MomentumCondition,
            ClaimValue::Text(condition.to_string()),
            ClaimSource::VlmSentiment,
            find_context(vlm_text, condition),
        ));
    }

    let price_context = current_price_context(&text);
    for level in extract_price_levels(&text) {
        let dimension = match price_context {
            Some(price) if level < price => Dimension::Support,
            _ => Dimension::Resistance,
        };
        claims.push(PerceptionClaim::new(
            dimension,
            ClaimValue::Number(level),
            ClaimSource::VlmLevel,
            format!("VLM reported level: {level}"),
        ));
    }

    if let Some(volume) = extract_volume_trend(&text) {
        claims.push(PerceptionClaim::new(
            Dimension::VolumeTrend,
            ClaimValue::Text(volume.to_string()),
            ClaimSource::VlmSentiment,
            find_context(vlm_text, volume),
        ));
    }

    if let Some(pattern) = extract_candlestick(&text) {
        claims.push(PerceptionClaim::new(
            Dimension::CandlestickPattern,
            ClaimValue::Text(pattern.clone()),
            ClaimSource::VlmPattern,
            find_context(vlm_text, &pattern),
        ));
    }

    if let Some(pattern) = extract_chart_pattern(&text) {
        claims.push(PerceptionClaim::new(
            Dimension::ChartPattern,
            ClaimValue::Text(pattern.clone()),
            ClaimSource::VlmPattern,
            find_context(vlm_text, &pattern),
        ));
    }

    claims
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

fn extract_trend(text: &str) -> Option<&'static str> {
    // Unambiguous phrasing short-circuits the keyword counting
    if contains_any(
        text,
        &["strong uptrend", "clearly bullish", "strong bullish", "decisive upward"],
    ) {
        return Some("bullish");
    }
    if contains_any(
        text,
        &["strong downtrend", "clearly bearish", "strong bearish", "decisive downward"],
    ) {
        return Some("bearish");
    }

    let bull = ["bullish", "uptrend", "upward", "rising", "ascending", "higher highs", "higher lows"];
    let bear = ["bearish", "downtrend", "downward", "falling", "descending", "lower highs", "lower lows"];
    let side = ["sideways", "range-bound", "consolidat", "flat", "neutral", "choppy"];

    let bull_count = bull.iter().filter(|kw| text.contains(*kw)).count();
    let bear_count = bear.iter().filter(|kw| text.contains(*kw)).count();
    let side_count = side.iter().filter(|kw| text.contains(*kw)).count();

    let max_count = bull_count.max(bear_count).max(side_count);
    if max_count == 0 {
        return None;
    }
    if bull_count == max_count && bull_count > bear_count {
        Some("bullish")
    } else if bear_count == max_count && bear_count > bull_count {
        Some("bearish")
    } else if side_count == max_count {
        Some("sideways")
    } else {
        None
    }
}

fn extract_structure(text: &str) -> Option<&'static str> {
    if text.contains("higher high") && text.contains("higher low") {
        return Some("higher-highs");
    }
    if text.contains("lower high") && text.contains("lower low") {
        return Some("lower-lows");
    }
    if contains_any(
        text,
        &["range-bound", "range bound", "trading range", "between support and resistance"],
    ) {
        return Some("range-bound");
    }
    if contains_any(text, &["consolidat", "tight range", "narrowing", "coiling"]) {
        return Some("consolidation");
    }
    None
}

fn extract_momentum(text: &str) -> Option<&'static str> {
    if contains_any(
        text,
        &["strong bullish momentum", "powerful upward", "aggressive buying"],
    ) {
        return Some("strong bullish");
    }
    if contains_any(
        text,
        &["strong bearish momentum", "powerful downward", "aggressive selling"],
    ) {
        return Some("strong bearish");
    }
    if contains_any(text, &["moderate bullish", "mild upward", "slight bullish"]) {
        return Some("moderate bullish");
    }
    if contains_any(text, &["moderate bearish", "mild downward", "slight bearish"]) {
        return Some("moderate bearish");
    }
    if contains_any(
        text,
        &["weak momentum", "no clear momentum", "neutral momentum", "low momentum"],
    ) {
        return Some("neutral");
    }
    None
}

fn extract_momentum_condition(text: &str) -> Option<&'static str> {
    // Negated exhaustion reads as healthy expansion; check before the
    // plain "exhaustion" keyword can match inside the negation.
    if contains_any(
        text,
        &["no exhaustion", "not exhausted", "healthy momentum"],
    ) {
        return Some("expanding");
    }
    if contains_any(
        text,
        &["overbought", "exhaustion", "exhausted", "overextended", "losing steam"],
    ) {
        return Some("exhausting");
    }
    if contains_any(text, &["oversold", "bottoming", "capitulation", "washout"]) {
        return Some("improving");
    }
    if contains_any(
        text,
        &["accelerat", "expanding momentum", "increasing momentum", "building strength"],
    ) {
        return Some("expanding");
    }
    if contains_any(
        text,
        &["decelerating", "fading", "weakening momentum", "momentum waning"],
    ) {
        return Some("exhausting");
    }
    None
}

fn level_regexes() -> &'static Vec<Regex> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        [
            r"(?:support|resistance|level|zone|area)\s*(?:at|near|around|of|:)\s*(?:rs\.?\s*)?([\d,]+\.?\d*)",
            r"rs\.?\s*([\d,]+\.?\d*)\s*(?:support|resistance|level|zone)",
            r"(?:bounced|reversed|rejected)\s*(?:at|from|near)\s*(?:rs\.?\s*)?([\d,]+\.?\d*)",
            r"price\s*(?:of|at|near)\s*(?:rs\.?\s*)?([\d,]+\.?\d*)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static level pattern"))
        .collect()
    })
}

fn current_price_context(text: &str) -> Option<f64> {
    static PRICE: OnceLock<Regex> = OnceLock::new();
    let regex = PRICE.get_or_init(|| {
        Regex::new(r"current\s+price[:\s]*(?:rs\.?\s*)?([\d,]+\.?\d*)").expect("static price pattern")
    });
    regex
        .captures(text)
        .and_then(|captures| parse_numeric(&captures[1]))
}

/// Numeric levels mentioned near support/resistance vocabulary, sorted and
/// deduplicated for deterministic output.
fn extract_price_levels(text: &str) -> Vec<f64> {
    let mut levels = Vec::new();
    for regex in level_regexes() {
        for captures in regex.captures_iter(text) {
            if let Some(value) = parse_numeric(&captures[1]) {
                if value > LEVEL_MIN && value < LEVEL_MAX {
                    levels.push(value);
                }
            }
        }
    }
    levels.sort_by(|a, b| a.partial_cmp(b).expect("finite levels"));
    levels.dedup();
    levels
}

fn extract_volume_trend(text: &str) -> Option<&'static str> {
    if contains_any(
        text,
        &["volume spike", "volume surge", "heavy volume", "abnormal volume", "volume climax"],
    ) {
        return Some("spike");
    }
    if contains_any(
        text,
        &["increasing volume", "volume increase", "rising volume", "volume confirms", "volume expanding"],
    ) {
        return Some("increasing");
    }
    if contains_any(
        text,
        &["decreasing volume", "volume decline", "falling volume", "low volume", "thin volume", "dry volume"],
    ) {
        return Some("decreasing");
    }
    if contains_any(text, &["no volume", "volume absent", "volume not visible"]) {
        return Some("unavailable");
    }
    None
}

const CANDLESTICK_PATTERNS: &[(&str, &[&str])] = &[
    ("doji", &["doji"]),
    ("hammer", &["hammer"]),
    ("inverted hammer", &["inverted hammer"]),
    ("shooting star", &["shooting star"]),
    ("engulfing bullish", &["bullish engulfing"]),
    ("engulfing bearish", &["bearish engulfing"]),
    ("morning star", &["morning star"]),
    ("evening star", &["evening star"]),
    ("pin bar", &["pin bar"]),
    ("inside bar", &["inside bar"]),
    ("marubozu", &["marubozu"]),
    ("spinning top", &["spinning top"]),
    ("three white soldiers", &["three white soldiers"]),
    ("three black crows", &["three black crows"]),
    ("harami", &["harami"]),
    ("tweezer", &["tweezer"]),
];

const CHART_PATTERNS: &[(&str, &[&str])] = &[
    ("ascending triangle", &["ascending triangle"]),
    ("descending triangle", &["descending triangle"]),
    ("symmetrical triangle", &["symmetrical triangle", "triangle"]),
    ("head and shoulders", &["head and shoulders", "head & shoulders"]),
    ("inverse head and shoulders", &["inverse head and shoulders", "inverse h&s"]),
    ("double top", &["double top"]),
    ("double bottom", &["double bottom"]),
    ("cup and handle", &["cup and handle", "cup & handle"]),
    ("flag", &["bull flag", "bear flag", "flag pattern"]),
    ("pennant", &["pennant"]),
    ("wedge", &["rising wedge", "falling wedge", "wedge"]),
    ("channel", &["ascending channel", "descending channel", "channel"]),
    ("broadening", &["broadening"]),
];

fn match_pattern_table(text: &str, table: &[(&str, &[&str])]) -> Option<String> {
    let found: Vec<&str> = table
        .iter()
        .filter(|(_, keywords)| contains_any(text, keywords))
        .map(|(name, _)| *name)
        .collect();
    if found.is_empty() {
        None
    } else {
        Some(found.join(", "))
    }
}

fn extract_candlestick(text: &str) -> Option<String> {
    match_pattern_table(text, CANDLESTICK_PATTERNS)
}

fn extract_chart_pattern(text: &str) -> Option<String> {
    match_pattern_table(text, CHART_PATTERNS)
}

/// Surrounding context for a matched keyword, for the claim's raw_text
fn find_context(full_text: &str, keyword: &str) -> String {
    let lower = full_text.to_lowercase();
    let keyword_lower = keyword.to_lowercase();
    match lower.find(&keyword_lower) {
        Some(index) => {
            let start = index.saturating_sub(40);
            let end = (index + keyword_lower.len() + 40).min(full_text.len());
            // Snap to char boundaries to stay safe on non-ASCII text
            let start = (0..=start).rev().find(|i| full_text.is_char_boundary(*i)).unwrap_or(0);
            let end = (end..=full_text.len())
                .find(|i| full_text.is_char_boundary(*i))
                .unwrap_or(full_text.len());
            full_text[start..end].trim().to_string()
        }
        None => keyword.to_string(),
    }
}
