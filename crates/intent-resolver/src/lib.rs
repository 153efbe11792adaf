//! Canonical intent classification.
//!
//! Normalizes user text into one canonical intent so read-only market work
//! routes directly to its entry point without involving the generic action
//! planner. Classification is pure over (text, dialogue state); first
//! matching rule wins.

mod decompose;
mod dialogue;
mod symbol_hint;

pub use decompose::split_instruction;
pub use dialogue::DialogueState;
pub use symbol_hint::extract_symbol_hint;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalIntent {
    /// Explicit command to change state (open, type, click)
    Action,
    /// Multi-step action (save and close)
    ActionComposite,
    /// Request to perceive current state (what do you see)
    ObserveScreen,
    /// Market analysis request (analyze stock, technical analysis)
    MarketAnalysis,
    /// Multi-instrument market scan
    MarketScan,
    /// Reference to past context (read it, explain that)
    Followup,
    /// Social (hello)
    Greeting,
    /// Fallback for the planner
    Unknown,
}

const OBSERVE_TRIGGERS: &[&str] = &[
    "what do you see",
    "what are you seeing",
    "tell me what you see",
    "describe the screen",
    "describe screen",
    "what is on my screen",
    "whats on my screen",
    "read the screen",
    "do you see",
    "is the app running",
    "check if",
    "what is on the screen",
    "whats on the screen",
];

const FOLLOWUP_TOKENS: &[&str] = &[
    "now",
    "ok",
    "then",
    "what next",
    "next",
    "read it",
    "read that",
    "explain",
    "details",
    "what does it say",
    "raw",
    "ocr",
    "summary",
];

const GREETINGS: &[&str] = &["hello", "hi", "hey", "good morning", "good evening", "namaste"];

const SCAN_KEYWORDS: &[&str] = &[
    "scan",
    "scanner",
    "market scan",
    "scan market",
    "nifty 50",
    "bank nifty",
    "options scan",
    "ce pe",
];

const MARKET_KEYWORDS: &[&str] = &[
    "analyze",
    "analysis",
    "technical analysis",
    "support",
    "resistance",
    "trend",
    "rsi",
    "macd",
    "ema",
    "tradingview",
    "reasoning",
    "synthesis",
    "synthesize",
    "multi-timeframe",
    "multi timeframe",
    "multitimeframe",
    "mtf",
    "scenario",
    "continuation",
    "pullback",
    "failure",
    "dominant",
    "alignment",
    "reversion",
    "stability",
];

const TRADING_KEYWORDS: &[&str] = &["buy", "sell", "trade", "execute", "order"];

const ACTION_KEYWORDS: &[&str] = &["draw", "mark", "click", "type", "open browser"];

const ACTION_VERBS: &[&str] = &[
    "open", "close", "type", "click", "save", "select", "launch", "run", "wait",
];

/// Pure classifier over (text, dialogue state)
pub struct IntentResolver;

impl IntentResolver {
    pub fn new() -> IntentResolver {
        IntentResolver
    }

    /// Map user text to a canonical intent and the text to route onward.
    pub fn resolve(&self, text: &str, state: &DialogueState) -> (CanonicalIntent, String) {
        let clean = normalize(text);

        if OBSERVE_TRIGGERS.iter().any(|t| clean.contains(t)) {
            return (CanonicalIntent::ObserveScreen, text.to_string());
        }

        if FOLLOWUP_TOKENS.contains(&clean.as_str()) {
            // A drill-down only makes sense against a stored observation
            return if state.last_observation.is_some() {
                (CanonicalIntent::Followup, text.to_string())
            } else {
                (
                    CanonicalIntent::ObserveScreen,
                    "what do you see now?".to_string(),
                )
            };
        }

        if GREETINGS.contains(&clean.as_str()) {
            return (CanonicalIntent::Greeting, text.to_string());
        }

        if SCAN_KEYWORDS.iter().any(|kw| clean.contains(kw)) {
            debug!("classified as market scan intent");
            return (CanonicalIntent::MarketScan, text.to_string());
        }

        let has_market = MARKET_KEYWORDS.iter().any(|kw| clean.contains(kw));
        let has_trading = TRADING_KEYWORDS.iter().any(|kw| clean.contains(kw));
        let has_action = ACTION_KEYWORDS.iter().any(|kw| clean.contains(kw));
        if has_market && !has_trading && !has_action {
            debug!("classified as market analysis intent");
            return (CanonicalIntent::MarketAnalysis, text.to_string());
        }

        if ACTION_VERBS.iter().any(|v| clean.starts_with(v)) {
            return if clean.contains(" and ") || clean.contains(" then ") {
                (CanonicalIntent::ActionComposite, text.to_string())
            } else {
                (CanonicalIntent::Action, text.to_string())
            };
        }

        // Question-shaped screen queries the trigger list missed
        if (clean.contains("describe") || clean.contains("tell me") || clean.contains("what is"))
            && (clean.contains("screen") || clean.contains("window") || clean.contains("see"))
        {
            return (CanonicalIntent::ObserveScreen, text.to_string());
        }

        if clean.starts_with("can you ") || clean.starts_with("how do i") {
            if ACTION_VERBS.iter().any(|v| clean.contains(v)) {
                return (CanonicalIntent::Action, text.to_string());
            }
            if clean.contains("see") {
                return (CanonicalIntent::ObserveScreen, text.to_string());
            }
        }

        (CanonicalIntent::Action, text.to_string())
    }
}

impl Default for IntentResolver {
    fn default() -> Self {
        IntentResolver::new()
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .trim_end_matches(['?', '.', '!'])
        .replace('\u{2019}', "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{
        Observation, ObservationResult, ObservationStatus,
    };

    fn state_with_observation() -> DialogueState {
        let mut state = DialogueState::new();
        state.update_observation(ObservationResult {
            observation: Observation::vision("chart"),
            status: ObservationStatus::Success,
            result: Some("a chart".to_string()),
            error: None,
            timestamp: None,
            metadata: None,
        });
        state
    }

    fn resolve(text: &str) -> CanonicalIntent {
        IntentResolver::new().resolve(text, &DialogueState::new()).0
    }

    #[test]
    fn test_observation_triggers() {
        assert_eq!(resolve("What do you see?"), CanonicalIntent::ObserveScreen);
        assert_eq!(resolve("describe the screen"), CanonicalIntent::ObserveScreen);
        assert_eq!(resolve("is the app running?"), CanonicalIntent::ObserveScreen);
    }

    #[test]
    fn test_followup_with_context() {
        let resolver = IntentResolver::new();
        let state = state_with_observation();
        assert_eq!(
            resolver.resolve("now?", &state).0,
            CanonicalIntent::Followup
        );
        assert_eq!(
            resolver.resolve("read it", &state).0,
            CanonicalIntent::Followup
        );
    }

    #[test]
    fn test_followup_without_context_rewrites_to_observe() {
        let resolver = IntentResolver::new();
        let (intent, text) = resolver.resolve("now?", &DialogueState::new());
        assert_eq!(intent, CanonicalIntent::ObserveScreen);
        assert_eq!(text, "what do you see now?");
    }

    #[test]
    fn test_scan_keywords() {
        assert_eq!(resolve("scan bank nifty"), CanonicalIntent::MarketScan);
        assert_eq!(resolve("run the scanner"), CanonicalIntent::MarketScan);
        assert_eq!(resolve("nifty 50 overview"), CanonicalIntent::MarketScan);
    }

    #[test]
    fn test_market_analysis() {
        assert_eq!(resolve("analyze YESBANK"), CanonicalIntent::MarketAnalysis);
        assert_eq!(
            resolve("where is support and resistance for TCS"),
            CanonicalIntent::MarketAnalysis
        );
        assert_eq!(
            resolve("analyze TCS multi-timeframe"),
            CanonicalIntent::MarketAnalysis
        );
    }

    #[test]
    fn test_trading_words_block_market_analysis() {
        assert_eq!(resolve("buy TCS on the trend"), CanonicalIntent::Action);
        assert_eq!(
            resolve("analyze TCS and execute a trade"),
            CanonicalIntent::Action
        );
    }

    #[test]
    fn test_action_words_block_market_analysis() {
        assert_eq!(
            resolve("draw support lines on the chart"),
            CanonicalIntent::Action
        );
    }

    #[test]
    fn test_action_verbs() {
        assert_eq!(resolve("open notepad"), CanonicalIntent::Action);
        assert_eq!(
            resolve("open notepad and type hello"),
            CanonicalIntent::ActionComposite
        );
        assert_eq!(
            resolve("save the file then close it"),
            CanonicalIntent::ActionComposite
        );
    }

    #[test]
    fn test_greeting() {
        assert_eq!(resolve("hello"), CanonicalIntent::Greeting);
        assert_eq!(resolve("Hi!"), CanonicalIntent::Greeting);
    }

    #[test]
    fn test_question_shaped_observe_fallback() {
        assert_eq!(
            resolve("can you describe what is in the screen"),
            CanonicalIntent::ObserveScreen
        );
    }

    #[test]
    fn test_smart_quotes_normalized() {
        assert_eq!(
            resolve("what\u{2019}s on the screen"),
            CanonicalIntent::ObserveScreen
        );
    }

    #[test]
    fn test_classification_is_idempotent_on_routed_text() {
        let resolver = IntentResolver::new();
        let state = DialogueState::new();
        for text in ["analyze YESBANK", "scan bank nifty", "open notepad"] {
            let (intent, routed) = resolver.resolve(text, &state);
            let (again, routed_again) = resolver.resolve(&routed, &state);
            assert_eq!(intent, again);
            assert_eq!(routed, routed_again);
        }
    }
}
