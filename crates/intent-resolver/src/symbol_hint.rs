//! Lightweight symbol-hint extraction from user text.

/// Uppercase command words that are never tickers
const STOPWORDS: &[&str] = &[
    "ANALYZE", "ANALYSIS", "CHART", "SCAN", "MARKET", "STOCK", "TREND", "SUPPORT", "RESISTANCE",
    "MTF", "RSI", "MACD", "EMA", "SMA", "WMA", "OHLC", "THE", "AND", "FOR", "WITH", "NOW", "CE",
    "PE", "NSE", "BSE", "PLEASE", "MULTI", "TIMEFRAME", "DAILY", "WEEKLY", "MONTHLY",
];

/// Lift the first ticker-shaped uppercase word out of free text.
///
/// A hint is all-uppercase alphanumeric, 2 to 15 chars, contains at least
/// one letter, and is not a known command word.
pub fn extract_symbol_hint(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .find(|token| {
            (2..=15).contains(&token.len())
                && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
                && token.chars().any(|c| c.is_ascii_alphabetic())
                && !STOPWORDS.contains(token)
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_ticker_from_command() {
        assert_eq!(
            extract_symbol_hint("analyze YESBANK multi-timeframe"),
            Some("YESBANK".to_string())
        );
        assert_eq!(
            extract_symbol_hint("has NIFTY trend changed?"),
            Some("NIFTY".to_string())
        );
    }

    #[test]
    fn test_stopwords_are_skipped() {
        assert_eq!(extract_symbol_hint("ANALYZE THE CHART"), None);
        assert_eq!(
            extract_symbol_hint("ANALYZE TCS CHART"),
            Some("TCS".to_string())
        );
    }

    #[test]
    fn test_lowercase_words_are_not_hints() {
        assert_eq!(extract_symbol_hint("analyze tata consumer"), None);
    }

    #[test]
    fn test_numeric_only_tokens_are_not_hints() {
        assert_eq!(extract_symbol_hint("analyze 500 stocks"), None);
        assert_eq!(extract_symbol_hint("analyze M50 today"), Some("M50".to_string()));
    }

    #[test]
    fn test_punctuation_is_trimmed() {
        assert_eq!(
            extract_symbol_hint("what about SBIN?"),
            Some("SBIN".to_string())
        );
    }
}
