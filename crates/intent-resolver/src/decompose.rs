//! Compound-instruction splitting.
//!
//! Only non-market instructions are decomposed; market analysis and market
//! scan requests are atomic. Separators inside quoted spans are preserved.

use crate::CanonicalIntent;

const SEPARATORS: &[&str] = &[" and ", " then "];

/// Split a compound instruction into sequential parts.
pub fn split_instruction(intent: CanonicalIntent, text: &str) -> Vec<String> {
    if matches!(
        intent,
        CanonicalIntent::MarketAnalysis | CanonicalIntent::MarketScan
    ) {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quote: Option<char> = None;
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match in_quote {
            Some(q) if c == q => {
                in_quote = None;
                current.push(c);
                i += 1;
            }
            Some(_) => {
                current.push(c);
                i += 1;
            }
            None => {
                if c == '"' || c == '\'' {
                    in_quote = Some(c);
                    current.push(c);
                    i += 1;
                    continue;
                }
                let rest: String = chars[i..].iter().collect();
                if let Some(sep) = SEPARATORS.iter().find(|sep| rest.starts_with(**sep)) {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() {
                        parts.push(trimmed.to_string());
                    }
                    current.clear();
                    i += sep.len();
                } else {
                    current.push(c);
                    i += 1;
                }
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        parts.push(text.trim().to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_split() {
        assert_eq!(
            split_instruction(CanonicalIntent::ActionComposite, "open notepad and type hello"),
            vec!["open notepad", "type hello"]
        );
    }

    #[test]
    fn test_then_separator() {
        assert_eq!(
            split_instruction(CanonicalIntent::ActionComposite, "save the file then close it"),
            vec!["save the file", "close it"]
        );
    }

    #[test]
    fn test_quoted_separator_is_preserved() {
        assert_eq!(
            split_instruction(
                CanonicalIntent::ActionComposite,
                "type \"salt and pepper\" and save"
            ),
            vec!["type \"salt and pepper\"", "save"]
        );
    }

    #[test]
    fn test_market_intents_are_atomic() {
        assert_eq!(
            split_instruction(
                CanonicalIntent::MarketAnalysis,
                "analyze support and resistance for TCS"
            ),
            vec!["analyze support and resistance for TCS"]
        );
        assert_eq!(
            split_instruction(CanonicalIntent::MarketScan, "scan bank nifty and nifty 50"),
            vec!["scan bank nifty and nifty 50"]
        );
    }

    #[test]
    fn test_no_separator_returns_whole() {
        assert_eq!(
            split_instruction(CanonicalIntent::Action, "open notepad"),
            vec!["open notepad"]
        );
    }
}
