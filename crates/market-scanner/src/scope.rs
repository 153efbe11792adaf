//! Scan-scope expansion.
//!
//! Named groups map to fixed instrument lists; comma-separated input is
//! split directly; anything else is treated as a single candidate.

/// Bank Nifty constituents
const BANK_NIFTY: &[&str] = &[
    "HDFCBANK",
    "ICICIBANK",
    "SBIN",
    "KOTAKBANK",
    "AXISBANK",
    "INDUSINDBK",
    "BANKBARODA",
    "PNB",
    "AUBANK",
    "IDFCFIRSTB",
    "FEDERALBNK",
    "BANDHANBNK",
];

/// Nifty 50 constituents
const NIFTY_50: &[&str] = &[
    "RELIANCE",
    "TCS",
    "HDFCBANK",
    "ICICIBANK",
    "INFY",
    "BHARTIARTL",
    "ITC",
    "SBIN",
    "LT",
    "KOTAKBANK",
    "HINDUNILVR",
    "AXISBANK",
    "BAJFINANCE",
    "MARUTI",
    "ASIANPAINT",
    "SUNPHARMA",
    "TITAN",
    "ULTRACEMCO",
    "WIPRO",
    "NESTLEIND",
    "ONGC",
    "NTPC",
    "POWERGRID",
    "M&M",
    "TATAMOTORS",
    "TATASTEEL",
    "JSWSTEEL",
    "ADANIENT",
    "ADANIPORTS",
    "COALINDIA",
    "HCLTECH",
    "TECHM",
    "GRASIM",
    "CIPLA",
    "DRREDDY",
    "DIVISLAB",
    "APOLLOHOSP",
    "EICHERMOT",
    "HEROMOTOCO",
    "BAJAJ-AUTO",
    "BRITANNIA",
    "TATACONSUM",
    "HINDALCO",
    "UPL",
    "SBILIFE",
    "HDFCLIFE",
    "BAJAJFINSV",
    "INDUSINDBK",
    "LTIM",
    "BPCL",
];

/// Expand a free-text scope into candidate tickers.
pub fn expand_scope(scope: &str) -> Vec<String> {
    let cleaned = scope.trim().to_lowercase();

    if cleaned.contains("bank nifty") || cleaned.contains("banknifty") {
        return BANK_NIFTY.iter().map(|s| s.to_string()).collect();
    }
    if cleaned.contains("nifty 50") || cleaned.contains("nifty50") {
        return NIFTY_50.iter().map(|s| s.to_string()).collect();
    }

    if scope.contains(',') {
        return scope
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    let single = scope.trim().to_uppercase();
    if single.is_empty() {
        Vec::new()
    } else {
        vec![single]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_nifty_expands_to_twelve() {
        let candidates = expand_scope("bank nifty");
        assert_eq!(candidates.len(), 12);
        assert!(candidates.contains(&"HDFCBANK".to_string()));
    }

    #[test]
    fn test_nifty_50_expands_to_fifty() {
        assert_eq!(expand_scope("nifty 50 stocks").len(), 50);
    }

    #[test]
    fn test_comma_separated_split() {
        assert_eq!(
            expand_scope("yesbank, kotakbank ,sbin"),
            vec!["YESBANK", "KOTAKBANK", "SBIN"]
        );
    }

    #[test]
    fn test_single_candidate() {
        assert_eq!(expand_scope("yesbank"), vec!["YESBANK"]);
    }

    #[test]
    fn test_empty_scope() {
        assert!(expand_scope("   ").is_empty());
    }
}
