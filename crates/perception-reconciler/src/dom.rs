//! DOM claim extraction.
//!
//! The DOM record arrives pre-parsed from the chart page; this module turns
//! it into typed claims. Moving averages become dynamic support/resistance
//! by comparison against the current price; an RSI reading additionally
//! derives a momentum-condition claim.

use analysis_core::{parse_numeric, DomSnapshot};

use crate::claims::{ClaimSource, ClaimValue, Dimension, PerceptionClaim};

/// RSI is a very reliable momentum-condition signal
const RSI_DERIVED_CONFIDENCE: f64 = 0.90;

pub fn extract_dom_claims(dom: &DomSnapshot) -> Vec<PerceptionClaim> {
    let mut claims = Vec::new();
    let price_value = dom.price_value();

    if let Some(price) = &dom.price {
        if let Some(value) = parse_numeric(price) {
            claims.push(PerceptionClaim::new(
                Dimension::Price,
                ClaimValue::Number(value),
                ClaimSource::DomNumeric,
                format!("Price from page title: {price}"),
            ));
        }
    }

    if let Some(change) = &dom.change {
        claims.push(PerceptionClaim::new(
            Dimension::Change,
            ClaimValue::Text(change.clone()),
            ClaimSource::DomText,
            format!("Change: {change}"),
        ));
    }

    // BTreeMap iteration keeps indicator claims in a stable order
    for (name, value) in &dom.indicators {
        let name_lower = name.to_lowercase();

        if name_lower.contains("rsi") {
            if let Some(rsi) = parse_numeric(value) {
                claims.push(PerceptionClaim::new(
                    Dimension::Rsi,
                    ClaimValue::Number(rsi),
                    ClaimSource::DomNumeric,
                    format!("{name}: {value}"),
                ));
                if rsi > 70.0 {
                    claims.push(
                        PerceptionClaim::new(
                            Dimension::MomentumCondition,
                            ClaimValue::Text("exhausting".to_string()),
                            ClaimSource::DomNumeric,
                            format!("RSI={rsi} > 70 -> overbought/exhausting"),
                        )
                        .with_confidence(RSI_DERIVED_CONFIDENCE),
                    );
                } else if rsi < 30.0 {
                    claims.push(
                        PerceptionClaim::new(
                            Dimension::MomentumCondition,
                            ClaimValue::Text("improving".to_string()),
                            ClaimSource::DomNumeric,
                            format!("RSI={rsi} < 30 -> oversold/improving"),
                        )
                        .with_confidence(RSI_DERIVED_CONFIDENCE),
                    );
                }
            }
        } else if ["ema", "sma", "wma"].iter().any(|ma| name_lower.contains(ma)) {
            if let (Some(ma), Some(price)) = (parse_numeric(value), price_value) {
                if ma < price {
                    claims.push(PerceptionClaim::new(
                        Dimension::Support,
                        ClaimValue::Number(ma),
                        ClaimSource::DomNumeric,
                        format!("{name}={value} (below price -> dynamic support)"),
                    ));
                } else {
                    claims.push(PerceptionClaim::new(
                        Dimension::Resistance,
                        ClaimValue::Number(ma),
                        ClaimSource::DomNumeric,
                        format!("{name}={value} (above price -> dynamic resistance)"),
                    ));
                }
            }
        } else if name_lower == "high" {
            if let Some(high) = parse_numeric(value) {
                claims.push(PerceptionClaim::new(
                    Dimension::Resistance,
                    ClaimValue::Number(high),
                    ClaimSource::DomNumeric,
                    format!("Current bar High={value}"),
                ));
            }
        } else if name_lower == "low" {
            if let Some(low) = parse_numeric(value) {
                claims.push(PerceptionClaim::new(
                    Dimension::Support,
                    ClaimValue::Number(low),
                    ClaimSource::DomNumeric,
                    format!("Current bar Low={value}"),
                ));
            }
        } else if name_lower.contains("macd") {
            if let Some(macd) = parse_numeric(value) {
                claims.push(PerceptionClaim::new(
                    Dimension::Macd,
                    ClaimValue::Number(macd),
                    ClaimSource::DomNumeric,
                    format!("MACD={value}"),
                ));
            }
        }
    }

    if let Some(volume) = &dom.volume {
        claims.push(PerceptionClaim::new(
            Dimension::Volume,
            ClaimValue::Text(volume.clone()),
            ClaimSource::DomNumeric,
            format!("Volume from DOM: {volume}"),
        ));
    }

    claims
}
