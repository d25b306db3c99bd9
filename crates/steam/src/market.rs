//! Market price-overview lookups.

use crate::client::SteamClient;
use crate::error::SteamError;
use serde::Deserialize;
use tracker_core::{parse_price_str, PriceQuote};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct PriceOverviewResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    lowest_price: Option<String>,
    #[serde(default)]
    median_price: Option<String>,
    #[serde(default)]
    volume: Option<String>,
}

/// Volume strings come back with thousands separators ("1,234").
fn parse_volume(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn quote_from_response(body: PriceOverviewResponse) -> Option<PriceQuote> {
    if !body.success {
        return None;
    }
    let lowest_text = body.lowest_price?;
    Some(PriceQuote {
        lowest: parse_price_str(&lowest_text),
        median: body.median_price.as_deref().and_then(parse_price_str),
        volume: body.volume.as_deref().and_then(parse_volume),
        lowest_text,
    })
}

impl SteamClient {
    /// Fetch the current price overview for a single item.
    ///
    /// Returns `Ok(None)` when the marketplace has no listing data; only
    /// transport-level failures surface as errors.
    pub async fn fetch_price(
        &self,
        market_hash_name: &str,
        currency: u32,
    ) -> Result<Option<PriceQuote>, SteamError> {
        let response = self
            .http()
            .get("https://steamcommunity.com/market/priceoverview/")
            .query(&[
                ("appid", self.app_id().to_string()),
                ("currency", currency.to_string()),
                ("market_hash_name", market_hash_name.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SteamError::from_status(response.status()));
        }

        let body: PriceOverviewResponse = response.json().await?;
        let quote = quote_from_response(body);
        if quote.is_none() {
            debug!(item = market_hash_name, "No market data for item");
        }
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume("1,234"), Some(1234));
        assert_eq!(parse_volume("17"), Some(17));
        assert_eq!(parse_volume(""), None);
        assert_eq!(parse_volume("n/a"), None);
    }

    #[test]
    fn test_quote_from_full_response() {
        let raw = r#"{"success": true, "lowest_price": "$12.34", "volume": "1,204", "median_price": "$12.02"}"#;
        let body: PriceOverviewResponse = serde_json::from_str(raw).expect("parse");

        let quote = quote_from_response(body).expect("quote");
        assert_eq!(quote.lowest, Some(12.34));
        assert_eq!(quote.median, Some(12.02));
        assert_eq!(quote.volume, Some(1204));
        assert_eq!(quote.lowest_text, "$12.34");
    }

    #[test]
    fn test_quote_without_lowest_is_none() {
        let raw = r#"{"success": true}"#;
        let body: PriceOverviewResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(quote_from_response(body), None);
    }

    #[test]
    fn test_quote_failure_is_none() {
        let raw = r#"{"success": false, "lowest_price": "$1.00"}"#;
        let body: PriceOverviewResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(quote_from_response(body), None);
    }

    #[test]
    fn test_quote_keeps_text_when_unparseable() {
        // Malformed numeric part still keeps the display text
        let raw = r#"{"success": true, "lowest_price": "---"}"#;
        let body: PriceOverviewResponse = serde_json::from_str(raw).expect("parse");
        let quote = quote_from_response(body).expect("quote");
        assert_eq!(quote.lowest, None);
        assert_eq!(quote.lowest_text, "---");
    }
}
