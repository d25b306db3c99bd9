//! Marketplace price-string parsing.
//!
//! The price-overview endpoint reports prices as locale-formatted strings
//! ("1 234,56 pуб.", "$12.34"). Parsing strips the currency decoration and
//! normalizes the decimal separator; anything that still fails to parse is
//! a silent `None`, never an error.

use serde::{Deserialize, Serialize};

/// A single price-overview response, normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Cheapest current listing, if parseable.
    pub lowest: Option<f64>,
    /// Median sale price, if reported.
    pub median: Option<f64>,
    /// 24h sale volume, if reported.
    pub volume: Option<u32>,
    /// The marketplace's own formatted lowest-price text, kept for display.
    pub lowest_text: String,
}

/// Strip currency formatting from a price string and parse it as a float.
///
/// When both `.` and `,` appear, the later one is the decimal separator and
/// the other groups thousands. A lone `,` is a decimal separator; repeated
/// separators of one kind group thousands.
pub fn parse_price_str(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) => {
            if dot > comma {
                cleaned.replace(',', "")
            } else {
                cleaned.replace('.', "").replace(',', ".")
            }
        }
        (None, Some(_)) if commas > 1 => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        (Some(_), None) if dots > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_dollar_price() {
        assert_eq!(parse_price_str("$12.34"), Some(12.34));
    }

    #[test]
    fn test_parse_ruble_price() {
        assert_eq!(parse_price_str("1 234,56 pуб."), Some(1234.56));
    }

    #[test]
    fn test_parse_comma_decimal() {
        assert_eq!(parse_price_str("5,20€"), Some(5.2));
    }

    #[test]
    fn test_parse_mixed_separators() {
        // Later separator wins as the decimal point
        assert_eq!(parse_price_str("1,234.56"), Some(1234.56));
        assert_eq!(parse_price_str("1.234,56"), Some(1234.56));
    }

    #[test]
    fn test_parse_thousands_only() {
        assert_eq!(parse_price_str("1,234,567"), Some(1234567.0));
    }

    #[test]
    fn test_parse_trailing_dashes() {
        // "12,--" style: digits and a dangling separator
        assert_eq!(parse_price_str("12,--"), Some(12.0));
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(parse_price_str(""), None);
        assert_eq!(parse_price_str("no price"), None);
        assert_eq!(parse_price_str("-"), None);
        assert_eq!(parse_price_str(",.,"), None);
    }

    #[test]
    fn test_price_quote_default() {
        let quote = PriceQuote::default();
        assert_eq!(quote.lowest, None);
        assert_eq!(quote.lowest_text, "");
    }
}
