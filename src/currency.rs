//! Currency codes, display formatting, and conversion.
//!
//! Conversion is an external concern: the marketplace stores every amount in
//! the canonical currency and the client converts for display only. Rate
//! math happens in `f64`; callers round at the display boundary.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// Currency every server-side amount is denominated in.
pub const CANONICAL_CURRENCY: &str = "NGN";

/// Upper-cased ISO-style currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    pub fn canonical() -> Self {
        Self::new(CANONICAL_CURRENCY)
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Display symbol for the code; unknown codes fall back to the code
    /// itself so formatting stays total.
    pub fn symbol(&self) -> &str {
        match self.0.as_str() {
            "NGN" => "\u{20a6}",
            "USD" => "$",
            "EUR" => "\u{20ac}",
            "GBP" => "\u{a3}",
            _ => &self.0,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Group an integer amount with thousands separators.
pub fn format_price(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Asynchronous currency conversion service.
///
/// Implementations may fail (rate lookup, transport); callers are expected
/// to fall back to the unconverted canonical amount.
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Convert `amount` from one currency into another. Returns the raw
    /// converted value without rounding.
    async fn convert(&self, amount: i64, from: &Currency, to: &Currency)
        -> Result<f64, ConvertError>;
}

/// Static rate-table converter.
///
/// Rates are expressed as units of each currency per one canonical unit.
/// Same-currency conversions are an identity fast path that needs no table
/// entry, so NGN-to-NGN reconciliation never fails.
pub struct FixedRateConverter {
    rates: HashMap<Currency, f64>,
}

impl FixedRateConverter {
    pub fn new(rates: HashMap<Currency, f64>) -> Self {
        let mut rates = rates;
        rates.entry(Currency::canonical()).or_insert(1.0);
        Self { rates }
    }

    /// Converter with no table entries; only identity conversions succeed.
    pub fn identity() -> Self {
        Self::new(HashMap::new())
    }

    pub fn with_rate(mut self, code: &str, rate: f64) -> Self {
        self.rates.insert(Currency::new(code), rate);
        self
    }

    fn rate(&self, currency: &Currency) -> Result<f64, ConvertError> {
        self.rates
            .get(currency)
            .copied()
            .filter(|r| *r > 0.0)
            .ok_or_else(|| ConvertError::RateUnavailable {
                currency: currency.code().to_string(),
            })
    }
}

#[async_trait]
impl CurrencyConverter for FixedRateConverter {
    async fn convert(
        &self,
        amount: i64,
        from: &Currency,
        to: &Currency,
    ) -> Result<f64, ConvertError> {
        if from == to {
            return Ok(amount as f64);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        Ok(amount as f64 / from_rate * to_rate)
    }
}

/// Rate-lookup converter backed by an HTTP conversion endpoint.
pub struct HttpRateConverter {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    converted: f64,
}

impl HttpRateConverter {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CurrencyConverter for HttpRateConverter {
    async fn convert(
        &self,
        amount: i64,
        from: &Currency,
        to: &Currency,
    ) -> Result<f64, ConvertError> {
        if from == to {
            return Ok(amount as f64);
        }
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("amount", amount.to_string()),
                ("from", from.code().to_string()),
                ("to", to.code().to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConvertError::Lookup(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body: ConvertResponse = response
            .json()
            .await
            .map_err(|e| ConvertError::Lookup(e.to_string()))?;
        Ok(body.converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price_grouping() {
        assert_eq!(format_price(0), "0");
        assert_eq!(format_price(999), "999");
        assert_eq!(format_price(1250), "1,250");
        assert_eq!(format_price(1234567), "1,234,567");
        assert_eq!(format_price(-4500), "-4,500");
    }

    #[test]
    fn test_symbols() {
        assert_eq!(Currency::new("ngn").symbol(), "\u{20a6}");
        assert_eq!(Currency::new("USD").symbol(), "$");
        assert_eq!(Currency::new("XYZ").symbol(), "XYZ");
    }

    #[test]
    fn test_identity_conversion_needs_no_table() {
        let converter = FixedRateConverter::identity();
        let ngn = Currency::canonical();
        let value = tokio_test::block_on(converter.convert(1000, &ngn, &ngn)).unwrap();
        assert_eq!(value, 1000.0);
    }

    #[test]
    fn test_fixed_rate_conversion() {
        let converter = FixedRateConverter::identity().with_rate("USD", 0.00065);
        let value = tokio_test::block_on(converter.convert(
            1_000_000,
            &Currency::canonical(),
            &Currency::new("USD"),
        ))
        .unwrap();
        assert!((value - 650.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rate_fails() {
        let converter = FixedRateConverter::identity();
        let result = tokio_test::block_on(converter.convert(
            100,
            &Currency::canonical(),
            &Currency::new("USD"),
        ));
        assert!(result.is_err());
    }
}
