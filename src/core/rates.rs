//! Reference exchange-rate snapshot
//!
//! Singleton state replaced wholesale on each `exchange_rate` message. Holds
//! the bank USD/KRW rate plus the per-venue stablecoin rates the premium
//! engine normalizes with. No history is kept.

use super::Exchange;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current FX and stablecoin reference rates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSnapshot {
    /// Official bank USD/KRW rate (KRW per USD)
    #[serde(default)]
    pub usd_krw: Option<f64>,
    /// Per-venue USDT/KRW market rate (KRW per USDT)
    #[serde(default)]
    pub usdt_krw: HashMap<Exchange, f64>,
    /// Per-venue direct USDT/USD market rate
    #[serde(default)]
    pub usdt_usd: HashMap<Exchange, f64>,
    /// Per-venue direct USDC/USD market rate
    #[serde(default)]
    pub usdc_usd: HashMap<Exchange, f64>,
    /// Per-venue USDT/USDC cross rate (USDC per USDT), for venues with no
    /// direct fiat pair
    #[serde(default)]
    pub usdt_usdc: HashMap<Exchange, f64>,
    /// Arrival timestamp (epoch ms), stamped locally on receipt
    #[serde(skip)]
    pub received_at: u64,
}

impl ExchangeRateSnapshot {
    /// Bank USD/KRW rate, filtered to positive finite values
    pub fn bank_usd_krw(&self) -> Option<f64> {
        self.usd_krw.filter(|r| r.is_finite() && *r > 0.0)
    }

    /// A venue's USDT/KRW rate, filtered to positive finite values
    pub fn venue_usdt_krw(&self, venue: Exchange) -> Option<f64> {
        self.usdt_krw
            .get(&venue)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_payload() {
        let json = r#"{
            "usd_krw": 1350.0,
            "usdt_krw": {"upbit": 1375.0, "bithumb": 1372.5},
            "usdc_usd": {"binance": 1.0001},
            "usdt_usdc": {"bybit": 0.9998}
        }"#;
        let snap: ExchangeRateSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.bank_usd_krw(), Some(1350.0));
        assert_eq!(snap.venue_usdt_krw(Exchange::Upbit), Some(1375.0));
        assert_eq!(snap.venue_usdt_krw(Exchange::Binance), None);
        assert!(snap.usdt_usd.is_empty());
    }

    #[test]
    fn test_non_positive_rates_filtered() {
        let mut snap = ExchangeRateSnapshot::default();
        snap.usd_krw = Some(0.0);
        snap.usdt_krw.insert(Exchange::Upbit, -1.0);
        assert_eq!(snap.bank_usd_krw(), None);
        assert_eq!(snap.venue_usdt_krw(Exchange::Upbit), None);
    }
}
