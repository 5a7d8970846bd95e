//! Price tick data
//!
//! A tick is the latest price observation for one (exchange, symbol, quote)
//! combination. Ticks are replaced wholesale, never partially updated, and
//! arrival order decides which tick wins - payload timestamps are ignored.

use super::{Exchange, Quote};
use serde::{Deserialize, Serialize};

/// Identity key of a tick: one entry per key exists at any time
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickKey {
    pub exchange: Exchange,
    pub symbol: String,
    pub quote: Quote,
}

/// Latest price observation for one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub exchange: Exchange,
    /// Base asset, e.g. "BTC"
    pub symbol: String,
    pub quote: Quote,
    /// Last trade price in the quote currency
    pub price: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    /// 24h traded volume in the quote currency
    #[serde(default, rename = "volume")]
    pub volume_24h: Option<f64>,
    /// Server-computed USD-normalized price. For KRW markets this routes
    /// through the venue's own USDT/KRW rate and is the only valid USD view
    /// of the tick; raw KRW must never be read as USD.
    #[serde(default)]
    pub usd_price: Option<f64>,
    /// Arrival timestamp (epoch ms), stamped locally on receipt
    #[serde(skip)]
    pub received_at: u64,
}

impl PriceTick {
    pub fn key(&self) -> TickKey {
        TickKey {
            exchange: self.exchange,
            symbol: self.symbol.clone(),
            quote: self.quote,
        }
    }

    /// Mid price when both sides of the book are present
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) if b > 0.0 && a > 0.0 => Some((b + a) / 2.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_payload() {
        let json = r#"{
            "exchange": "upbit",
            "symbol": "BTC",
            "quote": "KRW",
            "price": 68000000.0,
            "bid": 67999000.0,
            "ask": 68001000.0,
            "volume": 1234.5,
            "usd_price": 49500.0
        }"#;
        let tick: PriceTick = serde_json::from_str(json).unwrap();
        assert_eq!(tick.exchange, Exchange::Upbit);
        assert_eq!(tick.quote, Quote::Krw);
        assert_eq!(tick.usd_price, Some(49500.0));
        assert_eq!(tick.received_at, 0); // stamped on arrival, not parsed
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{"exchange":"binance","symbol":"ETH","quote":"USDT","price":2500.0}"#;
        let tick: PriceTick = serde_json::from_str(json).unwrap();
        assert_eq!(tick.bid, None);
        assert_eq!(tick.usd_price, None);
        assert_eq!(tick.mid(), None);
    }

    #[test]
    fn test_key_identity() {
        let json = r#"{"exchange":"binance","symbol":"BTC","quote":"USDT","price":50000.0}"#;
        let a: PriceTick = serde_json::from_str(json).unwrap();
        let mut b = a.clone();
        b.price = 51000.0;
        assert_eq!(a.key(), b.key());
    }
}
