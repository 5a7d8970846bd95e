//! Cross-exchange arbitrage opportunity
//!
//! Opportunities are computed server-side; this core only caches the latest
//! one per route and ages it out. The route key deliberately excludes quote
//! currencies: a newer opportunity for the same (symbol, source, target)
//! replaces the old one even if the quoting changed.

use super::{Exchange, Quote};
use serde::{Deserialize, Serialize};

/// Route identity: (symbol, source exchange, target exchange)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub symbol: String,
    pub source: Exchange,
    pub target: Exchange,
}

/// One live arbitrage route: buy on source, sell on target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    pub source_exchange: Exchange,
    pub source_quote: Quote,
    pub target_exchange: Exchange,
    pub target_quote: Quote,
    pub source_price: f64,
    pub target_price: f64,
    /// Raw premium in basis points
    pub premium_bps: i64,
    #[serde(default)]
    pub kimchi_premium_bps: Option<i64>,
    #[serde(default)]
    pub tether_premium_bps: Option<i64>,
    /// Detection confidence in [0, 1], when the server reports one
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Executable depth behind the quote, USD notional
    #[serde(default)]
    pub depth_usd: Option<f64>,
    /// Arrival timestamp (epoch ms), stamped locally on receipt
    #[serde(skip)]
    pub received_at: u64,
}

impl Opportunity {
    pub fn key(&self) -> RouteKey {
        RouteKey {
            symbol: self.symbol.clone(),
            source: self.source_exchange,
            target: self.target_exchange,
        }
    }

    /// Age relative to `now` (epoch ms); saturates at zero for clock skew
    #[inline]
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.received_at)
    }
}
