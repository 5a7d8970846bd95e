//! Core data model
//!
//! Fundamental types shared by every component:
//! - Exchange / Quote: venue and quote-currency identifiers
//! - PriceTick: latest-value price observation, keyed by (exchange, symbol, quote)
//! - Opportunity: latest-value arbitrage route, keyed by (symbol, source, target)
//! - ExchangeRateSnapshot: singleton FX / stablecoin reference rates

pub mod opportunity;
pub mod rates;
pub mod tick;
pub mod venue;

pub use opportunity::{Opportunity, RouteKey};
pub use rates::ExchangeRateSnapshot;
pub use tick::{PriceTick, TickKey};
pub use venue::{Exchange, Quote};

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock epoch milliseconds. Used to stamp arrival timestamps; a clock
/// before the epoch degrades to 0 rather than panicking.
#[inline]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
