//! Premium matrix types
//!
//! A matrix is computed per symbol over the venue legs present in a tick
//! snapshot. Cells hold `Option<i64>` basis points: `None` is the "no data"
//! sentinel and is never conflated with a premium of zero.

use crate::core::{Exchange, Quote};
use serde::{Deserialize, Serialize};

/// One axis entry: a venue together with the quote currency of its market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VenueQuote {
    pub exchange: Exchange,
    pub quote: Quote,
}

impl VenueQuote {
    pub fn new(exchange: Exchange, quote: Quote) -> Self {
        Self { exchange, quote }
    }
}

impl std::fmt::Display for VenueQuote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.exchange, self.quote)
    }
}

/// One directional cell: buy on `buy`, sell on `sell`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PremiumCell {
    pub buy: VenueQuote,
    pub sell: VenueQuote,
    /// Premium against the bank USD/KRW rate; `None` = no data
    pub kimchi_bps: Option<i64>,
    /// Premium against the venue USDT/KRW rate; `None` = no data
    pub tether_bps: Option<i64>,
}

/// Directional premium table for one symbol, row-major over `legs`
#[derive(Debug, Clone, Default, Serialize)]
pub struct PremiumMatrix {
    pub symbol: String,
    pub legs: Vec<VenueQuote>,
    pub cells: Vec<PremiumCell>,
}

impl PremiumMatrix {
    pub fn cell(&self, buy: VenueQuote, sell: VenueQuote) -> Option<&PremiumCell> {
        let row = self.legs.iter().position(|l| *l == buy)?;
        let col = self.legs.iter().position(|l| *l == sell)?;
        self.cells.get(row * self.legs.len() + col)
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

/// Server-computed entry for one directional pair. Authoritative: it
/// reflects server-side reconciliation this core does not reimplement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerPremiumEntry {
    pub symbol: String,
    pub buy_exchange: Exchange,
    pub buy_quote: Quote,
    pub sell_exchange: Exchange,
    pub sell_quote: Quote,
    #[serde(default)]
    pub kimchi_premium_bps: Option<i64>,
    #[serde(default)]
    pub tether_premium_bps: Option<i64>,
}

/// Server-computed premium entries, delivered on the `stats` envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerPremiumMatrix {
    #[serde(default)]
    pub premiums: Vec<ServerPremiumEntry>,
}

impl ServerPremiumMatrix {
    /// Exact (exchange, quote) match on both sides
    pub fn get(&self, symbol: &str, buy: VenueQuote, sell: VenueQuote) -> Option<&ServerPremiumEntry> {
        self.premiums.iter().find(|e| {
            e.symbol == symbol
                && e.buy_exchange == buy.exchange
                && e.buy_quote == buy.quote
                && e.sell_exchange == sell.exchange
                && e.sell_quote == sell.quote
        })
    }
}
