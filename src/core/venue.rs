//! Venue and quote-currency identifiers
//!
//! Every tick and opportunity is keyed by an exchange and the currency the
//! price is quoted in. Wire names are lowercase for exchanges ("upbit") and
//! uppercase for quotes ("USDT"), matching the stream payloads.

use serde::{Deserialize, Serialize};

/// Exchange identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Upbit,
    Bithumb,
    Binance,
    Bybit,
    Okx,
    Coinbase,
}

impl Exchange {
    /// All supported venues, in display order
    pub const ALL: [Exchange; 6] = [
        Exchange::Upbit,
        Exchange::Bithumb,
        Exchange::Binance,
        Exchange::Bybit,
        Exchange::Okx,
        Exchange::Coinbase,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Upbit => "upbit",
            Exchange::Bithumb => "bithumb",
            Exchange::Binance => "binance",
            Exchange::Bybit => "bybit",
            Exchange::Okx => "okx",
            Exchange::Coinbase => "coinbase",
        }
    }

    /// Venues trading against KRW order books
    #[inline]
    pub fn is_krw_venue(&self) -> bool {
        matches!(self, Exchange::Upbit | Exchange::Bithumb)
    }

    /// Venue whose fiat USD pairs settle as USDC at a fixed 1:1 platform peg.
    /// Its quoted USDC/USD rate is a convention, not a market price, so the
    /// stablecoin cross-rate derivation must not average it in.
    #[inline]
    pub fn pegs_usd_to_usdc(&self) -> bool {
        matches!(self, Exchange::Coinbase)
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Quote currency of a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quote {
    Usd,
    Usdt,
    Usdc,
    Krw,
}

impl Quote {
    pub fn code(&self) -> &'static str {
        match self {
            Quote::Usd => "USD",
            Quote::Usdt => "USDT",
            Quote::Usdc => "USDC",
            Quote::Krw => "KRW",
        }
    }

    /// USD-pegged stablecoins and USD itself
    #[inline]
    pub fn is_usd_family(&self) -> bool {
        !matches!(self, Quote::Krw)
    }
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
