//! Stablecoin USD rate derivation
//!
//! Gives the USD value of one quote-currency unit on a venue. Venues with a
//! direct USDT/USD or USDC/USD market use it; a venue quoting only the
//! USDT/USDC cross derives the missing fiat rate through the average direct
//! rate across venues that do quote it. The venue that pegs its USD pairs
//! to USDC at par is excluded from that average and assigned exactly 1.0 -
//! compounding a derivation through its own non-market peg would bias every
//! derived rate.

use crate::core::{Exchange, ExchangeRateSnapshot, Quote};

fn positive(rate: &f64) -> bool {
    rate.is_finite() && *rate > 0.0
}

/// USD value of one unit of `quote` on `venue`; `None` when underivable
pub fn usd_rate(rates: &ExchangeRateSnapshot, venue: Exchange, quote: Quote) -> Option<f64> {
    match quote {
        Quote::Usd => Some(1.0),
        Quote::Usdt => usdt_usd(rates, venue),
        Quote::Usdc => usdc_usd(rates, venue),
        Quote::Krw => None,
    }
}

/// USDT/USD for a venue: direct market rate, else derived through the
/// venue's USDT/USDC cross and the reference USDC/USD average
pub fn usdt_usd(rates: &ExchangeRateSnapshot, venue: Exchange) -> Option<f64> {
    if let Some(direct) = rates.usdt_usd.get(&venue).copied().filter(positive) {
        return Some(direct);
    }
    let cross = rates.usdt_usdc.get(&venue).copied().filter(positive)?;
    Some(cross * usdc_usd_reference(rates)?)
}

/// USDC/USD for a venue: the pegged venue is exactly 1.0 by platform
/// convention; otherwise direct, else derived through the inverse cross
pub fn usdc_usd(rates: &ExchangeRateSnapshot, venue: Exchange) -> Option<f64> {
    if venue.pegs_usd_to_usdc() {
        return Some(1.0);
    }
    if let Some(direct) = rates.usdc_usd.get(&venue).copied().filter(positive) {
        return Some(direct);
    }
    // USDC/USD = (USDT/USD) / (USDT/USDC)
    let cross = rates.usdt_usdc.get(&venue).copied().filter(positive)?;
    Some(usdt_usd_reference(rates)? / cross)
}

/// Average direct USDC/USD across quoting venues, excluding the pegged one
pub fn usdc_usd_reference(rates: &ExchangeRateSnapshot) -> Option<f64> {
    average_excluding_peg(&rates.usdc_usd)
}

/// Average direct USDT/USD across quoting venues, excluding the pegged one
pub fn usdt_usd_reference(rates: &ExchangeRateSnapshot) -> Option<f64> {
    average_excluding_peg(&rates.usdt_usd)
}

fn average_excluding_peg(direct: &std::collections::HashMap<Exchange, f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (venue, rate) in direct {
        if venue.pegs_usd_to_usdc() || !positive(rate) {
            continue;
        }
        sum += rate;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}
