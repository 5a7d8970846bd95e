//! Premium matrix computation
//!
//! Pure function over a tick snapshot and a rate snapshot: no state, no IO.
//! Server-computed entries win verbatim; everything else is derived locally
//! by normalizing both legs to USD.
//!
//! Normalization contract: a KRW-quoted tick is only usable through its
//! server-supplied USD-normalized price. Reading raw KRW as USD would be
//! wrong by orders of magnitude, so a KRW leg without `usd_price` is "no
//! data" - there is no fallback to the raw value.

use crate::core::{Exchange, ExchangeRateSnapshot, PriceTick, Quote};
use crate::premium::matrix::{PremiumCell, PremiumMatrix, ServerPremiumMatrix, VenueQuote};
use crate::premium::stablecoin;
use crate::store::TickSnapshot;

/// Premium matrix calculator
///
/// `reference_venue` supplies the USDT/KRW rate the kimchi-mode ratio is
/// taken from.
#[derive(Debug, Clone)]
pub struct PremiumEngine {
    reference_venue: Exchange,
}

impl PremiumEngine {
    pub fn new(reference_venue: Exchange) -> Self {
        Self { reference_venue }
    }

    /// Compute the full directional matrix for `symbol` over every venue
    /// leg present in the snapshot.
    pub fn matrix_for(
        &self,
        symbol: &str,
        ticks: &TickSnapshot,
        rates: Option<&ExchangeRateSnapshot>,
        server: Option<&ServerPremiumMatrix>,
    ) -> PremiumMatrix {
        let leg_ticks: Vec<&PriceTick> = ticks.ticks_for_symbol(symbol).collect();
        let legs: Vec<VenueQuote> = leg_ticks
            .iter()
            .map(|t| VenueQuote::new(t.exchange, t.quote))
            .collect();

        let ratio = self.krw_ratio(rates);
        let mut cells = Vec::with_capacity(legs.len() * legs.len());
        for buy in &leg_ticks {
            for sell in &leg_ticks {
                cells.push(self.cell(symbol, buy, sell, rates, server, ratio));
            }
        }

        PremiumMatrix {
            symbol: symbol.to_string(),
            legs,
            cells,
        }
    }

    fn cell(
        &self,
        symbol: &str,
        buy: &PriceTick,
        sell: &PriceTick,
        rates: Option<&ExchangeRateSnapshot>,
        server: Option<&ServerPremiumMatrix>,
        ratio: Option<f64>,
    ) -> PremiumCell {
        let buy_leg = VenueQuote::new(buy.exchange, buy.quote);
        let sell_leg = VenueQuote::new(sell.exchange, sell.quote);

        // server-side reconciliation is authoritative when present
        if let Some(entry) = server.and_then(|m| m.get(symbol, buy_leg, sell_leg)) {
            return PremiumCell {
                buy: buy_leg,
                sell: sell_leg,
                kimchi_bps: entry.kimchi_premium_bps,
                tether_bps: entry.tether_premium_bps,
            };
        }

        let buy_usd = usd_value(buy, rates);
        let sell_usd = usd_value(sell, rates);
        let raw = premium_bps(buy_usd, sell_usd);

        // USD-normalized prices already route KRW through the venue's own
        // USDT/KRW rate, which is the tether-mode definition
        let tether = raw;

        let krw_leg = buy.quote == Quote::Krw || sell.quote == Quote::Krw;
        let kimchi = if !krw_leg {
            raw
        } else {
            match ratio {
                Some(ratio) => {
                    let adjust = |tick: &PriceTick, usd: Option<f64>| {
                        usd.map(|v| if tick.quote == Quote::Krw { v * ratio } else { v })
                    };
                    premium_bps(adjust(buy, buy_usd), adjust(sell, sell_usd))
                }
                // missing reference rates degrade to the raw premium
                None => raw,
            }
        };

        PremiumCell {
            buy: buy_leg,
            sell: sell_leg,
            kimchi_bps: kimchi,
            tether_bps: tether,
        }
    }

    /// (reference venue USDT/KRW) / (bank USD/KRW); `None` when either rate
    /// is missing or non-positive
    fn krw_ratio(&self, rates: Option<&ExchangeRateSnapshot>) -> Option<f64> {
        let rates = rates?;
        let venue = rates.venue_usdt_krw(self.reference_venue)?;
        let bank = rates.bank_usd_krw()?;
        Some(venue / bank)
    }
}

impl Default for PremiumEngine {
    fn default() -> Self {
        Self::new(Exchange::Upbit)
    }
}

/// USD value of one leg, or `None` when the leg has no usable USD view
fn usd_value(tick: &PriceTick, rates: Option<&ExchangeRateSnapshot>) -> Option<f64> {
    let positive = |v: f64| (v.is_finite() && v > 0.0).then_some(v);
    match tick.quote {
        Quote::Krw => tick.usd_price.and_then(positive),
        Quote::Usd | Quote::Usdt | Quote::Usdc => {
            if let Some(normalized) = tick.usd_price.and_then(positive) {
                return Some(normalized);
            }
            let price = positive(tick.price)?;
            match rates.and_then(|r| stablecoin::usd_rate(r, tick.exchange, tick.quote)) {
                Some(rate) => Some(price * rate),
                // underivable stablecoin rate: assume par
                None => Some(price),
            }
        }
    }
}

/// round(10000 x (sell - buy) / buy); `None` instead of dividing by a zero
/// or missing buy-side value
fn premium_bps(buy_usd: Option<f64>, sell_usd: Option<f64>) -> Option<i64> {
    let buy = buy_usd?;
    let sell = sell_usd?;
    if !buy.is_finite() || !sell.is_finite() || buy <= 0.0 {
        return None;
    }
    Some((10_000.0 * (sell - buy) / buy).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::premium::matrix::ServerPremiumEntry;
    use crate::store::TickStore;

    fn tick(exchange: Exchange, quote: Quote, price: f64, usd_price: Option<f64>) -> PriceTick {
        PriceTick {
            exchange,
            symbol: "BTC".to_string(),
            quote,
            price,
            bid: None,
            ask: None,
            volume_24h: None,
            usd_price,
            received_at: 0,
        }
    }

    fn snapshot(ticks: Vec<PriceTick>) -> TickSnapshot {
        let mut store = TickStore::new();
        store.apply_snapshot(ticks);
        store.snapshot()
    }

    fn krw_rates() -> ExchangeRateSnapshot {
        let mut rates = ExchangeRateSnapshot::default();
        rates.usd_krw = Some(1_350.0);
        rates.usdt_krw.insert(Exchange::Upbit, 1_375.0);
        rates
    }

    const BINANCE_USDT: VenueQuote = VenueQuote {
        exchange: Exchange::Binance,
        quote: Quote::Usdt,
    };
    const UPBIT_KRW: VenueQuote = VenueQuote {
        exchange: Exchange::Upbit,
        quote: Quote::Krw,
    };

    #[test]
    fn test_raw_and_kimchi_premium() {
        // buy Upbit at 49,500 USD-normalized, sell Binance at 50,000:
        // raw = round(10000 * 500 / 49500) = 101 bps
        // kimchi ratio = 1375/1350, adjusted Upbit ~50,417 -> -83 bps
        let snap = snapshot(vec![
            tick(Exchange::Binance, Quote::Usdt, 50_000.0, Some(50_000.0)),
            tick(Exchange::Upbit, Quote::Krw, 68_000_000.0, Some(49_500.0)),
        ]);
        let rates = krw_rates();
        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, Some(&rates), None);

        let cell = matrix.cell(UPBIT_KRW, BINANCE_USDT).unwrap();
        assert_eq!(cell.tether_bps, Some(101));
        assert_eq!(cell.kimchi_bps, Some(-83));

        // reverse direction
        let cell = matrix.cell(BINANCE_USDT, UPBIT_KRW).unwrap();
        assert_eq!(cell.tether_bps, Some(-100));
        assert_eq!(cell.kimchi_bps, Some(83));
    }

    #[test]
    fn test_diagonal_is_zero() {
        let snap = snapshot(vec![tick(Exchange::Binance, Quote::Usdt, 50_000.0, Some(50_000.0))]);
        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, None, None);
        let cell = matrix.cell(BINANCE_USDT, BINANCE_USDT).unwrap();
        // zero premium is a value, distinct from "no data"
        assert_eq!(cell.tether_bps, Some(0));
        assert_eq!(cell.kimchi_bps, Some(0));
    }

    #[test]
    fn test_missing_rates_degrade_to_raw() {
        let snap = snapshot(vec![
            tick(Exchange::Binance, Quote::Usdt, 50_000.0, Some(50_000.0)),
            tick(Exchange::Upbit, Quote::Krw, 68_000_000.0, Some(49_500.0)),
        ]);
        // no rate snapshot at all
        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, None, None);
        let cell = matrix.cell(UPBIT_KRW, BINANCE_USDT).unwrap();
        assert_eq!(cell.kimchi_bps, Some(101));

        // bank rate missing from an otherwise live snapshot
        let mut rates = krw_rates();
        rates.usd_krw = None;
        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, Some(&rates), None);
        let cell = matrix.cell(UPBIT_KRW, BINANCE_USDT).unwrap();
        assert_eq!(cell.kimchi_bps, Some(101));
    }

    #[test]
    fn test_krw_leg_without_normalized_price_is_no_data() {
        // raw KRW must never be read as USD
        let snap = snapshot(vec![
            tick(Exchange::Binance, Quote::Usdt, 50_000.0, Some(50_000.0)),
            tick(Exchange::Upbit, Quote::Krw, 68_000_000.0, None),
        ]);
        let rates = krw_rates();
        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, Some(&rates), None);

        for (buy, sell) in [(UPBIT_KRW, BINANCE_USDT), (BINANCE_USDT, UPBIT_KRW)] {
            let cell = matrix.cell(buy, sell).unwrap();
            assert_eq!(cell.tether_bps, None);
            assert_eq!(cell.kimchi_bps, None);
        }
    }

    #[test]
    fn test_zero_buy_price_is_no_data() {
        let snap = snapshot(vec![
            tick(Exchange::Binance, Quote::Usdt, 0.0, None),
            tick(Exchange::Coinbase, Quote::Usd, 50_000.0, None),
        ]);
        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, None, None);
        let cell = matrix
            .cell(BINANCE_USDT, VenueQuote::new(Exchange::Coinbase, Quote::Usd))
            .unwrap();
        assert_eq!(cell.tether_bps, None);
        assert_eq!(cell.kimchi_bps, None);
    }

    #[test]
    fn test_non_krw_pair_modes_agree() {
        let snap = snapshot(vec![
            tick(Exchange::Binance, Quote::Usdt, 50_000.0, Some(50_000.0)),
            tick(Exchange::Coinbase, Quote::Usd, 50_250.0, None),
        ]);
        let rates = krw_rates();
        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, Some(&rates), None);
        let cell = matrix
            .cell(BINANCE_USDT, VenueQuote::new(Exchange::Coinbase, Quote::Usd))
            .unwrap();
        assert_eq!(cell.tether_bps, Some(50));
        assert_eq!(cell.kimchi_bps, cell.tether_bps);
    }

    #[test]
    fn test_server_entry_wins_verbatim() {
        let snap = snapshot(vec![
            tick(Exchange::Binance, Quote::Usdt, 50_000.0, Some(50_000.0)),
            tick(Exchange::Upbit, Quote::Krw, 68_000_000.0, Some(49_500.0)),
        ]);
        let rates = krw_rates();
        let server = ServerPremiumMatrix {
            premiums: vec![ServerPremiumEntry {
                symbol: "BTC".into(),
                buy_exchange: Exchange::Upbit,
                buy_quote: Quote::Krw,
                sell_exchange: Exchange::Binance,
                sell_quote: Quote::Usdt,
                kimchi_premium_bps: Some(-79),
                tether_premium_bps: Some(99),
            }],
        };
        let matrix =
            PremiumEngine::default().matrix_for("BTC", &snap, Some(&rates), Some(&server));

        let cell = matrix.cell(UPBIT_KRW, BINANCE_USDT).unwrap();
        assert_eq!(cell.tether_bps, Some(99));
        assert_eq!(cell.kimchi_bps, Some(-79));

        // the uncovered direction still derives locally
        let cell = matrix.cell(BINANCE_USDT, UPBIT_KRW).unwrap();
        assert_eq!(cell.tether_bps, Some(-100));
    }

    #[test]
    fn test_stablecoin_leg_derives_through_cross() {
        // Bybit quotes no direct USDT/USD; 0.9998 USDT/USDC and a 1.0001
        // reference USDC/USD give 49,995 USD for a 50,000 USDT leg
        let snap = snapshot(vec![
            tick(Exchange::Bybit, Quote::Usdt, 50_000.0, None),
            tick(Exchange::Binance, Quote::Usdt, 50_000.0, Some(50_000.0)),
        ]);
        let mut rates = ExchangeRateSnapshot::default();
        rates.usdt_usdc.insert(Exchange::Bybit, 0.9998);
        rates.usdc_usd.insert(Exchange::Binance, 1.0001);

        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, Some(&rates), None);
        let cell = matrix
            .cell(VenueQuote::new(Exchange::Bybit, Quote::Usdt), BINANCE_USDT)
            .unwrap();
        assert_eq!(cell.tether_bps, Some(1));
    }

    #[test]
    fn test_symbol_scoping() {
        let mut eth = tick(Exchange::Binance, Quote::Usdt, 2_500.0, Some(2_500.0));
        eth.symbol = "ETH".to_string();
        let snap = snapshot(vec![
            tick(Exchange::Binance, Quote::Usdt, 50_000.0, Some(50_000.0)),
            eth,
        ]);
        let matrix = PremiumEngine::default().matrix_for("BTC", &snap, None, None);
        assert_eq!(matrix.legs.len(), 1);
        assert_eq!(matrix.cells.len(), 1);
    }
}
