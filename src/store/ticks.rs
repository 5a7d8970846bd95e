//! Latest-value tick store
//!
//! Holds at most one tick per (exchange, symbol, quote) key. A delta
//! replaces its key, a snapshot clears and repopulates the whole map.
//! Superseding is by arrival order only.
//!
//! The store itself is synchronous and exclusively owned by the engine
//! task; consumers only ever see the immutable [`TickSnapshot`] published
//! through the flush scheduler, which bounds the external update rate no
//! matter how hard the inbound stream bursts.

use crate::core::{Exchange, PriceTick, Quote, TickKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable, key-ordered view of the store
#[derive(Debug, Clone, Default)]
pub struct TickSnapshot {
    pub ticks: Arc<Vec<PriceTick>>,
}

impl TickSnapshot {
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceTick> {
        self.ticks.iter()
    }

    pub fn get(&self, exchange: Exchange, symbol: &str, quote: Quote) -> Option<&PriceTick> {
        self.ticks
            .iter()
            .find(|t| t.exchange == exchange && t.symbol == symbol && t.quote == quote)
    }

    /// All venue legs quoting `symbol`, in key order
    pub fn ticks_for_symbol<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a PriceTick> {
        self.ticks.iter().filter(move |t| t.symbol == symbol)
    }
}

/// Latest-value-wins map of price ticks
#[derive(Debug, Default)]
pub struct TickStore {
    ticks: HashMap<TickKey, PriceTick>,
    dirty: bool,
}

impl TickStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the tick's key
    pub fn apply_delta(&mut self, tick: PriceTick) {
        self.ticks.insert(tick.key(), tick);
        self.dirty = true;
    }

    /// Clear and repopulate from a full snapshot. Keys absent from the
    /// snapshot do not survive it.
    pub fn apply_snapshot(&mut self, ticks: Vec<PriceTick>) {
        self.ticks.clear();
        for tick in ticks {
            self.ticks.insert(tick.key(), tick);
        }
        self.dirty = true;
    }

    /// Whether a mutation happened since the flag was last taken, clearing
    /// the flag. The flush scheduler publishes only when this is true.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn get(&self, key: &TickKey) -> Option<&PriceTick> {
        self.ticks.get(key)
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Immutable key-ordered snapshot for consumers
    pub fn snapshot(&self) -> TickSnapshot {
        let mut ticks: Vec<PriceTick> = self.ticks.values().cloned().collect();
        ticks.sort_by(|a, b| {
            (a.exchange, &a.symbol, a.quote).cmp(&(b.exchange, &b.symbol, b.quote))
        });
        TickSnapshot {
            ticks: Arc::new(ticks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tick(exchange: Exchange, symbol: &str, quote: Quote, price: f64) -> PriceTick {
        PriceTick {
            exchange,
            symbol: symbol.to_string(),
            quote,
            price,
            bid: None,
            ask: None,
            volume_24h: None,
            usd_price: None,
            received_at: 0,
        }
    }

    #[test]
    fn test_delta_replaces_key() {
        let mut store = TickStore::new();
        store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdt, 50_000.0));
        store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdt, 50_100.0));
        assert_eq!(store.len(), 1);

        let snap = store.snapshot();
        assert_eq!(snap.ticks[0].price, 50_100.0);
    }

    #[test]
    fn test_distinct_keys_coexist() {
        let mut store = TickStore::new();
        store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdt, 50_000.0));
        store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdc, 50_010.0));
        store.apply_delta(tick(Exchange::Upbit, "BTC", Quote::Krw, 68_000_000.0));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_snapshot_replaces_everything() {
        let mut store = TickStore::new();
        store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdt, 50_000.0));
        store.apply_delta(tick(Exchange::Bybit, "ETH", Quote::Usdt, 2_500.0));

        store.apply_snapshot(vec![tick(Exchange::Okx, "SOL", Quote::Usdt, 150.0)]);
        assert_eq!(store.len(), 1);
        // no key from before the snapshot survives
        let snap = store.snapshot();
        assert!(snap.get(Exchange::Binance, "BTC", Quote::Usdt).is_none());
        assert!(snap.get(Exchange::Okx, "SOL", Quote::Usdt).is_some());
    }

    #[test]
    fn test_dirty_flag_taken_once() {
        let mut store = TickStore::new();
        assert!(!store.take_dirty());
        store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdt, 50_000.0));
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
    }

    #[test]
    fn test_snapshot_is_key_ordered() {
        let mut store = TickStore::new();
        store.apply_delta(tick(Exchange::Coinbase, "BTC", Quote::Usd, 50_050.0));
        store.apply_delta(tick(Exchange::Upbit, "BTC", Quote::Krw, 68_000_000.0));
        store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdt, 50_000.0));

        let snap = store.snapshot();
        let venues: Vec<Exchange> = snap.iter().map(|t| t.exchange).collect();
        assert_eq!(
            venues,
            vec![Exchange::Upbit, Exchange::Binance, Exchange::Coinbase]
        );
    }

    #[test]
    fn test_ticks_for_symbol() {
        let mut store = TickStore::new();
        store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdt, 50_000.0));
        store.apply_delta(tick(Exchange::Upbit, "BTC", Quote::Krw, 68_000_000.0));
        store.apply_delta(tick(Exchange::Binance, "ETH", Quote::Usdt, 2_500.0));

        let snap = store.snapshot();
        assert_eq!(snap.ticks_for_symbol("BTC").count(), 2);
        assert_eq!(snap.ticks_for_symbol("DOGE").count(), 0);
    }

    proptest! {
        /// For any sequence of deltas on one key, the snapshot holds
        /// exactly the last applied value.
        #[test]
        fn prop_latest_value_wins(prices in proptest::collection::vec(0.01f64..1.0e9, 1..50)) {
            let mut store = TickStore::new();
            for p in &prices {
                store.apply_delta(tick(Exchange::Binance, "BTC", Quote::Usdt, *p));
            }
            let snap = store.snapshot();
            prop_assert_eq!(snap.len(), 1);
            prop_assert_eq!(snap.ticks[0].price, *prices.last().unwrap());
        }
    }
}
