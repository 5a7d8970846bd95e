//! Sync engine
//!
//! Explicitly constructed, explicitly owned orchestration of the whole
//! core: wires the configured event source through the multiplexer into
//! the stores, owns the periodic timers, and publishes immutable snapshots
//! to consumers over watch channels.
//!
//! Lifecycle follows the consumer count. The first [`attach`] spawns the
//! worker (which issues the one-shot bootstrap pulls, subscribes to the
//! stream, and arms the flush / age-refresh / sweep timers); the last
//! detach cancels the worker, and with it every timer and the stream
//! subscription, so a view mounted and unmounted repeatedly leaks nothing.
//!
//! [`attach`]: SyncEngine::attach

use crate::core::{now_millis, ExchangeRateSnapshot};
use crate::infrastructure::config::{Config, SourceKind, StoreSettings};
use crate::premium::{PremiumEngine, PremiumMatrix, ServerPremiumMatrix};
use crate::rest::RestClient;
use crate::store::{OpportunityCache, RankedOpportunities, TickSnapshot, TickStore};
use crate::stream::{
    BridgeHandle, ConnectionStatus, StreamMessage, StreamMultiplexer, StreamSource,
};
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

struct EngineState {
    consumers: usize,
    /// Bumped on teardown so a still-unwinding worker cannot publish into
    /// a newer consumer set
    generation: u64,
    worker: Option<JoinHandle<()>>,
}

struct EngineShared {
    mux: StreamMultiplexer,
    rest: Option<RestClient>,
    settings: StoreSettings,
    tick_tx: watch::Sender<TickSnapshot>,
    opp_tx: watch::Sender<RankedOpportunities>,
    rate_tx: watch::Sender<Option<ExchangeRateSnapshot>>,
    server_tx: watch::Sender<Option<ServerPremiumMatrix>>,
    state: Mutex<EngineState>,
}

impl EngineShared {
    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn detach(&self) {
        let mut state = self.state.lock();
        state.consumers -= 1;
        if state.consumers == 0 {
            state.generation += 1;
            if let Some(worker) = state.worker.take() {
                // cooperative: the worker and its timers stop at the next
                // await point, nothing blocks
                worker.abort();
            }
            // reset published views under the lock so a racing attach
            // cannot observe the old consumer set's data
            self.tick_tx.send_replace(TickSnapshot::default());
            self.opp_tx.send_replace(RankedOpportunities::default());
            self.rate_tx.send_replace(None);
            self.server_tx.send_replace(None);
        }
    }
}

/// Keeps the engine running while at least one consumer holds it
struct ConsumerGuard {
    shared: Arc<EngineShared>,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        self.shared.detach();
    }
}

/// One consumer's view of the engine: immutable snapshots over watch
/// channels. Dropping the handle detaches the consumer.
pub struct EngineHandle {
    pub ticks: watch::Receiver<TickSnapshot>,
    pub opportunities: watch::Receiver<RankedOpportunities>,
    pub exchange_rate: watch::Receiver<Option<ExchangeRateSnapshot>>,
    pub server_premiums: watch::Receiver<Option<ServerPremiumMatrix>>,
    _guard: ConsumerGuard,
}

impl EngineHandle {
    /// Premium matrix for `symbol` over the currently published snapshots
    pub fn matrix_for(&self, symbol: &str, engine: &PremiumEngine) -> PremiumMatrix {
        let ticks = self.ticks.borrow().clone();
        let rates = self.exchange_rate.borrow().clone();
        let server = self.server_premiums.borrow().clone();
        engine.matrix_for(symbol, &ticks, rates.as_ref(), server.as_ref())
    }
}

/// The orchestrated core: multiplexer, stores, timers, bootstrap
pub struct SyncEngine {
    shared: Arc<EngineShared>,
}

impl SyncEngine {
    /// Build over an explicit source. REST bootstrap is enabled when the
    /// configuration carries a `rest_url`.
    pub fn new(source: StreamSource, config: &Config) -> Result<Self> {
        let mux = StreamMultiplexer::new(source, config.stream.reconnect_delay());
        let rest = match &config.stream.rest_url {
            Some(url) => Some(RestClient::new(url.clone())?),
            None => None,
        };

        let (tick_tx, _) = watch::channel(TickSnapshot::default());
        let (opp_tx, _) = watch::channel(RankedOpportunities::default());
        let (rate_tx, _) = watch::channel(None);
        let (server_tx, _) = watch::channel(None);

        Ok(Self {
            shared: Arc::new(EngineShared {
                mux,
                rest,
                settings: config.store.clone(),
                tick_tx,
                opp_tx,
                rate_tx,
                server_tx,
                state: Mutex::new(EngineState {
                    consumers: 0,
                    generation: 0,
                    worker: None,
                }),
            }),
        })
    }

    /// Build with the source kind the configuration selects. For a bridge
    /// source the host-side push handle is returned alongside.
    pub fn from_config(config: &Config) -> Result<(Option<BridgeHandle>, Self)> {
        let (handle, source) = match config.stream.source {
            SourceKind::Socket => (None, StreamSource::socket(config.stream.url.clone())),
            SourceKind::Bridge => {
                let (handle, source) = StreamSource::bridge();
                (Some(handle), source)
            }
        };
        Ok((handle, Self::new(source, config)?))
    }

    /// Attach a consumer. Must be called within a tokio runtime: the first
    /// consumer spawns the worker task.
    pub fn attach(&self) -> EngineHandle {
        let mut state = self.shared.state.lock();
        state.consumers += 1;
        if state.consumers == 1 {
            let shared = self.shared.clone();
            let generation = state.generation;
            state.worker = Some(tokio::spawn(run_worker(shared, generation)));
        }
        drop(state);

        EngineHandle {
            ticks: self.shared.tick_tx.subscribe(),
            opportunities: self.shared.opp_tx.subscribe(),
            exchange_rate: self.shared.rate_tx.subscribe(),
            server_premiums: self.shared.server_tx.subscribe(),
            _guard: ConsumerGuard {
                shared: self.shared.clone(),
            },
        }
    }

    pub fn consumers(&self) -> usize {
        self.shared.state.lock().consumers
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.shared.mux.status()
    }
}

/// Engine worker: bootstrap, then a single select loop owning both stores.
/// All store mutation happens here, so no two mutations can interleave.
async fn run_worker(shared: Arc<EngineShared>, generation: u64) {
    let mut ticks = TickStore::new();
    let mut opportunities = OpportunityCache::new(
        shared.settings.max_ranked,
        shared.settings.min_premium_bps,
        shared.settings.retention(),
    );

    // one-shot pulls to pre-populate state before the first push
    if let Some(rest) = &shared.rest {
        match rest.fetch_prices().await {
            Ok(seed) if !seed.is_empty() => ticks.apply_snapshot(seed),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "price bootstrap failed"),
        }
        match rest.fetch_opportunities().await {
            Ok(seed) if !seed.is_empty() => opportunities.apply_snapshot(seed),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "opportunity bootstrap failed"),
        }
        match rest.fetch_exchange_rate().await {
            Ok(rate) => {
                if shared.is_current(generation) {
                    shared.rate_tx.send_replace(Some(rate));
                }
            }
            Err(e) => tracing::warn!(error = %e, "exchange rate bootstrap failed"),
        }
    }

    let mut sub = shared.mux.subscribe();

    let mut flush = tokio::time::interval(shared.settings.flush_interval());
    let mut age_refresh = tokio::time::interval(shared.settings.age_refresh());
    let mut sweep = tokio::time::interval(shared.settings.sweep_interval());
    for timer in [&mut flush, &mut age_refresh, &mut sweep] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    loop {
        tokio::select! {
            msg = sub.next() => match msg {
                Some(msg) => route_message(&shared, generation, &mut ticks, &mut opportunities, msg),
                None => {
                    tracing::warn!("stream subscription ended");
                    break;
                }
            },
            _ = flush.tick() => {
                if !shared.is_current(generation) {
                    break;
                }
                if ticks.take_dirty() {
                    shared.tick_tx.send_replace(ticks.snapshot());
                }
                if opportunities.take_dirty() {
                    shared.opp_tx.send_replace(opportunities.ranked_view(now_millis()));
                }
            }
            _ = age_refresh.tick() => {
                // touches no data, only marks a republish as due so ages
                // advance without new messages
                opportunities.mark_dirty();
            }
            _ = sweep.tick() => {
                opportunities.sweep(now_millis());
            }
        }
    }
}

fn route_message(
    shared: &EngineShared,
    generation: u64,
    ticks: &mut TickStore,
    opportunities: &mut OpportunityCache,
    msg: StreamMessage,
) {
    match msg {
        StreamMessage::Price(tick) => ticks.apply_delta(tick),
        StreamMessage::Prices(snapshot) => ticks.apply_snapshot(snapshot),
        StreamMessage::Opportunity(opp) => opportunities.apply_delta(opp),
        StreamMessage::Opportunities(snapshot) => opportunities.apply_snapshot(snapshot),
        // singletons bypass the flush discipline, replaced wholesale
        StreamMessage::ExchangeRate(rate) => {
            if shared.is_current(generation) {
                shared.rate_tx.send_replace(Some(rate));
            }
        }
        StreamMessage::Stats(matrix) => {
            if shared.is_current(generation) {
                shared.server_tx.send_replace(Some(matrix));
            }
        }
        // retained and replayed by the multiplexer for its subscribers;
        // nothing for the stores to do
        StreamMessage::CommonMarkets(_) | StreamMessage::WalletStatus(_) => {
            tracing::debug!("reference payload passed through");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    const WAIT: Duration = Duration::from_secs(2);

    fn test_config() -> Config {
        let mut config = Config::default();
        // keep the tests fast
        config.store.flush_interval_ms = 20;
        config.store.age_refresh_ms = 50;
        config.store.sweep_interval_ms = 100;
        config
    }

    fn bridged_engine() -> (BridgeHandle, SyncEngine) {
        let (handle, source) = StreamSource::bridge();
        let engine = SyncEngine::new(source, &test_config()).unwrap();
        (handle, engine)
    }

    #[tokio::test]
    async fn test_pushed_prices_reach_consumers() {
        let (bridge, engine) = bridged_engine();
        let mut handle = engine.attach();

        bridge.push_raw(
            r#"{"type":"prices","data":[
                {"exchange":"binance","symbol":"BTC","quote":"USDT","price":50000.0},
                {"exchange":"upbit","symbol":"BTC","quote":"KRW","price":68000000.0,"usd_price":49500.0}
            ]}"#,
        );

        timeout(WAIT, async {
            while handle.ticks.borrow().len() != 2 {
                handle.ticks.changed().await.unwrap();
            }
        })
        .await
        .expect("tick snapshot never published");
    }

    #[tokio::test]
    async fn test_opportunity_view_ranked() {
        let (bridge, engine) = bridged_engine();
        let mut handle = engine.attach();

        bridge.push_raw(
            r#"{"type":"opportunities","data":[
                {"symbol":"BTC","source_exchange":"binance","source_quote":"USDT",
                 "target_exchange":"upbit","target_quote":"KRW",
                 "source_price":50000.0,"target_price":50400.0,"premium_bps":80},
                {"symbol":"ETH","source_exchange":"bybit","source_quote":"USDT",
                 "target_exchange":"upbit","target_quote":"KRW",
                 "source_price":2500.0,"target_price":2550.0,"premium_bps":200},
                {"symbol":"SOL","source_exchange":"okx","source_quote":"USDT",
                 "target_exchange":"bithumb","target_quote":"KRW",
                 "source_price":150.0,"target_price":150.1,"premium_bps":7}
            ]}"#,
        );

        let view = timeout(WAIT, async {
            while handle.opportunities.borrow().is_empty() {
                handle.opportunities.changed().await.unwrap();
            }
            handle.opportunities.borrow().clone()
        })
        .await
        .expect("ranked view never published");

        let premiums: Vec<i64> = view.iter().map(|r| r.opportunity.premium_bps).collect();
        // below-floor route filtered, rest sorted descending
        assert_eq!(premiums, vec![200, 80]);
    }

    #[tokio::test]
    async fn test_exchange_rate_published_immediately() {
        let (bridge, engine) = bridged_engine();
        let mut handle = engine.attach();

        bridge.push_raw(
            r#"{"type":"exchange_rate","data":{"usd_krw":1350.0,"usdt_krw":{"upbit":1375.0}}}"#,
        );

        timeout(WAIT, async {
            while handle.exchange_rate.borrow().is_none() {
                handle.exchange_rate.changed().await.unwrap();
            }
        })
        .await
        .expect("rate never published");

        let rate = handle.exchange_rate.borrow().clone().unwrap();
        assert_eq!(rate.bank_usd_krw(), Some(1350.0));
    }

    #[tokio::test]
    async fn test_handle_premium_matrix_end_to_end() {
        let (bridge, engine) = bridged_engine();
        let mut handle = engine.attach();

        bridge.push_raw(
            r#"{"type":"prices","data":[
                {"exchange":"binance","symbol":"BTC","quote":"USDT","price":50000.0,"usd_price":50000.0},
                {"exchange":"upbit","symbol":"BTC","quote":"KRW","price":68000000.0,"usd_price":49500.0}
            ]}"#,
        );
        bridge.push_raw(
            r#"{"type":"exchange_rate","data":{"usd_krw":1350.0,"usdt_krw":{"upbit":1375.0}}}"#,
        );

        timeout(WAIT, async {
            while handle.ticks.borrow().len() != 2 {
                handle.ticks.changed().await.unwrap();
            }
            while handle.exchange_rate.borrow().is_none() {
                handle.exchange_rate.changed().await.unwrap();
            }
        })
        .await
        .expect("snapshots never published");

        let matrix = handle.matrix_for("BTC", &PremiumEngine::default());
        let cell = matrix
            .cell(
                crate::premium::VenueQuote::new(crate::core::Exchange::Upbit, crate::core::Quote::Krw),
                crate::premium::VenueQuote::new(crate::core::Exchange::Binance, crate::core::Quote::Usdt),
            )
            .unwrap();
        assert_eq!(cell.tether_bps, Some(101));
        assert_eq!(cell.kimchi_bps, Some(-83));
    }

    #[tokio::test]
    async fn test_server_premiums_published() {
        let (bridge, engine) = bridged_engine();
        let mut handle = engine.attach();

        bridge.push_raw(
            r#"{"type":"stats","data":{"premiums":[
                {"symbol":"BTC","buy_exchange":"upbit","buy_quote":"KRW",
                 "sell_exchange":"binance","sell_quote":"USDT",
                 "kimchi_premium_bps":-79,"tether_premium_bps":99}
            ]}}"#,
        );

        timeout(WAIT, async {
            while handle.server_premiums.borrow().is_none() {
                handle.server_premiums.changed().await.unwrap();
            }
        })
        .await
        .expect("server matrix never published");

        let matrix = handle.server_premiums.borrow().clone().unwrap();
        assert_eq!(matrix.premiums.len(), 1);
        assert_eq!(matrix.premiums[0].tether_premium_bps, Some(99));
    }

    #[tokio::test]
    async fn test_last_detach_tears_down() {
        let (bridge, engine) = bridged_engine();
        let first = engine.attach();
        let second = engine.attach();
        assert_eq!(engine.consumers(), 2);

        bridge.push_raw(r#"{"type":"prices","data":[{"exchange":"binance","symbol":"BTC","quote":"USDT","price":50000.0}]}"#);

        drop(first);
        assert_eq!(engine.consumers(), 1);
        drop(second);
        assert_eq!(engine.consumers(), 0);

        // worker shutdown is cooperative; wait for the stream to go idle
        timeout(WAIT, async {
            while engine.connection_status() != ConnectionStatus::Idle {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection never went idle");
    }

    #[tokio::test]
    async fn test_reattach_restarts_cleanly() {
        let (bridge, engine) = bridged_engine();

        let handle = engine.attach();
        drop(handle);

        let mut handle = engine.attach();
        assert!(handle.ticks.borrow().is_empty());

        bridge.push_raw(r#"{"type":"prices","data":[{"exchange":"okx","symbol":"SOL","quote":"USDT","price":150.0}]}"#);
        timeout(WAIT, async {
            while handle.ticks.borrow().len() != 1 {
                handle.ticks.changed().await.unwrap();
            }
        })
        .await
        .expect("restarted engine never published");
    }
}
