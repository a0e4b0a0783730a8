pub mod handlers;
pub mod hub;
pub mod sse;

use std::{collections::HashMap, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use premia_data::{
    feed::{FeedHandle, FeedStatus},
    protocols::ws::backoff::Backoff,
    shared::subscription_models::ExchangeId,
};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use self::hub::Hub;
use crate::{
    resources::{build_shared_domestic, build_shared_overseas, SharedDomestic, SharedOverseas},
    settings::RuntimeConfig,
    watch::{
        cancellable,
        payload::{Phase, WatchEvent, WatchStatus},
        SharedFeeds, WatchDeps, WatchLoop,
    },
};

pub const KEEP_ALIVE_SECS: u64 = 15;

/// (domestic, overseas)
pub type Pair = (ExchangeId, ExchangeId);

#[derive(Debug, Default)]
struct OverseasState {
    bundle: Option<Arc<SharedOverseas>>,
    attempts: u32,
    in_flight: bool,
}

/*----- */
// Supervisor
/*----- */
// Owns the shared venue resources and one watch per (domestic, overseas) pair.
// Bootstrap failures retry per overseas exchange and never block the others.
#[derive(Debug)]
pub struct Supervisor {
    deps: WatchDeps,
    hub: Arc<Hub>,
    config: Mutex<RuntimeConfig>,
    ws_only: bool,
    domestic_exchanges: Vec<ExchangeId>,
    overseas_exchanges: Vec<ExchangeId>,
    domestic: Mutex<HashMap<ExchangeId, Arc<SharedDomestic>>>,
    overseas: Mutex<HashMap<ExchangeId, OverseasState>>,
    controllers: Mutex<HashMap<Pair, watch::Sender<bool>>>,
    shutdown: watch::Sender<bool>,
}

impl Supervisor {
    pub fn new(deps: WatchDeps, hub: Arc<Hub>, config: RuntimeConfig, ws_only: bool) -> Self {
        Self::with_exchanges(
            deps,
            hub,
            config,
            ws_only,
            ExchangeId::DOMESTIC.to_vec(),
            ExchangeId::OVERSEAS.to_vec(),
        )
    }

    pub fn with_exchanges(
        deps: WatchDeps,
        hub: Arc<Hub>,
        config: RuntimeConfig,
        ws_only: bool,
        domestic_exchanges: Vec<ExchangeId>,
        overseas_exchanges: Vec<ExchangeId>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            deps,
            hub,
            config: Mutex::new(config),
            ws_only,
            domestic_exchanges,
            overseas_exchanges,
            domestic: Mutex::new(HashMap::new()),
            overseas: Mutex::new(HashMap::new()),
            controllers: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn config(&self) -> RuntimeConfig {
        *self.config.lock()
    }

    pub fn default_pair(&self) -> Pair {
        let config = self.config();
        (config.domestic_exchange, config.overseas_exchange)
    }

    pub fn start_all(self: &Arc<Self>) {
        info!(
            domestic = ?self.domestic_exchanges,
            overseas = ?self.overseas_exchanges,
            ws_only = self.ws_only,
            "starting watches"
        );
        for overseas in self.overseas_exchanges.iter().copied() {
            tokio::spawn(self.clone().start_overseas(overseas));
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Build the overseas bundle, then one watch per domestic exchange on top of it.
    fn start_overseas(self: Arc<Self>, overseas: ExchangeId) -> BoxFuture<'static, ()> {
        async move {
            {
                let mut states = self.overseas.lock();
                let state = states.entry(overseas).or_default();
                if state.in_flight || state.bundle.is_some() || self.is_shutdown() {
                    return;
                }
                state.in_flight = true;
            }

            let result =
                build_shared_overseas(self.deps.directory.as_ref(), overseas, &self.domestic_exchanges).await;
            match result {
                Ok(bundle) => {
                    let bundle = Arc::new(bundle);
                    {
                        let mut states = self.overseas.lock();
                        let state = states.entry(overseas).or_default();
                        state.bundle = Some(bundle.clone());
                        state.attempts = 0;
                        state.in_flight = false;
                    }
                    let pairs = self
                        .domestic_exchanges
                        .iter()
                        .map(|domestic| (*domestic, overseas))
                        .collect::<Vec<_>>();
                    for feed in bundle.feeds() {
                        self.monitor_feed(feed, pairs.clone());
                    }
                    for (domestic, overseas) in pairs {
                        tokio::spawn(self.clone().start_watch(domestic, overseas, 0));
                    }
                }
                Err(error) => {
                    let attempt = {
                        let mut states = self.overseas.lock();
                        let state = states.entry(overseas).or_default();
                        state.in_flight = false;
                        state.attempts += 1;
                        state.attempts - 1
                    };
                    let delay = Backoff::BOOTSTRAP.delay(attempt);
                    warn!(
                        exchange = %overseas,
                        error = %error,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        action = "retrying overseas bootstrap",
                        "overseas bootstrap failed"
                    );
                    let message = format!("Failed to init {overseas}: {error} | retrying in {}s", delay.as_secs());
                    for domestic in &self.domestic_exchanges {
                        self.hub
                            .publish_status((*domestic, overseas), WatchStatus::error(message.clone()));
                    }

                    let mut shutdown = self.shutdown.subscribe();
                    if cancellable(&mut shutdown, tokio::time::sleep(delay)).await.is_some() {
                        tokio::spawn(self.clone().start_overseas(overseas));
                    }
                }
            }
        }
        .boxed()
    }

    /// The shared domestic feed, built on first use. `None` leaves the watch to
    /// open its own.
    async fn shared_domestic(&self, domestic: ExchangeId) -> Option<Arc<SharedDomestic>> {
        if let Some(bundle) = self.domestic.lock().get(&domestic) {
            return Some(bundle.clone());
        }

        let bundle = match build_shared_domestic(self.deps.directory.as_ref(), domestic).await {
            Ok(bundle) => Arc::new(bundle),
            Err(error) => {
                warn!(exchange = %domestic, error = %error, action = "watch opens its own feed", "shared domestic feed failed");
                return None;
            }
        };

        // Two watches may race to build it; the first one stored wins.
        let stored = self
            .domestic
            .lock()
            .entry(domestic)
            .or_insert_with(|| bundle.clone())
            .clone();
        if Arc::ptr_eq(&stored, &bundle) {
            let pairs = self
                .overseas_exchanges
                .iter()
                .map(|overseas| (domestic, *overseas))
                .collect();
            self.monitor_feed(&bundle.feed, pairs);
        } else {
            bundle.feed.close();
        }
        Some(stored)
    }

    /// (Re)start the watch for one pair, stopping whatever ran there before.
    fn start_watch(self: Arc<Self>, domestic: ExchangeId, overseas: ExchangeId, attempt: u32) -> BoxFuture<'static, ()> {
        async move {
            let pair = (domestic, overseas);
            let bundle = self
                .overseas
                .lock()
                .get(&overseas)
                .and_then(|state| state.bundle.clone());
            let Some(bundle) = bundle else {
                return;
            };
            if self.is_shutdown() {
                return;
            }
            let shared = SharedFeeds {
                domestic: self.shared_domestic(domestic).await,
                overseas: Some(bundle),
            };

            let config = self.config().watch_config(domestic, overseas, self.ws_only);
            let (stop_tx, mut stop_rx) = watch::channel(false);
            if let Some(previous) = self.controllers.lock().insert(pair, stop_tx) {
                let _ = previous.send(true);
            }

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            tokio::spawn(forward_events(self.hub.clone(), pair, events_rx, stop_rx.clone()));

            let watch_loop = WatchLoop::new(config, self.deps.clone(), shared, events_tx);
            let Err(error) = watch_loop.run(stop_rx.clone()).await else {
                return;
            };
            if *stop_rx.borrow() {
                return;
            }

            let delay = Backoff::BOOTSTRAP.delay(attempt);
            warn!(
                domestic = %domestic,
                overseas = %overseas,
                error = %error,
                attempt,
                backoff_ms = delay.as_millis() as u64,
                action = "retrying watch",
                "watch failed to start"
            );
            self.hub.publish_status(
                pair,
                WatchStatus::error(format!("Failed to start watch: {error} | retrying in {}s", delay.as_secs())),
            );
            if cancellable(&mut stop_rx, tokio::time::sleep(delay)).await.is_some() {
                tokio::spawn(self.clone().start_watch(domestic, overseas, attempt + 1));
            }
        }
        .boxed()
    }

    // Shared feeds reconnect on their own; subscribers only hear about the drop.
    fn monitor_feed(&self, feed: &FeedHandle, pairs: Vec<Pair>) {
        let hub = self.hub.clone();
        let venue = feed.venue();
        let mut status = feed.subscribe_status();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let disconnected = *status.borrow_and_update() == FeedStatus::Disconnected;
                if disconnected {
                    warn!(venue = %venue, "shared feed disconnected");
                    let message = format!("{venue} feed disconnected, reconnecting");
                    for pair in &pairs {
                        hub.publish_error(*pair, &message);
                    }
                }
            }
        });
    }

    /// Merge `body` into the runtime config and restart every running watch.
    pub fn apply_config(self: &Arc<Self>, body: &Value) -> RuntimeConfig {
        let config = {
            let mut config = self.config.lock();
            *config = config.merged(body);
            *config
        };
        info!(?config, "runtime config applied");
        self.hub
            .broadcast_status(&WatchStatus::new(Phase::Init, "Config applied. Restarting watch..."));

        let ready = self
            .overseas
            .lock()
            .iter()
            .filter(|(_, state)| state.bundle.is_some())
            .map(|(overseas, _)| *overseas)
            .collect::<Vec<_>>();
        for overseas in ready {
            for domestic in self.domestic_exchanges.iter().copied() {
                tokio::spawn(self.clone().start_watch(domestic, overseas, 0));
            }
        }
        config
    }

    /// Stop every watch and close every shared feed.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        for (_, stop) in self.controllers.lock().drain() {
            let _ = stop.send(true);
        }
        for state in self.overseas.lock().values() {
            if let Some(bundle) = &state.bundle {
                bundle.close();
            }
        }
        for bundle in self.domestic.lock().values() {
            bundle.feed.close();
        }
        info!("watches shut down");
    }
}

// Events of a replaced or stopped watch are dropped.
async fn forward_events(
    hub: Arc<Hub>,
    pair: Pair,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    stop: watch::Receiver<bool>,
) {
    while let Some(event) = events.recv().await {
        if *stop.borrow() {
            continue;
        }
        match event {
            WatchEvent::Tick(payload) => hub.publish_tick(pair, *payload),
            WatchEvent::Status(status) => hub.publish_status(pair, status),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        mock_data::test_utils::{FakeVenues, FixedRate, MockMarket, BITHUMB_WS, GATEIO_PERP_WS, GATEIO_SPOT_WS},
        universe::{UniverseStore, DEFAULT_UNIVERSE_TTL},
    };
    use bytes::Bytes;
    use premia_data::{
        protocols::ws::channel::ChannelTransport,
        rates::RateSource,
        shared::{subscription_models::Venue, utils::ManualClock},
    };
    use std::time::Duration;

    fn supervisor(venues: Arc<FakeVenues>, runtime: &std::path::Path, hub: Arc<Hub>, overseas: Vec<ExchangeId>) -> Arc<Supervisor> {
        let deps = WatchDeps {
            directory: venues,
            universe: Arc::new(UniverseStore::new(
                runtime,
                DEFAULT_UNIVERSE_TTL,
                Arc::new(ManualClock::new(1_000_000)),
            )),
            rates: Arc::new(FixedRate::new(1_400.0)),
            rate_source: RateSource::Custom,
            bootstrap_wait: Duration::from_millis(50),
        };
        Arc::new(Supervisor::with_exchanges(
            deps,
            hub,
            RuntimeConfig::default(),
            true,
            ExchangeId::DOMESTIC.to_vec(),
            overseas,
        ))
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Bytes>, event: &str) -> String {
        let prefix = format!("event: {event}\n");
        let wait = async {
            loop {
                let frame = rx.recv().await.expect("hub dropped the subscriber");
                let text = String::from_utf8(frame.to_vec()).unwrap();
                if text.starts_with(&prefix) {
                    return text;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("event never arrived")
    }

    #[tokio::test]
    async fn test_domestic_pairs_share_overseas_feeds() {
        let runtime = tempfile::tempdir().unwrap();
        let transport = Arc::new(ChannelTransport::default());
        let venues = Arc::new(FakeVenues::new(transport.clone(), Arc::new(ManualClock::new(0))));
        let markets = [
            (Venue::spot(ExchangeId::Bithumb), vec!["AAA", "BBB"], "KRW"),
            (Venue::spot(ExchangeId::Upbit), vec!["AAA"], "KRW"),
            (Venue::spot(ExchangeId::Gateio), vec!["AAA", "BBB"], "USDT"),
            (Venue::perp(ExchangeId::Gateio), vec!["AAA", "BBB"], "USDT"),
        ];
        for (venue, coins, suffix) in markets {
            let market = Arc::new(MockMarket::new(venue));
            market.list(&coins, suffix);
            venues.add_market(market);
        }

        let hub = Arc::new(Hub::new());
        let mut bithumb = hub.subscribe_pair((ExchangeId::Bithumb, ExchangeId::Gateio));
        let mut upbit = hub.subscribe_pair((ExchangeId::Upbit, ExchangeId::Gateio));
        let supervisor = supervisor(venues, runtime.path(), hub, vec![ExchangeId::Gateio]);
        supervisor.start_all();

        next_event(&mut bithumb, "tick").await;
        next_event(&mut upbit, "tick").await;

        assert_eq!(transport.connect_count(GATEIO_PERP_WS), 1);
        assert_eq!(transport.connect_count(GATEIO_SPOT_WS), 1);
        assert_eq!(transport.connect_count(BITHUMB_WS), 1);

        supervisor.shutdown();
    }

    #[tokio::test]
    async fn test_overseas_bootstrap_failure_reports_retry() {
        let runtime = tempfile::tempdir().unwrap();
        let venues = Arc::new(FakeVenues::new(
            Arc::new(ChannelTransport::default()),
            Arc::new(ManualClock::new(0)),
        ));
        let hub = Arc::new(Hub::new());
        let mut rx = hub.subscribe_pair((ExchangeId::Upbit, ExchangeId::Bybit));
        let supervisor = supervisor(venues, runtime.path(), hub, vec![ExchangeId::Bybit]);
        supervisor.start_all();

        let status = next_event(&mut rx, "status").await;
        assert!(status.contains("\"phase\":\"error\""), "{status}");
        assert!(status.contains("Failed to init bybit: no market client for bybit-perp | retrying in 15s"), "{status}");

        supervisor.shutdown();
    }

    #[tokio::test]
    async fn test_apply_config_clamps_and_broadcasts() {
        let runtime = tempfile::tempdir().unwrap();
        let venues = Arc::new(FakeVenues::new(
            Arc::new(ChannelTransport::default()),
            Arc::new(ManualClock::new(0)),
        ));
        let hub = Arc::new(Hub::new());
        let mut auto = hub.subscribe_auto();
        let supervisor = supervisor(venues, runtime.path(), hub, Vec::new());

        let config = supervisor.apply_config(&serde_json::json!({
            "topN": 80,
            "displayTopK": 7,
            "overseasExchange": "okx",
            "domesticExchange": "gateio",
        }));
        assert_eq!(config.top_n, 50);
        assert_eq!(config.display_top_k, 7);
        assert_eq!(supervisor.default_pair(), (ExchangeId::Bithumb, ExchangeId::Okx));
        assert_eq!(supervisor.config(), config);

        let status = next_event(&mut auto, "status").await;
        assert!(status.contains("Config applied. Restarting watch..."));
    }
}
