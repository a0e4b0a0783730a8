pub mod payload;
pub mod ranking;
pub mod snapshot;
pub mod transfer;

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};

use premia_data::{
    error::SocketError,
    exchange::VenueDirectory,
    feed::FeedHandle,
    rates::{RateContext, RateError, RateProvider, RateSource},
    shared::subscription_models::{ExchangeId, Venue},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use self::{
    payload::{payload_time, PayloadMode, Phase, RateSummary, TickPayload, WatchEvent, WatchStatus},
    ranking::{initial_watch_coins, rows_for, Ranker},
    snapshot::{merge_latest, FeedSet, PriceInputs, Progress, RestMarkets, SnapshotRow},
    transfer::TransferBook,
};
use crate::{
    fees::PairFees,
    resources::{SharedDomestic, SharedOverseas},
    settings::WatchConfig,
    universe::{SymbolUniverse, UniverseStore},
};

pub const TRANSFER_REFRESH: Duration = Duration::from_secs(5 * 60);
pub const BOOTSTRAP_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("no coins trade on both {domestic} and {overseas}")]
    EmptyUniverse {
        domestic: ExchangeId,
        overseas: ExchangeId,
    },

    #[error("no market client for {0}")]
    VenueUnavailable(Venue),

    #[error("{0} lists no markets")]
    NoMarkets(ExchangeId),

    #[error("WebSocket-only mode requires active WS feeds.")]
    FeedsRequired,

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error(transparent)]
    Rate(#[from] RateError),
}

/*----- */
// Dependencies
/*----- */
// Built once at process start and handed to every watch.
#[derive(Debug, Clone)]
pub struct WatchDeps {
    pub directory: Arc<dyn VenueDirectory>,
    pub universe: Arc<UniverseStore>,
    pub rates: Arc<dyn RateProvider>,
    pub rate_source: RateSource,
    pub bootstrap_wait: Duration,
}

/// Feeds and clients owned by the server and lent to every watch on the same venue.
#[derive(Debug, Clone, Default)]
pub struct SharedFeeds {
    pub domestic: Option<Arc<SharedDomestic>>,
    pub overseas: Option<Arc<SharedOverseas>>,
}

/*----- */
// Cancellation
/*----- */
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        // A dropped sender also stops the watch.
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// `None` when the stop signal wins.
pub(crate) async fn cancellable<F: Future>(stop: &mut watch::Receiver<bool>, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = wait_for_stop(stop) => None,
        output = future => Some(output),
    }
}

/*----- */
// Pricer
/*----- */
// Per watch price state: live feeds first, REST for whatever they miss.
#[derive(Debug)]
pub struct Pricer {
    pub feeds: Option<FeedSet>,
    pub rest: RestMarkets,
    pub latest: HashMap<String, SnapshotRow>,
    last_fallback: Option<u64>,
}

impl Pricer {
    pub fn new(feeds: Option<FeedSet>, rest: RestMarkets, initial: Vec<SnapshotRow>) -> Self {
        let mut latest = HashMap::new();
        merge_latest(&mut latest, initial);
        Self {
            feeds,
            rest,
            latest,
            last_fallback: None,
        }
    }

    fn fallback_due(&self, tick: u64, config: &WatchConfig) -> bool {
        !config.ws_only
            && self
                .last_fallback
                .map_or(true, |last| tick.saturating_sub(last) >= config.fallback_every_ticks())
    }

    /// Coins with no fresh row, plus coins never priced completely.
    fn fallback_coins(&self, fresh: &[SnapshotRow], watch_coins: &[String]) -> Vec<String> {
        let fresh_by_coin = fresh
            .iter()
            .map(|row| (row.coin.as_str(), row))
            .collect::<HashMap<_, _>>();
        watch_coins
            .iter()
            .filter(|coin| {
                let fresh_row = fresh_by_coin.get(coin.as_str());
                let complete = fresh_row.is_some_and(|row| row.is_complete())
                    || self.latest.get(*coin).is_some_and(SnapshotRow::is_complete);
                fresh_row.is_none() || !complete
            })
            .cloned()
            .collect()
    }

    /// Rows for this tick in watch order. Every watched coin keeps its latest row,
    /// except in ws_only mode where only coins the feeds priced this tick appear.
    pub async fn refresh(
        &mut self,
        tick: u64,
        inputs: PriceInputs<'_>,
        watch_coins: &[String],
        config: &WatchConfig,
    ) -> Result<Vec<SnapshotRow>, WatchError> {
        let fresh = match &self.feeds {
            None if config.ws_only => return Err(WatchError::FeedsRequired),
            None => None,
            Some(feeds) => Some(feeds.rows(inputs)),
        };

        // Feeds that price nothing get a full snapshot every tick, partial
        // coverage only tops up on the fallback cadence.
        let (targets, throttled) = match &fresh {
            None => (watch_coins.to_vec(), false),
            Some(_) if config.ws_only => (Vec::new(), false),
            Some(fresh) if fresh.is_empty() => (watch_coins.to_vec(), false),
            Some(fresh) if self.fallback_due(tick, config) => (self.fallback_coins(fresh, watch_coins), true),
            Some(_) => (Vec::new(), false),
        };

        let mut priced = fresh.unwrap_or_default();
        if !targets.is_empty() {
            debug!(
                tick,
                fresh = priced.len(),
                fallback = targets.len(),
                "rest snapshot for coins the feeds miss"
            );
            let snapshot = self
                .rest
                .snapshot(inputs, &targets, config.pricing, config.concurrency, config.depth, None);
            priced.extend(snapshot.await);
            if throttled {
                self.last_fallback = Some(tick);
            }
        }

        let seen = priced
            .iter()
            .map(|row| row.coin.clone())
            .collect::<HashSet<_>>();
        merge_latest(&mut self.latest, priced);
        if config.ws_only {
            Ok(watch_coins
                .iter()
                .filter(|coin| seen.contains(*coin))
                .filter_map(|coin| self.latest.get(coin).cloned())
                .collect())
        } else {
            Ok(rows_for(&self.latest, watch_coins))
        }
    }
}

fn carried(feed: &FeedHandle, ids: impl Iterator<Item = String>) -> Vec<String> {
    ids.filter(|id| feed.symbols().contains(id)).collect()
}

/// Wait until the feeds quote every symbol they carry for `feeds.symbols`.
async fn wait_for_feeds(feeds: &FeedSet, timeout: Duration) -> bool {
    let domestic_ids = carried(&feeds.domestic, feeds.symbols.iter().map(|s| s.domestic.clone()));
    let perp_ids = carried(&feeds.perp, feeds.symbols.iter().map(|s| s.perp.clone()));
    let spot = feeds.spot.clone().map(|feed| {
        let ids = carried(&feed, feeds.symbols.iter().filter_map(|s| s.spot.clone()));
        (feed, ids)
    });
    let spot_ready = async move {
        match spot {
            Some((feed, ids)) => feed.wait_for_symbols(&ids, timeout).await,
            None => true,
        }
    };

    let (domestic, perp, spot) = tokio::join!(
        feeds.domestic.wait_for_symbols(&domestic_ids, timeout),
        feeds.perp.wait_for_symbols(&perp_ids, timeout),
        spot_ready
    );
    domestic && perp && spot
}

/*----- */
// Watch loop
/*----- */
struct Session {
    universe: SymbolUniverse,
    fees: PairFees,
    watch_coins: Vec<String>,
    rate: RateContext,
    transfers: TransferBook,
    transfers_at: Instant,
    pricer: Pricer,
    owned_feeds: Vec<FeedHandle>,
}

// One (domestic, overseas) pair: init, transfer load, then a tick every interval
// until stopped.
#[derive(Debug)]
pub struct WatchLoop {
    config: WatchConfig,
    deps: WatchDeps,
    shared: SharedFeeds,
    events: mpsc::UnboundedSender<WatchEvent>,
}

impl WatchLoop {
    pub fn new(
        config: WatchConfig,
        deps: WatchDeps,
        shared: SharedFeeds,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Self {
        Self {
            config: config.normalized(),
            deps,
            shared,
            events,
        }
    }

    fn status(&self, status: WatchStatus) {
        let _ = self.events.send(WatchEvent::Status(status));
    }

    fn init_status(&self, message: impl Into<String>) {
        self.status(WatchStatus::new(Phase::Init, message));
    }

    /// Runs until `stop` flips or its sender is dropped. Errors only come from init;
    /// the owner decides whether to retry.
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> Result<(), WatchError> {
        let domestic = self.config.domestic_exchange;
        let overseas = self.config.overseas_exchange;

        let mut session = match cancellable(&mut stop, self.init()).await {
            None => {
                self.status(WatchStatus::new(Phase::Stopped, "watch stopped"));
                return Ok(());
            }
            Some(Err(error)) => {
                warn!(domestic = %domestic, overseas = %overseas, error = %error, "watch init failed");
                return Err(error);
            }
            Some(Ok(session)) => session,
        };

        info!(
            domestic = %domestic,
            overseas = %overseas,
            coins = session.watch_coins.len(),
            feeds = session.pricer.feeds.is_some(),
            "watch started"
        );
        self.tick_loop(&mut session, &mut stop).await;

        for feed in &session.owned_feeds {
            feed.close();
        }
        self.status(WatchStatus::new(Phase::Stopped, "watch stopped"));
        info!(domestic = %domestic, overseas = %overseas, "watch stopped");
        Ok(())
    }

    fn rest_markets(&self) -> Result<RestMarkets, WatchError> {
        let directory = &self.deps.directory;
        let domestic_venue = Venue::spot(self.config.domestic_exchange);
        let perp_venue = Venue::perp(self.config.overseas_exchange);
        let shared = self
            .shared
            .overseas
            .as_ref()
            .filter(|shared| shared.exchange == self.config.overseas_exchange);

        let domestic = directory
            .market_client(domestic_venue)
            .ok_or(WatchError::VenueUnavailable(domestic_venue))?;
        let perp = shared
            .and_then(|shared| shared.perp.clone())
            .or_else(|| directory.market_client(perp_venue))
            .ok_or(WatchError::VenueUnavailable(perp_venue))?;
        let spot = match shared {
            Some(shared) => shared.spot.clone(),
            None => directory.market_client(Venue::spot(self.config.overseas_exchange)),
        };

        Ok(RestMarkets { domestic, spot, perp })
    }

    fn own_feed(&self, venue: Venue, ids: Vec<String>, owned: &mut Vec<FeedHandle>) -> Option<FeedHandle> {
        if ids.is_empty() {
            return None;
        }
        match self.deps.directory.quote_feed(venue, ids) {
            Ok(feed) => {
                owned.push(feed.clone());
                Some(feed)
            }
            Err(error) => {
                warn!(venue = %venue, error = %error, action = "pricing over rest", "quote feed unavailable");
                None
            }
        }
    }

    /// Shared feeds where the server provides them, otherwise feeds of our own.
    fn connect_feeds(&self, universe: &SymbolUniverse, coins: &[String]) -> (Option<FeedSet>, Vec<FeedHandle>) {
        let symbols = FeedSet::symbols_for(universe, coins);
        if symbols.is_empty() {
            return (None, Vec::new());
        }

        let mut owned = Vec::new();
        let domestic = match self
            .shared
            .domestic
            .as_ref()
            .filter(|shared| shared.exchange == self.config.domestic_exchange)
        {
            Some(shared) => Some(shared.feed.clone()),
            None => self.own_feed(
                Venue::spot(self.config.domestic_exchange),
                symbols.iter().map(|s| s.domestic.clone()).collect(),
                &mut owned,
            ),
        };

        let overseas = self
            .shared
            .overseas
            .as_ref()
            .filter(|shared| shared.exchange == self.config.overseas_exchange);
        let (perp, spot) = match overseas {
            Some(shared) => (shared.perp_feed.clone(), shared.spot_feed.clone()),
            None => (
                self.own_feed(
                    Venue::perp(self.config.overseas_exchange),
                    symbols.iter().map(|s| s.perp.clone()).collect(),
                    &mut owned,
                ),
                self.own_feed(
                    Venue::spot(self.config.overseas_exchange),
                    symbols.iter().filter_map(|s| s.spot.clone()).collect(),
                    &mut owned,
                ),
            ),
        };

        match (domestic, perp) {
            (Some(domestic), Some(perp)) => (
                Some(FeedSet {
                    domestic,
                    perp,
                    spot,
                    symbols,
                }),
                owned,
            ),
            _ => {
                for feed in &owned {
                    feed.close();
                }
                (None, Vec::new())
            }
        }
    }

    async fn load_transfers(&self, coins: &[String]) -> TransferBook {
        let directory = &self.deps.directory;
        TransferBook::load(
            &directory.transfer_provider(self.config.domestic_exchange),
            &directory.transfer_provider(self.config.overseas_exchange),
            coins,
        )
        .await
    }

    async fn init(&self) -> Result<Session, WatchError> {
        let config = &self.config;
        let (domestic, overseas) = (config.domestic_exchange, config.overseas_exchange);

        self.init_status("Loading symbol universe...");
        let markets = self.rest_markets()?;
        let universe = self
            .deps
            .universe
            .resolve(
                domestic,
                overseas,
                markets.domestic.as_ref(),
                markets.spot.as_deref(),
                markets.perp.as_ref(),
            )
            .await?;
        let candidates = universe.candidates();
        if candidates.is_empty() {
            return Err(WatchError::EmptyUniverse { domestic, overseas });
        }
        self.init_status(format!("Universe loaded ({} coins)", candidates.len()));

        let rate = self.deps.rates.rate_context(self.deps.rate_source).await?;
        let fees = PairFees::new(domestic, overseas);
        let inputs = PriceInputs {
            universe: &universe,
            fees,
            usdt_krw: rate.usdt_krw,
            notional_krw: config.notional_krw,
        };

        let initial_rows = if config.ws_only {
            self.init_status("WebSocket-only mode: waiting for live quotes...");
            Vec::new()
        } else {
            self.init_status("Fetching initial quotes...");
            let events = self.events.clone();
            let progress: Progress = Arc::new(move |done: usize, total: usize| {
                let status = WatchStatus::progress(format!("Init progress {done}/{total}"), done, total);
                let _ = events.send(WatchEvent::Status(status));
            });
            let snapshot = markets.snapshot(
                inputs,
                &candidates,
                config.pricing,
                config.concurrency,
                config.depth,
                Some(progress),
            );
            let rows = match tokio::time::timeout(self.deps.bootstrap_wait, snapshot).await {
                Ok(rows) => rows,
                Err(_) => {
                    warn!(domestic = %domestic, overseas = %overseas, action = "continuing on feeds", "initial snapshot timed out");
                    Vec::new()
                }
            };
            if rows.is_empty() {
                self.init_status("Initial quotes empty; falling back to websocket updates.");
            }
            rows
        };

        let watch_coins = initial_watch_coins(&initial_rows, &candidates, config, rate.usdt_krw);
        self.init_status(format!("Initial list ready ({})", watch_coins.len()));

        let (feeds, owned_feeds) = if config.use_websocket {
            self.init_status("Connecting WebSocket feeds...");
            let (feeds, owned) = self.connect_feeds(&universe, &watch_coins);
            if let Some(feeds) = &feeds {
                if !wait_for_feeds(feeds, self.deps.bootstrap_wait).await {
                    debug!(domestic = %domestic, overseas = %overseas, "feeds not fully warm, ticking anyway");
                }
            }
            self.init_status("WebSocket feeds ready");
            (feeds, owned)
        } else {
            (None, Vec::new())
        };

        self.status(WatchStatus::new(Phase::Transfer, "Fetching transfer networks/fees..."));
        let transfers = self.load_transfers(&watch_coins).await;
        self.status(WatchStatus::new(Phase::Transfer, "Transfer info loaded"));

        Ok(Session {
            pricer: Pricer::new(feeds, markets, initial_rows),
            universe,
            fees,
            watch_coins,
            rate,
            transfers,
            transfers_at: Instant::now(),
            owned_feeds,
        })
    }

    async fn tick_loop(&self, session: &mut Session, stop: &mut watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_sec));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick = 0u64;

        loop {
            if cancellable(stop, interval.tick()).await.is_none() {
                return;
            }
            tick += 1;

            match cancellable(stop, self.tick(session, tick)).await {
                None => return,
                Some(Ok(payload)) => {
                    let _ = self.events.send(WatchEvent::Tick(Box::new(payload)));
                    self.status(WatchStatus::new(Phase::Tick, format!("tick {tick}")));
                }
                Some(Err(error)) => {
                    warn!(
                        domestic = %self.config.domestic_exchange,
                        overseas = %self.config.overseas_exchange,
                        tick,
                        error = %error,
                        "tick failed"
                    );
                    self.status(WatchStatus::error(format!("tick failed: {error}")));
                }
            }
        }
    }

    async fn tick(&self, session: &mut Session, tick: u64) -> Result<TickPayload, WatchError> {
        match self.deps.rates.rate_context(self.deps.rate_source).await {
            Ok(rate) => session.rate = rate,
            Err(error) => {
                warn!(error = %error, action = "keeping last rate", "rate refresh failed");
            }
        }

        if session.transfers_at.elapsed() >= TRANSFER_REFRESH {
            session.transfers = self.load_transfers(&session.watch_coins).await;
            session.transfers_at = Instant::now();
            self.status(WatchStatus::new(Phase::Transfer, "Transfer status refreshed"));
        }

        let inputs = PriceInputs {
            universe: &session.universe,
            fees: session.fees,
            usdt_krw: session.rate.usdt_krw,
            notional_krw: self.config.notional_krw,
        };
        let rows = session
            .pricer
            .refresh(tick, inputs, &session.watch_coins, &self.config)
            .await?;

        let ranker = Ranker {
            config: &self.config,
            usdt_krw: session.rate.usdt_krw,
            transfers: &session.transfers,
        };
        let ranking = ranker.rank(&rows, &session.watch_coins);

        Ok(TickPayload {
            tick,
            time: payload_time(),
            mode: PayloadMode::Pair,
            rate: RateSummary::from(&session.rate),
            config: self.config,
            watch_coins: session.watch_coins.clone(),
            close_coins: ranking.close_coins,
            far_coins: ranking.far_coins,
            rows: ranking.rows,
            all_rows: ranking.all_rows,
        })
    }
}
