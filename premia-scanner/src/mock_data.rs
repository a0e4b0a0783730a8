/*----- */
// Test utils
/*----- */
pub mod test_utils {
    use std::{
        collections::{HashMap, HashSet},
        sync::Arc,
        time::Duration,
    };

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use premia_data::{
        assets::quote::Quote,
        error::SocketError,
        exchange::{connect_feed, MarketClient, VenueDirectory},
        feed::FeedHandle,
        orderbook::OrderBook,
        protocols::ws::channel::{ChannelTransport, ServerSession},
        rates::{RateContext, RateError, RateProvider, RateSource},
        shared::{
            subscription_models::{ExchangeId, MarketListing, Venue},
            utils::Clock,
        },
        transfer::{TransferStatus, TransferStatusProvider, UnknownTransferStatus},
    };
    use serde_json::json;

    use crate::universe::SymbolUniverse;

    pub const BITHUMB_WS: &str = "wss://pubwss.bithumb.com/pub/ws";
    pub const GATEIO_SPOT_WS: &str = "wss://api.gateio.ws/ws/v4/";
    pub const GATEIO_PERP_WS: &str = "wss://fx-ws.gateio.ws/v4/ws/usdt";

    /// `{coin}_KRW` domestic ids and `{coin}_USDT` overseas ids.
    pub fn universe_of(coins: &[String]) -> SymbolUniverse {
        let listings = |suffix: &str| {
            coins
                .iter()
                .map(|coin| MarketListing::new(coin.clone(), format!("{coin}_{suffix}")))
                .collect::<Vec<_>>()
        };
        SymbolUniverse::from_listings(&listings("KRW"), &listings("USDT"), &listings("USDT"))
    }

    /*----- */
    // Market client
    /*----- */
    #[derive(Debug, Default)]
    struct MockMarketState {
        listings: Vec<MarketListing>,
        quotes: HashMap<String, Quote>,
        books: HashMap<String, OrderBook>,
        hidden: HashSet<String>,
        failing: HashSet<String>,
        single_calls: Vec<String>,
        bulk_calls: usize,
        markets_fail: bool,
        stalled: bool,
    }

    #[derive(Debug)]
    pub struct MockMarket {
        venue: Venue,
        bulk: bool,
        state: Mutex<MockMarketState>,
    }

    impl MockMarket {
        pub fn new(venue: Venue) -> Self {
            Self {
                venue,
                bulk: false,
                state: Mutex::new(MockMarketState::default()),
            }
        }

        pub fn with_bulk_tickers(mut self) -> Self {
            self.bulk = true;
            self
        }

        /// List `{coin}_{suffix}` for every coin.
        pub fn list(&self, coins: &[&str], suffix: &str) {
            let mut state = self.state.lock();
            for coin in coins {
                state
                    .listings
                    .push(MarketListing::new(coin.to_string(), format!("{coin}_{suffix}")));
            }
        }

        pub fn set_quote(&self, id: &str, quote: Quote) {
            self.state.lock().quotes.insert(id.to_string(), quote);
        }

        pub fn set_book(&self, id: &str, book: OrderBook) {
            self.state.lock().books.insert(id.to_string(), book);
        }

        pub fn hide_from_bulk(&self, id: &str) {
            self.state.lock().hidden.insert(id.to_string());
        }

        pub fn fail_id(&self, id: &str) {
            self.state.lock().failing.insert(id.to_string());
        }

        pub fn fail_markets(&self) {
            self.state.lock().markets_fail = true;
        }

        /// Ticker calls never answer.
        pub fn stall_tickers(&self) {
            self.state.lock().stalled = true;
        }

        async fn maybe_stall(&self) {
            let stalled = self.state.lock().stalled;
            if stalled {
                std::future::pending::<()>().await;
            }
        }

        /// Ids asked for one at a time, sorted.
        pub fn single_calls(&self) -> Vec<String> {
            let mut calls = self.state.lock().single_calls.clone();
            calls.sort();
            calls
        }

        pub fn rest_calls(&self) -> usize {
            let state = self.state.lock();
            state.bulk_calls + state.single_calls.len()
        }

        fn failure(&self, what: &str) -> SocketError {
            SocketError::EmptyResponse {
                exchange: self.venue.exchange,
                what: what.to_string(),
            }
        }
    }

    #[async_trait]
    impl MarketClient for MockMarket {
        fn venue(&self) -> Venue {
            self.venue
        }

        async fn markets(&self) -> Result<Vec<MarketListing>, SocketError> {
            let state = self.state.lock();
            if state.markets_fail {
                return Err(self.failure("markets"));
            }
            Ok(state.listings.clone())
        }

        async fn tickers(&self, ids: &[String]) -> Result<HashMap<String, Quote>, SocketError> {
            self.maybe_stall().await;
            if !self.bulk {
                return Ok(HashMap::new());
            }
            let mut state = self.state.lock();
            state.bulk_calls += 1;
            Ok(ids
                .iter()
                .filter(|id| !state.hidden.contains(*id) && !state.failing.contains(*id))
                .filter_map(|id| state.quotes.get(id).map(|quote| (id.clone(), *quote)))
                .collect())
        }

        async fn ticker(&self, id: &str) -> Result<Option<Quote>, SocketError> {
            self.maybe_stall().await;
            let mut state = self.state.lock();
            state.single_calls.push(id.to_string());
            if state.failing.contains(id) {
                return Err(self.failure(id));
            }
            Ok(state.quotes.get(id).copied())
        }

        async fn order_book(&self, id: &str, _depth: usize) -> Result<OrderBook, SocketError> {
            let state = self.state.lock();
            if state.failing.contains(id) {
                return Err(self.failure(id));
            }
            state.books.get(id).cloned().ok_or_else(|| self.failure(id))
        }
    }

    /*----- */
    // Providers
    /*----- */
    #[derive(Debug)]
    pub struct FakeTransfers {
        pub exchange: ExchangeId,
        pub statuses: HashMap<String, TransferStatus>,
    }

    #[async_trait]
    impl TransferStatusProvider for FakeTransfers {
        fn exchange(&self) -> ExchangeId {
            self.exchange
        }

        async fn statuses(&self, coins: &[String]) -> HashMap<String, TransferStatus> {
            coins
                .iter()
                .filter_map(|coin| self.statuses.get(coin).map(|status| (coin.clone(), status.clone())))
                .collect()
        }
    }

    // Fixed USDT/KRW rate, or a failure once `fail` is called.
    #[derive(Debug)]
    pub struct FixedRate(Mutex<Option<f64>>);

    impl FixedRate {
        pub fn new(usdt_krw: f64) -> Self {
            Self(Mutex::new(Some(usdt_krw)))
        }

        pub fn fail(&self) {
            *self.0.lock() = None;
        }
    }

    #[async_trait]
    impl RateProvider for FixedRate {
        async fn rate_context(&self, source: RateSource) -> Result<RateContext, RateError> {
            match *self.0.lock() {
                Some(rate) => Ok(RateContext::new(source, rate)),
                None => Err(RateError::Invalid {
                    source_name: "fixed",
                    reason: "rate switched off".to_string(),
                }),
            }
        }
    }

    /*----- */
    // Venue directory
    /*----- */
    // Registered mock markets over REST, real connectors over an in-memory transport.
    #[derive(Debug)]
    pub struct FakeVenues {
        pub transport: Arc<ChannelTransport>,
        pub clock: Arc<dyn Clock>,
        pub stale_ms: u64,
        markets: Mutex<HashMap<Venue, Arc<MockMarket>>>,
        transfers: Mutex<HashMap<ExchangeId, Arc<FakeTransfers>>>,
    }

    impl FakeVenues {
        pub fn new(transport: Arc<ChannelTransport>, clock: Arc<dyn Clock>) -> Self {
            Self {
                transport,
                clock,
                stale_ms: 10_000,
                markets: Mutex::new(HashMap::new()),
                transfers: Mutex::new(HashMap::new()),
            }
        }

        pub fn add_market(&self, market: Arc<MockMarket>) {
            self.markets.lock().insert(market.venue(), market);
        }

        pub fn add_transfers(&self, transfers: FakeTransfers) {
            self.transfers
                .lock()
                .insert(transfers.exchange, Arc::new(transfers));
        }
    }

    impl VenueDirectory for FakeVenues {
        fn market_client(&self, venue: Venue) -> Option<Arc<dyn MarketClient>> {
            self.markets
                .lock()
                .get(&venue)
                .cloned()
                .map(|market| market as Arc<dyn MarketClient>)
        }

        fn transfer_provider(&self, exchange: ExchangeId) -> Arc<dyn TransferStatusProvider> {
            match self.transfers.lock().get(&exchange) {
                Some(transfers) => transfers.clone(),
                None => Arc::new(UnknownTransferStatus::new(exchange)),
            }
        }

        fn quote_feed(&self, venue: Venue, ids: Vec<String>) -> Result<FeedHandle, SocketError> {
            connect_feed(
                self.transport.clone(),
                venue,
                ids,
                self.stale_ms,
                self.clock.clone(),
            )
        }
    }

    /// Wait for `count` sockets on `url` to connect and take their server ends.
    pub async fn sessions_for(transport: &ChannelTransport, url: &str, count: usize) -> Vec<ServerSession> {
        let mut sessions = Vec::new();
        for _ in 0..200 {
            sessions.extend(transport.take_sessions_for(url));
            if sessions.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sessions
    }

    /*----- */
    // Socket frames
    /*----- */
    pub fn bithumb_frame(symbol: &str, bid: f64, ask: f64) -> String {
        json!({
            "type": "orderbookdepth",
            "content": {
                "list": [
                    {"symbol": symbol, "orderType": "bid", "price": bid.to_string(), "quantity": "1", "total": "1"},
                    {"symbol": symbol, "orderType": "ask", "price": ask.to_string(), "quantity": "1", "total": "1"},
                ]
            }
        })
        .to_string()
    }

    pub fn gateio_spot_frame(pair: &str, bid: f64, ask: f64) -> String {
        json!({
            "time": 1,
            "channel": "spot.tickers",
            "event": "update",
            "result": {"currency_pair": pair, "lowest_ask": ask.to_string(), "highest_bid": bid.to_string()}
        })
        .to_string()
    }

    pub fn gateio_perp_frame(contract: &str, bid: f64, ask: f64) -> String {
        json!({
            "time": 1,
            "channel": "futures.book_ticker",
            "event": "update",
            "result": {"s": contract, "b": bid.to_string(), "a": ask.to_string()}
        })
        .to_string()
    }
}
