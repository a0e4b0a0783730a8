pub mod bithumb;
pub mod bybit;
pub mod gateio;
pub mod hyperliquid;
pub mod lighter;
pub mod okx;
pub mod upbit;

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use futures::{stream, StreamExt};

use crate::{
    assets::quote::Quote,
    error::SocketError,
    feed::{spawn_feed, FeedHandle},
    orderbook::OrderBook,
    protocols::ws::Transport,
    shared::{
        subscription_models::{ExchangeId, MarketKind, MarketListing, Venue},
        utils::Clock,
    },
    transfer::{
        bithumb::BithumbTransferStatus, gateio::GateioTransferStatus, TransferStatusProvider,
        UnknownTransferStatus,
    },
};

// Parallel per market ticker calls when a venue has no bulk endpoint.
const TICKER_FAN_OUT: usize = 8;

/*----- */
// Market client
/*----- */
// Read only view of one venue market used by the scanner. Order placement and
// balances live outside this crate.
#[async_trait]
pub trait MarketClient: Send + Sync + Debug {
    fn venue(&self) -> Venue;

    /// Tradable markets quoted in KRW (domestic) or USDT/USDC (overseas).
    async fn markets(&self) -> Result<Vec<MarketListing>, SocketError>;

    /// Bulk top of book. Venues without a bulk endpoint return an empty map and
    /// callers fall back to `ticker`.
    async fn tickers(&self, _ids: &[String]) -> Result<HashMap<String, Quote>, SocketError> {
        Ok(HashMap::new())
    }

    async fn ticker(&self, id: &str) -> Result<Option<Quote>, SocketError> {
        Ok(self.order_book(id, 5).await?.top_of_book())
    }

    async fn order_book(&self, id: &str, depth: usize) -> Result<OrderBook, SocketError>;
}

/// Tickers for `ids` one by one with a small fan out. Failed ids are left out.
pub async fn tickers_one_by_one(
    client: &dyn MarketClient,
    ids: &[String],
) -> HashMap<String, Quote> {
    stream::iter(ids.iter().cloned())
        .map(|id| async move {
            let quote = client.ticker(&id).await.ok().flatten();
            (id, quote)
        })
        .buffer_unordered(TICKER_FAN_OUT)
        .filter_map(|(id, quote)| async move { quote.map(|quote| (id, quote)) })
        .collect()
        .await
}

/*----- */
// Venue directory
/*----- */
// Everything the scanner needs to construct per venue. The live directory talks
// to the real exchanges, tests swap in fakes.
pub trait VenueDirectory: Send + Sync + Debug {
    fn market_client(&self, venue: Venue) -> Option<Arc<dyn MarketClient>>;

    fn transfer_provider(&self, exchange: ExchangeId) -> Arc<dyn TransferStatusProvider>;

    fn quote_feed(&self, venue: Venue, ids: Vec<String>) -> Result<FeedHandle, SocketError>;
}

#[derive(Debug, Clone)]
pub struct LiveVenues {
    pub transport: Arc<dyn Transport>,
    pub stale_ms: u64,
    pub clock: Arc<dyn Clock>,
}

impl LiveVenues {
    pub fn new(transport: Arc<dyn Transport>, stale_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            stale_ms,
            clock,
        }
    }
}

impl VenueDirectory for LiveVenues {
    fn market_client(&self, venue: Venue) -> Option<Arc<dyn MarketClient>> {
        let client: Arc<dyn MarketClient> = match (venue.exchange, venue.kind) {
            (ExchangeId::Bithumb, MarketKind::Spot) => Arc::new(bithumb::http::BithumbClient::new()),
            (ExchangeId::Upbit, MarketKind::Spot) => Arc::new(upbit::http::UpbitClient::new()),
            (ExchangeId::Gateio, kind) => Arc::new(gateio::http::GateioClient::new(kind)),
            (ExchangeId::Bybit, kind) => Arc::new(bybit::http::BybitClient::new(kind)),
            (ExchangeId::Okx, kind) => Arc::new(okx::http::OkxClient::new(kind)),
            (ExchangeId::Hyperliquid, kind) => {
                Arc::new(hyperliquid::http::HyperliquidClient::new(kind))
            }
            (ExchangeId::Lighter, kind) => Arc::new(lighter::http::LighterClient::new(kind)),
            _ => return None,
        };
        Some(client)
    }

    fn transfer_provider(&self, exchange: ExchangeId) -> Arc<dyn TransferStatusProvider> {
        match exchange {
            ExchangeId::Bithumb => Arc::new(BithumbTransferStatus::new()),
            ExchangeId::Gateio => Arc::new(GateioTransferStatus::new()),
            other => Arc::new(UnknownTransferStatus::new(other)),
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

/// Start the quote feed for `venue` over `transport`.
pub fn connect_feed(
    transport: Arc<dyn Transport>,
    venue: Venue,
    ids: Vec<String>,
    stale_ms: u64,
    clock: Arc<dyn Clock>,
) -> Result<FeedHandle, SocketError> {
    let handle = match (venue.exchange, venue.kind) {
        (ExchangeId::Bithumb, MarketKind::Spot) => spawn_feed(
            bithumb::BithumbOrderBookWs,
            transport,
            ids,
            stale_ms,
            clock,
        ),
        (ExchangeId::Upbit, MarketKind::Spot) => {
            spawn_feed(upbit::UpbitOrderBookWs, transport, ids, stale_ms, clock)
        }
        (ExchangeId::Gateio, MarketKind::Spot) => {
            spawn_feed(gateio::GateioSpotTickerWs, transport, ids, stale_ms, clock)
        }
        (ExchangeId::Gateio, MarketKind::Perp) => spawn_feed(
            gateio::GateioFuturesBookTickerWs,
            transport,
            ids,
            stale_ms,
            clock,
        ),
        (ExchangeId::Bybit, kind) => spawn_feed(
            bybit::BybitOrderBookWs::new(kind),
            transport,
            ids,
            stale_ms,
            clock,
        ),
        (ExchangeId::Okx, kind) => spawn_feed(
            okx::OkxTickerWs::new(kind),
            transport,
            ids,
            stale_ms,
            clock,
        ),
        (ExchangeId::Hyperliquid, kind) => spawn_feed(
            hyperliquid::HyperliquidL2BookWs::new(kind),
            transport,
            ids,
            stale_ms,
            clock,
        ),
        (ExchangeId::Lighter, kind) => spawn_feed(
            lighter::LighterOrderBookWs::new(kind),
            transport,
            ids,
            stale_ms,
            clock,
        ),
        (exchange, kind) => return Err(SocketError::UnsupportedMarket { exchange, kind }),
    };
    Ok(handle)
}
