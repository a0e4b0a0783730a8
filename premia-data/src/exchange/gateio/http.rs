use std::{borrow::Cow, collections::HashMap};

use async_trait::async_trait;
use serde::Serialize;

use super::model::{
    GateioContract, GateioCurrencyPair, GateioFuturesTicker, GateioOrderBook, GateioSpotTicker,
};
use crate::{
    assets::quote::Quote,
    error::SocketError,
    exchange::MarketClient,
    orderbook::OrderBook,
    protocols::http::{client::RestClient, rest_request::RestRequest},
    shared::subscription_models::{ExchangeId, MarketKind, MarketListing, Venue},
};

pub const GATEIO_BASE_HTTP_URL: &str = "https://api.gateio.ws";

/*----- */
// Requests
/*----- */
struct SpotPairs;

impl RestRequest for SpotPairs {
    type Response = Vec<GateioCurrencyPair>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v4/spot/currency_pairs")
    }
}

struct FuturesContracts;

impl RestRequest for FuturesContracts {
    type Response = Vec<GateioContract>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v4/futures/usdt/contracts")
    }
}

#[derive(Serialize, Default)]
struct TickerParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    currency_pair: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contract: Option<String>,
}

struct SpotTickers(TickerParams);

impl RestRequest for SpotTickers {
    type Response = Vec<GateioSpotTicker>;
    type QueryParams = TickerParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v4/spot/tickers")
    }

    fn query_params(&self) -> Option<&TickerParams> {
        Some(&self.0)
    }
}

struct FuturesTickers(TickerParams);

impl RestRequest for FuturesTickers {
    type Response = Vec<GateioFuturesTicker>;
    type QueryParams = TickerParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v4/futures/usdt/tickers")
    }

    fn query_params(&self) -> Option<&TickerParams> {
        Some(&self.0)
    }
}

#[derive(Serialize)]
struct BookParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    currency_pair: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contract: Option<String>,
    limit: usize,
}

struct OrderBookRequest {
    kind: MarketKind,
    params: BookParams,
}

impl RestRequest for OrderBookRequest {
    type Response = GateioOrderBook;
    type QueryParams = BookParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        match self.kind {
            MarketKind::Spot => Cow::Borrowed("/api/v4/spot/order_book"),
            MarketKind::Perp => Cow::Borrowed("/api/v4/futures/usdt/order_book"),
        }
    }

    fn query_params(&self) -> Option<&BookParams> {
        Some(&self.params)
    }
}

/*----- */
// Gate.io client
/*----- */
#[derive(Debug, Clone)]
pub struct GateioClient {
    kind: MarketKind,
    rest: RestClient,
}

impl GateioClient {
    pub fn new(kind: MarketKind) -> Self {
        Self {
            kind,
            rest: RestClient::new(GATEIO_BASE_HTTP_URL),
        }
    }

    fn ticker_params(&self, id: Option<&str>) -> TickerParams {
        match self.kind {
            MarketKind::Spot => TickerParams {
                currency_pair: id.map(str::to_string),
                contract: None,
            },
            MarketKind::Perp => TickerParams {
                currency_pair: None,
                contract: id.map(str::to_string),
            },
        }
    }

    async fn fetch_tickers(&self, id: Option<&str>) -> Result<HashMap<String, Quote>, SocketError> {
        let params = self.ticker_params(id);
        let quotes = match self.kind {
            MarketKind::Spot => self
                .rest
                .execute(SpotTickers(params))
                .await?
                .into_iter()
                .filter_map(|ticker| {
                    let quote = Quote::new(ticker.highest_bid?, ticker.lowest_ask?).validated()?;
                    Some((ticker.currency_pair, quote))
                })
                .collect(),
            MarketKind::Perp => self
                .rest
                .execute(FuturesTickers(params))
                .await?
                .into_iter()
                .filter_map(|ticker| {
                    let quote = Quote::new(ticker.highest_bid?, ticker.lowest_ask?).validated()?;
                    Some((ticker.contract, quote))
                })
                .collect(),
        };
        Ok(quotes)
    }
}

pub fn usdt_perp_listing(contract: &GateioContract) -> Option<MarketListing> {
    if contract.in_delisting {
        return None;
    }
    let base = contract.name.strip_suffix("_USDT")?;
    // delivery style names carry a date suffix
    if base.contains('_') || base.is_empty() {
        return None;
    }
    Some(MarketListing::new(base, contract.name.as_str()))
}

#[async_trait]
impl MarketClient for GateioClient {
    fn venue(&self) -> Venue {
        Venue::new(ExchangeId::Gateio, self.kind)
    }

    async fn markets(&self) -> Result<Vec<MarketListing>, SocketError> {
        let listings = match self.kind {
            MarketKind::Spot => self
                .rest
                .execute(SpotPairs)
                .await?
                .into_iter()
                .filter(|pair| pair.quote == "USDT" && pair.trade_status == "tradable")
                .map(|pair| MarketListing::new(pair.base, pair.id))
                .collect(),
            MarketKind::Perp => self
                .rest
                .execute(FuturesContracts)
                .await?
                .iter()
                .filter_map(usdt_perp_listing)
                .collect(),
        };
        Ok(listings)
    }

    async fn tickers(&self, ids: &[String]) -> Result<HashMap<String, Quote>, SocketError> {
        let mut quotes = self.fetch_tickers(None).await?;
        quotes.retain(|id, _| ids.contains(id));
        Ok(quotes)
    }

    async fn ticker(&self, id: &str) -> Result<Option<Quote>, SocketError> {
        Ok(self.fetch_tickers(Some(id)).await?.remove(id))
    }

    async fn order_book(&self, id: &str, depth: usize) -> Result<OrderBook, SocketError> {
        let (currency_pair, contract) = match self.kind {
            MarketKind::Spot => (Some(id.to_string()), None),
            MarketKind::Perp => (None, Some(id.to_string())),
        };
        let book = self
            .rest
            .execute(OrderBookRequest {
                kind: self.kind,
                params: BookParams {
                    currency_pair,
                    contract,
                    limit: depth.max(1),
                },
            })
            .await?;
        Ok(OrderBook::new(book.bids, book.asks).normalized())
    }
}
