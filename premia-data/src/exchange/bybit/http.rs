use std::{borrow::Cow, collections::HashMap};

use async_trait::async_trait;
use serde::Serialize;

use super::model::{BybitInstrument, BybitList, BybitOrderBook, BybitResponse, BybitTicker};
use crate::{
    assets::quote::Quote,
    error::SocketError,
    exchange::MarketClient,
    orderbook::OrderBook,
    protocols::http::{client::RestClient, rest_request::RestRequest},
    shared::subscription_models::{ExchangeId, MarketKind, MarketListing, Venue},
};

pub const BYBIT_BASE_HTTP_URL: &str = "https://api.bybit.com";

fn category(kind: MarketKind) -> &'static str {
    match kind {
        MarketKind::Spot => "spot",
        MarketKind::Perp => "linear",
    }
}

/*----- */
// Requests
/*----- */
#[derive(Serialize)]
struct CategoryParams {
    category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

struct Instruments(CategoryParams);

impl RestRequest for Instruments {
    type Response = BybitResponse<BybitList<BybitInstrument>>;
    type QueryParams = CategoryParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v5/market/instruments-info")
    }

    fn query_params(&self) -> Option<&CategoryParams> {
        Some(&self.0)
    }
}

struct Tickers(CategoryParams);

impl RestRequest for Tickers {
    type Response = BybitResponse<BybitList<BybitTicker>>;
    type QueryParams = CategoryParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v5/market/tickers")
    }

    fn query_params(&self) -> Option<&CategoryParams> {
        Some(&self.0)
    }
}

struct OrderBookRequest(CategoryParams);

impl RestRequest for OrderBookRequest {
    type Response = BybitResponse<BybitOrderBook>;
    type QueryParams = CategoryParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v5/market/orderbook")
    }

    fn query_params(&self) -> Option<&CategoryParams> {
        Some(&self.0)
    }
}

/*----- */
// Bybit client
/*----- */
#[derive(Debug, Clone)]
pub struct BybitClient {
    kind: MarketKind,
    rest: RestClient,
}

impl BybitClient {
    pub fn new(kind: MarketKind) -> Self {
        Self {
            kind,
            rest: RestClient::new(BYBIT_BASE_HTTP_URL),
        }
    }

    fn params(&self, symbol: Option<&str>, limit: Option<usize>) -> CategoryParams {
        CategoryParams {
            category: category(self.kind),
            symbol: symbol.map(str::to_string),
            limit,
        }
    }

    async fn fetch_tickers(&self, symbol: Option<&str>) -> Result<HashMap<String, Quote>, SocketError> {
        let response = self.rest.execute(Tickers(self.params(symbol, None))).await?;
        check(response.ret_code, &response.ret_msg)?;
        Ok(response
            .result
            .list
            .into_iter()
            .filter_map(|ticker| {
                let quote = Quote::new(ticker.bid1_price?, ticker.ask1_price?).validated()?;
                Some((ticker.symbol, quote))
            })
            .collect())
    }
}

fn check(ret_code: i64, ret_msg: &str) -> Result<(), SocketError> {
    if ret_code == 0 {
        Ok(())
    } else {
        Err(SocketError::HttpResponse(
            reqwest::StatusCode::OK,
            format!("bybit retCode {ret_code}: {ret_msg}"),
        ))
    }
}

pub fn instrument_listing(kind: MarketKind, instrument: &BybitInstrument) -> Option<MarketListing> {
    if instrument.status != "Trading" || instrument.quote_coin != "USDT" {
        return None;
    }
    if kind == MarketKind::Perp {
        let perpetual = instrument.contract_type.as_deref() == Some("LinearPerpetual");
        let usdt_settled = instrument.settle_coin.as_deref().unwrap_or("USDT") == "USDT";
        if !perpetual || !usdt_settled {
            return None;
        }
    }
    Some(MarketListing::new(
        instrument.base_coin.as_str(),
        instrument.symbol.as_str(),
    ))
}

#[async_trait]
impl MarketClient for BybitClient {
    fn venue(&self) -> Venue {
        Venue::new(ExchangeId::Bybit, self.kind)
    }

    async fn markets(&self) -> Result<Vec<MarketListing>, SocketError> {
        let response = self
            .rest
            .execute(Instruments(self.params(None, Some(1_000))))
            .await?;
        check(response.ret_code, &response.ret_msg)?;
        Ok(response
            .result
            .list
            .iter()
            .filter_map(|instrument| instrument_listing(self.kind, instrument))
            .collect())
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
        let response = self
            .rest
            .execute(OrderBookRequest(self.params(Some(id), Some(depth.clamp(1, 200)))))
            .await?;
        check(response.ret_code, &response.ret_msg)?;
        Ok(OrderBook::new(response.result.b, response.result.a).normalized())
    }
}
