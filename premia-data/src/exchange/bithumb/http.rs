use std::{borrow::Cow, collections::HashMap};

use async_trait::async_trait;
use serde::Serialize;

use super::model::{BithumbAll, BithumbAllEntry, BithumbBook, BithumbResponse, BithumbTicker};
use crate::{
    assets::quote::Quote,
    error::SocketError,
    exchange::MarketClient,
    orderbook::OrderBook,
    protocols::http::{client::RestClient, rest_request::RestRequest},
    shared::subscription_models::{ExchangeId, MarketListing, Venue},
};

pub const BITHUMB_BASE_HTTP_URL: &str = "https://api.bithumb.com";

/*----- */
// Requests
/*----- */
struct AllTickers;

impl RestRequest for AllTickers {
    type Response = BithumbResponse<BithumbAll<BithumbTicker>>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/public/ticker/ALL_KRW")
    }
}

struct AllOrderBooks;

impl RestRequest for AllOrderBooks {
    type Response = BithumbResponse<BithumbAll<BithumbBook>>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/public/orderbook/ALL_KRW")
    }
}

#[derive(Serialize)]
struct CountParams {
    count: usize,
}

struct OrderBookRequest {
    id: String,
    params: CountParams,
}

impl RestRequest for OrderBookRequest {
    type Response = BithumbResponse<BithumbBook>;
    type QueryParams = CountParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/public/orderbook/{}", self.id))
    }

    fn query_params(&self) -> Option<&CountParams> {
        Some(&self.params)
    }
}

/*----- */
// Bithumb client
/*----- */
#[derive(Debug, Clone)]
pub struct BithumbClient {
    rest: RestClient,
}

impl Default for BithumbClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BithumbClient {
    pub fn new() -> Self {
        Self {
            rest: RestClient::new(BITHUMB_BASE_HTTP_URL),
        }
    }
}

fn market_id(coin: &str) -> String {
    format!("{}_KRW", coin.to_uppercase())
}

#[async_trait]
impl MarketClient for BithumbClient {
    fn venue(&self) -> Venue {
        Venue::spot(ExchangeId::Bithumb)
    }

    async fn markets(&self) -> Result<Vec<MarketListing>, SocketError> {
        let response = self.rest.execute(AllTickers).await?;
        let mut listings = response
            .data
            .into_iter()
            .filter_map(|(coin, entry)| match entry {
                BithumbAllEntry::Market(_) => Some(MarketListing::new(coin.clone(), market_id(&coin))),
                BithumbAllEntry::Meta(_) => None,
            })
            .collect::<Vec<_>>();
        listings.sort();
        Ok(listings)
    }

    async fn tickers(&self, ids: &[String]) -> Result<HashMap<String, Quote>, SocketError> {
        let response = self.rest.execute(AllOrderBooks).await?;
        let mut quotes = HashMap::new();
        for (coin, entry) in response.data {
            let BithumbAllEntry::Market(book) = entry else {
                continue;
            };
            let id = market_id(&coin);
            if !ids.contains(&id) {
                continue;
            }
            if let Some(quote) = OrderBook::new(book.bids, book.asks).top_of_book() {
                quotes.insert(id, quote);
            }
        }
        Ok(quotes)
    }

    async fn order_book(&self, id: &str, depth: usize) -> Result<OrderBook, SocketError> {
        let response = self
            .rest
            .execute(OrderBookRequest {
                id: id.to_string(),
                params: CountParams {
                    count: depth.clamp(1, 30),
                },
            })
            .await?;
        Ok(OrderBook::new(response.data.bids, response.data.asks).normalized())
    }
}
