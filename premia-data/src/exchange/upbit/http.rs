use std::{borrow::Cow, collections::HashMap};

use async_trait::async_trait;
use serde::Serialize;

use super::model::{UpbitMarket, UpbitOrderBook};
use crate::{
    assets::{level::Level, quote::Quote},
    error::SocketError,
    exchange::MarketClient,
    orderbook::OrderBook,
    protocols::http::{client::RestClient, rest_request::RestRequest},
    shared::subscription_models::{ExchangeId, MarketListing, Venue},
};

pub const UPBIT_BASE_HTTP_URL: &str = "https://api.upbit.com";
const UPBIT_MARKETS_PER_REQUEST: usize = 100;

/*----- */
// Requests
/*----- */
struct AllMarkets;

impl RestRequest for AllMarkets {
    type Response = Vec<UpbitMarket>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v1/market/all")
    }
}

#[derive(Serialize)]
struct MarketsParams {
    markets: String,
}

struct OrderBooks(MarketsParams);

impl RestRequest for OrderBooks {
    type Response = Vec<UpbitOrderBook>;
    type QueryParams = MarketsParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/v1/orderbook")
    }

    fn query_params(&self) -> Option<&MarketsParams> {
        Some(&self.0)
    }
}

/*----- */
// Upbit client
/*----- */
#[derive(Debug, Clone)]
pub struct UpbitClient {
    rest: RestClient,
}

impl Default for UpbitClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UpbitClient {
    pub fn new() -> Self {
        Self {
            rest: RestClient::new(UPBIT_BASE_HTTP_URL),
        }
    }

    async fn order_books(&self, ids: &[String]) -> Result<Vec<UpbitOrderBook>, SocketError> {
        let mut books = Vec::new();
        for chunk in ids.chunks(UPBIT_MARKETS_PER_REQUEST) {
            let request = OrderBooks(MarketsParams {
                markets: chunk.join(","),
            });
            books.extend(self.rest.execute(request).await?);
        }
        Ok(books)
    }
}

fn into_order_book(book: UpbitOrderBook) -> OrderBook {
    let (bids, asks) = book
        .orderbook_units
        .iter()
        .map(|unit| {
            (
                Level::new(unit.bid_price, unit.bid_size),
                Level::new(unit.ask_price, unit.ask_size),
            )
        })
        .unzip();
    OrderBook::new(bids, asks).normalized()
}

#[async_trait]
impl MarketClient for UpbitClient {
    fn venue(&self) -> Venue {
        Venue::spot(ExchangeId::Upbit)
    }

    async fn markets(&self) -> Result<Vec<MarketListing>, SocketError> {
        let markets = self.rest.execute(AllMarkets).await?;
        Ok(markets
            .into_iter()
            .filter_map(|market| {
                let coin = market.market.strip_prefix("KRW-")?.to_string();
                Some(MarketListing::new(coin, market.market))
            })
            .collect())
    }

    async fn tickers(&self, ids: &[String]) -> Result<HashMap<String, Quote>, SocketError> {
        let books = self.order_books(ids).await?;
        Ok(books
            .into_iter()
            .filter_map(|book| {
                let best = book.orderbook_units.first()?;
                let quote = Quote::new(best.bid_price, best.ask_price).validated()?;
                Some((book.code, quote))
            })
            .collect())
    }

    async fn order_book(&self, id: &str, depth: usize) -> Result<OrderBook, SocketError> {
        let mut books = self.order_books(&[id.to_string()]).await?;
        let book = books.pop().ok_or_else(|| SocketError::EmptyResponse {
            exchange: ExchangeId::Upbit,
            what: format!("order book {id}"),
        })?;
        let mut book = into_order_book(book);
        book.bids.truncate(depth);
        book.asks.truncate(depth);
        Ok(book)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rest_order_book_model() {
        let payload = r#"[{"market":"KRW-ETH","timestamp":1,"total_ask_size":1,"total_bid_size":1,
            "orderbook_units":[{"ask_price":5001000,"bid_price":5000000,"ask_size":1.5,"bid_size":2.0},
                               {"ask_price":5002000,"bid_price":4999000,"ask_size":3.0,"bid_size":0}]}]"#;
        let books: Vec<UpbitOrderBook> = serde_json::from_str(payload).unwrap();
        let book = into_order_book(books.into_iter().next().unwrap());

        assert_eq!(book.bids, vec![Level::new(5_000_000.0, 2.0)]);
        assert_eq!(book.asks.len(), 2);
        assert_eq!(book.top_of_book(), Some(Quote::new(5_000_000.0, 5_001_000.0)));
    }
}
