use std::borrow::Cow;

use async_trait::async_trait;
use serde::Serialize;

use super::model::{LighterMarket, LighterOrderBookOrders, LighterOrderBooks};
use crate::{
    error::SocketError,
    exchange::MarketClient,
    orderbook::OrderBook,
    protocols::http::{client::RestClient, rest_request::RestRequest},
    shared::subscription_models::{ExchangeId, MarketKind, MarketListing, Venue},
};

pub const LIGHTER_BASE_HTTP_URL: &str = "https://mainnet.zklighter.elliot.ai";

/*----- */
// Requests
/*----- */
struct OrderBooks;

impl RestRequest for OrderBooks {
    type Response = LighterOrderBooks;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v1/orderBooks")
    }

    fn timeout() -> std::time::Duration {
        std::time::Duration::from_secs(15)
    }
}

#[derive(Serialize)]
struct OrderBookOrdersParams {
    market_id: String,
    limit: usize,
}

struct OrderBookOrders(OrderBookOrdersParams);

impl RestRequest for OrderBookOrders {
    type Response = LighterOrderBookOrders;
    type QueryParams = OrderBookOrdersParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v1/orderBookOrders")
    }

    fn query_params(&self) -> Option<&OrderBookOrdersParams> {
        Some(&self.0)
    }
}

/*----- */
// Lighter client
/*----- */
#[derive(Debug, Clone)]
pub struct LighterClient {
    kind: MarketKind,
    rest: RestClient,
}

impl LighterClient {
    pub fn new(kind: MarketKind) -> Self {
        Self {
            kind,
            rest: RestClient::new(LIGHTER_BASE_HTTP_URL),
        }
    }
}

fn market_kind(market_type: &str) -> Option<MarketKind> {
    match market_type.to_lowercase().as_str() {
        "spot" => Some(MarketKind::Spot),
        "perp" | "perpetual" | "swap" => Some(MarketKind::Perp),
        _ => None,
    }
}

/// Active markets of `kind`. Spot needs a USDC or USDT quote, perps are keyed by
/// the symbol's base ("ETH", "ETH/USDC" or "ETH-PERP").
pub fn listings(markets: &[LighterMarket], kind: MarketKind) -> Vec<MarketListing> {
    markets
        .iter()
        .filter(|market| market.status.is_empty() || market.status.eq_ignore_ascii_case("active"))
        .filter(|market| market_kind(&market.market_type) == Some(kind))
        .filter_map(|market| {
            let base = match kind {
                MarketKind::Spot => {
                    let (base, quote) = market.symbol.split_once('/')?;
                    let quote = quote.trim().to_uppercase();
                    if quote != "USDC" && quote != "USDT" {
                        return None;
                    }
                    base
                }
                MarketKind::Perp => market
                    .symbol
                    .split(['/', '-'])
                    .next()
                    .unwrap_or(market.symbol.as_str()),
            };
            let base = base.trim();
            (!base.is_empty()).then(|| MarketListing::new(base, market.market_id.as_str()))
        })
        .collect()
}

#[async_trait]
impl MarketClient for LighterClient {
    fn venue(&self) -> Venue {
        Venue::new(ExchangeId::Lighter, self.kind)
    }

    async fn markets(&self) -> Result<Vec<MarketListing>, SocketError> {
        let markets = self.rest.execute(OrderBooks).await?.into_vec();
        Ok(listings(&markets, self.kind))
    }

    async fn order_book(&self, id: &str, depth: usize) -> Result<OrderBook, SocketError> {
        let orders = self
            .rest
            .execute(OrderBookOrders(OrderBookOrdersParams {
                market_id: id.to_string(),
                limit: depth,
            }))
            .await?;
        Ok(OrderBook::new(orders.bids, orders.asks).normalized())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_listings() {
        let markets: LighterOrderBooks = serde_json::from_str(
            r#"{"code":200,"order_books":[
                {"symbol":"ETH","market_id":0,"market_type":"perp","status":"active"},
                {"symbol":"BTC-PERP","market_id":1,"market_type":"perpetual","status":"active"},
                {"symbol":"DOGE","market_id":3,"market_type":"perp","status":"inactive"},
                {"symbol":"ETH/USDC","market_id":2048,"market_type":"spot","status":"active"},
                {"symbol":"ETH/EUR","market_id":2049,"market_type":"spot","status":"active"}
            ]}"#,
        )
        .unwrap();
        let markets = markets.into_vec();

        assert_eq!(
            listings(&markets, MarketKind::Perp),
            vec![MarketListing::new("ETH", "0"), MarketListing::new("BTC", "1")]
        );
        assert_eq!(
            listings(&markets, MarketKind::Spot),
            vec![MarketListing::new("ETH", "2048")]
        );
    }

    #[test]
    fn test_order_book_orders() {
        let orders: LighterOrderBookOrders = serde_json::from_str(
            r#"{"code":200,"total_asks":1,"asks":[{"order_index":1,"remaining_base_amount":"0.5","price":"3010.2"}],
                "total_bids":1,"bids":[{"order_index":2,"remaining_base_amount":"1.5","price":"3009.9"}]}"#,
        )
        .unwrap();
        let book = OrderBook::new(orders.bids, orders.asks).normalized();
        assert_eq!(book.best_bid(), Some(3009.9));
        assert_eq!(book.best_ask(), Some(3010.2));
    }
}
