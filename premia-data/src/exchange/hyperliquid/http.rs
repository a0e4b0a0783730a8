use std::{borrow::Cow, collections::HashMap};

use async_trait::async_trait;
use serde::Serialize;

use super::model::{HyperliquidL2Book, HyperliquidMeta, HyperliquidSpotMeta};
use crate::{
    error::SocketError,
    exchange::MarketClient,
    orderbook::OrderBook,
    protocols::http::{client::RestClient, rest_request::RestRequest},
    shared::subscription_models::{ExchangeId, MarketKind, MarketListing, Venue},
};

pub const HYPERLIQUID_BASE_HTTP_URL: &str = "https://api.hyperliquid.xyz";

/*----- */
// Requests
/*----- */
// Everything is a POST to /info with a typed body.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum InfoBody {
    Meta,
    SpotMeta,
    L2Book { coin: String },
}

struct Info<Response> {
    body: InfoBody,
    _response: std::marker::PhantomData<Response>,
}

impl<Response> Info<Response> {
    fn new(body: InfoBody) -> Self {
        Self {
            body,
            _response: std::marker::PhantomData,
        }
    }
}

impl<Response> RestRequest for Info<Response>
where
    Response: serde::de::DeserializeOwned,
{
    type Response = Response;
    type QueryParams = ();
    type Body = InfoBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/info")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn body(&self) -> Option<&InfoBody> {
        Some(&self.body)
    }
}

/*----- */
// Hyperliquid client
/*----- */
#[derive(Debug, Clone)]
pub struct HyperliquidClient {
    kind: MarketKind,
    rest: RestClient,
}

impl HyperliquidClient {
    pub fn new(kind: MarketKind) -> Self {
        Self {
            kind,
            rest: RestClient::new(HYPERLIQUID_BASE_HTTP_URL),
        }
    }
}

pub fn perp_listings(meta: &HyperliquidMeta) -> Vec<MarketListing> {
    meta.universe
        .iter()
        .filter(|asset| !asset.is_delisted)
        .map(|asset| MarketListing::new(asset.name.as_str(), asset.name.as_str()))
        .collect()
}

// Spot pairs reference tokens by index; only USDC quoted pairs are kept.
pub fn spot_listings(meta: &HyperliquidSpotMeta) -> Vec<MarketListing> {
    let tokens = meta
        .tokens
        .iter()
        .map(|token| (token.index, token.name.as_str()))
        .collect::<HashMap<_, _>>();

    meta.universe
        .iter()
        .filter_map(|pair| {
            let base = tokens.get(pair.tokens.first()?)?;
            let quote = tokens.get(pair.tokens.get(1)?)?;
            (*quote == "USDC").then(|| MarketListing::new(*base, pair.name.as_str()))
        })
        .collect()
}

#[async_trait]
impl MarketClient for HyperliquidClient {
    fn venue(&self) -> Venue {
        Venue::new(ExchangeId::Hyperliquid, self.kind)
    }

    async fn markets(&self) -> Result<Vec<MarketListing>, SocketError> {
        match self.kind {
            MarketKind::Perp => {
                let meta = self
                    .rest
                    .execute(Info::<HyperliquidMeta>::new(InfoBody::Meta))
                    .await?;
                Ok(perp_listings(&meta))
            }
            MarketKind::Spot => {
                let meta = self
                    .rest
                    .execute(Info::<HyperliquidSpotMeta>::new(InfoBody::SpotMeta))
                    .await?;
                Ok(spot_listings(&meta))
            }
        }
    }

    async fn order_book(&self, id: &str, depth: usize) -> Result<OrderBook, SocketError> {
        let book = self
            .rest
            .execute(Info::<HyperliquidL2Book>::new(InfoBody::L2Book {
                coin: id.to_string(),
            }))
            .await?;
        let mut book = OrderBook::new(book.bids().to_vec(), book.asks().to_vec()).normalized();
        book.bids.truncate(depth);
        book.asks.truncate(depth);
        Ok(book)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_spot_listings() {
        let meta: HyperliquidSpotMeta = serde_json::from_str(
            r#"{"universe":[
                {"name":"PURR/USDC","tokens":[1,0],"index":0,"isCanonical":true},
                {"name":"@107","tokens":[150,0],"index":107,"isCanonical":false},
                {"name":"@3","tokens":[2,5],"index":3,"isCanonical":false}
            ],"tokens":[
                {"name":"USDC","index":0,"szDecimals":8},
                {"name":"PURR","index":1,"szDecimals":0},
                {"name":"HFUN","index":2,"szDecimals":2},
                {"name":"HYPE","index":150,"szDecimals":2}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            spot_listings(&meta),
            vec![
                MarketListing::new("PURR", "PURR/USDC"),
                MarketListing::new("HYPE", "@107"),
            ]
        );
    }

    #[test]
    fn test_info_body_shape() {
        assert_eq!(
            serde_json::to_value(InfoBody::L2Book { coin: "BTC".to_string() }).unwrap(),
            serde_json::json!({"type": "l2Book", "coin": "BTC"})
        );
        assert_eq!(
            serde_json::to_value(InfoBody::SpotMeta).unwrap(),
            serde_json::json!({"type": "spotMeta"})
        );
    }
}
