use std::{borrow::Cow, collections::HashMap};

use async_trait::async_trait;
use serde::Serialize;

use super::model::{OkxInstrument, OkxOrderBook, OkxResponse, OkxTicker};
use crate::{
    assets::quote::Quote,
    error::SocketError,
    exchange::MarketClient,
    orderbook::OrderBook,
    protocols::http::{client::RestClient, rest_request::RestRequest},
    shared::subscription_models::{ExchangeId, MarketKind, MarketListing, Venue},
};

pub const OKX_BASE_HTTP_URL: &str = "https://www.okx.com";

fn inst_type(kind: MarketKind) -> &'static str {
    match kind {
        MarketKind::Spot => "SPOT",
        MarketKind::Perp => "SWAP",
    }
}

/*----- */
// Requests
/*----- */
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstTypeParams {
    inst_type: &'static str,
}

struct Instruments(InstTypeParams);

impl RestRequest for Instruments {
    type Response = OkxResponse<OkxInstrument>;
    type QueryParams = InstTypeParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v5/public/instruments")
    }

    fn query_params(&self) -> Option<&InstTypeParams> {
        Some(&self.0)
    }
}

struct Tickers(InstTypeParams);

impl RestRequest for Tickers {
    type Response = OkxResponse<OkxTicker>;
    type QueryParams = InstTypeParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v5/market/tickers")
    }

    fn query_params(&self) -> Option<&InstTypeParams> {
        Some(&self.0)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstIdParams {
    inst_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sz: Option<usize>,
}

struct Ticker(InstIdParams);

impl RestRequest for Ticker {
    type Response = OkxResponse<OkxTicker>;
    type QueryParams = InstIdParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v5/market/ticker")
    }

    fn query_params(&self) -> Option<&InstIdParams> {
        Some(&self.0)
    }
}

struct Books(InstIdParams);

impl RestRequest for Books {
    type Response = OkxResponse<OkxOrderBook>;
    type QueryParams = InstIdParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v5/market/books")
    }

    fn query_params(&self) -> Option<&InstIdParams> {
        Some(&self.0)
    }
}

/*----- */
// OKX client
/*----- */
#[derive(Debug, Clone)]
pub struct OkxClient {
    kind: MarketKind,
    rest: RestClient,
}

impl OkxClient {
    pub fn new(kind: MarketKind) -> Self {
        Self {
            kind,
            rest: RestClient::new(OKX_BASE_HTTP_URL),
        }
    }
}

fn check<T>(response: OkxResponse<T>) -> Result<Vec<T>, SocketError> {
    if response.code == "0" {
        Ok(response.data)
    } else {
        Err(SocketError::HttpResponse(
            reqwest::StatusCode::OK,
            format!("okx code {}: {}", response.code, response.msg),
        ))
    }
}

fn ticker_quote(ticker: OkxTicker) -> Option<(String, Quote)> {
    let quote = Quote::new(ticker.bid_px?, ticker.ask_px?).validated()?;
    Some((ticker.inst_id, quote))
}

pub fn instrument_listing(kind: MarketKind, instrument: &OkxInstrument) -> Option<MarketListing> {
    if instrument.state != "live" {
        return None;
    }
    match kind {
        MarketKind::Spot if instrument.quote_ccy == "USDT" => Some(MarketListing::new(
            instrument.base_ccy.as_str(),
            instrument.inst_id.as_str(),
        )),
        MarketKind::Perp if instrument.settle_ccy == "USDT" => {
            let base = instrument.inst_id.strip_suffix("-USDT-SWAP")?;
            let coin = if instrument.ct_val_ccy.is_empty() {
                base
            } else {
                instrument.ct_val_ccy.as_str()
            };
            Some(MarketListing::new(coin, instrument.inst_id.as_str()))
        }
        _ => None,
    }
}

#[async_trait]
impl MarketClient for OkxClient {
    fn venue(&self) -> Venue {
        Venue::new(ExchangeId::Okx, self.kind)
    }

    async fn markets(&self) -> Result<Vec<MarketListing>, SocketError> {
        let instruments = check(
            self.rest
                .execute(Instruments(InstTypeParams {
                    inst_type: inst_type(self.kind),
                }))
                .await?,
        )?;
        Ok(instruments
            .iter()
            .filter_map(|instrument| instrument_listing(self.kind, instrument))
            .collect())
    }

    async fn tickers(&self, ids: &[String]) -> Result<HashMap<String, Quote>, SocketError> {
        let tickers = check(
            self.rest
                .execute(Tickers(InstTypeParams {
                    inst_type: inst_type(self.kind),
                }))
                .await?,
        )?;
        Ok(tickers
            .into_iter()
            .filter_map(ticker_quote)
            .filter(|(id, _)| ids.contains(id))
            .collect())
    }

    async fn ticker(&self, id: &str) -> Result<Option<Quote>, SocketError> {
        let tickers = check(
            self.rest
                .execute(Ticker(InstIdParams {
                    inst_id: id.to_string(),
                    sz: None,
                }))
                .await?,
        )?;
        Ok(tickers
            .into_iter()
            .filter_map(ticker_quote)
            .find_map(|(inst_id, quote)| (inst_id == id).then_some(quote)))
    }

    async fn order_book(&self, id: &str, depth: usize) -> Result<OrderBook, SocketError> {
        let mut books = check(
            self.rest
                .execute(Books(InstIdParams {
                    inst_id: id.to_string(),
                    sz: Some(depth.clamp(1, 400)),
                }))
                .await?,
        )?;
        let book = books.pop().ok_or_else(|| SocketError::EmptyResponse {
            exchange: ExchangeId::Okx,
            what: format!("order book {id}"),
        })?;
        Ok(OrderBook::new(book.bids, book.asks).normalized())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_instrument_listing() {
        let payload = r#"{"code":"0","msg":"","data":[
            {"instId":"BTC-USDT-SWAP","instType":"SWAP","baseCcy":"","quoteCcy":"","settleCcy":"USDT","ctValCcy":"BTC","state":"live"},
            {"instId":"BTC-USD-SWAP","instType":"SWAP","baseCcy":"","quoteCcy":"","settleCcy":"BTC","ctValCcy":"USD","state":"live"},
            {"instId":"ETH-USDT-SWAP","instType":"SWAP","settleCcy":"USDT","ctValCcy":"ETH","state":"suspend"}
        ]}"#;
        let response: OkxResponse<OkxInstrument> = serde_json::from_str(payload).unwrap();
        let listings = check(response)
            .unwrap()
            .iter()
            .filter_map(|instrument| instrument_listing(MarketKind::Perp, instrument))
            .collect::<Vec<_>>();
        assert_eq!(listings, vec![MarketListing::new("BTC", "BTC-USDT-SWAP")]);
    }

    #[test]
    fn test_error_code() {
        let response: OkxResponse<OkxTicker> =
            serde_json::from_str(r#"{"code":"51001","msg":"Instrument ID does not exist","data":[]}"#)
                .unwrap();
        assert!(check(response).is_err());
    }
}
