pub mod http;
pub mod model;

use model::{OkxEvent, OkxMessage};
use serde_json::json;

use crate::{
    error::SocketError,
    feed::connector::{de_message, FeedMessage, QuoteConnector, QuoteUpdate},
    protocols::ws::{PingInterval, WsMessage},
    shared::subscription_models::{ExchangeId, MarketKind},
};

const OKX_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";
const OKX_ARGS_PER_REQUEST: usize = 20;
const OKX_SOCKET_BATCH: usize = 1_000;

/*----- */
// OKX tickers
/*----- */
// Spot ids look like "BTC-USDT", swaps like "BTC-USDT-SWAP".
#[derive(Debug, Clone)]
pub struct OkxTickerWs {
    kind: MarketKind,
}

impl OkxTickerWs {
    pub fn new(kind: MarketKind) -> Self {
        Self { kind }
    }
}

impl QuoteConnector for OkxTickerWs {
    const ID: ExchangeId = ExchangeId::Okx;

    fn kind(&self) -> MarketKind {
        self.kind
    }

    fn url(&self) -> &'static str {
        OKX_WS_URL
    }

    fn batch_size(&self) -> usize {
        OKX_SOCKET_BATCH
    }

    fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
        ids.chunks(OKX_ARGS_PER_REQUEST)
            .map(|batch| {
                let args = batch
                    .iter()
                    .map(|inst_id| json!({"channel": "tickers", "instId": inst_id}))
                    .collect::<Vec<_>>();
                WsMessage::text(json!({"op": "subscribe", "args": args}).to_string())
            })
            .collect()
    }

    fn ping_interval(&self) -> Option<PingInterval> {
        Some(PingInterval {
            time: 25,
            message: json!("ping"),
        })
    }

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
        if text.trim() == "pong" {
            return Ok(FeedMessage::Ignore);
        }

        match de_message::<OkxMessage>(text)? {
            OkxMessage::Data { data } => Ok(FeedMessage::Quotes(
                data.into_iter()
                    .filter_map(|ticker| {
                        let bid = ticker.bid_px.filter(|bid| *bid > 0.0)?;
                        let ask = ticker.ask_px.filter(|ask| *ask > 0.0)?;
                        Some(QuoteUpdate::new(ticker.inst_id, bid, ask))
                    })
                    .collect(),
            )),
            OkxMessage::Event {
                event: OkxEvent::Error,
                msg,
            } => Err(SocketError::Subscribe(msg.unwrap_or_default())),
            OkxMessage::Event { .. } => Ok(FeedMessage::Ignore),
        }
    }
}
