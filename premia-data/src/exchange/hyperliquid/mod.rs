pub mod http;
pub mod model;

use model::HyperliquidMessage;
use serde_json::json;

use crate::{
    error::SocketError,
    feed::connector::{de_message, FeedMessage, QuoteConnector, QuoteUpdate},
    orderbook::{best_ask, best_bid},
    protocols::ws::{PingInterval, WsMessage},
    shared::subscription_models::{ExchangeId, MarketKind},
};

const HYPERLIQUID_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";
const HYPERLIQUID_BATCH: usize = 50;

/*----- */
// Hyperliquid l2 book
/*----- */
// Perp ids are coin names ("BTC"), spot ids are pair names ("PURR/USDC" or "@107").
#[derive(Debug, Clone)]
pub struct HyperliquidL2BookWs {
    kind: MarketKind,
}

impl HyperliquidL2BookWs {
    pub fn new(kind: MarketKind) -> Self {
        Self { kind }
    }
}

impl QuoteConnector for HyperliquidL2BookWs {
    const ID: ExchangeId = ExchangeId::Hyperliquid;

    fn kind(&self) -> MarketKind {
        self.kind
    }

    fn url(&self) -> &'static str {
        HYPERLIQUID_WS_URL
    }

    fn batch_size(&self) -> usize {
        HYPERLIQUID_BATCH
    }

    // one subscription per coin
    fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
        ids.iter()
            .map(|coin| {
                let request = json!({
                    "method": "subscribe",
                    "subscription": {"type": "l2Book", "coin": coin},
                });
                WsMessage::text(request.to_string())
            })
            .collect()
    }

    fn ping_interval(&self) -> Option<PingInterval> {
        Some(PingInterval {
            time: 50,
            message: json!({"method": "ping"}),
        })
    }

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
        match de_message::<HyperliquidMessage>(text)? {
            HyperliquidMessage::L2Book { data } => {
                match (best_bid(data.bids()), best_ask(data.asks())) {
                    (Some(bid), Some(ask)) => Ok(FeedMessage::Quotes(vec![QuoteUpdate::new(
                        data.coin, bid, ask,
                    )])),
                    _ => Ok(FeedMessage::Ignore),
                }
            }
            HyperliquidMessage::Error { data } => Err(SocketError::Subscribe(data.to_string())),
            HyperliquidMessage::Other => Ok(FeedMessage::Ignore),
        }
    }
}
