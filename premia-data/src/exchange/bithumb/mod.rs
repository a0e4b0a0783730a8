pub mod http;
pub mod model;

use std::collections::HashMap;

use model::{BithumbEvent, BithumbMessage, BithumbSide};
use serde_json::json;

use crate::{
    error::SocketError,
    feed::connector::{de_message, FeedMessage, QuoteConnector, QuoteUpdate},
    protocols::ws::WsMessage,
    shared::subscription_models::{ExchangeId, MarketKind},
};

const BITHUMB_WS_URL: &str = "wss://pubwss.bithumb.com/pub/ws";
const BITHUMB_BATCH: usize = 100;
const BITHUMB_DEPTH: usize = 5;

/*----- */
// Bithumb order book depth feed
/*----- */
// Ids are the "BTC_KRW" style symbols used by both the socket and REST APIs.
#[derive(Debug, Clone, Default)]
pub struct BithumbOrderBookWs;

impl QuoteConnector for BithumbOrderBookWs {
    const ID: ExchangeId = ExchangeId::Bithumb;

    fn kind(&self) -> MarketKind {
        MarketKind::Spot
    }

    fn url(&self) -> &'static str {
        BITHUMB_WS_URL
    }

    fn batch_size(&self) -> usize {
        BITHUMB_BATCH
    }

    fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
        if ids.is_empty() {
            return Vec::new();
        }
        let request = json!({
            "type": "orderbookdepth",
            "symbols": ids,
            "depth": BITHUMB_DEPTH,
        });
        vec![WsMessage::text(request.to_string())]
    }

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
        let content = match de_message::<BithumbMessage>(text)? {
            BithumbMessage::Event(BithumbEvent::OrderBookDepth { content }) => content,
            BithumbMessage::Event(BithumbEvent::Other) => return Ok(FeedMessage::Ignore),
            BithumbMessage::Status { status, resmsg } => {
                if status != "0000" {
                    return Err(SocketError::Subscribe(format!(
                        "bithumb status {status}: {}",
                        resmsg.unwrap_or_default()
                    )));
                }
                return Ok(FeedMessage::Ignore);
            }
        };

        // best bid is the highest bid price, best ask the lowest ask price, per symbol
        let mut books: HashMap<String, (f64, f64)> = HashMap::new();
        for entry in content.list {
            if entry.price <= 0.0 || entry.quantity <= 0.0 {
                continue;
            }
            let (bid, ask) = books.entry(entry.symbol).or_insert((0.0, 0.0));
            match entry.order_type {
                BithumbSide::Bid => *bid = bid.max(entry.price),
                BithumbSide::Ask => {
                    *ask = if *ask > 0.0 {
                        ask.min(entry.price)
                    } else {
                        entry.price
                    }
                }
            }
        }

        let updates = books
            .into_iter()
            .filter(|(_, (bid, ask))| *bid > 0.0 && *ask > 0.0)
            .map(|(symbol, (bid, ask))| QuoteUpdate::new(symbol, bid, ask))
            .collect();

        Ok(FeedMessage::Quotes(updates))
    }
}
