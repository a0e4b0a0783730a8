pub mod http;
pub mod model;

use model::BybitMessage;
use serde_json::json;

use crate::{
    error::SocketError,
    feed::connector::{de_message, FeedMessage, QuoteConnector, QuoteUpdate},
    protocols::ws::{PingInterval, WsMessage},
    shared::subscription_models::{ExchangeId, MarketKind},
};

const BYBIT_SPOT_WS_URL: &str = "wss://stream.bybit.com/v5/public/spot";
const BYBIT_LINEAR_WS_URL: &str = "wss://stream.bybit.com/v5/public/linear";
const BYBIT_TOPICS_PER_REQUEST: usize = 10;
const BYBIT_SOCKET_BATCH: usize = 500;

/*----- */
// Bybit level 1 order book
/*----- */
#[derive(Debug, Clone)]
pub struct BybitOrderBookWs {
    kind: MarketKind,
}

impl BybitOrderBookWs {
    pub fn new(kind: MarketKind) -> Self {
        Self { kind }
    }
}

impl QuoteConnector for BybitOrderBookWs {
    const ID: ExchangeId = ExchangeId::Bybit;

    fn kind(&self) -> MarketKind {
        self.kind
    }

    fn url(&self) -> &'static str {
        match self.kind {
            MarketKind::Spot => BYBIT_SPOT_WS_URL,
            MarketKind::Perp => BYBIT_LINEAR_WS_URL,
        }
    }

    fn batch_size(&self) -> usize {
        BYBIT_SOCKET_BATCH
    }

    fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
        ids.chunks(BYBIT_TOPICS_PER_REQUEST)
            .map(|batch| {
                let topics = batch
                    .iter()
                    .map(|symbol| format!("orderbook.1.{symbol}"))
                    .collect::<Vec<_>>();
                WsMessage::text(json!({"op": "subscribe", "args": topics}).to_string())
            })
            .collect()
    }

    fn ping_interval(&self) -> Option<PingInterval> {
        Some(PingInterval {
            time: 20,
            message: json!({"op": "ping"}),
        })
    }

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
        match de_message::<BybitMessage>(text)? {
            BybitMessage::Book { topic, data } => {
                if !topic.starts_with("orderbook.") {
                    return Ok(FeedMessage::Ignore);
                }
                let symbol = match data.s {
                    Some(symbol) => symbol,
                    None => match topic.rsplit('.').next() {
                        Some(symbol) if !symbol.is_empty() => symbol.to_string(),
                        _ => return Ok(FeedMessage::Ignore),
                    },
                };

                // a missing side keeps whatever the cache already holds
                let bid = data.b.first().map(|level| level.price).filter(|p| *p > 0.0);
                let ask = data.a.first().map(|level| level.price).filter(|p| *p > 0.0);
                if bid.is_none() && ask.is_none() {
                    return Ok(FeedMessage::Ignore);
                }
                Ok(FeedMessage::Quotes(vec![QuoteUpdate { symbol, bid, ask }]))
            }
            BybitMessage::Op { op, .. } if op == "ping" => Ok(FeedMessage::Reply(
                WsMessage::text(json!({"op": "pong"}).to_string()),
            )),
            BybitMessage::Op {
                op,
                success: Some(false),
                ret_msg,
            } => Err(SocketError::Subscribe(format!(
                "bybit {op} failed: {}",
                ret_msg.unwrap_or_default()
            ))),
            BybitMessage::Op { .. } => Ok(FeedMessage::Ignore),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        struct TestCase {
            name: &'static str,
            input: &'static str,
            expected: FeedMessage,
        }

        let cases = vec![
            TestCase {
                name: "snapshot",
                input: r#"{"topic":"orderbook.1.BTCUSDT","type":"snapshot","ts":1,"data":{"s":"BTCUSDT","b":[["97000.1","0.5"]],"a":[["97000.2","1.1"]],"u":1,"seq":2}}"#,
                expected: FeedMessage::Quotes(vec![QuoteUpdate::new("BTCUSDT", 97_000.1, 97_000.2)]),
            },
            TestCase {
                name: "delta with one side",
                input: r#"{"topic":"orderbook.1.ETHUSDT","type":"delta","ts":1,"data":{"s":"ETHUSDT","b":[],"a":[["3500.5","2"]]}}"#,
                expected: FeedMessage::Quotes(vec![QuoteUpdate {
                    symbol: "ETHUSDT".to_string(),
                    bid: None,
                    ask: Some(3500.5),
                }]),
            },
            TestCase {
                name: "symbol from topic",
                input: r#"{"topic":"orderbook.1.XRPUSDT","data":{"b":[["0.5","10"]],"a":[["0.51","10"]]}}"#,
                expected: FeedMessage::Quotes(vec![QuoteUpdate::new("XRPUSDT", 0.5, 0.51)]),
            },
            TestCase {
                name: "server ping",
                input: r#"{"op":"ping"}"#,
                expected: FeedMessage::Reply(WsMessage::text(r#"{"op":"pong"}"#)),
            },
            TestCase {
                name: "subscribe ack",
                input: r#"{"success":true,"ret_msg":"","conn_id":"x","op":"subscribe"}"#,
                expected: FeedMessage::Ignore,
            },
        ];

        for case in cases {
            let mut connector = BybitOrderBookWs::new(MarketKind::Perp);
            assert_eq!(connector.parse(case.input).unwrap(), case.expected, "{}", case.name);
        }
    }

    #[test]
    fn test_requests_chunk_topics() {
        let ids = (0..25).map(|i| format!("C{i}USDT")).collect::<Vec<_>>();
        let connector = BybitOrderBookWs::new(MarketKind::Spot);
        let frames = connector.requests(&ids);
        assert_eq!(frames.len(), 3);
        assert_eq!(connector.url(), BYBIT_SPOT_WS_URL);

        let WsMessage::Text(first) = &frames[0] else {
            panic!("expected text frame");
        };
        assert!(first.contains("orderbook.1.C0USDT"));
    }
}
