pub mod http;
pub mod model;

use std::collections::{BTreeMap, HashMap};

use model::LighterMessage;
use ordered_float::OrderedFloat;
use serde_json::json;

use crate::{
    assets::level::Level,
    error::SocketError,
    feed::connector::{de_message, FeedMessage, QuoteConnector, QuoteUpdate},
    protocols::ws::WsMessage,
    shared::subscription_models::{ExchangeId, MarketKind},
};

const LIGHTER_WS_URL: &str = "wss://mainnet.zklighter.elliot.ai/stream";
const LIGHTER_BATCH: usize = 50;

/*----- */
// Local book
/*----- */
// Lighter sends a snapshot followed by deltas, a zero size removes the level.
#[derive(Debug, Clone, Default)]
struct LocalBook {
    bids: BTreeMap<OrderedFloat<f64>, f64>,
    asks: BTreeMap<OrderedFloat<f64>, f64>,
}

impl LocalBook {
    fn apply(side: &mut BTreeMap<OrderedFloat<f64>, f64>, levels: &[Level]) {
        for level in levels {
            if !level.price.is_finite() || !level.size.is_finite() {
                continue;
            }
            if level.size > 0.0 {
                side.insert(OrderedFloat(level.price), level.size);
            } else {
                side.remove(&OrderedFloat(level.price));
            }
        }
    }

    fn best_bid(&self) -> Option<f64> {
        self.bids
            .keys()
            .next_back()
            .map(|price| price.0)
            .filter(|price| *price > 0.0)
    }

    fn best_ask(&self) -> Option<f64> {
        self.asks
            .keys()
            .map(|price| price.0)
            .find(|price| *price > 0.0)
    }
}

/*----- */
// Lighter order book
/*----- */
#[derive(Debug, Clone)]
pub struct LighterOrderBookWs {
    kind: MarketKind,
    books: HashMap<String, LocalBook>,
}

impl LighterOrderBookWs {
    pub fn new(kind: MarketKind) -> Self {
        Self {
            kind,
            books: HashMap::new(),
        }
    }
}

impl QuoteConnector for LighterOrderBookWs {
    const ID: ExchangeId = ExchangeId::Lighter;

    fn kind(&self) -> MarketKind {
        self.kind
    }

    fn url(&self) -> &'static str {
        LIGHTER_WS_URL
    }

    fn batch_size(&self) -> usize {
        LIGHTER_BATCH
    }

    fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
        ids.iter()
            .map(|market_id| {
                let request = json!({
                    "type": "subscribe",
                    "channel": format!("order_book/{market_id}"),
                });
                WsMessage::text(request.to_string())
            })
            .collect()
    }

    // Deltas from a previous session are meaningless after a reconnect.
    fn on_connect(&mut self) {
        self.books.clear();
    }

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
        let message = de_message::<LighterMessage>(text)?;

        if message.kind == "ping" {
            return Ok(FeedMessage::Reply(WsMessage::text(
                json!({"type": "pong"}).to_string(),
            )));
        }

        let (Some(market_id), Some(delta)) = (message.market_id(), message.order_book.as_ref())
        else {
            return Ok(FeedMessage::Ignore);
        };

        if message.is_snapshot() {
            self.books.remove(market_id);
        }
        let book = self.books.entry(market_id.to_string()).or_default();

        LocalBook::apply(&mut book.bids, &delta.bids);
        LocalBook::apply(&mut book.asks, &delta.asks);

        match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) => Ok(FeedMessage::Quotes(vec![QuoteUpdate::new(
                market_id, bid, ask,
            )])),
            _ => Ok(FeedMessage::Ignore),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn update(kind: &str, bids: &str, asks: &str) -> String {
        format!(
            r#"{{"channel":"order_book:1","type":"{kind}","order_book":{{"bids":{bids},"asks":{asks}}}}}"#
        )
    }

    #[test]
    fn test_deltas_merge_into_book() {
        let mut connector = LighterOrderBookWs::new(MarketKind::Perp);

        struct TestCase {
            name: &'static str,
            input: String,
            expected: FeedMessage,
        }

        let cases = vec![
            TestCase {
                name: "first message seeds the book",
                input: update(
                    "subscribed/order_book",
                    r#"[{"price":"100.0","size":"1"},{"price":"99.5","size":"2"}]"#,
                    r#"[{"price":"101.0","size":"1"},{"price":"102.0","size":"4"}]"#,
                ),
                expected: FeedMessage::Quotes(vec![QuoteUpdate::new("1", 100.0, 101.0)]),
            },
            TestCase {
                name: "zero size removes best ask",
                input: update("update/order_book", "[]", r#"[{"price":"101.0","size":"0"}]"#),
                expected: FeedMessage::Quotes(vec![QuoteUpdate::new("1", 100.0, 102.0)]),
            },
            TestCase {
                name: "new better bid",
                input: update("update/order_book", r#"[{"price":"100.5","size":"3"}]"#, "[]"),
                expected: FeedMessage::Quotes(vec![QuoteUpdate::new("1", 100.5, 102.0)]),
            },
            TestCase {
                name: "snapshot replaces the book",
                input: update(
                    "snapshot",
                    r#"[{"price":"90","size":"1"}]"#,
                    r#"[{"price":"91","size":"1"}]"#,
                ),
                expected: FeedMessage::Quotes(vec![QuoteUpdate::new("1", 90.0, 91.0)]),
            },
            TestCase {
                name: "removing the only bid leaves a one sided book",
                input: update("update/order_book", r#"[{"price":"90","size":"0"}]"#, "[]"),
                expected: FeedMessage::Ignore,
            },
        ];

        for case in cases {
            let parsed = connector.parse(&case.input).unwrap();
            assert_eq!(parsed, case.expected, "{}", case.name);
        }
    }

    #[test]
    fn test_reconnect_clears_books() {
        let mut connector = LighterOrderBookWs::new(MarketKind::Spot);
        connector
            .parse(&update(
                "update/order_book",
                r#"[{"price":"10","size":"1"}]"#,
                r#"[{"price":"11","size":"1"}]"#,
            ))
            .unwrap();
        connector.on_connect();

        // a stale delta alone must not resurrect the old ask
        let parsed = connector
            .parse(&update("update/order_book", r#"[{"price":"9","size":"1"}]"#, "[]"))
            .unwrap();
        assert_eq!(parsed, FeedMessage::Ignore);
    }

    #[test]
    fn test_control_frames() {
        let mut connector = LighterOrderBookWs::new(MarketKind::Perp);
        assert_eq!(
            connector.parse(r#"{"type":"ping"}"#).unwrap(),
            FeedMessage::Reply(WsMessage::text(r#"{"type":"pong"}"#))
        );
        assert_eq!(
            connector.parse(r#"{"type":"connected","session_id":"abc"}"#).unwrap(),
            FeedMessage::Ignore
        );
        assert_eq!(
            connector.requests(&["1".to_string(), "24".to_string()]),
            vec![
                WsMessage::text(r#"{"channel":"order_book/1","type":"subscribe"}"#),
                WsMessage::text(r#"{"channel":"order_book/24","type":"subscribe"}"#),
            ]
        );
    }
}
