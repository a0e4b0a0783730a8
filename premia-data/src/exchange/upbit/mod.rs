pub mod http;
pub mod model;

use model::{UpbitEvent, UpbitMessage};
use serde_json::json;

use crate::{
    error::SocketError,
    feed::connector::{de_message, FeedMessage, QuoteConnector, QuoteUpdate},
    protocols::ws::WsMessage,
    shared::subscription_models::{ExchangeId, MarketKind},
};

const UPBIT_WS_URL: &str = "wss://api.upbit.com/websocket/v1";
const UPBIT_BATCH: usize = 100;

/*----- */
// Upbit order book feed
/*----- */
// Ids are "KRW-BTC" market codes. Upbit answers with binary frames, which the
// feed client decodes before `parse`.
#[derive(Debug, Clone, Default)]
pub struct UpbitOrderBookWs;

impl QuoteConnector for UpbitOrderBookWs {
    const ID: ExchangeId = ExchangeId::Upbit;

    fn kind(&self) -> MarketKind {
        MarketKind::Spot
    }

    fn url(&self) -> &'static str {
        UPBIT_WS_URL
    }

    fn batch_size(&self) -> usize {
        UPBIT_BATCH
    }

    fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
        if ids.is_empty() {
            return Vec::new();
        }
        let ticket = format!("premia-{}", uuid::Uuid::new_v4().simple());
        let request = json!([
            { "ticket": ticket },
            { "type": "orderbook", "codes": ids, "isOnlyRealtime": true },
        ]);
        vec![WsMessage::text(request.to_string())]
    }

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
        match de_message::<UpbitMessage>(text)? {
            UpbitMessage::Event(UpbitEvent::OrderBook(book)) => {
                let Some(best) = book.orderbook_units.first() else {
                    return Ok(FeedMessage::Ignore);
                };
                if best.bid_price > 0.0 && best.ask_price > 0.0 {
                    Ok(FeedMessage::Quotes(vec![QuoteUpdate::new(
                        book.code,
                        best.bid_price,
                        best.ask_price,
                    )]))
                } else {
                    Ok(FeedMessage::Ignore)
                }
            }
            UpbitMessage::Error { error } => Err(SocketError::Subscribe(error.to_string())),
            UpbitMessage::Event(UpbitEvent::Other) | UpbitMessage::Status { .. } => {
                Ok(FeedMessage::Ignore)
            }
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
            expected: Option<FeedMessage>,
        }

        let cases = vec![
            TestCase {
                name: "orderbook",
                input: r#"{"type":"orderbook","code":"KRW-BTC","timestamp":1,"orderbook_units":[{"ask_price":150100000.0,"bid_price":150000000.0,"ask_size":0.4,"bid_size":0.5}]}"#,
                expected: Some(FeedMessage::Quotes(vec![QuoteUpdate::new(
                    "KRW-BTC",
                    150_000_000.0,
                    150_100_000.0,
                )])),
            },
            TestCase {
                name: "empty units",
                input: r#"{"type":"orderbook","code":"KRW-BTC","orderbook_units":[]}"#,
                expected: Some(FeedMessage::Ignore),
            },
            TestCase {
                name: "status",
                input: r#"{"status":"UP"}"#,
                expected: Some(FeedMessage::Ignore),
            },
            TestCase {
                name: "error",
                input: r#"{"error":{"name":"INVALID_PARAM","message":"bad"}}"#,
                expected: None,
            },
        ];

        for case in cases {
            let parsed = UpbitOrderBookWs.parse(case.input).ok();
            assert_eq!(parsed, case.expected, "{}", case.name);
        }
    }

    #[test]
    fn test_requests_carry_ticket_and_codes() {
        let frames = UpbitOrderBookWs.requests(&["KRW-BTC".to_string(), "KRW-XRP".to_string()]);
        let WsMessage::Text(text) = &frames[0] else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        assert!(value[0]["ticket"].as_str().unwrap().starts_with("premia-"));
        assert_eq!(value[1]["codes"], json!(["KRW-BTC", "KRW-XRP"]));
        assert_eq!(value[1]["isOnlyRealtime"], json!(true));
    }
}
