use reqwest::Error;
use thiserror::Error;

use super::{
    protocols::ws::WsError,
    shared::subscription_models::{ExchangeId, MarketKind},
};

/*----- */
// SocketError
/*----- */
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid url {url}: {error}")]
    InvalidUrl { url: String, error: url::ParseError },

    #[error("Deserialising JSON error: {error} for payload: {payload}")]
    Deserialise {
        error: serde_json::Error,
        payload: String,
    },

    #[error("Deserialising JSON error: {error} for binary payload: {payload:?}")]
    DeserialiseBinary {
        error: serde_json::Error,
        payload: Vec<u8>,
    },

    #[error("Serialising error: {0}")]
    Serialise(String),

    #[error("error subscribing to resources over the socket: {0}")]
    Subscribe(String),

    #[error("{exchange} does not offer a {kind} market")]
    UnsupportedMarket {
        exchange: ExchangeId,
        kind: MarketKind,
    },

    #[error("{exchange} returned no usable data for {what}")]
    EmptyResponse {
        exchange: ExchangeId,
        what: String,
    },

    #[error("Feed for {0} was closed")]
    FeedClosed(ExchangeId),

    // Terminal errors
    #[error("WebSocket disconnected: {error}")]
    WebSocketDisconnected { error: WsError },

    #[error("ExchangeStream terminated with closing frame: {0}")]
    Terminated(String),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("HTTP request timed out")]
    HttpTimeout(reqwest::Error),

    /// REST http response error
    #[error("HTTP response (status={0}) error: {1}")]
    HttpResponse(reqwest::StatusCode, String),
}

impl From<reqwest::Error> for SocketError {
    fn from(error: Error) -> Self {
        match error {
            error if error.is_timeout() => SocketError::HttpTimeout(error),
            error => SocketError::Http(error),
        }
    }
}

impl SocketError {
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            SocketError::WebSocketDisconnected { .. } => true,
            SocketError::Terminated(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_terminal() {
        struct TestCase {
            name: &'static str,
            error: SocketError,
            expected: bool,
        }

        let cases = vec![
            TestCase {
                name: "closing frame",
                error: SocketError::Terminated("1000".to_string()),
                expected: true,
            },
            TestCase {
                name: "bad subscription",
                error: SocketError::Subscribe("rejected".to_string()),
                expected: false,
            },
            TestCase {
                name: "closed feed",
                error: SocketError::FeedClosed(ExchangeId::Bybit),
                expected: false,
            },
        ];

        for case in cases {
            assert_eq!(case.error.is_terminal(), case.expected, "{}", case.name);
        }
    }
}
