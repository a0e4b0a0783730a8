pub mod backoff;
pub mod channel;
pub mod reconnecting;

use std::{fmt::Debug, pin::Pin};

use async_trait::async_trait;
use futures::{Sink, Stream};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::client::IntoClientRequest, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::error::SocketError;

/*----- */
// Convenient types
/*----- */
pub type WsMessage = tokio_tungstenite::tungstenite::Message;
pub type WsError = tokio_tungstenite::tungstenite::Error;
pub type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type BoxedSink = Pin<Box<dyn Sink<WsMessage, Error = WsError> + Send>>;
pub type BoxedStream = Pin<Box<dyn Stream<Item = Result<WsMessage, WsError>> + Send>>;

/*----- */
// Transport
/*----- */
// Seam between the reconnect logic and the network so feeds can run against
// an in-memory transport in tests.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn connect(&self, url: &str) -> Result<(BoxedSink, BoxedStream), SocketError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteTransport;

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<(BoxedSink, BoxedStream), SocketError> {
        let websocket = connect(url).await?;
        let (ws_write, ws_read) = websocket.split();
        Ok((Box::pin(ws_write), Box::pin(ws_read)))
    }
}

pub async fn connect<R>(request: R) -> Result<WebSocket, SocketError>
where
    R: IntoClientRequest + Unpin + Debug,
{
    debug!(?request, "attempting to establish WebSocket connection");
    connect_async(request)
        .await
        .map(|(websocket, _)| websocket)
        .map_err(SocketError::WebSocketError)
}

/*----- */
// Models
/*----- */
// Application level keep alive. `message` is sent as a text frame every `time` seconds.
#[derive(Clone, Debug)]
pub struct PingInterval {
    pub time: u64,
    pub message: Value,
}

impl PingInterval {
    pub fn frame(&self) -> WsMessage {
        match &self.message {
            Value::String(text) => WsMessage::text(text.clone()),
            other => WsMessage::text(other.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ping_frame() {
        let okx = PingInterval {
            time: 25,
            message: json!("ping"),
        };
        assert_eq!(okx.frame(), WsMessage::text("ping"));

        let bybit = PingInterval {
            time: 20,
            message: json!({"op": "ping"}),
        };
        assert_eq!(bybit.frame(), WsMessage::text(r#"{"op":"ping"}"#));
    }
}
