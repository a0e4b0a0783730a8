use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
    SinkExt, StreamExt,
};
use parking_lot::Mutex;

use super::{BoxedSink, BoxedStream, Transport, WsError, WsMessage};
use crate::error::SocketError;

/*----- */
// Channel transport
/*----- */
// In-memory `Transport`. Every connect produces a `ServerSession` the caller can
// drive by hand, and connects are counted per url so sharing can be asserted.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    inner: Mutex<ChannelTransportInner>,
}

#[derive(Debug, Default)]
struct ChannelTransportInner {
    connects: HashMap<String, usize>,
    sessions: VecDeque<ServerSession>,
    refused: HashSet<String>,
}

#[derive(Debug)]
pub struct ServerSession {
    pub url: String,
    to_client: UnboundedSender<Result<WsMessage, WsError>>,
    from_client: UnboundedReceiver<WsMessage>,
}

impl ServerSession {
    pub fn push(&self, message: WsMessage) {
        let _ = self.to_client.unbounded_send(Ok(message));
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(WsMessage::text(text.into()));
    }

    pub fn close(&self) {
        self.to_client.close_channel();
    }

    /// Next text frame the client wrote, or None after a second of silence.
    pub async fn next_text(&mut self) -> Option<String> {
        let next = tokio::time::timeout(Duration::from_secs(1), self.from_client.next()).await;
        match next {
            Ok(Some(message)) => message.into_text().ok(),
            _ => None,
        }
    }
}

impl ChannelTransport {
    pub fn connect_count(&self, url: &str) -> usize {
        self.inner.lock().connects.get(url).copied().unwrap_or(0)
    }

    pub fn connect_count_prefix(&self, prefix: &str) -> usize {
        self.inner
            .lock()
            .connects
            .iter()
            .filter(|(url, _)| url.starts_with(prefix))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn total_connects(&self) -> usize {
        self.inner.lock().connects.values().sum()
    }

    /// Oldest session not yet taken.
    pub fn take_session(&self) -> Option<ServerSession> {
        self.inner.lock().sessions.pop_front()
    }

    pub fn take_sessions_for(&self, url: &str) -> Vec<ServerSession> {
        let mut inner = self.inner.lock();
        let (matching, rest): (VecDeque<_>, VecDeque<_>) =
            inner.sessions.drain(..).partition(|session| session.url == url);
        inner.sessions = rest;
        matching.into_iter().collect()
    }

    /// Make connects to `url` fail until allowed again.
    pub fn refuse(&self, url: &str) {
        self.inner.lock().refused.insert(url.to_string());
    }

    pub fn allow(&self, url: &str) {
        self.inner.lock().refused.remove(url);
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self, url: &str) -> Result<(BoxedSink, BoxedStream), SocketError> {
        let mut inner = self.inner.lock();
        *inner.connects.entry(url.to_string()).or_default() += 1;

        if inner.refused.contains(url) {
            return Err(SocketError::Terminated(format!("connection to {url} refused")));
        }

        let (client_tx, from_client) = unbounded::<WsMessage>();
        let (to_client, client_rx) = unbounded::<Result<WsMessage, WsError>>();

        inner.sessions.push_back(ServerSession {
            url: url.to_string(),
            to_client,
            from_client,
        });

        let sink = client_tx.sink_map_err(|_| WsError::ConnectionClosed);
        Ok((Box::pin(sink), Box::pin(client_rx)))
    }
}
