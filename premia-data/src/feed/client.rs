use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use itertools::Itertools;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::{
    cache::QuoteCache,
    connector::{FeedMessage, QuoteConnector, QuoteUpdate},
};
use crate::{
    assets::quote::Quote,
    error::SocketError,
    protocols::ws::{
        reconnecting::{ReconnectingSocket, SocketHandler},
        PingInterval, Transport, WsMessage,
    },
    shared::{
        subscription_models::Venue,
        utils::{batches, Clock},
    },
};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl FeedStatus {
    /// Feed status from per socket links (`None` until a socket first reports).
    /// The feed is up while any socket is.
    pub fn from_links(links: &[Option<bool>]) -> Self {
        if links.contains(&Some(true)) {
            FeedStatus::Connected
        } else if links.contains(&Some(false)) {
            FeedStatus::Disconnected
        } else {
            FeedStatus::Connecting
        }
    }
}

#[derive(Debug)]
struct SocketLinks {
    links: Mutex<Vec<Option<bool>>>,
    status_tx: watch::Sender<FeedStatus>,
}

impl SocketLinks {
    fn new(sockets: usize, status_tx: watch::Sender<FeedStatus>) -> Self {
        Self {
            links: Mutex::new(vec![None; sockets]),
            status_tx,
        }
    }

    fn set(&self, socket: usize, connected: bool) {
        let next = {
            let mut links = self.links.lock();
            if let Some(link) = links.get_mut(socket) {
                *link = Some(connected);
            }
            FeedStatus::from_links(&links)
        };
        self.status_tx.send_if_modified(|status| {
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        });
    }
}

/*----- */
// Socket handler for one batch of markets
/*----- */
struct FeedSocketHandler<Connector> {
    connector: Connector,
    ids: Vec<String>,
    updates_tx: mpsc::UnboundedSender<Vec<QuoteUpdate>>,
    socket: usize,
    links: Arc<SocketLinks>,
}

impl<Connector> SocketHandler for FeedSocketHandler<Connector>
where
    Connector: QuoteConnector,
{
    fn on_open(&mut self) -> Vec<WsMessage> {
        self.connector.on_connect();
        self.connector.requests(&self.ids)
    }

    fn on_message(&mut self, message: WsMessage) -> Option<WsMessage> {
        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Binary(payload) => match String::from_utf8(payload) {
                Ok(text) => text,
                Err(error) => {
                    debug!(exchange = %Connector::ID, error = %error, "dropping non utf8 frame");
                    return None;
                }
            },
            _ => return None,
        };

        if text.trim() == "ping" {
            return Some(WsMessage::text("pong"));
        }

        match self.connector.parse(&text) {
            Ok(FeedMessage::Quotes(updates)) if !updates.is_empty() => {
                let _ = self.updates_tx.send(updates);
                None
            }
            Ok(FeedMessage::Reply(reply)) => Some(reply),
            Ok(_) => None,
            Err(error) => {
                debug!(exchange = %Connector::ID, error = %error, "failed to parse feed message");
                None
            }
        }
    }

    fn on_status(&mut self, connected: bool) {
        self.links.set(self.socket, connected);
    }

    fn ping_interval(&self) -> Option<PingInterval> {
        self.connector.ping_interval()
    }
}

/*----- */
// Feed handle
/*----- */
#[derive(Debug)]
struct FeedInner {
    venue: Venue,
    symbols: Vec<String>,
    cache: Arc<QuoteCache>,
    outbound: Vec<mpsc::UnboundedSender<WsMessage>>,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<FeedStatus>,
}

// Cheap to clone; every clone reads the same cache. The sockets stop on `close`
// or once the last clone is dropped.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    inner: Arc<FeedInner>,
}

impl FeedHandle {
    pub fn venue(&self) -> Venue {
        self.inner.venue
    }

    pub fn symbols(&self) -> &[String] {
        &self.inner.symbols
    }

    pub fn get_quote(&self, symbol: &str) -> Option<Quote> {
        self.inner.cache.get_quote(symbol)
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.inner.cache
    }

    /// Poll until every symbol has a fresh quote. Returns false on timeout.
    pub async fn wait_for_symbols(&self, symbols: &[String], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if symbols.iter().all(|symbol| self.get_quote(symbol).is_some()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Send a frame on every socket of the feed, queued while disconnected.
    pub fn send(&self, message: WsMessage) -> Result<(), SocketError> {
        if self.is_closed() {
            return Err(SocketError::FeedClosed(self.inner.venue.exchange));
        }
        for outbound in &self.inner.outbound {
            outbound
                .send(message.clone())
                .map_err(|_| SocketError::FeedClosed(self.inner.venue.exchange))?;
        }
        Ok(())
    }

    pub fn close(&self) {
        let _ = self.inner.shutdown.send(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<FeedStatus> {
        self.inner.status.clone()
    }
}

/*----- */
// Spawn
/*----- */
// Splits `ids` into connector sized batches, one reconnecting socket each. All
// sockets publish into one channel drained by a single cache writer.
pub fn spawn_feed<Connector>(
    connector: Connector,
    transport: Arc<dyn Transport>,
    ids: Vec<String>,
    stale_ms: u64,
    clock: Arc<dyn Clock>,
) -> FeedHandle
where
    Connector: QuoteConnector,
{
    let venue = connector.venue();
    let ids = ids.into_iter().unique().collect_vec();
    let cache = Arc::new(QuoteCache::new(stale_ms, clock));

    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (status_tx, status_rx) = watch::channel(FeedStatus::Connecting);

    tokio::spawn(run_cache_updater(cache.clone(), updates_rx));

    let socket_batches = batches(&ids, connector.batch_size());
    let links = Arc::new(SocketLinks::new(socket_batches.len(), status_tx));
    let mut outbound = Vec::new();
    for (socket, batch) in socket_batches.into_iter().enumerate() {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let handler = FeedSocketHandler {
            connector: connector.clone(),
            ids: batch,
            updates_tx: updates_tx.clone(),
            socket,
            links: links.clone(),
        };
        let socket = ReconnectingSocket::new(
            venue.to_string(),
            connector.url(),
            transport.clone(),
            handler,
            outbound_rx,
            shutdown_rx.clone(),
        );
        tokio::spawn(socket.run());
        outbound.push(outbound_tx);
    }

    info!(
        venue = %venue,
        symbols = ids.len(),
        sockets = outbound.len(),
        "quote feed started"
    );

    FeedHandle {
        inner: Arc::new(FeedInner {
            venue,
            symbols: ids,
            cache,
            outbound,
            shutdown: shutdown_tx,
            status: status_rx,
        }),
    }
}

async fn run_cache_updater(
    cache: Arc<QuoteCache>,
    mut updates_rx: mpsc::UnboundedReceiver<Vec<QuoteUpdate>>,
) {
    while let Some(updates) = updates_rx.recv().await {
        for update in &updates {
            cache.apply(update);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        protocols::ws::channel::ChannelTransport,
        shared::{
            subscription_models::{ExchangeId, MarketKind},
            utils::SystemClock,
        },
    };

    // "SYM bid ask" per line
    #[derive(Debug, Clone)]
    struct LineConnector;

    impl QuoteConnector for LineConnector {
        const ID: ExchangeId = ExchangeId::Gateio;

        fn kind(&self) -> MarketKind {
            MarketKind::Spot
        }

        fn url(&self) -> &'static str {
            "wss://line.test"
        }

        fn batch_size(&self) -> usize {
            2
        }

        fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
            vec![WsMessage::text(format!("sub {}", ids.join(",")))]
        }

        fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
            let parts = text.split_whitespace().collect::<Vec<_>>();
            match parts.as_slice() {
                [symbol, bid, ask] => Ok(FeedMessage::Quotes(vec![QuoteUpdate::new(
                    *symbol,
                    bid.parse().unwrap_or(0.0),
                    ask.parse().unwrap_or(0.0),
                )])),
                _ => Ok(FeedMessage::Ignore),
            }
        }
    }

    #[tokio::test]
    async fn test_feed_batches_and_waits_for_symbols() {
        let transport = Arc::new(ChannelTransport::default());
        let ids = vec!["A", "B", "C", "A"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let feed = spawn_feed(
            LineConnector,
            transport.clone(),
            ids,
            10_000,
            Arc::new(SystemClock),
        );
        assert_eq!(feed.symbols(), &["A", "B", "C"]);

        let wanted = vec!["A".to_string(), "C".to_string()];
        assert!(!feed.wait_for_symbols(&wanted, Duration::from_millis(120)).await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.connect_count("wss://line.test"), 2);

        let mut sessions = transport.take_sessions_for("wss://line.test");
        let mut subscriptions = Vec::new();
        for session in sessions.iter_mut() {
            subscriptions.push(session.next_text().await.unwrap());
        }
        subscriptions.sort();
        assert_eq!(subscriptions, vec!["sub A,B", "sub C"]);

        sessions[0].push_text("A 1.0 1.1");
        sessions[1].push_text("C 2.0 2.2");
        sessions[1].push_text("ping");
        assert_eq!(sessions[1].next_text().await.as_deref(), Some("pong"));

        assert!(feed.wait_for_symbols(&wanted, Duration::from_secs(1)).await);
        assert_eq!(feed.get_quote("C"), Some(Quote::new(2.0, 2.2)));
        assert_eq!(*feed.subscribe_status().borrow(), FeedStatus::Connected);

        feed.close();
        assert!(feed.send(WsMessage::text("late")).is_err());
    }

    #[test]
    fn test_status_from_links() {
        struct TestCase {
            name: &'static str,
            links: Vec<Option<bool>>,
            expected: FeedStatus,
        }

        let cases = vec![
            TestCase {
                name: "nothing reported",
                links: vec![None, None],
                expected: FeedStatus::Connecting,
            },
            TestCase {
                name: "one socket up",
                links: vec![Some(false), Some(true), None],
                expected: FeedStatus::Connected,
            },
            TestCase {
                name: "every reported socket down",
                links: vec![Some(false), None],
                expected: FeedStatus::Disconnected,
            },
        ];

        for case in cases {
            assert_eq!(FeedStatus::from_links(&case.links), case.expected, "{}", case.name);
        }
    }

    #[tokio::test]
    async fn test_feed_stays_connected_while_any_socket_is() {
        let transport = Arc::new(ChannelTransport::default());
        let ids = ["A", "B", "C"].map(String::from).to_vec();
        let feed = spawn_feed(LineConnector, transport.clone(), ids, 10_000, Arc::new(SystemClock));
        let status = feed.subscribe_status();

        let mut sessions = Vec::new();
        for _ in 0..100 {
            sessions.extend(transport.take_sessions_for("wss://line.test"));
            if sessions.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sessions.len(), 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*status.borrow(), FeedStatus::Connected);

        transport.refuse("wss://line.test");
        sessions[0].close();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*status.borrow(), FeedStatus::Connected);

        sessions[1].close();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*status.borrow(), FeedStatus::Disconnected);

        feed.close();
    }
}
