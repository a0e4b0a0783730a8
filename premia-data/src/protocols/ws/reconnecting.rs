use std::{collections::VecDeque, sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    time::{interval, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::{backoff::Backoff, BoxedSink, BoxedStream, PingInterval, Transport, WsMessage};

/*----- */
// Socket handler
/*----- */
// Venue specific behaviour plugged into a `ReconnectingSocket`.
pub trait SocketHandler: Send + 'static {
    /// Frames sent straight after every successful connect, ahead of anything queued.
    fn on_open(&mut self) -> Vec<WsMessage>;

    /// Handle one inbound frame, optionally answering on the same socket.
    fn on_message(&mut self, message: WsMessage) -> Option<WsMessage>;

    fn on_status(&mut self, _connected: bool) {}

    fn ping_interval(&self) -> Option<PingInterval> {
        None
    }
}

enum SessionEnd {
    Shutdown,
    Closed(String),
}

/*----- */
// Reconnecting socket
/*----- */
// Owns one socket for its whole life. Reconnects on any close that was not
// requested through the shutdown signal. Outbound frames that arrive while
// disconnected are queued and flushed in order after the next open.
pub struct ReconnectingSocket<Handler> {
    name: String,
    url: String,
    transport: Arc<dyn Transport>,
    handler: Handler,
    backoff: Backoff,
    attempts: u32,
    pending: VecDeque<WsMessage>,
    outbound_rx: mpsc::UnboundedReceiver<WsMessage>,
    outbound_open: bool,
    shutdown: watch::Receiver<bool>,
}

impl<Handler> ReconnectingSocket<Handler>
where
    Handler: SocketHandler,
{
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        transport: Arc<dyn Transport>,
        handler: Handler,
        outbound_rx: mpsc::UnboundedReceiver<WsMessage>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            transport,
            handler,
            backoff: Backoff::RECONNECT,
            attempts: 0,
            pending: VecDeque::new(),
            outbound_rx,
            outbound_open: true,
            shutdown,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn run(mut self) {
        loop {
            if self.is_shutdown() {
                break;
            }

            match self.transport.connect(&self.url).await {
                Ok((sink, stream)) => {
                    self.attempts = 0;
                    self.handler.on_status(true);
                    info!(feed = %self.name, url = %self.url, "websocket connected");

                    match self.session(sink, stream).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed(reason) => {
                            warn!(feed = %self.name, reason = %reason, "websocket closed");
                        }
                    }
                }
                Err(error) => {
                    warn!(feed = %self.name, url = %self.url, error = %error, "websocket connect failed");
                }
            }

            self.handler.on_status(false);
            let delay = self.backoff.delay(self.attempts);
            self.attempts = self.attempts.saturating_add(1);
            warn!(
                feed = %self.name,
                action = "reconnecting",
                attempt = self.attempts,
                backoff_ms = delay.as_millis() as u64,
            );

            if !self.wait_disconnected(delay).await {
                break;
            }
        }

        self.handler.on_status(false);
        debug!(feed = %self.name, "websocket task stopped");
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    // Sleep out the backoff while queueing outbound frames. Returns false on shutdown.
    async fn wait_disconnected(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return false;
                    }
                }
                outbound = self.outbound_rx.recv(), if self.outbound_open => match outbound {
                    Some(frame) => self.pending.push_back(frame),
                    None => self.outbound_open = false,
                },
            }
        }
    }

    async fn flush(&mut self, sink: &mut BoxedSink, opening: Vec<WsMessage>) -> Result<(), String> {
        for frame in opening {
            sink.send(frame).await.map_err(|error| error.to_string())?;
        }

        while let Some(frame) = self.pending.pop_front() {
            if let Err(error) = sink.send(frame.clone()).await {
                self.pending.push_front(frame);
                return Err(error.to_string());
            }
        }
        Ok(())
    }

    async fn session(&mut self, mut sink: BoxedSink, mut stream: BoxedStream) -> SessionEnd {
        let opening = self.handler.on_open();
        if let Err(reason) = self.flush(&mut sink, opening).await {
            return SessionEnd::Closed(reason);
        }

        let ping = self.handler.ping_interval();
        let mut ping_timer = ping.as_ref().map(|ping| {
            let period = Duration::from_secs(ping.time.max(1));
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer.reset();
            timer
        });

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        let _ = sink.close().await;
                        return SessionEnd::Shutdown;
                    }
                }
                outbound = self.outbound_rx.recv(), if self.outbound_open => match outbound {
                    Some(frame) => {
                        if let Err(error) = sink.send(frame.clone()).await {
                            self.pending.push_back(frame);
                            return SessionEnd::Closed(error.to_string());
                        }
                    }
                    None => self.outbound_open = false,
                },
                _ = next_ping(&mut ping_timer) => {
                    if let Some(ping) = &ping {
                        if let Err(error) = sink.send(ping.frame()).await {
                            return SessionEnd::Closed(error.to_string());
                        }
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(WsMessage::Close(close_frame))) => {
                        return SessionEnd::Closed(format!("{close_frame:?}"));
                    }
                    Some(Ok(message)) => {
                        if let Some(reply) = self.handler.on_message(message) {
                            if let Err(error) = sink.send(reply).await {
                                return SessionEnd::Closed(error.to_string());
                            }
                        }
                    }
                    Some(Err(error)) => return SessionEnd::Closed(error.to_string()),
                    None => return SessionEnd::Closed("stream ended".to_string()),
                },
            }
        }
    }
}

async fn next_ping(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocols::ws::channel::ChannelTransport;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        opened: Arc<Mutex<usize>>,
        received: Arc<Mutex<Vec<String>>>,
    }

    impl SocketHandler for Recorder {
        fn on_open(&mut self) -> Vec<WsMessage> {
            *self.opened.lock() += 1;
            vec![WsMessage::text("subscribe")]
        }

        fn on_message(&mut self, message: WsMessage) -> Option<WsMessage> {
            let text = message.into_text().unwrap_or_default();
            self.received.lock().push(text.clone());
            (text == "ping").then(|| WsMessage::text("pong"))
        }
    }

    async fn until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_queued_frames_flush_in_order_after_reconnect() {
        let transport = Arc::new(ChannelTransport::default());
        let recorder = Recorder::default();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let socket = ReconnectingSocket::new(
            "test",
            "wss://venue.test/ws",
            transport.clone(),
            recorder.clone(),
            outbound_rx,
            shutdown_rx,
        )
        .with_backoff(Backoff {
            initial_ms: 50,
            multiplier: 2,
            max_ms: 100,
        });
        let task = tokio::spawn(socket.run());

        until(|| transport.connect_count("wss://venue.test/ws") == 1).await;
        let mut first = transport.take_session().unwrap();
        assert_eq!(first.next_text().await.as_deref(), Some("subscribe"));

        // server side ping is answered on the same socket
        first.push_text("ping");
        assert_eq!(first.next_text().await.as_deref(), Some("pong"));

        // drop the server half, then queue frames while the client is backing off
        first.close();
        drop(first);
        outbound_tx.send(WsMessage::text("one")).unwrap();
        outbound_tx.send(WsMessage::text("two")).unwrap();

        until(|| transport.connect_count("wss://venue.test/ws") == 2).await;
        let mut second = transport.take_session().unwrap();
        assert_eq!(second.next_text().await.as_deref(), Some("subscribe"));
        assert_eq!(second.next_text().await.as_deref(), Some("one"));
        assert_eq!(second.next_text().await.as_deref(), Some("two"));
        assert_eq!(*recorder.opened.lock(), 2);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(transport.connect_count("wss://venue.test/ws"), 2);
    }
}
