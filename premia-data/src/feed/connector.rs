use crate::{
    error::SocketError,
    protocols::ws::{PingInterval, WsMessage},
    shared::subscription_models::{ExchangeId, MarketKind, Venue},
};

/*----- */
// Normalised feed output
/*----- */
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteUpdate {
    pub symbol: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl QuoteUpdate {
    pub fn new(symbol: impl Into<String>, bid: f64, ask: f64) -> Self {
        Self {
            symbol: symbol.into(),
            bid: Some(bid),
            ask: Some(ask),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Quotes(Vec<QuoteUpdate>),
    Reply(WsMessage),
    Ignore,
}

/*----- */
// Quote connector
/*----- */
// One implementation per venue protocol. A clone runs on every socket of a feed,
// so any per connection book state lives on the connector itself.
pub trait QuoteConnector: Clone + Send + Sync + 'static {
    const ID: ExchangeId;

    fn kind(&self) -> MarketKind;

    fn venue(&self) -> Venue {
        Venue::new(Self::ID, self.kind())
    }

    fn url(&self) -> &'static str;

    /// Max market ids per socket.
    fn batch_size(&self) -> usize;

    fn requests(&self, ids: &[String]) -> Vec<WsMessage>;

    fn ping_interval(&self) -> Option<PingInterval> {
        None
    }

    /// Called on every (re)connect before the subscription frames go out.
    fn on_connect(&mut self) {}

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError>;
}

pub fn de_message<'a, T>(text: &'a str) -> Result<T, SocketError>
where
    T: serde::Deserialize<'a>,
{
    serde_json::from_str::<T>(text).map_err(|error| SocketError::Deserialise {
        error,
        payload: text.to_string(),
    })
}
