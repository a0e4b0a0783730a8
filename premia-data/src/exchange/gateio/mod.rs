pub mod http;
pub mod model;

use model::{GateioBookTicker, GateioMessage, GateioSpotTicker};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::{
    error::SocketError,
    feed::connector::{de_message, FeedMessage, QuoteConnector, QuoteUpdate},
    protocols::ws::WsMessage,
    shared::{
        subscription_models::{ExchangeId, MarketKind},
        utils::current_timestamp_secs,
    },
};

const GATEIO_SPOT_WS_URL: &str = "wss://api.gateio.ws/ws/v4/";
const GATEIO_FUTURES_WS_URL: &str = "wss://fx-ws.gateio.ws/v4/ws/usdt";
const GATEIO_PAYLOAD_BATCH: usize = 100;
const GATEIO_SOCKET_BATCH: usize = 1_000;

fn subscribe_frames(channel: &str, ids: &[String]) -> Vec<WsMessage> {
    ids.chunks(GATEIO_PAYLOAD_BATCH)
        .map(|batch| {
            let request = json!({
                "time": current_timestamp_secs(),
                "channel": channel,
                "event": "subscribe",
                "payload": batch,
            });
            WsMessage::text(request.to_string())
        })
        .collect()
}

// Shared handling of the gate envelope; `to_update` maps one result item.
fn parse_envelope<T, F>(text: &str, channel: &str, to_update: F) -> Result<FeedMessage, SocketError>
where
    T: DeserializeOwned,
    F: Fn(T) -> Option<QuoteUpdate>,
{
    match de_message::<GateioMessage<T>>(text)? {
        GateioMessage::Update {
            channel: update_channel,
            result,
        } if update_channel == channel => Ok(FeedMessage::Quotes(
            result.into_vec().into_iter().filter_map(to_update).collect(),
        )),
        GateioMessage::Ping {
            channel: ping_channel,
            time,
        } => {
            let pong = json!({
                "time": time.unwrap_or_else(current_timestamp_secs),
                "channel": ping_channel.unwrap_or_else(|| channel.to_string()),
                "event": "pong",
            });
            Ok(FeedMessage::Reply(WsMessage::text(pong.to_string())))
        }
        GateioMessage::Subscribe { error: Some(error) } if !error.is_null() => {
            Err(SocketError::Subscribe(error.to_string()))
        }
        _ => Ok(FeedMessage::Ignore),
    }
}

/*----- */
// Gate.io spot tickers
/*----- */
#[derive(Debug, Clone, Default)]
pub struct GateioSpotTickerWs;

impl QuoteConnector for GateioSpotTickerWs {
    const ID: ExchangeId = ExchangeId::Gateio;

    fn kind(&self) -> MarketKind {
        MarketKind::Spot
    }

    fn url(&self) -> &'static str {
        GATEIO_SPOT_WS_URL
    }

    fn batch_size(&self) -> usize {
        GATEIO_SOCKET_BATCH
    }

    fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
        subscribe_frames("spot.tickers", ids)
    }

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
        parse_envelope(text, "spot.tickers", |ticker: GateioSpotTicker| {
            let bid = ticker.highest_bid.filter(|bid| *bid > 0.0)?;
            let ask = ticker.lowest_ask.filter(|ask| *ask > 0.0)?;
            Some(QuoteUpdate::new(ticker.currency_pair, bid, ask))
        })
    }
}

/*----- */
// Gate.io USDT futures book ticker
/*----- */
#[derive(Debug, Clone, Default)]
pub struct GateioFuturesBookTickerWs;

impl QuoteConnector for GateioFuturesBookTickerWs {
    const ID: ExchangeId = ExchangeId::Gateio;

    fn kind(&self) -> MarketKind {
        MarketKind::Perp
    }

    fn url(&self) -> &'static str {
        GATEIO_FUTURES_WS_URL
    }

    fn batch_size(&self) -> usize {
        GATEIO_SOCKET_BATCH
    }

    fn requests(&self, ids: &[String]) -> Vec<WsMessage> {
        subscribe_frames("futures.book_ticker", ids)
    }

    fn parse(&mut self, text: &str) -> Result<FeedMessage, SocketError> {
        parse_envelope(text, "futures.book_ticker", |ticker: GateioBookTicker| {
            let bid = ticker.b.filter(|bid| *bid > 0.0)?;
            let ask = ticker.a.filter(|ask| *ask > 0.0)?;
            Some(QuoteUpdate::new(ticker.s, bid, ask))
        })
    }
}
