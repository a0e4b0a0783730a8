use serde::Deserialize;

use crate::{
    assets::level::Level,
    shared::de::{de_flexible_f64_optional, OneOrMany},
};

/*----- */
// Websocket
/*----- */
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum GateioMessage<T> {
    Update {
        channel: String,
        result: OneOrMany<T>,
    },
    Ping {
        #[serde(default)]
        channel: Option<String>,
        #[serde(default)]
        time: Option<u64>,
    },
    Subscribe {
        #[serde(default)]
        error: Option<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct GateioSpotTicker {
    pub currency_pair: String,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub highest_bid: Option<f64>,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub lowest_ask: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct GateioBookTicker {
    pub s: String,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub b: Option<f64>,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub a: Option<f64>,
}

/*----- */
// Rest
/*----- */
#[derive(Debug, Deserialize)]
pub struct GateioCurrencyPair {
    pub id: String,
    pub base: String,
    pub quote: String,
    #[serde(default)]
    pub trade_status: String,
}

#[derive(Debug, Deserialize)]
pub struct GateioContract {
    pub name: String,
    #[serde(default)]
    pub in_delisting: bool,
}

#[derive(Debug, Deserialize)]
pub struct GateioFuturesTicker {
    pub contract: String,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub highest_bid: Option<f64>,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub lowest_ask: Option<f64>,
}

// Futures sizes are contract counts, used as is.
#[derive(Debug, Deserialize)]
pub struct GateioOrderBook {
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}
