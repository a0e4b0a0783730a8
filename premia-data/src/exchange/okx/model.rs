use serde::Deserialize;

use crate::{assets::level::Level, shared::de::de_flexible_f64_optional};

/*----- */
// Websocket
/*----- */
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OkxMessage {
    Event {
        event: OkxEvent,
        #[serde(default)]
        msg: Option<String>,
    },
    Data {
        data: Vec<OkxTicker>,
    },
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OkxEvent {
    Subscribe,
    Unsubscribe,
    Error,
    #[serde(other)]
    Other,
}

/*----- */
// Shared by socket and rest
/*----- */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxTicker {
    pub inst_id: String,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub bid_px: Option<f64>,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub ask_px: Option<f64>,
}

/*----- */
// Rest
/*----- */
#[derive(Debug, Deserialize)]
pub struct OkxResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxInstrument {
    pub inst_id: String,
    #[serde(default)]
    pub base_ccy: String,
    #[serde(default)]
    pub quote_ccy: String,
    #[serde(default)]
    pub settle_ccy: String,
    #[serde(default)]
    pub ct_val_ccy: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct OkxOrderBook {
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}
