use serde::Deserialize;

use crate::shared::de::de_flexible_f64;

/*----- */
// Websocket
/*----- */
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpbitMessage {
    Event(UpbitEvent),
    Status { status: String },
    Error { error: serde_json::Value },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum UpbitEvent {
    #[serde(rename = "orderbook")]
    OrderBook(UpbitOrderBook),
    #[serde(other)]
    Other,
}

/*----- */
// Shared by socket and rest
/*----- */
#[derive(Debug, Deserialize)]
pub struct UpbitOrderBook {
    #[serde(alias = "market")]
    pub code: String,
    #[serde(default)]
    pub orderbook_units: Vec<UpbitUnit>,
}

#[derive(Debug, Deserialize)]
pub struct UpbitUnit {
    #[serde(deserialize_with = "de_flexible_f64")]
    pub ask_price: f64,
    #[serde(deserialize_with = "de_flexible_f64")]
    pub bid_price: f64,
    #[serde(default, deserialize_with = "de_flexible_f64")]
    pub ask_size: f64,
    #[serde(default, deserialize_with = "de_flexible_f64")]
    pub bid_size: f64,
}

#[derive(Debug, Deserialize)]
pub struct UpbitMarket {
    pub market: String,
}
