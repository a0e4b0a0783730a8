use std::collections::HashMap;

use serde::Deserialize;

use crate::{assets::level::Level, shared::de::de_flexible_f64};

/*----- */
// Websocket
/*----- */
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BithumbMessage {
    Event(BithumbEvent),
    Status {
        status: String,
        #[serde(default)]
        resmsg: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum BithumbEvent {
    #[serde(rename = "orderbookdepth")]
    OrderBookDepth { content: BithumbDepthContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct BithumbDepthContent {
    #[serde(default)]
    pub list: Vec<BithumbDepthEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BithumbDepthEntry {
    pub symbol: String,
    pub order_type: BithumbSide,
    #[serde(deserialize_with = "de_flexible_f64")]
    pub price: f64,
    #[serde(deserialize_with = "de_flexible_f64")]
    pub quantity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BithumbSide {
    Bid,
    Ask,
}

/*----- */
// Rest
/*----- */
#[derive(Debug, Deserialize)]
pub struct BithumbResponse<T> {
    pub status: String,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct BithumbBook {
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

// ALL_KRW responses mix per coin entries with `timestamp` / `payment_currency` / `date`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BithumbAllEntry<T> {
    Market(T),
    Meta(serde_json::Value),
}

pub type BithumbAll<T> = HashMap<String, BithumbAllEntry<T>>;

#[derive(Debug, Deserialize)]
pub struct BithumbTicker {
    pub closing_price: String,
}
