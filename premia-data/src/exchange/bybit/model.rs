use serde::Deserialize;

use crate::{assets::level::Level, shared::de::de_flexible_f64_optional};

/*----- */
// Websocket
/*----- */
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BybitMessage {
    Book {
        topic: String,
        data: BybitBookData,
    },
    Op {
        op: String,
        #[serde(default)]
        success: Option<bool>,
        #[serde(default)]
        ret_msg: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct BybitBookData {
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub b: Vec<Level>,
    #[serde(default)]
    pub a: Vec<Level>,
}

/*----- */
// Rest
/*----- */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitResponse<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    pub result: T,
}

#[derive(Debug, Deserialize)]
pub struct BybitList<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitInstrument {
    pub symbol: String,
    pub base_coin: String,
    pub quote_coin: String,
    #[serde(default)]
    pub settle_coin: Option<String>,
    pub status: String,
    #[serde(default)]
    pub contract_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitTicker {
    pub symbol: String,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub bid1_price: Option<f64>,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub ask1_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BybitOrderBook {
    #[serde(default)]
    pub b: Vec<Level>,
    #[serde(default)]
    pub a: Vec<Level>,
}
