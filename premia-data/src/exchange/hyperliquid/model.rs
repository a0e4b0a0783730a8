use serde::Deserialize;

use crate::assets::level::Level;

/*----- */
// Websocket
/*----- */
#[derive(Debug, Deserialize)]
#[serde(tag = "channel")]
pub enum HyperliquidMessage {
    #[serde(rename = "l2Book")]
    L2Book { data: HyperliquidL2Book },
    #[serde(rename = "error")]
    Error { data: serde_json::Value },
    #[serde(other)]
    Other,
}

/*----- */
// Shared by socket and rest
/*----- */
// `levels[0]` holds bids, `levels[1]` asks.
#[derive(Debug, Deserialize)]
pub struct HyperliquidL2Book {
    pub coin: String,
    #[serde(default)]
    pub levels: Vec<Vec<Level>>,
}

impl HyperliquidL2Book {
    pub fn bids(&self) -> &[Level] {
        self.levels.first().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn asks(&self) -> &[Level] {
        self.levels.get(1).map(Vec::as_slice).unwrap_or_default()
    }
}

/*----- */
// Rest
/*----- */
#[derive(Debug, Deserialize)]
pub struct HyperliquidMeta {
    pub universe: Vec<HyperliquidPerpAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HyperliquidPerpAsset {
    pub name: String,
    #[serde(default)]
    pub is_delisted: bool,
}

#[derive(Debug, Deserialize)]
pub struct HyperliquidSpotMeta {
    pub universe: Vec<HyperliquidSpotPair>,
    pub tokens: Vec<HyperliquidToken>,
}

#[derive(Debug, Deserialize)]
pub struct HyperliquidSpotPair {
    pub name: String,
    pub tokens: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub struct HyperliquidToken {
    pub name: String,
    pub index: usize,
}
