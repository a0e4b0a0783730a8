use serde::Deserialize;

use crate::assets::level::Level;

/*----- */
// Websocket
/*----- */
#[derive(Debug, Deserialize)]
pub struct LighterMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    pub order_book: Option<LighterBookDelta>,
}

impl LighterMessage {
    /// Market id from `order_book:<id>` or `order_book/<id>`.
    pub fn market_id(&self) -> Option<&str> {
        self.channel
            .strip_prefix("order_book:")
            .or_else(|| self.channel.strip_prefix("order_book/"))
            .filter(|id| !id.is_empty())
    }

    pub fn is_snapshot(&self) -> bool {
        self.kind.contains("snapshot")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LighterBookDelta {
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

/*----- */
// Rest
/*----- */
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LighterOrderBooks {
    Wrapped { order_books: Vec<LighterMarket> },
    Bare(Vec<LighterMarket>),
}

impl LighterOrderBooks {
    pub fn into_vec(self) -> Vec<LighterMarket> {
        match self {
            LighterOrderBooks::Wrapped { order_books } => order_books,
            LighterOrderBooks::Bare(markets) => markets,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LighterMarket {
    #[serde(default)]
    pub symbol: String,
    #[serde(alias = "marketId", alias = "id", deserialize_with = "de_market_id")]
    pub market_id: String,
    #[serde(default)]
    pub market_type: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct LighterOrderBookOrders {
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

// Market ids arrive as numbers on some endpoints and strings on others.
fn de_market_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Num(id) => id.to_string(),
        Id::Text(id) => id,
    })
}
