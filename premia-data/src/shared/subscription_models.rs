use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/*----- */
// Exchange IDs
/*----- */
#[derive(Debug, PartialEq, Hash, Eq, Clone, Copy, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Bithumb,
    Upbit,
    Gateio,
    Bybit,
    Okx,
    Hyperliquid,
    Lighter,
}

impl ExchangeId {
    pub const DOMESTIC: [ExchangeId; 2] = [ExchangeId::Bithumb, ExchangeId::Upbit];

    pub const OVERSEAS: [ExchangeId; 5] = [
        ExchangeId::Gateio,
        ExchangeId::Bybit,
        ExchangeId::Okx,
        ExchangeId::Hyperliquid,
        ExchangeId::Lighter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Bithumb => "bithumb",
            ExchangeId::Upbit => "upbit",
            ExchangeId::Gateio => "gateio",
            ExchangeId::Bybit => "bybit",
            ExchangeId::Okx => "okx",
            ExchangeId::Hyperliquid => "hyperliquid",
            ExchangeId::Lighter => "lighter",
        }
    }

    pub fn is_domestic(&self) -> bool {
        matches!(self, ExchangeId::Bithumb | ExchangeId::Upbit)
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bithumb" => Ok(ExchangeId::Bithumb),
            "upbit" => Ok(ExchangeId::Upbit),
            "gateio" | "gate" => Ok(ExchangeId::Gateio),
            "bybit" => Ok(ExchangeId::Bybit),
            "okx" => Ok(ExchangeId::Okx),
            "hyperliquid" => Ok(ExchangeId::Hyperliquid),
            "lighter" => Ok(ExchangeId::Lighter),
            other => Err(format!("unknown exchange: {other}")),
        }
    }
}

/*----- */
// Market kind
/*----- */
#[derive(Debug, PartialEq, Hash, Eq, Clone, Copy, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Spot,
    Perp,
}

impl MarketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKind::Spot => "spot",
            MarketKind::Perp => "perp",
        }
    }
}

impl Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/*----- */
// Venue = exchange + market kind
/*----- */
#[derive(Debug, PartialEq, Hash, Eq, Clone, Copy, Ord, PartialOrd, Serialize)]
pub struct Venue {
    pub exchange: ExchangeId,
    pub kind: MarketKind,
}

impl Venue {
    pub fn new(exchange: ExchangeId, kind: MarketKind) -> Self {
        Self { exchange, kind }
    }

    pub fn spot(exchange: ExchangeId) -> Self {
        Self::new(exchange, MarketKind::Spot)
    }

    pub fn perp(exchange: ExchangeId) -> Self {
        Self::new(exchange, MarketKind::Perp)
    }
}

impl Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.exchange, self.kind)
    }
}

/*----- */
// Market listing
/*----- */
// `coin` is the canonical upper-case base asset, `id` is what the venue calls the
// market on both its REST and socket APIs (e.g. "BTC_KRW", "KRW-BTC", "BTC-USDT-SWAP", "@107").
#[derive(Default, Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct MarketListing {
    pub coin: String,
    pub id: String,
}

impl MarketListing {
    pub fn new<S>(coin: S, id: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            coin: coin.into().to_uppercase(),
            id: id.into(),
        }
    }
}
