use chrono::{SecondsFormat, Utc};
use premia_data::{
    rates::{PremiumSource, RateContext},
    shared::subscription_models::ExchangeId,
};
use serde::{Deserialize, Serialize};

use crate::settings::WatchConfig;

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    B2g,
    G2b,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::B2g => "B→G",
            Direction::G2b => "G→B",
        }
    }
}

/// Which overseas market priced the gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GapSource {
    Spot,
    Perp,
}

/*----- */
// Transfer
/*----- */
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferChain {
    pub sender_chain: String,
    pub receiver_chain: String,
    pub fee_coin: Option<f64>,
    pub fee_krw: Option<f64>,
    pub min_coin: Option<f64>,
    pub min_krw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRoute {
    pub direction: Direction,
    pub chains: Vec<TransferChain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_reason: Option<String>,
}

/*----- */
// Rows
/*----- */
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowImpact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domestic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overseas_spot: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overseas_perp: Option<f64>,
}

// One ranked line of a tick. Individual rows fill the single-leg fields, cycle
// rows the `out*`/`back*` ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRow {
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "is_false")]
    pub cycle: bool,
    pub coin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_coin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_coin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domestic_exchange: Option<ExchangeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overseas_exchange: Option<ExchangeId>,
    #[serde(skip_serializing_if = "is_false")]
    pub missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_krw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_edge_krw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_edge_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_transfer_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_transfer_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_transfer_closed_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_transfer_closed_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domestic_ask: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domestic_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overseas_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_source: Option<GapSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_ask: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_sell_usdt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_vs_perp_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_domestic_ask: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_overseas_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_overseas_ask: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_domestic_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_spot_vs_perp_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_spot_vs_perp_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<RowImpact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_out: Option<TransferRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_back: Option<TransferRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_text: Option<String>,
}

impl OpportunityRow {
    /// Placeholder for a coin with nothing to price this tick.
    pub fn missing(rank: usize, coin: impl Into<String>) -> Self {
        Self {
            rank,
            coin: coin.into(),
            missing: true,
            ..Default::default()
        }
    }

    /// Net edge when known, gross edge otherwise.
    pub fn best_edge_krw(&self) -> Option<f64> {
        self.net_edge_krw.or(self.edge_krw)
    }

    pub fn best_edge_pct(&self) -> Option<f64> {
        self.net_edge_pct.or(self.edge_pct)
    }
}

/*----- */
// Tick payload
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadMode {
    Pair,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSummary {
    pub label: String,
    pub usdt_krw: f64,
    pub usdt_premium_pct: Option<f64>,
    pub premium_source: Option<PremiumSource>,
    pub fx_usd_krw: Option<f64>,
    pub domestic_usdt_krw: Option<f64>,
}

impl From<&RateContext> for RateSummary {
    fn from(rate: &RateContext) -> Self {
        Self {
            label: rate.label.clone(),
            usdt_krw: rate.usdt_krw,
            usdt_premium_pct: rate.usdt_premium_pct,
            premium_source: rate.premium_source,
            fx_usd_krw: rate.fx_usd_krw,
            domestic_usdt_krw: rate.domestic_usdt_krw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickPayload {
    pub tick: u64,
    pub time: String,
    pub mode: PayloadMode,
    pub rate: RateSummary,
    pub config: WatchConfig,
    pub watch_coins: Vec<String>,
    pub close_coins: Vec<String>,
    pub far_coins: Vec<String>,
    pub rows: Vec<OpportunityRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all_rows: Vec<OpportunityRow>,
}

pub fn payload_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/*----- */
// Status
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Init,
    Transfer,
    Tick,
    Error,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchStatus {
    pub phase: Phase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl WatchStatus {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            done: None,
            total: None,
        }
    }

    pub fn progress(message: impl Into<String>, done: usize, total: usize) -> Self {
        Self {
            done: Some(done),
            total: Some(total),
            ..Self::new(Phase::Init, message)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Phase::Error, message)
    }
}

/// What a running watch reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Tick(Box<TickPayload>),
    Status(WatchStatus),
}
