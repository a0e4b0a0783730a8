use std::{env, path::PathBuf, str::FromStr};

use premia_data::{
    feed::cache::DEFAULT_STALE_MS,
    rates::{RateError, RateSource},
    shared::subscription_models::ExchangeId,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::watch::snapshot::PricingMode;

pub const DEFAULT_PORT: u16 = 5177;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_RUNTIME_DIR: &str = "runtime";

pub const DEFAULT_CONCURRENCY: usize = 12;
pub const DEFAULT_NOTIONAL_KRW: f64 = 5_000_000.0;
pub const DEFAULT_ORDER_BOOK_DEPTH: usize = 20;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    RateSource(#[from] RateError),
}

/*----- */
// Process settings
/*----- */
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub bind: String,
    pub runtime_dir: PathBuf,
    pub stale_ms: u64,
    pub rate_source: RateSource,
    pub ws_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            runtime_dir: PathBuf::from(DEFAULT_RUNTIME_DIR),
            stale_ms: DEFAULT_STALE_MS,
            rate_source: RateSource::default(),
            ws_only: true,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, fallback: T) -> Result<T, SettingsError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| SettingsError::Invalid { name, value })
        }
        _ => Ok(fallback),
    }
}

fn parse_flag(name: &'static str, fallback: bool) -> Result<bool, SettingsError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "" => Ok(fallback),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(SettingsError::Invalid { name, value }),
        },
        Err(_) => Ok(fallback),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let defaults = Settings::default();
        Ok(Self {
            port: parse_var("PORT", defaults.port)?,
            bind: parse_var("PREMIA_BIND", defaults.bind)?,
            runtime_dir: parse_var("PREMIA_RUNTIME_DIR", defaults.runtime_dir)?,
            stale_ms: parse_var("PREMIA_STALE_MS", defaults.stale_ms)?,
            rate_source: RateSource::from_env()?,
            ws_only: parse_flag("PREMIA_WS_ONLY", defaults.ws_only)?,
        })
    }
}

/*----- */
// Runtime config
/*----- */
// What `/api/config` reads and writes. Takes effect when the watches restart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub top_n: usize,
    pub display_top_k: usize,
    pub display_far_k: usize,
    pub interval_sec: u64,
    pub domestic_exchange: ExchangeId,
    pub overseas_exchange: ExchangeId,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            display_top_k: 5,
            display_far_k: 5,
            interval_sec: 1,
            domestic_exchange: ExchangeId::Bithumb,
            overseas_exchange: ExchangeId::Gateio,
        }
    }
}

/// Integer in `min..=max`. Anything that is not a number keeps `fallback`.
pub fn clamp_int(value: Option<&Value>, fallback: i64, min: i64, max: i64) -> i64 {
    let number = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(Value::Bool(flag)) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    match number.filter(|number| number.is_finite()) {
        Some(number) => (number.trunc() as i64).clamp(min, max.max(min)),
        None => fallback,
    }
}

pub fn parse_domestic(value: Option<&Value>, fallback: ExchangeId) -> ExchangeId {
    parse_exchange(value)
        .filter(ExchangeId::is_domestic)
        .unwrap_or(fallback)
}

pub fn parse_overseas(value: Option<&Value>, fallback: ExchangeId) -> ExchangeId {
    parse_exchange(value)
        .filter(|exchange| !exchange.is_domestic())
        .unwrap_or(fallback)
}

fn parse_exchange(value: Option<&Value>) -> Option<ExchangeId> {
    value?.as_str()?.parse::<ExchangeId>().ok()
}

impl RuntimeConfig {
    /// Merge a json body over the current config, clamping every field.
    pub fn merged(&self, body: &Value) -> Self {
        let top_n = clamp_int(body.get("topN"), self.top_n as i64, 1, 50);
        let display_top_k = clamp_int(body.get("displayTopK"), self.display_top_k as i64, 1, top_n);
        let display_far_k = clamp_int(
            body.get("displayFarK"),
            self.display_far_k as i64,
            0,
            (top_n - display_top_k).max(0),
        );
        let interval_sec = clamp_int(body.get("intervalSec"), self.interval_sec as i64, 1, 60);

        Self {
            top_n: top_n as usize,
            display_top_k: display_top_k as usize,
            display_far_k: display_far_k as usize,
            interval_sec: interval_sec as u64,
            domestic_exchange: parse_domestic(body.get("domesticExchange"), self.domestic_exchange),
            overseas_exchange: parse_overseas(body.get("overseasExchange"), self.overseas_exchange),
        }
    }

    /// Per pair watch config as the server runs it: whole universe, socket first.
    pub fn watch_config(&self, domestic: ExchangeId, overseas: ExchangeId, ws_only: bool) -> WatchConfig {
        WatchConfig {
            top_n: self.top_n,
            display_top_k: self.display_top_k,
            display_far_k: self.display_far_k,
            interval_sec: self.interval_sec,
            full_universe: true,
            use_websocket: true,
            ws_only,
            ..WatchConfig::new(domestic, overseas)
        }
        .normalized()
    }
}

/*----- */
// Watch config
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    pub top_n: usize,
    pub display_top_k: usize,
    pub display_far_k: usize,
    pub interval_sec: u64,
    pub concurrency: usize,
    pub notional_krw: f64,
    pub full_universe: bool,
    pub domestic_exchange: ExchangeId,
    pub overseas_exchange: ExchangeId,
    #[serde(skip)]
    pub use_websocket: bool,
    #[serde(skip)]
    pub ws_only: bool,
    #[serde(skip)]
    pub depth: usize,
    #[serde(skip)]
    pub pricing: PricingMode,
}

impl WatchConfig {
    pub fn new(domestic: ExchangeId, overseas: ExchangeId) -> Self {
        Self {
            top_n: 10,
            display_top_k: 5,
            display_far_k: 5,
            interval_sec: 1,
            concurrency: DEFAULT_CONCURRENCY,
            notional_krw: DEFAULT_NOTIONAL_KRW,
            full_universe: false,
            domestic_exchange: domestic,
            overseas_exchange: overseas,
            use_websocket: true,
            ws_only: false,
            depth: DEFAULT_ORDER_BOOK_DEPTH,
            pricing: PricingMode::Ticker,
        }
    }

    /// Pull every size into a usable range.
    pub fn normalized(self) -> Self {
        let top_n = self.top_n.max(1);
        let display_top_k = self.display_top_k.clamp(1, top_n);
        Self {
            top_n,
            display_top_k,
            display_far_k: self.display_far_k.min(top_n - display_top_k),
            interval_sec: self.interval_sec.max(1),
            concurrency: self.concurrency.max(1),
            notional_krw: if self.notional_krw.is_finite() {
                self.notional_krw.max(1.0)
            } else {
                DEFAULT_NOTIONAL_KRW
            },
            depth: self.depth.max(1),
            ..self
        }
    }

    /// REST fallback runs at most once per five seconds of ticks.
    pub fn fallback_every_ticks(&self) -> u64 {
        5u64.div_ceil(self.interval_sec.max(1)).max(1)
    }

    pub fn cycle_leg_limit(&self) -> usize {
        crate::watch::ranking::CYCLE_LEG_LIMIT
            .min(self.top_n.max(self.display_top_k).max(self.display_far_k))
    }
}
