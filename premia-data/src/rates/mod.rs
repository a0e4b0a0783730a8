use std::{env, fmt::Debug, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    assets::level::Level, error::SocketError, protocols::http::client::get_json,
    shared::de::de_flexible_f64,
};

pub const RATE_SOURCE_ENV: &str = "USDT_KRW_RATE_SOURCE";
pub const RATE_OVERRIDE_ENV: &str = "USDT_KRW_RATE_OVERRIDE";
pub const PREMIUM_SOURCE_ENV: &str = "USDT_PREMIUM_SOURCE";

const BITHUMB_USDT_URL: &str = "https://api.bithumb.com/public/orderbook/USDT_KRW";
const UPBIT_USDT_URL: &str = "https://api.upbit.com/v1/ticker?markets=KRW-USDT";
const FX_USD_URL: &str = "https://open.er-api.com/v6/latest/USD";

#[derive(Debug, Error)]
pub enum RateError {
    #[error("unsupported USDT/KRW rate source: {0}")]
    UnknownSource(String),

    #[error("{source_name} returned an unusable rate: {reason}")]
    Invalid {
        source_name: &'static str,
        reason: String,
    },

    #[error("failed to fetch rate: {0}")]
    Fetch(#[from] SocketError),
}

/*----- */
// Rate source
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    FxUsdKrw,
    FxPlusUsdtPremium,
    #[default]
    BithumbUsdt,
    UpbitUsdt,
    Custom,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::FxUsdKrw => "fx_usd_krw",
            RateSource::FxPlusUsdtPremium => "fx_plus_usdt_premium",
            RateSource::BithumbUsdt => "bithumb_usdt",
            RateSource::UpbitUsdt => "upbit_usdt",
            RateSource::Custom => "custom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RateSource::FxUsdKrw => "USD/KRW FX (USDT≈USD)",
            RateSource::FxPlusUsdtPremium => "USD/KRW FX + USDT premium (KRW-USDT)",
            RateSource::BithumbUsdt => "Bithumb USDT/KRW",
            RateSource::UpbitUsdt => "Upbit USDT/KRW",
            RateSource::Custom => "Custom override",
        }
    }

    /// `USDT_KRW_RATE_SOURCE`, or the default when unset.
    pub fn from_env() -> Result<Self, RateError> {
        match env::var(RATE_SOURCE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(RateSource::default()),
        }
    }
}

impl FromStr for RateSource {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fx" | "usdkrw" | "usd_krw" | "fx_usd_krw" => Ok(RateSource::FxUsdKrw),
            "theddari" | "fx_plus_usdt_premium" => Ok(RateSource::FxPlusUsdtPremium),
            "bithumb" | "bithumb_usdt" => Ok(RateSource::BithumbUsdt),
            "upbit" | "upbit_usdt" => Ok(RateSource::UpbitUsdt),
            "custom" => Ok(RateSource::Custom),
            other => Err(RateError::UnknownSource(other.to_string())),
        }
    }
}

// Domestic USDT market used for the premium against FX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumSource {
    #[default]
    BithumbUsdt,
    UpbitUsdt,
}

impl PremiumSource {
    pub fn from_env() -> Self {
        match env::var(PREMIUM_SOURCE_ENV)
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str()
        {
            "upbit" | "upbit_usdt" => PremiumSource::UpbitUsdt,
            _ => PremiumSource::BithumbUsdt,
        }
    }
}

/*----- */
// Rate context
/*----- */
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateContext {
    pub source: RateSource,
    pub label: String,
    pub usdt_krw: f64,
    pub fx_usd_krw: Option<f64>,
    pub domestic_usdt_krw: Option<f64>,
    pub usdt_premium_pct: Option<f64>,
    pub premium_source: Option<PremiumSource>,
}

impl RateContext {
    pub fn new(source: RateSource, usdt_krw: f64) -> Self {
        Self {
            source,
            label: source.label().to_string(),
            usdt_krw,
            fx_usd_krw: None,
            domestic_usdt_krw: None,
            usdt_premium_pct: None,
            premium_source: None,
        }
    }

    pub fn fx(fx_usd_krw: f64) -> Self {
        Self {
            fx_usd_krw: Some(fx_usd_krw),
            ..Self::new(RateSource::FxUsdKrw, fx_usd_krw)
        }
    }

    pub fn domestic(source: RateSource, premium_source: PremiumSource, domestic_usdt_krw: f64) -> Self {
        Self {
            domestic_usdt_krw: Some(domestic_usdt_krw),
            premium_source: Some(premium_source),
            ..Self::new(source, domestic_usdt_krw)
        }
    }

    /// Domestic USDT/KRW is the working rate, the premium over FX is informational.
    pub fn fx_plus_premium(
        fx_usd_krw: f64,
        premium_source: PremiumSource,
        domestic_usdt_krw: f64,
    ) -> Self {
        let pct = (domestic_usdt_krw - fx_usd_krw) / fx_usd_krw * 100.0;
        Self {
            fx_usd_krw: Some(fx_usd_krw),
            usdt_premium_pct: pct.is_finite().then_some(pct),
            ..Self::domestic(RateSource::FxPlusUsdtPremium, premium_source, domestic_usdt_krw)
        }
    }
}

/*----- */
// Provider
/*----- */
#[async_trait]
pub trait RateProvider: Send + Sync + Debug {
    async fn rate_context(&self, source: RateSource) -> Result<RateContext, RateError>;
}

#[derive(Debug, Deserialize)]
pub struct BithumbUsdtBook {
    pub data: BithumbUsdtBookData,
}

#[derive(Debug, Deserialize)]
pub struct BithumbUsdtBookData {
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

#[derive(Debug, Deserialize)]
pub struct UpbitTicker {
    #[serde(deserialize_with = "de_flexible_f64")]
    pub trade_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct FxLatest {
    pub result: String,
    #[serde(default)]
    pub rates: FxRates,
}

#[derive(Debug, Default, Deserialize)]
pub struct FxRates {
    #[serde(rename = "KRW", default)]
    pub krw: f64,
}

fn positive(source_name: &'static str, value: f64) -> Result<f64, RateError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(RateError::Invalid {
            source_name,
            reason: format!("{value}"),
        })
    }
}

/// Mid of the first bid and ask, falling back to whichever side exists.
pub fn bithumb_usdt_rate(book: &BithumbUsdtBook) -> Result<f64, RateError> {
    let bid = book.data.bids.first().map(|level| level.price).unwrap_or(0.0);
    let ask = book.data.asks.first().map(|level| level.price).unwrap_or(0.0);
    let mid = match (bid > 0.0, ask > 0.0) {
        (true, true) => (bid + ask) / 2.0,
        (true, false) => bid,
        (false, true) => ask,
        (false, false) => 0.0,
    };
    positive("bithumb_usdt", mid)
}

pub fn upbit_usdt_rate(tickers: &[UpbitTicker]) -> Result<f64, RateError> {
    let ticker = tickers.first().ok_or_else(|| RateError::Invalid {
        source_name: "upbit_usdt",
        reason: "empty ticker payload".to_string(),
    })?;
    positive("upbit_usdt", ticker.trade_price)
}

pub fn fx_usd_krw_rate(latest: &FxLatest) -> Result<f64, RateError> {
    if latest.result != "success" {
        return Err(RateError::Invalid {
            source_name: "fx_usd_krw",
            reason: format!("result {}", latest.result),
        });
    }
    positive("fx_usd_krw", latest.rates.krw)
}

pub fn custom_rate(raw: Option<&str>) -> Result<f64, RateError> {
    let raw = raw.unwrap_or_default().trim();
    let value = raw.parse::<f64>().map_err(|_| RateError::Invalid {
        source_name: "custom",
        reason: format!("invalid {RATE_OVERRIDE_ENV} value: {raw}"),
    })?;
    positive("custom", value)
}

/// Rates from public endpoints, custom override from the environment.
#[derive(Debug, Clone, Default)]
pub struct RestRateProvider {
    pub premium_source: PremiumSource,
}

impl RestRateProvider {
    pub fn from_env() -> Self {
        Self {
            premium_source: PremiumSource::from_env(),
        }
    }

    async fn bithumb_usdt(&self) -> Result<f64, RateError> {
        bithumb_usdt_rate(&get_json::<BithumbUsdtBook>(BITHUMB_USDT_URL).await?)
    }

    async fn upbit_usdt(&self) -> Result<f64, RateError> {
        upbit_usdt_rate(&get_json::<Vec<UpbitTicker>>(UPBIT_USDT_URL).await?)
    }

    async fn fx_usd_krw(&self) -> Result<f64, RateError> {
        fx_usd_krw_rate(&get_json::<FxLatest>(FX_USD_URL).await?)
    }

    async fn domestic_usdt(&self, premium_source: PremiumSource) -> Result<f64, RateError> {
        match premium_source {
            PremiumSource::BithumbUsdt => self.bithumb_usdt().await,
            PremiumSource::UpbitUsdt => self.upbit_usdt().await,
        }
    }
}

#[async_trait]
impl RateProvider for RestRateProvider {
    async fn rate_context(&self, source: RateSource) -> Result<RateContext, RateError> {
        let context = match source {
            RateSource::FxUsdKrw => RateContext::fx(self.fx_usd_krw().await?),
            RateSource::FxPlusUsdtPremium => {
                let fx = self.fx_usd_krw().await?;
                let domestic = self.domestic_usdt(self.premium_source).await?;
                RateContext::fx_plus_premium(fx, self.premium_source, domestic)
            }
            RateSource::BithumbUsdt => RateContext::domestic(
                source,
                PremiumSource::BithumbUsdt,
                self.bithumb_usdt().await?,
            ),
            RateSource::UpbitUsdt => RateContext::domestic(
                source,
                PremiumSource::UpbitUsdt,
                self.upbit_usdt().await?,
            ),
            RateSource::Custom => RateContext::new(
                source,
                custom_rate(env::var(RATE_OVERRIDE_ENV).ok().as_deref())?,
            ),
        };

        debug!(
            source = source.as_str(),
            usdt_krw = context.usdt_krw,
            "usdt/krw rate refreshed"
        );
        Ok(context)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_source_aliases() {
        struct TestCase {
            input: &'static str,
            expected: Option<RateSource>,
        }

        let cases = vec![
            TestCase { input: "fx", expected: Some(RateSource::FxUsdKrw) },
            TestCase { input: "USD_KRW", expected: Some(RateSource::FxUsdKrw) },
            TestCase { input: "theddari", expected: Some(RateSource::FxPlusUsdtPremium) },
            TestCase { input: " bithumb ", expected: Some(RateSource::BithumbUsdt) },
            TestCase { input: "upbit", expected: Some(RateSource::UpbitUsdt) },
            TestCase { input: "custom", expected: Some(RateSource::Custom) },
            TestCase { input: "binance", expected: None },
        ];

        for case in cases {
            assert_eq!(case.input.parse::<RateSource>().ok(), case.expected, "{}", case.input);
        }
        assert_eq!(RateSource::default().label(), "Bithumb USDT/KRW");
    }

    #[test]
    fn test_payload_rates() {
        let book: BithumbUsdtBook = serde_json::from_str(
            r#"{"status":"0000","data":{"timestamp":"1","payment_currency":"KRW","order_currency":"USDT",
                "bids":[{"price":"1449","quantity":"100"}],"asks":[{"price":"1451","quantity":"10"}]}}"#,
        )
        .unwrap();
        assert_eq!(bithumb_usdt_rate(&book).unwrap(), 1450.0);

        let tickers: Vec<UpbitTicker> =
            serde_json::from_str(r#"[{"market":"KRW-USDT","trade_price":1452.0}]"#).unwrap();
        assert_eq!(upbit_usdt_rate(&tickers).unwrap(), 1452.0);
        assert!(upbit_usdt_rate(&[]).is_err());

        let fx: FxLatest =
            serde_json::from_str(r#"{"result":"success","rates":{"USD":1,"KRW":1380.5}}"#).unwrap();
        assert_eq!(fx_usd_krw_rate(&fx).unwrap(), 1380.5);
        let failed: FxLatest = serde_json::from_str(r#"{"result":"error"}"#).unwrap();
        assert!(fx_usd_krw_rate(&failed).is_err());
    }

    #[test]
    fn test_custom_rate() {
        assert_eq!(custom_rate(Some(" 1400.5 ")).unwrap(), 1400.5);
        assert!(custom_rate(Some("-1")).is_err());
        assert!(custom_rate(Some("abc")).is_err());
        assert!(custom_rate(None).is_err());
    }

    #[test]
    fn test_fx_plus_premium_context() {
        let context = RateContext::fx_plus_premium(1400.0, PremiumSource::UpbitUsdt, 1435.0);
        assert_eq!(context.usdt_krw, 1435.0);
        assert_eq!(context.fx_usd_krw, Some(1400.0));
        assert!((context.usdt_premium_pct.unwrap() - 2.5).abs() < 1e-9);
        assert_eq!(context.label, "USD/KRW FX + USDT premium (KRW-USDT)");
        assert_eq!(context.premium_source, Some(PremiumSource::UpbitUsdt));
    }
}
