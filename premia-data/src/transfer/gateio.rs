use std::{borrow::Cow, collections::HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{coin_set, ChainInfo, TransferStatus, TransferStatusProvider};
use crate::{
    error::SocketError,
    exchange::gateio::http::GATEIO_BASE_HTTP_URL,
    protocols::http::{client::RestClient, rest_request::RestRequest},
    shared::subscription_models::ExchangeId,
};

/*----- */
// Models
/*----- */
#[derive(Debug, Deserialize)]
pub struct GateioCurrency {
    pub currency: String,
    #[serde(default)]
    pub delisted: bool,
    pub deposit_disabled: Option<bool>,
    pub withdraw_disabled: Option<bool>,
    pub chain: Option<String>,
    #[serde(default)]
    pub chains: Vec<GateioCurrencyChain>,
}

#[derive(Debug, Deserialize)]
pub struct GateioCurrencyChain {
    pub name: String,
    pub deposit_disabled: Option<bool>,
    pub withdraw_disabled: Option<bool>,
}

struct Currencies;

impl RestRequest for Currencies {
    type Response = Vec<GateioCurrency>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v4/spot/currencies")
    }

    fn timeout() -> std::time::Duration {
        std::time::Duration::from_secs(15)
    }
}

fn enabled(disabled: Option<bool>) -> Option<bool> {
    disabled.map(|disabled| !disabled)
}

impl GateioCurrency {
    // Older entries only carry a single `chain` with coin level flags.
    fn chain_info(&self) -> Vec<ChainInfo> {
        if !self.chains.is_empty() {
            return self
                .chains
                .iter()
                .map(|chain| {
                    ChainInfo::new(
                        chain.name.as_str(),
                        enabled(chain.deposit_disabled),
                        enabled(chain.withdraw_disabled),
                    )
                })
                .collect();
        }
        self.chain
            .iter()
            .map(|chain| {
                ChainInfo::new(
                    chain.as_str(),
                    enabled(self.deposit_disabled),
                    enabled(self.withdraw_disabled),
                )
            })
            .collect()
    }
}

/// Statuses for `coins`. Gate.io does not publish withdraw fees without a key,
/// so chain fees stay unknown.
pub fn statuses_from_currencies(
    currencies: &[GateioCurrency],
    coins: &[String],
) -> HashMap<String, TransferStatus> {
    let by_coin = currencies
        .iter()
        .filter(|currency| !currency.delisted)
        .map(|currency| (currency.currency.to_uppercase(), currency))
        .collect::<HashMap<_, _>>();

    coin_set(coins)
        .into_iter()
        .map(|coin| {
            let status = match by_coin.get(&coin) {
                Some(currency) => {
                    let mut status = TransferStatus::from_chains(
                        ExchangeId::Gateio,
                        coin.as_str(),
                        currency.chain_info(),
                    );
                    if let Some(deposit_ok) = enabled(currency.deposit_disabled) {
                        status.deposit_ok = Some(deposit_ok);
                    }
                    if let Some(withdraw_ok) = enabled(currency.withdraw_disabled) {
                        status.withdraw_ok = Some(withdraw_ok);
                    }
                    status
                }
                None => TransferStatus::unknown(ExchangeId::Gateio, coin.as_str()),
            };
            (coin, status)
        })
        .collect()
}

/*----- */
// Provider
/*----- */
#[derive(Debug, Clone)]
pub struct GateioTransferStatus {
    rest: RestClient,
}

impl Default for GateioTransferStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl GateioTransferStatus {
    pub fn new() -> Self {
        Self {
            rest: RestClient::new(GATEIO_BASE_HTTP_URL),
        }
    }

    async fn fetch(&self) -> Result<Vec<GateioCurrency>, SocketError> {
        self.rest.execute(Currencies).await
    }
}

#[async_trait]
impl TransferStatusProvider for GateioTransferStatus {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Gateio
    }

    async fn statuses(&self, coins: &[String]) -> HashMap<String, TransferStatus> {
        let currencies = self.fetch().await.unwrap_or_else(|error| {
            warn!(
                exchange = %ExchangeId::Gateio,
                error = %error,
                action = "treating transfer status as unknown",
                "failed to fetch currency list"
            );
            Vec::new()
        });
        statuses_from_currencies(&currencies, coins)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_statuses_from_currencies() {
        let currencies: Vec<GateioCurrency> = serde_json::from_str(
            r#"[
                {"currency":"USDT","delisted":false,"withdraw_disabled":false,"withdraw_delayed":false,
                 "deposit_disabled":false,"trade_disabled":false,"chain":"ETH",
                 "chains":[
                    {"name":"ETH","addr":"0xdac1","withdraw_disabled":false,"withdraw_delayed":false,"deposit_disabled":false},
                    {"name":"TRX","addr":"TR7N","withdraw_disabled":true,"withdraw_delayed":false,"deposit_disabled":false}
                 ]},
                {"currency":"OLD","delisted":false,"withdraw_disabled":true,"deposit_disabled":false,"chain":"BSC"},
                {"currency":"GONE","delisted":true,"withdraw_disabled":false,"deposit_disabled":false,"chain":"ETH"}
            ]"#,
        )
        .unwrap();

        let coins = ["usdt", "OLD", "GONE"].map(String::from);
        let statuses = statuses_from_currencies(&currencies, &coins);

        let usdt = &statuses["USDT"];
        assert_eq!(usdt.chains, vec!["ETH".to_string()]);
        assert_eq!(usdt.withdraw_chains(), vec!["ETH"]);
        assert_eq!(usdt.deposit_chains(), vec!["ETH", "TRX"]);

        let old = &statuses["OLD"];
        assert_eq!(old.withdraw_ok, Some(false));
        assert_eq!(old.deposit_chains(), vec!["BSC"]);
        assert!(old.withdraw_chains().is_empty());

        assert_eq!(statuses["GONE"], TransferStatus::unknown(ExchangeId::Gateio, "GONE"));
    }
}
