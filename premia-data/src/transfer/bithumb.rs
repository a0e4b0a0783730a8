use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{coin_set, ChainInfo, TransferStatus, TransferStatusProvider};
use crate::{
    error::SocketError,
    protocols::http::client::get_json,
    shared::{de::de_flexible_f64_optional, subscription_models::ExchangeId},
};

const BITHUMB_INOUT_URL: &str = "https://gw.bithumb.com/exchange/v1/coin-inout/info";

/*----- */
// Models
/*----- */
#[derive(Debug, Deserialize)]
pub struct BithumbInout {
    #[serde(default)]
    pub data: Vec<BithumbInoutCoin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BithumbInoutCoin {
    #[serde(default)]
    pub coin_symbol: String,
    #[serde(default)]
    pub network_info_list: Vec<BithumbNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BithumbNetwork {
    pub network_name: Option<String>,
    pub network_key: Option<String>,
    pub is_deposit_available: Option<bool>,
    pub is_withdraw_available: Option<bool>,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub deposit_confirm_count: Option<f64>,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub withdraw_fee_quantity: Option<f64>,
    #[serde(default, deserialize_with = "de_flexible_f64_optional")]
    pub withdraw_minimum_quantity: Option<f64>,
}

impl From<&BithumbNetwork> for ChainInfo {
    fn from(network: &BithumbNetwork) -> Self {
        let name = network
            .network_name
            .clone()
            .or_else(|| network.network_key.clone())
            .unwrap_or_else(|| "NETWORK".to_string());
        Self {
            name,
            deposit_ok: network.is_deposit_available,
            withdraw_ok: network.is_withdraw_available,
            confirmations: network
                .deposit_confirm_count
                .filter(|count| *count >= 0.0)
                .map(|count| count.trunc() as u32),
            withdraw_fee: network.withdraw_fee_quantity,
            withdraw_min: network.withdraw_minimum_quantity,
        }
    }
}

/// Statuses for `coins`; coins missing from the payload stay unknown.
pub fn statuses_from_inout(inout: &BithumbInout, coins: &[String]) -> HashMap<String, TransferStatus> {
    let by_symbol = inout
        .data
        .iter()
        .map(|coin| (coin.coin_symbol.to_uppercase(), coin))
        .collect::<HashMap<_, _>>();

    coin_set(coins)
        .into_iter()
        .map(|coin| {
            let status = match by_symbol.get(&coin) {
                Some(row) => TransferStatus::from_chains(
                    ExchangeId::Bithumb,
                    coin.as_str(),
                    row.network_info_list.iter().map(ChainInfo::from).collect(),
                ),
                None => TransferStatus::unknown(ExchangeId::Bithumb, coin.as_str()),
            };
            (coin, status)
        })
        .collect()
}

/*----- */
// Provider
/*----- */
#[derive(Debug, Clone, Default)]
pub struct BithumbTransferStatus;

impl BithumbTransferStatus {
    pub fn new() -> Self {
        Self
    }

    async fn fetch(&self) -> Result<BithumbInout, SocketError> {
        get_json::<BithumbInout>(BITHUMB_INOUT_URL).await
    }
}

#[async_trait]
impl TransferStatusProvider for BithumbTransferStatus {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Bithumb
    }

    async fn statuses(&self, coins: &[String]) -> HashMap<String, TransferStatus> {
        let inout = match self.fetch().await {
            Ok(inout) => inout,
            Err(error) => {
                warn!(
                    exchange = %ExchangeId::Bithumb,
                    error = %error,
                    action = "treating transfer status as unknown",
                    "failed to fetch coin in/out status"
                );
                BithumbInout { data: Vec::new() }
            }
        };
        statuses_from_inout(&inout, coins)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_statuses_from_inout() {
        let inout: BithumbInout = serde_json::from_str(
            r#"{"data":[{"coinSymbol":"xrp","networkInfoList":[
                {"networkName":"XRP","networkKey":"XRP","isDepositAvailable":true,"isWithdrawAvailable":true,
                 "depositConfirmCount":"1","withdrawFeeQuantity":"0.4","withdrawMinimumQuantity":"21"},
                {"networkKey":"BEP20","isDepositAvailable":false,"isWithdrawAvailable":true,
                 "depositConfirmCount":15,"withdrawFeeQuantity":null}
            ]}]}"#,
        )
        .unwrap();

        let statuses = statuses_from_inout(&inout, &["XRP".to_string(), "doge".to_string()]);
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses["DOGE"], TransferStatus::unknown(ExchangeId::Bithumb, "DOGE"));

        let xrp = &statuses["XRP"];
        assert_eq!(xrp.deposit_ok, Some(true));
        assert_eq!(xrp.chains, vec!["XRP".to_string()]);
        assert_eq!(
            xrp.chain_info[0],
            ChainInfo {
                name: "XRP".to_string(),
                deposit_ok: Some(true),
                withdraw_ok: Some(true),
                confirmations: Some(1),
                withdraw_fee: Some(0.4),
                withdraw_min: Some(21.0),
            }
        );
        assert_eq!(xrp.chain_info[1].name, "BEP20");
        assert_eq!(xrp.chain_info[1].confirmations, Some(15));
        assert_eq!(xrp.chain_info[1].withdraw_fee, None);
    }
}
