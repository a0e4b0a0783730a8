pub mod bithumb;
pub mod chains;
pub mod gateio;

use std::{collections::HashMap, fmt::Debug};

use async_trait::async_trait;
use serde::Serialize;

use crate::shared::subscription_models::ExchangeId;

pub use chains::{common_chain_pairs, normalize_chain_name};

/*----- */
// Transfer status
/*----- */
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub name: String,
    pub deposit_ok: Option<bool>,
    pub withdraw_ok: Option<bool>,
    pub confirmations: Option<u32>,
    pub withdraw_fee: Option<f64>,
    pub withdraw_min: Option<f64>,
}

impl ChainInfo {
    pub fn new(name: impl Into<String>, deposit_ok: Option<bool>, withdraw_ok: Option<bool>) -> Self {
        Self {
            name: name.into(),
            deposit_ok,
            withdraw_ok,
            confirmations: None,
            withdraw_fee: None,
            withdraw_min: None,
        }
    }
}

// `None` flags mean the venue did not say.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatus {
    pub exchange: ExchangeId,
    pub coin: String,
    pub deposit_ok: Option<bool>,
    pub withdraw_ok: Option<bool>,
    /// Chains open for both deposit and withdraw.
    pub chains: Vec<String>,
    pub chain_info: Vec<ChainInfo>,
}

impl TransferStatus {
    pub fn unknown(exchange: ExchangeId, coin: impl Into<String>) -> Self {
        Self {
            exchange,
            coin: coin.into(),
            deposit_ok: None,
            withdraw_ok: None,
            chains: Vec::new(),
            chain_info: Vec::new(),
        }
    }

    /// Build from per chain info, deriving the coin level flags.
    pub fn from_chains(exchange: ExchangeId, coin: impl Into<String>, chain_info: Vec<ChainInfo>) -> Self {
        let any = |flag: fn(&ChainInfo) -> Option<bool>| {
            (!chain_info.is_empty()).then(|| chain_info.iter().any(|chain| flag(chain) == Some(true)))
        };
        Self {
            exchange,
            coin: coin.into(),
            deposit_ok: any(|chain| chain.deposit_ok),
            withdraw_ok: any(|chain| chain.withdraw_ok),
            chains: chain_info
                .iter()
                .filter(|chain| chain.deposit_ok == Some(true) && chain.withdraw_ok == Some(true))
                .map(|chain| chain.name.clone())
                .collect(),
            chain_info,
        }
    }

    pub fn withdraw_chains(&self) -> Vec<&str> {
        self.chain_info
            .iter()
            .filter(|chain| chain.withdraw_ok == Some(true))
            .map(|chain| chain.name.as_str())
            .collect()
    }

    pub fn deposit_chains(&self) -> Vec<&str> {
        self.chain_info
            .iter()
            .filter(|chain| chain.deposit_ok == Some(true))
            .map(|chain| chain.name.as_str())
            .collect()
    }

    pub fn chain(&self, name: &str) -> Option<&ChainInfo> {
        self.chain_info.iter().find(|chain| chain.name == name)
    }
}

/// Upper-cased, de-duplicated, non empty coins.
pub fn coin_set(coins: &[String]) -> Vec<String> {
    let mut set = coins
        .iter()
        .map(|coin| coin.trim().to_uppercase())
        .filter(|coin| !coin.is_empty())
        .collect::<Vec<_>>();
    set.sort();
    set.dedup();
    set
}

/*----- */
// Provider
/*----- */
// Failures never surface here, a coin the venue could not describe comes back as
// `TransferStatus::unknown` so pricing carries on without a transfer guarantee.
#[async_trait]
pub trait TransferStatusProvider: Send + Sync + Debug {
    fn exchange(&self) -> ExchangeId;

    async fn statuses(&self, coins: &[String]) -> HashMap<String, TransferStatus>;
}

/// Venues without a public deposit/withdraw endpoint.
#[derive(Debug, Clone)]
pub struct UnknownTransferStatus {
    exchange: ExchangeId,
}

impl UnknownTransferStatus {
    pub fn new(exchange: ExchangeId) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl TransferStatusProvider for UnknownTransferStatus {
    fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    async fn statuses(&self, _coins: &[String]) -> HashMap<String, TransferStatus> {
        HashMap::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_chains() {
        let mut erc20 = ChainInfo::new("ERC20", Some(true), Some(false));
        erc20.withdraw_fee = Some(3.0);
        let status = TransferStatus::from_chains(
            ExchangeId::Bithumb,
            "usdc",
            vec![erc20, ChainInfo::new("SOL", Some(true), Some(true))],
        );
        assert_eq!(status.deposit_ok, Some(true));
        assert_eq!(status.withdraw_ok, Some(true));
        assert_eq!(status.chains, vec!["SOL".to_string()]);
        assert_eq!(status.withdraw_chains(), vec!["SOL"]);
        assert_eq!(status.deposit_chains(), vec!["ERC20", "SOL"]);
        assert_eq!(status.chain("ERC20").and_then(|chain| chain.withdraw_fee), Some(3.0));

        let empty = TransferStatus::from_chains(ExchangeId::Gateio, "X", Vec::new());
        assert_eq!(empty, TransferStatus::unknown(ExchangeId::Gateio, "X"));
    }

    #[test]
    fn test_coin_set() {
        let coins = vec!["btc".to_string(), " BTC".to_string(), String::new(), "eth".to_string()];
        assert_eq!(coin_set(&coins), vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_empty() {
        let provider = UnknownTransferStatus::new(ExchangeId::Okx);
        assert_eq!(provider.exchange(), ExchangeId::Okx);
        assert!(provider.statuses(&["BTC".to_string()]).await.is_empty());
    }
}
