use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;
use premia_data::{
    shared::subscription_models::ExchangeId,
    transfer::{common_chain_pairs, TransferStatus, TransferStatusProvider},
};
use tracing::debug;

use super::payload::{Direction, TransferChain, TransferRoute};

pub fn display_name(exchange: ExchangeId) -> &'static str {
    match exchange {
        ExchangeId::Bithumb => "Bithumb",
        ExchangeId::Upbit => "Upbit",
        ExchangeId::Gateio => "Gate",
        ExchangeId::Bybit => "Bybit",
        ExchangeId::Okx => "OKX",
        ExchangeId::Hyperliquid => "Hyperliquid",
        ExchangeId::Lighter => "Lighter",
    }
}

/// Prices a route is valued at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePrices {
    pub domestic_krw: f64,
    pub overseas_usdt: f64,
    pub usdt_krw: f64,
}

impl RoutePrices {
    /// Coin amount in KRW. Negative or non finite amounts are unknown, zero is free.
    pub fn to_krw(&self, direction: Direction, amount: f64) -> Option<f64> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        if amount == 0.0 {
            return Some(0.0);
        }
        match direction {
            Direction::B2g if self.overseas_usdt > 0.0 && self.usdt_krw > 0.0 => {
                Some(amount * self.overseas_usdt * self.usdt_krw)
            }
            Direction::G2b if self.domestic_krw > 0.0 => Some(amount * self.domestic_krw),
            _ => None,
        }
    }
}

/*----- */
// Transfer book
/*----- */
// Latest deposit/withdraw state of both venues of a pair.
#[derive(Debug, Clone)]
pub struct TransferBook {
    pub domestic_exchange: ExchangeId,
    pub overseas_exchange: ExchangeId,
    pub domestic: HashMap<String, TransferStatus>,
    pub overseas: HashMap<String, TransferStatus>,
}

impl TransferBook {
    pub fn empty(domestic_exchange: ExchangeId, overseas_exchange: ExchangeId) -> Self {
        Self {
            domestic_exchange,
            overseas_exchange,
            domestic: HashMap::new(),
            overseas: HashMap::new(),
        }
    }

    /// Query both providers at once. Providers never fail, unknown coins come back absent.
    pub async fn load(
        domestic: &Arc<dyn TransferStatusProvider>,
        overseas: &Arc<dyn TransferStatusProvider>,
        coins: &[String],
    ) -> Self {
        let (domestic_statuses, overseas_statuses) =
            tokio::join!(domestic.statuses(coins), overseas.statuses(coins));
        debug!(
            domestic = %domestic.exchange(),
            overseas = %overseas.exchange(),
            domestic_coins = domestic_statuses.len(),
            overseas_coins = overseas_statuses.len(),
            "transfer statuses loaded"
        );
        Self {
            domestic_exchange: domestic.exchange(),
            overseas_exchange: overseas.exchange(),
            domestic: domestic_statuses,
            overseas: overseas_statuses,
        }
    }

    /// Chains a coin can move over in `direction`. `None` when either venue has no data.
    pub fn route(&self, direction: Direction, coin: &str, prices: RoutePrices) -> Option<TransferRoute> {
        let domestic = self.domestic.get(coin)?;
        let overseas = self.overseas.get(coin)?;
        let (sender, receiver, sender_exchange, receiver_exchange) = match direction {
            Direction::B2g => (domestic, overseas, self.domestic_exchange, self.overseas_exchange),
            Direction::G2b => (overseas, domestic, self.overseas_exchange, self.domestic_exchange),
        };

        let withdraw = sender.withdraw_chains();
        let deposit = receiver.deposit_chains();
        let pairs = common_chain_pairs(&withdraw, &deposit);

        if pairs.is_empty() {
            let sender_name = display_name(sender_exchange);
            let receiver_name = display_name(receiver_exchange);
            let closed_reason = match (withdraw.is_empty(), deposit.is_empty()) {
                (true, true) => format!("{sender_name} withdraw and {receiver_name} deposit suspended"),
                (true, false) => format!("{sender_name} withdraw suspended"),
                (false, true) => format!("{receiver_name} deposit suspended"),
                (false, false) => format!(
                    "no common chain ({sender_name}: {} / {receiver_name}: {})",
                    withdraw.iter().take(2).join(","),
                    deposit.iter().take(2).join(",")
                ),
            };
            return Some(TransferRoute {
                direction,
                chains: Vec::new(),
                closed_reason: Some(closed_reason),
            });
        }

        let chains = pairs
            .into_iter()
            .map(|(sender_chain, receiver_chain)| {
                let info = sender.chain(sender_chain);
                let fee_coin = info.and_then(|info| info.withdraw_fee).filter(|fee| fee.is_finite());
                let min_coin = info.and_then(|info| info.withdraw_min).filter(|min| min.is_finite());
                TransferChain {
                    sender_chain: sender_chain.to_string(),
                    receiver_chain: receiver_chain.to_string(),
                    fee_coin,
                    fee_krw: fee_coin.and_then(|fee| prices.to_krw(direction, fee)),
                    min_coin,
                    min_krw: min_coin.and_then(|min| prices.to_krw(direction, min)),
                }
            })
            .collect();

        Some(TransferRoute {
            direction,
            chains,
            closed_reason: None,
        })
    }
}

/*----- */
// Evaluation
/*----- */
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferEval {
    pub ok: bool,
    pub fee_krw: Option<f64>,
    pub fee_coin: Option<f64>,
}

/// Cheapest chain with a known fee that the size clears the minimum of, else any
/// chain it clears (fee unknown), else not transferable.
pub fn evaluate(route: Option<&TransferRoute>, base_qty: Option<f64>) -> TransferEval {
    let Some(route) = route.filter(|route| !route.chains.is_empty()) else {
        return TransferEval::default();
    };

    let base_qty = base_qty.filter(|qty| qty.is_finite() && *qty > 0.0);
    let clears_min = |chain: &&TransferChain| match (base_qty, chain.min_coin) {
        (Some(qty), Some(min)) => qty >= min,
        _ => true,
    };

    let cheapest = route
        .chains
        .iter()
        .filter(clears_min)
        .filter_map(|chain| chain.fee_krw.filter(|fee| fee.is_finite()).map(|fee| (fee, chain)))
        .min_by(|(a, _), (b, _)| a.total_cmp(b));

    if let Some((fee_krw, chain)) = cheapest {
        return TransferEval {
            ok: true,
            fee_krw: Some(fee_krw),
            fee_coin: chain.fee_coin,
        };
    }

    TransferEval {
        ok: route.chains.iter().any(|chain| clears_min(&chain)),
        fee_krw: None,
        fee_coin: None,
    }
}

fn format_krw(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let grouped = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .join(",");
    let sign = if rounded < 0 { "-" } else { "" };
    format!("₩{sign}{grouped}")
}

fn format_coin(amount: f64, coin: &str) -> String {
    if !amount.is_finite() || amount <= 0.0 {
        return "N/A".to_string();
    }
    let precision = if amount >= 1.0 { 8 } else { 12 };
    let text = format!("{amount:.precision$}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {coin}")
}

/// One line summary, e.g. `xfer B→G: ERC20↔ETH(0.001 ETH (≈₩4,500), min=0.01 ETH)`.
pub fn transfer_text(route: &TransferRoute, coin: &str) -> String {
    let label = route.direction.label();
    if route.chains.is_empty() {
        return format!("xfer {label}: n/a");
    }
    let parts = route
        .chains
        .iter()
        .map(|chain| {
            let fee = match chain.fee_coin {
                Some(fee) => match chain.fee_krw {
                    Some(krw) => format!("{} (≈{})", format_coin(fee, coin), format_krw(krw)),
                    None => format_coin(fee, coin),
                },
                None => "fee?".to_string(),
            };
            let min = match chain.min_coin {
                Some(min) => match chain.min_krw {
                    Some(krw) => format!(", min={} (≈{})", format_coin(min, coin), format_krw(krw)),
                    None => format!(", min={}", format_coin(min, coin)),
                },
                None => String::new(),
            };
            format!("{}↔{}({fee}{min})", chain.sender_chain, chain.receiver_chain)
        })
        .join(", ");
    format!("xfer {label}: {parts}")
}
