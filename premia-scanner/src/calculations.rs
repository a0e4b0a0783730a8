use premia_data::assets::quote::Quote;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/*----- */
// CalcError
/*----- */
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("{name} must be > 0, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("fee rate must be >= 0, got {0}")]
    NegativeFeeRate(f64),
}

fn require_positive(name: &'static str, value: f64) -> Result<f64, CalcError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::NonPositive { name, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/*----- */
// Price maths
/*----- */
/// `(domestic - overseas * rate) / (overseas * rate) * 100`
pub fn premium_pct(domestic_krw: f64, overseas_usdt: f64, usdt_krw: f64) -> Result<f64, CalcError> {
    require_positive("domestic price", domestic_krw)?;
    require_positive("overseas price", overseas_usdt)?;
    require_positive("usdt/krw rate", usdt_krw)?;

    let overseas_krw = overseas_usdt * usdt_krw;
    Ok((domestic_krw - overseas_krw) / overseas_krw * 100.0)
}

/// Effective price after a taker fee: buys pay more, sells receive less.
pub fn apply_fee(price: f64, fee_rate: f64, side: Side) -> Result<f64, CalcError> {
    require_positive("price", price)?;
    if fee_rate < 0.0 || fee_rate.is_nan() {
        return Err(CalcError::NegativeFeeRate(fee_rate));
    }

    Ok(match side {
        Side::Buy => price * (1.0 + fee_rate),
        Side::Sell => price * (1.0 - fee_rate),
    })
}

/// Absolute spot/perp gap relative to spot, in percent.
pub fn basis_pct(spot: f64, perp: f64) -> Result<f64, CalcError> {
    require_positive("spot price", spot)?;
    require_positive("perp price", perp)?;
    Ok((perp - spot).abs() / spot * 100.0)
}

pub fn mid_price(bid: f64, ask: f64) -> f64 {
    match (bid > 0.0, ask > 0.0) {
        (true, true) => (bid + ask) / 2.0,
        (true, false) => bid,
        (false, true) => ask,
        (false, false) => 0.0,
    }
}

pub fn spread_pct(bid: f64, ask: f64) -> f64 {
    if bid <= 0.0 || ask <= 0.0 {
        return 0.0;
    }
    let mid = (bid + ask) / 2.0;
    (ask - bid) / mid * 100.0
}

// Bid is what a sell nets, ask is what a buy costs.
pub fn fee_adjusted_quote(quote: Quote, buy_fee: f64, sell_fee: f64) -> Result<Quote, CalcError> {
    Ok(Quote::new(
        apply_fee(quote.bid, sell_fee, Side::Sell)?,
        apply_fee(quote.ask, buy_fee, Side::Buy)?,
    ))
}
