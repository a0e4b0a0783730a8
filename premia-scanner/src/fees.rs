use premia_data::shared::subscription_models::{ExchangeId, MarketKind, Venue};

/*----- */
// Taker fees
/*----- */
pub const BITHUMB_SPOT_TAKER_FEE: f64 = 0.0004;
pub const UPBIT_SPOT_TAKER_FEE: f64 = 0.0005;
pub const GATEIO_SPOT_TAKER_FEE: f64 = 0.002;
pub const GATEIO_PERP_TAKER_FEE: f64 = 0.0005;
pub const OKX_SPOT_TAKER_FEE: f64 = 0.001;
pub const OKX_PERP_TAKER_FEE: f64 = 0.0005;
pub const BYBIT_SPOT_TAKER_FEE: f64 = 0.001;
pub const BYBIT_PERP_TAKER_FEE: f64 = 0.0006;
pub const HYPERLIQUID_SPOT_TAKER_FEE: f64 = 0.0007;
pub const HYPERLIQUID_PERP_TAKER_FEE: f64 = 0.00045;
pub const LIGHTER_SPOT_TAKER_FEE: f64 = 0.0;
pub const LIGHTER_PERP_TAKER_FEE: f64 = 0.0;

/// Taker fee rate for one market. Markets we do not trade cost nothing.
pub fn taker_fee(venue: Venue) -> f64 {
    match (venue.exchange, venue.kind) {
        (ExchangeId::Bithumb, MarketKind::Spot) => BITHUMB_SPOT_TAKER_FEE,
        (ExchangeId::Upbit, MarketKind::Spot) => UPBIT_SPOT_TAKER_FEE,
        (ExchangeId::Gateio, MarketKind::Spot) => GATEIO_SPOT_TAKER_FEE,
        (ExchangeId::Gateio, MarketKind::Perp) => GATEIO_PERP_TAKER_FEE,
        (ExchangeId::Okx, MarketKind::Spot) => OKX_SPOT_TAKER_FEE,
        (ExchangeId::Okx, MarketKind::Perp) => OKX_PERP_TAKER_FEE,
        (ExchangeId::Bybit, MarketKind::Spot) => BYBIT_SPOT_TAKER_FEE,
        (ExchangeId::Bybit, MarketKind::Perp) => BYBIT_PERP_TAKER_FEE,
        (ExchangeId::Hyperliquid, MarketKind::Spot) => HYPERLIQUID_SPOT_TAKER_FEE,
        (ExchangeId::Hyperliquid, MarketKind::Perp) => HYPERLIQUID_PERP_TAKER_FEE,
        (ExchangeId::Lighter, MarketKind::Spot) => LIGHTER_SPOT_TAKER_FEE,
        (ExchangeId::Lighter, MarketKind::Perp) => LIGHTER_PERP_TAKER_FEE,
        _ => 0.0,
    }
}

/// Open and close both pay the taker fee.
pub fn round_trip_fee(venue: Venue) -> f64 {
    2.0 * taker_fee(venue)
}

/// Fee rates for the three markets one pair trades on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairFees {
    pub domestic: f64,
    pub overseas_spot: f64,
    pub overseas_perp: f64,
}

impl PairFees {
    pub fn new(domestic: ExchangeId, overseas: ExchangeId) -> Self {
        Self {
            domestic: taker_fee(Venue::spot(domestic)),
            overseas_spot: taker_fee(Venue::spot(overseas)),
            overseas_perp: taker_fee(Venue::perp(overseas)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_taker_fee() {
        struct TestCase {
            name: &'static str,
            venue: Venue,
            expected: f64,
        }

        let cases = vec![
            TestCase {
                name: "bithumb spot",
                venue: Venue::spot(ExchangeId::Bithumb),
                expected: 0.0004,
            },
            TestCase {
                name: "gate perp",
                venue: Venue::perp(ExchangeId::Gateio),
                expected: 0.0005,
            },
            TestCase {
                name: "hyperliquid perp",
                venue: Venue::perp(ExchangeId::Hyperliquid),
                expected: 0.00045,
            },
            TestCase {
                name: "domestic perp does not exist",
                venue: Venue::perp(ExchangeId::Upbit),
                expected: 0.0,
            },
        ];

        for case in cases {
            assert_eq!(taker_fee(case.venue), case.expected, "{}", case.name);
        }
        assert_eq!(round_trip_fee(Venue::spot(ExchangeId::Okx)), 0.002);
    }

    #[test]
    fn test_pair_fees() {
        let fees = PairFees::new(ExchangeId::Upbit, ExchangeId::Bybit);
        assert_eq!(fees.domestic, UPBIT_SPOT_TAKER_FEE);
        assert_eq!(fees.overseas_spot, BYBIT_SPOT_TAKER_FEE);
        assert_eq!(fees.overseas_perp, BYBIT_PERP_TAKER_FEE);
    }
}
