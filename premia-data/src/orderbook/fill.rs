use serde::Serialize;

use super::{normalize_asks, normalize_bids, valid_levels};
use crate::assets::level::Level;

// Residue below this counts as fully filled.
pub const EPS: f64 = 1e-12;

/*----- */
// Fill result
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResult {
    pub base_qty: f64,
    pub quote_qty: f64,
    pub vwap_price: f64,
    pub best_price: f64,
    pub worst_price: f64,
    pub levels_used: usize,
    pub impact_pct: f64,
}

/// Average price for exactly `base_qty`, walking `levels` in the given order.
pub fn fill_from_base_qty(levels: &[Level], base_qty: f64) -> Option<f64> {
    if !(base_qty > 0.0) {
        return None;
    }

    let mut remaining = base_qty;
    let mut cost = 0.0;
    for level in valid_levels(levels) {
        let take = level.size.min(remaining);
        cost += level.price * take;
        remaining -= take;
        if remaining <= EPS {
            break;
        }
    }

    (remaining <= EPS).then(|| cost / base_qty)
}

/// Base quantity and average price for spending `quote_amount`. The last level
/// may be taken partially.
pub fn fill_from_quote_budget(levels: &[Level], quote_amount: f64) -> Option<(f64, f64)> {
    if !(quote_amount > 0.0) {
        return None;
    }

    let mut remaining = quote_amount;
    let mut base_qty = 0.0;
    let mut cost = 0.0;
    for level in valid_levels(levels) {
        let level_cost = level.notional();
        if level_cost <= remaining {
            base_qty += level.size;
            cost += level_cost;
            remaining -= level_cost;
        } else {
            base_qty += remaining / level.price;
            cost += remaining;
            remaining = 0.0;
            break;
        }
    }

    if remaining > EPS || base_qty <= 0.0 {
        return None;
    }
    Some((base_qty, cost / base_qty))
}

/// Buy `quote_amount` worth from the asks. None unless the whole budget fills.
pub fn analyze_buy_fill(asks: &[Level], quote_amount: f64) -> Option<FillResult> {
    if !(quote_amount > 0.0) {
        return None;
    }

    let asks = normalize_asks(asks);
    let best_price = asks.first()?.price;
    let mut remaining = quote_amount;
    let mut base_qty = 0.0;
    let mut cost = 0.0;
    let mut worst_price = best_price;
    let mut levels_used = 0;

    for level in &asks {
        if remaining <= EPS {
            break;
        }
        levels_used += 1;
        worst_price = level.price;

        let level_cost = level.notional();
        if level_cost <= remaining {
            base_qty += level.size;
            cost += level_cost;
            remaining -= level_cost;
        } else {
            base_qty += remaining / level.price;
            cost += remaining;
            remaining = 0.0;
        }
    }

    if remaining > EPS || base_qty <= 0.0 {
        return None;
    }

    Some(FillResult {
        base_qty,
        quote_qty: quote_amount,
        vwap_price: cost / base_qty,
        best_price,
        worst_price,
        levels_used,
        impact_pct: (worst_price - best_price).abs() / best_price * 100.0,
    })
}

/// Sell `base_qty` into the bids. None unless the whole size fills.
pub fn analyze_sell_fill(bids: &[Level], base_qty: f64) -> Option<FillResult> {
    if !(base_qty > 0.0) {
        return None;
    }

    let bids = normalize_bids(bids);
    let best_price = bids.first()?.price;
    let mut remaining = base_qty;
    let mut proceeds = 0.0;
    let mut worst_price = best_price;
    let mut levels_used = 0;

    for level in &bids {
        if remaining <= EPS {
            break;
        }
        let take = level.size.min(remaining);
        proceeds += level.price * take;
        remaining -= take;
        levels_used += 1;
        worst_price = level.price;
    }

    if remaining > EPS {
        return None;
    }

    Some(FillResult {
        base_qty,
        quote_qty: proceeds,
        vwap_price: proceeds / base_qty,
        best_price,
        worst_price,
        levels_used,
        impact_pct: (worst_price - best_price).abs() / best_price * 100.0,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn asks() -> Vec<Level> {
        vec![
            Level::new(100.0, 1.0),
            Level::new(101.0, 2.0),
            Level::new(102.0, 3.0),
        ]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_fill_from_base_qty() {
        struct TestCase {
            name: &'static str,
            base_qty: f64,
            expected: Option<f64>,
        }

        let cases = vec![
            TestCase {
                name: "inside first level",
                base_qty: 0.5,
                expected: Some(100.0),
            },
            TestCase {
                name: "two levels",
                base_qty: 2.0,
                expected: Some(100.5),
            },
            TestCase {
                name: "whole book",
                base_qty: 6.0,
                expected: Some((100.0 + 202.0 + 306.0) / 6.0),
            },
            TestCase {
                name: "more than the book holds",
                base_qty: 6.0001,
                expected: None,
            },
            TestCase {
                name: "zero",
                base_qty: 0.0,
                expected: None,
            },
        ];

        for case in cases {
            let price = fill_from_base_qty(&asks(), case.base_qty);
            match (price, case.expected) {
                (Some(price), Some(expected)) => assert!(close(price, expected), "{}", case.name),
                (None, None) => {}
                other => panic!("{}: {:?}", case.name, other),
            }
        }
    }

    #[test]
    fn test_fill_from_quote_budget() {
        let (base_qty, price) = fill_from_quote_budget(&asks(), 150.5).unwrap();
        assert!(close(base_qty, 1.5));
        assert!(close(price, 150.5 / 1.5));

        assert!(fill_from_quote_budget(&asks(), 10_000.0).is_none());
        assert!(fill_from_quote_budget(&[], 1.0).is_none());
    }

    #[test]
    fn test_analyze_buy_fill_consumes_exact_levels() {
        // budget equal to the first k levels' notional
        let shuffled = vec![
            Level::new(102.0, 3.0),
            Level::new(100.0, 1.0),
            Level::new(101.0, 2.0),
        ];
        for (k, budget) in [(1, 100.0), (2, 302.0), (3, 608.0)] {
            let fill = analyze_buy_fill(&shuffled, budget).unwrap();
            let levels = &asks()[..k];
            let base: f64 = levels.iter().map(|level| level.size).sum();

            assert_eq!(fill.levels_used, k);
            assert!(close(fill.vwap_price, budget / base));
            assert!(close(fill.base_qty, base));
            assert_eq!(fill.best_price, 100.0);
            assert_eq!(fill.worst_price, levels[k - 1].price);
        }

        let partial = analyze_buy_fill(&asks(), 201.0).unwrap();
        assert_eq!(partial.levels_used, 2);
        assert!(close(partial.impact_pct, 1.0));
        assert!(analyze_buy_fill(&asks(), 609.0).is_none());
    }

    #[test]
    fn test_analyze_sell_fill() {
        let bids = vec![
            Level::new(98.0, 2.0),
            Level::new(99.0, 1.0),
            Level::new(-1.0, 10.0),
        ];
        let fill = analyze_sell_fill(&bids, 2.0).unwrap();
        assert_eq!(fill.levels_used, 2);
        assert!(close(fill.vwap_price, 98.5));
        assert!(close(fill.quote_qty, 197.0));
        assert!(close(fill.impact_pct, 1.0 / 99.0 * 100.0));

        assert!(analyze_sell_fill(&bids, 3.5).is_none());
        assert!(analyze_sell_fill(&[], 1.0).is_none());
    }
}
