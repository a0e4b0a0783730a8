use std::{cmp::Ordering, collections::HashMap};

use premia_data::shared::subscription_models::ExchangeId;

use super::{
    payload::{Direction, GapSource, OpportunityRow, RowImpact, TransferRoute},
    snapshot::SnapshotRow,
    transfer::{evaluate, transfer_text, RoutePrices, TransferBook, TransferEval},
};
use crate::{
    calculations::{basis_pct, premium_pct},
    settings::WatchConfig,
};

/// Widest spot/perp gap a route may price through, in percent.
pub const BASIS_MAX_PCT: f64 = 0.2;
pub const CYCLE_LEG_LIMIT: usize = 50;

// Float slack so a basis of exactly the limit still passes.
const BASIS_TOLERANCE: f64 = 1e-9;

pub fn within_basis(spot: f64, perp: f64) -> bool {
    basis_pct(spot, perp).is_ok_and(|basis| basis <= BASIS_MAX_PCT + BASIS_TOLERANCE)
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|value| *value > 0.0)
}

/*----- */
// Pricing selection
/*----- */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub domestic_price: f64,
    pub overseas_price: f64,
    pub gap_source: GapSource,
    /// Priced as an unwind: sell domestic, buy overseas.
    pub use_unwind: bool,
}

/// b2g buys domestic and sells overseas spot, hedged on the perp, so it needs all
/// three legs and a tight basis. g2b prefers the unwind prices (domestic bid vs
/// overseas ask) and falls back to domestic ask vs perp bid.
pub fn select_pricing(row: &SnapshotRow, direction: Direction) -> Option<Pricing> {
    let domestic_ask = present(Some(row.domestic_ask));
    let perp_bid = present(Some(row.perp_bid));
    let spot_bid = present(row.spot_bid);
    let spot_ask = present(row.spot_ask);

    match direction {
        Direction::B2g => {
            let (domestic_ask, spot_bid, perp_bid) = (domestic_ask?, spot_bid?, perp_bid?);
            within_basis(spot_bid, perp_bid).then_some(Pricing {
                domestic_price: domestic_ask,
                overseas_price: spot_bid,
                gap_source: GapSource::Spot,
                use_unwind: false,
            })
        }
        Direction::G2b => {
            let domestic_bid = present(row.domestic_bid);
            let perp_ask = present(row.perp_ask);
            let can_unwind = domestic_bid.is_some() && (spot_ask.is_some() || perp_ask.is_some());

            let (domestic_price, overseas_price) = if can_unwind {
                (domestic_bid?, spot_ask.or(perp_ask)?)
            } else {
                (domestic_ask?, spot_ask.or(perp_bid)?)
            };
            Some(Pricing {
                domestic_price,
                overseas_price,
                gap_source: if spot_ask.is_some() {
                    GapSource::Spot
                } else {
                    GapSource::Perp
                },
                use_unwind: can_unwind,
            })
        }
    }
}

/*----- */
// Candidates
/*----- */
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub row: &'a SnapshotRow,
    pub premium: f64,
}

/// Closest to zero first, then the more negative premium, then coin.
pub fn cmp_closest_to_zero(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    a.premium
        .abs()
        .total_cmp(&b.premium.abs())
        .then_with(|| a.premium.total_cmp(&b.premium))
        .then_with(|| a.row.coin.cmp(&b.row.coin))
}

pub fn b2g_candidates(rows: &[SnapshotRow], usdt_krw: f64) -> Vec<Candidate<'_>> {
    let mut candidates = rows
        .iter()
        .filter_map(|row| {
            let pricing = select_pricing(row, Direction::B2g)?;
            let premium = premium_pct(pricing.domestic_price, pricing.overseas_price, usdt_krw).ok()?;
            Some(Candidate { row, premium })
        })
        .collect::<Vec<_>>();
    candidates.sort_by(cmp_closest_to_zero);
    candidates
}

/// Domestic bid over overseas spot ask, positive premiums only, largest first.
pub fn g2b_candidates(rows: &[SnapshotRow], usdt_krw: f64) -> Vec<Candidate<'_>> {
    let mut candidates = rows
        .iter()
        .filter_map(|row| {
            let domestic_bid = present(row.domestic_bid)?;
            let spot_ask = present(row.spot_ask)?;
            let perp_bid = present(Some(row.perp_bid))?;
            if !within_basis(spot_ask, perp_bid) {
                return None;
            }
            let premium = premium_pct(domestic_bid, spot_ask, usdt_krw).ok()?;
            (premium > 0.0).then_some(Candidate { row, premium })
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| {
        b.premium
            .total_cmp(&a.premium)
            .then_with(|| a.row.coin.cmp(&b.row.coin))
    });
    candidates
}

fn coins_of(candidates: &[Candidate<'_>], take: usize) -> Vec<String> {
    candidates
        .iter()
        .take(take)
        .map(|candidate| candidate.row.coin.clone())
        .collect()
}

/// Coins a fixed-list watch follows, picked from the first snapshot: the closest
/// b2g and largest g2b coins, topped up to `top_n`.
pub fn initial_watch_coins(
    rows: &[SnapshotRow],
    candidates: &[String],
    config: &WatchConfig,
    usdt_krw: f64,
) -> Vec<String> {
    if config.full_universe {
        return candidates.to_vec();
    }
    if rows.is_empty() {
        return candidates.iter().take(config.top_n).cloned().collect();
    }

    let b2g = b2g_candidates(rows, usdt_krw);
    let g2b = g2b_candidates(rows, usdt_krw);
    let limit = config.top_n.min(rows.len());

    let mut selected = coins_of(&b2g, config.display_top_k);
    for coin in coins_of(&g2b, config.display_far_k) {
        if !selected.contains(&coin) {
            selected.push(coin);
        }
    }

    let extras = b2g
        .iter()
        .skip(config.display_top_k)
        .chain(g2b.iter().skip(config.display_far_k))
        .map(|candidate| &candidate.row.coin)
        .chain(rows.iter().map(|row| &row.coin));
    for coin in extras {
        if selected.len() >= limit {
            break;
        }
        if !selected.contains(coin) {
            selected.push(coin.clone());
        }
    }
    selected
}

/*----- */
// Ranker
/*----- */
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickRanking {
    pub close_coins: Vec<String>,
    pub far_coins: Vec<String>,
    pub rows: Vec<OpportunityRow>,
    pub all_rows: Vec<OpportunityRow>,
}

struct OutLeg<'a> {
    row: &'a SnapshotRow,
    spot_bid: f64,
    usdt_out: f64,
    route: Option<TransferRoute>,
    eval: TransferEval,
}

struct BackLeg<'a> {
    row: &'a SnapshotRow,
    domestic_bid: f64,
    spot_ask: f64,
    krw_per_usdt: f64,
    route: Option<TransferRoute>,
}

fn impact_of(row: &SnapshotRow) -> Option<RowImpact> {
    row.liquidity.map(|liquidity| RowImpact {
        domestic: liquidity.domestic.map(|impact| impact.impact_pct),
        overseas_spot: liquidity.overseas_spot.map(|impact| impact.impact_pct),
        overseas_perp: liquidity.overseas_perp.map(|impact| impact.impact_pct),
    })
}

fn pct_of(value: f64, notional: f64) -> f64 {
    value / notional * 100.0
}

// Ranks one tick's rows for a pair.
#[derive(Debug, Clone, Copy)]
pub struct Ranker<'a> {
    pub config: &'a WatchConfig,
    pub usdt_krw: f64,
    pub transfers: &'a TransferBook,
}

impl Ranker<'_> {
    fn domestic_exchange(&self) -> ExchangeId {
        self.config.domestic_exchange
    }

    fn overseas_exchange(&self) -> ExchangeId {
        self.config.overseas_exchange
    }

    fn prices(&self, domestic_krw: f64, overseas_usdt: f64) -> RoutePrices {
        RoutePrices {
            domestic_krw,
            overseas_usdt,
            usdt_krw: self.usdt_krw,
        }
    }

    /// Single direction row. b2g rows whose basis is too wide still show their prices.
    pub fn build_row(
        &self,
        rank: usize,
        row: &SnapshotRow,
        include_transfer: bool,
        direction: Direction,
    ) -> OpportunityRow {
        let pricing = select_pricing(row, direction).or_else(|| match direction {
            Direction::B2g => Some(Pricing {
                domestic_price: present(Some(row.domestic_ask))?,
                overseas_price: present(row.spot_bid)?,
                gap_source: GapSource::Spot,
                use_unwind: false,
            })
            .filter(|_| row.perp_bid > 0.0),
            Direction::G2b => None,
        });
        let Some(pricing) = pricing else {
            return OpportunityRow::missing(rank, &row.coin);
        };
        let Ok(premium) = premium_pct(pricing.domestic_price, pricing.overseas_price, self.usdt_krw) else {
            return OpportunityRow::missing(rank, &row.coin);
        };

        let notional = self.config.notional_krw;
        let (base_qty, edge_krw) = if pricing.use_unwind {
            let base_qty = notional / (pricing.overseas_price * self.usdt_krw);
            (base_qty, base_qty * pricing.domestic_price - notional)
        } else {
            let base_qty = notional / pricing.domestic_price;
            (base_qty, base_qty * pricing.overseas_price * self.usdt_krw - notional)
        };

        let route = include_transfer
            .then(|| {
                self.transfers.route(
                    direction,
                    &row.coin,
                    self.prices(pricing.domestic_price, pricing.overseas_price),
                )
            })
            .flatten();
        let eval = evaluate(route.as_ref(), Some(base_qty));
        let net_edge_krw = eval.fee_krw.map(|fee| edge_krw - fee);

        OpportunityRow {
            rank,
            direction: Some(direction),
            coin: row.coin.clone(),
            domestic_exchange: Some(self.domestic_exchange()),
            overseas_exchange: Some(self.overseas_exchange()),
            premium_pct: Some(premium),
            edge_krw: Some(edge_krw),
            edge_pct: Some(pct_of(edge_krw, notional)),
            net_edge_krw,
            net_edge_pct: net_edge_krw.map(|net| pct_of(net, notional)),
            transfer_ok: include_transfer.then_some(eval.ok),
            out_transfer_closed_reason: route
                .as_ref()
                .filter(|_| !eval.ok)
                .and_then(|route| route.closed_reason.clone()),
            domestic_ask: Some(pricing.domestic_price),
            overseas_bid: Some(pricing.overseas_price),
            gap_source: Some(pricing.gap_source),
            spot_ask: row.spot_ask,
            spot_bid: row.spot_bid,
            spot_sell_usdt: row.spot_sell_usdt,
            spot_vs_perp_pct: row.spot_vs_perp_pct,
            impact: impact_of(row),
            transfer_text: route.as_ref().map(|route| transfer_text(route, &row.coin)),
            transfer: route,
            ..Default::default()
        }
    }

    fn out_legs<'r>(&self, rows: &'r [SnapshotRow]) -> Vec<OutLeg<'r>> {
        let notional = self.config.notional_krw;
        let mut legs = rows
            .iter()
            .filter_map(|row| {
                let domestic_ask = present(Some(row.domestic_ask))?;
                let spot_bid = present(row.spot_bid)?;
                let perp_bid = present(Some(row.perp_bid))?;
                if !within_basis(spot_bid, perp_bid) {
                    return None;
                }
                let base_qty = notional / domestic_ask;
                let route = self
                    .transfers
                    .route(Direction::B2g, &row.coin, self.prices(domestic_ask, spot_bid));
                let eval = evaluate(route.as_ref(), Some(base_qty));
                Some(OutLeg {
                    row,
                    spot_bid,
                    usdt_out: base_qty * spot_bid,
                    route,
                    eval,
                })
            })
            .collect::<Vec<_>>();
        legs.sort_by(|a, b| {
            b.usdt_out
                .total_cmp(&a.usdt_out)
                .then_with(|| a.row.coin.cmp(&b.row.coin))
        });
        legs
    }

    fn back_legs<'r>(&self, rows: &'r [SnapshotRow]) -> Vec<BackLeg<'r>> {
        let mut legs = rows
            .iter()
            .filter_map(|row| {
                let domestic_bid = present(row.domestic_bid)?;
                let spot_ask = present(row.spot_ask)?;
                let perp_bid = present(Some(row.perp_bid))?;
                if !within_basis(spot_ask, perp_bid) {
                    return None;
                }
                Some(BackLeg {
                    row,
                    domestic_bid,
                    spot_ask,
                    krw_per_usdt: domestic_bid / spot_ask,
                    route: self
                        .transfers
                        .route(Direction::G2b, &row.coin, self.prices(domestic_bid, spot_ask)),
                })
            })
            .collect::<Vec<_>>();
        legs.sort_by(|a, b| {
            b.krw_per_usdt
                .total_cmp(&a.krw_per_usdt)
                .then_with(|| a.row.coin.cmp(&b.row.coin))
        });
        legs
    }

    /// Every best out leg crossed with every best back leg, ranked by net edge.
    pub fn cycle_rows(&self, rows: &[SnapshotRow]) -> Vec<OpportunityRow> {
        let limit = self.config.cycle_leg_limit();
        let notional = self.config.notional_krw;
        let out_legs = self.out_legs(rows);
        let back_legs = self.back_legs(rows);

        let mut cycles = Vec::new();
        for out in out_legs.iter().take(limit) {
            for back in back_legs.iter().take(limit) {
                let base_qty_back = out.usdt_out / back.spot_ask;
                let back_eval = evaluate(back.route.as_ref(), Some(base_qty_back));

                let edge_krw = base_qty_back * back.domestic_bid - notional;
                let edge_pct = pct_of(edge_krw, notional);
                let net_edge_krw = (out.eval.fee_krw.is_some() || back_eval.fee_krw.is_some()).then(|| {
                    edge_krw - out.eval.fee_krw.unwrap_or(0.0) - back_eval.fee_krw.unwrap_or(0.0)
                });
                let net_edge_pct = net_edge_krw.map(|net| pct_of(net, notional));

                let out_coin = &out.row.coin;
                let back_coin = &back.row.coin;
                cycles.push(OpportunityRow {
                    cycle: true,
                    coin: if out_coin == back_coin {
                        out_coin.clone()
                    } else {
                        format!("{out_coin}→{back_coin}")
                    },
                    out_coin: Some(out_coin.clone()),
                    back_coin: Some(back_coin.clone()),
                    domestic_exchange: Some(self.domestic_exchange()),
                    overseas_exchange: Some(self.overseas_exchange()),
                    premium_pct: Some(net_edge_pct.unwrap_or(edge_pct)),
                    edge_krw: Some(edge_krw),
                    edge_pct: Some(edge_pct),
                    net_edge_krw,
                    net_edge_pct,
                    transfer_ok: Some(out.eval.ok && back_eval.ok),
                    out_transfer_ok: Some(out.eval.ok),
                    back_transfer_ok: Some(back_eval.ok),
                    out_transfer_closed_reason: out
                        .route
                        .as_ref()
                        .filter(|_| !out.eval.ok)
                        .and_then(|route| route.closed_reason.clone()),
                    back_transfer_closed_reason: back
                        .route
                        .as_ref()
                        .filter(|_| !back_eval.ok)
                        .and_then(|route| route.closed_reason.clone()),
                    domestic_ask: Some(out.row.domestic_ask),
                    domestic_bid: Some(back.domestic_bid),
                    spot_bid: Some(out.spot_bid),
                    spot_ask: Some(back.spot_ask),
                    out_domestic_ask: Some(out.row.domestic_ask),
                    out_overseas_bid: Some(out.spot_bid),
                    back_overseas_ask: Some(back.spot_ask),
                    back_domestic_bid: Some(back.domestic_bid),
                    out_spot_vs_perp_pct: out.row.spot_vs_perp_pct,
                    back_spot_vs_perp_pct: back.row.spot_vs_perp_pct,
                    impact: impact_of(out.row),
                    transfer_out: out.route.clone(),
                    transfer_back: back.route.clone(),
                    ..Default::default()
                });
            }
        }

        cycles.sort_by(cmp_by_edge);
        for (index, row) in cycles.iter_mut().enumerate() {
            row.rank = index + 1;
        }
        cycles
    }

    /// Every coin in `rows` by b2g premium, then unpriced rows, then watch coins
    /// never seen at all.
    pub fn all_rows(&self, rows: &[SnapshotRow], watch_coins: &[String]) -> Vec<OpportunityRow> {
        let mut priced = Vec::new();
        let mut unpriced = Vec::new();
        for row in rows {
            let premium = select_pricing(row, Direction::B2g).and_then(|pricing| {
                premium_pct(pricing.domestic_price, pricing.overseas_price, self.usdt_krw).ok()
            });
            match premium {
                Some(premium) => priced.push((premium, row)),
                None => unpriced.push(row),
            }
        }
        priced.sort_by(|(a, row_a), (b, row_b)| a.total_cmp(b).then_with(|| row_a.coin.cmp(&row_b.coin)));

        let mut all = priced
            .into_iter()
            .map(|(_, row)| row)
            .chain(unpriced)
            .enumerate()
            .map(|(index, row)| self.build_row(index + 1, row, false, Direction::B2g))
            .collect::<Vec<_>>();

        let seen = rows.iter().map(|row| row.coin.as_str()).collect::<Vec<_>>();
        for coin in watch_coins {
            if !seen.contains(&coin.as_str()) {
                all.push(OpportunityRow::missing(all.len() + 1, coin));
            }
        }
        all
    }

    /// Rank one tick. `rows` holds the latest row of every watch coin that has one.
    pub fn rank(&self, rows: &[SnapshotRow], watch_coins: &[String]) -> TickRanking {
        let config = self.config;
        let b2g = b2g_candidates(rows, self.usdt_krw);
        let g2b = g2b_candidates(rows, self.usdt_krw);

        let mut output = if config.full_universe {
            self.cycle_rows(rows)
        } else {
            Vec::new()
        };
        let top = b2g
            .iter()
            .take(config.display_top_k)
            .map(|candidate| (candidate, Direction::B2g))
            .chain(
                g2b.iter()
                    .take(config.display_far_k)
                    .map(|candidate| (candidate, Direction::G2b)),
            );
        let extras = b2g
            .iter()
            .skip(config.display_top_k)
            .map(|candidate| (candidate, Direction::B2g))
            .chain(
                g2b.iter()
                    .skip(config.display_far_k)
                    .map(|candidate| (candidate, Direction::G2b)),
            );
        // The full universe shows cycles instead of topping up with extras.
        let extra_slots = if config.full_universe {
            0
        } else {
            let top_count = config.display_top_k.min(b2g.len()) + config.display_far_k.min(g2b.len());
            config.top_n.saturating_sub(top_count)
        };

        for (candidate, direction) in top.chain(extras.take(extra_slots)) {
            let rank = output.len() + 1;
            output.push(self.build_row(rank, candidate.row, true, direction));
        }

        TickRanking {
            close_coins: coins_of(&b2g, config.display_top_k),
            far_coins: coins_of(&g2b, config.display_far_k),
            rows: output,
            all_rows: self.all_rows(rows, watch_coins),
        }
    }
}

/// Net edge (unknown sorts last), then net percent, then coin.
pub fn cmp_by_edge(a: &OpportunityRow, b: &OpportunityRow) -> Ordering {
    let edge = |row: &OpportunityRow| row.net_edge_krw.unwrap_or(f64::NEG_INFINITY);
    let pct = |row: &OpportunityRow| row.net_edge_pct.unwrap_or(f64::NEG_INFINITY);
    edge(b)
        .total_cmp(&edge(a))
        .then_with(|| pct(b).total_cmp(&pct(a)))
        .then_with(|| a.coin.cmp(&b.coin))
}

/// Latest rows of `watch_coins`, in watch order.
pub fn rows_for(latest: &HashMap<String, SnapshotRow>, watch_coins: &[String]) -> Vec<SnapshotRow> {
    watch_coins
        .iter()
        .filter_map(|coin| latest.get(coin).cloned())
        .collect()
}
