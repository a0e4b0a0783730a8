use std::{collections::HashMap, sync::Arc};

use futures::{future::BoxFuture, stream, FutureExt, StreamExt};
use premia_data::{
    assets::quote::Quote,
    exchange::MarketClient,
    feed::FeedHandle,
    orderbook::{
        fill::{analyze_buy_fill, analyze_sell_fill, FillResult},
        OrderBook,
    },
};
use tracing::{debug, warn};

use crate::{
    calculations::{apply_fee, fee_adjusted_quote, premium_pct, Side},
    fees::PairFees,
    universe::SymbolUniverse,
};

// Init progress is reported every this many coins.
const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricingMode {
    /// Top of book from tickers.
    #[default]
    Ticker,
    /// Average fill price for the notional, from order books.
    Vwap,
}

/*----- */
// Snapshot row
/*----- */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub impact_pct: f64,
    pub levels: usize,
}

impl From<&FillResult> for Impact {
    fn from(fill: &FillResult) -> Self {
        Self {
            impact_pct: fill.impact_pct,
            levels: fill.levels_used,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Liquidity {
    pub domestic: Option<Impact>,
    pub overseas_spot: Option<Impact>,
    pub overseas_perp: Option<Impact>,
}

// Fee adjusted prices for one coin: bids are what a sell nets, asks what a buy costs.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub coin: String,
    pub premium_pct: f64,
    pub domestic_ask: f64,
    pub domestic_bid: Option<f64>,
    pub perp_bid: f64,
    pub perp_ask: Option<f64>,
    pub spot_ask: Option<f64>,
    pub spot_bid: Option<f64>,
    pub spot_sell_usdt: Option<f64>,
    /// `(perp bid - spot bid) / spot bid`, signed.
    pub spot_vs_perp_pct: Option<f64>,
    pub liquidity: Option<Liquidity>,
}

fn positive(value: f64) -> Option<f64> {
    (value > 0.0 && value.is_finite()).then_some(value)
}

impl SnapshotRow {
    /// A row is complete once it carries an overseas spot bid.
    pub fn is_complete(&self) -> bool {
        self.spot_bid.is_some_and(|bid| bid > 0.0)
    }

    /// Row from raw top of book quotes. `None` when the domestic ask or perp bid
    /// is unusable or the premium cannot be computed.
    pub fn from_quotes(
        coin: &str,
        domestic: Quote,
        perp: Quote,
        spot: Option<Quote>,
        fees: PairFees,
        usdt_krw: f64,
        notional_krw: f64,
    ) -> Option<Self> {
        let domestic = fee_adjusted_quote(domestic, fees.domestic, fees.domestic).ok()?;
        let perp = fee_adjusted_quote(perp, fees.overseas_perp, fees.overseas_perp).ok()?;
        let spot = spot.and_then(|spot| {
            fee_adjusted_quote(spot, fees.overseas_spot, fees.overseas_spot).ok()
        });
        let domestic_ask = positive(domestic.ask)?;
        let perp_bid = positive(perp.bid)?;
        let premium = premium_pct(domestic_ask, perp_bid, usdt_krw).ok()?;

        let spot_bid = spot.and_then(|spot| positive(spot.bid));
        Some(Self {
            coin: coin.to_string(),
            premium_pct: premium,
            domestic_ask,
            domestic_bid: positive(domestic.bid),
            perp_bid,
            perp_ask: positive(perp.ask),
            spot_ask: spot.and_then(|spot| positive(spot.ask)),
            spot_bid,
            spot_sell_usdt: spot_bid
                .filter(|_| notional_krw > 0.0)
                .map(|bid| bid * notional_krw / domestic_ask),
            spot_vs_perp_pct: spot_bid.map(|bid| (perp_bid - bid) / bid * 100.0),
            liquidity: None,
        })
    }

    /// Row priced by walking order books for `notional_krw`. The domestic buy
    /// budget leaves room for its fee, the overseas legs sell the bought size.
    pub fn from_order_books(
        coin: &str,
        domestic: &OrderBook,
        perp: &OrderBook,
        spot: Option<&OrderBook>,
        fees: PairFees,
        usdt_krw: f64,
        notional_krw: f64,
    ) -> Option<Self> {
        let budget = notional_krw / (1.0 + fees.domestic);
        let domestic_fill = analyze_buy_fill(&domestic.asks, budget)?;
        let perp_fill = analyze_sell_fill(&perp.bids, domestic_fill.base_qty)?;

        let domestic_ask = apply_fee(domestic_fill.vwap_price, fees.domestic, Side::Buy).ok()?;
        let perp_bid = apply_fee(perp_fill.vwap_price, fees.overseas_perp, Side::Sell).ok()?;
        let premium = premium_pct(domestic_ask, perp_bid, usdt_krw).ok()?;

        let spot_fill = spot.and_then(|spot| analyze_sell_fill(&spot.bids, domestic_fill.base_qty));
        let spot_bid = spot_fill
            .as_ref()
            .and_then(|fill| apply_fee(fill.vwap_price, fees.overseas_spot, Side::Sell).ok());
        let spot_ask = spot
            .and_then(OrderBook::best_ask)
            .and_then(|ask| apply_fee(ask, fees.overseas_spot, Side::Buy).ok());

        Some(Self {
            coin: coin.to_string(),
            premium_pct: premium,
            domestic_ask,
            domestic_bid: domestic
                .best_bid()
                .and_then(|bid| apply_fee(bid, fees.domestic, Side::Sell).ok()),
            perp_bid,
            perp_ask: perp
                .best_ask()
                .and_then(|ask| apply_fee(ask, fees.overseas_perp, Side::Buy).ok()),
            spot_ask,
            spot_bid,
            spot_sell_usdt: spot_bid.map(|bid| bid * domestic_fill.base_qty),
            spot_vs_perp_pct: spot_bid.map(|bid| (perp_bid - bid) / bid * 100.0),
            liquidity: Some(Liquidity {
                domestic: Some(Impact::from(&domestic_fill)),
                overseas_spot: spot_fill.as_ref().map(Impact::from),
                overseas_perp: Some(Impact::from(&perp_fill)),
            }),
        })
    }
}

/// Keep complete rows: a new row only replaces a complete one if it is complete too.
pub fn merge_latest(latest: &mut HashMap<String, SnapshotRow>, fresh: Vec<SnapshotRow>) {
    for row in fresh {
        let replace = row.is_complete()
            || latest
                .get(&row.coin)
                .map_or(true, |existing| !existing.is_complete());
        if replace {
            latest.insert(row.coin.clone(), row);
        }
    }
}

/*----- */
// Pricing inputs
/*----- */
#[derive(Debug, Clone, Copy)]
pub struct PriceInputs<'a> {
    pub universe: &'a SymbolUniverse,
    pub fees: PairFees,
    pub usdt_krw: f64,
    pub notional_krw: f64,
}

/*----- */
// Feed rows
/*----- */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSymbols {
    pub coin: String,
    pub domestic: String,
    pub perp: String,
    pub spot: Option<String>,
}

// Live feeds a watch reads from, shared or its own.
#[derive(Debug, Clone)]
pub struct FeedSet {
    pub domestic: FeedHandle,
    pub perp: FeedHandle,
    pub spot: Option<FeedHandle>,
    pub symbols: Vec<FeedSymbols>,
}

impl FeedSet {
    /// Feed ids for `coins`. Coins missing a domestic or perp market are left out.
    pub fn symbols_for(universe: &SymbolUniverse, coins: &[String]) -> Vec<FeedSymbols> {
        coins
            .iter()
            .filter_map(|coin| {
                Some(FeedSymbols {
                    coin: coin.clone(),
                    domestic: universe.domestic.get(coin)?.clone(),
                    perp: universe.overseas_perp.get(coin)?.clone(),
                    spot: universe.overseas_spot.get(coin).cloned(),
                })
            })
            .collect()
    }

    /// Rows for every coin whose domestic and perp quotes are fresh.
    pub fn rows(&self, inputs: PriceInputs<'_>) -> Vec<SnapshotRow> {
        self.symbols
            .iter()
            .filter_map(|symbols| {
                let domestic = self.domestic.get_quote(&symbols.domestic)?;
                let perp = self.perp.get_quote(&symbols.perp)?;
                let spot = match (&self.spot, &symbols.spot) {
                    (Some(feed), Some(id)) => feed.get_quote(id),
                    _ => None,
                };
                SnapshotRow::from_quotes(
                    &symbols.coin,
                    domestic,
                    perp,
                    spot,
                    inputs.fees,
                    inputs.usdt_krw,
                    inputs.notional_krw,
                )
            })
            .collect()
    }
}

/*----- */
// REST snapshot
/*----- */
#[derive(Debug, Clone)]
pub struct RestMarkets {
    pub domestic: Arc<dyn MarketClient>,
    pub spot: Option<Arc<dyn MarketClient>>,
    pub perp: Arc<dyn MarketClient>,
}

/// Called with `(done, total)` while a snapshot works through its coins.
pub type Progress = Arc<dyn Fn(usize, usize) + Send + Sync>;

// Prices and fees a row is built with, detached from the universe.
#[derive(Debug, Clone, Copy)]
struct RowPricing {
    fees: PairFees,
    usdt_krw: f64,
    notional_krw: f64,
}

impl RowPricing {
    fn row(&self, coin: &str, domestic: Quote, perp: Quote, spot: Option<Quote>) -> Option<SnapshotRow> {
        SnapshotRow::from_quotes(coin, domestic, perp, spot, self.fees, self.usdt_krw, self.notional_krw)
    }
}

impl From<PriceInputs<'_>> for RowPricing {
    fn from(inputs: PriceInputs<'_>) -> Self {
        Self {
            fees: inputs.fees,
            usdt_krw: inputs.usdt_krw,
            notional_krw: inputs.notional_krw,
        }
    }
}

async fn bulk_tickers(client: Option<Arc<dyn MarketClient>>, ids: Vec<String>) -> HashMap<String, Quote> {
    let Some(client) = client.filter(|_| !ids.is_empty()) else {
        return HashMap::new();
    };
    match client.tickers(&ids).await {
        Ok(quotes) => quotes,
        Err(error) => {
            warn!(venue = %client.venue(), error = %error, action = "falling back to per market calls", "bulk tickers failed");
            HashMap::new()
        }
    }
}

async fn single_ticker(client: Option<Arc<dyn MarketClient>>, id: Option<String>) -> Option<Quote> {
    let (client, id) = (client?, id?);
    match client.ticker(&id).await {
        Ok(quote) => quote.and_then(Quote::validated),
        Err(error) => {
            debug!(venue = %client.venue(), id = %id, error = %error, "ticker failed");
            None
        }
    }
}

async fn single_book(client: Option<Arc<dyn MarketClient>>, id: Option<String>, depth: usize) -> Option<OrderBook> {
    let (client, id) = (client?, id?);
    match client.order_book(&id, depth).await {
        Ok(book) => Some(book),
        Err(error) => {
            debug!(venue = %client.venue(), id = %id, error = %error, "order book failed");
            None
        }
    }
}

/// Drive per coin jobs, at most `concurrency` at a time.
async fn pooled(
    jobs: Vec<BoxFuture<'static, Option<SnapshotRow>>>,
    concurrency: usize,
    progress: Option<Progress>,
) -> Vec<SnapshotRow> {
    let total = jobs.len();
    let mut done = 0;
    let mut rows = Vec::with_capacity(total);
    let mut results = stream::iter(jobs).buffer_unordered(concurrency.max(1));

    while let Some(row) = results.next().await {
        done += 1;
        if let Some(progress) = &progress {
            if done % PROGRESS_EVERY == 0 || done == total {
                progress(done, total);
            }
        }
        rows.extend(row);
    }
    rows
}

impl RestMarkets {
    /// Snapshot `coins` over REST, at most `concurrency` coins in flight. Failed
    /// coins are left out. Rows come back in `coins` order.
    pub fn snapshot(
        &self,
        inputs: PriceInputs<'_>,
        coins: &[String],
        mode: PricingMode,
        concurrency: usize,
        depth: usize,
        progress: Option<Progress>,
    ) -> BoxFuture<'static, Vec<SnapshotRow>> {
        let markets = self.clone();
        let pricing = RowPricing::from(inputs);
        let targets = FeedSet::symbols_for(inputs.universe, coins);

        async move {
            let rows = match mode {
                PricingMode::Ticker => {
                    markets
                        .clone()
                        .ticker_snapshot(pricing, targets.clone(), concurrency, progress)
                        .await
                }
                PricingMode::Vwap => {
                    let jobs = targets
                        .iter()
                        .map(|ids| markets.clone().vwap_row(pricing, ids.clone(), depth).boxed())
                        .collect();
                    pooled(jobs, concurrency, progress).await
                }
            };

            let mut by_coin = rows
                .into_iter()
                .map(|row| (row.coin.clone(), row))
                .collect::<HashMap<_, _>>();
            targets
                .iter()
                .filter_map(|ids| by_coin.remove(&ids.coin))
                .collect()
        }
        .boxed()
    }

    async fn ticker_snapshot(
        self,
        pricing: RowPricing,
        targets: Vec<FeedSymbols>,
        concurrency: usize,
        progress: Option<Progress>,
    ) -> Vec<SnapshotRow> {
        let domestic_ids = targets.iter().map(|ids| ids.domestic.clone()).collect();
        let perp_ids = targets.iter().map(|ids| ids.perp.clone()).collect();
        let spot_ids = targets.iter().filter_map(|ids| ids.spot.clone()).collect();

        let (domestic_quotes, perp_quotes, spot_quotes) = tokio::join!(
            bulk_tickers(Some(self.domestic.clone()), domestic_ids),
            bulk_tickers(Some(self.perp.clone()), perp_ids),
            bulk_tickers(self.spot.clone(), spot_ids)
        );

        let mut rows = targets
            .iter()
            .filter_map(|ids| {
                let domestic = domestic_quotes.get(&ids.domestic)?;
                let perp = perp_quotes.get(&ids.perp)?;
                let spot = ids.spot.as_ref().and_then(|id| spot_quotes.get(id)).copied();
                pricing.row(&ids.coin, *domestic, *perp, spot)
            })
            .collect::<Vec<_>>();

        let missing = targets
            .iter()
            .filter(|ids| !rows.iter().any(|row| row.coin == ids.coin))
            .cloned()
            .collect::<Vec<_>>();
        if missing.is_empty() && !rows.is_empty() {
            return rows;
        }

        // Bulk covered most coins: only chase the rest one by one.
        let to_fetch = if rows.len() >= (targets.len() / 2).max(1) {
            missing
        } else {
            targets.clone()
        };
        debug!(
            bulk = rows.len(),
            fetching = to_fetch.len(),
            total = targets.len(),
            "rest snapshot falling back to per coin tickers"
        );

        let jobs = to_fetch
            .into_iter()
            .map(|ids| self.clone().ticker_row(pricing, ids).boxed())
            .collect();
        let fetched = pooled(jobs, concurrency, progress).await;
        rows.retain(|row| !fetched.iter().any(|refetched| refetched.coin == row.coin));
        rows.extend(fetched);
        rows
    }

    async fn ticker_row(self, pricing: RowPricing, ids: FeedSymbols) -> Option<SnapshotRow> {
        let (domestic, perp, spot) = tokio::join!(
            single_ticker(Some(self.domestic), Some(ids.domestic)),
            single_ticker(Some(self.perp), Some(ids.perp)),
            single_ticker(self.spot, ids.spot)
        );
        pricing.row(&ids.coin, domestic?, perp?, spot)
    }

    async fn vwap_row(self, pricing: RowPricing, ids: FeedSymbols, depth: usize) -> Option<SnapshotRow> {
        let (domestic, perp, spot) = tokio::join!(
            single_book(Some(self.domestic), Some(ids.domestic), depth),
            single_book(Some(self.perp), Some(ids.perp), depth),
            single_book(self.spot, ids.spot, depth)
        );
        SnapshotRow::from_order_books(
            &ids.coin,
            &domestic?,
            &perp?,
            spot.as_ref(),
            pricing.fees,
            pricing.usdt_krw,
            pricing.notional_krw,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock_data::test_utils::{universe_of, MockMarket};
    use premia_data::{
        assets::level::Level,
        shared::subscription_models::{ExchangeId, Venue},
    };

    const FEES: PairFees = PairFees {
        domestic: 0.0,
        overseas_spot: 0.0,
        overseas_perp: 0.0,
    };

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_from_quotes() {
        struct TestCase {
            name: &'static str,
            spot: Option<Quote>,
            expected_complete: bool,
            expected_basis: Option<f64>,
        }

        let cases = vec![
            TestCase {
                name: "with spot",
                spot: Some(Quote::new(100.0, 100.1)),
                expected_complete: true,
                expected_basis: Some(0.1),
            },
            TestCase {
                name: "perp only",
                spot: None,
                expected_complete: false,
                expected_basis: None,
            },
        ];

        for case in cases {
            let row = SnapshotRow::from_quotes(
                "ETH",
                Quote::new(149_000.0, 150_000.0),
                Quote::new(100.1, 100.2),
                case.spot,
                FEES,
                1_450.0,
                1_500_000.0,
            )
            .unwrap();
            assert_eq!(row.is_complete(), case.expected_complete, "{}", case.name);
            assert_eq!(row.domestic_ask, 150_000.0, "{}", case.name);
            assert_eq!(row.domestic_bid, Some(149_000.0), "{}", case.name);
            match case.expected_basis {
                Some(expected) => {
                    assert!(approx(row.spot_vs_perp_pct.unwrap(), expected), "{}", case.name);
                    assert!(approx(row.spot_sell_usdt.unwrap(), 1_000.0), "{}", case.name);
                }
                None => assert_eq!(row.spot_vs_perp_pct, None, "{}", case.name),
            }
        }
    }

    #[test]
    fn test_from_quotes_applies_fees() {
        let fees = PairFees::new(ExchangeId::Bithumb, ExchangeId::Gateio);
        let row = SnapshotRow::from_quotes(
            "BTC",
            Quote::new(149_000_000.0, 150_000_000.0),
            Quote::new(100_000.0, 100_010.0),
            None,
            fees,
            1_450.0,
            5_000_000.0,
        )
        .unwrap();
        assert!(approx(row.domestic_ask, 150_000_000.0 * 1.0004));
        assert!(approx(row.perp_bid, 100_000.0 * 0.9995));

        let broken = SnapshotRow::from_quotes(
            "BTC",
            Quote::new(149.0, 150.0),
            Quote::new(100.0, 101.0),
            None,
            fees,
            0.0,
            5_000_000.0,
        );
        assert!(broken.is_none());
    }

    #[test]
    fn test_from_order_books() {
        let domestic = OrderBook::new(
            vec![Level::new(99.0, 10.0)],
            vec![Level::new(100.0, 5.0), Level::new(110.0, 100.0)],
        );
        let perp = OrderBook::new(
            vec![Level::new(0.07, 8.0), Level::new(0.06, 100.0)],
            vec![Level::new(0.071, 10.0)],
        );

        // 500 buys 5 @ 100 then 550 buys 5 @ 110: 10 coins.
        let row = SnapshotRow::from_order_books("XRP", &domestic, &perp, None, FEES, 1_400.0, 1_050.0).unwrap();
        assert!(approx(row.domestic_ask, 105.0));
        assert!(approx(row.perp_bid, (8.0 * 0.07 + 2.0 * 0.06) / 10.0));
        assert_eq!(row.domestic_bid, Some(99.0));
        assert_eq!(row.perp_ask, Some(0.071));
        let liquidity = row.liquidity.unwrap();
        assert_eq!(liquidity.domestic.unwrap().levels, 2);
        assert_eq!(liquidity.overseas_perp.unwrap().levels, 2);
        assert!(liquidity.overseas_spot.is_none());

        let thin = OrderBook::new(vec![Level::new(0.07, 1.0)], vec![]);
        assert!(SnapshotRow::from_order_books("XRP", &domestic, &thin, None, FEES, 1_400.0, 1_050.0).is_none());
    }

    #[test]
    fn test_merge_latest_keeps_complete_rows() {
        let complete = SnapshotRow::from_quotes(
            "ETH",
            Quote::new(1.0, 2.0),
            Quote::new(1.0, 2.0),
            Some(Quote::new(1.0, 2.0)),
            FEES,
            1.0,
            1.0,
        )
        .unwrap();
        let partial = SnapshotRow::from_quotes("ETH", Quote::new(1.0, 3.0), Quote::new(1.0, 2.0), None, FEES, 1.0, 1.0).unwrap();

        let mut latest = HashMap::new();
        merge_latest(&mut latest, vec![partial.clone()]);
        assert_eq!(latest["ETH"], partial);

        merge_latest(&mut latest, vec![complete.clone()]);
        assert_eq!(latest["ETH"], complete);

        merge_latest(&mut latest, vec![partial]);
        assert_eq!(latest["ETH"], complete);
    }

    #[tokio::test]
    async fn test_ticker_snapshot_fetches_only_missing_coins() {
        let coins = ["AAA", "BBB", "CCC", "DDD"].map(String::from).to_vec();
        let universe = universe_of(&coins);

        let domestic = Arc::new(MockMarket::new(Venue::spot(ExchangeId::Bithumb)).with_bulk_tickers());
        let perp = Arc::new(MockMarket::new(Venue::perp(ExchangeId::Gateio)).with_bulk_tickers());
        for coin in &coins {
            domestic.set_quote(&format!("{coin}_KRW"), Quote::new(1_400.0, 1_450.0));
            perp.set_quote(&format!("{coin}_USDT"), Quote::new(1.0, 1.01));
        }
        perp.hide_from_bulk("DDD_USDT");

        let markets = RestMarkets {
            domestic: domestic.clone(),
            spot: None,
            perp: perp.clone(),
        };
        let inputs = PriceInputs {
            universe: &universe,
            fees: FEES,
            usdt_krw: 1_400.0,
            notional_krw: 1_000_000.0,
        };

        let rows = markets.snapshot(inputs, &coins, PricingMode::Ticker, 4, 20, None).await;
        assert_eq!(rows.iter().map(|row| row.coin.as_str()).collect::<Vec<_>>(), coins);
        assert_eq!(perp.single_calls(), vec!["DDD_USDT".to_string()]);
        assert_eq!(domestic.single_calls(), vec!["DDD_KRW".to_string()]);
    }

    #[tokio::test]
    async fn test_ticker_snapshot_fetches_everything_when_bulk_is_thin() {
        let coins = ["AAA", "BBB", "CCC"].map(String::from).to_vec();
        let universe = universe_of(&coins);

        let domestic = Arc::new(MockMarket::new(Venue::spot(ExchangeId::Upbit)));
        let perp = Arc::new(MockMarket::new(Venue::perp(ExchangeId::Okx)));
        for coin in &coins {
            domestic.set_quote(&format!("{coin}_KRW"), Quote::new(1_400.0, 1_450.0));
            perp.set_quote(&format!("{coin}_USDT"), Quote::new(1.0, 1.01));
        }
        perp.fail_id("BBB_USDT");

        let markets = RestMarkets {
            domestic: domestic.clone(),
            spot: None,
            perp,
        };
        let inputs = PriceInputs {
            universe: &universe,
            fees: FEES,
            usdt_krw: 1_400.0,
            notional_krw: 1_000_000.0,
        };

        let progress_calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let calls = progress_calls.clone();
        let progress: Progress = Arc::new(move |done: usize, total: usize| calls.lock().push((done, total)));
        let rows = markets
            .snapshot(inputs, &coins, PricingMode::Ticker, 2, 20, Some(progress))
            .await;

        assert_eq!(rows.iter().map(|row| row.coin.as_str()).collect::<Vec<_>>(), vec!["AAA", "CCC"]);
        assert_eq!(domestic.single_calls().len(), 3);
        assert_eq!(progress_calls.lock().last(), Some(&(3, 3)));
    }

    #[tokio::test]
    async fn test_vwap_snapshot() {
        let coins = vec!["XRP".to_string()];
        let universe = universe_of(&coins);

        let domestic = Arc::new(MockMarket::new(Venue::spot(ExchangeId::Bithumb)));
        let perp = Arc::new(MockMarket::new(Venue::perp(ExchangeId::Gateio)));
        domestic.set_book(
            "XRP_KRW",
            OrderBook::new(vec![Level::new(99.0, 10.0)], vec![Level::new(100.0, 50.0)]),
        );
        perp.set_book(
            "XRP_USDT",
            OrderBook::new(vec![Level::new(0.07, 50.0)], vec![Level::new(0.071, 50.0)]),
        );

        let markets = RestMarkets {
            domestic,
            spot: None,
            perp,
        };
        let inputs = PriceInputs {
            universe: &universe,
            fees: FEES,
            usdt_krw: 1_400.0,
            notional_krw: 1_000.0,
        };
        let rows = markets.snapshot(inputs, &coins, PricingMode::Vwap, 2, 20, None).await;
        assert_eq!(rows.len(), 1);
        assert!(approx(rows[0].premium_pct, (100.0 - 98.0) / 98.0 * 100.0));
    }
}
