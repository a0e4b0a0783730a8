pub mod fill;

use serde::{Deserialize, Serialize};

use crate::assets::{level::Level, quote::Quote};

/*----- */
// Order book
/*----- */
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OrderBook {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl Serialize for Level {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (self.price, self.size).serialize(serializer)
    }
}

impl OrderBook {
    pub fn new(bids: Vec<Level>, asks: Vec<Level>) -> Self {
        Self { bids, asks }
    }

    /// Drop invalid levels and sort both sides best first.
    pub fn normalized(self) -> Self {
        Self {
            bids: normalize_bids(&self.bids),
            asks: normalize_asks(&self.asks),
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        best_bid(&self.bids)
    }

    pub fn best_ask(&self) -> Option<f64> {
        best_ask(&self.asks)
    }

    pub fn top_of_book(&self) -> Option<Quote> {
        Quote::new(self.best_bid()?, self.best_ask()?).validated()
    }
}

pub fn valid_levels(levels: &[Level]) -> Vec<Level> {
    levels.iter().copied().filter(Level::is_valid).collect()
}

/// Valid asks, lowest price first.
pub fn normalize_asks(levels: &[Level]) -> Vec<Level> {
    let mut asks = valid_levels(levels);
    asks.sort_by(|a, b| a.price.total_cmp(&b.price));
    asks
}

/// Valid bids, highest price first.
pub fn normalize_bids(levels: &[Level]) -> Vec<Level> {
    let mut bids = valid_levels(levels);
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));
    bids
}

pub fn best_bid(bids: &[Level]) -> Option<f64> {
    valid_levels(bids)
        .into_iter()
        .map(|level| level.price)
        .max_by(f64::total_cmp)
}

pub fn best_ask(asks: &[Level]) -> Option<f64> {
    valid_levels(asks)
        .into_iter()
        .map(|level| level.price)
        .min_by(f64::total_cmp)
}

/// `(ask - bid) / mid * 100` of the top of book.
pub fn spread_pct(book: &OrderBook) -> Option<f64> {
    let bid = book.best_bid()?;
    let ask = book.best_ask()?;
    let mid = (bid + ask) / 2.0;
    (mid > 0.0).then(|| (ask - bid) / mid * 100.0)
}

/// VWAP bid and ask for selling and buying `base_qty`.
pub fn quote_from_order_book(book: &OrderBook, base_qty: f64) -> Option<Quote> {
    let bid = fill::fill_from_base_qty(&normalize_bids(&book.bids), base_qty)?;
    let ask = fill::fill_from_base_qty(&normalize_asks(&book.asks), base_qty)?;
    Quote::new(bid, ask).validated()
}
