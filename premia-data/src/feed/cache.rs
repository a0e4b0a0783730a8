use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use super::connector::QuoteUpdate;
use crate::{
    assets::quote::Quote,
    shared::utils::{is_positive, Clock},
};

pub const DEFAULT_STALE_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, Default)]
struct CachedQuote {
    bid: Option<f64>,
    ask: Option<f64>,
    updated_ms: u64,
}

/*----- */
// Quote cache
/*----- */
// Best bid/ask per venue market id. Written only by the feed's updater task,
// read by any number of watch loops.
#[derive(Debug)]
pub struct QuoteCache {
    quotes: RwLock<HashMap<String, CachedQuote>>,
    stale_ms: u64,
    clock: Arc<dyn Clock>,
}

impl QuoteCache {
    pub fn new(stale_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
            stale_ms,
            clock,
        }
    }

    pub fn stale_ms(&self) -> u64 {
        self.stale_ms
    }

    // A side missing from the update keeps its previous value.
    pub fn apply(&self, update: &QuoteUpdate) {
        let now = self.clock.now_ms();
        let mut quotes = self.quotes.write();
        let entry = quotes.entry(update.symbol.clone()).or_default();

        if let Some(bid) = update.bid.filter(|bid| is_positive(*bid)) {
            entry.bid = Some(bid);
        }
        if let Some(ask) = update.ask.filter(|ask| is_positive(*ask)) {
            entry.ask = Some(ask);
        }
        entry.updated_ms = now;
    }

    /// Absent when never updated, older than the staleness threshold, or one sided.
    pub fn get_quote(&self, symbol: &str) -> Option<Quote> {
        let now = self.clock.now_ms();
        let quotes = self.quotes.read();
        let cached = quotes.get(symbol)?;

        if now.saturating_sub(cached.updated_ms) > self.stale_ms {
            return None;
        }

        Quote::new(cached.bid?, cached.ask?).validated()
    }

    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
