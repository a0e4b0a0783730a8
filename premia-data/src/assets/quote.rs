use serde::{Deserialize, Serialize};

use crate::shared::utils::is_positive;

/*----- */
// Quote
/*----- */
// Best bid and ask for one market. Only handed to callers when both sides are
// positive, see `QuoteCache::get_quote`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self { bid, ask }
    }

    pub fn is_valid(&self) -> bool {
        is_positive(self.bid) && is_positive(self.ask)
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Keep the quote only if both sides are usable.
    pub fn validated(self) -> Option<Self> {
        self.is_valid().then_some(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_quote_validity() {
        assert_eq!(Quote::new(99.0, 101.0).validated().map(|q| q.mid()), Some(100.0));
        assert!(Quote::new(0.0, 101.0).validated().is_none());
        assert!(Quote::new(99.0, f64::NAN).validated().is_none());
    }
}
