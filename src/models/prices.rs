//! Display prices derived from an auction snapshot.

use std::collections::HashMap;

use crate::currency::Currency;

/// Display-currency amounts added on top of the minimum next bid for the
/// quick-bid shortcuts.
pub const QUICK_BID_STEPS: [i64; 3] = [0, 500, 1000];

/// Every displayed amount for one auction, all in the same currency.
///
/// Recomputed wholesale whenever the auction snapshot or the target currency
/// changes; never persisted. On conversion failure the whole value falls
/// back to canonical amounts and `currency` names the canonical currency, so
/// a renderer never mixes currencies.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayPrices {
    pub current_bid: i64,
    pub starting_price: i64,
    /// Minimum acceptable next bid, derived from the canonical current bid
    /// plus the fixed increment before conversion.
    pub next_bid: i64,
    /// Converted amount per historical bid id.
    pub bids: HashMap<String, i64>,
    pub currency: Currency,
}

impl DisplayPrices {
    pub fn bid_amount(&self, bid_id: &str) -> Option<i64> {
        self.bids.get(bid_id).copied()
    }

    /// Quick-bid shortcut amounts.
    pub fn quick_bids(&self) -> [i64; 3] {
        QUICK_BID_STEPS.map(|step| self.next_bid + step)
    }
}
