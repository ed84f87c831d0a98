//! Auction aggregate and bidder identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::Currency;

/// Which collection a bidder reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidderKind {
    User,
    Vendor,
}

/// Bidder reference, resolved from the wire's polymorphic shape once at the
/// ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bidder {
    pub kind: BidderKind,
    pub id: String,
    /// Stored display name (store name for vendors) when the server expanded
    /// the reference.
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighestBid {
    pub bidder: Bidder,
    /// Canonical currency, integer minor-unit-free.
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub bidder: Bidder,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Server-owned auction snapshot. The client never merges fields: every
/// successful read replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: String,
    /// Absent when no bids exist.
    pub highest_bid: Option<HighestBid>,
    pub starting_price: i64,
    pub reserve_price: i64,
    /// Insertion order from the server; not guaranteed sorted.
    pub bids: Vec<Bid>,
    pub auction_end_date: DateTime<Utc>,
    pub poster: Bidder,
    pub verified: bool,
}

impl Auction {
    /// Highest bid amount in canonical units, or the starting price when no
    /// bids exist.
    pub fn current_bid_canonical(&self) -> i64 {
        self.highest_bid
            .as_ref()
            .map(|b| b.amount)
            .unwrap_or(self.starting_price)
    }

    pub fn is_poster(&self, viewer_id: &str) -> bool {
        self.poster.id == viewer_id
    }
}

pub const ANONYMOUS_BIDDER: &str = "Anonymous Bidder";

/// Resolve the display name for a bid's author.
///
/// Priority: the viewer sees their own bids as "You"; the poster's bids show
/// the store name; anyone else shows their stored display name. Total:
/// always yields a string.
pub fn resolve_bidder_name(bidder: &Bidder, viewer_id: &str, poster: &Bidder) -> String {
    if bidder.id == viewer_id {
        return "You".to_string();
    }
    if bidder.id == poster.id {
        return poster
            .display_name
            .as_deref()
            .or(bidder.display_name.as_deref())
            .unwrap_or(ANONYMOUS_BIDDER)
            .to_string();
    }
    bidder
        .display_name
        .clone()
        .unwrap_or_else(|| ANONYMOUS_BIDDER.to_string())
}

/// Who is looking at the auction. Passed into the core explicitly so it can
/// be tested in isolation; there is no global identity state.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub viewer_id: String,
    pub kind: BidderKind,
    pub auth_token: Option<String>,
    /// Currency every amount is converted into for display.
    pub currency: Currency,
}
