//! In-process marketplace API used by tests and offline development.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::MarketplaceApi;
use crate::error::ApiError;
use crate::models::{Auction, Bid, Bidder, HighestBid};

/// Counts of calls made against the mock, for asserting that validation
/// failures never reach the network.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockCallLog {
    pub reads: usize,
    pub places: usize,
    pub upgrades: usize,
}

impl MockCallLog {
    pub fn writes(&self) -> usize {
        self.places + self.upgrades
    }
}

/// Mock server holding a single auction and a token registry.
///
/// Writes behave like the real server: an unknown token is rejected with
/// "Bidder not found", an accepted bid lands in the auction's bid list and
/// becomes visible on the next read.
#[derive(Default)]
pub struct MockMarketplaceApi {
    auction: Mutex<Option<Auction>>,
    identities: Mutex<Vec<(String, Bidder)>>,
    reject_with: Mutex<Option<String>>,
    calls: Mutex<MockCallLog>,
}

impl MockMarketplaceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_auction(&self, auction: Auction) {
        *self.auction.lock().expect("mock state lock poisoned") = Some(auction);
    }

    /// Register the bidder an auth token resolves to.
    pub fn register_token(&self, token: &str, bidder: Bidder) {
        self.identities
            .lock()
            .expect("mock state lock poisoned")
            .push((token.to_string(), bidder));
    }

    /// Make every write fail with the given server message until cleared.
    pub fn reject_writes_with(&self, message: &str) {
        *self.reject_with.lock().expect("mock state lock poisoned") =
            Some(message.to_string());
    }

    pub fn clear_rejection(&self) {
        *self.reject_with.lock().expect("mock state lock poisoned") = None;
    }

    pub fn call_log(&self) -> MockCallLog {
        self.calls.lock().expect("mock state lock poisoned").clone()
    }

    /// Insert a bid as if another participant placed it server-side.
    /// Returns the new bid's id.
    pub fn push_external_bid(&self, bidder: Bidder, amount: i64) -> String {
        let id = Uuid::new_v4().to_string();
        let mut guard = self.auction.lock().expect("mock state lock poisoned");
        let auction = guard.as_mut().expect("no auction configured");
        auction.bids.push(Bid {
            id: id.clone(),
            bidder: bidder.clone(),
            amount,
            created_at: Utc::now(),
        });
        refresh_highest(auction);
        id
    }

    fn resolve_token(&self, token: &str) -> Option<Bidder> {
        self.identities
            .lock()
            .expect("mock state lock poisoned")
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, bidder)| bidder.clone())
    }

    fn apply_bid(
        &self,
        auction_id: &str,
        amount: i64,
        token: &str,
        update: bool,
    ) -> Result<(), ApiError> {
        if let Some(message) = self
            .reject_with
            .lock()
            .expect("mock state lock poisoned")
            .clone()
        {
            return Err(ApiError::Rejected { message });
        }

        let bidder = self.resolve_token(token).ok_or_else(|| ApiError::Rejected {
            message: "Bidder not found".to_string(),
        })?;

        let mut guard = self.auction.lock().expect("mock state lock poisoned");
        let auction = guard.as_mut().filter(|a| a.id == auction_id).ok_or_else(|| {
            ApiError::NotFound {
                auction_id: auction_id.to_string(),
            }
        })?;

        if update {
            match auction.bids.iter_mut().find(|b| b.bidder.id == bidder.id) {
                Some(existing) => {
                    existing.amount = amount;
                    existing.created_at = Utc::now();
                }
                None => {
                    return Err(ApiError::Rejected {
                        message: "No existing bid to update".to_string(),
                    })
                }
            }
        } else {
            auction.bids.push(Bid {
                id: Uuid::new_v4().to_string(),
                bidder,
                amount,
                created_at: Utc::now(),
            });
        }
        refresh_highest(auction);
        Ok(())
    }
}

fn refresh_highest(auction: &mut Auction) {
    auction.highest_bid = auction
        .bids
        .iter()
        .max_by_key(|b| b.amount)
        .map(|b| HighestBid {
            bidder: b.bidder.clone(),
            amount: b.amount,
        });
}

#[async_trait]
impl MarketplaceApi for MockMarketplaceApi {
    async fn get_auction_by_id(&self, id: &str) -> Result<Auction, ApiError> {
        self.calls.lock().expect("mock state lock poisoned").reads += 1;
        self.auction
            .lock()
            .expect("mock state lock poisoned")
            .clone()
            .filter(|a| a.id == id)
            .ok_or_else(|| ApiError::NotFound {
                auction_id: id.to_string(),
            })
    }

    async fn place_bid(
        &self,
        auction_id: &str,
        amount: i64,
        token: &str,
    ) -> Result<(), ApiError> {
        self.calls.lock().expect("mock state lock poisoned").places += 1;
        self.apply_bid(auction_id, amount, token, false)
    }

    async fn upgrade_bid(
        &self,
        auction_id: &str,
        amount: i64,
        token: &str,
    ) -> Result<(), ApiError> {
        self.calls.lock().expect("mock state lock poisoned").upgrades += 1;
        self.apply_bid(auction_id, amount, token, true)
    }
}
