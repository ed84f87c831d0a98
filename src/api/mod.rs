//! Marketplace API surface: read/write contracts plus the HTTP and
//! in-process implementations.

mod http;
mod mock;

pub use http::HttpMarketplaceApi;
pub use mock::{MockCallLog, MockMarketplaceApi};

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::Auction;

/// Remote marketplace contract. The server owns every auction; the client
/// only reads snapshots and submits bids.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Fetch the full auction record. The snapshot replaces any locally
    /// held copy wholesale; the server is eventually consistent and may
    /// return state older than a write the client just confirmed.
    async fn get_auction_by_id(&self, id: &str) -> Result<Auction, ApiError>;

    /// Place a first bid. Amount is in canonical currency units.
    async fn place_bid(&self, auction_id: &str, amount: i64, token: &str)
        -> Result<(), ApiError>;

    /// Raise an existing bid. Amount is in canonical currency units.
    async fn upgrade_bid(&self, auction_id: &str, amount: i64, token: &str)
        -> Result<(), ApiError>;
}
