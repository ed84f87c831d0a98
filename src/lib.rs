//! bidstream: live auction monitoring and bidding against the marketplace
//! API.
//!
//! The watcher polls one auction, reconciles every amount into the viewer's
//! display currency, raises a notification for each newly arrived bid,
//! drives the countdown clock, and validates and submits bids.

pub mod api;
pub mod config;
pub mod currency;
pub mod error;
pub mod models;
pub mod notify;
pub mod services;
pub mod watcher;

// Re-export commonly used types
pub use config::WatchConfig;
pub use currency::{Currency, CurrencyConverter, FixedRateConverter};
pub use error::{ApiError, BidError, ConvertError, WatchError};
pub use models::{Auction, Bid, Bidder, BidderKind, DisplayPrices, ViewerContext};
pub use services::bids::{select_mode, BidMode};
pub use services::countdown::{compute_time_left, TimeLeft};
pub use watcher::{AuctionView, AuctionWatcher};
