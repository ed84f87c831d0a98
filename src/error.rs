//! Centralized error types for the auction watcher.

use thiserror::Error;

use crate::currency::{format_price, Currency};

/// Errors from the marketplace read/write API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Auction {auction_id} not found")]
    NotFound { auction_id: String },

    /// Structured server rejection; the message is surfaced to the user
    /// verbatim.
    #[error("{message}")]
    Rejected { message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// Errors from the currency conversion service.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("No exchange rate for {currency}")]
    RateUnavailable { currency: String },

    #[error("Rate lookup failed: {0}")]
    Lookup(String),
}

impl From<reqwest::Error> for ConvertError {
    fn from(err: reqwest::Error) -> Self {
        ConvertError::Lookup(err.to_string())
    }
}

/// Bid submission failures. Validation variants are raised locally before
/// any network call is made.
#[derive(Error, Debug)]
pub enum BidError {
    #[error("You must be signed in to place a bid")]
    NotAuthenticated,

    #[error("You cannot bid on your own auction")]
    OwnAuction,

    #[error("Bid must be at least {}", minimum_text(.minimum, .currency))]
    BelowMinimum { minimum: i64, currency: Currency },

    #[error("Confirm the update to your existing bid before submitting")]
    ConfirmationRequired,

    #[error("This auction has ended")]
    AuctionEnded,

    #[error("Auction is not loaded yet")]
    NotLoaded,

    /// Translation of the server's "bidder not found" rejection.
    #[error("Your session is out of date, please sign in again")]
    ReauthenticationRequired,

    #[error("Failed to {action} bid, please try again")]
    SubmitFailed { action: &'static str },

    #[error("Could not convert bid amount: {0}")]
    Conversion(#[from] ConvertError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

fn minimum_text(minimum: &i64, currency: &Currency) -> String {
    format!("{}{}", currency.symbol(), format_price(*minimum))
}

/// Umbrella error for the watcher orchestration.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Bid(#[from] BidError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
