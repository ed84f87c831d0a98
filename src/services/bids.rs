//! Bid submission: local validation, mode selection, and the server call.

use std::sync::Arc;

use tracing::info;

use crate::api::MarketplaceApi;
use crate::currency::{Currency, CurrencyConverter};
use crate::error::{ApiError, BidError};
use crate::models::{Auction, Bid, DisplayPrices, ViewerContext};
use crate::notify::{Notification, NotificationSink};

/// Whether a submission places a first bid or raises an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidMode {
    Place,
    Update,
}

/// UPDATE iff the viewer already has a bid on the auction.
pub fn select_mode(viewer_id: &str, bids: &[Bid]) -> BidMode {
    if bids.iter().any(|b| b.bidder.id == viewer_id) {
        BidMode::Update
    } else {
        BidMode::Place
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BidRequest {
    /// Proposed amount in the viewer's display currency.
    pub amount: i64,
    /// Explicit confirmation; required when updating an existing bid.
    pub confirmed_update: bool,
}

pub struct BidController {
    api: Arc<dyn MarketplaceApi>,
    converter: Arc<dyn CurrencyConverter>,
    sink: Arc<dyn NotificationSink>,
    canonical: Currency,
}

impl BidController {
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        converter: Arc<dyn CurrencyConverter>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            api,
            converter,
            sink,
            canonical: Currency::canonical(),
        }
    }

    /// Validate and submit a bid.
    ///
    /// Every validation failure short-circuits before any network call.
    /// Local state is never changed optimistically: on success the caller
    /// issues a fresh read immediately so the view reflects the confirmed
    /// write. Quick-bid shortcut amounts go through this same path.
    pub async fn submit(
        &self,
        auction: &Auction,
        prices: &DisplayPrices,
        viewer: &ViewerContext,
        request: BidRequest,
    ) -> Result<BidMode, BidError> {
        let token = viewer
            .auth_token
            .as_deref()
            .ok_or(BidError::NotAuthenticated)?;
        if auction.is_poster(&viewer.viewer_id) {
            return Err(BidError::OwnAuction);
        }
        if request.amount < prices.next_bid {
            return Err(BidError::BelowMinimum {
                minimum: prices.next_bid,
                currency: prices.currency.clone(),
            });
        }
        let mode = select_mode(&viewer.viewer_id, &auction.bids);
        if mode == BidMode::Update && !request.confirmed_update {
            return Err(BidError::ConfirmationRequired);
        }

        let canonical_amount = self
            .converter
            .convert(request.amount, &prices.currency, &self.canonical)
            .await?
            .round() as i64;

        let result = match mode {
            BidMode::Place => self.api.place_bid(&auction.id, canonical_amount, token).await,
            BidMode::Update => {
                self.api
                    .upgrade_bid(&auction.id, canonical_amount, token)
                    .await
            }
        };

        match result {
            Ok(()) => {
                info!(
                    auction = %auction.id,
                    amount = canonical_amount,
                    ?mode,
                    "bid accepted"
                );
                // Success toast carries the display-currency amount the
                // viewer typed, not the canonical one.
                self.sink
                    .notify(Notification::BidAccepted {
                        amount: request.amount,
                        currency: prices.currency.clone(),
                        mode,
                    })
                    .await;
                Ok(mode)
            }
            Err(err) => Err(translate_rejection(err, mode)),
        }
    }
}

/// Map server-side rejections onto user-facing errors. A "bidder not found"
/// rejection means the session references a stale account, so the user is
/// told to sign in again; other structured rejections surface verbatim and
/// everything else collapses to a generic retry message.
fn translate_rejection(err: ApiError, mode: BidMode) -> BidError {
    match err {
        ApiError::Rejected { ref message }
            if message.to_ascii_lowercase().contains("bidder not found") =>
        {
            BidError::ReauthenticationRequired
        }
        ApiError::Rejected { .. } => BidError::Api(err),
        _ => BidError::SubmitFailed {
            action: match mode {
                BidMode::Place => "place",
                BidMode::Update => "update",
            },
        },
    }
}
