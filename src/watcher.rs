//! Orchestration for a single watched auction: polling, countdown ticking,
//! bid-delta notification, and bid submission.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};

use crate::api::MarketplaceApi;
use crate::config::{RetryConfig, WatchConfig};
use crate::currency::CurrencyConverter;
use crate::error::{ApiError, BidError, WatchError};
use crate::models::{Auction, Bid, DisplayPrices, ViewerContext};
use crate::notify::{Notification, NotificationSink};
use crate::services::bids::{BidController, BidMode, BidRequest};
use crate::services::countdown::{compute_time_left, TimeLeft};
use crate::services::notifier::BidDeltaNotifier;
use crate::services::prices::PriceReconciler;

/// The latest fully reconciled view of the watched auction.
#[derive(Debug, Clone)]
pub struct AuctionView {
    pub auction: Auction,
    pub prices: DisplayPrices,
    pub time_left: TimeLeft,
}

/// Owns all client-side auction state and drives the two timers.
///
/// State is confined to this value: dropping the `run` future (or the
/// watcher itself) cancels the timers and any in-flight read, so nothing
/// can write state after teardown.
pub struct AuctionWatcher {
    api: Arc<dyn MarketplaceApi>,
    reconciler: PriceReconciler,
    notifier: BidDeltaNotifier,
    controller: BidController,
    sink: Arc<dyn NotificationSink>,
    viewer: ViewerContext,
    auction_id: String,
    poll_interval: Duration,
    tick_interval: Duration,
    retry: RetryConfig,

    auction: Option<Auction>,
    previous_bids: Vec<Bid>,
    prices: Option<DisplayPrices>,
    time_left: TimeLeft,
    // Reads are sequence-stamped at issue time; responses older than the
    // last applied one are discarded instead of racing last-write-wins.
    issued_seq: u64,
    applied_seq: u64,

    view_tx: watch::Sender<Option<AuctionView>>,
    view_rx: watch::Receiver<Option<AuctionView>>,
}

impl AuctionWatcher {
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        converter: Arc<dyn CurrencyConverter>,
        sink: Arc<dyn NotificationSink>,
        viewer: ViewerContext,
        auction_id: &str,
        config: &WatchConfig,
    ) -> Self {
        let (view_tx, view_rx) = watch::channel(None);
        Self {
            reconciler: PriceReconciler::new(converter.clone())
                .with_increment(config.watcher.bid_increment),
            notifier: BidDeltaNotifier::new(converter.clone(), sink.clone()),
            controller: BidController::new(api.clone(), converter, sink.clone()),
            api,
            sink,
            viewer,
            auction_id: auction_id.to_string(),
            poll_interval: Duration::from_secs(config.watcher.poll_interval_secs),
            tick_interval: Duration::from_secs(config.watcher.tick_interval_secs),
            retry: config.retry.clone(),
            auction: None,
            previous_bids: Vec::new(),
            prices: None,
            time_left: TimeLeft::ZERO,
            issued_seq: 0,
            applied_seq: 0,
            view_tx,
            view_rx,
        }
    }

    /// Receiver for the latest reconciled view; embedders render from this
    /// without owning the loop.
    pub fn view(&self) -> watch::Receiver<Option<AuctionView>> {
        self.view_rx.clone()
    }

    pub fn current_view(&self) -> Option<AuctionView> {
        self.view_rx.borrow().clone()
    }

    pub fn time_left(&self) -> TimeLeft {
        self.time_left
    }

    /// Terminal only once a loaded snapshot's countdown reached zero.
    pub fn is_ended(&self) -> bool {
        self.auction.is_some() && self.time_left.is_ended()
    }

    pub fn quick_bids(&self) -> Option<[i64; 3]> {
        self.prices.as_ref().map(DisplayPrices::quick_bids)
    }

    /// First read. A failure here is fatal and polling never starts; the
    /// embedder shows its full-section error with a retry action.
    pub async fn load_initial(&mut self) -> Result<(), WatchError> {
        let seq = self.next_seq();
        let auction = self.api.get_auction_by_id(&self.auction_id).await?;
        self.apply_snapshot(seq, auction).await;
        Ok(())
    }

    /// One poll cycle: fetch with bounded retries, then apply. Failures are
    /// logged and the watcher stays alive for the next cycle.
    pub async fn poll_once(&mut self) {
        let seq = self.next_seq();
        match self.fetch_with_retry().await {
            Ok(auction) => self.apply_snapshot(seq, auction).await,
            Err(err) => warn!(auction = %self.auction_id, "poll failed: {err}"),
        }
    }

    /// One countdown tick: recompute remaining time from the cached end
    /// date and republish.
    pub fn tick(&mut self) {
        if let Some(auction) = &self.auction {
            self.time_left = compute_time_left(auction.auction_end_date, Utc::now());
            self.publish();
        }
    }

    /// Validate and submit a bid, then immediately refresh out of band so
    /// the view reflects the accepted write without waiting for the next
    /// poll. Failures surface as an error notification and reset the
    /// controller to ready; local state never changes optimistically.
    pub async fn submit_bid(
        &mut self,
        amount: i64,
        confirmed_update: bool,
    ) -> Result<BidMode, BidError> {
        let result = self.try_submit(amount, confirmed_update).await;
        match result {
            Ok(mode) => {
                self.poll_once().await;
                Ok(mode)
            }
            Err(err) => {
                self.sink
                    .notify(Notification::Error {
                        message: err.to_string(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    async fn try_submit(&self, amount: i64, confirmed_update: bool) -> Result<BidMode, BidError> {
        if self.is_ended() {
            return Err(BidError::AuctionEnded);
        }
        let (Some(auction), Some(prices)) = (&self.auction, &self.prices) else {
            return Err(BidError::NotLoaded);
        };
        self.controller
            .submit(
                auction,
                prices,
                &self.viewer,
                BidRequest {
                    amount,
                    confirmed_update,
                },
            )
            .await
    }

    /// Drive the poll and countdown timers until the auction reaches
    /// terminal state. Terminal is re-evaluated on the fresh countdown after
    /// every applied snapshot and every tick, before the next poll is
    /// scheduled, so an ended auction never receives another poll.
    pub async fn run(&mut self) -> Result<(), WatchError> {
        if self.auction.is_none() {
            self.load_initial().await?;
        }
        info!(auction = %self.auction_id, "watching auction");

        let mut poll = interval(self.poll_interval);
        let mut tick = interval(self.tick_interval);
        // Both intervals fire immediately; the initial load already applied
        // a snapshot, so consume the first tick of each.
        poll.tick().await;
        tick.tick().await;

        while !self.is_ended() {
            tokio::select! {
                _ = poll.tick() => self.poll_once().await,
                _ = tick.tick() => self.tick(),
            }
        }

        info!(auction = %self.auction_id, "auction ended, polling stopped");
        Ok(())
    }

    fn next_seq(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    async fn fetch_with_retry(&self) -> Result<Auction, ApiError> {
        let mut attempt = 0;
        loop {
            match self.api.get_auction_by_id(&self.auction_id).await {
                Ok(auction) => return Ok(auction),
                // Not transient; retrying a missing auction is pointless.
                Err(err @ ApiError::NotFound { .. }) => return Err(err),
                Err(err) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(
                        auction = %self.auction_id,
                        attempt,
                        "read failed: {err}; retrying in {delay}ms"
                    );
                    sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Apply a fetched snapshot in the required order: diff against the
    /// previous bids (notify), replace the snapshot, swap the auction
    /// state, recompute the countdown from the server end date, reconcile
    /// display prices. The very first snapshot seeds silently: there is
    /// nothing to diff against yet.
    async fn apply_snapshot(&mut self, seq: u64, auction: Auction) {
        if seq <= self.applied_seq {
            debug!(seq, applied = self.applied_seq, "discarding stale read");
            return;
        }
        self.applied_seq = seq;

        if self.auction.is_some() {
            self.notifier
                .process(&self.previous_bids, &auction.bids, &self.viewer, &auction.poster)
                .await;
        }
        self.previous_bids = auction.bids.clone();
        self.time_left = compute_time_left(auction.auction_end_date, Utc::now());
        let prices = self
            .reconciler
            .reconcile(&auction, &self.viewer.currency)
            .await;
        self.prices = Some(prices);
        self.auction = Some(auction);
        self.publish();
    }

    fn publish(&self) {
        if let (Some(auction), Some(prices)) = (&self.auction, &self.prices) {
            let _ = self.view_tx.send(Some(AuctionView {
                auction: auction.clone(),
                prices: prices.clone(),
                time_left: self.time_left,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketplaceApi;
    use crate::currency::{Currency, FixedRateConverter};
    use crate::models::{Bidder, BidderKind};
    use crate::notify::MemorySink;
    use chrono::Duration as ChronoDuration;

    fn vendor(id: &str) -> Bidder {
        Bidder {
            kind: BidderKind::Vendor,
            id: id.to_string(),
            display_name: Some("Store".to_string()),
        }
    }

    fn open_auction(id: &str) -> Auction {
        Auction {
            id: id.to_string(),
            highest_bid: None,
            starting_price: 1000,
            reserve_price: 2000,
            bids: Vec::new(),
            auction_end_date: Utc::now() + ChronoDuration::hours(1),
            poster: vendor("v1"),
            verified: false,
        }
    }

    fn watcher_for(api: Arc<MockMarketplaceApi>, sink: Arc<MemorySink>) -> AuctionWatcher {
        let viewer = ViewerContext {
            viewer_id: "u1".to_string(),
            kind: BidderKind::User,
            auth_token: Some("t1".to_string()),
            currency: Currency::canonical(),
        };
        AuctionWatcher::new(
            api,
            Arc::new(FixedRateConverter::identity()),
            sink,
            viewer,
            "a1",
            &WatchConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_stale_read_discarded() {
        let api = Arc::new(MockMarketplaceApi::new());
        api.set_auction(open_auction("a1"));
        let sink = Arc::new(MemorySink::new());
        let mut watcher = watcher_for(api.clone(), sink);
        watcher.load_initial().await.unwrap();

        // A read issued before the applied one arrives late: it must not
        // clobber the newer state.
        let old_seq = watcher.applied_seq;
        let mut stale = open_auction("a1");
        stale.starting_price = 1;
        watcher.apply_snapshot(old_seq, stale).await;

        let view = watcher.current_view().unwrap();
        assert_eq!(view.auction.starting_price, 1000);
        assert_eq!(watcher.applied_seq, old_seq);
    }

    #[tokio::test]
    async fn test_newer_read_applies() {
        let api = Arc::new(MockMarketplaceApi::new());
        api.set_auction(open_auction("a1"));
        let sink = Arc::new(MemorySink::new());
        let mut watcher = watcher_for(api.clone(), sink);
        watcher.load_initial().await.unwrap();

        let seq = watcher.next_seq();
        let mut fresher = open_auction("a1");
        fresher.starting_price = 1100;
        watcher.apply_snapshot(seq, fresher).await;

        let view = watcher.current_view().unwrap();
        assert_eq!(view.auction.starting_price, 1100);
    }

    #[tokio::test]
    async fn test_ended_before_load_is_not_terminal() {
        let api = Arc::new(MockMarketplaceApi::new());
        api.set_auction(open_auction("a1"));
        let sink = Arc::new(MemorySink::new());
        let watcher = watcher_for(api, sink);
        // No snapshot yet: the zero countdown must not read as ended.
        assert!(!watcher.is_ended());
    }
}
