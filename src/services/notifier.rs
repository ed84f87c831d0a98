//! Detects bids that arrived since the previous poll and raises one
//! notification per new bid.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::currency::{Currency, CurrencyConverter};
use crate::models::{resolve_bidder_name, Bid, Bidder, ViewerContext};
use crate::notify::{Notification, NotificationSink};

pub struct BidDeltaNotifier {
    converter: Arc<dyn CurrencyConverter>,
    sink: Arc<dyn NotificationSink>,
    canonical: Currency,
}

impl BidDeltaNotifier {
    pub fn new(converter: Arc<dyn CurrencyConverter>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            converter,
            sink,
            canonical: Currency::canonical(),
        }
    }

    /// Emit one notification per bid in `fresh` whose id is not in
    /// `previous`, in fresh-list order. The viewer's own bids are skipped.
    ///
    /// Conversion is best effort: a failed conversion falls back to the
    /// canonical amount and never blocks the notification. Returns the
    /// number of notifications emitted. The caller replaces its snapshot
    /// with `fresh` unconditionally afterwards, so a bid is never notified
    /// twice.
    pub async fn process(
        &self,
        previous: &[Bid],
        fresh: &[Bid],
        viewer: &ViewerContext,
        poster: &Bidder,
    ) -> usize {
        let seen: HashSet<&str> = previous.iter().map(|b| b.id.as_str()).collect();
        let mut emitted = 0;

        for bid in fresh {
            if seen.contains(bid.id.as_str()) {
                continue;
            }
            if bid.bidder.id == viewer.viewer_id {
                continue;
            }

            let (amount, currency) = match self
                .converter
                .convert(bid.amount, &self.canonical, &viewer.currency)
                .await
            {
                Ok(converted) => (converted.round() as i64, viewer.currency.clone()),
                Err(err) => {
                    debug!(bid = %bid.id, "notification conversion failed: {err}");
                    (bid.amount, self.canonical.clone())
                }
            };

            let bidder = resolve_bidder_name(&bid.bidder, &viewer.viewer_id, poster);
            self.sink
                .notify(Notification::NewBid {
                    bidder,
                    amount,
                    currency,
                })
                .await;
            emitted += 1;
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::FixedRateConverter;
    use crate::error::ConvertError;
    use crate::models::BidderKind;
    use crate::notify::MemorySink;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn bid(id: &str, bidder_id: &str, amount: i64) -> Bid {
        Bid {
            id: id.to_string(),
            bidder: Bidder {
                kind: BidderKind::User,
                id: bidder_id.to_string(),
                display_name: Some(format!("name-{bidder_id}")),
            },
            amount,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn viewer(id: &str) -> ViewerContext {
        ViewerContext {
            viewer_id: id.to_string(),
            kind: BidderKind::User,
            auth_token: Some("token".to_string()),
            currency: Currency::canonical(),
        }
    }

    fn poster() -> Bidder {
        Bidder {
            kind: BidderKind::Vendor,
            id: "v1".to_string(),
            display_name: Some("Lagos Deals".to_string()),
        }
    }

    fn notifier(sink: Arc<MemorySink>) -> BidDeltaNotifier {
        BidDeltaNotifier::new(Arc::new(FixedRateConverter::identity()), sink)
    }

    #[test]
    fn test_new_bid_notified_once() {
        let sink = Arc::new(MemorySink::new());
        let notifier = notifier(sink.clone());
        let viewer = viewer("u1");
        let previous: Vec<Bid> = vec![];
        let fresh = vec![bid("b1", "u2", 1500)];

        let emitted =
            tokio_test::block_on(notifier.process(&previous, &fresh, &viewer, &poster()));
        assert_eq!(emitted, 1);
        let notes = sink.take();
        assert_eq!(
            notes,
            vec![Notification::NewBid {
                bidder: "name-u2".to_string(),
                amount: 1500,
                currency: Currency::canonical(),
            }]
        );

        // Identical poll: zero notifications.
        let emitted = tokio_test::block_on(notifier.process(&fresh, &fresh, &viewer, &poster()));
        assert_eq!(emitted, 0);
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_own_bids_not_notified() {
        let sink = Arc::new(MemorySink::new());
        let notifier = notifier(sink.clone());
        let fresh = vec![bid("b1", "u1", 9999), bid("b2", "u2", 1500)];

        let emitted = tokio_test::block_on(notifier.process(&[], &fresh, &viewer("u1"), &poster()));
        assert_eq!(emitted, 1);
        let notes = sink.take();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message().contains("name-u2"));
    }

    #[test]
    fn test_emission_follows_fresh_list_order() {
        let sink = Arc::new(MemorySink::new());
        let notifier = notifier(sink.clone());
        // Fresh list is not chronological; emission must follow it anyway.
        let fresh = vec![bid("b2", "u3", 1700), bid("b1", "u2", 1500)];

        tokio_test::block_on(notifier.process(&[], &fresh, &viewer("u1"), &poster()));
        let notes = sink.take();
        assert!(notes[0].message().contains("name-u3"));
        assert!(notes[1].message().contains("name-u2"));
    }

    struct AlwaysFails;

    #[async_trait]
    impl CurrencyConverter for AlwaysFails {
        async fn convert(
            &self,
            _amount: i64,
            _from: &Currency,
            _to: &Currency,
        ) -> Result<f64, ConvertError> {
            Err(ConvertError::Lookup("down".to_string()))
        }
    }

    #[test]
    fn test_conversion_failure_does_not_block_notification() {
        let sink = Arc::new(MemorySink::new());
        let notifier = BidDeltaNotifier::new(Arc::new(AlwaysFails), sink.clone());
        let mut viewer = viewer("u1");
        viewer.currency = Currency::new("USD");
        let fresh = vec![bid("b1", "u2", 1500)];

        let emitted = tokio_test::block_on(notifier.process(&[], &fresh, &viewer, &poster()));
        assert_eq!(emitted, 1);
        let notes = sink.take();
        assert_eq!(
            notes[0],
            Notification::NewBid {
                bidder: "name-u2".to_string(),
                amount: 1500,
                currency: Currency::canonical(),
            }
        );
    }
}
