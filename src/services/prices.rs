//! Price reconciliation between canonical and display currencies.

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::currency::{Currency, CurrencyConverter};
use crate::error::ConvertError;
use crate::models::{Auction, DisplayPrices};

/// Canonical-unit increment between the current bid and the minimum
/// acceptable next bid.
pub const BID_INCREMENT: i64 = 250;

/// Converts every displayed quantity of an auction into the viewer's
/// currency, concurrently, with an all-or-nothing fallback.
pub struct PriceReconciler {
    converter: Arc<dyn CurrencyConverter>,
    canonical: Currency,
    increment: i64,
}

impl PriceReconciler {
    pub fn new(converter: Arc<dyn CurrencyConverter>) -> Self {
        Self {
            converter,
            canonical: Currency::canonical(),
            increment: BID_INCREMENT,
        }
    }

    pub fn with_increment(mut self, increment: i64) -> Self {
        self.increment = increment;
        self
    }

    /// Convert the current bid, starting price, minimum next bid, and every
    /// historical bid into `target`, all in flight at once.
    ///
    /// The next bid derives from the canonical current bid plus the fixed
    /// increment before conversion, so it cannot drift with conversion
    /// timing. If any single conversion fails the whole result degrades to
    /// canonical amounts; the consumer never observes a partial mix.
    pub async fn reconcile(&self, auction: &Auction, target: &Currency) -> DisplayPrices {
        let current = auction.current_bid_canonical();
        let starting = auction.starting_price;
        let next = current + self.increment;

        let mut conversions = vec![
            self.convert_rounded(current, target),
            self.convert_rounded(starting, target),
            self.convert_rounded(next, target),
        ];
        for bid in &auction.bids {
            conversions.push(self.convert_rounded(bid.amount, target));
        }

        let results = join_all(conversions).await;
        let mut amounts = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(amount) => amounts.push(amount),
                Err(err) => {
                    debug!(
                        auction = %auction.id,
                        "conversion failed, falling back to canonical amounts: {err}"
                    );
                    return self.canonical_fallback(auction, current, starting, next);
                }
            }
        }

        let bids = auction
            .bids
            .iter()
            .zip(amounts[3..].iter())
            .map(|(bid, &amount)| (bid.id.clone(), amount))
            .collect();

        DisplayPrices {
            current_bid: amounts[0],
            starting_price: amounts[1],
            next_bid: amounts[2],
            bids,
            currency: target.clone(),
        }
    }

    async fn convert_rounded(&self, amount: i64, target: &Currency) -> Result<i64, ConvertError> {
        let converted = self
            .converter
            .convert(amount, &self.canonical, target)
            .await?;
        Ok(converted.round() as i64)
    }

    fn canonical_fallback(
        &self,
        auction: &Auction,
        current: i64,
        starting: i64,
        next: i64,
    ) -> DisplayPrices {
        DisplayPrices {
            current_bid: current,
            starting_price: starting,
            next_bid: next,
            bids: auction
                .bids
                .iter()
                .map(|b| (b.id.clone(), b.amount))
                .collect(),
            currency: self.canonical.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::FixedRateConverter;
    use crate::models::{Bid, Bidder, BidderKind};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn bidder(id: &str) -> Bidder {
        Bidder {
            kind: BidderKind::User,
            id: id.to_string(),
            display_name: None,
        }
    }

    fn auction_with_bids(starting_price: i64, amounts: &[i64]) -> Auction {
        let bids: Vec<Bid> = amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| Bid {
                id: format!("b{i}"),
                bidder: bidder(&format!("u{i}")),
                amount,
                created_at: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
            })
            .collect();
        let highest_bid = bids.iter().max_by_key(|b| b.amount).map(|b| {
            crate::models::HighestBid {
                bidder: b.bidder.clone(),
                amount: b.amount,
            }
        });
        Auction {
            id: "a1".to_string(),
            highest_bid,
            starting_price,
            reserve_price: starting_price,
            bids,
            auction_end_date: Utc.timestamp_opt(1_800_000_000, 0).unwrap(),
            poster: Bidder {
                kind: BidderKind::Vendor,
                id: "v1".to_string(),
                display_name: Some("Lagos Deals".to_string()),
            },
            verified: false,
        }
    }

    /// Converter that fails for one specific amount and doubles the rest.
    struct FailOn {
        amount: i64,
    }

    #[async_trait]
    impl CurrencyConverter for FailOn {
        async fn convert(
            &self,
            amount: i64,
            _from: &Currency,
            _to: &Currency,
        ) -> Result<f64, ConvertError> {
            if amount == self.amount {
                return Err(ConvertError::RateUnavailable {
                    currency: "USD".to_string(),
                });
            }
            Ok(amount as f64 * 2.0)
        }
    }

    #[test]
    fn test_identity_reconciliation_no_bids() {
        let reconciler = PriceReconciler::new(Arc::new(FixedRateConverter::identity()));
        let auction = auction_with_bids(1000, &[]);
        let prices =
            tokio_test::block_on(reconciler.reconcile(&auction, &Currency::canonical()));
        assert_eq!(prices.current_bid, 1000);
        assert_eq!(prices.starting_price, 1000);
        assert_eq!(prices.next_bid, 1250);
        assert!(prices.bids.is_empty());
        assert_eq!(prices.currency, Currency::canonical());
    }

    #[test]
    fn test_highest_bid_drives_current_and_next() {
        let reconciler = PriceReconciler::new(Arc::new(FixedRateConverter::identity()));
        let auction = auction_with_bids(1000, &[1500, 1250]);
        let prices =
            tokio_test::block_on(reconciler.reconcile(&auction, &Currency::canonical()));
        assert_eq!(prices.current_bid, 1500);
        assert_eq!(prices.next_bid, 1750);
        assert_eq!(prices.bid_amount("b0"), Some(1500));
        assert_eq!(prices.bid_amount("b1"), Some(1250));
    }

    #[test]
    fn test_single_failure_degrades_everything() {
        // Fails only for the next-bid amount; every quantity must fall back.
        let auction = auction_with_bids(1000, &[]);
        let reconciler = PriceReconciler::new(Arc::new(FailOn { amount: 1250 }));
        let prices = tokio_test::block_on(reconciler.reconcile(&auction, &Currency::new("USD")));
        assert_eq!(prices.current_bid, 1000);
        assert_eq!(prices.starting_price, 1000);
        assert_eq!(prices.next_bid, 1250);
        assert_eq!(prices.currency, Currency::canonical());
    }

    #[test]
    fn test_bid_history_failure_also_degrades_headline_prices() {
        let auction = auction_with_bids(1000, &[1500, 1300]);
        let reconciler = PriceReconciler::new(Arc::new(FailOn { amount: 1300 }));
        let prices = tokio_test::block_on(reconciler.reconcile(&auction, &Currency::new("USD")));
        assert_eq!(prices.current_bid, 1500);
        assert_eq!(prices.next_bid, 1750);
        assert_eq!(prices.bid_amount("b0"), Some(1500));
        assert_eq!(prices.bid_amount("b1"), Some(1300));
        assert_eq!(prices.currency, Currency::canonical());
    }

    #[test]
    fn test_converted_amounts_round_to_nearest_integer() {
        let converter = FixedRateConverter::identity().with_rate("USD", 0.001);
        let reconciler = PriceReconciler::new(Arc::new(converter));
        let auction = auction_with_bids(1000, &[]);
        let prices = tokio_test::block_on(reconciler.reconcile(&auction, &Currency::new("USD")));
        // 1000 -> 1.0, 1250 -> 1.25 -> 1
        assert_eq!(prices.current_bid, 1);
        assert_eq!(prices.next_bid, 1);
        assert_eq!(prices.currency, Currency::new("USD"));
    }
}
