//! Business logic services: countdown clock, price reconciliation, bid
//! delta detection, and bid submission.

pub mod bids;
pub mod countdown;
pub mod notifier;
pub mod prices;
