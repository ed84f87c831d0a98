//! User-visible notification events and delivery sinks.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::currency::{format_price, Currency};
use crate::services::bids::BidMode;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Another participant's bid arrived in a fresh poll.
    NewBid {
        bidder: String,
        amount: i64,
        currency: Currency,
    },
    /// The viewer's own bid was accepted by the server. Carries the
    /// display-currency amount the viewer typed, not the canonical one.
    BidAccepted {
        amount: i64,
        currency: Currency,
        mode: BidMode,
    },
    /// A user-visible failure: local validation or server rejection.
    Error { message: String },
}

impl Notification {
    /// Toast text for the event.
    pub fn message(&self) -> String {
        match self {
            Notification::NewBid {
                bidder,
                amount,
                currency,
            } => format!(
                "New bid of {}{} by {}",
                currency.symbol(),
                format_price(*amount),
                bidder
            ),
            Notification::BidAccepted {
                amount,
                currency,
                mode,
            } => {
                let verb = match mode {
                    BidMode::Place => "placed",
                    BidMode::Update => "updated to",
                };
                format!("Bid {verb} {}{}", currency.symbol(), format_price(*amount))
            }
            Notification::Error { message } => message.clone(),
        }
    }
}

/// Where notifications go. The binary installs a tracing-backed sink;
/// embedders and tests install their own.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Renders notifications through the tracing pipeline.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Error { .. } => warn!("{}", notification.message()),
            _ => info!("{}", notification.message()),
        }
    }
}

/// Records notifications in memory, in emission order. Used by tests and by
/// embedders that render their own UI.
#[derive(Debug, Default)]
pub struct MemorySink {
    notifications: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .expect("notification sink lock poisoned")
            .push(notification);
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every recorded notification.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(
            &mut *self
                .notifications
                .lock()
                .expect("notification sink lock poisoned"),
        )
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .expect("notification sink lock poisoned")
            .clone()
    }
}
