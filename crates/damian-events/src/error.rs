//! Event dispatch error primitives.

use crate::payloads::SubscriberId;
use std::fmt::{self, Display, Formatter};

/// Error recorded when delivering an event to a subscriber fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// A subscriber callback panicked while handling an event.
    SubscriberPanicked {
        /// Subscriber whose callback panicked.
        subscriber: SubscriberId,
        /// Event kind string for filtering in logs.
        event_kind: &'static str,
        /// Panic payload rendered as text when it was a string.
        detail: String,
    },
}

impl EventBusError {
    /// Subscriber tied to the failed delivery.
    #[must_use]
    pub const fn subscriber(&self) -> SubscriberId {
        match self {
            Self::SubscriberPanicked { subscriber, .. } => *subscriber,
        }
    }

    /// Event kind string associated with the failed delivery.
    #[must_use]
    pub const fn event_kind(&self) -> &'static str {
        match self {
            Self::SubscriberPanicked { event_kind, .. } => event_kind,
        }
    }
}

impl Display for EventBusError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("event subscriber panicked")
    }
}

impl std::error::Error for EventBusError {}
