#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Settings event dispatch for the DamianApp workspace.
//!
//! The registry delivers typed [`ConfigEvent`]s to synchronous subscribers in
//! registration order, isolating each callback so a panicking subscriber never
//! prevents the others from observing the event. Every event is also fanned
//! out over a bounded `tokio::broadcast` channel for async watchers; when the
//! channel overflows, lagging watchers skip the oldest events.
//!
//! Layout: `payloads.rs` (event enum + envelope), `routing.rs` (registry,
//! subscriptions, broadcast), `error.rs` (dispatch failures).

pub mod error;
pub mod payloads;
pub mod routing;

pub use error::EventBusError;
pub use payloads::{ConfigEvent, DEFAULT_WATCH_CAPACITY, EventEnvelope, EventId, SubscriberId};
pub use routing::{DispatchReport, EventStream, SubscriberRegistry, Subscription};
