//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the built-in subscribers fed from the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//!   WorkerActor ── publish(Event) ──► Bus ──► subscriber_listener       
//!   Maintenance ──┘                               │
//!                                                 ▼
//!                                          SubscriberSet::emit
//!                                     ┌───────────┼────────────┐
//!                                     ▼           ▼            ▼
//!                                 LogWriter  CatalogWriter   custom
//! ```
//!
//! - [`LogWriter`] renders events as `tracing` records.
//! - [`CatalogWriter`] mirrors camera status and finished segments into the catalog.

mod catalog;
mod log;
mod subscriber;
mod subscriber_set;

pub use catalog::CatalogWriter;
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
