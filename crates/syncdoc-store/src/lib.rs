//! # syncdoc-store
//!
//! Owns every shared document and the subscriber sinks attached to them.
//!
//! - [`DocumentStore`]: path → value directory with per-path single-writer
//!   locking; publish / merge / patch / delete
//! - [`NotificationRouter`]: subscribe / unsubscribe and non-blocking
//!   fan-out of content, signal, and terminal notifications
//! - [`SubscriberSink`]: bounded, coalescing delivery queue owned by one session

#![deny(unsafe_code)]

pub mod documents;
pub mod error;
pub mod router;
pub mod sink;

pub use documents::{DocumentStore, Fanout};
pub use error::StoreError;
pub use router::{DeliveryReport, Notification, NotificationRouter, SubscriberHandle};
pub use sink::{Delivery, Offer, SubscriberSink};
