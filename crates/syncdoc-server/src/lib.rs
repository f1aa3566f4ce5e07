//! # syncdoc-server
//!
//! Session hub and Axum transport for the shared-document server.
//!
//! - [`session::SyncHub`]: open, run, and close sessions; sequence numbering
//! - [`dispatch::CommandDispatcher`]: envelope → store / registry operation
//! - [`registry::SessionRegistry`]: unique session names, direct `notify` routing
//! - `WebSocket` gateway (`/ws`, `/ws/{name}`) and REST endpoints
//!   (`/publish`, `/notify`, `/sharedobject`)
//! - Health, Prometheus metrics, graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod health;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod transport;

pub use config::{ServerConfig, SessionConfig};
pub use dispatch::{CommandDispatcher, DispatchOutcome, Origin};
pub use errors::{SessionError, TransportError};
pub use server::{AppState, SyncServer};
pub use session::{Session, SessionContext, SessionState, SyncHub};
