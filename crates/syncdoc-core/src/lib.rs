//! # syncdoc-core
//!
//! Shared primitives for the shared-document server:
//!
//! - [`Message`] envelope and [`Command`] set exchanged with clients
//! - JSON Merge Patch (RFC 7396) in [`merge`]
//! - JSON Pointer (RFC 6901) in [`pointer`]
//! - JSON Patch (RFC 6902) with atomic apply in [`patch`]
//! - Session name generation in [`names`]

#![deny(unsafe_code)]

pub mod errors;
pub mod merge;
pub mod message;
pub mod names;
pub mod patch;
pub mod pointer;

pub use errors::{OperationError, PatchError, PointerError};
pub use merge::{merge_patch, merged};
pub use message::{Command, Message, CLIENT_SOURCE, REQUEST_SOURCE, SERVER_SOURCE};
pub use names::SessionName;
pub use patch::{apply_patch, parse_patch, PatchOperation};
pub use pointer::JsonPointer;
