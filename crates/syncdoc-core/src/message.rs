//! The JSON envelope exchanged between clients and the server.
//!
//! Wire form: `{"source":…,"command":…,"path":…,"message":…,"count":…}`.
//! Decoding is deliberately lenient: every field may be missing, and an
//! unrecognized `command` decodes to `None` so dispatch can ignore it
//! instead of rejecting the frame.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `source` value marking a message that originates from a client.
pub const CLIENT_SOURCE: &str = "client";
/// `source` value on messages generated by the server itself.
pub const SERVER_SOURCE: &str = "server";
/// `source` value substituted for `notify` calls made over plain HTTP.
pub const REQUEST_SOURCE: &str = "http-request";

/// Operations a client can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Receive change notifications for a document.
    Subscribe,
    /// Replace a document wholesale.
    Publish,
    /// Deliver the message directly to another session by name.
    Notify,
    /// Apply a JSON Merge Patch.
    Merge,
    /// Apply a JSON Patch operation list.
    Patch,
    /// Remove a document.
    Delete,
}

impl Command {
    /// All commands, in wire order.
    pub const ALL: [Self; 6] = [
        Self::Subscribe,
        Self::Publish,
        Self::Notify,
        Self::Merge,
        Self::Patch,
        Self::Delete,
    ];

    /// Wire name of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Publish => "publish",
            Self::Notify => "notify",
            Self::Merge => "merge",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }

    /// Parse a wire name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single envelope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent the message (`client`, a session name, `server`, ...).
    #[serde(default)]
    pub source: String,
    /// Requested operation; `None` for server notifications and unknown commands.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_command"
    )]
    pub command: Option<Command>,
    /// Document path, or target session name for `notify`.
    #[serde(default)]
    pub path: String,
    /// Arbitrary JSON payload.
    #[serde(default, rename = "message")]
    pub payload: Value,
    /// Per-session outbound sequence number, assigned on send.
    #[serde(default, rename = "count", deserialize_with = "lenient_sequence")]
    pub sequence: u64,
}

impl Message {
    /// A client-originated message.
    pub fn client(command: Command, path: impl Into<String>, payload: Value) -> Self {
        Self {
            source: CLIENT_SOURCE.to_owned(),
            command: Some(command),
            path: path.into(),
            payload,
            sequence: 0,
        }
    }

    /// Current state of a document, pushed after a change signal.
    pub fn document_state(path: impl Into<String>, value: Value) -> Self {
        Self {
            source: SERVER_SOURCE.to_owned(),
            command: None,
            path: path.into(),
            payload: value,
            sequence: 0,
        }
    }

    /// Tells a subscriber that a document was deleted.
    pub fn document_deleted(path: impl Into<String>) -> Self {
        Self {
            source: SERVER_SOURCE.to_owned(),
            command: Some(Command::Delete),
            path: path.into(),
            payload: Value::Null,
            sequence: 0,
        }
    }

    /// Replace the `source` field.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Whether the message names a path.
    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }
}

fn lenient_command<'de, D>(deserializer: D) -> Result<Option<Command>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(Command::parse))
}

fn lenient_sequence<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_u64).unwrap_or(0))
}
