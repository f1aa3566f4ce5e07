//! Error types for pointer resolution and patch application.

use thiserror::Error;

/// A JSON Pointer string that does not follow RFC 6901 syntax.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PointerError {
    /// Non-empty pointers must start with `/`.
    #[error("pointer must be empty or start with '/': {0:?}")]
    MissingLeadingSlash(String),
    /// `~` must be followed by `0` or `1`.
    #[error("invalid escape sequence in pointer: {0:?}")]
    InvalidEscape(String),
}

/// Why a single JSON Patch operation could not be applied.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum OperationError {
    /// The operation's `path` or `from` is not a valid pointer.
    #[error(transparent)]
    Pointer(#[from] PointerError),
    /// The pointer does not resolve to an existing value.
    #[error("no value at {0:?}")]
    NotFound(String),
    /// An array index token is not a canonical non-negative integer.
    #[error("invalid array index {token:?} at {path:?}")]
    InvalidIndex {
        /// Offending token.
        token: String,
        /// Pointer being resolved.
        path: String,
    },
    /// An array index is past the end of the array.
    #[error("index {index} out of bounds (len {len}) at {path:?}")]
    OutOfBounds {
        /// Requested index.
        index: usize,
        /// Array length at the time of the operation.
        len: usize,
        /// Pointer being resolved.
        path: String,
    },
    /// The parent of the target is a scalar and cannot hold children.
    #[error("value at {0:?} is not a container")]
    NotAContainer(String),
    /// A `test` operation found a different value.
    #[error("test failed at {0:?}")]
    TestFailed(String),
    /// The operation is structurally impossible (e.g. removing the root).
    #[error("invalid target {0:?}: {1}")]
    InvalidTarget(String, &'static str),
}

/// Failure of a whole JSON Patch call.
///
/// A patch either applies completely or not at all, so the error only
/// reports the first operation that failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PatchError {
    /// The payload could not be decoded as a list of operations.
    #[error("malformed patch document: {0}")]
    Malformed(String),
    /// Operation `index` failed; earlier operations were rolled back.
    #[error("operation {index} ({op}) failed: {kind}")]
    Operation {
        /// Zero-based position of the failing operation.
        index: usize,
        /// Operation name (`add`, `remove`, ...).
        op: &'static str,
        /// Failure detail.
        #[source]
        kind: OperationError,
    },
}

impl PatchError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Operation { kind, .. } => match kind {
                OperationError::Pointer(_) => "invalid_pointer",
                OperationError::NotFound(_) => "not_found",
                OperationError::InvalidIndex { .. } => "invalid_index",
                OperationError::OutOfBounds { .. } => "out_of_bounds",
                OperationError::NotAContainer(_) => "type_mismatch",
                OperationError::TestFailed(_) => "test_failed",
                OperationError::InvalidTarget(..) => "invalid_target",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_error_display() {
        let err = PointerError::MissingLeadingSlash("a/b".into());
        assert!(err.to_string().contains("start with '/'"));
    }

    #[test]
    fn operation_error_wraps_pointer_error() {
        let err: OperationError = PointerError::InvalidEscape("/~2".into()).into();
        assert!(matches!(err, OperationError::Pointer(_)));
    }

    #[test]
    fn patch_error_names_failing_operation() {
        let err = PatchError::Operation {
            index: 1,
            op: "test",
            kind: OperationError::TestFailed("/a".into()),
        };
        let text = err.to_string();
        assert!(text.contains("operation 1 (test)"), "got: {text}");
        assert_eq!(err.error_kind(), "test_failed");
    }

    #[test]
    fn malformed_kind() {
        assert_eq!(PatchError::Malformed("x".into()).error_kind(), "malformed");
    }
}
