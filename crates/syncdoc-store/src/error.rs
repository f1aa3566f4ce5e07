//! Store error types.

use syncdoc_core::PatchError;
use thiserror::Error;

/// Errors raised by document and subscription operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path has no document.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    /// A JSON Patch could not be applied; the document is unchanged.
    #[error("patch of {path} failed: {source}")]
    Patch {
        /// Document path.
        path: String,
        /// Underlying patch failure.
        #[source]
        source: PatchError,
    },
    /// A merge patch could not be interpreted.
    #[error("merge of {path} failed: {reason}")]
    Merge {
        /// Document path.
        path: String,
        /// Why the merge patch was rejected.
        reason: String,
    },
}

impl StoreError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::DocumentNotFound(_) => "document_not_found",
            Self::Patch { .. } => "patch_error",
            Self::Merge { .. } => "merge_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = StoreError::DocumentNotFound("doc".into());
        assert_eq!(err.to_string(), "document not found: doc");
        assert_eq!(err.error_kind(), "document_not_found");
    }

    #[test]
    fn patch_error_has_source() {
        let err = StoreError::Patch {
            path: "doc".into(),
            source: PatchError::Malformed("bad".into()),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("patch of doc failed"));
    }

    #[test]
    fn merge_error_kind() {
        let err = StoreError::Merge {
            path: "doc".into(),
            reason: "oops".into(),
        };
        assert_eq!(err.error_kind(), "merge_error");
    }
}
