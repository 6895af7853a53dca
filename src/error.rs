//! Error types for the linearized writer.
//!
//! All failures are fatal to the current write: either the writer produces a
//! complete, valid linearized PDF or it returns an error and the caller
//! discards the partial output.

use crate::object::ObjectRef;

/// Result type alias for linearization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while producing a linearized PDF.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document has no pages; there is no first page to optimize for.
    #[error("cannot linearize a document with zero pages")]
    EmptyDocument,

    /// A reachable reference has no target in the indirect-object table.
    #[error("dangling reference: {0} has no target in the object table")]
    DanglingReference(ObjectRef),

    /// A reference names an object from a different document revision.
    #[error("reference {0} points into a different document")]
    CrossDocumentReference(ObjectRef),

    /// Second-pass emission size disagrees with the first-pass measurement.
    ///
    /// This indicates an implementation bug or a mid-write mutation of the
    /// document; the sink may be in an inconsistent state and must be
    /// discarded by the caller.
    #[error("layout drift on object {object}: sized {expected} bytes, emitted {actual}")]
    LayoutDrift {
        /// Object whose measured and emitted sizes disagree
        object: ObjectRef,
        /// Byte count recorded by the size pass
        expected: u64,
        /// Byte count produced at emission time
        actual: u64,
    },

    /// The byte sink reported an I/O failure.
    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),

    /// A computed offset or length does not fit in the 10 decimal digits of
    /// the fixed-width linearization fields (files of 10 GB or more).
    #[error("value {0} does not fit a fixed-width 10-digit offset field")]
    FormatOverflow(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_message() {
        let msg = format!("{}", Error::EmptyDocument);
        assert!(msg.contains("zero pages"));
    }

    #[test]
    fn test_dangling_reference_message() {
        let err = Error::DanglingReference(ObjectRef::new(12, 0));
        let msg = format!("{}", err);
        assert!(msg.contains("12 0 R"));
    }

    #[test]
    fn test_layout_drift_message() {
        let err = Error::LayoutDrift {
            object: ObjectRef::new(7, 0),
            expected: 120,
            actual: 123,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("7 0 R"));
        assert!(msg.contains("120"));
        assert!(msg.contains("123"));
    }

    #[test]
    fn test_format_overflow_message() {
        let err = Error::FormatOverflow(10_000_000_000);
        let msg = format!("{}", err);
        assert!(msg.contains("10000000000"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
