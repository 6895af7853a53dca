//! # pdf_linearize
//!
//! A linearized ("fast web view") PDF writer per ISO 32000-1:2008, Annex F.
//!
//! Given an in-memory document (a graph of indirect objects rooted at a
//! catalog, with an ordered page list), the writer reorders and renumbers the
//! objects so that a client reading the file sequentially can render the
//! first page from the file prefix alone, and can then fetch any later page
//! with a single seek guided by the embedded hint tables.
//!
//! ## What the writer does
//!
//! - Partitions the object graph into document-level, first-page-exclusive,
//!   shared and per-remaining-page sets via per-page transitive closures
//! - Solves the two-pass byte layout, including the fixed-point between the
//!   linearization dictionary and the offsets it declares
//! - Encodes the page-offset and shared-object hint tables with per-field
//!   minimum/delta bit packing
//! - Emits the file in a single forward pass: header, linearization
//!   dictionary, first-page cross-reference section, first-page objects,
//!   hint stream, remaining pages, shared objects, main cross-reference
//!   table
//!
//! ## Quick start
//!
//! ```ignore
//! use pdf_linearize::{LinearizedWriter, PdfDocument};
//!
//! # fn demo(mut doc: PdfDocument) -> pdf_linearize::Result<()> {
//! let mut out = Vec::new();
//! LinearizedWriter::new().write(&mut doc, &mut out)?;
//! // `out` now holds a web-optimized PDF
//! # Ok(())
//! # }
//! ```
//!
//! Writes are all-or-nothing: on any error the sink contents are not a valid
//! PDF and must be discarded, and the document's object numbering has been
//! consumed by the attempt.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Object and document model
pub mod document;
pub mod object;

// Linearized writing pipeline
pub mod writer;

// Re-exports
pub use document::{write_eof, IndirectObject, PdfDocument};
pub use error::{Error, Result};
pub use object::{Dictionary, Object, ObjectRef};
pub use writer::{LinearizedWriter, ObjectSerializer};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
