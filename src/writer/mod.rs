//! Linearized PDF writing pipeline.
//!
//! ## Architecture
//!
//! ```text
//! PdfDocument
//!     ↓
//! [ObjectCollector] (per-page closures → object partition)
//!     ↓
//! [Layout] (size pass → offsets → hint tables → finalized dict values)
//!     ↓
//! [LinearizedWriter] (renumbering + single-pass emission)
//!     ↓
//! linearized PDF bytes
//! ```
//!
//! [`HintTables`] and [`BitWriter`] sit underneath the layout: they encode
//! the page-offset and shared-object hint tables into the hint stream
//! payload. [`ObjectSerializer`] is the shared token-level serializer used
//! by both the size pass and the emission pass.

mod bitwriter;
mod collector;
mod hints;
mod layout;
mod linearized;
mod serializer;

pub use bitwriter::BitWriter;
pub use collector::{ObjectCollector, ObjectSets};
pub use hints::{
    bits_needed, delta_encoding, EncodedHintTables, HintTables, PageHintRecord, SharedHintRecord,
};
pub use layout::{Layout, LinearizationParams, MAX_OFFSET};
pub use linearized::{LinearizedWriter, WriterState};
pub use serializer::ObjectSerializer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _serializer = ObjectSerializer::new();
        let _bits = BitWriter::new();
        let _writer = LinearizedWriter::new();
    }
}
