//! Linearized (fast web view) file emission.
//!
//! Orchestrates collection, renumbering, layout and the single-pass write of
//! the linearized byte stream: header, linearization dictionary, first-page
//! cross-reference table and trailer, document-level objects, first-page
//! objects, hint stream, remaining pages, shared objects, and the main
//! cross-reference table.
//!
//! Emission is strictly sequential: bytes leave the writer in increasing
//! position order and nothing is ever seeked or rewritten. Every object is
//! length-checked against the size pass; any disagreement aborts the write
//! with [`Error::LayoutDrift`] and the sink must be discarded.

use super::collector::{ObjectCollector, ObjectSets};
use super::layout::Layout;
use super::serializer::ObjectSerializer;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Phases of a linearized write.
///
/// The only backward transition is `LaidOut -> LaidOut`, when the
/// linearization dictionary is patched with its final `/L` value; any fault
/// aborts the write without a partial commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// No work done yet
    Init,
    /// Object partition computed
    Collected,
    /// Object sizes measured
    Sized,
    /// Offsets assigned and dictionary values finalized
    LaidOut,
    /// Bytes are leaving the writer
    Emitting,
    /// The complete file reached the sink
    Done,
}

/// Writes a document as a linearized PDF.
///
/// The writer takes exclusive use of the document for the duration of the
/// write because it renumbers the live objects; a document left behind by a
/// failed write carries a partially-consumed numbering and must not be
/// reused.
#[derive(Debug)]
pub struct LinearizedWriter {
    state: WriterState,
}

impl LinearizedWriter {
    /// Create a writer in the initial state.
    pub fn new() -> Self {
        Self {
            state: WriterState::Init,
        }
    }

    /// Current phase of the write.
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Produce the linearized byte stream for `document` into `sink`.
    ///
    /// On error the sink contents are not a valid PDF and must be discarded.
    pub fn write<W: Write>(&mut self, document: &mut PdfDocument, sink: &mut W) -> Result<()> {
        let sets = ObjectCollector::new(document).collect()?;
        self.state = WriterState::Collected;

        // The linearization dictionary and hint stream join the object table
        // so that renumbering and the cross-reference tables cover them. The
        // dictionary's table entry is a placeholder; its envelope is emitted
        // from the fixed-width parameter block.
        let mut lin_dict = Dictionary::new();
        lin_dict.insert("Linearized".to_string(), Object::Integer(1));
        let lin = document.insert(Object::Dictionary(lin_dict));
        let hint = document.insert(Object::Stream {
            dict: Dictionary::new(),
            data: bytes::Bytes::new(),
        });

        let map = renumber_map(&sets, lin, hint);
        let lin = ObjectRef::new(map[&lin], 0);
        let hint = ObjectRef::new(map[&hint], 0);
        document.apply_renumbering(&map);
        let sets = sets.renumbered(&map);
        log::debug!(
            "renumbered {} live objects; first page object is {}",
            map.len(),
            document.pages()[0]
        );

        self.state = WriterState::Sized;
        let layout = Layout::build(document, &sets, lin, hint)?;
        self.state = WriterState::LaidOut;

        self.state = WriterState::Emitting;
        self.emit(document, &sets, lin, hint, &layout, sink)?;
        self.state = WriterState::Done;
        Ok(())
    }

    /// Linearize straight to a file on disk.
    pub fn save(document: &mut PdfDocument, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut sink = std::io::BufWriter::new(file);
        let mut writer = Self::new();
        writer.write(document, &mut sink)?;
        sink.flush()?;
        Ok(())
    }

    fn emit<W: Write>(
        &self,
        doc: &PdfDocument,
        sets: &ObjectSets,
        lin: ObjectRef,
        hint: ObjectRef,
        layout: &Layout,
        sink: &mut W,
    ) -> Result<()> {
        let ser = ObjectSerializer::compact();
        let mut written: u64 = 0;

        doc.write_header(sink)?;
        written += doc.header_len();

        let lin_bytes = layout.params.to_bytes(lin.id);
        check_length(lin, layout.lin_size, lin_bytes.len() as u64)?;
        sink.write_all(&lin_bytes)?;
        written += lin_bytes.len() as u64;

        check_position(lin, layout.first_page_xref_offset, written)?;
        sink.write_all(&layout.first_page_xref)?;
        written += layout.first_page_xref.len() as u64;

        for r in sets.doc_level.iter().chain(sets.first_page.iter()) {
            written = self.emit_object(doc, &ser, *r, layout, written, sink)?;
        }

        written = self.emit_object(doc, &ser, hint, layout, written, sink)?;

        for r in sets.remaining.iter().flatten() {
            written = self.emit_object(doc, &ser, *r, layout, written, sink)?;
        }
        for r in &sets.shared {
            written = self.emit_object(doc, &ser, *r, layout, written, sink)?;
        }

        check_position(lin, layout.main_xref_offset, written)?;
        sink.write_all(&layout.main_xref)?;
        written += layout.main_xref.len() as u64;

        check_position(lin, layout.total_length, written)?;
        sink.flush()?;
        log::debug!("linearized write complete: {} bytes", written);
        Ok(())
    }

    /// Serialize one object and forward it to the sink, verifying that both
    /// its position and its length match the layout.
    fn emit_object<W: Write>(
        &self,
        doc: &PdfDocument,
        ser: &ObjectSerializer,
        r: ObjectRef,
        layout: &Layout,
        written: u64,
        sink: &mut W,
    ) -> Result<u64> {
        let obj = doc.get(r).ok_or(Error::DanglingReference(r))?;
        check_position(r, obj.byte_position, written)?;

        let bytes = ser.serialize_indirect(r.id, r.gen, &obj.value);
        check_length(r, layout.sizes[&r], bytes.len() as u64)?;
        sink.write_all(&bytes)?;
        Ok(written + bytes.len() as u64)
    }
}

impl Default for LinearizedWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Second-pass serialization must reproduce the measured length exactly.
fn check_length(object: ObjectRef, expected: u64, actual: u64) -> Result<()> {
    if expected != actual {
        return Err(Error::LayoutDrift {
            object,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Emission must reach each object exactly at its assigned offset.
fn check_position(object: ObjectRef, expected: u64, actual: u64) -> Result<()> {
    if expected != actual {
        return Err(Error::LayoutDrift {
            object,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Dense renumbering in emission order: the linearization dictionary is
/// object 1, then document-level objects, first-page objects, the hint
/// stream, the remaining pages' exclusives in page order, and the shared
/// objects.
fn renumber_map(sets: &ObjectSets, lin: ObjectRef, hint: ObjectRef) -> HashMap<ObjectRef, u32> {
    let mut map = HashMap::new();
    let mut next = 1u32;

    map.insert(lin, next);
    next += 1;
    for &r in sets.doc_level.iter().chain(sets.first_page.iter()) {
        map.insert(r, next);
        next += 1;
    }
    map.insert(hint, next);
    next += 1;
    for &r in sets.remaining.iter().flatten().chain(sets.shared.iter()) {
        map.insert(r, next);
        next += 1;
    }
    map
}
