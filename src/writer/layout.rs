//! Two-pass size and offset solver for the linearized file.
//!
//! The linearization dictionary declares byte offsets into a file whose
//! length it itself affects, so the layout works in two passes: measure every
//! object with the compact serializer, assign offsets sequentially, then
//! patch the dictionary with final values. Patching is safe because the
//! offset-valued fields (`/L`, `/E`, `/T`, `/H` and the first-page trailer's
//! `/Prev`) are formatted as 10-digit zero-padded integers, so their textual
//! width never changes between the placeholder and the final value.
//!
//! The hint stream is sized before offsets exist: its encoded length depends
//! only on object sizes and entry counts, never on absolute positions, so
//! the provisional encoding and the final one are the same length.

use super::collector::ObjectSets;
use super::hints::{EncodedHintTables, HintTables, PageHintRecord, SharedHintRecord};
use super::serializer::ObjectSerializer;
use crate::document::{write_eof, PdfDocument};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashMap;

/// Largest value the fixed-width offset fields can carry.
pub const MAX_OFFSET: u64 = 9_999_999_999;

/// Values of the linearization parameter dictionary (ISO 32000-1 Table F.1).
#[derive(Debug, Clone, Default)]
pub struct LinearizationParams {
    /// `/L`: total file length in bytes.
    pub file_length: u64,
    /// `/H` first element: byte offset of the hint stream object.
    pub hint_offset: u64,
    /// `/H` second element: length of the hint stream object, envelope
    /// included.
    pub hint_length: u64,
    /// `/O`: object number of the first page's page object.
    pub first_page_object: u32,
    /// `/E`: byte offset one past the end of the first-page section.
    pub end_of_first_page: u64,
    /// `/N`: number of pages in the document.
    pub page_count: u32,
    /// `/T`: byte offset of the whitespace preceding the first entry of the
    /// main cross-reference table.
    pub main_xref_offset: u64,
}

impl LinearizationParams {
    /// Serialize the dictionary's indirect-object envelope.
    ///
    /// The offset-valued fields use a fixed 10-digit format, so the envelope
    /// has the same length no matter which values are filled in; `/O` and
    /// `/N` are variable-width but known before the size pass.
    pub fn to_bytes(&self, id: u32) -> Vec<u8> {
        format!(
            "{} 0 obj\n<</Linearized 1/L {:010}/H [{:010} {:010}]/O {}/E {:010}/N {}/T {:010}>>\nendobj\n",
            id,
            self.file_length,
            self.hint_offset,
            self.hint_length,
            self.first_page_object,
            self.end_of_first_page,
            self.page_count,
            self.main_xref_offset,
        )
        .into_bytes()
    }

    /// Reject values that do not fit a fixed-width 10-digit field.
    pub fn validate(&self) -> Result<()> {
        for v in [
            self.file_length,
            self.hint_offset,
            self.hint_length,
            self.end_of_first_page,
            self.main_xref_offset,
        ] {
            if v > MAX_OFFSET {
                return Err(Error::FormatOverflow(v));
            }
        }
        Ok(())
    }
}

/// The solved layout: object sizes and positions plus the finalized
/// cross-reference blocks and linearization parameters.
#[derive(Debug)]
pub struct Layout {
    /// Finalized linearization dictionary values.
    pub params: LinearizationParams,
    /// Serialized envelope size of every classified object.
    pub sizes: HashMap<ObjectRef, u64>,
    /// Byte length of the linearization dictionary envelope.
    pub lin_size: u64,
    /// Byte offset of the first-page cross-reference table.
    pub first_page_xref_offset: u64,
    /// Finalized first-page cross-reference block (table, trailer,
    /// `startxref`, `%%EOF`).
    pub first_page_xref: Vec<u8>,
    /// Byte offset of the main cross-reference table.
    pub main_xref_offset: u64,
    /// Finalized main cross-reference block.
    pub main_xref: Vec<u8>,
    /// Total length of the output file.
    pub total_length: u64,
}

impl Layout {
    /// Solve the layout for a renumbered document.
    ///
    /// `lin` and `hint` are the writer-created linearization dictionary and
    /// hint stream objects; both already carry their final object numbers.
    /// On success every classified object's `byte_position` has been
    /// assigned. Fails with [`Error::FormatOverflow`] before any emission
    /// when an offset would not fit the fixed-width fields.
    pub fn build(
        doc: &mut PdfDocument,
        sets: &ObjectSets,
        lin: ObjectRef,
        hint: ObjectRef,
    ) -> Result<Self> {
        let ser = ObjectSerializer::compact();
        let page0 = doc.pages()[0];
        let total_objects = sets.classified_count() as u32 + 2; // + lin + hint

        // Size pass: measure every classified object with the same
        // serializer the emission pass will use.
        let mut sizes: HashMap<ObjectRef, u64> = HashMap::new();
        for r in sets.classified() {
            let obj = doc.get(r).ok_or(Error::DanglingReference(r))?;
            let len = ser.serialize_indirect(r.id, r.gen, &obj.value).len() as u64;
            sizes.insert(r, len);
        }

        let mut params = LinearizationParams {
            first_page_object: page0.id,
            page_count: doc.pages().len() as u32,
            ..Default::default()
        };
        let lin_size = params.to_bytes(lin.id).len() as u64;

        // Provisional hint encoding: lengths are final, offset-valued header
        // fields are patched after offsets are assigned.
        let mut tables = hint_tables(doc, sets, &sizes, lin_size, page0)?;
        let provisional = tables.encode();
        install_hint_stream(doc, hint, &provisional);
        let hint_obj = doc.get(hint).ok_or(Error::DanglingReference(hint))?;
        let hint_size = ser
            .serialize_indirect(hint.id, hint.gen, &hint_obj.value)
            .len() as u64;
        sizes.insert(hint, hint_size);

        // Offset assignment.
        let mut positions: HashMap<ObjectRef, u64> = HashMap::new();
        let mut cursor = doc.header_len();
        positions.insert(lin, cursor);
        cursor += lin_size;

        let first_page_xref_offset = cursor;
        let placeholder = first_page_xref_block(
            doc,
            &ser,
            hint.id,
            &vec![0; hint.id as usize],
            total_objects,
            0,
            first_page_xref_offset,
        );
        cursor += placeholder.len() as u64;

        for r in sets.doc_level.iter().chain(sets.first_page.iter()) {
            positions.insert(*r, cursor);
            cursor += sizes[r];
        }
        let end_of_first_page = cursor;

        positions.insert(hint, cursor);
        cursor += hint_size;

        for r in sets.remaining.iter().flatten() {
            positions.insert(*r, cursor);
            cursor += sizes[r];
        }
        for r in &sets.shared {
            positions.insert(*r, cursor);
            cursor += sizes[r];
        }

        let main_xref_offset = cursor;
        let main_xref = main_xref_block(doc, &ser, total_objects, &positions, main_xref_offset)?;
        let total_length = main_xref_offset + main_xref.len() as u64;

        // Finalize the parameter dictionary and check the digit limit
        // before anything reaches the sink. /T names the whitespace before
        // the table's first entry, not the `xref` keyword.
        params.file_length = total_length;
        params.hint_offset = end_of_first_page;
        params.hint_length = hint_size;
        params.end_of_first_page = end_of_first_page;
        params.main_xref_offset = whitespace_before_first_entry(main_xref_offset, total_objects);
        params.validate()?;

        // Patch the hint tables with final offsets; the encoded length must
        // not move, since the layout above depends on it.
        tables.first_page_object_offset = to_u32(positions[&page0])?;
        if let Some(&first_shared) = sets.shared.first() {
            tables.first_shared_number = first_shared.id;
            tables.first_shared_offset = to_u32(positions[&first_shared])?;
        }
        let finalized = tables.encode();
        if finalized.data.len() != provisional.data.len() {
            return Err(Error::LayoutDrift {
                object: hint,
                expected: provisional.data.len() as u64,
                actual: finalized.data.len() as u64,
            });
        }
        install_hint_stream(doc, hint, &finalized);

        // Rebuild the first-page block with real offsets; fixed-width /Prev
        // and 20-byte entries guarantee the length is unchanged.
        let offsets: Vec<u64> = (1..=hint.id)
            .map(|n| positions[&ObjectRef::new(n, 0)])
            .collect();
        let first_page_xref = first_page_xref_block(
            doc,
            &ser,
            hint.id,
            &offsets,
            total_objects,
            main_xref_offset,
            first_page_xref_offset,
        );
        if first_page_xref.len() != placeholder.len() {
            return Err(Error::LayoutDrift {
                object: lin,
                expected: placeholder.len() as u64,
                actual: first_page_xref.len() as u64,
            });
        }

        for (r, &pos) in &positions {
            if let Some(obj) = doc.get_mut(*r) {
                obj.byte_position = pos;
            }
        }

        log::debug!(
            "layout solved: {} bytes total, first page ends at {}, hint stream {} bytes, main xref at {}",
            total_length,
            end_of_first_page,
            hint_size,
            main_xref_offset
        );

        Ok(Layout {
            params,
            sizes,
            lin_size,
            first_page_xref_offset,
            first_page_xref,
            main_xref_offset,
            main_xref,
            total_length,
        })
    }
}

fn to_u32(v: u64) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::FormatOverflow(v))
}

/// Build the hint table records from object sizes and section orders.
fn hint_tables(
    doc: &PdfDocument,
    sets: &ObjectSets,
    sizes: &HashMap<ObjectRef, u64>,
    lin_size: u64,
    page0: ObjectRef,
) -> Result<HintTables> {
    let mut pages = Vec::with_capacity(doc.pages().len());

    // Page 0 spans the whole first-page section except cross-reference
    // bytes and the hint stream.
    let first_page_length = lin_size
        + sets
            .doc_level
            .iter()
            .chain(sets.first_page.iter())
            .map(|r| sizes[r])
            .sum::<u64>();
    let (content_offset, content_length) = content_metrics(doc, page0, &sets.first_page, sizes)?;
    pages.push(PageHintRecord {
        object_count: to_u32(1 + sets.doc_level.len() as u64 + sets.first_page.len() as u64)?,
        page_length: to_u32(first_page_length)?,
        shared_refs: sets.page_shared[0].clone(),
        content_offset,
        content_length,
    });

    for (i, group) in sets.remaining.iter().enumerate() {
        let page = doc.pages()[i + 1];
        let (content_offset, content_length) = content_metrics(doc, page, group, sizes)?;
        pages.push(PageHintRecord {
            object_count: group.len() as u32,
            page_length: to_u32(group.iter().map(|r| sizes[r]).sum::<u64>())?,
            shared_refs: sets.page_shared[i + 1].clone(),
            content_offset,
            content_length,
        });
    }

    let shared = sets
        .shared
        .iter()
        .map(|r| Ok(SharedHintRecord { length: to_u32(sizes[r])? }))
        .collect::<Result<Vec<_>>>()?;

    Ok(HintTables {
        pages,
        shared,
        ..Default::default()
    })
}

/// Offset and length of a page's first content stream, relative to the start
/// of the page's exclusive object group. Content living outside the group
/// (shared or absent) reports a zero offset.
fn content_metrics(
    doc: &PdfDocument,
    page: ObjectRef,
    group: &[ObjectRef],
    sizes: &HashMap<ObjectRef, u64>,
) -> Result<(u32, u32)> {
    let page_dict = doc
        .get(page)
        .ok_or(Error::DanglingReference(page))?
        .value
        .as_dict()
        .cloned()
        .unwrap_or_default();

    let content = match page_dict.get("Contents") {
        Some(Object::Reference(r)) => Some(*r),
        Some(Object::Array(items)) => items.first().and_then(Object::as_reference),
        _ => None,
    };
    let Some(content) = content else {
        return Ok((0, 0));
    };

    let length = sizes.get(&content).copied().unwrap_or(0);
    let offset = match group.iter().position(|r| *r == content) {
        Some(idx) => group[..idx].iter().map(|r| sizes[r]).sum::<u64>(),
        None => 0,
    };
    Ok((to_u32(offset)?, to_u32(length)?))
}

/// Replace the hint stream object's payload, keeping `/Length` and `/S`
/// consistent with the encoded tables.
fn install_hint_stream(doc: &mut PdfDocument, hint: ObjectRef, encoded: &EncodedHintTables) {
    let mut dict = Dictionary::new();
    dict.insert(
        "Length".to_string(),
        Object::Integer(encoded.data.len() as i64),
    );
    dict.insert(
        "S".to_string(),
        Object::Integer(encoded.shared_table_offset as i64),
    );
    doc.replace(
        hint,
        Object::Stream {
            dict,
            data: bytes::Bytes::from(encoded.data.clone()),
        },
    );
}

/// First-page cross-reference block: one subsection covering objects
/// `0..=max_obj`, a trailer whose `/Prev` names the main table with a fixed
/// 10-digit width, `startxref` and `%%EOF`.
fn first_page_xref_block(
    doc: &PdfDocument,
    ser: &ObjectSerializer,
    max_obj: u32,
    offsets: &[u64],
    total_objects: u32,
    prev: u64,
    startxref: u64,
) -> Vec<u8> {
    let mut block = format!("xref\n0 {}\n", max_obj + 1);
    block.push_str("0000000000 65535 f \n");
    for &offset in offsets {
        block.push_str(&format!("{:010} 00000 n \n", offset));
    }

    block.push_str("trailer\n<<");
    block.push_str(&format!("/Size {}", total_objects + 1));
    if let Some(root) = doc.catalog_ref() {
        block.push_str(&format!("/Root {} {} R", root.id, root.gen));
    }
    if let Some(info) = doc.info_ref() {
        block.push_str(&format!("/Info {} {} R", info.id, info.gen));
    }
    if let Some(id) = doc.id_array() {
        block.push_str("/ID ");
        block.push_str(&String::from_utf8_lossy(&ser.serialize(id)));
    }
    block.push_str(&format!("/Prev {:010}>>\n", prev));
    block.push_str(&format!("startxref\n{}\n%%EOF\n", startxref));
    block.into_bytes()
}

/// Main cross-reference block: a single subsection covering every object,
/// the main trailer (no `/Prev`), `startxref` and `%%EOF`.
fn main_xref_block(
    doc: &PdfDocument,
    ser: &ObjectSerializer,
    total_objects: u32,
    positions: &HashMap<ObjectRef, u64>,
    xref_offset: u64,
) -> Result<Vec<u8>> {
    let mut block = format!("xref\n0 {}\n", total_objects + 1).into_bytes();
    block.extend_from_slice(b"0000000000 65535 f \n");
    for n in 1..=total_objects {
        let pos = positions
            .get(&ObjectRef::new(n, 0))
            .copied()
            .unwrap_or_default();
        block.extend_from_slice(format!("{:010} 00000 n \n", pos).as_bytes());
    }

    let mut trailer = Dictionary::new();
    trailer.insert(
        "Size".to_string(),
        Object::Integer(i64::from(total_objects) + 1),
    );
    if let Some(root) = doc.catalog_ref() {
        trailer.insert("Root".to_string(), Object::Reference(root));
    }
    if let Some(info) = doc.info_ref() {
        trailer.insert("Info".to_string(), Object::Reference(info));
    }
    if let Some(id) = doc.id_array() {
        trailer.insert("ID".to_string(), id.clone());
    }

    block.extend_from_slice(b"trailer\n");
    block.extend_from_slice(&ser.serialize(&Object::Dictionary(trailer)));
    block.push(b'\n');
    write_eof(&mut block, xref_offset)?;
    Ok(block)
}

/// Byte offset of the whitespace character preceding the first entry of a
/// cross-reference table that begins at `xref_offset`.
pub(crate) fn whitespace_before_first_entry(xref_offset: u64, total_objects: u32) -> u64 {
    xref_offset + "xref\n".len() as u64 + format!("0 {}", total_objects + 1).len() as u64
}
