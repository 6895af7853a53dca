//! In-memory PDF document model for the write path.
//!
//! A [`PdfDocument`] is a directed graph of indirect objects rooted at a
//! catalog, plus an ordered list of page objects and the trailer entries
//! (`/Root`, `/Info`, `/ID`) the file-level writer needs. The indirect-object
//! table preserves insertion order so that collection and serialization are
//! reproducible.

use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashMap;
use std::io::Write;

/// An object value bound to an identity and a file position.
///
/// `byte_position` is 0 until the layout phase assigns the offset at which
/// the object's serialized envelope begins in the output file.
#[derive(Debug, Clone)]
pub struct IndirectObject {
    /// Object identity (number and generation)
    pub id: ObjectRef,
    /// The object's value
    pub value: Object,
    /// Byte offset of the serialized envelope in the output file
    pub byte_position: u64,
}

/// An in-memory PDF document.
#[derive(Debug, Clone, Default)]
pub struct PdfDocument {
    version: (u8, u8),
    objects: Vec<IndirectObject>,
    index: HashMap<u32, usize>,
    pages: Vec<ObjectRef>,
    trailer: Dictionary,
    next_id: u32,
}

impl PdfDocument {
    /// Create an empty document with the given declared PDF version.
    pub fn new(major: u8, minor: u8) -> Self {
        Self {
            version: (major, minor),
            objects: Vec::new(),
            index: HashMap::new(),
            pages: Vec::new(),
            trailer: Dictionary::new(),
            next_id: 1,
        }
    }

    /// Declared PDF version as `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Set the declared PDF version.
    pub fn set_version(&mut self, major: u8, minor: u8) {
        self.version = (major, minor);
    }

    /// Insert a new indirect object, allocating the next object number.
    pub fn insert(&mut self, value: Object) -> ObjectRef {
        let id = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        self.index.insert(id.id, self.objects.len());
        self.objects.push(IndirectObject {
            id,
            value,
            byte_position: 0,
        });
        id
    }

    /// Reserve an object number whose value will be supplied later.
    ///
    /// The reserved slot holds `null` until [`PdfDocument::replace`] fills it
    /// in; this is how mutually-referencing objects are built.
    pub fn reserve(&mut self) -> ObjectRef {
        self.insert(Object::Null)
    }

    /// Replace the value of an existing object. Returns false when the
    /// reference does not name a live object.
    pub fn replace(&mut self, id: ObjectRef, value: Object) -> bool {
        match self.slot_of(id) {
            Some(slot) => {
                self.objects[slot].value = value;
                true
            }
            None => false,
        }
    }

    /// Look up an object by exact identity (number and generation).
    pub fn get(&self, id: ObjectRef) -> Option<&IndirectObject> {
        self.slot_of(id).map(|slot| &self.objects[slot])
    }

    /// Mutable lookup by exact identity.
    pub fn get_mut(&mut self, id: ObjectRef) -> Option<&mut IndirectObject> {
        self.slot_of(id).map(move |slot| &mut self.objects[slot])
    }

    /// Whether any live object carries this object number, regardless of
    /// generation. A hit with a generation mismatch means the reference names
    /// an object from a different document revision.
    pub fn contains_number(&self, number: u32) -> bool {
        self.index.contains_key(&number)
    }

    /// Iterate live objects in insertion order.
    pub fn objects(&self) -> impl Iterator<Item = &IndirectObject> {
        self.objects.iter()
    }

    /// Number of live indirect objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the object table is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Ordered page list.
    pub fn pages(&self) -> &[ObjectRef] {
        &self.pages
    }

    /// Append a page object reference to the page list.
    pub fn add_page(&mut self, page: ObjectRef) {
        self.pages.push(page);
    }

    /// Trailer dictionary (`/Root`, `/Info`, `/ID`).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Set the catalog (`/Root`) reference.
    pub fn set_catalog(&mut self, catalog: ObjectRef) {
        self.trailer
            .insert("Root".to_string(), Object::Reference(catalog));
    }

    /// Set the document information (`/Info`) reference.
    pub fn set_info(&mut self, info: ObjectRef) {
        self.trailer
            .insert("Info".to_string(), Object::Reference(info));
    }

    /// Set the file identifier (`/ID`) as a pair of byte strings.
    pub fn set_id(&mut self, first: Vec<u8>, second: Vec<u8>) {
        self.trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(first), Object::String(second)]),
        );
    }

    /// The catalog reference from the trailer, if one has been set.
    pub fn catalog_ref(&self) -> Option<ObjectRef> {
        self.trailer.get("Root").and_then(Object::as_reference)
    }

    /// The document-information reference from the trailer, if any.
    pub fn info_ref(&self) -> Option<ObjectRef> {
        self.trailer.get("Info").and_then(Object::as_reference)
    }

    /// The `/ID` array from the trailer, if any.
    pub fn id_array(&self) -> Option<&Object> {
        self.trailer.get("ID")
    }

    /// Emit the PDF header: version line plus the binary-marker comment
    /// (four bytes above 0x80) that keeps transfer agents treating the file
    /// as binary.
    pub fn write_header<W: Write>(&self, w: &mut W) -> Result<()> {
        write!(w, "%PDF-{}.{}\n", self.version.0, self.version.1)?;
        w.write_all(b"%\x80\x80\x80\x80\n")?;
        Ok(())
    }

    /// Byte length of the header emitted by [`PdfDocument::write_header`].
    pub fn header_len(&self) -> u64 {
        (format!("%PDF-{}.{}\n", self.version.0, self.version.1).len() + 6) as u64
    }

    /// Renumber live objects according to `map` (old identity to new object
    /// number), resetting generations to 0 and rewriting every reference
    /// leaf. Objects absent from the map are unreachable in the renumbered
    /// document and are dropped from the table.
    ///
    /// This consumes the old numbering: after a failed write the document
    /// must not be reused.
    pub(crate) fn apply_renumbering(&mut self, map: &HashMap<ObjectRef, u32>) {
        let before = self.objects.len();
        self.objects.retain(|obj| map.contains_key(&obj.id));
        if self.objects.len() < before {
            log::debug!(
                "dropping {} unreachable objects during renumbering",
                before - self.objects.len()
            );
        }

        for obj in &mut self.objects {
            let new_id = map[&obj.id];
            obj.id = ObjectRef::new(new_id, 0);
            remap_references(&mut obj.value, map);
        }

        for page in &mut self.pages {
            if let Some(&new_id) = map.get(page) {
                *page = ObjectRef::new(new_id, 0);
            }
        }

        for (_, value) in self.trailer.iter_mut() {
            remap_references(value, map);
        }

        self.index.clear();
        for (slot, obj) in self.objects.iter().enumerate() {
            self.index.insert(obj.id.id, slot);
        }
        self.next_id = self.objects.len() as u32 + 1;
    }

    fn slot_of(&self, id: ObjectRef) -> Option<usize> {
        let slot = *self.index.get(&id.id)?;
        if self.objects[slot].id == id {
            Some(slot)
        } else {
            None
        }
    }
}

/// Rewrite every reference leaf of `value` through `map`. References without
/// a mapping (targets skipped during collection) are left untouched.
fn remap_references(value: &mut Object, map: &HashMap<ObjectRef, u32>) {
    match value {
        Object::Reference(r) => {
            if let Some(&new_id) = map.get(r) {
                *r = ObjectRef::new(new_id, 0);
            }
        }
        Object::Array(items) => {
            for item in items {
                remap_references(item, map);
            }
        }
        Object::Dictionary(dict) => {
            for (_, v) in dict.iter_mut() {
                remap_references(v, map);
            }
        }
        Object::Stream { dict, .. } => {
            for (_, v) in dict.iter_mut() {
                remap_references(v, map);
            }
        }
        _ => {}
    }
}

/// Emit the file terminator for a cross-reference section: `startxref`, the
/// decimal offset of the table, and `%%EOF`.
pub fn write_eof<W: Write>(w: &mut W, xref_offset: u64) -> Result<()> {
    write!(w, "startxref\n{}\n%%EOF\n", xref_offset)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut doc = PdfDocument::new(1, 4);
        let r = doc.insert(Object::Integer(42));
        assert_eq!(r, ObjectRef::new(1, 0));
        assert_eq!(doc.get(r).unwrap().value.as_integer(), Some(42));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_generation_mismatch_is_not_a_hit() {
        let mut doc = PdfDocument::new(1, 4);
        let r = doc.insert(Object::Integer(1));
        assert!(doc.get(ObjectRef::new(r.id, 3)).is_none());
        assert!(doc.contains_number(r.id));
        assert!(!doc.contains_number(99));
    }

    #[test]
    fn test_reserve_then_replace() {
        let mut doc = PdfDocument::new(1, 4);
        let r = doc.reserve();
        assert!(doc.get(r).unwrap().value.is_null());
        assert!(doc.replace(r, Object::Boolean(true)));
        assert_eq!(doc.get(r).unwrap().value.as_bool(), Some(true));
        assert!(!doc.replace(ObjectRef::new(50, 0), Object::Null));
    }

    #[test]
    fn test_header_bytes() {
        let doc = PdfDocument::new(1, 5);
        let mut out = Vec::new();
        doc.write_header(&mut out).unwrap();
        assert_eq!(out, b"%PDF-1.5\n%\x80\x80\x80\x80\n");
        assert_eq!(doc.header_len(), out.len() as u64);
    }

    #[test]
    fn test_write_eof() {
        let mut out = Vec::new();
        write_eof(&mut out, 12345).unwrap();
        assert_eq!(out, b"startxref\n12345\n%%EOF\n");
    }

    #[test]
    fn test_apply_renumbering_rewrites_references() {
        let mut doc = PdfDocument::new(1, 4);
        let a = doc.reserve();
        let b = doc.insert(Object::Integer(7));
        doc.replace(
            a,
            Object::Array(vec![Object::Reference(b), Object::Integer(0)]),
        );
        doc.set_catalog(a);
        doc.add_page(b);

        let mut map = HashMap::new();
        map.insert(a, 2u32);
        map.insert(b, 1u32);
        doc.apply_renumbering(&map);

        assert_eq!(doc.catalog_ref(), Some(ObjectRef::new(2, 0)));
        assert_eq!(doc.pages(), &[ObjectRef::new(1, 0)]);
        let renamed = doc.get(ObjectRef::new(2, 0)).unwrap();
        let arr = renamed.value.as_array().unwrap();
        assert_eq!(arr[0].as_reference(), Some(ObjectRef::new(1, 0)));
    }

    #[test]
    fn test_apply_renumbering_drops_unmapped_objects() {
        let mut doc = PdfDocument::new(1, 4);
        let keep = doc.insert(Object::Integer(1));
        let _orphan = doc.insert(Object::Integer(2));

        let mut map = HashMap::new();
        map.insert(keep, 1u32);
        doc.apply_renumbering(&map);

        assert_eq!(doc.len(), 1);
        assert_eq!(
            doc.get(ObjectRef::new(1, 0)).unwrap().value.as_integer(),
            Some(1)
        );
    }
}
