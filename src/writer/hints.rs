//! Hint table encoding for linearized PDFs.
//!
//! Produces the two required hint tables of ISO 32000-1:2008 Annex F: the
//! page offset hint table (Table F.3/F.4) and the shared object hint table
//! (Table F.5/F.6). Both consist of byte-aligned big-endian header fields
//! followed by bit-packed per-entry arrays; each array is emitted
//! contiguously across all entries before the next array starts.
//!
//! The encoded length depends only on entry counts and object sizes, never
//! on absolute byte offsets (the offset-valued header fields are fixed-width
//! 32-bit integers). The layout phase relies on this to size the hint stream
//! before final offsets exist, then re-encodes with the final values.

use super::bitwriter::BitWriter;

/// Per-page record for the page offset hint table.
#[derive(Debug, Clone, Default)]
pub struct PageHintRecord {
    /// Number of objects in the page's section of the file.
    pub object_count: u32,
    /// Total serialized length of those objects in bytes.
    pub page_length: u32,
    /// Indices into the shared-object table for every shared object the
    /// page references, in discovery order.
    pub shared_refs: Vec<u32>,
    /// Offset of the page's first content stream relative to the start of
    /// the page's object group.
    pub content_offset: u32,
    /// Serialized length of that content stream object.
    pub content_length: u32,
}

/// Per-entry record for the shared object hint table.
#[derive(Debug, Clone, Default)]
pub struct SharedHintRecord {
    /// Serialized length of the shared object in bytes. Each group holds
    /// exactly one object, so this is also the group length.
    pub length: u32,
}

/// Summary records for both hint tables.
#[derive(Debug, Clone, Default)]
pub struct HintTables {
    /// Byte offset of the first page's page object in the file.
    pub first_page_object_offset: u32,
    /// Object number of the first entry in the shared-object section.
    pub first_shared_number: u32,
    /// Byte offset of the first shared object in the file.
    pub first_shared_offset: u32,
    /// One record per page, page 0 first.
    pub pages: Vec<PageHintRecord>,
    /// One record per shared object, in shared-section order.
    pub shared: Vec<SharedHintRecord>,
}

/// Encoded hint stream payload.
#[derive(Debug, Clone)]
pub struct EncodedHintTables {
    /// Concatenated page-offset and shared-object tables.
    pub data: Vec<u8>,
    /// Zero-based offset of the shared object hint table within `data`;
    /// this is the value of the hint stream's `/S` entry.
    pub shared_table_offset: usize,
}

impl HintTables {
    /// Create empty hint tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode both tables into the hint stream payload.
    pub fn encode(&self) -> EncodedHintTables {
        let mut data = self.encode_page_offsets();
        let shared_table_offset = data.len();
        data.extend(self.encode_shared_objects());
        EncodedHintTables {
            data,
            shared_table_offset,
        }
    }

    fn encode_page_offsets(&self) -> Vec<u8> {
        let (min_objects, bits_objects) =
            delta_encoding(&collect(&self.pages, |p| p.object_count));
        let (min_length, bits_length) = delta_encoding(&collect(&self.pages, |p| p.page_length));
        let (min_content_offset, bits_content_offset) =
            delta_encoding(&collect(&self.pages, |p| p.content_offset));
        let (min_content_length, bits_content_length) =
            delta_encoding(&collect(&self.pages, |p| p.content_length));

        let max_shared_count = self
            .pages
            .iter()
            .map(|p| p.shared_refs.len() as u32)
            .max()
            .unwrap_or(0);
        let bits_shared_count = bits_needed(max_shared_count);
        let max_shared_id = self
            .pages
            .iter()
            .flat_map(|p| p.shared_refs.iter().copied())
            .max()
            .unwrap_or(0);
        let bits_shared_id = bits_needed(max_shared_id);

        let mut w = BitWriter::new();
        // 13-field header, Table F.3 order
        w.write_u32(min_objects);
        w.write_u32(self.first_page_object_offset);
        w.write_u16(bits_objects as u16);
        w.write_u32(min_length);
        w.write_u16(bits_length as u16);
        w.write_u32(min_content_offset);
        w.write_u16(bits_content_offset as u16);
        w.write_u32(min_content_length);
        w.write_u16(bits_content_length as u16);
        w.write_u16(bits_shared_count as u16);
        w.write_u16(bits_shared_id as u16);
        w.write_u16(0); // bits per fractional-position numerator
        w.write_u16(1); // fractional-position denominator

        // Per-page arrays, each contiguous across all pages
        for p in &self.pages {
            w.write_bits((p.object_count - min_objects) as u64, bits_objects);
        }
        for p in &self.pages {
            w.write_bits((p.page_length - min_length) as u64, bits_length);
        }
        for p in &self.pages {
            w.write_bits(p.shared_refs.len() as u64, bits_shared_count);
        }
        for p in &self.pages {
            for &id in &p.shared_refs {
                w.write_bits(id as u64, bits_shared_id);
            }
        }
        for p in &self.pages {
            for _ in &p.shared_refs {
                w.write_bits(0, 0); // numerators, degenerate width
            }
        }
        for p in &self.pages {
            w.write_bits(
                (p.content_offset - min_content_offset) as u64,
                bits_content_offset,
            );
        }
        for p in &self.pages {
            w.write_bits(
                (p.content_length - min_content_length) as u64,
                bits_content_length,
            );
        }

        w.finish()
    }

    fn encode_shared_objects(&self) -> Vec<u8> {
        let (min_length, bits_length) = delta_encoding(&collect(&self.shared, |e| e.length));

        let mut w = BitWriter::new();
        // 6-field header, Table F.5 order
        w.write_u32(self.first_shared_number);
        w.write_u32(self.first_shared_offset);
        // Shared objects never live in the first-page section, so the
        // first-page entry count is always zero.
        w.write_u32(0);
        w.write_u32(self.shared.len() as u32);
        w.write_u32(min_length);
        w.write_u16(bits_length as u16);

        for e in &self.shared {
            w.write_bits((e.length - min_length) as u64, bits_length);
        }
        for _ in &self.shared {
            w.write_bits(0, 1); // signature flag
        }
        for _ in &self.shared {
            w.write_bits(0, 1); // group-size flag: one object per group
        }

        w.finish()
    }
}

fn collect<T, F: Fn(&T) -> u32>(items: &[T], f: F) -> Vec<u32> {
    items.iter().map(f).collect()
}

/// Number of bits needed to represent a non-negative value; zero has width 1.
pub fn bits_needed(value: u32) -> u8 {
    if value == 0 {
        1
    } else {
        (32 - value.leading_zeros()) as u8
    }
}

/// Minimum and delta bit width for a set of values.
pub fn delta_encoding(values: &[u32]) -> (u32, u8) {
    if values.is_empty() {
        return (0, 1);
    }

    let min = *values.iter().min().unwrap_or(&0);
    let max_delta = values.iter().map(|&v| v - min).max().unwrap_or(0);

    (min, bits_needed(max_delta))
}
