//! End-to-end tests for the linearized writer.
//!
//! Documents are built in memory, written, and the produced bytes are
//! checked against the file-format guarantees: declared offsets must equal
//! actual offsets, the linearization dictionary must lead the file, and the
//! hint tables must describe the page partition.

use pdf_linearize::writer::{LinearizedWriter, ObjectSerializer};
use pdf_linearize::{Error, Object, ObjectRef, PdfDocument};

// ---------------------------------------------------------------------------
// Document builders
// ---------------------------------------------------------------------------

const HELLO_CONTENT: &[u8] = b"BT /F1 12 Tf 100 700 Td (Hi) Tj ET";

fn helvetica() -> Object {
    ObjectSerializer::dict(vec![
        ("Type", ObjectSerializer::name("Font")),
        ("Subtype", ObjectSerializer::name("Type1")),
        ("BaseFont", ObjectSerializer::name("Helvetica")),
    ])
}

fn page_dict(pages: ObjectRef, content: ObjectRef, font: ObjectRef) -> Object {
    ObjectSerializer::dict(vec![
        ("Type", ObjectSerializer::name("Page")),
        ("Parent", Object::Reference(pages)),
        (
            "MediaBox",
            Object::Array(vec![
                ObjectSerializer::integer(0),
                ObjectSerializer::integer(0),
                ObjectSerializer::integer(612),
                ObjectSerializer::integer(792),
            ]),
        ),
        ("Contents", Object::Reference(content)),
        (
            "Resources",
            ObjectSerializer::dict(vec![(
                "Font",
                ObjectSerializer::dict(vec![("F1", Object::Reference(font))]),
            )]),
        ),
    ])
}

fn content_stream(data: &'static [u8]) -> Object {
    Object::Stream {
        dict: Default::default(),
        data: bytes::Bytes::from_static(data),
    }
}

/// One page, one content stream, one Type1 font.
fn hello_world() -> PdfDocument {
    let mut doc = PdfDocument::new(1, 4);
    let catalog = doc.reserve();
    let pages = doc.reserve();
    let page = doc.reserve();
    let content = doc.insert(content_stream(HELLO_CONTENT));
    let font = doc.insert(helvetica());

    doc.replace(
        catalog,
        ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Catalog")),
            ("Pages", Object::Reference(pages)),
        ]),
    );
    doc.replace(
        pages,
        ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Pages")),
            ("Kids", Object::Array(vec![Object::Reference(page)])),
            ("Count", ObjectSerializer::integer(1)),
        ]),
    );
    doc.replace(page, page_dict(pages, content, font));

    doc.set_catalog(catalog);
    doc.set_id(vec![0x11; 16], vec![0x22; 16]);
    doc.add_page(page);
    doc
}

/// Two pages with private content streams sharing one font object.
fn two_page_shared_font() -> PdfDocument {
    let mut doc = PdfDocument::new(1, 4);
    let catalog = doc.reserve();
    let pages = doc.reserve();
    let page0 = doc.reserve();
    let page1 = doc.reserve();
    let content0 = doc.insert(content_stream(b"BT /F1 12 Tf 72 720 Td (one) Tj ET"));
    let content1 = doc.insert(content_stream(b"BT /F1 12 Tf 72 720 Td (two) Tj ET"));
    let font = doc.insert(helvetica());

    doc.replace(
        catalog,
        ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Catalog")),
            ("Pages", Object::Reference(pages)),
        ]),
    );
    doc.replace(
        pages,
        ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Pages")),
            (
                "Kids",
                Object::Array(vec![Object::Reference(page0), Object::Reference(page1)]),
            ),
            ("Count", ObjectSerializer::integer(2)),
        ]),
    );
    doc.replace(page0, page_dict(pages, content0, font));
    doc.replace(page1, page_dict(pages, content1, font));

    doc.set_catalog(catalog);
    doc.set_id(vec![0x33; 16], vec![0x44; 16]);
    doc.add_page(page0);
    doc.add_page(page1);
    doc
}

fn linearize(doc: &mut PdfDocument) -> Vec<u8> {
    let mut out = Vec::new();
    LinearizedWriter::new()
        .write(doc, &mut out)
        .expect("linearized write failed");
    out
}

// ---------------------------------------------------------------------------
// Byte-level inspection helpers
// ---------------------------------------------------------------------------

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

/// Parse the decimal integer immediately following the first occurrence of
/// `key`.
fn int_after(bytes: &[u8], key: &str) -> u64 {
    let at = find(bytes, key.as_bytes()).unwrap_or_else(|| panic!("missing `{}`", key));
    digits_at(bytes, at + key.len())
}

fn digits_at(bytes: &[u8], mut i: usize) -> u64 {
    let mut value = 0u64;
    assert!(bytes[i].is_ascii_digit(), "expected digits at {}", i);
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value * 10 + u64::from(bytes[i] - b'0');
        i += 1;
    }
    value
}

/// Parse a classical cross-reference table starting at `offset` into
/// `(object_number, offset, kind)` entries.
fn parse_xref(bytes: &[u8], offset: usize) -> Vec<(u32, u64, u8)> {
    assert_eq!(&bytes[offset..offset + 5], b"xref\n", "no xref at {}", offset);
    let header_start = offset + 5;
    let header_len = bytes[header_start..]
        .iter()
        .position(|&b| b == b'\n')
        .unwrap();
    let header = std::str::from_utf8(&bytes[header_start..header_start + header_len]).unwrap();
    let mut parts = header.split(' ');
    let first: u32 = parts.next().unwrap().parse().unwrap();
    let count: u32 = parts.next().unwrap().parse().unwrap();

    let mut entries = Vec::new();
    let mut i = header_start + header_len + 1;
    for k in 0..count {
        let entry = &bytes[i..i + 20];
        let off: u64 = std::str::from_utf8(&entry[..10]).unwrap().parse().unwrap();
        assert_eq!(&entry[18..], b" \n", "entry not 20 bytes with ` \\n` tail");
        entries.push((first + k, off, entry[17]));
        i += 20;
    }
    entries
}

/// Offsets of the two cross-reference tables: (first-page, main).
fn xref_offsets(bytes: &[u8]) -> (u64, u64) {
    let first = find(bytes, b"startxref\n").expect("no first startxref");
    let main = rfind(bytes, b"startxref\n").expect("no last startxref");
    assert_ne!(first, main, "expected two startxref markers");
    (
        digits_at(bytes, first + 10),
        digits_at(bytes, main + 10),
    )
}

/// Hint stream payload and its `/S` value.
fn hint_stream_body(bytes: &[u8]) -> (Vec<u8>, usize) {
    let h_offset = int_after(bytes, "/H [") as usize;
    let h_length = digits_at(bytes, find(bytes, b"/H [").unwrap() + 15) as usize;
    let envelope = &bytes[h_offset..h_offset + h_length];
    let s = int_after(envelope, "/S ") as usize;
    let body_start = find(envelope, b"stream\n").unwrap() + 7;
    let body_end = rfind(envelope, b"\nendstream").unwrap();
    (envelope[body_start..body_end].to_vec(), s)
}

fn be32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(data[at..at + 4].try_into().unwrap())
}

// ---------------------------------------------------------------------------
// Single page ("hello world")
// ---------------------------------------------------------------------------

#[test]
fn test_file_prefix_is_header_then_linearization_dict() {
    let out = linearize(&mut hello_world());
    let expected: &[u8] = b"%PDF-1.4\n%\x80\x80\x80\x80\n1 0 obj\n<</Linearized 1/L ";
    assert_eq!(&out[..expected.len()], expected);
}

#[test]
fn test_declared_file_length_matches_output() {
    let out = linearize(&mut hello_world());
    assert_eq!(int_after(&out, "/L "), out.len() as u64);
}

#[test]
fn test_exactly_two_terminators() {
    let out = linearize(&mut hello_world());
    assert_eq!(count_occurrences(&out, b"startxref\n"), 2);
    assert_eq!(count_occurrences(&out, b"%%EOF"), 2);
    assert!(out.ends_with(b"%%EOF\n"));
}

#[test]
fn test_page_count_declared() {
    let out = linearize(&mut hello_world());
    assert_eq!(int_after(&out, "/N "), 1);
}

#[test]
fn test_hint_stream_sits_at_declared_offset() {
    let out = linearize(&mut hello_world());
    let h_offset = int_after(&out, "/H [") as usize;
    let h_length = digits_at(&out, find(&out, b"/H [").unwrap() + 15) as usize;

    let envelope = &out[h_offset..h_offset + h_length];
    assert!(find(envelope, b" 0 obj\n").is_some());
    assert!(find(envelope, b"/S ").is_some());
    assert!(envelope.ends_with(b"endobj\n"));
}

#[test]
fn test_first_page_ends_where_hint_stream_begins() {
    let out = linearize(&mut hello_world());
    assert_eq!(int_after(&out, "/E "), int_after(&out, "/H ["));
}

#[test]
fn test_t_names_whitespace_before_first_main_entry() {
    let out = linearize(&mut hello_world());
    let t = int_after(&out, "/T ") as usize;
    assert_eq!(out[t], b'\n');
    assert_eq!(&out[t + 1..t + 21], b"0000000000 65535 f \n");

    // T sits inside the subsection header of the main table.
    let (_, main) = xref_offsets(&out);
    assert_eq!(&out[main as usize..main as usize + 5], b"xref\n");
    assert!(main < t as u64 && (t as u64) < main + 20);
}

#[test]
fn test_xref_entries_match_object_positions() {
    let out = linearize(&mut hello_world());
    let (first_page, main) = xref_offsets(&out);

    for table in [first_page, main] {
        let entries = parse_xref(&out, table as usize);
        assert_eq!(entries[0], (0, 0, b'f'));
        for (num, offset, kind) in entries.into_iter().skip(1) {
            assert_eq!(kind, b'n');
            let envelope = format!("{} 0 obj\n", num);
            assert_eq!(
                &out[offset as usize..offset as usize + envelope.len()],
                envelope.as_bytes(),
                "object {} not at its declared offset",
                num
            );
        }
    }
}

#[test]
fn test_positions_are_strictly_increasing() {
    let out = linearize(&mut hello_world());
    let (_, main) = xref_offsets(&out);
    let offsets: Vec<u64> = parse_xref(&out, main as usize)
        .into_iter()
        .skip(1)
        .map(|(_, off, _)| off)
        .collect();
    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), offsets.len(), "duplicate object offsets");
    assert_eq!(offsets, sorted, "emission order must follow object numbers");
    assert_eq!(offsets.first().copied().unwrap(), 15); // right past the header
}

#[test]
fn test_every_object_emitted_once() {
    let out = linearize(&mut hello_world());
    let size = int_after(&out, "/Size ");
    assert_eq!(count_occurrences(&out, b" 0 obj\n") as u64, size - 1);
}

#[test]
fn test_o_names_the_first_page_object() {
    let out = linearize(&mut hello_world());
    let o = int_after(&out, "/O ");
    let (_, main) = xref_offsets(&out);
    let entries = parse_xref(&out, main as usize);
    let (_, offset, _) = entries[o as usize];

    let prefix = format!("{} 0 obj\n<</Type /Page", o);
    assert_eq!(
        &out[offset as usize..offset as usize + prefix.len()],
        prefix.as_bytes()
    );
}

#[test]
fn test_single_page_shared_table_is_empty() {
    let out = linearize(&mut hello_world());
    let (body, s) = hint_stream_body(&out);
    let soht = &body[s..];

    assert_eq!(be32(soht, 8), 0, "first-page shared count");
    assert_eq!(be32(soht, 12), 0, "total shared count");
    assert_eq!(soht.len(), 22, "zero entries carry no per-entry arrays");
}

#[test]
fn test_page_offset_table_covers_first_page_section() {
    let out = linearize(&mut hello_world());
    let (body, _) = hint_stream_body(&out);
    // linearization dict + catalog + pages root + page + content + font
    assert_eq!(be32(&body, 0), 6, "minimum objects per page");
    // single page: every delta width collapses to 1 bit
    assert_eq!(&body[8..10], &[0, 1], "object-count delta width");
}

#[test]
fn test_file_id_preserved_in_both_trailers() {
    let out = linearize(&mut hello_world());
    let id_hex = "11".repeat(16).to_uppercase();
    assert_eq!(
        count_occurrences(&out, format!("<{}>", id_hex).as_bytes()),
        2,
        "ID must appear in the first-page trailer and the main trailer"
    );
}

#[test]
fn test_first_page_trailer_prev_names_main_table() {
    let out = linearize(&mut hello_world());
    let (_, main) = xref_offsets(&out);
    assert_eq!(int_after(&out, "/Prev "), main);
    assert_eq!(count_occurrences(&out, b"/Prev "), 1, "main trailer has no /Prev");
}

#[test]
fn test_output_is_deterministic() {
    let first = linearize(&mut hello_world());
    let second = linearize(&mut hello_world());
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Two pages with a shared font
// ---------------------------------------------------------------------------

#[test]
fn test_shared_font_lands_in_shared_section() {
    let out = linearize(&mut two_page_shared_font());
    let (body, s) = hint_stream_body(&out);
    let soht = &body[s..];

    assert_eq!(be32(soht, 8), 0, "first-page shared count");
    assert_eq!(be32(soht, 12), 1, "the font is the single shared entry");

    // The shared section comes last, so the font carries the highest number.
    let size = int_after(&out, "/Size ");
    let (_, main) = xref_offsets(&out);
    let entries = parse_xref(&out, main as usize);
    let (num, offset, _) = *entries.last().unwrap();
    assert_eq!(u64::from(num), size - 1);
    let font_slice = &out[offset as usize..];
    let end = find(font_slice, b"endobj").unwrap();
    assert!(find(&font_slice[..end], b"/BaseFont /Helvetica").is_some());

    // The shared table's first-object fields point at that font.
    assert_eq!(be32(soht, 0), num);
    assert_eq!(u64::from(be32(soht, 4)), offset);
}

#[test]
fn test_two_pages_declared_and_first_page_excludes_second() {
    let mut doc = two_page_shared_font();
    let out = linearize(&mut doc);
    assert_eq!(int_after(&out, "/N "), 2);

    // Everything before the end of the first page belongs to page one.
    let first_page_end = int_after(&out, "/E ") as usize;
    let prefix = &out[..first_page_end];
    assert!(find(prefix, b"(one)").is_some());
    assert!(find(prefix, b"(two)").is_none());
    assert!(find(&out[first_page_end..], b"(two)").is_some());
}

#[test]
fn test_first_page_xref_covers_prefix_objects_only() {
    let out = linearize(&mut two_page_shared_font());
    let (first_page, main) = xref_offsets(&out);

    let fp_entries = parse_xref(&out, first_page as usize);
    let main_entries = parse_xref(&out, main as usize);
    assert!(fp_entries.len() < main_entries.len());

    // The first-page table ends with the hint stream object, which sits at
    // the declared hint offset.
    let (num, offset, _) = *fp_entries.last().unwrap();
    assert_eq!(offset, int_after(&out, "/H ["));
    let envelope = format!("{} 0 obj\n", num);
    assert_eq!(
        &out[offset as usize..offset as usize + envelope.len()],
        envelope.as_bytes()
    );
}

#[test]
fn test_shared_font_output_invariants_hold_too() {
    let out = linearize(&mut two_page_shared_font());
    assert_eq!(int_after(&out, "/L "), out.len() as u64);

    let (first_page, main) = xref_offsets(&out);
    for table in [first_page, main] {
        for (num, offset, kind) in parse_xref(&out, table as usize).into_iter().skip(1) {
            assert_eq!(kind, b'n');
            let envelope = format!("{} 0 obj\n", num);
            assert_eq!(
                &out[offset as usize..offset as usize + envelope.len()],
                envelope.as_bytes()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Failure paths and persistence
// ---------------------------------------------------------------------------

#[test]
fn test_zero_page_document_fails_without_output() {
    let mut doc = PdfDocument::new(1, 4);
    let catalog = doc.insert(ObjectSerializer::dict(vec![(
        "Type",
        ObjectSerializer::name("Catalog"),
    )]));
    doc.set_catalog(catalog);

    let mut out = Vec::new();
    let err = LinearizedWriter::new().write(&mut doc, &mut out).unwrap_err();
    assert!(matches!(err, Error::EmptyDocument));
    assert!(out.is_empty(), "no bytes may reach the sink");
}

#[test]
fn test_dangling_reference_fails_without_output() {
    let mut doc = hello_world();
    let page = doc.pages()[0];
    let mut value = doc.get(page).unwrap().value.clone();
    if let Object::Dictionary(dict) = &mut value {
        dict.insert(
            "Annots".to_string(),
            Object::Reference(ObjectRef::new(77, 0)),
        );
    }
    doc.replace(page, value);

    let mut out = Vec::new();
    let err = LinearizedWriter::new().write(&mut doc, &mut out).unwrap_err();
    assert!(matches!(err, Error::DanglingReference(r) if r.id == 77));
    assert!(out.is_empty());
}

#[test]
fn test_save_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linearized.pdf");
    LinearizedWriter::save(&mut hello_world(), &path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4\n"));
    assert_eq!(int_after(&bytes, "/L "), bytes.len() as u64);
}
