//! Object graph partitioning for linearization.
//!
//! Computes the transitive closure of every page and partitions the
//! reachable objects into document-level, first-page-exclusive, shared, and
//! per-remaining-page sets with a stable ordering. Traversal follows
//! dictionary values in insertion order and array elements in element order,
//! so the partition is reproducible across runs.

use crate::document::{IndirectObject, PdfDocument};
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use std::collections::{HashMap, HashSet};

/// The partition of live objects produced by collection.
///
/// Every reachable object appears in exactly one of `doc_level`,
/// `first_page`, `remaining[p]`, or `shared`.
#[derive(Debug, Clone, Default)]
pub struct ObjectSets {
    /// Catalog, pages-tree root, document info and outlines root, in
    /// discovery order with duplicates removed.
    pub doc_level: Vec<ObjectRef>,
    /// Objects in the closure of page 0 that are neither document-level nor
    /// shared.
    pub first_page: Vec<ObjectRef>,
    /// Exclusive objects of pages `1..page_count`; index 0 holds page 1.
    pub remaining: Vec<Vec<ObjectRef>>,
    /// Objects reachable from two or more distinct page closures.
    pub shared: Vec<ObjectRef>,
    /// For every page, the indices into `shared` of the shared objects its
    /// closure references, in closure order.
    pub page_shared: Vec<Vec<u32>>,
}

impl ObjectSets {
    /// All classified objects in section order: document-level, first-page,
    /// remaining pages, shared.
    pub fn classified(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.doc_level
            .iter()
            .chain(self.first_page.iter())
            .chain(self.remaining.iter().flatten())
            .chain(self.shared.iter())
            .copied()
    }

    /// Number of classified objects.
    pub fn classified_count(&self) -> usize {
        self.doc_level.len()
            + self.first_page.len()
            + self.remaining.iter().map(Vec::len).sum::<usize>()
            + self.shared.len()
    }

    /// Map every reference in the partition through a renumbering.
    pub(crate) fn renumbered(&self, map: &HashMap<ObjectRef, u32>) -> ObjectSets {
        let remap = |refs: &[ObjectRef]| -> Vec<ObjectRef> {
            refs.iter().map(|r| ObjectRef::new(map[r], 0)).collect()
        };
        ObjectSets {
            doc_level: remap(&self.doc_level),
            first_page: remap(&self.first_page),
            remaining: self.remaining.iter().map(|g| remap(g)).collect(),
            shared: remap(&self.shared),
            page_shared: self.page_shared.clone(),
        }
    }
}

/// Computes per-page transitive closures and classifies reachable objects.
pub struct ObjectCollector<'a> {
    document: &'a PdfDocument,
}

impl<'a> ObjectCollector<'a> {
    /// Create a collector over a document.
    pub fn new(document: &'a PdfDocument) -> Self {
        Self { document }
    }

    /// Partition the document's reachable objects.
    pub fn collect(&self) -> Result<ObjectSets> {
        let pages = self.document.pages();
        if pages.is_empty() {
            return Err(Error::EmptyDocument);
        }

        let doc_level = self.doc_level_seeds()?;
        let doc_set: HashSet<ObjectRef> = doc_level.iter().copied().collect();

        let mut closures = Vec::with_capacity(pages.len());
        for &page in pages {
            self.resolve_required(page)?;
            closures.push(self.closure_of(page, &doc_set)?);
        }

        let mut membership: HashMap<ObjectRef, u32> = HashMap::new();
        for closure in &closures {
            for &r in closure {
                *membership.entry(r).or_default() += 1;
            }
        }

        let mut sets = ObjectSets {
            doc_level,
            ..Default::default()
        };
        let mut classified: HashSet<ObjectRef> = doc_set;

        // Page 0: exclusive objects stay in the first-page section, anything
        // another page also reaches moves to the shared section.
        for &r in &closures[0] {
            if !classified.insert(r) {
                continue;
            }
            if membership[&r] >= 2 {
                sets.shared.push(r);
            } else {
                sets.first_page.push(r);
            }
        }

        // Remaining pages in page order.
        for closure in closures.iter().skip(1) {
            let mut exclusive = Vec::new();
            for &r in closure {
                if !classified.insert(r) {
                    continue;
                }
                if membership[&r] >= 2 {
                    sets.shared.push(r);
                } else {
                    exclusive.push(r);
                }
            }
            sets.remaining.push(exclusive);
        }

        // Per-page shared references, as indices into the shared section.
        let shared_index: HashMap<ObjectRef, u32> = sets
            .shared
            .iter()
            .enumerate()
            .map(|(i, &r)| (r, i as u32))
            .collect();
        for closure in &closures {
            let mut refs = Vec::new();
            let mut seen = HashSet::new();
            for r in closure {
                if let Some(&idx) = shared_index.get(r) {
                    if seen.insert(idx) {
                        refs.push(idx);
                    }
                }
            }
            sets.page_shared.push(refs);
        }

        log::debug!(
            "collected {} objects: {} doc-level, {} first-page, {} shared, {} pages",
            sets.classified_count(),
            sets.doc_level.len(),
            sets.first_page.len(),
            sets.shared.len(),
            closures.len()
        );
        Ok(sets)
    }

    /// Catalog, pages-tree root, info and outlines root, deduplicated.
    fn doc_level_seeds(&self) -> Result<Vec<ObjectRef>> {
        let catalog_ref = self
            .document
            .catalog_ref()
            .ok_or(Error::DanglingReference(ObjectRef::new(0, 0)))?;
        let catalog = self.resolve_required(catalog_ref)?;

        let pages_root = catalog
            .value
            .as_dict()
            .and_then(|d| d.get("Pages"))
            .and_then(Object::as_reference)
            .ok_or(Error::DanglingReference(catalog_ref))?;
        self.resolve_required(pages_root)?;

        let mut seeds = vec![catalog_ref, pages_root];

        if let Some(info) = self.document.info_ref() {
            self.resolve_required(info)?;
            seeds.push(info);
        }
        if let Some(outlines) = catalog
            .value
            .as_dict()
            .and_then(|d| d.get("Outlines"))
            .and_then(Object::as_reference)
        {
            self.resolve_required(outlines)?;
            seeds.push(outlines);
        }

        let mut seen = HashSet::new();
        seeds.retain(|r| seen.insert(*r));
        Ok(seeds)
    }

    /// Transitive closure of a page: iterative DFS over reference leaves in
    /// traversal order, tolerant of cycles.
    ///
    /// Document-level objects and pages-tree nodes are recorded but not
    /// expanded, and neither are other pages' page dictionaries; expanding
    /// through the pages tree would fold every sibling page into this
    /// closure.
    fn closure_of(&self, page: ObjectRef, doc_level: &HashSet<ObjectRef>) -> Result<Vec<ObjectRef>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![page];

        while let Some(r) = stack.pop() {
            if !visited.insert(r) {
                continue;
            }
            order.push(r);

            // Everything on the stack was resolved when it was pushed.
            let Some(target) = self.document.get(r) else {
                continue;
            };
            if !self.should_expand(r, target, page, doc_level) {
                continue;
            }

            let mut children = Vec::new();
            collect_reference_leaves(&target.value, &mut children);
            // Reverse so the stack pops children in traversal order.
            for child in children.into_iter().rev() {
                if child.id == 0 || visited.contains(&child) {
                    continue;
                }
                if self.document.get(child).is_none() {
                    if self.document.contains_number(child.id) {
                        log::warn!("skipping cross-document reference {}", child);
                        continue;
                    }
                    return Err(Error::DanglingReference(child));
                }
                stack.push(child);
            }
        }

        Ok(order)
    }

    fn should_expand(
        &self,
        r: ObjectRef,
        target: &IndirectObject,
        root: ObjectRef,
        doc_level: &HashSet<ObjectRef>,
    ) -> bool {
        if doc_level.contains(&r) {
            return false;
        }
        match target.value.as_dict().and_then(|d| d.get("Type")).and_then(Object::as_name) {
            Some("Pages") => false,
            Some("Page") => r == root,
            _ => true,
        }
    }

    fn resolve_required(&self, r: ObjectRef) -> Result<&IndirectObject> {
        match self.document.get(r) {
            Some(obj) => Ok(obj),
            None if self.document.contains_number(r.id) => {
                Err(Error::CrossDocumentReference(r))
            }
            None => Err(Error::DanglingReference(r)),
        }
    }
}

/// Gather the reference leaves of a value in traversal order.
fn collect_reference_leaves(value: &Object, out: &mut Vec<ObjectRef>) {
    match value {
        Object::Reference(r) => out.push(*r),
        Object::Array(items) => {
            for item in items {
                collect_reference_leaves(item, out);
            }
        }
        Object::Dictionary(dict) => {
            for (_, v) in dict {
                collect_reference_leaves(v, out);
            }
        }
        Object::Stream { dict, .. } => {
            for (_, v) in dict {
                collect_reference_leaves(v, out);
            }
        }
        _ => {}
    }
}
