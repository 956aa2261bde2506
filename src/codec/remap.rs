//! # String Remapping
//!
//! Heap data refers to strings by process-local interner ids: table keys are
//! [`HString`] ids and FilePath nodes carry a relative-name id. Neither is
//! meaningful in another process, so `save` rewrites every id into a
//! reference to a per-file string table and `load` rewrites them back.
//!
//! ```text
//!            save                                  load
//! runtime id ──────> string table reference ──────> runtime id
//!   (HString)          (ordinal or byte offset)      (re-interned)
//! ```
//!
//! ## String Tables
//!
//! Each file carries two tables, one for relative filenames and one for
//! table keys. A table is a run of NUL-terminated strings that always starts
//! with the empty string, so reference 0 is the empty string in both
//! reference schemes. New strings are appended on first encounter and get
//! the next 1-based ordinal (current format) or their byte offset (older
//! formats).
//!
//! ## Traversal
//!
//! [`remap_graph`] walks the graph from the root with an explicit worklist
//! of heap slots and rewrites ids in place. Every handle, header and extent
//! is bounds-checked first. A check that fails, or a reference the remapper
//! cannot resolve, stops that subtree only; the walk reports how many
//! subtrees it stopped. Each handle index is visited at most once, so
//! corrupted data with shared or cyclic references terminates.

use eyre::{bail, Result};
use hashbrown::HashMap;

use crate::config::{CONTAINER_HEADER_SLOTS, MAX_FILE_PATH_NAME_ID};
use crate::heap::{Container, Heap};
use crate::node::{DataNode, NodeType};
use crate::path::{alt_separator, file_name_text, intern_file_name, native_separator, Platform};
use crate::store::table_slots;
use crate::strings::HString;

/// Rewrites string ids found in heap data.
pub(crate) trait StringRemap {
    /// Maps a table key id. `None` stops the pair.
    fn key(&mut self, id: u32) -> Option<u32>;

    /// Maps a FilePath relative-name id. `None` leaves the node unchanged.
    fn file_name(&mut self, id: u32) -> Option<u32>;
}

/// Rewrites every string id reachable from the root of `heap`. Returns the
/// number of subtrees that were stopped.
pub(crate) fn remap_graph<R: StringRemap>(heap: &mut Heap, remap: &mut R) -> u32 {
    if heap.data.is_empty() {
        return 0;
    }

    let mut stopped = 0;
    let mut visited = vec![false; heap.handles.len()];
    let mut pending: Vec<u32> = vec![0];

    while let Some(slot) = pending.pop() {
        let Some(raw) = heap.slot(slot) else {
            stopped += 1;
            continue;
        };
        let node = DataNode::from_raw(raw);
        match node.node_type() {
            NodeType::FilePath => {
                let path = node.file_path_value();
                match remap.file_name(path.name_id()) {
                    Some(id) => heap.set_slot(slot, DataNode::file_path(path.with_name_id(id)).raw()),
                    None => stopped += 1,
                }
            }
            NodeType::Array | NodeType::Table => {
                let Some(offset) = first_visit(heap, node, &mut visited) else {
                    stopped += 1;
                    continue;
                };
                let pushed = if node.is_array() {
                    push_array(heap, offset, &mut pending)
                } else {
                    push_table(heap, offset, remap, &mut pending, &mut stopped)
                };
                if !pushed {
                    stopped += 1;
                }
            }
            _ => {}
        }
    }
    stopped
}

/// Offset of a container visited for the first time.
fn first_visit(heap: &Heap, node: DataNode, visited: &mut [bool]) -> Option<u32> {
    let offset = heap.resolve(node.handle())?;
    let seen = visited.get_mut(node.handle().index() as usize)?;
    if *seen {
        return None;
    }
    *seen = true;
    Some(offset)
}

fn push_array(heap: &Heap, offset: u32, pending: &mut Vec<u32>) -> bool {
    let Some(header) = Container::read(&heap.data, offset) else {
        return false;
    };
    let values = offset as u64 + CONTAINER_HEADER_SLOTS as u64;
    if header.count() > header.capacity() || values + header.capacity() as u64 > heap.data.len() as u64 {
        return false;
    }
    let values = values as u32;
    pending.extend((values..values + header.count()).rev());
    true
}

fn push_table<R: StringRemap>(
    heap: &mut Heap,
    offset: u32,
    remap: &mut R,
    pending: &mut Vec<u32>,
    stopped: &mut u32,
) -> bool {
    let Some(header) = Container::read(&heap.data, offset) else {
        return false;
    };
    let total = header.total_capacity();
    if header.count() > header.capacity()
        || offset as u64 + table_slots(total) > heap.data.len() as u64
    {
        return false;
    }

    let values = offset + CONTAINER_HEADER_SLOTS;
    let keys = values + total;
    for i in 0..header.capacity() {
        let key = heap.data[(keys + i) as usize];
        if key == 0 {
            continue;
        }
        match remap.key(key) {
            Some(id) => {
                heap.data[(keys + i) as usize] = id;
                pending.push(values + i);
            }
            None => *stopped += 1,
        }
    }
    if header.has_null() && header.has_null_storage() {
        pending.push(values + header.capacity());
    }
    true
}

// ============================================================================
// SAVE SIDE
// ============================================================================

/// One append-only string table being built for a file.
#[derive(Debug)]
pub(crate) struct TableWriter {
    bytes: Vec<u8>,
    count: u32,
    ordinal: bool,
    ids: HashMap<u32, u32>,
}

impl TableWriter {
    fn new(ordinal: bool) -> Self {
        let mut ids = HashMap::new();
        ids.insert(0, 0);
        Self {
            bytes: vec![0],
            count: 0,
            ordinal,
            ids,
        }
    }

    fn reference(&mut self, id: u32, text: impl FnOnce() -> String) -> u32 {
        if let Some(&r) = self.ids.get(&id) {
            return r;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(text().as_bytes());
        self.bytes.push(0);
        self.count += 1;
        let r = if self.ordinal { self.count } else { offset };
        self.ids.insert(id, r);
        r
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Builds both string tables while converting ids for `save`.
pub(crate) struct SaveRemap {
    pub(crate) file_names: TableWriter,
    pub(crate) keys: TableWriter,
    separators: Option<(char, char)>,
}

impl SaveRemap {
    pub(crate) fn new(platform: Platform, ordinal: bool) -> Self {
        let (current, target) = (native_separator(), platform.directory_separator());
        Self {
            file_names: TableWriter::new(ordinal),
            keys: TableWriter::new(ordinal),
            separators: (current != target).then_some((current, target)),
        }
    }
}

impl StringRemap for SaveRemap {
    fn key(&mut self, id: u32) -> Option<u32> {
        Some(self.keys.reference(id, || HString::from_raw(id).as_str().to_owned()))
    }

    fn file_name(&mut self, id: u32) -> Option<u32> {
        let separators = self.separators;
        let r = self.file_names.reference(id, || {
            let name = file_name_text(id);
            match separators {
                Some((current, target)) => name.replace(current, &target.to_string()),
                None => name.to_owned(),
            }
        });
        (r <= MAX_FILE_PATH_NAME_ID).then_some(r)
    }
}

// ============================================================================
// LOAD SIDE
// ============================================================================

/// Converts file string references back to runtime ids for `load`.
#[derive(Debug, Default)]
pub(crate) struct LoadRemap {
    file_names: HashMap<u32, u32>,
    keys: HashMap<u32, u32>,
}

/// Splits a string table into `(reference, text)` pairs.
fn split_table(bytes: &[u8], ordinal: bool) -> Result<Vec<(u32, &str)>> {
    let mut entries = Vec::new();
    let mut start = 0usize;
    while start < bytes.len() {
        let end = bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(bytes.len(), |n| start + n);
        let Ok(text) = std::str::from_utf8(&bytes[start..end]) else {
            bail!("string table entry at byte {} is not UTF-8", start);
        };
        let reference = if ordinal { entries.len() } else { start };
        entries.push((reference as u32, text));
        start = end + 1;
    }
    Ok(entries)
}

/// Replaces alternate separators with the native one, up to the first
/// native separator. A table that already uses native separators is left
/// untouched.
fn normalize_separators(bytes: &mut [u8]) {
    let (native, alt) = (native_separator() as u8, alt_separator() as u8);
    for b in bytes.iter_mut() {
        if *b == native {
            break;
        }
        if *b == alt {
            *b = native;
        }
    }
}

impl LoadRemap {
    pub(crate) fn new(mut file_names: Vec<u8>, keys: &[u8], ordinal: bool) -> Result<Self> {
        normalize_separators(&mut file_names);

        let mut remap = LoadRemap::default();
        remap.file_names.insert(0, 0);
        for (reference, text) in split_table(&file_names, ordinal)? {
            if let Some(id) = intern_file_name(text) {
                remap.file_names.insert(reference, id);
            }
        }
        for (reference, text) in split_table(keys, ordinal)? {
            remap.keys.insert(reference, HString::new(text).id());
        }
        Ok(remap)
    }
}

impl StringRemap for LoadRemap {
    fn key(&mut self, id: u32) -> Option<u32> {
        self.keys.get(&id).copied().filter(|&k| k != 0)
    }

    fn file_name(&mut self, id: u32) -> Option<u32> {
        self.file_names.get(&id).copied()
    }
}
