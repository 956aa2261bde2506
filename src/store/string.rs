//! String containers.
//!
//! ```text
//! slot 0     capacity in slots
//! slot 1     length in bytes
//! slot 2..   UTF-8 bytes, NUL at byte `length`, zero padded
//! ```

use eyre::{eyre, Result};
use zerocopy::IntoBytes;

use super::DataStore;
use crate::config::{CONTAINER_HEADER_SLOTS, SLOT_BYTES};
use crate::heap::Container;
use crate::node::{DataNode, NodeType};
use crate::strings::unescape_json;

/// Payload slots for a string of `len` bytes plus its terminator.
#[inline]
pub(crate) fn string_capacity(len: u32) -> u32 {
    (len + 1).div_ceil(SLOT_BYTES)
}

impl DataStore {
    /// Copies `s` into a new string container.
    pub(crate) fn make_string_node(&mut self, s: &str) -> Result<DataNode> {
        let len = u32::try_from(s.len()).map_err(|_| eyre!("string of {} bytes is too long", s.len()))?;
        let capacity = string_capacity(len);
        let handle = self.allocate(CONTAINER_HEADER_SLOTS + capacity)?;
        let offset = self
            .heap
            .resolve(handle)
            .ok_or_else(|| eyre!("freshly allocated string handle {:?} does not resolve", handle))?;

        Container::new(capacity, len).write(&mut self.heap.data, offset);
        let start = (offset + CONTAINER_HEADER_SLOTS) as usize;
        let payload = &mut self.heap.data[start..start + capacity as usize];
        payload.as_mut_bytes()[..s.len()].copy_from_slice(s.as_bytes());
        Ok(DataNode::by_reference(NodeType::String, handle))
    }

    /// Decodes JSON-style escapes in `s`, then stores the result.
    pub(crate) fn make_unescaped_string_node(&mut self, s: &str) -> Result<DataNode> {
        let unescaped = unescape_json(s)?;
        self.make_string_node(&unescaped)
    }

    /// Raw bytes of a string node, terminator excluded.
    pub(crate) fn string_bytes(&self, node: DataNode) -> Option<&[u8]> {
        if !node.is_string() {
            return None;
        }
        let (offset, header) = self.heap.container(node)?;
        let start = (offset + CONTAINER_HEADER_SLOTS) as usize;
        let payload = self.heap.data.get(start..start + header.capacity() as usize)?;
        payload.as_bytes().get(..header.count() as usize)
    }
}
