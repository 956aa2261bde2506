//! Process-wide string interner.
//!
//! Interned text is leaked so lookups can hand out `&'static str` without
//! holding the lock. The interner only ever grows; a process that interns an
//! unbounded set of distinct strings will grow without bound.

use std::fmt;
use std::sync::OnceLock;

use crc::{Crc, CRC_32_ISO_HDLC};
use hashbrown::HashMap;
use parking_lot::RwLock;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Stable 32-bit hash of a byte string. Table buckets derive from this value.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}

struct Entry {
    text: &'static str,
    hash: u32,
}

/// Append-only string ↔ id map. Id 0 is always the empty string.
pub(crate) struct Interner {
    case_insensitive: bool,
    lookup: HashMap<&'static str, u32>,
    entries: Vec<Entry>,
}

impl Interner {
    pub(crate) fn new(case_insensitive: bool) -> Self {
        let mut lookup = HashMap::new();
        lookup.insert("", 0);
        Self {
            case_insensitive,
            lookup,
            entries: vec![Entry { text: "", hash: hash_bytes(b"") }],
        }
    }

    pub(crate) fn find(&self, s: &str) -> Option<u32> {
        if self.case_insensitive && s.bytes().any(|b| b.is_ascii_uppercase()) {
            self.lookup.get(s.to_ascii_lowercase().as_str()).copied()
        } else {
            self.lookup.get(s).copied()
        }
    }

    pub(crate) fn intern(&mut self, s: &str) -> u32 {
        if let Some(id) = self.find(s) {
            return id;
        }

        let id = self.entries.len() as u32;
        let text: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let key: &'static str = if self.case_insensitive {
            let lowered = s.to_ascii_lowercase();
            if lowered == s {
                text
            } else {
                Box::leak(lowered.into_boxed_str())
            }
        } else {
            text
        };

        self.entries.push(Entry {
            text,
            hash: hash_bytes(key.as_bytes()),
        });
        self.lookup.insert(key, id);
        id
    }

    pub(crate) fn text(&self, id: u32) -> Option<&'static str> {
        self.entries.get(id as usize).map(|e| e.text)
    }

    pub(crate) fn hash(&self, id: u32) -> Option<u32> {
        self.entries.get(id as usize).map(|e| e.hash)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

static HSTRINGS: OnceLock<RwLock<Interner>> = OnceLock::new();

fn hstrings() -> &'static RwLock<Interner> {
    HSTRINGS.get_or_init(|| RwLock::new(Interner::new(false)))
}

/// Identifier of an interned, case-sensitive string.
///
/// `HString` is a 32-bit id and is `Copy`. Equality is id equality, which is
/// text equality because the interner never hands out two ids for the same
/// text. The empty string is always id 0 and doubles as the "empty bucket"
/// marker inside tables.
///
/// # Example
///
/// ```ignore
/// let a = HString::new("name");
/// let b = HString::from("name");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "name");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HString(u32);

impl HString {
    /// The empty string, id 0.
    pub const EMPTY: HString = HString(0);

    /// Interns `s` and returns its id.
    pub fn new(s: &str) -> Self {
        if let Some(id) = hstrings().read().find(s) {
            return HString(id);
        }
        HString(hstrings().write().intern(s))
    }

    /// Returns the id of `s` if it has already been interned.
    pub fn find(s: &str) -> Option<Self> {
        hstrings().read().find(s).map(HString)
    }

    /// Returns the string for a raw id, if that id has been issued.
    pub fn from_id(id: u32) -> Option<Self> {
        ((id as usize) < hstrings().read().len()).then_some(HString(id))
    }

    /// Wraps a raw id read from the heap without checking it.
    #[inline]
    pub(crate) const fn from_raw(id: u32) -> Self {
        HString(id)
    }

    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The interned text. Unknown ids resolve to the empty string.
    pub fn as_str(self) -> &'static str {
        if self.0 == 0 {
            return "";
        }
        hstrings().read().text(self.0).unwrap_or("")
    }

    /// Stable hash of the text, used to pick a table bucket.
    pub fn hash_value(self) -> u32 {
        hstrings().read().hash(self.0).unwrap_or(0)
    }

    pub fn len(self) -> usize {
        self.as_str().len()
    }
}

impl From<&str> for HString {
    fn from(s: &str) -> Self {
        HString::new(s)
    }
}

impl From<&String> for HString {
    fn from(s: &String) -> Self {
        HString::new(s)
    }
}

impl From<String> for HString {
    fn from(s: String) -> Self {
        HString::new(&s)
    }
}

impl PartialEq<str> for HString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for HString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HString({}, {:?})", self.0, self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_id_zero() {
        assert_eq!(HString::new(""), HString::EMPTY);
        assert!(HString::EMPTY.is_empty());
        assert_eq!(HString::EMPTY.as_str(), "");
    }

    #[test]
    fn interning_is_idempotent() {
        let a = HString::new("hstring_idempotent");
        let b = HString::new("hstring_idempotent");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "hstring_idempotent");
        assert_eq!(HString::find("hstring_idempotent"), Some(a));
    }

    #[test]
    fn find_does_not_intern() {
        assert_eq!(HString::find("hstring_never_interned_value"), None);
    }

    #[test]
    fn hash_depends_only_on_text() {
        let s = HString::new("bucket");
        assert_eq!(s.hash_value(), hash_bytes(b"bucket"));
        assert_eq!(hash_bytes(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn case_insensitive_interner_folds_ascii_case() {
        let mut interner = Interner::new(true);
        let a = interner.intern("Textures/Foo");
        let b = interner.intern("textures/foo");
        assert_eq!(a, b);
        assert_eq!(interner.text(a), Some("Textures/Foo"));
        assert_eq!(interner.hash(a), Some(hash_bytes(b"textures/foo")));
    }
}
