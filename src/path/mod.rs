//! # File Path Identifiers
//!
//! A [`FilePath`] names a file by (game directory, file type, relative name)
//! rather than by an absolute path. It packs into the 27-bit payload of an
//! inline DataNode, so file references cost no heap storage.
//!
//! ## Packed Layout
//!
//! ```text
//! bit  0..3   GameDirectory
//! bit  3..8   FileType
//! bit  8..27  relative filename id (case-insensitive interner)
//! ```
//!
//! ## Relative Names
//!
//! Relative names are stored without their extension, with the native
//! directory separator, and are interned case-insensitively: `Foo/Bar.json`
//! and `foo/bar.JSON` are the same path. The extension is folded into the
//! [`FileType`].
//!
//! ## Serialized URLs
//!
//! The portable text form is `scheme://relative/name.ext`, always with '/'
//! separators and the canonical source extension for the file type:
//!
//! ```ignore
//! let p = FilePath::create(GameDirectory::Config, "ui/Menu.json");
//! assert_eq!(p.to_serialized_url(), "config://ui/Menu.json");
//! assert_eq!(FilePath::from_serialized_url("config://ui/menu.json"), Some(p));
//! ```

mod file_type;

pub use file_type::FileType;

use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::config::MAX_FILE_PATH_NAME_ID;
use crate::strings::Interner;

// ============================================================================
// PLATFORM
// ============================================================================

/// Target platform of a save file. Decides the directory separator written
/// into FilePath names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    PC,
    IOS,
    Android,
    Linux,
}

impl Platform {
    /// The platform this process runs on.
    pub fn current() -> Platform {
        if cfg!(windows) {
            Platform::PC
        } else if cfg!(target_os = "ios") {
            Platform::IOS
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else {
            Platform::Linux
        }
    }

    pub fn directory_separator(self) -> char {
        match self {
            Platform::PC => '\\',
            Platform::IOS | Platform::Android | Platform::Linux => '/',
        }
    }
}

/// Separator used by relative names in this process.
pub fn native_separator() -> char {
    Platform::current().directory_separator()
}

/// The separator that is not native in this process.
pub fn alt_separator() -> char {
    if native_separator() == '/' {
        '\\'
    } else {
        '/'
    }
}

// ============================================================================
// GAME DIRECTORY
// ============================================================================

/// Root a [`FilePath`] is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum GameDirectory {
    #[default]
    Unknown = 0,
    Config,
    Content,
    Log,
    Save,
    ToolsBin,
    Videos,
}

const GAME_DIRECTORIES: [GameDirectory; 7] = [
    GameDirectory::Unknown,
    GameDirectory::Config,
    GameDirectory::Content,
    GameDirectory::Log,
    GameDirectory::Save,
    GameDirectory::ToolsBin,
    GameDirectory::Videos,
];

impl GameDirectory {
    pub fn from_u32(v: u32) -> GameDirectory {
        GAME_DIRECTORIES
            .get(v as usize)
            .copied()
            .unwrap_or(GameDirectory::Unknown)
    }

    /// URL scheme used in serialized form.
    pub fn scheme(self) -> &'static str {
        match self {
            GameDirectory::Unknown => "",
            GameDirectory::Config => "config",
            GameDirectory::Content => "content",
            GameDirectory::Log => "log",
            GameDirectory::Save => "save",
            GameDirectory::ToolsBin => "tools",
            GameDirectory::Videos => "videos",
        }
    }
}

// ============================================================================
// RELATIVE NAME INTERNER
// ============================================================================

static FILE_NAMES: OnceLock<RwLock<Interner>> = OnceLock::new();

fn file_names() -> &'static RwLock<Interner> {
    FILE_NAMES.get_or_init(|| RwLock::new(Interner::new(true)))
}

/// Interns a relative name. Returns `None` once the id space is exhausted.
pub(crate) fn intern_file_name(name: &str) -> Option<u32> {
    let found = file_names().read().find(name);
    let id = match found {
        Some(id) => id,
        None => file_names().write().intern(name),
    };
    (id <= MAX_FILE_PATH_NAME_ID).then_some(id)
}

pub(crate) fn file_name_text(id: u32) -> &'static str {
    file_names().read().text(id).unwrap_or("")
}

/// Resolves `.` and `..` segments. Returns `None` if `..` climbs above the
/// root.
fn simplify(path: &str, sep: char) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(sep) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            p => parts.push(p),
        }
    }
    let mut out = String::with_capacity(path.len());
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push_str(p);
    }
    Some(out)
}

fn is_rooted(path: &str, sep: char) -> bool {
    let b = path.as_bytes();
    path.starts_with(sep) || (b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':')
}

// ============================================================================
// FILE PATH
// ============================================================================

/// Compact (directory, type, relative name) file identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FilePath(u32);

impl FilePath {
    packed_fields! { u32 =>
        directory_bits: 0, 3;
        file_type_bits: 3, 5;
        name_id: 8, 19;
    }

    /// Builds a path from a directory and a filename with extension.
    ///
    /// The filename's separators are normalized, a trailing separator is
    /// dropped and `.`/`..` segments are resolved. The extension selects the
    /// [`FileType`] and is removed from the stored name. An empty filename
    /// yields a path naming only the directory. Returns an invalid path for an
    /// unrecognized extension, a rooted filename, or a name that climbs out of
    /// its directory.
    pub fn create(directory: GameDirectory, filename: &str) -> FilePath {
        let mut ret = FilePath::default();
        if filename.is_empty() {
            ret.set_directory_bits(directory as u32);
            return ret;
        }

        let sep = native_separator();
        let mut relative = filename.replace(alt_separator(), &sep.to_string());
        if relative.ends_with(sep) {
            relative.pop();
        }

        let last_sep = relative.rfind(sep).map(|i| i + 1).unwrap_or(0);
        let (stem, extension) = match relative[last_sep..].rfind('.') {
            Some(dot) => relative.split_at(last_sep + dot),
            None => (relative.as_str(), ""),
        };

        let file_type = FileType::from_extension(extension);
        if file_type == FileType::Unknown && !extension.is_empty() {
            return FilePath::default();
        }

        if is_rooted(stem, sep) {
            return FilePath::default();
        }

        let Some(simplified) = simplify(stem, sep) else {
            return FilePath::default();
        };
        let Some(name) = intern_file_name(&simplified) else {
            return FilePath::default();
        };

        ret.set_directory_bits(directory as u32);
        ret.set_file_type_bits(file_type as u32);
        ret.set_name_id(name);
        ret
    }

    /// Parses the `scheme://relative.ext` form produced by
    /// [`FilePath::to_serialized_url`]. Returns `None` unless the text starts
    /// with a known scheme and yields a valid path.
    pub fn from_serialized_url(url: &str) -> Option<FilePath> {
        GAME_DIRECTORIES.iter().skip(1).find_map(|dir| {
            let rest = url
                .strip_prefix(dir.scheme())
                .and_then(|r| r.strip_prefix("://"))?;
            let path = FilePath::create(*dir, rest);
            path.is_valid().then_some(path)
        })
    }

    pub fn directory(self) -> GameDirectory {
        GameDirectory::from_u32(self.directory_bits())
    }

    pub fn file_type(self) -> FileType {
        FileType::from_u32(self.file_type_bits())
    }

    /// Relative name without extension, native separators.
    pub fn relative_filename(self) -> &'static str {
        file_name_text(self.name_id())
    }

    pub fn is_valid(self) -> bool {
        self.directory_bits() != 0 || self.name_id() != 0
    }

    /// Portable text form, `scheme://relative/name.ext`.
    pub fn to_serialized_url(self) -> String {
        let name = self.relative_filename();
        let extension = self.file_type().source_extension();
        let mut url = String::with_capacity(name.len() + extension.len() + 12);
        url.push_str(self.directory().scheme());
        url.push_str("://");
        if native_separator() == '\\' {
            url.push_str(&name.replace('\\', "/"));
        } else {
            url.push_str(name);
        }
        url.push_str(extension);
        url
    }

    /// Packed 27-bit payload stored in a DataNode.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u32) -> FilePath {
        FilePath(raw & ((1 << crate::config::NODE_VALUE_BITS) - 1))
    }

    /// Same directory and type with a different interned name.
    pub(crate) fn with_name_id(mut self, id: u32) -> FilePath {
        self.set_name_id(id);
        self
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_serialized_url())
    }
}

impl fmt::Debug for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FilePath({:?})", self.to_serialized_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(s: &str) -> String {
        s.replace('/', &native_separator().to_string())
    }

    #[test]
    fn create_splits_extension_into_type() {
        let p = FilePath::create(GameDirectory::Config, "ui/Menu.json");
        assert!(p.is_valid());
        assert_eq!(p.directory(), GameDirectory::Config);
        assert_eq!(p.file_type(), FileType::Json);
        assert_eq!(p.relative_filename(), native("ui/Menu"));
        assert_eq!(p.to_serialized_url(), "config://ui/Menu.json");
    }

    #[test]
    fn names_compare_case_insensitively() {
        let a = FilePath::create(GameDirectory::Content, "Textures/Hero.png");
        let b = FilePath::create(GameDirectory::Content, "textures\\hero.PNG");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_filename_names_only_the_directory() {
        let p = FilePath::create(GameDirectory::Save, "");
        assert!(p.is_valid());
        assert_eq!(p.relative_filename(), "");
        assert_eq!(p.to_serialized_url(), "save://");
    }

    #[test]
    fn invalid_inputs() {
        assert!(!FilePath::default().is_valid());
        assert!(!FilePath::create(GameDirectory::Config, "a.unknownext").is_valid());
        assert!(!FilePath::create(GameDirectory::Config, "../escape.json").is_valid());
        assert!(!FilePath::create(GameDirectory::Config, "/abs/file.json").is_valid());
    }

    #[test]
    fn dot_segments_are_resolved() {
        let a = FilePath::create(GameDirectory::Config, "a/./b/../c.txt");
        let b = FilePath::create(GameDirectory::Config, "a/c.txt");
        assert_eq!(a, b);
    }

    #[test]
    fn serialized_url_round_trips() {
        let p = FilePath::create(GameDirectory::ToolsBin, "bin/tool.exe");
        assert_eq!(p.to_serialized_url(), "tools://bin/tool.exe");
        assert_eq!(FilePath::from_serialized_url(&p.to_serialized_url()), Some(p));
        assert_eq!(FilePath::from_serialized_url("nope://x.json"), None);
        assert_eq!(FilePath::from_serialized_url("config:/x.json"), None);
    }

    #[test]
    fn raw_round_trip() {
        let p = FilePath::create(GameDirectory::Videos, "intro.avi");
        assert_eq!(FilePath::from_raw(p.to_raw()), p);
    }
}
