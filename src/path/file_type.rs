//! File type enumeration and extension lookup.
//!
//! Extensions are matched using a compile-time perfect hash map (phf crate).
//! Lookup is case-insensitive; the map itself holds lowercase keys with the
//! leading '.'.

use phf::phf_map;

/// Kind of file a [`super::FilePath`] names, derived from its extension.
///
/// The discriminant is stored in 5 bits of a FilePath node, so the order of
/// variants is part of the binary format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FileType {
    #[default]
    Unknown = 0,
    Animation2D,
    Csv,
    Effect,
    EffectHeader,
    Exe,
    Font,
    FxBank,
    Html,
    Json,
    PemCertificate,
    Protobuf,
    SaveGame,
    SceneAsset,
    ScenePrefab,
    Script,
    SoundBank,
    SoundProject,
    Texture0,
    Texture1,
    Texture2,
    Texture3,
    Texture4,
    Text,
    UiMovie,
    Wav,
    Xml,
    ScriptProject,
    Cs,
    Video,
}

const ALL_FILE_TYPES: [FileType; 30] = [
    FileType::Unknown,
    FileType::Animation2D,
    FileType::Csv,
    FileType::Effect,
    FileType::EffectHeader,
    FileType::Exe,
    FileType::Font,
    FileType::FxBank,
    FileType::Html,
    FileType::Json,
    FileType::PemCertificate,
    FileType::Protobuf,
    FileType::SaveGame,
    FileType::SceneAsset,
    FileType::ScenePrefab,
    FileType::Script,
    FileType::SoundBank,
    FileType::SoundProject,
    FileType::Texture0,
    FileType::Texture1,
    FileType::Texture2,
    FileType::Texture3,
    FileType::Texture4,
    FileType::Text,
    FileType::UiMovie,
    FileType::Wav,
    FileType::Xml,
    FileType::ScriptProject,
    FileType::Cs,
    FileType::Video,
];

const _: () = assert!(
    ALL_FILE_TYPES.len() <= 1 << crate::config::FILE_PATH_TYPE_BITS,
    "FileType must fit in FILE_PATH_TYPE_BITS"
);

static EXTENSIONS: phf::Map<&'static str, FileType> = phf_map! {
    ".avi" => FileType::Video,
    ".bank" => FileType::SoundBank,
    ".cs" => FileType::Cs,
    ".csp" => FileType::ScriptProject,
    ".csproj" => FileType::ScriptProject,
    ".csv" => FileType::Csv,
    ".dat" => FileType::SaveGame,
    ".exe" => FileType::Exe,
    ".fbx" => FileType::SceneAsset,
    ".fcn" => FileType::UiMovie,
    ".fdp" => FileType::SoundProject,
    ".fev" => FileType::SoundProject,
    ".fsb" => FileType::SoundBank,
    ".fspro" => FileType::SoundProject,
    ".fx" => FileType::Effect,
    ".fxb" => FileType::FxBank,
    ".fxc" => FileType::Effect,
    ".fxh" => FileType::EffectHeader,
    ".fxh_marker" => FileType::EffectHeader,
    ".html" => FileType::Html,
    ".json" => FileType::Json,
    ".lua" => FileType::Script,
    ".lbc" => FileType::Script,
    ".prefab" => FileType::ScenePrefab,
    ".pb" => FileType::Protobuf,
    ".pem" => FileType::PemCertificate,
    ".png" => FileType::Texture0,
    ".proto" => FileType::Protobuf,
    ".saf" => FileType::Animation2D,
    ".sff" => FileType::Font,
    ".spf" => FileType::ScenePrefab,
    ".sif0" => FileType::Texture0,
    ".sif1" => FileType::Texture1,
    ".sif2" => FileType::Texture2,
    ".sif3" => FileType::Texture3,
    ".sif4" => FileType::Texture4,
    ".son" => FileType::Animation2D,
    ".ssa" => FileType::SceneAsset,
    ".swf" => FileType::UiMovie,
    ".ttf" => FileType::Font,
    ".txt" => FileType::Text,
    ".wav" => FileType::Wav,
    ".xfx" => FileType::FxBank,
    ".xml" => FileType::Xml,
};

impl FileType {
    /// Decodes a stored discriminant. Out-of-range values map to `Unknown`.
    pub fn from_u32(v: u32) -> FileType {
        ALL_FILE_TYPES
            .get(v as usize)
            .copied()
            .unwrap_or(FileType::Unknown)
    }

    /// Looks up the type for an extension such as `".json"`.
    ///
    /// Returns `Unknown` for an empty or unrecognized extension.
    pub fn from_extension(extension: &str) -> FileType {
        if let Some(t) = EXTENSIONS.get(extension) {
            return *t;
        }
        EXTENSIONS
            .get(extension.to_ascii_lowercase().as_str())
            .copied()
            .unwrap_or(FileType::Unknown)
    }

    /// The extension source files of this type carry, including the '.'.
    pub fn source_extension(self) -> &'static str {
        match self {
            FileType::Unknown => "",
            FileType::Animation2D => ".son",
            FileType::Csv => ".csv",
            FileType::Effect => ".fx",
            FileType::EffectHeader => ".fxh",
            FileType::Exe => ".exe",
            FileType::Font => ".ttf",
            FileType::FxBank => ".xfx",
            FileType::Html => ".html",
            FileType::Json => ".json",
            FileType::PemCertificate => ".pem",
            FileType::Protobuf => ".proto",
            FileType::SaveGame => ".dat",
            FileType::SceneAsset => ".fbx",
            FileType::ScenePrefab => ".prefab",
            FileType::Script => ".lua",
            FileType::SoundBank => ".bank",
            FileType::SoundProject => ".fspro",
            FileType::Texture0
            | FileType::Texture1
            | FileType::Texture2
            | FileType::Texture3
            | FileType::Texture4 => ".png",
            FileType::Text => ".txt",
            FileType::UiMovie => ".swf",
            FileType::Wav => ".wav",
            FileType::Xml => ".xml",
            FileType::ScriptProject => ".csproj",
            FileType::Cs => ".cs",
            FileType::Video => ".avi",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_round_trip() {
        for (i, t) in ALL_FILE_TYPES.iter().enumerate() {
            assert_eq!(*t as u32, i as u32);
            assert_eq!(FileType::from_u32(i as u32), *t);
        }
        assert_eq!(FileType::from_u32(31), FileType::Unknown);
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(FileType::from_extension(".json"), FileType::Json);
        assert_eq!(FileType::from_extension(".JSON"), FileType::Json);
        assert_eq!(FileType::from_extension(".sif3"), FileType::Texture3);
        assert_eq!(FileType::from_extension(".nope"), FileType::Unknown);
        assert_eq!(FileType::from_extension(""), FileType::Unknown);
    }

    #[test]
    fn every_known_type_has_a_source_extension_mapping_back() {
        for t in ALL_FILE_TYPES.iter().skip(1) {
            let ext = t.source_extension();
            let back = FileType::from_extension(ext);
            match t {
                FileType::Texture1 | FileType::Texture2 | FileType::Texture3 | FileType::Texture4 => {
                    assert_eq!(back, FileType::Texture0)
                }
                _ => assert_eq!(back, *t),
            }
        }
    }
}
