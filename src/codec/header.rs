//! # File Header
//!
//! Every saved store opens with an 8-byte signature. Versioned files follow
//! it with a little-endian `u32` format version; legacy files carry a
//! different signature and no version field.
//!
//! ```text
//! versioned:  [EB 4E 6D BA BD 66 D1 EC][version u32]
//! legacy:     [FF FF 00 DE A7 7F 00 DD]
//! ```
//!
//! The only difference between supported formats is how the heap refers to
//! string table entries:
//!
//! | Format     | String reference               |
//! |------------|--------------------------------|
//! | legacy     | byte offset into the table     |
//! | version 1  | byte offset into the table     |
//! | version 2  | ordinal position in the table  |

use eyre::{bail, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::stream::{read_bytes, read_u32, write_bytes, SyncStream};
use crate::config::{FILE_SIGNATURE, FIRST_ORDINAL_STRING_VERSION, FORMAT_VERSION, LEGACY_FILE_SIGNATURE};

/// Signature and version of a versioned file.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct FileHeader {
    signature: [u8; 8],
    version: U32,
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == 12);

/// On-disk format of a saved store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileFormat {
    /// Legacy signature, no version field.
    Legacy,
    /// Signature plus a version older than ordinal string references.
    ByteOffsetVersion(u32),
    /// Current format.
    Current,
}

impl FileFormat {
    /// Whether string references are ordinal positions rather than byte
    /// offsets.
    pub(crate) fn ordinal_strings(self) -> bool {
        matches!(self, FileFormat::Current)
    }

    pub(crate) fn write<S: SyncStream + ?Sized>(self, stream: &mut S) -> Result<()> {
        let version = match self {
            FileFormat::Legacy => return write_bytes(stream, &LEGACY_FILE_SIGNATURE, "signature"),
            FileFormat::ByteOffsetVersion(v) => v,
            FileFormat::Current => FORMAT_VERSION,
        };
        let header = FileHeader {
            signature: FILE_SIGNATURE,
            version: U32::new(version),
        };
        write_bytes(stream, header.as_bytes(), "file header")
    }

    /// Reads and validates the signature and version.
    pub(crate) fn read<S: SyncStream + ?Sized>(stream: &mut S) -> Result<FileFormat> {
        let mut signature = [0u8; 8];
        read_bytes(stream, &mut signature, "signature")?;
        if signature == LEGACY_FILE_SIGNATURE {
            return Ok(FileFormat::Legacy);
        }
        if signature != FILE_SIGNATURE {
            bail!("invalid signature {:02x?}", signature);
        }

        match read_u32(stream, "format version")? {
            FORMAT_VERSION => Ok(FileFormat::Current),
            v if (1..FIRST_ORDINAL_STRING_VERSION).contains(&v) => Ok(FileFormat::ByteOffsetVersion(v)),
            v => bail!("unsupported format version {} (expected 1..={})", v, FORMAT_VERSION),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(bytes: &[u8]) -> Result<FileFormat> {
        FileFormat::read(&mut Cursor::new(bytes))
    }

    fn written(format: FileFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        format.write(&mut out).unwrap();
        out.into_inner()
    }

    #[test]
    fn current_header_round_trips() {
        let bytes = written(FileFormat::Current);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[8..], &FORMAT_VERSION.to_le_bytes());
        assert_eq!(parse(&bytes).unwrap(), FileFormat::Current);
        assert!(FileFormat::Current.ordinal_strings());
    }

    #[test]
    fn version_one_uses_byte_offsets() {
        let bytes = written(FileFormat::ByteOffsetVersion(1));
        let format = parse(&bytes).unwrap();
        assert_eq!(format, FileFormat::ByteOffsetVersion(1));
        assert!(!format.ordinal_strings());
    }

    #[test]
    fn legacy_signature_has_no_version() {
        let bytes = written(FileFormat::Legacy);
        assert_eq!(bytes, LEGACY_FILE_SIGNATURE.to_vec());
        assert_eq!(parse(&bytes).unwrap(), FileFormat::Legacy);
    }

    #[test]
    fn unknown_versions_and_signatures_fail() {
        let mut bytes = FILE_SIGNATURE.to_vec();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        assert!(parse(&bytes).is_err());

        bytes[8..].copy_from_slice(&0u32.to_le_bytes());
        assert!(parse(&bytes).is_err());

        bytes[0] = 0;
        assert!(parse(&bytes).is_err());
        assert!(parse(&FILE_SIGNATURE[..5]).is_err());
    }
}
