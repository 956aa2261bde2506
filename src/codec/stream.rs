//! # Byte Stream Abstraction
//!
//! `SyncStream` is the synchronous byte sink/source that `save` and `load`
//! drive. It is deliberately smaller than `std::io::{Read, Write}`: every
//! call reports how many bytes moved, and a short count is the only failure
//! signal. The codec treats any short read or write as a failed operation.
//!
//! ## Implementations
//!
//! | Type                    | Writable | Notes                               |
//! |-------------------------|----------|-------------------------------------|
//! | `Cursor<Vec<u8>>`       | Yes      | In-memory round trips, tests        |
//! | `Cursor<&[u8]>`         | No       | Loading from a borrowed buffer      |
//! | `std::fs::File`         | Yes      | Short counts on I/O errors          |
//!
//! ## Buffer Framing
//!
//! [`write_buffer`] and [`read_buffer`] frame a run of fixed-size
//! little-endian elements as a `u32` element count followed by the raw
//! bytes. Reads are chunked so a corrupted count cannot force one huge
//! allocation before the stream runs dry.

use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Largest single allocation made while reading a framed buffer.
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Synchronous byte stream used by the codec.
pub trait SyncStream {
    /// Whether `write_raw` can succeed at all.
    fn can_write(&self) -> bool;

    /// Writes `data`, returning the number of bytes written.
    fn write_raw(&mut self, data: &[u8]) -> usize;

    /// Fills `buf` from the stream, returning the number of bytes read.
    fn read_raw(&mut self, buf: &mut [u8]) -> usize;

    /// Current byte offset.
    fn position(&mut self) -> u64;
}

fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    filled
}

fn write_fully<W: Write>(writer: &mut W, data: &[u8]) -> usize {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    written
}

impl SyncStream for Cursor<Vec<u8>> {
    fn can_write(&self) -> bool {
        true
    }

    fn write_raw(&mut self, data: &[u8]) -> usize {
        write_fully(self, data)
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> usize {
        read_fully(self, buf)
    }

    fn position(&mut self) -> u64 {
        Cursor::position(self)
    }
}

impl SyncStream for Cursor<&[u8]> {
    fn can_write(&self) -> bool {
        false
    }

    fn write_raw(&mut self, _data: &[u8]) -> usize {
        0
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> usize {
        read_fully(self, buf)
    }

    fn position(&mut self) -> u64 {
        Cursor::position(self)
    }
}

impl SyncStream for File {
    fn can_write(&self) -> bool {
        true
    }

    fn write_raw(&mut self, data: &[u8]) -> usize {
        write_fully(self, data)
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> usize {
        read_fully(self, buf)
    }

    fn position(&mut self) -> u64 {
        self.stream_position().unwrap_or(0)
    }
}

// ============================================================================
// FRAMED I/O
// ============================================================================

pub(crate) fn write_bytes<S: SyncStream + ?Sized>(stream: &mut S, data: &[u8], what: &str) -> Result<()> {
    let written = stream.write_raw(data);
    ensure!(
        written == data.len(),
        "short write of {}: {} of {} bytes",
        what,
        written,
        data.len()
    );
    Ok(())
}

pub(crate) fn read_bytes<S: SyncStream + ?Sized>(stream: &mut S, buf: &mut [u8], what: &str) -> Result<()> {
    let read = stream.read_raw(buf);
    ensure!(read == buf.len(), "short read of {}: {} of {} bytes", what, read, buf.len());
    Ok(())
}

pub(crate) fn write_u32<S: SyncStream + ?Sized>(stream: &mut S, value: u32, what: &str) -> Result<()> {
    write_bytes(stream, &value.to_le_bytes(), what)
}

pub(crate) fn read_u32<S: SyncStream + ?Sized>(stream: &mut S, what: &str) -> Result<u32> {
    let mut word = [0u8; 4];
    read_bytes(stream, &mut word, what)?;
    Ok(u32::from_le_bytes(word))
}

/// Writes `items` as a `u32` count followed by their raw bytes.
pub(crate) fn write_buffer<S, T>(stream: &mut S, items: &[T], what: &str) -> Result<()>
where
    S: SyncStream + ?Sized,
    T: IntoBytes + Immutable,
{
    let count = u32::try_from(items.len()).map_err(|_| eyre::eyre!("{} too large to frame", what))?;
    write_u32(stream, count, what)?;
    write_bytes(stream, items.as_bytes(), what)
}

/// Reads a buffer framed by [`write_buffer`]. Fails if the count exceeds
/// `max_items` or the stream ends early.
pub(crate) fn read_buffer<S, T>(stream: &mut S, max_items: usize, what: &str) -> Result<Vec<T>>
where
    S: SyncStream + ?Sized,
    T: FromBytes + IntoBytes + Immutable + Clone,
{
    let count = read_u32(stream, what)? as usize;
    ensure!(count <= max_items, "{} count {} exceeds limit {}", what, count, max_items);

    let item_bytes = std::mem::size_of::<T>();
    let total = count * item_bytes;
    let mut bytes = Vec::with_capacity(total.min(READ_CHUNK_BYTES));
    let mut chunk = vec![0u8; READ_CHUNK_BYTES.min(total)];
    while bytes.len() < total {
        let n = (total - bytes.len()).min(chunk.len());
        read_bytes(stream, &mut chunk[..n], what)?;
        bytes.extend_from_slice(&chunk[..n]);
    }

    let mut items = Vec::with_capacity(count);
    for raw in bytes.chunks_exact(item_bytes) {
        let item = T::read_from_bytes(raw).map_err(|_| eyre::eyre!("{}: misaligned element", what))?;
        items.push(item);
    }
    Ok(items)
}
