//! Binary record file with a 4-byte record-count header.
//!
//! A thin wrapper around [`std::fs::File`] that reserves the first
//! four bytes for a little-endian `u32` record count and provides the
//! positioned read/write primitives the stores are built on. The file
//! has no graph semantics of its own.
//!
//! The header count is incremented on every successful append and is
//! never validated against the actual content length: a caller that
//! aborts mid-write leaves the header and the data inconsistent. That
//! is a documented limitation, not something this layer corrects.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::record::FixedRecord;

/// Size in bytes of the record-count header at the start of the file.
pub const HEADER_SIZE: u64 = 4;

/// Random-access file with a reserved record-count header.
pub struct RecordFile {
    file: File,
    path: PathBuf,
}

impl RecordFile {
    /// Open the file at `path`, creating it (and any missing parent
    /// directories) with a zero count when absent. An existing file is
    /// opened for read/write without resetting its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut record_file = Self { file, path };
        if !existed {
            record_file.set_record_count(0)?;
        }
        debug!(path = %record_file.path.display(), existed, "opened record file");
        Ok(record_file)
    }

    /// Read the count stored at the beginning of the file. The file
    /// cursor is restored afterward, so header access never disturbs a
    /// caller's in-progress positioned read.
    pub fn record_count(&mut self) -> Result<u32> {
        let pos = self.file.stream_position()?;
        self.file.seek(SeekFrom::Start(0))?;
        let count = self.read_u32()?;
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(count)
    }

    /// Overwrite the count header, restoring the file cursor.
    pub fn set_record_count(&mut self, count: u32) -> Result<()> {
        let pos = self.file.stream_position()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.write_u32(count)?;
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Increment the count header, restoring the file cursor.
    pub fn increment_record_count(&mut self) -> Result<()> {
        let pos = self.file.stream_position()?;
        self.file.seek(SeekFrom::Start(0))?;
        let count = self.read_u32()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.write_u32(count + 1)?;
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Move the cursor to an absolute byte offset.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Move the cursor to the end of the file, returning the offset.
    pub fn seek_to_end(&mut self) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    /// Current cursor offset from the beginning of the file.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    /// Skip forward over `n` bytes.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.file.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    /// Length of the file in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Write a fixed-size record at the current cursor.
    pub fn write_record<T: FixedRecord>(&mut self, record: &T) -> Result<()> {
        let bytes = record.encode();
        self.file.write_all(&bytes)?;
        Ok(())
    }

    /// Read exactly `T::SIZE` bytes at the current cursor and decode.
    pub fn read_record<T: FixedRecord>(&mut self) -> Result<T> {
        let mut buf = vec![0u8; T::SIZE];
        self.file.read_exact(&mut buf)?;
        T::decode(&buf)
    }

    /// Write a little-endian `u32` at the current cursor.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.file.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Read a little-endian `u32` at the current cursor.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.file.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Write a little-endian `u64` at the current cursor.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.file.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Read a little-endian `u64` at the current cursor.
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.file.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Write a little-endian `i64` at the current cursor.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.file.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Read a little-endian `i64` at the current cursor.
    pub fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.file.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    /// Write a single-byte boolean at the current cursor.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.file.write_all(&[u8::from(value)])?;
        Ok(())
    }

    /// Read a single-byte boolean at the current cursor. Any non-zero
    /// byte reads back as `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        let mut buf = [0u8; 1];
        self.file.read_exact(&mut buf)?;
        Ok(buf[0] != 0)
    }

    /// Write a length-prefixed UTF-8 string (u16 length + bytes) at
    /// the current cursor. Used by the flat log's variable-length
    /// relationship label.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| {
            Error::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "string longer than 65535 bytes",
            ))
        })?;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Read a length-prefixed UTF-8 string at the current cursor.
    pub fn read_string(&mut self) -> Result<String> {
        let mut len_buf = [0u8; 2];
        self.file.read_exact(&mut len_buf)?;
        let len = u16::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::corruption(format!("invalid UTF-8 in record: {e}")))
    }

    /// Destructively truncate the file back to an empty, zero-count
    /// state. Used between benchmark runs.
    pub fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.write_u32(0)?;
        debug!(path = %self.path.display(), "cleared record file");
        Ok(())
    }

    /// Flush file data and metadata to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
