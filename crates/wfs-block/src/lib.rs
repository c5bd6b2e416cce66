#![forbid(unsafe_code)]
//! Byte store capability for WFS images.
//!
//! The format interpreter never touches a file descriptor directly. It is
//! handed a [`ByteDevice`] and issues positioned reads against it, so the
//! same code runs over an image file, a block device, or an in-memory
//! buffer built by a test.

use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use wfs_error::{Result, WfsError};
use wfs_types::{ByteOffset, MAGIC_SIZE};

/// Byte-addressed device for fixed-offset I/O (pread/pwrite semantics).
pub trait ByteDevice: Send + Sync {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    ///
    /// A read that would run past the end of the device is an error; short
    /// reads are never padded.
    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()>;

    /// Write all bytes in `buf` to `offset`.
    fn write_all_at(&self, offset: ByteOffset, buf: &[u8]) -> Result<()>;

    /// Flush pending writes to stable storage.
    fn sync(&self) -> Result<()>;
}

/// Check that `[offset, offset + len)` lies inside a device of `dev_len` bytes.
fn check_range(op: &str, offset: ByteOffset, len: usize, dev_len: u64) -> Result<()> {
    let len_u64 = u64::try_from(len)
        .map_err(|_| WfsError::Format(format!("{op} length overflows u64")))?;
    let end = offset
        .checked_add(len_u64)
        .ok_or_else(|| WfsError::Format(format!("{op} range overflows u64")))?;
    if end.0 > dev_len {
        return Err(WfsError::Format(format!(
            "{op} out of bounds: offset={offset} len={len} device_len={dev_len}"
        )));
    }
    Ok(())
}

/// File-backed byte device using `pread`/`pwrite` style I/O.
///
/// This uses `std::os::unix::fs::FileExt`, which is thread-safe and does not
/// require a shared seek position.
#[derive(Debug, Clone)]
pub struct FileByteDevice {
    file: Arc<File>,
    len: u64,
    writable: bool,
}

impl FileByteDevice {
    /// Open an image file or block device read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path.as_ref())?;
        Self::from_file(file, false)
    }

    /// Open an image read-write.
    pub fn open_read_write(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        Self::from_file(file, true)
    }

    fn from_file(file: File, writable: bool) -> Result<Self> {
        // Block devices report a zero metadata length; seeking to the end
        // gives the real size for both regular files and devices.
        let mut handle = &file;
        let len = handle.seek(SeekFrom::End(0))?;
        debug!(len, writable, "opened file byte device");
        Ok(Self {
            file: Arc::new(file),
            len,
            writable,
        })
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        check_range("read", offset, buf.len(), self.len)?;
        self.file.read_exact_at(buf, offset.0)?;
        Ok(())
    }

    fn write_all_at(&self, offset: ByteOffset, buf: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(WfsError::ReadOnly);
        }
        check_range("write", offset, buf.len(), self.len)?;
        self.file.write_all_at(buf, offset.0)?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        if self.writable {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

/// In-memory byte device.
///
/// Used for images assembled in tests and for images loaded whole into
/// memory by tooling.
#[derive(Debug, Default)]
pub struct MemByteDevice {
    data: RwLock<Vec<u8>>,
}

impl MemByteDevice {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

impl ByteDevice for MemByteDevice {
    fn len_bytes(&self) -> u64 {
        self.data.read().len() as u64
    }

    #[allow(clippy::cast_possible_truncation)] // range checked against a Vec length
    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        let data = self.data.read();
        check_range("read", offset, buf.len(), data.len() as u64)?;
        let start = offset.0 as usize;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_all_at(&self, offset: ByteOffset, buf: &[u8]) -> Result<()> {
        let mut data = self.data.write();
        check_range("write", offset, buf.len(), data.len() as u64)?;
        let start = offset.0 as usize;
        data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Read the 16-byte magic header at offset 0.
pub fn read_magic_region(dev: &dyn ByteDevice) -> Result<[u8; MAGIC_SIZE]> {
    let mut buf = [0_u8; MAGIC_SIZE];
    dev.read_exact_at(ByteOffset::ZERO, &mut buf)?;
    Ok(buf)
}
