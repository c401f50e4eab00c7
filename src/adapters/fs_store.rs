//! Flash filesystem adapter.
//!
//! Implements [`RecordFileStore`] for the ring logs. On ESP32 the backend
//! is a SPIFFS partition registered into the VFS at [`STORAGE_ROOT`]; on
//! the host it is a plain directory (`VfsStore`) or an in-memory map
//! (`MemStore`) for tests.

use crate::app::ports::RecordFileStore;
use crate::error::StorageError;
use log::info;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// VFS mount point for history storage.
pub const STORAGE_ROOT: &str = "/storage";

#[cfg(target_os = "espidf")]
const STORAGE_PARTITION: &str = "storage";

/// Register the SPIFFS data partition into the VFS.
///
/// Formats the partition on first boot or after corruption
/// (`format_if_mount_failed`). Must run once before any [`VfsStore`]
/// access, from the main task.
#[cfg(target_os = "espidf")]
pub fn mount_storage() -> Result<(), crate::error::Error> {
    let base = b"/storage\0";
    let label = b"storage\0";
    let conf = esp_vfs_spiffs_conf_t {
        base_path: base.as_ptr() as *const _,
        partition_label: label.as_ptr() as *const _,
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: called once from the main task before concurrent VFS use.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret != ESP_OK {
        return Err(crate::error::Error::Init("SPIFFS mount failed"));
    }

    let mut total: usize = 0;
    let mut used: usize = 0;
    // SAFETY: label outlives the call; out-params are valid stack slots.
    let ret = unsafe { esp_spiffs_info(label.as_ptr() as *const _, &mut total, &mut used) };
    if ret == ESP_OK {
        info!("storage: SPIFFS mounted, {}/{} bytes used", used, total);
    }
    Ok(())
}

/// [`RecordFileStore`] over the OS filesystem (ESP-IDF VFS or host dirs).
pub struct VfsStore {
    base: std::path::PathBuf,
}

impl VfsStore {
    pub fn new(base: &str) -> Self {
        Self {
            base: std::path::PathBuf::from(base),
        }
    }

    fn full(&self, path: &str) -> std::path::PathBuf {
        self.base.join(path)
    }

    fn map_io(e: &std::io::Error) -> StorageError {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound
        } else {
            StorageError::IoError
        }
    }
}

impl RecordFileStore for VfsStore {
    fn exists(&self, path: &str) -> bool {
        self.full(path).exists()
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        let meta = std::fs::metadata(self.full(path)).map_err(|e| Self::map_io(&e))?;
        Ok(meta.len())
    }

    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = std::fs::File::open(self.full(path)).map_err(|e| Self::map_io(&e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|_| StorageError::IoError)?;
        file.read_exact(buf).map_err(|_| StorageError::IoError)
    }

    fn write_at(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        use std::io::{Seek, SeekFrom, Write};
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.full(path))
            .map_err(|_| StorageError::IoError)?;
        // Seeking past EOF zero-fills the hole, matching the ring layout.
        file.seek(SeekFrom::Start(offset))
            .map_err(|_| StorageError::IoError)?;
        file.write_all(data).map_err(|_| StorageError::IoError)?;
        file.flush().map_err(|_| StorageError::IoError)
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        std::fs::remove_file(self.full(path)).map_err(|e| Self::map_io(&e))
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        std::fs::rename(self.full(from), self.full(to)).map_err(|e| Self::map_io(&e))
    }
}

/// In-memory [`RecordFileStore`] for host tests.
#[cfg(not(target_os = "espidf"))]
pub struct MemStore {
    files: std::collections::HashMap<String, Vec<u8>>,
    allow_rename: bool,
}

#[cfg(not(target_os = "espidf"))]
impl MemStore {
    pub fn new() -> Self {
        Self {
            files: std::collections::HashMap::new(),
            allow_rename: true,
        }
    }

    /// A store whose `rename` always fails, like SPIFFS builds without
    /// rename support. Exercises the copy fallback path.
    pub fn without_rename() -> Self {
        Self {
            files: std::collections::HashMap::new(),
            allow_rename: false,
        }
    }

    /// Truncate a file to simulate a torn write or partial flash.
    pub fn truncate_for_test(&mut self, path: &str, len: usize) {
        if let Some(data) = self.files.get_mut(path) {
            data.truncate(len);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl RecordFileStore for MemStore {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        self.files
            .get(path)
            .map(|d| d.len() as u64)
            .ok_or(StorageError::NotFound)
    }

    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        let data = self.files.get(path).ok_or(StorageError::NotFound)?;
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .ok_or(StorageError::IoError)?;
        if end > data.len() {
            return Err(StorageError::IoError);
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let file = self.files.entry(path.to_string()).or_default();
        let start = offset as usize;
        let end = start.checked_add(data.len()).ok_or(StorageError::IoError)?;
        if file.len() < end {
            file.resize(end, 0);
        }
        file[start..end].copy_from_slice(data);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        if !self.allow_rename {
            return Err(StorageError::IoError);
        }
        let data = self.files.remove(from).ok_or(StorageError::NotFound)?;
        self.files.insert(to.to_string(), data);
        Ok(())
    }
}
