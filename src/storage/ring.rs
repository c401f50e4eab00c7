//! Power-loss-tolerant circular record log.
//!
//! Append ordering is the whole durability story: the record bytes are
//! written **before** the header advance, so a crash between the two loses
//! at most the newest append and never corrupts older records. The header
//! is a cache of the newest valid index, possibly one behind reality after
//! an unclean reset — an accepted data-loss window, not a bug.
//!
//! Every operation validates structure first and falls back to a blank
//! recreate on violation. Nothing here returns a hard failure to the
//! control loop.

use log::{info, warn};

use crate::app::ports::RecordFileStore;
use crate::error::StorageError;

use super::{file_len, RingHeader, RingRecord, HEADER_LEN, RECORD_LEN};

/// One circular log instance (hourly or recent — same code, different
/// capacity and path).
#[derive(Debug, Clone, Copy)]
pub struct RingLog {
    path: &'static str,
    capacity: u16,
}

impl RingLog {
    pub const fn new(path: &'static str, capacity: u16) -> Self {
        Self { path, capacity }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Validate the backing file and recreate it blank if absent or
    /// structurally broken. Idempotent: calling on a healthy store is a
    /// no-op and loses nothing.
    pub fn init(&self, store: &mut impl RecordFileStore) {
        match validate_file(store, self.path, self.capacity) {
            Ok(_) => {}
            Err(e) => {
                if store.exists(self.path) {
                    warn!("RingLog {}: invalid store ({}), recreating", self.path, e);
                } else {
                    info!("RingLog {}: creating blank store", self.path);
                }
                self.recreate(store);
            }
        }
    }

    /// Remove and recreate blank. Used by the explicit clear operation.
    pub fn clear(&self, store: &mut impl RecordFileStore) {
        info!("RingLog {}: cleared", self.path);
        self.recreate(store);
    }

    // ── Writing ───────────────────────────────────────────────

    /// Append one record in FIFO ring order.
    ///
    /// Failures are logged and swallowed: a full or flaky flash loses this
    /// snapshot, never the measurement cycle.
    pub fn append(&self, store: &mut impl RecordFileStore, record: &RingRecord) {
        let mut hdr = match validate_file(store, self.path, self.capacity) {
            Ok(hdr) => hdr,
            Err(e) => {
                warn!("RingLog {}: append found bad store ({}), recreating", self.path, e);
                self.recreate(store);
                RingHeader::default()
            }
        };

        let offset = (HEADER_LEN + hdr.head as usize * RECORD_LEN) as u64;
        if let Err(e) = store.write_at(self.path, offset, &record.to_bytes()) {
            warn!("RingLog {}: record write failed ({})", self.path, e);
            return;
        }

        // Record is durable; only now advance the header.
        hdr.head = (hdr.head + 1) % self.capacity;
        hdr.count = (hdr.count + 1).min(self.capacity);
        if let Err(e) = store.write_at(self.path, 0, &hdr.to_bytes()) {
            warn!("RingLog {}: header write failed ({})", self.path, e);
        }
    }

    // ── Reading ───────────────────────────────────────────────

    /// Number of valid records, healing the store if broken.
    pub fn count(&self, store: &mut impl RecordFileStore) -> u16 {
        match validate_file(store, self.path, self.capacity) {
            Ok(hdr) => hdr.count,
            Err(e) => {
                warn!("RingLog {}: count found bad store ({}), recreating", self.path, e);
                self.recreate(store);
                0
            }
        }
    }

    /// Up to `min(n, count)` records, newest first, walking backward from
    /// `head - 1`. Sentinel slots (`ts == 0`) are skipped. Read-time
    /// corruption degrades to a blank recreate and an empty result.
    pub fn read_latest(&self, store: &mut impl RecordFileStore, n: usize) -> Vec<RingRecord> {
        let hdr = match validate_file(store, self.path, self.capacity) {
            Ok(hdr) => hdr,
            Err(e) => {
                warn!("RingLog {}: read found bad store ({}), recreating", self.path, e);
                self.recreate(store);
                return Vec::new();
            }
        };

        let cap = self.capacity as usize;
        let want = n.min(hdr.count as usize);
        let mut out = Vec::with_capacity(want);

        for i in 0..want {
            let idx = (hdr.head as usize + cap - 1 - i) % cap;
            let mut raw = [0u8; RECORD_LEN];
            let offset = (HEADER_LEN + idx * RECORD_LEN) as u64;
            if let Err(e) = store.read_at(self.path, offset, &mut raw) {
                warn!("RingLog {}: record read failed ({}), recreating", self.path, e);
                self.recreate(store);
                return Vec::new();
            }
            let rec = RingRecord::from_bytes(&raw);
            if rec.ts == 0 {
                continue; // never-written sentinel
            }
            out.push(rec);
        }
        out
    }

    // ── Backup / restore ──────────────────────────────────────

    /// Adopt an uploaded candidate file as the new store.
    ///
    /// The candidate is structurally validated first; a mismatch rejects it
    /// outright and leaves the existing store untouched. Commit is by
    /// rename, falling back to copy-then-delete when the backend cannot
    /// rename. The destination is re-validated before success is declared.
    pub fn replace_from(
        &self,
        store: &mut impl RecordFileStore,
        tmp_path: &str,
    ) -> Result<u16, StorageError> {
        let candidate = validate_file(store, tmp_path, self.capacity)?;

        if store.rename(tmp_path, self.path).is_err() {
            // Rename unsupported or crossed a mount point: copy in chunks,
            // then drop the staging file.
            copy_file(store, tmp_path, self.path, file_len(self.capacity))?;
            let _ = store.remove(tmp_path);
        }

        let adopted = validate_file(store, self.path, self.capacity)?;
        info!(
            "RingLog {}: restored from upload ({} records)",
            self.path, adopted.count
        );
        debug_assert_eq!(candidate.count, adopted.count);
        Ok(adopted.count)
    }

    // ── Internal ──────────────────────────────────────────────

    /// Drop the file (if any) and lay down a zero header plus
    /// `capacity` sentinel records.
    fn recreate(&self, store: &mut impl RecordFileStore) {
        let _ = store.remove(self.path);
        if let Err(e) = store.write_at(self.path, 0, &RingHeader::default().to_bytes()) {
            warn!("RingLog {}: blank header write failed ({})", self.path, e);
            return;
        }
        let blank = RingRecord::sentinel().to_bytes();
        for i in 0..self.capacity as usize {
            let offset = (HEADER_LEN + i * RECORD_LEN) as u64;
            if let Err(e) = store.write_at(self.path, offset, &blank) {
                warn!("RingLog {}: preallocation failed at slot {} ({})", self.path, i, e);
                return;
            }
        }
    }
}

/// Structural validation of any ring file: exact size, header invariants.
pub fn validate_file(
    store: &impl RecordFileStore,
    path: &str,
    capacity: u16,
) -> Result<RingHeader, StorageError> {
    if !store.exists(path) {
        return Err(StorageError::NotFound);
    }
    if store.size(path)? != file_len(capacity) {
        return Err(StorageError::WrongSize);
    }
    let mut raw = [0u8; HEADER_LEN];
    store.read_at(path, 0, &mut raw)?;
    let hdr = RingHeader::from_bytes(&raw);
    if !hdr.valid_for(capacity) {
        return Err(StorageError::BadHeader);
    }
    Ok(hdr)
}

fn copy_file(
    store: &mut impl RecordFileStore,
    from: &str,
    to: &str,
    len: u64,
) -> Result<(), StorageError> {
    const CHUNK: usize = 512;
    let mut buf = [0u8; CHUNK];
    let mut offset = 0u64;
    while offset < len {
        let take = ((len - offset) as usize).min(CHUNK);
        store.read_at(from, offset, &mut buf[..take])?;
        store.write_at(to, offset, &buf[..take])?;
        offset += take as u64;
    }
    Ok(())
}
