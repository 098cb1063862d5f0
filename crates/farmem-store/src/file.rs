//! File-backed store.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use farmem_core::{Store, StoreError};

static TEMP_SEQ: AtomicU32 = AtomicU32::new(0);

/// A pool backed by a file on disk.
///
/// The file is opened on [`start`](Store::start) and created if
/// missing; it grows on demand as the pool is written. A store created
/// with [`temp`](Self::temp) removes its file again on
/// [`stop`](Store::stop), one created with [`open`](Self::open) leaves
/// it behind so the pool outlives the process.
pub struct FileStore {
    path: PathBuf,
    file: Option<File>,
    remove_on_stop: bool,
}

impl FileStore {
    /// Store backed by the file at `path`. The file persists after the
    /// store is stopped.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            remove_on_stop: false,
        }
    }

    /// Store backed by a fresh file in the system temp directory,
    /// removed again when the store stops.
    pub fn temp() -> Self {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let name = format!("farmem-{}-{seq}.pool", std::process::id());
        Self {
            path: std::env::temp_dir().join(name),
            file: None,
            remove_on_stop: true,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self, op: &'static str) -> Result<&mut File, StoreError> {
        self.file.as_mut().ok_or_else(|| {
            StoreError::io(
                op,
                std::io::Error::new(std::io::ErrorKind::NotConnected, "store not started"),
            )
        })
    }
}

impl Store for FileStore {
    fn start(&mut self) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| StoreError::io("open", e))?;
        self.file = Some(file);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StoreError> {
        if let Some(file) = self.file.take() {
            file.sync_all().map_err(|e| StoreError::io("sync", e))?;
            drop(file);
            if self.remove_on_stop {
                std::fs::remove_file(&self.path).map_err(|e| StoreError::io("remove", e))?;
            }
        }
        Ok(())
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        let file = self.file_mut("read")?;
        file.seek(SeekFrom::Start(u64::from(offset)))
            .map_err(|e| StoreError::io("seek", e))?;
        file.read_exact(buf).map_err(|e| StoreError::io("read", e))
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError> {
        let file = self.file_mut("write")?;
        file.seek(SeekFrom::Start(u64::from(offset)))
            .map_err(|e| StoreError::io("seek", e))?;
        file.write_all(data).map_err(|e| StoreError::io("write", e))
    }

    /// Truncate and re-extend instead of streaming zero chunks; the
    /// filesystem guarantees the extension reads as zeros.
    fn zero(&mut self, len: u32) -> Result<(), StoreError> {
        let file = self.file_mut("zero")?;
        file.set_len(0).map_err(|e| StoreError::io("truncate", e))?;
        file.set_len(u64::from(len))
            .map_err(|e| StoreError::io("extend", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_round_trip() {
        let mut store = FileStore::temp();
        store.start().unwrap();
        store.zero(1024).unwrap();
        store.write(100, b"on disk").unwrap();
        let mut buf = [0u8; 7];
        store.read(100, &mut buf).unwrap();
        assert_eq!(&buf, b"on disk");
        store.stop().unwrap();
    }

    #[test]
    fn temp_file_is_removed_on_stop() {
        let mut store = FileStore::temp();
        store.start().unwrap();
        store.zero(64).unwrap();
        let path = store.path().to_path_buf();
        assert!(path.exists());
        store.stop().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn zero_resets_previous_content() {
        let mut store = FileStore::temp();
        store.start().unwrap();
        store.zero(256).unwrap();
        store.write(0, &[0xFF; 256]).unwrap();
        store.zero(256).unwrap();
        let mut buf = [0u8; 256];
        store.read(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        store.stop().unwrap();
    }

    #[test]
    fn opened_file_persists_across_restart() {
        let mut store = FileStore::open(
            std::env::temp_dir().join(format!("farmem-persist-{}.pool", std::process::id())),
        );
        store.start().unwrap();
        store.zero(128).unwrap();
        store.write(8, b"durable").unwrap();
        store.stop().unwrap();

        store.start().unwrap();
        let mut buf = [0u8; 7];
        store.read(8, &mut buf).unwrap();
        assert_eq!(&buf, b"durable");
        store.stop().unwrap();
        std::fs::remove_file(store.path()).unwrap();
    }

    #[test]
    fn access_before_start_is_an_error() {
        let mut store = FileStore::temp();
        let mut buf = [0u8; 4];
        assert!(store.read(0, &mut buf).is_err());
    }
}
