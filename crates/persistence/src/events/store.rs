//! JSONL Event Store - append-only writer
//!
//! Ghi events vào files JSONL theo ngày của event timestamp.

use crate::error::PersistenceResult;
use cashpoint_core::Event;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Event Store - ghi events vào files JSONL.
///
/// Files được tổ chức theo ngày: `data/journal/2026-10-16.jsonl`
pub struct EventStore {
    /// Thư mục chứa event files
    base_path: PathBuf,
    /// Counter cho event ID
    event_counter: AtomicU64,
    /// Current file writer (thread-safe)
    current_writer: Mutex<Option<EventWriter>>,
}

struct EventWriter {
    date: String,
    writer: BufWriter<File>,
}

impl EventStore {
    /// Tạo EventStore mới
    ///
    /// # Arguments
    /// * `base_path` - Đường dẫn thư mục chứa events (e.g., "data/journal")
    pub fn new<P: AsRef<Path>>(base_path: P) -> PersistenceResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        fs::create_dir_all(&base_path)?;

        let event_counter = Self::load_event_counter(&base_path)?;

        Ok(Self {
            base_path,
            event_counter: AtomicU64::new(event_counter),
            current_writer: Mutex::new(None),
        })
    }

    /// Lấy base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Load event counter từ files hiện có
    fn load_event_counter(base_path: &Path) -> PersistenceResult<u64> {
        let mut max_id: u64 = 0;

        for path in Self::jsonl_files(base_path)? {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for line in content.lines() {
                // EVT_000123 -> 123
                let id = serde_json::from_str::<Event>(line)
                    .ok()
                    .and_then(|e| e.event_id.strip_prefix("EVT_")?.parse::<u64>().ok());
                if let Some(id) = id {
                    max_id = max_id.max(id);
                }
            }
        }

        Ok(max_id + 1)
    }

    fn jsonl_files(dir: &Path) -> PersistenceResult<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn file_path(&self, date: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", date))
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Option<EventWriter>>> {
        self.current_writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "journal writer lock poisoned"))
    }

    /// Generate event ID mới
    pub fn next_event_id(&self) -> String {
        let id = self.event_counter.fetch_add(1, Ordering::SeqCst);
        format!("EVT_{:06}", id)
    }

    /// Ghi event vào file của ngày `event.timestamp`
    pub fn append(&self, event: &Event) -> PersistenceResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let json = serde_json::to_string(event)?;

        let mut guard = self.lock()?;

        let needs_new_file = guard.as_ref().map_or(true, |w| w.date != date);
        if needs_new_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.file_path(&date))?;
            *guard = Some(EventWriter {
                date,
                writer: BufWriter::new(file),
            });
        }

        if let Some(ref mut w) = *guard {
            writeln!(w.writer, "{}", json)?;
            w.writer.flush()?;
        }

        Ok(())
    }

    /// Lấy tất cả event files
    pub fn list_files(&self) -> PersistenceResult<Vec<PathBuf>> {
        Self::jsonl_files(&self.base_path)
    }

    /// Flush tất cả pending writes
    pub fn flush(&self) -> PersistenceResult<()> {
        let mut guard = self.lock()?;
        if let Some(ref mut w) = *guard {
            w.writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventStore {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn test_event_store_append() {
        let dir = tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();

        let event_id = store.next_event_id();
        let event = Event::cashout(&event_id, "STAFF_01", "CUST_001", "TX_1", 5000, dec!(5))
            .at(Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap());

        store.append(&event).unwrap();
        store.flush().unwrap();

        let files = store.list_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("2026-10-16.jsonl"));

        let content = fs::read_to_string(&files[0]).unwrap();
        assert!(content.contains("EVT_000001"));
        assert!(content.contains("cashout_completed"));
    }

    #[test]
    fn test_events_split_by_day() {
        let dir = tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();

        for day in [15, 16, 16] {
            let event = Event::cashout(&store.next_event_id(), "S", "C", "TX", 1000, dec!(1))
                .at(Utc.with_ymd_and_hms(2026, 10, day, 12, 0, 0).unwrap());
            store.append(&event).unwrap();
        }

        assert_eq!(store.list_files().unwrap().len(), 2);
    }

    #[test]
    fn test_event_store_counter() {
        let dir = tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();

        assert_eq!(store.next_event_id(), "EVT_000001");
        assert_eq!(store.next_event_id(), "EVT_000002");
        assert_eq!(store.next_event_id(), "EVT_000003");
    }

    #[test]
    fn test_event_store_reload_counter() {
        let dir = tempdir().unwrap();

        {
            let store = EventStore::new(dir.path()).unwrap();
            for _ in 0..2 {
                let event =
                    Event::cashout(&store.next_event_id(), "S", "C", "TX", 1000, dec!(1));
                store.append(&event).unwrap();
            }
        }

        // Second store continues from 3
        let store = EventStore::new(dir.path()).unwrap();
        assert_eq!(store.next_event_id(), "EVT_000003");
    }
}
