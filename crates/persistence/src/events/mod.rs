//! Audit journal
//!
//! Ghi và đọc events từ JSONL files. Mỗi event là một hành động đã commit
//! vào SQLite; journal không phải source of truth cho số dư.

pub mod replay;
pub mod store;

pub use replay::{EventFilter, EventReader, JournalSummary};
pub use store::EventStore;
