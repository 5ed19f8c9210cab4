//! Event Replay - đọc events từ JSONL files
//!
//! Dùng cho audit: lọc theo loại, actor, subject và tổng hợp.

use crate::error::PersistenceResult;
use cashpoint_core::{Event, EventType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Event Reader - đọc events từ files JSONL
pub struct EventReader {
    base_path: PathBuf,
}

impl EventReader {
    /// Tạo reader mới
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Đọc tất cả events từ một file
    pub fn read_file(&self, file_path: &Path) -> PersistenceResult<Vec<Event>> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }

        Ok(events)
    }

    /// Đọc events theo ngày
    pub fn read_date(&self, date: NaiveDate) -> PersistenceResult<Vec<Event>> {
        let file_path = self.base_path.join(format!("{}.jsonl", date.format("%Y-%m-%d")));
        if file_path.exists() {
            self.read_file(&file_path)
        } else {
            Ok(Vec::new())
        }
    }

    /// Đọc events trong khoảng ngày `[from, to]`
    pub fn read_range(&self, from: NaiveDate, to: NaiveDate) -> PersistenceResult<Vec<Event>> {
        let mut all_events = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            all_events.extend(self.read_date(date)?);
        }
        Ok(all_events)
    }

    /// Đọc tất cả events
    pub fn read_all(&self) -> PersistenceResult<Vec<Event>> {
        let mut all_events = Vec::new();

        if !self.base_path.exists() {
            return Ok(all_events);
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.base_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        files.sort();

        for file_path in files {
            all_events.extend(self.read_file(&file_path)?);
        }

        Ok(all_events)
    }
}

/// Event Filter - lọc events theo điều kiện
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    /// Staff/operator thực hiện
    pub actor_id: Option<String>,
    /// Customer hoặc store
    pub subject_id: Option<String>,
    /// Transaction hoặc reconciliation
    pub record_id: Option<String>,
    pub event_types: Option<Vec<EventType>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }

    pub fn subject(mut self, subject_id: &str) -> Self {
        self.subject_id = Some(subject_id.to_string());
        self
    }

    pub fn record(mut self, record_id: &str) -> Self {
        self.record_id = Some(record_id.to_string());
        self
    }

    pub fn event_types(mut self, types: Vec<EventType>) -> Self {
        self.event_types = Some(types);
        self
    }

    /// Kiểm tra event có match filter không
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref actor_id) = self.actor_id {
            if event.actor_id != *actor_id {
                return false;
            }
        }

        if let Some(ref subject_id) = self.subject_id {
            if event.subject_id != *subject_id {
                return false;
            }
        }

        if let Some(ref record_id) = self.record_id {
            if event.record_id.as_deref() != Some(record_id.as_str()) {
                return false;
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }

        true
    }

    /// Apply filter to events
    pub fn apply(&self, events: Vec<Event>) -> Vec<Event> {
        events.into_iter().filter(|e| self.matches(e)).collect()
    }
}

/// Tổng hợp journal theo loại event
#[derive(Debug, Default)]
pub struct JournalSummary {
    pub total_events: usize,
    pub by_type: BTreeMap<String, usize>,
    pub tokens_cashed_out: i64,
    pub tokens_reversed: i64,
    pub usd_cashed_out: Decimal,
}

impl JournalSummary {
    /// Tạo summary từ events
    pub fn generate(events: &[Event]) -> Self {
        let mut summary = Self {
            total_events: events.len(),
            ..Self::default()
        };

        for event in events {
            *summary
                .by_type
                .entry(event.event_type.as_str().to_string())
                .or_insert(0) += 1;

            match event.event_type {
                EventType::CashoutCompleted => {
                    summary.tokens_cashed_out += event.token_amount.unwrap_or(0);
                    summary.usd_cashed_out += event.usd_amount.unwrap_or(Decimal::ZERO);
                }
                EventType::CashoutReversed => {
                    summary.tokens_reversed += event.token_amount.unwrap_or(0);
                }
                _ => {}
            }
        }

        summary
    }

    /// Summary text
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Journal:\n\
             - Total events: {}\n\
             - Tokens cashed out: {} (${})\n\
             - Tokens reversed: {}",
            self.total_events, self.tokens_cashed_out, self.usd_cashed_out, self.tokens_reversed
        );
        for (event_type, count) in &self.by_type {
            text.push_str(&format!("\n  {}: {}", event_type, count));
        }
        text
    }
}
