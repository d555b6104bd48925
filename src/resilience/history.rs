//! Bounded error history and the statistics derived from it.

use super::{ErrorKind, ErrorSeverity};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// One observed adapter failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub adapter: String,
    pub target: String,
    /// Zero-based attempt that produced the failure
    pub attempt: u32,
    /// Retry budget in force for this failure
    pub total_retries: u32,
}

/// Aggregate view over the retained error history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub total_errors: usize,
    pub by_kind: HashMap<ErrorKind, usize>,
    pub by_severity: HashMap<ErrorSeverity, usize>,
    pub by_adapter: HashMap<String, usize>,
    pub recent_errors: Vec<ErrorRecord>,
}

const RECENT_ERROR_COUNT: usize = 10;

/// Append-only ring of error records
#[derive(Debug)]
pub struct ErrorHistory {
    records: Mutex<VecDeque<ErrorRecord>>,
    capacity: usize,
}

impl ErrorHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn push(&self, record: ErrorRecord) {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn statistics(&self) -> ErrorStatistics {
        let records = self.records.lock();
        let mut stats = ErrorStatistics {
            total_errors: records.len(),
            ..Default::default()
        };

        for record in records.iter() {
            *stats.by_kind.entry(record.kind).or_default() += 1;
            *stats.by_severity.entry(record.severity).or_default() += 1;
            *stats.by_adapter.entry(record.adapter.clone()).or_default() += 1;
        }

        stats.recent_errors = records
            .iter()
            .rev()
            .take(RECENT_ERROR_COUNT)
            .cloned()
            .collect();
        stats
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}
