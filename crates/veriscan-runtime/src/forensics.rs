//! Forensic capture of model outputs that failed reconciliation.
//!
//! Records are write-only: nothing in the runtime reads them back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use veriscan_core::ReconcileError;

/// One failed reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForensicRecord {
    pub request_id: String,
    pub stage: String,
    pub error: String,
    /// Full raw model text, not an excerpt
    pub raw_text: String,
    pub captured_at: DateTime<Utc>,
}

impl ForensicRecord {
    pub fn new(request_id: &str, error: &ReconcileError, raw_text: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            stage: error.stage().to_string(),
            error: error.to_string(),
            raw_text: raw_text.to_string(),
            captured_at: Utc::now(),
        }
    }
}

/// Destination for forensic records.
///
/// Implementations must not fail the request; errors are theirs to log.
#[async_trait]
pub trait ForensicSink: Send + Sync {
    async fn capture(&self, record: ForensicRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ForensicSink for NoopSink {
    async fn capture(&self, _record: ForensicRecord) {}
}

/// Writes each record as a JSON file in a directory.
#[derive(Debug, Clone)]
pub struct FileDumpSink {
    dir: PathBuf,
}

impl FileDumpSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, record: &ForensicRecord) -> PathBuf {
        let id: String = record
            .request_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!(
            "{}-{}-{}.json",
            record.captured_at.format("%Y%m%dT%H%M%S%.3fZ"),
            record.stage,
            id
        ))
    }
}

#[async_trait]
impl ForensicSink for FileDumpSink {
    async fn capture(&self, record: ForensicRecord) {
        let path = self.path_for(&record);
        let body = match serde_json::to_vec_pretty(&record) {
            Ok(body) => body,
            Err(e) => {
                warn!(request_id = %record.request_id, error = %e, "Forensic record not serializable");
                return;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "Forensic dump directory unavailable");
            return;
        }
        match tokio::fs::write(&path, body).await {
            Ok(()) => debug!(request_id = %record.request_id, path = %path.display(), "Forensic dump written"),
            Err(e) => warn!(request_id = %record.request_id, error = %e, "Forensic dump failed"),
        }
    }
}
