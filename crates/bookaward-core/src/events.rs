//! Injectable observability sink for pipeline events.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

/// Final outcome of one processed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "kebab-case")]
pub enum UrlOutcome {
    Created,
    Updated,
    Unchanged,
    Extracted,
    Failed(String),
    SkippedLowConfidence,
}

impl UrlOutcome {
    pub fn label(&self) -> String {
        match self {
            UrlOutcome::Created => "completed (created)".to_string(),
            UrlOutcome::Updated => "completed (updated)".to_string(),
            UrlOutcome::Unchanged => "completed (unchanged)".to_string(),
            UrlOutcome::Extracted => "completed (extracted)".to_string(),
            UrlOutcome::Failed(reason) => format!("failed: {reason}"),
            UrlOutcome::SkippedLowConfidence => "skipped-low-confidence".to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            UrlOutcome::Created | UrlOutcome::Updated | UrlOutcome::Unchanged | UrlOutcome::Extracted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    UrlStarted {
        url: String,
    },
    UrlFinished {
        url: String,
        outcome: UrlOutcome,
    },
    ExtractionDegraded {
        url: String,
        field: String,
        reason: String,
    },
    FailureLogged {
        path: PathBuf,
        table: String,
        schema_emitted: bool,
    },
    DumpWritten {
        path: PathBuf,
        records: usize,
    },
    RunFinished {
        completed: usize,
        failed: usize,
        skipped: usize,
    },
}

pub trait EventSink: Send + Sync {
    fn record_event(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::UrlStarted { url } => info!(url = %url, "processing url"),
            PipelineEvent::UrlFinished { url, outcome } => match outcome {
                UrlOutcome::Failed(reason) => warn!(url = %url, reason = %reason, "url failed"),
                other => info!(url = %url, outcome = %other.label(), "url finished"),
            },
            PipelineEvent::ExtractionDegraded { url, field, reason } => {
                warn!(url = %url, field = %field, reason = %reason, "field extraction degraded")
            }
            PipelineEvent::FailureLogged {
                path,
                table,
                schema_emitted,
            } => warn!(
                path = %path.display(),
                table = %table,
                schema_emitted,
                "rejected write captured in failure log"
            ),
            PipelineEvent::DumpWritten { path, records } => {
                info!(path = %path.display(), records, "data dump written")
            }
            PipelineEvent::RunFinished {
                completed,
                failed,
                skipped,
            } => info!(completed, failed, skipped, "run finished"),
        }
    }
}

/// Keeps every event in memory; handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemoryEventSink {
    fn record_event(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
