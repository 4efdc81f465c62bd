//! URL manifest parsing and in-place status annotation.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use bookaward_core::UrlOutcome;
use bookaward_storage::ensure_scheme;

const JSON_COMPLETE: &str = "json-complete";
const FULLY_COMPLETE: &str = "json-complete, airtable-complete";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// 1-based line number.
    pub line: usize,
    /// URL as written in the manifest, before any scheme is added.
    pub raw: String,
    /// Trailing `# ...` comment, if any.
    pub status: Option<String>,
}

impl ManifestEntry {
    pub fn url(&self) -> String {
        ensure_scheme(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    JsonComplete,
    FullyComplete,
    Failed(String),
}

impl ManifestStatus {
    pub fn for_outcome(outcome: &UrlOutcome) -> Self {
        match outcome {
            UrlOutcome::Created | UrlOutcome::Updated | UrlOutcome::Unchanged => {
                ManifestStatus::FullyComplete
            }
            UrlOutcome::Extracted | UrlOutcome::SkippedLowConfidence => {
                ManifestStatus::JsonComplete
            }
            UrlOutcome::Failed(reason) => ManifestStatus::Failed(reason.clone()),
        }
    }
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestStatus::JsonComplete => f.write_str(JSON_COMPLETE),
            ManifestStatus::FullyComplete => f.write_str(FULLY_COMPLETE),
            ManifestStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

fn split_line(line: &str) -> Option<(&str, Option<&str>)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (url, comment) = match trimmed.split_once('#') {
        Some((url, comment)) => (url.trim(), Some(comment.trim())),
        None => (trimmed, None),
    };
    (!url.is_empty()).then_some((url, comment))
}

pub fn parse_manifest(text: &str) -> Vec<ManifestEntry> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let (url, comment) = split_line(line)?;
            Some(ManifestEntry {
                line: idx + 1,
                raw: url.to_string(),
                status: comment.filter(|c| !c.is_empty()).map(str::to_string),
            })
        })
        .collect()
}

pub async fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading manifest {}", path.display()))?;
    Ok(parse_manifest(&text))
}

/// Rewrite the status comment on every line holding `raw_url`.
/// A fully-complete line is never downgraded to json-complete.
pub fn annotate_text(text: &str, raw_url: &str, status: &ManifestStatus) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    for line in text.lines() {
        match split_line(line) {
            Some((url, current)) if url == raw_url => {
                let keep = *status == ManifestStatus::JsonComplete && current == Some(FULLY_COMPLETE);
                if keep {
                    out.push_str(line);
                } else {
                    out.push_str(&format!("{url}  # {status}"));
                }
            }
            _ => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

/// Annotate the manifest on disk via a temp file and rename.
pub async fn annotate_manifest(path: &Path, raw_url: &str, status: &ManifestStatus) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let updated = annotate_text(&text, raw_url, status);
    crate::write_atomic(path, updated.as_bytes()).await
}
