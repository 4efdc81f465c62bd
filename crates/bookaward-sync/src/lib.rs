//! Sync pipeline orchestration: fetch, extract, normalize, reconcile, write.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bookaward_adapters::{
    extract_report, find_related_links, merge_related, DuckDuckGoSearch, SearchCriteria,
    SearchProvider,
};
use bookaward_core::wire::{from_wire, to_wire, to_wire_subset, WireFields};
use bookaward_core::{
    AwardField, CandidateRecord, EventSink, NormalizedRecord, PipelineEvent, RawPage, RemoteRecord,
    TracingEventSink, UrlOutcome,
};
use bookaward_storage::{
    ensure_scheme, AirtableConfig, AirtableStore, BackoffPolicy, HttpClientConfig, HttpFetcher,
    ListFilter, PageFetcher, RemoteStore, RetryPolicy, WriteError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod dump;
pub mod failure_log;
pub mod manifest;
pub mod normalize;
pub mod reconcile;

use failure_log::FailureLog;
use manifest::{ManifestEntry, ManifestStatus};
use normalize::{normalize, NormalizeOptions};
use reconcile::{patch_record, Decision, ReconcileConfig, ReconcileEngine, SkipReason};

pub const CRATE_NAME: &str = "bookaward-sync";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid tuning: {0}")]
    InvalidTuning(String),
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub airtable_api_key: Option<String>,
    pub airtable_base_id: Option<String>,
    pub airtable_table_name: Option<String>,
    pub failure_log_path: PathBuf,
    pub data_dump_path: PathBuf,
    pub manifest_path: PathBuf,
    pub user_agent: Option<String>,
    pub http_timeout_secs: u64,
    pub tuning_path: Option<PathBuf>,
    pub confidence_column: Option<String>,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            airtable_api_key: non_empty_var("AIRTABLE_API_KEY"),
            airtable_base_id: non_empty_var("AIRTABLE_BASE_ID"),
            airtable_table_name: non_empty_var("AIRTABLE_TABLE_NAME"),
            failure_log_path: non_empty_var("BOOKAWARD_FAILURE_LOG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("failed_writes.sql")),
            data_dump_path: non_empty_var("BOOKAWARD_DATA_DUMP")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("book_awards_data.json")),
            manifest_path: non_empty_var("BOOKAWARD_MANIFEST")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("input_template.txt")),
            user_agent: non_empty_var("BOOKAWARD_USER_AGENT"),
            http_timeout_secs: non_empty_var("BOOKAWARD_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            tuning_path: non_empty_var("BOOKAWARD_TUNING").map(PathBuf::from),
            confidence_column: non_empty_var("BOOKAWARD_CONFIDENCE_COLUMN"),
        }
    }

    /// Store credentials; all three variables are required once writes are enabled.
    pub fn airtable_config(&self) -> Result<AirtableConfig, ConfigError> {
        let api_key = self
            .airtable_api_key
            .clone()
            .ok_or(ConfigError::MissingVar("AIRTABLE_API_KEY"))?;
        let base_id = self
            .airtable_base_id
            .clone()
            .ok_or(ConfigError::MissingVar("AIRTABLE_BASE_ID"))?;
        let table_name = self
            .airtable_table_name
            .clone()
            .ok_or(ConfigError::MissingVar("AIRTABLE_TABLE_NAME"))?;
        let mut config = AirtableConfig::new(api_key, base_id, table_name);
        config.timeout = Duration::from_secs(self.http_timeout_secs);
        Ok(config)
    }

    pub fn load_tuning(&self) -> Result<Tuning> {
        match &self.tuning_path {
            Some(path) => Tuning::load(path),
            None => Ok(Tuning::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryTuning {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryTuning {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.backoff.base_delay.as_millis() as u64,
            max_delay_ms: policy.backoff.max_delay.as_millis() as u64,
        }
    }
}

/// Knobs read from the optional tuning YAML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub match_threshold: f64,
    pub min_quality: f64,
    pub retry: RetryTuning,
    pub request_delay_ms: u64,
    pub follow_related_links: bool,
    pub search_queries: Vec<String>,
    pub max_search_results: usize,
    pub vetting_note: Option<String>,
}

impl Default for Tuning {
    fn default() -> Self {
        let reconcile = ReconcileConfig::default();
        let search = SearchCriteria::default();
        Self {
            match_threshold: reconcile.match_threshold,
            min_quality: reconcile.min_quality,
            retry: RetryTuning::default(),
            request_delay_ms: 2000,
            follow_related_links: true,
            search_queries: search.queries,
            max_search_results: search.max_results,
            vetting_note: None,
        }
    }
}

impl Tuning {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading tuning file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing tuning file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let tuning: Tuning = serde_yaml::from_str(text)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(ConfigError::InvalidTuning(format!(
                "match_threshold {} outside 0..=1",
                self.match_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err(ConfigError::InvalidTuning(format!(
                "min_quality {} outside 0..=1",
                self.min_quality
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidTuning(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff: BackoffPolicy {
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
            },
        }
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            min_quality: self.min_quality,
            match_threshold: self.match_threshold,
        }
    }

    pub fn search_criteria(&self) -> SearchCriteria {
        SearchCriteria {
            queries: self.search_queries.clone(),
            max_results: self.max_search_results,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &UrlOutcome) {
        match outcome {
            UrlOutcome::Failed(_) => self.failed += 1,
            UrlOutcome::SkippedLowConfidence => self.skipped += 1,
            _ => self.completed += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub outcomes: Vec<(String, UrlOutcome)>,
}

/// Write via a sibling temp file and rename so readers never see a partial file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))
}

pub struct SyncPipeline {
    fetcher: Arc<dyn PageFetcher>,
    store: Option<Arc<dyn RemoteStore>>,
    search: Option<Arc<dyn SearchProvider>>,
    events: Arc<dyn EventSink>,
    tuning: Tuning,
    engine: ReconcileEngine,
    retry: RetryPolicy,
    failure_log: FailureLog,
    data_dump_path: PathBuf,
    confidence_column: Option<String>,
    normalize_options: NormalizeOptions,
}

impl SyncPipeline {
    /// Extract-only pipeline; attach a store with [`SyncPipeline::with_store`] to enable writes.
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &SyncConfig, tuning: Tuning) -> Self {
        Self {
            fetcher,
            store: None,
            search: None,
            events: Arc::new(TracingEventSink),
            engine: ReconcileEngine::new(tuning.reconcile_config()),
            retry: tuning.retry_policy(),
            failure_log: FailureLog::new(config.failure_log_path.clone()),
            data_dump_path: config.data_dump_path.clone(),
            confidence_column: config.confidence_column.clone(),
            normalize_options: NormalizeOptions {
                vetting_note_override: tuning.vetting_note.clone(),
            },
            tuning,
        }
    }

    /// Wire the HTTP fetcher, search provider and, unless `extract_only`, the Airtable store.
    /// Missing credentials or a bad tuning file fail here, before any URL is touched.
    pub fn from_config(config: &SyncConfig, extract_only: bool) -> Result<Self> {
        let tuning = config.load_tuning()?;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: config.user_agent.clone(),
        })?);
        let search = Arc::new(DuckDuckGoSearch::new(fetcher.clone()));
        let mut pipeline = Self::new(fetcher, config, tuning).with_search(search);
        if !extract_only {
            let store = AirtableStore::new(config.airtable_config()?)?;
            pipeline = pipeline.with_store(Arc::new(store));
        }
        Ok(pipeline)
    }

    pub fn with_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub async fn run_urls(&mut self, urls: &[String]) -> Result<RunReport> {
        let entries: Vec<ManifestEntry> = urls
            .iter()
            .enumerate()
            .map(|(idx, url)| ManifestEntry {
                line: idx + 1,
                raw: url.clone(),
                status: None,
            })
            .collect();
        self.run_entries(&entries, None).await
    }

    /// Process every manifest URL, optionally rewriting each line's status comment.
    pub async fn run_manifest(&mut self, path: &Path, annotate: bool) -> Result<RunReport> {
        let entries = manifest::read_manifest(path).await?;
        if entries.is_empty() {
            warn!(path = %path.display(), "manifest lists no urls");
        }
        info!(urls = entries.len(), "manifest loaded");
        self.run_entries(&entries, annotate.then_some(path)).await
    }

    pub async fn run_search(&mut self) -> Result<RunReport> {
        let search = self
            .search
            .clone()
            .context("no search provider configured")?;
        let hits = search
            .query(&self.tuning.search_criteria(), self.retry)
            .await;
        info!(hits = hits.len(), "search finished");
        let urls: Vec<String> = hits.into_iter().map(|hit| hit.url).collect();
        self.run_urls(&urls).await
    }

    /// Reconcile and write records from a previous data dump without fetching anything.
    pub async fn run_update_only(&mut self, dump_path: &Path) -> Result<RunReport> {
        let started_at = Utc::now();
        let store = self.require_store()?;
        let records = dump::read_dump(dump_path).await?;
        info!(records = records.len(), path = %dump_path.display(), "data dump loaded");
        let mut snapshot = self.load_snapshot(store.as_ref()).await?;

        let mut summary = RunSummary::default();
        let mut outcomes = Vec::new();
        for record in &records {
            let label = record
                .text(AwardField::Website)
                .unwrap_or_else(|| record.display_name())
                .to_string();
            self.events
                .record_event(&PipelineEvent::UrlStarted { url: label.clone() });
            let outcome = self
                .reconcile_and_write(store.as_ref(), record, &mut snapshot)
                .await?;
            self.finish_url(&label, &outcome, &mut summary);
            outcomes.push((label, outcome));
        }
        Ok(self.finish_run(started_at, summary, outcomes))
    }

    pub async fn delete_record(&self, id: &str) -> Result<()> {
        let store = self.require_store()?;
        self.retry
            .run("delete", || store.delete(id))
            .await
            .with_context(|| format!("deleting record {id}"))?;
        info!(id, "record deleted");
        Ok(())
    }

    fn require_store(&self) -> Result<Arc<dyn RemoteStore>> {
        self.store
            .clone()
            .context("no remote store configured; run without --extract-only")
    }

    async fn load_snapshot(&self, store: &dyn RemoteStore) -> Result<Vec<RemoteRecord>> {
        let filter = ListFilter::all();
        let rows = self
            .retry
            .run("list", || store.list(&filter))
            .await
            .context("listing existing records")?;
        let column = self.confidence_column.as_deref();
        let snapshot: Vec<RemoteRecord> = rows
            .into_iter()
            .map(|row| RemoteRecord {
                id: row.id,
                created_at: row.created_time,
                record: from_wire(&row.fields, column),
            })
            .collect();
        info!(rows = snapshot.len(), "remote snapshot loaded");
        Ok(snapshot)
    }

    async fn run_entries(
        &mut self,
        entries: &[ManifestEntry],
        annotate: Option<&Path>,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let store = self.store.clone();
        let mut snapshot = match &store {
            Some(store) => self.load_snapshot(store.as_ref()).await?,
            None => Vec::new(),
        };

        let mut dumped = Vec::new();
        let mut summary = RunSummary::default();
        let mut outcomes = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            if idx > 0 && self.tuning.request_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.tuning.request_delay_ms)).await;
            }
            let url = entry.url();
            let span = info_span!("url", url = %url);
            let outcome = self
                .process_url(&url, store.as_deref(), &mut snapshot, &mut dumped)
                .instrument(span)
                .await?;
            if let Some(path) = annotate {
                let status = ManifestStatus::for_outcome(&outcome);
                if let Err(err) = manifest::annotate_manifest(path, &entry.raw, &status).await {
                    warn!(url = %url, error = %err, "could not annotate manifest");
                }
            }
            self.finish_url(&url, &outcome, &mut summary);
            outcomes.push((url, outcome));
        }
        Ok(self.finish_run(started_at, summary, outcomes))
    }

    async fn process_url(
        &mut self,
        url: &str,
        store: Option<&dyn RemoteStore>,
        snapshot: &mut Vec<RemoteRecord>,
        dumped: &mut Vec<NormalizedRecord>,
    ) -> Result<UrlOutcome> {
        self.events
            .record_event(&PipelineEvent::UrlStarted { url: url.to_string() });

        let page = match self.fetch(url).await {
            Ok(page) => page,
            Err(reason) => return Ok(UrlOutcome::Failed(reason)),
        };
        let mut candidate = self.extract_page(&page);
        if self.tuning.follow_related_links {
            self.merge_related_pages(&page, &mut candidate).await;
        }

        let record = normalize(&candidate, &self.normalize_options);
        dumped.push(record.clone());
        if let Err(err) = dump::write_dump(&self.data_dump_path, dumped).await {
            warn!(
                path = %self.data_dump_path.display(),
                error = %format!("{err:#}"),
                "data dump write failed"
            );
            return Ok(UrlOutcome::Failed(format!("data dump write failed: {err}")));
        }
        self.events.record_event(&PipelineEvent::DumpWritten {
            path: self.data_dump_path.clone(),
            records: dumped.len(),
        });

        match store {
            Some(store) => self.reconcile_and_write(store, &record, snapshot).await,
            None => Ok(UrlOutcome::Extracted),
        }
    }

    async fn fetch(&self, url: &str) -> Result<RawPage, String> {
        let fetcher = &self.fetcher;
        self.retry
            .run("fetch", || fetcher.fetch(url))
            .instrument(info_span!("fetch", url))
            .await
            .map_err(|err| {
                warn!(url, error = %err, "fetch failed");
                err.reason()
            })
    }

    fn extract_page(&self, page: &RawPage) -> CandidateRecord {
        let report = extract_report(page);
        for degraded in &report.degraded {
            self.events.record_event(&PipelineEvent::ExtractionDegraded {
                url: page.url.clone(),
                field: degraded.field.column_name().to_string(),
                reason: degraded.error.to_string(),
            });
        }
        report.candidate
    }

    /// Fill gaps from guideline, FAQ, about and contact pages. Failures only cost the gap.
    async fn merge_related_pages(&self, page: &RawPage, candidate: &mut CandidateRecord) {
        for (kind, link) in find_related_links(page) {
            let related = if kind.needs_fetch() {
                match self.fetch(&ensure_scheme(&link)).await {
                    Ok(related_page) => Some(self.extract_page(&related_page)),
                    Err(reason) => {
                        warn!(kind = %kind, link = %link, reason = %reason, "related page skipped");
                        None
                    }
                }
            } else {
                None
            };
            let filled = merge_related(candidate, kind, related.as_ref(), &link);
            if !filled.is_empty() {
                info!(kind = %kind, filled = filled.len(), "merged related page");
            }
        }
    }

    async fn reconcile_and_write(
        &mut self,
        store: &dyn RemoteStore,
        record: &NormalizedRecord,
        snapshot: &mut Vec<RemoteRecord>,
    ) -> Result<UrlOutcome> {
        let column = self.confidence_column.clone();
        match self.engine.reconcile(record, snapshot.as_slice()) {
            Decision::Skip(SkipReason::LowConfidence) => {
                info!(
                    award = record.display_name(),
                    quality = record.quality(),
                    "below minimum quality; not written"
                );
                Ok(UrlOutcome::SkippedLowConfidence)
            }
            Decision::Skip(SkipReason::NoChanges) => Ok(UrlOutcome::Unchanged),
            Decision::Create => {
                let wire = to_wire(record, column.as_deref());
                match self.retry.run("create", || store.create(&wire)).await {
                    Ok(row) => {
                        info!(id = %row.id, award = record.display_name(), "record created");
                        snapshot.push(RemoteRecord {
                            id: row.id,
                            created_at: row.created_time,
                            record: record.clone(),
                        });
                        Ok(UrlOutcome::Created)
                    }
                    Err(err) => Ok(self.log_write_failure(&wire, &err).await),
                }
            }
            Decision::Update { target_id, changed } => {
                let Some(position) = snapshot.iter().position(|row| row.id == target_id) else {
                    anyhow::bail!("matched record {target_id} vanished from the snapshot");
                };
                let fields = Decision::update_fields(&changed);
                let patched = patch_record(&snapshot[position].record, record, &fields);
                let wire = update_payload(&patched, &fields, column.as_deref());
                match self
                    .retry
                    .run("update", || store.update(&target_id, &wire))
                    .await
                {
                    Ok(_) => {
                        info!(
                            id = %target_id,
                            changed = changed.len(),
                            award = record.display_name(),
                            "record updated"
                        );
                        snapshot[position].record = patched;
                        Ok(UrlOutcome::Updated)
                    }
                    Err(err) => Ok(self.log_write_failure(&wire, &err).await),
                }
            }
        }
    }

    async fn log_write_failure(
        &mut self,
        attempted: &WireFields,
        err: &WriteError,
    ) -> UrlOutcome {
        match self.failure_log.log_failure(attempted, err.message()).await {
            Ok(logged) => self.events.record_event(&PipelineEvent::FailureLogged {
                path: logged.path,
                table: logged.table,
                schema_emitted: logged.schema_emitted,
            }),
            Err(log_err) => warn!(
                path = %self.failure_log.path().display(),
                error = %format!("{log_err:#}"),
                "could not append to the failure log"
            ),
        }
        UrlOutcome::Failed(format!("write rejected: {}", err.message()))
    }

    fn finish_url(&self, url: &str, outcome: &UrlOutcome, summary: &mut RunSummary) {
        summary.record(outcome);
        self.events.record_event(&PipelineEvent::UrlFinished {
            url: url.to_string(),
            outcome: outcome.clone(),
        });
    }

    fn finish_run(
        &self,
        started_at: DateTime<Utc>,
        summary: RunSummary,
        outcomes: Vec<(String, UrlOutcome)>,
    ) -> RunReport {
        self.events.record_event(&PipelineEvent::RunFinished {
            completed: summary.completed,
            failed: summary.failed,
            skipped: summary.skipped,
        });
        RunReport {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            summary,
            outcomes,
        }
    }
}

/// Only the update's fields, plus the confidence column computed over the whole patched row.
fn update_payload(
    patched: &NormalizedRecord,
    fields: &[AwardField],
    confidence_column: Option<&str>,
) -> WireFields {
    let mut wire = to_wire_subset(patched, fields, None);
    if let Some(column) = confidence_column {
        if let Some(confidences) = to_wire(patched, Some(column)).remove(column) {
            wire.insert(column.to_string(), confidences);
        }
    }
    wire
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_yaml_fills_defaults() {
        let tuning = Tuning::from_yaml("match_threshold: 0.9\nretry:\n  max_attempts: 2\n").unwrap();
        assert_eq!(tuning.match_threshold, 0.9);
        assert_eq!(tuning.min_quality, 0.30);
        assert_eq!(tuning.retry.max_attempts, 2);
        assert_eq!(tuning.retry.base_delay_ms, 500);
        assert!(tuning.follow_related_links);
        assert_eq!(tuning.search_queries.len(), 5);
    }

    #[test]
    fn invalid_tuning_is_rejected() {
        assert!(Tuning::from_yaml("min_quality: 1.5\n").is_err());
        assert!(Tuning::from_yaml("retry:\n  max_attempts: 0\n").is_err());
        assert!(Tuning::from_yaml("match_threshold: [oops]\n").is_err());
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let config = SyncConfig {
            airtable_api_key: Some("key".into()),
            airtable_base_id: None,
            airtable_table_name: Some("Awards".into()),
            failure_log_path: PathBuf::from("failed_writes.sql"),
            data_dump_path: PathBuf::from("book_awards_data.json"),
            manifest_path: PathBuf::from("input_template.txt"),
            user_agent: None,
            http_timeout_secs: 30,
            tuning_path: None,
            confidence_column: None,
        };
        assert_eq!(
            config.airtable_config().unwrap_err(),
            ConfigError::MissingVar("AIRTABLE_BASE_ID")
        );
    }

    #[test]
    fn summary_counts_each_outcome_kind() {
        let mut summary = RunSummary::default();
        for outcome in [
            UrlOutcome::Created,
            UrlOutcome::Unchanged,
            UrlOutcome::Failed("timeout".into()),
            UrlOutcome::SkippedLowConfidence,
        ] {
            summary.record(&outcome);
        }
        assert_eq!(
            summary,
            RunSummary {
                completed: 2,
                failed: 1,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_atomic(&path, b"[]").await.unwrap();
        write_atomic(&path, b"[1]").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1]");
        assert!(!dir.path().join("out.json.tmp").exists());
    }
}
