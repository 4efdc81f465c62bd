use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bookaward_core::wire::WireFields;
use bookaward_core::{AwardField, MemoryEventSink, PipelineEvent, RawPage, UrlOutcome};
use bookaward_storage::{FetchError, ListFilter, PageFetcher, RemoteRow, RemoteStore, WriteError};
use bookaward_sync::dump::read_dump;
use bookaward_sync::{RetryTuning, SyncConfig, SyncPipeline, Tuning};
use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

const ENTRY_URL: &str = "https://www.riverbendbookawards.org/enter";
const PERMISSION_ERROR: &str = "Invalid permissions, or the requested model was not found.";

fn fixture_html() -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/riverbend-book-awards/page.html");
    std::fs::read_to_string(path).expect("fixture page")
}

struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    fn serving(urls: &[&str]) -> Arc<Self> {
        let html = fixture_html();
        Arc::new(Self {
            pages: urls.iter().map(|u| (u.to_string(), html.clone())).collect(),
        })
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let html = self.pages.get(url).ok_or_else(|| FetchError::Http4xx {
            status: 404,
            url: url.to_string(),
        })?;
        Ok(RawPage {
            url: url.to_string(),
            html: html.clone(),
            fetched_at: Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap(),
        })
    }
}

#[derive(Default)]
struct MemoryStore {
    rows: Mutex<Vec<RemoteRow>>,
    creates: Mutex<usize>,
    updates: Mutex<Vec<(String, WireFields)>>,
    reject_with: Option<WriteError>,
}

impl MemoryStore {
    fn seeded(fields: serde_json::Value) -> Self {
        let store = Self::default();
        store.rows.lock().unwrap().push(RemoteRow {
            id: "recSEED".to_string(),
            created_time: None,
            fields: fields.as_object().cloned().unwrap(),
        });
        store
    }

    fn rejecting(message: &str) -> Self {
        Self {
            reject_with: Some(WriteError::Rejected {
                status: 403,
                message: message.to_string(),
            }),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn create(&self, fields: &WireFields) -> Result<RemoteRow, WriteError> {
        if let Some(err) = &self.reject_with {
            return Err(err.clone());
        }
        *self.creates.lock().unwrap() += 1;
        let mut rows = self.rows.lock().unwrap();
        let row = RemoteRow {
            id: format!("rec{:03}", rows.len() + 1),
            created_time: Some(Utc::now()),
            fields: fields.clone(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: &str, fields: &WireFields) -> Result<RemoteRow, WriteError> {
        if let Some(err) = &self.reject_with {
            return Err(err.clone());
        }
        self.updates
            .lock()
            .unwrap()
            .push((id.to_string(), fields.clone()));
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| WriteError::Rejected {
                status: 404,
                message: "record not found".to_string(),
            })?;
        for (key, value) in fields {
            row.fields.insert(key.clone(), value.clone());
        }
        Ok(row.clone())
    }

    async fn list(&self, _filter: &ListFilter) -> Result<Vec<RemoteRow>, WriteError> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn delete(&self, id: &str) -> Result<(), WriteError> {
        self.rows.lock().unwrap().retain(|row| row.id != id);
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    config: SyncConfig,
    events: Arc<MemoryEventSink>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig {
            airtable_api_key: None,
            airtable_base_id: None,
            airtable_table_name: None,
            failure_log_path: dir.path().join("failed_writes.sql"),
            data_dump_path: dir.path().join("book_awards_data.json"),
            manifest_path: dir.path().join("input_template.txt"),
            user_agent: None,
            http_timeout_secs: 5,
            tuning_path: None,
            confidence_column: None,
        };
        Self {
            dir,
            config,
            events: Arc::new(MemoryEventSink::new()),
        }
    }

    fn tuning() -> Tuning {
        Tuning {
            request_delay_ms: 0,
            follow_related_links: false,
            retry: RetryTuning {
                max_attempts: 1,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
            ..Tuning::default()
        }
    }

    fn pipeline(&self, fetcher: Arc<StaticFetcher>, tuning: Tuning) -> SyncPipeline {
        SyncPipeline::new(fetcher, &self.config, tuning).with_events(self.events.clone())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn outcomes(report: &bookaward_sync::RunReport) -> Vec<UrlOutcome> {
    report.outcomes.iter().map(|(_, o)| o.clone()).collect()
}

#[tokio::test]
async fn same_award_twice_in_one_run_is_created_once() {
    let harness = Harness::new();
    let fetcher = StaticFetcher::serving(&[ENTRY_URL]);
    let store = Arc::new(MemoryStore::default());
    let mut pipeline = harness
        .pipeline(fetcher, Harness::tuning())
        .with_store(store.clone());

    let report = pipeline
        .run_urls(&[ENTRY_URL.to_string(), "www.riverbendbookawards.org/enter".to_string()])
        .await
        .unwrap();

    assert_eq!(outcomes(&report), vec![UrlOutcome::Created, UrlOutcome::Unchanged]);
    assert_eq!(*store.creates.lock().unwrap(), 1);
    assert_eq!(report.summary.completed, 2);
    assert_eq!(read_dump(&harness.config.data_dump_path).await.unwrap().len(), 2);

    let rows = store.rows.lock().unwrap();
    assert_eq!(rows[0].fields["Award Name"], json!("Riverbend Book Awards 2025"));
    assert_eq!(rows[0].fields["Application Fee"], json!(75));
    assert_eq!(rows[0].fields["Vetting Note"], json!("imported by Web Scraper"));
}

#[tokio::test]
async fn update_sends_only_changed_fields_that_do_not_lower_confidence() {
    let harness = Harness::new();
    let fetcher = StaticFetcher::serving(&[ENTRY_URL]);
    let store = Arc::new(MemoryStore::seeded(json!({
        "Award Name": "Riverbend Book Awards 2025",
        "Award Website": "https://www.riverbendbookawards.org/",
        "Application Fee": 50
    })));
    let mut pipeline = harness
        .pipeline(fetcher, Harness::tuning())
        .with_store(store.clone());

    let report = pipeline.run_urls(&[ENTRY_URL.to_string()]).await.unwrap();
    assert_eq!(outcomes(&report), vec![UrlOutcome::Updated]);

    let updates = store.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    let (id, payload) = &updates[0];
    assert_eq!(id, "recSEED");
    assert!(!payload.contains_key("Application Fee"));
    assert!(!payload.contains_key("Award Name"));
    assert_eq!(payload["Award Status"], json!("Open"));
    assert_eq!(payload["Prize Amount"], json!(2500));
    assert!(payload.contains_key("Last Updated"));
    assert!(payload.contains_key("Data Quality Score"));
    assert_eq!(payload["Data Source"], json!(ENTRY_URL));
    assert_eq!(*store.creates.lock().unwrap(), 0);
}

#[tokio::test]
async fn permission_rejection_lands_in_the_failure_log() {
    let harness = Harness::new();
    let fetcher = StaticFetcher::serving(&[ENTRY_URL]);
    let store = Arc::new(MemoryStore::rejecting(PERMISSION_ERROR));
    let mut pipeline = harness
        .pipeline(fetcher, Harness::tuning())
        .with_store(store);

    let report = pipeline.run_urls(&[ENTRY_URL.to_string()]).await.unwrap();
    assert_eq!(
        outcomes(&report),
        vec![UrlOutcome::Failed(format!("write rejected: {PERMISSION_ERROR}"))]
    );
    assert_eq!(report.summary.failed, 1);

    let logged = harness
        .events
        .events()
        .into_iter()
        .find_map(|event| match event {
            PipelineEvent::FailureLogged {
                path,
                schema_emitted,
                ..
            } => Some((path, schema_emitted)),
            _ => None,
        })
        .expect("failure logged event");
    assert!(logged.0.is_absolute());
    assert!(logged.1);

    let sql = std::fs::read_to_string(harness.path("failed_writes.sql")).unwrap();
    assert_eq!(sql.matches("CREATE TABLE IF NOT EXISTS").count(), 1);
    assert!(sql.contains("'Riverbend Book Awards 2025'"));
    assert!(sql.contains(&format!("'{PERMISSION_ERROR}'")));
}

#[tokio::test]
async fn extract_only_writes_the_dump_and_touches_no_store() {
    let harness = Harness::new();
    let fetcher = StaticFetcher::serving(&[ENTRY_URL]);
    let mut pipeline = harness.pipeline(fetcher, Harness::tuning());

    let report = pipeline
        .run_urls(&[ENTRY_URL.to_string(), "https://gone.example.org/".to_string()])
        .await
        .unwrap();
    assert_eq!(
        outcomes(&report),
        vec![UrlOutcome::Extracted, UrlOutcome::Failed("HTTP 404".to_string())]
    );

    let dumped = read_dump(&harness.config.data_dump_path).await.unwrap();
    assert_eq!(dumped.len(), 1);
    assert_eq!(
        dumped[0].text(AwardField::AwardName),
        Some("Riverbend Book Awards 2025")
    );
    assert!(harness
        .events
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::DumpWritten { records: 1, .. })));
    assert!(!harness.path("failed_writes.sql").exists());
}

#[tokio::test]
async fn update_from_dump_writes_without_fetching() {
    let harness = Harness::new();
    let mut extract = harness.pipeline(StaticFetcher::serving(&[ENTRY_URL]), Harness::tuning());
    extract.run_urls(&[ENTRY_URL.to_string()]).await.unwrap();

    let store = Arc::new(MemoryStore::default());
    let mut writer = harness
        .pipeline(StaticFetcher::serving(&[]), Harness::tuning())
        .with_store(store.clone());
    let report = writer
        .run_update_only(&harness.config.data_dump_path)
        .await
        .unwrap();
    assert_eq!(outcomes(&report), vec![UrlOutcome::Created]);
    assert_eq!(store.rows.lock().unwrap().len(), 1);

    writer.delete_record("rec001").await.unwrap();
    assert!(store.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn low_quality_records_are_never_written() {
    let harness = Harness::new();
    let store = Arc::new(MemoryStore::default());
    let tuning = Tuning {
        min_quality: 0.99,
        ..Harness::tuning()
    };
    let mut pipeline = harness
        .pipeline(StaticFetcher::serving(&[ENTRY_URL]), tuning)
        .with_store(store.clone());

    let report = pipeline.run_urls(&[ENTRY_URL.to_string()]).await.unwrap();
    assert_eq!(outcomes(&report), vec![UrlOutcome::SkippedLowConfidence]);
    assert_eq!(report.summary.skipped, 1);
    assert!(store.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn manifest_lines_are_annotated_with_their_outcome() {
    let harness = Harness::new();
    let manifest = harness.path("input_template.txt");
    std::fs::write(
        &manifest,
        format!("# awards\n{ENTRY_URL}\nhttps://gone.example.org/  # json-complete\n"),
    )
    .unwrap();
    let mut pipeline = harness
        .pipeline(StaticFetcher::serving(&[ENTRY_URL]), Harness::tuning())
        .with_store(Arc::new(MemoryStore::default()));

    pipeline.run_manifest(&manifest, true).await.unwrap();

    let text = std::fs::read_to_string(&manifest).unwrap();
    assert_eq!(
        text,
        format!(
            "# awards\n{ENTRY_URL}  # json-complete, airtable-complete\nhttps://gone.example.org/  # failed: HTTP 404\n"
        )
    );
}

#[tokio::test]
async fn second_run_loads_the_snapshot_from_the_store_and_leaves_it_unchanged() {
    let harness = Harness::new();
    let store = Arc::new(MemoryStore::default());
    let mut first = harness
        .pipeline(StaticFetcher::serving(&[ENTRY_URL]), Harness::tuning())
        .with_store(store.clone());
    first.run_urls(&[ENTRY_URL.to_string()]).await.unwrap();

    let mut second = harness
        .pipeline(StaticFetcher::serving(&[ENTRY_URL]), Harness::tuning())
        .with_store(store.clone());
    let report = second.run_urls(&[ENTRY_URL.to_string()]).await.unwrap();

    assert_eq!(outcomes(&report), vec![UrlOutcome::Unchanged]);
    assert_eq!(*store.creates.lock().unwrap(), 1);
    assert!(store.updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unwritable_failure_log_does_not_abort_the_run() {
    let mut harness = Harness::new();
    let blocker = harness.path("not-a-dir");
    std::fs::write(&blocker, "plain file").unwrap();
    harness.config.failure_log_path = blocker.join("failed_writes.sql");
    let store = Arc::new(MemoryStore::rejecting(PERMISSION_ERROR));
    let mut pipeline = harness
        .pipeline(
            StaticFetcher::serving(&[ENTRY_URL, "https://www.riverbendbookawards.org/"]),
            Harness::tuning(),
        )
        .with_store(store);

    let report = pipeline
        .run_urls(&[
            ENTRY_URL.to_string(),
            "https://www.riverbendbookawards.org/".to_string(),
        ])
        .await
        .unwrap();

    let rejected = UrlOutcome::Failed(format!("write rejected: {PERMISSION_ERROR}"));
    assert_eq!(outcomes(&report), vec![rejected.clone(), rejected]);
    assert_eq!(report.summary.failed, 2);
    assert!(!harness
        .events
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::FailureLogged { .. })));
}

#[tokio::test]
async fn unwritable_data_dump_fails_the_url_and_moves_on() {
    let mut harness = Harness::new();
    let blocker = harness.path("not-a-dir");
    std::fs::write(&blocker, "plain file").unwrap();
    harness.config.data_dump_path = blocker.join("book_awards_data.json");
    let store = Arc::new(MemoryStore::default());
    let mut pipeline = harness
        .pipeline(StaticFetcher::serving(&[ENTRY_URL]), Harness::tuning())
        .with_store(store.clone());

    let report = pipeline
        .run_urls(&[ENTRY_URL.to_string(), "https://gone.example.org/".to_string()])
        .await
        .unwrap();

    let got = outcomes(&report);
    assert!(matches!(&got[0], UrlOutcome::Failed(reason) if reason.starts_with("data dump write failed")));
    assert_eq!(got[1], UrlOutcome::Failed("HTTP 404".to_string()));
    assert!(store.rows.lock().unwrap().is_empty());
}
