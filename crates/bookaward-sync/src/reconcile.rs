//! Matching candidates against the remote snapshot and deciding create, update or skip.

use std::cmp::Ordering;
use std::fmt;

use bookaward_core::wire::stores_as;
use bookaward_core::{AwardField, FieldValue, NormalizedRecord, RemoteRecord};
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use url::Url;

use crate::normalize::quality_score;

const DOMAIN_WEIGHT: f64 = 0.6;
const NAME_WEIGHT: f64 = 0.4;
const TOKEN_MATCH: f64 = 0.92;

/// Meta fields sent along with every non-empty update.
pub const RIDE_ALONG_FIELDS: [AwardField; 3] = [
    AwardField::LastUpdated,
    AwardField::DataQualityScore,
    AwardField::DataSource,
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub min_quality: f64,
    pub match_threshold: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_quality: 0.30,
            match_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    LowConfidence,
    NoChanges,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::LowConfidence => "low-confidence",
            SkipReason::NoChanges => "no-changes",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Create,
    Update {
        target_id: String,
        changed: Vec<AwardField>,
    },
    Skip(SkipReason),
}

impl Decision {
    /// Fields actually written for an update: the changed content plus ride-along meta.
    pub fn update_fields(changed: &[AwardField]) -> Vec<AwardField> {
        let mut fields = changed.to_vec();
        fields.extend(RIDE_ALONG_FIELDS);
        fields
    }
}

pub struct ReconcileEngine {
    config: ReconcileConfig,
}

impl ReconcileEngine {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ReconcileConfig {
        self.config
    }

    pub fn reconcile(&self, record: &NormalizedRecord, existing: &[RemoteRecord]) -> Decision {
        if quality_score(record) < self.config.min_quality {
            return Decision::Skip(SkipReason::LowConfidence);
        }
        let Some((target, _score)) = self.best_match(record, existing) else {
            return Decision::Create;
        };
        let changed = changed_fields(record, &target.record);
        if changed.is_empty() {
            Decision::Skip(SkipReason::NoChanges)
        } else {
            Decision::Update {
                target_id: target.id.clone(),
                changed,
            }
        }
    }

    /// Highest-scoring row at or above the threshold. Ties go to the most recently
    /// updated row, then to the smallest id.
    pub fn best_match<'a>(
        &self,
        record: &NormalizedRecord,
        existing: &'a [RemoteRecord],
    ) -> Option<(&'a RemoteRecord, f64)> {
        existing
            .iter()
            .map(|row| (row, similarity(record, &row.record)))
            .filter(|(_, score)| *score >= self.config.match_threshold)
            .max_by(|(a, sa), (b, sb)| {
                sa.partial_cmp(sb)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.record.last_updated().cmp(&b.record.last_updated()))
                    .then_with(|| b.id.cmp(&a.id))
            })
    }
}

pub fn normalize_name_tokens(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Symmetric Dice overlap where two tokens overlap when their Jaro-Winkler score is high.
pub fn name_overlap(a: &str, b: &str) -> f64 {
    let ta = normalize_name_tokens(a);
    let tb = normalize_name_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let hits = |from: &[String], to: &[String]| {
        from.iter()
            .filter(|t| to.iter().any(|u| jaro_winkler(t, u) >= TOKEN_MATCH))
            .count()
    };
    let overlap = hits(ta.as_slice(), tb.as_slice()) + hits(tb.as_slice(), ta.as_slice());
    overlap as f64 / (ta.len() + tb.len()) as f64
}

fn parse_site(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        Url::parse(trimmed).ok()
    } else {
        Url::parse(&format!("https://{trimmed}")).ok()
    }
}

fn bare_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Lowercased host with a leading `www.` dropped. Subdomains are kept, so two
/// awards on one shared blog host never count as the same site.
pub fn site_host(raw: &str) -> Option<String> {
    bare_host(&parse_site(raw)?)
}

/// Website with scheme, `www.`, case and trailing slash removed.
pub fn normalized_website(raw: &str) -> Option<String> {
    let url = parse_site(raw)?;
    let host = bare_host(&url)?;
    let path = url.path().trim_end_matches('/').to_lowercase();
    let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();
    Some(format!("{host}{path}{query}"))
}

pub fn similarity(a: &NormalizedRecord, b: &NormalizedRecord) -> f64 {
    let site_a = a.text(AwardField::Website);
    let site_b = b.text(AwardField::Website);
    if let (Some(sa), Some(sb)) = (site_a, site_b) {
        if let (Some(na), Some(nb)) = (normalized_website(sa), normalized_website(sb)) {
            if na == nb {
                return 1.0;
            }
        }
    }
    let domain = match (site_a.and_then(site_host), site_b.and_then(site_host)) {
        (Some(ha), Some(hb)) if ha == hb => 1.0,
        _ => 0.0,
    };
    let names = match (a.text(AwardField::AwardName), b.text(AwardField::AwardName)) {
        (Some(na), Some(nb)) => name_overlap(na, nb),
        _ => 0.0,
    };
    DOMAIN_WEIGHT * domain + NAME_WEIGHT * names
}

/// Content fields whose new value is present, would change the stored value, and is
/// at least as confident.
pub fn changed_fields(new: &NormalizedRecord, existing: &NormalizedRecord) -> Vec<AwardField> {
    AwardField::ALL
        .into_iter()
        .filter(|field| !field.is_meta())
        .filter(|field| {
            let incoming = new.get(*field);
            let current = existing.get(*field);
            let Some(value) = incoming.value.as_ref() else {
                return false;
            };
            value.is_informative()
                && !stores_as(value, current.value.as_ref())
                && incoming.confidence >= current.confidence
        })
        .collect()
}

/// Apply an update's fields onto the existing row, recomputing its quality score.
pub fn patch_record(
    existing: &NormalizedRecord,
    incoming: &NormalizedRecord,
    fields: &[AwardField],
) -> NormalizedRecord {
    let mut patched = existing.clone();
    for field in fields {
        if *field == AwardField::DataQualityScore {
            continue;
        }
        patched.fields.set(*field, incoming.get(*field).clone());
    }
    patched.set(
        AwardField::DataQualityScore,
        FieldValue::Score(quality_score(&patched)),
        1.0,
    );
    patched
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookaward_core::wire::{from_wire, to_wire};
    use bookaward_core::Money;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn record(name: &str, website: Option<&str>, confidence: f64) -> NormalizedRecord {
        let mut r = NormalizedRecord::default();
        r.set(AwardField::AwardName, FieldValue::Text(name.into()), confidence);
        if let Some(site) = website {
            r.set(AwardField::Website, FieldValue::Text(site.into()), confidence);
        }
        r
    }

    fn remote(id: &str, record: NormalizedRecord) -> RemoteRecord {
        RemoteRecord {
            id: id.into(),
            created_at: None,
            record,
        }
    }

    fn engine(min_quality: f64, match_threshold: f64) -> ReconcileEngine {
        ReconcileEngine::new(ReconcileConfig {
            min_quality,
            match_threshold,
        })
    }

    #[test]
    fn exact_website_match_never_creates() {
        let existing = vec![remote(
            "rec1",
            record("Completely Different", Some("https://www.riverbend.org/"), 1.0),
        )];
        let candidate = record("Riverbend Book Awards", Some("http://riverbend.org"), 0.9);
        let decision = engine(0.0, 0.8).reconcile(&candidate, &existing);
        assert_ne!(decision, Decision::Create);
    }

    #[test]
    fn low_quality_is_skipped_even_without_a_match() {
        let candidate = record("Tiny Prize", None, 0.1);
        assert!(quality_score(&candidate) < 0.5);
        assert_eq!(
            engine(0.5, 0.8).reconcile(&candidate, &[]),
            Decision::Skip(SkipReason::LowConfidence)
        );
    }

    #[test]
    fn updates_never_lower_confidence() {
        let existing = record("Riverbend Book Awards", Some("https://riverbend.org"), 1.0);
        let mut candidate = record("Riverbend Book Award", Some("https://riverbend.org"), 0.9);
        candidate.set(
            AwardField::Eligibility,
            FieldValue::Text("Indie authors".into()),
            0.7,
        );
        let decision = engine(0.0, 0.8).reconcile(&candidate, &[remote("rec1", existing)]);
        assert_eq!(
            decision,
            Decision::Update {
                target_id: "rec1".into(),
                changed: vec![AwardField::Eligibility],
            }
        );
    }

    #[test]
    fn identical_content_is_skipped_as_unchanged() {
        let existing = record("Riverbend Book Awards", Some("https://riverbend.org"), 0.9);
        let candidate = existing.clone();
        assert_eq!(
            engine(0.0, 0.8).reconcile(&candidate, &[remote("rec1", existing)]),
            Decision::Skip(SkipReason::NoChanges)
        );
    }

    #[test]
    fn rescraped_foreign_prize_is_unchanged_after_a_store_round_trip() {
        let mut scraped = record("Harbor Light Poetry Prize", Some("https://harborlight.ie"), 0.7);
        scraped.set(
            AwardField::PrizeAmount,
            FieldValue::Money(Money {
                amount: Decimal::from(1000),
                currency: "EUR".into(),
            }),
            0.7,
        );
        let column = Some("Field Confidence");
        let stored = from_wire(&to_wire(&scraped, column), column);
        assert_eq!(
            engine(0.0, 0.8).reconcile(&scraped, &[remote("rec1", stored)]),
            Decision::Skip(SkipReason::NoChanges)
        );
    }

    #[test]
    fn threshold_is_inclusive_at_the_boundary() {
        // Same host, unrelated names: score is exactly the domain weight.
        let existing = remote(
            "rec1",
            record("Alpha Poetry Prize", Some("https://www.example.org/alpha"), 0.9),
        );
        let candidate = record("Zeta Fiction Medal", Some("https://example.org/zeta"), 0.9);
        let score = similarity(&candidate, &existing.record);
        assert!((score - DOMAIN_WEIGHT).abs() < 1e-12);

        let rows = [existing];
        assert!(engine(0.0, DOMAIN_WEIGHT).best_match(&candidate, &rows).is_some());
        assert!(engine(0.0, DOMAIN_WEIGHT + 0.01).best_match(&candidate, &rows).is_none());
    }

    #[test]
    fn ties_prefer_recent_rows_then_smallest_id() {
        let mut older = record("Riverbend Book Awards", Some("https://riverbend.org"), 1.0);
        older.set(
            AwardField::LastUpdated,
            FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            1.0,
        );
        let mut newer = older.clone();
        newer.set(
            AwardField::LastUpdated,
            FieldValue::Timestamp(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            1.0,
        );
        let candidate = record("Riverbend Book Awards", Some("https://riverbend.org"), 0.9);
        let e = engine(0.0, 0.8);

        let rows = vec![remote("recB", older.clone()), remote("recA", newer)];
        assert_eq!(e.best_match(&candidate, &rows).unwrap().0.id, "recA");

        let rows = vec![remote("recB", older.clone()), remote("recA", older)];
        assert_eq!(e.best_match(&candidate, &rows).unwrap().0.id, "recA");
        let reversed: Vec<_> = rows.iter().rev().cloned().collect();
        assert_eq!(e.best_match(&candidate, &reversed).unwrap().0.id, "recA");
    }

    #[test]
    fn name_overlap_tolerates_small_spelling_differences() {
        assert_eq!(name_overlap("Riverbend Book Awards", "riverbend book awards"), 1.0);
        assert!(name_overlap("Riverbend Book Awards", "Riverbend Book Award") > 0.99);
        assert_eq!(name_overlap("Alpha", "Zeta"), 0.0);
        assert_eq!(
            name_overlap("Eric Hoffer Award", "Hoffer Award"),
            name_overlap("Hoffer Award", "Eric Hoffer Award")
        );
    }

    #[test]
    fn hosts_keep_subdomains_but_drop_www() {
        assert_eq!(
            site_host("https://www.awards.ibpa.org/x").as_deref(),
            Some("awards.ibpa.org")
        );
        assert_eq!(site_host("WWW.Example.co.uk/prize").as_deref(), Some("example.co.uk"));
        assert_ne!(
            site_host("https://harbor.wordpress.com/"),
            site_host("https://riverbend.wordpress.com/")
        );
        assert_eq!(
            normalized_website("HTTPS://WWW.Riverbend.org/").as_deref(),
            Some("riverbend.org")
        );
    }

    #[test]
    fn awards_on_a_shared_blog_host_are_not_merged() {
        let existing = vec![remote(
            "recRIVER",
            record(
                "Riverbend Book Awards",
                Some("https://riverbend.wordpress.com/"),
                0.9,
            ),
        )];
        let candidate = record(
            "Harbor Book Awards",
            Some("https://harbor.wordpress.com/"),
            0.9,
        );
        assert!(similarity(&candidate, &existing[0].record) < 0.8);
        assert_eq!(engine(0.0, 0.8).reconcile(&candidate, &existing), Decision::Create);
    }
}
