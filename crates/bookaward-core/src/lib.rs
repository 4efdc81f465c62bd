//! Core award schema, record types and provenance-free field values for book award sync.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod events;
pub mod value;
pub mod wire;

pub use events::{EventSink, MemoryEventSink, PipelineEvent, TracingEventSink, UrlOutcome};
pub use value::{AwardStatus, Category, FieldValue, Flag, Money};

pub const CRATE_NAME: &str = "bookaward-core";

/// Vetting note stamped on every imported record unless the caller overrides it.
pub const VETTING_NOTE: &str = "imported by Web Scraper";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("unknown award field `{0}`")]
    UnknownField(String),
    #[error("award record is missing field `{0}`")]
    MissingField(AwardField),
}

/// Value shape a field coerces into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Url,
    Date,
    Money,
    Status,
    Category,
    Flag,
    Formats,
    Count,
    Timestamp,
    Score,
}

/// Closed award schema. Serialized as the remote store's column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AwardField {
    #[serde(rename = "Award Name")]
    AwardName,
    #[serde(rename = "Category")]
    Category,
    #[serde(rename = "Award Status")]
    Status,
    #[serde(rename = "Award Website")]
    Website,
    #[serde(rename = "Awarding Organization")]
    Organization,
    #[serde(rename = "Entry Deadline")]
    EntryDeadline,
    #[serde(rename = "Eligibility Criteria")]
    Eligibility,
    #[serde(rename = "Application Procedures")]
    ApplicationProcedure,
    #[serde(rename = "Application Fee")]
    ApplicationFee,
    #[serde(rename = "Accepted Formats")]
    AcceptedFormats,
    #[serde(rename = "ISBN Required")]
    IsbnRequired,
    #[serde(rename = "Prize Amount")]
    PrizeAmount,
    #[serde(rename = "Extra Benefits")]
    ExtraBenefits,
    #[serde(rename = "In-Person Celebration")]
    InPersonCelebration,
    #[serde(rename = "Past Winners URL")]
    PastWinnersUrl,
    #[serde(rename = "Contact Person")]
    ContactPerson,
    #[serde(rename = "Contact Email")]
    ContactEmail,
    #[serde(rename = "Contact Phone")]
    ContactPhone,
    #[serde(rename = "Physical Address")]
    ContactAddress,
    #[serde(rename = "Geographic Restrictions")]
    GeographicRestrictions,
    #[serde(rename = "Judging Criteria")]
    JudgingCriteria,
    #[serde(rename = "Number of Categories")]
    NumberOfCategories,
    #[serde(rename = "Data Source")]
    DataSource,
    #[serde(rename = "Last Updated")]
    LastUpdated,
    #[serde(rename = "Data Quality Score")]
    DataQualityScore,
    #[serde(rename = "Vetting Note")]
    VettingNote,
}

impl AwardField {
    pub const ALL: [AwardField; 26] = [
        AwardField::AwardName,
        AwardField::Category,
        AwardField::Status,
        AwardField::Website,
        AwardField::Organization,
        AwardField::EntryDeadline,
        AwardField::Eligibility,
        AwardField::ApplicationProcedure,
        AwardField::ApplicationFee,
        AwardField::AcceptedFormats,
        AwardField::IsbnRequired,
        AwardField::PrizeAmount,
        AwardField::ExtraBenefits,
        AwardField::InPersonCelebration,
        AwardField::PastWinnersUrl,
        AwardField::ContactPerson,
        AwardField::ContactEmail,
        AwardField::ContactPhone,
        AwardField::ContactAddress,
        AwardField::GeographicRestrictions,
        AwardField::JudgingCriteria,
        AwardField::NumberOfCategories,
        AwardField::DataSource,
        AwardField::LastUpdated,
        AwardField::DataQualityScore,
        AwardField::VettingNote,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            AwardField::AwardName => "Award Name",
            AwardField::Category => "Category",
            AwardField::Status => "Award Status",
            AwardField::Website => "Award Website",
            AwardField::Organization => "Awarding Organization",
            AwardField::EntryDeadline => "Entry Deadline",
            AwardField::Eligibility => "Eligibility Criteria",
            AwardField::ApplicationProcedure => "Application Procedures",
            AwardField::ApplicationFee => "Application Fee",
            AwardField::AcceptedFormats => "Accepted Formats",
            AwardField::IsbnRequired => "ISBN Required",
            AwardField::PrizeAmount => "Prize Amount",
            AwardField::ExtraBenefits => "Extra Benefits",
            AwardField::InPersonCelebration => "In-Person Celebration",
            AwardField::PastWinnersUrl => "Past Winners URL",
            AwardField::ContactPerson => "Contact Person",
            AwardField::ContactEmail => "Contact Email",
            AwardField::ContactPhone => "Contact Phone",
            AwardField::ContactAddress => "Physical Address",
            AwardField::GeographicRestrictions => "Geographic Restrictions",
            AwardField::JudgingCriteria => "Judging Criteria",
            AwardField::NumberOfCategories => "Number of Categories",
            AwardField::DataSource => "Data Source",
            AwardField::LastUpdated => "Last Updated",
            AwardField::DataQualityScore => "Data Quality Score",
            AwardField::VettingNote => "Vetting Note",
        }
    }

    pub fn from_column_name(name: &str) -> Result<Self, RecordError> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.column_name() == name)
            .ok_or_else(|| RecordError::UnknownField(name.to_string()))
    }

    pub fn kind(self) -> FieldKind {
        match self {
            AwardField::Category => FieldKind::Category,
            AwardField::Status => FieldKind::Status,
            AwardField::Website | AwardField::PastWinnersUrl | AwardField::DataSource => {
                FieldKind::Url
            }
            AwardField::EntryDeadline => FieldKind::Date,
            AwardField::ApplicationFee | AwardField::PrizeAmount => FieldKind::Money,
            AwardField::AcceptedFormats => FieldKind::Formats,
            AwardField::IsbnRequired | AwardField::InPersonCelebration => FieldKind::Flag,
            AwardField::NumberOfCategories => FieldKind::Count,
            AwardField::LastUpdated => FieldKind::Timestamp,
            AwardField::DataQualityScore => FieldKind::Score,
            _ => FieldKind::Text,
        }
    }

    /// Bookkeeping fields stamped by the pipeline rather than scraped.
    pub fn is_meta(self) -> bool {
        matches!(
            self,
            AwardField::DataSource
                | AwardField::LastUpdated
                | AwardField::DataQualityScore
                | AwardField::VettingNote
        )
    }

    /// Importance weight in the data-quality score. `None` for meta fields.
    pub fn weight(self) -> Option<f64> {
        if self.is_meta() {
            return None;
        }
        Some(match self {
            AwardField::AwardName | AwardField::Website => 4.0,
            AwardField::EntryDeadline | AwardField::PrizeAmount => 1.5,
            AwardField::Category
            | AwardField::Status
            | AwardField::Organization
            | AwardField::Eligibility
            | AwardField::ApplicationProcedure
            | AwardField::ApplicationFee => 1.0,
            _ => 0.5,
        })
    }
}

impl fmt::Display for AwardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for AwardField {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_column_name(s)
    }
}

/// A field value paired with the extraction confidence that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scored<T> {
    pub value: Option<T>,
    pub confidence: f64,
}

impl<T> Scored<T> {
    pub fn empty() -> Self {
        Self {
            value: None,
            confidence: 0.0,
        }
    }

    pub fn new(value: T, confidence: f64) -> Self {
        Self {
            value: Some(value),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl<T> Default for Scored<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Every schema field mapped to a scored value; never missing a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<AwardField, Scored<T>>",
    into = "BTreeMap<AwardField, Scored<T>>",
    bound(
        serialize = "T: Serialize + Clone",
        deserialize = "T: Deserialize<'de>"
    )
)]
pub struct FieldMap<T>(BTreeMap<AwardField, Scored<T>>);

impl<T> FieldMap<T> {
    pub fn empty() -> Self {
        Self(
            AwardField::ALL
                .iter()
                .map(|f| (*f, Scored::empty()))
                .collect(),
        )
    }

    pub fn get(&self, field: AwardField) -> &Scored<T> {
        // Construction guarantees every key.
        &self.0[&field]
    }

    pub fn get_mut(&mut self, field: AwardField) -> &mut Scored<T> {
        self.0.entry(field).or_insert_with(Scored::empty)
    }

    pub fn set(&mut self, field: AwardField, scored: Scored<T>) {
        self.0.insert(field, scored);
    }

    pub fn iter(&self) -> impl Iterator<Item = (AwardField, &Scored<T>)> {
        self.0.iter().map(|(f, s)| (*f, s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for FieldMap<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> TryFrom<BTreeMap<AwardField, Scored<T>>> for FieldMap<T> {
    type Error = RecordError;

    fn try_from(map: BTreeMap<AwardField, Scored<T>>) -> Result<Self, Self::Error> {
        if let Some(missing) = AwardField::ALL.iter().find(|f| !map.contains_key(f)) {
            return Err(RecordError::MissingField(*missing));
        }
        Ok(Self(map))
    }
}

impl<T> From<FieldMap<T>> for BTreeMap<AwardField, Scored<T>> {
    fn from(map: FieldMap<T>) -> Self {
        map.0
    }
}

/// One fetched page handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

/// Extracted, not-yet-coerced award record for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CandidateRecord {
    pub fields: FieldMap<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl CandidateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: AwardField) -> &Scored<String> {
        self.fields.get(field)
    }

    pub fn value(&self, field: AwardField) -> Option<&str> {
        self.fields.get(field).value.as_deref()
    }

    pub fn set(&mut self, field: AwardField, value: impl Into<String>, confidence: f64) {
        self.fields.set(field, Scored::new(value.into(), confidence));
    }

    pub fn clear(&mut self, field: AwardField) {
        self.fields.set(field, Scored::empty());
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Type-coerced award record with an aggregate data-quality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedRecord {
    pub fields: FieldMap<FieldValue>,
}

impl NormalizedRecord {
    pub fn get(&self, field: AwardField) -> &Scored<FieldValue> {
        self.fields.get(field)
    }

    pub fn value(&self, field: AwardField) -> Option<&FieldValue> {
        self.fields.get(field).value.as_ref()
    }

    pub fn text(&self, field: AwardField) -> Option<&str> {
        match self.value(field)? {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn confidence(&self, field: AwardField) -> f64 {
        self.fields.get(field).confidence
    }

    pub fn set(&mut self, field: AwardField, value: FieldValue, confidence: f64) {
        self.fields.set(field, Scored::new(value, confidence));
    }

    pub fn quality(&self) -> f64 {
        match self.value(AwardField::DataQualityScore) {
            Some(FieldValue::Score(s)) => *s,
            _ => 0.0,
        }
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        match self.value(AwardField::LastUpdated) {
            Some(FieldValue::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.text(AwardField::AwardName).unwrap_or("Unknown")
    }
}

/// Row already present in the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub record: NormalizedRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_candidate_carries_every_schema_key() {
        let candidate = CandidateRecord::new();
        assert_eq!(candidate.fields.len(), AwardField::ALL.len());
        for field in AwardField::ALL {
            assert!(candidate.get(field).value.is_none());
            assert_eq!(candidate.get(field).confidence, 0.0);
        }
    }

    #[test]
    fn column_names_resolve_and_unknown_names_are_rejected() {
        assert_eq!(
            AwardField::from_column_name("Prize Amount").unwrap(),
            AwardField::PrizeAmount
        );
        assert_eq!(
            "Alli Rating".parse::<AwardField>(),
            Err(RecordError::UnknownField("Alli Rating".to_string()))
        );
    }

    #[test]
    fn deserializing_rejects_unknown_and_missing_fields() {
        let candidate = CandidateRecord::new();
        let mut value = serde_json::to_value(&candidate).unwrap();
        let fields = value["fields"].as_object_mut().unwrap();
        fields.insert(
            "Alli Rating".to_string(),
            serde_json::json!({"value": "A", "confidence": 1.0}),
        );
        assert!(serde_json::from_value::<CandidateRecord>(value.clone()).is_err());

        let fields = value["fields"].as_object_mut().unwrap();
        fields.remove("Alli Rating");
        fields.remove("Award Name");
        let err = serde_json::from_value::<CandidateRecord>(value).unwrap_err();
        assert!(err.to_string().contains("Award Name"));
    }

    #[test]
    fn meta_fields_have_no_weight_and_name_and_website_weigh_most() {
        let max = AwardField::ALL
            .iter()
            .filter_map(|f| f.weight())
            .fold(0.0_f64, f64::max);
        assert_eq!(AwardField::AwardName.weight(), Some(max));
        assert_eq!(AwardField::Website.weight(), Some(max));
        assert_eq!(AwardField::VettingNote.weight(), None);
        assert_eq!(AwardField::LastUpdated.weight(), None);
    }
}
