//! Conversion between normalized records and the remote store's JSON field maps.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{Number, Value};

use crate::value::{AwardStatus, Category, FieldValue, Flag, Money};
use crate::{AwardField, FieldKind, NormalizedRecord};

/// Column name → JSON value, exactly as sent to or received from the store.
pub type WireFields = serde_json::Map<String, Value>;

/// Currency assumed for amounts read back from numeric store columns.
pub const DEFAULT_CURRENCY: &str = "USD";

pub fn to_wire(record: &NormalizedRecord, confidence_column: Option<&str>) -> WireFields {
    to_wire_subset(record, &AwardField::ALL, confidence_column)
}

/// Encode only `fields`; absent and uninformative values are left out.
pub fn to_wire_subset(
    record: &NormalizedRecord,
    fields: &[AwardField],
    confidence_column: Option<&str>,
) -> WireFields {
    let mut out = WireFields::new();
    let mut confidences = BTreeMap::new();
    for field in fields {
        let scored = record.get(*field);
        let Some(json) = scored.value.as_ref().and_then(value_to_json) else {
            continue;
        };
        out.insert(field.column_name().to_string(), json);
        confidences.insert(field.column_name(), scored.confidence);
    }
    if let Some(column) = confidence_column {
        if !confidences.is_empty() {
            let text = serde_json::to_string(&confidences).unwrap_or_default();
            out.insert(column.to_string(), Value::String(text));
        }
    }
    out
}

/// Decode a store row. Unknown columns are ignored; rows without a confidence
/// column count populated fields as fully confident.
pub fn from_wire(fields: &WireFields, confidence_column: Option<&str>) -> NormalizedRecord {
    let confidences: BTreeMap<String, f64> = confidence_column
        .and_then(|c| fields.get(c))
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();

    let mut record = NormalizedRecord::default();
    for (column, json) in fields {
        let Ok(field) = AwardField::from_column_name(column) else {
            continue;
        };
        if let Some(value) = value_from_json(field.kind(), json) {
            let confidence = confidences.get(column).copied().unwrap_or(1.0);
            record.set(field, value, confidence);
        }
    }
    record
}

pub fn value_to_json(value: &FieldValue) -> Option<Value> {
    if !value.is_informative() {
        return None;
    }
    Some(match value {
        FieldValue::Money(m) => decimal_to_json(m.amount)?,
        FieldValue::Flag(f) => Value::Bool(f.as_bool()?),
        FieldValue::Formats(set) => {
            Value::Array(set.iter().cloned().map(Value::String).collect())
        }
        FieldValue::Count(n) => Value::from(*n),
        FieldValue::Score(s) => Value::Number(Number::from_f64(*s)?),
        other => Value::String(other.canonical()),
    })
}

/// Whether `incoming` would be stored exactly as `current` already is. Money columns
/// hold only the amount, so a re-read amount matches a scraped one in any currency.
pub fn stores_as(incoming: &FieldValue, current: Option<&FieldValue>) -> bool {
    match (value_to_json(incoming), current.and_then(value_to_json)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

pub fn value_from_json(kind: FieldKind, json: &Value) -> Option<FieldValue> {
    match kind {
        FieldKind::Text | FieldKind::Url => {
            let s = json.as_str()?.trim();
            (!s.is_empty()).then(|| FieldValue::Text(s.to_string()))
        }
        FieldKind::Date => NaiveDate::parse_from_str(json.as_str()?, "%Y-%m-%d")
            .ok()
            .map(FieldValue::Date),
        FieldKind::Money => {
            let amount = match json {
                Value::Number(n) => json_number_to_decimal(n)?,
                Value::String(s) => Decimal::from_str(s.trim()).ok()?,
                _ => return None,
            };
            Some(FieldValue::Money(Money {
                amount: amount.normalize(),
                currency: DEFAULT_CURRENCY.to_string(),
            }))
        }
        FieldKind::Status => {
            let key = choice_key(json.as_str()?);
            AwardStatus::ALL
                .into_iter()
                .find(|st| choice_key(st.label()) == key)
                .map(FieldValue::Status)
        }
        FieldKind::Category => {
            let key = choice_key(json.as_str()?);
            Category::ALL
                .into_iter()
                .find(|c| choice_key(c.label()) == key)
                .map(FieldValue::Category)
        }
        FieldKind::Flag => json
            .as_bool()
            .map(|b| FieldValue::Flag(if b { Flag::Yes } else { Flag::No })),
        FieldKind::Formats => {
            let set: BTreeSet<String> = match json {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                Value::String(s) => s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
                _ => return None,
            };
            (!set.is_empty()).then_some(FieldValue::Formats(set))
        }
        FieldKind::Count => json
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(FieldValue::Count),
        FieldKind::Timestamp => DateTime::parse_from_rfc3339(json.as_str()?)
            .ok()
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc))),
        FieldKind::Score => json.as_f64().map(FieldValue::Score),
    }
}

/// Select-choice comparison key: lowercase alphanumerics only, so `Non-fiction`,
/// `Nonfiction` and `NON FICTION` are the same choice.
pub fn choice_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn decimal_to_json(amount: Decimal) -> Option<Value> {
    if amount.fract().is_zero() {
        if let Some(i) = amount.to_i64() {
            return Some(Value::from(i));
        }
    }
    Number::from_f64(amount.to_f64()?).map(Value::Number)
}

fn json_number_to_decimal(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    Decimal::from_f64(n.as_f64()?)
}
