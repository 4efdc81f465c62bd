//! Coercion of extracted strings into typed award values plus the data-quality score.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::LazyLock;

use bookaward_adapters::text::{collapse_whitespace, parse_calendar_date};
use bookaward_core::{
    AwardField, AwardStatus, CandidateRecord, Category, FieldKind, FieldValue, Flag, Money,
    NormalizedRecord, Scored, VETTING_NOTE,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;

static RE_CURRENCY_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(usd|eur|gbp|cad|aud|nzd|chf|inr|jpy)\b").unwrap()
});
static RE_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());
static RE_LEADING_INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)").unwrap());
static RE_LIST_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:[,;/&]|\band\b)\s*").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Replaces the stamped vetting note when set.
    pub vetting_note_override: Option<String>,
}

/// Result of coercing one raw string. `degraded` halves the field confidence.
struct Coerced {
    value: Option<FieldValue>,
    degraded: bool,
}

impl Coerced {
    fn ok(value: FieldValue) -> Self {
        Self {
            value: Some(value),
            degraded: false,
        }
    }

    fn empty() -> Self {
        Self {
            value: None,
            degraded: false,
        }
    }

    fn failed(value: Option<FieldValue>) -> Self {
        Self {
            value,
            degraded: true,
        }
    }
}

pub fn normalize(candidate: &CandidateRecord, options: &NormalizeOptions) -> NormalizedRecord {
    let mut record = NormalizedRecord::default();
    for field in AwardField::ALL {
        if matches!(field, AwardField::DataQualityScore | AwardField::VettingNote) {
            continue;
        }
        let scored = candidate.get(field);
        let Some(raw) = scored.value.as_deref() else {
            record.fields.set(
                field,
                Scored {
                    value: None,
                    confidence: scored.confidence,
                },
            );
            continue;
        };
        let coerced = coerce(field.kind(), raw);
        let confidence = if coerced.degraded {
            scored.confidence / 2.0
        } else {
            scored.confidence
        };
        record.fields.set(
            field,
            Scored {
                value: coerced.value,
                confidence,
            },
        );
    }

    let note = options
        .vetting_note_override
        .clone()
        .unwrap_or_else(|| VETTING_NOTE.to_string());
    record.set(AwardField::VettingNote, FieldValue::Text(note), 1.0);
    record.set(
        AwardField::DataQualityScore,
        FieldValue::Score(quality_score(&record)),
        1.0,
    );
    record
}

/// Render a normalized record back into canonical strings so it can be normalized again.
pub fn to_candidate(record: &NormalizedRecord) -> CandidateRecord {
    let mut candidate = CandidateRecord::new();
    for (field, scored) in record.fields.iter() {
        let value = scored.value.as_ref().map(FieldValue::canonical);
        candidate.fields.set(
            field,
            Scored {
                value,
                confidence: scored.confidence,
            },
        );
    }
    candidate
}

/// Weighted mean of content-field confidences. Null and uninformative values count as 0.
pub fn quality_score(record: &NormalizedRecord) -> f64 {
    let mut total = 0.0;
    let mut weights = 0.0;
    for field in AwardField::ALL {
        let Some(weight) = field.weight() else {
            continue;
        };
        weights += weight;
        let scored = record.get(field);
        if scored.value.as_ref().is_some_and(FieldValue::is_informative) {
            total += weight * scored.confidence;
        }
    }
    if weights == 0.0 {
        0.0
    } else {
        total / weights
    }
}

fn coerce(kind: FieldKind, raw: &str) -> Coerced {
    let text = collapse_whitespace(raw);
    if text.is_empty() {
        return Coerced::empty();
    }
    match kind {
        FieldKind::Text | FieldKind::Url => Coerced::ok(FieldValue::Text(text)),
        FieldKind::Date => match parse_calendar_date(&text) {
            Some(date) => Coerced::ok(FieldValue::Date(date)),
            None => Coerced::failed(None),
        },
        FieldKind::Money => match parse_money(&text) {
            Some(money) => Coerced::ok(FieldValue::Money(money)),
            None => Coerced::failed(None),
        },
        FieldKind::Status => match parse_status(&text) {
            Some(status) => Coerced::ok(FieldValue::Status(status)),
            None => Coerced::failed(Some(FieldValue::Status(AwardStatus::Unknown))),
        },
        FieldKind::Category => match parse_category(&text) {
            Some(category) => Coerced::ok(FieldValue::Category(category)),
            None => Coerced::failed(None),
        },
        FieldKind::Flag => match parse_flag(&text) {
            Some(flag) => Coerced::ok(FieldValue::Flag(flag)),
            None => Coerced::failed(Some(FieldValue::Flag(Flag::Unknown))),
        },
        FieldKind::Formats => {
            let formats = parse_formats(&text);
            if formats.is_empty() {
                Coerced::empty()
            } else {
                Coerced::ok(FieldValue::Formats(formats))
            }
        }
        FieldKind::Count => match RE_LEADING_INT
            .captures(&text)
            .and_then(|caps| caps[1].parse::<u32>().ok())
        {
            Some(n) => Coerced::ok(FieldValue::Count(n)),
            None => Coerced::failed(None),
        },
        FieldKind::Timestamp => match DateTime::parse_from_rfc3339(&text) {
            Ok(ts) => Coerced::ok(FieldValue::Timestamp(ts.with_timezone(&Utc))),
            Err(_) => Coerced::failed(None),
        },
        FieldKind::Score => match text.parse::<f64>() {
            Ok(score) if score.is_finite() => Coerced::ok(FieldValue::Score(score)),
            _ => Coerced::failed(None),
        },
    }
}

pub fn parse_money(text: &str) -> Option<Money> {
    let lower = text.to_lowercase();
    if lower == "free" || lower.contains("no fee") || lower.starts_with("free ") {
        return Some(Money {
            amount: Decimal::ZERO,
            currency: bookaward_core::wire::DEFAULT_CURRENCY.to_string(),
        });
    }
    let currency = match RE_CURRENCY_CODE.captures(text) {
        Some(caps) => caps[1].to_uppercase(),
        None if text.contains('€') => "EUR".to_string(),
        None if text.contains('£') => "GBP".to_string(),
        None => bookaward_core::wire::DEFAULT_CURRENCY.to_string(),
    };
    let digits = RE_AMOUNT.find(text)?.as_str().replace(',', "");
    let amount = Decimal::from_str(&digits).ok()?;
    Some(Money {
        amount: amount.normalize(),
        currency,
    })
}

pub fn parse_status(text: &str) -> Option<AwardStatus> {
    let lower = text.trim().to_lowercase();
    if let Some(status) = AwardStatus::ALL
        .into_iter()
        .find(|s| s.label().eq_ignore_ascii_case(&lower))
    {
        return Some(status);
    }
    match lower.as_str() {
        "active" | "accepting entries" | "accepting submissions" | "now open" => {
            Some(AwardStatus::Open)
        }
        "ended" | "closed for entries" | "inactive" | "expired" => Some(AwardStatus::Closed),
        "coming soon" | "opening soon" | "not yet open" => Some(AwardStatus::Upcoming),
        _ => None,
    }
}

fn category_synonym(token: &str) -> Option<Category> {
    match token {
        "fiction" | "novel" | "novels" | "short stories" | "short story" => Some(Category::Fiction),
        "non-fiction" | "nonfiction" | "non fiction" | "memoir" | "biography" | "essays" => {
            Some(Category::NonFiction)
        }
        "poetry" | "poems" | "poem" | "verse" => Some(Category::Poetry),
        "children's" | "childrens" | "children" | "kids" | "young adult" | "ya"
        | "middle grade" | "picture books" | "picture book" => Some(Category::Childrens),
        "multiple" | "various" | "all genres" | "all categories" | "mixed" => {
            Some(Category::Multiple)
        }
        _ => None,
    }
}

pub fn parse_category(text: &str) -> Option<Category> {
    let lower = text.trim().to_lowercase();
    if let Some(category) = Category::ALL
        .into_iter()
        .find(|c| c.label().eq_ignore_ascii_case(&lower))
        .or_else(|| category_synonym(&lower))
    {
        return Some(category);
    }
    let found: BTreeSet<&'static str> = RE_LIST_SPLIT
        .split(&lower)
        .filter_map(category_synonym)
        .map(Category::label)
        .collect();
    match found.len() {
        0 => None,
        1 => found
            .first()
            .and_then(|label| Category::ALL.into_iter().find(|c| c.label() == *label)),
        _ => Some(Category::Multiple),
    }
}

pub fn parse_flag(text: &str) -> Option<Flag> {
    match text.trim().to_lowercase().as_str() {
        "yes" | "true" | "required" | "y" => Some(Flag::Yes),
        "no" | "false" | "not required" | "n" => Some(Flag::No),
        "unknown" => Some(Flag::Unknown),
        _ => None,
    }
}

fn canonical_format(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn parse_formats(text: &str) -> BTreeSet<String> {
    text.split([',', ';'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(canonical_format)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candidate(pairs: &[(AwardField, &str, f64)]) -> CandidateRecord {
        let mut c = CandidateRecord::new();
        for (field, value, confidence) in pairs {
            c.set(*field, *value, *confidence);
        }
        c
    }

    #[test]
    fn money_strips_symbols_and_detects_currency() {
        let m = parse_money("$2,500.00").unwrap();
        assert_eq!(m.amount, Decimal::from(2500));
        assert_eq!(m.currency, "USD");
        assert_eq!(parse_money("€ 40").unwrap().currency, "EUR");
        assert_eq!(parse_money("CAD $50").unwrap().currency, "CAD");
        assert_eq!(parse_money("free").unwrap().amount, Decimal::ZERO);
        assert!(parse_money("varies").is_none());
    }

    #[test]
    fn invalid_values_halve_confidence() {
        let record = normalize(
            &candidate(&[
                (AwardField::PrizeAmount, "a lovely trophy", 0.7),
                (AwardField::Status, "on hiatus", 0.4),
                (AwardField::IsbnRequired, "it depends", 0.7),
                (AwardField::EntryDeadline, "late spring", 0.7),
            ]),
            &NormalizeOptions::default(),
        );
        assert_eq!(record.value(AwardField::PrizeAmount), None);
        assert_eq!(record.confidence(AwardField::PrizeAmount), 0.35);
        assert_eq!(
            record.value(AwardField::Status),
            Some(&FieldValue::Status(AwardStatus::Unknown))
        );
        assert_eq!(record.confidence(AwardField::Status), 0.2);
        assert_eq!(
            record.value(AwardField::IsbnRequired),
            Some(&FieldValue::Flag(Flag::Unknown))
        );
        assert_eq!(record.value(AwardField::EntryDeadline), None);
    }

    #[test]
    fn enums_accept_synonyms() {
        assert_eq!(parse_status("Accepting Entries"), Some(AwardStatus::Open));
        assert_eq!(parse_status("ENDED"), Some(AwardStatus::Closed));
        assert_eq!(parse_status("coming soon"), Some(AwardStatus::Upcoming));
        assert_eq!(parse_category("Nonfiction"), Some(Category::NonFiction));
        assert_eq!(parse_category("Fiction, Poetry"), Some(Category::Multiple));
        assert_eq!(parse_category("novels"), Some(Category::Fiction));
        assert_eq!(parse_category("cookbooks"), None);
        assert_eq!(parse_flag("Not Required"), Some(Flag::No));
        assert_eq!(parse_flag("TRUE"), Some(Flag::Yes));
    }

    #[test]
    fn formats_become_a_canonically_cased_set() {
        let formats = parse_formats("print; DIGITAL, audio ,");
        assert_eq!(
            formats.into_iter().collect::<Vec<_>>(),
            vec!["Audio", "Digital", "Print"]
        );
    }

    #[test]
    fn vetting_note_is_overwritten_unless_overridden() {
        let c = candidate(&[(AwardField::VettingNote, "hand checked", 1.0)]);
        let record = normalize(&c, &NormalizeOptions::default());
        assert_eq!(record.text(AwardField::VettingNote), Some(VETTING_NOTE));

        let options = NormalizeOptions {
            vetting_note_override: Some("reviewed".into()),
        };
        assert_eq!(
            normalize(&c, &options).text(AwardField::VettingNote),
            Some("reviewed")
        );
    }

    #[test]
    fn quality_ignores_meta_fields_and_failed_coercions() {
        let only_meta = normalize(
            &candidate(&[
                (AwardField::DataSource, "https://a.org", 1.0),
                (AwardField::LastUpdated, "2025-01-01T00:00:00Z", 1.0),
            ]),
            &NormalizeOptions::default(),
        );
        assert_eq!(only_meta.quality(), 0.0);

        let named = normalize(
            &candidate(&[
                (AwardField::AwardName, "Riverbend Book Awards", 0.9),
                (AwardField::Website, "https://riverbend.org", 0.9),
                (AwardField::Status, "dormant", 0.9),
            ]),
            &NormalizeOptions::default(),
        );
        let total_weight: f64 = AwardField::ALL.iter().filter_map(|f| f.weight()).sum();
        let expected = (4.0 * 0.9 + 4.0 * 0.9) / total_weight;
        assert!((named.quality() - expected).abs() < 1e-12);
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let c = candidate(&[
            (AwardField::AwardName, "  Riverbend   Book Awards ", 0.9),
            (AwardField::Category, "poems", 0.4),
            (AwardField::Status, "accepting entries", 0.7),
            (AwardField::Website, "https://riverbend.org/", 0.9),
            (AwardField::EntryDeadline, "March 1st, 2025", 0.7),
            (AwardField::ApplicationFee, "$75", 0.7),
            (AwardField::PrizeAmount, "£1,000.50", 0.7),
            (AwardField::AcceptedFormats, "Print, Digital", 0.7),
            (AwardField::IsbnRequired, "maybe", 0.7),
            (AwardField::InPersonCelebration, "yes", 0.7),
            (AwardField::NumberOfCategories, "12 categories", 0.7),
            (AwardField::ContactEmail, "x@riverbend.org", 0.4),
            (AwardField::LastUpdated, "2025-02-01T12:00:00Z", 1.0),
            (AwardField::DataSource, "https://riverbend.org/enter", 1.0),
            (AwardField::Eligibility, "what", 0.0),
        ]);
        let once = normalize(&c, &NormalizeOptions::default());
        let twice = normalize(&to_candidate(&once), &NormalizeOptions::default());
        assert_eq!(once, twice);
        assert_eq!(
            once.value(AwardField::EntryDeadline),
            Some(&FieldValue::Date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()))
        );
        assert_eq!(once.value(AwardField::NumberOfCategories), Some(&FieldValue::Count(12)));
    }
}
