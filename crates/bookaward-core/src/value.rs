//! Canonical typed values for normalized award fields.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwardStatus {
    Open,
    Closed,
    Upcoming,
    Unknown,
}

impl AwardStatus {
    pub const ALL: [AwardStatus; 4] = [
        AwardStatus::Open,
        AwardStatus::Closed,
        AwardStatus::Upcoming,
        AwardStatus::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AwardStatus::Open => "Open",
            AwardStatus::Closed => "Closed",
            AwardStatus::Upcoming => "Upcoming",
            AwardStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Fiction,
    NonFiction,
    Poetry,
    Childrens,
    Multiple,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Fiction,
        Category::NonFiction,
        Category::Poetry,
        Category::Childrens,
        Category::Multiple,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Fiction => "Fiction",
            Category::NonFiction => "Non-fiction",
            Category::Poetry => "Poetry",
            Category::Childrens => "Children's",
            Category::Multiple => "Multiple",
        }
    }
}

/// Tri-state boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    Yes,
    No,
    Unknown,
}

impl Flag {
    pub fn label(self) -> &'static str {
        match self {
            Flag::Yes => "yes",
            Flag::No => "no",
            Flag::Unknown => "unknown",
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Flag::Yes => Some(true),
            Flag::No => Some(false),
            Flag::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency, self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Money(Money),
    Status(AwardStatus),
    Category(Category),
    Flag(Flag),
    Formats(BTreeSet<String>),
    Count(u32),
    Timestamp(DateTime<Utc>),
    Score(f64),
}

impl FieldValue {
    /// False for values that carry no information (`Unknown` status or flag).
    pub fn is_informative(&self) -> bool {
        !matches!(
            self,
            FieldValue::Status(AwardStatus::Unknown) | FieldValue::Flag(Flag::Unknown)
        )
    }

    /// Canonical text form; coercing it again yields the same value.
    pub fn canonical(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Money(m) => m.to_string(),
            FieldValue::Status(s) => s.label().to_string(),
            FieldValue::Category(c) => c.label().to_string(),
            FieldValue::Flag(f) => f.label().to_string(),
            FieldValue::Formats(set) => set.iter().cloned().collect::<Vec<_>>().join(", "),
            FieldValue::Count(n) => n.to_string(),
            FieldValue::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            FieldValue::Score(s) => s.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
