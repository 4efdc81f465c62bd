//! Field extraction: HTML page to a fully keyed `CandidateRecord`.
//!
//! Every field owns an ordered list of strategies. The first strategy that
//! yields a non-empty value wins and stamps the confidence of its tier.
//! Strategy errors are logged and skipped so one bad field never costs the others.

use std::sync::LazyLock;

use bookaward_core::{AwardField, CandidateRecord, RawPage, VETTING_NOTE};
use chrono::SecondsFormat;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::page::{element_text, json_ld_is_type, json_ld_string, json_ld_text, PageView};
use crate::text::{clean_award_name, clean_text, parse_calendar_date, truncate_chars};
use crate::ExtractError;

/// Free-text fields are cut to this many characters.
pub const MAX_TEXT_CHARS: usize = 500;
pub const MAX_BENEFITS_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// JSON-LD, meta tags, canonical links, mailto/tel links, `<address>`.
    Structured,
    /// `Label: value` text and heading-led sections.
    Labeled,
    /// Keyword proximity and class-name guesses.
    Heuristic,
}

impl Tier {
    pub fn confidence(self) -> f64 {
        match self {
            Tier::Structured => 0.9,
            Tier::Labeled => 0.7,
            Tier::Heuristic => 0.4,
        }
    }
}

type Strategy = fn(&PageView) -> Result<Option<String>, ExtractError>;

struct FieldPlan {
    field: AwardField,
    max_chars: usize,
    strategies: &'static [(Tier, Strategy)],
}

/// A strategy that failed and was skipped.
#[derive(Debug)]
pub struct Degraded {
    pub field: AwardField,
    pub error: ExtractError,
}

#[derive(Debug)]
pub struct ExtractReport {
    pub candidate: CandidateRecord,
    pub degraded: Vec<Degraded>,
}

pub fn extract(page: &RawPage) -> CandidateRecord {
    extract_report(page).candidate
}

pub fn extract_report(page: &RawPage) -> ExtractReport {
    let view = PageView::parse(&page.url, &page.html);
    let mut candidate = CandidateRecord::new();
    let mut degraded = Vec::new();

    for plan in FIELD_PLANS {
        if let Some((value, confidence)) = run_plan(&view, plan, &mut degraded) {
            candidate.set(plan.field, value, confidence);
        }
    }

    if let Some(raw) = candidate.value(AwardField::EntryDeadline).map(str::to_string) {
        match parse_calendar_date(&raw) {
            Some(date) => {
                let confidence = candidate.get(AwardField::EntryDeadline).confidence;
                candidate.set(
                    AwardField::EntryDeadline,
                    date.format("%Y-%m-%d").to_string(),
                    confidence,
                );
            }
            None => {
                candidate.clear(AwardField::EntryDeadline);
                candidate.note(format!("unparseable Entry Deadline text: {raw}"));
            }
        }
    }

    candidate.set(AwardField::DataSource, page.url.clone(), 1.0);
    candidate.set(
        AwardField::LastUpdated,
        page.fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        1.0,
    );
    candidate.set(AwardField::VettingNote, VETTING_NOTE, 1.0);

    ExtractReport {
        candidate,
        degraded,
    }
}

fn run_plan(
    view: &PageView,
    plan: &FieldPlan,
    degraded: &mut Vec<Degraded>,
) -> Option<(String, f64)> {
    for (tier, strategy) in plan.strategies {
        match strategy(view) {
            Ok(Some(raw)) => {
                if let Some(value) = clean_text(&raw) {
                    return Some((truncate_chars(&value, plan.max_chars), tier.confidence()));
                }
            }
            Ok(None) => {}
            Err(error) => {
                warn!(url = %view.url, field = %plan.field, %error, "extraction strategy failed");
                degraded.push(Degraded {
                    field: plan.field,
                    error,
                });
            }
        }
    }
    None
}

const DATE_PATTERN: &str = r"(?:(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}|\d{1,2}(?:st|nd|rd|th)?\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*,?\s+\d{4}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2})";
const AMOUNT_PATTERN: &str = r"(?:[$€£]\s?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?|(?:usd|eur|gbp|cad|aud)\s?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?|(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?\s?(?:usd|eur|gbp|cad|aud)\b)";
const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
const PHONE_PATTERN: &str = r"(?:\+\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}";

static RE_DEADLINE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:submission deadline|entry deadline|deadline|entries close|entries are due|due by|closes on|postmarked by)\b\s*(?:is|:|-|–|on)?\s*({DATE_PATTERN})"
    ))
    .unwrap()
});
static RE_DATE_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b({DATE_PATTERN})")).unwrap());
static RE_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)({AMOUNT_PATTERN})")).unwrap());
static RE_PRIZE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:grand prize|cash prize|first prize|top prize|prize|honorarium|award|winners? receives?)\b[^.$€£]{{0,30}}?({AMOUNT_PATTERN})"
    ))
    .unwrap()
});
static RE_FEE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:entry|submission|application|reading|registration)\s+fees?\b[^.$€£]{{0,20}}?({AMOUNT_PATTERN})"
    ))
    .unwrap()
});
static RE_FEE_TRAILING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)({AMOUNT_PATTERN})\s+(?:per\s+(?:entry|title|book)\s+)?(?:entry|submission|application)\s+fee"
    ))
    .unwrap()
});
static RE_FEE_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bfees?\b[^.$€£]{{0,30}}?({AMOUNT_PATTERN})")).unwrap()
});
static RE_EMAIL_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\be-?mail\b(?:\s+us)?(?:\s+at)?\s*[:.]?\s*({EMAIL_PATTERN})"
    ))
    .unwrap()
});
static RE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b({EMAIL_PATTERN})\b")).unwrap());
static RE_PHONE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:phone|tel|telephone|call us at|call)\b\s*[:.]?\s*({PHONE_PATTERN})"
    ))
    .unwrap()
});
static RE_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"({PHONE_PATTERN})\b")).unwrap());
static RE_CONTACT_PERSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:contact|coordinator|director|manager|administrator)\s*:\s*([A-Z][a-z]+(?:\s+[A-Z]\.)?\s+[A-Z][a-z]+)")
        .unwrap()
});
static RE_ORGANIZER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:presented|organized|organised|sponsored|administered|hosted)\s+by|a program of|an initiative of)\s+([^.;,|()]{3,100})")
        .unwrap()
});
static RE_COPYRIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:©|\(c\)|copyright)\s*(?:copyright\s*)?\d{4}(?:\s*[-–]\s*\d{4})?\s*,?\s*([^.|©]{2,80})")
        .unwrap()
});
static RE_STATUS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:award\s+)?status\s*:\s*(open|closed|upcoming|active|ended|coming soon|accepting entries|closed for entries)\b")
        .unwrap()
});
static RE_STATUS_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:submissions?|entries|nominations)\s+(?:are\s+)?(?:now\s+)?(open|closed)\b")
        .unwrap()
});
static RE_STATUS_CLOSED_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bno longer accepting\b").unwrap());
static RE_STATUS_OPEN_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:apply now|enter now|submit now|now accepting)\b").unwrap()
});
static RE_STATUS_UPCOMING_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:coming soon|will open|opens on|upcoming)\b").unwrap()
});
static RE_CATEGORY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:award\s+)?categor(?:y|ies)\s*:\s*([^.;|]{2,100})").unwrap()
});
static RE_CAT_MULTIPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:multiple|various|many|all)\s+(?:categories|genres)\b").unwrap()
});
static RE_CAT_NONFICTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:non-?fiction|memoirs?|biograph(?:y|ies)|essays?)\b").unwrap()
});
static RE_CAT_FICTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:fiction|novels?|short stor(?:y|ies))\b").unwrap()
});
static RE_CAT_POETRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:poetry|poems?|verse)\b").unwrap());
static RE_CAT_CHILDRENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:children(?:'s)?|young adult|middle grade|picture books?)\b").unwrap()
});
static RE_FORMATS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:accepted\s+formats?|formats?\s+accepted|eligible\s+formats?|formats?)\s*:\s*([^.\n]{2,150})")
        .unwrap()
});
static RE_FORMAT_PRINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:print(?:ed)?|hardcover|hardback|paperback|softcover|physical cop(?:y|ies))\b")
        .unwrap()
});
static RE_FORMAT_DIGITAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:digital|e-?books?|electronic|pdf|epub|mobi)\b").unwrap()
});
static RE_FORMAT_AUDIO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\baudio(?:books?)?\b").unwrap());
static RE_ISBN_NO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bisbn\b[^.]{0,30}?\b(?:is\s+)?(?:not\s+(?:required|necessary|needed|mandatory)|optional)\b|\b(?:no|without(?:\s+an?)?)\s+isbn\b")
        .unwrap()
});
static RE_ISBN_YES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bisbn\b[^.]{0,30}?\b(?:is\s+)?(?:required|necessary|needed|mandatory)\b|\bmust\s+(?:have|include)\s+(?:an?\s+)?(?:valid\s+)?isbn\b")
        .unwrap()
});
static RE_CELEBRATION_VIRTUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:virtual|online)\s+(?:awards?\s+)?(?:ceremony|celebration|event|gala)\b")
        .unwrap()
});
static RE_CELEBRATION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:awards?\s+(?:ceremony|gala|dinner|banquet|luncheon)|gala|in-person\s+(?:event|celebration|ceremony))\b")
        .unwrap()
});
static RE_CELEBRATION_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ceremony|celebration|reception|in person)\b").unwrap()
});
static RE_GEO_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:open\s+(?:only\s+)?to|only\s+(?:open\s+)?(?:to|for)|exclusively\s+for|restricted\s+to|limited\s+to)\s+(?:authors|writers|publishers|residents|citizens)\s+(?:from|in|of|residing\s+in|living\s+in)\s+(?:the\s+)?([^.;,()]{2,80})")
        .unwrap()
});
static RE_GEO_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:international(?:ly)?|worldwide|from\s+(?:all|any)\s+countr(?:y|ies))\b")
        .unwrap()
});
static RE_CATEGORY_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s+(?:award\s+|book\s+|genre\s+|entry\s+)?categories\b|\bcategories\s*\((\d{1,3})\)")
        .unwrap()
});
static RE_POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{2}\s+\d{5}(?:-\d{4})?\b|\b[A-Z]\d[A-Z]\s?\d[A-Z]\d\b").unwrap()
});

const EVENT_TYPES: &[&str] = &["Event", "Award", "Competition"];
const ORG_TYPES: &[&str] = &[
    "Organization",
    "NGO",
    "Corporation",
    "EducationalOrganization",
    "LibrarySystem",
];
const BENEFIT_KEYWORDS: &[&str] = &[
    "recognition",
    "exposure",
    "promotion",
    "publicity",
    "media coverage",
    "certificate",
    "trophy",
    "medal",
    "seal",
    "sticker",
    "badge",
];
const WINNER_LINK_KEYWORDS: &[&str] = &[
    "past winners",
    "previous winners",
    "winners",
    "laureates",
    "honorees",
];

const FIELD_PLANS: &[FieldPlan] = &[
    FieldPlan {
        field: AwardField::AwardName,
        max_chars: 200,
        strategies: &[
            (Tier::Structured, name_from_json_ld),
            (Tier::Structured, name_from_og_title),
            (Tier::Labeled, name_from_title_tag),
            (Tier::Heuristic, name_from_heading),
        ],
    },
    FieldPlan {
        field: AwardField::Category,
        max_chars: 100,
        strategies: &[
            (Tier::Structured, category_from_json_ld),
            (Tier::Labeled, category_from_label),
            (Tier::Heuristic, category_from_keywords),
        ],
    },
    FieldPlan {
        field: AwardField::Status,
        max_chars: 50,
        strategies: &[
            (Tier::Labeled, status_from_label),
            (Tier::Heuristic, status_from_hints),
        ],
    },
    FieldPlan {
        field: AwardField::Website,
        max_chars: MAX_TEXT_CHARS,
        strategies: &[
            (Tier::Structured, website_from_canonical),
            (Tier::Structured, website_from_og_url),
            (Tier::Labeled, website_from_page_url),
        ],
    },
    FieldPlan {
        field: AwardField::Organization,
        max_chars: 200,
        strategies: &[
            (Tier::Structured, organization_from_json_ld),
            (Tier::Labeled, organization_from_phrase),
            (Tier::Heuristic, organization_from_copyright),
        ],
    },
    FieldPlan {
        field: AwardField::EntryDeadline,
        max_chars: 100,
        strategies: &[
            (Tier::Structured, deadline_from_time_tag),
            (Tier::Labeled, deadline_from_label),
            (Tier::Heuristic, deadline_from_any_date),
        ],
    },
    FieldPlan {
        field: AwardField::Eligibility,
        max_chars: MAX_TEXT_CHARS,
        strategies: &[
            (Tier::Labeled, eligibility_from_heading),
            (Tier::Heuristic, eligibility_from_class),
        ],
    },
    FieldPlan {
        field: AwardField::ApplicationProcedure,
        max_chars: MAX_TEXT_CHARS,
        strategies: &[
            (Tier::Labeled, procedure_from_heading),
            (Tier::Heuristic, procedure_from_class),
        ],
    },
    FieldPlan {
        field: AwardField::ApplicationFee,
        max_chars: 100,
        strategies: &[
            (Tier::Labeled, fee_from_label),
            (Tier::Heuristic, fee_from_proximity),
        ],
    },
    FieldPlan {
        field: AwardField::AcceptedFormats,
        max_chars: 200,
        strategies: &[
            (Tier::Labeled, formats_from_label),
            (Tier::Heuristic, formats_from_keywords),
        ],
    },
    FieldPlan {
        field: AwardField::IsbnRequired,
        max_chars: 20,
        strategies: &[(Tier::Labeled, isbn_from_phrase)],
    },
    FieldPlan {
        field: AwardField::PrizeAmount,
        max_chars: 100,
        strategies: &[
            (Tier::Labeled, prize_from_label),
            (Tier::Heuristic, prize_from_first_amount),
        ],
    },
    FieldPlan {
        field: AwardField::ExtraBenefits,
        max_chars: MAX_BENEFITS_CHARS,
        strategies: &[
            (Tier::Labeled, benefits_from_heading),
            (Tier::Heuristic, benefits_from_keywords),
        ],
    },
    FieldPlan {
        field: AwardField::InPersonCelebration,
        max_chars: 20,
        strategies: &[
            (Tier::Labeled, celebration_from_phrase),
            (Tier::Heuristic, celebration_from_hints),
        ],
    },
    FieldPlan {
        field: AwardField::PastWinnersUrl,
        max_chars: MAX_TEXT_CHARS,
        strategies: &[
            (Tier::Labeled, winners_from_link_text),
            (Tier::Heuristic, winners_from_href),
        ],
    },
    FieldPlan {
        field: AwardField::ContactPerson,
        max_chars: 100,
        strategies: &[(Tier::Labeled, contact_person_from_label)],
    },
    FieldPlan {
        field: AwardField::ContactEmail,
        max_chars: 200,
        strategies: &[
            (Tier::Structured, email_from_mailto),
            (Tier::Labeled, email_from_label),
            (Tier::Heuristic, email_from_text),
        ],
    },
    FieldPlan {
        field: AwardField::ContactPhone,
        max_chars: 50,
        strategies: &[
            (Tier::Structured, phone_from_tel),
            (Tier::Labeled, phone_from_label),
            (Tier::Heuristic, phone_from_text),
        ],
    },
    FieldPlan {
        field: AwardField::ContactAddress,
        max_chars: 300,
        strategies: &[
            (Tier::Structured, address_from_json_ld),
            (Tier::Structured, address_from_tag),
            (Tier::Heuristic, address_from_class),
        ],
    },
    FieldPlan {
        field: AwardField::GeographicRestrictions,
        max_chars: 200,
        strategies: &[
            (Tier::Labeled, geo_from_phrase),
            (Tier::Heuristic, geo_from_open_hint),
        ],
    },
    FieldPlan {
        field: AwardField::JudgingCriteria,
        max_chars: MAX_TEXT_CHARS,
        strategies: &[
            (Tier::Labeled, judging_from_heading),
            (Tier::Heuristic, judging_from_class),
        ],
    },
    FieldPlan {
        field: AwardField::NumberOfCategories,
        max_chars: 10,
        strategies: &[
            (Tier::Labeled, category_count_from_phrase),
            (Tier::Heuristic, category_count_from_list),
        ],
    },
];

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.iter().skip(1).flatten().next())
        .and_then(|m| clean_text(m.as_str()))
}

fn json_ld_find(
    view: &PageView,
    types: &[&str],
    key: &str,
) -> Result<Option<String>, ExtractError> {
    Ok(view
        .json_ld()?
        .iter()
        .filter(|obj| json_ld_is_type(obj, types))
        .find_map(|obj| json_ld_text(obj, key)))
}

fn name_from_json_ld(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(json_ld_find(view, EVENT_TYPES, "name")?.map(|n| clean_award_name(&n)))
}

fn name_from_og_title(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(view.meta("og:title")?.map(|n| clean_award_name(&n)))
}

fn name_from_title_tag(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(view.first_text("title")?.map(|n| clean_award_name(&n)))
}

fn name_from_heading(view: &PageView) -> Result<Option<String>, ExtractError> {
    match view.first_text("h1")? {
        Some(h1) => Ok(Some(h1)),
        None => view.first_text("h2"),
    }
}

fn category_from_json_ld(view: &PageView) -> Result<Option<String>, ExtractError> {
    json_ld_find(view, EVENT_TYPES, "genre")
}

fn category_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_CATEGORY_LABEL, view.text()))
}

/// Keyword tables per category; more than one hit means `Multiple`.
pub fn category_from_text(text: &str) -> Option<&'static str> {
    if RE_CAT_MULTIPLE.is_match(text) {
        return Some("Multiple");
    }
    let without_nonfiction = RE_CAT_NONFICTION.replace_all(text, " ");
    let hits: Vec<&'static str> = [
        (RE_CAT_FICTION.is_match(&without_nonfiction), "Fiction"),
        (RE_CAT_NONFICTION.is_match(text), "Non-fiction"),
        (RE_CAT_POETRY.is_match(text), "Poetry"),
        (RE_CAT_CHILDRENS.is_match(text), "Children's"),
    ]
    .into_iter()
    .filter_map(|(hit, label)| hit.then_some(label))
    .collect();
    match hits.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ => Some("Multiple"),
    }
}

fn category_from_keywords(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(category_from_text(view.text()).map(str::to_string))
}

fn status_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    if let Some(status) = first_capture(&RE_STATUS_LABEL, view.text()) {
        return Ok(Some(status));
    }
    if let Some(state) = first_capture(&RE_STATUS_PHRASE, view.text()) {
        let label = if state.eq_ignore_ascii_case("open") {
            "Open"
        } else {
            "Closed"
        };
        return Ok(Some(label.to_string()));
    }
    Ok(RE_STATUS_CLOSED_HINT
        .is_match(view.text())
        .then(|| "Closed".to_string()))
}

fn status_from_hints(view: &PageView) -> Result<Option<String>, ExtractError> {
    let text = view.text();
    let status = if RE_STATUS_OPEN_HINT.is_match(text) {
        Some("Open")
    } else if RE_STATUS_UPCOMING_HINT.is_match(text) {
        Some("Upcoming")
    } else {
        None
    };
    Ok(status.map(str::to_string))
}

fn website_from_canonical(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.first_attr(r#"link[rel="canonical"]"#, "href")?
        .map(|href| view.resolve(&href))
        .transpose()
}

fn website_from_og_url(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.meta("og:url")?
        .map(|href| view.resolve(&href))
        .transpose()
}

fn website_from_page_url(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(clean_text(&view.url))
}

fn organization_from_json_ld(view: &PageView) -> Result<Option<String>, ExtractError> {
    let objects = view.json_ld()?;
    let from_event = objects
        .iter()
        .filter(|obj| json_ld_is_type(obj, EVENT_TYPES))
        .find_map(|obj| {
            ["organizer", "sponsor", "funder", "publisher"]
                .iter()
                .find_map(|key| json_ld_text(obj, key))
        });
    Ok(from_event.or_else(|| {
        objects
            .iter()
            .filter(|obj| json_ld_is_type(obj, ORG_TYPES))
            .find_map(|obj| json_ld_text(obj, "name"))
    }))
}

fn organization_from_phrase(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_ORGANIZER, view.text()))
}

fn organization_from_copyright(view: &PageView) -> Result<Option<String>, ExtractError> {
    let Some(footer) = view.first_text("footer")? else {
        return Ok(None);
    };
    Ok(first_capture(&RE_COPYRIGHT, &footer).map(|org| {
        org.trim_end_matches(|c: char| c == ',' || c.is_whitespace())
            .trim_end_matches("All rights reserved")
            .trim()
            .to_string()
    }))
}

fn deadline_from_time_tag(view: &PageView) -> Result<Option<String>, ExtractError> {
    for el in view.select("time[datetime]")? {
        let context = el
            .parent()
            .and_then(scraper::ElementRef::wrap)
            .and_then(element_text)
            .unwrap_or_default()
            .to_lowercase();
        let class = el.value().attr("class").unwrap_or_default().to_lowercase();
        if context.contains("deadline") || class.contains("deadline") {
            if let Some(datetime) = el.value().attr("datetime") {
                let date = datetime.split('T').next().unwrap_or(datetime);
                return Ok(clean_text(date));
            }
        }
    }
    Ok(None)
}

fn deadline_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_DEADLINE_LABEL, view.text()))
}

fn deadline_from_any_date(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_DATE_ANY, view.text()))
}

fn eligibility_from_heading(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.section_after_heading(&[
        "eligibility",
        "who can enter",
        "who may enter",
        "requirements",
        "eligible",
    ])
}

fn eligibility_from_class(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.section_by_class(&["eligib", "guidelines", "rules"])
}

fn procedure_from_heading(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.section_after_heading(&[
        "how to enter",
        "how to apply",
        "how to submit",
        "submission",
        "procedure",
        "entry process",
        "apply",
    ])
}

fn procedure_from_class(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.section_by_class(&["how-to-enter", "howtoenter", "submission", "apply", "procedure"])
}

fn judging_from_heading(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.section_after_heading(&["judging", "criteria", "evaluation", "how entries are judged"])
}

fn judging_from_class(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.section_by_class(&["judging", "criteria", "evaluation"])
}

fn fee_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_FEE_LABEL, view.text())
        .or_else(|| first_capture(&RE_FEE_TRAILING, view.text())))
}

fn fee_from_proximity(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_FEE_ANY, view.text()))
}

fn mentions_fee(text: &str, start: usize, end: usize) -> bool {
    let before: Vec<char> = text[..start].chars().rev().take(30).collect();
    let before: String = before.into_iter().rev().collect();
    let after: String = text[end..].chars().take(20).collect();
    before.to_lowercase().contains("fee") || after.to_lowercase().contains("fee")
}

fn prize_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    let text = view.text();
    Ok(RE_PRIZE_LABEL
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find(|m| !mentions_fee(text, m.start(), m.end()))
        .and_then(|m| clean_text(m.as_str())))
}

fn prize_from_first_amount(view: &PageView) -> Result<Option<String>, ExtractError> {
    let text = view.text();
    Ok(RE_AMOUNT
        .find_iter(text)
        .find(|m| !mentions_fee(text, m.start(), m.end()))
        .and_then(|m| clean_text(m.as_str())))
}

fn formats_in(text: &str) -> Option<String> {
    let found: Vec<&str> = [
        (&*RE_FORMAT_PRINT, "Print"),
        (&*RE_FORMAT_DIGITAL, "Digital"),
        (&*RE_FORMAT_AUDIO, "Audio"),
    ]
    .into_iter()
    .filter_map(|(re, label)| re.is_match(text).then_some(label))
    .collect();
    (!found.is_empty()).then(|| found.join(", "))
}

fn formats_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_FORMATS_LABEL, view.text()).and_then(|listed| formats_in(&listed)))
}

fn formats_from_keywords(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(formats_in(view.text()))
}

fn isbn_from_phrase(view: &PageView) -> Result<Option<String>, ExtractError> {
    let text = view.text();
    let answer = if RE_ISBN_NO.is_match(text) {
        Some("no")
    } else if RE_ISBN_YES.is_match(text) {
        Some("yes")
    } else {
        None
    };
    Ok(answer.map(str::to_string))
}

fn benefits_from_heading(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.section_after_heading(&["benefits", "what winners receive", "winners receive"])
}

fn benefits_from_keywords(view: &PageView) -> Result<Option<String>, ExtractError> {
    let mut found: Vec<String> = Vec::new();
    for el in view.select("li, p")? {
        let Some(text) = element_text(el) else {
            continue;
        };
        let lower = text.to_lowercase();
        if BENEFIT_KEYWORDS.iter().any(|k| lower.contains(k)) && !found.contains(&text) {
            found.push(text);
        }
        if found.iter().map(String::len).sum::<usize>() > MAX_BENEFITS_CHARS {
            break;
        }
    }
    Ok((!found.is_empty()).then(|| found.join("; ")))
}

fn celebration_from_phrase(view: &PageView) -> Result<Option<String>, ExtractError> {
    let text = view.text();
    let answer = if RE_CELEBRATION_VIRTUAL.is_match(text) {
        Some("no")
    } else if RE_CELEBRATION_LABEL.is_match(text) {
        Some("yes")
    } else {
        None
    };
    Ok(answer.map(str::to_string))
}

fn celebration_from_hints(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(RE_CELEBRATION_HINT
        .is_match(view.text())
        .then(|| "yes".to_string()))
}

fn winners_from_link_text(view: &PageView) -> Result<Option<String>, ExtractError> {
    let links = view.select("a[href]")?;
    for keyword in WINNER_LINK_KEYWORDS {
        let hit = links.iter().find(|a| {
            element_text(**a).is_some_and(|t| t.to_lowercase().contains(keyword))
        });
        if let Some(href) = hit.and_then(|a| a.value().attr("href")) {
            return view.resolve(href).map(Some);
        }
    }
    Ok(None)
}

fn winners_from_href(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.select("a[href]")?
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.to_lowercase().contains("winner"))
        .map(|href| view.resolve(href))
        .transpose()
}

fn contact_person_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_CONTACT_PERSON, view.text()))
}

fn email_from_mailto(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(view
        .select(r#"a[href^="mailto:"]"#)?
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let address = href.trim_start_matches("mailto:");
            clean_text(address.split('?').next().unwrap_or(address))
        })
        .next())
}

fn email_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_EMAIL_LABEL, view.text()))
}

fn email_from_text(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_EMAIL, view.text()))
}

fn phone_from_tel(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(view
        .select(r#"a[href^="tel:"]"#)?
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| clean_text(href.trim_start_matches("tel:"))))
}

fn phone_from_label(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_PHONE_LABEL, view.text()))
}

fn phone_from_text(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_PHONE, view.text()))
}

fn postal_address(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => json_ld_string(s),
        JsonValue::Object(_) => {
            let parts: Vec<&str> = [
                "streetAddress",
                "addressLocality",
                "addressRegion",
                "postalCode",
                "addressCountry",
            ]
            .iter()
            .filter_map(|key| value.get(*key).and_then(JsonValue::as_str))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
            json_ld_string(&parts.join(", "))
        }
        _ => None,
    }
}

fn address_from_json_ld(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(view.json_ld()?.iter().find_map(|obj| {
        obj.get("address")
            .or_else(|| obj.get("location").and_then(|loc| loc.get("address")))
            .and_then(postal_address)
    }))
}

fn address_from_tag(view: &PageView) -> Result<Option<String>, ExtractError> {
    view.first_text("address")
}

fn address_from_class(view: &PageView) -> Result<Option<String>, ExtractError> {
    for el in view.select("div, section, p")? {
        let class = el.value().attr("class").unwrap_or_default().to_lowercase();
        if !(class.contains("address") || class.contains("location")) {
            continue;
        }
        if let Some(text) = element_text(el) {
            if RE_POSTAL_CODE.is_match(&text) {
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}

fn geo_from_phrase(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_GEO_LABEL, view.text()))
}

fn geo_from_open_hint(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(RE_GEO_OPEN
        .is_match(view.text())
        .then(|| "No geographic restrictions".to_string()))
}

fn category_count_from_phrase(view: &PageView) -> Result<Option<String>, ExtractError> {
    Ok(first_capture(&RE_CATEGORY_COUNT, view.text()))
}

fn category_count_from_list(view: &PageView) -> Result<Option<String>, ExtractError> {
    for list in view.select("ul, ol")? {
        let marker = format!(
            "{} {}",
            list.value().attr("class").unwrap_or_default(),
            list.value().attr("id").unwrap_or_default()
        )
        .to_lowercase();
        if !marker.contains("categor") {
            continue;
        }
        let items = list
            .children()
            .filter_map(scraper::ElementRef::wrap)
            .filter(|child| child.value().name() == "li")
            .count();
        if items > 0 {
            return Ok(Some(items.to_string()));
        }
    }
    Ok(None)
}
