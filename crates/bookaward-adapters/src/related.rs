//! Discovery of guideline, FAQ, winners, about and contact pages linked from an award page.

use std::collections::BTreeMap;
use std::fmt;

use bookaward_core::{AwardField, CandidateRecord, RawPage};
use serde::Serialize;
use tracing::debug;

use crate::extract::Tier;
use crate::page::{element_text, PageView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedPage {
    Guidelines,
    Faq,
    Winners,
    About,
    Contact,
}

impl RelatedPage {
    pub const ALL: [RelatedPage; 5] = [
        RelatedPage::Guidelines,
        RelatedPage::Faq,
        RelatedPage::Winners,
        RelatedPage::About,
        RelatedPage::Contact,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            RelatedPage::Guidelines => &[
                "guidelines",
                "rules",
                "how to enter",
                "submission",
                "apply",
                "entry",
            ],
            RelatedPage::Faq => &["faq", "frequently asked", "questions"],
            RelatedPage::Winners => &["winners", "laureates", "honorees"],
            RelatedPage::About => &["about", "history", "mission"],
            RelatedPage::Contact => &["contact", "get in touch"],
        }
    }

    /// Fields this kind of page may fill in the primary candidate.
    pub fn fields(self) -> &'static [AwardField] {
        match self {
            RelatedPage::Guidelines => &[AwardField::Eligibility, AwardField::ApplicationProcedure],
            RelatedPage::Faq => &[AwardField::IsbnRequired, AwardField::AcceptedFormats],
            RelatedPage::Winners => &[AwardField::PastWinnersUrl],
            RelatedPage::About => &[AwardField::Organization],
            RelatedPage::Contact => &[
                AwardField::ContactPerson,
                AwardField::ContactEmail,
                AwardField::ContactPhone,
                AwardField::ContactAddress,
            ],
        }
    }

    /// Winners pages contribute their own URL and need no fetch.
    pub fn needs_fetch(self) -> bool {
        self != RelatedPage::Winners
    }

    pub fn label(self) -> &'static str {
        match self {
            RelatedPage::Guidelines => "guidelines",
            RelatedPage::Faq => "faq",
            RelatedPage::Winners => "winners",
            RelatedPage::About => "about",
            RelatedPage::Contact => "contact",
        }
    }
}

impl fmt::Display for RelatedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify outgoing links by text or href keywords. The first link per kind wins.
pub fn find_related_links(page: &RawPage) -> BTreeMap<RelatedPage, String> {
    let view = PageView::parse(&page.url, &page.html);
    let mut links = BTreeMap::new();
    let Ok(anchors) = view.select("a[href]") else {
        return links;
    };
    let own_url = page.url.split('#').next().unwrap_or(&page.url);

    for anchor in anchors {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        let lower_href = href.to_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || ["javascript:", "mailto:", "tel:"]
                .iter()
                .any(|scheme| lower_href.starts_with(scheme))
        {
            continue;
        }
        let Ok(resolved) = view.resolve(href) else {
            continue;
        };
        if resolved.split('#').next() == Some(own_url) {
            continue;
        }
        let text = element_text(anchor).unwrap_or_default().to_lowercase();
        let kind = RelatedPage::ALL.into_iter().find(|kind| {
            kind.keywords()
                .iter()
                .any(|k| text.contains(k) || lower_href.contains(k))
        });
        if let Some(kind) = kind {
            links.entry(kind).or_insert(resolved);
        }
    }
    debug!(url = %page.url, found = links.len(), "related links classified");
    links
}

/// Fill still-empty fields of `primary` that `kind` is authoritative for.
/// Returns the fields that were filled.
pub fn merge_related(
    primary: &mut CandidateRecord,
    kind: RelatedPage,
    related: Option<&CandidateRecord>,
    link_url: &str,
) -> Vec<AwardField> {
    let mut filled = Vec::new();
    for field in kind.fields() {
        if primary.value(*field).is_some() {
            continue;
        }
        if kind == RelatedPage::Winners {
            primary.set(*field, link_url, Tier::Labeled.confidence());
            filled.push(*field);
            continue;
        }
        let Some(source) = related else {
            continue;
        };
        let scored = source.get(*field);
        if let Some(value) = &scored.value {
            primary.set(*field, value.clone(), scored.confidence);
            filled.push(*field);
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn page(html: &str) -> RawPage {
        RawPage {
            url: "https://awards.example.org/".to_string(),
            html: html.to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn links_are_classified_by_text_and_href() {
        let links = find_related_links(&page(
            r##"<body>
              <a href="#top">Back to top</a>
              <a href="javascript:void(0)">Rules</a>
              <a href="/rules">Official Rules</a>
              <a href="/help">Frequently Asked Questions</a>
              <a href="https://awards.example.org/past-winners">2024</a>
              <a href="mailto:info@awards.example.org">Contact</a>
              <a href="/contact-us">Reach us</a>
            </body>"##,
        ));
        assert_eq!(
            links.get(&RelatedPage::Guidelines).map(String::as_str),
            Some("https://awards.example.org/rules")
        );
        assert_eq!(
            links.get(&RelatedPage::Faq).map(String::as_str),
            Some("https://awards.example.org/help")
        );
        assert_eq!(
            links.get(&RelatedPage::Winners).map(String::as_str),
            Some("https://awards.example.org/past-winners")
        );
        assert_eq!(
            links.get(&RelatedPage::Contact).map(String::as_str),
            Some("https://awards.example.org/contact-us")
        );
        assert!(!links.contains_key(&RelatedPage::About));
    }

    #[test]
    fn merge_only_fills_empty_fields_the_page_is_authoritative_for() {
        let mut primary = CandidateRecord::new();
        primary.set(AwardField::Eligibility, "Indie authors", 0.7);

        let mut guidelines = CandidateRecord::new();
        guidelines.set(AwardField::Eligibility, "Anyone", 0.9);
        guidelines.set(AwardField::ApplicationProcedure, "Mail two copies", 0.7);
        guidelines.set(AwardField::ContactEmail, "x@example.org", 0.9);

        let filled = merge_related(
            &mut primary,
            RelatedPage::Guidelines,
            Some(&guidelines),
            "https://awards.example.org/rules",
        );
        assert_eq!(filled, vec![AwardField::ApplicationProcedure]);
        assert_eq!(primary.value(AwardField::Eligibility), Some("Indie authors"));
        assert_eq!(
            primary.value(AwardField::ApplicationProcedure),
            Some("Mail two copies")
        );
        assert_eq!(primary.value(AwardField::ContactEmail), None);
    }

    #[test]
    fn winners_link_becomes_the_past_winners_url() {
        let mut primary = CandidateRecord::new();
        let filled = merge_related(
            &mut primary,
            RelatedPage::Winners,
            None,
            "https://awards.example.org/winners",
        );
        assert_eq!(filled, vec![AwardField::PastWinnersUrl]);
        assert_eq!(
            primary.value(AwardField::PastWinnersUrl),
            Some("https://awards.example.org/winners")
        );
    }
}
