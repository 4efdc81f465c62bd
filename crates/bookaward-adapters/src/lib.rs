//! Award page extraction, related-page discovery and web search.

use thiserror::Error;

pub mod extract;
pub mod page;
pub mod related;
pub mod search;
pub mod text;

pub use extract::{extract, extract_report, Degraded, ExtractReport, Tier};
pub use related::{find_related_links, merge_related, RelatedPage};
pub use search::{
    is_likely_book_award, DuckDuckGoSearch, SearchCriteria, SearchError, SearchHit,
    SearchProvider,
};

pub const CRATE_NAME: &str = "bookaward-adapters";

/// Failure of a single extraction strategy. Never fatal to the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
    #[error("cannot join link `{href}`: {message}")]
    UrlJoin { href: String, message: String },
    #[error("malformed structured data: {0}")]
    StructuredData(String),
}
