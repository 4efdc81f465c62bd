//! Web search for candidate award pages.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bookaward_storage::{FetchError, PageFetcher, RetryPolicy, Retryable};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::page::{element_text, parse_selector, PageView};
use crate::ExtractError;

pub const DUCKDUCKGO_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

const BOOK_AWARD_KEYWORDS: &[&str] = &[
    "book award",
    "literary prize",
    "book prize",
    "writing award",
    "author award",
    "publishing award",
    "book contest",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub queries: Vec<String>,
    pub max_results: usize,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            queries: [
                "book awards submission deadline",
                "literary prize application",
                "book contest entry requirements",
                "publishing awards eligibility",
                "author awards application process",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            max_results: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("parsing search results: {0}")]
    Parse(#[from] ExtractError),
    #[error("invalid search endpoint {endpoint}: {message}")]
    Endpoint { endpoint: String, message: String },
}

impl Retryable for SearchError {
    fn is_transient(&self) -> bool {
        match self {
            SearchError::Fetch(err) => err.is_transient(),
            SearchError::Parse(_) | SearchError::Endpoint { .. } => false,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// One raw results page for one query.
    async fn search_page(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, SearchError>;

    /// Run every query, keep likely book-award hits, drop duplicate URLs.
    /// A query that keeps failing is logged and skipped.
    async fn query(&self, criteria: &SearchCriteria, retry: RetryPolicy) -> Vec<SearchHit> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for query in &criteria.queries {
            let page = retry
                .run("search", || self.search_page(query, criteria.max_results))
                .await;
            let results = match page {
                Ok(results) => results,
                Err(err) => {
                    warn!(query = %query, error = %err, "search query failed");
                    continue;
                }
            };
            let before = hits.len();
            for hit in results {
                if !is_likely_book_award(&hit.title, &hit.snippet) {
                    continue;
                }
                if seen.insert(dedup_key(&hit.url)) {
                    hits.push(hit);
                }
            }
            info!(query = %query, kept = hits.len() - before, "search query finished");
        }
        hits
    }
}

pub fn is_likely_book_award(title: &str, snippet: &str) -> bool {
    let text = format!("{title} {snippet}").to_lowercase();
    BOOK_AWARD_KEYWORDS.iter().any(|k| text.contains(k))
}

fn dedup_key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// DuckDuckGo's JavaScript-free results page.
pub struct DuckDuckGoSearch {
    fetcher: Arc<dyn PageFetcher>,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            endpoint: DUCKDUCKGO_HTML_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search_page(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let url = Url::parse_with_params(&self.endpoint, &[("q", query)]).map_err(|err| {
            SearchError::Endpoint {
                endpoint: self.endpoint.clone(),
                message: err.to_string(),
            }
        })?;
        let page = self.fetcher.fetch(url.as_str()).await?;
        let mut hits = parse_duckduckgo_results(&page.html)?;
        hits.truncate(max_results);
        Ok(hits)
    }
}

/// Parse result anchors and snippets, unwrapping DuckDuckGo's `uddg` redirect links.
pub fn parse_duckduckgo_results(html: &str) -> Result<Vec<SearchHit>, ExtractError> {
    let view = PageView::parse(DUCKDUCKGO_HTML_ENDPOINT, html);
    let title_sel = parse_selector("a.result__a")?;
    let snippet_sel = parse_selector(".result__snippet")?;

    let mut hits = Vec::new();
    for result in view.select(".result")? {
        let Some(anchor) = result.select(&title_sel).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = unwrap_redirect(href) else {
            continue;
        };
        hits.push(SearchHit {
            title: element_text(anchor).unwrap_or_default(),
            url,
            snippet: result
                .select(&snippet_sel)
                .next()
                .and_then(element_text)
                .unwrap_or_default(),
        });
    }
    Ok(hits)
}

fn unwrap_redirect(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let url = base.join(href.trim()).ok()?;
    if url.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned());
    }
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookaward_core::RawPage;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RESULTS_HTML: &str = r#"<html><body>
      <div class="result results_links">
        <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.nautilusbookawards.com%2F&amp;rut=abc">Nautilus Book Awards</a></h2>
        <a class="result__snippet">A book award for better books and a better world.</a>
      </div>
      <div class="result results_links">
        <h2><a class="result__a" href="https://www.ericjhofferaward.com/">Eric Hoffer Award</a></h2>
        <a class="result__snippet">The Eric Hoffer book award honors independent books.</a>
      </div>
      <div class="result results_links">
        <h2><a class="result__a" href="https://www.example.com/recipes">Best Pancakes</a></h2>
        <a class="result__snippet">Fluffy and easy.</a>
      </div>
    </body></html>"#;

    struct CannedFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawPage {
                url: url.to_string(),
                html: RESULTS_HTML.to_string(),
                fetched_at: Utc::now(),
            })
        }
    }

    #[test]
    fn redirect_links_are_unwrapped() {
        let hits = parse_duckduckgo_results(RESULTS_HTML).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].url, "https://www.nautilusbookawards.com/");
        assert_eq!(hits[0].title, "Nautilus Book Awards");
        assert_eq!(hits[1].url, "https://www.ericjhofferaward.com/");
    }

    #[test]
    fn book_award_filter_checks_title_and_snippet() {
        assert!(is_likely_book_award("Nautilus", "a Book Award for good books"));
        assert!(is_likely_book_award("Annual Literary Prize", ""));
        assert!(!is_likely_book_award("Best Pancakes", "Fluffy and easy."));
    }

    #[tokio::test]
    async fn query_filters_and_deduplicates_across_queries() {
        let fetcher = Arc::new(CannedFetcher {
            calls: AtomicUsize::new(0),
        });
        let search = DuckDuckGoSearch::new(fetcher.clone());
        let criteria = SearchCriteria {
            queries: vec!["book awards".into(), "literary prize".into()],
            max_results: 10,
        };
        let hits = search.query(&criteria, RetryPolicy::no_retry()).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.nautilusbookawards.com/",
                "https://www.ericjhofferaward.com/"
            ]
        );
    }
}
