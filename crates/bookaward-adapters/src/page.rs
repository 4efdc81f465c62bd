//! Parsed view of one fetched page that extraction strategies read from.

use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value as JsonValue;
use url::Url;

use crate::text::{clean_text, collapse_whitespace, decode_entities};
use crate::ExtractError;

const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];
const BLOCK_TAGS: &[&str] = &["p", "div", "ul", "ol", "section", "table", "dl", "dd", "article"];

pub struct PageView {
    pub url: String,
    base: Option<Url>,
    document: Html,
    text: String,
    json_ld_blocks: Vec<String>,
}

impl PageView {
    pub fn parse(url: &str, html: &str) -> Self {
        let document = Html::parse_document(html);
        let text = visible_text(&document);
        let json_ld_blocks = Selector::parse(r#"script[type="application/ld+json"]"#)
            .map(|sel| {
                document
                    .select(&sel)
                    .map(|el| el.text().collect::<String>())
                    .filter(|raw| !raw.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            url: url.to_string(),
            base: Url::parse(url).ok(),
            document,
            text,
            json_ld_blocks,
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Visible page text, whitespace-collapsed, script and style content excluded.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn select(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, ExtractError> {
        let sel = parse_selector(selector)?;
        Ok(self.document.select(&sel).collect())
    }

    pub fn first_text(&self, selector: &str) -> Result<Option<String>, ExtractError> {
        Ok(self
            .select(selector)?
            .into_iter()
            .find_map(element_text))
    }

    pub fn first_attr(&self, selector: &str, attr: &str) -> Result<Option<String>, ExtractError> {
        Ok(self
            .select(selector)?
            .into_iter()
            .filter_map(|el| el.value().attr(attr))
            .find_map(clean_text))
    }

    /// Content of `<meta property|name=key content=..>`.
    pub fn meta(&self, key: &str) -> Result<Option<String>, ExtractError> {
        let by_property = self.first_attr(&format!(r#"meta[property="{key}"]"#), "content")?;
        match by_property {
            Some(value) => Ok(Some(value)),
            None => self.first_attr(&format!(r#"meta[name="{key}"]"#), "content"),
        }
    }

    /// Resolve a possibly relative link against the page URL.
    pub fn resolve(&self, href: &str) -> Result<String, ExtractError> {
        let href = href.trim();
        let joined = match &self.base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        joined
            .map(|url| url.to_string())
            .map_err(|err| ExtractError::UrlJoin {
                href: href.to_string(),
                message: err.to_string(),
            })
    }

    /// Every JSON-LD object on the page, with arrays and `@graph` flattened.
    /// Malformed blocks are skipped; if nothing parsed at all the first error is returned.
    pub fn json_ld(&self) -> Result<Vec<JsonValue>, ExtractError> {
        let mut objects = Vec::new();
        let mut first_error = None;
        for raw in &self.json_ld_blocks {
            match serde_json::from_str::<JsonValue>(raw) {
                Ok(value) => flatten_json_ld(value, &mut objects),
                Err(err) => {
                    first_error.get_or_insert_with(|| err.to_string());
                }
            }
        }
        match first_error {
            Some(message) if objects.is_empty() => Err(ExtractError::StructuredData(message)),
            _ => Ok(objects),
        }
    }

    /// Text of the first block that follows a heading containing one of `keywords`.
    pub fn section_after_heading(&self, keywords: &[&str]) -> Result<Option<String>, ExtractError> {
        for heading in self.select("h1, h2, h3, h4, h5, dt")? {
            let Some(title) = element_text(heading) else {
                continue;
            };
            let title = title.to_lowercase();
            if !keywords.iter().any(|k| title.contains(k)) {
                continue;
            }
            if let Some(text) = next_block(heading).and_then(element_text) {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    /// Text of the first block element whose class or id mentions one of `keywords`.
    pub fn section_by_class(&self, keywords: &[&str]) -> Result<Option<String>, ExtractError> {
        for el in self.select("div, section, p, ul, ol, article")? {
            let marker = format!(
                "{} {}",
                el.value().attr("class").unwrap_or_default(),
                el.value().attr("id").unwrap_or_default()
            )
            .to_lowercase();
            if keywords.iter().any(|k| marker.contains(k)) {
                if let Some(text) = element_text(el) {
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|err| ExtractError::Selector {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

pub fn element_text(el: ElementRef<'_>) -> Option<String> {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
        });
        if !hidden && !text.trim().is_empty() {
            parts.push(text.trim().to_string());
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn next_block(heading: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = Some(*heading);
    while let Some(node) = current {
        for sibling in node.next_siblings() {
            let Some(el) = ElementRef::wrap(sibling) else {
                continue;
            };
            let name = el.value().name();
            if BLOCK_TAGS.contains(&name) {
                return Some(el);
            }
            if matches!(name, "h1" | "h2" | "h3" | "h4") {
                return None;
            }
        }
        current = node.parent().filter(|p| {
            p.value()
                .as_element()
                .is_some_and(|el| !matches!(el.name(), "body" | "html" | "main"))
        });
    }
    None
}

fn flatten_json_ld(value: JsonValue, out: &mut Vec<JsonValue>) {
    match value {
        JsonValue::Array(items) => {
            for item in items {
                flatten_json_ld(item, out);
            }
        }
        JsonValue::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_json_ld(graph, out);
            }
            if !map.is_empty() {
                out.push(JsonValue::Object(map));
            }
        }
        _ => {}
    }
}

/// True when the object's `@type` (string or list) matches one of `types`.
pub fn json_ld_is_type(object: &JsonValue, types: &[&str]) -> bool {
    match object.get("@type") {
        Some(JsonValue::String(t)) => types.iter().any(|want| t.eq_ignore_ascii_case(want)),
        Some(JsonValue::Array(list)) => list
            .iter()
            .filter_map(JsonValue::as_str)
            .any(|t| types.iter().any(|want| t.eq_ignore_ascii_case(want))),
        _ => false,
    }
}

/// JSON-LD strings are often HTML-escaped by the CMS that wrote them.
pub fn json_ld_string(raw: &str) -> Option<String> {
    clean_text(&decode_entities(raw))
}

/// A string property, or the `name` of a nested object.
pub fn json_ld_text(object: &JsonValue, key: &str) -> Option<String> {
    match object.get(key)? {
        JsonValue::String(s) => json_ld_string(s),
        JsonValue::Object(_) => object.get(key).and_then(|nested| json_ld_text(nested, "name")),
        JsonValue::Array(items) => items.iter().find_map(|item| match item {
            JsonValue::String(s) => json_ld_string(s),
            nested => json_ld_text(nested, "name"),
        }),
        _ => None,
    }
}
