//! Text cleanup and calendar-date recognition shared by the extractor and normalizer.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());
static RE_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").unwrap());
static RE_NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4}|\d{2})$").unwrap());

const NAME_SUFFIXES: &[&str] = &[
    "- official website",
    "| official website",
    "| official site",
    "- official site",
    "official page",
    "home page",
    "homepage",
    "| home",
    "- home",
    "| apply now",
    "- apply today",
];

const MONTH_NAME_FORMATS: &[&str] = &["%B %d, %Y", "%B %d %Y", "%d %B %Y", "%d %B, %Y"];

pub fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input.trim(), " ").into_owned()
}

/// Collapse, trim and drop empty strings.
pub fn clean_text(input: &str) -> Option<String> {
    let collapsed = collapse_whitespace(input);
    (!collapsed.is_empty()).then_some(collapsed)
}

pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].trim_end().to_string(),
        None => input.to_string(),
    }
}

/// Decode numeric character references and the common named entities. Unknown
/// names and invalid code points are left as written.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    RE_ENTITY
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            let hex = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X"));
            let decoded = if let Some(hex) = hex {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some('\u{a0}') => " ".to_string(),
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "eacute" => 'é',
        _ => return None,
    })
}

/// Strip site suffixes such as `| Home` and trailing separators from a page title.
pub fn clean_award_name(raw: &str) -> String {
    let mut name = collapse_whitespace(&decode_entities(raw));
    loop {
        let lower = name.to_lowercase();
        let Some(suffix) = NAME_SUFFIXES.iter().find(|s| lower.ends_with(*s)) else {
            break;
        };
        let keep = name.len() - suffix.len();
        if !name.is_char_boundary(keep) {
            break;
        }
        name.truncate(keep);
        name = name.trim_end().to_string();
    }
    name.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '|' | ':' | ',' | '.' | '–'))
        .to_string()
}

/// Recognize the calendar formats award sites use. Numeric dates are read month first.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let text = collapse_whitespace(raw);
    let text = RE_ORDINAL.replace_all(&text, "$1");
    let text = text.trim_end_matches('.').trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(caps) = RE_NUMERIC_DATE.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if caps[3].len() == 2 {
            year += 2000;
        }
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    let text = text.replace(". ", " ");
    MONTH_NAME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn recognizes_every_supported_calendar_format() {
        assert_eq!(parse_calendar_date("March 1, 2025"), ymd(2025, 3, 1));
        assert_eq!(parse_calendar_date("March 1st, 2025"), ymd(2025, 3, 1));
        assert_eq!(parse_calendar_date("Sep 30, 2025"), ymd(2025, 9, 30));
        assert_eq!(parse_calendar_date("1 March 2025"), ymd(2025, 3, 1));
        assert_eq!(parse_calendar_date("03/01/2025"), ymd(2025, 3, 1));
        assert_eq!(parse_calendar_date("03-01-2025"), ymd(2025, 3, 1));
        assert_eq!(parse_calendar_date("3/1/25"), ymd(2025, 3, 1));
        assert_eq!(parse_calendar_date("2025-03-01"), ymd(2025, 3, 1));
        assert_eq!(parse_calendar_date("sometime in spring"), None);
        assert_eq!(parse_calendar_date("02/30/2025"), None);
    }

    #[test]
    fn award_names_lose_site_suffixes_only_at_the_end() {
        assert_eq!(
            clean_award_name("Nautilus Book Awards | Home"),
            "Nautilus Book Awards"
        );
        assert_eq!(
            clean_award_name("Eric Hoffer Award - Official Website"),
            "Eric Hoffer Award"
        );
        assert_eq!(clean_award_name("Homeland Prize:"), "Homeland Prize");
        assert_eq!(clean_award_name("Books &amp; Authors Prize"), "Books & Authors Prize");
    }

    #[test]
    fn numeric_and_named_entities_decode_once() {
        assert_eq!(decode_entities("Writer&#8217;s Digest"), "Writer\u{2019}s Digest");
        assert_eq!(decode_entities("Writer&#x27;s &#X2014; Digest"), "Writer's \u{2014} Digest");
        assert_eq!(decode_entities("Tom &amp;amp; Jerry"), "Tom &amp; Jerry");
        assert_eq!(decode_entities("Poetry&nbsp;&#160;Prize"), "Poetry  Prize");
        assert_eq!(decode_entities("&bogus; &#xD800; & more"), "&bogus; &#xD800; & more");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("café au lait", 4), "café");
        assert_eq!(truncate_chars("short", 300), "short");
    }
}
