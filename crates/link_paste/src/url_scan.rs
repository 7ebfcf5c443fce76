//! Recognition of URLs and email addresses in plain text.
//!
//! Offsets in [`UrlSpan`] are byte offsets into the scanned string, matching the
//! byte-sized text positions of the document model.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Generic top-level domains accepted for hosts written without a scheme.
/// Any two-letter label is accepted as a country code.
const GENERIC_TLDS: &[&str] = &[
    "app", "art", "biz", "blog", "cloud", "com", "dev", "edu", "gov", "info", "int", "io",
    "link", "mil", "museum", "name", "net", "news", "online", "org", "page", "pro", "shop",
    "site", "store", "tech", "wiki", "xyz",
];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"'];

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let label = r"[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?";
    let pattern = format!(
        concat!(
            r#"(?P<scheme>\b(?:https?|ftp)://[^\s<>"]+)"#,
            r#"|(?P<mailto>\bmailto:[^\s<>"]+)"#,
            r#"|(?P<email>\b[A-Za-z0-9._%+\-]+@(?:{label}\.)+[A-Za-z]{{2,}})"#,
            r#"|(?P<host>\b(?:{label}\.)+[A-Za-z]{{2,}}(?::[0-9]{{1,5}})?(?:[/?#][^\s<>"]*)?)"#,
        ),
        label = label
    );
    Regex::new(&pattern).expect("url pattern must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Url,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSpan {
    pub kind: SpanKind,
    /// Matched text, exactly as it appears in the input.
    pub value: String,
    pub href: String,
    pub start: usize,
    pub end: usize,
    pub is_link: bool,
}

pub trait UrlScanner: Send + Sync {
    /// Spans in order of appearance. Must be total: any input, including the empty
    /// string, yields a (possibly empty) list.
    fn scan(&self, text: &str) -> Vec<UrlSpan>;
}

impl<F> UrlScanner for F
where
    F: Fn(&str) -> Vec<UrlSpan> + Send + Sync,
{
    fn scan(&self, text: &str) -> Vec<UrlSpan> {
        self(text)
    }
}

/// The span covering all of `text`, if the whole text is a single link.
pub fn whole_text_link(scanner: &dyn UrlScanner, text: &str) -> Option<UrlSpan> {
    if text.is_empty() {
        return None;
    }
    scanner
        .scan(text)
        .into_iter()
        .find(|span| span.is_link && span.value == text)
}

pub fn scan_for_urls(text: &str) -> Vec<UrlSpan> {
    LinkifyScanner::default().scan(text)
}

#[derive(Debug, Clone)]
pub struct LinkifyScanner {
    default_protocol: String,
}

impl Default for LinkifyScanner {
    fn default() -> Self {
        Self::new("http")
    }
}

impl LinkifyScanner {
    pub fn new(default_protocol: impl Into<String>) -> Self {
        Self {
            default_protocol: default_protocol.into(),
        }
    }

    fn span_from(&self, text: &str, caps: &Captures<'_>) -> Option<UrlSpan> {
        let whole = caps.get(0)?;
        let start = whole.start();
        let end = start + trimmed_len(whole.as_str());
        if end <= start {
            return None;
        }
        let value = text[start..end].to_string();

        let (kind, href) = if caps.name("scheme").is_some() || caps.name("mailto").is_some() {
            if !has_host_after_scheme(&value) {
                return None;
            }
            (SpanKind::Url, value.clone())
        } else if caps.name("email").is_some() {
            let domain = value.rsplit('@').next()?;
            if !is_known_tld(domain) {
                return None;
            }
            (SpanKind::Email, format!("mailto:{value}"))
        } else {
            let host_end = value.find([':', '/', '?', '#']).unwrap_or(value.len());
            if !is_known_tld(&value[..host_end]) {
                return None;
            }
            (SpanKind::Url, format!("{}://{value}", self.default_protocol))
        };

        Some(UrlSpan {
            kind,
            value,
            href,
            start,
            end,
            is_link: true,
        })
    }
}

impl UrlScanner for LinkifyScanner {
    fn scan(&self, text: &str) -> Vec<UrlSpan> {
        let spans: Vec<UrlSpan> = URL_PATTERN
            .captures_iter(text)
            .filter_map(|caps| self.span_from(text, &caps))
            .collect();
        log::trace!("scanned {} bytes, found {} links", text.len(), spans.len());
        spans
    }
}

fn is_known_tld(host: &str) -> bool {
    let Some(tld) = host.rsplit('.').next() else {
        return false;
    };
    if !tld.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return false;
    }
    let tld = tld.to_ascii_lowercase();
    tld.len() == 2 || GENERIC_TLDS.contains(&tld.as_str())
}

fn has_host_after_scheme(value: &str) -> bool {
    let rest = value
        .split_once("://")
        .map(|(_, rest)| rest)
        .or_else(|| value.strip_prefix("mailto:"))
        .unwrap_or("");
    rest.chars().next().is_some_and(|ch| ch.is_alphanumeric())
}

/// Length of `candidate` once trailing punctuation and unbalanced closing brackets
/// are dropped.
fn trimmed_len(candidate: &str) -> usize {
    let mut s = candidate;
    loop {
        let Some(last) = s.chars().last() else {
            return 0;
        };
        let unbalanced = match last {
            ')' => s.matches('(').count() < s.matches(')').count(),
            ']' => s.matches('[').count() < s.matches(']').count(),
            '}' => s.matches('{').count() < s.matches('}').count(),
            ch => TRAILING_PUNCTUATION.contains(&ch),
        };
        if !unbalanced {
            return s.len();
        }
        s = &s[..s.len() - last.len_utf8()];
    }
}
