use plate_link_paste::url_scan::{
    LinkifyScanner, SpanKind, UrlScanner, scan_for_urls, whole_text_link,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case::https("https://example.com", "https://example.com")]
#[case::with_path("https://example.com/a/b?c=d#e", "https://example.com/a/b?c=d#e")]
#[case::ftp("ftp://files.example.org", "ftp://files.example.org")]
#[case::bare_host("example.com", "http://example.com")]
#[case::bare_host_with_path("docs.rs/regex", "http://docs.rs/regex")]
#[case::country_code("example.de", "http://example.de")]
#[case::email("me@example.org", "mailto:me@example.org")]
#[case::mailto("mailto:me@example.org", "mailto:me@example.org")]
fn single_links_cover_the_whole_input(#[case] text: &str, #[case] href: &str) {
    let spans = scan_for_urls(text);

    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].href, href);
    assert_eq!(spans[0].value, text);
    assert_eq!((spans[0].start, spans[0].end), (0, text.len()));
    assert!(spans[0].is_link);
}

#[rstest]
#[case::empty("")]
#[case::words("no links here")]
#[case::file_name("notes.txt")]
#[case::version("v1.2")]
#[case::scheme_only("https://")]
fn text_without_links_yields_nothing(#[case] text: &str) {
    assert_eq!(scan_for_urls(text), Vec::new());
}

#[rstest]
#[case::period("Visit https://a.com.", "https://a.com")]
#[case::comma("https://a.com, then", "https://a.com")]
#[case::closing_paren("(see https://a.com/x)", "https://a.com/x")]
#[case::balanced_paren(
    "https://en.wikipedia.org/wiki/Rust_(language)",
    "https://en.wikipedia.org/wiki/Rust_(language)"
)]
#[case::quote("\"example.com\"", "example.com")]
fn trailing_punctuation_is_not_part_of_the_link(#[case] text: &str, #[case] value: &str) {
    let spans = scan_for_urls(text);

    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].value, value);
    assert_eq!(&text[spans[0].start..spans[0].end], value);
}

#[test]
fn spans_come_back_in_order_with_byte_offsets() {
    let text = "héllo https://a.com and me@b.io";

    let spans = scan_for_urls(text);

    let found: Vec<(SpanKind, usize, usize)> =
        spans.iter().map(|s| (s.kind, s.start, s.end)).collect();
    assert_eq!(
        found,
        vec![(SpanKind::Url, 7, 20), (SpanKind::Email, 25, 32)]
    );
}

#[test]
fn bare_hosts_use_the_configured_protocol() {
    let scanner = LinkifyScanner::new("https");

    let spans = scanner.scan("example.com and https://other.example.com");

    let hrefs: Vec<&str> = spans.iter().map(|s| s.href.as_str()).collect();
    assert_eq!(
        hrefs,
        vec!["https://example.com", "https://other.example.com"]
    );
}

#[rstest]
#[case::whole("https://a.com", true)]
#[case::leading_text("go https://a.com", false)]
#[case::leading_space(" https://a.com", false)]
#[case::two_links("a.com b.com", false)]
#[case::empty("", false)]
fn whole_text_link_requires_an_exact_match(#[case] text: &str, #[case] expected: bool) {
    let scanner = LinkifyScanner::default();

    assert_eq!(whole_text_link(&scanner, text).is_some(), expected);
}
