use plate_link_paste::LinkPasteConfig;
use pretty_assertions::assert_eq;

#[test]
fn empty_json_gives_the_defaults() {
    let config = LinkPasteConfig::from_json_str("{}").unwrap();

    assert_eq!(config, LinkPasteConfig::default());
    assert!(!config.link_on_paste);
    assert_eq!(config.link_mark, "link");
    assert_eq!(config.default_protocol, "http");
}

#[test]
fn partial_json_keeps_the_remaining_defaults() {
    let config =
        LinkPasteConfig::from_json_str(r#"{ "link_on_paste": true, "link_mark": "anchor" }"#)
            .unwrap();

    assert_eq!(
        config,
        LinkPasteConfig::default().link_on_paste(true).link_mark("anchor")
    );
}

#[test]
fn malformed_json_is_an_error() {
    assert!(LinkPasteConfig::from_json_str(r#"{ "link_on_paste": "yes" }"#).is_err());
}
