use plate_link_paste::{
    Document, Editor, Fragment, LinkPasteConfig, LinkPasteHandler, Mark, Marks, Node,
    PluginRegistry, Point, Selection,
};
use pretty_assertions::assert_eq;

fn link(href: &str) -> Marks {
    Marks::default().with(Mark::link("link", href))
}

fn editor(children: Vec<Node>, selection: Selection, config: LinkPasteConfig) -> Editor {
    Editor::new(
        Document { children },
        selection,
        PluginRegistry::with_links(config),
    )
}

fn caret(path: Vec<usize>, offset: usize) -> Selection {
    Selection::collapsed(Point::new(path, offset))
}

fn range(path: Vec<usize>, from: usize, to: usize) -> Selection {
    Selection {
        anchor: Point::new(path.clone(), from),
        focus: Point::new(path, to),
    }
}

#[test]
fn pasting_a_bare_url_at_the_caret_inserts_linked_text() {
    let mut editor = editor(
        vec![Node::paragraph("ab")],
        caret(vec![0, 0], 1),
        LinkPasteConfig::default(),
    );

    editor
        .paste(&Fragment::from_plain_text("https://example.com"))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![
            Node::text("a"),
            Node::marked_text("https://example.com", link("https://example.com")),
            Node::text("b"),
        ])]
    );
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1], 19));
}

#[test]
fn hosts_without_a_scheme_are_inserted_with_the_default_protocol() {
    let config = LinkPasteConfig {
        default_protocol: "https".to_string(),
        ..LinkPasteConfig::default()
    };
    let mut editor = editor(vec![Node::paragraph("")], caret(vec![0, 0], 0), config);

    editor
        .paste(&Fragment::new(vec![Node::text("example.com")]))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![Node::marked_text(
            "https://example.com",
            link("https://example.com"),
        )])]
    );
}

#[test]
fn link_on_paste_turns_the_selection_into_a_link() {
    let mut editor = editor(
        vec![Node::paragraph("hello world")],
        range(vec![0, 0], 0, 5),
        LinkPasteConfig::default().link_on_paste(true),
    );

    editor
        .paste(&Fragment::from_plain_text("https://example.com"))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![
            Node::marked_text("hello", link("https://example.com")),
            Node::text(" world"),
        ])]
    );
}

#[test]
fn link_on_paste_prefers_the_href_already_on_the_fragment() {
    let mut editor = editor(
        vec![Node::paragraph("hello world")],
        range(vec![0, 0], 6, 11),
        LinkPasteConfig::default().link_on_paste(true),
    );

    editor
        .paste(&Fragment::new(vec![Node::marked_text(
            "docs",
            link("https://docs.example.com"),
        )]))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![
            Node::text("hello "),
            Node::marked_text("world", link("https://docs.example.com")),
        ])]
    );
}

#[test]
fn urls_inside_pasted_text_are_marked_in_place() {
    let mut editor = editor(
        vec![Node::paragraph("ab")],
        caret(vec![0, 0], 1),
        LinkPasteConfig::default(),
    );

    editor
        .paste(&Fragment::new(vec![Node::text("see https://example.com now")]))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![
            Node::text("asee "),
            Node::marked_text("https://example.com", link("https://example.com")),
            Node::text(" nowb"),
        ])]
    );
}

#[test]
fn every_pasted_block_gets_its_own_links() {
    let mut editor = editor(
        vec![Node::paragraph("")],
        caret(vec![0, 0], 0),
        LinkPasteConfig::default(),
    );

    editor
        .paste(&Fragment::from_plain_text(
            "first https://a.com\nsecond mail me@b.org",
        ))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph_with(vec![
                Node::text("first "),
                Node::marked_text("https://a.com", link("https://a.com")),
            ]),
            Node::paragraph_with(vec![
                Node::text("second mail "),
                Node::marked_text("me@b.org", link("mailto:me@b.org")),
            ]),
            Node::paragraph(""),
        ]
    );
}

#[test]
fn a_block_pasted_mid_paragraph_splits_it() {
    let mut editor = editor(
        vec![Node::paragraph("abcd")],
        caret(vec![0, 0], 2),
        LinkPasteConfig::default(),
    );

    editor
        .paste(&Fragment::from_plain_text("x https://a.com"))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("ab"),
            Node::paragraph_with(vec![
                Node::text("x "),
                Node::marked_text("https://a.com", link("https://a.com")),
            ]),
            Node::paragraph("cd"),
        ]
    );
}

#[test]
fn a_void_block_pasted_mid_paragraph_leaves_the_caret_after_it() {
    let mut editor = editor(
        vec![Node::paragraph("abcd")],
        caret(vec![0, 0], 2),
        LinkPasteConfig::default(),
    );

    editor.paste(&Fragment::new(vec![Node::divider()])).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("ab"), Node::divider(), Node::paragraph("cd")]
    );
    assert_eq!(editor.selection().focus, Point::new(vec![2, 0], 0));
}

#[test]
fn existing_links_are_never_relinked() {
    let mut editor = editor(
        vec![Node::paragraph("")],
        caret(vec![0, 0], 0),
        LinkPasteConfig::default(),
    );

    editor
        .paste(&Fragment::new(vec![
            Node::text("go "),
            Node::marked_text("https://a.com", link("https://other.example")),
        ]))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![
            Node::text("go "),
            Node::marked_text("https://a.com", link("https://other.example")),
        ])]
    );
}

#[test]
fn fragments_starting_with_a_link_are_left_to_the_default_paste() {
    let mut editor = editor(
        vec![Node::paragraph("ab")],
        caret(vec![0, 0], 1),
        LinkPasteConfig::default(),
    );
    let handler = LinkPasteHandler::new(LinkPasteConfig::default());
    let fragment = Fragment::new(vec![Node::marked_text(
        "https://a.com",
        link("https://a.com"),
    )]);

    assert!(!handler.handle_paste(&mut editor, &fragment));
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);

    editor.paste(&fragment).unwrap();
    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![
            Node::text("a"),
            Node::marked_text("https://a.com", link("https://a.com")),
            Node::text("b"),
        ])]
    );
}

#[test]
fn replacing_a_selection_without_links_is_left_to_the_default_paste() {
    let mut editor = editor(
        vec![Node::paragraph("hello world")],
        range(vec![0, 0], 0, 5),
        LinkPasteConfig::default(),
    );
    let handler = LinkPasteHandler::new(LinkPasteConfig::default());
    let fragment = Fragment::new(vec![Node::text("bye")]);

    assert!(!handler.handle_paste(&mut editor, &fragment));
    assert_eq!(editor.doc().children, vec![Node::paragraph("hello world")]);
    assert!(!editor.can_undo());

    editor.paste(&fragment).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("bye world")]);
}

#[test]
fn a_paste_without_links_and_selection_still_commits() {
    let mut editor = editor(
        vec![Node::paragraph("ab")],
        caret(vec![0, 0], 1),
        LinkPasteConfig::default(),
    );
    let handler = LinkPasteHandler::new(LinkPasteConfig::default());

    assert!(handler.handle_paste(&mut editor, &Fragment::new(vec![Node::text("xy")])));
    assert_eq!(editor.doc().children, vec![Node::paragraph("axyb")]);
}

#[test]
fn an_empty_fragment_changes_nothing() {
    let mut editor = editor(
        vec![Node::paragraph("ab")],
        caret(vec![0, 0], 1),
        LinkPasteConfig::default(),
    );
    let handler = LinkPasteHandler::new(LinkPasteConfig::default());

    assert!(!handler.handle_paste(&mut editor, &Fragment::default()));
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert!(!editor.can_undo());
}

#[test]
fn pasting_twice_yields_two_separate_links() {
    let mut editor = editor(
        vec![Node::paragraph("")],
        caret(vec![0, 0], 0),
        LinkPasteConfig::default(),
    );
    let fragment = Fragment::new(vec![Node::text("https://a.com")]);

    editor.paste(&fragment).unwrap();
    editor.paste(&Fragment::new(vec![Node::text(" ")])).unwrap();
    editor.paste(&fragment).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![
            Node::marked_text("https://a.com", link("https://a.com")),
            Node::text(" "),
            Node::marked_text("https://a.com", link("https://a.com")),
        ])]
    );
}

#[test]
fn editors_without_the_link_plugin_paste_verbatim() {
    let mut editor = Editor::new(
        Document {
            children: vec![Node::paragraph("ab")],
        },
        caret(vec![0, 0], 1),
        PluginRegistry::core(),
    );

    editor
        .paste(&Fragment::new(vec![Node::text("https://a.com")]))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("ahttps://a.comb")]
    );
}

#[test]
fn custom_link_mark_kinds_are_used_for_new_links() {
    let mut editor = editor(
        vec![Node::paragraph("")],
        caret(vec![0, 0], 0),
        LinkPasteConfig::default().link_mark("anchor"),
    );

    editor
        .paste(&Fragment::from_plain_text("https://a.com"))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![Node::marked_text(
            "https://a.com",
            Marks::default().with(Mark::link("anchor", "https://a.com")),
        )])]
    );
}
