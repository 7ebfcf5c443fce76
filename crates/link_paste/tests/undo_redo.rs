use plate_link_paste::{
    Document, Editor, Fragment, LinkPasteConfig, Mark, Marks, Node, Op, PluginRegistry, Point,
    Selection, Transaction,
};
use pretty_assertions::assert_eq;

fn editor_at(text: &str, offset: usize) -> Editor {
    let doc = Document {
        children: vec![Node::paragraph(text)],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], offset));
    Editor::new(doc, selection, PluginRegistry::core())
}

fn link(href: &str) -> Marks {
    Marks::default().with(Mark::link("link", href))
}

#[test]
fn set_text_marks_reverts_through_undo_and_redo() {
    let mut editor = editor_at("docs", 2);

    editor
        .apply(Transaction::new(vec![Op::SetTextMarks {
            path: vec![0, 0],
            marks: link("https://a.com"),
        }]))
        .unwrap();
    let linked = vec![Node::paragraph_with(vec![Node::marked_text(
        "docs",
        link("https://a.com"),
    )])];
    assert_eq!(editor.doc().children, linked);

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("docs")]);
    assert!(editor.can_redo());

    assert!(editor.redo());
    assert_eq!(editor.doc().children, linked);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 2));
}

#[test]
fn splitting_a_block_by_ops_undoes_as_one_step() {
    let mut editor = editor_at("hello world", 0);

    let tx = Transaction::new(vec![
        Op::RemoveText {
            path: vec![0, 0],
            offset: 5,
            len: 6,
        },
        Op::InsertNode {
            path: vec![1],
            node: Node::paragraph(" world"),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(vec![1, 0], 0)))
    .source("test:split");
    editor.apply(tx).unwrap();
    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("hello"), Node::paragraph(" world")]
    );

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("hello world")]);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 0));
    assert!(!editor.can_undo());

    assert!(editor.redo());
    assert_eq!(editor.selection().focus, Point::new(vec![1, 0], 0));
}

#[test]
fn removing_text_pulls_the_caret_back_to_the_cut() {
    let mut editor = editor_at("hello world", 8);

    editor
        .apply(Transaction::new(vec![Op::RemoveText {
            path: vec![0, 0],
            offset: 5,
            len: 6,
        }]))
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("hello")]);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 5));
}

fn link_editor_at(text: &str, offset: usize) -> Editor {
    let doc = Document {
        children: vec![Node::paragraph(text)],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], offset));
    Editor::new(
        doc,
        selection,
        PluginRegistry::with_links(LinkPasteConfig::default()),
    )
}

#[test]
fn link_paste_is_a_single_undo_step() {
    let mut editor = link_editor_at("ab", 1);
    let doc_before = editor.doc().clone();

    editor
        .paste(&Fragment::from_plain_text("https://example.com"))
        .unwrap();
    let doc_after = editor.doc().clone();
    assert_ne!(doc_after, doc_before);

    assert!(editor.undo());
    assert_eq!(editor.doc(), &doc_before);
    assert!(!editor.can_undo());

    assert!(editor.redo());
    assert_eq!(editor.doc(), &doc_after);
}

#[test]
fn structural_merge_undoes_inserted_blocks_and_marks_together() {
    let mut editor = link_editor_at("abcd", 2);

    editor
        .paste(&Fragment::from_plain_text("one https://a.com\ntwo"))
        .unwrap();
    assert_eq!(editor.doc().children.len(), 4);

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("abcd")]);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 2));
}
