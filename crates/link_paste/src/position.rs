//! Flat integer positions over the document tree.
//!
//! Every node has a size: a text leaf counts its UTF-8 bytes, a void leaf counts
//! one, and an element counts its children plus two for its open and close
//! boundaries. Position 0 is the start of the document's content. Positions
//! between the children of the document (or of an element holding blocks) are
//! boundary positions; positions inside a textblock are inline positions.
//!
//! [`PositionalTx`] edits a working copy of the document by position and records
//! the path-based [`Op`]s that reproduce the edit, so a paste commits through
//! [`Editor::apply`] like any other transaction.

use crate::core::{
    Document, Editor, ElementNode, Mark, Marks, Node, Point, Selection, TextNode, apply_op_to,
    children_at_path, clamp_to_char_boundary, content_size, node_at_path,
};
use crate::fragment::Fragment;
use crate::ops::{Op, Path, Transaction};
use crate::paste::{EditError, EditTransaction, InsertSlot, PasteHost, SelectionRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Before child `index` of the container at `parent` (empty path = document).
    Boundary { parent: Path, index: usize },
    /// `offset` into the inline content of the textblock at `block`.
    Inline { block: Path, offset: usize },
}

pub fn doc_size(doc: &Document) -> usize {
    content_size(&doc.children)
}

pub fn resolve(doc: &Document, pos: usize) -> Result<Resolved, EditError> {
    let size = doc_size(doc);
    if pos > size {
        return Err(EditError::OutOfRange { pos, size });
    }

    let mut parent: Path = Vec::new();
    let mut children: &[Node] = &doc.children;
    let mut start = 0usize;

    'descend: loop {
        let mut p = start;
        for (ix, node) in children.iter().enumerate() {
            if pos == p {
                return Ok(Resolved::Boundary { parent, index: ix });
            }
            let end = p + node.size();
            if pos < end {
                let Node::Element(el) = node else {
                    return Err(EditError::UnsupportedRange {
                        from: pos,
                        to: pos,
                        reason: "position inside a leaf outside any textblock",
                    });
                };
                parent.push(ix);
                if el.is_textblock() {
                    return Ok(Resolved::Inline {
                        block: parent,
                        offset: pos - p - 1,
                    });
                }
                children = &el.children;
                start = p + 1;
                continue 'descend;
            }
            p = end;
        }
        if pos == p {
            return Ok(Resolved::Boundary {
                parent,
                index: children.len(),
            });
        }
        return Err(EditError::OutOfRange { pos, size });
    }
}

pub fn pos_of_point(doc: &Document, point: &Point) -> Option<usize> {
    let mut children: &[Node] = &doc.children;
    let mut pos = 0usize;

    for (depth, &ix) in point.path.iter().enumerate() {
        let node = children.get(ix)?;
        pos += content_size(&children[..ix]);
        let is_last = depth + 1 == point.path.len();
        match node {
            Node::Element(el) => {
                pos += 1;
                children = &el.children;
            }
            Node::Text(t) if is_last => return Some(pos + point.offset.min(t.text.len())),
            Node::Void(_) if is_last => return Some(pos),
            Node::Text(_) | Node::Void(_) => return None,
        }
    }
    None
}

/// Text point for an inline position. Boundary positions have none.
pub fn point_at(doc: &Document, pos: usize) -> Option<Point> {
    let Resolved::Inline { block, offset } = resolve(doc, pos).ok()? else {
        return None;
    };
    let children = children_at_path(doc, &block)?;

    let mut p = 0usize;
    for (ix, node) in children.iter().enumerate() {
        if let Node::Text(t) = node
            && offset <= p + t.text.len()
        {
            let mut path = block.clone();
            path.push(ix);
            return Some(Point::new(path, offset.saturating_sub(p)));
        }
        p += node.size();
    }
    None
}

pub fn selection_range(doc: &Document, selection: &Selection) -> Option<SelectionRange> {
    let anchor = pos_of_point(doc, &selection.anchor)?;
    let focus = pos_of_point(doc, &selection.focus)?;
    Some(SelectionRange::new(anchor, focus))
}

fn split_inline(children: &[Node], offset: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut p = 0usize;

    for node in children {
        let size = node.size();
        if p + size <= offset {
            left.push(node.clone());
        } else if p >= offset {
            right.push(node.clone());
        } else if let Node::Text(t) = node {
            let at = clamp_to_char_boundary(&t.text, offset - p);
            left.push(Node::marked_text(&t.text[..at], t.marks.clone()));
            right.push(Node::marked_text(&t.text[at..], t.marks.clone()));
        } else {
            right.push(node.clone());
        }
        p += size;
    }

    (left, right)
}

fn mark_inline_range(
    children: &[Node],
    start: usize,
    end: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    let mut p = 0usize;

    for node in children {
        let node_start = p;
        p += node.size();
        let node_end = p;

        let Node::Text(t) = node else {
            out.push(node.clone());
            continue;
        };
        if end <= node_start || start >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start = clamp_to_char_boundary(&t.text, start.saturating_sub(node_start));
        let sel_end = clamp_to_char_boundary(&t.text, (end - node_start).min(t.text.len()));

        let prefix = &t.text[..sel_start];
        let middle = &t.text[sel_start..sel_end];
        let suffix = &t.text[sel_end..];

        if !prefix.is_empty() {
            out.push(Node::marked_text(prefix, t.marks.clone()));
        }
        if !middle.is_empty() {
            out.push(Node::marked_text(middle, apply(t.marks.clone())));
        }
        if !suffix.is_empty() {
            out.push(Node::marked_text(suffix, t.marks.clone()));
        }
    }

    out
}

fn same_leaves(old: &[Node], new: &[Node]) -> bool {
    old.len() == new.len()
        && old.iter().zip(new).all(|(a, b)| match (a, b) {
            (Node::Text(a), Node::Text(b)) => a.text == b.text,
            _ => a == b,
        })
}

fn block_with(el: &ElementNode, mut children: Vec<Node>) -> Node {
    if children.is_empty() {
        children.push(Node::Text(TextNode {
            text: String::new(),
            marks: Marks::default(),
        }));
    }
    Node::Element(ElementNode {
        kind: el.kind.clone(),
        attrs: el.attrs.clone(),
        children,
    })
}

fn sibling_path(path: &[usize], index: usize) -> Path {
    let mut out = path.to_vec();
    if let Some(last) = out.last_mut() {
        *last = index;
    }
    out
}

/// Edits a working copy of the document by position, recording tree ops.
#[derive(Debug, Clone)]
pub struct PositionalTx {
    doc: Document,
    selection: Selection,
    ops: Vec<Op>,
    selection_after: Option<SelectionRange>,
    source: &'static str,
}

impl PositionalTx {
    pub fn new(doc: Document, selection: Selection, source: &'static str) -> Self {
        Self {
            doc,
            selection,
            ops: Vec::new(),
            selection_after: None,
            source,
        }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn select(&mut self, range: SelectionRange) {
        self.selection_after = Some(range);
    }

    pub fn into_transaction(self) -> Transaction {
        let selection_after = self.selection_after.and_then(|range| {
            Some(Selection {
                anchor: point_at(&self.doc, range.from)?,
                focus: point_at(&self.doc, range.to)?,
            })
        });
        let tx = Transaction::new(self.ops).source(self.source);
        match selection_after {
            Some(selection) => tx.selection_after(selection),
            None => tx,
        }
    }

    fn push(&mut self, op: Op) -> Result<(), EditError> {
        apply_op_to(&mut self.doc, &mut self.selection, op.clone())?;
        self.ops.push(op);
        Ok(())
    }

    fn replace_node(&mut self, path: &[usize], nodes: Vec<Node>) -> Result<(), EditError> {
        let Some(&index) = path.last() else {
            return Err(EditError::Host("cannot replace the document root".into()));
        };
        self.push(Op::RemoveNode {
            path: path.to_vec(),
        })?;
        for (i, node) in nodes.into_iter().enumerate() {
            self.push(Op::InsertNode {
                path: sibling_path(path, index + i),
                node,
            })?;
        }
        Ok(())
    }

    fn element(&self, path: &[usize]) -> Result<ElementNode, EditError> {
        match node_at_path(&self.doc, path) {
            Some(Node::Element(el)) => Ok(el.clone()),
            _ => Err(EditError::Host(format!("no element at {path:?}"))),
        }
    }

    fn textblocks_in_range(&self, from: usize, to: usize) -> Vec<(Path, usize, ElementNode)> {
        fn walk(
            children: &[Node],
            start: usize,
            range: (usize, usize),
            path: &mut Path,
            out: &mut Vec<(Path, usize, ElementNode)>,
        ) {
            let mut p = start;
            for (ix, node) in children.iter().enumerate() {
                let size = node.size();
                if let Node::Element(el) = node
                    && p < range.1
                    && p + size > range.0
                {
                    path.push(ix);
                    if el.is_textblock() {
                        out.push((path.clone(), p + 1, el.clone()));
                    } else {
                        walk(&el.children, p + 1, range, path, out);
                    }
                    path.pop();
                }
                p += size;
            }
        }

        let mut out = Vec::new();
        walk(&self.doc.children, 0, (from, to), &mut Vec::new(), &mut out);
        out
    }

    fn map_marks(
        &mut self,
        from: usize,
        to: usize,
        apply: &dyn Fn(Marks) -> Marks,
    ) -> Result<(), EditError> {
        if from >= to {
            return Ok(());
        }
        for (path, content_start, el) in self.textblocks_in_range(from, to) {
            let content_end = content_start + content_size(&el.children);
            let start = from.max(content_start) - content_start;
            let end = to.min(content_end).saturating_sub(content_start);
            if start >= end {
                continue;
            }
            let children = mark_inline_range(&el.children, start, end, apply);
            if children == el.children {
                continue;
            }
            if same_leaves(&el.children, &children) {
                for (ix, (old, new)) in el.children.iter().zip(&children).enumerate() {
                    if let (Node::Text(old), Node::Text(new)) = (old, new)
                        && old.marks != new.marks
                    {
                        let mut leaf = path.clone();
                        leaf.push(ix);
                        self.push(Op::SetTextMarks {
                            path: leaf,
                            marks: new.marks.clone(),
                        })?;
                    }
                }
            } else {
                self.replace_node(&path, vec![block_with(&el, children)])?;
            }
        }
        Ok(())
    }

    pub fn remove_mark(&mut self, from: usize, to: usize, kind: &str) -> Result<(), EditError> {
        self.map_marks(from, to, &|marks| marks.without(kind))
    }
}

impl EditTransaction for PositionalTx {
    fn delete(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        if from >= to {
            return Ok(());
        }
        let unsupported = |reason| EditError::UnsupportedRange { from, to, reason };

        match (resolve(&self.doc, from)?, resolve(&self.doc, to)?) {
            (
                Resolved::Inline {
                    block: start_block,
                    offset: start_offset,
                },
                Resolved::Inline {
                    block: end_block,
                    offset: end_offset,
                },
            ) => {
                let first = self.element(&start_block)?;
                let (mut kept, _) = split_inline(&first.children, start_offset);

                if start_block == end_block {
                    let (_, tail) = split_inline(&first.children, end_offset);
                    kept.extend(tail);
                    self.replace_node(&start_block, vec![block_with(&first, kept)])?;
                } else {
                    let (Some((&start_ix, parent)), Some((&end_ix, end_parent))) =
                        (start_block.split_last(), end_block.split_last())
                    else {
                        return Err(unsupported("selection outside any block"));
                    };
                    if parent != end_parent || end_ix <= start_ix {
                        return Err(unsupported("selection spans different containers"));
                    }
                    let last = self.element(&end_block)?;
                    let (_, tail) = split_inline(&last.children, end_offset);
                    kept.extend(tail);

                    for ix in (start_ix + 1..=end_ix).rev() {
                        self.push(Op::RemoveNode {
                            path: sibling_path(&start_block, ix),
                        })?;
                    }
                    self.replace_node(&start_block, vec![block_with(&first, kept)])?;
                }
            }
            (
                Resolved::Boundary {
                    parent,
                    index: start_ix,
                },
                Resolved::Boundary {
                    parent: end_parent,
                    index: end_ix,
                },
            ) if parent == end_parent => {
                for ix in (start_ix..end_ix).rev() {
                    let mut path = parent.clone();
                    path.push(ix);
                    self.push(Op::RemoveNode { path })?;
                }
            }
            _ => return Err(unsupported("range mixes block boundaries and text")),
        }

        self.selection_after = Some(SelectionRange::caret(from));
        Ok(())
    }

    fn insertion_slot(&self, cursor: usize, node: &Node) -> Result<InsertSlot, EditError> {
        let size = node.size();
        let slot = match (resolve(&self.doc, cursor)?, node.is_inline()) {
            // Step back over the enclosing block's opening boundary so the block
            // lands in front of it instead of splitting it.
            (Resolved::Inline { offset: 0, .. }, false) => InsertSlot {
                pos: cursor - 1,
                content_start: cursor,
                next: cursor + size,
            },
            (Resolved::Inline { .. }, false) => InsertSlot {
                pos: cursor,
                content_start: cursor + 2,
                next: cursor + 2 + size,
            },
            (Resolved::Inline { .. }, true) => InsertSlot {
                pos: cursor,
                content_start: cursor,
                next: cursor + size,
            },
            // Inline nodes get wrapped in a paragraph; the next node joins it.
            (Resolved::Boundary { .. }, true) => InsertSlot {
                pos: cursor,
                content_start: cursor + 1,
                next: cursor + 1 + size,
            },
            (Resolved::Boundary { .. }, false) => InsertSlot {
                pos: cursor,
                content_start: cursor + 1,
                next: cursor + size,
            },
        };
        Ok(slot)
    }

    fn insert(&mut self, pos: usize, node: Node) -> Result<(), EditError> {
        let size = node.size();
        let caret = match resolve(&self.doc, pos)? {
            Resolved::Boundary { parent, index } => {
                let node = if node.is_inline() {
                    Node::paragraph_with(vec![node])
                } else {
                    node
                };
                let end = pos + node.size();
                let caret = match node {
                    Node::Element(_) => end - 1,
                    _ => end,
                };
                let mut path = parent;
                path.push(index);
                self.push(Op::InsertNode { path, node })?;
                caret
            }
            Resolved::Inline { block, offset } => {
                let el = self.element(&block)?;
                let (mut left, right) = split_inline(&el.children, offset);
                if node.is_inline() {
                    left.push(node);
                    left.extend(right);
                    self.replace_node(&block, vec![block_with(&el, left)])?;
                    pos + size
                } else {
                    let caret = match node {
                        Node::Element(_) => pos + size,
                        _ => pos + size + 2,
                    };
                    self.replace_node(
                        &block,
                        vec![block_with(&el, left), node, block_with(&el, right)],
                    )?;
                    caret
                }
            }
        };
        self.selection_after = Some(SelectionRange::caret(caret));
        Ok(())
    }

    fn range_has_mark(&self, from: usize, to: usize, kind: &str) -> bool {
        if from >= to {
            return false;
        }
        self.textblocks_in_range(from, to)
            .iter()
            .any(|(_, content_start, el)| {
                let mut p = *content_start;
                el.children.iter().any(|node| {
                    let start = p;
                    p += node.size();
                    start < to && p > from && node.marks().is_some_and(|m| m.has(kind))
                })
            })
    }

    fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<(), EditError> {
        self.map_marks(from, to, &|marks| marks.with(mark.clone()))
    }

    fn doc_changed(&self) -> bool {
        !self.ops.is_empty()
    }
}

impl Editor {
    pub fn positional_tx(&self, source: &'static str) -> PositionalTx {
        PositionalTx::new(self.doc().clone(), self.selection().clone(), source)
    }

    pub fn selection_range(&self) -> Result<SelectionRange, EditError> {
        selection_range(self.doc(), self.selection()).ok_or(EditError::NoTextSelection)
    }

    fn insert_nodes_at_selection(
        &mut self,
        nodes: impl IntoIterator<Item = Node>,
        source: &'static str,
    ) -> Result<(), EditError> {
        let selection = self.selection_range()?;
        let mut tx = self.positional_tx(source);
        tx.delete(selection.from, selection.to)?;

        let mut cursor = selection.from;
        for node in nodes {
            let slot = tx.insertion_slot(cursor, &node)?;
            cursor = slot.next;
            tx.insert(slot.pos, node)?;
        }

        if tx.doc_changed() {
            self.commit(tx)?;
        }
        Ok(())
    }
}

/// The paste an editor performs when no handler claims the fragment.
pub fn insert_fragment(editor: &mut Editor, fragment: &Fragment) -> Result<(), EditError> {
    editor.insert_nodes_at_selection(fragment.nodes().iter().cloned(), "paste:default")
}

impl PasteHost for Editor {
    type Tx = PositionalTx;

    fn selection_range(&self) -> Result<SelectionRange, EditError> {
        Editor::selection_range(self)
    }

    fn begin_transaction(&self) -> PositionalTx {
        self.positional_tx("paste:link")
    }

    fn commit(&mut self, tx: PositionalTx) -> Result<(), EditError> {
        self.apply(tx.into_transaction())?;
        Ok(())
    }

    fn mark_selection(&mut self, mark: Mark) -> Result<(), EditError> {
        let selection = Editor::selection_range(self)?;
        let mut tx = self.positional_tx("paste:link_selection");
        tx.add_mark(selection.from, selection.to, mark)?;
        tx.select(selection);
        if tx.doc_changed() {
            self.commit(tx)?;
        }
        Ok(())
    }

    fn replace_selection(&mut self, nodes: Vec<Node>) -> Result<(), EditError> {
        self.insert_nodes_at_selection(nodes, "paste:replace_selection")
    }
}
