use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::fragment::Fragment;
use crate::ops::{Op, Path, Transaction};
use crate::paste::EditError;
use crate::plugin::{CommandError, PluginRegistry, QueryError};

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

pub const INLINE_VOID_KINDS: &[&str] = &["mention", "emoji"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::paragraph_with(vec![Node::text(text)])
    }

    pub fn paragraph_with(children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: "paragraph".to_string(),
            attrs: Attrs::default(),
            children,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn marked_text(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn divider() -> Self {
        Node::Void(VoidNode {
            kind: "divider".to_string(),
            attrs: Attrs::default(),
        })
    }

    pub fn size(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len(),
            Node::Void(_) => 1,
            Node::Element(el) => 2 + content_size(&el.children),
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text_content(&mut out);
        out
    }

    fn push_text_content(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&t.text),
            Node::Void(_) => {}
            Node::Element(el) => {
                for child in &el.children {
                    child.push_text_content(out);
                }
            }
        }
    }

    pub fn is_inline(&self) -> bool {
        match self {
            Node::Text(_) => true,
            Node::Void(v) => v.is_inline(),
            Node::Element(_) => false,
        }
    }

    pub fn marks(&self) -> Option<&Marks> {
        match self {
            Node::Text(t) => Some(&t.marks),
            Node::Element(_) | Node::Void(_) => None,
        }
    }

    pub fn content_pos_for_text_offset(&self, offset: usize) -> usize {
        match self {
            Node::Text(t) => offset.min(t.text.len()),
            Node::Void(_) => 0,
            Node::Element(el) => match locate_text_offset(&el.children, offset) {
                Ok(pos) | Err((pos, _)) => pos,
            },
        }
    }
}

pub fn content_size(children: &[Node]) -> usize {
    children.iter().map(Node::size).sum()
}

// Err carries the size walked and the offset still left.
fn locate_text_offset(children: &[Node], offset: usize) -> Result<usize, (usize, usize)> {
    let mut pos = 0usize;
    let mut remaining = offset;
    for node in children {
        match node {
            Node::Text(t) => {
                if remaining <= t.text.len() {
                    return Ok(pos + remaining);
                }
                remaining -= t.text.len();
                pos += t.text.len();
            }
            Node::Void(_) => pos += 1,
            Node::Element(el) => match locate_text_offset(&el.children, remaining) {
                Ok(inner) => return Ok(pos + 1 + inner),
                Err((inner_size, rest)) => {
                    remaining = rest;
                    pos += 2 + inner_size;
                }
            },
        }
    }
    Err((pos, remaining))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn is_textblock(&self) -> bool {
        !self
            .children
            .iter()
            .any(|n| matches!(n, Node::Element(_)) || matches!(n, Node::Void(v) if !v.is_inline()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    pub fn is_inline(&self) -> bool {
        INLINE_VOID_KINDS.contains(&self.kind.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub kind: String,
    #[serde(default)]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: Attrs::default(),
        }
    }

    pub fn link(kind: impl Into<String>, href: impl Into<String>) -> Self {
        Self::new(kind).attr("href", Value::String(href.into()))
    }

    pub fn attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn href(&self) -> Option<&str> {
        self.attrs.get("href").and_then(|v| v.as_str())
    }
}

// Sorted by kind, one mark per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Marks(Vec<Mark>);

impl Marks {
    pub fn new(marks: impl IntoIterator<Item = Mark>) -> Self {
        marks.into_iter().fold(Self::default(), Marks::with)
    }

    pub fn has(&self, kind: &str) -> bool {
        self.get(kind).is_some()
    }

    pub fn get(&self, kind: &str) -> Option<&Mark> {
        self.0.iter().find(|m| m.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mark> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn with(mut self, mark: Mark) -> Self {
        match self.0.binary_search_by(|m| m.kind.as_str().cmp(mark.kind.as_str())) {
            Ok(ix) => self.0[ix] = mark,
            Err(ix) => self.0.insert(ix, mark),
        }
        self
    }

    pub fn without(mut self, kind: &str) -> Self {
        self.0.retain(|m| m.kind != kind);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }
}

const MAX_UNDO: usize = 200;
const MAX_NORMALIZE_ITERATIONS: usize = 100;

#[derive(Debug, Clone)]
struct HistoryEntry {
    ops: Vec<Op>,
    before: Selection,
    after: Selection,
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        let mut editor = Self {
            doc,
            selection,
            registry,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.normalize_selection_in_place();
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop() else {
            return false;
        };
        let selection = entry.before.clone();
        let entry = self.replay(entry, selection, "undo");
        self.redo_stack.push(entry);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.redo_stack.pop() else {
            return false;
        };
        let selection = entry.after.clone();
        let entry = self.replay(entry, selection, "redo");
        self.undo_stack.push(entry);
        true
    }

    // Returns the entry that reverts the replay.
    fn replay(&mut self, entry: HistoryEntry, selection: Selection, what: &str) -> HistoryEntry {
        let HistoryEntry { ops, before, after } = entry;
        let mut reverted = Vec::with_capacity(ops.len());
        for op in ops {
            match self.apply_op(op) {
                Ok(inverse) => reverted.push(inverse),
                Err(err) => {
                    log::warn!("{what} stopped early: {err}");
                    break;
                }
            }
        }
        reverted.reverse();

        self.selection = selection;
        self.normalize_in_place();
        HistoryEntry {
            ops: reverted,
            before,
            after,
        }
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let Transaction {
            ops,
            selection_after,
            source,
        } = tx;
        log::trace!(
            "applying {} ops from {}",
            ops.len(),
            source.as_deref().unwrap_or("unknown")
        );

        let before = self.selection.clone();
        let mut inverse = ops
            .into_iter()
            .map(|op| self.apply_op(op))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(selection) = selection_after {
            self.selection = selection;
        }
        inverse.extend(self.normalize_with_inverse_ops()?);
        inverse.reverse();
        self.normalize_selection_in_place();

        self.undo_stack.push(HistoryEntry {
            ops: inverse,
            before,
            after: self.selection.clone(),
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    pub fn paste(&mut self, fragment: &Fragment) -> Result<(), EditError> {
        let handlers = self.registry.paste_handlers().to_vec();
        for handler in handlers {
            if handler.handle_paste(self, fragment) {
                log::debug!("paste handled by {}", handler.id());
                return Ok(());
            }
        }
        crate::position::insert_fragment(self, fragment)
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    fn normalize_in_place(&mut self) {
        if let Err(err) = self.normalize_with_inverse_ops() {
            log::warn!("normalization failed: {err}");
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }

    fn normalize_with_inverse_ops(&mut self) -> Result<Vec<Op>, ApplyError> {
        let mut inverse = Vec::new();
        for _ in 0..MAX_NORMALIZE_ITERATIONS {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                return Ok(inverse);
            }
            for op in ops {
                inverse.push(self.apply_op(op)?);
            }
        }
        Err(ApplyError::NormalizeDidNotConverge)
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op)
    }
}

pub(crate) fn apply_op_to(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
) -> Result<Op, ApplyError> {
    let inverse = match op {
        Op::InsertText { path, offset, text } => {
            let leaf = text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&leaf.text, offset);
            leaf.text.insert_str(offset, &text);
            selection.shift_for_inserted_text(&path, offset, text.len());
            Op::RemoveText {
                path,
                offset,
                len: text.len(),
            }
        }
        Op::RemoveText { path, offset, len } => {
            let leaf = text_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&leaf.text, offset);
            let end = clamp_to_char_boundary(&leaf.text, offset.saturating_add(len)).max(start);
            let removed: String = leaf.text.drain(start..end).collect();
            selection.shift_for_removed_text(&path, start, end);
            Op::InsertText {
                path,
                offset: start,
                text: removed,
            }
        }
        Op::InsertNode { path, node } => {
            let (children, ix) = slot_mut(doc, &path)?;
            if ix > children.len() {
                return Err(PathError(format!("cannot insert at {path:?}")).into());
            }
            children.insert(ix, node);
            selection.shift_for_inserted_node(&path);
            Op::RemoveNode { path }
        }
        Op::RemoveNode { path } => {
            let (children, ix) = slot_mut(doc, &path)?;
            if ix >= children.len() {
                return Err(PathError(format!("nothing to remove at {path:?}")).into());
            }
            let removed = children.remove(ix);
            selection.shift_for_removed_node(&path, &removed, doc);
            Op::InsertNode {
                path,
                node: removed,
            }
        }
        Op::SetTextMarks { path, marks } => {
            let leaf = text_mut(doc, &path)?;
            let marks = std::mem::replace(&mut leaf.marks, marks);
            Op::SetTextMarks { path, marks }
        }
    };
    Ok(inverse)
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

impl From<ApplyError> for EditError {
    fn from(value: ApplyError) -> Self {
        EditError::Host(value.to_string())
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct PathError(pub String);

pub(crate) fn clamp_to_char_boundary(s: &str, ix: usize) -> usize {
    (0..=ix.min(s.len()))
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0)
}

impl Selection {
    fn points_mut(&mut self) -> [&mut Point; 2] {
        [&mut self.anchor, &mut self.focus]
    }

    fn shift_for_inserted_text(&mut self, path: &[usize], offset: usize, len: usize) {
        for point in self.points_mut() {
            if point.path == path && point.offset >= offset {
                point.offset += len;
            }
        }
    }

    fn shift_for_removed_text(&mut self, path: &[usize], start: usize, end: usize) {
        for point in self.points_mut() {
            if point.path != path || point.offset <= start {
                continue;
            }
            point.offset = if point.offset >= end {
                point.offset - (end - start)
            } else {
                start
            };
        }
    }

    fn shift_for_inserted_node(&mut self, path: &[usize]) {
        let Some((&index, parent)) = path.split_last() else {
            return;
        };
        for point in self.points_mut() {
            if let Some(ix) = index_below(point, parent)
                && *ix >= index
            {
                *ix += 1;
            }
        }
    }

    // `doc` is the document after the removal. A removed text leaf whose text
    // now ends its left sibling was merged into it, so points follow the text.
    fn shift_for_removed_node(&mut self, path: &[usize], removed: &Node, doc: &Document) {
        let Some((&index, parent)) = path.split_last() else {
            return;
        };
        let merged_at = match (removed, index.checked_sub(1)) {
            (Node::Text(gone), Some(left)) => {
                let mut left_path = parent.to_vec();
                left_path.push(left);
                match node_at_path(doc, &left_path) {
                    Some(Node::Text(kept))
                        if kept.marks == gone.marks && kept.text.ends_with(&gone.text) =>
                    {
                        Some((kept.text.len() - gone.text.len(), gone.text.len()))
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        let depth = parent.len();
        for point in self.points_mut() {
            let Some(ix) = index_below(point, parent) else {
                continue;
            };
            if *ix > index {
                *ix -= 1;
                continue;
            }
            if *ix < index {
                continue;
            }
            *ix = index.saturating_sub(1);
            point.path.truncate(depth + 1);
            point.offset = match merged_at {
                Some((prefix, len)) => prefix + point.offset.min(len),
                None => 0,
            };
        }
    }
}

fn index_below<'a>(point: &'a mut Point, parent: &[usize]) -> Option<&'a mut usize> {
    if point.path.len() > parent.len() && point.path.starts_with(parent) {
        point.path.get_mut(parent.len())
    } else {
        None
    }
}

pub fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (&first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(doc.children.get(first)?, |node, &ix| match node {
            Node::Element(el) => el.children.get(ix),
            Node::Text(_) | Node::Void(_) => None,
        })
}

// The empty path is the document itself.
pub fn children_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a [Node]> {
    if path.is_empty() {
        return Some(&doc.children);
    }
    match node_at_path(doc, path)? {
        Node::Element(el) => Some(&el.children),
        Node::Text(_) | Node::Void(_) => None,
    }
}

fn children_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Vec<Node>, PathError> {
    let mut children = &mut doc.children;
    for (depth, &ix) in path.iter().enumerate() {
        children = match children.get_mut(ix) {
            Some(Node::Element(el)) => &mut el.children,
            Some(_) => return Err(PathError(format!("{path:?} has a leaf at depth {depth}"))),
            None => return Err(PathError(format!("{path:?} is out of bounds at depth {depth}"))),
        };
    }
    Ok(children)
}

fn slot_mut<'a>(
    doc: &'a mut Document,
    path: &[usize],
) -> Result<(&'a mut Vec<Node>, usize), PathError> {
    let Some((&ix, parent)) = path.split_last() else {
        return Err(PathError("empty path".into()));
    };
    Ok((children_mut(doc, parent)?, ix))
}

fn text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    let (children, ix) = slot_mut(doc, path)?;
    match children.get_mut(ix) {
        Some(Node::Text(t)) => Ok(t),
        _ => Err(PathError(format!("no text leaf at {path:?}"))),
    }
}
