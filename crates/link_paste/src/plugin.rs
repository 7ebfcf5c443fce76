use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::LinkPasteConfig;
use crate::core::{Document, Editor, ElementNode, Mark, Marks, Node, Point, Selection, node_at_path};
use crate::fragment::Fragment;
use crate::ops::Op;
use crate::paste::{LinkPasteHandler, PasteHost};

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub handler: Arc<
        dyn Fn(&mut Editor, Option<serde_json::Value>) -> Result<(), CommandError> + Send + Sync,
    >,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<serde_json::Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler:
        Arc<dyn Fn(&Editor, Option<serde_json::Value>) -> Result<serde_json::Value, QueryError> + Send + Sync>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    InlineOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub children: ChildConstraint,
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

/// Gets a chance at every paste before the editor's default insertion.
pub trait PasteHandler: Send + Sync {
    fn id(&self) -> &'static str;
    /// `true` claims the paste; the default insertion is skipped.
    fn handle_paste(&self, editor: &mut Editor, fragment: &Fragment) -> bool;
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
    fn paste_handlers(&self) -> Vec<Arc<dyn PasteHandler>> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
    paste_handlers: Vec<Arc<dyn PasteHandler>>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>) -> Result<Self, String> {
        plugins
            .into_iter()
            .try_fold(Self::default(), |mut registry, plugin| {
                registry.register_plugin(plugin)?;
                Ok(registry)
            })
    }

    fn core_plugins() -> Vec<Box<dyn PlatePlugin>> {
        vec![Box::new(CoreBlocksPlugin), Box::new(CoreNormalizePlugin)]
    }

    pub fn core() -> Self {
        Self::new(Self::core_plugins()).expect("core registry must be valid")
    }

    pub fn with_links(config: LinkPasteConfig) -> Self {
        let mut plugins = Self::core_plugins();
        plugins.push(Box::new(LinkPlugin::new(config)));
        Self::new(plugins).expect("link registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), String> {
        for spec in plugin.node_specs() {
            insert_unique(&mut self.node_specs, spec.kind.clone(), spec, "node spec kind")?;
        }
        for cmd in plugin.commands() {
            insert_unique(&mut self.commands, cmd.id.clone(), cmd, "command id")?;
        }
        for query in plugin.queries() {
            insert_unique(&mut self.queries, query.id.clone(), query, "query id")?;
        }
        for handler in plugin.paste_handlers() {
            if self.paste_handlers.iter().any(|h| h.id() == handler.id()) {
                return Err(format!("Duplicate paste handler id: {}", handler.id()));
            }
            self.paste_handlers.push(handler);
        }
        self.normalize_passes.extend(plugin.normalize_passes());

        log::trace!("registered plugin {}", plugin.id());
        Ok(())
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn paste_handlers(&self) -> &[Arc<dyn PasteHandler>] {
        &self.paste_handlers
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();
        for pass in &self.normalize_passes {
            let found = pass.run(doc, self);
            if !found.is_empty() {
                log::trace!("{} produced {} ops", pass.id(), found.len());
            }
            ops.extend(found);
        }
        ops
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let anchor = snap_to_text(doc, &selection.anchor)
            .or_else(|| snap_to_text(doc, &selection.focus))
            .or_else(|| first_text_under(&doc.children, &mut Vec::new()))
            .unwrap_or_else(|| Point::new(vec![0], 0));
        let focus = snap_to_text(doc, &selection.focus).unwrap_or_else(|| anchor.clone());
        Selection { anchor, focus }
    }
}

fn insert_unique<T>(
    map: &mut HashMap<String, T>,
    key: String,
    value: T,
    what: &str,
) -> Result<(), String> {
    if map.contains_key(&key) {
        return Err(format!("Duplicate {what}: {key}"));
    }
    map.insert(key, value);
    Ok(())
}

fn child_path(parent: &[usize], ix: usize) -> Vec<usize> {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

fn first_text_under(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    children.iter().enumerate().find_map(|(ix, node)| {
        path.push(ix);
        let found = match node {
            Node::Text(_) => Some(Point::new(path.clone(), 0)),
            Node::Element(el) => first_text_under(&el.children, path),
            Node::Void(_) => None,
        };
        path.pop();
        found
    })
}

// Clamps each path index into range and the offset into the leaf. A path that
// stops on an element moves to the element's first text leaf.
fn snap_to_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() {
        return None;
    }
    let mut path = Vec::with_capacity(point.path.len());
    let mut children: &[Node] = &doc.children;
    for &wanted in &point.path {
        let ix = wanted.min(children.len().checked_sub(1)?);
        path.push(ix);
        match &children[ix] {
            Node::Text(t) => return Some(Point::new(path, point.offset.min(t.text.len()))),
            Node::Element(el) => children = &el.children,
            Node::Void(_) => return None,
        }
    }
    first_text_under(children, &mut path)
}

struct CoreBlocksPlugin;

impl PlatePlugin for CoreBlocksPlugin {
    fn id(&self) -> &'static str {
        "core.blocks"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        [
            ("paragraph", ChildConstraint::InlineOnly),
            ("divider", ChildConstraint::None),
        ]
        .into_iter()
        .map(|(kind, children)| NodeSpec {
            kind: kind.to_string(),
            children,
        })
        .collect()
    }
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureTextblockHasTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if !doc.children.is_empty() {
            return Vec::new();
        }
        vec![Op::InsertNode {
            path: vec![0],
            node: Node::paragraph(""),
        }]
    }
}

fn is_inline_only(el: &ElementNode, registry: &PluginRegistry) -> bool {
    match registry.node_specs.get(&el.kind) {
        Some(spec) => spec.children == ChildConstraint::InlineOnly,
        None => el.is_textblock() && !el.children.is_empty(),
    }
}

fn visit_inline_blocks(
    children: &[Node],
    path: &mut Vec<usize>,
    registry: &PluginRegistry,
    visit: &mut dyn FnMut(&ElementNode, &[usize]),
) {
    for (ix, node) in children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        path.push(ix);
        if is_inline_only(el, registry) {
            visit(el, path);
        } else {
            visit_inline_blocks(&el.children, path, registry, visit);
        }
        path.pop();
    }
}

struct EnsureTextblockHasTextLeaf;

impl NormalizePass for EnsureTextblockHasTextLeaf {
    fn id(&self) -> &'static str {
        "core.textblock_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        let mut visit = |el: &ElementNode, path: &[usize]| {
            if !el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                ops.push(Op::InsertNode {
                    path: child_path(path, 0),
                    node: Node::text(""),
                });
            }
        };
        visit_inline_blocks(&doc.children, &mut Vec::new(), registry, &mut visit);
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_text_runs"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        let mut visit = |el: &ElementNode, path: &[usize]| merge_runs(&el.children, path, &mut ops);
        visit_inline_blocks(&doc.children, &mut Vec::new(), registry, &mut visit);
        ops
    }
}

/// Empty text leaves next to a non-empty one are dropped first; once none are
/// left, each run of same-marked text leaves is folded into its first leaf.
fn merge_runs(children: &[Node], block_path: &[usize], ops: &mut Vec<Op>) {
    if children.len() < 2 {
        return;
    }

    let redundant: Vec<usize> = (0..children.len())
        .filter(|&ix| is_redundant_empty_leaf(children, ix))
        .collect();
    if !redundant.is_empty() {
        ops.extend(redundant.into_iter().rev().map(|ix| Op::RemoveNode {
            path: child_path(block_path, ix),
        }));
        return;
    }

    let mut end = children.len();
    while end > 0 {
        end -= 1;
        let Node::Text(last) = &children[end] else {
            continue;
        };
        let mut start = end;
        while let Some(Node::Text(prev)) = start.checked_sub(1).map(|ix| &children[ix])
            && prev.marks == last.marks
        {
            start -= 1;
        }
        if start == end {
            continue;
        }

        let Node::Text(head) = &children[start] else {
            continue;
        };
        let tail: String = children[start + 1..=end]
            .iter()
            .map(Node::text_content)
            .collect();
        if !tail.is_empty() {
            ops.push(Op::InsertText {
                path: child_path(block_path, start),
                offset: head.text.len(),
                text: tail,
            });
        }
        ops.extend((start + 1..=end).rev().map(|ix| Op::RemoveNode {
            path: child_path(block_path, ix),
        }));
        end = start;
    }
}

fn is_redundant_empty_leaf(children: &[Node], ix: usize) -> bool {
    let non_empty_text =
        |node: Option<&Node>| matches!(node, Some(Node::Text(t)) if !t.text.is_empty());
    matches!(&children[ix], Node::Text(t) if t.text.is_empty())
        && (non_empty_text(ix.checked_sub(1).and_then(|left| children.get(left)))
            || non_empty_text(children.get(ix + 1)))
}

struct LinkPlugin {
    config: LinkPasteConfig,
}

impl LinkPlugin {
    fn new(config: LinkPasteConfig) -> Self {
        Self { config }
    }
}

fn string_arg(args: Option<&Value>, key: &str) -> Result<String, CommandError> {
    args.and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CommandError::new(format!("Missing args.{key}")))
}

fn set_link(editor: &mut Editor, kind: &str, href: String) -> Result<(), CommandError> {
    let range = editor
        .selection_range()
        .map_err(|e| CommandError::new(e.to_string()))?;
    if range.is_empty() {
        return Err(CommandError::new("Select the text to link first"));
    }
    editor
        .mark_selection(Mark::link(kind, href))
        .map_err(|e| CommandError::new(format!("Failed to set link: {e}")))
}

fn unset_link(editor: &mut Editor, kind: &str) -> Result<(), CommandError> {
    let range = editor
        .selection_range()
        .map_err(|e| CommandError::new(e.to_string()))?;
    let mut tx = editor.positional_tx("command:link.unset");
    tx.remove_mark(range.from, range.to, kind)
        .map_err(|e| CommandError::new(format!("Failed to unset link: {e}")))?;
    if tx.ops().is_empty() {
        return Ok(());
    }
    tx.select(range);
    editor
        .apply(tx.into_transaction())
        .map_err(|e| CommandError::new(format!("Failed to unset link: {e}")))
}

fn insert_link(
    editor: &mut Editor,
    kind: &str,
    href: String,
    text: Option<String>,
) -> Result<(), CommandError> {
    let marks = Marks::default().with(Mark::link(kind, href.clone()));
    let node = Node::marked_text(text.unwrap_or(href), marks);
    editor
        .replace_selection(vec![node])
        .map_err(|e| CommandError::new(format!("Failed to insert link: {e}")))
}

fn active_href(editor: &Editor, kind: &str) -> Option<String> {
    let focus = &editor.selection().focus;
    match node_at_path(editor.doc(), &focus.path) {
        Some(Node::Text(text)) => text.marks.get(kind)?.href().map(str::to_string),
        _ => None,
    }
}

impl PlatePlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let set_kind = self.config.link_mark.clone();
        let unset_kind = self.config.link_mark.clone();
        let insert_kind = self.config.link_mark.clone();
        vec![
            CommandSpec::new("link.set", move |editor, args| {
                let href = string_arg(args.as_ref(), "href")?;
                set_link(editor, &set_kind, href)
            }),
            CommandSpec::new("link.unset", move |editor, _args| {
                unset_link(editor, &unset_kind)
            }),
            // args.text defaults to args.href
            CommandSpec::new("link.insert", move |editor, args| {
                let href = string_arg(args.as_ref(), "href")?;
                let text = string_arg(args.as_ref(), "text").ok();
                insert_link(editor, &insert_kind, href, text)
            }),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        let kind = self.config.link_mark.clone();
        vec![QuerySpec {
            id: "link.active_href".to_string(),
            handler: Arc::new(move |editor, _args| {
                Ok(active_href(editor, &kind).map_or(Value::Null, Value::String))
            }),
        }]
    }

    fn paste_handlers(&self) -> Vec<Arc<dyn PasteHandler>> {
        vec![Arc::new(LinkPasteHandler::new(self.config.clone()))]
    }
}

impl PasteHandler for LinkPasteHandler {
    fn id(&self) -> &'static str {
        "link.paste"
    }

    fn handle_paste(&self, editor: &mut Editor, fragment: &Fragment) -> bool {
        LinkPasteHandler::handle_paste(self, editor, fragment)
    }
}
