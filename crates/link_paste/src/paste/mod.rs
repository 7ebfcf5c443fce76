//! Link recognition on paste.
//!
//! A paste goes through three steps: the fragment is inspected for existing link
//! marks and its flattened text, a [`MergeStrategy`] is picked, and the strategy
//! is executed against a [`PasteHost`]. Only the structural merge builds its own
//! transaction; it is committed whole or dropped.
//!
//! The handler only talks to the document through [`PasteHost`] and
//! [`EditTransaction`], both addressed by flat integer positions.

mod inspect;
mod merge;
mod policy;

use thiserror::Error;

use crate::config::LinkPasteConfig;
use crate::core::{Mark, Marks, Node};
use crate::fragment::Fragment;
use crate::url_scan::{LinkifyScanner, UrlScanner, whole_text_link};

pub use inspect::{Inspection, inspect, starts_with_linked_text};
pub use merge::{DiscardReason, Merged, structural_merge};
pub use policy::{MergeStrategy, PasteScenario};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionRange {
    pub from: usize,
    pub to: usize,
}

impl SelectionRange {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }

    pub fn caret(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// Where a node pasted at some cursor ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertSlot {
    pub pos: usize,
    /// Position of the inserted node's first content slot once inserted.
    pub content_start: usize,
    /// Cursor for the next pasted node.
    pub next: usize,
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("position {pos} is outside the document (size {size})")]
    OutOfRange { pos: usize, size: usize },
    #[error("cannot edit {from}..{to}: {reason}")]
    UnsupportedRange {
        from: usize,
        to: usize,
        reason: &'static str,
    },
    #[error("selection is not inside a text node")]
    NoTextSelection,
    #[error("host rejected the edit: {0}")]
    Host(String),
}

/// Position-addressed edits accumulated for one paste.
pub trait EditTransaction {
    fn delete(&mut self, from: usize, to: usize) -> Result<(), EditError>;
    /// Where `node` goes when pasted at `cursor`, according to the host's
    /// node-boundary rules.
    fn insertion_slot(&self, cursor: usize, node: &Node) -> Result<InsertSlot, EditError>;
    fn insert(&mut self, pos: usize, node: Node) -> Result<(), EditError>;
    fn range_has_mark(&self, from: usize, to: usize, kind: &str) -> bool;
    fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<(), EditError>;
    fn doc_changed(&self) -> bool;
}

/// The editor side of a paste.
pub trait PasteHost {
    type Tx: EditTransaction;

    fn selection_range(&self) -> Result<SelectionRange, EditError>;
    fn begin_transaction(&self) -> Self::Tx;
    fn commit(&mut self, tx: Self::Tx) -> Result<(), EditError>;
    fn mark_selection(&mut self, mark: Mark) -> Result<(), EditError>;
    fn replace_selection(&mut self, nodes: Vec<Node>) -> Result<(), EditError>;
}

pub struct LinkPasteHandler {
    config: LinkPasteConfig,
    scanner: Box<dyn UrlScanner>,
}

impl std::fmt::Debug for LinkPasteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkPasteHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LinkPasteHandler {
    pub fn new(config: LinkPasteConfig) -> Self {
        let scanner = LinkifyScanner::new(config.default_protocol.clone());
        Self::with_scanner(config, scanner)
    }

    pub fn with_scanner(config: LinkPasteConfig, scanner: impl UrlScanner + 'static) -> Self {
        Self {
            config,
            scanner: Box::new(scanner),
        }
    }

    pub fn config(&self) -> &LinkPasteConfig {
        &self.config
    }

    pub fn strategy<H: PasteHost>(
        &self,
        host: &H,
        fragment: &Fragment,
    ) -> Result<MergeStrategy, EditError> {
        let kind = self.config.link_mark.as_str();
        let inspection = inspect(fragment, kind);
        let whole = whole_text_link(self.scanner.as_ref(), &inspection.text);
        Ok(MergeStrategy::select(&PasteScenario {
            selection_empty: host.selection_range()?.is_empty(),
            link_on_paste: self.config.link_on_paste,
            inspection: &inspection,
            whole_text_link: whole.as_ref(),
            starts_with_linked_text: starts_with_linked_text(fragment, kind),
        }))
    }

    /// Returns `true` when the paste was fully handled and the host must skip its
    /// default paste.
    pub fn handle_paste<H: PasteHost>(&self, host: &mut H, fragment: &Fragment) -> bool {
        let strategy = match self.strategy(host, fragment) {
            Ok(strategy) => strategy,
            Err(err) => {
                log::warn!("link paste left to the default handler: {err}");
                return false;
            }
        };
        log::debug!("link paste strategy: {}", strategy.name());

        let kind = self.config.link_mark.as_str();
        let result = match strategy {
            MergeStrategy::ReplaceSelectionWithLink { href } => {
                host.mark_selection(Mark::link(kind, href)).map(|()| true)
            }
            MergeStrategy::DeclineDefault => Ok(false),
            MergeStrategy::InsertSingleLink { href } => {
                let marks = Marks::default().with(Mark::link(kind, href.clone()));
                host.replace_selection(vec![Node::marked_text(href, marks)])
                    .map(|()| true)
            }
            MergeStrategy::StructuralMerge => {
                match structural_merge(&*host, fragment, self.scanner.as_ref(), kind) {
                    Ok(Merged::Commit(tx)) => host.commit(tx).map(|()| true),
                    Ok(Merged::Discard(reason)) => {
                        log::debug!("structural merge discarded: {reason:?}");
                        Ok(false)
                    }
                    Err(err) => Err(err),
                }
            }
        };

        result.unwrap_or_else(|err| {
            log::warn!("link paste left to the default handler: {err}");
            false
        })
    }
}
