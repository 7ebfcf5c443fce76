use crate::core::Mark;
use crate::fragment::Fragment;
use crate::url_scan::UrlScanner;

use super::{EditError, EditTransaction, PasteHost};

/// End state of a structural merge: a transaction worth committing, or the
/// reason it was dropped.
#[derive(Debug)]
pub enum Merged<T> {
    Commit(T),
    Discard(DiscardReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NoChange,
    // Only the selection would go; the host's own paste does that.
    DeleteOnly,
}

/// Inserts the fragment node by node at the selection, marking URLs found in
/// each node's own text.
pub fn structural_merge<H: PasteHost>(
    host: &H,
    fragment: &Fragment,
    scanner: &dyn UrlScanner,
    link_kind: &str,
) -> Result<Merged<H::Tx>, EditError> {
    let selection = host.selection_range()?;
    let mut tx = host.begin_transaction();

    let mut delete_only = false;
    if !selection.is_empty() {
        tx.delete(selection.from, selection.to)?;
        delete_only = true;
    }

    let mut cursor = selection.from;
    for node in fragment.nodes() {
        let spans = scanner.scan(&node.text_content());
        let slot = tx.insertion_slot(cursor, node)?;
        tx.insert(slot.pos, node.clone())?;

        if !spans.is_empty() {
            delete_only = false;
            for span in &spans {
                let link_start = slot.content_start + node.content_pos_for_text_offset(span.start);
                let link_end = slot.content_start + node.content_pos_for_text_offset(span.end);
                log::trace!("link {} at {link_start}..{link_end}", span.href);
                if !tx.range_has_mark(link_start, link_end, link_kind) {
                    tx.add_mark(link_start, link_end, Mark::link(link_kind, &span.href))?;
                }
            }
        }

        cursor = slot.next;
    }

    if !tx.doc_changed() {
        return Ok(Merged::Discard(DiscardReason::NoChange));
    }
    if delete_only {
        return Ok(Merged::Discard(DiscardReason::DeleteOnly));
    }
    Ok(Merged::Commit(tx))
}
