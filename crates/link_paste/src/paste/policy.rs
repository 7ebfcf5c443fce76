use crate::url_scan::UrlSpan;

use super::inspect::Inspection;

/// How a paste gets merged into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStrategy {
    ReplaceSelectionWithLink { href: String },
    DeclineDefault,
    InsertSingleLink { href: String },
    StructuralMerge,
}

#[derive(Debug, Clone, Copy)]
pub struct PasteScenario<'a> {
    pub selection_empty: bool,
    pub link_on_paste: bool,
    pub inspection: &'a Inspection,
    /// Span covering the whole flattened text, when there is one.
    pub whole_text_link: Option<&'a UrlSpan>,
    pub starts_with_linked_text: bool,
}

impl MergeStrategy {
    /// Guards are checked in priority order; the first one that holds wins.
    pub fn select(scenario: &PasteScenario<'_>) -> Self {
        let whole_href = scenario
            .whole_text_link
            .map(|span| span.href.as_str())
            .filter(|href| !href.is_empty());

        // An existing link mark wins even when its href is unusable.
        let href = if scenario.inspection.has_link() {
            scenario.inspection.first_href()
        } else {
            whole_href
        };

        if !scenario.selection_empty
            && scenario.link_on_paste
            && let Some(href) = href
        {
            return MergeStrategy::ReplaceSelectionWithLink {
                href: href.to_string(),
            };
        }

        if scenario.starts_with_linked_text {
            return MergeStrategy::DeclineDefault;
        }

        if scenario.selection_empty
            && let Some(href) = whole_href
        {
            return MergeStrategy::InsertSingleLink {
                href: href.to_string(),
            };
        }

        MergeStrategy::StructuralMerge
    }

    pub fn name(&self) -> &'static str {
        match self {
            MergeStrategy::ReplaceSelectionWithLink { .. } => "replace_selection_with_link",
            MergeStrategy::DeclineDefault => "decline_default",
            MergeStrategy::InsertSingleLink { .. } => "insert_single_link",
            MergeStrategy::StructuralMerge => "structural_merge",
        }
    }
}
