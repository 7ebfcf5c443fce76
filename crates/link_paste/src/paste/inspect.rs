use crate::core::Mark;
use crate::fragment::Fragment;

/// What a fragment already carries before any merging happens.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Inspection {
    pub link_marks: Vec<Mark>,
    pub text: String,
}

impl Inspection {
    pub fn has_link(&self) -> bool {
        !self.link_marks.is_empty()
    }

    /// Href of the first existing link mark. Empty hrefs don't count.
    pub fn first_href(&self) -> Option<&str> {
        self.link_marks
            .first()
            .and_then(Mark::href)
            .filter(|href| !href.is_empty())
    }
}

pub fn inspect(fragment: &Fragment, link_kind: &str) -> Inspection {
    let mut inspection = Inspection::default();
    for node in fragment.nodes() {
        if let Some(marks) = node.marks() {
            inspection
                .link_marks
                .extend(marks.iter().filter(|m| m.kind == link_kind).cloned());
        }
        inspection.text.push_str(&node.text_content());
    }
    inspection
}

pub fn starts_with_linked_text(fragment: &Fragment, link_kind: &str) -> bool {
    fragment
        .first_child()
        .and_then(|node| node.marks())
        .is_some_and(|marks| marks.has(link_kind))
}
