use serde::{Deserialize, Serialize};

use crate::core::Node;

/// Content of a single paste event, already parsed out of the clipboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Fragment {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// One paragraph per line. `\r\n` line endings are accepted.
    pub fn from_plain_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let nodes = text
            .split('\n')
            .map(|line| Node::paragraph(line.strip_suffix('\r').unwrap_or(line)))
            .collect();
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn size(&self) -> usize {
        self.nodes.iter().map(Node::size).sum()
    }

    pub fn text_content(&self) -> String {
        self.nodes.iter().map(Node::text_content).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
