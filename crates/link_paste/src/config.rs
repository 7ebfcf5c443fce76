use serde::{Deserialize, Serialize};

const DEFAULT_LINK_MARK: &str = "link";
const DEFAULT_PROTOCOL: &str = "http";

fn default_link_mark() -> String {
    DEFAULT_LINK_MARK.to_string()
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPasteConfig {
    /// Turn a non-empty selection into a link when the pasted content is one.
    #[serde(default)]
    pub link_on_paste: bool,
    #[serde(default = "default_link_mark")]
    pub link_mark: String,
    /// Scheme prepended to hosts recognized without one (`example.com`).
    #[serde(default = "default_protocol")]
    pub default_protocol: String,
}

impl Default for LinkPasteConfig {
    fn default() -> Self {
        Self {
            link_on_paste: false,
            link_mark: default_link_mark(),
            default_protocol: default_protocol(),
        }
    }
}

impl LinkPasteConfig {
    pub fn link_on_paste(mut self, enabled: bool) -> Self {
        self.link_on_paste = enabled;
        self
    }

    pub fn link_mark(mut self, kind: impl Into<String>) -> Self {
        self.link_mark = kind.into();
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
