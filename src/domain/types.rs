use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Dead,
}

impl ToolState {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolState::Stopped => "stopped",
            ToolState::Starting => "starting",
            ToolState::Running => "running",
            ToolState::Stopping => "stopping",
            ToolState::Dead => "dead",
        }
    }

}

/// One normalized unit of retrieved context. Constructed per request from a
/// tool server's response, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    pub tool: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub source: String,
}

impl ContextItem {
    pub fn render(&self) -> String {
        format!(
            "{} result: {}. {} [source: {}]",
            self.tool, self.title, self.body, self.url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_item_in_fixed_shape() {
        let item = ContextItem {
            tool: "alpha".into(),
            title: "T".into(),
            body: "D".into(),
            url: "U".into(),
            source: "brave_search".into(),
        };
        assert_eq!(item.render(), "alpha result: T. D [source: U]");
    }

    #[test]
    fn state_labels_are_lowercase() {
        assert_eq!(ToolState::Running.as_str(), "running");
        assert_eq!(ToolState::Dead.as_str(), "dead");
    }
}
