use serde::{Deserialize, Serialize};

/// The terminal artifact of one agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutcome {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_image_url: Option<String>,
}

impl AgentOutcome {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            map_url: None,
            map_image_url: None,
        }
    }
}
