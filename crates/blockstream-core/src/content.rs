//! Assembled content parts, the shape consumers persist or render.

use crate::tool_call::CompletedToolCall;

/// One assembled piece of an agent message.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Visible text; `tool_call_ids` lists calls anchored to this part.
    Text {
        text: String,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        tool_call_ids: Vec<String>,
    },
    /// Reasoning content, kept apart from visible text.
    Think { think: String },
    /// A completed tool invocation.
    ToolCall { tool_call: CompletedToolCall },
}

impl ContentPart {
    /// Creates an empty text part.
    pub fn empty_text() -> Self {
        Self::Text {
            text: String::new(),
            tool_call_ids: Vec::new(),
        }
    }

    /// Creates an empty think part.
    pub fn empty_think() -> Self {
        Self::Think {
            think: String::new(),
        }
    }

    /// True when the part carries neither content nor call anchors.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text {
                text,
                tool_call_ids,
            } => text.is_empty() && tool_call_ids.is_empty(),
            Self::Think { think } => think.is_empty(),
            Self::ToolCall { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_detection_per_variant() {
        assert!(ContentPart::empty_text().is_empty());
        assert!(ContentPart::empty_think().is_empty());
        assert!(
            !ContentPart::Text {
                text: String::new(),
                tool_call_ids: vec!["t1".into()],
            }
            .is_empty()
        );
    }

    #[test]
    fn text_part_serializes_without_empty_anchor_list() {
        let part = ContentPart::Text {
            text: "hi".into(),
            tool_call_ids: Vec::new(),
        };
        let json = serde_json::to_string(&part).expect("serialize");
        assert_eq!(json, "{\"type\":\"text\",\"text\":\"hi\"}");
    }
}
