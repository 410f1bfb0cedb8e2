use crate::model::BlockId;
use crate::step_key::StepKey;

/// Classification of an emitted block.
///
/// `MessageCreation` is a marker kind: it carries no content and exists so
/// tool calls are always anchored to a concrete block id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Think,
    MessageCreation,
}

/// One positional argument fragment of an in-progress tool call.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCallFragment {
    /// Positional index the provider keys fragments by.
    pub index: usize,
    /// Call id; present on the announcing fragment.
    pub id: Option<String>,
    /// Tool name; present on the announcing fragment.
    pub name: Option<String>,
    /// Partial JSON argument text to append.
    pub args_fragment: Option<String>,
}

impl ToolCallFragment {
    /// Creates an announcing fragment carrying a call id and tool name.
    pub fn announce(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            args_fragment: None,
        }
    }

    /// Creates an argument-only fragment.
    pub fn args(index: usize, fragment: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            name: None,
            args_fragment: Some(fragment.into()),
        }
    }

    /// True when this fragment announces a new call.
    pub fn is_announcement(&self) -> bool {
        self.id.is_some() || self.name.is_some()
    }
}

/// One normalized inbound unit from a provider adapter.
///
/// At most one of `text`/`reasoning` is meaningful per event; both may be
/// absent for tool-only events. Providers also emit fully empty chunks, which
/// the engine ignores.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeltaEvent {
    /// Plain text token.
    pub text: Option<String>,
    /// Reasoning ("thinking") token.
    pub reasoning: Option<String>,
    /// Fragmentary tool-call arguments.
    pub tool_calls: Vec<ToolCallFragment>,
}

impl DeltaEvent {
    /// Creates a text-token delta.
    pub fn text(token: impl Into<String>) -> Self {
        Self {
            text: Some(token.into()),
            ..Self::default()
        }
    }

    /// Creates a reasoning-token delta.
    pub fn reasoning(token: impl Into<String>) -> Self {
        Self {
            reasoning: Some(token.into()),
            ..Self::default()
        }
    }

    /// Creates a tool-call-only delta.
    pub fn tool_calls(fragments: Vec<ToolCallFragment>) -> Self {
        Self {
            tool_calls: fragments,
            ..Self::default()
        }
    }

    /// True when the delta carries no content and no tool fragments.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty)
            && self.reasoning.as_deref().is_none_or(str::is_empty)
            && self.tool_calls.is_empty()
    }
}

/// Outbound events emitted against block ids.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A new block was opened for a step key.
    BlockStarted {
        block_id: BlockId,
        step_key: StepKey,
        kind: BlockKind,
        /// Position of this block in emission order across the whole run;
        /// monotonically increasing, never reused.
        global_index: u64,
    },
    /// Content attributed to the active block.
    ContentDelta {
        block_id: BlockId,
        kind: BlockKind,
        payload: String,
    },
    /// A tool call finished accumulating and parsed successfully.
    ToolCallCompleted {
        block_id: BlockId,
        call_id: String,
        name: String,
        args: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_delta_detection() {
        assert!(DeltaEvent::default().is_empty());
        assert!(DeltaEvent::text("").is_empty());
        assert!(!DeltaEvent::text("x").is_empty());
        assert!(!DeltaEvent::reasoning("x").is_empty());
        assert!(!DeltaEvent::tool_calls(vec![ToolCallFragment::args(0, "{")]).is_empty());
    }

    #[test]
    fn engine_event_serialization_is_tagged() {
        let event = EngineEvent::ContentDelta {
            block_id: crate::model::BlockId::mint(),
            kind: BlockKind::Text,
            payload: "hello".into(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"type\":\"content_delta\""));
        assert!(json.contains("hello"));
    }
}
