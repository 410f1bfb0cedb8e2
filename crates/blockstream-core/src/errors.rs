use crate::step_key::StepKey;

/// Errors surfaced by the segmentation engine.
///
/// Errors local to one step key or one call never abort processing of
/// unrelated step keys in the same run; the caller decides whether to drop,
/// log, or fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),
    /// An execution coordinate is missing a required field; the delta is
    /// dropped, not retried.
    #[error("execution coordinate missing required field: {field}")]
    MissingCoordinate { field: &'static str },
    /// A lookup for a step key that was never initialized; indicates a logic
    /// error in the caller.
    #[error("no blocks issued for step key: {step_key}")]
    NoBlocksForKey { step_key: StepKey },
    /// A block index past the end of a key's issued list.
    #[error("block index {index} out of range for step key: {step_key}")]
    BlockIndexOutOfRange { step_key: StepKey, index: usize },
    /// A tool-call correlation cannot find its originating block.
    #[error("unknown tool call: {call_id}")]
    UnknownToolCall { call_id: String },
    /// Accumulated tool-call arguments failed to parse at completion time.
    #[error("tool call {call_id} arguments did not parse: {reason}")]
    ToolArgsParse { call_id: String, reason: String },
}

impl EngineError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn unknown_tool_call(call_id: impl Into<String>) -> Self {
        Self::UnknownToolCall {
            call_id: call_id.into(),
        }
    }
}
