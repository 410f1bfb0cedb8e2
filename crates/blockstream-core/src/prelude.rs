//! Common imports for typical engine usage.
//!
//! This module intentionally exports the most frequently used engine and
//! event types so examples and application code need fewer import lines.
pub use crate::{
    BlockId, BlockKind, CompletedToolCall, ContentAggregator, ContentPart, DeltaEvent,
    EngineConfig, EngineError, EngineEvent, ExecutionCoordinate, MessageId, StepKey, StreamEngine,
    ToolCallFragment,
};
