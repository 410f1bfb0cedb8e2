//! Common imports for typical pump usage.
//!
//! This module intentionally exports the most frequently used harness and
//! run types so examples and application code need fewer import lines.
pub use crate::{
    AbortHandle, PumpError, PumpEvent, RunBuilder, RunFailure, RunStream, SourceError, SourceId,
    SourceItem, StreamHarness, StreamHarnessBuilder,
};
pub use blockstream_core::{
    BlockId, BlockKind, ContentPart, DeltaEvent, EngineConfig, EngineEvent, ExecutionCoordinate,
    MessageId, ToolCallFragment,
};
