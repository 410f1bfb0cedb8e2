//! Streaming block segmentation over provider token deltas.
//!
//! Feeds normalized deltas (text, reasoning, tool-call fragments) through a
//! synchronous state machine and emits uniquely identified block events
//! suitable for live rendering, persistence, and replay. One [`StreamEngine`]
//! instance per run; async plumbing lives in the companion harness crate.
//!
//! # Feeding a stream
//!
//! ```
//! use blockstream_core::prelude::*;
//!
//! # fn main() -> Result<(), EngineError> {
//! let mut engine = StreamEngine::new(EngineConfig::default())?;
//! let coord = ExecutionCoordinate::new("run-1", "thread-1", "agent", 0, "main");
//!
//! let mut aggregator = ContentAggregator::new();
//! for token in ["Hello", " ", "world!"] {
//!     for event in engine.feed(&coord, &DeltaEvent::text(token))? {
//!         aggregator.apply(&event);
//!     }
//! }
//!
//! assert_eq!(aggregator.text(), "Hello world!");
//! # Ok(())
//! # }
//! ```

/// Reference consumer folding events into ordered content parts.
pub mod aggregate;
/// Engine configuration and defaults.
pub mod config;
/// Assembled content part types.
pub mod content;
/// The per-run segmentation engine.
pub mod engine;
/// Public error types.
pub mod errors;
/// Inbound delta and outbound event types.
pub mod event;
/// Code-fence and think-tag tracking.
pub mod fence;
/// Block and message identity bookkeeping.
pub mod identity;
/// Block, message, and related identifier newtypes.
pub mod model;
/// Process-wide tracing setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Forward-only block splitting.
pub mod splitter;
/// Execution coordinates and step-key resolution.
pub mod step_key;
/// Tool-call fragment aggregation.
pub mod tool_call;

pub use aggregate::ContentAggregator;
pub use config::EngineConfig;
pub use content::ContentPart;
pub use engine::StreamEngine;
pub use errors::EngineError;
pub use event::{BlockKind, DeltaEvent, EngineEvent, ToolCallFragment};
pub use model::{BlockId, MessageId};
pub use observability::init_observability;
pub use step_key::{ExecutionCoordinate, StepKey, StepKeyResolver};
pub use tool_call::CompletedToolCall;
