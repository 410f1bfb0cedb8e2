//! Delta source contracts implemented by provider adapters.
//!
//! A source owns everything provider-specific: wire formats, reconnects,
//! timeouts. By the time items reach the pump they are normalized deltas
//! tagged with the execution coordinate that produced them.

use std::fmt;
use std::pin::Pin;

use blockstream_core::{DeltaEvent, ExecutionCoordinate, MessageId};
use futures::Stream;

use crate::errors::SourceError;

/// Stable identifier for a delta source implementation (for example
/// `openai-chat`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceId(pub String);

impl SourceId {
    /// Creates a source id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the source id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Request handed to a source when a run starts.
#[derive(Clone, Debug)]
pub struct SourceRequest {
    /// Id of the run this stream belongs to.
    pub run_id: uuid::Uuid,
    /// Source-specific parameters, opaque to the pump.
    pub params: serde_json::Value,
}

/// One normalized item from a delta source.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceItem {
    /// A content delta for one execution coordinate.
    Delta {
        coord: ExecutionCoordinate,
        delta: DeltaEvent,
    },
    /// The provider revealed its own id for a message that may already have
    /// been speculatively started.
    ProvisionalMessageId {
        coord: ExecutionCoordinate,
        message_id: MessageId,
    },
    /// Terminal signal that no further tool-call fragments will arrive; the
    /// pump completes all pending calls in announcement order.
    ToolCallsFinished,
}

/// Boxed item stream produced by a source.
pub type SourceStream = Pin<Box<dyn Stream<Item = Result<SourceItem, SourceError>> + Send>>;

/// Stream handle returned by [`DeltaSource::start_stream`].
pub struct DeltaStreamHandle {
    /// The item stream itself.
    pub stream: SourceStream,
    /// Source-reported metadata captured at connect time.
    pub metadata: SourceMeta,
}

/// Metadata a source may report when its stream is established.
#[derive(Clone, Debug, Default)]
pub struct SourceMeta {
    /// Source-assigned stream or request identifier, if any.
    pub stream_id: Option<String>,
}

/// A provider adapter that turns its wire format into normalized source
/// items.
#[async_trait::async_trait]
pub trait DeltaSource: Send + Sync {
    /// Stable identifier used for registration and lookup.
    fn id(&self) -> SourceId;

    /// Opens the item stream for one run.
    async fn start_stream(&self, request: SourceRequest)
    -> Result<DeltaStreamHandle, SourceError>;
}
