//! The per-run segmentation engine.
//!
//! One [`StreamEngine`] instance owns all mutable state for one run and is
//! discarded at run end. Feeding is synchronous: one delta in, zero or more
//! events out, with no awaiting in between, so two deltas for the same step
//! key can never interleave.

use std::collections::HashMap;

use tracing::debug;

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::event::{BlockKind, DeltaEvent, EngineEvent};
use crate::fence::FenceTracker;
use crate::identity::{IssuedBlock, MessageIdentityCache, StepIdentityRegistry};
use crate::model::{BlockId, MessageId};
use crate::splitter::BlockSplitter;
use crate::step_key::{ExecutionCoordinate, StepKey, StepKeyResolver};
use crate::tool_call::ToolCallAggregator;

/// Streaming state machine that turns provider deltas into identified block
/// events.
#[derive(Debug)]
pub struct StreamEngine {
    config: EngineConfig,
    resolver: StepKeyResolver,
    fences: HashMap<StepKey, FenceTracker>,
    splitter: BlockSplitter,
    registry: StepIdentityRegistry,
    messages: MessageIdentityCache,
    tool_calls: ToolCallAggregator,
    text_buffer: String,
    reasoning_buffer: String,
}

impl StreamEngine {
    /// Creates an engine for one run.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let resolver = StepKeyResolver::new(config.reasoning_key.clone());
        let splitter = BlockSplitter::new(config.block_threshold);
        Ok(Self {
            config,
            resolver,
            fences: HashMap::new(),
            splitter,
            registry: StepIdentityRegistry::new(),
            messages: MessageIdentityCache::new(),
            tool_calls: ToolCallAggregator::new(),
            text_buffer: String::new(),
            reasoning_buffer: String::new(),
        })
    }

    /// Processes one delta and returns the events it produced, in order.
    ///
    /// Empty deltas are ignored. A coordinate missing a required field fails
    /// the whole delta; state for other step keys is untouched and the caller
    /// may keep feeding.
    pub fn feed(
        &mut self,
        coord: &ExecutionCoordinate,
        delta: &DeltaEvent,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        if delta.is_empty() {
            return Ok(Vec::new());
        }
        let base_key = self.resolver.resolve(coord)?;
        let mut events = Vec::new();

        for fragment in &delta.tool_calls {
            let opened = self.tool_calls.ingest(
                &base_key,
                fragment,
                &mut self.splitter,
                &mut self.registry,
            );
            if let Some(issued) = opened {
                self.announce_block(&mut events, &base_key, BlockKind::MessageCreation, issued);
            }
        }

        if let Some(token) = delta.text.as_deref().filter(|t| !t.is_empty()) {
            let tracker = self.fences.entry(base_key.clone()).or_default();
            let kind = tracker.observe(token);
            let in_fence = tracker.in_code_fence();
            let key = self.resolver.apply_kind(&base_key, kind);
            self.emit_content(&mut events, &key, token, kind, in_fence);
        }

        if let Some(token) = delta.reasoning.as_deref().filter(|t| !t.is_empty()) {
            // Reasoning deltas bypass fence detection entirely.
            let key = self.resolver.apply_kind(&base_key, BlockKind::Think);
            self.emit_content(&mut events, &key, token, BlockKind::Think, false);
        }

        Ok(events)
    }

    fn emit_content(
        &mut self,
        events: &mut Vec<EngineEvent>,
        key: &StepKey,
        token: &str,
        kind: BlockKind,
        in_fence: bool,
    ) {
        let result = self
            .splitter
            .feed(key, token, kind, in_fence, &mut self.registry);
        if let Some(issued) = result.opened {
            self.announce_block(events, key, kind, issued);
        }
        events.push(EngineEvent::ContentDelta {
            block_id: result.block_id,
            kind,
            payload: token.to_string(),
        });
        if self.config.accumulate {
            match kind {
                BlockKind::Think => self.reasoning_buffer.push_str(token),
                BlockKind::Text | BlockKind::MessageCreation => self.text_buffer.push_str(token),
            }
        }
    }

    fn announce_block(
        &mut self,
        events: &mut Vec<EngineEvent>,
        key: &StepKey,
        kind: BlockKind,
        issued: IssuedBlock,
    ) {
        if let Some(message_id) = self.messages.get_or_assign(key, false) {
            debug!(
                block_id = %issued.block_id,
                step_key = %key,
                message_id = %message_id,
                "message created"
            );
        }
        debug!(
            block_id = %issued.block_id,
            step_key = %key,
            kind = ?kind,
            sequence_index = issued.sequence_index,
            global_index = issued.global_index,
            "block started"
        );
        events.push(EngineEvent::BlockStarted {
            block_id: issued.block_id,
            step_key: key.clone(),
            kind,
            global_index: issued.global_index,
        });
    }

    /// Records the provider-revealed id for a message that was speculatively
    /// started under an engine-minted one. Idempotent.
    pub fn record_provisional_message(
        &mut self,
        coord: &ExecutionCoordinate,
        message_id: MessageId,
    ) -> Result<(), EngineError> {
        let key = self.resolver.resolve(coord)?;
        self.messages.record_provisional(&key, message_id);
        Ok(())
    }

    /// Current message id for a coordinate, if one has been established.
    pub fn message_id(
        &mut self,
        coord: &ExecutionCoordinate,
    ) -> Result<Option<MessageId>, EngineError> {
        let key = self.resolver.resolve(coord)?;
        Ok(self.messages.get_or_assign(&key, true))
    }

    /// Marks a tool call complete and emits its completion event.
    ///
    /// A parse failure of the accumulated arguments is reported here and
    /// leaves every other call intact.
    pub fn complete_tool_call(&mut self, call_id: &str) -> Result<EngineEvent, EngineError> {
        self.complete_tool_call_with_output(call_id, None)
    }

    /// Same as [`complete_tool_call`](Self::complete_tool_call) but attaches
    /// the tool's execution output.
    pub fn complete_tool_call_with_output(
        &mut self,
        call_id: &str,
        output: Option<serde_json::Value>,
    ) -> Result<EngineEvent, EngineError> {
        let (block_id, call) = self.tool_calls.complete(call_id, output)?;
        debug!(block_id = %block_id, call_id = %call.id, name = %call.name, "tool call completed");
        Ok(EngineEvent::ToolCallCompleted {
            block_id,
            call_id: call.id,
            name: call.name,
            args: call.args,
            output: call.output,
        })
    }

    /// Block that announced a call, for correlating a later tool result.
    pub fn block_for_call(&self, call_id: &str) -> Result<BlockId, EngineError> {
        self.tool_calls.block_for_call(call_id)
    }

    /// Announced-but-uncompleted call ids in announcement order.
    pub fn pending_tool_calls(&self) -> Vec<String> {
        self.tool_calls.pending()
    }

    /// Most recent block id for a coordinate and kind, or the id at `index`.
    pub fn last_block_id(
        &self,
        coord: &ExecutionCoordinate,
        kind: BlockKind,
        index: Option<usize>,
    ) -> Result<BlockId, EngineError> {
        let key = self.resolver.resolve_for_kind(coord, kind)?;
        self.registry.last_block_id(&key, index)
    }

    /// Full text accumulated so far; empty unless accumulation is enabled.
    pub fn text(&self) -> &str {
        &self.text_buffer
    }

    /// Full reasoning accumulated so far; empty unless accumulation is
    /// enabled.
    pub fn reasoning(&self) -> &str {
        &self.reasoning_buffer
    }
}
