//! Tool-call fragment aggregation.
//!
//! Providers split tool-call arguments across many fragments keyed only by a
//! positional index. The aggregator merges them into complete call records,
//! anchored to a message-creation marker block so a call is never orphaned
//! from the step that announced it.

use std::collections::HashMap;

use tracing::warn;

use crate::errors::EngineError;
use crate::event::{BlockKind, ToolCallFragment};
use crate::identity::{IssuedBlock, StepIdentityRegistry};
use crate::model::BlockId;
use crate::splitter::BlockSplitter;
use crate::step_key::StepKey;

/// Completed tool-call record handed to downstream execution.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompletedToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

#[derive(Debug)]
struct PendingToolCall {
    name: String,
    args_accumulator: String,
    block_id: BlockId,
    completed: bool,
}

/// Merges positional argument fragments into complete call records keyed by
/// call id.
#[derive(Debug, Default)]
pub struct ToolCallAggregator {
    call_id_by_index: HashMap<usize, String>,
    calls: HashMap<String, PendingToolCall>,
    announcement_order: Vec<String>,
}

impl ToolCallAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests one fragment for the given step key.
    ///
    /// An announcing fragment (id or name present) opens a new call and
    /// anchors it to the key's message-creation block, creating that marker
    /// through the splitter unless the key's active block already is one.
    /// Returns the marker identity when one was opened so the caller can
    /// announce it. Argument-only fragments append by index; an unknown
    /// index is dropped with a warning, never a crash.
    pub fn ingest(
        &mut self,
        step_key: &StepKey,
        fragment: &ToolCallFragment,
        splitter: &mut BlockSplitter,
        registry: &mut StepIdentityRegistry,
    ) -> Option<IssuedBlock> {
        if !fragment.is_announcement() {
            let Some(call_id) = self.call_id_by_index.get(&fragment.index) else {
                warn!(index = fragment.index, "dropping fragment for unknown tool-call index");
                return None;
            };
            if let Some(call) = self.calls.get_mut(call_id)
                && let Some(piece) = fragment.args_fragment.as_deref()
            {
                call.args_accumulator.push_str(piece);
            }
            return None;
        }

        let anchor = splitter.feed(step_key, "", BlockKind::MessageCreation, false, registry);

        let call_id = fragment
            .id
            .clone()
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4()));
        if let Some(previous) = self.call_id_by_index.insert(fragment.index, call_id.clone())
            && previous != call_id
            && self.calls.get(&previous).is_some_and(|call| !call.completed)
        {
            warn!(
                index = fragment.index,
                previous = %previous,
                "tool-call index re-announced before previous call completed"
            );
        }

        self.calls.insert(
            call_id.clone(),
            PendingToolCall {
                name: fragment.name.clone().unwrap_or_default(),
                args_accumulator: fragment.args_fragment.clone().unwrap_or_default(),
                block_id: anchor.block_id,
                completed: false,
            },
        );
        self.announcement_order.push(call_id);
        anchor.opened
    }

    /// Marks a call complete and parses its accumulated arguments.
    ///
    /// Partial JSON is expected while streaming; only a failure here, at
    /// completion time, is reported — and it leaves every other call intact.
    /// An empty accumulator parses to `null`.
    pub fn complete(
        &mut self,
        call_id: &str,
        output: Option<serde_json::Value>,
    ) -> Result<(BlockId, CompletedToolCall), EngineError> {
        let call = self
            .calls
            .get_mut(call_id)
            .ok_or_else(|| EngineError::unknown_tool_call(call_id))?;
        call.completed = true;
        let args = if call.args_accumulator.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&call.args_accumulator).map_err(|e| {
                EngineError::ToolArgsParse {
                    call_id: call_id.to_string(),
                    reason: e.to_string(),
                }
            })?
        };
        Ok((
            call.block_id,
            CompletedToolCall {
                id: call_id.to_string(),
                name: call.name.clone(),
                args,
                output,
            },
        ))
    }

    /// Block that announced a call, for tool-result correlation.
    ///
    /// Failing to find it means the call was never properly announced.
    pub fn block_for_call(&self, call_id: &str) -> Result<BlockId, EngineError> {
        self.calls
            .get(call_id)
            .map(|call| call.block_id)
            .ok_or_else(|| EngineError::unknown_tool_call(call_id))
    }

    /// Announced-but-uncompleted call ids in announcement order.
    pub fn pending(&self) -> Vec<String> {
        self.announcement_order
            .iter()
            .filter(|id| self.calls.get(*id).is_some_and(|call| !call.completed))
            .cloned()
            .collect()
    }
}
