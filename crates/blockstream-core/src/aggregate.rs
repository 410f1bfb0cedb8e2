//! Reference consumer that folds engine events into ordered content parts.
//!
//! The aggregator is deliberately dumb: it trusts block ids as join keys and
//! never re-derives segmentation. Feeding it the event stream of a run yields
//! the same parts regardless of how the run's deltas were chunked.

use std::collections::HashMap;

use tracing::warn;

use crate::content::ContentPart;
use crate::event::{BlockKind, EngineEvent};
use crate::model::BlockId;

/// Folds a run's [`EngineEvent`] stream into an ordered part list.
#[derive(Debug, Default)]
pub struct ContentAggregator {
    parts: Vec<ContentPart>,
    part_by_block: HashMap<BlockId, usize>,
}

impl ContentAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event.
    ///
    /// Events referencing a block this aggregator never saw started are
    /// dropped with a warning; that only happens when a consumer joins a
    /// stream mid-run.
    pub fn apply(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::BlockStarted { block_id, kind, .. } => {
                let part = match kind {
                    BlockKind::Think => ContentPart::empty_think(),
                    // Marker blocks become empty text parts that collect the
                    // call ids anchored to them.
                    BlockKind::Text | BlockKind::MessageCreation => ContentPart::empty_text(),
                };
                self.parts.push(part);
                self.part_by_block.insert(*block_id, self.parts.len() - 1);
            }
            EngineEvent::ContentDelta {
                block_id, payload, ..
            } => match self.part_for(block_id) {
                Some(ContentPart::Text { text, .. }) => text.push_str(payload),
                Some(ContentPart::Think { think }) => think.push_str(payload),
                Some(ContentPart::ToolCall { .. }) | None => {
                    warn!(block_id = %block_id, "content delta for unknown block");
                }
            },
            EngineEvent::ToolCallCompleted {
                block_id,
                call_id,
                name,
                args,
                output,
            } => {
                match self.part_for(block_id) {
                    Some(ContentPart::Text { tool_call_ids, .. }) => {
                        tool_call_ids.push(call_id.clone());
                    }
                    _ => warn!(block_id = %block_id, "tool call completed against unknown block"),
                }
                self.parts.push(ContentPart::ToolCall {
                    tool_call: crate::tool_call::CompletedToolCall {
                        id: call_id.clone(),
                        name: name.clone(),
                        args: args.clone(),
                        output: output.clone(),
                    },
                });
            }
        }
    }

    fn part_for(&mut self, block_id: &BlockId) -> Option<&mut ContentPart> {
        let index = *self.part_by_block.get(block_id)?;
        self.parts.get_mut(index)
    }

    /// Parts assembled so far, in emission order.
    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    /// Consumes the aggregator and returns the assembled parts.
    pub fn into_parts(self) -> Vec<ContentPart> {
        self.parts
    }

    /// Concatenation of all visible text.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenation of all reasoning content.
    pub fn think(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Think { think } => Some(think.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step_key::{ExecutionCoordinate, StepKeyResolver};

    fn key() -> crate::step_key::StepKey {
        StepKeyResolver::new("reasoning")
            .resolve(&ExecutionCoordinate::new("r", "t", "n", 0, "ns"))
            .expect("key")
    }

    fn started(block_id: BlockId, kind: BlockKind, global_index: u64) -> EngineEvent {
        EngineEvent::BlockStarted {
            block_id,
            step_key: key(),
            kind,
            global_index,
        }
    }

    fn delta(block_id: BlockId, kind: BlockKind, payload: &str) -> EngineEvent {
        EngineEvent::ContentDelta {
            block_id,
            kind,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn text_and_think_fold_into_separate_parts() {
        let text_block = BlockId(uuid::Uuid::new_v4());
        let think_block = BlockId(uuid::Uuid::new_v4());
        let mut aggregator = ContentAggregator::new();
        aggregator.apply(&started(text_block, BlockKind::Text, 0));
        aggregator.apply(&delta(text_block, BlockKind::Text, "Hello "));
        aggregator.apply(&started(think_block, BlockKind::Think, 1));
        aggregator.apply(&delta(think_block, BlockKind::Think, "hmm"));
        aggregator.apply(&delta(text_block, BlockKind::Text, "world"));

        assert_eq!(aggregator.text(), "Hello world");
        assert_eq!(aggregator.think(), "hmm");
        assert_eq!(aggregator.parts().len(), 2);
    }

    #[test]
    fn completed_call_is_anchored_to_marker_part() {
        let marker = BlockId(uuid::Uuid::new_v4());
        let mut aggregator = ContentAggregator::new();
        aggregator.apply(&started(marker, BlockKind::MessageCreation, 0));
        aggregator.apply(&EngineEvent::ToolCallCompleted {
            block_id: marker,
            call_id: "t1".into(),
            name: "search".into(),
            args: serde_json::json!({"q": "rust"}),
            output: None,
        });

        let parts = aggregator.parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0],
            ContentPart::Text {
                text: String::new(),
                tool_call_ids: vec!["t1".into()],
            }
        );
        assert!(matches!(parts[1], ContentPart::ToolCall { .. }));
    }

    #[test]
    fn unknown_block_delta_is_dropped() {
        let mut aggregator = ContentAggregator::new();
        aggregator.apply(&delta(BlockId(uuid::Uuid::new_v4()), BlockKind::Text, "lost"));
        assert!(aggregator.parts().is_empty());
        assert_eq!(aggregator.text(), "");
    }

    #[test]
    fn replay_is_chunking_invariant() {
        // Same content delivered as one delta or many folds identically.
        let block = BlockId(uuid::Uuid::new_v4());
        let mut whole = ContentAggregator::new();
        whole.apply(&started(block, BlockKind::Text, 0));
        whole.apply(&delta(block, BlockKind::Text, "one two three"));

        let mut pieces = ContentAggregator::new();
        pieces.apply(&started(block, BlockKind::Text, 0));
        for piece in ["one ", "two ", "three"] {
            pieces.apply(&delta(block, BlockKind::Text, piece));
        }
        assert_eq!(whole.parts(), pieces.parts());
    }
}
