//! Forward-only block splitting.
//!
//! A block is flushed looking forward, never retroactively split: the delta
//! that trips the threshold is still attributed to the current block, and the
//! next delta for the key opens the successor. A cancelled stream therefore
//! never leaves an empty trailing block behind.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::event::BlockKind;
use crate::identity::{IssuedBlock, StepIdentityRegistry};
use crate::model::BlockId;
use crate::step_key::StepKey;

/// Separators that mark a safe break point.
///
/// The triggering delta itself must contain one of these; a separator earlier
/// in the accumulated buffer does not count. Relaxing that conjunction moves
/// split boundaries and is observable downstream.
pub const SENTENCE_SEPARATORS: &[&str] = &[". ", "! ", "? ", ".\n", "\n\n", "```"];

#[derive(Debug)]
struct KeyState {
    block_id: BlockId,
    kind: BlockKind,
    accumulated: usize,
    flush_pending: bool,
}

impl KeyState {
    fn fresh(block_id: BlockId, kind: BlockKind) -> Self {
        Self {
            block_id,
            kind,
            accumulated: 0,
            flush_pending: false,
        }
    }
}

/// Outcome of feeding one delta through the splitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedResult {
    /// Block the delta was attributed to.
    pub block_id: BlockId,
    /// Identity of the block opened for this delta, when one was.
    pub opened: Option<IssuedBlock>,
    /// True when this delta armed a forward flush.
    pub flushed: bool,
}

/// Decides, per step key, whether a delta continues the current block or
/// starts a new one.
#[derive(Debug)]
pub struct BlockSplitter {
    threshold: usize,
    states: HashMap<StepKey, KeyState>,
}

impl BlockSplitter {
    /// Creates a splitter with the given length threshold.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            states: HashMap::new(),
        }
    }

    /// Attributes `payload` to a block for `step_key`, opening one when the
    /// kind changed, no block exists, or a flush was armed by an earlier
    /// delta.
    ///
    /// The threshold check runs after attribution and requires all of:
    /// accumulated length past the threshold, a separator in this payload,
    /// and not being inside a code fence.
    pub fn feed(
        &mut self,
        step_key: &StepKey,
        payload: &str,
        kind: BlockKind,
        in_code_fence: bool,
        registry: &mut StepIdentityRegistry,
    ) -> FeedResult {
        let mut opened = None;
        let state = match self.states.entry(step_key.clone()) {
            Entry::Occupied(entry) if entry.get().kind == kind && !entry.get().flush_pending => {
                entry.into_mut()
            }
            Entry::Occupied(entry) => {
                let issued = registry.next_block_id(step_key);
                opened = Some(issued);
                let state = entry.into_mut();
                *state = KeyState::fresh(issued.block_id, kind);
                state
            }
            Entry::Vacant(entry) => {
                let issued = registry.next_block_id(step_key);
                opened = Some(issued);
                entry.insert(KeyState::fresh(issued.block_id, kind))
            }
        };
        state.accumulated += payload.len();

        let flushed = !in_code_fence
            && state.accumulated > self.threshold
            && contains_separator(payload);
        if flushed {
            state.flush_pending = true;
        }

        FeedResult {
            block_id: state.block_id,
            opened,
            flushed,
        }
    }

    /// Kind of the active block for a key, if any.
    pub fn active_kind(&self, step_key: &StepKey) -> Option<BlockKind> {
        self.states.get(step_key).map(|state| state.kind)
    }
}

fn contains_separator(payload: &str) -> bool {
    SENTENCE_SEPARATORS
        .iter()
        .any(|separator| payload.contains(separator))
}
