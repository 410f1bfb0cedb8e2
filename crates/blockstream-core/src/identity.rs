//! Block and message identity bookkeeping.
//!
//! The registry and cache are the only mutable state touched by more than one
//! component; the engine owns one of each per run and mutates them on the
//! single consuming thread.

use std::collections::HashMap;

use crate::errors::EngineError;
use crate::model::{BlockId, MessageId};
use crate::step_key::StepKey;

/// Maps step keys to the ordered list of block ids issued for them and mints
/// new globally unique ids.
#[derive(Debug, Default)]
pub struct StepIdentityRegistry {
    blocks: HashMap<StepKey, Vec<BlockId>>,
    next_global_index: u64,
}

/// Identity assigned to a freshly opened block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IssuedBlock {
    pub block_id: BlockId,
    /// Index of this block within its step key, exactly `0, 1, 2, ...`.
    pub sequence_index: usize,
    /// Position in emission order across the whole run.
    pub global_index: u64,
}

impl StepIdentityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new block id for a step key.
    pub fn next_block_id(&mut self, step_key: &StepKey) -> IssuedBlock {
        let block_id = BlockId::mint();
        let list = self.blocks.entry(step_key.clone()).or_default();
        list.push(block_id);
        let issued = IssuedBlock {
            block_id,
            sequence_index: list.len() - 1,
            global_index: self.next_global_index,
        };
        self.next_global_index += 1;
        issued
    }

    /// Returns the most recent block id for a key, or the id at `index` if
    /// given.
    ///
    /// Fails with [`EngineError::NoBlocksForKey`] when the key was never
    /// initialized — a logic error in the caller, not a stream condition.
    pub fn last_block_id(
        &self,
        step_key: &StepKey,
        index: Option<usize>,
    ) -> Result<BlockId, EngineError> {
        let list = self
            .blocks
            .get(step_key)
            .ok_or_else(|| EngineError::NoBlocksForKey {
                step_key: step_key.clone(),
            })?;
        match index {
            None => list.last().copied().ok_or_else(|| EngineError::NoBlocksForKey {
                step_key: step_key.clone(),
            }),
            Some(index) => list
                .get(index)
                .copied()
                .ok_or_else(|| EngineError::BlockIndexOutOfRange {
                    step_key: step_key.clone(),
                    index,
                }),
        }
    }

    /// Number of blocks issued for a key.
    pub fn block_count(&self, step_key: &StepKey) -> usize {
        self.blocks.get(step_key).map_or(0, Vec::len)
    }
}

/// Reconciles provisional message identities with provider-confirmed ones.
///
/// A block started under a speculative id must not be duplicated when the
/// provider later reveals its canonical id for the same logical message, so
/// the cache keeps two explicit slots per step key and promotes instead of
/// overwriting.
#[derive(Debug, Default)]
pub struct MessageIdentityCache {
    confirmed: HashMap<StepKey, MessageId>,
    provisional: HashMap<StepKey, MessageId>,
}

impl MessageIdentityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the message id for a step key, minting one when allowed.
    ///
    /// With `return_existing_only = false` (the announce path) an already
    /// confirmed id returns `None`: the first read of a confirmed id is
    /// consumed once per block so message creation is never re-announced.
    /// A provisional id is promoted to confirmed and returned either way.
    pub fn get_or_assign(
        &mut self,
        step_key: &StepKey,
        return_existing_only: bool,
    ) -> Option<MessageId> {
        if let Some(existing) = self.confirmed.get(step_key) {
            return return_existing_only.then(|| existing.clone());
        }
        if let Some(promoted) = self.provisional.remove(step_key) {
            self.confirmed.insert(step_key.clone(), promoted.clone());
            return Some(promoted);
        }
        if return_existing_only {
            return None;
        }
        let minted = MessageId::mint();
        self.confirmed.insert(step_key.clone(), minted.clone());
        Some(minted)
    }

    /// Records the provider-revealed id for a message that was speculatively
    /// started.
    ///
    /// Idempotent: recording the same id twice is a no-op, and an id that is
    /// already confirmed for the key is a no-op as well.
    pub fn record_provisional(&mut self, step_key: &StepKey, message_id: MessageId) {
        if self.confirmed.get(step_key) == Some(&message_id) {
            return;
        }
        self.provisional.insert(step_key.clone(), message_id);
    }
}
