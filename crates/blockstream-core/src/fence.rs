//! Fence and think-tag tracking for the raw text token stream.
//!
//! Splitting and classification decisions must never cut through a fenced
//! code region or a think region, so the tracker runs before either happens.
//! Reasoning deltas bypass it entirely; only TEXT-classified tokens are
//! observed.

use crate::event::BlockKind;

/// Marker that opens and closes a fenced code region.
pub const FENCE_MARKER: &str = "```";

/// Marker that opens a think region.
pub const THINK_OPEN: &str = "<think>";

/// Marker that closes a think region.
pub const THINK_CLOSE: &str = "</think>";

/// Tracks whether the stream is inside a code fence or a think region.
#[derive(Debug, Default)]
pub struct FenceTracker {
    in_code_fence: bool,
    in_think_region: bool,
    close_pending: bool,
}

impl FenceTracker {
    /// Creates a tracker at stream start (outside any region).
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes one raw text token and returns its classification.
    ///
    /// The close marker's own token still classifies as THINK; the region
    /// closes starting with the token after it. Think markers are inert
    /// inside a code fence.
    pub fn observe(&mut self, token: &str) -> BlockKind {
        if self.close_pending && !self.in_code_fence {
            self.in_think_region = false;
            self.close_pending = false;
        }
        if token.contains(FENCE_MARKER) {
            self.in_code_fence = !self.in_code_fence;
        }
        if !self.in_code_fence && token.contains(THINK_OPEN) {
            self.in_think_region = true;
        }
        if !self.in_code_fence && token.contains(THINK_CLOSE) {
            self.close_pending = true;
        }
        if self.in_think_region {
            BlockKind::Think
        } else {
            BlockKind::Text
        }
    }

    /// True while inside a fenced code region; block splitting is suppressed
    /// regardless of accumulated length.
    pub fn in_code_fence(&self) -> bool {
        self.in_code_fence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_classifies_as_text() {
        let mut tracker = FenceTracker::new();
        assert_eq!(tracker.observe("hello"), BlockKind::Text);
        assert!(!tracker.in_code_fence());
    }

    #[test]
    fn fence_marker_toggles_state() {
        let mut tracker = FenceTracker::new();
        tracker.observe("```rust\n");
        assert!(tracker.in_code_fence());
        tracker.observe("let x = 1;\n");
        assert!(tracker.in_code_fence());
        tracker.observe("```");
        assert!(!tracker.in_code_fence());
    }

    #[test]
    fn think_tags_reclassify_and_close_deferred() {
        let mut tracker = FenceTracker::new();
        assert_eq!(tracker.observe("before "), BlockKind::Text);
        // Open tag token itself is THINK.
        assert_eq!(tracker.observe("<think>"), BlockKind::Think);
        assert_eq!(tracker.observe("pondering"), BlockKind::Think);
        // Close tag token is still THINK; the region ends after it.
        assert_eq!(tracker.observe("</think>"), BlockKind::Think);
        assert_eq!(tracker.observe("after"), BlockKind::Text);
    }

    #[test]
    fn think_markers_are_inert_inside_fence() {
        let mut tracker = FenceTracker::new();
        tracker.observe("```");
        assert_eq!(tracker.observe("<think>"), BlockKind::Text);
        assert_eq!(tracker.observe("</think>"), BlockKind::Text);
        tracker.observe("```");
        assert_eq!(tracker.observe("plain"), BlockKind::Text);
    }

    #[test]
    fn open_and_close_in_one_token() {
        let mut tracker = FenceTracker::new();
        assert_eq!(tracker.observe("<think>quick</think>"), BlockKind::Think);
        assert_eq!(tracker.observe("next"), BlockKind::Text);
    }
}
