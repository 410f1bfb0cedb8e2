/// Default block length threshold in characters.
pub const DEFAULT_BLOCK_THRESHOLD: usize = 4500;

/// Default reasoning discriminator appended to step keys for THINK content.
pub const DEFAULT_REASONING_KEY: &str = "reasoning";

/// Engine behavior options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Accumulated block length after which a split is considered.
    pub block_threshold: usize,
    /// Suffix that keeps reasoning content on its own step key.
    pub reasoning_key: String,
    /// When true, the engine retains full concatenated text/reasoning
    /// buffers for introspection and testing.
    pub accumulate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            reasoning_key: DEFAULT_REASONING_KEY.to_string(),
            accumulate: false,
        }
    }
}

impl EngineConfig {
    /// Overrides the block length threshold.
    pub fn block_threshold(mut self, threshold: usize) -> Self {
        self.block_threshold = threshold;
        self
    }

    /// Overrides the reasoning discriminator suffix.
    pub fn reasoning_key(mut self, key: impl Into<String>) -> Self {
        self.reasoning_key = key.into();
        self
    }

    /// Enables or disables full-content accumulation.
    pub fn accumulate(mut self, accumulate: bool) -> Self {
        self.accumulate = accumulate;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), crate::errors::EngineError> {
        if self.block_threshold == 0 {
            return Err(crate::errors::EngineError::config(
                "block_threshold must be greater than 0",
            ));
        }
        if self.reasoning_key.trim().is_empty() {
            return Err(crate::errors::EngineError::config(
                "reasoning_key must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = EngineConfig::default();
        assert_eq!(config.block_threshold, 4500);
        assert_eq!(config.reasoning_key, "reasoning");
        assert!(!config.accumulate);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let err = EngineConfig::default()
            .block_threshold(0)
            .validate()
            .expect_err("must fail");
        assert!(matches!(err, crate::errors::EngineError::Config(_)));
    }
}
