use std::fmt;

use crate::errors::EngineError;
use crate::event::BlockKind;

/// Identifies which logical generation step of an agent run produced a delta.
///
/// All fields are optional so adapters can hand over whatever the provider
/// gave them; the resolver rejects any missing field instead of guessing,
/// since a wrong key corrupts identity everywhere downstream.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionCoordinate {
    pub run_id: Option<String>,
    pub thread_id: Option<String>,
    pub node_name: Option<String>,
    pub step_index: Option<u64>,
    pub namespace: Option<String>,
}

impl ExecutionCoordinate {
    /// Creates a fully populated coordinate.
    pub fn new(
        run_id: impl Into<String>,
        thread_id: impl Into<String>,
        node_name: impl Into<String>,
        step_index: u64,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            run_id: Some(run_id.into()),
            thread_id: Some(thread_id.into()),
            node_name: Some(node_name.into()),
            step_index: Some(step_index),
            namespace: Some(namespace.into()),
        }
    }
}

/// Stable composite key for one logical generation step.
///
/// Equal coordinates (including the reasoning discriminator) always yield an
/// equal key; distinct steps never collide because every coordinate field is
/// part of the joined string.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StepKey(String);

impl StepKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const KEY_SEPARATOR: char = ':';

/// Derives step keys from execution coordinates.
#[derive(Clone, Debug)]
pub struct StepKeyResolver {
    reasoning_key: String,
}

impl StepKeyResolver {
    /// Creates a resolver with the given reasoning discriminator suffix.
    pub fn new(reasoning_key: impl Into<String>) -> Self {
        Self {
            reasoning_key: reasoning_key.into(),
        }
    }

    /// Resolves the base (content) key for a coordinate.
    ///
    /// Fails with [`EngineError::MissingCoordinate`] naming the first absent
    /// field; callers must not silently default missing fields.
    pub fn resolve(&self, coord: &ExecutionCoordinate) -> Result<StepKey, EngineError> {
        let run_id = require(coord.run_id.as_deref(), "run_id")?;
        let thread_id = require(coord.thread_id.as_deref(), "thread_id")?;
        let node_name = require(coord.node_name.as_deref(), "node_name")?;
        let step_index = coord
            .step_index
            .ok_or(EngineError::MissingCoordinate { field: "step_index" })?;
        let namespace = require(coord.namespace.as_deref(), "namespace")?;

        let mut key = String::new();
        for part in [run_id, thread_id, node_name] {
            key.push_str(part);
            key.push(KEY_SEPARATOR);
        }
        key.push_str(&step_index.to_string());
        key.push(KEY_SEPARATOR);
        key.push_str(namespace);
        Ok(StepKey(key))
    }

    /// Resolves the key for a coordinate and classification.
    ///
    /// THINK content gets a distinguishing suffix so text and reasoning for
    /// the same coordinate never collapse onto one key; they stay
    /// independently splittable and independently ordered.
    pub fn resolve_for_kind(
        &self,
        coord: &ExecutionCoordinate,
        kind: BlockKind,
    ) -> Result<StepKey, EngineError> {
        let base = self.resolve(coord)?;
        Ok(self.apply_kind(&base, kind))
    }

    pub(crate) fn apply_kind(&self, base: &StepKey, kind: BlockKind) -> StepKey {
        match kind {
            BlockKind::Think => {
                let mut key = base.0.clone();
                key.push(KEY_SEPARATOR);
                key.push_str(&self.reasoning_key);
                StepKey(key)
            }
            BlockKind::Text | BlockKind::MessageCreation => base.clone(),
        }
    }
}

fn require<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, EngineError> {
    value.ok_or(EngineError::MissingCoordinate { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord() -> ExecutionCoordinate {
        ExecutionCoordinate::new("run-1", "thread-1", "agent", 2, "main")
    }

    #[test]
    fn equal_coordinates_yield_equal_keys() {
        let resolver = StepKeyResolver::new("reasoning");
        let a = resolver.resolve(&coord()).expect("key");
        let b = resolver.resolve(&coord()).expect("key");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "run-1:thread-1:agent:2:main");
    }

    #[test]
    fn reasoning_kind_gets_distinct_key() {
        let resolver = StepKeyResolver::new("reasoning");
        let text = resolver
            .resolve_for_kind(&coord(), BlockKind::Text)
            .expect("key");
        let think = resolver
            .resolve_for_kind(&coord(), BlockKind::Think)
            .expect("key");
        assert_ne!(text, think);
        assert_eq!(think.as_str(), "run-1:thread-1:agent:2:main:reasoning");
    }

    #[test]
    fn missing_field_is_rejected_with_field_name() {
        let resolver = StepKeyResolver::new("reasoning");
        let mut partial = coord();
        partial.node_name = None;
        let err = resolver.resolve(&partial).expect_err("must fail");
        assert!(matches!(
            err,
            EngineError::MissingCoordinate { field: "node_name" }
        ));
    }

    #[test]
    fn distinct_step_indices_never_collide() {
        let resolver = StepKeyResolver::new("reasoning");
        let mut other = coord();
        other.step_index = Some(3);
        assert_ne!(
            resolver.resolve(&coord()).expect("key"),
            resolver.resolve(&other).expect("key")
        );
    }
}
