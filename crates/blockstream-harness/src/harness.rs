use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::PumpError;
use crate::run::RunBuilder;
use crate::source::{DeltaSource, SourceId};

pub(crate) struct HarnessInner {
    sources: HashMap<SourceId, Arc<dyn DeltaSource>>,
}

impl HarnessInner {
    pub(crate) fn source(&self, id: &SourceId) -> Option<Arc<dyn DeltaSource>> {
        self.sources.get(id).cloned()
    }
}

/// Entry point for registering delta sources and starting runs.
#[derive(Clone)]
pub struct StreamHarness {
    pub(crate) inner: Arc<HarnessInner>,
}

impl StreamHarness {
    /// Starts a builder for registering sources and creating a harness.
    pub fn builder() -> StreamHarnessBuilder {
        StreamHarnessBuilder::default()
    }

    /// Starts a run builder against a registered source.
    pub fn run(&self, source: impl Into<SourceId>) -> RunBuilder {
        RunBuilder::new(self.inner.clone(), source.into())
    }
}

/// Builder used to register delta sources before creating a harness.
#[derive(Default)]
pub struct StreamHarnessBuilder {
    sources: Vec<Arc<dyn DeltaSource>>,
}

impl StreamHarnessBuilder {
    /// Registers a delta source.
    ///
    /// Register one source per source id.
    pub fn register_source(mut self, source: Arc<dyn DeltaSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Builds the harness and validates source registration (including
    /// duplicates).
    pub fn build(self) -> Result<StreamHarness, PumpError> {
        let mut map: HashMap<SourceId, Arc<dyn DeltaSource>> = HashMap::new();
        let mut seen: HashSet<SourceId> = HashSet::new();
        for source in self.sources {
            let id = source.id();
            if !seen.insert(id.clone()) {
                return Err(PumpError::Config(format!(
                    "duplicate source registration: {id}"
                )));
            }
            map.insert(id, source);
        }
        Ok(StreamHarness {
            inner: Arc::new(HarnessInner { sources: map }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;
    use crate::source::{DeltaStreamHandle, SourceRequest};

    struct DummySource;

    #[async_trait::async_trait]
    impl DeltaSource for DummySource {
        fn id(&self) -> SourceId {
            SourceId::new("dummy")
        }

        async fn start_stream(
            &self,
            _req: SourceRequest,
        ) -> Result<DeltaStreamHandle, SourceError> {
            unreachable!("not used in this test")
        }
    }

    #[test]
    fn build_rejects_duplicate_source_ids() {
        let result = StreamHarness::builder()
            .register_source(Arc::new(DummySource))
            .register_source(Arc::new(DummySource))
            .build();
        assert!(
            matches!(result, Err(PumpError::Config(message)) if message.contains("duplicate source"))
        );
    }
}
