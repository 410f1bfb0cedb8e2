use std::sync::Arc;

use blockstream_core::{
    ContentAggregator, ContentPart, EngineConfig, EngineError, EngineEvent, StreamEngine,
};
use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::errors::{PumpError, RunFailure, run_failure_from_source_error};
use crate::harness::HarnessInner;
use crate::source::{DeltaSource, SourceId, SourceItem, SourceRequest};

/// Handle used to request cancellation of a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Cancellation is best-effort and becomes visible as a terminal
    /// `PumpEvent::Error` with `RunFailure::Cancelled`. Blocks left open at
    /// that point are incomplete, not invalid.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Normalized events yielded by a [`RunStream`].
#[derive(Clone, Debug, PartialEq)]
pub enum PumpEvent {
    /// The run task is live and about to open the source stream.
    RunStarted { run_id: uuid::Uuid, source: SourceId },
    /// One segmentation event produced by the engine.
    Engine {
        run_id: uuid::Uuid,
        event: EngineEvent,
    },
    /// Terminal event: the source stream ended and all parts are assembled.
    Completed {
        run_id: uuid::Uuid,
        parts: Vec<ContentPart>,
    },
    /// Terminal event: the run failed.
    Error {
        run_id: uuid::Uuid,
        error: RunFailure,
    },
}

/// Builder for configuring and starting a single streaming run.
pub struct RunBuilder {
    harness: Arc<HarnessInner>,
    source: SourceId,
    engine_config: EngineConfig,
    params: serde_json::Value,
    stream_buffer_capacity: usize,
}

impl RunBuilder {
    pub(crate) fn new(harness: Arc<HarnessInner>, source: SourceId) -> Self {
        Self {
            harness,
            source,
            engine_config: EngineConfig::default(),
            params: serde_json::Value::Null,
            stream_buffer_capacity: 128,
        }
    }

    /// Overrides the engine configuration for this run.
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Sets source-specific parameters, passed through opaquely.
    pub fn params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Sets the bounded event buffer size used between the pump task and the
    /// consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    /// Validates the builder state and starts a streaming run.
    ///
    /// The returned `RunStream` yields `RunStarted`, `Engine` events, and a
    /// terminal `Completed`/`Error` event.
    pub async fn start_stream(self) -> Result<RunStream, PumpError> {
        if self.stream_buffer_capacity == 0 {
            return Err(PumpError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        let source =
            self.harness
                .source(&self.source)
                .ok_or_else(|| PumpError::SourceNotFound {
                    source: self.source.clone(),
                })?;
        let engine = StreamEngine::new(self.engine_config)?;

        let run_id = uuid::Uuid::new_v4();
        let request = SourceRequest {
            run_id,
            params: self.params,
        };
        let (tx, rx) = mpsc::channel(self.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);

        let abort_handle = AbortHandle { tx: abort_tx };
        let source_id = self.source.clone();
        tokio::spawn(run_task(
            source, source_id, request, engine, tx, final_tx, abort_rx,
        ));

        Ok(RunStream {
            run_id,
            source: self.source,
            rx,
            final_rx,
            abort_handle,
            saw_terminal: false,
        })
    }

    /// Runs to completion and returns the assembled content parts.
    pub async fn collect_parts(self) -> Result<Vec<ContentPart>, PumpError> {
        let stream = self.start_stream().await?;
        stream.finish().await
    }
}

/// Streaming handle returned by `RunBuilder::start_stream`.
///
/// Use `next_event()` to consume events as they arrive and `finish()` to
/// obtain the final part list after the terminal event.
pub struct RunStream {
    run_id: uuid::Uuid,
    source: SourceId,
    rx: mpsc::Receiver<PumpEvent>,
    final_rx: oneshot::Receiver<Result<Vec<ContentPart>, PumpError>>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl RunStream {
    /// Returns the run id for this stream.
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Returns the source feeding this run.
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    /// Returns a handle that can cancel the run.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for and returns the next pump event.
    ///
    /// Returns `None` after the stream channel is closed.
    pub async fn next_event(&mut self) -> Option<PumpEvent> {
        let event = self.rx.recv().await;
        if let Some(PumpEvent::Completed { .. } | PumpEvent::Error { .. }) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains the stream (if needed) and returns the terminal run result.
    ///
    /// This is safe to call after consuming events manually with
    /// `next_event()`.
    pub async fn finish(mut self) -> Result<Vec<ContentPart>, PumpError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(PumpEvent::Completed { .. } | PumpEvent::Error { .. }) => {
                    self.saw_terminal = true;
                }
                Some(_) => {}
                None => break,
            }
        }

        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(PumpError::protocol_msg(format!(
                "run task ended without final result (source={})",
                self.source
            ))),
        }
    }
}

async fn run_task(
    source: Arc<dyn DeltaSource>,
    source_id: SourceId,
    request: SourceRequest,
    mut engine: StreamEngine,
    tx: mpsc::Sender<PumpEvent>,
    final_tx: oneshot::Sender<Result<Vec<ContentPart>, PumpError>>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let run_id = request.run_id;

    if !send_event(
        &tx,
        PumpEvent::RunStarted {
            run_id,
            source: source_id.clone(),
        },
    )
    .await
    {
        let _ = final_tx.send(Err(PumpError::protocol_msg(
            "run stream receiver dropped before RunStarted",
        )));
        return;
    }

    let started = source.start_stream(request).await;
    let mut handle = match started {
        Ok(handle) => handle,
        Err(err) => {
            let failure = run_failure_from_source_error(&err);
            let _ = send_event(
                &tx,
                PumpEvent::Error {
                    run_id,
                    error: failure.clone(),
                },
            )
            .await;
            let _ = final_tx.send(Err(PumpError::run_failed(failure)));
            return;
        }
    };

    let mut aggregator = ContentAggregator::new();
    let mut accepted_any = false;
    loop {
        tokio::select! {
            changed = abort_rx.changed() => {
                match changed {
                    Ok(_) if *abort_rx.borrow() => {
                        let failure = RunFailure::Cancelled;
                        let _ = send_event(&tx, PumpEvent::Error { run_id, error: failure.clone() }).await;
                        let _ = final_tx.send(Err(PumpError::run_failed(failure)));
                        return;
                    }
                    Ok(_) => {}
                    Err(_) => {}
                }
            }
            next = handle.stream.next() => {
                match next {
                    Some(Ok(SourceItem::Delta { coord, delta })) => {
                        match engine.feed(&coord, &delta) {
                            Ok(events) => {
                                accepted_any = true;
                                for event in events {
                                    aggregator.apply(&event);
                                    if !send_event(&tx, PumpEvent::Engine { run_id, event }).await {
                                        let _ = final_tx.send(Err(PumpError::protocol_msg("run stream receiver dropped during output")));
                                        return;
                                    }
                                }
                            }
                            Err(err @ EngineError::MissingCoordinate { .. }) if !accepted_any => {
                                // No baseline established yet: run-fatal.
                                let failure = RunFailure::Engine { message: err.to_string() };
                                let _ = send_event(&tx, PumpEvent::Error { run_id, error: failure.clone() }).await;
                                let _ = final_tx.send(Err(PumpError::run_failed(failure)));
                                return;
                            }
                            Err(err) => {
                                warn!(run_id = %run_id, error = %err, "dropping delta");
                            }
                        }
                    }
                    Some(Ok(SourceItem::ProvisionalMessageId { coord, message_id })) => {
                        if let Err(err) = engine.record_provisional_message(&coord, message_id) {
                            warn!(run_id = %run_id, error = %err, "dropping provisional message id");
                        }
                    }
                    Some(Ok(SourceItem::ToolCallsFinished)) => {
                        for call_id in engine.pending_tool_calls() {
                            match engine.complete_tool_call(&call_id) {
                                Ok(event) => {
                                    aggregator.apply(&event);
                                    if !send_event(&tx, PumpEvent::Engine { run_id, event }).await {
                                        let _ = final_tx.send(Err(PumpError::protocol_msg("run stream receiver dropped during output")));
                                        return;
                                    }
                                }
                                Err(err) => {
                                    warn!(run_id = %run_id, call_id = %call_id, error = %err, "tool call failed to complete");
                                }
                            }
                        }
                    }
                    Some(Err(err)) => {
                        let failure = run_failure_from_source_error(&err);
                        let _ = send_event(&tx, PumpEvent::Error { run_id, error: failure.clone() }).await;
                        let _ = final_tx.send(Err(PumpError::run_failed(failure)));
                        return;
                    }
                    None => {
                        // A source stream simply ending is the normal way a
                        // run completes; open trailing blocks are valid up
                        // to the last delta received.
                        debug!(run_id = %run_id, source = %source_id, "source stream complete");
                        let parts = aggregator.into_parts();
                        let sent = send_event(&tx, PumpEvent::Completed { run_id, parts: parts.clone() }).await;
                        let _ = final_tx.send(if sent { Ok(parts) } else { Err(PumpError::protocol_msg("run stream receiver dropped before completion")) });
                        return;
                    }
                }
            }
        }
    }
}

async fn send_event(tx: &mpsc::Sender<PumpEvent>, event: PumpEvent) -> bool {
    tx.send(event).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;
    use crate::source::{DeltaStreamHandle, SourceMeta};
    use blockstream_core::{
        BlockKind, DeltaEvent, ExecutionCoordinate, MessageId, ToolCallFragment,
    };
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        id: SourceId,
        calls: Arc<AtomicUsize>,
        behavior: FakeSourceBehavior,
    }

    enum FakeSourceBehavior {
        ImmediateError(SourceError),
        Items(Vec<Result<SourceItem, SourceError>>),
        Pending,
    }

    #[async_trait::async_trait]
    impl DeltaSource for FakeSource {
        fn id(&self) -> SourceId {
            self.id.clone()
        }

        async fn start_stream(
            &self,
            _req: SourceRequest,
        ) -> Result<DeltaStreamHandle, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                FakeSourceBehavior::ImmediateError(err) => Err(err.clone()),
                FakeSourceBehavior::Items(items) => Ok(DeltaStreamHandle {
                    stream: Box::pin(stream::iter(items.clone())),
                    metadata: SourceMeta::default(),
                }),
                FakeSourceBehavior::Pending => Ok(DeltaStreamHandle {
                    stream: Box::pin(stream::pending()),
                    metadata: SourceMeta::default(),
                }),
            }
        }
    }

    fn harness_with_source(source: FakeSource) -> crate::StreamHarness {
        crate::StreamHarness::builder()
            .register_source(Arc::new(source))
            .build()
            .expect("build harness")
    }

    fn builder_with_items(items: Vec<Result<SourceItem, SourceError>>) -> RunBuilder {
        let harness = harness_with_source(FakeSource {
            id: SourceId::new("fake"),
            calls: Arc::new(AtomicUsize::new(0)),
            behavior: FakeSourceBehavior::Items(items),
        });
        harness.run("fake")
    }

    fn coord() -> ExecutionCoordinate {
        ExecutionCoordinate::new("run-1", "thread-1", "agent", 0, "main")
    }

    fn text_item(token: &str) -> Result<SourceItem, SourceError> {
        Ok(SourceItem::Delta {
            coord: coord(),
            delta: DeltaEvent::text(token),
        })
    }

    fn parts_text(parts: &[ContentPart]) -> String {
        parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn zero_buffer_capacity_is_rejected() {
        let err = builder_with_items(vec![])
            .stream_buffer_capacity(0)
            .start_stream()
            .await;
        let err = match err {
            Ok(_) => panic!("zero capacity should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, PumpError::Validation(msg) if msg.contains("stream_buffer_capacity")));
    }

    #[tokio::test]
    async fn source_not_found_is_start_time_error() {
        let harness = crate::StreamHarness::builder().build().expect("build");
        let err = harness.run("missing").start_stream().await;
        let err = match err {
            Ok(_) => panic!("missing source"),
            Err(err) => err,
        };
        assert!(matches!(err, PumpError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn emits_started_engine_events_then_completed() {
        let mut stream = builder_with_items(vec![text_item("Hello"), text_item(" world")])
            .start_stream()
            .await
            .expect("start");

        let first = stream.next_event().await.expect("first event");
        assert!(matches!(first, PumpEvent::RunStarted { .. }));

        let second = stream.next_event().await.expect("second event");
        assert!(matches!(
            second,
            PumpEvent::Engine {
                event: EngineEvent::BlockStarted {
                    kind: BlockKind::Text,
                    ..
                },
                ..
            }
        ));

        let parts = stream.finish().await.expect("finish");
        assert_eq!(parts_text(&parts), "Hello world");
    }

    #[tokio::test]
    async fn tool_calls_finished_completes_pending_calls() {
        let items = vec![
            Ok(SourceItem::Delta {
                coord: coord(),
                delta: DeltaEvent::tool_calls(vec![ToolCallFragment::announce(0, "t1", "search")]),
            }),
            Ok(SourceItem::Delta {
                coord: coord(),
                delta: DeltaEvent::tool_calls(vec![ToolCallFragment::args(0, "{\"q\":\"rust\"}")]),
            }),
            Ok(SourceItem::ToolCallsFinished),
        ];
        let mut stream = builder_with_items(items).start_stream().await.expect("start");

        let mut saw_completion = false;
        while let Some(event) = stream.next_event().await {
            if let PumpEvent::Engine {
                event: EngineEvent::ToolCallCompleted { call_id, args, .. },
                ..
            } = &event
            {
                assert_eq!(call_id, "t1");
                assert_eq!(args, &serde_json::json!({"q": "rust"}));
                saw_completion = true;
            }
            if matches!(event, PumpEvent::Completed { .. }) {
                break;
            }
        }
        assert!(saw_completion);

        let parts = stream.finish().await.expect("finish");
        assert!(
            parts
                .iter()
                .any(|part| matches!(part, ContentPart::ToolCall { .. }))
        );
    }

    #[tokio::test]
    async fn source_runtime_error_becomes_terminal_error() {
        let mut stream = builder_with_items(vec![Err(SourceError::source("fake", "boom", Some(500)))])
            .start_stream()
            .await
            .expect("start");

        let mut saw_error = false;
        while let Some(event) = stream.next_event().await {
            if matches!(event, PumpEvent::Error { .. }) {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
        assert!(matches!(
            stream.finish().await,
            Err(PumpError::RunFailed(RunFailure::Source { .. }))
        ));
    }

    #[tokio::test]
    async fn cancellation_emits_terminal_error() {
        let harness = harness_with_source(FakeSource {
            id: SourceId::new("fake"),
            calls: Arc::new(AtomicUsize::new(0)),
            behavior: FakeSourceBehavior::Pending,
        });
        let mut stream = harness.run("fake").start_stream().await.expect("start");

        let abort = stream.abort_handle();
        let _ = stream.next_event().await;
        abort.abort();

        let mut saw_cancel = false;
        while let Some(event) = stream.next_event().await {
            if let PumpEvent::Error {
                error: RunFailure::Cancelled,
                ..
            } = event
            {
                saw_cancel = true;
                break;
            }
        }
        assert!(saw_cancel);
        assert!(matches!(
            stream.finish().await,
            Err(PumpError::RunFailed(RunFailure::Cancelled))
        ));
    }

    #[tokio::test]
    async fn malformed_first_coordinate_is_run_fatal() {
        let mut bad = coord();
        bad.run_id = None;
        let items = vec![Ok(SourceItem::Delta {
            coord: bad,
            delta: DeltaEvent::text("x"),
        })];
        let result = builder_with_items(items).collect_parts().await;
        assert!(matches!(
            result,
            Err(PumpError::RunFailed(RunFailure::Engine { .. }))
        ));
    }

    #[tokio::test]
    async fn malformed_later_coordinate_is_skipped() {
        let mut bad = coord();
        bad.namespace = None;
        let items = vec![
            text_item("keep "),
            Ok(SourceItem::Delta {
                coord: bad,
                delta: DeltaEvent::text("drop"),
            }),
            text_item("going"),
        ];
        let parts = builder_with_items(items).collect_parts().await.expect("parts");
        assert_eq!(parts_text(&parts), "keep going");
    }

    #[tokio::test]
    async fn provisional_id_before_content_does_not_duplicate_blocks() {
        let items = vec![
            Ok(SourceItem::ProvisionalMessageId {
                coord: coord(),
                message_id: MessageId::new("msg-1"),
            }),
            text_item("a"),
            text_item("b"),
        ];
        let mut stream = builder_with_items(items).start_stream().await.expect("start");

        let mut block_starts = 0;
        while let Some(event) = stream.next_event().await {
            if matches!(
                event,
                PumpEvent::Engine {
                    event: EngineEvent::BlockStarted { .. },
                    ..
                }
            ) {
                block_starts += 1;
            }
            if matches!(event, PumpEvent::Completed { .. }) {
                break;
            }
        }
        assert_eq!(block_starts, 1);
    }

    #[tokio::test]
    async fn empty_source_stream_completes_with_no_parts() {
        let parts = builder_with_items(vec![]).collect_parts().await.expect("parts");
        assert!(parts.is_empty());
    }
}
