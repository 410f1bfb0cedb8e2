//! Async pump around the synchronous segmentation engine.
//!
//! A [`StreamHarness`] holds registered [`source::DeltaSource`] adapters; a
//! run pulls one source's item stream, feeds each delta through a per-run
//! [`blockstream_core::StreamEngine`] on a single task, and forwards the
//! resulting block events to the consumer over a bounded channel.
//!
//! # Streaming a run
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use blockstream_harness::prelude::*;
//!
//! # struct MySource;
//! # #[async_trait::async_trait]
//! # impl blockstream_harness::source::DeltaSource for MySource {
//! #     fn id(&self) -> SourceId { SourceId::new("my-source") }
//! #     async fn start_stream(
//! #         &self,
//! #         _req: blockstream_harness::source::SourceRequest,
//! #     ) -> Result<blockstream_harness::source::DeltaStreamHandle, SourceError> {
//! #         unimplemented!()
//! #     }
//! # }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), PumpError> {
//! let harness = StreamHarness::builder()
//!     .register_source(Arc::new(MySource))
//!     .build()?;
//!
//! let mut stream = harness.run("my-source").start_stream().await?;
//! while let Some(event) = stream.next_event().await {
//!     if let PumpEvent::Engine { event, .. } = event {
//!         println!("{event:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Public error types used by the pump API.
pub mod errors;
/// Harness entry point and builder.
pub mod harness;
/// Common imports for typical usage.
pub mod prelude;
/// Run builder, streaming handle, and cancellation handle.
pub mod run;
/// Delta source contracts implemented by provider adapters.
pub mod source;

pub use errors::{PumpError, RunFailure, SourceError};
pub use harness::{StreamHarness, StreamHarnessBuilder};
pub use run::{AbortHandle, PumpEvent, RunBuilder, RunStream};
pub use source::{DeltaSource, DeltaStreamHandle, SourceId, SourceItem, SourceRequest};
