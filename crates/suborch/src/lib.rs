//! Manifest dispatch and result ledger for sub-orchestrators.
//!
//! A sub-orchestrator receives change requests for typed resource manifests
//! (`plan`, `plan_destroy`, `apply` or `destroy`), routes each to the one
//! [`ManifestHandler`] registered for the manifest's `(apiVersion, kind)`, runs
//! the handler inside an ordered chain of optional middleware, and publishes
//! the outcome back to the orchestrator.
//!
//! # Architecture
//!
//! Data flows one way per inbound event:
//!
//! 1. [`EventHandler::handle`] decodes the transport envelope into a
//!    [`Request`] through the [`codec`].
//! 2. The [`Dispatcher`] matches the manifest header against the
//!    orchestrator's [`HandlerRegistry`], then runs the orchestrator and
//!    handler before hooks, the handler action, and the after hooks. Stages
//!    share a per-request [`RequestContext`] and record their outcome in an
//!    [`ActionResult`].
//! 3. The result is rendered into a [`Response`] whose code is derived from
//!    the ledger state and whose output is base64 text.
//! 4. The response is published through a [`Publisher`] taken from the
//!    [`PublisherCache`], which memoizes one handle per response topic.
//!
//! Handler and middleware failures never escape as errors: they are recorded
//! on the result, logged, and reported to the orchestrator with the `error`
//! code and a fixed message. Only decode and publish failures are returned to
//! the host.
//!
//! # Example
//!
//! ```rust,no_run
//! use suborch::{
//!     ActionResult, HandlerRegistry, HandlerResult, ManifestHandler, Orchestrator, Request,
//!     RequestContext,
//! };
//!
//! struct Buckets;
//!
//! impl ManifestHandler for Buckets {
//!     fn api_version(&self) -> &str { "orchestrator/v1" }
//!     fn kind(&self) -> &str { "Bucket" }
//!     fn plan(&self, _: &mut RequestContext, _: &Request, result: &mut ActionResult) -> HandlerResult {
//!         result.create("bucket logs");
//!         result.succeed("Plan complete");
//!         Ok(())
//!     }
//!     fn plan_destroy(&self, _: &mut RequestContext, _: &Request, result: &mut ActionResult) -> HandlerResult {
//!         result.succeed("Nothing to destroy");
//!         Ok(())
//!     }
//!     fn apply(&self, _: &mut RequestContext, _: &Request, result: &mut ActionResult) -> HandlerResult {
//!         result.create("bucket logs");
//!         result.succeed("Applied");
//!         Ok(())
//!     }
//!     fn destroy(&self, _: &mut RequestContext, _: &Request, result: &mut ActionResult) -> HandlerResult {
//!         result.succeed("Destroyed");
//!         Ok(())
//!     }
//! }
//!
//! struct Storage {
//!     project: String,
//!     handlers: HandlerRegistry,
//! }
//!
//! impl Orchestrator for Storage {
//!     fn project_id(&self) -> &str { &self.project }
//!     fn handlers(&self) -> &HandlerRegistry { &self.handlers }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = suborch_config::Config::load_validated()?;
//! let mut handlers = HandlerRegistry::new();
//! handlers.register(Buckets)?;
//! let storage = Storage {
//!     project: config.project_id().to_owned(),
//!     handlers,
//! };
//! # drop(storage);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod context;
pub mod deadline;
pub mod entry;
pub mod error;
pub mod handler;
pub mod iam;
pub mod pipeline;
pub mod protocol;
pub mod publish;
pub mod registry;
pub mod result;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use self::codec::CodecError;
pub use self::context::{ContextCache, RequestContext};
pub use self::deadline::{CancelHandle, Deadline, DeadlineError};
pub use self::entry::{EntryError, EventHandler};
pub use self::error::{
    DefectError, DispatchError, HandlerError, HandlerIdentity, HandlerResult, ResultError,
};
pub use self::handler::{ManifestHandler, MiddlewareAfter, MiddlewareBefore, Orchestrator};
pub use self::iam::{IamLookup, IamLookupError, StaticIamLookup};
pub use self::pipeline::{Dispatcher, EarlyLockPolicy, PipelineOptions, process};
pub use self::protocol::{Action, ManifestHeader, ManifestMetadata, Request, Response};
pub use self::publish::{
    PublishAck, PublishError, Publisher, PublisherCache, PublisherFactory, TopicName,
};
pub use self::registry::{HandlerRegistry, RegistryError};
pub use self::result::{ActionResult, Change, IntoChanges, ResultCode};
