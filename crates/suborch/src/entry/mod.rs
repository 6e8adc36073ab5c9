//! Per-event entry point.
//!
//! [`EventHandler::handle`] is what a host calls for every inbound event. It
//! decodes the envelope, runs the pipeline, logs any recorded errors with full
//! context, encodes the response and publishes it on the request's response
//! topic. Only the result code and fixed output text cross the wire.

use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::codec::{self, CodecError};
use crate::deadline::Deadline;
use crate::handler::Orchestrator;
use crate::pipeline::{Dispatcher, PipelineOptions};
use crate::protocol::{Request, Response};
use crate::publish::{PublishError, PublisherCache, PublisherFactory, TopicName};
use crate::result::ActionResult;

/// Tracing target for the entry point.
pub(crate) const ENTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::entry");

/// Errors surfaced to the host.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The inbound event could not be decoded; no response was sent.
    #[error(transparent)]
    Decode(CodecError),
    /// The response could not be encoded.
    #[error(transparent)]
    Encode(CodecError),
    /// The response could not be published.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Glues decoding, dispatch and publishing together for one orchestrator.
#[derive(Debug)]
pub struct EventHandler<O> {
    orchestrator: O,
    dispatcher: Dispatcher,
    publishers: Option<PublisherCache>,
}

impl<O: Orchestrator> EventHandler<O> {
    /// Creates an entry point publishing through publishers from `factory`.
    #[must_use]
    pub fn new(orchestrator: O, factory: impl PublisherFactory + 'static) -> Self {
        Self {
            orchestrator,
            dispatcher: Dispatcher::default(),
            publishers: Some(PublisherCache::new(factory)),
        }
    }

    /// Creates an entry point that computes responses but never publishes.
    #[must_use]
    pub fn without_publisher(orchestrator: O) -> Self {
        Self {
            orchestrator,
            dispatcher: Dispatcher::default(),
            publishers: None,
        }
    }

    /// Replaces the pipeline options.
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.dispatcher = Dispatcher::new(options);
        self
    }

    /// The wrapped orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &O {
        &self.orchestrator
    }

    /// Handles one raw inbound event.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::Decode`] when the event cannot be decoded and
    /// [`EntryError::Publish`] when the response cannot be published.
    /// Handler failures are not errors here; they travel in the response.
    pub fn handle(&self, event: &[u8], deadline: &Deadline) -> Result<(), EntryError> {
        let request = codec::decode_event(event).map_err(|err| {
            error!(target: ENTRY_TARGET, error = %err, "failed to decode inbound event");
            EntryError::Decode(err)
        })?;
        self.handle_request(&request, deadline)
    }

    /// Handles an already decoded request.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::Encode`] or [`EntryError::Publish`] when the
    /// response cannot be delivered.
    pub fn handle_request(&self, request: &Request, deadline: &Deadline) -> Result<(), EntryError> {
        let span = info_span!(
            target: ENTRY_TARGET,
            "request",
            request_id = %request.metadata.request_id,
            context_id = request.metadata.context_id.as_deref().unwrap_or_default(),
            sender_id = request.sender.id,
            file_name = %request.origin.file_name,
            action = %request.action,
        );
        let _entered = span.enter();

        let result = self
            .dispatcher
            .process(&self.orchestrator, request, deadline);
        log_result(&result);

        let response = Response::from_result(&request.metadata, &result);
        let payload = codec::encode_response(&response).map_err(EntryError::Encode)?;

        let Some(publishers) = &self.publishers else {
            warn!(
                target: ENTRY_TARGET,
                "publishing is disabled, no response will be sent"
            );
            return Ok(());
        };
        self.publish(publishers, request, &payload, deadline)
            .map_err(|err| {
                error!(target: ENTRY_TARGET, error = %err, "failed to publish response");
                EntryError::Publish(err)
            })
    }

    fn publish(
        &self,
        publishers: &PublisherCache,
        request: &Request,
        payload: &[u8],
        deadline: &Deadline,
    ) -> Result<(), PublishError> {
        let topic = TopicName::parse(&request.response_topic, self.orchestrator.project_id())?;
        deadline.check()?;
        let publisher = publishers.get(&topic)?;
        let ack = publisher.publish(payload, deadline)?;
        debug!(
            target: ENTRY_TARGET,
            %topic,
            message_id = ack.message_id(),
            "response published"
        );
        Ok(())
    }
}

fn log_result(result: &ActionResult) {
    for recorded in result.errors() {
        error!(
            target: ENTRY_TARGET,
            error = %recorded,
            source = ?std::error::Error::source(recorded),
            defect = recorded.is_defect(),
            "internal error whilst processing request"
        );
    }
    info!(
        target: ENTRY_TARGET,
        code = %result.code(),
        creations = result.creations().len(),
        updates = result.updates().len(),
        deletions = result.deletions().len(),
        "request processed"
    );
}

#[cfg(test)]
mod tests;
