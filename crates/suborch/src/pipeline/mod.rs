//! The pipeline dispatcher.
//!
//! [`Dispatcher::process`] runs one decoded request through the stages below,
//! in order, and returns the finished [`ActionResult`]:
//!
//! 1. match the manifest header against the orchestrator's handlers;
//! 2. orchestrator before hook;
//! 3. handler before hook;
//! 4. the handler action selected by the request's action tag;
//! 5. handler after hook;
//! 6. orchestrator after hook;
//! 7. finalization check.
//!
//! An error from any stage aborts the remaining stages and is recorded on the
//! result, which forces the `error` code. A before hook that finalizes the
//! result skips the action; which after hooks still run is governed by
//! [`EarlyLockPolicy`].

use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::deadline::Deadline;
use crate::error::{DefectError, DispatchError, HandlerError, HandlerIdentity};
use crate::handler::{ManifestHandler, Orchestrator, invoke_action};
use crate::protocol::Request;
use crate::result::ActionResult;

/// Tracing target for pipeline stages.
pub(crate) const PIPELINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pipeline");

/// What happens after a before hook finalizes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EarlyLockPolicy {
    /// Skip the remaining before hook, the action and the handler after
    /// hook, then run the orchestrator after hook.
    #[default]
    RunOrchestratorAfter,
    /// Skip the remaining before hook and the action; run both after hooks.
    RunAllAfterHooks,
    /// Stop the pipeline at once.
    SkipAfterHooks,
}

impl EarlyLockPolicy {
    const fn runs_handler_after(self) -> bool {
        matches!(self, Self::RunAllAfterHooks)
    }

    const fn runs_orchestrator_after(self) -> bool {
        !matches!(self, Self::SkipAfterHooks)
    }
}

/// Tunables for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineOptions {
    /// Behaviour after a before hook finalizes the result.
    pub early_lock: EarlyLockPolicy,
}

/// Runs requests through the middleware and handler pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    options: PipelineOptions,
}

impl Dispatcher {
    /// Creates a dispatcher with the given options.
    #[must_use]
    pub const fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Processes one request and returns its result.
    ///
    /// Never fails: every problem is recorded on the returned result.
    #[must_use]
    pub fn process<O>(&self, orchestrator: &O, request: &Request, deadline: &Deadline) -> ActionResult
    where
        O: Orchestrator + ?Sized,
    {
        let mut result = ActionResult::new();

        let header = match request.manifest.header() {
            Ok(header) => header,
            Err(source) => {
                result.push_error(DispatchError::MalformedManifest { source });
                return result;
            }
        };

        let Some(handler) = orchestrator.handlers().find(&header) else {
            debug!(
                target: PIPELINE_TARGET,
                api_version = %header.api_version,
                kind = %header.kind,
                "no handler matches manifest header"
            );
            result.fail(orchestrator.handlers().unmatched_message(&header));
            return result;
        };

        let identity = HandlerIdentity::new(
            header.api_version,
            header.kind,
            request.action.as_str(),
        );
        let outcome = Run {
            orchestrator,
            handler,
            request,
            identity,
            policy: self.options.early_lock,
            context: RequestContext::new(deadline.clone()),
            result: &mut result,
        }
        .execute();
        if let Err(error) = outcome {
            debug!(target: PIPELINE_TARGET, stage = error.stage(), "pipeline aborted");
            result.push_error(error);
        }
        result
    }
}

/// Processes `request` with default options.
#[must_use]
pub fn process<O>(orchestrator: &O, request: &Request, deadline: &Deadline) -> ActionResult
where
    O: Orchestrator + ?Sized,
{
    Dispatcher::default().process(orchestrator, request, deadline)
}

struct Run<'a, O: ?Sized> {
    orchestrator: &'a O,
    handler: &'a dyn ManifestHandler,
    request: &'a Request,
    identity: HandlerIdentity,
    policy: EarlyLockPolicy,
    context: RequestContext,
    result: &'a mut ActionResult,
}

impl<O: Orchestrator + ?Sized> Run<'_, O> {
    fn execute(&mut self) -> Result<(), DispatchError> {
        if !self.request.action.is_known() {
            return Err(DispatchError::invalid_action(self.request.action.as_str()));
        }

        let locked_early = self.run_before_hooks()?;
        if locked_early {
            debug!(
                target: PIPELINE_TARGET,
                policy = ?self.policy,
                "result finalized by before hook; skipping action"
            );
        } else {
            self.run_action()?;
        }

        if !locked_early || self.policy.runs_handler_after() {
            self.run_handler_after()?;
        }
        if !locked_early || self.policy.runs_orchestrator_after() {
            self.run_orchestrator_after()?;
        }

        if !self.result.is_locked() {
            warn!(
                target: PIPELINE_TARGET,
                handler = %self.identity,
                "pipeline finished without finalizing the result"
            );
            self.result.push_error(DefectError::UnfinalizedResult {
                identity: self.identity.clone(),
            });
        }
        Ok(())
    }

    /// Returns `true` when a before hook finalized the result.
    fn run_before_hooks(&mut self) -> Result<bool, DispatchError> {
        if let Some(hook) = self.orchestrator.middleware_before() {
            debug!(target: PIPELINE_TARGET, "running orchestrator before hook");
            hook.before(&mut self.context, self.request, self.result)
                .map_err(|source| self.orchestrator_error(source, true))?;
            if self.result.is_locked() {
                return Ok(true);
            }
        }
        if let Some(hook) = self.handler.middleware_before() {
            debug!(target: PIPELINE_TARGET, "running handler before hook");
            hook.before(&mut self.context, self.request, self.result)
                .map_err(|source| DispatchError::HandlerBefore {
                    identity: self.identity.clone(),
                    source,
                })?;
            if self.result.is_locked() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn run_action(&mut self) -> Result<(), DispatchError> {
        debug!(target: PIPELINE_TARGET, handler = %self.identity, "invoking handler action");
        let outcome = invoke_action(
            self.handler,
            &self.request.action,
            &mut self.context,
            self.request,
            self.result,
        )
        .ok_or_else(|| DispatchError::invalid_action(self.request.action.as_str()))?;
        outcome.map_err(|source| DispatchError::Action {
            identity: self.identity.clone(),
            source,
        })
    }

    fn run_handler_after(&mut self) -> Result<(), DispatchError> {
        let Some(hook) = self.handler.middleware_after() else {
            return Ok(());
        };
        debug!(target: PIPELINE_TARGET, "running handler after hook");
        hook.after(&mut self.context, self.request, self.result)
            .map_err(|source| DispatchError::HandlerAfter {
                identity: self.identity.clone(),
                source,
            })
    }

    fn run_orchestrator_after(&mut self) -> Result<(), DispatchError> {
        let Some(hook) = self.orchestrator.middleware_after() else {
            return Ok(());
        };
        debug!(target: PIPELINE_TARGET, "running orchestrator after hook");
        hook.after(&mut self.context, self.request, self.result)
            .map_err(|source| self.orchestrator_error(source, false))
    }

    fn orchestrator_error(&self, source: HandlerError, before: bool) -> DispatchError {
        let project = self.orchestrator.project_id().to_owned();
        if before {
            DispatchError::OrchestratorBefore { project, source }
        } else {
            DispatchError::OrchestratorAfter { project, source }
        }
    }
}
