//! Extension points implemented by sub-orchestrators.
//!
//! A sub-orchestrator is an [`Orchestrator`] owning a [`HandlerRegistry`] of
//! [`ManifestHandler`]s, one per manifest `(apiVersion, kind)`. Both levels
//! may expose optional before and after hooks; an absent hook is skipped.

use crate::context::RequestContext;
use crate::error::HandlerResult;
use crate::protocol::{Action, ManifestHeader, Request};
use crate::registry::HandlerRegistry;
use crate::result::ActionResult;

/// Hook run before the handler action.
///
/// Finalizing the result here skips the remaining before hooks and the
/// action.
pub trait MiddlewareBefore: Send + Sync {
    /// Inspects the request and may finalize the result early.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline and is recorded against the result.
    fn before(
        &self,
        context: &mut RequestContext,
        request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult;
}

/// Hook run after the handler action.
pub trait MiddlewareAfter: Send + Sync {
    /// Observes or amends the result.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline and is recorded against the result.
    fn after(
        &self,
        context: &mut RequestContext,
        request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult;
}

/// Logic for one manifest `(apiVersion, kind)`.
///
/// Every action must finalize the result with `succeed` or `fail` exactly
/// once, unless a hook already did.
pub trait ManifestHandler: Send + Sync {
    /// Manifest `apiVersion` this handler accepts.
    fn api_version(&self) -> &str;

    /// Manifest `kind` this handler accepts.
    fn kind(&self) -> &str;

    /// Records the changes applying the manifest would make.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline with the `error` result code.
    fn plan(
        &self,
        context: &mut RequestContext,
        request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult;

    /// Records the changes destroying the manifest's resources would make.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline with the `error` result code.
    fn plan_destroy(
        &self,
        context: &mut RequestContext,
        request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult;

    /// Applies the manifest.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline with the `error` result code.
    fn apply(
        &self,
        context: &mut RequestContext,
        request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult;

    /// Destroys the manifest's resources.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline with the `error` result code.
    fn destroy(
        &self,
        context: &mut RequestContext,
        request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult;

    /// Handler-level before hook, if any.
    fn middleware_before(&self) -> Option<&dyn MiddlewareBefore> {
        None
    }

    /// Handler-level after hook, if any.
    fn middleware_after(&self) -> Option<&dyn MiddlewareAfter> {
        None
    }

    /// Header this handler is registered under.
    fn header(&self) -> ManifestHeader {
        ManifestHeader::new(self.api_version(), self.kind())
    }
}

/// Runs the handler method matching `action`.
///
/// Returns `None` for an unrecognised action so the caller can report it.
pub(crate) fn invoke_action(
    handler: &dyn ManifestHandler,
    action: &Action,
    context: &mut RequestContext,
    request: &Request,
    result: &mut ActionResult,
) -> Option<HandlerResult> {
    let outcome = match action {
        Action::Plan => handler.plan(context, request, result),
        Action::PlanDestroy => handler.plan_destroy(context, request, result),
        Action::Apply => handler.apply(context, request, result),
        Action::Destroy => handler.destroy(context, request, result),
        Action::Unrecognised(_) => return None,
    };
    Some(outcome)
}

/// A sub-orchestrator: its project, handlers and optional global hooks.
pub trait Orchestrator: Send + Sync {
    /// Project that bare response topics are published into.
    ///
    /// Usually the `project_id` of the loaded [`suborch_config::Config`].
    fn project_id(&self) -> &str;

    /// Registered manifest handlers.
    fn handlers(&self) -> &HandlerRegistry;

    /// Orchestrator-level before hook, if any.
    fn middleware_before(&self) -> Option<&dyn MiddlewareBefore> {
        None
    }

    /// Orchestrator-level after hook, if any.
    fn middleware_after(&self) -> Option<&dyn MiddlewareAfter> {
        None
    }
}
