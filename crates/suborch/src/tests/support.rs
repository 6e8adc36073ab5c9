//! Scripted handlers and orchestrators shared by crate tests.

use std::sync::{Arc, Mutex, PoisonError};

use crate::context::RequestContext;
use crate::error::HandlerResult;
use crate::handler::{ManifestHandler, MiddlewareAfter, MiddlewareBefore, Orchestrator};
use crate::protocol::Request;
use crate::registry::HandlerRegistry;
use crate::result::ActionResult;

/// Ordered record of the stages that ran.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn record(&self, stage: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stage.to_owned());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// What a scripted stage does to the result.
#[derive(Debug, Clone, Default)]
pub(crate) enum Step {
    /// Leave the result alone.
    #[default]
    Nothing,
    /// Record changes then succeed.
    Succeed {
        create: Vec<String>,
        update: Vec<String>,
        delete: Vec<String>,
        summary: String,
    },
    /// Fail with a summary.
    Fail(String),
    /// Return an error.
    Error(String),
}

impl Step {
    pub(crate) fn succeed(summary: &str) -> Self {
        Self::Succeed {
            create: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
            summary: summary.to_owned(),
        }
    }

    pub(crate) fn changes(create: &[&str], update: &[&str], delete: &[&str], summary: &str) -> Self {
        let owned = |items: &[&str]| items.iter().map(|item| (*item).to_owned()).collect();
        Self::Succeed {
            create: owned(create),
            update: owned(update),
            delete: owned(delete),
            summary: summary.to_owned(),
        }
    }

    fn run(&self, result: &mut ActionResult) -> HandlerResult {
        match self {
            Self::Nothing => {}
            Self::Succeed {
                create,
                update,
                delete,
                summary,
            } => {
                result.create(create.clone());
                result.update(update.clone());
                result.delete(delete.clone());
                result.succeed(summary.clone());
            }
            Self::Fail(summary) => result.fail(summary.clone()),
            Self::Error(message) => return Err(message.clone().into()),
        }
        Ok(())
    }
}

/// A before/after hook that journals itself and runs a step.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedHook {
    name: &'static str,
    step: Step,
    journal: Journal,
}

impl ScriptedHook {
    pub(crate) const fn new(name: &'static str, step: Step, journal: Journal) -> Self {
        Self {
            name,
            step,
            journal,
        }
    }
}

impl MiddlewareBefore for ScriptedHook {
    fn before(
        &self,
        _context: &mut RequestContext,
        _request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult {
        self.journal.record(self.name);
        self.step.run(result)
    }
}

impl MiddlewareAfter for ScriptedHook {
    fn after(
        &self,
        _context: &mut RequestContext,
        _request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult {
        self.journal.record(self.name);
        self.step.run(result)
    }
}

/// Handler whose every action runs the same step.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedHandler {
    api_version: String,
    kind: String,
    step: Step,
    journal: Journal,
    before: Option<ScriptedHook>,
    after: Option<ScriptedHook>,
}

impl ScriptedHandler {
    pub(crate) fn new(api_version: &str, kind: &str, step: Step, journal: Journal) -> Self {
        Self {
            api_version: api_version.to_owned(),
            kind: kind.to_owned(),
            step,
            journal,
            before: None,
            after: None,
        }
    }

    pub(crate) fn with_before(mut self, step: Step) -> Self {
        self.before = Some(ScriptedHook::new("handler_before", step, self.journal.clone()));
        self
    }

    pub(crate) fn with_after(mut self, step: Step) -> Self {
        self.after = Some(ScriptedHook::new("handler_after", step, self.journal.clone()));
        self
    }

    fn act(&self, action: &str, result: &mut ActionResult) -> HandlerResult {
        self.journal.record(action);
        self.step.run(result)
    }
}

impl ManifestHandler for ScriptedHandler {
    fn api_version(&self) -> &str {
        &self.api_version
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn plan(
        &self,
        _context: &mut RequestContext,
        _request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult {
        self.act("plan", result)
    }

    fn plan_destroy(
        &self,
        _context: &mut RequestContext,
        _request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult {
        self.act("plan_destroy", result)
    }

    fn apply(
        &self,
        _context: &mut RequestContext,
        _request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult {
        self.act("apply", result)
    }

    fn destroy(
        &self,
        _context: &mut RequestContext,
        _request: &Request,
        result: &mut ActionResult,
    ) -> HandlerResult {
        self.act("destroy", result)
    }

    fn middleware_before(&self) -> Option<&dyn MiddlewareBefore> {
        self.before.as_ref().map(|hook| hook as &dyn MiddlewareBefore)
    }

    fn middleware_after(&self) -> Option<&dyn MiddlewareAfter> {
        self.after.as_ref().map(|hook| hook as &dyn MiddlewareAfter)
    }
}

/// Orchestrator with optional scripted global hooks.
#[derive(Debug, Default)]
pub(crate) struct ScriptedOrchestrator {
    pub(crate) project: String,
    pub(crate) registry: HandlerRegistry,
    pub(crate) before: Option<ScriptedHook>,
    pub(crate) after: Option<ScriptedHook>,
}

impl ScriptedOrchestrator {
    pub(crate) fn new(project: &str) -> Self {
        Self {
            project: project.to_owned(),
            ..Self::default()
        }
    }

    pub(crate) fn with_handler(mut self, handler: ScriptedHandler) -> Self {
        self.registry
            .register(handler)
            .expect("scripted handler has a complete header");
        self
    }
}

impl Orchestrator for ScriptedOrchestrator {
    fn project_id(&self) -> &str {
        &self.project
    }

    fn handlers(&self) -> &HandlerRegistry {
        &self.registry
    }

    fn middleware_before(&self) -> Option<&dyn MiddlewareBefore> {
        self.before.as_ref().map(|hook| hook as &dyn MiddlewareBefore)
    }

    fn middleware_after(&self) -> Option<&dyn MiddlewareAfter> {
        self.after.as_ref().map(|hook| hook as &dyn MiddlewareAfter)
    }
}
