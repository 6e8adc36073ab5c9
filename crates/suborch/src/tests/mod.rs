//! Crate-level integration and BDD tests.

use serde_json::json;
use suborch_config::Config;

use crate::deadline::Deadline;
use crate::entry::EventHandler;
use crate::mock::{MockRequest, RecordingPublisherFactory};
use crate::protocol::{Action, RESPONSE_API_VERSION};
use crate::publish::TopicName;
use crate::result::ResultCode;

pub(crate) mod support;


use support::{Journal, ScriptedHandler, ScriptedHook, ScriptedOrchestrator, Step};

#[test]
fn end_to_end_event_with_hooks() {
    let journal = Journal::default();
    let mut orchestrator = ScriptedOrchestrator::new("ent-demo").with_handler(
        ScriptedHandler::new(
            "v1",
            "Widget",
            Step::changes(&[], &[], &["old bucket"], "Destroyed"),
            journal.clone(),
        )
        .with_before(Step::Nothing),
    );
    orchestrator.after = Some(ScriptedHook::new(
        "orchestrator_after",
        Step::Nothing,
        journal.clone(),
    ));
    let recorder = RecordingPublisherFactory::new();
    let handler = EventHandler::new(orchestrator, recorder.clone());
    let event = MockRequest::new(json!({"apiVersion": "v1", "kind": "Widget"}))
        .action(Action::Destroy)
        .request_id("req-9")
        .into_envelope();

    handler
        .handle(&event, &Deadline::none())
        .expect("event handled");

    assert_eq!(
        journal.entries(),
        ["handler_before", "destroy", "orchestrator_after"]
    );
    let responses = recorder.responses();
    let [response] = responses.as_slice() else {
        panic!("expected one response, got {}", responses.len());
    };
    assert_eq!(response.api_version, RESPONSE_API_VERSION);
    assert_eq!(response.metadata.request_id, "req-9");
    assert_eq!(response.result, ResultCode::Success);
    assert_eq!(recorder.outputs(), ["Destroyed\nDelete:\n- old bucket\n"]);
}

#[test]
fn configured_project_qualifies_bare_topics() {
    let config = Config {
        project_id: "ent-configured".to_owned(),
        ..Config::default()
    };
    let orchestrator = ScriptedOrchestrator::new(config.project_id()).with_handler(
        ScriptedHandler::new("v1", "Widget", Step::succeed("done"), Journal::default()),
    );
    let recorder = RecordingPublisherFactory::new();
    let handler = EventHandler::new(orchestrator, recorder.clone());
    let event = MockRequest::new(json!({"apiVersion": "v1", "kind": "Widget"}))
        .response_topic("replies")
        .into_envelope();

    handler
        .handle(&event, &Deadline::none())
        .expect("event handled");

    assert_eq!(
        recorder.created(),
        [TopicName::new("ent-configured", "replies")]
    );
}
