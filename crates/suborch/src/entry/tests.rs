//! Unit tests for the event entry point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mockall::mock;
use mockall::predicate::always;
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::codec::decode_output;
use crate::mock::{MockRequest, RecordingPublisherFactory};
use crate::protocol::Action;
use crate::publish::{PublishAck, Publisher};
use crate::result::ResultCode;
use crate::tests::support::{Journal, ScriptedHandler, ScriptedOrchestrator, Step};

mock! {
    Transport {}
    impl Publisher for Transport {
        fn publish(&self, payload: &[u8], deadline: &Deadline) -> Result<PublishAck, PublishError>;
    }
}

struct SingleTransport(Arc<dyn Publisher>);

impl PublisherFactory for SingleTransport {
    fn create(&self, _topic: &TopicName) -> Result<Arc<dyn Publisher>, PublishError> {
        Ok(Arc::clone(&self.0))
    }
}

fn widget_orchestrator(step: Step) -> ScriptedOrchestrator {
    ScriptedOrchestrator::new("ent-demo").with_handler(ScriptedHandler::new(
        "v1",
        "Widget",
        step,
        Journal::default(),
    ))
}

fn widget_event() -> MockRequest {
    MockRequest::new(json!({"apiVersion": "v1", "kind": "Widget"}))
}

#[fixture]
fn recorder() -> RecordingPublisherFactory {
    RecordingPublisherFactory::new()
}

#[rstest]
fn publishes_response_to_resolved_topic(recorder: RecordingPublisherFactory) {
    let handler = EventHandler::new(
        widget_orchestrator(Step::changes(&["A"], &[], &[], "done")),
        recorder.clone(),
    );

    handler
        .handle(&widget_event().context_id("ctx-1").into_envelope(), &Deadline::none())
        .expect("event handled");

    let published = recorder.published();
    let [(topic, _)] = published.as_slice() else {
        panic!("expected one publication, got {}", published.len());
    };
    assert_eq!(topic, &TopicName::new("ent-demo", "mocktopic"));

    let responses = recorder.responses();
    let [response] = responses.as_slice() else {
        panic!("expected one response");
    };
    assert_eq!(response.result, ResultCode::Success);
    assert_eq!(response.metadata.request_id, "mockid");
    assert_eq!(response.metadata.context_id.as_deref(), Some("ctx-1"));
    assert_eq!(
        decode_output(&response.output).expect("decode output"),
        "done\nCreate:\n+ A\n"
    );
}

#[rstest]
fn qualified_topic_overrides_project(recorder: RecordingPublisherFactory) {
    let handler = EventHandler::new(widget_orchestrator(Step::succeed("done")), recorder.clone());
    let event = widget_event()
        .response_topic("projects/ent-other/topics/replies")
        .into_envelope();

    handler.handle(&event, &Deadline::none()).expect("event handled");

    assert_eq!(recorder.created(), [TopicName::new("ent-other", "replies")]);
}

#[rstest]
fn handler_errors_travel_in_response(recorder: RecordingPublisherFactory) {
    let handler = EventHandler::new(
        widget_orchestrator(Step::Error("secret detail".to_owned())),
        recorder.clone(),
    );

    handler
        .handle(&widget_event().action(Action::Apply).into_envelope(), &Deadline::none())
        .expect("handler errors are not entry errors");

    assert_eq!(recorder.outputs(), ["Internal error"]);
    assert!(recorder.published().iter().all(|(_, payload)| {
        !String::from_utf8_lossy(payload).contains("secret detail")
    }));
}

#[rstest]
fn decode_failure_sends_nothing(recorder: RecordingPublisherFactory) {
    let handler = EventHandler::new(widget_orchestrator(Step::succeed("done")), recorder.clone());

    let err = handler
        .handle(b"{not json", &Deadline::none())
        .expect_err("decode should fail");

    assert!(matches!(err, EntryError::Decode(CodecError::Envelope(_))));
    assert!(recorder.published().is_empty());
}

#[test]
fn disabled_publisher_still_succeeds() {
    let handler = EventHandler::without_publisher(widget_orchestrator(Step::succeed("done")));
    assert!(
        handler
            .handle(&widget_event().into_envelope(), &Deadline::none())
            .is_ok()
    );
}

#[rstest]
fn cancelled_deadline_surfaces_as_publish_error(recorder: RecordingPublisherFactory) {
    let handler = EventHandler::new(widget_orchestrator(Step::succeed("done")), recorder.clone());
    let deadline = Deadline::after(Duration::from_secs(30));
    deadline.cancel_handle().cancel();

    let err = handler
        .handle(&widget_event().into_envelope(), &deadline)
        .expect_err("cancelled invocation");

    assert!(matches!(err, EntryError::Publish(PublishError::Cancelled)));
    assert!(recorder.published().is_empty());
}

#[rstest]
fn expired_deadline_surfaces_as_publish_error(recorder: RecordingPublisherFactory) {
    let handler = EventHandler::new(widget_orchestrator(Step::succeed("done")), recorder);

    let err = handler
        .handle(&widget_event().into_envelope(), &Deadline::at(Instant::now()))
        .expect_err("expired invocation");

    assert!(matches!(err, EntryError::Publish(PublishError::DeadlineExceeded)));
}

#[test]
fn bare_topic_without_project_is_rejected() {
    let handler = EventHandler::new(
        ScriptedOrchestrator::new("").with_handler(ScriptedHandler::new(
            "v1",
            "Widget",
            Step::succeed("done"),
            Journal::default(),
        )),
        RecordingPublisherFactory::new(),
    );

    let err = handler
        .handle(&widget_event().into_envelope(), &Deadline::none())
        .expect_err("topic cannot resolve");

    assert!(matches!(
        err,
        EntryError::Publish(PublishError::InvalidTopic { .. })
    ));
}

#[test]
fn transport_errors_are_returned_to_host() {
    let mut transport = MockTransport::new();
    transport
        .expect_publish()
        .with(always(), always())
        .times(1)
        .returning(|_, _| {
            Err(PublishError::Transport {
                topic: "projects/ent-demo/topics/mocktopic".to_owned(),
                message: "unavailable".to_owned(),
            })
        });
    let handler = EventHandler::new(
        widget_orchestrator(Step::succeed("done")),
        SingleTransport(Arc::new(transport)),
    );

    let err = handler
        .handle(&widget_event().into_envelope(), &Deadline::none())
        .expect_err("transport failure");

    assert!(matches!(err, EntryError::Publish(PublishError::Transport { .. })));
}

#[test]
fn publisher_receives_the_invocation_deadline() {
    let mut transport = MockTransport::new();
    transport
        .expect_publish()
        .withf(|_, deadline| deadline.remaining().is_some())
        .times(1)
        .returning(|_, _| Ok(PublishAck::new("m-1")));
    let handler = EventHandler::new(
        widget_orchestrator(Step::succeed("done")),
        SingleTransport(Arc::new(transport)),
    );

    handler
        .handle(
            &widget_event().into_envelope(),
            &Deadline::after(Duration::from_secs(30)),
        )
        .expect("published");
}

#[rstest]
fn publisher_is_reused_across_events(recorder: RecordingPublisherFactory) {
    let handler = EventHandler::new(widget_orchestrator(Step::succeed("done")), recorder.clone());

    for id in ["first", "second"] {
        handler
            .handle(&widget_event().request_id(id).into_envelope(), &Deadline::none())
            .expect("event handled");
    }

    assert_eq!(recorder.created().len(), 1);
    let ids: Vec<String> = recorder
        .responses()
        .into_iter()
        .map(|response| response.metadata.request_id)
        .collect();
    assert_eq!(ids, ["first", "second"]);
}
