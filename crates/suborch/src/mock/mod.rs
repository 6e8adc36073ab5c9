//! Builders and fakes for sub-orchestrator tests.
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for downstream crates testing their handlers.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use serde_json::value::to_raw_value;

use crate::codec::{self, EventEnvelope};
use crate::deadline::Deadline;
use crate::protocol::{
    Action, Endpoint, FileChanges, Manifests, Metadata, Origin, PullRequest, PullRequestState,
    REQUEST_API_VERSION, Repository, RepositoryPermission, Request, Resources, Response, Sender,
    SenderType, Visibility,
};
use crate::publish::{PublishAck, PublishError, Publisher, PublisherFactory, TopicName};

/// The default sender used by [`MockRequest`]: an admin user named `mockuser`.
#[must_use]
pub fn mock_sender() -> Sender {
    Sender {
        kind: SenderType::User,
        email: "mockuser@example.com".to_owned(),
        id: 1,
        username: "mockuser".to_owned(),
        permission: Some(RepositoryPermission::Admin),
    }
}

fn mock_origin() -> Origin {
    Origin {
        file_name: "mockfile.yaml".to_owned(),
        file_changes: FileChanges::default(),
        repository: Repository {
            id: 1,
            name: "mockrepo".to_owned(),
            full_name: "example/mockrepo".to_owned(),
            default_branch: "main".to_owned(),
            html_url: "https://github.com/example/mockrepo".to_owned(),
            visibility: Visibility::Public,
        },
        pull_request: PullRequest {
            id: 1,
            number: 1,
            state: PullRequestState::Open,
            title: "mock pull request".to_owned(),
            head_ref: "mockbranch".to_owned(),
            ..PullRequest::default()
        },
    }
}

/// Builder for requests carrying a given manifest.
#[derive(Debug, Clone)]
pub struct MockRequest {
    manifest: Value,
    old_manifest: Option<Value>,
    action: Action,
    sender: Sender,
    iam_url: String,
    response_topic: String,
    request_id: String,
    context_id: Option<String>,
}

impl MockRequest {
    /// Starts a `plan` request for `manifest`.
    #[must_use]
    pub fn new(manifest: Value) -> Self {
        Self {
            manifest,
            old_manifest: None,
            action: Action::Plan,
            sender: mock_sender(),
            iam_url: String::new(),
            response_topic: "mocktopic".to_owned(),
            request_id: "mockid".to_owned(),
            context_id: None,
        }
    }

    /// Sets the action.
    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Sets the sender.
    #[must_use]
    pub fn sender(mut self, sender: Sender) -> Self {
        self.sender = sender;
        self
    }

    /// Sets the authorisation lookup URL.
    #[must_use]
    pub fn iam_url(mut self, url: impl Into<String>) -> Self {
        self.iam_url = url.into();
        self
    }

    /// Sets the response topic.
    #[must_use]
    pub fn response_topic(mut self, topic: impl Into<String>) -> Self {
        self.response_topic = topic.into();
        self
    }

    /// Sets the request id.
    #[must_use]
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    /// Sets the context id.
    #[must_use]
    pub fn context_id(mut self, id: impl Into<String>) -> Self {
        self.context_id = Some(id.into());
        self
    }

    /// Sets the previous manifest.
    #[must_use]
    pub fn old_manifest(mut self, manifest: Value) -> Self {
        self.old_manifest = Some(manifest);
        self
    }

    /// Builds the request.
    ///
    /// # Panics
    ///
    /// Never in practice; JSON values always serialise.
    #[must_use]
    #[expect(
        clippy::expect_used,
        reason = "serialising an in-memory JSON value cannot fail"
    )]
    pub fn build(&self) -> Request {
        let new = to_raw_value(&self.manifest).expect("JSON value serialises");
        let old = self
            .old_manifest
            .as_ref()
            .map(|value| to_raw_value(value).expect("JSON value serialises"));
        Request {
            api_version: REQUEST_API_VERSION.to_owned(),
            metadata: Metadata {
                request_id: self.request_id.clone(),
                context_id: self.context_id.clone(),
            },
            resources: Resources {
                iam_lookup: Endpoint {
                    url: self.iam_url.clone(),
                },
            },
            response_topic: self.response_topic.clone(),
            action: self.action.clone(),
            origin: mock_origin(),
            sender: self.sender.clone(),
            manifest: Manifests { old, new },
        }
    }

    /// Encodes the request as raw JSON bytes.
    ///
    /// # Panics
    ///
    /// Never in practice; JSON values always serialise.
    #[must_use]
    #[expect(
        clippy::expect_used,
        reason = "requests contain only string-keyed maps and always serialise"
    )]
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).expect("request serialises")
    }

    /// Wraps the encoded request in a transport envelope.
    ///
    /// # Panics
    ///
    /// Never in practice; JSON values always serialise.
    #[must_use]
    #[expect(
        clippy::expect_used,
        reason = "envelopes contain only strings and always serialise"
    )]
    pub fn into_envelope(self) -> Vec<u8> {
        let mut envelope = EventEnvelope::wrap("sub", "id", &self.to_json());
        envelope.message.publish_time = "time".to_owned();
        serde_json::to_vec(&envelope).expect("envelope serialises")
    }
}

type Published = Arc<Mutex<Vec<(TopicName, Vec<u8>)>>>;

/// Publisher that records every payload it is given.
#[derive(Debug, Clone)]
pub struct RecordingPublisher {
    topic: TopicName,
    published: Published,
}

impl Publisher for RecordingPublisher {
    fn publish(&self, payload: &[u8], deadline: &Deadline) -> Result<PublishAck, PublishError> {
        deadline.check()?;
        let mut published = self
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        published.push((self.topic.clone(), payload.to_vec()));
        Ok(PublishAck::new(format!("recorded-{}", published.len())))
    }
}

/// Factory handing out [`RecordingPublisher`]s that share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisherFactory {
    published: Published,
    created: Arc<Mutex<Vec<TopicName>>>,
}

impl RecordingPublisherFactory {
    /// Creates a factory with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(topic, payload)` published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(TopicName, Vec<u8>)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Published payloads decoded as responses. Undecodable payloads are
    /// skipped.
    #[must_use]
    pub fn responses(&self) -> Vec<Response> {
        self.published()
            .iter()
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Decoded output text of every published response.
    #[must_use]
    pub fn outputs(&self) -> Vec<String> {
        self.responses()
            .iter()
            .filter_map(|response| codec::decode_output(&response.output).ok())
            .collect()
    }

    /// Topics a publisher was created for, in creation order.
    #[must_use]
    pub fn created(&self) -> Vec<TopicName> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PublisherFactory for RecordingPublisherFactory {
    fn create(&self, topic: &TopicName) -> Result<Arc<dyn Publisher>, PublishError> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(topic.clone());
        Ok(Arc::new(RecordingPublisher {
            topic: topic.clone(),
            published: Arc::clone(&self.published),
        }))
    }
}
