//! Wire types exchanged with the orchestrator.
//!
//! A [`Request`] describes one manifest submission: who sent it, where it came
//! from, which action to run and the manifest itself. The manifest is kept as
//! raw JSON so handlers can decode it into their own typed shape; only its
//! [`ManifestHeader`] is read by the dispatcher. A [`Response`] carries the
//! result code and base64-encoded output back on the request's response
//! topic.

use std::fmt;

use serde::de::{self, DeserializeOwned, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::result::{ActionResult, ResultCode};

/// `apiVersion` stamped on every response.
pub const RESPONSE_API_VERSION: &str = "orchestrator/response/v1";

/// `apiVersion` carried by orchestrator requests.
pub const REQUEST_API_VERSION: &str = "orchestrator/request/v1";

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Action requested by the orchestrator.
///
/// Unknown tags decode into [`Action::Unrecognised`] so the dispatcher can
/// reject them with a routed error instead of failing the whole decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Compute the changes needed to reach the manifest.
    Plan,
    /// Compute the changes needed to remove the manifest's resources.
    PlanDestroy,
    /// Apply the manifest.
    Apply,
    /// Remove the manifest's resources.
    Destroy,
    /// Any other tag, preserved verbatim.
    Unrecognised(String),
}

impl Action {
    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plan => "plan",
            Self::PlanDestroy => "plan_destroy",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Unrecognised(tag) => tag,
        }
    }

    /// Returns `true` for the four supported actions.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unrecognised(_))
    }
}

impl From<String> for Action {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "plan" => Self::Plan,
            "plan_destroy" => Self::PlanDestroy,
            "apply" => Self::Apply,
            "destroy" => Self::Destroy,
            _ => Self::Unrecognised(tag),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Unrecognised(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `apiVersion`/`kind` pair every manifest starts with.
///
/// Only a JSON object decodes into a header; sequences are rejected even when
/// their elements would line up with the fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestHeader {
    /// Manifest schema version, for example `orchestrator/v1`.
    pub api_version: String,
    /// Manifest kind, for example `Bucket`.
    pub kind: String,
}

impl ManifestHeader {
    /// Creates a header from its parts.
    #[must_use]
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Reads the header from a raw manifest document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the document is not an object carrying
    /// string `apiVersion` and `kind` fields.
    pub fn from_manifest(manifest: &RawValue) -> Result<Self, serde_json::Error> {
        serde_json::from_str(manifest.get())
    }
}

impl<'de> Deserialize<'de> for ManifestHeader {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(HeaderVisitor)
    }
}

struct HeaderVisitor;

impl<'de> Visitor<'de> for HeaderVisitor {
    type Value = ManifestHeader;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a manifest object with string apiVersion and kind fields")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut api_version: Option<String> = None;
        let mut kind: Option<String> = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "apiVersion" if api_version.is_some() => {
                    return Err(de::Error::duplicate_field("apiVersion"));
                }
                "apiVersion" => api_version = Some(map.next_value()?),
                "kind" if kind.is_some() => return Err(de::Error::duplicate_field("kind")),
                "kind" => kind = Some(map.next_value()?),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(ManifestHeader {
            api_version: api_version.ok_or_else(|| de::Error::missing_field("apiVersion"))?,
            kind: kind.ok_or_else(|| de::Error::missing_field("kind"))?,
        })
    }
}

impl fmt::Display for ManifestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "apiVersion: {}\nkind: {}", self.api_version, self.kind)
    }
}

/// Metadata block handlers commonly embed in their own manifest types.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Stable identifier of the described resource.
    #[serde(default)]
    pub id: String,
}

/// Request and context identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Identifier echoed back in the response.
    pub request_id: String,
    /// Optional correlation id shared by related requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

/// Endpoint of an external service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    /// Base URL of the service.
    #[serde(default)]
    pub url: String,
}

/// External services a handler may consult.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    /// Authorisation lookup service.
    #[serde(default)]
    pub iam_lookup: Endpoint,
}

/// Links to the changed manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileChanges {
    /// Blob view URL.
    pub blob_url: String,
    /// Contents API URL.
    pub contents_url: String,
    /// Raw download URL.
    pub raw_url: String,
}

/// Visibility of the source repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to everyone.
    Public,
    /// Visible to collaborators only.
    #[default]
    Private,
    /// Visible inside the owning organisation.
    Internal,
}

/// Repository the manifest was submitted from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Repository {
    /// Numeric repository id.
    pub id: u64,
    /// Short name.
    pub name: String,
    /// `owner/name` form.
    pub full_name: String,
    /// Default branch name.
    pub default_branch: String,
    /// Web URL.
    pub html_url: String,
    /// Visibility.
    pub visibility: Visibility,
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    /// Still open.
    #[default]
    Open,
    /// Closed or merged.
    Closed,
}

/// Pull request the manifest change belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequest {
    /// Numeric pull request id.
    pub id: u64,
    /// Pull request number within the repository.
    pub number: u64,
    /// Lifecycle state.
    pub state: PullRequestState,
    /// Title.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Head branch.
    #[serde(rename = "ref")]
    pub head_ref: String,
    /// Web URL.
    pub html_url: String,
    /// Label names.
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
}

/// Provenance of the manifest. Opaque to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Origin {
    /// Path of the manifest file in the repository.
    pub file_name: String,
    /// Links to the changed file.
    pub file_changes: FileChanges,
    /// Source repository.
    pub repository: Repository,
    /// Pull request carrying the change.
    pub pull_request: PullRequest,
}

/// Whether the sender is a person or an automation account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    /// A human user.
    #[default]
    User,
    /// A bot account.
    Bot,
}

/// Sender's permission on the source repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryPermission {
    /// Full administrative access.
    Admin,
    /// Maintainer access.
    Maintain,
    /// Push access.
    Write,
    /// Triage access.
    Triage,
    /// Read-only access.
    Read,
}

/// Who submitted the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sender {
    /// Person or bot.
    #[serde(rename = "type")]
    pub kind: SenderType,
    /// Email address.
    #[serde(rename = "githubEmail", default)]
    pub email: String,
    /// Numeric account id.
    #[serde(rename = "githubId")]
    pub id: u64,
    /// Login name.
    #[serde(rename = "githubLogin", default)]
    pub username: String,
    /// Permission on the source repository, when known.
    #[serde(
        rename = "githubRepositoryPermission",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub permission: Option<RepositoryPermission>,
}

/// Current and previous manifest documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifests {
    /// Previous version, absent for new files.
    #[serde(default)]
    pub old: Option<Box<RawValue>>,
    /// Version to act on.
    pub new: Box<RawValue>,
}

impl Manifests {
    /// Wraps a new manifest with no previous version.
    #[must_use]
    pub const fn new(manifest: Box<RawValue>) -> Self {
        Self {
            old: None,
            new: manifest,
        }
    }

    /// Decodes the new manifest into a handler-specific type.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the document does not match `T`.
    pub fn decode_new<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.new.get())
    }

    /// Decodes the previous manifest, if any.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the document does not match `T`.
    pub fn decode_old<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.old
            .as_deref()
            .map(|raw| serde_json::from_str(raw.get()))
            .transpose()
    }

    /// Reads the header of the new manifest.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the header fields are missing or mistyped.
    pub fn header(&self) -> Result<ManifestHeader, serde_json::Error> {
        ManifestHeader::from_manifest(&self.new)
    }
}

/// A decoded orchestrator request. Immutable once decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Request schema version.
    pub api_version: String,
    /// Identifiers.
    pub metadata: Metadata,
    /// External services available to handlers.
    #[serde(default)]
    pub resources: Resources,
    /// Topic the response is published to.
    pub response_topic: String,
    /// Requested action.
    pub action: Action,
    /// Provenance of the manifest.
    #[serde(default)]
    pub origin: Origin,
    /// Submitter.
    pub sender: Sender,
    /// Manifest documents.
    pub manifest: Manifests,
}

/// Response published once the pipeline has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Response schema version.
    pub api_version: String,
    /// Identifiers copied from the request.
    pub metadata: Metadata,
    /// Outcome.
    pub result: ResultCode,
    /// Base64-encoded output text.
    pub output: String,
}

impl Response {
    /// Builds the response for `result`, echoing the request identifiers.
    #[must_use]
    pub fn from_result(metadata: &Metadata, result: &ActionResult) -> Self {
        Self {
            api_version: RESPONSE_API_VERSION.to_owned(),
            metadata: metadata.clone(),
            result: result.code(),
            output: crate::codec::encode_output(&result.output()),
        }
    }
}
