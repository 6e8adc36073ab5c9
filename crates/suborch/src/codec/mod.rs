//! Transport envelope decoding and response encoding.
//!
//! Requests arrive wrapped in a push-subscription envelope whose `data` field
//! carries the request JSON as base64. Responses go out as plain JSON with a
//! base64 `output` field.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{Request, Response};

/// Errors raised while decoding or encoding wire payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The transport envelope was not valid JSON of the expected shape.
    #[error("malformed event envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    /// The envelope `data` field was not valid base64.
    #[error("event data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The embedded request was not valid JSON of the expected shape.
    #[error("malformed request: {0}")]
    Request(#[source] serde_json::Error),
    /// A response could not be serialised.
    #[error("failed to encode response: {0}")]
    Response(#[source] serde_json::Error),
    /// Response output was not valid UTF-8 after decoding.
    #[error("response output is not valid UTF-8: {0}")]
    Output(#[from] std::string::FromUtf8Error),
}

/// Message carried inside an [`EventEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    /// Transport-assigned message id.
    #[serde(default)]
    pub message_id: String,
    /// Transport publish timestamp.
    #[serde(default)]
    pub publish_time: String,
    /// Transport attributes.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Base64-encoded request JSON.
    #[serde(default)]
    pub data: String,
}

/// Push-subscription wrapper around a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Subscription the message was delivered through.
    #[serde(default, alias = "Subscription")]
    pub subscription: String,
    /// Wrapped message.
    #[serde(alias = "Message")]
    pub message: EventMessage,
}

impl EventEnvelope {
    /// Wraps request bytes in an envelope.
    #[must_use]
    pub fn wrap(subscription: impl Into<String>, message_id: impl Into<String>, data: &[u8]) -> Self {
        Self {
            subscription: subscription.into(),
            message: EventMessage {
                message_id: message_id.into(),
                publish_time: String::new(),
                attributes: HashMap::new(),
                data: STANDARD.encode(data),
            },
        }
    }

    /// Decodes the base64 `data` field.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Base64`] when the field is not valid base64.
    pub fn data(&self) -> Result<Vec<u8>, CodecError> {
        Ok(STANDARD.decode(self.message.data.as_bytes())?)
    }
}

/// Unwraps an inbound event and decodes the request it carries.
///
/// # Errors
///
/// Returns a [`CodecError`] naming the layer that failed: envelope, base64
/// payload, or request JSON.
pub fn decode_event(event: &[u8]) -> Result<Request, CodecError> {
    let envelope: EventEnvelope = serde_json::from_slice(event).map_err(CodecError::Envelope)?;
    let data = envelope.data()?;
    decode_request(&data)
}

/// Decodes a request from raw JSON bytes.
///
/// # Errors
///
/// Returns [`CodecError::Request`] when the bytes do not hold a request.
pub fn decode_request(data: &[u8]) -> Result<Request, CodecError> {
    serde_json::from_slice(data).map_err(CodecError::Request)
}

/// Serialises a response for publishing.
///
/// # Errors
///
/// Returns [`CodecError::Response`] when serialisation fails.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(response).map_err(CodecError::Response)
}

/// Base64-encodes output text for the response `output` field.
#[must_use]
pub fn encode_output(output: &str) -> String {
    STANDARD.encode(output.as_bytes())
}

/// Decodes a response `output` field back into text.
///
/// # Errors
///
/// Returns [`CodecError::Base64`] or [`CodecError::Output`] when the field
/// does not hold base64-encoded UTF-8.
pub fn decode_output(output: &str) -> Result<String, CodecError> {
    let bytes = STANDARD.decode(output.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}
