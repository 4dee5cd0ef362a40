//! Facebook Messenger Graph API client

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::{BodyEncoding, MessengerConfig};
use crate::error::{MessengerError, Result};
use crate::service::MessageService;
use crate::types::{Message, RequestBody, SenderAction};

/// Send API path, relative to the Graph API base URL
pub const MESSAGES_PATH: &str = "me/messages";

/// HTTP method for [`Messenger::api`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    Get,
    #[default]
    Post,
}

/// A fully built Graph API request, before any I/O
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    /// Endpoint URL without query string
    pub endpoint: String,
    /// Body fields, `access_token` included
    pub params: Map<String, Value>,
    pub encoding: BodyEncoding,
}

impl PreparedRequest {
    /// Parameters flattened to string pairs
    ///
    /// Strings are sent as-is and every other value as its JSON text, so
    /// `recipient` becomes `{"id":"..."}`.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(key, value)| (key.clone(), form_value(value)))
            .collect()
    }

    /// Request URL; for GET every parameter is appended as a query parameter
    pub fn url(&self) -> Result<Url> {
        let parsed = match self.method {
            Method::Get => Url::parse_with_params(&self.endpoint, self.form_pairs()),
            Method::Post => Url::parse(&self.endpoint),
        };
        parsed.map_err(|e| MessengerError::Config(format!("Invalid Graph API URL {}: {}", self.endpoint, e)))
    }
}

fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Error object returned by the Graph API
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct GraphError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: i64,
    pub error_subcode: Option<i64>,
    pub fbtrace_id: Option<String>,
}

/// Decoded Graph API response
///
/// A non-2xx status is not an error by itself: the decoded body is kept
/// alongside the status and callers decide via [`ApiResponse::graph_error`]
/// or [`ApiResponse::into_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    status: u16,
    body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// Top-level field of the decoded body
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.get("message_id").and_then(Value::as_str)
    }

    pub fn recipient_id(&self) -> Option<&str> {
        self.get("recipient_id").and_then(Value::as_str)
    }

    /// The `error` field, if the Graph API returned one
    ///
    /// An `error` that is not a well-formed error object is still reported,
    /// with code 0 and the raw value as message.
    pub fn graph_error(&self) -> Option<GraphError> {
        let raw = self.get("error")?;
        let mut err: GraphError = serde_json::from_value(raw.clone()).unwrap_or_default();
        if err.message.is_empty() {
            err.message = match raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
        Some(err)
    }

    /// Fail on a Graph error object or a non-2xx status
    pub fn into_result(self) -> Result<Self> {
        if let Some(err) = self.graph_error() {
            return Err(MessengerError::Graph {
                code: err.code,
                kind: err.kind,
                message: err.message,
            });
        }

        if !self.is_success() {
            return Err(MessengerError::Status {
                status: self.status,
                body: self.body.to_string(),
            });
        }

        Ok(self)
    }
}

/// Facebook Messenger client
#[derive(Clone)]
pub struct Messenger {
    client: Client,
    config: MessengerConfig,
}

impl Messenger {
    /// Create a client with default settings
    pub fn new(access_token: &str, verify_token: Option<&str>) -> Result<Self> {
        Self::from_config(MessengerConfig::new(
            access_token,
            verify_token.map(str::to_string),
        ))
    }

    /// Create a client from configuration
    pub fn from_config(config: MessengerConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            return Err(MessengerError::AccessTokenNotSet);
        }

        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for Graph API requests");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    pub fn access_token(&self) -> &str {
        &self.config.access_token
    }

    pub fn set_access_token(&mut self, access_token: impl Into<String>) {
        self.config.access_token = access_token.into();
    }

    pub fn verify_token(&self) -> Option<&str> {
        self.config.verify_token.as_deref()
    }

    /// Set the webhook verify token; an empty token clears it
    pub fn set_verify_token(&mut self, verify_token: impl Into<String>) {
        let token = verify_token.into();
        self.config.verify_token = if token.is_empty() { None } else { Some(token) };
    }

    /// Message service bound to this client
    pub fn message(&self) -> MessageService<'_> {
        MessageService::new(self)
    }

    /// Send a message to a user
    pub async fn send(&self, recipient_id: &str, message: Message) -> Result<ApiResponse> {
        self.send_api(&RequestBody::message(recipient_id, message)).await
    }

    /// Send a typing indicator or read receipt to a user
    pub async fn sender_action(&self, recipient_id: &str, action: SenderAction) -> Result<ApiResponse> {
        self.send_api(&RequestBody::sender_action(recipient_id, action)).await
    }

    /// Dispatch a Send API body to `me/messages`
    pub async fn send_api(&self, body: &RequestBody) -> Result<ApiResponse> {
        debug!("Sending {:?} to {}", body.payload, body.recipient.id);
        self.api(MESSAGES_PATH, body, Method::Post).await
    }

    /// Build a Graph API request without sending it
    ///
    /// `body` must serialize to a JSON object (or null for no fields).
    /// `access_token` is always added, replacing any caller-supplied value.
    pub fn prepare<B>(&self, path: &str, body: &B, method: Method) -> Result<PreparedRequest>
    where
        B: Serialize + ?Sized,
    {
        let mut params = match serde_json::to_value(body)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(MessengerError::Serialization(format!(
                    "request body must be a JSON object, got {}",
                    other
                )));
            }
        };
        params.insert(
            "access_token".to_string(),
            Value::String(self.config.access_token.clone()),
        );

        Ok(PreparedRequest {
            method,
            endpoint: format!(
                "{}/{}",
                self.config.graph_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            params,
            encoding: self.config.encoding,
        })
    }

    /// Request to the Graph API
    pub async fn api<B>(&self, path: &str, body: &B, method: Method) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let prepared = self.prepare(path, body, method)?;
        self.dispatch(&prepared).await
    }

    /// Perform one HTTP request and decode the JSON response
    pub async fn dispatch(&self, prepared: &PreparedRequest) -> Result<ApiResponse> {
        let url = prepared.url()?;

        let request = match prepared.method {
            Method::Get => self.client.get(url),
            Method::Post => match prepared.encoding {
                BodyEncoding::Json => self.client.post(url).json(&prepared.params),
                BodyEncoding::Form => self.client.post(url).form(&prepared.form_pairs()),
            },
        };

        let response = request.send().await.map_err(|e| {
            error!("Graph API request to {} failed: {}", prepared.endpoint, e);
            MessengerError::Request(e.to_string())
        })?;

        let status = response.status();
        let text = response.text().await?;

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            error!("Graph API returned non-JSON body ({}): {}", status, e);
            MessengerError::Decode {
                status: status.as_u16(),
                message: e.to_string(),
            }
        })?;

        if status.is_success() {
            info!("Graph API request to {} succeeded", prepared.endpoint);
        } else {
            warn!("Graph API error: {} - {}", status, body);
        }

        Ok(ApiResponse::new(status.as_u16(), body))
    }
}
