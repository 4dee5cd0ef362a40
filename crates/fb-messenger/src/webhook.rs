//! Webhook verification and event decoding

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::Messenger;
use crate::error::{MessengerError, Result};

/// `hub.*` parameters sent by Facebook when subscribing a webhook
///
/// Both the dotted wire names and their underscore forms are accepted.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct HubParams {
    #[serde(rename = "hub.mode", alias = "hub_mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", alias = "hub_verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", alias = "hub_challenge")]
    pub challenge: Option<String>,
}

impl HubParams {
    /// Build from raw query pairs
    ///
    /// Unlike the serde path, a query that carries both spellings of a key
    /// is accepted; the first occurrence wins and unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "hub.mode" | "hub_mode" => &mut params.mode,
                "hub.verify_token" | "hub_verify_token" => &mut params.verify_token,
                "hub.challenge" | "hub_challenge" => &mut params.challenge,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        params
    }
}

/// Result of [`Messenger::listen`]
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Verification handshake; answer with exactly this string and stop
    Challenge(String),
    /// Posted event body, decoded but otherwise untouched
    Event(Value),
}

impl Incoming {
    pub fn challenge(&self) -> Option<&str> {
        match self {
            Incoming::Challenge(c) => Some(c),
            Incoming::Event(_) => None,
        }
    }

    pub fn event(&self) -> Option<&Value> {
        match self {
            Incoming::Event(v) => Some(v),
            Incoming::Challenge(_) => None,
        }
    }

    /// Typed view of the event body
    pub fn payload(&self) -> Option<Result<WebhookPayload>> {
        self.event().map(WebhookPayload::from_value)
    }
}

impl Messenger {
    /// Handle an incoming webhook request
    ///
    /// A non-empty verify token equal to the configured one yields the
    /// challenge without looking at the body. Anything else decodes `body`
    /// as JSON.
    pub fn listen(&self, hub: &HubParams, body: &[u8]) -> Result<Incoming> {
        if let Some(token) = hub.verify_token.as_deref().filter(|t| !t.is_empty()) {
            if self.verify_token() == Some(token) {
                info!("Webhook verified successfully (mode: {:?})", hub.mode);
                return Ok(Incoming::Challenge(hub.challenge.clone().unwrap_or_default()));
            }
            warn!("Webhook verify token does not match");
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| MessengerError::InvalidPayload(e.to_string()))?;
        debug!("Decoded webhook body ({} bytes)", body.len());

        Ok(Incoming::Event(value))
    }
}

// =============================================================================
// Typed webhook payload
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

impl WebhookPayload {
    pub fn from_value(value: &Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| MessengerError::InvalidPayload(e.to_string()))
    }

    /// All messaging events across entries
    pub fn messaging_events(&self) -> impl Iterator<Item = &WebhookMessaging> {
        self.entry.iter().flat_map(|entry| entry.messaging.iter())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    /// Page id; Facebook sends it as a string, some tooling as a number
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<WebhookMessaging>,
}

/// Sender or recipient; checkbox plugin opt-ins carry `user_ref` instead of `id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookParticipant {
    pub id: Option<String>,
    pub user_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMessaging {
    pub sender: Option<WebhookParticipant>,
    pub recipient: Option<WebhookParticipant>,
    pub timestamp: Option<i64>,
    pub message: Option<WebhookMessage>,
    pub postback: Option<WebhookPostback>,
    pub read: Option<WebhookRead>,
    pub delivery: Option<WebhookDelivery>,
    pub optin: Option<Value>,
}

/// What a messaging event carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Echo,
    Postback,
    Read,
    Delivery,
    Other,
}

impl WebhookMessaging {
    pub fn kind(&self) -> EventKind {
        if let Some(message) = &self.message {
            if message.is_echo {
                EventKind::Echo
            } else {
                EventKind::Message
            }
        } else if self.postback.is_some() {
            EventKind::Postback
        } else if self.read.is_some() {
            EventKind::Read
        } else if self.delivery.is_some() {
            EventKind::Delivery
        } else {
            EventKind::Other
        }
    }

    pub fn sender_id(&self) -> Option<&str> {
        self.sender.as_ref().and_then(|s| s.id.as_deref())
    }

    /// Event time; Messenger timestamps are epoch milliseconds
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMessage {
    pub mid: Option<String>,
    pub text: Option<String>,
    pub quick_reply: Option<WebhookQuickReply>,
    #[serde(default)]
    pub attachments: Vec<WebhookAttachment>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuickReply {
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookAttachment {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPostback {
    pub title: Option<String>,
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookRead {
    pub watermark: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookDelivery {
    #[serde(default)]
    pub mids: Vec<String>,
    pub watermark: Option<i64>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
