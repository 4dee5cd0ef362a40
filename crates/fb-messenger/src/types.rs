//! Send API request types
//!
//! A [`RequestBody`] carries a recipient and exactly one [`Payload`]: either a
//! [`Message`] or a [`SenderAction`]. The payload is flattened on the wire so
//! the body serializes as `{"recipient": .., "message": ..}` or
//! `{"recipient": .., "sender_action": ..}`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::error::MessengerError;

/// Message recipient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    /// Page-scoped user id (PSID)
    pub id: String,
}

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Typing indicators and read receipts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SenderAction {
    TypingOn,
    TypingOff,
    MarkSeen,
}

impl SenderAction {
    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderAction::TypingOn => "typing_on",
            SenderAction::TypingOff => "typing_off",
            SenderAction::MarkSeen => "mark_seen",
        }
    }
}

impl std::fmt::Display for SenderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SenderAction {
    type Err = MessengerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "typing_on" => Ok(SenderAction::TypingOn),
            "typing_off" => Ok(SenderAction::TypingOff),
            "mark_seen" => Ok(SenderAction::MarkSeen),
            other => Err(MessengerError::InvalidSenderAction(other.to_string())),
        }
    }
}

/// Attachment kinds accepted by the Send API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    Image,
    Audio,
    Video,
    File,
    Template,
}

/// Quick reply button
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuickReply {
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl QuickReply {
    /// Text quick reply
    pub fn text(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            title: Some(title.into()),
            payload: Some(payload.into()),
            image_url: None,
        }
    }
}

/// Message payload
///
/// The client does not validate the shape of a message; whatever JSON the
/// caller supplies is passed through as the `message` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Message(Value);

impl Message {
    /// Plain text message
    pub fn text(text: impl Into<String>) -> Self {
        Self(json!({ "text": text.into() }))
    }

    /// Attachment referenced by URL
    pub fn attachment(kind: AttachmentType, url: impl Into<String>) -> Self {
        Self(json!({
            "attachment": {
                "type": kind,
                "payload": { "url": url.into() }
            }
        }))
    }

    /// Structured template attachment
    pub fn template(payload: Value) -> Self {
        Self(json!({
            "attachment": {
                "type": AttachmentType::Template,
                "payload": payload
            }
        }))
    }

    /// Attach quick replies
    ///
    /// Only object messages can carry quick replies; any other raw value is
    /// returned unchanged and a warning is logged.
    pub fn with_quick_replies(mut self, replies: Vec<QuickReply>) -> Self {
        match &mut self.0 {
            Value::Object(map) => {
                // QuickReply only holds strings, serialization cannot fail
                let replies = serde_json::to_value(replies).unwrap_or(Value::Array(Vec::new()));
                map.insert("quick_replies".to_string(), replies);
            }
            other => warn!("Quick replies dropped: message is not a JSON object ({})", other),
        }
        self
    }

    /// Raw JSON view
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Exactly one of message or sender action
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Message(Message),
    SenderAction(SenderAction),
}

/// Why a message is being sent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagingType {
    Response,
    Update,
    MessageTag,
}

/// Push notification behaviour on the recipient's device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Regular,
    SilentPush,
    NoPush,
}

/// Send API request body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestBody {
    pub recipient: Recipient,
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messaging_type: Option<MessagingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<NotificationType>,
}

impl RequestBody {
    /// Body carrying a message
    pub fn message(recipient_id: impl Into<String>, message: Message) -> Self {
        Self::with_payload(recipient_id, Payload::Message(message))
    }

    /// Body carrying a sender action
    pub fn sender_action(recipient_id: impl Into<String>, action: SenderAction) -> Self {
        Self::with_payload(recipient_id, Payload::SenderAction(action))
    }

    fn with_payload(recipient_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            recipient: Recipient::new(recipient_id),
            payload,
            messaging_type: None,
            notification_type: None,
        }
    }

    pub fn messaging_type(mut self, messaging_type: MessagingType) -> Self {
        self.messaging_type = Some(messaging_type);
        self
    }

    pub fn notification_type(mut self, notification_type: NotificationType) -> Self {
        self.notification_type = Some(notification_type);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_shape() {
        let body = RequestBody::message("1234", Message::text("Hello"));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({ "recipient": { "id": "1234" }, "message": { "text": "Hello" } })
        );
    }

    #[test]
    fn test_sender_action_body_shape() {
        let body = RequestBody::sender_action("1234", SenderAction::TypingOn);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({ "recipient": { "id": "1234" }, "sender_action": "typing_on" })
        );
    }

    #[test]
    fn test_optional_fields() {
        let body = RequestBody::message("1", Message::text("hi"))
            .messaging_type(MessagingType::MessageTag)
            .notification_type(NotificationType::NoPush);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messaging_type"], "MESSAGE_TAG");
        assert_eq!(value["notification_type"], "NO_PUSH");
    }

    #[test]
    fn test_attachment_message() {
        let message = Message::attachment(AttachmentType::Image, "https://example.com/cat.png");
        assert_eq!(message.as_value()["attachment"]["type"], "image");
        assert_eq!(
            message.as_value()["attachment"]["payload"]["url"],
            "https://example.com/cat.png"
        );
    }

    #[test]
    fn test_quick_replies() {
        let message = Message::text("Pick one")
            .with_quick_replies(vec![QuickReply::text("Red", "PICK_RED")]);
        let replies = &message.as_value()["quick_replies"];
        assert_eq!(replies[0]["content_type"], "text");
        assert_eq!(replies[0]["payload"], "PICK_RED");
        assert!(replies[0].get("image_url").is_none());
    }

    #[test]
    fn test_quick_replies_on_non_object_leave_message_unchanged() {
        let message = Message::from(json!("x"))
            .with_quick_replies(vec![QuickReply::text("Red", "PICK_RED")]);
        assert_eq!(message.as_value(), &json!("x"));
    }

    #[test]
    fn test_raw_message_passes_through() {
        let raw = json!({ "text": "x", "metadata": { "anything": [1, 2] } });
        let message = Message::from(raw.clone());
        assert_eq!(serde_json::to_value(&message).unwrap(), raw);
    }

    #[test]
    fn test_sender_action_parse() {
        assert_eq!("mark_seen".parse::<SenderAction>().unwrap(), SenderAction::MarkSeen);
        assert!(matches!(
            "wave".parse::<SenderAction>(),
            Err(MessengerError::InvalidSenderAction(_))
        ));
        assert_eq!(SenderAction::TypingOff.to_string(), "typing_off");
    }
}
