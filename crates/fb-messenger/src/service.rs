//! Message service
//!
//! Shortcuts over [`Messenger::send`] and [`Messenger::sender_action`],
//! reached through [`Messenger::message`].

use crate::api::{ApiResponse, Messenger};
use crate::error::Result;
use crate::types::{AttachmentType, Message, QuickReply, SenderAction};

/// Message service bound to a [`Messenger`]
#[derive(Clone, Copy)]
pub struct MessageService<'a> {
    messenger: &'a Messenger,
}

impl<'a> MessageService<'a> {
    pub(crate) fn new(messenger: &'a Messenger) -> Self {
        Self { messenger }
    }

    /// Send a plain text message
    pub async fn text(&self, recipient_id: &str, text: &str) -> Result<ApiResponse> {
        self.messenger.send(recipient_id, Message::text(text)).await
    }

    /// Send an attachment by URL
    pub async fn attachment(
        &self,
        recipient_id: &str,
        kind: AttachmentType,
        url: &str,
    ) -> Result<ApiResponse> {
        self.messenger
            .send(recipient_id, Message::attachment(kind, url))
            .await
    }

    /// Send a text message with quick reply buttons
    pub async fn quick_replies(
        &self,
        recipient_id: &str,
        text: &str,
        replies: Vec<QuickReply>,
    ) -> Result<ApiResponse> {
        let message = Message::text(text).with_quick_replies(replies);
        self.messenger.send(recipient_id, message).await
    }

    pub async fn typing_on(&self, recipient_id: &str) -> Result<ApiResponse> {
        self.messenger
            .sender_action(recipient_id, SenderAction::TypingOn)
            .await
    }

    pub async fn typing_off(&self, recipient_id: &str) -> Result<ApiResponse> {
        self.messenger
            .sender_action(recipient_id, SenderAction::TypingOff)
            .await
    }

    pub async fn mark_seen(&self, recipient_id: &str) -> Result<ApiResponse> {
        self.messenger
            .sender_action(recipient_id, SenderAction::MarkSeen)
            .await
    }
}
