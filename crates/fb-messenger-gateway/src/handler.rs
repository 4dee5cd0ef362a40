//! Event handler that logs incoming messaging events

use async_trait::async_trait;
use tracing::{debug, info};

use fb_messenger::Result;
use fb_messenger::server::EventHandler;
use fb_messenger::webhook::{EventKind, WebhookMessaging};

/// Logs every messaging event it receives
#[derive(Debug, Default)]
pub struct LoggingHandler;

/// One-line description of a messaging event
pub fn describe(event: &WebhookMessaging) -> String {
    let sender = event.sender_id().unwrap_or("unknown");

    match event.kind() {
        EventKind::Message => {
            let text = event
                .message
                .as_ref()
                .and_then(|m| m.text.as_deref())
                .unwrap_or("<attachment>");
            format!("message from {}: {}", sender, text)
        }
        EventKind::Echo => format!("echo of page message to {}", sender),
        EventKind::Postback => {
            let payload = event
                .postback
                .as_ref()
                .and_then(|p| p.payload.as_deref())
                .unwrap_or("");
            format!("postback from {}: {}", sender, payload)
        }
        EventKind::Read => format!("read receipt from {}", sender),
        EventKind::Delivery => format!("delivery receipt from {}", sender),
        EventKind::Other => format!("unhandled event from {}", sender),
    }
}

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle_event(&self, event: &WebhookMessaging) -> Result<()> {
        info!("{}", describe(event));
        debug!("Event timestamp: {:?}", event.sent_at());
        Ok(())
    }
}
