//! fb-messenger: Facebook Messenger Platform client
//!
//! Builds Send API request bodies, signs them with a page access token,
//! dispatches them to the Graph API, and handles webhook verification and
//! event decoding.

pub mod api;
pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod types;
pub mod webhook;

pub use api::{ApiResponse, Messenger, Method};
pub use config::{BodyEncoding, MessengerConfig};
pub use error::{MessengerError, Result};
pub use server::{EventHandler, WebhookState};
pub use service::MessageService;
pub use types::{Message, RequestBody, SenderAction};
pub use webhook::{HubParams, Incoming};
