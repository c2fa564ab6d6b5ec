//! Notification gateway seam.
//!
//! The engine never talks to providers directly; it hands (channel, target,
//! payload) to a [`NotificationGateway`] and records the returned
//! [`Delivery`]. Provider plumbing, timeouts included, lives behind the
//! trait so the dispatcher can be tested with a recording double.

pub mod webhook;

pub use webhook::WebhookGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{DeliveryStatus, EscalationChannel};

/// Message content handed to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub checkin_id: String,
    pub relationship_id: String,
    /// Display name of the person being checked in on.
    pub loved_one_name: String,
    /// Zero-based index of the escalation step this send belongs to.
    pub step_index: u32,
    /// Human-readable alert body.
    pub body: String,
}

/// Outcome of one send attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub status: DeliveryStatus,
    pub provider_message_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl Delivery {
    pub fn sent(provider_message_id: Option<String>) -> Self {
        Self {
            status: DeliveryStatus::Sent,
            provider_message_id,
            error_code: None,
            error_message: None,
        }
    }

    pub fn failed(error_code: &str, error_message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Failed,
            provider_message_id: None,
            error_code: Some(error_code.to_string()),
            error_message: Some(error_message.into()),
        }
    }
}

/// Capability-style send. Implementations own their timeout policy and
/// always resolve to a Delivery; transport problems come back as
/// `status = failed`, never as a panic or a hung future.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(
        &self,
        channel: EscalationChannel,
        target: &str,
        payload: &NotificationPayload,
    ) -> Delivery;
}
