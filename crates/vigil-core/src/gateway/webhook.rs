//! Webhook-backed notification gateway.
//!
//! Each channel maps to a provider webhook endpoint from
//! [`GatewayConfig`]; sends are JSON POSTs bounded by the per-channel
//! timeout. A timeout or transport failure comes back as a failed
//! [`Delivery`], not an error -- retry policy belongs to the dispatcher.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::{Delivery, NotificationGateway, NotificationPayload};
use crate::model::EscalationChannel;
use crate::storage::GatewayConfig;

pub struct WebhookGateway {
    client: Client,
    config: GatewayConfig,
}

impl WebhookGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn post(
        &self,
        endpoint: &str,
        channel: EscalationChannel,
        target: &str,
        payload: &NotificationPayload,
    ) -> Delivery {
        let body = json!({
            "channel": channel.as_str(),
            "target": target,
            "payload": payload,
        });

        let timeout = Duration::from_secs(self.config.timeout_secs_for(channel.as_str()));
        let request = self.client.post(endpoint).json(&body).send();

        let response = match tokio::time::timeout(timeout, request).await {
            Err(_) => {
                return Delivery::failed(
                    "timeout",
                    format!("send on '{}' timed out after {}s", channel.as_str(), timeout.as_secs()),
                );
            }
            Ok(Err(e)) => return Delivery::failed("transport", e.to_string()),
            Ok(Ok(response)) => response,
        };

        if !response.status().is_success() {
            let status = response.status();
            return Delivery::failed("provider_rejected", format!("HTTP {status}"));
        }

        // Providers answer with an optional message id.
        let message_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("message_id").and_then(|id| id.as_str()).map(String::from));
        Delivery::sent(message_id)
    }
}

#[async_trait]
impl NotificationGateway for WebhookGateway {
    async fn send(
        &self,
        channel: EscalationChannel,
        target: &str,
        payload: &NotificationPayload,
    ) -> Delivery {
        let Some(endpoint) = self.config.endpoints.get(channel.as_str()).cloned() else {
            return Delivery::failed(
                "channel_not_configured",
                format!("no endpoint for channel '{}'", channel.as_str()),
            );
        };
        self.post(&endpoint, channel, target, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeliveryStatus;

    fn payload() -> NotificationPayload {
        NotificationPayload {
            checkin_id: "c1".to_string(),
            relationship_id: "r1".to_string(),
            loved_one_name: "Mama".to_string(),
            step_index: 0,
            body: "Mama has not checked in".to_string(),
        }
    }

    fn config_with(channel: &str, endpoint: String) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.endpoints.insert(channel.to_string(), endpoint);
        config
    }

    #[tokio::test]
    async fn successful_send_captures_message_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sms")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message_id": "prov-123"}"#)
            .create_async()
            .await;

        let gateway = WebhookGateway::new(config_with("sms", format!("{}/sms", server.url())));
        let delivery = gateway
            .send(EscalationChannel::Sms, "+971500000002", &payload())
            .await;

        mock.assert_async().await;
        assert_eq!(delivery.status, DeliveryStatus::Sent);
        assert_eq!(delivery.provider_message_id.as_deref(), Some("prov-123"));
    }

    #[tokio::test]
    async fn provider_error_is_a_failed_delivery() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/voice")
            .with_status(503)
            .create_async()
            .await;

        let gateway = WebhookGateway::new(config_with("voice", format!("{}/voice", server.url())));
        let delivery = gateway
            .send(EscalationChannel::Voice, "+971500000002", &payload())
            .await;

        assert_eq!(delivery.status, DeliveryStatus::Failed);
        assert_eq!(delivery.error_code.as_deref(), Some("provider_rejected"));
    }

    #[tokio::test]
    async fn unconfigured_channel_fails_without_network() {
        let gateway = WebhookGateway::new(GatewayConfig::default());
        let delivery = gateway
            .send(EscalationChannel::Email, "mama@example.com", &payload())
            .await;

        assert_eq!(delivery.status, DeliveryStatus::Failed);
        assert_eq!(delivery.error_code.as_deref(), Some("channel_not_configured"));
    }
}
