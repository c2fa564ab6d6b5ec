//! Escalation plans and dispatch events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default plan applied when a relationship is created without one.
pub const DEFAULT_ESCALATION_STEPS: [(EscalationChannel, u32); 4] = [
    (EscalationChannel::Push, 0),
    (EscalationChannel::Whatsapp, 10),
    (EscalationChannel::Sms, 20),
    (EscalationChannel::Voice, 30),
];

/// Outbound notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationChannel {
    Push,
    Whatsapp,
    Sms,
    Voice,
    Email,
}

impl EscalationChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationChannel::Push => "push",
            EscalationChannel::Whatsapp => "whatsapp",
            EscalationChannel::Sms => "sms",
            EscalationChannel::Voice => "voice",
            EscalationChannel::Email => "email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "push" => Some(EscalationChannel::Push),
            "whatsapp" => Some(EscalationChannel::Whatsapp),
            "sms" => Some(EscalationChannel::Sms),
            "voice" => Some(EscalationChannel::Voice),
            "email" => Some(EscalationChannel::Email),
            _ => None,
        }
    }
}

/// One (channel, delay) pair in an ordered plan. `delay_min` counts from the
/// moment the checkin entered `escalating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationStep {
    pub channel: EscalationChannel,
    pub delay_min: u32,
}

/// Ordered escalation plan owned by one relationship. At most one plan per
/// relationship is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPlan {
    pub id: String,
    pub relationship_id: String,
    pub plan_name: String,
    pub steps: Vec<EscalationStep>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscalationPlan {
    /// Default four-step plan for a relationship.
    pub fn default_for(relationship_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            relationship_id: relationship_id.to_string(),
            plan_name: "Default".to_string(),
            steps: DEFAULT_ESCALATION_STEPS
                .iter()
                .map(|&(channel, delay_min)| EscalationStep { channel, delay_min })
                .collect(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate: at least one step, delays non-decreasing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.steps.is_empty() {
            return Err(ValidationError::EmptyCollection(
                "escalation plan steps".to_string(),
            ));
        }
        let mut previous = 0u32;
        for (index, step) in self.steps.iter().enumerate() {
            if step.delay_min < previous {
                return Err(ValidationError::StepsOutOfOrder {
                    index,
                    delay_min: step.delay_min,
                    previous,
                });
            }
            previous = step.delay_min;
        }
        Ok(())
    }
}

/// Delivery status of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Queued,
    Sent,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    /// Whether the step is finished, successfully or not. The dispatcher
    /// only advances past terminal steps.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Sent | DeliveryStatus::Delivered | DeliveryStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Queued => "queued",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => DeliveryStatus::Sent,
            "delivered" => DeliveryStatus::Delivered,
            "failed" => DeliveryStatus::Failed,
            _ => DeliveryStatus::Queued,
        }
    }
}

/// One dispatch record for one step of one checkin. At most one event per
/// (checkin_id, step_index); `attempts` counts retries within the step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub id: String,
    pub checkin_id: String,
    pub step_index: u32,
    pub channel: EscalationChannel,
    pub target: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub provider_message_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EscalationEvent {
    /// Queued event for a step about to be attempted.
    pub fn queued(
        checkin_id: &str,
        step_index: u32,
        channel: EscalationChannel,
        target: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            checkin_id: checkin_id.to_string(),
            step_index,
            channel,
            target: target.to_string(),
            status: DeliveryStatus::Queued,
            attempts: 0,
            provider_message_id: None,
            error_code: None,
            error_message: None,
            sent_at: None,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_matches_product_defaults() {
        let plan = EscalationPlan::default_for("r1", Utc::now());
        assert!(plan.validate().is_ok());
        assert_eq!(plan.steps.len(), 4);
        assert_eq!(plan.steps[0].channel, EscalationChannel::Push);
        assert_eq!(plan.steps[0].delay_min, 0);
        assert_eq!(plan.steps[3].channel, EscalationChannel::Voice);
        assert_eq!(plan.steps[3].delay_min, 30);
    }

    #[test]
    fn validate_rejects_decreasing_delays() {
        let mut plan = EscalationPlan::default_for("r1", Utc::now());
        plan.steps[2].delay_min = 5;
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("non-decreasing"));
    }

    #[test]
    fn validate_rejects_empty_plan() {
        let mut plan = EscalationPlan::default_for("r1", Utc::now());
        plan.steps.clear();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn equal_delays_are_allowed() {
        let mut plan = EscalationPlan::default_for("r1", Utc::now());
        plan.steps[1].delay_min = plan.steps[0].delay_min;
        assert!(plan.validate().is_ok());
    }
}
