use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CheckinStatus, DeliveryStatus, EscalationChannel, ResponseMethod};

/// Every state change the engine makes produces an Event.
/// The CLI prints them; tests assert on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The evaluator created a new pending checkin.
    CheckinCreated {
        checkin_id: String,
        schedule_id: String,
        relationship_id: String,
        due_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A response arrived while the checkin was pending.
    CheckinConfirmed {
        checkin_id: String,
        method: ResponseMethod,
        at: DateTime<Utc>,
    },
    CheckinSnoozed {
        checkin_id: String,
        snooze_until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A snooze elapsed and the checkin went back to pending.
    CheckinRearmed {
        checkin_id: String,
        at: DateTime<Utc>,
    },
    /// Grace period ran out without a response.
    EscalationStarted {
        checkin_id: String,
        relationship_id: String,
        at: DateTime<Utc>,
    },
    /// One escalation step was dispatched (or exhausted its retries).
    EscalationStepDispatched {
        checkin_id: String,
        step_index: u32,
        channel: EscalationChannel,
        target: String,
        status: DeliveryStatus,
        attempts: u32,
        at: DateTime<Utc>,
    },
    /// A response arrived after escalation had started.
    CheckinResolved {
        checkin_id: String,
        method: ResponseMethod,
        at: DateTime<Utc>,
    },
    /// Every step finished and nobody responded. Human follow-up required.
    CheckinEscalated {
        checkin_id: String,
        relationship_id: String,
        at: DateTime<Utc>,
    },
    CheckinCanceled {
        checkin_id: String,
        at: DateTime<Utc>,
    },
    /// Full status snapshot of one checkin, for polling clients.
    CheckinSnapshot {
        checkin_id: String,
        status: CheckinStatus,
        due_at: DateTime<Utc>,
        snooze_until: Option<DateTime<Utc>>,
        escalating_since: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
}
