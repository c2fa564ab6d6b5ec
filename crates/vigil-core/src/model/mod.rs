//! Domain model for the check-in engine.
//!
//! A [`Relationship`] is the aggregation root: it links an owner user to a
//! loved-one profile and owns a check-in schedule, an escalation plan, and
//! the stream of checkins and escalation events. Deleting a relationship
//! deletes everything underneath it.

pub mod escalation;
pub mod schedule;

pub use escalation::{
    DeliveryStatus, EscalationChannel, EscalationEvent, EscalationPlan, EscalationStep,
    DEFAULT_ESCALATION_STEPS,
};
pub use schedule::{
    Checkin, CheckinSchedule, CheckinStatus, ResponseMethod, ScheduleType,
    DEFAULT_GRACE_PERIOD_MINUTES, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL_MINUTES,
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Pairing codes expire this many minutes after generation.
pub const PAIRING_CODE_EXPIRY_MINUTES: i64 = 30;

/// Length of a generated pairing code.
pub const PAIRING_CODE_LENGTH: usize = 6;

/// Kind of family relation a loved-one profile represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Mother,
    Father,
    Child,
    Partner,
    Brother,
    Sister,
    Relative,
    Other,
}

/// Direction of a relationship: who checks in on whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipMode {
    OneWay,
    TwoWay,
}

/// Per-channel opt-in flags for a profile or contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredChannels {
    pub push: bool,
    pub whatsapp: bool,
    pub sms: bool,
    pub voice: bool,
    pub email: bool,
}

impl Default for PreferredChannels {
    fn default() -> Self {
        Self {
            push: true,
            whatsapp: false,
            sms: false,
            voice: false,
            email: false,
        }
    }
}

impl PreferredChannels {
    /// Whether this set of preferences allows the given channel.
    pub fn allows(&self, channel: EscalationChannel) -> bool {
        match channel {
            EscalationChannel::Push => self.push,
            EscalationChannel::Whatsapp => self.whatsapp,
            EscalationChannel::Sms => self.sms,
            EscalationChannel::Voice => self.voice,
            EscalationChannel::Email => self.email,
        }
    }
}

/// An account holder. Auth lives outside this crate; we only carry the
/// contact info and locale data the engine needs to resolve targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub phone_e164: Option<String>,
    pub full_name: String,
    /// Fixed UTC offset of the user's locale, in minutes.
    pub utc_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The person being checked in on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LovedOneProfile {
    pub id: String,
    pub owner_user_id: String,
    pub display_name: String,
    pub relationship_type: RelationshipType,
    pub preferred_channels: PreferredChannels,
    /// Fixed UTC offset of the loved one's locale, in minutes.
    /// Schedule local times are interpreted against this offset.
    pub utc_offset_minutes: i32,
    pub phone_e164: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link between an owner and a loved-one profile. Aggregation root for the
/// schedule, plan, checkins, and escalation events underneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub owner_user_id: String,
    pub loved_one_profile_id: String,
    pub mode: RelationshipMode,
    pub can_initiate_checkin: bool,
    pub can_receive_alerts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A secondary recipient for escalation steps that target an emergency
/// contact. Lower priority values are contacted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPoint {
    pub id: String,
    pub owner_user_id: String,
    pub display_name: String,
    pub phone_e164: Option<String>,
    pub email: Option<String>,
    pub preferred_channels: PreferredChannels,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactPoint {
    /// Contact identifier for the given channel, if this contact can
    /// receive it.
    pub fn target_for(&self, channel: EscalationChannel) -> Option<String> {
        if !self.preferred_channels.allows(channel) {
            return None;
        }
        match channel {
            EscalationChannel::Email => self.email.clone(),
            EscalationChannel::Push => None, // push targets a device token, not a contact point
            _ => self.phone_e164.clone(),
        }
    }
}

/// Push registration row. Registration itself happens in the mobile client;
/// the engine reads tokens as push targets and the privacy surface erases
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceToken {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub token: String,
    pub is_active: bool,
    pub last_registered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One-time code linking two users into a relationship. The pairing flow is
/// external; rows are carried for generation, expiry, and erasure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingCode {
    pub id: String,
    pub code: String,
    pub generated_by_user_id: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub status: PairingCodeStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingCodeStatus {
    Active,
    Used,
    Expired,
    Revoked,
}

impl PairingCode {
    /// Generate a fresh pairing code for a user.
    pub fn generate(generated_by_user_id: &str, now: DateTime<Utc>) -> Self {
        use rand::Rng;
        // 0/O and 1/I excluded to keep codes dictation-safe.
        const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
        let mut rng = rand::thread_rng();
        let code: String = (0..PAIRING_CODE_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code,
            generated_by_user_id: generated_by_user_id.to_string(),
            expires_at: now + Duration::minutes(PAIRING_CODE_EXPIRY_MINUTES),
            used_at: None,
            status: PairingCodeStatus::Active,
            created_at: now,
        }
    }

    /// Whether the code can still be redeemed at `now`.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.status == PairingCodeStatus::Active && now < self.expires_at
    }
}

/// Paid tier a subscription unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    OneWay,
    TwoWay,
    ProFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Expired,
}

/// Billing record for a user. Purchases happen through the store platforms;
/// the engine only reads the tier flag. Subscriptions survive domain
/// erasure and go away with the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub product_id: String,
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub external_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the subscription currently grants its tier.
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        let status_ok = matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        );
        let period_ok = self.current_period_end.map_or(true, |end| now < end);
        status_ok && period_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_channels_default_is_push_only() {
        let prefs = PreferredChannels::default();
        assert!(prefs.allows(EscalationChannel::Push));
        assert!(!prefs.allows(EscalationChannel::Sms));
        assert!(!prefs.allows(EscalationChannel::Voice));
    }

    #[test]
    fn contact_point_target_respects_channel() {
        let contact = ContactPoint {
            id: "c1".to_string(),
            owner_user_id: "u1".to_string(),
            display_name: "Sara".to_string(),
            phone_e164: Some("+971501234567".to_string()),
            email: Some("sara@example.com".to_string()),
            preferred_channels: PreferredChannels {
                push: false,
                whatsapp: true,
                sms: true,
                voice: false,
                email: true,
            },
            priority: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(
            contact.target_for(EscalationChannel::Sms).as_deref(),
            Some("+971501234567")
        );
        assert_eq!(
            contact.target_for(EscalationChannel::Email).as_deref(),
            Some("sara@example.com")
        );
        // Voice is opted out.
        assert!(contact.target_for(EscalationChannel::Voice).is_none());
    }

    #[test]
    fn entitlement_needs_live_status_and_period() {
        let now = Utc::now();
        let mut sub = Subscription {
            id: "sub1".to_string(),
            user_id: "u1".to_string(),
            platform: "ios".to_string(),
            product_id: "vigil.two_way.monthly".to_string(),
            tier: SubscriptionTier::TwoWay,
            status: SubscriptionStatus::Active,
            current_period_start: Some(now - Duration::days(10)),
            current_period_end: Some(now + Duration::days(20)),
            external_transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        assert!(sub.is_entitled(now));

        sub.status = SubscriptionStatus::Canceled;
        assert!(!sub.is_entitled(now));

        sub.status = SubscriptionStatus::Trialing;
        sub.current_period_end = Some(now - Duration::minutes(1));
        assert!(!sub.is_entitled(now));
    }

    #[test]
    fn pairing_code_expires() {
        let now = Utc::now();
        let code = PairingCode::generate("u1", now);
        assert_eq!(code.code.len(), PAIRING_CODE_LENGTH);
        assert!(code.is_redeemable(now));
        assert!(!code.is_redeemable(now + Duration::minutes(PAIRING_CODE_EXPIRY_MINUTES + 1)));
    }
}
