//! Data portability and erasure.
//!
//! Two user-facing operations over the whole data set of one owner:
//!
//! - [`export_user_data`] produces a self-contained JSON bundle of every
//!   row the owner can see, suitable for a data-portability download.
//! - [`erase_domain_data`] / [`erase_account`] delete the owner's rows in
//!   one transaction, child tables first. Domain erasure keeps the user
//!   row itself so the account survives with a clean slate.
//!
//! Both operations are idempotent: exporting twice yields equivalent
//! bundles, erasing twice deletes nothing the second time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, DatabaseError, Result};
use crate::model::{
    Checkin, CheckinSchedule, ContactPoint, DeviceToken, EscalationEvent, EscalationPlan,
    LovedOneProfile, PairingCode, Relationship, Subscription, User,
};
use crate::storage::{EraseSummary, Store};

pub const EXPORT_VERSION: &str = "1.0";

/// Everything belonging to one owner, flattened per table.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub export_version: String,
    pub exported_at: DateTime<Utc>,
    pub user: User,
    pub loved_one_profiles: Vec<LovedOneProfile>,
    pub relationships: Vec<Relationship>,
    pub checkin_schedules: Vec<CheckinSchedule>,
    pub checkins: Vec<Checkin>,
    pub escalation_plans: Vec<EscalationPlan>,
    pub escalation_events: Vec<EscalationEvent>,
    pub contact_points: Vec<ContactPoint>,
    pub subscriptions: Vec<Subscription>,
    pub device_tokens: Vec<DeviceToken>,
    pub pairing_codes: Vec<PairingCode>,
}

/// Collect the owner's full data set into an export bundle.
pub fn export_user_data(store: &Store, user_id: &str, now: DateTime<Utc>) -> Result<ExportBundle> {
    let user = store.get_user(user_id)?.ok_or_else(|| {
        CoreError::Database(DatabaseError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })
    })?;

    let relationships = store.list_relationships_by_owner(user_id)?;

    let mut checkin_schedules = Vec::new();
    let mut checkins = Vec::new();
    let mut escalation_plans = Vec::new();
    let mut escalation_events = Vec::new();
    for relationship in &relationships {
        checkin_schedules.extend(store.list_schedules_by_relationship(&relationship.id)?);
        let relationship_checkins = store.list_checkins_by_relationship(&relationship.id)?;
        for checkin in &relationship_checkins {
            escalation_events.extend(store.list_events_for_checkin(&checkin.id)?);
        }
        checkins.extend(relationship_checkins);
        escalation_plans.extend(store.list_plans_by_relationship(&relationship.id)?);
    }

    Ok(ExportBundle {
        export_version: EXPORT_VERSION.to_string(),
        exported_at: now,
        user,
        loved_one_profiles: store.list_profiles_by_owner(user_id)?,
        relationships,
        checkin_schedules,
        checkins,
        escalation_plans,
        escalation_events,
        contact_points: store.list_contact_points(user_id)?,
        subscriptions: store.list_subscriptions(user_id)?,
        device_tokens: store.list_device_tokens(user_id)?,
        pairing_codes: store.list_pairing_codes(user_id)?,
    })
}

/// Delete every domain row owned by the user but keep the account itself.
pub fn erase_domain_data(store: &Store, user_id: &str) -> Result<EraseSummary> {
    let summary = store.erase_user_data(user_id, false)?;
    tracing::info!(user_id, rows = summary.total(), "domain data erased");
    Ok(summary)
}

/// Delete the account and everything under it.
pub fn erase_account(store: &Store, user_id: &str) -> Result<EraseSummary> {
    let summary = store.erase_user_data(user_id, true)?;
    tracing::info!(user_id, rows = summary.total(), "account erased");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CheckinStatus, PreferredChannels, RelationshipMode, RelationshipType, SubscriptionStatus,
        SubscriptionTier,
    };

    fn seeded_store() -> Store {
        let store = Store::open_memory().unwrap();
        let now = Utc::now();

        store
            .upsert_user(&User {
                id: "u1".to_string(),
                email: Some("amir@example.com".to_string()),
                phone_e164: Some("+971500000001".to_string()),
                full_name: "Amir".to_string(),
                utc_offset_minutes: 240,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        store
            .create_profile(&LovedOneProfile {
                id: "p1".to_string(),
                owner_user_id: "u1".to_string(),
                display_name: "Mama".to_string(),
                relationship_type: RelationshipType::Mother,
                preferred_channels: PreferredChannels::default(),
                utc_offset_minutes: 240,
                phone_e164: None,
                email: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        store
            .create_relationship(&Relationship {
                id: "r1".to_string(),
                owner_user_id: "u1".to_string(),
                loved_one_profile_id: "p1".to_string(),
                mode: RelationshipMode::OneWay,
                can_initiate_checkin: true,
                can_receive_alerts: true,
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        let schedule = CheckinSchedule::new_daily("r1", "09:00", now);
        store.create_schedule(&schedule).unwrap();
        store
            .create_plan(&EscalationPlan::default_for("r1", now))
            .unwrap();
        let checkin = Checkin::new_pending(&schedule, now, now);
        store.create_checkin_if_absent(&checkin).unwrap();
        store
            .upsert_subscription(&Subscription {
                id: "sub1".to_string(),
                user_id: "u1".to_string(),
                platform: "ios".to_string(),
                product_id: "vigil.two_way.monthly".to_string(),
                tier: SubscriptionTier::TwoWay,
                status: SubscriptionStatus::Active,
                current_period_start: Some(now),
                current_period_end: None,
                external_transaction_id: Some("txn-1".to_string()),
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        store
    }

    #[test]
    fn export_bundles_every_owned_table() {
        let store = seeded_store();
        let bundle = export_user_data(&store, "u1", Utc::now()).unwrap();

        assert_eq!(bundle.export_version, "1.0");
        assert_eq!(bundle.user.id, "u1");
        assert_eq!(bundle.loved_one_profiles.len(), 1);
        assert_eq!(bundle.relationships.len(), 1);
        assert_eq!(bundle.checkin_schedules.len(), 1);
        assert_eq!(bundle.checkins.len(), 1);
        assert_eq!(bundle.escalation_plans.len(), 1);
        assert_eq!(bundle.subscriptions.len(), 1);
        assert_eq!(bundle.checkins[0].status, CheckinStatus::Pending);

        // Bundle is valid self-contained JSON with camelCase keys.
        let json = serde_json::to_value(&bundle).unwrap();
        assert!(json.get("exportedAt").is_some());
        assert!(json.get("lovedOneProfiles").is_some());
    }

    #[test]
    fn export_of_unknown_user_is_an_error() {
        let store = Store::open_memory().unwrap();
        assert!(export_user_data(&store, "nobody", Utc::now()).is_err());
    }

    #[test]
    fn domain_erasure_keeps_the_account() {
        let store = seeded_store();

        let summary = erase_domain_data(&store, "u1").unwrap();
        assert_eq!(summary.users, 0);
        assert!(summary.total() > 0);
        assert!(store.get_user("u1").unwrap().is_some());

        let bundle = export_user_data(&store, "u1", Utc::now()).unwrap();
        assert!(bundle.relationships.is_empty());
        assert!(bundle.checkins.is_empty());
        // Billing stays with the surviving account.
        assert_eq!(bundle.subscriptions.len(), 1);

        // Second erase finds nothing left.
        assert_eq!(erase_domain_data(&store, "u1").unwrap().total(), 0);
    }

    #[test]
    fn account_erasure_removes_the_user_row() {
        let store = seeded_store();
        let summary = erase_account(&store, "u1").unwrap();
        assert_eq!(summary.users, 1);
        assert_eq!(summary.subscriptions, 1);
        assert!(store.get_user("u1").unwrap().is_none());
    }
}
