//! The engine tick loop.
//!
//! Every tick runs four phases in order against a shared clock reading:
//!
//! 1. Evaluation: create pending checkins for schedules that came due.
//! 2. Re-arm: snoozed checkins whose snooze elapsed go back to pending.
//! 3. Expiry: pending checkins past their grace deadline start escalating.
//! 4. Dispatch: escalating checkins advance through their plans.
//!
//! Each phase isolates per-row failures so one broken schedule or checkin
//! never stalls the rest. The loop itself is crash-tolerant: every phase
//! rebuilds its view from the store, so killing and restarting the process
//! resumes cleanly.

use chrono::Utc;
use std::time::Duration;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::events::Event;
use crate::gateway::NotificationGateway;
use crate::lifecycle::Lifecycle;
use crate::storage::{EngineConfig, Store};

pub struct Engine<G> {
    store: Store,
    gateway: G,
    evaluator: Evaluator,
    config: EngineConfig,
}

impl<G: NotificationGateway> Engine<G> {
    pub fn new(store: Store, gateway: G, config: EngineConfig) -> Self {
        let evaluator = Evaluator::new(chrono::Duration::seconds(
            config.tick_interval_secs as i64,
        ));
        Self {
            store,
            gateway,
            evaluator,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run forever, ticking at the configured interval. Returns on ctrl-c.
    pub async fn run(&self) -> Result<()> {
        let period = Duration::from_secs(self.config.tick_interval_secs.max(1));
        tracing::info!(tick_interval_secs = period.as_secs(), "engine started");
        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();
                    match self.tick(now).await {
                        Ok(events) => {
                            if !events.is_empty() {
                                tracing::info!(count = events.len(), "tick produced events");
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "tick failed"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received, stopping engine");
                    return Ok(());
                }
            }
        }
    }

    /// One full pass at the given instant. Exposed separately from [`run`]
    /// so the clock can be driven explicitly.
    ///
    /// [`run`]: Engine::run
    pub async fn tick(&self, now: chrono::DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let lifecycle = Lifecycle::new(&self.store);

        for (schedule, utc_offset_minutes) in self.store.list_evaluable_schedules()? {
            match self.evaluator.fire(&self.store, &schedule, utc_offset_minutes, now) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(schedule_id = %schedule.id, error = %e, "schedule evaluation failed");
                }
            }
        }

        events.extend(lifecycle.rearm_elapsed_snoozes(now)?);
        events.extend(lifecycle.expire_overdue(now)?);

        let dispatcher = Dispatcher::new(&self.store, &self.gateway);
        events.extend(dispatcher.drive_all(now).await?);

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Delivery, NotificationPayload};
    use crate::model::{
        Checkin, CheckinSchedule, CheckinStatus, EscalationChannel, EscalationPlan, DeviceToken,
        LovedOneProfile, PreferredChannels, Relationship, RelationshipMode, RelationshipType,
        ResponseMethod, User,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use std::sync::Mutex;

    struct RecordingGateway {
        sends: Mutex<Vec<(EscalationChannel, u32)>>,
    }

    impl RecordingGateway {
        fn new() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
            }
        }

        fn sends(&self) -> Vec<(EscalationChannel, u32)> {
            self.sends.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationGateway for RecordingGateway {
        async fn send(
            &self,
            channel: EscalationChannel,
            _target: &str,
            payload: &NotificationPayload,
        ) -> Delivery {
            self.sends.lock().unwrap().push((channel, payload.step_index));
            Delivery::sent(None)
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    /// Owner in Dubai (+04:00) watching over Mama, daily 09:00 local
    /// check-in with a 60 minute grace period and the default plan.
    fn dubai_engine() -> Engine<RecordingGateway> {
        let store = Store::open_memory().unwrap();
        let now = utc(2025, 6, 1, 0, 0, 0);

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
                phone_e164: Some("+971500000002".to_string()),
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
        store
            .upsert_device_token(&DeviceToken {
                id: "d1".to_string(),
                user_id: "u1".to_string(),
                platform: "android".to_string(),
                token: "device-token-1".to_string(),
                is_active: true,
                last_registered_at: now,
                created_at: now,
            })
            .unwrap();

        let mut schedule = CheckinSchedule::new_daily("r1", "09:00", now);
        schedule.id = "s1".to_string();
        schedule.grace_period_minutes = 60;
        store.create_schedule(&schedule).unwrap();
        store.create_plan(&EscalationPlan::default_for("r1", now)).unwrap();

        Engine::new(store, RecordingGateway::new(), EngineConfig::default())
    }

    fn only_checkin(engine: &Engine<RecordingGateway>) -> Checkin {
        let checkins = engine
            .store()
            .list_checkins_by_relationship("r1")
            .unwrap();
        assert_eq!(checkins.len(), 1);
        checkins.into_iter().next().unwrap()
    }

    /// 09:00 Dubai is 05:00 UTC. The full arc: due, grace expiry at 06:00,
    /// push at 06:00, whatsapp at 06:10, then a response resolves it and
    /// the remaining steps never send.
    #[tokio::test]
    async fn dubai_schedule_runs_the_full_escalation_arc() {
        let engine = dubai_engine();

        // Nothing due the tick before.
        engine.tick(utc(2025, 6, 1, 4, 59, 30)).await.unwrap();
        assert!(engine.store().list_checkins_by_relationship("r1").unwrap().is_empty());

        // Due instant falls in this tick's window.
        let events = engine.tick(utc(2025, 6, 1, 5, 0, 30)).await.unwrap();
        assert!(matches!(events[0], Event::CheckinCreated { .. }));
        let checkin = only_checkin(&engine);
        assert_eq!(checkin.due_at, utc(2025, 6, 1, 5, 0, 0));
        assert_eq!(checkin.status, CheckinStatus::Pending);

        // Still inside grace at 05:59.
        engine.tick(utc(2025, 6, 1, 5, 59, 0)).await.unwrap();
        assert_eq!(only_checkin(&engine).status, CheckinStatus::Pending);

        // Grace expired: escalation starts and step 0 (push, delay 0)
        // dispatches in the same tick.
        let events = engine.tick(utc(2025, 6, 1, 6, 0, 30)).await.unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::EscalationStarted { .. })));
        assert_eq!(engine.gateway.sends(), vec![(EscalationChannel::Push, 0)]);

        // Step 1 (whatsapp, +10 min) on a later tick.
        engine.tick(utc(2025, 6, 1, 6, 10, 30)).await.unwrap();
        assert_eq!(
            engine.gateway.sends(),
            vec![(EscalationChannel::Push, 0), (EscalationChannel::Whatsapp, 1)]
        );

        // Mama responds; the checkin resolves and sms/voice never send.
        let checkin = only_checkin(&engine);
        let lifecycle = Lifecycle::new(engine.store());
        lifecycle
            .respond(&checkin.id, ResponseMethod::Whatsapp, utc(2025, 6, 1, 6, 12, 0))
            .unwrap();

        engine.tick(utc(2025, 6, 1, 6, 20, 30)).await.unwrap();
        engine.tick(utc(2025, 6, 1, 6, 30, 30)).await.unwrap();
        assert_eq!(engine.gateway.sends().len(), 2);
        assert_eq!(only_checkin(&engine).status, CheckinStatus::Resolved);
    }

    /// A tick that fires a schedule twice (crash/replay) creates one row.
    #[tokio::test]
    async fn replayed_tick_is_idempotent() {
        let engine = dubai_engine();
        let tick_at = utc(2025, 6, 1, 5, 0, 30);

        let first = engine.tick(tick_at).await.unwrap();
        let second = engine.tick(tick_at).await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(engine.store().list_checkins_by_relationship("r1").unwrap().len(), 1);
    }

    /// Snooze pushes the grace anchor: re-armed at snooze_until, escalation
    /// only starts a full grace period after that.
    #[tokio::test]
    async fn snooze_defers_escalation_by_a_full_grace_period() {
        let engine = dubai_engine();
        engine.tick(utc(2025, 6, 1, 5, 0, 30)).await.unwrap();
        let checkin = only_checkin(&engine);

        let lifecycle = Lifecycle::new(engine.store());
        lifecycle
            .snooze(&checkin.id, utc(2025, 6, 1, 5, 30, 0), utc(2025, 6, 1, 5, 5, 0))
            .unwrap();

        // Old deadline (06:00) passes harmlessly while snoozed/pending.
        engine.tick(utc(2025, 6, 1, 5, 31, 0)).await.unwrap();
        assert_eq!(only_checkin(&engine).status, CheckinStatus::Pending);
        engine.tick(utc(2025, 6, 1, 6, 5, 0)).await.unwrap();
        assert_eq!(only_checkin(&engine).status, CheckinStatus::Pending);

        // New deadline is snooze_until + 60 minutes.
        engine.tick(utc(2025, 6, 1, 6, 30, 30)).await.unwrap();
        assert_eq!(only_checkin(&engine).status, CheckinStatus::Escalating);
    }
}
