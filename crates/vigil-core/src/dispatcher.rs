//! Escalation dispatcher.
//!
//! Walks an `escalating` checkin through its relationship's active plan.
//! The dispatcher keeps no state of its own: which step comes next is
//! recomputed every tick from the persisted escalation events, so a process
//! restart resumes exactly where the last one stopped, without duplicate or
//! skipped steps. Step ownership across concurrent dispatchers is settled
//! by the conditional event insert, and the checkin status is re-read
//! immediately before every send so a response always wins the race.
//!
//! Retry timing is derived, not stored: attempt `n` of a step is due at
//! `escalating_since + step.delay_min + n * retry_interval_minutes`.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::events::Event;
use crate::gateway::{NotificationGateway, NotificationPayload};
use crate::model::{
    Checkin, CheckinSchedule, CheckinStatus, ContactPoint, DeliveryStatus, DeviceToken,
    EscalationChannel, EscalationEvent, EscalationPlan, LovedOneProfile, User,
};
use crate::storage::Store;

/// Drives escalating checkins through their plans.
pub struct Dispatcher<'a, G> {
    store: &'a Store,
    gateway: &'a G,
}

/// Everything needed to dispatch for one checkin, loaded once per tick.
struct DispatchContext {
    checkin: Checkin,
    schedule: CheckinSchedule,
    plan: EscalationPlan,
    profile: LovedOneProfile,
    owner: Option<User>,
    contacts: Vec<ContactPoint>,
    device_tokens: Vec<DeviceToken>,
    escalating_since: DateTime<Utc>,
}

impl<'a, G: NotificationGateway> Dispatcher<'a, G> {
    pub fn new(store: &'a Store, gateway: &'a G) -> Self {
        Self { store, gateway }
    }

    /// Drive every escalating checkin. One bad row never blocks the rest;
    /// load failures are logged and the row is skipped for this tick.
    pub async fn drive_all(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for checkin in self.store.list_checkins_in_status(CheckinStatus::Escalating)? {
            match self.drive(&checkin, now).await {
                Ok(mut produced) => events.append(&mut produced),
                Err(e) => {
                    tracing::warn!(checkin_id = %checkin.id, error = %e, "dispatch failed for checkin");
                }
            }
        }
        Ok(events)
    }

    /// Drive one escalating checkin: dispatch every step that is due,
    /// honoring retries, then settle the terminal state if the plan is
    /// exhausted.
    pub async fn drive(&self, checkin: &Checkin, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let Some(ctx) = self.load_context(checkin)? else {
            return Ok(Vec::new());
        };

        let mut produced = Vec::new();
        let persisted = self.store.list_events_for_checkin(&ctx.checkin.id)?;

        for (index, step) in ctx.plan.steps.iter().enumerate() {
            let step_index = index as u32;
            let step_due = ctx.escalating_since + Duration::minutes(step.delay_min as i64);
            let existing = persisted.iter().find(|e| e.step_index == step_index);

            match existing {
                Some(event) if event.status.is_terminal() => continue,
                Some(event) => {
                    // Retry of a previously failed attempt.
                    let retry_due = step_due
                        + Duration::minutes(
                            (event.attempts as i64) * ctx.schedule.retry_interval_minutes as i64,
                        );
                    if now < retry_due {
                        // Only this step waits out its backoff; later steps
                        // that reached their own delay still fire.
                        continue;
                    }
                    let Some(event) = self.attempt(&ctx, event.clone(), now).await? else {
                        return Ok(produced); // checkin left escalating mid-plan
                    };
                    produced.push(step_event(&event, now));
                }
                None => {
                    if now < step_due {
                        break; // later steps have delays at least this large
                    }
                    let Some(event) = self.open_step(&ctx, step_index, step.channel, now).await?
                    else {
                        continue; // another dispatcher owns this step
                    };
                    match event {
                        Opened::Aborted => return Ok(produced),
                        Opened::Dispatched(event) => produced.push(step_event(&event, now)),
                    }
                }
            }
        }

        if let Some(event) = self.settle(&ctx, now)? {
            produced.push(event);
        }
        Ok(produced)
    }

    /// Load everything dispatch needs. Returns None (after logging) for
    /// rows that cannot be dispatched this tick: missing relationship or
    /// schedule, or no active plan.
    fn load_context(&self, checkin: &Checkin) -> Result<Option<DispatchContext>> {
        let Some(escalating_since) = checkin.escalating_since else {
            tracing::warn!(checkin_id = %checkin.id, "escalating checkin without escalating_since");
            return Ok(None);
        };
        let Some(relationship) = self.store.get_relationship(&checkin.relationship_id)? else {
            tracing::warn!(checkin_id = %checkin.id, "escalating checkin references missing relationship");
            return Ok(None);
        };
        let Some(schedule) = self.store.get_schedule(&checkin.schedule_id)? else {
            tracing::warn!(checkin_id = %checkin.id, "escalating checkin references missing schedule");
            return Ok(None);
        };
        let Some(profile) = self.store.get_profile(&relationship.loved_one_profile_id)? else {
            tracing::warn!(checkin_id = %checkin.id, "escalating checkin references missing profile");
            return Ok(None);
        };
        let Some(plan) = self.store.get_active_plan(&checkin.relationship_id)? else {
            // Permanent configuration problem: the checkin stays escalating
            // until a plan exists or it is canceled. Flagged every tick for
            // operator visibility.
            tracing::warn!(
                checkin_id = %checkin.id,
                relationship_id = %checkin.relationship_id,
                "no active escalation plan; checkin held in escalating"
            );
            return Ok(None);
        };

        let owner = self.store.get_user(&relationship.owner_user_id)?;
        let contacts = self.store.list_contact_points(&relationship.owner_user_id)?;
        let device_tokens = self.store.list_active_device_tokens(&relationship.owner_user_id)?;

        Ok(Some(DispatchContext {
            checkin: checkin.clone(),
            schedule,
            plan,
            profile,
            owner,
            contacts,
            device_tokens,
            escalating_since,
        }))
    }

    /// First attempt of a step: claim it with a conditional insert, then
    /// send. Returns None when another dispatcher already owns the step.
    async fn open_step(
        &self,
        ctx: &DispatchContext,
        step_index: u32,
        channel: EscalationChannel,
        now: DateTime<Utc>,
    ) -> Result<Option<Opened>> {
        let Some(target) = self.resolve_target(ctx, channel) else {
            // Unresolvable channel: record a failed event and let the plan
            // move on; one dead channel must not block the rest.
            let mut event =
                EscalationEvent::queued(&ctx.checkin.id, step_index, channel, "", now);
            event.status = DeliveryStatus::Failed;
            event.error_code = Some("no_target".to_string());
            event.error_message = Some(format!(
                "no target resolvable for channel '{}'",
                channel.as_str()
            ));
            if !self.store.create_event_if_absent(&event)? {
                return Ok(None);
            }
            tracing::warn!(
                checkin_id = %ctx.checkin.id,
                channel = channel.as_str(),
                "escalation step has no resolvable target"
            );
            return Ok(Some(Opened::Dispatched(event)));
        };

        let event = EscalationEvent::queued(&ctx.checkin.id, step_index, channel, &target, now);
        if !self.store.create_event_if_absent(&event)? {
            return Ok(None);
        }

        match self.attempt(ctx, event, now).await? {
            Some(event) => Ok(Some(Opened::Dispatched(event))),
            None => Ok(Some(Opened::Aborted)),
        }
    }

    /// One send attempt against the gateway. Re-reads the checkin status
    /// right before sending; a checkin that is no longer escalating aborts
    /// the plan (returns None).
    async fn attempt(
        &self,
        ctx: &DispatchContext,
        mut event: EscalationEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<EscalationEvent>> {
        // Tie-break: a response that landed since this tick started wins.
        let current = self.store.get_checkin(&ctx.checkin.id)?;
        if current.map(|c| c.status) != Some(CheckinStatus::Escalating) {
            return Ok(None);
        }

        let payload = NotificationPayload {
            checkin_id: ctx.checkin.id.clone(),
            relationship_id: ctx.checkin.relationship_id.clone(),
            loved_one_name: ctx.profile.display_name.clone(),
            step_index: event.step_index,
            body: format!("{} has not responded to a check-in", ctx.profile.display_name),
        };

        let delivery = self.gateway.send(event.channel, &event.target, &payload).await;
        event.attempts += 1;

        match delivery.status {
            DeliveryStatus::Sent | DeliveryStatus::Delivered => {
                event.status = delivery.status;
                event.provider_message_id = delivery.provider_message_id;
                event.error_code = None;
                event.error_message = None;
                event.sent_at = Some(now);
            }
            _ => {
                let allowed = ctx.schedule.max_retries.max(1);
                // Stays queued (retryable) until the attempt budget is spent.
                event.status = if event.attempts >= allowed {
                    DeliveryStatus::Failed
                } else {
                    DeliveryStatus::Queued
                };
                event.error_code = delivery.error_code;
                event.error_message = delivery.error_message;
                tracing::warn!(
                    checkin_id = %ctx.checkin.id,
                    step_index = event.step_index,
                    channel = event.channel.as_str(),
                    attempts = event.attempts,
                    "escalation send failed"
                );
            }
        }

        self.store.record_event_attempt(&event)?;
        Ok(Some(event))
    }

    /// Resolve the concrete contact identifier for a channel: push goes to
    /// the owner's freshest device token, everything else prefers the
    /// highest-priority emergency contact that accepts the channel and
    /// falls back to the owner's own contact info.
    fn resolve_target(&self, ctx: &DispatchContext, channel: EscalationChannel) -> Option<String> {
        if channel == EscalationChannel::Push {
            return ctx.device_tokens.first().map(|t| t.token.clone());
        }

        if let Some(target) = ctx.contacts.iter().find_map(|c| c.target_for(channel)) {
            return Some(target);
        }

        let owner = ctx.owner.as_ref()?;
        match channel {
            EscalationChannel::Email => owner.email.clone(),
            _ => owner.phone_e164.clone(),
        }
    }

    /// When every step has a terminal event and the dispatch window after
    /// the last step has elapsed, the checkin becomes `escalated`.
    fn settle(&self, ctx: &DispatchContext, now: DateTime<Utc>) -> Result<Option<Event>> {
        let events = self.store.list_events_for_checkin(&ctx.checkin.id)?;
        let all_terminal = ctx.plan.steps.len() <= events.len()
            && events.iter().all(|e| e.status.is_terminal());
        if !all_terminal {
            return Ok(None);
        }

        let last_delay = ctx.plan.steps.last().map(|s| s.delay_min).unwrap_or(0);
        let window_end = ctx.escalating_since
            + Duration::minutes(last_delay as i64)
            + Duration::minutes(ctx.schedule.retry_interval_minutes as i64);
        if now < window_end {
            return Ok(None);
        }

        if self.store.mark_escalated(&ctx.checkin.id, now)? {
            return Ok(Some(Event::CheckinEscalated {
                checkin_id: ctx.checkin.id.clone(),
                relationship_id: ctx.checkin.relationship_id.clone(),
                at: now,
            }));
        }
        Ok(None)
    }
}

enum Opened {
    /// Send attempted (or step recorded failed with no target).
    Dispatched(EscalationEvent),
    /// Checkin is no longer escalating; the rest of the plan is abandoned.
    Aborted,
}

fn step_event(event: &EscalationEvent, now: DateTime<Utc>) -> Event {
    Event::EscalationStepDispatched {
        checkin_id: event.checkin_id.clone(),
        step_index: event.step_index,
        channel: event.channel,
        target: event.target.clone(),
        status: event.status,
        attempts: event.attempts,
        at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Delivery;
    use crate::lifecycle::Lifecycle;
    use crate::model::{
        EscalationStep, PreferredChannels, Relationship, RelationshipMode, RelationshipType,
        ResponseMethod,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Recording gateway with a scripted outcome queue; defaults to
    /// successful sends once the script runs out.
    struct ScriptedGateway {
        sends: Mutex<Vec<(EscalationChannel, String)>>,
        script: Mutex<VecDeque<Delivery>>,
    }

    impl ScriptedGateway {
        fn ok() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                script: Mutex::new(VecDeque::new()),
            }
        }

        fn scripted(outcomes: Vec<Delivery>) -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                script: Mutex::new(outcomes.into()),
            }
        }

        fn sends(&self) -> Vec<(EscalationChannel, String)> {
            self.sends.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationGateway for ScriptedGateway {
        async fn send(
            &self,
            channel: EscalationChannel,
            target: &str,
            _payload: &NotificationPayload,
        ) -> Delivery {
            self.sends
                .lock()
                .unwrap()
                .push((channel, target.to_string()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Delivery::sent(Some("prov-ok".to_string())))
        }
    }

    struct Fixture {
        store: Store,
        checkin_id: String,
        escalating_since: DateTime<Utc>,
    }

    /// Owner with phone/email/device token, active profile, relationship,
    /// schedule (grace 0), an escalating checkin, and the given plan steps.
    fn fixture(steps: Vec<EscalationStep>, max_retries: u32) -> Fixture {
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
                platform: "ios".to_string(),
                token: "device-token-1".to_string(),
                is_active: true,
                last_registered_at: now,
                created_at: now,
            })
            .unwrap();

        let mut schedule = CheckinSchedule::new_daily("r1", "09:00", now);
        schedule.grace_period_minutes = 0;
        schedule.max_retries = max_retries;
        schedule.retry_interval_minutes = 10;
        store.create_schedule(&schedule).unwrap();

        let mut plan = EscalationPlan::default_for("r1", now);
        plan.steps = steps;
        store.create_plan(&plan).unwrap();

        let checkin = Checkin::new_pending(&schedule, now, now);
        store.create_checkin_if_absent(&checkin).unwrap();
        let escalating_since = now;
        assert!(store.mark_escalating(&checkin.id, escalating_since).unwrap());

        Fixture {
            store,
            checkin_id: checkin.id,
            escalating_since,
        }
    }

    fn steps(pairs: &[(EscalationChannel, u32)]) -> Vec<EscalationStep> {
        pairs
            .iter()
            .map(|&(channel, delay_min)| EscalationStep { channel, delay_min })
            .collect()
    }

    fn escalating_row(fx: &Fixture) -> Checkin {
        fx.store.get_checkin(&fx.checkin_id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn zero_delay_step_fires_immediately() {
        let fx = fixture(steps(&[(EscalationChannel::Push, 0)]), 2);
        let gateway = ScriptedGateway::ok();
        let dispatcher = Dispatcher::new(&fx.store, &gateway);

        let produced = dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since)
            .await
            .unwrap();

        assert_eq!(gateway.sends(), vec![(EscalationChannel::Push, "device-token-1".to_string())]);
        assert!(matches!(
            produced[0],
            Event::EscalationStepDispatched { step_index: 0, status: DeliveryStatus::Sent, .. }
        ));

        let events = fx.store.list_events_for_checkin(&fx.checkin_id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].provider_message_id.as_deref(), Some("prov-ok"));
    }

    #[tokio::test]
    async fn steps_wait_for_their_delay() {
        let fx = fixture(
            steps(&[(EscalationChannel::Push, 0), (EscalationChannel::Sms, 10)]),
            2,
        );
        let gateway = ScriptedGateway::ok();
        let dispatcher = Dispatcher::new(&fx.store, &gateway);

        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since)
            .await
            .unwrap();
        assert_eq!(gateway.sends().len(), 1);

        // Step 1 due at +10 minutes; owner phone is the sms fallback target.
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(10))
            .await
            .unwrap();
        let sends = gateway.sends();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[1], (EscalationChannel::Sms, "+971500000001".to_string()));
    }

    #[tokio::test]
    async fn response_between_steps_aborts_plan() {
        let fx = fixture(
            steps(&[
                (EscalationChannel::Push, 0),
                (EscalationChannel::Whatsapp, 10),
                (EscalationChannel::Sms, 20),
            ]),
            2,
        );
        let gateway = ScriptedGateway::ok();
        let dispatcher = Dispatcher::new(&fx.store, &gateway);

        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since)
            .await
            .unwrap();
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(gateway.sends().len(), 2);

        // Response lands two minutes after step 1, before step 2.
        let lifecycle = Lifecycle::new(&fx.store);
        let resolved = lifecycle
            .respond(
                &fx.checkin_id,
                ResponseMethod::Whatsapp,
                fx.escalating_since + Duration::minutes(12),
            )
            .unwrap();
        assert!(matches!(resolved, Some(Event::CheckinResolved { .. })));

        // Step 2 never sends; drive_all no longer sees the checkin.
        let produced = dispatcher
            .drive_all(fx.escalating_since + Duration::minutes(20))
            .await
            .unwrap();
        assert!(produced.is_empty());
        assert_eq!(gateway.sends().len(), 2);
        assert_eq!(escalating_row(&fx).status, CheckinStatus::Resolved);
    }

    #[tokio::test]
    async fn failed_step_retries_then_fails_terminally_and_plan_moves_on() {
        let fx = fixture(
            steps(&[(EscalationChannel::Push, 0), (EscalationChannel::Sms, 20)]),
            2, // two attempts total for step 0
        );
        let gateway = ScriptedGateway::scripted(vec![
            Delivery::failed("timeout", "send on 'push' timed out after 10s"),
            Delivery::failed("timeout", "send on 'push' timed out after 10s"),
        ]);
        let dispatcher = Dispatcher::new(&fx.store, &gateway);

        // Attempt 1 fails; event stays retryable.
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since)
            .await
            .unwrap();
        let events = fx.store.list_events_for_checkin(&fx.checkin_id).unwrap();
        assert_eq!(events[0].status, DeliveryStatus::Queued);
        assert_eq!(events[0].attempts, 1);

        // Retry not yet due at +5 minutes (interval is 10).
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(gateway.sends().len(), 1);

        // Attempt 2 at +10 exhausts the budget: terminal failure.
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(10))
            .await
            .unwrap();
        let events = fx.store.list_events_for_checkin(&fx.checkin_id).unwrap();
        assert_eq!(events[0].status, DeliveryStatus::Failed);
        assert_eq!(events[0].attempts, 2);
        assert_eq!(events[0].error_code.as_deref(), Some("timeout"));

        // Step 1 still fires at its own delay, unaffected by step 0.
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(20))
            .await
            .unwrap();
        let events = fx.store.list_events_for_checkin(&fx.checkin_id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn retry_backoff_does_not_hold_back_later_due_steps() {
        // Step 1 comes due at +5, inside step 0's retry backoff (+10).
        let fx = fixture(
            steps(&[(EscalationChannel::Push, 0), (EscalationChannel::Sms, 5)]),
            2,
        );
        let gateway = ScriptedGateway::scripted(vec![Delivery::failed(
            "timeout",
            "send on 'push' timed out after 10s",
        )]);
        let dispatcher = Dispatcher::new(&fx.store, &gateway);

        // Attempt 1 on step 0 fails; its retry is due at +10.
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since)
            .await
            .unwrap();
        assert_eq!(gateway.sends().len(), 1);

        // At +5 step 0 is still backing off but step 1 fires anyway.
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(5))
            .await
            .unwrap();
        let sends = gateway.sends();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[1], (EscalationChannel::Sms, "+971500000001".to_string()));

        // Step 0's retry still runs on its own clock at +10.
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(10))
            .await
            .unwrap();
        let events = fx.store.list_events_for_checkin(&fx.checkin_id).unwrap();
        assert_eq!(events[0].status, DeliveryStatus::Sent);
        assert_eq!(events[0].attempts, 2);
        assert_eq!(events[1].status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn exhausted_plan_escalates_after_window() {
        let fx = fixture(steps(&[(EscalationChannel::Push, 0)]), 2);
        let gateway = ScriptedGateway::ok();
        let dispatcher = Dispatcher::new(&fx.store, &gateway);

        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since)
            .await
            .unwrap();
        // Window (one retry interval past the last step) not yet elapsed.
        assert_eq!(escalating_row(&fx).status, CheckinStatus::Escalating);

        let produced = dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(10))
            .await
            .unwrap();
        assert!(matches!(produced.last(), Some(Event::CheckinEscalated { .. })));
        assert_eq!(escalating_row(&fx).status, CheckinStatus::Escalated);
    }

    #[tokio::test]
    async fn contact_point_outranks_owner_fallback() {
        let fx = fixture(steps(&[(EscalationChannel::Sms, 0)]), 2);
        let now = Utc::now();
        fx.store
            .create_contact_point(&ContactPoint {
                id: "c1".to_string(),
                owner_user_id: "u1".to_string(),
                display_name: "Sara".to_string(),
                phone_e164: Some("+971509999999".to_string()),
                email: None,
                preferred_channels: PreferredChannels {
                    push: false,
                    whatsapp: false,
                    sms: true,
                    voice: false,
                    email: false,
                },
                priority: 1,
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        let gateway = ScriptedGateway::ok();
        let dispatcher = Dispatcher::new(&fx.store, &gateway);
        dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since)
            .await
            .unwrap();

        assert_eq!(
            gateway.sends(),
            vec![(EscalationChannel::Sms, "+971509999999".to_string())]
        );
    }

    #[tokio::test]
    async fn no_plan_holds_checkin_in_escalating() {
        let fx = fixture(steps(&[(EscalationChannel::Push, 0)]), 2);
        let plan = fx.store.get_active_plan("r1").unwrap().unwrap();
        fx.store.set_plan_active(&plan.id, false).unwrap();

        let gateway = ScriptedGateway::ok();
        let dispatcher = Dispatcher::new(&fx.store, &gateway);
        let produced = dispatcher
            .drive(&escalating_row(&fx), fx.escalating_since + Duration::minutes(60))
            .await
            .unwrap();
        assert!(produced.is_empty());
        assert_eq!(escalating_row(&fx).status, CheckinStatus::Escalating);
    }
}
