//! Check-in lifecycle manager.
//!
//! Owns the state machine for individual check-in instances:
//!
//! ```text
//! pending    -> confirmed | snoozed | escalating | canceled
//! snoozed    -> pending | confirmed | canceled
//! escalating -> resolved | escalated | canceled
//! ```
//!
//! `confirmed`, `resolved`, `escalated`, and `canceled` are terminal.
//!
//! Every persisted transition is a compare-and-swap against the current
//! status column. A failed swap after a valid-looking read means a
//! concurrent writer moved the row first; that is reported as "no event",
//! not as an error. Responses always win ties: the dispatcher re-reads
//! status before each send and a response that lands in between flips the
//! row to a terminal state the dispatcher then observes.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::events::Event;
use crate::model::{CheckinStatus, ResponseMethod};
use crate::storage::Store;

/// Whether the state machine admits `from -> to`.
pub fn is_valid_transition(from: CheckinStatus, to: CheckinStatus) -> bool {
    use CheckinStatus::*;
    match (from, to) {
        (Pending, Confirmed) | (Pending, Snoozed) | (Pending, Escalating) => true,
        (Snoozed, Pending) | (Snoozed, Confirmed) => true,
        (Escalating, Resolved) | (Escalating, Escalated) => true,
        (from, Canceled) => !from.is_terminal(),
        _ => false,
    }
}

/// Drives check-in state transitions against the store.
pub struct Lifecycle<'a> {
    store: &'a Store,
}

impl<'a> Lifecycle<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    fn status_of(&self, checkin_id: &str) -> Result<CheckinStatus> {
        let checkin = self
            .store
            .get_checkin(checkin_id)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "checkin",
                id: checkin_id.to_string(),
            })?;
        Ok(checkin.status)
    }

    fn illegal(from: CheckinStatus, to: CheckinStatus) -> CoreError {
        CoreError::Validation(ValidationError::IllegalTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }

    /// A response arrived for this checkin. Pending or snoozed checkins
    /// confirm; escalating checkins resolve (and the dispatcher aborts the
    /// rest of the plan on its next status check). Responses to terminal
    /// checkins are rejected.
    pub fn respond(
        &self,
        checkin_id: &str,
        method: ResponseMethod,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        match self.status_of(checkin_id)? {
            CheckinStatus::Pending | CheckinStatus::Snoozed => {
                if self.store.mark_confirmed(checkin_id, method, now)? {
                    Ok(Some(Event::CheckinConfirmed {
                        checkin_id: checkin_id.to_string(),
                        method,
                        at: now,
                    }))
                } else {
                    Ok(None) // lost the race; another writer moved the row
                }
            }
            CheckinStatus::Escalating => {
                if self.store.mark_resolved(checkin_id, method, now)? {
                    Ok(Some(Event::CheckinResolved {
                        checkin_id: checkin_id.to_string(),
                        method,
                        at: now,
                    }))
                } else {
                    Ok(None)
                }
            }
            terminal => Err(Self::illegal(terminal, CheckinStatus::Confirmed)),
        }
    }

    /// Snooze a pending checkin until `snooze_until`. The grace countdown
    /// restarts from `snooze_until` once the checkin re-arms.
    pub fn snooze(
        &self,
        checkin_id: &str,
        snooze_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        match self.status_of(checkin_id)? {
            CheckinStatus::Pending => {
                if self.store.mark_snoozed(checkin_id, snooze_until, now)? {
                    Ok(Some(Event::CheckinSnoozed {
                        checkin_id: checkin_id.to_string(),
                        snooze_until,
                        at: now,
                    }))
                } else {
                    Ok(None)
                }
            }
            other => Err(Self::illegal(other, CheckinStatus::Snoozed)),
        }
    }

    /// Cancel one checkin (manual path). Terminal checkins are rejected.
    pub fn cancel(&self, checkin_id: &str, now: DateTime<Utc>) -> Result<Option<Event>> {
        let status = self.status_of(checkin_id)?;
        if status.is_terminal() {
            return Err(Self::illegal(status, CheckinStatus::Canceled));
        }
        if self.store.mark_canceled(checkin_id, now)? {
            Ok(Some(Event::CheckinCanceled {
                checkin_id: checkin_id.to_string(),
                at: now,
            }))
        } else {
            Ok(None)
        }
    }

    /// Point-in-time status snapshot for polling clients.
    pub fn snapshot(&self, checkin_id: &str, now: DateTime<Utc>) -> Result<Event> {
        let checkin = self
            .store
            .get_checkin(checkin_id)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "checkin",
                id: checkin_id.to_string(),
            })?;
        Ok(Event::CheckinSnapshot {
            checkin_id: checkin.id,
            status: checkin.status,
            due_at: checkin.due_at,
            snooze_until: checkin.snooze_until,
            escalating_since: checkin.escalating_since,
            at: now,
        })
    }

    /// Cancel everything non-terminal under a relationship (deactivation /
    /// erasure path).
    pub fn cancel_for_relationship(&self, relationship_id: &str, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.store.cancel_checkins_for_relationship(relationship_id, now)?)
    }

    /// Cancel everything non-terminal under every relationship watching a
    /// profile. Deactivating a profile both removes its schedules from the
    /// evaluator's work list and sweeps checkins already in flight, so
    /// nothing keeps escalating against a deactivated profile.
    pub fn cancel_for_profile(&self, profile_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let mut canceled = 0;
        for relationship in self.store.list_relationships_by_profile(profile_id)? {
            canceled += self.cancel_for_relationship(&relationship.id, now)?;
        }
        Ok(canceled)
    }

    /// Re-arm snoozed checkins whose snooze has elapsed. Called every tick.
    pub fn rearm_elapsed_snoozes(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for checkin in self.store.list_checkins_in_status(CheckinStatus::Snoozed)? {
            let Some(snooze_until) = checkin.snooze_until else {
                continue;
            };
            if snooze_until > now {
                continue;
            }
            if self.store.rearm_snoozed(&checkin.id, now)? {
                events.push(Event::CheckinRearmed {
                    checkin_id: checkin.id,
                    at: now,
                });
            }
        }
        Ok(events)
    }

    /// Move pending checkins whose grace period ran out into `escalating`.
    /// Called every tick. A checkin whose schedule row has gone missing is
    /// skipped for the tick and logged; it cannot block other rows.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for checkin in self.store.list_checkins_in_status(CheckinStatus::Pending)? {
            let schedule = match self.store.get_schedule(&checkin.schedule_id)? {
                Some(s) => s,
                None => {
                    tracing::warn!(
                        checkin_id = %checkin.id,
                        schedule_id = %checkin.schedule_id,
                        "checkin references a missing schedule; skipping"
                    );
                    continue;
                }
            };
            if now < checkin.grace_deadline(&schedule) {
                continue;
            }
            if self.store.mark_escalating(&checkin.id, now)? {
                events.push(Event::EscalationStarted {
                    checkin_id: checkin.id,
                    relationship_id: checkin.relationship_id,
                    at: now,
                });
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Checkin, CheckinSchedule};
    use chrono::Duration;
    use proptest::prelude::*;

    fn seed_checkin(store: &Store, grace_minutes: u32) -> (CheckinSchedule, Checkin) {
        let now = Utc::now();
        let mut schedule = CheckinSchedule::new_daily("r1", "09:00", now);
        schedule.grace_period_minutes = grace_minutes;
        store.create_schedule(&schedule).unwrap();
        let checkin = Checkin::new_pending(&schedule, now, now);
        store.create_checkin_if_absent(&checkin).unwrap();
        (schedule, checkin)
    }

    #[test]
    fn respond_while_pending_confirms() {
        let store = Store::open_memory().unwrap();
        let (_, checkin) = seed_checkin(&store, 30);
        let lifecycle = Lifecycle::new(&store);

        let event = lifecycle
            .respond(&checkin.id, ResponseMethod::App, Utc::now())
            .unwrap();
        assert!(matches!(event, Some(Event::CheckinConfirmed { .. })));

        // A second response hits a terminal row.
        let err = lifecycle
            .respond(&checkin.id, ResponseMethod::Sms, Utc::now())
            .unwrap_err();
        assert!(err.to_string().contains("confirmed"));
    }

    #[test]
    fn respond_while_escalating_resolves() {
        let store = Store::open_memory().unwrap();
        let (_, checkin) = seed_checkin(&store, 0);
        let lifecycle = Lifecycle::new(&store);
        let now = Utc::now();

        let started = lifecycle.expire_overdue(now + Duration::minutes(1)).unwrap();
        assert_eq!(started.len(), 1);

        let event = lifecycle
            .respond(&checkin.id, ResponseMethod::Whatsapp, now + Duration::minutes(2))
            .unwrap();
        assert!(matches!(event, Some(Event::CheckinResolved { .. })));
    }

    #[test]
    fn snooze_then_rearm_then_escalate_from_snooze_anchor() {
        let store = Store::open_memory().unwrap();
        let (_, checkin) = seed_checkin(&store, 30);
        let lifecycle = Lifecycle::new(&store);
        let now = Utc::now();

        let until = now + Duration::minutes(15);
        lifecycle.snooze(&checkin.id, until, now).unwrap().unwrap();

        // Before the snooze elapses nothing re-arms.
        assert!(lifecycle.rearm_elapsed_snoozes(now + Duration::minutes(5)).unwrap().is_empty());

        let rearmed = lifecycle.rearm_elapsed_snoozes(until).unwrap();
        assert_eq!(rearmed.len(), 1);

        // Grace counts from snooze_until, not due_at: 15 + 30 minutes.
        assert!(lifecycle
            .expire_overdue(now + Duration::minutes(40))
            .unwrap()
            .is_empty());
        let escalated = lifecycle.expire_overdue(until + Duration::minutes(30)).unwrap();
        assert_eq!(escalated.len(), 1);
    }

    #[test]
    fn snooze_rejected_once_escalating() {
        let store = Store::open_memory().unwrap();
        let (_, checkin) = seed_checkin(&store, 0);
        let lifecycle = Lifecycle::new(&store);
        let now = Utc::now();
        lifecycle.expire_overdue(now + Duration::minutes(1)).unwrap();

        let err = lifecycle
            .snooze(&checkin.id, now + Duration::minutes(30), now)
            .unwrap_err();
        assert!(err.to_string().contains("escalating"));
    }

    #[test]
    fn cancel_for_relationship_sweeps_non_terminal() {
        let store = Store::open_memory().unwrap();
        let now = Utc::now();
        let schedule = CheckinSchedule::new_daily("r1", "09:00", now);
        store.create_schedule(&schedule).unwrap();

        let open = Checkin::new_pending(&schedule, now, now);
        let mut done = Checkin::new_pending(&schedule, now + Duration::days(1), now);
        done.id = "done".to_string();
        store.create_checkin_if_absent(&open).unwrap();
        store.create_checkin_if_absent(&done).unwrap();
        store.mark_confirmed(&done.id, ResponseMethod::App, now).unwrap();

        let lifecycle = Lifecycle::new(&store);
        let canceled = lifecycle.cancel_for_relationship("r1", now).unwrap();
        assert_eq!(canceled, 1);

        let confirmed = store.get_checkin(&done.id).unwrap().unwrap();
        assert_eq!(confirmed.status, CheckinStatus::Confirmed);
    }

    #[test]
    fn deactivation_sweep_covers_every_relationship_of_a_profile() {
        use crate::model::{Relationship, RelationshipMode};

        let store = Store::open_memory().unwrap();
        let now = Utc::now();
        for (rel_id, user_id) in [("r1", "u1"), ("r2", "u2")] {
            store
                .create_relationship(&Relationship {
                    id: rel_id.to_string(),
                    owner_user_id: user_id.to_string(),
                    loved_one_profile_id: "p1".to_string(),
                    mode: RelationshipMode::OneWay,
                    can_initiate_checkin: true,
                    can_receive_alerts: true,
                    created_at: now,
                    updated_at: now,
                })
                .unwrap();
            let schedule = CheckinSchedule::new_daily(rel_id, "09:00", now);
            store.create_schedule(&schedule).unwrap();
            let checkin = Checkin::new_pending(&schedule, now, now);
            store.create_checkin_if_absent(&checkin).unwrap();
        }
        // r2's checkin is already escalating; the sweep still catches it.
        let escalating = &store.list_checkins_by_relationship("r2").unwrap()[0];
        assert!(store.mark_escalating(&escalating.id, now).unwrap());

        let lifecycle = Lifecycle::new(&store);
        let canceled = lifecycle.cancel_for_profile("p1", now).unwrap();
        assert_eq!(canceled, 2);

        for rel_id in ["r1", "r2"] {
            let rows = store.list_checkins_by_relationship(rel_id).unwrap();
            assert_eq!(rows[0].status, CheckinStatus::Canceled);
        }
    }

    #[test]
    fn expire_overdue_skips_orphaned_checkins() {
        let store = Store::open_memory().unwrap();
        let now = Utc::now();
        let schedule = CheckinSchedule::new_daily("r1", "09:00", now);
        // Schedule never persisted: checkin is an orphan.
        let orphan = Checkin::new_pending(&schedule, now - Duration::hours(2), now);
        store.create_checkin_if_absent(&orphan).unwrap();

        let lifecycle = Lifecycle::new(&store);
        let events = lifecycle.expire_overdue(now).unwrap();
        assert!(events.is_empty());
        // Row untouched, not canceled or escalated.
        let row = store.get_checkin(&orphan.id).unwrap().unwrap();
        assert_eq!(row.status, CheckinStatus::Pending);
    }

    fn any_status() -> impl Strategy<Value = CheckinStatus> {
        prop_oneof![
            Just(CheckinStatus::Pending),
            Just(CheckinStatus::Snoozed),
            Just(CheckinStatus::Confirmed),
            Just(CheckinStatus::Escalating),
            Just(CheckinStatus::Escalated),
            Just(CheckinStatus::Resolved),
            Just(CheckinStatus::Canceled),
        ]
    }

    proptest! {
        /// No transition ever leaves a terminal state.
        #[test]
        fn terminal_states_admit_nothing(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!is_valid_transition(from, to));
            }
        }

        /// Cancel is reachable from every non-terminal state.
        #[test]
        fn cancel_reachable_from_non_terminal(from in any_status()) {
            if !from.is_terminal() {
                prop_assert!(is_valid_transition(from, CheckinStatus::Canceled));
            }
        }
    }
}
