//! Schedule evaluator.
//!
//! Decides, for each enabled schedule, whether the current tick should
//! create a new check-in. The decision is pure; the only side effect is a
//! conditional insert backed by the unique (schedule_id, due_at) index, so
//! overlapping ticks and concurrent evaluator instances never double-fire.
//!
//! Local time is the loved one's wall clock: a fixed UTC offset per profile.
//! A firing is due when its UTC instant falls inside the half-open window
//! `[now - tick, now]`, which catches firings that landed between ticks
//! without re-firing ones an earlier tick already handled.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc};

use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::model::{Checkin, CheckinSchedule, ScheduleType};
use crate::storage::Store;

/// Evaluates schedules against wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    /// Tick interval; also the width of the due window.
    pub tick: Duration,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            tick: Duration::seconds(60),
        }
    }
}

impl Evaluator {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    /// The UTC instant at which this schedule fires within the current tick
    /// window, or None when nothing is due.
    ///
    /// `utc_offset_minutes` is the loved one's fixed UTC offset.
    pub fn due_instant(
        &self,
        schedule: &CheckinSchedule,
        utc_offset_minutes: i32,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<DateTime<Utc>>, ValidationError> {
        schedule.validate()?;
        let time_local = schedule.parsed_time_local()?;
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            ValidationError::InvalidValue {
                field: "utc_offset_minutes".to_string(),
                message: format!("{utc_offset_minutes} is out of range"),
            }
        })?;

        // The firing local date is the local date of `now`, or the previous
        // date when the tick straddles local midnight.
        let local_now = now.with_timezone(&offset);
        for date in [local_now.date_naive(), local_now.date_naive() - Duration::days(1)] {
            let candidate_local = match date.and_time(time_local).and_local_timezone(offset) {
                chrono::LocalResult::Single(dt) => dt,
                _ => continue,
            };
            let due = candidate_local.with_timezone(&Utc);

            // Half-open window: fired in the last tick, up to and including now.
            if due > now || due <= now - self.tick {
                continue;
            }
            if !self.date_matches(schedule, date)? {
                return Ok(None);
            }
            return Ok(Some(due));
        }
        Ok(None)
    }

    /// Day-of-week membership and validity window, both in local calendar
    /// terms.
    fn date_matches(
        &self,
        schedule: &CheckinSchedule,
        date: chrono::NaiveDate,
    ) -> std::result::Result<bool, ValidationError> {
        if let Some(start) = schedule.start_date {
            if date < start {
                return Ok(false);
            }
        }
        if let Some(end) = schedule.end_date {
            if date > end {
                return Ok(false);
            }
        }

        match schedule.schedule_type {
            ScheduleType::Daily | ScheduleType::Temporary => Ok(true),
            ScheduleType::MultiDaily => {
                let weekday = date.weekday().num_days_from_monday() as u8; // 0=Mon .. 6=Sun
                Ok(schedule
                    .days_of_week
                    .as_ref()
                    .map(|days| days.contains(&weekday))
                    .unwrap_or(true))
            }
        }
    }

    /// Evaluate one schedule and create the due checkin when there is one.
    /// Returns the created event, or None when nothing fired (not due, or
    /// another evaluator already created this firing).
    pub fn fire(
        &self,
        store: &Store,
        schedule: &CheckinSchedule,
        utc_offset_minutes: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let Some(due_at) = self
            .due_instant(schedule, utc_offset_minutes, now)
            .map_err(crate::error::CoreError::Validation)?
        else {
            return Ok(None);
        };

        let checkin = Checkin::new_pending(schedule, due_at, now);
        if !store.create_checkin_if_absent(&checkin)? {
            return Ok(None);
        }

        Ok(Some(Event::CheckinCreated {
            checkin_id: checkin.id,
            schedule_id: schedule.id.clone(),
            relationship_id: schedule.relationship_id.clone(),
            due_at,
            at: now,
        }))
    }
}
