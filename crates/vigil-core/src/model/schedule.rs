//! Check-in schedules and check-in instances.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default grace period after due_at before escalation starts.
pub const DEFAULT_GRACE_PERIOD_MINUTES: u32 = 30;

/// Default number of send retries per escalation step.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default spacing between send retries.
pub const DEFAULT_RETRY_INTERVAL_MINUTES: u32 = 10;

/// Recurrence shape of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    /// Fires every day at `time_local`.
    Daily,
    /// Fires at `time_local` on the days in `days_of_week`.
    MultiDaily,
    /// Daily, but only inside the `[start_date, end_date]` window.
    Temporary,
}

/// A recurring check-in schedule owned by one relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinSchedule {
    pub id: String,
    pub relationship_id: String,
    pub schedule_type: ScheduleType,
    /// Local time of day, "HH:MM", interpreted in the loved one's UTC offset.
    pub time_local: String,
    /// 0 = Monday .. 6 = Sunday. Non-empty when present.
    pub days_of_week: Option<Vec<u8>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub grace_period_minutes: u32,
    pub max_retries: u32,
    pub retry_interval_minutes: u32,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckinSchedule {
    /// New daily schedule with product defaults.
    pub fn new_daily(relationship_id: &str, time_local: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            relationship_id: relationship_id.to_string(),
            schedule_type: ScheduleType::Daily,
            time_local: time_local.to_string(),
            days_of_week: None,
            start_date: None,
            end_date: None,
            grace_period_minutes: DEFAULT_GRACE_PERIOD_MINUTES,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval_minutes: DEFAULT_RETRY_INTERVAL_MINUTES,
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Parse `time_local` into a NaiveTime.
    pub fn parsed_time_local(&self) -> Result<NaiveTime, ValidationError> {
        NaiveTime::parse_from_str(&self.time_local, "%H:%M")
            .map_err(|_| ValidationError::InvalidTimeLocal(self.time_local.clone()))
    }

    /// Validate the schedule invariants: a well-formed local time, a
    /// non-empty days_of_week subset of 0..6 when present, and an ordered
    /// validity window.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.parsed_time_local()?;

        if let Some(days) = &self.days_of_week {
            if days.is_empty() {
                return Err(ValidationError::InvalidDaysOfWeek(
                    "days_of_week must be non-empty when present".to_string(),
                ));
            }
            if let Some(bad) = days.iter().find(|d| **d > 6) {
                return Err(ValidationError::InvalidDaysOfWeek(format!(
                    "day {bad} out of range 0..6"
                )));
            }
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ValidationError::InvalidValidityWindow { start, end });
            }
        }

        Ok(())
    }
}

/// Lifecycle status of a single check-in instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinStatus {
    Pending,
    Snoozed,
    Confirmed,
    Escalating,
    Escalated,
    Resolved,
    Canceled,
}

impl CheckinStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CheckinStatus::Confirmed
                | CheckinStatus::Resolved
                | CheckinStatus::Escalated
                | CheckinStatus::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckinStatus::Pending => "pending",
            CheckinStatus::Snoozed => "snoozed",
            CheckinStatus::Confirmed => "confirmed",
            CheckinStatus::Escalating => "escalating",
            CheckinStatus::Escalated => "escalated",
            CheckinStatus::Resolved => "resolved",
            CheckinStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "snoozed" => CheckinStatus::Snoozed,
            "confirmed" => CheckinStatus::Confirmed,
            "escalating" => CheckinStatus::Escalating,
            "escalated" => CheckinStatus::Escalated,
            "resolved" => CheckinStatus::Resolved,
            "canceled" => CheckinStatus::Canceled,
            _ => CheckinStatus::Pending,
        }
    }
}

/// How a response came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMethod {
    App,
    Whatsapp,
    Sms,
    Voice,
}

/// One firing of a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkin {
    pub id: String,
    pub relationship_id: String,
    pub schedule_id: String,
    pub due_at: DateTime<Utc>,
    pub status: CheckinStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_method: Option<ResponseMethod>,
    pub snooze_until: Option<DateTime<Utc>>,
    /// Set when the checkin enters `escalating`; step delays count from here.
    pub escalating_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkin {
    /// A fresh pending checkin for one schedule firing.
    pub fn new_pending(schedule: &CheckinSchedule, due_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            relationship_id: schedule.relationship_id.clone(),
            schedule_id: schedule.id.clone(),
            due_at,
            status: CheckinStatus::Pending,
            responded_at: None,
            response_method: None,
            snooze_until: None,
            escalating_since: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Instant at which the grace period runs out. A snooze restarts the
    /// countdown from `snooze_until`.
    pub fn grace_deadline(&self, schedule: &CheckinSchedule) -> DateTime<Utc> {
        let anchor = self.snooze_until.unwrap_or(self.due_at);
        anchor + chrono::Duration::minutes(schedule.grace_period_minutes as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule_at(time_local: &str) -> CheckinSchedule {
        CheckinSchedule::new_daily("r1", time_local, Utc::now())
    }

    #[test]
    fn validate_accepts_plain_daily() {
        assert!(schedule_at("09:00").validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_time() {
        assert!(schedule_at("9am").validate().is_err());
        assert!(schedule_at("25:00").validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_or_out_of_range_days() {
        let mut s = schedule_at("09:00");
        s.days_of_week = Some(vec![]);
        assert!(s.validate().is_err());

        s.days_of_week = Some(vec![0, 7]);
        assert!(s.validate().is_err());

        s.days_of_week = Some(vec![0, 2, 6]);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let mut s = schedule_at("09:00");
        s.start_date = NaiveDate::from_ymd_opt(2025, 6, 10);
        s.end_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        assert!(s.validate().is_err());
    }

    #[test]
    fn grace_deadline_restarts_from_snooze() {
        let schedule = schedule_at("09:00");
        let due = Utc::now();
        let mut checkin = Checkin::new_pending(&schedule, due, due);
        assert_eq!(
            checkin.grace_deadline(&schedule),
            due + chrono::Duration::minutes(DEFAULT_GRACE_PERIOD_MINUTES as i64)
        );

        let snoozed_to = due + chrono::Duration::minutes(45);
        checkin.snooze_until = Some(snoozed_to);
        assert_eq!(
            checkin.grace_deadline(&schedule),
            snoozed_to + chrono::Duration::minutes(DEFAULT_GRACE_PERIOD_MINUTES as i64)
        );
    }

    #[test]
    fn terminal_states() {
        assert!(CheckinStatus::Confirmed.is_terminal());
        assert!(CheckinStatus::Resolved.is_terminal());
        assert!(CheckinStatus::Escalated.is_terminal());
        assert!(CheckinStatus::Canceled.is_terminal());
        assert!(!CheckinStatus::Pending.is_terminal());
        assert!(!CheckinStatus::Snoozed.is_terminal());
        assert!(!CheckinStatus::Escalating.is_terminal());
    }
}
