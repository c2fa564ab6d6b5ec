//! SQLite-based storage for the check-in domain.
//!
//! Transition methods on checkins are compare-and-swap against the current
//! status column: `UPDATE ... WHERE id = ? AND status = ?`. A return of
//! `false` means another writer moved the row first, which callers treat as
//! "someone else won", not as an error. Duplicate-prevention for checkin
//! creation and escalation events is enforced by unique indexes, not by
//! check-then-act.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json;

use super::data_dir;
use super::migrations;
use crate::error::{DatabaseError, Result};
use crate::model::{
    Checkin, CheckinSchedule, CheckinStatus, ContactPoint, DeliveryStatus, DeviceToken,
    EscalationChannel, EscalationEvent, EscalationPlan, EscalationStep, LovedOneProfile,
    PairingCode, PairingCodeStatus, PreferredChannels, Relationship, RelationshipMode,
    RelationshipType, ResponseMethod, ScheduleType, Subscription, SubscriptionStatus,
    SubscriptionTier, User,
};

// === Helper Functions ===

/// Parse relationship type from database string
fn parse_relationship_type(s: &str) -> RelationshipType {
    match s {
        "mother" => RelationshipType::Mother,
        "father" => RelationshipType::Father,
        "child" => RelationshipType::Child,
        "partner" => RelationshipType::Partner,
        "brother" => RelationshipType::Brother,
        "sister" => RelationshipType::Sister,
        "relative" => RelationshipType::Relative,
        _ => RelationshipType::Other,
    }
}

/// Format relationship type for database storage
fn format_relationship_type(t: RelationshipType) -> &'static str {
    match t {
        RelationshipType::Mother => "mother",
        RelationshipType::Father => "father",
        RelationshipType::Child => "child",
        RelationshipType::Partner => "partner",
        RelationshipType::Brother => "brother",
        RelationshipType::Sister => "sister",
        RelationshipType::Relative => "relative",
        RelationshipType::Other => "other",
    }
}

fn parse_relationship_mode(s: &str) -> RelationshipMode {
    match s {
        "two_way" => RelationshipMode::TwoWay,
        _ => RelationshipMode::OneWay,
    }
}

fn format_relationship_mode(mode: RelationshipMode) -> &'static str {
    match mode {
        RelationshipMode::OneWay => "one_way",
        RelationshipMode::TwoWay => "two_way",
    }
}

fn parse_schedule_type(s: &str) -> ScheduleType {
    match s {
        "multi_daily" => ScheduleType::MultiDaily,
        "temporary" => ScheduleType::Temporary,
        _ => ScheduleType::Daily,
    }
}

fn format_schedule_type(t: ScheduleType) -> &'static str {
    match t {
        ScheduleType::Daily => "daily",
        ScheduleType::MultiDaily => "multi_daily",
        ScheduleType::Temporary => "temporary",
    }
}

fn parse_response_method(s: Option<&str>) -> Option<ResponseMethod> {
    match s {
        Some("app") => Some(ResponseMethod::App),
        Some("whatsapp") => Some(ResponseMethod::Whatsapp),
        Some("sms") => Some(ResponseMethod::Sms),
        Some("voice") => Some(ResponseMethod::Voice),
        _ => None,
    }
}

fn format_response_method(method: ResponseMethod) -> &'static str {
    match method {
        ResponseMethod::App => "app",
        ResponseMethod::Whatsapp => "whatsapp",
        ResponseMethod::Sms => "sms",
        ResponseMethod::Voice => "voice",
    }
}

fn parse_pairing_status(s: &str) -> PairingCodeStatus {
    match s {
        "used" => PairingCodeStatus::Used,
        "expired" => PairingCodeStatus::Expired,
        "revoked" => PairingCodeStatus::Revoked,
        _ => PairingCodeStatus::Active,
    }
}

fn format_pairing_status(status: PairingCodeStatus) -> &'static str {
    match status {
        PairingCodeStatus::Active => "active",
        PairingCodeStatus::Used => "used",
        PairingCodeStatus::Expired => "expired",
        PairingCodeStatus::Revoked => "revoked",
    }
}

fn parse_subscription_tier(s: &str) -> SubscriptionTier {
    match s {
        "one_way" => SubscriptionTier::OneWay,
        "two_way" => SubscriptionTier::TwoWay,
        "pro_family" => SubscriptionTier::ProFamily,
        _ => SubscriptionTier::Free,
    }
}

fn format_subscription_tier(tier: SubscriptionTier) -> &'static str {
    match tier {
        SubscriptionTier::Free => "free",
        SubscriptionTier::OneWay => "one_way",
        SubscriptionTier::TwoWay => "two_way",
        SubscriptionTier::ProFamily => "pro_family",
    }
}

fn parse_subscription_status(s: &str) -> SubscriptionStatus {
    match s {
        "active" => SubscriptionStatus::Active,
        "trialing" => SubscriptionStatus::Trialing,
        "past_due" => SubscriptionStatus::PastDue,
        "canceled" => SubscriptionStatus::Canceled,
        _ => SubscriptionStatus::Expired,
    }
}

fn format_subscription_status(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Trialing => "trialing",
        SubscriptionStatus::PastDue => "past_due",
        SubscriptionStatus::Canceled => "canceled",
        SubscriptionStatus::Expired => "expired",
    }
}

/// Parse datetime from RFC3339 string with fallback to current time.
/// A corrupt timestamp shifts due/grace math for that row, so the fallback
/// is logged rather than taken silently.
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!(value = dt_str, error = %e, "unparseable stored timestamp, substituting now");
            Utc::now()
        })
}

fn parse_datetime_opt(dt_str: Option<String>) -> Option<DateTime<Utc>> {
    dt_str.map(|s| parse_datetime_fallback(&s))
}

fn parse_date_opt(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn parse_channels_json(s: &str) -> PreferredChannels {
    serde_json::from_str(s).unwrap_or_default()
}

fn parse_steps_json(s: &str) -> Vec<EscalationStep> {
    serde_json::from_str(s).unwrap_or_default()
}

/// Build a Checkin from a database row (column order of SELECT_CHECKIN).
fn row_to_checkin(row: &rusqlite::Row) -> std::result::Result<Checkin, rusqlite::Error> {
    let due_at: String = row.get(3)?;
    let status: String = row.get(4)?;
    let method: Option<String> = row.get(6)?;
    Ok(Checkin {
        id: row.get(0)?,
        relationship_id: row.get(1)?,
        schedule_id: row.get(2)?,
        due_at: parse_datetime_fallback(&due_at),
        status: CheckinStatus::parse(&status),
        responded_at: parse_datetime_opt(row.get(5)?),
        response_method: parse_response_method(method.as_deref()),
        snooze_until: parse_datetime_opt(row.get(7)?),
        escalating_since: parse_datetime_opt(row.get(8)?),
        created_at: parse_datetime_fallback(&row.get::<_, String>(9)?),
        updated_at: parse_datetime_fallback(&row.get::<_, String>(10)?),
    })
}

const SELECT_CHECKIN: &str = "SELECT id, relationship_id, schedule_id, due_at, status, \
     responded_at, response_method, snooze_until, escalating_since, created_at, updated_at \
     FROM checkins";

fn row_to_schedule(row: &rusqlite::Row) -> std::result::Result<CheckinSchedule, rusqlite::Error> {
    let schedule_type: String = row.get(2)?;
    let days_json: Option<String> = row.get(4)?;
    Ok(CheckinSchedule {
        id: row.get(0)?,
        relationship_id: row.get(1)?,
        schedule_type: parse_schedule_type(&schedule_type),
        time_local: row.get(3)?,
        days_of_week: days_json.and_then(|s| serde_json::from_str(&s).ok()),
        start_date: parse_date_opt(row.get(5)?),
        end_date: parse_date_opt(row.get(6)?),
        grace_period_minutes: row.get::<_, i64>(7)? as u32,
        max_retries: row.get::<_, i64>(8)? as u32,
        retry_interval_minutes: row.get::<_, i64>(9)? as u32,
        is_enabled: row.get(10)?,
        created_at: parse_datetime_fallback(&row.get::<_, String>(11)?),
        updated_at: parse_datetime_fallback(&row.get::<_, String>(12)?),
    })
}

const SELECT_SCHEDULE: &str = "SELECT id, relationship_id, schedule_type, time_local, \
     days_of_week, start_date, end_date, grace_period_minutes, max_retries, \
     retry_interval_minutes, is_enabled, created_at, updated_at \
     FROM checkin_schedules";

fn row_to_event(row: &rusqlite::Row) -> std::result::Result<EscalationEvent, rusqlite::Error> {
    let channel: String = row.get(3)?;
    let status: String = row.get(5)?;
    Ok(EscalationEvent {
        id: row.get(0)?,
        checkin_id: row.get(1)?,
        step_index: row.get::<_, i64>(2)? as u32,
        channel: EscalationChannel::parse(&channel).unwrap_or(EscalationChannel::Push),
        target: row.get(4)?,
        status: DeliveryStatus::parse(&status),
        attempts: row.get::<_, i64>(6)? as u32,
        provider_message_id: row.get(7)?,
        error_code: row.get(8)?,
        error_message: row.get(9)?,
        sent_at: parse_datetime_opt(row.get(10)?),
        created_at: parse_datetime_fallback(&row.get::<_, String>(11)?),
    })
}

const SELECT_EVENT: &str = "SELECT id, checkin_id, step_index, channel, target, status, \
     attempts, provider_message_id, error_code, error_message, sent_at, created_at \
     FROM escalation_events";

/// Per-table deletion counts from a data-erasure request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct EraseSummary {
    pub escalation_events: usize,
    pub checkins: usize,
    pub checkin_schedules: usize,
    pub escalation_plans: usize,
    pub relationships: usize,
    pub loved_one_profiles: usize,
    pub contact_points: usize,
    pub device_tokens: usize,
    pub pairing_codes: usize,
    pub subscriptions: usize,
    pub users: usize,
}

impl EraseSummary {
    pub fn total(&self) -> usize {
        self.escalation_events
            + self.checkins
            + self.checkin_schedules
            + self.escalation_plans
            + self.relationships
            + self.loved_one_profiles
            + self.contact_points
            + self.device_tokens
            + self.pairing_codes
            + self.subscriptions
            + self.users
    }
}

/// SQLite database for the check-in domain.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the database at `~/.config/vigil/vigil.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?
            .join("vigil.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        // Create base tables (v1 schema) first. Later shapes are added by
        // incremental migrations.
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id                 TEXT PRIMARY KEY,
                    email              TEXT,
                    phone_e164         TEXT,
                    full_name          TEXT NOT NULL,
                    utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
                    created_at         TEXT NOT NULL,
                    updated_at         TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS loved_one_profiles (
                    id                 TEXT PRIMARY KEY,
                    owner_user_id      TEXT NOT NULL,
                    display_name       TEXT NOT NULL,
                    relationship_type  TEXT NOT NULL DEFAULT 'other',
                    preferred_channels TEXT NOT NULL DEFAULT '{}',
                    utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
                    phone_e164         TEXT,
                    email              TEXT,
                    is_active          INTEGER NOT NULL DEFAULT 1,
                    created_at         TEXT NOT NULL,
                    updated_at         TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS relationships (
                    id                   TEXT PRIMARY KEY,
                    owner_user_id        TEXT NOT NULL,
                    loved_one_profile_id TEXT NOT NULL,
                    mode                 TEXT NOT NULL DEFAULT 'one_way',
                    can_initiate_checkin INTEGER NOT NULL DEFAULT 1,
                    can_receive_alerts   INTEGER NOT NULL DEFAULT 1,
                    created_at           TEXT NOT NULL,
                    updated_at           TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS checkin_schedules (
                    id                     TEXT PRIMARY KEY,
                    relationship_id        TEXT NOT NULL,
                    schedule_type          TEXT NOT NULL DEFAULT 'daily',
                    time_local             TEXT NOT NULL,
                    days_of_week           TEXT,
                    start_date             TEXT,
                    end_date               TEXT,
                    grace_period_minutes   INTEGER NOT NULL DEFAULT 30,
                    max_retries            INTEGER NOT NULL DEFAULT 2,
                    retry_interval_minutes INTEGER NOT NULL DEFAULT 10,
                    is_enabled             INTEGER NOT NULL DEFAULT 1,
                    created_at             TEXT NOT NULL,
                    updated_at             TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS checkins (
                    id              TEXT PRIMARY KEY,
                    relationship_id TEXT NOT NULL,
                    schedule_id     TEXT NOT NULL,
                    due_at          TEXT NOT NULL,
                    status          TEXT NOT NULL DEFAULT 'pending',
                    responded_at    TEXT,
                    response_method TEXT,
                    snooze_until    TEXT,
                    created_at      TEXT NOT NULL,
                    updated_at      TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS escalation_plans (
                    id              TEXT PRIMARY KEY,
                    relationship_id TEXT NOT NULL,
                    plan_name       TEXT NOT NULL,
                    channel         TEXT,
                    delay_minutes   INTEGER,
                    is_active       INTEGER NOT NULL DEFAULT 1,
                    created_at      TEXT NOT NULL,
                    updated_at      TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS escalation_events (
                    id                  TEXT PRIMARY KEY,
                    checkin_id          TEXT NOT NULL,
                    step_index          INTEGER NOT NULL,
                    channel             TEXT NOT NULL,
                    target              TEXT NOT NULL,
                    status              TEXT NOT NULL DEFAULT 'queued',
                    provider_message_id TEXT,
                    error_code          TEXT,
                    error_message       TEXT,
                    sent_at             TEXT,
                    created_at          TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS contact_points (
                    id                 TEXT PRIMARY KEY,
                    owner_user_id      TEXT NOT NULL,
                    display_name       TEXT NOT NULL,
                    phone_e164         TEXT,
                    email              TEXT,
                    preferred_channels TEXT NOT NULL DEFAULT '{}',
                    priority           INTEGER NOT NULL DEFAULT 100,
                    created_at         TEXT NOT NULL,
                    updated_at         TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS device_tokens (
                    id                 TEXT PRIMARY KEY,
                    user_id            TEXT NOT NULL,
                    platform           TEXT NOT NULL,
                    token              TEXT NOT NULL,
                    is_active          INTEGER NOT NULL DEFAULT 1,
                    last_registered_at TEXT NOT NULL,
                    created_at         TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS pairing_codes (
                    id                   TEXT PRIMARY KEY,
                    code                 TEXT NOT NULL,
                    generated_by_user_id TEXT NOT NULL,
                    expires_at           TEXT NOT NULL,
                    used_at              TEXT,
                    status               TEXT NOT NULL DEFAULT 'active',
                    created_at           TEXT NOT NULL
                );",
            )
            .map_err(DatabaseError::from)?;

        // Run incremental migrations (v1 -> v2 -> v3, etc.)
        migrations::migrate(&self.conn).map_err(DatabaseError::from)?;

        // Deduplication indexes (idempotent, run after migrations add the
        // columns). These back the evaluator's conditional insert and the
        // one-event-per-step invariant.
        self.conn
            .execute_batch(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_checkins_schedule_due
                 ON checkins(schedule_id, due_at);
                 CREATE UNIQUE INDEX IF NOT EXISTS idx_events_checkin_step
                 ON escalation_events(checkin_id, step_index);",
            )
            .map_err(DatabaseError::from)?;

        Ok(())
    }

    // === Users ===

    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, email, phone_e164, full_name, utc_offset_minutes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                phone_e164 = excluded.phone_e164,
                full_name = excluded.full_name,
                utc_offset_minutes = excluded.utc_offset_minutes,
                updated_at = excluded.updated_at",
            params![
                user.id,
                user.email,
                user.phone_e164,
                user.full_name,
                user.utc_offset_minutes,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, email, phone_e164, full_name, utc_offset_minutes, created_at, updated_at
                 FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        phone_e164: row.get(2)?,
                        full_name: row.get(3)?,
                        utc_offset_minutes: row.get(4)?,
                        created_at: parse_datetime_fallback(&row.get::<_, String>(5)?),
                        updated_at: parse_datetime_fallback(&row.get::<_, String>(6)?),
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    // === Loved-one profiles ===

    pub fn create_profile(&self, profile: &LovedOneProfile) -> Result<()> {
        self.conn.execute(
            "INSERT INTO loved_one_profiles
             (id, owner_user_id, display_name, relationship_type, preferred_channels,
              utc_offset_minutes, phone_e164, email, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                profile.id,
                profile.owner_user_id,
                profile.display_name,
                format_relationship_type(profile.relationship_type),
                serde_json::to_string(&profile.preferred_channels)?,
                profile.utc_offset_minutes,
                profile.phone_e164,
                profile.email,
                profile.is_active,
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<LovedOneProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, owner_user_id, display_name, relationship_type, preferred_channels,
                        utc_offset_minutes, phone_e164, email, is_active, created_at, updated_at
                 FROM loved_one_profiles WHERE id = ?1",
                [id],
                |row| {
                    let relationship_type: String = row.get(3)?;
                    let channels: String = row.get(4)?;
                    Ok(LovedOneProfile {
                        id: row.get(0)?,
                        owner_user_id: row.get(1)?,
                        display_name: row.get(2)?,
                        relationship_type: parse_relationship_type(&relationship_type),
                        preferred_channels: parse_channels_json(&channels),
                        utc_offset_minutes: row.get(5)?,
                        phone_e164: row.get(6)?,
                        email: row.get(7)?,
                        is_active: row.get(8)?,
                        created_at: parse_datetime_fallback(&row.get::<_, String>(9)?),
                        updated_at: parse_datetime_fallback(&row.get::<_, String>(10)?),
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn list_profiles_by_owner(&self, owner_user_id: &str) -> Result<Vec<LovedOneProfile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM loved_one_profiles WHERE owner_user_id = ?1 ORDER BY created_at",
        )?;
        let ids: Vec<String> = stmt
            .query_map([owner_user_id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(p) = self.get_profile(&id)? {
                profiles.push(p);
            }
        }
        Ok(profiles)
    }

    pub fn set_profile_active(&self, id: &str, is_active: bool, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE loved_one_profiles SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, is_active, now.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    // === Relationships ===

    pub fn create_relationship(&self, relationship: &Relationship) -> Result<()> {
        self.conn.execute(
            "INSERT INTO relationships
             (id, owner_user_id, loved_one_profile_id, mode, can_initiate_checkin,
              can_receive_alerts, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                relationship.id,
                relationship.owner_user_id,
                relationship.loved_one_profile_id,
                format_relationship_mode(relationship.mode),
                relationship.can_initiate_checkin,
                relationship.can_receive_alerts,
                relationship.created_at.to_rfc3339(),
                relationship.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_relationship(&self, id: &str) -> Result<Option<Relationship>> {
        let relationship = self
            .conn
            .query_row(
                "SELECT id, owner_user_id, loved_one_profile_id, mode, can_initiate_checkin,
                        can_receive_alerts, created_at, updated_at
                 FROM relationships WHERE id = ?1",
                [id],
                |row| {
                    let mode: String = row.get(3)?;
                    Ok(Relationship {
                        id: row.get(0)?,
                        owner_user_id: row.get(1)?,
                        loved_one_profile_id: row.get(2)?,
                        mode: parse_relationship_mode(&mode),
                        can_initiate_checkin: row.get(4)?,
                        can_receive_alerts: row.get(5)?,
                        created_at: parse_datetime_fallback(&row.get::<_, String>(6)?),
                        updated_at: parse_datetime_fallback(&row.get::<_, String>(7)?),
                    })
                },
            )
            .optional()?;
        Ok(relationship)
    }

    pub fn list_relationships_by_owner(&self, owner_user_id: &str) -> Result<Vec<Relationship>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM relationships WHERE owner_user_id = ?1 ORDER BY created_at",
        )?;
        let ids: Vec<String> = stmt
            .query_map([owner_user_id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(r) = self.get_relationship(&id)? {
                out.push(r);
            }
        }
        Ok(out)
    }

    /// Relationships watching one loved-one profile. The deactivation
    /// sweep walks these to cancel open checkins.
    pub fn list_relationships_by_profile(&self, profile_id: &str) -> Result<Vec<Relationship>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM relationships WHERE loved_one_profile_id = ?1 ORDER BY created_at",
        )?;
        let ids: Vec<String> = stmt
            .query_map([profile_id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(r) = self.get_relationship(&id)? {
                out.push(r);
            }
        }
        Ok(out)
    }

    /// Delete a relationship and everything it owns (schedule, plan,
    /// checkins, events) in one transaction.
    pub fn delete_relationship(&self, id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM escalation_events WHERE checkin_id IN
             (SELECT id FROM checkins WHERE relationship_id = ?1)",
            [id],
        )?;
        tx.execute("DELETE FROM checkins WHERE relationship_id = ?1", [id])?;
        tx.execute("DELETE FROM checkin_schedules WHERE relationship_id = ?1", [id])?;
        tx.execute("DELETE FROM escalation_plans WHERE relationship_id = ?1", [id])?;
        tx.execute("DELETE FROM relationships WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(())
    }

    // === Schedules ===

    pub fn create_schedule(&self, schedule: &CheckinSchedule) -> Result<()> {
        schedule.validate().map_err(crate::error::CoreError::Validation)?;
        self.conn.execute(
            "INSERT INTO checkin_schedules
             (id, relationship_id, schedule_type, time_local, days_of_week, start_date,
              end_date, grace_period_minutes, max_retries, retry_interval_minutes,
              is_enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                schedule.id,
                schedule.relationship_id,
                format_schedule_type(schedule.schedule_type),
                schedule.time_local,
                schedule
                    .days_of_week
                    .as_ref()
                    .map(|d| serde_json::to_string(d))
                    .transpose()?,
                schedule.start_date.map(|d| d.to_string()),
                schedule.end_date.map(|d| d.to_string()),
                schedule.grace_period_minutes,
                schedule.max_retries,
                schedule.retry_interval_minutes,
                schedule.is_enabled,
                schedule.created_at.to_rfc3339(),
                schedule.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_schedule(&self, id: &str) -> Result<Option<CheckinSchedule>> {
        let schedule = self
            .conn
            .query_row(
                &format!("{SELECT_SCHEDULE} WHERE id = ?1"),
                [id],
                row_to_schedule,
            )
            .optional()?;
        Ok(schedule)
    }

    pub fn set_schedule_enabled(&self, id: &str, is_enabled: bool, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE checkin_schedules SET is_enabled = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, is_enabled, now.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    pub fn list_schedules_by_relationship(&self, relationship_id: &str) -> Result<Vec<CheckinSchedule>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_SCHEDULE} WHERE relationship_id = ?1 ORDER BY created_at"))?;
        let schedules = stmt
            .query_map([relationship_id], row_to_schedule)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(schedules)
    }

    /// Enabled schedules whose relationship points at an active profile,
    /// paired with the profile's UTC offset. This is the evaluator's work
    /// list for a tick.
    pub fn list_evaluable_schedules(&self) -> Result<Vec<(CheckinSchedule, i32)>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.relationship_id, s.schedule_type, s.time_local, s.days_of_week,
                    s.start_date, s.end_date, s.grace_period_minutes, s.max_retries,
                    s.retry_interval_minutes, s.is_enabled, s.created_at, s.updated_at,
                    p.utc_offset_minutes
             FROM checkin_schedules s
             JOIN relationships r ON r.id = s.relationship_id
             JOIN loved_one_profiles p ON p.id = r.loved_one_profile_id
             WHERE s.is_enabled = 1 AND p.is_active = 1
             ORDER BY s.created_at",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let schedule = row_to_schedule(row)?;
                let offset: i32 = row.get(13)?;
                Ok((schedule, offset))
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(rows)
    }

    // === Checkins ===

    /// Conditional insert backed by the unique (schedule_id, due_at) index.
    /// Returns `true` if the row was created, `false` if a checkin for this
    /// firing already exists.
    pub fn create_checkin_if_absent(&self, checkin: &Checkin) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO checkins
             (id, relationship_id, schedule_id, due_at, status, responded_at,
              response_method, snooze_until, escalating_since, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                checkin.id,
                checkin.relationship_id,
                checkin.schedule_id,
                checkin.due_at.to_rfc3339(),
                checkin.status.as_str(),
                checkin.responded_at.map(|t| t.to_rfc3339()),
                checkin.response_method.map(format_response_method),
                checkin.snooze_until.map(|t| t.to_rfc3339()),
                checkin.escalating_since.map(|t| t.to_rfc3339()),
                checkin.created_at.to_rfc3339(),
                checkin.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn get_checkin(&self, id: &str) -> Result<Option<Checkin>> {
        let checkin = self
            .conn
            .query_row(&format!("{SELECT_CHECKIN} WHERE id = ?1"), [id], row_to_checkin)
            .optional()?;
        Ok(checkin)
    }

    pub fn list_checkins_by_relationship(&self, relationship_id: &str) -> Result<Vec<Checkin>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_CHECKIN} WHERE relationship_id = ?1 ORDER BY due_at"))?;
        let checkins = stmt
            .query_map([relationship_id], row_to_checkin)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(checkins)
    }

    pub fn list_checkins_in_status(&self, status: CheckinStatus) -> Result<Vec<Checkin>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_CHECKIN} WHERE status = ?1 ORDER BY due_at"))?;
        let checkins = stmt
            .query_map([status.as_str()], row_to_checkin)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(checkins)
    }

    // Checkin transitions. All compare-and-swap on the status column.

    /// pending|snoozed -> confirmed
    pub fn mark_confirmed(&self, id: &str, method: ResponseMethod, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE checkins
             SET status = 'confirmed', responded_at = ?2, response_method = ?3, updated_at = ?2
             WHERE id = ?1 AND status IN ('pending', 'snoozed')",
            params![id, now.to_rfc3339(), format_response_method(method)],
        )?;
        Ok(changed > 0)
    }

    /// escalating -> resolved
    pub fn mark_resolved(&self, id: &str, method: ResponseMethod, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE checkins
             SET status = 'resolved', responded_at = ?2, response_method = ?3, updated_at = ?2
             WHERE id = ?1 AND status = 'escalating'",
            params![id, now.to_rfc3339(), format_response_method(method)],
        )?;
        Ok(changed > 0)
    }

    /// pending -> snoozed
    pub fn mark_snoozed(&self, id: &str, snooze_until: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE checkins
             SET status = 'snoozed', snooze_until = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'pending'",
            params![id, snooze_until.to_rfc3339(), now.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// snoozed -> pending (snooze elapsed, grace countdown restarts from
    /// snooze_until which stays on the row)
    pub fn rearm_snoozed(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE checkins SET status = 'pending', updated_at = ?2
             WHERE id = ?1 AND status = 'snoozed'",
            params![id, now.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// pending -> escalating, recording the anchor for step delays
    pub fn mark_escalating(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE checkins
             SET status = 'escalating', escalating_since = ?2, updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, now.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// escalating -> escalated (plan exhausted)
    pub fn mark_escalated(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE checkins SET status = 'escalated', updated_at = ?2
             WHERE id = ?1 AND status = 'escalating'",
            params![id, now.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// any non-terminal -> canceled
    pub fn mark_canceled(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE checkins SET status = 'canceled', updated_at = ?2
             WHERE id = ?1 AND status IN ('pending', 'snoozed', 'escalating')",
            params![id, now.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// Cancel every non-terminal checkin for a relationship (deactivation
    /// path). Returns the number of rows canceled.
    pub fn cancel_checkins_for_relationship(&self, relationship_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE checkins SET status = 'canceled', updated_at = ?2
             WHERE relationship_id = ?1 AND status IN ('pending', 'snoozed', 'escalating')",
            params![relationship_id, now.to_rfc3339()],
        )?;
        Ok(changed)
    }

    // === Escalation plans ===

    /// Insert a plan. When the plan is active, any previously active plan
    /// for the same relationship is deactivated in the same transaction, so
    /// at most one stays active.
    pub fn create_plan(&self, plan: &EscalationPlan) -> Result<()> {
        plan.validate().map_err(crate::error::CoreError::Validation)?;
        let tx = self.conn.unchecked_transaction()?;
        if plan.is_active {
            tx.execute(
                "UPDATE escalation_plans SET is_active = 0, updated_at = ?2
                 WHERE relationship_id = ?1 AND is_active = 1",
                params![plan.relationship_id, plan.updated_at.to_rfc3339()],
            )?;
        }
        tx.execute(
            "INSERT INTO escalation_plans
             (id, relationship_id, plan_name, steps, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                plan.id,
                plan.relationship_id,
                plan.plan_name,
                serde_json::to_string(&plan.steps)?,
                plan.is_active,
                plan.created_at.to_rfc3339(),
                plan.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn set_plan_active(&self, id: &str, active: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE escalation_plans SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, active, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "escalation_plan",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn get_active_plan(&self, relationship_id: &str) -> Result<Option<EscalationPlan>> {
        let plan = self
            .conn
            .query_row(
                "SELECT id, relationship_id, plan_name, steps, is_active, created_at, updated_at
                 FROM escalation_plans
                 WHERE relationship_id = ?1 AND is_active = 1",
                [relationship_id],
                |row| {
                    let steps: String = row.get(3)?;
                    Ok(EscalationPlan {
                        id: row.get(0)?,
                        relationship_id: row.get(1)?,
                        plan_name: row.get(2)?,
                        steps: parse_steps_json(&steps),
                        is_active: row.get(4)?,
                        created_at: parse_datetime_fallback(&row.get::<_, String>(5)?),
                        updated_at: parse_datetime_fallback(&row.get::<_, String>(6)?),
                    })
                },
            )
            .optional()?;
        Ok(plan)
    }

    /// Every plan for the relationship, active and retired.
    pub fn list_plans_by_relationship(&self, relationship_id: &str) -> Result<Vec<EscalationPlan>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, relationship_id, plan_name, steps, is_active, created_at, updated_at
             FROM escalation_plans WHERE relationship_id = ?1 ORDER BY created_at",
        )?;
        let plans = stmt
            .query_map([relationship_id], |row| {
                let steps: String = row.get(3)?;
                Ok(EscalationPlan {
                    id: row.get(0)?,
                    relationship_id: row.get(1)?,
                    plan_name: row.get(2)?,
                    steps: parse_steps_json(&steps),
                    is_active: row.get(4)?,
                    created_at: parse_datetime_fallback(&row.get::<_, String>(5)?),
                    updated_at: parse_datetime_fallback(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(plans)
    }

    // === Escalation events ===

    /// Conditional insert backed by the unique (checkin_id, step_index)
    /// index. Returns `true` if this dispatcher instance owns the step.
    pub fn create_event_if_absent(&self, event: &EscalationEvent) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO escalation_events
             (id, checkin_id, step_index, channel, target, status, attempts,
              provider_message_id, error_code, error_message, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                event.id,
                event.checkin_id,
                event.step_index,
                event.channel.as_str(),
                event.target,
                event.status.as_str(),
                event.attempts,
                event.provider_message_id,
                event.error_code,
                event.error_message,
                event.sent_at.map(|t| t.to_rfc3339()),
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Record the outcome of one send attempt on an existing event row.
    pub fn record_event_attempt(&self, event: &EscalationEvent) -> Result<()> {
        self.conn.execute(
            "UPDATE escalation_events
             SET status = ?2, attempts = ?3, provider_message_id = ?4,
                 error_code = ?5, error_message = ?6, sent_at = ?7
             WHERE id = ?1",
            params![
                event.id,
                event.status.as_str(),
                event.attempts,
                event.provider_message_id,
                event.error_code,
                event.error_message,
                event.sent_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn list_events_for_checkin(&self, checkin_id: &str) -> Result<Vec<EscalationEvent>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_EVENT} WHERE checkin_id = ?1 ORDER BY step_index"))?;
        let events = stmt
            .query_map([checkin_id], row_to_event)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(events)
    }

    // === Contact points ===

    pub fn create_contact_point(&self, contact: &ContactPoint) -> Result<()> {
        self.conn.execute(
            "INSERT INTO contact_points
             (id, owner_user_id, display_name, phone_e164, email, preferred_channels,
              priority, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                contact.id,
                contact.owner_user_id,
                contact.display_name,
                contact.phone_e164,
                contact.email,
                serde_json::to_string(&contact.preferred_channels)?,
                contact.priority,
                contact.created_at.to_rfc3339(),
                contact.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Contact points for an owner, highest priority (lowest value) first.
    pub fn list_contact_points(&self, owner_user_id: &str) -> Result<Vec<ContactPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_user_id, display_name, phone_e164, email, preferred_channels,
                    priority, created_at, updated_at
             FROM contact_points WHERE owner_user_id = ?1
             ORDER BY priority, created_at",
        )?;
        let contacts = stmt
            .query_map([owner_user_id], |row| {
                let channels: String = row.get(5)?;
                Ok(ContactPoint {
                    id: row.get(0)?,
                    owner_user_id: row.get(1)?,
                    display_name: row.get(2)?,
                    phone_e164: row.get(3)?,
                    email: row.get(4)?,
                    preferred_channels: parse_channels_json(&channels),
                    priority: row.get(6)?,
                    created_at: parse_datetime_fallback(&row.get::<_, String>(7)?),
                    updated_at: parse_datetime_fallback(&row.get::<_, String>(8)?),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(contacts)
    }

    pub fn delete_contact_point(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM contact_points WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "contact_point",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    // === Device tokens ===

    pub fn upsert_device_token(&self, token: &DeviceToken) -> Result<()> {
        self.conn.execute(
            "INSERT INTO device_tokens
             (id, user_id, platform, token, is_active, last_registered_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                token = excluded.token,
                is_active = excluded.is_active,
                last_registered_at = excluded.last_registered_at",
            params![
                token.id,
                token.user_id,
                token.platform,
                token.token,
                token.is_active,
                token.last_registered_at.to_rfc3339(),
                token.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_active_device_tokens(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        self.query_device_tokens(
            "SELECT id, user_id, platform, token, is_active, last_registered_at, created_at
             FROM device_tokens WHERE user_id = ?1 AND is_active = 1
             ORDER BY last_registered_at DESC",
            user_id,
        )
    }

    /// Every token for the user, active or not. Export needs the full set.
    pub fn list_device_tokens(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        self.query_device_tokens(
            "SELECT id, user_id, platform, token, is_active, last_registered_at, created_at
             FROM device_tokens WHERE user_id = ?1
             ORDER BY last_registered_at DESC",
            user_id,
        )
    }

    fn query_device_tokens(&self, sql: &str, user_id: &str) -> Result<Vec<DeviceToken>> {
        let mut stmt = self.conn.prepare(sql)?;
        let tokens = stmt
            .query_map([user_id], |row| {
                Ok(DeviceToken {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    platform: row.get(2)?,
                    token: row.get(3)?,
                    is_active: row.get(4)?,
                    last_registered_at: parse_datetime_fallback(&row.get::<_, String>(5)?),
                    created_at: parse_datetime_fallback(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(tokens)
    }

    // === Pairing codes ===

    pub fn create_pairing_code(&self, code: &PairingCode) -> Result<()> {
        self.conn.execute(
            "INSERT INTO pairing_codes
             (id, code, generated_by_user_id, expires_at, used_at, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                code.id,
                code.code,
                code.generated_by_user_id,
                code.expires_at.to_rfc3339(),
                code.used_at.map(|t| t.to_rfc3339()),
                format_pairing_status(code.status),
                code.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_pairing_codes(&self, user_id: &str) -> Result<Vec<PairingCode>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, generated_by_user_id, expires_at, used_at, status, created_at
             FROM pairing_codes WHERE generated_by_user_id = ?1
             ORDER BY created_at DESC",
        )?;
        let codes = stmt
            .query_map([user_id], |row| {
                let status: String = row.get(5)?;
                Ok(PairingCode {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    generated_by_user_id: row.get(2)?,
                    expires_at: parse_datetime_fallback(&row.get::<_, String>(3)?),
                    used_at: parse_datetime_opt(row.get(4)?),
                    status: parse_pairing_status(&status),
                    created_at: parse_datetime_fallback(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(codes)
    }

    // === Subscriptions ===

    pub fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.conn.execute(
            "INSERT INTO subscriptions
             (id, user_id, platform, product_id, tier, status, current_period_start,
              current_period_end, external_transaction_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                tier = excluded.tier,
                status = excluded.status,
                current_period_start = excluded.current_period_start,
                current_period_end = excluded.current_period_end,
                external_transaction_id = excluded.external_transaction_id,
                updated_at = excluded.updated_at",
            params![
                subscription.id,
                subscription.user_id,
                subscription.platform,
                subscription.product_id,
                format_subscription_tier(subscription.tier),
                format_subscription_status(subscription.status),
                subscription.current_period_start.map(|t| t.to_rfc3339()),
                subscription.current_period_end.map(|t| t.to_rfc3339()),
                subscription.external_transaction_id,
                subscription.created_at.to_rfc3339(),
                subscription.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, platform, product_id, tier, status, current_period_start,
                    current_period_end, external_transaction_id, created_at, updated_at
             FROM subscriptions WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let subscriptions = stmt
            .query_map([user_id], |row| {
                let tier: String = row.get(4)?;
                let status: String = row.get(5)?;
                Ok(Subscription {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    platform: row.get(2)?,
                    product_id: row.get(3)?,
                    tier: parse_subscription_tier(&tier),
                    status: parse_subscription_status(&status),
                    current_period_start: parse_datetime_opt(row.get(6)?),
                    current_period_end: parse_datetime_opt(row.get(7)?),
                    external_transaction_id: row.get(8)?,
                    created_at: parse_datetime_fallback(&row.get::<_, String>(9)?),
                    updated_at: parse_datetime_fallback(&row.get::<_, String>(10)?),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(subscriptions)
    }

    // === Erasure ===

    /// Delete every domain row owned by a user, in foreign-key order, in one
    /// transaction. Keeps the user row and its subscriptions unless
    /// `include_user` is set. Idempotent: zero rows to delete is a valid
    /// outcome.
    pub fn erase_user_data(&self, user_id: &str, include_user: bool) -> Result<EraseSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let mut summary = EraseSummary::default();

        summary.escalation_events = tx.execute(
            "DELETE FROM escalation_events WHERE checkin_id IN
             (SELECT c.id FROM checkins c
              JOIN relationships r ON r.id = c.relationship_id
              WHERE r.owner_user_id = ?1)",
            [user_id],
        )?;
        summary.checkins = tx.execute(
            "DELETE FROM checkins WHERE relationship_id IN
             (SELECT id FROM relationships WHERE owner_user_id = ?1)",
            [user_id],
        )?;
        summary.checkin_schedules = tx.execute(
            "DELETE FROM checkin_schedules WHERE relationship_id IN
             (SELECT id FROM relationships WHERE owner_user_id = ?1)",
            [user_id],
        )?;
        summary.escalation_plans = tx.execute(
            "DELETE FROM escalation_plans WHERE relationship_id IN
             (SELECT id FROM relationships WHERE owner_user_id = ?1)",
            [user_id],
        )?;
        summary.relationships =
            tx.execute("DELETE FROM relationships WHERE owner_user_id = ?1", [user_id])?;
        summary.loved_one_profiles = tx.execute(
            "DELETE FROM loved_one_profiles WHERE owner_user_id = ?1",
            [user_id],
        )?;
        summary.contact_points =
            tx.execute("DELETE FROM contact_points WHERE owner_user_id = ?1", [user_id])?;
        summary.device_tokens =
            tx.execute("DELETE FROM device_tokens WHERE user_id = ?1", [user_id])?;
        summary.pairing_codes = tx.execute(
            "DELETE FROM pairing_codes WHERE generated_by_user_id = ?1",
            [user_id],
        )?;
        if include_user {
            summary.subscriptions = tx.execute(
                "DELETE FROM subscriptions WHERE user_id = ?1",
                [user_id],
            )?;
            summary.users = tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
        }

        tx.commit()?;
        Ok(summary)
    }

    /// Row count for a table, scoped to an owner. Used by tests and the
    /// privacy surface to verify erasure.
    #[cfg(test)]
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
