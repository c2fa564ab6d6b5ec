//! Check-in schedule commands.

use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use vigil_core::model::ScheduleType;
use vigil_core::{CheckinSchedule, Store};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Create a check-in schedule
    Create {
        /// Relationship ID
        relationship: String,
        /// Local time of day, "HH:MM", in the loved one's UTC offset
        time: String,
        /// Comma-separated days, 0 = Monday .. 6 = Sunday. Makes the
        /// schedule fire only on those days
        #[arg(long)]
        days: Option<String>,
        /// First valid date (YYYY-MM-DD); makes the schedule temporary
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Last valid date (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,
        /// Minutes after the due time before escalation starts
        #[arg(long)]
        grace: Option<u32>,
        /// Send retries per escalation step
        #[arg(long)]
        max_retries: Option<u32>,
        /// Minutes between send retries
        #[arg(long)]
        retry_interval: Option<u32>,
    },
    /// List schedules for a relationship
    List {
        /// Relationship ID
        relationship: String,
    },
    /// Enable a schedule
    Enable {
        /// Schedule ID
        id: String,
    },
    /// Disable a schedule
    Disable {
        /// Schedule ID
        id: String,
    },
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        ScheduleAction::Create {
            relationship,
            time,
            days,
            start_date,
            end_date,
            grace,
            max_retries,
            retry_interval,
        } => {
            let mut schedule = CheckinSchedule::new_daily(&relationship, &time, Utc::now());
            if let Some(days) = days {
                let parsed: Result<Vec<u8>, _> =
                    days.split(',').map(|d| d.trim().parse::<u8>()).collect();
                schedule.days_of_week = Some(parsed?);
                schedule.schedule_type = ScheduleType::MultiDaily;
            }
            if start_date.is_some() || end_date.is_some() {
                schedule.start_date = start_date;
                schedule.end_date = end_date;
                if schedule.days_of_week.is_none() {
                    schedule.schedule_type = ScheduleType::Temporary;
                }
            }
            if let Some(g) = grace {
                schedule.grace_period_minutes = g;
            }
            if let Some(m) = max_retries {
                schedule.max_retries = m;
            }
            if let Some(r) = retry_interval {
                schedule.retry_interval_minutes = r;
            }

            store.create_schedule(&schedule)?;
            println!("Schedule created: {}", schedule.id);
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        ScheduleAction::List { relationship } => {
            let schedules = store.list_schedules_by_relationship(&relationship)?;
            println!("{}", serde_json::to_string_pretty(&schedules)?);
        }
        ScheduleAction::Enable { id } => {
            if store.set_schedule_enabled(&id, true, Utc::now())? {
                println!("Schedule enabled: {id}");
            } else {
                println!("Schedule not found: {id}");
            }
        }
        ScheduleAction::Disable { id } => {
            if store.set_schedule_enabled(&id, false, Utc::now())? {
                println!("Schedule disabled: {id}");
            } else {
                println!("Schedule not found: {id}");
            }
        }
    }
    Ok(())
}
