//! Check-in inspection and response commands.

use chrono::{Duration, Utc};
use clap::Subcommand;
use vigil_core::model::ResponseMethod;
use vigil_core::{Lifecycle, Store};

#[derive(Subcommand)]
pub enum CheckinAction {
    /// List check-ins for a relationship
    List {
        /// Relationship ID
        relationship: String,
        /// Filter by status (pending, snoozed, escalating, ...)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one check-in
    Show {
        /// Check-in ID
        id: String,
    },
    /// Record a response ("I'm okay")
    Respond {
        /// Check-in ID
        id: String,
        /// app, whatsapp, sms, or voice
        #[arg(long, default_value = "app")]
        method: String,
    },
    /// Push the grace deadline back
    Snooze {
        /// Check-in ID
        id: String,
        /// Snooze length in minutes
        #[arg(long, default_value = "15")]
        minutes: u32,
    },
    /// Cancel a check-in
    Cancel {
        /// Check-in ID
        id: String,
    },
    /// Show the escalation events recorded for a check-in
    Events {
        /// Check-in ID
        id: String,
    },
    /// Print a status snapshot event for a check-in
    Status {
        /// Check-in ID
        id: String,
    },
}

pub fn run(action: CheckinAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;
    let lifecycle = Lifecycle::new(&store);

    match action {
        CheckinAction::List { relationship, status } => {
            let checkins = store.list_checkins_by_relationship(&relationship)?;
            let filtered: Vec<_> = checkins
                .into_iter()
                .filter(|c| match &status {
                    Some(s) => c.status.as_str() == s.as_str(),
                    None => true,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        CheckinAction::Show { id } => match store.get_checkin(&id)? {
            Some(checkin) => println!("{}", serde_json::to_string_pretty(&checkin)?),
            None => println!("Check-in not found: {id}"),
        },
        CheckinAction::Respond { id, method } => {
            let method = match method.as_str() {
                "whatsapp" => ResponseMethod::Whatsapp,
                "sms" => ResponseMethod::Sms,
                "voice" => ResponseMethod::Voice,
                _ => ResponseMethod::App,
            };
            match lifecycle.respond(&id, method, Utc::now())? {
                Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
                None => println!("Check-in already settled: {id}"),
            }
        }
        CheckinAction::Snooze { id, minutes } => {
            let now = Utc::now();
            let until = now + Duration::minutes(minutes as i64);
            match lifecycle.snooze(&id, until, now)? {
                Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
                None => println!("Check-in not snoozable: {id}"),
            }
        }
        CheckinAction::Cancel { id } => match lifecycle.cancel(&id, Utc::now())? {
            Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
            None => println!("Check-in already settled: {id}"),
        },
        CheckinAction::Events { id } => {
            let events = store.list_events_for_checkin(&id)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        CheckinAction::Status { id } => {
            let snapshot = lifecycle.snapshot(&id, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }
    Ok(())
}
