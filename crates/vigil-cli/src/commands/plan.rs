//! Escalation plan commands.

use chrono::Utc;
use clap::Subcommand;
use uuid::Uuid;
use vigil_core::{EscalationPlan, EscalationStep, Store};

#[derive(Subcommand)]
pub enum PlanAction {
    /// Replace the active plan with steps from JSON
    Set {
        /// Relationship ID
        relationship: String,
        /// JSON array of steps, e.g. [{"channel":"push","delay_min":0}]
        json: String,
        /// Plan name
        #[arg(long, default_value = "Custom")]
        name: String,
    },
    /// Show the active plan
    Show {
        /// Relationship ID
        relationship: String,
    },
    /// Reset to the default push/whatsapp/sms/voice ladder
    Reset {
        /// Relationship ID
        relationship: String,
    },
    /// List every plan for a relationship, retired ones included
    History {
        /// Relationship ID
        relationship: String,
    },
}

pub fn run(action: PlanAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        PlanAction::Set { relationship, json, name } => {
            let steps: Vec<EscalationStep> = serde_json::from_str(&json)?;
            let now = Utc::now();
            let plan = EscalationPlan {
                id: Uuid::new_v4().to_string(),
                relationship_id: relationship,
                plan_name: name,
                steps,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            store.create_plan(&plan)?;
            println!("Plan set: {}", plan.id);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        PlanAction::Show { relationship } => match store.get_active_plan(&relationship)? {
            Some(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
            None => println!("No active plan for relationship: {relationship}"),
        },
        PlanAction::Reset { relationship } => {
            let plan = EscalationPlan::default_for(&relationship, Utc::now());
            store.create_plan(&plan)?;
            println!("Plan reset to default: {}", plan.id);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        PlanAction::History { relationship } => {
            let plans = store.list_plans_by_relationship(&relationship)?;
            println!("{}", serde_json::to_string_pretty(&plans)?);
        }
    }
    Ok(())
}
