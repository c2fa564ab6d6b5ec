use chrono::Utc;
use clap::Subcommand;
use uuid::Uuid;
use vigil_core::model::RelationshipMode;
use vigil_core::{Relationship, Store};

#[derive(Subcommand)]
pub enum RelationshipAction {
    /// Link an owner to a loved-one profile
    Create {
        /// Owner user ID
        owner: String,
        /// Loved-one profile ID
        profile: String,
        /// one_way or two_way
        #[arg(long, default_value = "one_way")]
        mode: String,
    },
    /// List relationships for an owner
    List {
        /// Owner user ID
        owner: String,
    },
    /// Delete a relationship and everything under it
    Delete {
        /// Relationship ID
        id: String,
    },
}

pub fn run(action: RelationshipAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        RelationshipAction::Create { owner, profile, mode } => {
            let now = Utc::now();
            let relationship = Relationship {
                id: Uuid::new_v4().to_string(),
                owner_user_id: owner,
                loved_one_profile_id: profile,
                mode: match mode.as_str() {
                    "two_way" => RelationshipMode::TwoWay,
                    _ => RelationshipMode::OneWay,
                },
                can_initiate_checkin: true,
                can_receive_alerts: true,
                created_at: now,
                updated_at: now,
            };
            store.create_relationship(&relationship)?;
            println!("Relationship created: {}", relationship.id);
            println!("{}", serde_json::to_string_pretty(&relationship)?);
        }
        RelationshipAction::List { owner } => {
            let relationships = store.list_relationships_by_owner(&owner)?;
            println!("{}", serde_json::to_string_pretty(&relationships)?);
        }
        RelationshipAction::Delete { id } => {
            store.delete_relationship(&id)?;
            println!("Relationship deleted: {id}");
        }
    }
    Ok(())
}
