use chrono::Utc;
use clap::Subcommand;
use uuid::Uuid;
use vigil_core::{ContactPoint, Store};

use super::profile::parse_channels;

#[derive(Subcommand)]
pub enum ContactAction {
    /// Add an emergency contact
    Add {
        /// Owner user ID
        owner: String,
        /// Display name
        name: String,
        /// Phone number in E.164 form
        #[arg(long)]
        phone: Option<String>,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Comma-separated channels this contact accepts
        #[arg(long, default_value = "whatsapp,sms,voice")]
        channels: String,
        /// Lower values are contacted first
        #[arg(long, default_value = "1")]
        priority: i32,
    },
    /// List contacts for an owner, highest priority first
    List {
        /// Owner user ID
        owner: String,
    },
    /// Remove a contact
    Remove {
        /// Contact ID
        id: String,
    },
}

pub fn run(action: ContactAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        ContactAction::Add {
            owner,
            name,
            phone,
            email,
            channels,
            priority,
        } => {
            let now = Utc::now();
            let contact = ContactPoint {
                id: Uuid::new_v4().to_string(),
                owner_user_id: owner,
                display_name: name,
                phone_e164: phone,
                email,
                preferred_channels: parse_channels(&channels)?,
                priority,
                created_at: now,
                updated_at: now,
            };
            store.create_contact_point(&contact)?;
            println!("Contact added: {}", contact.id);
            println!("{}", serde_json::to_string_pretty(&contact)?);
        }
        ContactAction::List { owner } => {
            let contacts = store.list_contact_points(&owner)?;
            println!("{}", serde_json::to_string_pretty(&contacts)?);
        }
        ContactAction::Remove { id } => {
            store.delete_contact_point(&id)?;
            println!("Contact removed: {id}");
        }
    }
    Ok(())
}
