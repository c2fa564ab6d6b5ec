//! Loved-one profile commands.

use chrono::Utc;
use clap::Subcommand;
use uuid::Uuid;
use vigil_core::model::{PreferredChannels, RelationshipType};
use vigil_core::{EscalationChannel, Lifecycle, LovedOneProfile, Store};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Create a loved-one profile
    Create {
        /// Owner user ID
        owner: String,
        /// Display name
        name: String,
        /// Relation: mother, father, child, partner, brother, sister, relative, other
        #[arg(long, default_value = "other")]
        relation: String,
        /// Fixed UTC offset of the loved one's locale, in minutes
        #[arg(long, default_value = "0")]
        utc_offset_minutes: i32,
        /// Phone number in E.164 form
        #[arg(long)]
        phone: Option<String>,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Comma-separated preferred channels (push, whatsapp, sms, voice, email)
        #[arg(long)]
        channels: Option<String>,
    },
    /// List profiles for an owner
    List {
        /// Owner user ID
        owner: String,
    },
    /// Activate a profile
    Activate {
        /// Profile ID
        id: String,
    },
    /// Deactivate a profile (its schedules stop firing)
    Deactivate {
        /// Profile ID
        id: String,
    },
}

pub(crate) fn parse_relation(s: &str) -> RelationshipType {
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

pub(crate) fn parse_channels(s: &str) -> Result<PreferredChannels, Box<dyn std::error::Error>> {
    let mut channels = PreferredChannels {
        push: false,
        whatsapp: false,
        sms: false,
        voice: false,
        email: false,
    };
    for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match EscalationChannel::parse(name) {
            Some(EscalationChannel::Push) => channels.push = true,
            Some(EscalationChannel::Whatsapp) => channels.whatsapp = true,
            Some(EscalationChannel::Sms) => channels.sms = true,
            Some(EscalationChannel::Voice) => channels.voice = true,
            Some(EscalationChannel::Email) => channels.email = true,
            None => return Err(format!("unknown channel: {name}").into()),
        }
    }
    Ok(channels)
}

pub fn run(action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        ProfileAction::Create {
            owner,
            name,
            relation,
            utc_offset_minutes,
            phone,
            email,
            channels,
        } => {
            let now = Utc::now();
            let profile = LovedOneProfile {
                id: Uuid::new_v4().to_string(),
                owner_user_id: owner,
                display_name: name,
                relationship_type: parse_relation(&relation),
                preferred_channels: channels
                    .as_deref()
                    .map(parse_channels)
                    .transpose()?
                    .unwrap_or_default(),
                utc_offset_minutes,
                phone_e164: phone,
                email,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            store.create_profile(&profile)?;
            println!("Profile created: {}", profile.id);
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileAction::List { owner } => {
            let profiles = store.list_profiles_by_owner(&owner)?;
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
        ProfileAction::Activate { id } => {
            if store.set_profile_active(&id, true, Utc::now())? {
                println!("Profile activated: {id}");
            } else {
                println!("Profile not found: {id}");
            }
        }
        ProfileAction::Deactivate { id } => {
            let now = Utc::now();
            if store.set_profile_active(&id, false, now)? {
                // Sweep checkins already in flight; deactivation must stop
                // escalations immediately, not just future firings.
                let canceled = Lifecycle::new(&store).cancel_for_profile(&id, now)?;
                println!("Profile deactivated: {id}");
                println!("Open check-ins canceled: {canceled}");
            } else {
                println!("Profile not found: {id}");
            }
        }
    }
    Ok(())
}
