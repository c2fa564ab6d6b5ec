use chrono::Utc;
use clap::Subcommand;
use uuid::Uuid;
use vigil_core::{DeviceToken, Store};

#[derive(Subcommand)]
pub enum DeviceAction {
    /// Register (or refresh) a push device token
    Register {
        /// User ID
        user: String,
        /// ios, android, ...
        platform: String,
        /// Provider push token
        token: String,
    },
    /// List active device tokens for a user
    List {
        /// User ID
        user: String,
    },
}

pub fn run(action: DeviceAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        DeviceAction::Register { user, platform, token } => {
            let now = Utc::now();
            let device = DeviceToken {
                id: Uuid::new_v4().to_string(),
                user_id: user,
                platform,
                token,
                is_active: true,
                last_registered_at: now,
                created_at: now,
            };
            store.upsert_device_token(&device)?;
            println!("Device registered: {}", device.id);
        }
        DeviceAction::List { user } => {
            let tokens = store.list_active_device_tokens(&user)?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
    }
    Ok(())
}
