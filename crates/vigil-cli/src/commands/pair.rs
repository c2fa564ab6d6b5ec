use chrono::Utc;
use clap::Subcommand;
use vigil_core::{PairingCode, Store};

#[derive(Subcommand)]
pub enum PairAction {
    /// Generate a pairing code (expires after 30 minutes)
    Generate {
        /// Generating user ID
        user: String,
    },
    /// List pairing codes for a user, newest first
    List {
        /// User ID
        user: String,
    },
}

pub fn run(action: PairAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        PairAction::Generate { user } => {
            let code = PairingCode::generate(&user, Utc::now());
            store.create_pairing_code(&code)?;
            println!("Pairing code: {}", code.code);
            println!("Expires at: {}", code.expires_at.to_rfc3339());
        }
        PairAction::List { user } => {
            let codes = store.list_pairing_codes(&user)?;
            println!("{}", serde_json::to_string_pretty(&codes)?);
        }
    }
    Ok(())
}
