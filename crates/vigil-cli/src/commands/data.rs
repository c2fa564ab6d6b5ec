//! Data portability and erasure commands.

use chrono::Utc;
use clap::Subcommand;
use std::path::PathBuf;
use vigil_core::{erase_account, erase_domain_data, export_user_data, Store};

#[derive(Subcommand)]
pub enum DataAction {
    /// Export everything a user owns as a JSON bundle
    Export {
        /// User ID
        user: String,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Erase a user's data
    Erase {
        /// User ID
        user: String,
        /// Also delete the account row itself
        #[arg(long)]
        include_account: bool,
    },
}

pub fn run(action: DataAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        DataAction::Export { user, out } => {
            let bundle = export_user_data(&store, &user, Utc::now())?;
            let json = serde_json::to_string_pretty(&bundle)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    println!("Export written: {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        DataAction::Erase { user, include_account } => {
            let summary = if include_account {
                erase_account(&store, &user)?
            } else {
                erase_domain_data(&store, &user)?
            };
            println!("Rows deleted: {}", summary.total());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
