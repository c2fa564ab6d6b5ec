use clap::Subcommand;
use vigil_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the full configuration
    Show,
    /// Set the engine tick interval in seconds
    SetTickInterval {
        /// Seconds between evaluation ticks
        secs: u64,
    },
    /// Set a provider webhook endpoint for a channel
    SetEndpoint {
        /// push, whatsapp, sms, voice, or email
        channel: String,
        /// Webhook URL
        url: String,
    },
    /// Set the send timeout for a channel, in seconds
    SetTimeout {
        /// push, whatsapp, sms, voice, or email
        channel: String,
        /// Timeout in seconds
        secs: u64,
    },
    /// Reset configuration to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::SetTickInterval { secs } => {
            let mut config = Config::load()?;
            config.engine.tick_interval_secs = secs;
            config.save()?;
            println!("ok");
        }
        ConfigAction::SetEndpoint { channel, url } => {
            let mut config = Config::load()?;
            config.gateway.endpoints.insert(channel, url);
            config.save()?;
            println!("ok");
        }
        ConfigAction::SetTimeout { channel, secs } => {
            let mut config = Config::load()?;
            config.gateway.timeouts_secs.insert(channel, secs);
            config.save()?;
            println!("ok");
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
