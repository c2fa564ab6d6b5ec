//! Engine loop commands.

use chrono::Utc;
use clap::Subcommand;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vigil_core::{Config, Engine, Store, WebhookGateway};

#[derive(Subcommand)]
pub enum EngineAction {
    /// Run the tick loop until interrupted
    Run {
        /// Override the configured tick interval, in seconds
        #[arg(long)]
        tick_secs: Option<u64>,
    },
    /// Run a single tick and exit
    Tick,
}

pub fn run(action: EngineAction) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let store = Store::open()?;
    let gateway = WebhookGateway::new(config.gateway.clone());

    let runtime = tokio::runtime::Runtime::new()?;
    match action {
        EngineAction::Run { tick_secs } => {
            let mut engine_config = config.engine.clone();
            if let Some(secs) = tick_secs {
                engine_config.tick_interval_secs = secs;
            }
            let engine = Engine::new(store, gateway, engine_config);
            runtime.block_on(engine.run())?;
        }
        EngineAction::Tick => {
            let engine = Engine::new(store, gateway, config.engine.clone());
            let events = runtime.block_on(engine.tick(Utc::now()))?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }
    Ok(())
}
