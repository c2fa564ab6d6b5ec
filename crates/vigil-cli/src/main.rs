use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod commands;

#[derive(Parser)]
#[command(name = "vigil-cli", version, about = "Vigil check-in engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Loved-one profile management
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Relationship management
    Relationship {
        #[command(subcommand)]
        action: commands::relationship::RelationshipAction,
    },
    /// Check-in schedule management
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Check-in inspection and responses
    Checkin {
        #[command(subcommand)]
        action: commands::checkin::CheckinAction,
    },
    /// Escalation plan management
    Plan {
        #[command(subcommand)]
        action: commands::plan::PlanAction,
    },
    /// Emergency contact management
    Contact {
        #[command(subcommand)]
        action: commands::contact::ContactAction,
    },
    /// Device token registration
    Device {
        #[command(subcommand)]
        action: commands::device::DeviceAction,
    },
    /// Pairing code management
    Pair {
        #[command(subcommand)]
        action: commands::pair::PairAction,
    },
    /// Data export and erasure
    Data {
        #[command(subcommand)]
        action: commands::data::DataAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the engine loop
    Engine {
        #[command(subcommand)]
        action: commands::engine::EngineAction,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::User { action } => commands::user::run(action),
        Commands::Profile { action } => commands::profile::run(action),
        Commands::Relationship { action } => commands::relationship::run(action),
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Checkin { action } => commands::checkin::run(action),
        Commands::Plan { action } => commands::plan::run(action),
        Commands::Contact { action } => commands::contact::run(action),
        Commands::Device { action } => commands::device::run(action),
        Commands::Pair { action } => commands::pair::run(action),
        Commands::Data { action } => commands::data::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Engine { action } => commands::engine::run(action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
