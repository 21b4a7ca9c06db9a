mod commands;

use clap::{Parser, Subcommand};

/// Toolbox CLI — inspect and drive the good morning / good night tracker
#[derive(Parser)]
#[command(name = "toolbox", version, about = "Toolbox chat plugin (Rust CLI)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or feed the sleep tracker
    Sleep {
        #[command(subcommand)]
        action: commands::sleep::SleepAction,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Sleep { action }) => commands::sleep::run(action),
        Some(Commands::Config { action }) => commands::config::run(action),
        None => {
            println!("toolbox-rs {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
