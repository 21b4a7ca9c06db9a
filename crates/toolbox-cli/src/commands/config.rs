use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use toolbox_core::config::ToolboxConfig;
use toolbox_core::paths;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration summary
    Show,
    /// Print the raw config file path
    Path,
}

pub fn run(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(),
        ConfigAction::Path => {
            println!("{}", paths::config_path().display());
            Ok(())
        }
    }
}

fn show_config() -> Result<()> {
    let config_path = paths::config_path();
    let cfg = ToolboxConfig::from_file_or_env(&config_path)?;

    println!("{}", "Toolbox Configuration".bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("  {} {}", "Plugin:".dimmed(), cfg.plugin_name);
    println!("  {} {}", "Data dir:".dimmed(), cfg.data_dir.display());

    let state_path = cfg.state_path();
    let marker = if state_path.exists() {
        "✓".green()
    } else {
        "✗".red()
    };
    println!("  {} {} {}", "State file:".dimmed(), state_path.display(), marker);

    if config_path.exists() {
        println!("\n  {} {}", "Config file:".dimmed(), config_path.display());
    } else {
        println!(
            "\n  {} {} {}",
            "Config file:".dimmed(),
            config_path.display(),
            "(not found, using defaults)".dimmed()
        );
    }

    Ok(())
}
