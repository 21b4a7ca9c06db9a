use toolbox_core::config::ToolboxConfig;
use toolbox_core::paths;
use toolbox_core::sleep::SleepStore;
use toolbox_gateway::metrics::TrackerMetrics;
use toolbox_gateway::{handler, transport, SleepTracker};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries replies, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolbox_gateway=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = paths::config_path();
    let config = ToolboxConfig::from_file_or_env(&config_path)?;

    info!("toolbox-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Plugin: {} | State file: {}", config.plugin_name, config.state_path().display());

    // A state file that cannot be read is fatal: never start over with an empty store
    let tracker = match SleepTracker::open(SleepStore::new(config.state_path())) {
        Ok(t) => handler::shared(t),
        Err(e) => {
            error!("Failed to load sleep state: {:#}", e);
            return Err(e);
        }
    };
    let metrics = TrackerMetrics::new();

    let result = transport::run_stdio(&tracker, &metrics).await;

    info!("Session totals: {}", metrics.snapshot());
    info!("Metrics: {}", metrics.to_json());
    if let Err(ref e) = result {
        error!("Stopping after fatal error: {:#}", e);
    }
    result
}
