use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use ragbridge::cli::{parse_args, run_cli_command};
use ragbridge::config::BridgeConfig;
use ragbridge::context::BridgeContext;

/// Logs go to stderr so stdout carries only command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ragbridge=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let command = parse_args(std::env::args());
    let config = BridgeConfig::from_env();
    tracing::debug!("Using {:?}", config);

    let ctx = BridgeContext::new(config);
    let mut stdout = std::io::stdout().lock();
    let result = run_cli_command(command, &ctx, &mut stdout).await;
    ctx.shutdown();
    result
}
