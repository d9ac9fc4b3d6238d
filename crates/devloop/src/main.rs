//! devloop CLI binary.

use anyhow::Result;
use devloop::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the devloop CLI.
///
/// The loop is sequential (one agent run or one review prompt at a time), so
/// a current-thread runtime is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so `--json` output stays parseable.
    // Example: RUST_LOG=devloop=debug,devloop_issues=trace devloop run
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("devloop=info,devloop_issues=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting devloop CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("devloop CLI completed successfully");
    Ok(())
}
