//! `convocore` binary entry point.
//!
//! Parses CLI flags, initializes tracing to stderr (stdout is reserved for
//! the MCP JSON-RPC stream), installs a Prometheus metrics recorder, builds
//! the composition root, and either runs one foreground scheduler tick
//! (`--tick-once`) or serves the MCP stdio transport until the client
//! disconnects.

use clap::Parser;
use convocore::args::Cli;
use convocore_domain::value_objects::config::CoreConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    if let Err(error) = PrometheusBuilder::new().install() {
        tracing::warn!(%error, "failed to install Prometheus metrics recorder, metrics calls will be no-ops");
    }

    let config = CoreConfig::from_env()?;
    tracing::info!(?config, "loaded configuration");

    let context = convocore::build_core_context(config, &cli).await?;

    if cli.tick_once {
        let stats = context.scheduler.tick().await?;
        tracing::info!(
            evaluated = stats.evaluated,
            indexed = stats.indexed,
            deferred = stats.deferred,
            "tick-once run complete"
        );
        return Ok(());
    }

    let server = convocore_server::ConvocoreServer::new(context.gateway);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    context.scheduler_handle.pause();
    Ok(())
}

/// Tracing to stderr only. `RUST_LOG` is honored when `--log-level` is
/// absent; both default to `info`.
fn init_tracing(log_level: Option<&str>) {
    let filter = log_level
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
