use netcov_core::config::NetcovConfig;
use netcov_core::proxy::CoverageProxy;
use netcov_core::stop::{StopToken, stop_on_ctrl_c};
use tracing_subscriber::EnvFilter;

// Stock setup: trace FIFO at /tmp/netcovmap, fuzzing client on 127.0.0.1:5678.
fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = NetcovConfig::default();
    let stop = StopToken::new();
    stop_on_ctrl_c(stop.clone())?;

    let handle = CoverageProxy::new(config.trace, config.forward).spawn(stop)?;
    let stats = handle
        .join()
        .map_err(|_| anyhow::anyhow!("Ingestion thread panicked"))??;

    tracing::info!(
        lines = stats.lines_read,
        malformed = stats.malformed_lines,
        forwarded = stats.verdicts_forwarded,
        "Coverage proxy finished"
    );
    Ok(())
}
