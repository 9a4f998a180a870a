use netcov_core::client::{FuzzClient, accept_proxy};
use netcov_core::config::{NetcovConfig, parse_host_port};
use netcov_core::executor::TcpTargetExecutor;
use netcov_core::feedback::CoverageProgressFeedback;
use netcov_core::mutator::build_mutator;
use netcov_core::proxy::CoverageProxy;
use netcov_core::stop::{StopToken, stop_on_ctrl_c};

use clap::{Parser, Subcommand};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Forward netcov traces to a fuzzing client", long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read coverage traces from a pipe and forward trend verdicts upstream.
    Forward {
        /// The netcov pipe to read from.
        pipe: Option<PathBuf>,
        /// Upstream server to which to forward coverage information, as host:port.
        #[clap(short, long, value_parser = parse_host_port)]
        forward: Option<(String, u16)>,
        #[clap(long)]
        connect_timeout_ms: Option<u64>,
    },
    /// Run the bundled mutation fuzzer against a network target.
    Fuzz {
        /// Address to accept the coverage proxy on.
        #[clap(long)]
        listen: Option<String>,
        /// Target to deliver inputs to, as host:port.
        #[clap(long)]
        target: Option<String>,
        #[clap(short, long)]
        iterations: Option<u64>,
        #[clap(long)]
        seed: Option<u64>,
    },
}

fn load_config(config_file: Option<PathBuf>) -> Result<NetcovConfig, anyhow::Error> {
    match config_file {
        Some(config_path) => {
            tracing::info!("Loading configuration from specified path: {config_path:?}");
            NetcovConfig::load_from_file(&config_path)
        }
        None => {
            let default_config_path = PathBuf::from("netcov.toml");
            if default_config_path.exists() {
                tracing::info!(
                    "No config file specified via CLI, loading default: {default_config_path:?}"
                );
                NetcovConfig::load_from_file(&default_config_path)
            } else {
                tracing::debug!("No config file found, using built-in defaults");
                Ok(NetcovConfig::default())
            }
        }
    }
}

fn run_forward(config: NetcovConfig, stop: StopToken) -> Result<(), anyhow::Error> {
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

fn run_fuzz(config: NetcovConfig, stop: StopToken) -> Result<(), anyhow::Error> {
    let settings = config.fuzzer;
    let mut verdicts = accept_proxy(&settings.listen)?;

    let executor = TcpTargetExecutor::new(
        settings.target.clone(),
        Duration::from_millis(settings.target_timeout_ms),
    );
    let mut client = FuzzClient::new(
        build_mutator::<ChaCha8Rng>(settings.mutator),
        Box::new(executor),
        Box::new(CoverageProgressFeedback::new()),
        ChaCha8Rng::seed_from_u64(settings.rng_seed),
        settings.seed_input(),
    )
    .with_retry_delay(Duration::from_millis(settings.retry_delay_ms))
    .with_max_iterations(settings.max_iterations);

    tracing::info!(target_addr = %settings.target, "Starting fuzz loop");
    let start_time = Instant::now();
    let stats = client.run(&mut verdicts, &stop)?;

    let elapsed = start_time.elapsed();
    let exec_per_sec = if elapsed.as_secs_f32() > 0.0 {
        stats.executions as f32 / elapsed.as_secs_f32()
    } else {
        0.0
    };
    tracing::info!(
        executions = stats.executions,
        discoveries = stats.discoveries,
        target_errors = stats.target_errors,
        "Fuzz loop finished in {elapsed:.2?} ({exec_per_sec:.2} execs/sec)"
    );
    tracing::info!("Best input: {}", client.best_input().escape_ascii());
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config_file)?;

    let stop = StopToken::new();
    stop_on_ctrl_c(stop.clone())?;

    match cli.command {
        Command::Forward {
            pipe,
            forward,
            connect_timeout_ms,
        } => {
            if let Some(pipe) = pipe {
                config.trace.pipe = pipe;
            }
            if let Some((host, port)) = forward {
                config.forward.host = host;
                config.forward.port = port;
            }
            if let Some(timeout) = connect_timeout_ms {
                config.forward.connect_timeout_ms = timeout;
            }
            tracing::debug!("Effective configuration: {config:#?}");
            run_forward(config, stop)
        }
        Command::Fuzz {
            listen,
            target,
            iterations,
            seed,
        } => {
            if let Some(listen) = listen {
                config.fuzzer.listen = listen;
            }
            if let Some(target) = target {
                config.fuzzer.target = target;
            }
            if iterations.is_some() {
                config.fuzzer.max_iterations = iterations;
            }
            if let Some(seed) = seed {
                config.fuzzer.rng_seed = seed;
            }
            tracing::debug!("Effective configuration: {config:#?}");
            run_fuzz(config, stop)
        }
    }
}
