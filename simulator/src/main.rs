use anyhow::Context;
use clap::Parser;
use doacore::forwarder::Forwarder;
use doacore::telemetry::SessionLog;
use generator::profile::DoaGenerator;
use log::{info, warn};
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::ProducerConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthetic DOA producer: logs and forwards random bearings")]
struct Args {
    /// Load producer settings from YAML; DOA_* environment variables still win
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stop after this many measurements instead of running until Ctrl+C
    #[arg(long)]
    count: Option<u64>,
    /// Seed the generator for a repeatable run
    #[arg(long)]
    seed: Option<u64>,
    /// Print the effective configuration and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ProducerConfig::resolve(args.config.as_deref())?;
    if args.seed.is_some() {
        config.generator.seed = args.seed;
    }

    if args.print_config {
        print!("{}", serde_yaml::to_string(&config).context("rendering config")?);
        return Ok(());
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating producer runtime")?;
    runtime.block_on(run(config, args.count))
}

async fn run(config: ProducerConfig, count: Option<u64>) -> anyhow::Result<()> {
    let forwarder = Forwarder::connect(&config.forwarder_config())
        .await
        .with_context(|| format!("setting up forwarder to {}", config.destination))?;
    let runner = Runner::new(SessionLog::new(&config.log_dir), forwarder);
    let mut generator = DoaGenerator::new(config.generator.clone())?;

    info!(
        "producing every {:?}, logging to {}",
        config.generator.interval(),
        runner.log().path().display()
    );
    let summary = runner
        .run(
            &mut generator,
            config.generator.interval(),
            &config.result_label,
            count,
            async {
                if let Err(err) = signal::ctrl_c().await {
                    warn!("cannot listen for Ctrl+C: {}", err);
                    std::future::pending::<()>().await;
                }
            },
        )
        .await;
    info!(
        "emitted {} measurement(s): {} log failure(s), {} forward failure(s)",
        summary.emitted, summary.log_failures, summary.forward_failures
    );

    runner
        .shutdown(config.drain_timeout())
        .await
        .context("draining forwarder queue")?;
    Ok(())
}
