use anyhow::Context;
use clap::Parser;
use config::RelayConfig;
use doacore::relay::{IngressListener, SubscriberRegistry};
use log::info;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

mod bridge;
mod config;

#[derive(Parser)]
#[command(author, version, about = "UDP to server-sent-events relay for live DOA measurements")]
struct Args {
    /// Load relay settings from YAML; DOA_* environment variables still win
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the effective configuration and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = RelayConfig::resolve(args.config.as_deref())?;

    if args.print_config {
        print!("{}", serde_yaml::to_string(&config).context("rendering config")?);
        return Ok(());
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating relay runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: RelayConfig) -> anyhow::Result<()> {
    serve(config, signal::ctrl_c()).await
}

/// Runs the relay until `shutdown` resolves. Open viewer streams are not
/// waited on: they never end by themselves.
async fn serve<F>(config: RelayConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    let registry = Arc::new(SubscriberRegistry::new(config.queue_capacity));

    let ingress = IngressListener::bind(
        config.ingress_addr,
        Arc::clone(&registry),
        config.max_datagram,
    )
    .await
    .context("binding ingress socket")?;

    let routes = bridge::routes(Arc::clone(&registry), config.keepalive());
    let (http_addr, server) = warp::serve(routes)
        .try_bind_ephemeral(config.http_addr)
        .with_context(|| format!("binding http server on {}", config.http_addr))?;
    info!("serving viewers on http://{}", http_addr);

    let ingress_task = tokio::spawn(ingress.run());
    tokio::select! {
        _ = server => {}
        result = shutdown => {
            result.context("awaiting shutdown signal")?;
            info!("shutting down, {} viewer(s) connected", registry.len());
        }
    }
    ingress_task.abort();
    Ok(())
}
