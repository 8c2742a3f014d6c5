mod cli;
mod error;
mod kubernetes;
mod locator;
mod logs;
mod multiplex;
mod selector;
mod status;
mod steps;
mod types;
mod utils;

use clap::Parser;
use kube::{Client, config};
use std::io::IsTerminal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cli::Cli;
use kubernetes::KubeCluster;
use locator::TokioClock;
use logs::{LogContext, fetch_logs, resolve_latest_run};
use types::RunTarget;
use utils::prefix_style;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the step logs only, diagnostics go to stderr
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut request = cli.log_request();
    request.validate()?;

    let client = initialize_client(cli.context.as_deref()).await?;
    let cluster = Arc::new(KubeCluster::new(client));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let ctx = LogContext {
        runs: cluster.clone(),
        pods: cluster,
        clock: Arc::new(TokioClock),
        cancel,
        style: prefix_style(std::io::stdout().is_terminal(), cli.no_color),
    };

    if request.target == RunTarget::Latest {
        let name =
            resolve_latest_run(&ctx, &request.namespace, request.task.as_deref(), request.limit)
                .await?;
        info!("Showing logs of most recent taskrun {}", name);
        request.target = RunTarget::ByName(name);
    }

    let mut stdout = tokio::io::stdout();
    fetch_logs(&ctx, &request, &mut stdout).await?;
    Ok(())
}

async fn initialize_client(context: Option<&str>) -> anyhow::Result<Client> {
    let config = match context {
        None => {
            let config = config::Config::infer().await?;
            info!("Using current context");
            config
        }
        Some(ctx) => {
            let config = config::Config::from_kubeconfig(&config::KubeConfigOptions {
                context: Some(ctx.to_string()),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow::anyhow!("Context '{}' not found in kubeconfig: {}", ctx, e))?;
            info!("Using context: {}", ctx);
            config
        }
    };
    Ok(Client::try_from(config)?)
}
