use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use zproxy_common::ProxyConfig;
use zproxy_core::{Core, UpstreamClientConfig, WreqUpstreamClient, credential_provider};

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let config = Cli::parse().into_config();
    init_tracing(config.debug);
    if let Err(err) = run(config).await {
        eprintln!("zproxy failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    info!(
        host = %config.host,
        port = config.port,
        upstream_url = %config.upstream_url,
        model = %config.model_name,
        upstream_model = %config.upstream_model,
        think_tags = %config.think_tags,
        anon_token = config.anon_token,
        proxy = %config.proxy.as_deref().unwrap_or(""),
        "config loaded"
    );

    let upstream = WreqUpstreamClient::new(UpstreamClientConfig::from_config(&config))
        .context("build upstream client")?;
    let credentials = credential_provider(&config).context("build credential provider")?;
    let bind = config.bind_addr();
    let core = Core::new(Arc::new(config), credentials, Arc::new(upstream));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(addr = %bind, "listening");
    axum::serve(listener, core.router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "zproxy=debug,zproxy_core=debug,zproxy_transform=debug"
    } else {
        "zproxy=info,zproxy_core=info,zproxy_transform=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
