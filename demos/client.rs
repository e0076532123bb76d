use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use ntrip_core::{client::NtripClient, config::ClientConfig, credentials::NtripCredentials};
use tokio::sync::Notify;
use tracing::{debug, info, level_filters::LevelFilter};
use tracing_subscriber::{fmt::Subscriber as FmtSubscriber, EnvFilter};

/// Connect to an NTRIP caster mountpoint and print received byte counts.
#[derive(Clone, PartialEq, Debug, Parser)]
struct Args {
    #[clap(flatten)]
    pub ntrip: ClientConfig,

    #[clap(flatten)]
    pub creds: NtripCredentials,

    #[clap(long, default_value = "info")]
    pub log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env().add_directive(args.log_level.into());
    let _ = FmtSubscriber::builder()
        .compact()
        .without_time()
        .with_max_level(args.log_level)
        .with_env_filter(filter)
        .try_init();

    info!("Connecting to {} mount {}", args.ntrip.address(), args.ntrip.mount);

    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        debug!("Received Ctrl-C, shutting down...");
        shutdown_signal.notify_waiters();
    });

    let client = NtripClient::new(args.ntrip, args.creds);
    let mut stream = client.connect(shutdown);

    while let Some(chunk) = stream.next().await {
        info!("received {} bytes", chunk.len());
    }

    debug!("Exiting");
    Ok(())
}
