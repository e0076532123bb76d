use std::sync::Arc;

use clap::Parser;
use ntrip_core::{config::ServerConfig, credentials::NtripCredentials, framer::Framer, server::NtripServer};
use tokio::{io::AsyncReadExt, sync::Notify};
use tracing::{debug, info, level_filters::LevelFilter};
use tracing_subscriber::{fmt::Subscriber as FmtSubscriber, EnvFilter};

/// Push RTCM3 frames read from stdin up to an NTRIP caster as a producer.
#[derive(Clone, PartialEq, Debug, Parser)]
struct Args {
    #[clap(flatten)]
    pub ntrip: ServerConfig,

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

    info!("Pushing RTCM to {} mount {}", args.ntrip.address(), args.ntrip.mount);

    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        debug!("Received Ctrl-C, shutting down...");
        shutdown_signal.notify_waiters();
    });

    let server = NtripServer::new(args.ntrip, args.creds);
    let drain_server = server.clone();
    let drain_shutdown = Arc::clone(&shutdown);
    let drain = tokio::spawn(async move { drain_server.run(drain_shutdown).await });

    let mut framer = Framer::new();
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            result = stdin.read(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => {
                    if framer.feed(&buf[..n]).is_ok() {
                        while let Some(frame) = framer.next() {
                            if frame.is_rtcm3() {
                                server.enqueue(bytes::Bytes::copy_from_slice(frame.as_bytes()));
                            }
                        }
                    }
                }
                Err(_) => break,
            },
            _ = shutdown.notified() => break,
        }
    }

    shutdown.notify_waiters();
    drain.await?;

    debug!("Exiting");
    Ok(())
}
