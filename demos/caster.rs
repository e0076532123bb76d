use std::sync::Arc;

use clap::Parser;
use ntrip_core::{
    config::CasterConfig,
    credentials::NtripCredentials,
    sourcetable::{MountEntry, Sourcetable},
    Caster,
};
use tokio::sync::Notify;
use tracing::{debug, info, level_filters::LevelFilter};
use tracing_subscriber::{fmt::Subscriber as FmtSubscriber, EnvFilter};

/// Run a standalone NTRIP caster serving a single mountpoint.
#[derive(Clone, PartialEq, Debug, Parser)]
struct Args {
    #[clap(flatten)]
    pub caster: CasterConfig,

    /// Mountpoint name to advertise and accept a producer on.
    #[clap(long, default_value = "ESP32")]
    pub mount: String,

    /// Credentials required from consumers (`GET` requests).
    #[clap(flatten)]
    pub client_creds: NtripCredentials,

    /// Credentials required from the producer (`POST` request). Pass as
    /// `--server-user/--server-pass` via env NTRIP_SERVER_USER/PASS by
    /// overriding `NTRIP_USER`/`NTRIP_PASS` at runtime for this process.
    #[clap(long = "server-user", env = "NTRIP_SERVER_USER")]
    pub server_user: String,
    #[clap(long = "server-pass", env = "NTRIP_SERVER_PASS", default_value = "")]
    pub server_pass: String,

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

    info!("Starting NTRIP caster on {}", args.caster.address());
    debug!("Args {args:?}");

    let server_creds = NtripCredentials::new(&args.server_user, &args.server_pass);
    let sourcetable = Sourcetable::new(vec![MountEntry::new(
        &args.mount,
        "NTRIP ntrip-core;RTCM 3.3;1005,1077,1087;2;GPS+GLO;NONE;USA;0.00;0.00;0;0;none;none;N;N;0;",
    )]);

    let caster = Arc::new(Caster::new(args.caster, args.client_creds, server_creds, sourcetable));
    let listener = caster.bind().await?;

    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        debug!("Received Ctrl-C, shutting down...");
        shutdown_signal.notify_waiters();
    });

    caster.run(listener, shutdown).await;

    debug!("Exiting");
    Ok(())
}
