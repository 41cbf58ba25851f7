use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use site_monitoring::{
    actors::engine::{EngineHandle, EngineSettings},
    actors::prober::ProberHandle,
    config::{read_config_file, read_endpoints_file},
    notify::Notifier,
    probe::PingProbe,
    status::StatusStore,
    telegram::TelegramClient,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short, default_value = "config.json")]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("site_monitoring", LevelFilter::TRACE),
        ("varta", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;
    let endpoints = read_endpoints_file(&config.monitor.endpoints_file)?;

    let sites: HashSet<_> = endpoints.iter().map(|e| e.site.as_str()).collect();
    info!(
        "monitoring {} endpoints across {} sites",
        endpoints.len(),
        sites.len()
    );

    let token = config.telegram.resolve_token()?;
    let client = TelegramClient::new(&token, &config.telegram.chat_id);
    let notifier = Notifier::new(
        Arc::new(client),
        Duration::from_secs(config.monitor.error_delay),
    );
    let store = StatusStore::new(&config.monitor.status_file);

    let engine = EngineHandle::spawn(
        &endpoints,
        notifier,
        store,
        EngineSettings::from(&config.monitor),
    );

    let probe = Arc::new(PingProbe::default());
    let interval = Duration::from_secs(config.monitor.interval);
    let probers: Vec<_> = endpoints
        .into_iter()
        .map(|endpoint| {
            ProberHandle::spawn(endpoint, probe.clone(), interval, engine.report_sender())
        })
        .collect();

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    futures::future::join_all(probers.into_iter().map(ProberHandle::shutdown)).await;
    engine.shutdown().await;

    Ok(())
}
