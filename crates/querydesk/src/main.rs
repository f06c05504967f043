use std::process::ExitCode;
use std::sync::Arc;

use log::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use querydesk::config::StoreSettings;
use querydesk::{
    load_config, sink_from_settings, Classifier, HealthReporter, ImapConnector, IngestScheduler,
    IngestionJob, RecordBuilder,
};

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    tracing_log::LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run() -> querydesk::Result<()> {
    let config = load_config()?;

    info!("Starting querydesk v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Watching {} on {}:{} as {} every {:?}",
        config.imap.mailbox,
        config.imap.host,
        config.imap.port,
        config.imap.username,
        config.check_interval
    );
    match &config.store {
        StoreSettings::Rest { url, table, .. } => info!("Storing tickets in {}/{}", url, table),
        StoreSettings::Sqlite { path } => info!("Storing tickets in {}", path.display()),
    }

    let sink = sink_from_settings(&config.store)?;
    let health = HealthReporter::new(config.imap.username.clone());

    let job = IngestionJob::new(
        Arc::new(ImapConnector::new(config.imap.clone())),
        Classifier::new(&config.keywords),
        RecordBuilder::default(),
        sink,
    )
    .with_health(health.clone());

    let scheduler = IngestScheduler::new(Arc::new(job), config.check_interval);

    let (stop_tx, mut stop_rx) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    let handle = scheduler.start();
    let mut health_rx = health.subscribe();

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            changed = health_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = health_rx.borrow_and_update().clone();
                match serde_json::to_string(&snapshot) {
                    Ok(json) => debug!("Health: {}", json),
                    Err(e) => debug!("Health snapshot not serializable: {}", e),
                }
            }
        }
    }

    info!("Shutdown requested, waiting for the current cycle to finish");
    scheduler.shutdown(handle).await;
    info!("querydesk stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
