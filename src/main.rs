use admissions::application::AdmissionEngine;
use admissions::config::Config;
use admissions::domain::ports::{AdminLogStoreBox, ApplicationStoreBox};
use admissions::infrastructure::clock::SystemClock;
use admissions::infrastructure::geidea::GeideaGateway;
use admissions::infrastructure::in_memory::{InMemoryAdminLogStore, InMemoryApplicationStore};
use admissions::interfaces::http::{self, AppState};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(config: &Config) -> Result<(ApplicationStoreBox, AdminLogStoreBox)> {
    use admissions::infrastructure::rocksdb::RocksDBStore;

    if let Some(db_path) = &config.db_path {
        // Use persistent storage (RocksDB)
        let store = RocksDBStore::open(db_path).into_diagnostic()?;
        info!(path = %db_path.display(), "Using RocksDB storage");
        return Ok((Box::new(store.clone()), Box::new(store)));
    }
    Ok(in_memory_stores())
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(config: &Config) -> Result<(ApplicationStoreBox, AdminLogStoreBox)> {
    if let Some(db_path) = &config.db_path {
        warn!(
            path = %db_path.display(),
            "Built without the storage-rocksdb feature; falling back to in-memory storage"
        );
    }
    Ok(in_memory_stores())
}

fn in_memory_stores() -> (ApplicationStoreBox, AdminLogStoreBox) {
    info!("Using in-memory storage; data is lost on exit");
    (
        Box::new(InMemoryApplicationStore::new()),
        Box::new(InMemoryAdminLogStore::new()),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    if config.check_config {
        print!("{}", config.summary());
        config.engine_settings().into_diagnostic()?;
        config.admin_auth().into_diagnostic()?;
        return Ok(());
    }

    init_tracing();

    let settings = config.engine_settings().into_diagnostic()?;
    let admin_auth = config.admin_auth().into_diagnostic()?;
    let callback_verifier = config.callback_verifier();

    let missing = settings.payment.missing();
    if !missing.is_empty() {
        warn!(missing = %missing.join(", "), "Payment gateway is not fully configured; payment requests will fail with MISSING_ENV");
    }
    if callback_verifier.is_none() {
        warn!("No callback signing secret configured; payment callbacks are accepted unsigned");
    }
    if !admin_auth.is_configured() {
        warn!("No administrator configured; admin endpoints are unreachable");
    }

    let (applications, admin_log) = open_stores(&config)?;
    let gateway = GeideaGateway::new(&config.gateway_url, config.gateway_timeout()).into_diagnostic()?;
    info!(endpoint = gateway.endpoint(), period = %settings.admission_period, "Initializing engine");

    let engine = AdmissionEngine::new(
        applications,
        admin_log,
        Box::new(gateway),
        Box::new(SystemClock),
        settings,
    );
    let state = AppState::new(engine, admin_auth, callback_verifier);

    let listener = TcpListener::bind(config.bind).await.into_diagnostic()?;
    http::serve(listener, state).await.into_diagnostic()?;

    Ok(())
}
