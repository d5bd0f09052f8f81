//! Daemon binary entry point.

use std::sync::Arc;

use clap::Parser;
use sandboxd::cli::Args;
use sandboxd::config::load_settings;
use sandboxd::engine::docker::BollardRuntime;
use sandboxd::engine::Engine;
use sandboxd::http::{router, AppState};
use sandboxd::store::MetadataStore;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let settings = match load_settings(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&settings.logging);
    tracing::info!(version = sandboxd::build_info::VERSION, "starting sandboxd");

    let config_root = sandboxd::config::config_root_dir(|key| std::env::var(key).ok());
    let db_path = settings.database_path(&config_root);
    let store = match MetadataStore::open(&db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to open metadata store at {}: {e}", db_path.display());
            std::process::exit(1);
        }
    };

    let runtime = match BollardRuntime::connect() {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            eprintln!("failed to connect to the container runtime: {e}");
            std::process::exit(1);
        }
    };

    let upload_root = settings.host_file_upload_path_abs();
    if let Err(e) = std::fs::create_dir_all(&upload_root) {
        eprintln!("failed to create upload root {}: {e}", upload_root.display());
        std::process::exit(1);
    }

    let reaper_handle = sandboxd::reaper::spawn(
        store.clone(),
        upload_root.clone(),
        std::time::Duration::from_secs(settings.cleanup.run_interval_secs),
        std::time::Duration::from_secs(settings.cleanup.file_max_age_secs),
    );

    let port = args.port.unwrap_or(settings.server.port);
    let engine = Engine::new(runtime, store.clone(), settings.clone());
    let state = Arc::new(AppState {
        engine,
        store,
        settings,
        upload_root,
    });

    let app = router(state);
    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind port {port}: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(port, "listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with error");
    }

    reaper_handle.stop().await;
}

fn init_tracing(logging: &sandboxd::config::LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.serialize_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
