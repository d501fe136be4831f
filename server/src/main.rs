use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use homeguard_server::alerts::watcher::AlertWatcher;
use homeguard_server::auth::{self, JwtAuthenticator};
use homeguard_server::config::{generate_config_template, Config};
use homeguard_server::db;
use homeguard_server::dispatch::Distributor;
use homeguard_server::push::fanout::PushFanout;
use homeguard_server::push::store::PushStore;
use homeguard_server::push::transport::HttpPushTransport;
use homeguard_server::routes;
use homeguard_server::state::AppState;
use homeguard_server::ws::registry::ChannelRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "homeguard_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "homeguard_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("HomeGuard server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database (push subscription store)
    let db = db::init_db(&config.data_dir)?;

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    // Connection registry with the JWT authentication collaborator
    let registry = ChannelRegistry::new(Arc::new(JwtAuthenticator::new(jwt_secret.clone())));

    // Push pipeline: store + HTTP transport + fan-out
    let push_store = PushStore::new(db.clone());
    let transport = Arc::new(HttpPushTransport::new(Duration::from_secs(
        config.push_timeout_secs,
    ))?);
    let fanout = PushFanout::new(push_store.clone(), transport);

    // Watcher -> coordinator pipeline
    let (alert_tx, alert_rx) = mpsc::unbounded_channel();
    match config.alerts_file.as_deref() {
        Some(path) if !path.is_empty() => {
            let mut watcher = AlertWatcher::new(
                PathBuf::from(path),
                Duration::from_secs(config.watch_interval_secs),
                alert_tx,
            );
            if !config.replay_existing_alerts {
                watcher.prime();
            }
            tokio::spawn(watcher.run());
            tracing::info!(feed = %path, "Alert feed watching started");
        }
        _ => {
            tracing::warn!("Alert watching disabled: alerts_file not configured");
        }
    }

    let distributor = Distributor::new(registry.clone(), push_store.clone(), fanout, alert_rx);
    tokio::spawn(distributor.run());

    // Build application state and router
    let app_state = AppState {
        db,
        jwt_secret,
        registry,
        push_store,
    };
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
