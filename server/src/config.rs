use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// HomeGuard alert distribution server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(
    name = "homeguard-server",
    version,
    about = "HomeGuard alert distribution server"
)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "HOMEGUARD_PORT", default_value = "8000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "HOMEGUARD_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./homeguard.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "HOMEGUARD_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long, env = "HOMEGUARD_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Path to the append-only alert feed (JSON array written by the
    /// detector). Alert watching is disabled when unset.
    #[arg(long, env = "HOMEGUARD_ALERTS_FILE")]
    pub alerts_file: Option<String>,

    /// Seconds between alert feed reads
    #[arg(long, env = "HOMEGUARD_WATCH_INTERVAL_SECS", default_value = "2")]
    pub watch_interval_secs: u64,

    /// Re-emit alerts already present in the feed at startup instead of
    /// marking them seen
    #[arg(long, env = "HOMEGUARD_REPLAY_EXISTING_ALERTS")]
    pub replay_existing_alerts: bool,

    /// Timeout in seconds for one push delivery attempt
    #[arg(long, env = "HOMEGUARD_PUSH_TIMEOUT_SECS", default_value = "10")]
    pub push_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            config: "./homeguard.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            alerts_file: None,
            watch_interval_secs: 2,
            replay_existing_alerts: false,
            push_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (HOMEGUARD_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("HOMEGUARD_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# HomeGuard Alert Distribution Server Configuration
# Place this file at ./homeguard.toml or specify with --config <path>
# All settings can be overridden via environment variables (HOMEGUARD_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# Path to the alert feed written by the network detector.
# Alert watching is disabled when unset.
# alerts_file = "./data/alerts.json"

# Seconds between alert feed reads (default: 2)
# watch_interval_secs = 2

# Re-emit alerts already present in the feed at startup.
# Default: off — existing alerts are marked seen without notifying.
# replay_existing_alerts = false

# Timeout in seconds for one push delivery attempt (default: 10)
# push_timeout_secs = 10
"#
    .to_string()
}
