use clap::Parser;
use std::path::PathBuf;

const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "text";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 3600; // 1 hour
const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 86_400; // 24 hours
const DEFAULT_MAX_VERSIONS_KEPT: usize = 5;
const DEFAULT_TRANSMISSION_RETENTION_HOURS: i64 = 24;
const DEFAULT_TRANSMISSION_CLEANUP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_UPLOAD_SWEEP_INTERVAL_SECS: u64 = 900;
const DEFAULT_UPLOAD_SWEEP_MAX_AGE_SECS: u64 = 3600;
const DEFAULT_MAX_RECORD_BYTES: usize = 1_048_576; // 1 MiB
const DEFAULT_ATTACHMENT_MAX_SIZE_BYTES: usize = 52_428_800; // 50 MiB
const DEFAULT_BUNDLE_MAX_SIZE_BYTES: usize = 104_857_600; // 100 MiB
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BUNDLE_PUSH_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Postgres connection string
    #[arg(long, env = "DB_CONNECTION")]
    pub db_connection: String,

    #[arg(long, env)]
    pub jwt_secret: String,

    #[arg(long, env, default_value = DEFAULT_SERVER_HOST)]
    pub server_host: String,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// debug|info|warn|error (RUST_LOG overrides when set)
    #[arg(long, env, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// text|json
    #[arg(long, env, default_value = DEFAULT_LOG_FORMAT)]
    pub log_format: String,

    /// Root for server-managed files (attachments, app bundles)
    #[arg(long, env, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Overrides `{data_dir}/app-bundles` when set
    #[arg(long, env)]
    pub app_bundle_path: Option<PathBuf>,

    #[arg(long, env, default_value_t = DEFAULT_MAX_VERSIONS_KEPT)]
    pub max_versions_kept: usize,

    /// First-boot bootstrap admin; only used while the user table is empty
    #[arg(long, env)]
    pub admin_username: Option<String>,

    #[arg(long, env)]
    pub admin_password: Option<String>,

    #[arg(long, env, default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS)]
    pub access_token_ttl_secs: u64,

    #[arg(long, env, default_value_t = DEFAULT_REFRESH_TOKEN_TTL_SECS)]
    pub refresh_token_ttl_secs: u64,

    /// How long a push replay with the same transmission id returns the cached response
    #[arg(long, env, default_value_t = DEFAULT_TRANSMISSION_RETENTION_HOURS)]
    pub transmission_retention_hours: i64,

    #[arg(long, env, default_value_t = DEFAULT_TRANSMISSION_CLEANUP_INTERVAL_SECS)]
    pub transmission_cleanup_interval_secs: u64,

    #[arg(long, env, default_value_t = DEFAULT_UPLOAD_SWEEP_INTERVAL_SECS)]
    pub upload_sweep_interval_secs: u64,

    /// Abandoned temp uploads older than this are removed by the sweep worker
    #[arg(long, env, default_value_t = DEFAULT_UPLOAD_SWEEP_MAX_AGE_SECS)]
    pub upload_sweep_max_age_secs: u64,

    /// Max serialized size of one pushed observation record
    #[arg(long, env, default_value_t = DEFAULT_MAX_RECORD_BYTES)]
    pub max_record_bytes: usize,

    #[arg(long, env, default_value_t = DEFAULT_ATTACHMENT_MAX_SIZE_BYTES)]
    pub attachment_max_size_bytes: usize,

    #[arg(long, env, default_value_t = DEFAULT_BUNDLE_MAX_SIZE_BYTES)]
    pub bundle_max_size_bytes: usize,

    #[arg(long, env, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Bundle uploads extract and validate an archive, so they get a longer deadline
    #[arg(long, env, default_value_t = DEFAULT_BUNDLE_PUSH_TIMEOUT_SECS)]
    pub bundle_push_timeout_secs: u64,

    #[arg(long, env, default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Loads configuration from the process environment, with an optional
    /// `.env` file supplying values for variables not already set.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    #[must_use]
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }

    #[must_use]
    pub fn bundle_root(&self) -> PathBuf {
        self.app_bundle_path.clone().unwrap_or_else(|| self.data_dir.join("app-bundles"))
    }
}
