#![allow(dead_code)]
use sqlx::PgPool;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::OnceLock;
use synkronus::api::AppState;
use synkronus::config::Config;
use synkronus::domain::user::Role;
use synkronus::{App, api};
use tokio::net::TcpListener;
use uuid::Uuid;

static INIT: OnceLock<()> = OnceLock::new();

pub fn setup_tracing() {
    INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Connects to the test database named by `SYNKRONUS_TEST_DATABASE_URL`.
/// Returns `None` when the variable is unset so the suite stays green on
/// machines without Postgres.
pub async fn try_test_pool() -> Option<PgPool> {
    setup_tracing();
    let database_url = std::env::var("SYNKRONUS_TEST_DATABASE_URL").ok()?;

    let pool = synkronus::adapters::database::init_pool(&database_url)
        .await
        .expect("Failed to connect to test DB. Is Postgres running?");

    sqlx::migrate!().run(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

pub fn test_config(data_dir: &Path) -> Config {
    Config {
        db_connection: std::env::var("SYNKRONUS_TEST_DATABASE_URL").unwrap_or_default(),
        jwt_secret: "test_secret".to_string(),
        server_host: "127.0.0.1".to_string(),
        port: 0,
        log_level: "warn".to_string(),
        log_format: "text".to_string(),
        data_dir: data_dir.to_path_buf(),
        app_bundle_path: None,
        max_versions_kept: 3,
        admin_username: None,
        admin_password: None,
        access_token_ttl_secs: 3600,
        refresh_token_ttl_secs: 86_400,
        transmission_retention_hours: 24,
        transmission_cleanup_interval_secs: 3600,
        upload_sweep_interval_secs: 3600,
        upload_sweep_max_age_secs: 3600,
        max_record_bytes: 1_048_576,
        attachment_max_size_bytes: 5 * 1024 * 1024,
        bundle_max_size_bytes: 20 * 1024 * 1024,
        request_timeout_secs: 30,
        bundle_push_timeout_secs: 60,
        shutdown_timeout_secs: 5,
    }
}

pub struct TestServer {
    pub url: String,
    pub client: reqwest::Client,
    pub state: AppState,
    pub run_id: String,
    _data_dir: tempfile::TempDir,
}

/// Boots the full application on an ephemeral port against the shared test
/// database, with a throwaway data directory.
pub async fn spawn_server(pool: PgPool) -> TestServer {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(data_dir.path());

    let app = App::initialize(&config, pool).await.expect("app init");
    let state = app.state.clone();
    let router = api::app_router(app.state, &config);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await.expect("serve");
    });

    TestServer {
        url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        state,
        run_id: Uuid::new_v4().to_string()[..8].to_string(),
        _data_dir: data_dir,
    }
}

impl TestServer {
    /// Creates a fresh user with the given role and logs in over HTTP,
    /// returning `(username, access token)`.
    pub async fn user_token(&self, role: Role) -> (String, String) {
        let username = format!("{}_{}_{}", role.as_str().replace('-', "_"), self.run_id, &Uuid::new_v4().to_string()[..8]);
        self.state.user_service.create(&username, "password123", role).await.expect("create user");

        let token = self.login(&username, "password123").await.expect("login");
        (username, token)
    }

    pub async fn login(&self, username: &str, password: &str) -> Option<String> {
        let resp = self
            .client
            .post(format!("{}/auth/login", self.url))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await
            .expect("login request");
        if !resp.status().is_success() {
            return None;
        }
        let body: serde_json::Value = resp.json().await.expect("login body");
        Some(body["token"].as_str().expect("token").to_string())
    }

    /// The sync counter as the server reports it to an empty pull.
    pub async fn current_version(&self, token: &str) -> i64 {
        let resp = self
            .client
            .post(format!("{}/sync/pull", self.url))
            .bearer_auth(token)
            .query(&[("limit", "1")])
            .json(&serde_json::json!({"client_id": "probe", "since": {"version": i64::MAX - 1}}))
            .send()
            .await
            .expect("pull request");
        assert!(resp.status().is_success(), "pull probe failed: {}", resp.status());
        let body: serde_json::Value = resp.json().await.expect("pull body");
        body["current_version"].as_i64().expect("current_version")
    }
}
