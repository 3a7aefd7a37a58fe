// Environment configuration
//
// Everything external is reachable through env vars; unset backends fall
// back to in-memory dev mode so the server runs without infrastructure.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Namespace this process serves
    pub namespace: String,
    /// NATS server for the resource KV and the message bus; in-memory when unset
    pub nats_url: Option<String>,
    /// JetStream KV bucket holding resources and records
    pub kv_bucket: String,
    /// Postgres for the activity log; in-memory when unset
    pub database_url: Option<String>,
    /// Base url of the agent runtime
    pub runtime_url: String,
    /// Root directory for git workspaces
    pub workspace_dir: String,
    /// Exit the process if the resource watch cannot be established
    pub watch_crash_on_failure: bool,
    pub github: Option<GithubConfig>,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub app_id: u64,
    pub private_key_path: String,
    pub app_name: String,
}

impl Config {
    pub fn from_env() -> Self {
        let github = match env::var("GITHUB_APP_ID").ok().and_then(|v| v.parse().ok()) {
            Some(app_id) => env::var("GITHUB_APP_PRIVATE_KEY").ok().map(|key_path| {
                GithubConfig {
                    app_id,
                    private_key_path: key_path,
                    app_name: env::var("GITHUB_APP_NAME")
                        .unwrap_or_else(|_| "troupe-ai".to_string()),
                }
            }),
            None => None,
        };

        Self {
            port: env::var("TROUPE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7888),
            namespace: env::var("TROUPE_NAMESPACE").unwrap_or_else(|_| "default".to_string()),
            nats_url: env::var("NATS_URL").ok().filter(|v| !v.is_empty()),
            kv_bucket: env::var("TROUPE_KV_BUCKET")
                .unwrap_or_else(|_| "troupe-resources".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            runtime_url: env::var("TROUPE_RUNTIME_URL")
                .unwrap_or_else(|_| "http://localhost:7890".to_string()),
            workspace_dir: env::var("TROUPE_WORKSPACE_DIR")
                .unwrap_or_else(|_| "/tmp/troupe-workspace".to_string()),
            watch_crash_on_failure: env::var("TROUPE_WATCH_CRASH_ON_FAILURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            github,
        }
    }
}
