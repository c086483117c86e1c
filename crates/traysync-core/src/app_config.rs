use crate::staging::RawPayloadMode;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    /// Catalog API root, e.g. `https://api.example.com/v1`. `/produtos` is appended.
    pub tray_url: String,
    /// Pre-encoded credential sent as `Authorization: Basic {token}`.
    pub tray_token: String,
    /// Extra `key=value` pairs appended to every page request.
    pub tray_extra_query: Vec<(String, String)>,
    pub webhook_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub rate_budget: u32,
    pub rate_window_ms: u64,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
    pub batch_size: usize,
    pub raw_payload: RawPayloadMode,
    pub cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("tray_url", &self.tray_url)
            .field("tray_token", &"[redacted]")
            .field("tray_extra_query", &self.tray_extra_query)
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("rate_budget", &self.rate_budget)
            .field("rate_window_ms", &self.rate_window_ms)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_secs", &self.backoff_base_secs)
            .field("backoff_cap_secs", &self.backoff_cap_secs)
            .field("batch_size", &self.batch_size)
            .field("raw_payload", &self.raw_payload)
            .field("cron", &self.cron)
            .finish()
    }
}
