//! Environment-driven configuration for the whole server: bind address,
//! database path, worker pool sizing, callback retry/timeout knobs.
//!
//! Split into a raw `Config` (one field per `CONSUMA_*` variable, as
//! `envconfig::Envconfig` wants it) and a resolved `AppConfig` with
//! `Duration`s and defaults applied, the same two-step shape as
//! `cyclotron_fetch::config::Config::to_components`.

use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "CONSUMA_BIND_HOST", default = "0.0.0.0")]
    pub bind_host: String,

    #[envconfig(from = "CONSUMA_BIND_PORT", default = "8080")]
    pub bind_port: u16,

    #[envconfig(from = "CONSUMA_DATABASE_PATH", default = "consuma.db")]
    pub database_path: String,

    #[envconfig(from = "CONSUMA_DEFAULT_ITERATIONS", default = "50000")]
    pub default_iterations: u32,

    #[envconfig(from = "CONSUMA_MAX_WORKERS", default = "4")]
    pub max_workers: usize,

    #[envconfig(from = "CONSUMA_MAX_QUEUE_SIZE", default = "1000")]
    pub max_queue_size: usize,

    #[envconfig(from = "CONSUMA_CALLBACK_TIMEOUT", default = "10")]
    pub callback_timeout_seconds: u64,

    #[envconfig(from = "CONSUMA_CALLBACK_MAX_RETRIES", default = "5")]
    pub callback_max_retries: u32,

    #[envconfig(from = "CONSUMA_RATE_LIMIT_REQUESTS", default = "500")]
    pub rate_limit_requests: u32,

    #[envconfig(from = "CONSUMA_RATE_LIMIT_WINDOW", default = "60")]
    pub rate_limit_window_seconds: u64,

    #[envconfig(from = "CONSUMA_ALLOW_PRIVATE_CALLBACKS", default = "false")]
    pub allow_private_callbacks: bool,
}

/// The resolved form consumed by the rest of the crate: durations built,
/// the SQLite connection string assembled, no further parsing needed.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub database_url: String,
    pub default_iterations: u32,
    pub max_workers: usize,
    pub max_queue_size: usize,
    pub callback_timeout: Duration,
    pub callback_max_retries: u32,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub allow_private_callbacks: bool,
}

impl Config {
    pub fn into_app_config(self) -> AppConfig {
        AppConfig {
            bind_host: self.bind_host,
            bind_port: self.bind_port,
            database_url: format!("sqlite://{}?mode=rwc", self.database_path),
            default_iterations: self.default_iterations,
            max_workers: self.max_workers,
            max_queue_size: self.max_queue_size,
            callback_timeout: Duration::from_secs(self.callback_timeout_seconds),
            callback_max_retries: self.callback_max_retries,
            rate_limit_requests: self.rate_limit_requests,
            rate_limit_window: Duration::from_secs(self.rate_limit_window_seconds),
            allow_private_callbacks: self.allow_private_callbacks,
        }
    }
}
