use alert_dispatcher::DispatcherConfig;
use anyhow::Context;
use common::garde::validate_struct;
use common::postgres::PostgresTimeouts;
use config::{Config, Environment};
use email_worker::EmailWorkerConfig;
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
#[garde(allow_unvalidated)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Timeout for the database ping and the chat channel check at startup
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// How long workers get to finish their in-flight cycle after a shutdown
    /// signal; must cover the slowest enabled worker's cycle
    #[serde(default = "default_shutdown_drain_timeout_secs")]
    #[garde(custom(greater_than(
        self.required_drain_timeout().as_secs(),
        "the in-flight cycle budget"
    )))]
    pub shutdown_drain_timeout_secs: u64,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    #[garde(range(min = 1))]
    pub postgres_max_pool_size: usize,

    /// Wait for a free pooled connection
    #[serde(default = "default_postgres_pool_wait_timeout_secs")]
    #[garde(range(min = 1))]
    pub postgres_pool_wait_timeout_secs: u64,

    #[serde(default = "default_postgres_connect_timeout_secs")]
    #[garde(range(min = 1))]
    pub postgres_connect_timeout_secs: u64,

    /// Server-side statement timeout for every store call
    #[serde(default = "default_postgres_statement_timeout_secs")]
    #[garde(range(min = 1))]
    pub postgres_statement_timeout_secs: u64,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    /// Apply migrations before starting the workers
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,

    // Email delivery worker
    #[serde(default = "default_email_worker_enabled")]
    pub email_worker_enabled: bool,

    #[serde(default = "default_email_poll_interval_secs")]
    #[garde(range(min = 1))]
    pub email_poll_interval_secs: u64,

    #[serde(default = "default_email_batch_size")]
    #[garde(range(min = 1))]
    pub email_batch_size: i64,

    /// Upper bound on one verify + send attempt
    #[serde(default = "default_email_send_timeout_secs")]
    #[garde(range(min = 1))]
    pub email_send_timeout_secs: u64,

    /// Processing claims older than this are returned to pending
    #[serde(default = "default_email_stale_claim_timeout_secs")]
    #[garde(custom(greater_than(self.email_send_timeout_secs, "the email send timeout")))]
    pub email_stale_claim_timeout_secs: u64,

    // SMTP
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    #[serde(default = "default_smtp_from")]
    pub smtp_from: String,

    #[serde(default = "default_smtp_timeout_secs")]
    pub smtp_timeout_secs: u64,

    /// Refuse to start when SMTP credentials are missing
    #[serde(default = "default_smtp_required")]
    pub smtp_required: bool,

    // Alert dispatcher
    #[serde(default = "default_alert_dispatcher_enabled")]
    pub alert_dispatcher_enabled: bool,

    #[serde(default = "default_alert_poll_interval_secs")]
    #[garde(range(min = 1))]
    pub alert_poll_interval_secs: u64,

    #[serde(default = "default_alert_batch_size")]
    #[garde(range(min = 1))]
    pub alert_batch_size: i64,

    /// Minimum spacing between chat messages, 0 disables pacing
    #[serde(default = "default_alert_min_send_interval_ms")]
    pub alert_min_send_interval_ms: u64,

    /// Offset applied to alert timestamps in chat messages
    #[serde(default = "default_alert_utc_offset_minutes")]
    pub alert_utc_offset_minutes: i32,

    // Telegram
    #[serde(default = "default_telegram_api_base_url")]
    pub telegram_api_base_url: String,

    #[serde(default)]
    pub telegram_bot_token: String,

    #[serde(default)]
    pub telegram_chat_id: String,

    #[serde(default = "default_telegram_timeout_secs")]
    #[garde(range(min = 1))]
    pub telegram_timeout_secs: u64,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_shutdown_drain_timeout_secs() -> u64 {
    120
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "voltwatch".to_string()
}

fn default_postgres_username() -> String {
    "voltwatch".to_string()
}

fn default_postgres_password() -> String {
    "voltwatch".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_pool_wait_timeout_secs() -> u64 {
    5
}

fn default_postgres_connect_timeout_secs() -> u64 {
    5
}

fn default_postgres_statement_timeout_secs() -> u64 {
    10
}

fn default_postgres_migrations_dir() -> String {
    "/home/voltwatch/migrations/postgres".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_run_migrations() -> bool {
    true
}

// Email defaults
fn default_email_worker_enabled() -> bool {
    true
}

fn default_email_poll_interval_secs() -> u64 {
    5
}

fn default_email_batch_size() -> i64 {
    10
}

fn default_email_send_timeout_secs() -> u64 {
    30
}

fn default_email_stale_claim_timeout_secs() -> u64 {
    300
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "no-reply@voltwatch.local".to_string()
}

fn default_smtp_timeout_secs() -> u64 {
    10
}

fn default_smtp_required() -> bool {
    false
}

// Alert dispatcher defaults
fn default_alert_dispatcher_enabled() -> bool {
    true
}

fn default_alert_poll_interval_secs() -> u64 {
    5
}

fn default_alert_batch_size() -> i64 {
    10
}

fn default_alert_min_send_interval_ms() -> u64 {
    0
}

fn default_alert_utc_offset_minutes() -> i32 {
    0
}

fn default_telegram_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout_secs() -> u64 {
    10
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "voltwatch".to_string()
}

fn greater_than(bound: u64, what: &'static str) -> impl FnOnce(&u64, &()) -> garde::Result {
    move |value, _| {
        if *value > bound {
            Ok(())
        } else {
            Err(garde::Error::new(format!(
                "must exceed {} ({}s)",
                what, bound
            )))
        }
    }
}

impl ServiceConfig {
    /// Load from `VOLTWATCH_*` variables and reject unusable combinations
    pub fn from_env() -> anyhow::Result<Self> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("VOLTWATCH"))
            .build()?
            .try_deserialize()?;
        validate_struct(&config).context("invalid configuration")?;
        Ok(config)
    }

    pub fn postgres_timeouts(&self) -> PostgresTimeouts {
        PostgresTimeouts {
            pool_wait: Duration::from_secs(self.postgres_pool_wait_timeout_secs),
            connect: Duration::from_secs(self.postgres_connect_timeout_secs),
            statement: Duration::from_secs(self.postgres_statement_timeout_secs),
        }
    }

    pub fn email_worker_config(&self) -> EmailWorkerConfig {
        EmailWorkerConfig {
            poll_interval: Duration::from_secs(self.email_poll_interval_secs),
            batch_size: self.email_batch_size,
            send_timeout: Duration::from_secs(self.email_send_timeout_secs),
            stale_claim_timeout: Duration::from_secs(self.email_stale_claim_timeout_secs),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            poll_interval: Duration::from_secs(self.alert_poll_interval_secs),
            batch_size: self.alert_batch_size,
            min_send_interval: Duration::from_millis(self.alert_min_send_interval_ms),
        }
    }

    /// Longest any enabled worker can still be busy after cancellation
    pub fn required_drain_timeout(&self) -> Duration {
        let store_call_bound = self.postgres_timeouts().store_call_bound();
        let mut required = Duration::ZERO;

        if self.email_worker_enabled {
            required = required.max(self.email_worker_config().cycle_budget(store_call_bound));
        }
        if self.alert_dispatcher_enabled {
            required = required.max(self.dispatcher_config().shutdown_budget(
                store_call_bound,
                Duration::from_secs(self.telegram_timeout_secs),
            ));
        }

        required
    }

    pub fn shutdown_drain_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_timeout_secs)
    }
}
