use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bounds applied to every store call made through the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresTimeouts {
    /// Waiting for a free pooled connection
    pub pool_wait: Duration,
    /// Opening (or recycling) a connection
    pub connect: Duration,
    /// Server-side `statement_timeout`
    pub statement: Duration,
}

impl PostgresTimeouts {
    /// Longest a single repository call can take before it errors
    pub fn store_call_bound(&self) -> Duration {
        self.pool_wait + self.connect + self.statement
    }
}

impl Default for PostgresTimeouts {
    fn default() -> Self {
        Self {
            pool_wait: Duration::from_secs(5),
            connect: Duration::from_secs(5),
            statement: Duration::from_secs(10),
        }
    }
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    pub migrations_dir: String,
    pub goose_binary_path: String,
    pub timeouts: PostgresTimeouts,
}

impl PostgresConfig {
    /// DSN in the form goose expects
    pub fn goose_dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "voltwatch".to_string(),
            username: "voltwatch".to_string(),
            password: "voltwatch".to_string(),
            max_pool_size: 10,
            migrations_dir: "crates/common/migrations/postgres".to_string(),
            goose_binary_path: "goose".to_string(),
            timeouts: PostgresTimeouts::default(),
        }
    }
}
