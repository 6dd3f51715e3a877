use crate::postgres::{PostgresConfig, PostgresTimeouts};
use anyhow::Result;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// PostgreSQL client wrapper with connection pooling
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Creates a new PostgreSQL client with connection pooling
    ///
    /// # Arguments
    /// * `host` - Database host (e.g., "localhost")
    /// * `port` - Database port (e.g., 5432)
    /// * `database` - Database name
    /// * `username` - Database username
    /// * `password` - Database password
    /// * `max_pool_size` - Maximum number of connections in the pool
    /// * `timeouts` - Bounds on pool waits, connects and statements
    pub fn new(
        host: &str,
        port: u16,
        database: &str,
        username: &str,
        password: &str,
        max_pool_size: usize,
        timeouts: &PostgresTimeouts,
    ) -> Result<Self> {
        let cfg = pool_config(host, port, database, username, password, max_pool_size, timeouts);
        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        Ok(Self { pool })
    }

    pub fn from_config(config: &PostgresConfig) -> Result<Self> {
        Self::new(
            &config.host,
            config.port,
            &config.database,
            &config.username,
            &config.password,
            config.max_pool_size,
            &config.timeouts,
        )
    }

    /// Pings the database to verify connectivity
    pub async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("postgreSQL connection successful");
        Ok(())
    }

    /// Gets a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    /// Closes the pool; checked-out connections are dropped when returned
    pub fn close(&self) {
        self.pool.close();
        info!("postgreSQL pool closed");
    }
}

fn pool_config(
    host: &str,
    port: u16,
    database: &str,
    username: &str,
    password: &str,
    max_pool_size: usize,
    timeouts: &PostgresTimeouts,
) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(host.to_string());
    cfg.port = Some(port);
    cfg.dbname = Some(database.to_string());
    cfg.user = Some(username.to_string());
    cfg.password = Some(password.to_string());
    cfg.connect_timeout = Some(timeouts.connect);
    // Server-side bound on every statement issued through the pool
    cfg.options = Some(format!(
        "-c statement_timeout={}",
        timeouts.statement.as_millis()
    ));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig {
        max_size: max_pool_size,
        timeouts: Timeouts {
            wait: Some(timeouts.pool_wait),
            create: Some(timeouts.connect),
            recycle: Some(timeouts.connect),
        },
        ..PoolConfig::new(max_pool_size)
    });
    cfg
}
