mod config;

use alert_dispatcher::{AlertDispatcherWorker, TelegramConfig};
use anyhow::Context;
use common::postgres::{
    MigrationRunner, PostgresAlertRepository, PostgresClient, PostgresConfig,
    PostgresDeviceRepository, PostgresEmailOutboxRepository,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use config::ServiceConfig;
use email_worker::{EmailWorker, SmtpConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use voltwatch_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        email_worker_enabled = config.email_worker_enabled,
        alert_dispatcher_enabled = config.alert_dispatcher_enabled,
        "Starting voltwatch service"
    );

    let postgres_client = match initialize_postgres(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            std::process::exit(1);
        }
    };

    let devices = Arc::new(PostgresDeviceRepository::new(postgres_client.clone()));
    let alerts = Arc::new(PostgresAlertRepository::new(postgres_client.clone()));
    let outbox = Arc::new(PostgresEmailOutboxRepository::new(postgres_client.clone()));

    info!(
        drain_timeout_secs = config.shutdown_drain_timeout_secs,
        required_secs = config.required_drain_timeout().as_secs(),
        "Shutdown drain budget"
    );
    let mut runner = Runner::new().with_drain_timeout(config.shutdown_drain_timeout());

    if config.email_worker_enabled {
        let email_worker = match EmailWorker::new(
            outbox,
            &smtp_config(&config),
            config.smtp_required,
            config.email_worker_config(),
        ) {
            Ok(worker) => worker,
            Err(e) => {
                error!("Failed to initialize email worker: {:#}", e);
                std::process::exit(1);
            }
        };
        runner = runner.with_boxed_process("email_worker", email_worker.into_runner_process());
    }

    if config.alert_dispatcher_enabled {
        let dispatcher = match initialize_alert_dispatcher(&config, alerts, devices).await {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                error!("Failed to initialize alert dispatcher: {:#}", e);
                std::process::exit(1);
            }
        };
        runner = runner.with_boxed_process("alert_dispatcher", dispatcher.into_runner_process());
    }

    runner = runner
        .with_closer({
            let postgres_client = postgres_client.clone();
            move || async move {
                postgres_client.close();
                Ok(())
            }
        })
        .with_closer(move || async move {
            // Flush pending spans
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

fn postgres_config(config: &ServiceConfig) -> PostgresConfig {
    PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
        migrations_dir: config.postgres_migrations_dir.clone(),
        goose_binary_path: config.postgres_goose_binary_path.clone(),
        timeouts: config.postgres_timeouts(),
    }
}

async fn initialize_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    let pg_config = postgres_config(config);

    if config.run_migrations {
        info!("Running PostgreSQL migrations...");
        MigrationRunner::new(
            pg_config.goose_binary_path.clone(),
            pg_config.migrations_dir.clone(),
            pg_config.goose_dsn(),
        )
        .run_migrations()
        .await?;
    } else {
        debug!("Skipping PostgreSQL migrations");
    }

    let client = PostgresClient::from_config(&pg_config)?;
    tokio::time::timeout(
        Duration::from_secs(config.startup_timeout_secs),
        client.ping(),
    )
    .await
    .context("timed out connecting to PostgreSQL")??;
    info!(host = %pg_config.host, database = %pg_config.database, "PostgreSQL connected");

    Ok(client)
}

async fn initialize_alert_dispatcher(
    config: &ServiceConfig,
    alerts: Arc<PostgresAlertRepository>,
    devices: Arc<PostgresDeviceRepository>,
) -> anyhow::Result<AlertDispatcherWorker> {
    let dispatcher = AlertDispatcherWorker::new(
        alerts,
        devices,
        TelegramConfig {
            api_base_url: config.telegram_api_base_url.clone(),
            bot_token: config.telegram_bot_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
            timeout: Duration::from_secs(config.telegram_timeout_secs),
        },
        config.alert_utc_offset_minutes,
        config.dispatcher_config(),
    )?;

    tokio::time::timeout(
        Duration::from_secs(config.startup_timeout_secs),
        dispatcher.startup_check(),
    )
    .await
    .context("timed out checking the chat channel")??;

    Ok(dispatcher)
}

fn smtp_config(config: &ServiceConfig) -> SmtpConfig {
    SmtpConfig {
        host: config.smtp_host.clone(),
        port: config.smtp_port,
        username: config.smtp_username.clone(),
        password: config.smtp_password.clone(),
        from: config.smtp_from.clone(),
        timeout: Duration::from_secs(config.smtp_timeout_secs),
    }
}
