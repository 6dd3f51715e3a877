#![allow(dead_code)]

use common::postgres::{MigrationRunner, PostgresClient, PostgresTimeouts};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

pub struct TestDb {
    pub container: ContainerAsync<Postgres>,
    pub client: PostgresClient,
}

pub async fn setup_test_db() -> TestDb {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let migrations_dir = format!("{}/migrations/postgres", env!("CARGO_MANIFEST_DIR"));
    let dsn = format!(
        "postgres://postgres:postgres@{}:{}/postgres?sslmode=disable",
        host, port
    );
    let goose_path = which::which("goose").expect("goose binary not found");

    MigrationRunner::new(goose_path.to_string_lossy().to_string(), migrations_dir, dsn)
        .run_migrations()
        .await
        .expect("Migrations failed");

    let client = PostgresClient::new(
        &host.to_string(),
        port,
        "postgres",
        "postgres",
        "postgres",
        5,
        &PostgresTimeouts::default(),
    )
    .expect("Failed to create client");

    TestDb {
        container: postgres,
        client,
    }
}

/// Inserts a company with one user and one active device, returning their ids
pub async fn seed_company(client: &PostgresClient, api_key: &str) -> (i64, i64, i64) {
    let conn = client.get_connection().await.unwrap();
    let company_id: i64 = conn
        .query_one(
            "INSERT INTO companies (name) VALUES ($1) RETURNING id",
            &[&format!("company-{api_key}")],
        )
        .await
        .unwrap()
        .get(0);
    let user_id: i64 = conn
        .query_one(
            "INSERT INTO users (company_id, email) VALUES ($1, $2) RETURNING id",
            &[&company_id, &format!("{api_key}@example.com")],
        )
        .await
        .unwrap()
        .get(0);
    let device_id: i64 = conn
        .query_one(
            "INSERT INTO devices (company_id, name, code, api_key) VALUES ($1, $2, $3, $4) RETURNING id",
            &[&company_id, &"Main panel", &"MP-01", &api_key],
        )
        .await
        .unwrap()
        .get(0);
    (company_id, user_id, device_id)
}
