use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Applies the goose SQL migrations under `migrations/postgres`.
///
/// goose runs as a subprocess so the schema files stay plain SQL that can be
/// applied by hand or from CI with the same tool.
pub struct MigrationRunner {
    goose_binary_path: String,
    migrations_dir: String,
    dsn: String,
}

impl MigrationRunner {
    pub fn new(goose_binary_path: String, migrations_dir: String, dsn: String) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            dsn,
        }
    }

    /// `goose -dir {migrations_dir} postgres {dsn} up`
    pub async fn run_migrations(&self) -> Result<()> {
        debug!(dir = %self.migrations_dir, "running postgres migrations");
        let stdout = self.goose("up").await?;
        info!("postgres migrations applied");
        debug!("goose output:\n{}", stdout);
        Ok(())
    }

    /// `goose ... status`
    pub async fn migration_status(&self) -> Result<String> {
        self.goose("status").await
    }

    async fn goose(&self, command: &str) -> Result<String> {
        let output = Command::new(&self.goose_binary_path)
            .arg("-dir")
            .arg(&self.migrations_dir)
            .arg("postgres")
            .arg(&self.dsn)
            .arg(command)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.goose_binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            bail!(
                "goose {} failed.\nstdout: {}\nstderr: {}",
                command,
                stdout,
                stderr
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
