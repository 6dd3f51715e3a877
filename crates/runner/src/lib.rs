//! Hosts long-running processes with signal-driven graceful shutdown.
//!
//! On SIGINT/SIGTERM (or the first process error) the shared cancellation
//! token is cancelled and every process is given up to the drain timeout to
//! return on its own. Only stragglers are aborted. Closers run last,
//! regardless of how the processes ended.
//!
//! # Example
//!
//! ```no_run
//! use voltwatch_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_named_process("ticker", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("tick");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("Cleaning up resources");
//!             Ok(())
//!         })
//!         .with_drain_timeout(Duration::from_secs(30))
//!         .run()
//!         .await;
//! }
//! ```

use anyhow::anyhow;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Type alias for an app process function.
/// Takes a cancellation token and returns a future that resolves to Result<(), anyhow::Error>
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>
        + Send,
>;

/// Type alias for a closer function.
/// Returns a future that resolves to Result<(), anyhow::Error>
pub type Closer =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

struct NamedProcess {
    name: String,
    process: AppProcess,
}

pub struct Runner {
    app_processes: Vec<NamedProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    drain_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Defaults: 10s closer timeout, 30s drain timeout
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(30),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        let name = format!("process-{}", self.app_processes.len());
        self.with_named_process(name, process)
    }

    /// Named processes show up in shutdown logs
    pub fn with_named_process<F, Fut>(self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.with_boxed_process(name, Box::new(|token| Box::pin(process(token))))
    }

    /// Add a process that is already boxed, e.g. from a worker's `into_runner_process`
    pub fn with_boxed_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.app_processes.push(NamedProcess {
            name: name.into(),
            process,
        });
        self
    }

    /// Closers are executed after all app processes have stopped.
    /// All closers will attempt to execute even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// How long processes get to return after cancellation before being aborted
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs until shutdown, then exits the process: 0 on a clean stop, 1 if
    /// any process failed.
    pub async fn run(self) {
        match self.run_to_completion().await {
            Ok(()) => {
                tracing::info!("Application exiting normally");
                std::process::exit(0);
            }
            Err(err) => {
                tracing::error!("Application exiting with error: {:#}", err);
                std::process::exit(1);
            }
        }
    }

    /// Same as [`Runner::run`] without exiting. Returns the first process error.
    pub async fn run_to_completion(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();
        let mut first_error: Option<anyhow::Error> = None;

        for NamedProcess { name, process } in self.app_processes {
            let process_token = token.clone();
            tracing::debug!(process = %name, "starting app process");
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        spawn_signal_handlers(token.clone());

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = join_set.join_next() => match next {
                    Some(result) => record_exit(result, &token, &mut first_error),
                    None => break,
                },
            }
        }

        if !join_set.is_empty() {
            tracing::info!(
                remaining = join_set.len(),
                "Waiting up to {:?} for processes to drain",
                self.drain_timeout
            );

            let drained = tokio::time::timeout(self.drain_timeout, async {
                while let Some(result) = join_set.join_next().await {
                    record_exit(result, &token, &mut first_error);
                }
            })
            .await;

            if drained.is_err() {
                tracing::error!(
                    remaining = join_set.len(),
                    "Processes did not stop within {:?}, aborting",
                    self.drain_timeout
                );
                join_set.shutdown().await;
                first_error.get_or_insert_with(|| anyhow!("processes did not drain in time"));
            }
        }

        if !self.closers.is_empty() {
            tracing::info!("Running closers with timeout of {:?}", self.closer_timeout);

            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => tracing::info!("All closers completed"),
                Err(_) => tracing::error!("Closers timed out after {:?}", self.closer_timeout),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn record_exit(
    result: Result<(String, anyhow::Result<()>), JoinError>,
    token: &CancellationToken,
    first_error: &mut Option<anyhow::Error>,
) {
    let err = match result {
        Ok((name, Ok(()))) => {
            tracing::info!(process = %name, "App process stopped");
            return;
        }
        Ok((name, Err(err))) => {
            tracing::error!(process = %name, "App process error: {:#}", err);
            err.context(format!("process {} failed", name))
        }
        Err(err) => {
            tracing::error!("App process panicked: {}", err);
            anyhow!("app process panicked: {}", err)
        }
    };

    first_error.get_or_insert(err);
    token.cancel();
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => {
                tracing::error!("Error setting up signal handler: {}", err);
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => {
                tracing::error!("Error setting up SIGTERM handler: {}", err);
            }
        }
    });
}

/// Runs all closers concurrently.
async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();

    for closer in closers {
        closer_set.spawn(async move { closer().await });
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => {
                tracing::debug!("Closer completed successfully");
            }
            Ok(Err(err)) => {
                tracing::error!("Closer error: {:#}", err);
            }
            Err(err) => {
                tracing::error!("Closer panicked: {}", err);
            }
        }
    }
}
