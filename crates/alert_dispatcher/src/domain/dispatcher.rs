use crate::domain::{AlertMessageFormatter, ChatChannel};
use anyhow::ensure;
use common::domain::{Alert, AlertRepository, DeviceRepository, DomainResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// Minimum spacing between two chat messages, zero disables pacing
    pub min_send_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            min_send_interval: Duration::ZERO,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.poll_interval.is_zero(), "alert poll interval must be non-zero");
        ensure!(self.batch_size > 0, "alert batch size must be positive");
        Ok(())
    }

    /// Longest the dispatcher needs after cancellation: the fetch, then the
    /// one alert already started (device lookup, pacing, send, flag update).
    pub fn shutdown_budget(&self, store_call_bound: Duration, send_timeout: Duration) -> Duration {
        store_call_bound * 3 + self.min_send_interval + send_timeout
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub fetched: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Sent, but the delivery flag could not be set; will be sent again
    pub unrecorded: usize,
}

/// Pushes undelivered alerts to the chat channel.
///
/// Alerts are sent one at a time, oldest first. A failed send leaves the
/// alert undelivered so the next cycle tries again; there is no retry cap.
pub struct AlertDispatcher {
    alerts: Arc<dyn AlertRepository>,
    devices: Arc<dyn DeviceRepository>,
    channel: Arc<dyn ChatChannel>,
    formatter: AlertMessageFormatter,
    config: DispatcherConfig,
    last_send: Mutex<Option<Instant>>,
}

impl AlertDispatcher {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        devices: Arc<dyn DeviceRepository>,
        channel: Arc<dyn ChatChannel>,
        formatter: AlertMessageFormatter,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            alerts,
            devices,
            channel,
            formatter,
            config,
            last_send: Mutex::new(None),
        }
    }

    /// Poll until cancelled. Unlike the email worker, a cycle interrupted by
    /// cancellation stops before its next alert instead of finishing the
    /// batch; the remaining alerts stay undelivered and are picked up after
    /// restart, so shutdown is never held up by a slow chat API.
    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.config.validate()?;
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            min_send_interval_ms = self.config.min_send_interval.as_millis() as u64,
            "starting alert dispatcher"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!("received shutdown signal, stopping alert dispatcher");
                    break;
                }
                _ = interval.tick() => {}
            }

            match self.run_cycle(&ctx).await {
                Ok(report) if report.fetched > 0 => info!(
                    fetched = report.fetched,
                    delivered = report.delivered,
                    failed = report.failed,
                    "alert dispatch cycle finished"
                ),
                Ok(_) => debug!("no undelivered alerts"),
                Err(e) => error!(error = %e, "alert dispatch cycle failed"),
            }
        }

        info!("alert dispatcher stopped");
        Ok(())
    }

    /// One poll. Stops early between alerts once `ctx` is cancelled; skipped
    /// alerts stay undelivered.
    #[instrument(skip(self, ctx))]
    pub async fn run_cycle(&self, ctx: &CancellationToken) -> DomainResult<DispatchReport> {
        let pending = self.alerts.list_undelivered(self.config.batch_size).await?;
        let mut report = DispatchReport {
            fetched: pending.len(),
            ..Default::default()
        };
        let mut device_names: HashMap<i64, Option<String>> = HashMap::new();

        for alert in pending {
            if ctx.is_cancelled() {
                debug!("dispatch interrupted by shutdown");
                break;
            }

            let device_name = match alert.device_id {
                Some(device_id) => match device_names.get(&device_id) {
                    Some(name) => name.clone(),
                    None => {
                        let name = self.device_name(device_id).await;
                        device_names.insert(device_id, name.clone());
                        name
                    }
                },
                None => None,
            };

            self.pace().await;
            match self.dispatch(&alert, device_name.as_deref()).await {
                Dispatch::Delivered => report.delivered += 1,
                Dispatch::Failed => report.failed += 1,
                Dispatch::Unrecorded => report.unrecorded += 1,
            }
        }

        Ok(report)
    }

    #[instrument(skip(self, alert, device_name), fields(alert_id = alert.id, alert_type = %alert.alert_type))]
    async fn dispatch(&self, alert: &Alert, device_name: Option<&str>) -> Dispatch {
        let text = self.formatter.format(alert, device_name);
        let result = self.channel.send_text(&text).await;
        self.mark_sent_now();

        if let Err(e) = result {
            warn!(alert_id = alert.id, error = %e, "alert delivery failed, will retry next cycle");
            return Dispatch::Failed;
        }

        match self.alerts.mark_delivered(alert.id).await {
            Ok(()) => {
                info!(alert_id = alert.id, "alert delivered");
                Dispatch::Delivered
            }
            Err(e) => {
                error!(alert_id = alert.id, error = %e, "alert sent but delivery flag not updated");
                Dispatch::Unrecorded
            }
        }
    }

    async fn device_name(&self, device_id: i64) -> Option<String> {
        match self.devices.get_device(device_id).await {
            Ok(device) => device.map(|d| d.name),
            Err(e) => {
                warn!(device_id, error = %e, "device lookup failed, sending without name");
                None
            }
        }
    }

    async fn pace(&self) {
        if self.config.min_send_interval.is_zero() {
            return;
        }

        let last = self.last_send.lock().map(|guard| *guard).unwrap_or(None);
        if let Some(last) = last {
            let ready_at = last + self.config.min_send_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }

    fn mark_sent_now(&self) {
        if let Ok(mut guard) = self.last_send.lock() {
            *guard = Some(Instant::now());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Delivered,
    Failed,
    Unrecorded,
}
