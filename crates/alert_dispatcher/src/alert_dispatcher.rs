use crate::domain::{AlertDispatcher, AlertMessageFormatter, ChatChannel, DispatcherConfig};
use crate::telegram::{TelegramClient, TelegramConfig};
use anyhow::{Context, Result};
use common::domain::{AlertRepository, DeviceRepository};
use std::sync::Arc;
use tracing::info;
use voltwatch_runner::AppProcess;

/// Chat alert module: owns the channel and hosts the dispatcher loop
pub struct AlertDispatcherWorker {
    channel: Arc<dyn ChatChannel>,
    dispatcher: AlertDispatcher,
}

impl AlertDispatcherWorker {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        devices: Arc<dyn DeviceRepository>,
        telegram: TelegramConfig,
        utc_offset_minutes: i32,
        config: DispatcherConfig,
    ) -> Result<Self> {
        info!("Initializing alert dispatcher module");

        let channel: Arc<dyn ChatChannel> = Arc::new(TelegramClient::new(telegram)?);
        Self::with_channel(alerts, devices, channel, utc_offset_minutes, config)
    }

    pub fn with_channel(
        alerts: Arc<dyn AlertRepository>,
        devices: Arc<dyn DeviceRepository>,
        channel: Arc<dyn ChatChannel>,
        utc_offset_minutes: i32,
        config: DispatcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        let formatter = AlertMessageFormatter::new(utc_offset_minutes)?;
        let dispatcher = AlertDispatcher::new(alerts, devices, channel.clone(), formatter, config);
        Ok(Self {
            channel,
            dispatcher,
        })
    }

    /// Fails when the chat API is unreachable or rejects the credentials
    pub async fn startup_check(&self) -> Result<()> {
        let bot = self
            .channel
            .check()
            .await
            .context("chat channel is not reachable")?;
        info!(bot = %bot, "chat channel connected");
        Ok(())
    }

    pub fn into_runner_process(self) -> AppProcess {
        let dispatcher = self.dispatcher;
        Box::new(move |ctx| Box::pin(async move { dispatcher.run(ctx).await }))
    }
}
