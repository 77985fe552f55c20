//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    display::{DisplaySink, WatchDisplaySink},
    engine::{
        ControlHandle, CycleChannels, CycleOptions, DetectionCycle, Mutation,
        rhai::{FunctionRegistry, RhaiCompiler},
    },
    http_client::create_http_client,
    notification::{
        AlertDispatcher, AudioSink, ImageArchive, LogAudioSink, RemoteMessenger,
        RetentionSweeper, TelegramMessenger,
    },
    persistence::UpdateJournal,
    providers::RecognitionSource,
};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    journal: Option<Arc<dyn UpdateJournal>>,
    source: Option<Box<dyn RecognitionSource>>,
    messenger: Option<Arc<dyn RemoteMessenger>>,
    display: Option<Arc<dyn DisplaySink>>,
    audio: Option<Arc<dyn AudioSink>>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the update journal replayed at startup and appended to by the
    /// command server.
    pub fn journal(mut self, journal: Arc<dyn UpdateJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Sets the recognition source polled by the detection cycle.
    pub fn source(mut self, source: Box<dyn RecognitionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Overrides the remote messenger. Defaults to Telegram.
    pub fn messenger(mut self, messenger: Arc<dyn RemoteMessenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Overrides the display sink. Defaults to a watch channel nobody reads.
    pub fn display(mut self, display: Arc<dyn DisplaySink>) -> Self {
        self.display = Some(display);
        self
    }

    /// Overrides the audio sink. Defaults to logging.
    pub fn audio(mut self, audio: Arc<dyn AudioSink>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Wires the services together and replays the update journal into the
    /// detection cycle, so the instance starts with every accepted mutation
    /// applied in order.
    pub async fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let journal = self.journal.ok_or(SupervisorError::MissingJournal)?;
        let source = self.source.ok_or(SupervisorError::MissingSource)?;

        let messenger = match self.messenger {
            Some(messenger) => messenger,
            None => {
                let client = create_http_client(&config.http_client)?;
                Arc::new(TelegramMessenger::new(client, &config.telegram_api_url)?)
            }
        };
        let display = self.display.unwrap_or_else(|| Arc::new(WatchDisplaySink::new().0));
        let audio = self.audio.unwrap_or_else(|| Arc::new(LogAudioSink));

        let compiler = Arc::new(RhaiCompiler::new(&config.rhai));
        let functions = FunctionRegistry::new(compiler, config.functions.enabled);

        let (control, control_rx) = ControlHandle::channel(config.control_queue_capacity);
        let (alerts_tx, alerts_rx) = mpsc::channel(config.alert_channel_capacity.max(1));
        let (retention_tx, retention_rx) = watch::channel(config.settings.archive.retention());

        let mut cycle = DetectionCycle::new(
            CycleOptions::from(&config),
            config.settings.clone(),
            source,
            functions,
            CycleChannels {
                display,
                audio,
                alerts: alerts_tx,
                control: control_rx,
                retention: retention_tx,
            },
        );

        let entries = journal.replay_all().await?;
        let total = entries.len();
        let mut skipped = 0;
        for entry in entries {
            let kind = entry.kind();
            if let Err(e) = cycle.apply(Mutation::from(entry)).await {
                skipped += 1;
                tracing::warn!(kind, error = %e, "Skipping journal entry that no longer applies.");
            }
        }
        tracing::info!(total, skipped, "Update journal replayed.");

        let archive = Arc::new(ImageArchive::new(config.archive.directory.clone()));
        let dispatcher = AlertDispatcher::new(messenger, Arc::clone(&archive), alerts_rx);
        let sweeper = RetentionSweeper::new(archive, config.archive.sweep_interval_secs, retention_rx);

        Ok(Supervisor::new(config, journal, cycle, dispatcher, sweeper, control))
    }
}
