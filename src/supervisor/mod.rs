//! The Supervisor module manages the lifecycle of a Vigil instance.
//!
//! The `SupervisorBuilder` wires the detection cycle, the alert dispatcher,
//! the archive sweeper and the command server together and replays the update
//! journal. The `Supervisor` then runs them as tasks sharing one
//! cancellation token:
//!
//! - `SIGINT`/`SIGTERM` cancel the token.
//! - A panicking task cancels the token as well, so the instance never keeps
//!   running half-alive.
//! - On shutdown the dispatcher delivers the alerts still queued, bounded by
//!   `shutdown_timeout`.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::{signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    engine::{ControlHandle, DetectionCycle, Mutation, MutationError},
    http_client::HttpClientError,
    notification::{AlertDispatcher, NotificationError, RetentionSweeper},
    persistence::{PersistenceError, UpdateJournal},
    remote::{CommandHandler, CommandServer},
};

/// Errors that can occur while building or running the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// An update journal was not provided to the `SupervisorBuilder`.
    #[error("Missing update journal for Supervisor")]
    MissingJournal,

    /// A recognition source was not provided to the `SupervisorBuilder`.
    #[error("Missing recognition source for Supervisor")]
    MissingSource,

    /// The update journal could not be read.
    #[error("Update journal error: {0}")]
    Journal(#[from] PersistenceError),

    /// The HTTP client for the remote messenger could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpClientError),

    /// The remote messenger could not be configured.
    #[error("Notification setup error: {0}")]
    Notification(#[from] NotificationError),

    /// Detection could not be started.
    #[error("Failed to start detection: {0}")]
    Start(#[from] MutationError),
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    config: Arc<AppConfig>,
    journal: Arc<dyn UpdateJournal>,
    cycle: DetectionCycle,
    dispatcher: AlertDispatcher,
    sweeper: RetentionSweeper,
    control: ControlHandle,
    cancellation_token: CancellationToken,
    join_set: JoinSet<()>,
}

impl Supervisor {
    fn new(
        config: AppConfig,
        journal: Arc<dyn UpdateJournal>,
        cycle: DetectionCycle,
        dispatcher: AlertDispatcher,
        sweeper: RetentionSweeper,
        control: ControlHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            journal,
            cycle,
            dispatcher,
            sweeper,
            control,
            cancellation_token: CancellationToken::new(),
            join_set: JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// A handle for sending mutations to the detection cycle.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// The token that stops the supervisor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    #[cfg(test)]
    fn cycle_snapshot(&self) -> crate::engine::StatusSnapshot {
        self.cycle.snapshot()
    }

    /// Starts detection and every service, then waits for a shutdown signal,
    /// an external cancellation or a failed task.
    pub async fn run(self) -> Result<(), SupervisorError> {
        let Self {
            config,
            journal,
            mut cycle,
            dispatcher,
            sweeper,
            control,
            cancellation_token,
            mut join_set,
        } = self;

        let signal_token = cancellation_token.clone();
        join_set.spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => signal_token.cancel(),
                _ = signal_token.cancelled() => {}
            }
        });

        cycle.apply(Mutation::StartDetection).await?;
        join_set.spawn(cycle.run(cancellation_token.clone()));
        join_set.spawn(dispatcher.run(cancellation_token.clone()));
        join_set.spawn(sweeper.run(cancellation_token.clone()));

        if config.server.enabled {
            let handler = CommandHandler::new(control, journal);
            match CommandServer::bind(&config.server, handler).await {
                Ok(server) => {
                    join_set.spawn(server.run(cancellation_token.clone()));
                }
                Err(e) => tracing::error!(
                    address = %config.server.listen_address,
                    error = %e,
                    "Failed to bind command server, continuing without remote control."
                ),
            }
        }

        tracing::info!("All services started.");

        loop {
            tokio::select! {
                maybe_result = join_set.join_next() => match maybe_result {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = ?e, "A critical task failed. Initiating shutdown.");
                        cancellation_token.cancel();
                    }
                    None => break,
                },
                _ = cancellation_token.cancelled() => break,
            }
        }

        let shutdown_timeout = config.shutdown_timeout;
        let drain = async {
            while let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    tracing::error!(error = ?e, "Task failed during shutdown.");
                }
            }
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Tasks did not finish within the shutdown timeout, aborting them."
            );
            join_set.shutdown().await;
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT.");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler.");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
        _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
    }
}
