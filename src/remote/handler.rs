//! Executes decoded commands against the running instance.

use std::sync::Arc;

use command_models::{CommandRequest, CommandResponse};

use super::protocol::decode_command;
use crate::{engine::ControlHandle, persistence::UpdateJournal};

/// Applies commands through the control queue and journals the ones that
/// succeed.
#[derive(Clone)]
pub struct CommandHandler {
    control: ControlHandle,
    journal: Arc<dyn UpdateJournal>,
}

impl CommandHandler {
    pub fn new(control: ControlHandle, journal: Arc<dyn UpdateJournal>) -> Self {
        Self { control, journal }
    }

    /// Handles one request and produces its response.
    pub async fn handle(&self, request: CommandRequest) -> CommandResponse {
        let mutation = match decode_command(&request) {
            Ok(Some(mutation)) => mutation,
            Ok(None) => {
                tracing::debug!(command = ?request.command, "Unknown command.");
                return CommandResponse::unknown_command();
            }
            Err(e) => return CommandResponse::failure(e.to_string()),
        };
        let entry = mutation.journal_entry();

        if let Err(e) = self.control.apply(mutation).await {
            tracing::info!(command = ?request.command, error = %e, "Command rejected.");
            return CommandResponse::failure(e.to_string());
        }

        if let Some(entry) = entry {
            // The mutation is already live, so a journal failure only loses it
            // on the next restart.
            if let Err(e) = self.journal.append(&entry).await {
                tracing::error!(kind = entry.kind(), error = %e, "Failed to journal mutation.");
            }
        }
        tracing::info!(command = ?request.command, "Command applied.");
        CommandResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        engine::{ControlRequest, MutationError},
        models::JournalEntry,
        persistence::MockUpdateJournal,
    };

    fn spawn_cycle_stub(
        mut receiver: tokio::sync::mpsc::Receiver<ControlRequest>,
        accept: bool,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                if let ControlRequest::Apply { reply, .. } = request {
                    let outcome = if accept {
                        Ok(())
                    } else {
                        Err(MutationError::Element(crate::display::ElementError::NotFound(
                            "x".into(),
                        )))
                    };
                    let _ = reply.send(outcome);
                }
            }
        })
    }

    #[tokio::test]
    async fn test_success_is_journaled() {
        let (control, receiver) = ControlHandle::channel(4);
        spawn_cycle_stub(receiver, true);

        let mut journal = MockUpdateJournal::new();
        journal
            .expect_append()
            .withf(|entry| matches!(entry, JournalEntry::SettingsUpdate(_)))
            .times(1)
            .returning(|_| Ok(()));

        let handler = CommandHandler::new(control, Arc::new(journal));
        let response = handler
            .handle(CommandRequest::new("update_settings", json!({ "privacy_mode": true })))
            .await;
        assert_eq!(response, CommandResponse::ok());
    }

    #[tokio::test]
    async fn test_rejection_is_not_journaled() {
        let (control, receiver) = ControlHandle::channel(4);
        spawn_cycle_stub(receiver, false);

        let mut journal = MockUpdateJournal::new();
        journal.expect_append().times(0);

        let handler = CommandHandler::new(control, Arc::new(journal));
        let response = handler
            .handle(CommandRequest::new(
                "modify_gui",
                json!({ "element_id": "x", "properties": {} }),
            ))
            .await;
        assert_eq!(response, CommandResponse::failure("Element 'x' not found"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (control, _receiver) = ControlHandle::channel(4);
        let mut journal = MockUpdateJournal::new();
        journal.expect_append().times(0);

        let handler = CommandHandler::new(control, Arc::new(journal));
        let response = handler.handle(CommandRequest::new("self_destruct", json!({}))).await;
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"success":false,"error":"Unknown command"}"#
        );
    }

    #[tokio::test]
    async fn test_journal_failure_still_answers_success() {
        let (control, receiver) = ControlHandle::channel(4);
        spawn_cycle_stub(receiver, true);

        let mut journal = MockUpdateJournal::new();
        journal
            .expect_append()
            .times(1)
            .returning(|_| Err(crate::persistence::PersistenceError::Database(sqlx::Error::PoolClosed)));

        let handler = CommandHandler::new(control, Arc::new(journal));
        let response = handler
            .handle(CommandRequest::new("add_function", json!({ "name": "f", "code": "fn f() {1}" })))
            .await;
        assert!(response.success);
    }
}
