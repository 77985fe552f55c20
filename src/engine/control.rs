//! Message passing into the detection cycle.
//!
//! Nothing outside the cycle task touches its state. Other tasks hold a
//! [`ControlHandle`], send a [`ControlRequest`] and await the reply.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::{dedup::Counters, rhai::FunctionRegistryError};
use crate::{
    display::{ElementError, elements::Element},
    models::{JournalEntry, Settings, SettingsError},
    providers::SourceError,
};

/// A change to the running instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Set properties of a presentation element.
    ModifyElement { element_id: String, properties: Map<String, Value> },
    /// Deep-merge a patch into the live settings.
    UpdateSettings(Value),
    /// Compile and install a named function.
    DefineFunction { name: String, code: String },
    /// Start polling the recognition source.
    StartDetection,
    /// Stop polling and reset all detection state.
    StopDetection,
    /// Reset counters, dedup state, history and channel suppression.
    ResetCounters,
}

impl Mutation {
    /// The journal entry recording this mutation, for the kinds that are
    /// journaled.
    pub fn journal_entry(&self) -> Option<JournalEntry> {
        match self {
            Mutation::ModifyElement { element_id, properties } => {
                Some(JournalEntry::GuiModification {
                    element_id: element_id.clone(),
                    properties: properties.clone(),
                })
            }
            Mutation::UpdateSettings(patch) => Some(JournalEntry::SettingsUpdate(patch.clone())),
            Mutation::DefineFunction { name, code } => {
                Some(JournalEntry::FunctionDefinition { name: name.clone(), code: code.clone() })
            }
            Mutation::StartDetection | Mutation::StopDetection | Mutation::ResetCounters => None,
        }
    }
}

impl From<JournalEntry> for Mutation {
    fn from(entry: JournalEntry) -> Self {
        match entry {
            JournalEntry::GuiModification { element_id, properties } => {
                Mutation::ModifyElement { element_id, properties }
            }
            JournalEntry::SettingsUpdate(patch) => Mutation::UpdateSettings(patch),
            JournalEntry::FunctionDefinition { name, code } => {
                Mutation::DefineFunction { name, code }
            }
        }
    }
}

/// Why a mutation was refused.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Element(#[from] ElementError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Function(#[from] FunctionRegistryError),

    #[error("Recognition source error: {0}")]
    Source(#[from] SourceError),

    /// The detection cycle has shut down.
    #[error("Detection cycle is not running")]
    Unavailable,
}

/// A read-only view of the cycle's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub counters: Counters,
    pub settings: Settings,
    pub functions: Vec<String>,
    pub elements: BTreeMap<String, Element>,
    pub plate_ticker: Vec<String>,
}

/// A request handled by the detection cycle between two ticks.
#[derive(Debug)]
pub enum ControlRequest {
    Apply { mutation: Mutation, reply: oneshot::Sender<Result<(), MutationError>> },
    Snapshot { reply: oneshot::Sender<StatusSnapshot> },
}

/// Cloneable sender side of the control queue.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    /// Creates a bounded control queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ControlRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Applies `mutation` in the detection cycle and waits for the outcome.
    pub async fn apply(&self, mutation: Mutation) -> Result<(), MutationError> {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(ControlRequest::Apply { mutation, reply })
            .await
            .map_err(|_| MutationError::Unavailable)?;
        outcome.await.map_err(|_| MutationError::Unavailable)?
    }

    /// Fetches a snapshot of the cycle's state.
    pub async fn snapshot(&self) -> Result<StatusSnapshot, MutationError> {
        let (reply, snapshot) = oneshot::channel();
        self.sender
            .send(ControlRequest::Snapshot { reply })
            .await
            .map_err(|_| MutationError::Unavailable)?;
        snapshot.await.map_err(|_| MutationError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_journal_entries_map_back_to_mutations() {
        let mutations = vec![
            Mutation::ModifyElement {
                element_id: "status_bar".into(),
                properties: json!({ "text": "x" }).as_object().cloned().unwrap(),
            },
            Mutation::UpdateSettings(json!({ "privacy_mode": true })),
            Mutation::DefineFunction { name: "f".into(), code: "fn f() { 1 }".into() },
        ];
        for mutation in mutations {
            let entry = mutation.journal_entry().unwrap();
            assert_eq!(Mutation::from(entry), mutation);
        }
        assert!(Mutation::ResetCounters.journal_entry().is_none());
        assert!(Mutation::StartDetection.journal_entry().is_none());
    }

    #[tokio::test]
    async fn test_apply_without_cycle_is_unavailable() {
        let (handle, receiver) = ControlHandle::channel(1);
        drop(receiver);
        let err = handle.apply(Mutation::ResetCounters).await.unwrap_err();
        assert!(matches!(err, MutationError::Unavailable));
    }

    #[tokio::test]
    async fn test_apply_round_trip() {
        let (handle, mut receiver) = ControlHandle::channel(1);
        let responder = tokio::spawn(async move {
            if let Some(ControlRequest::Apply { mutation, reply }) = receiver.recv().await {
                assert_eq!(mutation, Mutation::ResetCounters);
                reply.send(Ok(())).unwrap();
            }
        });
        handle.apply(Mutation::ResetCounters).await.unwrap();
        responder.await.unwrap();
    }
}
