//! Per-user session state.
//!
//! A [`SummarySession`] is created when a user signs in and dropped when they
//! sign out. It owns the generation state machine and shares the gateway and
//! store handles with whoever else needs them.

use crate::agent::{self, SummaryRequest};
use crate::gateway::ModelGateway;
use crate::generation::{GenerationMachine, GenerationStatus, GenerationView};
use crate::history::HistoryReader;
use crate::storage::SummaryStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

pub struct SummarySession {
    user_id: String,
    gateway: Arc<dyn ModelGateway>,
    store: Arc<dyn SummaryStore>,
    machine: Mutex<GenerationMachine>,
}

impl SummarySession {
    pub fn new(
        user_id: impl Into<String>,
        gateway: Arc<dyn ModelGateway>,
        store: Arc<dyn SummaryStore>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            gateway,
            store,
            machine: Mutex::new(GenerationMachine::new()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // The guard is never held across an await.
    fn machine(&self) -> MutexGuard<'_, GenerationMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> GenerationView {
        self.machine().view()
    }

    pub fn status(&self) -> GenerationStatus {
        self.machine().status()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.machine().set_text(text);
    }

    pub fn clear(&self) {
        self.machine().clear();
    }

    /// Summarise the current text.
    pub async fn submit(&self) -> bool {
        let text = self.machine().current_text().to_string();
        self.start(&text).await
    }

    /// Summarise `text` and apply the outcome.
    ///
    /// Returns false without touching anything when `text` is blank or a
    /// generation is already pending.
    pub async fn start(&self, text: &str) -> bool {
        let Some(ticket) = self.machine().start(text) else {
            return false;
        };

        let outcome = match SummaryRequest::new(text, self.user_id.as_str()) {
            Ok(request) => {
                agent::summarize(self.gateway.as_ref(), self.store.as_ref(), &request).await
            }
            Err(e) => Err(e),
        };

        let fulfilled = outcome.is_ok();
        if self.machine().complete(ticket, outcome) && fulfilled {
            info!(user_id = %self.user_id, epoch = ticket.epoch(), "summary ready");
        }
        true
    }

    /// Reader over this user's history, sharing the session's store.
    pub fn history(&self) -> HistoryReader {
        HistoryReader::new(Arc::clone(&self.store))
    }
}
