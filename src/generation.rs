//! Generation state machine.
//!
//! ```text
//! idle ──start──▶ pending ──complete(ok)──▶ fulfilled
//!                    │                          │
//!                    └──complete(err)──▶ rejected
//! any ──clear──▶ idle            fulfilled | rejected ──start──▶ pending
//! ```
//!
//! Every accepted `start` hands out a [`Ticket`] stamped with the current
//! epoch. `clear` and each new `start` advance the epoch, and a completion
//! whose ticket is stale is dropped, so a late reply can never overwrite
//! newer state.

use crate::agent::AgentError;
use crate::summary::Bullets;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationStatus {
    #[default]
    Idle,
    Pending,
    Fulfilled,
    Rejected,
}

/// Proof that a generation was started in a given epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Ticket {
    epoch: u64,
}

impl Ticket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// The UI-facing snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationView {
    pub current_text: String,
    /// Empty, or exactly five bullets
    pub current_summary: Vec<String>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct GenerationMachine {
    current_text: String,
    current_summary: Option<Bullets>,
    status: GenerationStatus,
    error: Option<String>,
    epoch: u64,
}

impl GenerationMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn current_summary(&self) -> &[String] {
        self.current_summary
            .as_ref()
            .map(Bullets::as_slice)
            .unwrap_or(&[])
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.status == GenerationStatus::Pending
    }

    /// Whether `start` with `text` would be accepted right now.
    pub fn can_start(&self, text: &str) -> bool {
        !self.is_loading() && !text.trim().is_empty()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.current_text = text.into();
    }

    /// Enter `pending`. Returns `None`, leaving everything untouched, when
    /// `text` is blank or a generation is already pending.
    pub fn start(&mut self, text: &str) -> Option<Ticket> {
        if !self.can_start(text) {
            return None;
        }
        self.epoch += 1;
        self.status = GenerationStatus::Pending;
        self.error = None;
        Some(Ticket { epoch: self.epoch })
    }

    /// Apply the outcome of the generation identified by `ticket`.
    ///
    /// Returns false when the ticket is stale and the outcome was dropped.
    pub fn complete(&mut self, ticket: Ticket, outcome: Result<Bullets, AgentError>) -> bool {
        if ticket.epoch != self.epoch || self.status != GenerationStatus::Pending {
            debug!(
                ticket = ticket.epoch,
                epoch = self.epoch,
                "discarding stale generation result"
            );
            return false;
        }
        match outcome {
            Ok(bullets) => {
                self.current_summary = Some(bullets);
                self.status = GenerationStatus::Fulfilled;
            }
            Err(e) => {
                self.error = Some(e.to_string());
                self.status = GenerationStatus::Rejected;
            }
        }
        true
    }

    /// Reset text, summary and error and return to `idle` from any status.
    /// An in-flight generation keeps running but its result will be dropped.
    pub fn clear(&mut self) {
        self.epoch += 1;
        self.current_text.clear();
        self.current_summary = None;
        self.error = None;
        self.status = GenerationStatus::Idle;
    }

    pub fn view(&self) -> GenerationView {
        GenerationView {
            current_text: self.current_text.clone(),
            current_summary: self.current_summary().to_vec(),
            loading: self.is_loading(),
            error: self.error.clone(),
        }
    }
}
