//! Collaborator interfaces the engine depends on, with stock implementations.
//!
//! The engine never talks to a concrete identity service, database or UI.
//! Hosts plug in implementations of these traits; the ones here cover tests,
//! headless runs and simple local setups.
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::PersistenceError;
use crate::records::GameSummaryRecord;

/// Supplies the signed-in user, if any.
pub trait IdentityProvider: Send {
    fn current_user_id(&self) -> Option<String>;
}

/// Durable, append-only store for finished-game summaries.
pub trait PersistenceSink: Send {
    /// Store one summary.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::WriteFailed`] when the record could not be
    /// stored, or [`PersistenceError::Unavailable`] when the backend is unreachable.
    fn submit_game_summary(&self, record: &GameSummaryRecord) -> Result<(), PersistenceError>;
}

/// Fire-and-forget user-facing messages.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// A toast-style message for the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notice {
    #[must_use]
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    #[must_use]
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// Identity fixed at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    #[must_use]
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Collects notices in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct NoticeBuffer {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take everything received so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn last(&self) -> Option<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl NotificationSink for NoticeBuffer {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

/// Forwards notices to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Info => log::info!("notice {}: {}", notice.title, notice.message),
            Severity::Error => log::warn!("notice {}: {}", notice.title, notice.message),
        }
    }
}
