//! Toast notifications: the presentation-side notification collaborator.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Kind of notification shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

/// One notification as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Receives user-facing notifications. Fire-and-forget.
pub trait Toaster: Send + Sync {
    fn notify(&self, kind: ToastKind, title: &str, message: &str);
}

/// Bounded in-memory toast log. Also mirrors every toast to tracing.
pub struct ToastLog {
    entries: Mutex<VecDeque<Toast>>,
    capacity: usize,
}

impl ToastLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Most recent toasts, oldest first.
    pub fn recent(&self) -> Vec<Toast> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: ToastKind) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| t.kind == kind)
            .count()
    }
}

impl Default for ToastLog {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Toaster for ToastLog {
    fn notify(&self, kind: ToastKind, title: &str, message: &str) {
        match kind {
            ToastKind::Error => warn!(title, message, "Toast"),
            _ => info!(?kind, title, message, "Toast"),
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(Toast {
            kind,
            title: title.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }
}
