//! Transient user notices.
//!
//! Failures on interaction paths (a gallery that will not open, an order
//! flow that breaks mid-way) surface as a short-lived notice instead of an
//! error return. The embedder decides how a notice is rendered; the default
//! presenter just logs it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational message.
    Info,
    /// Something degraded; the page keeps working.
    Warning,
}

impl std::fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoticeLevel::Info => write!(f, "info"),
            NoticeLevel::Warning => write!(f, "warning"),
        }
    }
}

/// A short-lived message shown to the user and removed after its TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    /// Message text.
    pub text: String,

    /// Severity.
    pub level: NoticeLevel,

    /// How long the notice stays visible.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Notice {
    /// Creates an informational notice.
    pub fn info(text: impl Into<String>, ttl: Duration) -> Self {
        Self {
            text: text.into(),
            level: NoticeLevel::Info,
            ttl,
        }
    }

    /// Creates a warning notice.
    pub fn warning(text: impl Into<String>, ttl: Duration) -> Self {
        Self {
            text: text.into(),
            level: NoticeLevel::Warning,
            ttl,
        }
    }
}

/// Presents notices to the user. Implemented by the embedder.
pub trait NoticePresenter: Send + Sync {
    /// Shows one notice. Expiry after `notice.ttl` is the presenter's job.
    fn present(&self, notice: &Notice);
}

/// Default presenter that logs instead of rendering.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNoticePresenter;

impl NoticePresenter for LogNoticePresenter {
    fn present(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => info!(ttl = ?notice.ttl, "notice: {}", notice.text),
            NoticeLevel::Warning => warn!(ttl = ?notice.ttl, "notice: {}", notice.text),
        }
    }
}
