//! One-shot page-ready signal.
//!
//! Startup success is announced exactly once per orchestrator lifetime.
//! The [`ReadySignal`] snapshot stays retrievable for as long as the page
//! lives, and the [`ReadyFlag`] lets late-constructed parts both check
//! readiness synchronously and await the transition.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Snapshot published when every required module loaded and initialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadySignal {
    /// Names of the modules active at the moment of readiness.
    pub loaded_modules: Vec<String>,

    /// When the page became ready.
    pub timestamp: DateTime<Utc>,

    /// Crate version that produced the signal.
    pub version: String,
}

impl ReadySignal {
    /// Creates a signal stamped with the current time and crate version.
    pub fn new(loaded_modules: Vec<String>) -> Self {
        Self {
            loaded_modules,
            timestamp: Utc::now(),
            version: crate::version().to_string(),
        }
    }
}

/// Set-once readiness flag with subscription support.
#[derive(Debug)]
pub struct ReadyFlag {
    cell: OnceCell<ReadySignal>,
    tx: watch::Sender<bool>,
}

impl ReadyFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            cell: OnceCell::new(),
            tx,
        }
    }

    /// Publishes the signal. Only the first call wins; later calls leave
    /// the stored signal untouched and return false.
    pub fn set(&self, signal: ReadySignal) -> bool {
        let won = self.cell.set(signal).is_ok();
        if won {
            self.tx.send_replace(true);
        }
        won
    }

    /// Returns the published signal, if any.
    pub fn get(&self) -> Option<&ReadySignal> {
        self.cell.get()
    }

    /// Returns true once the signal has been published.
    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns a receiver observing the `false -> true` transition.
    /// Receivers created after the transition see `true` immediately.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ReadyFlag {
    fn default() -> Self {
        Self::new()
    }
}
