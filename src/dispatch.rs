//! Typed event dispatch to registered observers.
//!
//! An observer implements any subset of the four listener roles and
//! advertises them through the capability queries on [`Observer`]. The
//! [`Dispatcher`] asks every registered observer for the role an event needs
//! and skips the ones that don't have it.
//!
//! # Example
//!
//! ```
//! use clusterix::dispatch::{Dispatcher, Observer, SpotListener};
//! use clusterix::spot::SpotRecord;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl SpotListener for Printer {
//!     fn on_spot(&self, spot: &SpotRecord) {
//!         println!("{spot}");
//!     }
//! }
//!
//! impl Observer for Printer {
//!     fn as_spot_listener(&self) -> Option<&dyn SpotListener> {
//!         Some(self)
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.register(Arc::new(Printer));
//! assert_eq!(dispatcher.len(), 1);
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use crate::spot::{SpotRecord, TextRecord, WwvRecord};

/// Receives connection state changes.
pub trait ConnectionListener: Send + Sync {
    fn on_connection_state(&self, connected: bool);
}

/// Receives decoded DX spots.
pub trait SpotListener: Send + Sync {
    fn on_spot(&self, spot: &SpotRecord);
}

/// Receives propagation (WWV) bulletins.
pub trait WwvListener: Send + Sync {
    fn on_wwv(&self, wwv: &WwvRecord);
}

/// Receives free-text announcements.
pub trait TextListener: Send + Sync {
    fn on_text(&self, text: &TextRecord);
}

/// A registered observer.
///
/// Each query returns `Some(self)` for the roles the observer implements.
/// Handlers run on the connection's read task, so they should return quickly
/// and must not panic.
pub trait Observer: Send + Sync {
    fn as_connection_listener(&self) -> Option<&dyn ConnectionListener> {
        None
    }

    fn as_spot_listener(&self) -> Option<&dyn SpotListener> {
        None
    }

    fn as_wwv_listener(&self) -> Option<&dyn WwvListener> {
        None
    }

    fn as_text_listener(&self) -> Option<&dyn TextListener> {
        None
    }
}

/// Insertion-ordered observer registry.
#[derive(Default)]
pub struct Dispatcher {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("observers", &self.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer. Registering the same observer twice delivers every
    /// event to it twice.
    pub fn register(&self, observer: Arc<dyn Observer>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the registry, so handlers may register further observers
    /// without deadlocking.
    fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn notify_connection_state(&self, connected: bool) {
        for observer in self.snapshot() {
            if let Some(listener) = observer.as_connection_listener() {
                listener.on_connection_state(connected);
            }
        }
    }

    pub fn notify_spot(&self, spot: &SpotRecord) {
        for observer in self.snapshot() {
            if let Some(listener) = observer.as_spot_listener() {
                listener.on_spot(spot);
            }
        }
    }

    pub fn notify_wwv(&self, wwv: &WwvRecord) {
        for observer in self.snapshot() {
            if let Some(listener) = observer.as_wwv_listener() {
                listener.on_wwv(wwv);
            }
        }
    }

    pub fn notify_text(&self, text: &TextRecord) {
        for observer in self.snapshot() {
            if let Some(listener) = observer.as_text_listener() {
                listener.on_text(text);
            }
        }
    }
}
