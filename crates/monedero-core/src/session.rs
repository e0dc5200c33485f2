//! Observable session state and the identity-provider seam.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use monedero_domain::{AuthUser, SessionState};

use crate::CoreResult;

pub type SessionObserver = Arc<dyn Fn(&SessionState) + Send + Sync>;

/// Process-wide observable cell holding the current authentication state.
///
/// Starts at [`SessionState::Unknown`]; the identity provider resolves it
/// asynchronously. Observers are invoked with the current state when they
/// subscribe and again on every change.
#[derive(Default)]
pub struct SessionCell {
    state: Mutex<SessionState>,
    observers: Mutex<HashMap<u64, SessionObserver>>,
    next_observer: AtomicU64,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SessionState {
        lock(&self.state).clone()
    }

    /// Replaces the state and notifies every observer.
    pub fn set(&self, state: SessionState) {
        {
            let mut guard = lock(&self.state);
            *guard = state.clone();
        }
        debug!("session state changed: {:?}", state_label(&state));
        let observers: Vec<SessionObserver> = lock(&self.observers).values().cloned().collect();
        for observer in observers {
            observer(&state);
        }
    }

    /// Registers an observer and immediately delivers the current state.
    pub fn subscribe(&self, observer: SessionObserver) -> u64 {
        let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        lock(&self.observers).insert(id, observer.clone());
        let current = self.current();
        observer(&current);
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        lock(&self.observers).remove(&id);
    }
}

fn state_label(state: &SessionState) -> &'static str {
    match state {
        SessionState::Unknown => "unknown",
        SessionState::SignedOut => "signed-out",
        SessionState::SignedIn(_) => "signed-in",
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Federated sign-in flavors the product supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedProvider {
    Google,
}

impl fmt::Display for FederatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FederatedProvider::Google => f.write_str("Google"),
        }
    }
}

/// The managed identity service the application delegates to.
///
/// Only session state and the four entry points below are consumed; the
/// actual protocol is the provider's business. Every error surfaces as a
/// single [`crate::CoreError::Auth`] with no retry.
pub trait IdentityProvider: Send + Sync {
    /// The shared cell this provider keeps up to date.
    fn session(&self) -> Arc<SessionCell>;

    fn sign_up(&self, email: &str, password: &str) -> CoreResult<AuthUser>;

    fn sign_in(&self, email: &str, password: &str) -> CoreResult<AuthUser>;

    /// Completes a federated flow; `email` is the identity asserted by the
    /// external provider.
    fn sign_in_federated(&self, provider: FederatedProvider, email: &str) -> CoreResult<AuthUser>;

    fn sign_out(&self) -> CoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    #[test]
    fn subscribe_delivers_current_state_immediately() {
        let cell = SessionCell::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cell.subscribe(Arc::new(move |state: &SessionState| {
            sink.lock().unwrap().push(state.clone());
        }));
        assert_eq!(seen.lock().unwrap().as_slice(), &[SessionState::Unknown]);
    }

    #[test]
    fn set_notifies_all_observers() {
        let cell = SessionCell::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let counter = count.clone();
            cell.subscribe(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        // two initial deliveries
        assert_eq!(count.load(Ordering::SeqCst), 2);

        cell.set(SessionState::SignedOut);
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(cell.current(), SessionState::SignedOut);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let cell = SessionCell::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = cell.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        cell.unsubscribe(id);
        cell.set(SessionState::SignedIn(AuthUser {
            uid: Uuid::new_v4(),
            email: "ana@example.com".into(),
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
