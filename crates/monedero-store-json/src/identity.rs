//! Local identity provider driving the shared session cell.
//!
//! Stand-in for the managed identity service: an in-memory account
//! registry with SHA-256 password digests. Useful for tests and offline
//! runs; the production provider lives behind the same trait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use monedero_core::{CoreError, CoreResult, FederatedProvider, IdentityProvider, SessionCell};
use monedero_domain::{AuthUser, SessionState};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    uid: Uuid,
    // None for accounts created through a federated flow.
    password_digest: Option<String>,
}

/// In-memory email/password identity provider.
#[derive(Default)]
pub struct LocalIdentityProvider {
    session: Arc<SessionCell>,
    accounts: Mutex<HashMap<String, Account>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits the initial session callback. Until this runs the session
    /// stays `Unknown`, mirroring a provider that has not yet restored
    /// any persisted credentials.
    pub fn resolve_initial_state(&self) {
        if !self.session.current().is_resolved() {
            self.session.set(SessionState::SignedOut);
        }
    }

    fn digest(password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn normalize_email(email: &str) -> CoreResult<String> {
        let normalized = email.trim().to_lowercase();
        if normalized.is_empty() || !normalized.contains('@') {
            return Err(CoreError::Auth("A valid email address is required".into()));
        }
        Ok(normalized)
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn session(&self) -> Arc<SessionCell> {
        self.session.clone()
    }

    fn sign_up(&self, email: &str, password: &str) -> CoreResult<AuthUser> {
        let email = Self::normalize_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(CoreError::Auth(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let mut accounts = lock(&self.accounts);
        if accounts.contains_key(&email) {
            return Err(CoreError::Auth("An account with this email already exists".into()));
        }
        let uid = Uuid::new_v4();
        accounts.insert(
            email.clone(),
            Account {
                uid,
                password_digest: Some(Self::digest(password)),
            },
        );
        drop(accounts);
        let user = AuthUser { uid, email };
        self.session.set(SessionState::SignedIn(user.clone()));
        debug!("signed up {}", user.uid);
        Ok(user)
    }

    fn sign_in(&self, email: &str, password: &str) -> CoreResult<AuthUser> {
        let email = Self::normalize_email(email)?;
        let accounts = lock(&self.accounts);
        let account = accounts
            .get(&email)
            .ok_or_else(|| CoreError::Auth("Invalid email or password".into()))?;
        let matches = account
            .password_digest
            .as_deref()
            .map(|digest| digest == Self::digest(password))
            .unwrap_or(false);
        if !matches {
            return Err(CoreError::Auth("Invalid email or password".into()));
        }
        let user = AuthUser {
            uid: account.uid,
            email,
        };
        drop(accounts);
        self.session.set(SessionState::SignedIn(user.clone()));
        Ok(user)
    }

    fn sign_in_federated(&self, provider: FederatedProvider, email: &str) -> CoreResult<AuthUser> {
        let email = Self::normalize_email(email)?;
        let mut accounts = lock(&self.accounts);
        let uid = accounts
            .entry(email.clone())
            .or_insert_with(|| Account {
                uid: Uuid::new_v4(),
                password_digest: None,
            })
            .uid;
        drop(accounts);
        let user = AuthUser { uid, email };
        self.session.set(SessionState::SignedIn(user.clone()));
        debug!("federated sign-in via {} for {}", provider, user.uid);
        Ok(user)
    }

    fn sign_out(&self) -> CoreResult<()> {
        self.session.set(SessionState::SignedOut);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
