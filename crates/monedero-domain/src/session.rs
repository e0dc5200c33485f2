//! Session and identity state shared across the application.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identity-provider view of a signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: Uuid,
    pub email: String,
}

/// Current authentication state.
///
/// Starts as `Unknown` until the identity provider's first callback
/// resolves it one way or the other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unknown,
    SignedOut,
    SignedIn(AuthUser),
}

impl SessionState {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            SessionState::SignedIn(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn(_))
    }

    /// `true` once the provider has reported either signed-in or signed-out.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionState::Unknown)
    }
}
