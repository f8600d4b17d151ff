//! Explicit authentication context.
//!
//! A [`SessionContext`] is created empty at startup, filled by
//! [`SessionContext::acquire`], kept current by [`SessionContext::refresh`]
//! or by applying [`AuthEvent`]s, and cleared by
//! [`SessionContext::sign_out`]. It is passed to whatever needs the current
//! user instead of living in global state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CatalogBackend, CatalogError};

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens issued by the backend for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    /// Whether the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - margin <= now
    }
}

/// Authentication state changes reported by the backend.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A user signed in; carries the resolved admin flag
    SignedIn { session: Session, is_admin: bool },
    /// Tokens were refreshed for the same user
    TokenRefreshed(Session),
    /// The role lookup for the current user was re-run
    RoleResolved { is_admin: bool },
    /// The user signed out or the session was revoked
    SignedOut,
}

/// Current user and derived role.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    session: Option<Session>,
    is_admin: bool,
}

impl SessionContext {
    /// Anonymous context.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Sign in and resolve the admin role.
    ///
    /// A failed role lookup leaves the user signed in without admin rights.
    pub async fn acquire(
        backend: &dyn CatalogBackend,
        email: &str,
        password: &str,
    ) -> Result<Self, CatalogError> {
        let session = backend.sign_in(email, password).await?;
        let is_admin = match backend.is_admin(&session).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                warn!("Role lookup failed for user {}: {}", session.user.id, e);
                false
            }
        };

        info!(
            "Signed in as {} (admin: {})",
            session.user.email.as_deref().unwrap_or(&session.user.id),
            is_admin
        );

        let mut ctx = Self::anonymous();
        ctx.apply(AuthEvent::SignedIn { session, is_admin });
        Ok(ctx)
    }

    /// Refresh the tokens of the current session and re-check the role.
    ///
    /// A failed role lookup drops admin rights until the next refresh.
    pub async fn refresh(&mut self, backend: &dyn CatalogBackend) -> Result<(), CatalogError> {
        let Some(current) = &self.session else {
            return Err(CatalogError::Auth("not signed in".to_string()));
        };
        let refreshed = backend.refresh(current).await?;
        let is_admin = match backend.is_admin(&refreshed).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                warn!("Role lookup failed for user {}: {}", refreshed.user.id, e);
                false
            }
        };

        self.apply(AuthEvent::TokenRefreshed(refreshed));
        self.apply(AuthEvent::RoleResolved { is_admin });
        Ok(())
    }

    /// Revoke the session and clear the context.
    ///
    /// The context is cleared even if the backend call fails.
    pub async fn sign_out(&mut self, backend: &dyn CatalogBackend) -> Result<(), CatalogError> {
        let result = match &self.session {
            Some(session) => backend.sign_out(session).await,
            None => Ok(()),
        };
        self.apply(AuthEvent::SignedOut);
        result
    }

    /// Apply an authentication event.
    pub fn apply(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn { session, is_admin } => {
                self.session = Some(session);
                self.is_admin = is_admin;
            }
            AuthEvent::TokenRefreshed(session) => {
                // A refresh for a different user is a sign-in we did not see
                if self.user().map(|u| &u.id) != Some(&session.user.id) {
                    warn!("Token refresh for a different user; dropping admin role");
                    self.is_admin = false;
                }
                debug!("Session refreshed, expires at {}", session.expires_at);
                self.session = Some(session);
            }
            AuthEvent::RoleResolved { is_admin } => {
                if self.is_admin != is_admin {
                    info!("Admin role changed: {} -> {}", self.is_admin, is_admin);
                }
                self.is_admin = self.session.is_some() && is_admin;
            }
            AuthEvent::SignedOut => {
                self.session = None;
                self.is_admin = false;
            }
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_some() && self.is_admin
    }

    /// The session, if its user is an admin.
    pub fn require_admin(&self) -> Result<&Session, CatalogError> {
        match &self.session {
            Some(session) if self.is_admin => Ok(session),
            _ => Err(CatalogError::Forbidden),
        }
    }
}
