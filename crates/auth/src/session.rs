//! Session/Principal Resolver.
//!
//! A [`SessionContext`] is constructed explicitly and handed to whatever
//! needs the current principal. It holds the access/refresh pair, the
//! resolved [`Principal`], and publishes its [`SessionState`] on a watch
//! channel.
//!
//! Requests go through [`SessionContext::authorized`]: a rejected access
//! token triggers at most one renewal and one retry. Concurrent expiries
//! share a single renewal.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, watch};

use crate::claims::TokenPair;
use crate::menu::MenuItem;
use crate::principal::Principal;
use crate::user::UserProfile;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No credential, or the backend rejected it (401).
    #[error("not authenticated")]
    Unauthenticated,

    /// Renewal failed; both credentials were cleared.
    #[error("session expired, sign in again")]
    SessionExpired,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl SessionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Transport { retryable: true, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Backend calls the resolver depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange primary credentials for an access/refresh pair.
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, SessionError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh: &str) -> Result<String, SessionError>;

    async fn logout(&self, access: &str, refresh: &str) -> Result<(), SessionError>;

    async fn profile(&self, access: &str) -> Result<UserProfile, SessionError>;

    /// The caller's role-scoped, already-derived menu.
    async fn menu(&self, access: &str) -> Result<Vec<MenuItem>, SessionError>;
}

#[async_trait]
impl<B> AuthBackend for Arc<B>
where
    B: AuthBackend + ?Sized,
{
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, SessionError> {
        (**self).login(username, password).await
    }

    async fn refresh(&self, refresh: &str) -> Result<String, SessionError> {
        (**self).refresh(refresh).await
    }

    async fn logout(&self, access: &str, refresh: &str) -> Result<(), SessionError> {
        (**self).logout(access, refresh).await
    }

    async fn profile(&self, access: &str) -> Result<UserProfile, SessionError> {
        (**self).profile(access).await
    }

    async fn menu(&self, access: &str) -> Result<Vec<MenuItem>, SessionError> {
        (**self).menu(access).await
    }
}

pub struct SessionContext<B> {
    backend: Arc<B>,
    tokens: RwLock<Option<TokenPair>>,
    principal: RwLock<Option<Principal>>,
    renewal: Mutex<()>,
    state: watch::Sender<SessionState>,
}

impl<B> SessionContext<B>
where
    B: AuthBackend,
{
    pub fn new(backend: Arc<B>) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            backend,
            tokens: RwLock::new(None),
            principal: RwLock::new(None),
            renewal: Mutex::new(()),
            state,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions, e.g. to redirect to sign-in on
    /// `Unauthenticated`.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current credentials, for persisting between runs.
    pub async fn tokens(&self) -> Option<TokenPair> {
        self.tokens.read().await.clone()
    }

    pub async fn principal(&self) -> Option<Principal> {
        self.principal.read().await.clone()
    }

    fn transition(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = ?prev, to = ?next, "session state changed");
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Principal, SessionError> {
        self.transition(SessionState::Authenticating);
        let pair = match self.backend.login(username, password).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(username, error = %e, "login failed");
                self.clear().await;
                return Err(e);
            }
        };
        *self.tokens.write().await = Some(pair);
        let principal = self.establish().await?;
        tracing::info!(username, user_id = %principal.profile.id, "signed in");
        Ok(principal)
    }

    /// Resume a session from persisted credentials.
    pub async fn restore(&self, pair: TokenPair) -> Result<Principal, SessionError> {
        self.transition(SessionState::Authenticating);
        *self.tokens.write().await = Some(pair);
        self.establish().await
    }

    async fn establish(&self) -> Result<Principal, SessionError> {
        match self.resolve_principal().await {
            Ok(principal) => Ok(principal),
            Err(e) => {
                self.clear().await;
                Err(e)
            }
        }
    }

    /// Recompute the principal (profile and role-scoped menu) from the
    /// backend. Role edits made since the last call take effect here.
    pub async fn resolve_principal(&self) -> Result<Principal, SessionError> {
        let profile = self.authorized(|token| async move { self.backend.profile(&token).await }).await?;
        let menu = self.authorized(|token| async move { self.backend.menu(&token).await }).await?;

        let principal = Principal::new(profile, menu);
        *self.principal.write().await = Some(principal.clone());
        self.transition(SessionState::Authenticated);
        Ok(principal)
    }

    /// Re-fetch only the menu. The caller may drop this future at any point
    /// without side effects beyond a completed renewal.
    pub async fn refresh_menu(&self) -> Result<Vec<MenuItem>, SessionError> {
        let menu = self.authorized(|token| async move { self.backend.menu(&token).await }).await?;
        if let Some(principal) = self.principal.write().await.as_mut() {
            principal.menu = menu.clone();
        }
        Ok(menu)
    }

    /// Tear down the session. The refresh token is revoked on a best-effort
    /// basis; local state is cleared either way.
    pub async fn logout(&self) {
        let pair = self.tokens.read().await.clone();
        if let Some(pair) = pair {
            if let Err(e) = self.backend.logout(&pair.access, &pair.refresh).await {
                tracing::warn!(error = %e, "logout request failed");
            }
        }
        self.clear().await;
        tracing::info!("signed out");
    }

    async fn clear(&self) {
        *self.tokens.write().await = None;
        *self.principal.write().await = None;
        self.transition(SessionState::Unauthenticated);
    }

    /// Run `op` with the current access token. When the backend rejects the
    /// token, renew once and retry once; whatever the retry returns is the
    /// result.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> Result<T, SessionError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let access = self
            .tokens
            .read()
            .await
            .as_ref()
            .map(|pair| pair.access.clone())
            .ok_or(SessionError::Unauthenticated)?;

        match op(access.clone()).await {
            Err(SessionError::Unauthenticated) => {
                let renewed = self.renew(&access).await?;
                op(renewed).await
            }
            other => other,
        }
    }

    /// Single-flight renewal. `stale` is the access token the caller saw
    /// rejected; if another request already replaced it, that token is
    /// reused instead of renewing again.
    async fn renew(&self, stale: &str) -> Result<String, SessionError> {
        let _flight = self.renewal.lock().await;

        let Some(pair) = self.tokens.read().await.clone() else {
            return Err(SessionError::SessionExpired);
        };
        if pair.access != stale {
            return Ok(pair.access);
        }

        self.transition(SessionState::Refreshing);
        match self.backend.refresh(&pair.refresh).await {
            Ok(access) => {
                if let Some(current) = self.tokens.write().await.as_mut() {
                    current.access = access.clone();
                }
                self.transition(SessionState::Authenticated);
                tracing::debug!("access token renewed");
                Ok(access)
            }
            Err(e) => {
                tracing::warn!(error = %e, "token renewal failed, clearing session");
                self.clear().await;
                Err(SessionError::SessionExpired)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use adminkit_core::UserId;

    use super::*;

    /// Backend that accepts exactly one access token at a time.
    struct FakeAuth {
        valid_access: StdMutex<String>,
        refresh_works: bool,
        renewed_token_works: bool,
        refresh_calls: AtomicUsize,
        logout_calls: AtomicUsize,
    }

    impl FakeAuth {
        fn new() -> Self {
            Self {
                valid_access: StdMutex::new("a1".into()),
                refresh_works: true,
                renewed_token_works: true,
                refresh_calls: AtomicUsize::new(0),
                logout_calls: AtomicUsize::new(0),
            }
        }

        /// Server-side expiry of the current access token.
        fn expire(&self) {
            *self.valid_access.lock().unwrap() = "expired".into();
        }

        fn check(&self, access: &str) -> Result<(), SessionError> {
            if *self.valid_access.lock().unwrap() == access {
                Ok(())
            } else {
                Err(SessionError::Unauthenticated)
            }
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            id: UserId::new(1),
            username: "admin".into(),
            email: "admin@example.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
            employee_id: None,
            department: None,
            roles: vec![],
            is_active: true,
        }
    }

    #[async_trait]
    impl AuthBackend for FakeAuth {
        async fn login(&self, username: &str, password: &str) -> Result<TokenPair, SessionError> {
            if username == "admin" && password == "Test@1234" {
                Ok(TokenPair { access: self.valid_access.lock().unwrap().clone(), refresh: "r1".into() })
            } else {
                Err(SessionError::InvalidCredentials)
            }
        }

        async fn refresh(&self, refresh: &str) -> Result<String, SessionError> {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !self.refresh_works || refresh != "r1" {
                return Err(SessionError::Unauthenticated);
            }
            let fresh = format!("renewed-{n}");
            if self.renewed_token_works {
                *self.valid_access.lock().unwrap() = fresh.clone();
            }
            Ok(fresh)
        }

        async fn logout(&self, _access: &str, _refresh: &str) -> Result<(), SessionError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn profile(&self, access: &str) -> Result<UserProfile, SessionError> {
            self.check(access)?;
            Ok(profile())
        }

        async fn menu(&self, access: &str) -> Result<Vec<MenuItem>, SessionError> {
            self.check(access)?;
            Ok(vec![])
        }
    }

    async fn signed_in(backend: FakeAuth) -> (Arc<FakeAuth>, SessionContext<FakeAuth>) {
        let backend = Arc::new(backend);
        let session = SessionContext::new(Arc::clone(&backend));
        session.login("admin", "Test@1234").await.unwrap();
        (backend, session)
    }

    #[tokio::test]
    async fn login_resolves_principal() {
        let (_, session) = signed_in(FakeAuth::new()).await;
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.principal().await.unwrap().profile.username, "admin");
    }

    #[tokio::test]
    async fn bad_password_leaves_session_unauthenticated() {
        let session = SessionContext::new(Arc::new(FakeAuth::new()));
        let err = session.login("admin", "nope").await.unwrap_err();
        assert_eq!(err, SessionError::InvalidCredentials);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(session.tokens().await.is_none());
    }

    #[tokio::test]
    async fn expired_request_is_renewed_and_retried_once() {
        let (backend, session) = signed_in(FakeAuth::new()).await;
        backend.expire();

        let attempts = AtomicUsize::new(0);
        let result = session
            .authorized(|token| {
                attempts.fetch_add(1, Ordering::SeqCst);
                let backend = Arc::clone(&backend);
                async move { backend.profile(&token).await }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.tokens().await.unwrap().access, "renewed-1");
    }

    #[tokio::test]
    async fn failed_renewal_clears_both_credentials() {
        let mut backend = FakeAuth::new();
        backend.refresh_works = false;
        let (backend, session) = signed_in(backend).await;
        let mut states = session.subscribe();
        backend.expire();

        let err = session.resolve_principal().await.unwrap_err();
        assert_eq!(err, SessionError::SessionExpired);
        assert!(session.tokens().await.is_none());
        assert!(session.principal().await.is_none());
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn persistently_rejected_token_does_not_loop() {
        let mut backend = FakeAuth::new();
        backend.renewed_token_works = false;
        let (backend, session) = signed_in(backend).await;
        backend.expire();

        let err = session.refresh_menu().await.unwrap_err();
        assert_eq!(err, SessionError::Unauthenticated);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_expiries_share_one_renewal() {
        let (backend, session) = signed_in(FakeAuth::new()).await;
        backend.expire();

        let (a, b, c) = tokio::join!(session.refresh_menu(), session.refresh_menu(), session.resolve_principal());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn logout_revokes_and_clears() {
        let (backend, session) = signed_in(FakeAuth::new()).await;
        session.logout().await;
        assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.refresh_menu().await.unwrap_err(), SessionError::Unauthenticated);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn restore_from_persisted_tokens() {
        let backend = Arc::new(FakeAuth::new());
        let session = SessionContext::new(Arc::clone(&backend));
        let principal = session
            .restore(TokenPair { access: "a1".into(), refresh: "r1".into() })
            .await
            .unwrap();
        assert_eq!(principal.profile.id, UserId::new(1));
        assert_eq!(session.state(), SessionState::Authenticated);

        let stale = SessionContext::new(Arc::new({
            let mut b = FakeAuth::new();
            b.refresh_works = false;
            b
        }));
        let err = stale
            .restore(TokenPair { access: "old".into(), refresh: "r1".into() })
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::SessionExpired);
        assert_eq!(stale.state(), SessionState::Unauthenticated);
    }
}
