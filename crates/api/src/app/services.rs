use std::sync::Arc;

use chrono::{Duration, Utc};

use adminkit_auth::{Hs256JwtValidator, JwtValidator, MenuItem, TokenKind, TokenPair};
use adminkit_core::{DomainError, DomainResult, UserId};
use adminkit_infra::{ConsoleStore, InMemoryConsoleStore, seed_demo_data};

use crate::app::errors::{ApiError, ApiResult};
use crate::config::ApiConfig;

/// Shared state behind every handler: the console store and the token
/// issuer.
pub struct AppServices {
    store: Arc<dyn ConsoleStore>,
    tokens: Arc<Hs256JwtValidator>,
}

impl AppServices {
    pub fn new(store: Arc<dyn ConsoleStore>, tokens: Hs256JwtValidator) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
        }
    }

    /// In-memory store, seeded with the demo console when configured.
    pub fn from_config(config: &ApiConfig) -> DomainResult<Self> {
        let store = InMemoryConsoleStore::new();
        if config.seed_demo_data {
            seed_demo_data(&store, &config.seed_password)?;
        }
        let tokens = Hs256JwtValidator::new(config.jwt_secret.as_bytes()).with_ttls(
            Duration::minutes(config.access_ttl_minutes),
            Duration::minutes(config.refresh_ttl_minutes),
        );
        Ok(Self::new(Arc::new(store), tokens))
    }

    pub fn store(&self) -> &dyn ConsoleStore {
        self.store.as_ref()
    }

    pub fn validator(&self) -> Arc<dyn JwtValidator> {
        self.tokens.clone()
    }

    /// Check credentials and issue a token pair. Password verification is
    /// CPU-bound, so it runs on the blocking pool.
    pub async fn login(&self, username: String, password: String) -> ApiResult<TokenPair> {
        let store = self.store.clone();
        let tokens = self.tokens.clone();
        let pair = tokio::task::spawn_blocking(move || -> ApiResult<TokenPair> {
            let user = store.authenticate(&username, &password)?;
            let pair = tokens.issue_pair(user.id, Utc::now())?;
            tracing::info!(user_id = %user.id, "login succeeded");
            Ok(pair)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("login task failed: {e}")))??;
        Ok(pair)
    }

    /// Exchange a refresh token for a fresh access token. Revoked tokens
    /// and tokens of users that can no longer sign in are refused.
    pub fn refresh(&self, refresh: &str) -> ApiResult<String> {
        let now = Utc::now();
        let claims = self.tokens.validate(refresh, TokenKind::Refresh, now)?;
        if self.store.is_refresh_token_revoked(claims.jti)? {
            tracing::warn!(user_id = %claims.sub, "revoked refresh token presented");
            return Err(ApiError::Revoked);
        }
        let user = match self.store.get_user(claims.sub) {
            Ok(user) if user.is_active => user,
            Ok(_) | Err(DomainError::NotFound(_)) => return Err(ApiError::Revoked),
            Err(e) => return Err(e.into()),
        };
        let (access, _) = self.tokens.issue(user.id, TokenKind::Access, now)?;
        tracing::debug!(user_id = %user.id, "access token renewed");
        Ok(access)
    }

    /// Revoke `refresh`. It must belong to `caller`.
    pub fn logout(&self, caller: UserId, refresh: &str) -> ApiResult<()> {
        let claims = self.tokens.validate(refresh, TokenKind::Refresh, Utc::now())?;
        if claims.sub != caller {
            return Err(ApiError::BadRequest("refresh token belongs to another user".to_string()));
        }
        self.store.revoke_refresh_token(claims.jti, claims.expires_at)?;
        tracing::info!(user_id = %caller, "logged out");
        Ok(())
    }

    /// The caller's menu, recomputed from current grants.
    pub fn menu_for(&self, user: UserId) -> DomainResult<Vec<MenuItem>> {
        self.store.principal_menu(user)
    }
}
