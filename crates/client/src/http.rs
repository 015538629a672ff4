//! reqwest-backed [`AuthBackend`] and [`GrantBackend`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use adminkit_auth::{
    AuthBackend, GrantBackend, GrantEntry, MenuItem, ModuleGrants, SessionContext, SessionError, TokenPair,
    UserProfile,
};
use adminkit_core::RoleId;

use crate::config::ClientConfig;

#[derive(Debug, Deserialize)]
struct AccessResponse {
    access: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Stateless HTTP transport. Tokens are passed per call; the
/// [`SessionContext`] owns them.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SessionError::Transport {
                message: e.to_string(),
                retryable: false,
            })?;
        Ok(Self { client, config })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SessionError> {
        request.send().await.map_err(transport_error)
    }

    /// Decode a success body, or map the status onto a [`SessionError`].
    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, SessionError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()));
        }
        Err(self.failure(status, response).await)
    }

    async fn expect_success(&self, response: Response) -> Result<(), SessionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(self.failure(status, response).await)
    }

    async fn failure(&self, status: StatusCode, response: Response) -> SessionError {
        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        let err = status_error(status, body.message);
        tracing::debug!(status = status.as_u16(), error = %err, "request failed");
        err
    }

    pub async fn role_grants(&self, access: &str, role: RoleId) -> Result<Vec<ModuleGrants>, SessionError> {
        let url = self.config.url(&format!("/api/roles/{role}/permissions/"));
        let response = self.send(self.client.get(url).bearer_auth(access)).await?;
        self.decode(response).await
    }

    pub async fn replace_role_grants(
        &self,
        access: &str,
        role: RoleId,
        entries: &[GrantEntry],
    ) -> Result<(), SessionError> {
        let url = self.config.url(&format!("/api/roles/{role}/permissions/"));
        let response = self
            .send(
                self.client
                    .post(url)
                    .bearer_auth(access)
                    .json(&json!({ "permissions": entries })),
            )
            .await?;
        self.expect_success(response).await
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, SessionError> {
        let url = self.config.url("/api/users/login/");
        let response = self
            .send(self.client.post(url).json(&json!({ "username": username, "password": password })))
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SessionError::InvalidCredentials);
        }
        self.decode(response).await
    }

    async fn refresh(&self, refresh: &str) -> Result<String, SessionError> {
        let url = self.config.url("/api/users/token/refresh/");
        let response = self
            .send(self.client.post(url).json(&json!({ "refresh": refresh })))
            .await?;
        let body: AccessResponse = self.decode(response).await?;
        Ok(body.access)
    }

    async fn logout(&self, access: &str, refresh: &str) -> Result<(), SessionError> {
        let url = self.config.url("/api/users/logout/");
        let response = self
            .send(self.client.post(url).bearer_auth(access).json(&json!({ "refresh": refresh })))
            .await?;
        self.expect_success(response).await
    }

    async fn profile(&self, access: &str) -> Result<UserProfile, SessionError> {
        let url = self.config.url("/api/users/profile/");
        let response = self.send(self.client.get(url).bearer_auth(access)).await?;
        self.decode(response).await
    }

    async fn menu(&self, access: &str) -> Result<Vec<MenuItem>, SessionError> {
        let url = self.config.url("/api/modules/my-menu/");
        let response = self.send(self.client.get(url).bearer_auth(access)).await?;
        self.decode(response).await
    }
}

/// Grant backend for the permission editor that goes through a session,
/// so an expired access token is renewed and the call retried once.
pub struct SessionGrantBackend {
    session: Arc<SessionContext<HttpBackend>>,
}

impl SessionGrantBackend {
    pub fn new(session: Arc<SessionContext<HttpBackend>>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl GrantBackend for SessionGrantBackend {
    async fn fetch_role_grants(&self, role: RoleId) -> Result<Vec<ModuleGrants>, SessionError> {
        let backend = self.session.backend();
        self.session
            .authorized(|access| async move { backend.role_grants(&access, role).await })
            .await
    }

    async fn replace_role_grants(&self, role: RoleId, entries: Vec<GrantEntry>) -> Result<(), SessionError> {
        let backend = self.session.backend();
        let entries = &entries;
        self.session
            .authorized(|access| async move { backend.replace_role_grants(&access, role, entries).await })
            .await
    }
}

fn transport_error(err: reqwest::Error) -> SessionError {
    SessionError::Transport {
        retryable: err.is_timeout() || err.is_connect(),
        message: err.to_string(),
    }
}

fn status_error(status: StatusCode, message: String) -> SessionError {
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        message
    };
    match status {
        StatusCode::UNAUTHORIZED => SessionError::Unauthenticated,
        StatusCode::FORBIDDEN => SessionError::Forbidden(message),
        StatusCode::NOT_FOUND => SessionError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            SessionError::Validation(message)
        }
        s if s.is_server_error() => SessionError::Transport {
            message,
            retryable: true,
        },
        _ => SessionError::Protocol(format!("unexpected status {status}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_session_errors() {
        assert_eq!(status_error(StatusCode::UNAUTHORIZED, String::new()), SessionError::Unauthenticated);
        assert_eq!(
            status_error(StatusCode::FORBIDDEN, "no".into()),
            SessionError::Forbidden("no".into())
        );
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, String::new()),
            SessionError::NotFound("Not Found".into())
        );
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "taken".into()),
            SessionError::Validation(m) if m == "taken"
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, String::new()).is_retryable());
        assert!(matches!(
            status_error(StatusCode::IM_A_TEAPOT, String::new()),
            SessionError::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_retryable_transport_error() {
        let backend = HttpBackend::new(
            ClientConfig::new("http://127.0.0.1:1").with_timeout(std::time::Duration::from_millis(500)),
        )
        .unwrap();
        let err = backend.login("anyone", "pw").await.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }
}
