//! HTTP adapters for the hosted identity and profile backend.
//!
//! The backend exposes a token endpoint for password sign-in and a REST view
//! over the `profiles` table. Both adapters share one [`HttpBackend`], which
//! holds the session issued by the last successful sign-in.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use kaos_auth::{
    DirectoryError, IdentityError, IdentityProvider, Profile, ProfileDirectory, RemoteSession,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// e.g. `https://project.example.co`, without a trailing slash.
    pub base_url: String,
    /// Public (anon) API key sent with every request.
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    email: String,
}

/// Shared HTTP client plus the currently held remote session.
#[derive(Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
    session: Mutex<Option<RemoteSession>>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Arc<Self> {
        let config = BackendConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        };
        Arc::new(Self {
            client: reqwest::Client::new(),
            config,
            session: Mutex::new(None),
        })
    }

    /// Re-attach a session restored from local storage.
    pub fn resume(&self, session: RemoteSession) {
        *self.session.lock().unwrap_or_else(|p| p.into_inner()) = Some(session);
    }

    fn current(&self) -> Option<RemoteSession> {
        self.session.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn replace(&self, session: Option<RemoteSession>) {
        *self.session.lock().unwrap_or_else(|p| p.into_inner()) = session;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Bearer token for table access: the user's token when signed in,
    /// otherwise the API key.
    fn bearer(&self) -> String {
        self.current()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.config.api_key.clone())
    }

    pub fn identity(self: &Arc<Self>) -> HttpIdentityProvider {
        HttpIdentityProvider {
            backend: self.clone(),
        }
    }

    pub fn profiles(self: &Arc<Self>) -> HttpProfileDirectory {
        HttpProfileDirectory {
            backend: self.clone(),
        }
    }
}

/// [`IdentityProvider`] over the backend's token endpoints.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    backend: Arc<HttpBackend>,
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RemoteSession, IdentityError> {
        let backend = &self.backend;
        let resp = backend
            .client
            .post(backend.url("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &backend.config.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(IdentityError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(IdentityError::Unexpected {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = resp.json().await.map_err(|e| IdentityError::Unexpected {
            status: status.as_u16(),
            message: format!("malformed token response: {e}"),
        })?;

        let session = RemoteSession {
            email: token.user.email,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        };
        backend.replace(Some(session.clone()));
        Ok(session)
    }

    async fn get_session(&self) -> Result<Option<RemoteSession>, IdentityError> {
        let session = self.backend.current();
        Ok(session.filter(|s| s.expires_at.is_none_or(|at| at > Utc::now())))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(session) = self.backend.current() else {
            return Ok(());
        };
        // Forget locally first; the remote call is best effort.
        self.backend.replace(None);

        let backend = &self.backend;
        let resp = backend
            .client
            .post(backend.url("/auth/v1/logout"))
            .header("apikey", &backend.config.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if !resp.status().is_success() && resp.status() != StatusCode::UNAUTHORIZED {
            return Err(IdentityError::Unexpected {
                status: resp.status().as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// [`ProfileDirectory`] over the backend's REST view of `profiles`.
#[derive(Debug, Clone)]
pub struct HttpProfileDirectory {
    backend: Arc<HttpBackend>,
}

#[async_trait]
impl ProfileDirectory for HttpProfileDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, DirectoryError> {
        let backend = &self.backend;
        let filter = format!("eq.{email}");
        let resp = backend
            .client
            .get(backend.url("/rest/v1/profiles"))
            .query(&[("select", "*"), ("email", filter.as_str())])
            .header("apikey", &backend.config.api_key)
            .bearer_auth(backend.bearer())
            .send()
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DirectoryError::Network(format!(
                "profiles query failed with status {}",
                resp.status()
            )));
        }

        let rows: Vec<Profile> = resp
            .json()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}
