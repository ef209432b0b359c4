//! Vault identity backend client
//!
//! The backend keeps the identity session in an HTTP-only cookie, so every
//! call relies on the client's cookie store. Each request is tagged with the
//! deployment environment so development, staging and production cookies
//! never collide.

use async_trait::async_trait;
use chatlab_core::{AuthError, IdentityBackend};
use chatlab_domain::{ChatLabError, Environment, TokenGrant};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{expect_success, normalize_base_url, read_json, HttpClient};

/// [`IdentityBackend`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpIdentityBackend {
    client: HttpClient,
    base_url: String,
    environment: Environment,
}

#[derive(Serialize)]
struct EnvironmentBody {
    environment: &'static str,
}

#[derive(Serialize)]
struct SetTokensBody<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    expires_in: i64,
    environment: &'static str,
}

/// `/auth/get-tokens` answers 200 with empty fields when there is no session
#[derive(Deserialize)]
struct StoredTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl HttpIdentityBackend {
    /// # Errors
    /// `ChatLabError::Config` when `base_url` is not a valid URL.
    pub fn new(
        client: HttpClient,
        base_url: &str,
        environment: Environment,
    ) -> Result<Self, ChatLabError> {
        Ok(Self { client, base_url: normalize_base_url(base_url)?, environment })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/{path}", self.base_url)
    }

    fn tag(&self) -> EnvironmentBody {
        EnvironmentBody { environment: self.environment.as_str() }
    }
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    #[instrument(skip(self), name = "identity_backend.get_tokens")]
    async fn get_tokens(&self) -> Result<Option<TokenGrant>, AuthError> {
        let request = self
            .client
            .request(Method::GET, self.endpoint("get-tokens"))
            .query(&[("environment", self.environment.as_str())]);
        let response = self.client.send(request).await?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND) {
            debug!(status = %response.status(), "no identity session cookie");
            return Ok(None);
        }

        let stored: StoredTokens = read_json(response).await?;
        let Some(access_token) = stored.access_token.filter(|token| !token.is_empty()) else {
            return Ok(None);
        };

        // A missing lifetime is treated as already expired
        let mut grant = TokenGrant::new(access_token, stored.expires_in.unwrap_or(0));
        grant.refresh_token = stored.refresh_token;
        Ok(Some(grant))
    }

    #[instrument(skip_all, name = "identity_backend.set_tokens")]
    async fn set_tokens(&self, grant: &TokenGrant) -> Result<(), AuthError> {
        let body = SetTokensBody {
            access_token: &grant.access_token,
            refresh_token: grant.refresh_token.as_deref(),
            expires_in: grant.expires_in,
            environment: self.environment.as_str(),
        };
        let request = self.client.request(Method::POST, self.endpoint("set-tokens")).json(&body);
        expect_success(self.client.send(request).await?).await
    }

    #[instrument(skip(self), name = "identity_backend.refresh")]
    async fn refresh_access_token(&self) -> Result<TokenGrant, AuthError> {
        let request = self
            .client
            .request(Method::POST, self.endpoint("refresh-access-token"))
            .json(&self.tag());
        read_json(self.client.send(request).await?).await
    }

    #[instrument(skip(self), name = "identity_backend.clear_tokens")]
    async fn clear_tokens(&self) -> Result<(), AuthError> {
        let request =
            self.client.request(Method::POST, self.endpoint("clear-tokens")).json(&self.tag());
        expect_success(self.client.send(request).await?).await
    }
}
