//! Chat Lab backend proxy client
//!
//! The proxy holds the OAuth client secret, so code exchange and refresh go
//! through it. Calls carry the identity token as a bearer credential; the
//! Google refresh token itself may live in the proxy's cookie companion.

use async_trait::async_trait;
use chatlab_core::{AuthError, OAuthBackend};
use chatlab_domain::{ChatLabError, Environment, TokenGrant};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument};

use super::{error_from_response, expect_success, normalize_base_url, read_json, HttpClient};

/// [`OAuthBackend`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpOAuthBackend {
    client: HttpClient,
    base_url: String,
    environment: Environment,
}

#[derive(Serialize)]
struct ExchangeBody<'a> {
    code: &'a str,
    redirect_uri: &'a str,
    environment: &'static str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    environment: &'static str,
}

#[derive(Serialize)]
struct LogoutBody {
    environment: &'static str,
}

impl HttpOAuthBackend {
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
        format!("{}/oauth/{path}", self.base_url)
    }
}

#[async_trait]
impl OAuthBackend for HttpOAuthBackend {
    #[instrument(skip_all, name = "oauth_proxy.exchange_code")]
    async fn exchange_code(
        &self,
        identity_token: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, AuthError> {
        let body = ExchangeBody { code, redirect_uri, environment: self.environment.as_str() };
        let request = self
            .client
            .request(Method::POST, self.endpoint("exchange-code"))
            .bearer_auth(identity_token)
            .json(&body);
        read_json(self.client.send(request).await?).await
    }

    #[instrument(
        skip_all,
        name = "oauth_proxy.refresh_token",
        fields(cookie = refresh_token.is_none())
    )]
    async fn refresh_token(
        &self,
        identity_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<TokenGrant, AuthError> {
        let body = RefreshBody { refresh_token, environment: self.environment.as_str() };
        let request = self
            .client
            .request(Method::POST, self.endpoint("refresh-token"))
            .bearer_auth(identity_token)
            .json(&body);
        let response = self.client.send(request).await?;

        // Without a stored or cookie-held refresh token there is no session
        if refresh_token.is_none()
            && matches!(response.status(), StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
        {
            let err = error_from_response(response).await;
            debug!(error = %err, "no refresh token cookie companion");
            return Err(match err {
                AuthError::Backend { message, .. } => AuthError::AuthenticationRequired(message),
                other => other,
            });
        }

        read_json(response).await
    }

    #[instrument(skip_all, name = "oauth_proxy.logout")]
    async fn logout(&self, identity_token: &str) -> Result<(), AuthError> {
        let request = self
            .client
            .request(Method::POST, self.endpoint("logout"))
            .bearer_auth(identity_token)
            .json(&LogoutBody { environment: self.environment.as_str() });
        expect_success(self.client.send(request).await?).await
    }
}
