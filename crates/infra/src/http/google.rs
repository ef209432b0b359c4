//! Google OAuth endpoints
//!
//! Token exchange and refresh are only reached through the development
//! fallback; revoke and userinfo are used on every sign-in and sign-out.

use async_trait::async_trait;
use chatlab_core::{AuthError, ClientCredentials, OAuthProvider};
use chatlab_domain::{ChatLabError, EndpointsConfig, TokenGrant, UserProfile};
use reqwest::Method;
use tracing::instrument;

use super::{expect_success, normalize_base_url, read_json, HttpClient};

/// [`OAuthProvider`] backed by Google's public endpoints
#[derive(Debug, Clone)]
pub struct GoogleOAuthProvider {
    client: HttpClient,
    token_url: String,
    revoke_url: String,
    userinfo_url: String,
}

impl GoogleOAuthProvider {
    /// # Errors
    /// `ChatLabError::Config` when a configured endpoint is not a valid URL.
    pub fn new(client: HttpClient, endpoints: &EndpointsConfig) -> Result<Self, ChatLabError> {
        Ok(Self {
            client,
            token_url: normalize_base_url(&endpoints.google_token_url)?,
            revoke_url: normalize_base_url(&endpoints.google_revoke_url)?,
            userinfo_url: normalize_base_url(&endpoints.google_userinfo_url)?,
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, AuthError> {
        let request = self.client.request(Method::POST, &self.token_url).form(form);
        read_json(self.client.send(request).await?).await
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthProvider {
    #[instrument(skip_all, name = "google.exchange_code")]
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client: &ClientCredentials,
    ) -> Result<TokenGrant, AuthError> {
        self.token_request(&[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    #[instrument(skip_all, name = "google.refresh")]
    async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientCredentials,
    ) -> Result<TokenGrant, AuthError> {
        self.token_request(&[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    #[instrument(skip_all, name = "google.revoke")]
    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let request = self.client.request(Method::POST, &self.revoke_url).form(&[("token", token)]);
        expect_success(self.client.send(request).await?).await
    }

    #[instrument(skip_all, name = "google.user_info")]
    async fn user_info(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let request =
            self.client.request(Method::GET, &self.userinfo_url).bearer_auth(access_token);
        read_json(self.client.send(request).await?).await
    }
}
