//! Port interfaces for the three remote auth parties
//!
//! These traits enable dependency injection and testing by abstracting the
//! identity backend, the OAuth backend proxy and the OAuth provider. HTTP
//! implementations live in `chatlab_infra::http`.

use std::fmt;

use async_trait::async_trait;
use chatlab_domain::{TokenGrant, UserProfile};

use super::error::AuthError;

/// Vault identity backend holding the session token in an HTTP-only cookie
///
/// Every call is cookie-scoped and environment-tagged by the implementation.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Read the tokens held by the cookie; `None` when no session exists
    async fn get_tokens(&self) -> Result<Option<TokenGrant>, AuthError>;

    /// Store tokens after a vault login
    async fn set_tokens(&self, grant: &TokenGrant) -> Result<(), AuthError>;

    /// Refresh the access token using the cookie-held refresh token
    ///
    /// # Errors
    /// A 401 must be reported as `AuthError::Backend { status: 401, .. }` or
    /// `AuthError::AuthenticationRequired`; both end the session.
    async fn refresh_access_token(&self) -> Result<TokenGrant, AuthError>;

    /// Erase the cookie
    async fn clear_tokens(&self) -> Result<(), AuthError>;
}

/// Chat Lab backend proxy that keeps the OAuth client secret server-side
///
/// Calls are authorised with the identity token as a bearer credential. The
/// proxy also keeps the Google refresh token in an HTTP-only cookie
/// companion.
#[async_trait]
pub trait OAuthBackend: Send + Sync {
    /// Exchange an authorization code
    async fn exchange_code(
        &self,
        identity_token: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, AuthError>;

    /// Refresh an access token
    ///
    /// With `refresh_token = None` the proxy uses its cookie companion.
    async fn refresh_token(
        &self,
        identity_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<TokenGrant, AuthError>;

    /// Drop the cookie companion
    async fn logout(&self, identity_token: &str) -> Result<(), AuthError>;
}

/// OAuth client id and secret for the direct-provider fallback
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// The OAuth provider itself (token, revoke and userinfo endpoints)
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Direct code exchange; only used by the development fallback
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client: &ClientCredentials,
    ) -> Result<TokenGrant, AuthError>;

    /// Direct refresh; only used by the development fallback
    ///
    /// # Errors
    /// `invalid_grant` must be reported as `AuthError::AuthenticationRequired`.
    async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientCredentials,
    ) -> Result<TokenGrant, AuthError>;

    /// Revoke an access or refresh token
    async fn revoke(&self, token: &str) -> Result<(), AuthError>;

    /// Fetch the profile of the account owning `access_token`
    async fn user_info(&self, access_token: &str) -> Result<UserProfile, AuthError>;
}

/// Source of a currently valid bearer token
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}
