//! Credential and authentication types
//!
//! One [`Credential`] shape serves both lifecycles: the vault identity token
//! and the Google OAuth token. Expiry is kept as absolute epoch milliseconds
//! so persisted credentials survive restarts without recomputation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a credential was obtained
///
/// Decides how it can be refreshed: a proxy-issued credential may rely on
/// the refresh-token cookie companion held by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOrigin {
    #[default]
    BackendProxy,
    DirectProvider,
    IdentityBackend,
}

/// Access/refresh token pair with absolute expiry and granted scopes
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Expiry as milliseconds since the UNIX epoch
    pub expires_at_ms: i64,

    #[serde(default)]
    pub granted_scopes: BTreeSet<String>,

    #[serde(default)]
    pub origin: CredentialOrigin,
}

impl Credential {
    /// Build a credential from a provider grant received at `now_ms`
    #[must_use]
    pub fn from_grant(grant: TokenGrant, now_ms: i64, origin: CredentialOrigin) -> Self {
        let granted_scopes = grant.scopes();
        Self {
            expires_at_ms: now_ms.saturating_add(grant.expires_in.saturating_mul(1000)),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            granted_scopes,
            origin,
        }
    }

    /// Apply a refresh grant on top of this credential
    ///
    /// Refresh responses usually omit the refresh token and sometimes the
    /// scope list; both are carried over from `self` in that case.
    #[must_use]
    pub fn refreshed(&self, grant: TokenGrant, now_ms: i64, origin: CredentialOrigin) -> Self {
        let mut next = Self::from_grant(grant, now_ms, origin);
        if next.refresh_token.is_none() {
            next.refresh_token.clone_from(&self.refresh_token);
        }
        if next.granted_scopes.is_empty() {
            next.granted_scopes.clone_from(&self.granted_scopes);
        }
        next
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Whether the credential expires within `margin_ms` of `now_ms`
    #[must_use]
    pub fn expires_within(&self, now_ms: i64, margin_ms: i64) -> bool {
        self.expires_at_ms.saturating_sub(now_ms) <= margin_ms
    }

    /// Milliseconds until expiry; negative once expired
    #[must_use]
    pub fn time_until_expiry_ms(&self, now_ms: i64) -> i64 {
        self.expires_at_ms.saturating_sub(now_ms)
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.granted_scopes.contains(scope)
    }

    /// Required scopes that were not granted
    #[must_use]
    pub fn missing_scopes<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        required
            .into_iter()
            .filter(|scope| !self.granted_scopes.contains(*scope))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at_ms", &self.expires_at_ms)
            .field("granted_scopes", &self.granted_scopes)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Token endpoint response
///
/// Shape shared by the Google token endpoint and the backend proxy
/// (`/oauth/exchange-code`, `/oauth/refresh-token`, `/auth/get-tokens`).
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenGrant {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    /// Granted scopes (space-separated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenGrant {
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in,
            scope: None,
            token_type: Some("Bearer".to_string()),
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Parse the space-separated scope string
    #[must_use]
    pub fn scopes(&self) -> BTreeSet<String> {
        self.scope
            .as_deref()
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Google account profile from the userinfo endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(alias = "sub")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Coordinator state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    #[default]
    Idle,
    Initializing,
    Checking,
    Authenticated,
    Unauthenticated,
}

crate::impl_domain_enum_conversions!(AuthPhase {
    Idle => "idle",
    Initializing => "initializing",
    Checking => "checking",
    Authenticated => "authenticated",
    Unauthenticated => "unauthenticated",
});

impl AuthPhase {
    /// Whether an initialize or check is running
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Initializing | Self::Checking)
    }
}

/// Derived authentication status exposed to the UI
///
/// Never persisted; recomputed from the credentials and in-flight flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub user: Option<UserProfile>,
    pub error: Option<String>,
}

impl AuthStatus {
    #[must_use]
    pub fn loading(previous: &Self) -> Self {
        Self { is_loading: true, ..previous.clone() }
    }
}

/// Anti-forgery state persisted while an authorize redirect is in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    /// Scopes requested by this redirect; validated by the matching callback
    pub scopes: Vec<String>,
    pub created_at_ms: i64,
}

/// Authorization redirect to hand to the user agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}
