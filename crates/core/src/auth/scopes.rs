//! Anti-forgery state and authorization URL construction

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chatlab_domain::OAuthConfig;
use rand::Rng;

/// Generate a random state parameter for CSRF protection
///
/// 32 random bytes, base64url-encoded without padding.
#[must_use]
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Constant-time-ish comparison of the expected and received state
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected.len() == actual.len()
        && expected.bytes().zip(actual.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// Build the provider authorize URL for `scopes`
///
/// Always asks for offline access with forced consent so a refresh token is
/// issued, and for incremental authorization so previously granted scopes
/// are kept.
#[must_use]
pub fn build_authorize_url(config: &OAuthConfig, state: &str, scopes: &[String]) -> String {
    let scope_string = scopes.join(" ");
    let params = [
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("response_type", "code"),
        ("scope", scope_string.as_str()),
        ("access_type", "offline"),
        ("prompt", "consent"),
        ("include_granted_scopes", "true"),
        ("state", state),
    ];

    let query_string = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", config.authorize_url, query_string)
}

/// Union of `base` and `extra`, keeping `base` order and skipping duplicates
#[must_use]
pub fn merge_scopes(base: &[String], extra: &[String]) -> Vec<String> {
    let mut merged = base.to_vec();
    for scope in extra {
        if !merged.contains(scope) {
            merged.push(scope.clone());
        }
    }
    merged
}
