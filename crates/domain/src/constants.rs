//! Application constants
//!
//! Centralized location for the timing parameters and persisted-state keys
//! shared by the token lifecycles, the auth coordinator and auto-sync.

// Token lifecycle timing
pub const OAUTH_SAFETY_MARGIN_SECS: u64 = 5 * 60;
pub const IDENTITY_SAFETY_MARGIN_SECS: u64 = 5 * 60;
pub const PROACTIVE_REFRESH_WINDOW_SECS: u64 = 10 * 60;
pub const PROACTIVE_REFRESH_RETRY_SECS: u64 = 60;
pub const TOKEN_VALIDATION_INTERVAL_SECS: u64 = 5 * 60;

// Identity token acquisition
pub const IDENTITY_TOKEN_TIMEOUT_MS: u64 = 10_000;
pub const IDENTITY_MAX_ATTEMPTS: u32 = 3;
pub const IDENTITY_RETRY_BACKOFF_MS: u64 = 300; // multiplied by the attempt number

// Auth coordinator
pub const AUTH_DEBOUNCE_MS: u64 = 2_000;
pub const AUTH_RESTORE_ATTEMPTS: u32 = 2;
pub const AUTH_RESTORE_RETRY_PAUSE_MS: u64 = 500;

// Auto-sync
pub const DEFAULT_AUTO_SYNC_DELAY_MINUTES: u32 = 5;
pub const LEGACY_AUTO_SYNC_DELAY_MINUTES: u32 = 1;
pub const DEFAULT_AUTO_SYNC_MAX_RETRIES: u32 = 3;
pub const DEFAULT_AUTO_SYNC_RETRY_DELAY_MINUTES: u32 = 10;
pub const AUTO_SYNC_REVERIFY_MS: u64 = 1_000;
pub const SYNC_SETTINGS_VERSION: u32 = 2;

// Persisted client-state keys
pub const KEY_OAUTH_CREDENTIAL: &str = "google_oauth_credential";
pub const KEY_USER_PROFILE: &str = "google_user_profile";
pub const KEY_OAUTH_PENDING_STATE: &str = "oauth_pending_state";
pub const KEY_LAST_FULL_SYNC: &str = "last_full_sync_at";
pub const KEY_SYNC_SETTINGS: &str = "sync_settings";

// Remote storage
pub const REMOTE_SNAPSHOT_NAME: &str = "chatlab-workspace.json";

// Google OAuth
pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const SCOPE_DRIVE_APPDATA: &str = "https://www.googleapis.com/auth/drive.appdata";
pub const SCOPE_USERINFO_EMAIL: &str = "https://www.googleapis.com/auth/userinfo.email";
pub const SCOPE_USERINFO_PROFILE: &str = "https://www.googleapis.com/auth/userinfo.profile";
pub const SCOPE_OPENID: &str = "openid";
