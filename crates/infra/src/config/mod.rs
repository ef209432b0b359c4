//! Configuration loading
//!
//! Reads [`chatlab_domain::AppConfig`] from environment variables, a `.env`
//! file or a TOML/JSON config file.

pub mod loader;

pub use loader::{from_lookup, load, load_from_env, load_from_file, probe_config_paths};
