//! Infrastructure error handling

mod conversions;

pub use conversions::{auth_error_from_http, InfraError};
