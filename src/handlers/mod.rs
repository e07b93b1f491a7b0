//! Concrete handlers, one per path namespace.
//!
//! Registration order is fixed in `main` and is the dispatch order.

use serde_json::Value;

pub mod genres;
pub mod media;
pub mod ratings;
pub mod session;
pub mod status;
pub mod users;

pub use genres::GenreHandler;
pub use media::MediaHandler;
pub use ratings::RatingHandler;
pub use session::SessionHandler;
pub use status::StatusHandler;
pub use users::UserHandler;

/// String field from a JSON body, empty when absent (missing fields are
/// caught by domain validation, not by extraction).
pub(crate) fn str_field(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Integer field from a JSON body with a default for absent values.
pub(crate) fn int_field(body: &Value, key: &str, default: i64) -> i64 {
    body.get(key).and_then(Value::as_i64).unwrap_or(default)
}

/// Non-empty path segments.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
