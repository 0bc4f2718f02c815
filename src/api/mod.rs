//! Transport-agnostic read surface
//!
//! Handlers return an [`ApiResponse`] carrying an HTTP status and a JSON
//! body so any server or the bundled CLI can expose them.

pub mod history;

use serde_json::{json, Value};

pub use history::{HistoryApi, Params};

/// Status code and JSON body of a handled request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// `{ "error": message }` with the given status
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn unauthorized() -> Self {
        Self::error(401, "Authentication required")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
