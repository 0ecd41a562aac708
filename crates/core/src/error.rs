//! Shared error taxonomy for console operations.
//!
//! Every boundary that talks to the backend reports failures through
//! [`ServiceError`], so screens can react uniformly: a transient notice for
//! network trouble, field messages for structured rejections, a redirect for
//! a missing sign-in. Errors are handled where they occur and never crash a
//! view; nothing here is fatal to the process.

use serde::{Deserialize, Serialize};

/// A field-level validation failure reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Path of the offending field, as the server names it.
    pub field: String,
    /// Human-readable message for that field.
    pub message: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The request never produced a usable response (connect failure,
    /// timeout, transport error).
    #[error("network error: {0}")]
    Network(String),

    /// The response arrived but could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A fetch-by-id found nothing; callers redirect to the list view.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The server rejected the request, possibly with structured
    /// field-level violations to map back onto a form.
    #[error("request rejected by server (status {status})")]
    Rejected {
        status: u16,
        violations: Vec<FieldViolation>,
    },

    /// No valid identity is present; the caller must send the user to the
    /// login view before issuing any protected request.
    #[error("not signed in")]
    Unauthenticated,

    /// Durable session storage failed to read or write.
    #[error("session storage failure: {0}")]
    Storage(String),
}

impl ServiceError {
    /// Violations carried by a structured server rejection, if any.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            ServiceError::Rejected { violations, .. } => violations,
            _ => &[],
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
