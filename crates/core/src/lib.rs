//! # HMC Core
//!
//! Core orchestration logic for the hospital management console client.
//!
//! This crate contains the behaviors shared by every screen of the console,
//! independent of any HTTP transport or terminal front end:
//! - Tolerant decoding of inconsistently shaped list responses (`normalize`)
//! - Paginated list control with debounced search and stale-response
//!   discarding (`list`)
//! - A generic entity form controller with an explicit draft state machine
//!   (`form`)
//! - Dependency-gated sequential saving of related records (`workflow`)
//! - The session/role context and its capability table (`session`)
//!
//! **No transport concerns**: HTTP, request building, and endpoint paths
//! belong in `hmc-client`.

pub mod error;
pub mod form;
pub mod list;
pub mod normalize;
pub mod notify;
pub mod query;
pub mod session;
pub mod validate;
pub mod workflow;

pub use error::{FieldViolation, ServiceError, ServiceResult};
pub use normalize::normalize;
pub use notify::{Notice, NoticeLevel, Notifier};
pub use query::{ListPage, ListQuery, SortOrder};
pub use session::{Capability, Role, SessionContext, SessionIdentity};
