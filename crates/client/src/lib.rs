//! # HMC Client
//!
//! REST service wrappers for the hospital management backend.
//!
//! Contains:
//! - [`ApiClient`]: bearer-authenticated HTTP plumbing with tolerant list
//!   decoding, structured rejection mapping and a bounded retry for
//!   idempotent GETs
//! - one module per backend resource (patients, appointments, admissions,
//!   laboratory, pharmacy, procurement, consultation) exposing typed rows,
//!   create/update payloads and the `hmc-core` trait implementations the
//!   controllers plug into
//!
//! The backend's response envelopes are not contractually stable; every
//! decode path goes through `hmc_core::normalize` or the detail-unwrapping
//! in [`http`], so shape drift degrades to empty results rather than
//! errors.

pub mod admissions;
pub mod appointments;
pub mod config;
pub mod consultation;
pub mod http;
pub mod laboratory;
pub mod patients;
pub mod pharmacy;
pub mod procurement;

pub use config::{ClientConfig, ConfigError};
pub use http::ApiClient;
