//! Member Registration - signup and lookup service.
//!
//! Applicants submit a display name and two external identifiers and are
//! assigned the next sequential member number. Anyone can later look up a
//! member number by the first identifier, across the current cohort and the
//! legacy archives.

pub mod api;
pub mod config;
pub mod error;
pub mod service;

pub use config::Config;
pub use error::RegistrationError;
pub use service::{MemberSummary, RegistrationService, SignupForm};
