//! Core domain concepts shared across all subdomains.
//!
//! - [`model::ModelRef`]: which provider/model answers a prompt
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod model;
pub mod string;
