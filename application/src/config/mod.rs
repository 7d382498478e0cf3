//! Application-level configuration.
//!
//! - [`VotingConfigStore`]: the active voting configuration with atomic swap

pub mod store;

pub use store::{ConfigRejected, VotingConfigStore};
