//! Use cases (application services)

pub mod cast_vote;
pub mod fallback;
pub mod run_debate;
pub mod run_voting;

#[cfg(test)]
pub(crate) mod test_support;
