//! Self-hosted anti-bot check.
//!
//! A client fetches a small arithmetic question, and must send back the
//! answer together with the challenge id when creating a link.

mod cache;
mod generator;

pub use cache::ChallengeCache;
pub use generator::{ChallengeGenerator, OsEntropy};

#[cfg(test)]
pub use generator::{SeededEntropy, solve};
