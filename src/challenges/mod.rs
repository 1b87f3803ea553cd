//! Challenge Generator (C7). See `spec.md` §4.7.

pub mod generator;

pub use generator::{ChallengeGenerator, GenerationEvent};
