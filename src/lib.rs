//! Phrase-based statistical machine translation decoding core.
//!
//! Given a source sentence and a set of precomputed translation options,
//! searches for the highest-scoring target sentence under a log-linear
//! model. The search is a stack-by-stack beam search over partial
//! translations with hypothesis recombination, cube pruning to bound the
//! branching factor, and lazy n-best extraction over the resulting
//! hypothesis graph.

pub mod input;
pub mod model;
pub mod search;
pub mod settings;
