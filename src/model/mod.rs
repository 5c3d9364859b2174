//! Model-side collaborators of the search core.
//!
//! The decoder consumes translation options and language-model scores
//! through the `OptionStore` and `LanguageModel` traits. The in-memory
//! implementations here (`MemoryOptionStore`, `NullLm`, `BigramLm`) make
//! the crate usable and testable without external model files; production
//! embeddings provide their own.

pub mod lm;
pub mod options;

pub use lm::{BigramLm, LanguageModel, NullLm};
pub use options::{MemoryOptionStore, OptionGrid, OptionId, TranslationOption};

use crate::input::InputSentence;
use crate::search::CoverageBitmap;

/// Log-domain model score; higher is better.
pub type Score = f32;

/// Unrecoverable model lookup failure. Fails the sentence; the caller may
/// continue with the next one.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("translation option spans [{start}..{end}] outside source length {len}")]
    SpanOutOfBounds {
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("phrase table lookup failed: {0}")]
    Lookup(String),

    #[error("language model failure: {0}")]
    LanguageModel(String),
}

/// Supplies translation options and future-cost estimates for one sentence.
///
/// `create_for` is called exactly once per decode, before the search
/// starts; `future_score` is read-only for the rest of the sentence and
/// must return an estimate of the best achievable score over the uncovered
/// positions of `coverage` (zero when the coverage is full).
pub trait OptionStore: Send + Sync {
    fn create_for(
        &mut self,
        sentence: &dyn InputSentence,
    ) -> Result<Vec<TranslationOption>, ModelError>;

    fn future_score(&self, coverage: &CoverageBitmap) -> Score;
}
