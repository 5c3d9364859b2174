//! The decoding core: beam search over partial translations.
//!
//! `decode` seeds a stack of empty coverage, settles each stack in turn
//! (prune, clean arcs, expand coverage groups through cube pruning), and
//! returns a `DecoderState` holding the full hypothesis graph. The state
//! answers `best`, `nbest`, and diagnostics; it owns every hypothesis of
//! the sentence and releases them together on drop.

mod bitmap;
mod cube;
mod hypothesis;
mod manager;
mod nbest;
mod stack;
mod stats;

pub(crate) mod testutil;

#[cfg(test)]
mod tests;

use std::time::Instant;

use tracing::{debug, debug_span};

use crate::input::{InputSentence, WordsRange};
use crate::model::{LanguageModel, ModelError, OptionGrid, OptionStore, Score};
use crate::settings::{ConfigError, DecoderConfig};

pub use bitmap::CoverageBitmap;
pub use hypothesis::{HypoArena, HypoId, Hypothesis};
pub use stack::HypothesisStack;
pub use stats::SearchStats;

use manager::Manager;

/// Errors surfacing at the `decode` boundary. A deadline expiry is not an
/// error; it is reported through `DecoderState::deadline_exceeded`.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid decoder configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Target side of one search path.
#[derive(Debug, Clone)]
pub struct Translation {
    pub score: Score,
    /// Target tokens in output order.
    pub tokens: Vec<String>,
    /// Per-phrase breakdown in output order.
    pub segments: Vec<TargetSegment>,
}

#[derive(Debug, Clone)]
pub struct TargetSegment {
    /// Source span this phrase translated.
    pub range: WordsRange,
    pub phrase: Vec<String>,
}

/// Result of decoding one sentence: the settled stacks and the hypothesis
/// arena they index into.
pub struct DecoderState {
    pub(crate) arena: HypoArena,
    pub(crate) stacks: Vec<HypothesisStack>,
    pub(crate) grid: OptionGrid,
    pub(crate) stats: SearchStats,
    pub(crate) deadline_exceeded: bool,
    pub(crate) nbest_factor: usize,
}

impl DecoderState {
    /// Best hypothesis on the highest-index non-empty stack. For a
    /// completed search that is the best full translation; after a
    /// deadline expiry it is the best partial result.
    pub fn best(&self) -> Option<HypoId> {
        self.stacks
            .iter()
            .rev()
            .find(|stack| !stack.is_empty())
            .and_then(|stack| stack.best(&self.arena))
    }

    pub fn hypothesis(&self, id: HypoId) -> &Hypothesis {
        self.arena.get(id)
    }

    pub fn best_translation(&self) -> Option<Translation> {
        let best = self.best()?;
        let nodes = self.arena.chain_to_seed(best);
        Some(nbest::assemble(
            &self.arena,
            &self.grid,
            &nodes,
            self.arena[best].score,
        ))
    }

    /// Top `count` full translations, lazily enumerated from the final
    /// stack and the stored recombination arcs. With `distinct`, paths
    /// rendering an already-emitted surface string are suppressed.
    pub fn nbest(&self, count: usize, distinct: bool) -> Vec<Translation> {
        match self.stacks.last() {
            Some(final_stack) => nbest::extract_nbest(
                &self.arena,
                &self.grid,
                final_stack,
                count,
                distinct,
                self.nbest_factor,
            ),
            None => Vec::new(),
        }
    }

    /// Per-stack member counts, index = words covered.
    pub fn stack_sizes(&self) -> Vec<usize> {
        self.stacks.iter().map(HypothesisStack::len).collect()
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline_exceeded
    }
}

/// Decode one sentence.
///
/// `store.create_for` runs once up front to materialise the option grid;
/// the search then proceeds stack by stack. `deadline`, when given, is
/// checked between stacks and between cube-pruning invocations; on expiry
/// the partial state is returned with its flag set.
pub fn decode(
    sentence: &dyn InputSentence,
    store: &mut dyn OptionStore,
    lm: &dyn LanguageModel,
    config: &DecoderConfig,
    deadline: Option<Instant>,
) -> Result<DecoderState, DecodeError> {
    config.validate()?;
    let _span = debug_span!("decode", len = sentence.len()).entered();

    let options = store.create_for(sentence)?;
    let grid = OptionGrid::build(sentence.len(), options)?;
    debug!(options = grid.len(), "materialised translation options");

    let mut manager = Manager::new(sentence, &*store, lm, config, grid, deadline);
    manager.run();
    Ok(manager.into_state())
}
