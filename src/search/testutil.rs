#![cfg(test)]

use crate::input::{InputSentence, Sentence, WordsRange};
use crate::model::{MemoryOptionStore, ModelError, OptionStore, Score, TranslationOption};
use crate::settings::DecoderConfig;

use super::bitmap::CoverageBitmap;
use super::hypothesis::{HypoArena, HypoId, Hypothesis};

/// Shared fixtures for search tests.

pub fn sentence(line: &str) -> Sentence {
    Sentence::from_line(line)
}

pub fn store(entries: &[(&str, &str, Score)]) -> MemoryOptionStore {
    let mut store = MemoryOptionStore::new();
    for &(source, target, score) in entries {
        store.insert(source, target, score);
    }
    store
}

/// Configuration wide enough that the search is exhaustive on tiny
/// inputs: no beam, no stack cap, oversized cube.
pub fn exhaustive_config() -> DecoderConfig {
    DecoderConfig {
        stack_size: usize::MAX,
        beam_threshold: Score::NEG_INFINITY,
        max_distortion: -1,
        max_phrase_len: 7,
        nbest_enabled: true,
        nbest_factor: 100,
        cube_top_k: 64,
        cube_slack: 10_000,
        distortion_weight: 1.0,
    }
}

/// Allocate a bare hypothesis for driving stacks and cube pruning
/// directly, without going through the decoding loop.
pub fn hypo(
    arena: &mut HypoArena,
    score: Score,
    len: usize,
    covered: &[(usize, usize)],
    context: &[&str],
    range: Option<(usize, usize)>,
) -> HypoId {
    let mut coverage = CoverageBitmap::new(len);
    for &(start, end) in covered {
        coverage.cover(WordsRange::new(start, end));
    }
    arena.alloc(Hypothesis {
        id: HypoId(0),
        parent: None,
        option: None,
        coverage,
        context: context.iter().map(|s| s.to_string()).collect(),
        range: range.map(|(start, end)| WordsRange::new(start, end)),
        score,
        arcs: Vec::new(),
        grid: None,
    })
}

/// Store with no options and a zero future estimate, for tests that
/// never consult it.
pub struct ZeroStore;

impl OptionStore for ZeroStore {
    fn create_for(
        &mut self,
        _sentence: &dyn InputSentence,
    ) -> Result<Vec<TranslationOption>, ModelError> {
        Ok(Vec::new())
    }

    fn future_score(&self, _coverage: &CoverageBitmap) -> Score {
        0.0
    }
}
