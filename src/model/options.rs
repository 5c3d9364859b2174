//! Translation options: weighted source-span to target-phrase candidates.

use std::collections::HashMap;

use crate::input::{InputSentence, WordsRange};
use crate::search::CoverageBitmap;

use super::{ModelError, OptionStore, Score};

/// Index of a translation option in the per-sentence `OptionGrid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionId(pub u32);

/// Per-feature score breakdown of an option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScores {
    pub translation: Score,
    pub word_penalty: Score,
}

/// One candidate translation of a contiguous source span. Immutable after
/// construction.
#[derive(Debug, Clone)]
pub struct TranslationOption {
    pub range: WordsRange,
    pub target: Vec<String>,
    pub features: FeatureScores,
    /// Precomputed weighted total of the feature scores.
    pub score: Score,
}

impl TranslationOption {
    pub fn new(range: WordsRange, target: Vec<String>, translation: Score) -> Self {
        Self {
            range,
            target,
            features: FeatureScores {
                translation,
                word_penalty: 0.0,
            },
            score: translation,
        }
    }

    fn with_word_penalty(mut self, weight: Score) -> Self {
        self.features.word_penalty = -weight * self.target.len() as Score;
        self.score = self.features.translation + self.features.word_penalty;
        self
    }
}

/// All options for one sentence, addressable by id and by source span.
///
/// Built once per decode from the store's output; the span index keeps
/// each option list sorted by score descending so cube pruning can take
/// its column axis directly.
#[derive(Debug)]
pub struct OptionGrid {
    options: Vec<TranslationOption>,
    by_span: HashMap<(usize, usize), Vec<OptionId>>,
}

impl OptionGrid {
    pub fn build(
        source_len: usize,
        options: Vec<TranslationOption>,
    ) -> Result<Self, ModelError> {
        let mut by_span: HashMap<(usize, usize), Vec<OptionId>> = HashMap::new();
        for (i, opt) in options.iter().enumerate() {
            if opt.range.end() >= source_len {
                return Err(ModelError::SpanOutOfBounds {
                    start: opt.range.start(),
                    end: opt.range.end(),
                    len: source_len,
                });
            }
            by_span
                .entry((opt.range.start(), opt.range.end()))
                .or_default()
                .push(OptionId(i as u32));
        }
        for ids in by_span.values_mut() {
            ids.sort_by(|a, b| {
                options[b.0 as usize]
                    .score
                    .total_cmp(&options[a.0 as usize].score)
                    .then(a.cmp(b))
            });
        }
        Ok(Self { options, by_span })
    }

    pub fn get(&self, id: OptionId) -> &TranslationOption {
        &self.options[id.0 as usize]
    }

    /// Options covering exactly `range`, best first.
    pub fn options_for(&self, range: WordsRange) -> &[OptionId] {
        self.by_span
            .get(&(range.start(), range.end()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// In-memory phrase table with the classic span-DP future-cost estimate.
///
/// Source positions no table entry covers get a pass-through option that
/// copies the source token at a configurable penalty, so every sentence
/// stays decodable (the same guarantee an unknown-word fallback gives a
/// conversion lattice).
pub struct MemoryOptionStore {
    table: HashMap<Vec<String>, Vec<(Vec<String>, Score)>>,
    word_penalty_weight: Score,
    unknown_score: Score,
    /// future[i][j] = best option-score estimate for span [i, j].
    future: Vec<Vec<Score>>,
    source_len: usize,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            word_penalty_weight: 0.0,
            unknown_score: -100.0,
            future: Vec::new(),
            source_len: 0,
        }
    }

    /// Add a phrase pair; `source` and `target` are whitespace-separated.
    pub fn insert(&mut self, source: &str, target: &str, score: Score) {
        let src: Vec<String> = source.split_whitespace().map(str::to_string).collect();
        let tgt: Vec<String> = target.split_whitespace().map(str::to_string).collect();
        self.table.entry(src).or_default().push((tgt, score));
    }

    pub fn with_word_penalty(mut self, weight: Score) -> Self {
        self.word_penalty_weight = weight;
        self
    }

    pub fn with_unknown_score(mut self, score: Score) -> Self {
        self.unknown_score = score;
        self
    }

    fn compute_future_table(&mut self, options: &[TranslationOption]) {
        let n = self.source_len;
        let mut future = vec![vec![Score::NEG_INFINITY; n]; n];
        for opt in options {
            let (s, e) = (opt.range.start(), opt.range.end());
            if opt.score > future[s][e] {
                future[s][e] = opt.score;
            }
        }
        // widen spans: best of covering option vs best split
        for span_len in 2..=n {
            for start in 0..=(n - span_len) {
                let end = start + span_len - 1;
                for mid in start..end {
                    let split = future[start][mid] + future[mid + 1][end];
                    if split > future[start][end] {
                        future[start][end] = split;
                    }
                }
            }
        }
        self.future = future;
    }
}

impl Default for MemoryOptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionStore for MemoryOptionStore {
    fn create_for(
        &mut self,
        sentence: &dyn InputSentence,
    ) -> Result<Vec<TranslationOption>, ModelError> {
        let n = sentence.len();
        self.source_len = n;

        let mut options = Vec::new();
        let mut covered_single = vec![false; n];
        for start in 0..n {
            let mut src: Vec<String> = Vec::new();
            for end in start..n {
                src.push(sentence.token(end).to_string());
                let Some(candidates) = self.table.get(&src) else {
                    continue;
                };
                for (target, score) in candidates {
                    options.push(
                        TranslationOption::new(
                            WordsRange::new(start, end),
                            target.clone(),
                            *score,
                        )
                        .with_word_penalty(self.word_penalty_weight),
                    );
                }
                if start == end && !candidates.is_empty() {
                    covered_single[start] = true;
                }
            }
        }

        // pass-through fallback for positions nothing covers
        for (pos, covered) in covered_single.iter().enumerate() {
            if !covered {
                options.push(
                    TranslationOption::new(
                        WordsRange::new(pos, pos),
                        vec![sentence.token(pos).to_string()],
                        self.unknown_score,
                    )
                    .with_word_penalty(self.word_penalty_weight),
                );
            }
        }

        self.compute_future_table(&options);
        Ok(options)
    }

    fn future_score(&self, coverage: &CoverageBitmap) -> Score {
        let mut total: Score = 0.0;
        let mut gap_start: Option<usize> = None;
        for pos in 0..self.source_len {
            if coverage.is_set(pos) {
                if let Some(start) = gap_start.take() {
                    total += self.future[start][pos - 1];
                }
            } else if gap_start.is_none() {
                gap_start = Some(pos);
            }
        }
        if let Some(start) = gap_start {
            total += self.future[start][self.source_len - 1];
        }
        total
    }
}
