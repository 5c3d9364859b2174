//! Target-side language model interface.

use std::collections::HashMap;

use super::Score;

/// Scores target-phrase continuations given a bounded left context.
pub trait LanguageModel: Send + Sync {
    /// N-gram order; the decoder keeps `order() - 1` tokens of context on
    /// each hypothesis.
    fn order(&self) -> usize;

    /// Score contribution of appending `phrase` after `context`.
    fn score_delta(&self, context: &[String], phrase: &[String]) -> Score;
}

/// The last `order - 1` tokens of `context ++ phrase`.
pub fn advance_context(context: &[String], phrase: &[String], order: usize) -> Vec<String> {
    let keep = order.saturating_sub(1);
    if keep == 0 {
        return Vec::new();
    }
    let mut next: Vec<String> = context.to_vec();
    next.extend(phrase.iter().cloned());
    if next.len() > keep {
        next.drain(..next.len() - keep);
    }
    next
}

/// Order-1 model contributing nothing. With it, hypotheses carry no
/// target context and recombination collapses on coverage alone.
pub struct NullLm;

impl LanguageModel for NullLm {
    fn order(&self) -> usize {
        1
    }

    fn score_delta(&self, _context: &[String], _phrase: &[String]) -> Score {
        0.0
    }
}

/// Hash-backed bigram model with unigram and constant fallback.
pub struct BigramLm {
    bigrams: HashMap<(String, String), Score>,
    unigrams: HashMap<String, Score>,
    fallback: Score,
}

impl BigramLm {
    pub fn new(fallback: Score) -> Self {
        Self {
            bigrams: HashMap::new(),
            unigrams: HashMap::new(),
            fallback,
        }
    }

    pub fn set_unigram(&mut self, token: &str, score: Score) {
        self.unigrams.insert(token.to_string(), score);
    }

    pub fn set_bigram(&mut self, prev: &str, token: &str, score: Score) {
        self.bigrams
            .insert((prev.to_string(), token.to_string()), score);
    }

    fn token_score(&self, prev: Option<&str>, token: &str) -> Score {
        if let Some(prev) = prev {
            if let Some(&score) = self
                .bigrams
                .get(&(prev.to_string(), token.to_string()))
            {
                return score;
            }
        }
        self.unigrams.get(token).copied().unwrap_or(self.fallback)
    }
}

impl LanguageModel for BigramLm {
    fn order(&self) -> usize {
        2
    }

    fn score_delta(&self, context: &[String], phrase: &[String]) -> Score {
        let mut prev = context.last().map(String::as_str);
        let mut total = 0.0;
        for token in phrase {
            total += self.token_score(prev, token);
            prev = Some(token.as_str());
        }
        total
    }
}
