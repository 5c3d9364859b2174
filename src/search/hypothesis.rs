//! Hypotheses and the per-sentence arena that owns them.

use crate::input::WordsRange;
use crate::model::{OptionId, Score};

use super::bitmap::CoverageBitmap;

/// Stable arena index of a hypothesis. Ids are assigned monotonically at
/// creation, so parent and arc links always point to smaller ids and the
/// graph is acyclic by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HypoId(pub u32);

/// A node in the search graph: a partial translation of the source.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    pub id: HypoId,
    /// Predecessor, `None` for the seed.
    pub parent: Option<HypoId>,
    /// Option applied to extend the parent, `None` for the seed.
    pub option: Option<OptionId>,
    /// Source positions translated so far.
    pub coverage: CoverageBitmap,
    /// Target-side tail the language model conditions on (at most
    /// order − 1 tokens).
    pub context: Vec<String>,
    /// Source span covered by `option`.
    pub range: Option<WordsRange>,
    /// Accumulated model score plus the future-cost estimate of the
    /// uncovered remainder.
    pub score: Score,
    /// Recombined equivalents kept for n-best extraction.
    pub arcs: Vec<HypoId>,
    /// Cube grid position, for diagnostics.
    pub grid: Option<(u16, u16)>,
}

impl Hypothesis {
    /// Two hypotheses with equal keys expand identically from here on:
    /// same uncovered positions, same LM context, same reordering origin.
    pub(crate) fn recomb_key(&self) -> RecombKey {
        RecombKey {
            coverage: self.coverage.clone(),
            context: self.context.clone(),
            right_edge: self.range.map(|r| r.end()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RecombKey {
    coverage: CoverageBitmap,
    context: Vec<String>,
    right_edge: Option<usize>,
}

/// Owns every hypothesis created for one sentence.
///
/// Stacks and paths hold `HypoId`s; a hypothesis that loses recombination
/// or is pruned simply drops out of all indices while its slot stays valid
/// for arc back-links. The whole arena is dropped with the decoder state.
pub struct HypoArena {
    hypos: Vec<Hypothesis>,
}

impl HypoArena {
    pub fn new() -> Self {
        Self { hypos: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.hypos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypos.is_empty()
    }

    pub(crate) fn alloc(&mut self, mut hypo: Hypothesis) -> HypoId {
        let id = HypoId(self.hypos.len() as u32);
        hypo.id = id;
        self.hypos.push(hypo);
        id
    }

    pub fn get(&self, id: HypoId) -> &Hypothesis {
        &self.hypos[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: HypoId) -> &mut Hypothesis {
        &mut self.hypos[id.0 as usize]
    }

    /// Back-pointer chain `[id, parent, ..., seed]`.
    pub fn chain_to_seed(&self, id: HypoId) -> Vec<HypoId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.get(current).parent {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Keep only the best `keep` arcs of `id`, by score then id.
    pub(crate) fn prune_arcs(&mut self, id: HypoId, keep: usize) {
        if self.get(id).arcs.len() <= keep {
            return;
        }
        let mut arcs = std::mem::take(&mut self.get_mut(id).arcs);
        arcs.sort_by(|a, b| {
            self.get(*b)
                .score
                .total_cmp(&self.get(*a).score)
                .then(a.cmp(b))
        });
        arcs.truncate(keep);
        self.get_mut(id).arcs = arcs;
    }
}

impl Default for HypoArena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<HypoId> for HypoArena {
    type Output = Hypothesis;

    fn index(&self, id: HypoId) -> &Hypothesis {
        self.get(id)
    }
}
