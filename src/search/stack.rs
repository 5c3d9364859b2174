//! One beam of hypotheses covering the same number of source words.

use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::trace;

use crate::model::Score;

use super::bitmap::CoverageBitmap;
use super::hypothesis::{HypoArena, HypoId, RecombKey};
use super::stats::SearchStats;

/// Max-heap wrapper for f32 scores.
#[derive(PartialEq)]
struct ScoreOrd(Score);

impl Eq for ScoreOrd {}

impl PartialOrd for ScoreOrd {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoreOrd {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub(crate) enum AddResult {
    Inserted,
    Equivalent(HypoId),
}

/// Beam-pruned set of hypotheses, unique under the recombination key.
///
/// Members are kept in insertion order for deterministic iteration; an
/// auxiliary index keyed on the coverage bitmap answers `coverage_set`
/// without scanning the stack. Pruning is lazy: `add` only triggers it
/// once the stack holds `2 * max_size - 1` entries.
pub struct HypothesisStack {
    order: Vec<HypoId>,
    by_key: HashMap<RecombKey, HypoId>,
    by_coverage: HashMap<CoverageBitmap, Vec<HypoId>>,
    best_score: Score,
    worst_score: Score,
    max_size: usize,
    beam_threshold: Score,
    nbest_enabled: bool,
}

impl HypothesisStack {
    pub fn new(max_size: usize, beam_threshold: Score, nbest_enabled: bool) -> Self {
        Self {
            order: Vec::new(),
            by_key: HashMap::new(),
            by_coverage: HashMap::new(),
            best_score: Score::NEG_INFINITY,
            worst_score: Score::NEG_INFINITY,
            max_size,
            beam_threshold,
            nbest_enabled,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Live members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = HypoId> + '_ {
        self.order.iter().copied()
    }

    pub fn best_score(&self) -> Score {
        self.best_score
    }

    pub fn worst_score(&self) -> Score {
        self.worst_score
    }

    /// The standard entry point: discard, insert, or recombine.
    pub fn add_prune(&mut self, id: HypoId, arena: &mut HypoArena, stats: &mut SearchStats) {
        if arena[id].score < self.worst_score {
            stats.discarded += 1;
            return;
        }

        let existing = match self.add(id, arena, stats) {
            AddResult::Inserted => return,
            AddResult::Equivalent(existing) => existing,
        };

        // equivalent member present: keep the better of the two
        stats.recombined += 1;
        let incoming_score = arena[id].score;
        let existing_score = arena[existing].score;
        if incoming_score > existing_score {
            trace!(winner = id.0, loser = existing.0, "recombined, incoming wins");
            if self.nbest_enabled {
                let mut absorbed = std::mem::take(&mut arena.get_mut(existing).arcs);
                let winner = arena.get_mut(id);
                winner.arcs.append(&mut absorbed);
                winner.arcs.push(existing);
            }
            self.replace(existing, id, arena);
            self.note_added(incoming_score);
        } else {
            trace!(winner = existing.0, loser = id.0, "recombined, existing wins");
            if self.nbest_enabled {
                let mut absorbed = std::mem::take(&mut arena.get_mut(id).arcs);
                let winner = arena.get_mut(existing);
                winner.arcs.append(&mut absorbed);
                winner.arcs.push(id);
            }
        }
    }

    /// Insert unless an equivalent member exists. On insertion, updates
    /// best and worst scores and prunes lazily when the stack has grown to
    /// twice its budget.
    pub(crate) fn add(
        &mut self,
        id: HypoId,
        arena: &mut HypoArena,
        stats: &mut SearchStats,
    ) -> AddResult {
        let key = arena[id].recomb_key();
        if let Some(&existing) = self.by_key.get(&key) {
            return AddResult::Equivalent(existing);
        }

        self.order.push(id);
        self.by_coverage
            .entry(arena[id].coverage.clone())
            .or_default()
            .push(id);
        self.by_key.insert(key, id);
        self.note_added(arena[id].score);

        if self.order.len() > self.max_size.saturating_mul(2).saturating_sub(1) {
            self.prune_to_size(arena, stats);
        }
        AddResult::Inserted
    }

    fn note_added(&mut self, score: Score) {
        if score > self.best_score {
            self.best_score = score;
            if self.best_score + self.beam_threshold > self.worst_score {
                self.worst_score = self.best_score + self.beam_threshold;
            }
        }
    }

    /// Swap `loser` for `winner` in place. Both share a recombination key,
    /// so the slot positions carry over.
    fn replace(&mut self, loser: HypoId, winner: HypoId, arena: &HypoArena) {
        let key = arena[winner].recomb_key();
        let displaced = self.by_key.insert(key, winner);
        assert_eq!(
            displaced,
            Some(loser),
            "recombination replaced a non-equivalent member"
        );

        let slot = self
            .order
            .iter()
            .position(|&id| id == loser)
            .expect("recombination loser not on stack");
        self.order[slot] = winner;

        let coverage_ids = self
            .by_coverage
            .get_mut(&arena[winner].coverage)
            .expect("recombination loser missing from coverage index");
        let slot = coverage_ids
            .iter()
            .position(|&id| id == loser)
            .expect("recombination loser missing from coverage index");
        coverage_ids[slot] = winner;
    }

    /// Shrink back to `max_size` members.
    ///
    /// Survivor scores above the beam cutoff go into a max-heap; the
    /// `max_size`-th best popped score becomes the threshold and everything
    /// strictly below it is removed. Ties at the threshold are retained, so
    /// the resulting size may slightly exceed the budget.
    pub fn prune_to_size(&mut self, arena: &HypoArena, stats: &mut SearchStats) {
        if self.order.len() <= self.max_size {
            return;
        }

        let cutoff = self.best_score + self.beam_threshold;
        let mut heap: BinaryHeap<ScoreOrd> = self
            .order
            .iter()
            .map(|&id| arena[id].score)
            .filter(|&score| score >= cutoff)
            .map(ScoreOrd)
            .collect();

        let keep = self.max_size.min(heap.len());
        for _ in 1..keep {
            heap.pop();
        }
        let threshold = match heap.pop() {
            Some(ScoreOrd(score)) => score,
            None => cutoff,
        };

        // two phases: pick removals, then update the indices
        let removed: HashSet<HypoId> = self
            .order
            .iter()
            .copied()
            .filter(|&id| arena[id].score < threshold)
            .collect();
        for &id in &removed {
            self.by_key.remove(&arena[id].recomb_key());
            if let Some(ids) = self.by_coverage.get_mut(&arena[id].coverage) {
                ids.retain(|member| *member != id);
            }
        }
        self.by_coverage.retain(|_, ids| !ids.is_empty());
        self.order.retain(|id| !removed.contains(id));

        stats.pruned += removed.len() as u64;
        self.worst_score = threshold;
        trace!(size = self.order.len(), threshold, "pruned stack");
    }

    /// Bound every member's arc list to the top `keep`. No-op unless
    /// n-best mode is on.
    pub fn cleanup_arcs(&mut self, arena: &mut HypoArena, keep: usize) {
        if !self.nbest_enabled {
            return;
        }
        for &id in &self.order {
            arena.prune_arcs(id, keep);
        }
    }

    /// Drop members nothing recorded in the arena points at through a
    /// parent link, except `keep`.
    pub fn remove_deadends(&mut self, arena: &HypoArena, keep: Option<HypoId>) {
        let mut referenced: HashSet<HypoId> = HashSet::new();
        for id in 0..arena.len() {
            if let Some(parent) = arena[HypoId(id as u32)].parent {
                referenced.insert(parent);
            }
        }

        let removed: Vec<HypoId> = self
            .order
            .iter()
            .copied()
            .filter(|&id| Some(id) != keep && !referenced.contains(&id))
            .collect();
        for &id in &removed {
            self.by_key.remove(&arena[id].recomb_key());
            if let Some(ids) = self.by_coverage.get_mut(&arena[id].coverage) {
                ids.retain(|member| *member != id);
            }
        }
        self.by_coverage.retain(|_, ids| !ids.is_empty());
        self.order.retain(|id| !removed.iter().any(|r| r == id));
    }

    /// Highest-scoring member, ties broken by lower id.
    pub fn best(&self, arena: &HypoArena) -> Option<HypoId> {
        self.order.iter().copied().min_by(|&a, &b| {
            arena[b]
                .score
                .total_cmp(&arena[a].score)
                .then(a.cmp(&b))
        })
    }

    /// All members, best first.
    pub fn sorted(&self, arena: &HypoArena) -> Vec<HypoId> {
        let mut ids = self.order.clone();
        ids.sort_by(|&a, &b| arena[b].score.total_cmp(&arena[a].score).then(a.cmp(&b)));
        ids
    }

    /// Members whose coverage equals `coverage`, best first. Answered from
    /// the coverage index, not by scanning the stack.
    pub fn coverage_set(&self, coverage: &CoverageBitmap, arena: &HypoArena) -> Vec<HypoId> {
        let mut ids = self.by_coverage.get(coverage).cloned().unwrap_or_default();
        ids.sort_by(|&a, &b| arena[b].score.total_cmp(&arena[a].score).then(a.cmp(&b)));
        ids
    }
}
