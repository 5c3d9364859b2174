//! Lazy n-best extraction over the hypothesis graph.

use std::collections::{BinaryHeap, HashSet};

use crate::model::{OptionGrid, Score};

use super::hypothesis::{HypoArena, HypoId};
use super::stack::HypothesisStack;
use super::{TargetSegment, Translation};

/// A view over the hypothesis graph: the back-pointer chain of one full
/// translation, final hypothesis first, seed last. Paths never mutate
/// hypotheses.
struct Path {
    nodes: Vec<HypoId>,
    score: Score,
    /// Edge index where this path last deviated from its parent path.
    /// Deviations are only generated at later edges, so no path is ever
    /// produced twice.
    deviated_at: Option<usize>,
}

struct OrderedPath(Path);

impl PartialEq for OrderedPath {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for OrderedPath {}

impl PartialOrd for OrderedPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .score
            .total_cmp(&other.0.score)
            .then_with(|| other.0.nodes.cmp(&self.0.nodes))
    }
}

/// Render a back-pointer chain (final first) as a `Translation`.
pub(crate) fn assemble(
    arena: &HypoArena,
    grid: &OptionGrid,
    nodes: &[HypoId],
    score: Score,
) -> Translation {
    let mut tokens = Vec::new();
    let mut segments = Vec::new();
    for &id in nodes.iter().rev() {
        if let Some(option) = arena[id].option {
            let opt = grid.get(option);
            tokens.extend(opt.target.iter().cloned());
            segments.push(TargetSegment {
                range: opt.range,
                phrase: opt.target.clone(),
            });
        }
    }
    Translation {
        score,
        tokens,
        segments,
    }
}

/// Pop-best enumeration of full translations.
///
/// The contender heap starts with the straight back-pointer chain of every
/// member of the final stack. Each popped path is emitted, then deviated:
/// every edge past the path's own deviation point is substituted with each
/// stored arc, the arc's own chain replacing the prefix and the score
/// shifted by the arc's margin. Distinct mode suppresses surface strings
/// already emitted and keeps a larger contender pool alive.
pub(crate) fn extract_nbest(
    arena: &HypoArena,
    grid: &OptionGrid,
    final_stack: &HypothesisStack,
    count: usize,
    distinct: bool,
    nbest_factor: usize,
) -> Vec<Translation> {
    if count == 0 {
        return Vec::new();
    }

    let mut contenders: BinaryHeap<OrderedPath> = final_stack
        .sorted(arena)
        .into_iter()
        .map(|id| {
            OrderedPath(Path {
                nodes: arena.chain_to_seed(id),
                score: arena[id].score,
                deviated_at: None,
            })
        })
        .collect();

    let pool = if distinct {
        count.saturating_mul(nbest_factor)
    } else {
        count
    };
    let max_iterations = count.saturating_mul(20);

    let mut out = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut iterations = 0;
    while out.len() < count && iterations < max_iterations {
        iterations += 1;
        let Some(OrderedPath(path)) = contenders.pop() else {
            break;
        };

        let result = assemble(arena, grid, &path.nodes, path.score);
        if !distinct || seen.insert(result.tokens.clone()) {
            out.push(result);
        }

        let first_edge = path.deviated_at.map_or(0, |edge| edge + 1);
        for edge in first_edge..path.nodes.len() {
            let main = path.nodes[edge];
            for &arc in &arena[main].arcs {
                let mut nodes = path.nodes[..edge].to_vec();
                nodes.extend(arena.chain_to_seed(arc));
                let score = path.score + (arena[arc].score - arena[main].score);
                contenders.push(OrderedPath(Path {
                    nodes,
                    score,
                    deviated_at: Some(edge),
                }));
            }
        }

        if contenders.len() > pool {
            let mut kept = contenders.into_vec();
            kept.sort_by(|a, b| b.cmp(a));
            kept.truncate(pool);
            contenders = kept.into();
        }
    }
    out
}
