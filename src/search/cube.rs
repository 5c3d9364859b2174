//! Cube pruning: best-first enumeration of a (hypotheses x options) grid.

use std::collections::{BinaryHeap, HashSet};

use crate::model::OptionId;

use super::hypothesis::{HypoArena, HypoId};
use super::manager::Extender;
use super::stats::SearchStats;

/// A created hypothesis at its grid cell, ordered by full score
/// descending with ascending id as the deterministic tie-break.
struct CubeItem {
    score: f32,
    id: HypoId,
    x: usize,
    y: usize,
}

impl PartialEq for CubeItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for CubeItem {}

impl PartialOrd for CubeItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CubeItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then(other.id.cmp(&self.id))
    }
}

/// Enumerate the grid spanned by `rows` (hypotheses, best first) and
/// `columns` (options, best first) and return up to `cube_top_k` new
/// hypotheses.
///
/// Starting from cell (0, 0), each pop releases its right and lower
/// neighbours into the candidate queue; a visited set guards every cell
/// against double expansion. The pop budget is `cube_top_k + cube_slack`:
/// with combination costs the grid is not monotone, and the slack widens
/// the frontier searched before the buffer is cut back to the top k.
pub(crate) fn cube_prune(
    extender: &Extender<'_>,
    arena: &mut HypoArena,
    stats: &mut SearchStats,
    rows: &[HypoId],
    columns: &[OptionId],
) -> Vec<HypoId> {
    debug_assert!(!rows.is_empty() && !columns.is_empty());
    let top_k = extender.config.cube_top_k;
    let budget = top_k + extender.config.cube_slack;

    let mut candidates: BinaryHeap<CubeItem> = BinaryHeap::new();
    let mut visited: HashSet<(usize, usize)> = HashSet::new();
    let mut buffer: Vec<CubeItem> = Vec::new();

    let push = |x: usize,
                y: usize,
                arena: &mut HypoArena,
                stats: &mut SearchStats,
                candidates: &mut BinaryHeap<CubeItem>| {
        let id = extender.extend(arena, stats, rows[x], columns[y], (x as u16, y as u16));
        candidates.push(CubeItem {
            score: arena[id].score,
            id,
            x,
            y,
        });
    };

    visited.insert((0, 0));
    push(0, 0, arena, stats, &mut candidates);

    while buffer.len() < budget {
        let Some(item) = candidates.pop() else {
            break;
        };
        stats.cube_popped += 1;
        let (x, y) = (item.x, item.y);
        buffer.push(item);

        if y + 1 < columns.len() && visited.insert((x, y + 1)) {
            push(x, y + 1, arena, stats, &mut candidates);
        }
        if x + 1 < rows.len() && visited.insert((x + 1, y)) {
            push(x + 1, y, arena, stats, &mut candidates);
        }
    }

    // pops are only locally best-first: a cell surfaced late can beat one
    // popped earlier, so re-sort before cutting back to k
    buffer.sort_by(|a, b| b.cmp(a));
    buffer.truncate(top_k);
    buffer.into_iter().map(|item| item.id).collect()
}
