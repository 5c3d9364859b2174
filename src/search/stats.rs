//! Per-sentence search statistics.

use std::fmt;

/// Counters updated only from the decoding thread; recombination and
/// pruning are normal outcomes and this is their only reporting channel.
#[derive(Debug, Default, Clone)]
pub struct SearchStats {
    /// Hypotheses allocated, including cube candidates never kept.
    pub created: u64,
    /// Pairs collapsed under the recombination key.
    pub recombined: u64,
    /// Rejected on arrival for scoring below a stack's worst score.
    pub discarded: u64,
    /// Removed by stack pruning.
    pub pruned: u64,
    /// Grid cells popped across all cube-pruning invocations.
    pub cube_popped: u64,
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} recombined={} pruned={} discarded={} cube_popped={}",
            self.created, self.recombined, self.pruned, self.discarded, self.cube_popped
        )
    }
}
