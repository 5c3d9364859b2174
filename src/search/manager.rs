//! The stack-by-stack decoding loop.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, debug_span};

use crate::input::{InputKind, InputSentence, WordsRange};
use crate::model::{LanguageModel, OptionGrid, OptionId, OptionStore};
use crate::model::lm::advance_context;
use crate::settings::DecoderConfig;

use super::bitmap::CoverageBitmap;
use super::cube::cube_prune;
use super::hypothesis::{HypoArena, HypoId, Hypothesis};
use super::stack::HypothesisStack;
use super::stats::SearchStats;

/// Everything `extend` needs to score a new hypothesis.
pub(crate) struct Extender<'a> {
    pub sentence: &'a dyn InputSentence,
    pub grid: &'a OptionGrid,
    pub store: &'a dyn OptionStore,
    pub lm: &'a dyn LanguageModel,
    pub config: &'a DecoderConfig,
}

impl Extender<'_> {
    /// Apply `option` to `parent`: new coverage, rescored total with the
    /// future estimate swapped for the new remainder, advanced LM context.
    pub(crate) fn extend(
        &self,
        arena: &mut HypoArena,
        stats: &mut SearchStats,
        parent: HypoId,
        option: OptionId,
        grid_pos: (u16, u16),
    ) -> HypoId {
        let opt = self.grid.get(option);
        let (parent_coverage, parent_context, parent_range, parent_score) = {
            let p = &arena[parent];
            debug_assert!(
                !p.coverage.overlaps(opt.range),
                "extension overlaps coverage"
            );
            (p.coverage.clone(), p.context.clone(), p.range, p.score)
        };

        let mut coverage = parent_coverage.clone();
        coverage.cover(opt.range);

        let future_old = self.store.future_score(&parent_coverage);
        let future_new = self.store.future_score(&coverage);
        let lm_delta = self.lm.score_delta(&parent_context, &opt.target);
        let distance = self.sentence.distortion_distance(parent_range, opt.range);
        let score = parent_score - future_old
            + opt.score
            + lm_delta
            - self.config.distortion_weight * distance as f32
            + future_new;

        let context = advance_context(&parent_context, &opt.target, self.lm.order());
        stats.created += 1;
        arena.alloc(Hypothesis {
            id: HypoId(0), // assigned by the arena
            parent: Some(parent),
            option: Some(option),
            coverage,
            context,
            range: Some(opt.range),
            score,
            arcs: Vec::new(),
            grid: Some(grid_pos),
        })
    }
}

/// Source spans a hypothesis with coverage `coverage` may legally cover
/// next, under the phrase-length cap and the reordering limit.
///
/// Extensions at the left-most gap are always allowed; for anything
/// further right, the cheapest continuation is the one that comes back for
/// the gap, so the jump from the candidate span back to the gap already
/// lower-bounds the distortion of every completion. If even that exceeds
/// the limit the span is pruned now.
pub(crate) fn legal_extensions(
    sentence: &dyn InputSentence,
    coverage: &CoverageBitmap,
    current: Option<WordsRange>,
    config: &DecoderConfig,
) -> Vec<WordsRange> {
    let source_len = sentence.len();
    let gap = coverage.first_gap();
    let is_lattice = sentence.kind() == InputKind::WordLattice;
    let mut legal = Vec::new();

    for start in gap..source_len {
        let max_len = config.max_phrase_len.min(source_len - start);
        for end in start..start + max_len {
            let range = WordsRange::new(start, end);
            if coverage.overlaps(range) {
                continue;
            }
            if is_lattice
                && (!sentence.is_coverage_possible(range)
                    || !sentence.is_extension_possible(current, range))
            {
                continue;
            }
            if config.max_distortion >= 0 && start != gap {
                let back_to_gap = WordsRange::new(gap, gap);
                let distance = sentence.distortion_distance(Some(range), back_to_gap);
                if distance as i32 > config.max_distortion {
                    continue;
                }
            }
            legal.push(range);
        }
    }
    legal
}

/// Drives one sentence through the search: seeds stack 0, settles each
/// stack in turn, and expands coverage groups through cube pruning.
pub(crate) struct Manager<'a> {
    sentence: &'a dyn InputSentence,
    store: &'a dyn OptionStore,
    lm: &'a dyn LanguageModel,
    config: &'a DecoderConfig,
    grid: OptionGrid,
    arena: HypoArena,
    stacks: Vec<HypothesisStack>,
    stats: SearchStats,
    deadline: Option<Instant>,
    deadline_exceeded: bool,
}

impl<'a> Manager<'a> {
    pub fn new(
        sentence: &'a dyn InputSentence,
        store: &'a dyn OptionStore,
        lm: &'a dyn LanguageModel,
        config: &'a DecoderConfig,
        grid: OptionGrid,
        deadline: Option<Instant>,
    ) -> Self {
        let stacks = (0..=sentence.len())
            .map(|_| {
                HypothesisStack::new(
                    config.stack_size,
                    config.beam_threshold,
                    config.nbest_enabled,
                )
            })
            .collect();
        Self {
            sentence,
            store,
            lm,
            config,
            grid,
            arena: HypoArena::new(),
            stacks,
            stats: SearchStats::default(),
            deadline,
            deadline_exceeded: false,
        }
    }

    pub fn run(&mut self) {
        let _span = debug_span!("search", len = self.sentence.len()).entered();
        self.seed();

        'stacks: for index in 0..self.stacks.len() {
            if self.deadline_hit() {
                break;
            }
            self.stacks[index].prune_to_size(&self.arena, &mut self.stats);
            self.stacks[index].cleanup_arcs(&mut self.arena, self.config.nbest_factor);
            debug!(stack = index, size = self.stacks[index].len());

            for (coverage, rows) in self.coverage_groups(index) {
                let current = self.arena[rows[0]].range;
                let ranges = legal_extensions(self.sentence, &coverage, current, self.config);
                for range in ranges {
                    if self.deadline_hit() {
                        break 'stacks;
                    }
                    let columns: Vec<OptionId> = self
                        .grid
                        .options_for(range)
                        .iter()
                        .take(self.config.cube_top_k)
                        .copied()
                        .collect();
                    if columns.is_empty() {
                        continue;
                    }
                    self.expand(&rows, &columns);
                }
            }
        }

        debug!(stats = %self.stats, hypotheses = self.arena.len(), "search finished");
    }

    fn seed(&mut self) {
        let empty = CoverageBitmap::new(self.sentence.len());
        let score = self.store.future_score(&empty);
        self.stats.created += 1;
        let seed = self.arena.alloc(Hypothesis {
            id: HypoId(0),
            parent: None,
            option: None,
            coverage: empty,
            context: Vec::new(),
            range: None,
            score,
            arcs: Vec::new(),
            grid: None,
        });
        self.stacks[0].add_prune(seed, &mut self.arena, &mut self.stats);
    }

    /// Each coverage on the stack once, paired with the top-k members of
    /// its coverage set as cube rows. First-seen order of the coverages
    /// follows stack insertion order.
    fn coverage_groups(&self, index: usize) -> Vec<(CoverageBitmap, Vec<HypoId>)> {
        let mut seen: HashSet<CoverageBitmap> = HashSet::new();
        let mut groups = Vec::new();
        for id in self.stacks[index].iter() {
            let coverage = self.arena[id].coverage.clone();
            if seen.insert(coverage.clone()) {
                let mut rows = self.stacks[index].coverage_set(&coverage, &self.arena);
                rows.truncate(self.config.cube_top_k);
                groups.push((coverage, rows));
            }
        }
        groups
    }

    fn expand(&mut self, rows: &[HypoId], columns: &[OptionId]) {
        let extender = Extender {
            sentence: self.sentence,
            grid: &self.grid,
            store: self.store,
            lm: self.lm,
            config: self.config,
        };
        let emitted = cube_prune(
            &extender,
            &mut self.arena,
            &mut self.stats,
            rows,
            columns,
        );
        for id in emitted {
            let covered = self.arena[id].coverage.count();
            self.stacks[covered].add_prune(id, &mut self.arena, &mut self.stats);
        }
    }

    fn deadline_hit(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline_exceeded = true;
                true
            }
            _ => false,
        }
    }

    pub fn into_state(self) -> super::DecoderState {
        super::DecoderState {
            arena: self.arena,
            stacks: self.stacks,
            grid: self.grid,
            stats: self.stats,
            deadline_exceeded: self.deadline_exceeded,
            nbest_factor: self.config.nbest_factor,
        }
    }
}
