//! Property-based checks of the search against brute-force enumeration.
//!
//! With the beam, stack cap, and cube bound effectively disabled, the
//! decoder must explore the same space as a recursive enumeration of all
//! legal extension sequences, so the best scores have to agree.

use proptest::prelude::*;

use crate::input::{InputSentence, Sentence, WordsRange};
use crate::model::lm::advance_context;
use crate::model::{BigramLm, LanguageModel, MemoryOptionStore, NullLm, OptionGrid, OptionStore};
use crate::search::manager::legal_extensions;
use crate::search::testutil::exhaustive_config;
use crate::search::{decode, CoverageBitmap};
use crate::settings::DecoderConfig;

type TableEntry = ((usize, usize), Vec<&'static str>, f32);

/// Random sentence length plus phrase-table entries over its spans
/// (span length at most 2, scores in [-5, 0]).
fn arb_case() -> impl Strategy<Value = (usize, Vec<TableEntry>)> {
    (1usize..=4).prop_flat_map(|len| {
        let spans: Vec<(usize, usize)> = (0..len)
            .flat_map(|start| (start..len.min(start + 2)).map(move |end| (start, end)))
            .collect();
        let span_count = spans.len();
        let entry = (
            0..span_count,
            prop::collection::vec(prop::sample::select(vec!["x", "y", "z"]), 1..=2),
            0u32..40,
        )
            .prop_map(move |(si, target, score)| (spans[si], target, -(score as f32) / 8.0));
        prop::collection::vec(entry, 0..=6).prop_map(move |entries| (len, entries))
    })
}

fn build_store(tokens: &[String], entries: &[TableEntry]) -> MemoryOptionStore {
    let mut store = MemoryOptionStore::new();
    for ((start, end), target, score) in entries {
        let source = tokens[*start..=*end].join(" ");
        store.insert(&source, &target.join(" "), *score);
    }
    store
}

fn test_lm() -> BigramLm {
    let mut lm = BigramLm::new(-0.5);
    lm.set_bigram("x", "y", -0.25);
    lm.set_bigram("y", "x", -0.75);
    lm.set_unigram("z", -0.125);
    lm
}

/// Highest full-coverage score over every legal extension sequence.
fn brute_force_best(
    sentence: &dyn InputSentence,
    grid: &OptionGrid,
    lm: &dyn LanguageModel,
    config: &DecoderConfig,
) -> Option<f32> {
    #[allow(clippy::too_many_arguments)]
    fn recurse(
        sentence: &dyn InputSentence,
        grid: &OptionGrid,
        lm: &dyn LanguageModel,
        config: &DecoderConfig,
        coverage: &CoverageBitmap,
        context: &[String],
        current: Option<WordsRange>,
        acc: f32,
        best: &mut Option<f32>,
    ) {
        if coverage.is_full() {
            if best.map_or(true, |b| acc > b) {
                *best = Some(acc);
            }
            return;
        }
        for range in legal_extensions(sentence, coverage, current, config) {
            for &opt_id in grid.options_for(range) {
                let opt = grid.get(opt_id);
                let lm_delta = lm.score_delta(context, &opt.target);
                let distance = sentence.distortion_distance(current, opt.range) as f32;
                let next_acc =
                    acc + opt.score + lm_delta - config.distortion_weight * distance;
                let mut next_coverage = coverage.clone();
                next_coverage.cover(opt.range);
                let next_context = advance_context(context, &opt.target, lm.order());
                recurse(
                    sentence,
                    grid,
                    lm,
                    config,
                    &next_coverage,
                    &next_context,
                    Some(opt.range),
                    next_acc,
                    best,
                );
            }
        }
    }

    let mut best = None;
    let empty = CoverageBitmap::new(sentence.len());
    recurse(
        sentence, grid, lm, config, &empty, &[], None, 0.0, &mut best,
    );
    best
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn exhaustive_decode_matches_brute_force(
        (len, entries) in arb_case(),
        use_bigram in any::<bool>(),
        limit_distortion in any::<bool>(),
    ) {
        let tokens: Vec<String> = (0..len).map(|i| format!("w{i}")).collect();
        let source = Sentence::new(tokens.clone());
        let mut store = build_store(&tokens, &entries);

        let lm: Box<dyn LanguageModel> = if use_bigram {
            Box::new(test_lm())
        } else {
            Box::new(NullLm)
        };
        let config = DecoderConfig {
            max_distortion: if limit_distortion { 1 } else { -1 },
            ..exhaustive_config()
        };

        let options = store.create_for(&source).unwrap();
        let grid = OptionGrid::build(len, options).unwrap();
        let expected = brute_force_best(&source, &grid, lm.as_ref(), &config)
            .expect("fallback options keep every sentence coverable");

        let state = decode(&source, &mut store, lm.as_ref(), &config, None).unwrap();
        let got = state.best_translation().unwrap().score;
        prop_assert!(
            (got - expected).abs() < 1e-2,
            "decoder found {got}, brute force found {expected}"
        );
    }

    #[test]
    fn tight_config_keeps_invariants_and_determinism(
        (len, entries) in arb_case(),
    ) {
        let tokens: Vec<String> = (0..len).map(|i| format!("w{i}")).collect();
        let source = Sentence::new(tokens.clone());
        let config = DecoderConfig {
            stack_size: 2,
            beam_threshold: -1.0,
            nbest_enabled: true,
            ..DecoderConfig::default()
        };
        let lm = test_lm();

        let mut store = build_store(&tokens, &entries);
        let state = decode(&source, &mut store, &lm, &config, None).unwrap();

        for (index, stack) in state.stacks.iter().enumerate() {
            let mut keys = std::collections::HashSet::new();
            for id in stack.iter() {
                prop_assert_eq!(state.arena[id].coverage.count(), index);
                prop_assert!(keys.insert(state.arena[id].recomb_key()));
            }
            if !stack.is_empty() {
                prop_assert!(
                    stack.worst_score() >= stack.best_score() + config.beam_threshold - 1e-6
                );
            }
        }

        let mut store = build_store(&tokens, &entries);
        let again = decode(&source, &mut store, &lm, &config, None).unwrap();
        prop_assert_eq!(state.stack_sizes(), again.stack_sizes());
        let (a, b) = (state.best_translation().unwrap(), again.best_translation().unwrap());
        prop_assert_eq!(a.score.to_bits(), b.score.to_bits());
        prop_assert_eq!(a.tokens, b.tokens);
    }
}
