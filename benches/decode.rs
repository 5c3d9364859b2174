use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use phrasal::input::Sentence;
use phrasal::model::{BigramLm, MemoryOptionStore};
use phrasal::search::decode;
use phrasal::settings::DecoderConfig;

fn bench_store() -> MemoryOptionStore {
    let mut store = MemoryOptionStore::new();
    let entries: &[(&str, &str, f32)] = &[
        ("das", "the", -0.7),
        ("das", "this", -1.1),
        ("haus", "house", -0.4),
        ("haus", "home", -1.2),
        ("das haus", "the house", -0.9),
        ("ist", "is", -0.2),
        ("klein", "small", -0.6),
        ("klein", "little", -0.8),
        ("ist klein", "is small", -0.7),
        ("sehr", "very", -0.3),
        ("alt", "old", -0.5),
        ("und", "and", -0.2),
        ("der", "the", -0.6),
        ("garten", "garden", -0.9),
        ("der garten", "the garden", -1.0),
        ("schoen", "beautiful", -0.8),
    ];
    for &(source, target, score) in entries {
        store.insert(source, target, score);
    }
    store
}

fn bench_lm() -> BigramLm {
    let mut lm = BigramLm::new(-1.0);
    lm.set_bigram("the", "house", -0.2);
    lm.set_bigram("the", "garden", -0.3);
    lm.set_bigram("is", "small", -0.2);
    lm.set_bigram("very", "old", -0.4);
    lm.set_unigram("and", -0.5);
    lm.set_unigram("is", -0.4);
    lm
}

static INPUTS: &[(&str, &str)] = &[
    ("short", "das haus"),
    ("medium", "das haus ist klein und alt"),
    ("long", "das haus ist sehr klein und der garten ist sehr alt und schoen"),
];

fn bench_decode(c: &mut Criterion) {
    let lm = bench_lm();
    let config = DecoderConfig {
        stack_size: 30,
        ..DecoderConfig::default()
    };
    let mut group = c.benchmark_group("decode");
    for &(label, line) in INPUTS {
        let sentence = Sentence::from_line(line);
        group.bench_with_input(BenchmarkId::new(label, sentence.tokens().len()), &sentence, |b, sentence| {
            b.iter(|| {
                let mut store = bench_store();
                decode(sentence, &mut store, &lm, &config, None).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_nbest(c: &mut Criterion) {
    let lm = bench_lm();
    let config = DecoderConfig {
        stack_size: 30,
        nbest_enabled: true,
        ..DecoderConfig::default()
    };
    let sentence = Sentence::from_line("das haus ist klein und alt");
    let mut store = bench_store();
    let state = decode(&sentence, &mut store, &lm, &config, None).unwrap();

    let mut group = c.benchmark_group("nbest");
    for &count in &[1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| state.nbest(count, true));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_nbest);
criterion_main!(benches);
