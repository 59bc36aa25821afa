use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bhmm::{sweep, Corpus, InferenceState, ModelConfig, SimulatedAnnealer, Variant};

fn synthetic_corpus(sentences: usize) -> Corpus {
    let nouns = ["dog", "cat", "bird", "fish", "horse", "cow"];
    let verbs = ["runs", "sleeps", "sings", "swims", "jumps", "eats"];
    let dets = ["the", "a", "this", "that"];
    let mut builder = Corpus::builder();
    for i in 0..sentences {
        let sentence = [
            dets[i % dets.len()],
            nouns[(i * 7) % nouns.len()],
            verbs[(i * 5) % verbs.len()],
            dets[(i + 1) % dets.len()],
            nouns[(i * 3) % nouns.len()],
        ];
        builder.push_sentence(&sentence).unwrap();
        if i % 20 == 19 {
            builder.end_document();
        }
    }
    builder.build().unwrap()
}

fn benchmark_sweep_by_variant(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_by_variant");
    let corpus = synthetic_corpus(500);

    for variant in [Variant::BHMM, Variant::LDAHMM, Variant::BHMM2, Variant::HDPHMM] {
        let config = ModelConfig::new(variant)
            .with_states(10, 4)
            .unwrap()
            .with_topics(10)
            .unwrap()
            .with_seed(1);
        let mut state = InferenceState::new(corpus.clone(), config).unwrap();
        state.initialize().unwrap();
        let annealer = SimulatedAnnealer::unannealed();

        group.bench_with_input(BenchmarkId::from_parameter(variant), &variant, |b, _| {
            b.iter(|| black_box(sweep(&mut state, &annealer).unwrap()))
        });
    }
    group.finish();
}

fn benchmark_sweep_by_states(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_by_states");
    let corpus = synthetic_corpus(200);

    // Number of content and function states
    for states in [5, 10, 20, 40] {
        let config = ModelConfig::new(Variant::CDHMM_SENTENCE)
            .with_states(states, states / 2)
            .unwrap()
            .with_seed(1);
        let mut state = InferenceState::new(corpus.clone(), config).unwrap();
        state.initialize().unwrap();
        let annealer = SimulatedAnnealer::unannealed();

        group.bench_with_input(BenchmarkId::from_parameter(states), &states, |b, _| {
            b.iter(|| black_box(sweep(&mut state, &annealer).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_sweep_by_variant, benchmark_sweep_by_states);
criterion_main!(benches);
