use criterion::{Criterion, criterion_group, criterion_main};
use ragstore::embeddings::chunking::{ChunkingConfig, chunk_text, chunk_title};
use std::hint::black_box;

const VOCABULARY: [&str; 12] = [
    "we", "propose", "a", "sparse", "attention", "model", "for", "long", "documents", "and",
    "evaluate", "retrieval.",
];

fn synthetic_abstracts(count: usize, words: usize) -> Vec<String> {
    (0..count)
        .map(|doc| {
            (0..words)
                .map(|i| VOCABULARY[(doc + i * 7) % VOCABULARY.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let abstracts = synthetic_abstracts(1_000, 250);
    let dataset = ChunkingConfig::default();
    c.bench_function("chunk_dataset", |b| {
        b.iter(|| {
            abstracts
                .iter()
                .map(|text| dataset.chunk(black_box(text)).len())
                .sum::<usize>()
        })
    });

    let upload = synthetic_abstracts(1, 50_000).remove(0);
    let config = ChunkingConfig::upload();
    c.bench_function("chunk_upload_with_titles", |b| {
        b.iter(|| {
            chunk_text(black_box(&upload), config.chunk_size, config.overlap)
                .iter()
                .map(|chunk| chunk_title(chunk))
                .count()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
