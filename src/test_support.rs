// Fake embedders and fixtures shared by unit tests

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use crate::config::Config;
use crate::embeddings::Embedder;

pub const DIMENSION: usize = 64;

/// Hashes each lowercase word into a bucket and returns the unit-length
/// bag-of-words vector, so texts sharing words land close together
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; DIMENSION];
        for word in text.split_whitespace() {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7_usize, |h, b| h.wrapping_mul(31).wrapping_add(usize::from(b)));
            vector[bucket % DIMENSION] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

/// Fails every request, as an unreachable model server would
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-test"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("connection refused")
    }
}

pub const PAPERS_CSV: &str = "title,abstract,url\n\
Graph Networks,graph neural networks learn node representations,https://arxiv.org/abs/1\n\
Protein Folding,protein structure prediction with folding models,https://arxiv.org/abs/2\n\
Speech Recognition,speech recognition from raw audio waveforms,https://arxiv.org/abs/3\n";

/// A config rooted in a fresh temp dir, with `csv` written as the dataset
pub fn config_with_dataset(csv: &str) -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.ollama.embedding_dimension = DIMENSION as u32;
    write_dataset(&config.dataset_path(), csv);
    (config, temp_dir)
}

pub fn write_dataset(path: &Path, csv: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create dataset dir");
    }
    fs::write(path, csv).expect("should write dataset");
}
