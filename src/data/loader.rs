//! Labeled-folder dataset loader
//!
//! Expects the layout produced by the dataset download step:
//!
//! ```text
//! root/
//!   real/  *.jpg|*.png   (photographs)
//!   fake/  *.jpg|*.png   (AI-generated)
//! ```
//!
//! Batches are drawn without replacement within an epoch and reshuffled
//! across epochs. A corrupt or unreadable file is skipped with a log line;
//! it never surfaces to the training loop. The trailing partial batch is
//! dropped so every batch has a fixed size.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

use super::image::{batch_tensor, preprocess_bytes};
use crate::{Error, Result, Tensor};

/// Sample label. `Fake` is the positive class for the deployed detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Photograph
    Real,
    /// AI-generated
    Fake,
}

impl Label {
    /// Target value for classification metrics (fake/AI = 1.0)
    pub fn target(self) -> f32 {
        match self {
            Label::Real => 0.0,
            Label::Fake => 1.0,
        }
    }
}

/// A decoded training batch
pub struct ImageBatch {
    /// Image tensor, `[n, 3, size, size]`, values in [-1, 1]
    pub images: Tensor,
    /// Per-sample targets (fake = 1.0)
    pub labels: Vec<f32>,
}

impl ImageBatch {
    /// Number of samples in the batch
    pub fn size(&self) -> usize {
        self.labels.len()
    }
}

/// A dataset of labeled face images on disk
pub struct FaceDataset {
    samples: Vec<(PathBuf, Label)>,
    image_size: usize,
}

impl FaceDataset {
    /// Scan a `real/` + `fake/` directory pair. Either subdirectory may be
    /// absent (a real-only directory is enough for adversarial training).
    pub fn open(root: impl AsRef<Path>, image_size: usize) -> Result<Self> {
        let root = root.as_ref();
        let mut samples = Vec::new();
        for (dir, label) in [("real", Label::Real), ("fake", Label::Fake)] {
            let path = root.join(dir);
            if path.is_dir() {
                collect_images(&path, label, &mut samples)?;
            }
        }
        if samples.is_empty() {
            return Err(Error::io(
                format!("no images under {} (expected real/ and/or fake/ subdirectories)", root.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "empty dataset"),
            ));
        }
        // Deterministic base order; shuffling happens per epoch
        samples.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self { samples, image_size })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Configured image size
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Subset containing only samples with the given label
    pub fn only(&self, label: Label) -> FaceDataset {
        FaceDataset {
            samples: self.samples.iter().filter(|(_, l)| *l == label).cloned().collect(),
            image_size: self.image_size,
        }
    }

    /// Iterate fixed-size batches over a fresh shuffle of the dataset.
    /// Corrupt samples are skipped; the final partial batch is dropped.
    pub fn batches<'a>(&'a self, batch_size: usize, rng: &mut StdRng) -> BatchIter<'a> {
        assert!(batch_size > 0, "batch_size must be positive");
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        order.shuffle(rng);
        BatchIter { dataset: self, order, cursor: 0, batch_size }
    }
}

fn collect_images(dir: &Path, label: Label, out: &mut Vec<(PathBuf, Label)>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::io(format!("reading dataset directory {}", dir.display()), e))?;
    for entry in entries {
        let entry = entry
            .map_err(|e| Error::io(format!("reading dataset directory {}", dir.display()), e))?;
        let path = entry.path();
        let ext = path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase);
        if matches!(ext.as_deref(), Some("jpg" | "jpeg" | "png" | "bmp" | "webp")) {
            out.push((path, label));
        }
    }
    Ok(())
}

/// Lazy batch iterator over one epoch of a shuffled dataset
pub struct BatchIter<'a> {
    dataset: &'a FaceDataset,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = ImageBatch;

    fn next(&mut self) -> Option<ImageBatch> {
        let size = self.dataset.image_size;
        let mut images = Vec::with_capacity(self.batch_size);
        let mut labels = Vec::with_capacity(self.batch_size);

        while images.len() < self.batch_size && self.cursor < self.order.len() {
            let (path, label) = &self.dataset.samples[self.order[self.cursor]];
            self.cursor += 1;

            let decoded = std::fs::read(path)
                .map_err(|e| Error::DataLoad { path: path.clone(), message: e.to_string() })
                .and_then(|bytes| {
                    preprocess_bytes(&bytes, size).map_err(|e| Error::DataLoad {
                        path: path.clone(),
                        message: e.to_string(),
                    })
                });
            match decoded {
                Ok(chw) => {
                    images.push(chw);
                    labels.push(label.target());
                }
                Err(e) => {
                    // Recoverable: skip the sample and keep filling the batch
                    eprintln!("warning: {e}");
                }
            }
        }

        if images.len() < self.batch_size {
            // Drop the trailing partial batch
            return None;
        }
        Some(ImageBatch { images: batch_tensor(&images, size), labels })
    }
}
