use std::path::Path;

use burn::prelude::*;
use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::manifest::{Manifest, ManifestEntry};
use crate::data::preprocessing::{chw_to_rgb8, load_tile, to_chw};
use crate::data::transforms::{AugmentationConfig, DataAugmentation};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub image_size: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
enum SourceMode {
    /// Shuffled and augmented; reshuffled on every pass.
    Training {
        augmentation: DataAugmentation,
        rng: StdRng,
    },
    /// Manifest order, no augmentation.
    Evaluation,
}

/// A finite, restartable sequence of image batches over one manifest.
///
/// Each pass yields every manifest row exactly once. Call [`BatchSource::reset`] to
/// start the next pass.
#[derive(Debug, Clone)]
pub struct BatchSource {
    entries: Vec<ManifestEntry>,
    labeled: bool,
    config: BatchConfig,
    mode: SourceMode,
    order: Vec<usize>,
    cursor: usize,
}

/// One decoded group of tiles, channel-first and rescaled to [0, 1].
#[derive(Debug, Clone)]
pub struct ImageBatch {
    pub pixels: Vec<f32>,
    pub labels: Option<Vec<f32>>,
    /// Manifest rows in batch order.
    pub rows: Vec<usize>,
    pub image_size: usize,
}

impl BatchSource {
    pub fn training(
        manifest: &Manifest,
        config: BatchConfig,
        augmentation: AugmentationConfig,
        seed: u64,
    ) -> Result<Self> {
        let mut source = Self::with_mode(
            manifest,
            config,
            SourceMode::Training {
                augmentation: DataAugmentation::new(augmentation),
                rng: StdRng::seed_from_u64(seed),
            },
        )?;
        source.reset();
        Ok(source)
    }

    pub fn evaluation(manifest: &Manifest, config: BatchConfig) -> Result<Self> {
        Self::with_mode(manifest, config, SourceMode::Evaluation)
    }

    fn with_mode(manifest: &Manifest, config: BatchConfig, mode: SourceMode) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }

        Ok(Self {
            entries: manifest.entries().to_vec(),
            labeled: manifest.is_labeled(),
            config,
            mode,
            order: (0..manifest.len()).collect(),
            cursor: 0,
        })
    }

    /// Rewind to the start of a new pass; training mode reshuffles.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if let SourceMode::Training { rng, .. } = &mut self.mode {
            self.order.shuffle(rng);
        }
    }

    /// Number of batches in one pass.
    pub fn len(&self) -> usize {
        self.entries.len().div_ceil(self.config.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.entries.len()
    }

    pub fn config(&self) -> BatchConfig {
        self.config
    }

    pub fn is_training(&self) -> bool {
        matches!(self.mode, SourceMode::Training { .. })
    }

    /// Source filenames in evaluation order.
    pub fn filenames(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.filename.clone()).collect()
    }

    /// Ground truth in evaluation order, or `None` for an unlabeled manifest.
    pub fn labels(&self) -> Option<Vec<f32>> {
        if !self.labeled {
            return None;
        }
        self.entries.iter().map(|e| e.label).collect()
    }

    /// First tile of each of the next `count` batches, wrapping across passes.
    ///
    /// Works on a clone so the source's own position and RNG are untouched.
    pub fn preview(&self, count: usize) -> Result<Vec<RgbImage>> {
        let mut tiles = Vec::with_capacity(count);
        if self.is_empty() {
            return Ok(tiles);
        }

        let mut source = self.clone();
        while tiles.len() < count {
            match source.next() {
                Some(batch) => tiles.push(batch?.tile(0)),
                None => source.reset(),
            }
        }
        Ok(tiles)
    }

    fn load_batch(&mut self, rows: &[usize]) -> Result<ImageBatch> {
        let size = self.config.image_size;
        let mut pixels = Vec::with_capacity(rows.len() * 3 * size * size);

        for &row in rows {
            let tile = load_tile(Path::new(&self.entries[row].filename), size as u32)?;
            let tile = match &mut self.mode {
                SourceMode::Training { augmentation, rng } => {
                    let params = augmentation.sample(rng);
                    augmentation.apply(tile, &params)
                }
                SourceMode::Evaluation => tile,
            };
            pixels.extend(to_chw(&tile));
        }

        let labels = if self.labeled {
            rows.iter().map(|&row| self.entries[row].label).collect()
        } else {
            None
        };

        Ok(ImageBatch {
            pixels,
            labels,
            rows: rows.to_vec(),
            image_size: size,
        })
    }
}

impl Iterator for BatchSource {
    type Item = Result<ImageBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.entries.len() {
            return None;
        }

        let end = (self.cursor + self.config.batch_size).min(self.entries.len());
        let rows = self.order[self.cursor..end].to_vec();
        self.cursor = end;

        Some(self.load_batch(&rows))
    }
}

impl ImageBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `[batch, 3, size, size]`
    pub fn images<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let size = self.image_size;
        Tensor::<B, 4>::from_data(
            TensorData::new(self.pixels.clone(), [self.len(), 3, size, size]),
            device,
        )
    }

    /// `[batch, 1]`, or `None` for unlabeled batches.
    pub fn targets<B: Backend>(&self, device: &B::Device) -> Option<Tensor<B, 2>> {
        self.labels.as_ref().map(|labels| {
            Tensor::<B, 2>::from_data(TensorData::new(labels.clone(), [labels.len(), 1]), device)
        })
    }

    pub fn tile(&self, index: usize) -> RgbImage {
        let stride = 3 * self.image_size * self.image_size;
        let start = index * stride;
        chw_to_rgb8(&self.pixels[start..start + stride], self.image_size as u32)
    }
}
