//! Fixtures shared by the unit tests: tiny PNG tiles, manifests and a small backbone.

use std::path::{Path, PathBuf};

use burn::backend::{Autodiff, NdArray};
use image::{Rgb, RgbImage};

use crate::data::{Manifest, ManifestEntry};
use crate::model::BackboneConfig;

pub type TestBackend = NdArray;
pub type TestAutodiffBackend = Autodiff<TestBackend>;

/// Write `count` distinct `size`x`size` PNG tiles into `dir`.
pub fn write_tiles(dir: &Path, count: usize, size: u32) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("tile_{i:03}.png"));
            let img = RgbImage::from_fn(size, size, |x, y| {
                let base = (i as u32 * 37) % 256;
                Rgb([
                    ((base + x * 11) % 256) as u8,
                    ((base * 3 + y * 13) % 256) as u8,
                    ((x * y + i as u32 * 5) % 256) as u8,
                ])
            });
            img.save(&path).unwrap();
            path
        })
        .collect()
}

pub fn labeled_manifest(dir: &Path, labels: &[f32]) -> Manifest {
    let tiles = write_tiles(dir, labels.len(), 12);
    let entries = tiles
        .iter()
        .zip(labels)
        .map(|(path, &label)| ManifestEntry {
            filename: path.display().to_string(),
            label: Some(label),
        })
        .collect();
    Manifest::from_entries(dir.join("manifest.csv"), entries)
}

pub fn unlabeled_manifest(dir: &Path, count: usize) -> Manifest {
    let entries = write_tiles(dir, count, 12)
        .iter()
        .map(|path| ManifestEntry {
            filename: path.display().to_string(),
            label: None,
        })
        .collect();
    Manifest::from_entries(dir.join("manifest.csv"), entries)
}

/// Write a labeled manifest CSV with `c1sPaths`/`c1xLabels` headers.
pub fn write_manifest_csv(dir: &Path, name: &str, labels: &[f32]) -> PathBuf {
    let tile_dir = dir.join(format!("{name}_tiles"));
    std::fs::create_dir_all(&tile_dir).unwrap();
    let tiles = write_tiles(&tile_dir, labels.len(), 12);

    let mut body = String::from("c1sPaths,c1xLabels\n");
    for (tile, label) in tiles.iter().zip(labels) {
        body.push_str(&format!("{},{}\n", tile.display(), label));
    }
    let path = dir.join(format!("{name}.csv"));
    std::fs::write(&path, body).unwrap();
    path
}

/// 8x8 input, two single-conv stages, one hidden layer.
pub fn tiny_backbone() -> BackboneConfig {
    BackboneConfig {
        image_size: 8,
        in_channels: 3,
        stages: vec![vec![4], vec![4]],
        hidden: vec![6],
        num_classes: 3,
    }
}
