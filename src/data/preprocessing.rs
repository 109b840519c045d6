use std::path::Path;

use image::imageops::FilterType;
use image::{Rgb, Rgb32FImage, RgbImage};

use crate::error::{Error, Result};

/// Decode a tile as RGB and resize it to `size`x`size`.
///
/// Pixels stay on the 0-255 scale so augmentation can work in intensity units.
pub fn load_tile(path: &Path, size: u32) -> Result<Rgb32FImage> {
    let img = image::open(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;

    let rgb = img
        .resize_exact(size, size, FilterType::Nearest)
        .to_rgb8();

    Ok(Rgb32FImage::from_fn(size, size, |x, y| {
        let p = rgb.get_pixel(x, y);
        Rgb([p[0] as f32, p[1] as f32, p[2] as f32])
    }))
}

/// Rescale to [0, 1] and lay out channel-first: [R_all, G_all, B_all].
pub fn to_chw(img: &Rgb32FImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (idx, pixel) in img.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + idx] = (pixel[c] / 255.0).clamp(0.0, 1.0);
        }
    }

    data
}

/// Inverse of [`to_chw`] for a single image, used for preview grids.
pub fn chw_to_rgb8(data: &[f32], size: u32) -> RgbImage {
    let plane = (size * size) as usize;
    RgbImage::from_fn(size, size, |x, y| {
        let idx = (y * size + x) as usize;
        let channel = |c: usize| (data[c * plane + idx] * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgb([channel(0), channel(1), channel(2)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_tiles;

    #[test]
    fn test_load_tile_resizes() {
        let dir = tempfile::tempdir().unwrap();
        let tiles = write_tiles(dir.path(), 1, 16);

        let img = load_tile(&tiles[0], 8).unwrap();
        assert_eq!(img.dimensions(), (8, 8));
        assert!(img.pixels().all(|p| p.0.iter().all(|v| (0.0..=255.0).contains(v))));
    }

    #[test]
    fn test_load_tile_reports_undecodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        assert!(matches!(load_tile(&path, 8), Err(Error::Image { .. })));
    }

    #[test]
    fn test_chw_layout_and_scale() {
        let img = Rgb32FImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([255.0, 0.0, 51.0])
            } else {
                Rgb([0.0, 255.0, 0.0])
            }
        });

        let data = to_chw(&img);
        assert_eq!(data.len(), 6);
        assert_eq!(&data[0..2], &[1.0, 0.0]);
        assert_eq!(&data[2..4], &[0.0, 1.0]);
        assert!((data[4] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_chw_to_rgb8_inverts_to_chw() {
        let img = Rgb32FImage::from_fn(4, 4, |x, y| Rgb([(x * 40) as f32, (y * 60) as f32, 7.0]));
        let restored = chw_to_rgb8(&to_chw(&img), 4);
        assert_eq!(restored.get_pixel(3, 2), &Rgb([120, 120, 7]));
    }
}
