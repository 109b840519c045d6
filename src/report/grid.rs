use image::{imageops, Rgb, RgbImage};

const GAP: u32 = 2;

/// Tile `images` row-major into a grid `columns` wide, separated by white gutters.
///
/// Every tile is assumed to share the first tile's dimensions.
pub fn sample_grid(images: &[RgbImage], columns: usize) -> Option<RgbImage> {
    let first = images.first()?;
    let (w, h) = first.dimensions();
    let columns = columns.clamp(1, images.len()) as u32;
    let rows = (images.len() as u32).div_ceil(columns);

    let mut canvas = RgbImage::from_pixel(
        columns * w + (columns + 1) * GAP,
        rows * h + (rows + 1) * GAP,
        Rgb([255, 255, 255]),
    );
    for (i, tile) in images.iter().enumerate() {
        let (col, row) = (i as u32 % columns, i as u32 / columns);
        let x = GAP + col * (w + GAP);
        let y = GAP + row * (h + GAP);
        imageops::replace(&mut canvas, tile, i64::from(x), i64::from(y));
    }
    Some(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_grid_dimensions() {
        let tiles = vec![RgbImage::new(4, 4); 25];
        let grid = sample_grid(&tiles, 5).unwrap();
        assert_eq!(grid.dimensions(), (5 * 4 + 6 * GAP, 5 * 4 + 6 * GAP));
    }

    #[test]
    fn test_partial_last_row() {
        let tiles = vec![RgbImage::from_pixel(3, 3, Rgb([10, 20, 30])); 7];
        let grid = sample_grid(&tiles, 5).unwrap();
        assert_eq!(grid.dimensions(), (5 * 3 + 6 * GAP, 2 * 3 + 3 * GAP));
        assert_eq!(grid.get_pixel(GAP, GAP), &Rgb([10, 20, 30]));
        // the empty cell at the end of row two stays white
        let y = GAP + 3 + GAP;
        assert_eq!(grid.get_pixel(GAP + 4 * (3 + GAP), y), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_fewer_tiles_than_columns() {
        let tiles = vec![RgbImage::new(2, 2); 2];
        let grid = sample_grid(&tiles, 5).unwrap();
        assert_eq!(grid.dimensions(), (2 * 2 + 3 * GAP, 2 + 2 * GAP));
    }

    #[test]
    fn test_no_tiles() {
        assert!(sample_grid(&[], 5).is_none());
    }
}
