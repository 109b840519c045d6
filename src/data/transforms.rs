use image::{Rgb, Rgb32FImage};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Random augmentation ranges for the training split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Degrees; the angle is drawn from [-range, range].
    pub rotation_range: f32,
    pub horizontal_flip: bool,
    pub vertical_flip: bool,
    /// Multiplicative brightness factor bounds.
    pub brightness_range: [f32; 2],
    /// Intensity units on the 0-255 scale.
    pub channel_shift_range: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 360.0,
            horizontal_flip: true,
            vertical_flip: true,
            brightness_range: [0.5, 1.5],
            channel_shift_range: 40.0,
        }
    }
}

impl AugmentationConfig {
    pub fn disabled() -> Self {
        Self {
            rotation_range: 0.0,
            horizontal_flip: false,
            vertical_flip: false,
            brightness_range: [1.0, 1.0],
            channel_shift_range: 0.0,
        }
    }
}

/// One draw of transform parameters for a single image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub theta: f32,
    pub channel_shift: f32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub brightness: f32,
}

impl TransformParams {
    pub fn identity() -> Self {
        Self {
            theta: 0.0,
            channel_shift: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            brightness: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataAugmentation {
    config: AugmentationConfig,
}

impl DataAugmentation {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> TransformParams {
        let cfg = &self.config;
        TransformParams {
            theta: uniform(rng, -cfg.rotation_range, cfg.rotation_range),
            channel_shift: uniform(rng, -cfg.channel_shift_range, cfg.channel_shift_range),
            flip_horizontal: cfg.horizontal_flip && rng.gen_bool(0.5),
            flip_vertical: cfg.vertical_flip && rng.gen_bool(0.5),
            brightness: uniform(rng, cfg.brightness_range[0], cfg.brightness_range[1]),
        }
    }

    /// Apply in order: rotation, channel shift, flips, brightness.
    pub fn apply(&self, img: Rgb32FImage, params: &TransformParams) -> Rgb32FImage {
        let mut img = img;

        if params.theta != 0.0 {
            img = rotate(&img, params.theta);
        }
        if params.channel_shift != 0.0 {
            shift_channels(&mut img, params.channel_shift);
        }
        if params.flip_horizontal {
            image::imageops::flip_horizontal_in_place(&mut img);
        }
        if params.flip_vertical {
            image::imageops::flip_vertical_in_place(&mut img);
        }
        if params.brightness != 1.0 {
            for pixel in img.pixels_mut() {
                for v in pixel.0.iter_mut() {
                    *v = (*v * params.brightness).clamp(0.0, 255.0);
                }
            }
        }

        img
    }
}

fn uniform<R: Rng>(rng: &mut R, low: f32, high: f32) -> f32 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// Rotate about the centre with bilinear sampling; outside samples take the nearest edge.
fn rotate(img: &Rgb32FImage, degrees: f32) -> Rgb32FImage {
    let (width, height) = img.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    Rgb32FImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = cos * dx - sin * dy + cx;
        let sy = sin * dx + cos * dy + cy;
        bilinear(img, sx, sy)
    })
}

fn bilinear(img: &Rgb32FImage, x: f32, y: f32) -> Rgb<f32> {
    let (width, height) = img.dimensions();
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0.0f32; 3];
    for (c, v) in out.iter_mut().enumerate() {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        *v = top * (1.0 - fy) + bottom * fy;
    }
    Rgb(out)
}

/// Add one intensity to every channel, clipped to the image's own value range.
fn shift_channels(img: &mut Rgb32FImage, intensity: f32) {
    let (min, max) = img
        .pixels()
        .flat_map(|p| p.0)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    for pixel in img.pixels_mut() {
        for v in pixel.0.iter_mut() {
            *v = (*v + intensity).clamp(min, max);
        }
    }
}
