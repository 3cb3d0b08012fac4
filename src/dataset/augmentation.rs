//! Data Augmentation Module for Crop Disease Classification
//!
//! Random geometric and photometric jitter applied to already resized
//! training images. Validation and test images are never augmented.
//!
//! Rotation, shift, shear and zoom are composed into one affine map from
//! output to source coordinates, so each output pixel is sampled exactly
//! once. Samples that fall outside the source repeat the nearest edge pixel.

use image::{Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Maximum rotation angle in degrees (applies ±rotation_degrees)
    pub rotation_degrees: f32,
    /// Horizontal shift as a fraction of the width (±)
    pub width_shift: f32,
    /// Vertical shift as a fraction of the height (±)
    pub height_shift: f32,
    /// Maximum shear angle in radians (±)
    pub shear: f32,
    /// Zoom factor range, sampled independently per axis
    pub zoom_range: [f32; 2],
    /// Probability of a horizontal flip
    pub horizontal_flip_prob: f32,
    /// Multiplicative brightness factor range
    pub brightness_range: [f32; 2],
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_degrees: 30.0,
            width_shift: 0.2,
            height_shift: 0.2,
            shear: 0.2,
            zoom_range: [0.8, 1.2],
            horizontal_flip_prob: 0.5,
            brightness_range: [0.8, 1.2],
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations (for validation/inference)
    pub fn none() -> Self {
        Self {
            rotation_degrees: 0.0,
            width_shift: 0.0,
            height_shift: 0.0,
            shear: 0.0,
            zoom_range: [1.0, 1.0],
            horizontal_flip_prob: 0.0,
            brightness_range: [1.0, 1.0],
        }
    }

    /// True when no transform can change an image
    pub fn is_identity(&self) -> bool {
        *self == Self::none()
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.rotation_degrees < 0.0 || self.width_shift < 0.0 || self.height_shift < 0.0 || self.shear < 0.0 {
            return Err("augmentation magnitudes must be non-negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.horizontal_flip_prob) {
            return Err("horizontal_flip_prob must be in range [0.0, 1.0]".to_string());
        }
        for (name, [lo, hi]) in [("zoom_range", self.zoom_range), ("brightness_range", self.brightness_range)] {
            if lo <= 0.0 || lo > hi {
                return Err(format!("{} must satisfy 0 < min <= max", name));
            }
        }
        Ok(())
    }
}

/// Parameters drawn for one image
#[derive(Clone, Debug, PartialEq)]
pub struct TransformParams {
    pub theta: f32,
    pub tx: f32,
    pub ty: f32,
    pub shear: f32,
    pub zx: f32,
    pub zy: f32,
    pub flip: bool,
    pub brightness: f32,
}

impl TransformParams {
    fn is_affine_identity(&self) -> bool {
        self.theta == 0.0
            && self.tx == 0.0
            && self.ty == 0.0
            && self.shear == 0.0
            && self.zx == 1.0
            && self.zy == 1.0
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    /// Create a new augmenter with the given configuration
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Create an augmenter with no augmentation
    pub fn no_augmentation() -> Self {
        Self::new(AugmentationConfig::none())
    }

    /// Draw one set of transform parameters
    pub fn sample_params(&self, width: u32, height: u32, rng: &mut ChaCha8Rng) -> TransformParams {
        let c = &self.config;
        let symmetric = |rng: &mut ChaCha8Rng, r: f32| if r > 0.0 { rng.gen_range(-r..=r) } else { 0.0 };
        let range = |rng: &mut ChaCha8Rng, [lo, hi]: [f32; 2]| if hi > lo { rng.gen_range(lo..=hi) } else { lo };

        let theta = symmetric(rng, c.rotation_degrees).to_radians();
        let tx = symmetric(rng, c.width_shift) * width as f32;
        let ty = symmetric(rng, c.height_shift) * height as f32;
        let shear = symmetric(rng, c.shear);
        let zx = range(rng, c.zoom_range);
        let zy = range(rng, c.zoom_range);
        let flip = c.horizontal_flip_prob > 0.0 && rng.gen::<f32>() < c.horizontal_flip_prob;
        let brightness = range(rng, c.brightness_range);

        TransformParams {
            theta,
            tx,
            ty,
            shear,
            zx,
            zy,
            flip,
            brightness,
        }
    }

    /// Apply all configured augmentations randomly to an image
    ///
    /// The output has the same dimensions as the input.
    pub fn augment(&self, img: &RgbImage, rng: &mut ChaCha8Rng) -> RgbImage {
        if self.config.is_identity() {
            return img.clone();
        }
        let params = self.sample_params(img.width(), img.height(), rng);
        self.apply(img, &params)
    }

    /// Apply a fixed set of parameters
    pub fn apply(&self, img: &RgbImage, params: &TransformParams) -> RgbImage {
        let mut result = if params.is_affine_identity() {
            img.clone()
        } else {
            affine(img, params)
        };

        if params.flip {
            image::imageops::flip_horizontal_in_place(&mut result);
        }

        if params.brightness != 1.0 {
            adjust_brightness(&mut result, params.brightness);
        }

        result
    }
}

/// Resample `img` through rotation, shear, zoom and shift about the centre
fn affine(img: &RgbImage, p: &TransformParams) -> RgbImage {
    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    // rotation * shear * zoom, mapping output offsets to source offsets
    let (sin_t, cos_t) = p.theta.sin_cos();
    let (sin_s, cos_s) = p.shear.sin_cos();
    let r = [[cos_t, -sin_t], [sin_t, cos_t]];
    let s = [[1.0, -sin_s], [0.0, cos_s]];
    let rs = matmul(r, s);
    let m = [
        [rs[0][0] * p.zx, rs[0][1] * p.zy],
        [rs[1][0] * p.zx, rs[1][1] * p.zy],
    ];

    RgbImage::from_fn(width, height, |x, y| {
        let u = x as f32 - cx;
        let v = y as f32 - cy;
        let src_x = m[0][0] * u + m[0][1] * v + cx + p.tx;
        let src_y = m[1][0] * u + m[1][1] * v + cy + p.ty;
        bilinear_sample(img, src_x, src_y)
    })
}

fn matmul(a: [[f32; 2]; 2], b: [[f32; 2]; 2]) -> [[f32; 2]; 2] {
    [
        [a[0][0] * b[0][0] + a[0][1] * b[1][0], a[0][0] * b[0][1] + a[0][1] * b[1][1]],
        [a[1][0] * b[0][0] + a[1][1] * b[1][0], a[1][0] * b[0][1] + a[1][1] * b[1][1]],
    ]
}

/// Sample a pixel using bilinear interpolation, clamping to the nearest edge
fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
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

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

/// Scale every channel by `factor`
fn adjust_brightness(img: &mut RgbImage, factor: f32) {
    for pixel in img.pixels_mut() {
        for c in pixel.0.iter_mut() {
            *c = (*c as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn create_test_image() -> RgbImage {
        RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]))
    }

    fn identity_params() -> TransformParams {
        TransformParams {
            theta: 0.0,
            tx: 0.0,
            ty: 0.0,
            shear: 0.0,
            zx: 1.0,
            zy: 1.0,
            flip: false,
            brightness: 1.0,
        }
    }

    #[test]
    fn test_default_ranges() {
        let config = AugmentationConfig::default();
        assert_eq!(config.rotation_degrees, 30.0);
        assert_eq!(config.zoom_range, [0.8, 1.2]);
        assert_eq!(config.horizontal_flip_prob, 0.5);
        assert!(config.validate().is_ok());
        assert!(!config.is_identity());
    }

    #[test]
    fn test_no_augmentation_is_identity() {
        let aug = Augmenter::no_augmentation();
        let img = create_test_image();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        assert_eq!(aug.augment(&img, &mut rng), img);
    }

    #[test]
    fn test_augment_preserves_dimensions() {
        let aug = Augmenter::new(AugmentationConfig::default());
        let img = create_test_image();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..5 {
            let result = aug.augment(&img, &mut rng);
            assert_eq!(result.dimensions(), (64, 64));
        }
    }

    #[test]
    fn test_augment_is_seeded() {
        let aug = Augmenter::new(AugmentationConfig::default());
        let img = create_test_image();

        let a = aug.augment(&img, &mut ChaCha8Rng::seed_from_u64(7));
        let b = aug.augment(&img, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sampled_params_within_ranges() {
        let aug = Augmenter::new(AugmentationConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for _ in 0..100 {
            let p = aug.sample_params(100, 50, &mut rng);
            assert!(p.theta.abs() <= 30f32.to_radians() + 1e-6);
            assert!(p.tx.abs() <= 20.0 + 1e-4);
            assert!(p.ty.abs() <= 10.0 + 1e-4);
            assert!(p.shear.abs() <= 0.2 + 1e-6);
            assert!((0.8..=1.2).contains(&p.zx));
            assert!((0.8..=1.2).contains(&p.brightness));
        }
    }

    #[test]
    fn test_flip_mirrors_columns() {
        let aug = Augmenter::no_augmentation();
        let img = create_test_image();
        let params = TransformParams {
            flip: true,
            ..identity_params()
        };

        let flipped = aug.apply(&img, &params);
        assert_eq!(flipped.get_pixel(0, 10), img.get_pixel(63, 10));
        assert_eq!(flipped.get_pixel(63, 0), img.get_pixel(0, 0));
    }

    #[test]
    fn test_shift_fills_with_nearest_edge() {
        let aug = Augmenter::no_augmentation();
        let img = create_test_image();
        let params = TransformParams {
            tx: 1000.0,
            ..identity_params()
        };

        // Every sample lands past the right edge and repeats the last column
        let shifted = aug.apply(&img, &params);
        assert_eq!(shifted.get_pixel(0, 5), img.get_pixel(63, 5));
    }

    #[test]
    fn test_zoom_keeps_uniform_image_uniform() {
        let aug = Augmenter::no_augmentation();
        let img = RgbImage::from_pixel(16, 16, Rgb([10, 200, 30]));
        let params = TransformParams {
            zx: 1.2,
            zy: 0.8,
            theta: 0.3,
            ..identity_params()
        };

        let out = aug.apply(&img, &params);
        assert!(out.pixels().all(|p| *p == Rgb([10, 200, 30])));
    }

    #[test]
    fn test_brightness_scales_and_clamps() {
        let aug = Augmenter::no_augmentation();
        let img = RgbImage::from_pixel(4, 4, Rgb([100, 250, 0]));
        let params = TransformParams {
            brightness: 1.2,
            ..identity_params()
        };

        let out = aug.apply(&img, &params);
        assert_eq!(*out.get_pixel(0, 0), Rgb([120, 255, 0]));
    }

    #[test]
    fn test_invalid_config() {
        let config = AugmentationConfig {
            zoom_range: [1.2, 0.8],
            ..AugmentationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
