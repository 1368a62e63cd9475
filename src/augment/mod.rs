//! Image transform pipeline applied to each item before batching.
//!
//! Transforms operate on [`RgbImage`]s and draw their random parameters from a
//! caller-provided [`StdRng`], so a seeded pipeline is reproducible when items
//! are processed in the same order.

use burn::prelude::*;
use image::RgbImage;
use rand::Rng;
use rand::rngs::StdRng;

pub mod color;
pub mod geometry;

pub use color::ColorJitter;
pub use geometry::{RandomAffine, RandomHorizontalFlip, RandomRotation, Resize};

use crate::data::dataset::{HEIGHT, WIDTH};

pub trait Transform: Send + Sync {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage;
}

#[derive(Config, Debug)]
pub struct AugmentationConfig {
    #[config(default = 0.5)]
    pub flip_probability: f64,
    /// Rotation range, in degrees.
    #[config(default = 10.0)]
    pub rotation: f64,
    /// Horizontal shear range, in degrees.
    #[config(default = 10.0)]
    pub shear: f64,
    #[config(default = 0.8)]
    pub scale_min: f64,
    #[config(default = 1.2)]
    pub scale_max: f64,
    #[config(default = 0.2)]
    pub brightness: f64,
    #[config(default = 0.2)]
    pub contrast: f64,
    #[config(default = 0.2)]
    pub saturation: f64,
}

/// An ordered list of transforms.
#[derive(Default)]
pub struct Pipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Resize, flip, rotate, shear/scale and colour-jitter.
    pub fn train(config: &AugmentationConfig) -> Self {
        Self::new()
            .with(Resize::new(WIDTH as u32, HEIGHT as u32))
            .with(RandomHorizontalFlip::new(config.flip_probability))
            .with(RandomRotation::new(config.rotation))
            .with(RandomAffine::new(
                0.0,
                config.shear,
                (config.scale_min, config.scale_max),
            ))
            .with(ColorJitter::new(
                config.brightness,
                config.contrast,
                config.saturation,
            ))
    }

    /// Only brings the image to the network input size.
    pub fn eval() -> Self {
        Self::new().with(Resize::new(WIDTH as u32, HEIGHT as u32))
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for Pipeline {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage {
        self.transforms
            .iter()
            .fold(image, |image, transform| transform.apply(image, rng))
    }
}

/// Uniform sample in `[low, high]`, collapsing to `low` on an empty range.
pub(crate) fn uniform(rng: &mut StdRng, low: f64, high: f64) -> f64 {
    if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;

    pub(crate) fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn eval_keeps_network_sized_images() {
        let mut rng = StdRng::seed_from_u64(0);
        let image = gradient(32, 32);
        assert_eq!(Pipeline::eval().apply(image.clone(), &mut rng), image);
    }

    #[test]
    fn train_pipeline_outputs_network_size() {
        let mut rng = StdRng::seed_from_u64(0);
        let pipeline = Pipeline::train(&AugmentationConfig::new());
        assert_eq!(pipeline.len(), 5);
        let out = pipeline.apply(gradient(48, 40), &mut rng);
        assert_eq!(out.dimensions(), (32, 32));
    }

    #[test]
    fn seeded_pipelines_agree() {
        let pipeline = Pipeline::train(&AugmentationConfig::new());
        let a = pipeline.apply(gradient(32, 32), &mut StdRng::seed_from_u64(7));
        let b = pipeline.apply(gradient(32, 32), &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn uniform_handles_empty_range() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(uniform(&mut rng, 1.0, 1.0), 1.0);
        let v = uniform(&mut rng, -2.0, 2.0);
        assert!((-2.0..=2.0).contains(&v));
    }
}
