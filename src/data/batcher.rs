use crate::augment::{AugmentationConfig, Pipeline, Transform};
use crate::data::dataset::{CHANNELS, CifarItem, HEIGHT, WIDTH};
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use image::RgbImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};

/// Per-channel mean and standard deviation used to centre the inputs.
pub const MEAN: f32 = 0.5;
pub const STD: f32 = 0.5;

/// Scales a byte into `[0, 1]`, then normalizes into `[-1, 1]`.
pub fn normalize(value: u8) -> f32 {
    (value as f32 / 255.0 - MEAN) / STD
}

/// Inverse of [`normalize`], clipping to the displayable range.
pub fn denormalize(value: f32) -> u8 {
    ((value * STD + MEAN).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Normalized planar values of an RGB image.
///
/// # Shape
/// [CHANNELS * height * width]
pub fn image_to_chw(image: &RgbImage) -> Vec<f32> {
    let plane = (image.width() * image.height()) as usize;
    let mut values = vec![0.0; CHANNELS * plane];
    for (i, pixel) in image.pixels().enumerate() {
        for c in 0..CHANNELS {
            values[c * plane + i] = normalize(pixel[c]);
        }
    }
    values
}

/// # Shape
/// [CHANNELS, height, width]
pub fn image_to_tensor<B: Backend>(image: &RgbImage, device: &B::Device) -> Tensor<B, 3> {
    let shape = [CHANNELS, image.height() as usize, image.width() as usize];
    let data = TensorData::new(image_to_chw(image), shape);
    Tensor::from_data(data.convert::<B::FloatElem>(), device)
}

#[derive(Clone, Debug)]
pub struct CifarBatch<B: Backend> {
    /// Normalized images, see [`normalize`].
    ///
    /// # Shape
    /// [batch_size, CHANNELS, HEIGHT, WIDTH]
    pub images: Tensor<B, 4>,
    /// # Shape
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Runs each item through a transform pipeline, then stacks them.
#[derive(Clone)]
pub struct CifarBatcher {
    pipeline: Arc<Pipeline>,
    rng: Arc<Mutex<StdRng>>,
}

impl CifarBatcher {
    pub fn new(pipeline: Pipeline, seed: u64) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Augmenting batcher, for training.
    pub fn train(config: &AugmentationConfig, seed: u64) -> Self {
        Self::new(Pipeline::train(config), seed)
    }

    /// Resize-only batcher, for validation and inference.
    pub fn eval() -> Self {
        Self::new(Pipeline::eval(), 0)
    }
}

impl<B: Backend> Batcher<B, CifarItem, CifarBatch<B>> for CifarBatcher {
    fn batch(&self, items: Vec<CifarItem>, device: &B::Device) -> CifarBatch<B> {
        let batch_size = items.len();
        let mut images = Vec::with_capacity(batch_size * CHANNELS * HEIGHT * WIDTH);
        let mut labels = Vec::with_capacity(batch_size);
        {
            let mut rng = self.rng.lock().unwrap_or_else(|err| err.into_inner());
            for item in items {
                let image = self.pipeline.apply(item.to_rgb_image(), &mut *rng);
                images.extend(image_to_chw(&image));
                labels.push(item.label as i64);
            }
        }

        let images = TensorData::new(images, [batch_size, CHANNELS, HEIGHT, WIDTH]);
        let targets = TensorData::new(labels, [batch_size]);

        CifarBatch {
            images: Tensor::from_data(images.convert::<B::FloatElem>(), device),
            targets: Tensor::from_data(targets.convert::<B::IntElem>(), device),
        }
    }
}
