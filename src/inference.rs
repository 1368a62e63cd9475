use crate::augment::{Pipeline, Transform};
use crate::data::batcher::image_to_tensor;
use crate::data::{CifarBatch, CifarClass};
use crate::error::{CifarError, Result};
use crate::model::CifarNet;
use burn::prelude::*;
use burn::tensor::activation::softmax;
use image::{DynamicImage, RgbImage};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub class: CifarClass,
    /// Softmax probability of `class`.
    pub confidence: f32,
}

/// Predictions for every row of a logits tensor.
///
/// # Shapes
///   - logits [batch_size, num_classes]
pub fn predictions<B: Backend>(logits: Tensor<B, 2>) -> Result<Vec<Prediction>> {
    let [batch_size, num_classes] = logits.dims();
    let probabilities = softmax(logits, 1)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| CifarError::TensorData(format!("{err:?}")))?;

    probabilities
        .chunks_exact(num_classes)
        .take(batch_size)
        .map(|row| {
            let (label, confidence) = row
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });
            let class = CifarClass::from_label(label as u8)
                .ok_or(CifarError::InvalidLabel(label as u8))?;
            Ok(Prediction { class, confidence })
        })
        .collect()
}

/// The image as the network sees it: RGB, resized to 32x32.
pub fn network_input(image: &DynamicImage) -> RgbImage {
    // the eval pipeline draws no random numbers
    let mut rng = StdRng::seed_from_u64(0);
    Pipeline::eval().apply(image.to_rgb8(), &mut rng)
}

/// Classifies a single image of any size.
pub fn predict_image<B: Backend>(
    model: &CifarNet<B>,
    image: &DynamicImage,
    device: &B::Device,
) -> Result<Prediction> {
    let image = network_input(image);
    let input = image_to_tensor::<B>(&image, device).unsqueeze::<4>();

    let output = model.forward(input);
    predictions(output)?
        .into_iter()
        .next()
        .ok_or_else(|| CifarError::TensorData("empty model output".to_string()))
}

/// Predicted and expected classes for each item of a batch.
pub fn predict_batch<B: Backend>(
    model: &CifarNet<B>,
    batch: CifarBatch<B>,
) -> Result<Vec<(Prediction, CifarClass)>> {
    let predicted = predictions(model.forward(batch.images))?;
    let expected = batch
        .targets
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|err| CifarError::TensorData(format!("{err:?}")))?;

    predicted
        .into_iter()
        .zip(expected)
        .map(|(prediction, label)| {
            let expected = CifarClass::from_label(label as u8)
                .ok_or(CifarError::InvalidLabel(label as u8))?;
            Ok((prediction, expected))
        })
        .collect()
}

/// Downloads and decodes an image. Unreachable hosts and non-success
/// statuses are errors.
pub fn fetch_image(url: &str) -> Result<DynamicImage> {
    info!("fetching {url}");
    let bytes = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
    Ok(image::load_from_memory(&bytes)?)
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    Ok(image::open(path)?)
}
