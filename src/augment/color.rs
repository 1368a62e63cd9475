use super::{Transform, uniform};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Randomly changes brightness, contrast and saturation.
///
/// Each factor is drawn from `[max(0, 1 - v), 1 + v]` and the three
/// adjustments run in a random order.
#[derive(Debug, Clone)]
pub struct ColorJitter {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
}

#[derive(Debug, Clone, Copy)]
enum Adjustment {
    Brightness,
    Contrast,
    Saturation,
}

impl ColorJitter {
    pub fn new(brightness: f64, contrast: f64, saturation: f64) -> Self {
        Self {
            brightness,
            contrast,
            saturation,
        }
    }

    fn factor(rng: &mut StdRng, v: f64) -> f64 {
        uniform(rng, (1.0 - v).max(0.0), 1.0 + v)
    }
}

impl Transform for ColorJitter {
    fn apply(&self, mut image: RgbImage, rng: &mut StdRng) -> RgbImage {
        let mut order = [
            Adjustment::Brightness,
            Adjustment::Contrast,
            Adjustment::Saturation,
        ];
        order.shuffle(rng);
        for adjustment in order {
            image = match adjustment {
                Adjustment::Brightness => {
                    adjust_brightness(image, Self::factor(rng, self.brightness))
                }
                Adjustment::Contrast => adjust_contrast(image, Self::factor(rng, self.contrast)),
                Adjustment::Saturation => {
                    adjust_saturation(image, Self::factor(rng, self.saturation))
                }
            };
        }
        image
    }
}

fn grey(p: &[u8]) -> f64 {
    0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64
}

fn blend(value: u8, target: f64, factor: f64) -> u8 {
    (factor * value as f64 + (1.0 - factor) * target)
        .round()
        .clamp(0.0, 255.0) as u8
}

pub fn adjust_brightness(mut image: RgbImage, factor: f64) -> RgbImage {
    for pixel in image.pixels_mut() {
        for c in pixel.0.iter_mut() {
            *c = blend(*c, 0.0, factor);
        }
    }
    image
}

/// Blends with the mean grey level of the whole image.
pub fn adjust_contrast(mut image: RgbImage, factor: f64) -> RgbImage {
    let count = (image.width() * image.height()).max(1) as f64;
    let mean = image.pixels().map(|p| grey(&p.0)).sum::<f64>() / count;
    for pixel in image.pixels_mut() {
        for c in pixel.0.iter_mut() {
            *c = blend(*c, mean, factor);
        }
    }
    image
}

/// Blends each pixel with its own grey level.
pub fn adjust_saturation(mut image: RgbImage, factor: f64) -> RgbImage {
    for pixel in image.pixels_mut() {
        let g = grey(&pixel.0);
        for c in pixel.0.iter_mut() {
            *c = blend(*c, g, factor);
        }
    }
    image
}
