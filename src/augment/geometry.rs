use super::{Transform, uniform};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp};
use rand::Rng;
use rand::rngs::StdRng;

/// Fill colour for pixels mapped from outside the source image.
const FILL: Rgb<u8> = Rgb([0, 0, 0]);

/// Bilinear resize to a fixed size.
#[derive(Debug, Clone)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl Resize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Transform for Resize {
    fn apply(&self, image: RgbImage, _rng: &mut StdRng) -> RgbImage {
        if image.dimensions() == (self.width, self.height) {
            return image;
        }
        imageops::resize(&image, self.width, self.height, FilterType::Triangle)
    }
}

#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    pub probability: f64,
}

impl RandomHorizontalFlip {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }
}

impl Transform for RandomHorizontalFlip {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage {
        if rng.gen_bool(self.probability.clamp(0.0, 1.0)) {
            imageops::flip_horizontal(&image)
        } else {
            image
        }
    }
}

/// Rotation by an angle drawn from `[-degrees, degrees]`.
#[derive(Debug, Clone)]
pub struct RandomRotation {
    pub degrees: f64,
}

impl RandomRotation {
    pub fn new(degrees: f64) -> Self {
        Self { degrees }
    }
}

impl Transform for RandomRotation {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage {
        let angle = uniform(rng, -self.degrees, self.degrees);
        transform(&image, angle, 0.0, 1.0)
    }
}

/// Rotation, horizontal shear and isotropic scale about the image centre.
#[derive(Debug, Clone)]
pub struct RandomAffine {
    pub degrees: f64,
    pub shear: f64,
    pub scale: (f64, f64),
}

impl RandomAffine {
    pub fn new(degrees: f64, shear: f64, scale: (f64, f64)) -> Self {
        Self {
            degrees,
            shear,
            scale,
        }
    }
}

impl Transform for RandomAffine {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage {
        let angle = uniform(rng, -self.degrees, self.degrees);
        let shear = uniform(rng, -self.shear, self.shear);
        let scale = uniform(rng, self.scale.0, self.scale.1);
        transform(&image, angle, shear, scale)
    }
}

/// Projection that shears horizontally by `shear`, rotates by `angle`
/// (degrees, counter-clockwise on screen) and scales by `scale`, all about the
/// image centre. `None` if it collapses the image.
pub fn projection(
    width: u32,
    height: u32,
    angle: f64,
    shear: f64,
    scale: f64,
) -> Option<Projection> {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let shear = shear.to_radians().tan() as f32;
    let shear = Projection::from_matrix([1.0, shear, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])?;
    // imageproc rotates clockwise for positive angles
    let rotation = Projection::rotate(-angle.to_radians() as f32);
    let scale = scale as f32;
    if scale <= 0.0 {
        return None;
    }
    Some(
        Projection::translate(cx, cy)
            * Projection::scale(scale, scale)
            * rotation
            * shear
            * Projection::translate(-cx, -cy),
    )
}

/// Warps the image with bilinear sampling, filling uncovered pixels black.
pub fn transform(image: &RgbImage, angle: f64, shear: f64, scale: f64) -> RgbImage {
    if angle == 0.0 && shear == 0.0 && scale == 1.0 {
        return image.clone();
    }
    match projection(image.width(), image.height(), angle, shear, scale) {
        Some(projection) => warp(image, &projection, Interpolation::Bilinear, FILL),
        None => RgbImage::from_pixel(image.width(), image.height(), FILL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::tests::gradient;
    use rand::SeedableRng;

    #[test]
    fn resize_changes_dimensions() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = Resize::new(32, 32).apply(gradient(64, 16), &mut rng);
        assert_eq!(out.dimensions(), (32, 32));
    }

    #[test]
    fn flip_mirrors_columns() {
        let mut rng = StdRng::seed_from_u64(0);
        let image = gradient(32, 32);
        let flipped = RandomHorizontalFlip::new(1.0).apply(image.clone(), &mut rng);
        assert_eq!(flipped.get_pixel(0, 5), image.get_pixel(31, 5));
        assert_eq!(flipped.get_pixel(10, 0), image.get_pixel(21, 0));

        let kept = RandomHorizontalFlip::new(0.0).apply(image.clone(), &mut rng);
        assert_eq!(kept, image);
    }

    #[test]
    fn zero_ranges_are_identity() {
        let mut rng = StdRng::seed_from_u64(3);
        let image = gradient(32, 32);
        assert_eq!(RandomRotation::new(0.0).apply(image.clone(), &mut rng), image);
        let affine = RandomAffine::new(0.0, 0.0, (1.0, 1.0));
        assert_eq!(affine.apply(image.clone(), &mut rng), image);
    }

    #[test]
    fn random_rotation_changes_the_image() {
        let mut rng = StdRng::seed_from_u64(5);
        let image = gradient(32, 32);
        let rotated = RandomRotation::new(30.0).apply(image.clone(), &mut rng);
        assert_eq!(rotated.dimensions(), image.dimensions());
        assert_ne!(rotated, image);
    }

    #[test]
    fn quarter_turn_moves_pixels() {
        let red = Rgb([255, 0, 0]);
        let mut image = RgbImage::new(11, 11);
        for x in 7..=9 {
            for y in 4..=6 {
                image.put_pixel(x, y, red);
            }
        }
        let rotated = transform(&image, 90.0, 0.0, 1.0);
        // right of centre goes to the top
        assert_eq!(rotated.get_pixel(5, 3), &red);
        assert_eq!(rotated.get_pixel(8, 5), &FILL);
    }

    #[test]
    fn shear_moves_rows_sideways() {
        let white = Rgb([255, 255, 255]);
        let mut image = RgbImage::new(11, 11);
        for x in 4..=6 {
            for y in 0..11 {
                image.put_pixel(x, y, white);
            }
        }
        let sheared = transform(&image, 0.0, 45.0, 1.0);
        // the centre row stays, rows below shift right by their distance to it
        assert_eq!(sheared.get_pixel(5, 5), &white);
        assert_eq!(sheared.get_pixel(9, 9), &white);
        assert_eq!(sheared.get_pixel(5, 9), &FILL);

        let mut rng = StdRng::seed_from_u64(2);
        let affine = RandomAffine::new(0.0, 45.0, (1.0, 1.0));
        assert_ne!(affine.apply(image.clone(), &mut rng), image);
    }

    #[test]
    fn shrinking_fills_borders_black() {
        let image = RgbImage::from_pixel(8, 8, Rgb([200, 200, 200]));
        let out = transform(&image, 0.0, 0.0, 0.5);
        assert_eq!(out.get_pixel(0, 0), &FILL);
        assert_eq!(out.get_pixel(4, 4), &Rgb([200, 200, 200]));
    }

    #[test]
    fn degenerate_scale_is_blank() {
        assert!(projection(8, 8, 0.0, 0.0, 0.0).is_none());
        let image = RgbImage::from_pixel(8, 8, Rgb([200, 200, 200]));
        assert_eq!(transform(&image, 0.0, 0.0, 0.0), RgbImage::new(8, 8));
    }
}
