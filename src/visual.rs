//! Converting normalized tensors back to images and tiling them into grids.

use crate::data::batcher::denormalize;
use crate::data::dataset::CHANNELS;
use crate::error::{CifarError, Result};
use burn::prelude::*;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::path::Path;

pub const GREEN: Rgb<u8> = Rgb([0, 160, 0]);
pub const RED: Rgb<u8> = Rgb([200, 0, 0]);

const FRAME: u32 = 2;
const GAP: u32 = 4;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Denormalizes a `[CHANNELS, height, width]` tensor into a displayable image.
pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 3>) -> Result<RgbImage> {
    let [channels, height, width] = tensor.dims();
    if channels != CHANNELS {
        return Err(CifarError::TensorData(format!(
            "expected {CHANNELS} channels, got {channels}"
        )));
    }
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| CifarError::TensorData(format!("{err:?}")))?;

    let plane = height * width;
    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let i = y as usize * width + x as usize;
        Rgb([
            denormalize(values[i]),
            denormalize(values[plane + i]),
            denormalize(values[2 * plane + i]),
        ])
    }))
}

/// Every image of a `[batch_size, CHANNELS, height, width]` tensor.
pub fn batch_to_images<B: Backend>(images: Tensor<B, 4>, limit: usize) -> Result<Vec<RgbImage>> {
    let [batch_size, channels, height, width] = images.dims();
    (0..batch_size.min(limit))
        .map(|i| {
            let image = images
                .clone()
                .narrow(0, i, 1)
                .reshape([channels, height, width]);
            tensor_to_image(image)
        })
        .collect()
}

/// Images laid out in rows, each optionally framed with a colour.
pub struct ImageGrid {
    tiles: Vec<(RgbImage, Option<Rgb<u8>>)>,
    columns: u32,
    scale: u32,
}

impl Default for ImageGrid {
    /// Ten columns, tiles upscaled 3x.
    fn default() -> Self {
        Self::new(10, 3)
    }
}

impl ImageGrid {
    pub fn new(columns: u32, scale: u32) -> Self {
        Self {
            tiles: Vec::new(),
            columns: columns.max(1),
            scale: scale.max(1),
        }
    }

    pub fn push(&mut self, image: RgbImage, frame: Option<Rgb<u8>>) {
        self.tiles.push((image, frame));
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    fn cell(&self) -> (u32, u32) {
        let (width, height) = self
            .tiles
            .iter()
            .map(|(image, _)| image.dimensions())
            .fold((0, 0), |(w, h), (iw, ih)| (w.max(iw), h.max(ih)));
        (
            width * self.scale + 2 * FRAME + GAP,
            height * self.scale + 2 * FRAME + GAP,
        )
    }

    pub fn render(&self) -> RgbImage {
        let (cell_w, cell_h) = self.cell();
        let count = self.tiles.len() as u32;
        let columns = self.columns.min(count.max(1));
        let rows = count.div_ceil(columns);
        let mut canvas = RgbImage::from_pixel(columns * cell_w, rows * cell_h, BACKGROUND);

        for (i, (image, frame)) in self.tiles.iter().enumerate() {
            let (col, row) = (i as u32 % columns, i as u32 / columns);
            let (x, y) = (col * cell_w, row * cell_h);
            let (w, h) = (image.width() * self.scale, image.height() * self.scale);
            if let Some(colour) = frame {
                let border = RgbImage::from_pixel(w + 2 * FRAME, h + 2 * FRAME, *colour);
                imageops::replace(&mut canvas, &border, x as i64, y as i64);
            }
            let tile = imageops::resize(image, w, h, FilterType::Nearest);
            imageops::replace(&mut canvas, &tile, (x + FRAME) as i64, (y + FRAME) as i64);
        }
        canvas
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.render().save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::image_to_tensor;

    type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn tensor_round_trips_to_image() {
        let device = Default::default();
        let image = RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8 * 60, y as u8 * 90, 255]));
        let tensor = image_to_tensor::<TestBackend>(&image, &device);
        assert_eq!(tensor.dims(), [3, 3, 4]);
        assert_eq!(tensor_to_image(tensor).unwrap(), image);
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 3>::zeros([1, 4, 4], &device);
        assert!(matches!(tensor_to_image(tensor), Err(CifarError::TensorData(_))));
    }

    #[test]
    fn batch_images_are_limited() {
        let device = Default::default();
        let images = Tensor::<TestBackend, 4>::zeros([5, 3, 8, 8], &device);
        let images = batch_to_images(images, 3).unwrap();
        assert_eq!(images.len(), 3);
        // zero is the normalized mid-grey
        assert_eq!(images[0].get_pixel(0, 0), &Rgb([128, 128, 128]));
    }

    #[test]
    fn grid_layout_and_frames() {
        let mut grid = ImageGrid::new(2, 1);
        for i in 0..3 {
            let frame = if i == 0 { Some(GREEN) } else { Some(RED) };
            grid.push(RgbImage::from_pixel(4, 4, Rgb([10, 10, 10])), frame);
        }
        let canvas = grid.render();
        let cell = 4 + 2 * FRAME + GAP;
        assert_eq!(canvas.dimensions(), (2 * cell, 2 * cell));
        assert_eq!(canvas.get_pixel(0, 0), &GREEN);
        assert_eq!(canvas.get_pixel(cell, 0), &RED);
        assert_eq!(canvas.get_pixel(FRAME, FRAME), &Rgb([10, 10, 10]));
        // the empty fourth cell
        assert_eq!(canvas.get_pixel(cell + FRAME, cell + FRAME), &BACKGROUND);
    }

    #[test]
    fn saves_png() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = dir.path().join("grids").join("samples.png");
        let mut grid = ImageGrid::default();
        grid.push(RgbImage::new(32, 32), None);
        grid.save(&path).unwrap();
        let saved = image::open(&path).unwrap();
        assert_eq!(saved.width(), 32 * 3 + 2 * FRAME + GAP);
    }
}
