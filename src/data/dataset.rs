use crate::data::class::NUM_CLASSES;
use crate::error::{CifarError, Result};
use burn::data::dataset::{Dataset, InMemDataset};
use burn_dataset::network::downloader::download_file_as_bytes;
use flate2::read::GzDecoder;
use image::{Rgb, RgbImage};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tar::Archive;

// binary version, as distributed by the dataset authors
const URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";
const ARCHIVE_NAME: &str = "cifar-10-binary.tar.gz";
const BATCHES_DIR: &str = "cifar-10-batches-bin";
const STAGING_DIR: &str = "cifar-10-batches-bin.partial";
const TRAIN_BATCHES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_BATCHES: [&str; 1] = ["test_batch.bin"];

pub const WIDTH: usize = 32;
pub const HEIGHT: usize = 32;
pub const CHANNELS: usize = 3;
pub const IMAGE_BYTES: usize = CHANNELS * HEIGHT * WIDTH;
/// One label byte followed by the planar image.
pub const RECORD_BYTES: usize = 1 + IMAGE_BYTES;

/// Only one thread downloads and unpacks the archive at a time.
static DOWNLOAD_LOCK: Mutex<()> = Mutex::new(());

/// CIFAR-10 item.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CifarItem {
    /// Planar image bytes: the red plane, then green, then blue.
    /// Each plane is row-major.
    ///
    /// # Shape
    /// [CHANNELS, HEIGHT, WIDTH]
    pub image: Vec<u8>,

    /// Label of the image, in between 0 and 9.
    pub label: u8,
}

impl CifarItem {
    /// Checks the image length and the label range.
    pub fn validate(&self) -> Result<()> {
        if self.image.len() != IMAGE_BYTES {
            return Err(CifarError::InvalidImage {
                len: self.image.len(),
            });
        }
        if self.label as usize >= NUM_CLASSES {
            return Err(CifarError::InvalidLabel(self.label));
        }
        Ok(())
    }

    /// Interleaves the planar bytes into an RGB image.
    pub fn to_rgb_image(&self) -> RgbImage {
        debug_assert_eq!(self.image.len(), IMAGE_BYTES);
        let plane = HEIGHT * WIDTH;
        RgbImage::from_fn(WIDTH as u32, HEIGHT as u32, |x, y| {
            let i = y as usize * WIDTH + x as usize;
            Rgb([
                self.image[i],
                self.image[plane + i],
                self.image[2 * plane + i],
            ])
        })
    }

    /// Builds an item from a 32x32 RGB image.
    pub fn from_rgb_image(image: &RgbImage, label: u8) -> Self {
        debug_assert_eq!(image.dimensions(), (WIDTH as u32, HEIGHT as u32));
        let mut planar = vec![0u8; IMAGE_BYTES];
        let plane = HEIGHT * WIDTH;
        for (x, y, pixel) in image.enumerate_pixels() {
            let i = y as usize * WIDTH + x as usize;
            for c in 0..CHANNELS {
                planar[c * plane + i] = pixel[c];
            }
        }
        Self {
            image: planar,
            label,
        }
    }
}

/// Splits the content of a binary batch file into items.
pub fn parse_batch(bytes: &[u8]) -> Result<Vec<CifarItem>> {
    if bytes.len() % RECORD_BYTES != 0 {
        return Err(CifarError::InvalidBatchFile { len: bytes.len() });
    }
    bytes
        .chunks_exact(RECORD_BYTES)
        .map(|record| {
            let label = record[0];
            if label as usize >= NUM_CLASSES {
                return Err(CifarError::InvalidLabel(label));
            }
            Ok(CifarItem {
                image: record[1..].to_vec(),
                label,
            })
        })
        .collect()
}

/// The CIFAR-10 dataset consists of 60,000 32x32 colour images in 10 classes, with 6,000
/// images per class. There are 50,000 training images and 10,000 test images.
///
/// The binary archive is downloaded once into the root directory.
pub struct CifarDataset {
    dataset: InMemDataset<CifarItem>,
}

impl Dataset<CifarItem> for CifarDataset {
    fn get(&self, index: usize) -> Option<CifarItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl CifarDataset {
    /// Creates the train split (5 batch files).
    pub fn train(root: &Path) -> Result<Self> {
        Self::new(root, &TRAIN_BATCHES)
    }

    /// Creates the test split, used for validation.
    pub fn test(root: &Path) -> Result<Self> {
        Self::new(root, &TEST_BATCHES)
    }

    /// Fails on the first item with a wrong image size or label.
    pub fn from_items(items: Vec<CifarItem>) -> Result<Self> {
        for item in &items {
            item.validate()?;
        }
        Ok(Self {
            dataset: InMemDataset::new(items),
        })
    }

    /// Dataset files are stored in the burn-dataset cache directory.
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".cache")
            .join("burn-dataset")
            .join("cifar10")
    }

    fn new(root: &Path, batch_files: &[&str]) -> Result<Self> {
        let batches_dir = Self::download(root, batch_files)?;

        // Train images (u8): 3 * 32 * 32 * 50000 = 153.6Mb
        let mut items = Vec::new();
        for name in batch_files {
            let bytes = std::fs::read(batches_dir.join(name))?;
            items.extend(parse_batch(&bytes)?);
        }
        info!("loaded {} items from {batches_dir:?}", items.len());

        Self::from_items(items)
    }

    /// Downloads and unpacks the archive unless every requested batch file is
    /// present. The archive is unpacked into a staging directory which only
    /// replaces the batch directory once complete.
    fn download(root: &Path, batch_files: &[&str]) -> Result<PathBuf> {
        let _lock = DOWNLOAD_LOCK.lock().unwrap_or_else(|err| err.into_inner());

        let batches_dir = root.join(BATCHES_DIR);
        let missing = missing_batches(&batches_dir, batch_files);
        if missing.is_empty() {
            return Ok(batches_dir);
        }
        info!("missing {missing:?} in {batches_dir:?}");

        let staging = root.join(STAGING_DIR);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;

        info!("downloading {URL} into {root:?}");
        let bytes = download_file_as_bytes(URL, ARCHIVE_NAME);

        // Decode gzip file content and unpack archive
        let gz_buffer = GzDecoder::new(&bytes[..]);
        let mut archive = Archive::new(gz_buffer);
        archive.unpack(&staging)?;

        let unpacked = staging.join(BATCHES_DIR);
        let missing = missing_batches(&unpacked, batch_files);
        if !missing.is_empty() {
            return Err(CifarError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("archive lacks {missing:?}"),
            )));
        }
        if batches_dir.exists() {
            std::fs::remove_dir_all(&batches_dir)?;
        }
        std::fs::rename(&unpacked, &batches_dir)?;
        std::fs::remove_dir_all(&staging)?;

        Ok(batches_dir)
    }
}

/// Batch files absent from `dir`.
fn missing_batches<'a>(dir: &Path, batch_files: &[&'a str]) -> Vec<&'a str> {
    batch_files
        .iter()
        .copied()
        .filter(|name| !dir.join(name).is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: u8, fill: u8) -> Vec<u8> {
        let mut bytes = vec![label];
        bytes.extend(std::iter::repeat_n(fill, IMAGE_BYTES));
        bytes
    }

    #[test]
    fn parses_records() {
        let mut bytes = record(3, 7);
        bytes.extend(record(9, 200));
        let items = parse_batch(&bytes).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, 3);
        assert_eq!(items[1].label, 9);
        assert!(items[1].image.iter().all(|&b| b == 200));
        assert_eq!(items[0].image.len(), IMAGE_BYTES);
    }

    #[test]
    fn rejects_truncated_files() {
        let mut bytes = record(0, 0);
        bytes.pop();
        assert!(matches!(
            parse_batch(&bytes),
            Err(CifarError::InvalidBatchFile { len }) if len == RECORD_BYTES - 1
        ));
    }

    #[test]
    fn rejects_bad_labels() {
        assert!(matches!(
            parse_batch(&record(10, 0)),
            Err(CifarError::InvalidLabel(10))
        ));
    }

    #[test]
    fn planes_become_channels() {
        let plane = HEIGHT * WIDTH;
        let mut image = vec![0u8; IMAGE_BYTES];
        // pixel (x=1, y=2)
        let i = 2 * WIDTH + 1;
        image[i] = 10;
        image[plane + i] = 20;
        image[2 * plane + i] = 30;
        let item = CifarItem { image, label: 4 };

        let rgb = item.to_rgb_image();
        assert_eq!(rgb.get_pixel(1, 2), &Rgb([10, 20, 30]));
        assert_eq!(rgb.get_pixel(2, 1), &Rgb([0, 0, 0]));
        assert_eq!(CifarItem::from_rgb_image(&rgb, 4), item);
    }

    #[test]
    fn empty_batch_directory_is_incomplete() {
        let root = temp_dir::TempDir::new().unwrap();
        let dir = root.path().join(BATCHES_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(missing_batches(&dir, &TRAIN_BATCHES), TRAIN_BATCHES.to_vec());
        assert_eq!(missing_batches(&dir, &TEST_BATCHES), TEST_BATCHES.to_vec());

        std::fs::write(dir.join("test_batch.bin"), record(0, 0)).unwrap();
        std::fs::write(dir.join("data_batch_1.bin"), record(0, 0)).unwrap();
        assert!(missing_batches(&dir, &TEST_BATCHES).is_empty());
        assert_eq!(missing_batches(&dir, &TRAIN_BATCHES).len(), 4);
    }

    #[test]
    fn rejects_malformed_items() {
        let short = CifarItem {
            image: vec![0; IMAGE_BYTES - 1],
            label: 0,
        };
        assert!(matches!(
            CifarDataset::from_items(vec![short]),
            Err(CifarError::InvalidImage { len }) if len == IMAGE_BYTES - 1
        ));

        let mislabelled = CifarItem {
            image: vec![0; IMAGE_BYTES],
            label: 12,
        };
        assert!(matches!(
            CifarDataset::from_items(vec![mislabelled]),
            Err(CifarError::InvalidLabel(12))
        ));
    }

    #[test]
    fn reads_split_from_unpacked_directory() {
        let root = temp_dir::TempDir::new().unwrap();
        let dir = root.path().join(BATCHES_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        let mut bytes = record(1, 1);
        bytes.extend(record(2, 2));
        bytes.extend(record(5, 3));
        std::fs::write(dir.join("test_batch.bin"), bytes).unwrap();

        let dataset = CifarDataset::test(root.path()).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.get(2).unwrap().label, 5);
        assert!(dataset.get(3).is_none());
    }
}
