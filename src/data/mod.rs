pub mod batcher;
pub mod class;
pub mod dataset;

pub use batcher::{CifarBatch, CifarBatcher};
pub use class::{CLASSES, CifarClass, NUM_CLASSES};
pub use dataset::{CifarDataset, CifarItem, HEIGHT, WIDTH};
