pub mod artifacts;
pub mod augment;
pub mod data;
pub mod error;
pub mod history;
pub mod inference;
pub mod model;
pub mod optim;
pub mod training;
pub mod visual;

pub mod prelude {
    pub use crate::artifacts::Artifacts;
    pub use crate::augment::{AugmentationConfig, Pipeline, Transform};
    pub use crate::data::{CifarBatch, CifarBatcher, CifarClass, CifarDataset, CifarItem};
    pub use crate::error::CifarError;
    pub use crate::history::TrainingHistory;
    pub use crate::inference::{Prediction, predict_batch, predict_image};
    pub use crate::model::{CifarNet, CifarNetConfig};
    pub use crate::training::{TrainingConfig, train};
    pub use crate::visual::ImageGrid;
}
