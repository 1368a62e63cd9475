use thiserror::Error;

/// Error type for the dataset, artifacts and inference layers.
#[derive(Error, Debug)]
pub enum CifarError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    /// Failure while saving or loading a burn record (model or optimizer).
    #[error("recorder: `{0}`")]
    Recorder(String),

    #[error("no saved model in {0:?}")]
    MissingModel(std::path::PathBuf),

    /// Failure while saving or loading a burn config file.
    #[error("config: `{0}`")]
    Config(String),

    /// A CIFAR-10 batch file whose length isn't a whole number of records.
    #[error("invalid batch file of {len} bytes")]
    InvalidBatchFile { len: usize },

    /// An item whose image isn't `3 * 32 * 32` planar bytes.
    #[error("invalid image of {len} bytes")]
    InvalidImage { len: usize },

    #[error("invalid label: {0}")]
    InvalidLabel(u8),

    /// Tensor data couldn't be read back into host memory.
    #[error("tensor data: `{0}`")]
    TensorData(String),

    #[error("unknown class: `{0}`")]
    UnknownClass(String),
}

pub type Result<T> = std::result::Result<T, CifarError>;
