//! Persistence of configs, model weights, optimizer state and outputs in an
//! artifacts directory.

use crate::error::{CifarError, Result};
use crate::model::{CifarNet, CifarNetConfig};
use crate::optim::OptimConfigExt;
use crate::training::TrainingConfig;
use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::record::{CompactRecorder, FileRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use log::info;
use std::path::{Path, PathBuf};

pub type RecorderTy = CompactRecorder;

pub const TRAINING_CONFIG_NAME: &str = "training_config.json";
pub const MODEL_NAME: &str = "model";
pub const OPTIM_NAME: &str = "optim";
pub const HISTORY_NAME: &str = "history.csv";

#[derive(Debug, Clone)]
pub struct Artifacts {
    dir: PathBuf,
}

impl Artifacts {
    /// Creates the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Path of a record, with the recorder extension.
    fn record_path<B: Backend>(&self, name: &str) -> PathBuf {
        let file_ext = <RecorderTy as FileRecorder<B>>::file_extension();
        self.path(name).with_extension(file_ext)
    }

    /// Deletes saved model and optimizer records, if any.
    pub fn remove_checkpoints<B: Backend>(&self) -> Result<()> {
        for name in [MODEL_NAME, OPTIM_NAME] {
            let path = self.record_path::<B>(name);
            if path.exists() {
                info!("removing {path:?}");
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    pub fn save_training_config(&self, config: &TrainingConfig) -> Result<()> {
        let path = self.path(TRAINING_CONFIG_NAME);
        info!("Saving training config into {path:?}");
        config.save(path)?;
        Ok(())
    }

    pub fn load_training_config(&self) -> Result<Option<TrainingConfig>> {
        let path = self.path(TRAINING_CONFIG_NAME);
        if !path.exists() {
            return Ok(None);
        }
        load_training_config(&path).map(Some)
    }

    pub fn save_model<B: Backend>(&self, model: &CifarNet<B>) -> Result<()> {
        let path = self.path(MODEL_NAME);
        info!("Saving model to {:?}", self.record_path::<B>(MODEL_NAME));
        model
            .clone()
            .save_file(path, &RecorderTy::new()) // ext added automatically
            .map_err(|err| CifarError::Recorder(format!("{err:?}")))
    }

    pub fn load_model<B: Backend>(
        &self,
        config: &CifarNetConfig,
        device: &B::Device,
    ) -> Result<Option<CifarNet<B>>> {
        let path_ext = self.record_path::<B>(MODEL_NAME);
        if !path_ext.exists() {
            return Ok(None);
        }
        info!("Loading model from {path_ext:?}");
        let model = config
            .init::<B>(device)
            .load_file(self.path(MODEL_NAME), &RecorderTy::new(), device) // ext added automatically
            .map_err(|err| CifarError::Recorder(format!("{err:?}")))?;
        Ok(Some(model))
    }

    pub fn load_or_init_model<B: Backend>(
        &self,
        config: &CifarNetConfig,
        device: &B::Device,
    ) -> Result<CifarNet<B>> {
        match self.load_model(config, device)? {
            Some(model) => Ok(model),
            None => {
                info!("Initializing new model");
                Ok(config.init(device))
            }
        }
    }

    pub fn save_optim<AutoB, AutoM>(&self, optim: &impl Optimizer<AutoM, AutoB>) -> Result<()>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB>,
    {
        let path = self.path(OPTIM_NAME);
        info!("Saving optim to {:?}", self.record_path::<AutoB>(OPTIM_NAME));
        let record = optim.to_record();
        RecorderTy::new()
            .record(record, path) // ext added automatically
            .map_err(|err| CifarError::Recorder(format!("{err:?}")))
    }

    pub fn load_optim<AutoB, AutoM, OptimConfig>(
        &self,
        optim_config: &OptimConfig,
        device: &AutoB::Device,
    ) -> Result<Option<OptimConfig::Adaptor>>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB>,
        OptimConfig: OptimConfigExt<AutoB, AutoM>,
    {
        let path_ext = self.record_path::<AutoB>(OPTIM_NAME);
        if !path_ext.exists() {
            return Ok(None);
        }
        info!("Loading optim from {path_ext:?}");
        let optim_init = optim_config.init();
        let record = RecorderTy::new()
            .load(self.path(OPTIM_NAME), device) // ext added automatically
            .map_err(|err| CifarError::Recorder(format!("{err:?}")))?;
        Ok(Some(optim_init.load_record(record)))
    }

    pub fn load_or_init_optim<AutoB, AutoM, OptimConfig>(
        &self,
        optim_config: &OptimConfig,
        device: &AutoB::Device,
    ) -> Result<OptimConfig::Adaptor>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB>,
        OptimConfig: OptimConfigExt<AutoB, AutoM>,
    {
        match self.load_optim(optim_config, device)? {
            Some(optim) => Ok(optim),
            None => {
                info!("Initializing new optim");
                Ok(optim_config.init())
            }
        }
    }
}

/// Loads a training config from an explicit file.
pub fn load_training_config(path: &Path) -> Result<TrainingConfig> {
    info!("Loading training config from {path:?}");
    TrainingConfig::load(path).map_err(|err| CifarError::Config(format!("{err:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::optim::AdamConfig;
    use burn::optim::adaptor::OptimizerAdaptor;

    type TestBackend = burn::backend::NdArray<f32>;
    type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

    #[test]
    fn missing_files_load_as_none() {
        let dir = temp_dir::TempDir::new().unwrap();
        let artifacts = Artifacts::new(dir.path().join("run")).unwrap();
        assert!(artifacts.dir().exists());
        assert!(artifacts.load_training_config().unwrap().is_none());

        let device = Default::default();
        let model = artifacts
            .load_model::<TestBackend>(&CifarNetConfig::new(), &device)
            .unwrap();
        assert!(model.is_none());
    }

    #[test]
    fn config_round_trip() {
        let dir = temp_dir::TempDir::new().unwrap();
        let artifacts = Artifacts::new(dir.path()).unwrap();
        let config = TrainingConfig::new(AdamConfig::new())
            .with_num_epochs(3)
            .with_max_train_batches(Some(7));
        artifacts.save_training_config(&config).unwrap();

        let loaded = artifacts.load_training_config().unwrap().unwrap();
        assert_eq!(loaded.num_epochs, 3);
        assert_eq!(loaded.max_train_batches, Some(7));
        assert_eq!(loaded.batch_size, 200);
    }

    #[test]
    fn model_round_trip() {
        let dir = temp_dir::TempDir::new().unwrap();
        let artifacts = Artifacts::new(dir.path()).unwrap();
        let device = Default::default();
        let config = CifarNetConfig::new();
        let model: CifarNet<TestBackend> = config.init(&device);
        artifacts.save_model(&model).unwrap();

        let loaded = artifacts
            .load_model::<TestBackend>(&config, &device)
            .unwrap()
            .unwrap();
        // half precision records
        let diff = (model.fc2.weight.val() - loaded.fc2.weight.val())
            .abs()
            .max()
            .into_scalar();
        assert!(diff < 1e-2);

        artifacts.remove_checkpoints::<TestBackend>().unwrap();
        assert!(
            artifacts
                .load_model::<TestBackend>(&config, &device)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn optim_round_trip() {
        let dir = temp_dir::TempDir::new().unwrap();
        let artifacts = Artifacts::new(dir.path()).unwrap();
        let device = Default::default();
        let optim_config = AdamConfig::new();

        let optim: OptimizerAdaptor<_, CifarNet<TestAutodiffBackend>, TestAutodiffBackend> =
            artifacts
                .load_or_init_optim::<TestAutodiffBackend, CifarNet<TestAutodiffBackend>, _>(
                    &optim_config,
                    &device,
                )
                .unwrap();
        artifacts.save_optim(&optim).unwrap();

        let loaded = artifacts
            .load_optim::<TestAutodiffBackend, CifarNet<TestAutodiffBackend>, _>(
                &optim_config,
                &device,
            )
            .unwrap();
        assert!(loaded.is_some());
    }
}
