use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::optim::AdamConfig;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_cifar::artifacts::{self, Artifacts, HISTORY_NAME};
use burn_cifar::data::{CifarBatch, CifarBatcher, CifarClass, CifarDataset, CifarItem};
use burn_cifar::error::CifarError;
use burn_cifar::inference::{self, predict_batch, predict_image};
use burn_cifar::model::CifarNet;
use burn_cifar::training::{TrainingConfig, train};
use burn_cifar::visual::{self, GREEN, ImageGrid, RED};
use log::info;
use std::error::Error;
use std::sync::Arc;

#[path = "../common/mod.rs"]
pub mod common;

use common::backend::{MainAutoBackend, MainBackend, MainDevice};
use common::cli::AppArgs;

/// Tiles shown in the sample and prediction grids.
const GRID_LEN: usize = 20;

pub fn launch<B, AutoB>(args: AppArgs) -> Result<(), Box<dyn Error>>
where
    B: Backend + MainDevice,
    AutoB: AutodiffBackend + MainDevice,
{
    let artifacts = Artifacts::new(&args.artifacts_path)?;

    let config = match &args.training_config {
        Some(path) => artifacts::load_training_config(path)?,
        None => artifacts
            .load_training_config()?
            .unwrap_or_else(|| TrainingConfig::new(AdamConfig::new())),
    };
    artifacts.save_training_config(&config)?;

    if !args.training && !args.inference {
        info!("nothing to run, see --help");
        return Ok(());
    }

    let data_path = args
        .data_path
        .clone()
        .unwrap_or_else(CifarDataset::default_root);
    let dataset_valid = Arc::new(CifarDataset::test(&data_path)?);

    if args.training {
        if args.remove_artifacts {
            artifacts.remove_checkpoints::<AutoB>()?;
        }
        let dataset_train = CifarDataset::train(&data_path)?;

        // a look at what the network is trained on
        let samples: Vec<CifarItem> = dataset_train.iter().take(GRID_LEN).collect();
        let names: Vec<String> = samples
            .iter()
            .map(|item| match CifarClass::from_label(item.label) {
                Some(class) => class.to_string(),
                None => item.label.to_string(),
            })
            .collect();
        info!("samples: {}", names.join(" "));
        let batch: CifarBatch<B> = CifarBatcher::train(&config.augmentation, config.seed)
            .batch(samples, &B::main_device());
        let mut grid = ImageGrid::default();
        for image in visual::batch_to_images(batch.images, GRID_LEN)? {
            grid.push(image, None);
        }
        grid.save(&artifacts.path("samples.png"))?;

        let device = AutoB::main_device();
        let model = artifacts.load_or_init_model::<AutoB>(&config.model, &device)?;
        let mut optim = artifacts
            .load_or_init_optim::<AutoB, CifarNet<AutoB>, _>(&config.optimizer, &device)?;

        let (_model, history) = train(
            &config,
            model,
            &mut optim,
            dataset_train,
            Arc::clone(&dataset_valid),
            &device,
            |_epoch, model, optim, _history| {
                artifacts.save_model(model)?;
                artifacts.save_optim(optim)
            },
        )?;

        history.save_csv(&artifacts.path(HISTORY_NAME))?;
        history.plot_accuracy();
        history.plot_loss();
    }

    if args.inference {
        let device = B::main_device();
        let model: CifarNet<B> = artifacts
            .load_model(&config.model, &device)?
            .ok_or_else(|| CifarError::MissingModel(artifacts.dir().to_path_buf()))?;

        let items: Vec<CifarItem> = dataset_valid.iter().take(config.batch_size).collect();
        let batch: CifarBatch<B> = CifarBatcher::eval().batch(items, &device);
        let images = visual::batch_to_images(batch.images.clone(), GRID_LEN)?;
        let predictions = predict_batch(&model, batch)?;

        let correct = predictions
            .iter()
            .filter(|(prediction, expected)| prediction.class == *expected)
            .count();
        info!(
            "validation batch: {correct}/{} correct",
            predictions.len()
        );

        let mut grid = ImageGrid::default();
        for (image, (prediction, expected)) in images.into_iter().zip(&predictions) {
            info!("{} ({}) {:.2}", prediction.class, expected, prediction.confidence);
            let frame = if prediction.class == *expected { GREEN } else { RED };
            grid.push(image, Some(frame));
        }
        grid.save(&artifacts.path("predictions.png"))?;

        let image = match &args.image {
            Some(path) => inference::load_image(path)?,
            None => inference::fetch_image(&args.url)?,
        };
        inference::network_input(&image).save(artifacts.path("input.png"))?;
        let prediction = predict_image(&model, &image, &device)?;
        println!("{} ({:.2})", prediction.class, prediction.confidence);
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = AppArgs::parse()?;
    launch::<MainBackend, MainAutoBackend>(args)
}
