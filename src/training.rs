use crate::augment::AugmentationConfig;
use crate::data::{CifarBatch, CifarBatcher, CifarItem};
use crate::error;
use crate::history::TrainingHistory;
use crate::model::{CifarNet, CifarNetConfig};
use burn::prelude::*;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::backend::AutodiffBackend,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = "CifarNetConfig::new()")]
    pub model: CifarNetConfig,
    pub optimizer: AdamConfig,
    #[config(default = "AugmentationConfig::new()")]
    pub augmentation: AugmentationConfig,
    #[config(default = 15)]
    pub num_epochs: usize,
    #[config(default = 200)]
    pub batch_size: usize,
    #[config(default = 2)]
    pub num_workers: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 42)]
    pub seed: u64,
    /// Caps the batches per training epoch, for quick runs.
    #[config(default = "None")]
    pub max_train_batches: Option<usize>,
    #[config(default = "None")]
    pub max_valid_batches: Option<usize>,
}

/// Averaged metrics of one pass over a dataloader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub loss: f64,
    /// Fraction of correct predictions, in between 0.0 and 1.0.
    pub accuracy: f64,
}

/// Accumulates batch metrics over an epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    loss_sum: f64,
    correct: usize,
    items: usize,
    batches: usize,
}

impl RunningStats {
    pub fn update(&mut self, loss: f64, correct: usize, items: usize) {
        self.loss_sum += loss;
        self.correct += correct;
        self.items += items;
        self.batches += 1;
    }

    /// Mean of the per-batch losses.
    pub fn loss(&self) -> f64 {
        if self.batches == 0 {
            return 0.0;
        }
        self.loss_sum / self.batches as f64
    }

    pub fn accuracy(&self) -> f64 {
        if self.items == 0 {
            return 0.0;
        }
        self.correct as f64 / self.items as f64
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn summary(&self) -> EpochSummary {
        EpochSummary {
            loss: self.loss(),
            accuracy: self.accuracy(),
        }
    }
}

/// Number of rows whose highest logit is at the target class.
///
/// # Shapes
///   - logits [batch_size, num_classes]
///   - targets [batch_size]
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let [batch_size, _num_classes] = logits.dims();
    let predicted = logits.argmax(1).reshape([batch_size]);
    predicted
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

type Dataloader<B> = Arc<dyn DataLoader<B, CifarBatch<B>> + 'static>;

/// Trains `model` for `config.num_epochs`, validating after each epoch.
///
/// `on_epoch_end` runs after each validation, with the epoch number (1-based),
/// the current model and optimizer, and the history so far. Its first error
/// stops the training and is returned.
pub fn train<AutoB, O>(
    config: &TrainingConfig,
    model: CifarNet<AutoB>,
    optim: &mut O,
    dataset_train: impl Dataset<CifarItem> + 'static,
    dataset_valid: impl Dataset<CifarItem> + 'static,
    device: &AutoB::Device,
    mut on_epoch_end: impl FnMut(usize, &CifarNet<AutoB>, &O, &TrainingHistory) -> error::Result<()>,
) -> error::Result<(CifarNet<AutoB>, TrainingHistory)>
where
    AutoB: AutodiffBackend,
    O: Optimizer<CifarNet<AutoB>, AutoB>,
{
    AutoB::seed(device, config.seed);

    let dataloader_train: Dataloader<AutoB> =
        DataLoaderBuilder::new(CifarBatcher::train(&config.augmentation, config.seed))
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers)
            .build(dataset_train);
    let dataloader_valid: Dataloader<AutoB::InnerBackend> =
        DataLoaderBuilder::new(CifarBatcher::eval())
            .batch_size(config.batch_size)
            .num_workers(config.num_workers)
            .build(dataset_valid);

    info!(
        "training on {} items, validating on {} items",
        dataloader_train.num_items(),
        dataloader_valid.num_items()
    );

    let mut model = model;
    let mut history = TrainingHistory::default();
    for epoch in 1..config.num_epochs + 1 {
        let (trained, train_stats) = epoch_train(
            Arc::clone(&dataloader_train),
            model,
            optim,
            config,
            epoch,
        );
        model = trained;
        let train_summary = train_stats.summary();

        let valid_summary = epoch_valid(
            Arc::clone(&dataloader_valid),
            &model.valid(),
            config.max_valid_batches,
        )
        .summary();

        info!("epoch: {epoch}");
        info!(
            "training loss: {:.4}, acc {:.4}",
            train_summary.loss, train_summary.accuracy
        );
        info!(
            "validation loss: {:.4}, validation acc {:.4}",
            valid_summary.loss, valid_summary.accuracy
        );

        history.push(train_summary, valid_summary);
        on_epoch_end(epoch, &model, optim, &history)?;
    }
    info!("Training finished.");

    Ok((model, history))
}

pub fn epoch_train<AutoB, O>(
    dataloader: Dataloader<AutoB>,
    mut model: CifarNet<AutoB>,
    optim: &mut O,
    config: &TrainingConfig,
    epoch: usize,
) -> (CifarNet<AutoB>, RunningStats)
where
    AutoB: AutodiffBackend,
    O: Optimizer<CifarNet<AutoB>, AutoB>,
{
    let limit = config.max_train_batches.unwrap_or(usize::MAX);
    let num_batches = dataloader.num_items().div_ceil(config.batch_size.max(1));
    let mut stats = RunningStats::default();

    for (b, batch) in dataloader.iter().enumerate().take(limit) {
        let [batch_size] = batch.targets.dims();
        let output = model.forward_classification(batch.images, batch.targets);

        let loss = output.loss.clone().into_scalar().elem::<f64>();
        let correct = count_correct(output.output.clone(), output.targets.clone());
        stats.update(loss, correct, batch_size);

        let grads = output.loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(config.learning_rate, model, grads);

        debug!(
            "Epoch {epoch}/{}, Batch {:0>4}/{num_batches}, Loss {loss:.4}, Acc {:.4}",
            config.num_epochs,
            b + 1,
            stats.accuracy(),
        );
    }

    (model, stats)
}

pub fn epoch_valid<B: Backend>(
    dataloader: Dataloader<B>,
    model: &CifarNet<B>,
    limit: Option<usize>,
) -> RunningStats {
    let mut stats = RunningStats::default();

    for batch in dataloader.iter().take(limit.unwrap_or(usize::MAX)) {
        let [batch_size] = batch.targets.dims();
        let output = model.forward_classification(batch.images, batch.targets);
        let loss = output.loss.into_scalar().elem::<f64>();
        let correct = count_correct(output.output, output.targets);
        stats.update(loss, correct, batch_size);
    }

    stats
}
