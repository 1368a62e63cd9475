use crate::error::Result;
use crate::training::EpochSummary;
use serde::{Deserialize, Serialize};
use std::path::Path;
use textplots::{Chart, Plot, Shape};

const CHART_WIDTH: u32 = 120;
const CHART_HEIGHT: u32 = 40;

/// Per-epoch training and validation metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub train_loss: Vec<f64>,
    pub train_accuracy: Vec<f64>,
    pub valid_loss: Vec<f64>,
    pub valid_accuracy: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryRow {
    epoch: usize,
    train_loss: f64,
    train_accuracy: f64,
    valid_loss: f64,
    valid_accuracy: f64,
}

impl TrainingHistory {
    pub fn push(&mut self, train: EpochSummary, valid: EpochSummary) {
        self.train_loss.push(train.loss);
        self.train_accuracy.push(train.accuracy);
        self.valid_loss.push(valid.loss);
        self.valid_accuracy.push(valid.accuracy);
    }

    /// Number of recorded epochs.
    pub fn len(&self) -> usize {
        self.train_loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train_loss.is_empty()
    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for epoch in 0..self.len() {
            writer.serialize(HistoryRow {
                epoch: epoch + 1,
                train_loss: self.train_loss[epoch],
                train_accuracy: self.train_accuracy[epoch],
                valid_loss: self.valid_loss[epoch],
                valid_accuracy: self.valid_accuracy[epoch],
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut history = Self::default();
        for row in reader.deserialize() {
            let row: HistoryRow = row?;
            history.push(
                EpochSummary {
                    loss: row.train_loss,
                    accuracy: row.train_accuracy,
                },
                EpochSummary {
                    loss: row.valid_loss,
                    accuracy: row.valid_accuracy,
                },
            );
        }
        Ok(history)
    }

    /// Prints the training and validation accuracy curves to stdout.
    pub fn plot_accuracy(&self) {
        println!("training / validation accuracy");
        plot(&self.train_accuracy, &self.valid_accuracy, 0.0, 1.0);
    }

    /// Prints the training and validation loss curves to stdout.
    pub fn plot_loss(&self) {
        println!("training / validation loss");
        let max = self
            .train_loss
            .iter()
            .chain(&self.valid_loss)
            .copied()
            .fold(0.0f64, f64::max);
        plot(&self.train_loss, &self.valid_loss, 0.0, (max * 1.1).max(1e-3) as f32);
    }
}

/// Epochs are numbered from 1 on the x axis.
fn points(values: &[f64]) -> Vec<(f32, f32)> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| ((i + 1) as f32, *v as f32))
        .collect()
}

fn plot(train: &[f64], valid: &[f64], ymin: f32, ymax: f32) {
    let train = points(train);
    let valid = points(valid);
    let xmax = train.len().max(valid.len()).max(2) as f32;
    let train = Shape::Lines(&train);
    let valid = Shape::Lines(&valid);
    Chart::new_with_y_range(CHART_WIDTH, CHART_HEIGHT, 1.0, xmax, ymin, ymax)
        .lineplot(&train)
        .lineplot(&valid)
        .display();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> TrainingHistory {
        let mut history = TrainingHistory::default();
        history.push(
            EpochSummary {
                loss: 1.6,
                accuracy: 0.41,
            },
            EpochSummary {
                loss: 1.3,
                accuracy: 0.52,
            },
        );
        history.push(
            EpochSummary {
                loss: 1.2,
                accuracy: 0.57,
            },
            EpochSummary {
                loss: 1.1,
                accuracy: 0.61,
            },
        );
        history
    }

    #[test]
    fn csv_keeps_every_series() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = dir.path().join("history.csv");
        let history = history();
        history.save_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("epoch,train_loss,train_accuracy,valid_loss,valid_accuracy"));
        assert_eq!(TrainingHistory::load_csv(&path).unwrap(), history);
    }

    #[test]
    fn plots_do_not_panic() {
        let history = history();
        history.plot_accuracy();
        history.plot_loss();
        TrainingHistory::default().plot_loss();
    }

    #[test]
    fn points_start_at_epoch_one() {
        assert_eq!(points(&[0.5, 0.25]), vec![(1.0, 0.5), (2.0, 0.25)]);
    }
}
