// Copyright 2024 The rust-summarization Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Fine-tuning loop
//!
//! The decoder reads the labels shifted right by one position and is trained to predict the
//! labels, with a cross-entropy loss that ignores padded positions. The weights are saved to
//! `<checkpoint_dir>/<unix_timestamp>_<model_name>_e<epoch>.ot` whenever the mean validation loss of an
//! epoch improves on the best one seen so far.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_summarization::data::{Seq2SeqEncoder, SummaryDataset};
//! use rust_summarization::models::SummarizationModel;
//! use rust_summarization::trainer::{Trainer, TrainingConfig};
//! use tch::Device;
//!
//! let model = SummarizationModel::load("t5-small", "params", Device::cuda_if_available())?;
//! let encoder = Seq2SeqEncoder::new("summarize: ", 512, 142);
//! let train = encoder.encode_dataset(
//!     model.tokenizer(),
//!     &SummaryDataset::read_split("data/new_train")?,
//! )?;
//! let validation = encoder.encode_dataset(
//!     model.tokenizer(),
//!     &SummaryDataset::read_split("data/new_val")?,
//! )?;
//!
//! let trainer = Trainer::new(TrainingConfig::default());
//! let report = trainer.fine_tune(
//!     model.model(),
//!     model.var_store(),
//!     model.special_token_ids(),
//!     &train,
//!     &validation,
//!     model.name(),
//!     "params",
//! )?;
//! println!("best checkpoint: {:?}", report.best_checkpoint);
//! # Ok(())
//! # }
//! ```

use crate::common::error::SummarizationError;
use crate::data::{shift_tokens_right, BatchLoader, EncodedSample, Seq2SeqBatch, LABEL_PAD_ID};
use crate::models::{Seq2SeqLM, SpecialTokenIds};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tch::nn::OptimizerConfig;
use tch::{nn, Reduction, Tensor};
use tracing::{debug, info};

/// # Configuration for fine-tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of passes over the training split (default: 3)
    pub epochs: usize,
    /// Number of samples per batch (default: 4)
    pub batch_size: usize,
    /// AdamW learning rate (default: 5e-5)
    pub learning_rate: f64,
    /// AdamW weight decay (default: 0.0)
    pub weight_decay: f64,
    /// Optional maximum gradient norm, gradients are not clipped if None (default: None)
    pub max_grad_norm: Option<f64>,
    /// Shuffle the training split at every epoch (default: true)
    pub shuffle: bool,
    /// Seed of the shuffling random generator (default: 42)
    pub seed: u64,
    /// Number of batches between two training loss log lines (default: 50)
    pub log_interval: usize,
    /// Loss a checkpoint has to beat to be saved. No bound if None (default: None)
    pub initial_best_loss: Option<f64>,
}

impl Default for TrainingConfig {
    fn default() -> TrainingConfig {
        TrainingConfig {
            epochs: 3,
            batch_size: 4,
            learning_rate: 5e-5,
            weight_decay: 0.0,
            max_grad_norm: None,
            shuffle: true,
            seed: 42,
            log_interval: 50,
            initial_best_loss: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), SummarizationError> {
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(SummarizationError::InvalidConfigurationError(
                "epochs and batch_size must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(SummarizationError::InvalidConfigurationError(
                "learning_rate must be positive".to_string(),
            ));
        }
        if let Some(max_grad_norm) = self.max_grad_norm {
            if !(max_grad_norm > 0.0) {
                return Err(SummarizationError::InvalidConfigurationError(
                    "max_grad_norm must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// # Losses of a completed epoch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
    /// Epoch number, starting at 1
    pub epoch: usize,
    pub train_loss: f64,
    /// None when the validation split is empty
    pub validation_loss: Option<f64>,
    /// Checkpoint written at the end of the epoch, if the loss improved
    pub checkpoint: Option<PathBuf>,
}

/// # Outcome of a fine-tuning run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochSummary>,
    /// Best selection loss (validation loss, or training loss without validation split)
    pub best_loss: f64,
    pub best_checkpoint: Option<PathBuf>,
}

/// Mean cross entropy of `logits` (*batch size*, *sequence_length*, *vocab_size*) against
/// `labels` (*batch size*, *sequence_length*), positions labelled `LABEL_PAD_ID` excluded.
pub fn sequence_loss(logits: &Tensor, labels: &Tensor) -> Tensor {
    let vocab_size = logits.size()[2];
    logits.view([-1, vocab_size]).cross_entropy_loss::<Tensor>(
        &labels.view([-1]),
        None,
        Reduction::Mean,
        LABEL_PAD_ID,
        0.0,
    )
}

/// # Fine-tunes sequence-to-sequence models
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Trainer {
        Trainer { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fine-tunes `model`, whose trainable variables live in `var_store`.
    ///
    /// # Arguments
    ///
    /// * `model` - encoder-decoder model
    /// * `var_store` - variable store holding the model weights, saved at every improvement
    /// * `special_token_ids` - padding and decoder start tokens of the model vocabulary
    /// * `train` - encoded training split
    /// * `validation` - encoded validation split. If empty, the training loss drives checkpointing.
    /// * `model_name` - used in checkpoint file names
    /// * `checkpoint_dir` - directory receiving the checkpoints, created if needed
    #[allow(clippy::too_many_arguments)]
    pub fn fine_tune<M: Seq2SeqLM, P: AsRef<Path>>(
        &self,
        model: &M,
        var_store: &nn::VarStore,
        special_token_ids: SpecialTokenIds,
        train: &[EncodedSample],
        validation: &[EncodedSample],
        model_name: &str,
        checkpoint_dir: P,
    ) -> Result<TrainingReport, SummarizationError> {
        self.config.validate()?;
        if train.is_empty() {
            return Err(SummarizationError::DataError(
                "the training split is empty".to_string(),
            ));
        }
        let checkpoint_dir = checkpoint_dir.as_ref();
        fs::create_dir_all(checkpoint_dir)?;

        let mut optimizer = nn::AdamW::default()
            .wd(self.config.weight_decay)
            .build(var_store, self.config.learning_rate)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best_loss = self.config.initial_best_loss.unwrap_or(f64::INFINITY);
        let mut best_checkpoint = None;
        let mut epochs = Vec::with_capacity(self.config.epochs);

        info!(
            train_samples = train.len(),
            validation_samples = validation.len(),
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            "starting fine-tuning"
        );

        for epoch in 1..=self.config.epochs {
            let loader = if self.config.shuffle {
                BatchLoader::shuffled(train, self.config.batch_size, &mut rng)
            } else {
                BatchLoader::sequential(train, self.config.batch_size)
            };
            let num_batches = loader.num_batches();
            let mut train_loss_sum = 0f64;
            for (batch_index, batch) in loader
                .batches(special_token_ids.pad, var_store.device())
                .enumerate()
            {
                let loss = batch_loss(model, &batch, special_token_ids, true);
                match self.config.max_grad_norm {
                    Some(max_norm) => optimizer.backward_step_clip_norm(&loss, max_norm),
                    None => optimizer.backward_step(&loss),
                }
                let loss_value = loss.double_value(&[]);
                train_loss_sum += loss_value;
                if self.config.log_interval > 0 && (batch_index + 1) % self.config.log_interval == 0
                {
                    info!(
                        epoch,
                        batch = batch_index + 1,
                        num_batches,
                        loss = loss_value,
                        "training"
                    );
                }
            }
            let train_loss = train_loss_sum / num_batches as f64;

            let validation_loss = if validation.is_empty() {
                None
            } else {
                Some(self.evaluate_loss(model, var_store, special_token_ids, validation))
            };

            let selection_loss = validation_loss.unwrap_or(train_loss);
            let checkpoint = if selection_loss < best_loss {
                let path = checkpoint_path(checkpoint_dir, model_name, epoch)?;
                var_store.save(&path)?;
                info!(
                    epoch,
                    loss = selection_loss,
                    previous_best = best_loss,
                    checkpoint = %path.display(),
                    "loss improved, checkpoint saved"
                );
                best_loss = selection_loss;
                best_checkpoint = Some(path.clone());
                Some(path)
            } else {
                None
            };

            info!(epoch, train_loss, validation_loss = ?validation_loss, "epoch finished");
            epochs.push(EpochSummary {
                epoch,
                train_loss,
                validation_loss,
                checkpoint,
            });
        }

        Ok(TrainingReport {
            epochs,
            best_loss,
            best_checkpoint,
        })
    }

    /// Mean loss over an encoded split, without dropout nor gradient tracking.
    pub fn evaluate_loss<M: Seq2SeqLM>(
        &self,
        model: &M,
        var_store: &nn::VarStore,
        special_token_ids: SpecialTokenIds,
        samples: &[EncodedSample],
    ) -> f64 {
        let loader = BatchLoader::sequential(samples, self.config.batch_size);
        let num_batches = loader.num_batches();
        if num_batches == 0 {
            return f64::NAN;
        }
        let loss_sum = tch::no_grad(|| {
            loader
                .batches(special_token_ids.pad, var_store.device())
                .map(|batch| batch_loss(model, &batch, special_token_ids, false).double_value(&[]))
                .sum::<f64>()
        });
        debug!(samples = samples.len(), "validation loss computed");
        loss_sum / num_batches as f64
    }
}

fn batch_loss<M: Seq2SeqLM>(
    model: &M,
    batch: &Seq2SeqBatch,
    special_token_ids: SpecialTokenIds,
    train: bool,
) -> Tensor {
    let decoder_input_ids = shift_tokens_right(
        &batch.labels,
        special_token_ids.pad,
        special_token_ids.decoder_start,
    );
    let logits = model.forward_t(
        Some(&batch.input_ids),
        Some(&batch.attention_mask),
        None,
        &decoder_input_ids,
        train,
    );
    sequence_loss(&logits, &batch.labels)
}

fn checkpoint_path(
    checkpoint_dir: &Path,
    model_name: &str,
    epoch: usize,
) -> Result<PathBuf, SummarizationError> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SummarizationError::IOError(e.to_string()))?
        .as_secs();
    Ok(checkpoint_dir.join(format!("{timestamp}_{model_name}_e{epoch}.ot")))
}
