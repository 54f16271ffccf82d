// Copyright 2019 Guillaume Becquin
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

//! # Summarization pipeline
//! Abstractive summarization of texts with a pretrained (and possibly fine-tuned) model, scored
//! with ROUGE when a reference is available.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_summarization::models::SummarizationModel;
//! use rust_summarization::pipelines::generation_utils::GenerateConfig;
//! use rust_summarization::pipelines::summarization::SummarizationPipeline;
//! use tch::Device;
//!
//! let model = SummarizationModel::load("bart", "params", Device::cuda_if_available())?;
//! let pipeline = SummarizationPipeline::new(model, GenerateConfig::default(), None, 512);
//!
//! let input = "In findings published Tuesday in Cornell University's arXiv by a team of scientists \
//! from the University of Montreal and a separate report published Wednesday in Nature Astronomy by a team \
//! from University College London (UCL), the presence of water vapour was confirmed in the atmosphere of K2-18b, \
//! a planet circling a star in the constellation Leo.";
//! let (summary, scores) = pipeline.summarize_one(input, Some("Water vapour found on K2-18b."))?;
//! # Ok(())
//! # }
//! ```

use crate::common::config::Settings;
use crate::common::error::SummarizationError;
use crate::data::batching::pad_sequences;
use crate::data::{clean_text, count_samples, Seq2SeqEncoder, SummaryDataset};
use crate::models::{Seq2SeqGenerator, SummarizationModel};
use crate::pipelines::generation_utils::{BeamSearch, GenerateConfig};
use crate::rouge::{self, RougeScores};
use csv::WriterBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// # Average ROUGE scores over a labelled split
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Number of scored samples
    pub samples: usize,
    pub scores: RougeScores,
}

/// # Summarization pipeline
/// Wraps a model with its generation settings and source pre-processing.
pub struct SummarizationPipeline<G: Seq2SeqGenerator = SummarizationModel> {
    model: G,
    generate_config: GenerateConfig,
    encoder: Seq2SeqEncoder,
    batch_size: usize,
}

impl<G: Seq2SeqGenerator> SummarizationPipeline<G> {
    /// Builds a new `SummarizationPipeline`
    ///
    /// Sources are prefixed at inference exactly as during fine-tuning.
    ///
    /// # Arguments
    ///
    /// * `model` - pretrained model and tokenizer
    /// * `generate_config` - beam search settings
    /// * `task_prefix` - prefix prepended to every source. Defaults to the model family prefix
    ///   (`summarize: ` for T5, none for BART and Pegasus).
    /// * `source_max_length` - maximum number of source tokens, longer sources are truncated
    pub fn new(
        model: G,
        generate_config: GenerateConfig,
        task_prefix: Option<String>,
        source_max_length: usize,
    ) -> SummarizationPipeline<G> {
        let task_prefix =
            task_prefix.unwrap_or_else(|| model.model_type().default_task_prefix().to_string());
        SummarizationPipeline {
            model,
            generate_config,
            encoder: Seq2SeqEncoder::new(task_prefix, source_max_length, 0),
            batch_size: 4,
        }
    }

    /// Builds a pipeline from the harness settings.
    pub fn from_settings(model: G, settings: &Settings) -> SummarizationPipeline<G> {
        SummarizationPipeline::new(
            model,
            settings.generation.clone(),
            settings.task_prefix.clone(),
            settings.source_max_length,
        )
        .with_batch_size(settings.training.batch_size)
    }

    /// Sets the number of texts summarized together by `evaluate` and `write_submission`.
    pub fn with_batch_size(mut self, batch_size: usize) -> SummarizationPipeline<G> {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model(&self) -> &G {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut G {
        &mut self.model
    }

    pub fn generate_config(&self) -> &GenerateConfig {
        &self.generate_config
    }

    pub fn task_prefix(&self) -> &str {
        &self.encoder.task_prefix
    }

    /// Summarizes a batch of texts.
    ///
    /// Line breaks are removed and the task prefix prepended before tokenization. The sources are
    /// padded to the longest one of the batch.
    pub fn summarize<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<String>, SummarizationError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let texts = texts
            .iter()
            .map(|text| clean_text(text.as_ref()))
            .collect::<Vec<String>>();
        let special_token_ids = self.model.special_token_ids();
        let input_ids = self
            .model
            .encode_list(&self.encoder.prefixed(&texts), self.encoder.source_max_length);
        let (input_ids, attention_mask) =
            pad_sequences(&input_ids, special_token_ids.pad).to_tensors(self.model.device());

        let generated = BeamSearch::new(&self.generate_config, special_token_ids).generate(
            self.model.model(),
            &input_ids,
            Some(&attention_mask),
        )?;
        Ok(generated
            .iter()
            .map(|sequences| {
                sequences.first().map_or_else(String::new, |sequence| {
                    self.model.decode(&sequence.token_ids).trim().to_string()
                })
            })
            .collect())
    }

    /// Summarizes a single text, scored against `reference` when one is given.
    pub fn summarize_one(
        &self,
        text: &str,
        reference: Option<&str>,
    ) -> Result<(String, Option<RougeScores>), SummarizationError> {
        let summary = self.summarize(&[text])?.pop().unwrap_or_default();
        let scores = reference.map(|reference| rouge::score(&summary, reference));
        Ok((summary, scores))
    }

    /// Average ROUGE scores of the generated summaries of a labelled split.
    pub fn evaluate(
        &self,
        dataset: &SummaryDataset,
    ) -> Result<EvaluationReport, SummarizationError> {
        let texts = dataset.texts();
        let references = dataset.summaries()?;
        let mut scores = Vec::with_capacity(dataset.len());
        for (texts, references) in texts
            .chunks(self.batch_size)
            .zip(references.chunks(self.batch_size))
        {
            let summaries = self.summarize(texts)?;
            scores.extend(
                summaries
                    .iter()
                    .zip(references)
                    .map(|(summary, reference)| rouge::score(summary, reference)),
            );
            info!(scored = scores.len(), total = dataset.len(), "evaluating");
        }
        let report = EvaluationReport {
            samples: scores.len(),
            scores: RougeScores::average(&scores),
        };
        info!(samples = report.samples, scores = %report.scores, "evaluation finished");
        Ok(report)
    }

    /// Summarizes the samples `0.json`.. of a test split and writes the submission file.
    ///
    /// # Arguments
    ///
    /// * `test_dir` - test split directory
    /// * `output` - submission file path
    /// * `limit` - optional maximum number of samples to summarize
    ///
    /// # Returns
    ///
    /// * Number of summaries written
    pub fn write_submission<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        test_dir: P,
        output: Q,
        limit: Option<usize>,
    ) -> Result<usize, SummarizationError> {
        let available = count_samples(test_dir.as_ref())?;
        let count = limit.map_or(available, |limit| limit.min(available));
        let dataset = SummaryDataset::read_first(test_dir, count)?;
        let mut summaries = Vec::with_capacity(count);
        for texts in dataset.texts().chunks(self.batch_size) {
            summaries.extend(self.summarize(texts)?);
            info!(summarized = summaries.len(), total = count, "writing submission");
        }
        write_summaries(output.as_ref(), &summaries)?;
        info!(output = %output.as_ref().display(), rows = summaries.len(), "submission written");
        Ok(summaries.len())
    }
}

/// Writes `index<TAB>summary` rows, without header, one per summary.
pub fn write_summaries<P: AsRef<Path>, S: AsRef<str>>(
    output: P,
    summaries: &[S],
) -> Result<(), SummarizationError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(output)?;
    for (index, summary) in summaries.iter().enumerate() {
        let summary = clean_text(summary.as_ref()).replace("\t ", "\t");
        writer.write_record([index.to_string(), summary])?;
    }
    writer.flush()?;
    Ok(())
}
