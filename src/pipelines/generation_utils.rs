// Copyright 2018 The HuggingFace Inc. team.
// Copyright 2020 Guillaume Becquin
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

//! # Beam search decoding for sequence-to-sequence models
//!
//! The encoder runs once per input; the decoder is then run on `num_beams` hypotheses per input
//! for every generated position. At each step:
//! - the end of sequence token is forbidden until `min_length` is reached,
//! - tokens completing an n-gram already present in a hypothesis are forbidden
//!   (`no_repeat_ngram_size`),
//! - the `2 * num_beams` best continuations are ranked: the ones ending a sequence are stored as
//!   finished hypotheses, the `num_beams` best remaining ones keep running.
//!
//! Finished hypotheses are scored by their sum of log-probabilities divided by
//! `length ^ length_penalty`.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_summarization::models::SummarizationModel;
//! use rust_summarization::pipelines::generation_utils::{BeamSearch, GenerateConfig};
//! use tch::{Device, Tensor};
//!
//! let model = SummarizationModel::load("t5-small", "params", Device::Cpu)?;
//! let input_ids = Tensor::from_slice(&[21603i64, 10, 8, 1782, 19, 1]).unsqueeze(0);
//! let generate_config = GenerateConfig {
//!     num_beams: 4,
//!     ..Default::default()
//! };
//! let output = BeamSearch::new(&generate_config, model.special_token_ids()).generate(
//!     model.model(),
//!     &input_ids,
//!     None,
//! )?;
//! let summary = model.tokenizer().decode(&output[0][0].token_ids);
//! # Ok(())
//! # }
//! ```

use crate::common::error::SummarizationError;
use crate::models::{Seq2SeqLM, SpecialTokenIds};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tch::{Device, Kind, Tensor};

/// # Configuration for beam search generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Minimum sequence length, decoder start token included (default: 56)
    pub min_length: i64,
    /// Maximum sequence length, decoder start token included (default: 142)
    pub max_length: i64,
    /// Early stopping flag indicating if the beam search should stop as soon as `num_beam` hypotheses have been generated (default: true)
    pub early_stopping: bool,
    /// Number of beams for beam search (default: 3)
    pub num_beams: i64,
    /// Exponential penalty based on the length of the hypotheses generated (default: 1.0)
    pub length_penalty: f64,
    /// Number of allowed repetitions of n-grams. Values higher than 0 turn on this feature (default: 3)
    pub no_repeat_ngram_size: i64,
    /// Number of sequences to return for each input (default: 1)
    pub num_return_sequences: i64,
}

impl Default for GenerateConfig {
    fn default() -> GenerateConfig {
        GenerateConfig {
            min_length: 56,
            max_length: 142,
            early_stopping: true,
            num_beams: 3,
            length_penalty: 1.0,
            no_repeat_ngram_size: 3,
            num_return_sequences: 1,
        }
    }
}

impl GenerateConfig {
    pub fn validate(&self) -> Result<(), SummarizationError> {
        let error = |message: &str| {
            Err(SummarizationError::InvalidConfigurationError(
                message.to_string(),
            ))
        };
        if self.num_beams < 1 {
            return error("num_beams must be at least 1");
        }
        if self.max_length < 1 {
            return error("max_length must be at least 1");
        }
        if self.min_length < 0 || self.min_length > self.max_length {
            return error("min_length must be between 0 and max_length");
        }
        if self.no_repeat_ngram_size < 0 {
            return error("no_repeat_ngram_size must be positive or 0");
        }
        if self.num_return_sequences < 1 || self.num_return_sequences > self.num_beams {
            return error("num_return_sequences must be between 1 and num_beams");
        }
        if !self.length_penalty.is_finite() {
            return error("length_penalty must be finite");
        }
        Ok(())
    }
}

/// # Generated sequence
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSequence {
    /// Generated tokens, decoder start and end of sequence tokens excluded
    pub token_ids: Vec<i64>,
    /// Length-normalized sum of log-probabilities
    pub score: f64,
}

/// # Beam search decoder
pub struct BeamSearch<'a> {
    config: &'a GenerateConfig,
    special_token_ids: SpecialTokenIds,
}

impl<'a> BeamSearch<'a> {
    pub fn new(config: &'a GenerateConfig, special_token_ids: SpecialTokenIds) -> BeamSearch<'a> {
        BeamSearch {
            config,
            special_token_ids,
        }
    }

    /// Generates `num_return_sequences` sequences for every input, best first.
    ///
    /// # Arguments
    ///
    /// * `model` - encoder-decoder model
    /// * `input_ids` - source tensor of shape (*batch size*, *source_sequence_length*)
    /// * `attention_mask` - optional source mask of shape (*batch size*, *source_sequence_length*)
    pub fn generate<M: Seq2SeqLM>(
        &self,
        model: &M,
        input_ids: &Tensor,
        attention_mask: Option<&Tensor>,
    ) -> Result<Vec<Vec<GeneratedSequence>>, SummarizationError> {
        self.config.validate()?;
        let _no_grad = tch::no_grad_guard();
        let device = input_ids.device();
        let batch_size = input_ids.size()[0] as usize;
        let num_beams = self.config.num_beams as usize;
        let eos = self.special_token_ids.eos;

        let beam_expansion = Tensor::from_slice(
            &(0..batch_size as i64)
                .flat_map(|index| std::iter::repeat(index).take(num_beams))
                .collect::<Vec<i64>>(),
        )
        .to_device(device);
        let encoder_outputs = model
            .encode(input_ids, attention_mask)
            .index_select(0, &beam_expansion);
        let attention_mask = attention_mask.map(|mask| mask.index_select(0, &beam_expansion));

        let mut hypotheses = (0..batch_size)
            .map(|_| {
                BeamHypotheses::new(
                    self.config.num_beams,
                    self.config.max_length,
                    self.config.length_penalty,
                    self.config.early_stopping,
                )
            })
            .collect::<Vec<BeamHypotheses>>();
        let mut beam_tokens =
            vec![vec![self.special_token_ids.decoder_start]; batch_size * num_beams];
        // Only the first beam of each input is live at the first step, so that the
        // initial candidates are not duplicated.
        let mut beam_scores = (0..batch_size * num_beams)
            .map(|index| if index % num_beams == 0 { 0f64 } else { -1e9 })
            .collect::<Vec<f64>>();
        let mut done = vec![false; batch_size];

        let mut current_length = 1i64;
        while current_length < self.config.max_length {
            let decoder_input_ids = Tensor::from_slice(&beam_tokens.concat())
                .view([(batch_size * num_beams) as i64, current_length])
                .to_device(device);
            let logits = model.forward_t(
                None,
                attention_mask.as_ref(),
                Some(&encoder_outputs),
                &decoder_input_ids,
                false,
            );
            let mut scores = logits.select(1, -1).log_softmax(-1, Kind::Float);
            if current_length < self.config.min_length {
                let _ = scores.index_fill_(
                    1,
                    &Tensor::from_slice(&[eos]).to_device(device),
                    f64::NEG_INFINITY,
                );
            }
            if self.config.no_repeat_ngram_size > 0 {
                for (beam_index, tokens) in beam_tokens.iter().enumerate() {
                    let banned_tokens =
                        banned_ngram_tokens(tokens, self.config.no_repeat_ngram_size as usize);
                    if !banned_tokens.is_empty() {
                        let _ = scores.get(beam_index as i64).index_fill_(
                            0,
                            &Tensor::from_slice(&banned_tokens).to_device(device),
                            f64::NEG_INFINITY,
                        );
                    }
                }
            }
            if current_length == 1 {
                if let Some(forced_bos) = self.special_token_ids.forced_bos {
                    force_token(&mut scores, forced_bos);
                }
            } else if self.special_token_ids.forced_eos
                && current_length == self.config.max_length - 1
            {
                force_token(&mut scores, eos);
            }

            let vocab_size = scores.size()[1];
            let next_scores = &scores
                + Tensor::from_slice(&beam_scores)
                    .to_kind(Kind::Float)
                    .to_device(device)
                    .unsqueeze(-1);
            let (top_scores, top_ids) = next_scores
                .view([batch_size as i64, num_beams as i64 * vocab_size])
                .topk(2 * num_beams as i64, 1, true, true);
            let top_scores = to_vec::<f64>(&top_scores.to_kind(Kind::Double))?;
            let top_ids = to_vec::<i64>(&top_ids)?;

            let mut next_beams: Vec<(f64, i64, usize)> = Vec::with_capacity(beam_tokens.len());
            for batch_index in 0..batch_size {
                if done[batch_index] {
                    for beam_index in 0..num_beams {
                        next_beams.push((
                            0f64,
                            self.special_token_ids.pad,
                            batch_index * num_beams + beam_index,
                        ));
                    }
                    continue;
                }
                let candidates = 2 * num_beams;
                let offset = batch_index * candidates;
                let mut batch_beams = Vec::with_capacity(num_beams);
                for rank in 0..candidates {
                    let score = top_scores[offset + rank];
                    let id = top_ids[offset + rank];
                    let source_beam = batch_index * num_beams + (id / vocab_size) as usize;
                    let token = id % vocab_size;
                    if token == eos {
                        if rank >= num_beams {
                            continue;
                        }
                        hypotheses[batch_index].add(beam_tokens[source_beam].clone(), score);
                    } else {
                        batch_beams.push((score, token, source_beam));
                    }
                    if batch_beams.len() == num_beams {
                        break;
                    }
                }
                done[batch_index] = hypotheses[batch_index]
                    .is_done(top_scores[offset], current_length);
                next_beams.extend(batch_beams);
            }

            if done.iter().all(|&is_done| is_done) {
                break;
            }

            beam_tokens = next_beams
                .iter()
                .map(|&(_, token, source_beam)| {
                    let mut tokens = beam_tokens[source_beam].clone();
                    tokens.push(token);
                    tokens
                })
                .collect();
            beam_scores = next_beams.iter().map(|&(score, _, _)| score).collect();
            current_length += 1;
        }

        for (batch_index, hypothesis) in hypotheses.iter_mut().enumerate() {
            if done[batch_index] {
                continue;
            }
            for beam_index in 0..num_beams {
                let effective_beam_id = batch_index * num_beams + beam_index;
                hypothesis.add(
                    beam_tokens[effective_beam_id].clone(),
                    beam_scores[effective_beam_id],
                );
            }
        }

        Ok(hypotheses
            .into_iter()
            .map(|hypothesis| {
                hypothesis
                    .into_sorted()
                    .into_iter()
                    .take(self.config.num_return_sequences as usize)
                    .map(|(score, tokens)| GeneratedSequence {
                        token_ids: tokens.into_iter().skip(1).collect(),
                        score,
                    })
                    .collect()
            })
            .collect())
    }
}

/// Restricts the next token of every beam to `token_id`, with a log-probability of zero.
fn force_token(scores: &mut Tensor, token_id: i64) {
    let _ = scores.fill_(f64::NEG_INFINITY);
    let _ = scores.select(1, token_id).fill_(0.0);
}

fn to_vec<T: tch::kind::Element + Copy>(tensor: &Tensor) -> Result<Vec<T>, SummarizationError> {
    let flat = tensor.to_device(Device::Cpu).contiguous().view(-1);
    Ok(Vec::<T>::try_from(&flat)?)
}

/// Tokens that would complete an n-gram of size `ngram_size` already present in `tokens`.
///
/// Ported from hugging face's transformers and fairseq (https://github.com/pytorch/fairseq/blob/master/fairseq/sequence_generator.py)
pub fn banned_ngram_tokens(tokens: &[i64], ngram_size: usize) -> Vec<i64> {
    if ngram_size == 0 || tokens.len() + 1 < ngram_size {
        return vec![];
    }
    let mut generated_ngrams: HashMap<&[i64], Vec<i64>> = HashMap::new();
    for ngram in tokens.windows(ngram_size) {
        let (prefix, last) = ngram.split_at(ngram_size - 1);
        generated_ngrams.entry(prefix).or_default().push(last[0]);
    }
    let query = &tokens[tokens.len() + 1 - ngram_size..];
    generated_ngrams.remove(query).unwrap_or_default()
}

/// # Best finished hypotheses of one input
#[derive(Debug, Clone)]
pub struct BeamHypotheses {
    max_length: i64,
    length_penalty: f64,
    early_stopping: bool,
    num_beams: i64,
    beams: Vec<(f64, Vec<i64>)>,
    worst_score: f64,
}

impl BeamHypotheses {
    pub fn new(
        num_beams: i64,
        max_length: i64,
        length_penalty: f64,
        early_stopping: bool,
    ) -> BeamHypotheses {
        BeamHypotheses {
            max_length: max_length - 1,
            length_penalty,
            early_stopping,
            num_beams,
            beams: Vec::with_capacity(num_beams as usize + 1),
            worst_score: 1e9f64,
        }
    }

    pub fn len(&self) -> i64 {
        self.beams.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Adds a hypothesis if there is room for it or if it beats the worst one kept.
    pub fn add(&mut self, hypothesis: Vec<i64>, sum_log_probabilities: f64) {
        let score = sum_log_probabilities / (hypothesis.len() as f64).powf(self.length_penalty);
        if (self.len() < self.num_beams) | (score > self.worst_score) {
            self.beams.push((score, hypothesis));
            if self.len() > self.num_beams {
                if let Some((worst_score_position, _)) = self
                    .beams
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, (score, _))| OrderedFloat(*score))
                {
                    let _ = self.beams.remove(worst_score_position);
                }
            }
            self.worst_score = self
                .beams
                .iter()
                .map(|(score, _)| OrderedFloat(*score))
                .min()
                .map_or(score, |worst| worst.0);
        }
    }

    /// Whether no running beam can improve on the hypotheses kept so far.
    pub fn is_done(&self, best_sum_log_probabilities: f64, current_length: i64) -> bool {
        if self.len() < self.num_beams {
            false
        } else if self.early_stopping {
            true
        } else {
            let current_length = current_length.min(self.max_length).max(1);
            self.worst_score
                >= best_sum_log_probabilities / (current_length as f64).powf(self.length_penalty)
        }
    }

    /// Hypotheses with their score, best first.
    pub fn into_sorted(mut self) -> Vec<(f64, Vec<i64>)> {
        self.beams
            .sort_by_key(|(score, _)| std::cmp::Reverse(OrderedFloat(*score)));
        self.beams
    }
}
