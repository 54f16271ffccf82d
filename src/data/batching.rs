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

use crate::common::error::SummarizationError;
use crate::data::dataset::SummaryDataset;
use crate::models::TokenizerOption;
use tch::{Device, Kind, Tensor};

/// Label value ignored by the loss.
pub const LABEL_PAD_ID: i64 = -100;

/// # Tokenized text / summary pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSample {
    /// Source token ids, task prefix and special tokens included
    pub input_ids: Vec<i64>,
    /// Summary token ids, special tokens included
    pub label_ids: Vec<i64>,
}

/// # Converts text / summary pairs into token ids
/// Applies the task prefix to the sources and truncates sources and summaries to their maximum
/// length.
#[derive(Debug, Clone)]
pub struct Seq2SeqEncoder {
    pub task_prefix: String,
    pub source_max_length: usize,
    pub summary_max_length: usize,
}

impl Seq2SeqEncoder {
    pub fn new(
        task_prefix: impl Into<String>,
        source_max_length: usize,
        summary_max_length: usize,
    ) -> Seq2SeqEncoder {
        Seq2SeqEncoder {
            task_prefix: task_prefix.into(),
            source_max_length,
            summary_max_length,
        }
    }

    pub fn prefixed<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        texts
            .iter()
            .map(|text| format!("{}{}", self.task_prefix, text.as_ref()))
            .collect()
    }

    /// Tokenizes source texts (with the task prefix).
    pub fn encode_sources<S: AsRef<str>>(
        &self,
        tokenizer: &TokenizerOption,
        texts: &[S],
    ) -> Vec<Vec<i64>> {
        tokenizer.encode_list(&self.prefixed(texts), self.source_max_length)
    }

    /// Tokenizes every pair of a labelled split.
    pub fn encode_dataset(
        &self,
        tokenizer: &TokenizerOption,
        dataset: &SummaryDataset,
    ) -> Result<Vec<EncodedSample>, SummarizationError> {
        let summaries = dataset.summaries()?;
        let input_ids = self.encode_sources(tokenizer, &dataset.texts());
        let label_ids = tokenizer.encode_list(&summaries, self.summary_max_length);
        Ok(input_ids
            .into_iter()
            .zip(label_ids)
            .map(|(input_ids, label_ids)| EncodedSample {
                input_ids,
                label_ids,
            })
            .collect())
    }
}

/// # Right-padded batch of sequences, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedSequences {
    pub ids: Vec<i64>,
    /// 1 for real tokens, 0 for padding
    pub mask: Vec<i64>,
    pub batch_size: usize,
    pub max_length: usize,
}

impl PaddedSequences {
    pub fn to_tensors(&self, device: Device) -> (Tensor, Tensor) {
        let shape = [self.batch_size as i64, self.max_length as i64];
        (
            Tensor::from_slice(&self.ids).view(shape).to_device(device),
            Tensor::from_slice(&self.mask).view(shape).to_device(device),
        )
    }
}

/// Pads sequences to the longest one of the batch.
pub fn pad_sequences<S: AsRef<[i64]>>(sequences: &[S], pad_id: i64) -> PaddedSequences {
    let max_length = sequences
        .iter()
        .map(|sequence| sequence.as_ref().len())
        .max()
        .unwrap_or(0);
    let mut ids = Vec::with_capacity(sequences.len() * max_length);
    let mut mask = Vec::with_capacity(sequences.len() * max_length);
    for sequence in sequences {
        let sequence = sequence.as_ref();
        let padding = max_length - sequence.len();
        ids.extend_from_slice(sequence);
        ids.extend(std::iter::repeat(pad_id).take(padding));
        mask.extend(std::iter::repeat(1).take(sequence.len()));
        mask.extend(std::iter::repeat(0).take(padding));
    }
    PaddedSequences {
        ids,
        mask,
        batch_size: sequences.len(),
        max_length,
    }
}

/// Replaces every padded position with `LABEL_PAD_ID`. Positions are identified through the
/// mask, so a real token sharing the padding id is kept.
pub fn mask_label_padding(labels: &mut PaddedSequences) {
    for (id, mask) in labels.ids.iter_mut().zip(labels.mask.iter()) {
        if *mask == 0 {
            *id = LABEL_PAD_ID;
        }
    }
}

/// Builds decoder inputs from labels: the decoder start token is prepended, the last position
/// dropped and ignored positions are replaced with the padding token.
pub fn shift_tokens_right(labels: &Tensor, pad_id: i64, decoder_start_id: i64) -> Tensor {
    let size = labels.size();
    let (batch_size, length) = (size[0], size[1]);
    let start = Tensor::full(
        &[batch_size, 1],
        decoder_start_id,
        (Kind::Int64, labels.device()),
    );
    let shifted = Tensor::cat(&[start, labels.narrow(1, 0, length - 1)], 1);
    shifted.masked_fill(&shifted.eq(LABEL_PAD_ID), pad_id)
}

/// # Tensor batch for fine-tuning
pub struct Seq2SeqBatch {
    /// Source ids of shape (*batch size*, *source length*)
    pub input_ids: Tensor,
    /// Source mask of shape (*batch size*, *source length*)
    pub attention_mask: Tensor,
    /// Labels of shape (*batch size*, *summary length*), padding set to `LABEL_PAD_ID`
    pub labels: Tensor,
}

impl Seq2SeqBatch {
    /// Pads a list of encoded samples into tensors on `device`.
    pub fn collate(samples: &[&EncodedSample], pad_id: i64, device: Device) -> Seq2SeqBatch {
        let inputs = pad_sequences(
            &samples
                .iter()
                .map(|sample| sample.input_ids.as_slice())
                .collect::<Vec<_>>(),
            pad_id,
        );
        let mut labels = pad_sequences(
            &samples
                .iter()
                .map(|sample| sample.label_ids.as_slice())
                .collect::<Vec<_>>(),
            pad_id,
        );
        mask_label_padding(&mut labels);
        let (input_ids, attention_mask) = inputs.to_tensors(device);
        let (labels, _) = labels.to_tensors(device);
        Seq2SeqBatch {
            input_ids,
            attention_mask,
            labels,
        }
    }

    pub fn batch_size(&self) -> i64 {
        self.input_ids.size()[0]
    }
}
