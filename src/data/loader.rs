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

use crate::data::batching::{EncodedSample, Seq2SeqBatch};
use rand::seq::SliceRandom;
use rand::Rng;
use tch::Device;

/// # Iterates over an encoded split in mini-batches
/// The last batch holds the remaining samples and may be smaller than `batch_size`.
pub struct BatchLoader<'a> {
    samples: &'a [EncodedSample],
    batch_size: usize,
    order: Vec<usize>,
}

impl<'a> BatchLoader<'a> {
    /// Creates a loader visiting the samples in order.
    pub fn sequential(samples: &'a [EncodedSample], batch_size: usize) -> BatchLoader<'a> {
        BatchLoader {
            samples,
            batch_size: batch_size.max(1),
            order: (0..samples.len()).collect(),
        }
    }

    /// Creates a loader visiting the samples in a random order.
    pub fn shuffled<R: Rng + ?Sized>(
        samples: &'a [EncodedSample],
        batch_size: usize,
        rng: &mut R,
    ) -> BatchLoader<'a> {
        let mut loader = Self::sequential(samples, batch_size);
        loader.order.shuffle(rng);
        loader
    }

    pub fn num_batches(&self) -> usize {
        (self.samples.len() + self.batch_size - 1) / self.batch_size
    }

    /// Samples of every batch, in visiting order.
    pub fn sample_batches(&self) -> impl Iterator<Item = Vec<&'a EncodedSample>> + '_ {
        let samples = self.samples;
        self.order
            .chunks(self.batch_size)
            .map(move |indices| indices.iter().map(|&index| &samples[index]).collect())
    }

    /// Tensor batches padded with `pad_id` on `device`.
    pub fn batches(
        &'a self,
        pad_id: i64,
        device: Device,
    ) -> impl Iterator<Item = Seq2SeqBatch> + 'a {
        self.sample_batches()
            .map(move |samples| Seq2SeqBatch::collate(&samples, pad_id, device))
    }
}
