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

use crate::common::config::read_json;
use crate::common::error::SummarizationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// # Text / summary pair
/// Stored as one JSON file per sample, `{"text": ..., "summary": ...}`. Test samples carry no
/// summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySample {
    pub text: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Reads the sample `<dir>/<index>.json`.
pub fn read_sample<P: AsRef<Path>>(
    dir: P,
    index: usize,
) -> Result<SummarySample, SummarizationError> {
    let path = dir.as_ref().join(format!("{index}.json"));
    if !path.is_file() {
        return Err(SummarizationError::DataError(format!(
            "sample {} not found",
            path.display()
        )));
    }
    read_json(&path)
}

/// Counts the JSON files of a split directory.
pub fn count_samples<P: AsRef<Path>>(dir: P) -> Result<usize, SummarizationError> {
    let mut count = 0;
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
            count += 1;
        }
    }
    Ok(count)
}

/// Removes line breaks, which the models never saw during pretraining.
pub fn clean_text(text: &str) -> String {
    text.replace(['\r', '\n'], "")
}

/// # In-memory dataset split
#[derive(Debug, Clone, Default)]
pub struct SummaryDataset {
    samples: Vec<SummarySample>,
}

impl SummaryDataset {
    pub fn new(samples: Vec<SummarySample>) -> SummaryDataset {
        SummaryDataset { samples }
    }

    /// Reads the samples `0.json` to `{n-1}.json` of a split directory holding `n` JSON files.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_summarization::data::SummaryDataset;
    ///
    /// let train = SummaryDataset::read_split("data/new_train")?;
    /// let (texts, summaries) = (train.texts(), train.summaries()?);
    /// # Ok::<(), rust_summarization::SummarizationError>(())
    /// ```
    pub fn read_split<P: AsRef<Path>>(dir: P) -> Result<SummaryDataset, SummarizationError> {
        let count = count_samples(dir.as_ref())?;
        Self::read_first(dir, count)
    }

    /// Reads the samples `0.json` to `{count-1}.json` of a split directory.
    pub fn read_first<P: AsRef<Path>>(
        dir: P,
        count: usize,
    ) -> Result<SummaryDataset, SummarizationError> {
        let dir = dir.as_ref();
        let samples = (0..count)
            .map(|index| read_sample(dir, index))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(split = %dir.display(), samples = samples.len(), "split loaded");
        Ok(SummaryDataset { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SummarySample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SummarySample> {
        self.samples.iter()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.samples.iter().map(|sample| sample.text.as_str()).collect()
    }

    /// Reference summaries, failing on the first sample without one.
    pub fn summaries(&self) -> Result<Vec<&str>, SummarizationError> {
        self.samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                sample.summary.as_deref().ok_or_else(|| {
                    SummarizationError::DataError(format!("sample {index} has no summary"))
                })
            })
            .collect()
    }
}

impl From<Vec<SummarySample>> for SummaryDataset {
    fn from(samples: Vec<SummarySample>) -> Self {
        SummaryDataset::new(samples)
    }
}
