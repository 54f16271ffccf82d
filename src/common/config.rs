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
use crate::common::resources::default_param_directory;
use crate::pipelines::generation_utils::GenerateConfig;
use crate::trainer::TrainingConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tch::Device;

/// # Utility to deserialize JSON config files
pub trait Config
where
    for<'de> Self: Deserialize<'de>,
{
    /// Loads a `Config` object from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - `Path` to the configuration JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_summarization::common::config::Settings;
    /// use rust_summarization::Config;
    ///
    /// let settings = Settings::from_file("path/to/settings.json")?;
    /// # Ok::<(), rust_summarization::SummarizationError>(())
    /// ```
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SummarizationError> {
        read_json(path)
    }
}

/// Deserializes a JSON file into any type, including the model configurations of `rust-bert`.
pub fn read_json<T, P>(path: P) -> Result<T, SummarizationError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| {
        SummarizationError::IOError(format!(
            "could not open configuration file {}: {e}",
            path.display()
        ))
    })?;
    let br = BufReader::new(f);
    let value: T = serde_json::from_reader(br)?;
    Ok(value)
}

/// # Harness settings
/// Locations of the data splits and pretrained parameters, plus the training and generation
/// options. Every field can be omitted from the JSON file and falls back to its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the dataset, containing one directory per split (default: `data`)
    pub data_dir: PathBuf,
    /// Directory holding one sub-directory of pretrained files per model name
    /// (default: `$SUMMARIZATION_PARAM_DIR`, or the user cache directory)
    pub param_dir: PathBuf,
    /// Directory receiving fine-tuning checkpoints (default: `param_dir`)
    pub checkpoint_dir: Option<PathBuf>,
    /// Training split directory name (default: `new_train`)
    pub train_split: String,
    /// Validation split directory name (default: `new_val`)
    pub validation_split: String,
    /// Test split directory name (default: `new_test`)
    pub test_split: String,
    /// Submission file name, written in `data_dir` (default: `submission.csv`)
    pub submission_file: String,
    /// `auto`, `cpu`, `cuda` or `cuda:N` (default: `auto`)
    pub device: String,
    /// Maximum number of source tokens, special tokens included (default: 512)
    pub source_max_length: usize,
    /// Maximum number of summary tokens, special tokens included (default: 142)
    pub summary_max_length: usize,
    /// Prefix prepended to every source text. Defaults to the model family prefix.
    pub task_prefix: Option<String>,
    pub training: TrainingConfig,
    pub generation: GenerateConfig,
}

impl Config for Settings {}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            data_dir: PathBuf::from("data"),
            param_dir: default_param_directory(),
            checkpoint_dir: None,
            train_split: "new_train".to_string(),
            validation_split: "new_val".to_string(),
            test_split: "new_test".to_string(),
            submission_file: "submission.csv".to_string(),
            device: "auto".to_string(),
            source_max_length: 512,
            summary_max_length: 142,
            task_prefix: None,
            training: TrainingConfig::default(),
            generation: GenerateConfig::default(),
        }
    }
}

impl Settings {
    pub fn split_dir(&self, split: &str) -> PathBuf {
        self.data_dir.join(split)
    }

    pub fn train_dir(&self) -> PathBuf {
        self.split_dir(&self.train_split)
    }

    pub fn validation_dir(&self) -> PathBuf {
        self.split_dir(&self.validation_split)
    }

    pub fn test_dir(&self) -> PathBuf {
        self.split_dir(&self.test_split)
    }

    pub fn checkpoint_dir(&self) -> &Path {
        self.checkpoint_dir.as_deref().unwrap_or(&self.param_dir)
    }

    pub fn submission_path(&self) -> PathBuf {
        self.data_dir.join(&self.submission_file)
    }

    /// Resolves the `device` setting.
    pub fn device(&self) -> Result<Device, SummarizationError> {
        parse_device(&self.device)
    }

    /// Checks the settings for values the harness cannot run with.
    pub fn validate(&self) -> Result<(), SummarizationError> {
        if self.source_max_length == 0 || self.summary_max_length == 0 {
            return Err(SummarizationError::InvalidConfigurationError(
                "source and summary maximum lengths must be positive".to_string(),
            ));
        }
        self.device()?;
        self.training.validate()?;
        self.generation.validate()
    }
}

fn parse_device(value: &str) -> Result<Device, SummarizationError> {
    match value.trim().to_lowercase().as_str() {
        "auto" => Ok(Device::cuda_if_available()),
        "cpu" => Ok(Device::Cpu),
        "cuda" => Ok(Device::Cuda(0)),
        other => other
            .strip_prefix("cuda:")
            .and_then(|ordinal| ordinal.parse::<usize>().ok())
            .map(Device::Cuda)
            .ok_or_else(|| {
                SummarizationError::InvalidConfigurationError(format!(
                    "unknown device `{value}`, expected auto, cpu, cuda or cuda:N"
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fall_back_to_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{"data_dir": "/tmp/cnndm", "training": {"epochs": 7}, "generation": {"num_beams": 5}}"#,
        )
        .unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/cnndm"));
        assert_eq!(settings.train_dir(), PathBuf::from("/tmp/cnndm/new_train"));
        assert_eq!(settings.training.epochs, 7);
        assert_eq!(
            settings.training.batch_size,
            TrainingConfig::default().batch_size
        );
        assert_eq!(settings.generation.num_beams, 5);
        assert_eq!(settings.generation.no_repeat_ngram_size, 3);
        assert_eq!(settings.checkpoint_dir(), settings.param_dir.as_path());
    }

    #[test]
    fn devices_are_parsed() {
        assert_eq!(parse_device("cpu").unwrap(), Device::Cpu);
        assert_eq!(parse_device("CUDA").unwrap(), Device::Cuda(0));
        assert_eq!(parse_device("cuda:1").unwrap(), Device::Cuda(1));
        assert!(parse_device("tpu").is_err());
        assert!(parse_device("cuda:x").is_err());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut settings = Settings {
            device: "cpu".to_string(),
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
        settings.generation.min_length = settings.generation.max_length + 1;
        assert!(settings.validate().is_err());
    }
}
