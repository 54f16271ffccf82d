//! # Pretrained model families
//!
//! Registry of the supported sequence-to-sequence families (T5, BART and Pegasus). The
//! architectures themselves are provided by `rust-bert`; this module resolves a family from its
//! name, locates its pretrained files, and wraps model and tokenizer behind enums so that the rest
//! of the harness stays family-agnostic.
//!
//! ```no_run
//! use rust_summarization::models::{ModelType, SummarizationModel};
//! use tch::Device;
//!
//! let model_type = ModelType::from_name("t5-small")?;
//! assert_eq!(model_type, ModelType::T5);
//! let model = SummarizationModel::load("t5-small", "path/to/params", Device::Cpu)?;
//! # Ok::<(), rust_summarization::SummarizationError>(())
//! ```

mod seq2seq;
mod tokenizer;

pub use seq2seq::{
    ConditionalGenerationOption, ConfigOption, Seq2SeqGenerator, Seq2SeqLM, SummarizationModel,
};
pub use tokenizer::TokenizerOption;

use crate::common::error::SummarizationError;
use crate::common::resources::LocalResource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
/// # Identifies the family of a pretrained model
pub enum ModelType {
    T5,
    Bart,
    Pegasus,
}

impl ModelType {
    /// Resolves the model family from a parameter directory name.
    ///
    /// Names are case-insensitive. Any name containing `t5` (`t5-small`, `t5-base`...) is a T5
    /// model, `bart` and `pegasus` select the corresponding families.
    ///
    /// # Errors
    ///
    /// `SummarizationError::UnsupportedModel` for any other name.
    pub fn from_name(name: &str) -> Result<ModelType, SummarizationError> {
        let lowered = name.trim().to_lowercase();
        if lowered.contains("t5") {
            Ok(ModelType::T5)
        } else if lowered == "bart" {
            Ok(ModelType::Bart)
        } else if lowered == "pegasus" {
            Ok(ModelType::Pegasus)
        } else {
            Err(SummarizationError::UnsupportedModel(format!(
                "model `{name}` is not implemented, expected a T5 variant, `bart` or `pegasus`"
            )))
        }
    }

    /// Prefix prepended to the source texts for this family.
    pub fn default_task_prefix(&self) -> &'static str {
        match self {
            ModelType::T5 => "summarize: ",
            ModelType::Bart | ModelType::Pegasus => "",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelType::T5 => "t5",
            ModelType::Bart => "bart",
            ModelType::Pegasus => "pegasus",
        };
        f.write_str(name)
    }
}

/// # Special token identifiers used by batching and decoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecialTokenIds {
    /// Padding token
    pub pad: i64,
    /// End of sequence token
    pub eos: i64,
    /// First token fed to the decoder
    pub decoder_start: i64,
    /// Token forced as the first generated token (BART)
    pub forced_bos: Option<i64>,
    /// Forces the end of sequence token when the generation reaches its maximum length
    pub forced_eos: bool,
}

impl SpecialTokenIds {
    /// Identifiers of the reference vocabularies of each family.
    pub fn defaults(model_type: ModelType) -> SpecialTokenIds {
        match model_type {
            ModelType::T5 => SpecialTokenIds {
                pad: 0,
                eos: 1,
                decoder_start: 0,
                forced_bos: None,
                forced_eos: false,
            },
            ModelType::Pegasus => SpecialTokenIds {
                pad: 0,
                eos: 1,
                decoder_start: 0,
                forced_bos: None,
                forced_eos: true,
            },
            ModelType::Bart => SpecialTokenIds {
                pad: 1,
                eos: 2,
                decoder_start: 2,
                forced_bos: Some(0),
                forced_eos: true,
            },
        }
    }

    /// Replaces the defaults with the values found in a model configuration.
    pub fn with_overrides(
        self,
        pad: Option<i64>,
        eos: Option<i64>,
        decoder_start: Option<i64>,
    ) -> SpecialTokenIds {
        SpecialTokenIds {
            pad: pad.unwrap_or(self.pad),
            eos: eos.unwrap_or(self.eos),
            decoder_start: decoder_start.unwrap_or(self.decoder_start),
            ..self
        }
    }

    /// Replaces the forced first token, kept unchanged when `forced_bos` is `None` or when the
    /// family does not force one.
    pub fn with_forced_bos(self, forced_bos: Option<i64>) -> SpecialTokenIds {
        SpecialTokenIds {
            forced_bos: self
                .forced_bos
                .map(|default| forced_bos.unwrap_or(default)),
            ..self
        }
    }
}

/// # Pretrained files of a model
/// Located in a single directory, named after the model in the parameter directory.
#[derive(Clone, Debug)]
pub struct ModelResources {
    /// `config.json`
    pub config: LocalResource,
    /// `rust_model.ot`
    pub weights: LocalResource,
    /// `spiece.model` (T5, Pegasus) or `vocab.json` (BART)
    pub vocab: LocalResource,
    /// `merges.txt` (BART only)
    pub merges: Option<LocalResource>,
}

impl ModelResources {
    pub fn new(model_type: ModelType, model_dir: &Path) -> ModelResources {
        let resource = |file_name: &str| LocalResource::from(model_dir.join(file_name));
        let (vocab, merges) = match model_type {
            ModelType::T5 | ModelType::Pegasus => (resource("spiece.model"), None),
            ModelType::Bart => (resource("vocab.json"), Some(resource("merges.txt"))),
        };
        ModelResources {
            config: resource("config.json"),
            weights: resource("rust_model.ot"),
            vocab,
            merges,
        }
    }
}
