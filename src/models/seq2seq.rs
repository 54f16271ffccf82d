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
use crate::common::resources::ResourceProvider;
use crate::models::{ModelResources, ModelType, SpecialTokenIds, TokenizerOption};
use rust_bert::bart::{BartConfig, BartForConditionalGeneration};
use rust_bert::pegasus::{PegasusConfig, PegasusForConditionalGeneration};
use rust_bert::t5::{T5Config, T5ForConditionalGeneration};
use std::borrow::Borrow;
use std::path::Path;
use tch::{nn, Device, Tensor};
use tracing::info;

/// # Sequence-to-sequence language model
/// Shared trait between the encoder-decoder models that can be fine-tuned and decoded by the
/// harness. Implemented for the pretrained families by `ConditionalGenerationOption`.
pub trait Seq2SeqLM {
    /// Runs the encoder only.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Input tensor of shape (*batch size*, *source_sequence_length*)
    /// * `attention_mask` - Optional mask of shape (*batch size*, *source_sequence_length*). Positions with a mask with value 0 will be masked.
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *source_sequence_length*, *hidden_size*)
    fn encode(&self, input_ids: &Tensor, attention_mask: Option<&Tensor>) -> Tensor;

    /// Forward pass through the encoder (unless `encoder_outputs` are provided) and the decoder.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Optional input tensor of shape (*batch size*, *source_sequence_length*). Must be provided when `encoder_outputs` is None.
    /// * `attention_mask` - Optional source mask of shape (*batch size*, *source_sequence_length*).
    /// * `encoder_outputs` - Optional pre-computed encoder hidden states of shape (*batch size*, *source_sequence_length*, *hidden_size*).
    /// * `decoder_input_ids` - Decoder input tensor of shape (*batch size*, *target_sequence_length*).
    /// * `train` - boolean flag to turn on/off the dropout layers in the model.
    ///
    /// # Returns
    ///
    /// * `Tensor` of language model logits of shape (*batch size*, *target_sequence_length*, *vocab_size*)
    fn forward_t(
        &self,
        input_ids: Option<&Tensor>,
        attention_mask: Option<&Tensor>,
        encoder_outputs: Option<&Tensor>,
        decoder_input_ids: &Tensor,
        train: bool,
    ) -> Tensor;
}

/// # Abstraction that holds a model configuration, can be of any of the supported families
pub enum ConfigOption {
    /// T5 configuration
    T5(T5Config),
    /// BART configuration
    Bart(BartConfig),
    /// Pegasus configuration
    Pegasus(PegasusConfig),
}

impl ConfigOption {
    /// Interface method to load a configuration from file
    pub fn from_file<P: AsRef<Path>>(
        model_type: ModelType,
        path: P,
    ) -> Result<Self, SummarizationError> {
        Ok(match model_type {
            ModelType::T5 => ConfigOption::T5(read_json::<T5Config, _>(path)?),
            ModelType::Bart => ConfigOption::Bart(read_json::<BartConfig, _>(path)?),
            ModelType::Pegasus => ConfigOption::Pegasus(read_json::<PegasusConfig, _>(path)?),
        })
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            Self::T5(_) => ModelType::T5,
            Self::Bart(_) => ModelType::Bart,
            Self::Pegasus(_) => ModelType::Pegasus,
        }
    }

    /// Special token identifiers declared by the configuration, completed with the family defaults
    pub fn special_token_ids(&self) -> SpecialTokenIds {
        let defaults = SpecialTokenIds::defaults(self.model_type());
        match self {
            Self::T5(config) => defaults.with_overrides(
                config.pad_token_id,
                config.eos_token_id,
                config.decoder_start_token_id,
            ),
            Self::Bart(config) => defaults
                .with_overrides(
                    config.pad_token_id,
                    config.eos_token_id,
                    config.decoder_start_token_id,
                )
                .with_forced_bos(config.bos_token_id),
            Self::Pegasus(config) => defaults.with_overrides(
                config.pad_token_id,
                config.eos_token_id,
                config.decoder_start_token_id,
            ),
        }
    }
}

/// # Abstraction that holds a pretrained conditional generation model
pub enum ConditionalGenerationOption {
    /// T5 model with a language modeling head
    T5(T5ForConditionalGeneration),
    /// BART model with a language modeling head
    Bart(BartForConditionalGeneration),
    /// Pegasus model with a language modeling head
    Pegasus(PegasusForConditionalGeneration),
}

impl ConditionalGenerationOption {
    /// Builds the model matching a configuration under the variable store path `p`.
    pub fn new<'p, P>(p: P, config: &ConfigOption) -> Self
    where
        P: Borrow<nn::Path<'p>>,
    {
        match config {
            ConfigOption::T5(config) => Self::T5(T5ForConditionalGeneration::new(p, config)),
            ConfigOption::Bart(config) => Self::Bart(BartForConditionalGeneration::new(p, config)),
            ConfigOption::Pegasus(config) => {
                Self::Pegasus(PegasusForConditionalGeneration::new(p, config))
            }
        }
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            Self::T5(_) => ModelType::T5,
            Self::Bart(_) => ModelType::Bart,
            Self::Pegasus(_) => ModelType::Pegasus,
        }
    }
}

impl Seq2SeqLM for ConditionalGenerationOption {
    fn encode(&self, input_ids: &Tensor, attention_mask: Option<&Tensor>) -> Tensor {
        match self {
            Self::T5(model) => model.encode(input_ids, attention_mask),
            Self::Bart(model) => model.encode(input_ids, attention_mask),
            Self::Pegasus(model) => model.encode(input_ids, attention_mask),
        }
    }

    fn forward_t(
        &self,
        input_ids: Option<&Tensor>,
        attention_mask: Option<&Tensor>,
        encoder_outputs: Option<&Tensor>,
        decoder_input_ids: &Tensor,
        train: bool,
    ) -> Tensor {
        match self {
            Self::T5(model) => {
                model
                    .forward_t(
                        input_ids,
                        attention_mask,
                        encoder_outputs,
                        Some(decoder_input_ids),
                        None,
                        None,
                        None,
                        None,
                        train,
                    )
                    .decoder_output
            }
            Self::Bart(model) => {
                model
                    .forward_t(
                        input_ids,
                        attention_mask,
                        encoder_outputs,
                        Some(decoder_input_ids),
                        None,
                        None,
                        train,
                    )
                    .decoder_output
            }
            Self::Pegasus(model) => {
                model
                    .forward_t(
                        input_ids,
                        attention_mask,
                        encoder_outputs,
                        Some(decoder_input_ids),
                        None,
                        None,
                        train,
                    )
                    .decoder_output
            }
        }
    }
}

/// # Seq2seq model paired with the tokenizer it was trained with
/// Everything the summarization pipeline needs to turn texts into summaries.
pub trait Seq2SeqGenerator {
    type Model: Seq2SeqLM;

    fn model(&self) -> &Self::Model;

    fn model_type(&self) -> ModelType;

    fn special_token_ids(&self) -> SpecialTokenIds;

    fn device(&self) -> Device;

    /// Tokenizes source texts, special tokens included, truncated to `max_len` tokens.
    fn encode_list(&self, texts: &[String], max_len: usize) -> Vec<Vec<i64>>;

    /// Converts generated token ids back to text, special tokens skipped.
    fn decode(&self, token_ids: &[i64]) -> String;
}

/// # Pretrained summarization model
/// Bundles the variable store holding the weights, the conditional generation model and its
/// tokenizer.
pub struct SummarizationModel {
    name: String,
    model: ConditionalGenerationOption,
    tokenizer: TokenizerOption,
    special_token_ids: SpecialTokenIds,
    var_store: nn::VarStore,
}

impl SummarizationModel {
    /// Loads a pretrained model and its tokenizer from `<param_dir>/<name>/`.
    ///
    /// # Arguments
    ///
    /// * `name` - model name, also used as the directory name (`t5-small`, `bart`, `pegasus`...)
    /// * `param_dir` - parameter directory holding one directory per model
    /// * `device` - device to load the weights on
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_summarization::models::SummarizationModel;
    /// use tch::Device;
    ///
    /// let model = SummarizationModel::load("bart", "params", Device::cuda_if_available())?;
    /// # Ok::<(), rust_summarization::SummarizationError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(
        name: &str,
        param_dir: P,
        device: Device,
    ) -> Result<SummarizationModel, SummarizationError> {
        let model_type = ModelType::from_name(name)?;
        let name = name.trim().to_lowercase();
        let model_dir = param_dir.as_ref().join(&name);
        info!(model = %name, family = %model_type, path = %model_dir.display(), "loading model");

        let resources = ModelResources::new(model_type, &model_dir);
        let config_path = resources.config.get_local_path()?;
        let weights_path = resources.weights.get_local_path()?;

        let config = ConfigOption::from_file(model_type, config_path)?;
        let tokenizer = TokenizerOption::from_resources(model_type, &resources)?;
        let mut var_store = nn::VarStore::new(device);
        let model = ConditionalGenerationOption::new(var_store.root(), &config);
        var_store.load(weights_path)?;

        info!(model = %name, "model loaded");
        Ok(SummarizationModel {
            name,
            model,
            tokenizer,
            special_token_ids: config.special_token_ids(),
            var_store,
        })
    }

    /// Replaces the weights with a fine-tuning checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SummarizationError> {
        let path = path.as_ref();
        info!(checkpoint = %path.display(), "loading checkpoint");
        self.var_store.load(path)?;
        Ok(())
    }

    /// Saves the current weights.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SummarizationError> {
        self.var_store.save(path)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_type(&self) -> ModelType {
        self.model.model_type()
    }

    pub fn model(&self) -> &ConditionalGenerationOption {
        &self.model
    }

    pub fn tokenizer(&self) -> &TokenizerOption {
        &self.tokenizer
    }

    pub fn special_token_ids(&self) -> SpecialTokenIds {
        self.special_token_ids
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    pub fn device(&self) -> Device {
        self.var_store.device()
    }
}

impl Seq2SeqGenerator for SummarizationModel {
    type Model = ConditionalGenerationOption;

    fn model(&self) -> &ConditionalGenerationOption {
        &self.model
    }

    fn model_type(&self) -> ModelType {
        self.model.model_type()
    }

    fn special_token_ids(&self) -> SpecialTokenIds {
        self.special_token_ids
    }

    fn device(&self) -> Device {
        self.var_store.device()
    }

    fn encode_list(&self, texts: &[String], max_len: usize) -> Vec<Vec<i64>> {
        self.tokenizer.encode_list(texts, max_len)
    }

    fn decode(&self, token_ids: &[i64]) -> String {
        self.tokenizer.decode(token_ids)
    }
}
