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
use crate::common::resources::ResourceProvider;
use crate::models::{ModelResources, ModelType};
use rust_tokenizers::tokenizer::{
    PegasusTokenizer, RobertaTokenizer, T5Tokenizer, Tokenizer, TruncationStrategy,
};
use rust_tokenizers::TokenizedInput;

/// # Abstraction that holds the tokenizer of a supported model family
pub enum TokenizerOption {
    /// T5 Tokenizer (SentencePiece)
    T5(T5Tokenizer),
    /// BART Tokenizer (byte-level BPE shared with RoBERTa)
    Bart(RobertaTokenizer),
    /// Pegasus Tokenizer (SentencePiece)
    Pegasus(PegasusTokenizer),
}

impl TokenizerOption {
    /// Interface method to load the tokenizer of a model family from its pretrained files
    pub fn from_resources(
        model_type: ModelType,
        resources: &ModelResources,
    ) -> Result<Self, SummarizationError> {
        let vocab_path = resources.vocab.get_local_path()?;
        let tokenizer = match model_type {
            ModelType::T5 => TokenizerOption::T5(T5Tokenizer::from_file(&vocab_path, false)?),
            ModelType::Pegasus => {
                TokenizerOption::Pegasus(PegasusTokenizer::from_file(&vocab_path, false)?)
            }
            ModelType::Bart => {
                let merges_path = resources
                    .merges
                    .as_ref()
                    .ok_or_else(|| {
                        SummarizationError::InvalidConfigurationError(
                            "BART requires a merges file".to_string(),
                        )
                    })?
                    .get_local_path()?;
                TokenizerOption::Bart(RobertaTokenizer::from_file(
                    &vocab_path,
                    &merges_path,
                    false,
                    false,
                )?)
            }
        };
        Ok(tokenizer)
    }

    /// Returns the model family of the tokenizer
    pub fn model_type(&self) -> ModelType {
        match self {
            Self::T5(_) => ModelType::T5,
            Self::Bart(_) => ModelType::Bart,
            Self::Pegasus(_) => ModelType::Pegasus,
        }
    }

    /// Tokenizes a list of texts into token ids, special tokens included.
    /// Sequences longer than `max_len` are truncated from the end.
    pub fn encode_list<S>(&self, texts: &[S], max_len: usize) -> Vec<Vec<i64>>
    where
        S: AsRef<str> + Sync,
    {
        let truncation_strategy = TruncationStrategy::LongestFirst;
        let tokenized: Vec<TokenizedInput> = match self {
            Self::T5(tokenizer) => tokenizer.encode_list(texts, max_len, &truncation_strategy, 0),
            Self::Bart(tokenizer) => {
                tokenizer.encode_list(texts, max_len, &truncation_strategy, 0)
            }
            Self::Pegasus(tokenizer) => {
                tokenizer.encode_list(texts, max_len, &truncation_strategy, 0)
            }
        };
        tokenized
            .into_iter()
            .map(|input| input.token_ids)
            .collect()
    }

    /// Converts generated token ids back to text, skipping special tokens and keeping the
    /// tokenization spaces untouched.
    pub fn decode(&self, token_ids: &[i64]) -> String {
        match self {
            Self::T5(tokenizer) => tokenizer.decode(token_ids, true, false),
            Self::Bart(tokenizer) => tokenizer.decode(token_ids, true, false),
            Self::Pegasus(tokenizer) => tokenizer.decode(token_ids, true, false),
        }
    }
}
