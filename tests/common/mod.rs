#![allow(dead_code)]

use rust_summarization::models::{ModelType, Seq2SeqGenerator, Seq2SeqLM, SpecialTokenIds};
use tch::nn::Module;
use tch::{nn, Device, Kind, Tensor};

pub const VOCAB_SIZE: i64 = 6;

/// Words of the toy vocabulary, tokens 2 to 5.
pub const WORDS: [&str; 4] = ["a", "b", "c", "d"];

pub const SPECIAL_TOKEN_IDS: SpecialTokenIds = SpecialTokenIds {
    pad: 0,
    eos: 1,
    decoder_start: 0,
    forced_bos: None,
    forced_eos: false,
};

/// Decoder-only bigram model: the logits of the next token only depend on the previous one.
/// The encoder outputs are ignored.
pub struct TransitionModel {
    transitions: nn::Embedding,
}

impl TransitionModel {
    pub fn new(p: nn::Path) -> TransitionModel {
        TransitionModel {
            transitions: nn::embedding(
                p / "transitions",
                VOCAB_SIZE,
                VOCAB_SIZE,
                Default::default(),
            ),
        }
    }

    /// Builds a model whose next token distributions are given row by row.
    pub fn with_probabilities(p: nn::Path, probabilities: &[[f64; 6]; 6]) -> TransitionModel {
        let mut model = TransitionModel::new(p);
        let logits = probabilities
            .iter()
            .flatten()
            .map(|probability| probability.max(1e-9).ln() as f32)
            .collect::<Vec<f32>>();
        tch::no_grad(|| {
            model
                .transitions
                .ws
                .copy_(&Tensor::from_slice(&logits).view([VOCAB_SIZE, VOCAB_SIZE]))
        });
        model
    }
}

impl Seq2SeqLM for TransitionModel {
    fn encode(&self, input_ids: &Tensor, _attention_mask: Option<&Tensor>) -> Tensor {
        let size = input_ids.size();
        Tensor::zeros(&[size[0], size[1], 1], (Kind::Float, input_ids.device()))
    }

    fn forward_t(
        &self,
        _input_ids: Option<&Tensor>,
        _attention_mask: Option<&Tensor>,
        _encoder_outputs: Option<&Tensor>,
        decoder_input_ids: &Tensor,
        _train: bool,
    ) -> Tensor {
        self.transitions.forward(decoder_input_ids)
    }
}

/// Transition model with a whitespace tokenizer over `WORDS`. Unknown words map to `a`.
pub struct ToyGenerator {
    model: TransitionModel,
    _var_store: nn::VarStore,
}

impl ToyGenerator {
    pub fn new(probabilities: &[[f64; 6]; 6]) -> ToyGenerator {
        let var_store = nn::VarStore::new(Device::Cpu);
        let model = TransitionModel::with_probabilities(var_store.root(), probabilities);
        ToyGenerator {
            model,
            _var_store: var_store,
        }
    }
}

impl Seq2SeqGenerator for ToyGenerator {
    type Model = TransitionModel;

    fn model(&self) -> &TransitionModel {
        &self.model
    }

    fn model_type(&self) -> ModelType {
        ModelType::T5
    }

    fn special_token_ids(&self) -> SpecialTokenIds {
        SPECIAL_TOKEN_IDS
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn encode_list(&self, texts: &[String], max_len: usize) -> Vec<Vec<i64>> {
        texts
            .iter()
            .map(|text| {
                let mut ids = text
                    .split_whitespace()
                    .map(|word| {
                        WORDS
                            .iter()
                            .position(|known| *known == word)
                            .map_or(2, |position| position as i64 + 2)
                    })
                    .collect::<Vec<i64>>();
                ids.truncate(max_len.saturating_sub(1));
                ids.push(SPECIAL_TOKEN_IDS.eos);
                ids
            })
            .collect()
    }

    fn decode(&self, token_ids: &[i64]) -> String {
        token_ids
            .iter()
            .filter_map(|id| usize::try_from(id - 2).ok().and_then(|index| WORDS.get(index)))
            .copied()
            .collect::<Vec<&str>>()
            .join(" ")
    }
}
