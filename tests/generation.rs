mod common;

use common::{TransitionModel, SPECIAL_TOKEN_IDS};
use rust_summarization::models::SpecialTokenIds;
use rust_summarization::pipelines::generation_utils::{BeamSearch, GenerateConfig};
use std::collections::HashSet;
use tch::{nn, Device, Tensor};

const S: f64 = 1e-6;

// 0: start / pad, 1: end of sequence
// Greedy decoding picks 2 then stops with probability .6 * .3, beam search finds 3 then stop
// with probability .4 * .9.
const BRANCHING: [[f64; 6]; 6] = [
    [S, S, 0.6, 0.4, S, S],
    [S, 0.9, S, S, S, S],
    [S, 0.3, S, 0.2, 0.27, 0.23],
    [S, 0.9, S, S, 0.05, 0.05],
    [S, 0.9, S, S, S, 0.1],
    [S, 0.9, S, S, 0.1, S],
];

// Alternates between 4 and 5, almost never stops.
const CYCLE: [[f64; 6]; 6] = [
    [S, S, 0.05, 0.05, 0.9, S],
    [S, 0.9, S, S, S, S],
    [S, S, S, 0.5, 0.3, 0.2],
    [S, S, 0.5, S, 0.25, 0.25],
    [S, S, 0.05, 0.05, 0.1, 0.8],
    [S, S, 0.05, 0.05, 0.8, 0.1],
];

fn config(num_beams: i64) -> GenerateConfig {
    GenerateConfig {
        min_length: 0,
        max_length: 10,
        early_stopping: true,
        num_beams,
        length_penalty: 1.0,
        no_repeat_ngram_size: 0,
        num_return_sequences: 1,
    }
}

fn source(batch_size: i64) -> Tensor {
    Tensor::from_slice(&[3i64, 4, 1]).repeat([batch_size, 1])
}

fn generate(
    probabilities: &[[f64; 6]; 6],
    config: &GenerateConfig,
    batch_size: i64,
) -> anyhow::Result<Vec<Vec<Vec<i64>>>> {
    generate_with_ids(probabilities, config, SPECIAL_TOKEN_IDS, batch_size)
}

fn generate_with_ids(
    probabilities: &[[f64; 6]; 6],
    config: &GenerateConfig,
    special_token_ids: SpecialTokenIds,
    batch_size: i64,
) -> anyhow::Result<Vec<Vec<Vec<i64>>>> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = TransitionModel::with_probabilities(vs.root(), probabilities);
    let output = BeamSearch::new(config, special_token_ids).generate(
        &model,
        &source(batch_size),
        None,
    )?;
    Ok(output
        .into_iter()
        .map(|sequences| {
            sequences
                .into_iter()
                .map(|sequence| sequence.token_ids)
                .collect()
        })
        .collect())
}

#[test]
fn single_beam_is_greedy() -> anyhow::Result<()> {
    let output = generate(&BRANCHING, &config(1), 1)?;
    assert_eq!(output, vec![vec![vec![2]]]);
    Ok(())
}

#[test]
fn beam_search_finds_the_most_likely_sequence() -> anyhow::Result<()> {
    let generate_config = GenerateConfig {
        num_return_sequences: 2,
        ..config(2)
    };
    let output = generate(&BRANCHING, &generate_config, 1)?;
    assert_eq!(output, vec![vec![vec![3], vec![2]]]);
    Ok(())
}

#[test]
fn returned_sequences_are_scored_best_first() -> anyhow::Result<()> {
    let generate_config = GenerateConfig {
        num_return_sequences: 2,
        ..config(2)
    };
    let vs = nn::VarStore::new(Device::Cpu);
    let model = TransitionModel::with_probabilities(vs.root(), &BRANCHING);
    let output = BeamSearch::new(&generate_config, SPECIAL_TOKEN_IDS).generate(
        &model,
        &source(1),
        None,
    )?;
    let scores = output[0]
        .iter()
        .map(|sequence| sequence.score)
        .collect::<Vec<f64>>();
    // sum of log-probabilities over 2 tokens (decoder start included)
    assert!((scores[0] - (0.4f64.ln() + 0.9f64.ln()) / 2.0).abs() < 1e-4);
    assert!(scores[0] > scores[1]);
    Ok(())
}

#[test]
fn end_of_sequence_is_forbidden_before_min_length() -> anyhow::Result<()> {
    let generate_config = GenerateConfig {
        min_length: 4,
        ..config(1)
    };
    let output = generate(&BRANCHING, &generate_config, 1)?;
    assert_eq!(output, vec![vec![vec![2, 4, 5]]]);
    Ok(())
}

#[test]
fn generation_stops_at_max_length() -> anyhow::Result<()> {
    let generate_config = GenerateConfig {
        max_length: 5,
        ..config(1)
    };
    let output = generate(&CYCLE, &generate_config, 1)?;
    assert_eq!(output, vec![vec![vec![4, 5, 4, 5]]]);
    Ok(())
}

#[test]
fn forced_first_token_overrides_the_most_likely_one() -> anyhow::Result<()> {
    let special_token_ids = SpecialTokenIds {
        forced_bos: Some(4),
        ..SPECIAL_TOKEN_IDS
    };
    let output = generate_with_ids(&BRANCHING, &config(1), special_token_ids, 1)?;
    assert_eq!(output, vec![vec![vec![4]]]);

    let output = generate_with_ids(&BRANCHING, &config(2), special_token_ids, 1)?;
    assert_eq!(output, vec![vec![vec![4]]]);
    Ok(())
}

#[test]
fn end_of_sequence_is_forced_at_max_length() -> anyhow::Result<()> {
    let generate_config = GenerateConfig {
        max_length: 5,
        ..config(1)
    };
    let special_token_ids = SpecialTokenIds {
        forced_eos: true,
        ..SPECIAL_TOKEN_IDS
    };
    let vs = nn::VarStore::new(Device::Cpu);
    let model = TransitionModel::with_probabilities(vs.root(), &CYCLE);
    let output = BeamSearch::new(&generate_config, special_token_ids).generate(
        &model,
        &source(1),
        None,
    )?;
    // the last position is taken by the forced end of sequence token
    assert_eq!(output[0][0].token_ids, vec![4, 5, 4]);
    let expected = (0.9f64.ln() + 2.0 * 0.8f64.ln()) / 4.0;
    assert!((output[0][0].score - expected).abs() < 1e-4);

    let generate_config = GenerateConfig {
        num_beams: 2,
        num_return_sequences: 2,
        ..generate_config
    };
    let output = generate_with_ids(&CYCLE, &generate_config, special_token_ids, 1)?;
    assert_eq!(output[0].len(), 2);
    for sequence in &output[0] {
        assert_eq!(sequence.len(), 3);
    }
    Ok(())
}

#[test]
fn repeated_ngrams_are_not_generated() -> anyhow::Result<()> {
    let generate_config = GenerateConfig {
        max_length: 12,
        no_repeat_ngram_size: 2,
        ..config(2)
    };
    let output = generate(&CYCLE, &generate_config, 1)?;
    let mut tokens = vec![SPECIAL_TOKEN_IDS.decoder_start];
    tokens.extend(&output[0][0]);
    let mut seen = HashSet::new();
    for bigram in tokens.windows(2) {
        assert!(seen.insert(bigram.to_vec()), "{bigram:?} repeated in {tokens:?}");
    }
    Ok(())
}

#[test]
fn every_input_of_a_batch_is_decoded() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = TransitionModel::with_probabilities(vs.root(), &BRANCHING);
    let input_ids = Tensor::from_slice(&[3i64, 4, 1, 5, 1, 0]).view([2, 3]);
    let attention_mask = Tensor::from_slice(&[1i64, 1, 1, 1, 1, 0]).view([2, 3]);
    let generate_config = config(2);
    let output = BeamSearch::new(&generate_config, SPECIAL_TOKEN_IDS).generate(
        &model,
        &input_ids,
        Some(&attention_mask),
    )?;
    assert_eq!(output.len(), 2);
    for sequences in output {
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].token_ids, vec![3]);
    }
    Ok(())
}

#[test]
fn invalid_configuration_is_reported() {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = TransitionModel::with_probabilities(vs.root(), &BRANCHING);
    let generate_config = GenerateConfig {
        min_length: 20,
        ..config(1)
    };
    assert!(BeamSearch::new(&generate_config, SPECIAL_TOKEN_IDS)
        .generate(&model, &source(1), None)
        .is_err());
}
