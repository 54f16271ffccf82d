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

//! # ROUGE scores
//!
//! N-gram (ROUGE-1, ROUGE-2) and longest common subsequence (ROUGE-L) overlap between a generated
//! summary and a reference. Texts are lowercased and split on any non-alphanumeric character
//! before scoring.
//!
//! ```
//! use rust_summarization::rouge;
//!
//! let scores = rouge::score("the cat sat on the mat", "The cat is on the mat.");
//! assert!(scores.rouge_1.f_measure > scores.rouge_2.f_measure);
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// # Precision, recall and F1 of one ROUGE variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RougeScore {
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

impl RougeScore {
    fn from_overlap(overlap: usize, candidate_count: usize, reference_count: usize) -> RougeScore {
        if overlap == 0 || candidate_count == 0 || reference_count == 0 {
            return RougeScore::default();
        }
        let precision = overlap as f64 / candidate_count as f64;
        let recall = overlap as f64 / reference_count as f64;
        RougeScore {
            precision,
            recall,
            f_measure: 2.0 * precision * recall / (precision + recall),
        }
    }

    pub fn average(scores: &[RougeScore]) -> RougeScore {
        if scores.is_empty() {
            return RougeScore::default();
        }
        let count = scores.len() as f64;
        RougeScore {
            precision: scores.iter().map(|score| score.precision).sum::<f64>() / count,
            recall: scores.iter().map(|score| score.recall).sum::<f64>() / count,
            f_measure: scores.iter().map(|score| score.f_measure).sum::<f64>() / count,
        }
    }
}

/// # ROUGE-1, ROUGE-2 and ROUGE-L scores of a summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RougeScores {
    pub rouge_1: RougeScore,
    pub rouge_2: RougeScore,
    pub rouge_l: RougeScore,
}

impl RougeScores {
    /// Averages every score over a list of summaries. Zero for an empty list.
    pub fn average(scores: &[RougeScores]) -> RougeScores {
        let select = |f: fn(&RougeScores) -> RougeScore| {
            RougeScore::average(&scores.iter().map(f).collect::<Vec<_>>())
        };
        RougeScores {
            rouge_1: select(|scores| scores.rouge_1),
            rouge_2: select(|scores| scores.rouge_2),
            rouge_l: select(|scores| scores.rouge_l),
        }
    }
}

impl fmt::Display for RougeScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rouge-1: {:.4}, rouge-2: {:.4}, rouge-l: {:.4}",
            self.rouge_1.f_measure, self.rouge_2.f_measure, self.rouge_l.f_measure
        )
    }
}

/// Lowercased alphanumeric tokens of a text.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n > 0 {
        for ngram in tokens.windows(n) {
            *counts.entry(ngram).or_insert(0) += 1;
        }
    }
    counts
}

/// ROUGE-N: clipped n-gram overlap.
pub fn rouge_n(candidate: &str, reference: &str, n: usize) -> RougeScore {
    let candidate = tokenize(candidate);
    let reference = tokenize(reference);
    let candidate_counts = ngram_counts(&candidate, n);
    let reference_counts = ngram_counts(&reference, n);
    let overlap = candidate_counts
        .iter()
        .map(|(ngram, count)| reference_counts.get(ngram).map_or(0, |r| *count.min(r)))
        .sum();
    RougeScore::from_overlap(
        overlap,
        candidate_counts.values().sum(),
        reference_counts.values().sum(),
    )
}

fn longest_common_subsequence(first: &[String], second: &[String]) -> usize {
    let mut previous = vec![0usize; second.len() + 1];
    let mut current = vec![0usize; second.len() + 1];
    for token in first {
        for (j, other) in second.iter().enumerate() {
            current[j + 1] = if token == other {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[second.len()]
}

/// ROUGE-L: longest common subsequence over the whole texts.
pub fn rouge_l(candidate: &str, reference: &str) -> RougeScore {
    let candidate = tokenize(candidate);
    let reference = tokenize(reference);
    RougeScore::from_overlap(
        longest_common_subsequence(&candidate, &reference),
        candidate.len(),
        reference.len(),
    )
}

/// ROUGE-1, ROUGE-2 and ROUGE-L of a candidate summary against its reference.
pub fn score(candidate: &str, reference: &str) -> RougeScores {
    RougeScores {
        rouge_1: rouge_n(candidate, reference, 1),
        rouge_2: rouge_n(candidate, reference, 2),
        rouge_l: rouge_l(candidate, reference),
    }
}
