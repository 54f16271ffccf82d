//! # Dataset loading and batching
//!
//! A split is a directory of `{i}.json` files holding `{"text": ..., "summary": ...}` samples.
//! Samples are tokenized once per split, then padded per batch ("longest" padding): source
//! padding is masked out through the attention mask, and summary padding is replaced with the
//! `LABEL_PAD_ID` sentinel ignored by the loss.

pub mod batching;
pub mod dataset;
pub mod loader;

pub use batching::{
    shift_tokens_right, EncodedSample, Seq2SeqBatch, Seq2SeqEncoder, LABEL_PAD_ID,
};
pub use dataset::{clean_text, count_samples, read_sample, SummaryDataset, SummarySample};
pub use loader::BatchLoader;
