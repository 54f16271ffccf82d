//! # Generation and summarization pipelines
//!
//! - `generation_utils`: beam search decoding on top of any `Seq2SeqLM`, with minimum length,
//!   n-gram repetition blocking and length penalty.
//! - `summarization`: end-to-end summarization of texts, ROUGE evaluation against references and
//!   submission export.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_summarization::common::Settings;
//! use rust_summarization::models::SummarizationModel;
//! use rust_summarization::pipelines::summarization::SummarizationPipeline;
//!
//! let settings = Settings::default();
//! let model = SummarizationModel::load("t5-small", &settings.param_dir, settings.device()?)?;
//! let pipeline = SummarizationPipeline::from_settings(model, &settings);
//! let summaries = pipeline.summarize(&["The quick brown fox jumps over the lazy dog."])?;
//! # Ok(())
//! # }
//! ```

pub mod generation_utils;
pub mod summarization;
