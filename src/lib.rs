//! Fine-tuning and beam-search inference harness for pretrained summarization models.
//!
//! Supports the T5, BART and Pegasus families through the model classes of `rust-bert`, loaded
//! from a local parameter directory (`<param_dir>/<model name>/` holding `config.json`,
//! `rust_model.ot` and the tokenizer vocabulary).
//!
//! The crate covers the whole workflow:
//! - loading JSON text/summary splits and turning them into padded tensor batches, with padded
//!   label positions ignored by the loss,
//! - supervised fine-tuning with AdamW, keeping a checkpoint each time the validation loss improves,
//! - beam search decoding and ROUGE scoring of the generated summaries,
//! - export of a tab-separated submission file.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_summarization::models::SummarizationModel;
//! use rust_summarization::pipelines::generation_utils::GenerateConfig;
//! use rust_summarization::pipelines::summarization::SummarizationPipeline;
//! use tch::Device;
//!
//! let model = SummarizationModel::load("pegasus", "params", Device::cuda_if_available())?;
//! let pipeline = SummarizationPipeline::new(model, GenerateConfig::default(), None, 512);
//! let (summary, scores) = pipeline.summarize_one(
//!     "Rust is a multi-paradigm, general-purpose programming language that emphasizes \
//!      performance, type safety, and concurrency.",
//!     Some("Rust emphasizes performance, type safety and concurrency."),
//! )?;
//! println!("{summary}: {scores:?}");
//! # Ok(())
//! # }
//! ```
//!
//! # Loading pretrained weights
//!
//! Weights exported from a HuggingFace checkpoint as a `.npz` archive are converted to the
//! libtorch format with the `convert-weights` binary:
//!
//! ```bash
//! cargo run --bin=convert-weights params/t5-small/model.npz params/t5-small/rust_model.ot
//! ```
//!
//! The command line interface (`summarize`) wraps training, generation, evaluation and submission
//! export, configured by an optional JSON settings file.

pub mod common;
pub mod data;
pub mod models;
pub mod pipelines;
pub mod rouge;
pub mod trainer;

pub use common::error::SummarizationError;
pub use common::Config;
