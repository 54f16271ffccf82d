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

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_summarization::common::Settings;
use rust_summarization::data::{count_samples, Seq2SeqEncoder, SummaryDataset};
use rust_summarization::models::SummarizationModel;
use rust_summarization::pipelines::summarization::SummarizationPipeline;
use rust_summarization::trainer::Trainer;
use rust_summarization::Config;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Fine-tune pretrained summarization models and generate summaries
#[derive(Parser, Debug)]
#[command(name = "summarize", version)]
struct Cli {
    /// JSON settings file. Missing fields fall back to their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model name: a T5 variant (`t5-small`, `t5-base`...), `bart` or `pegasus`
    #[arg(long, global = true, default_value = "t5-small")]
    model: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fine-tune the model on the training split, checkpointing on validation loss
    Train(TrainArgs),

    /// Summarize a single text
    Generate(GenerateArgs),

    /// Average ROUGE scores on a labelled split
    Evaluate(EvaluateArgs),

    /// Summarize the test split into the submission file
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Overrides `training.epochs`
    #[arg(long)]
    epochs: Option<usize>,

    /// Overrides `training.batch_size`
    #[arg(long)]
    batch_size: Option<usize>,

    /// Overrides `training.learning_rate`
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Weights to resume fine-tuning from
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Text to summarize
    #[arg(long)]
    text: String,

    /// Reference summary, ROUGE scores are printed when given
    #[arg(long)]
    reference: Option<String>,

    /// Fine-tuned weights to load instead of the pretrained ones
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Fine-tuned weights to load instead of the pretrained ones
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Split directory name under the data directory (default: the validation split)
    #[arg(long)]
    split: Option<String>,

    /// Maximum number of samples to score
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// Fine-tuned weights to load instead of the pretrained ones
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Maximum number of test samples to summarize
    #[arg(long)]
    limit: Option<usize>,

    /// Submission file (default: `<data_dir>/<submission_file>`)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rust_summarization=info,summarize=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("could not load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Train(args) => {
            if let Some(epochs) = args.epochs {
                settings.training.epochs = epochs;
            }
            if let Some(batch_size) = args.batch_size {
                settings.training.batch_size = batch_size;
            }
            if let Some(learning_rate) = args.learning_rate {
                settings.training.learning_rate = learning_rate;
            }
            settings.validate()?;
            train(&cli.model, &settings, args.checkpoint.as_deref())
        }
        Commands::Generate(args) => {
            settings.validate()?;
            let pipeline = pipeline(&cli.model, &settings, args.checkpoint.as_deref())?;
            let (summary, scores) = pipeline.summarize_one(&args.text, args.reference.as_deref())?;
            println!("{summary}");
            if let Some(scores) = scores {
                println!("{scores}");
            }
            Ok(())
        }
        Commands::Evaluate(args) => {
            settings.validate()?;
            let split = args.split.unwrap_or_else(|| settings.validation_split.clone());
            let split_dir = settings.split_dir(&split);
            let dataset = match args.limit {
                Some(limit) => {
                    let count = count_samples(&split_dir)?.min(limit);
                    SummaryDataset::read_first(&split_dir, count)?
                }
                None => SummaryDataset::read_split(&split_dir)?,
            };
            let pipeline = pipeline(&cli.model, &settings, args.checkpoint.as_deref())?;
            let report = pipeline.evaluate(&dataset)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Submit(args) => {
            settings.validate()?;
            let output = args.output.unwrap_or_else(|| settings.submission_path());
            let pipeline = pipeline(&cli.model, &settings, args.checkpoint.as_deref())?;
            let rows = pipeline.write_submission(settings.test_dir(), &output, args.limit)?;
            println!("{rows} summaries written to {}", output.display());
            Ok(())
        }
    }
}

fn load_model(
    name: &str,
    settings: &Settings,
    checkpoint: Option<&Path>,
) -> Result<SummarizationModel> {
    let mut model = SummarizationModel::load(name, &settings.param_dir, settings.device()?)?;
    if let Some(checkpoint) = checkpoint {
        model.load_checkpoint(checkpoint)?;
    }
    Ok(model)
}

fn pipeline(
    name: &str,
    settings: &Settings,
    checkpoint: Option<&Path>,
) -> Result<SummarizationPipeline> {
    let model = load_model(name, settings, checkpoint)?;
    Ok(SummarizationPipeline::from_settings(model, settings))
}

fn train(name: &str, settings: &Settings, checkpoint: Option<&Path>) -> Result<()> {
    let model = load_model(name, settings, checkpoint)?;
    let task_prefix = settings
        .task_prefix
        .clone()
        .unwrap_or_else(|| model.model_type().default_task_prefix().to_string());
    let encoder = Seq2SeqEncoder::new(
        task_prefix,
        settings.source_max_length,
        settings.summary_max_length,
    );

    let train = encoder.encode_dataset(
        model.tokenizer(),
        &SummaryDataset::read_split(settings.train_dir())?,
    )?;
    let validation_dir = settings.validation_dir();
    let validation = if validation_dir.is_dir() {
        encoder.encode_dataset(model.tokenizer(), &SummaryDataset::read_split(&validation_dir)?)?
    } else {
        warn!(
            split = %validation_dir.display(),
            "validation split not found, checkpoints are selected on the training loss"
        );
        vec![]
    };
    info!(train = train.len(), validation = validation.len(), "splits encoded");

    let report = Trainer::new(settings.training.clone()).fine_tune(
        model.model(),
        model.var_store(),
        model.special_token_ids(),
        &train,
        &validation,
        model.name(),
        settings.checkpoint_dir(),
    )?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
