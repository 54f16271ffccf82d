use rust_summarization::common::resources::default_param_directory;
use rust_summarization::data::{Seq2SeqEncoder, SummaryDataset, SummarySample};
use rust_summarization::models::{ModelType, SummarizationModel};
use rust_summarization::pipelines::generation_utils::GenerateConfig;
use rust_summarization::pipelines::summarization::SummarizationPipeline;
use rust_summarization::trainer::{Trainer, TrainingConfig};
use std::fs;
use tch::Device;

const TEXT: &str = "In findings published Tuesday in Cornell University's arXiv by a team of scientists \
from the University of Montreal and a separate report published Wednesday in Nature Astronomy by a team \
from University College London (UCL), the presence of water vapour was confirmed in the atmosphere of K2-18b, \
a planet circling a star in the constellation Leo. This is the first such discovery in a planet in its star's \
habitable zone - not too hot and not too cold for liquid water to exist.";

const REFERENCE: &str = "Water vapour was found in the atmosphere of K2-18b, a planet in its star's habitable zone.";

fn short_generation() -> GenerateConfig {
    GenerateConfig {
        min_length: 5,
        max_length: 40,
        num_beams: 2,
        ..Default::default()
    }
}

fn summarize_with(name: &str) -> anyhow::Result<()> {
    let model = SummarizationModel::load(name, default_param_directory(), Device::Cpu)?;
    assert_eq!(model.model_type(), ModelType::from_name(name)?);
    let pipeline = SummarizationPipeline::new(model, short_generation(), None, 512);

    let (summary, scores) = pipeline.summarize_one(TEXT, Some(REFERENCE))?;
    assert!(!summary.is_empty());
    let scores = scores.expect("a reference is given");
    assert!(scores.rouge_1.f_measure > 0.0);

    let (_, scores) = pipeline.summarize_one(TEXT, None)?;
    assert!(scores.is_none());
    Ok(())
}

#[test]
#[cfg_attr(not(feature = "all-tests"), ignore)]
fn t5_summarization() -> anyhow::Result<()> {
    summarize_with("t5-small")
}

#[test]
#[cfg_attr(not(feature = "all-tests"), ignore)]
fn bart_summarization() -> anyhow::Result<()> {
    summarize_with("bart")
}

#[test]
#[cfg_attr(not(feature = "all-tests"), ignore)]
fn pegasus_summarization() -> anyhow::Result<()> {
    summarize_with("pegasus")
}

#[test]
#[cfg_attr(not(feature = "all-tests"), ignore)]
fn t5_evaluation_and_submission() -> anyhow::Result<()> {
    let data_dir = tempfile::tempdir()?;
    let test_dir = data_dir.path().join("new_test");
    fs::create_dir_all(&test_dir)?;
    for index in 0..3 {
        fs::write(
            test_dir.join(format!("{index}.json")),
            serde_json::json!({ "text": TEXT }).to_string(),
        )?;
    }

    let model = SummarizationModel::load("t5-small", default_param_directory(), Device::Cpu)?;
    let pipeline =
        SummarizationPipeline::new(model, short_generation(), None, 512).with_batch_size(2);
    assert_eq!(pipeline.task_prefix(), "summarize: ");

    let output = data_dir.path().join("submission.csv");
    let rows = pipeline.write_submission(&test_dir, &output, Some(2))?;
    assert_eq!(rows, 2);
    let submission = fs::read_to_string(&output)?;
    let lines = submission.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("0\t"));
    assert!(lines[1].starts_with("1\t"));

    let dataset = SummaryDataset::new(vec![
        SummarySample {
            text: TEXT.to_string(),
            summary: Some(REFERENCE.to_string()),
        };
        3
    ]);
    let report = pipeline.evaluate(&dataset)?;
    assert_eq!(report.samples, 3);
    assert!(report.scores.rouge_l.f_measure > 0.0);
    Ok(())
}

#[test]
#[cfg_attr(not(feature = "all-tests"), ignore)]
fn t5_fine_tuning_step() -> anyhow::Result<()> {
    let checkpoint_dir = tempfile::tempdir()?;
    let mut model = SummarizationModel::load("t5-small", default_param_directory(), Device::Cpu)?;
    let dataset = SummaryDataset::new(vec![SummarySample {
        text: TEXT.to_string(),
        summary: Some(REFERENCE.to_string()),
    }]);
    let encoder = Seq2SeqEncoder::new(model.model_type().default_task_prefix(), 128, 32);
    let samples = encoder.encode_dataset(model.tokenizer(), &dataset)?;

    let config = TrainingConfig {
        epochs: 2,
        batch_size: 1,
        learning_rate: 1e-4,
        ..Default::default()
    };
    let report = Trainer::new(config).fine_tune(
        model.model(),
        model.var_store(),
        model.special_token_ids(),
        &samples,
        &samples,
        model.name(),
        checkpoint_dir.path(),
    )?;
    assert!(report.epochs[1].validation_loss < report.epochs[0].validation_loss);

    let checkpoint = report.best_checkpoint.expect("a checkpoint is saved");
    model.load_checkpoint(&checkpoint)?;
    Ok(())
}
