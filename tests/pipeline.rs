mod common;

use common::ToyGenerator;
use rust_summarization::data::{SummaryDataset, SummarySample};
use rust_summarization::pipelines::generation_utils::GenerateConfig;
use rust_summarization::pipelines::summarization::SummarizationPipeline;
use rust_summarization::rouge::RougeScores;
use rust_summarization::SummarizationError;
use std::fs;
use std::path::Path;

const S: f64 = 1e-6;

// Every summary is the single word "a" (token 2).
const SHORT: [[f64; 6]; 6] = [
    [S, 0.05, 0.9, 0.05, S, S],
    [S, 0.9, S, S, 0.1, S],
    [S, 0.9, S, 0.05, 0.05, S],
    [S, 0.9, S, S, 0.05, 0.05],
    [S, 0.9, 0.05, S, S, 0.05],
    [S, 0.9, 0.05, 0.05, S, S],
];

fn pipeline(batch_size: usize) -> SummarizationPipeline<ToyGenerator> {
    let generate_config = GenerateConfig {
        min_length: 0,
        max_length: 10,
        early_stopping: true,
        num_beams: 1,
        length_penalty: 1.0,
        no_repeat_ngram_size: 0,
        num_return_sequences: 1,
    };
    SummarizationPipeline::new(ToyGenerator::new(&SHORT), generate_config, None, 16)
        .with_batch_size(batch_size)
}

fn labelled(summaries: &[&str]) -> SummaryDataset {
    summaries
        .iter()
        .enumerate()
        .map(|(index, summary)| SummarySample {
            text: format!("text {index}"),
            summary: Some(summary.to_string()),
        })
        .collect::<Vec<SummarySample>>()
        .into()
}

fn write_test_split(dir: &Path, count: usize) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    for index in 0..count {
        let value = serde_json::json!({ "text": format!("b c d\nsample {index}") });
        fs::write(dir.join(format!("{index}.json")), value.to_string())?;
    }
    Ok(())
}

#[test]
fn every_text_is_summarized() -> anyhow::Result<()> {
    let pipeline = pipeline(2);
    assert_eq!(pipeline.task_prefix(), "summarize: ");
    assert_eq!(
        pipeline.summarize(&["b c", "d\nd", "c"])?,
        vec!["a", "a", "a"]
    );
    assert!(pipeline.summarize::<&str>(&[])?.is_empty());
    Ok(())
}

#[test]
fn summaries_are_scored_only_against_a_reference() -> anyhow::Result<()> {
    let pipeline = pipeline(1);
    let (summary, scores) = pipeline.summarize_one("b c", None)?;
    assert_eq!(summary, "a");
    assert!(scores.is_none());

    let (_, scores) = pipeline.summarize_one("b c", Some("A."))?;
    let scores = scores.expect("a reference is given");
    assert!((scores.rouge_1.f_measure - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn evaluation_covers_a_partial_last_batch() -> anyhow::Result<()> {
    let pipeline = pipeline(2);
    let report = pipeline.evaluate(&labelled(&["a", "b", "b", "a", "b"]))?;
    assert_eq!(report.samples, 5);
    assert!((report.scores.rouge_1.f_measure - 2.0 / 5.0).abs() < 1e-9);
    assert!((report.scores.rouge_l.recall - 2.0 / 5.0).abs() < 1e-9);

    let report = pipeline.evaluate(&SummaryDataset::default())?;
    assert_eq!(report.samples, 0);
    assert_eq!(report.scores, RougeScores::default());
    Ok(())
}

#[test]
fn evaluation_requires_references() {
    let pipeline = pipeline(2);
    let dataset = SummaryDataset::new(vec![SummarySample {
        text: "b c".to_string(),
        summary: None,
    }]);
    assert!(matches!(
        pipeline.evaluate(&dataset),
        Err(SummarizationError::DataError(_))
    ));
}

#[test]
fn submission_rows_are_numbered_across_batches() -> anyhow::Result<()> {
    let data_dir = tempfile::tempdir()?;
    let test_dir = data_dir.path().join("new_test");
    write_test_split(&test_dir, 5)?;
    let output = data_dir.path().join("submission.csv");

    let rows = pipeline(2).write_submission(&test_dir, &output, None)?;
    assert_eq!(rows, 5);
    assert_eq!(
        fs::read_to_string(&output)?,
        "0\ta\n1\ta\n2\ta\n3\ta\n4\ta\n"
    );
    Ok(())
}

#[test]
fn submission_is_limited_to_the_available_samples() -> anyhow::Result<()> {
    let data_dir = tempfile::tempdir()?;
    let test_dir = data_dir.path().join("new_test");
    write_test_split(&test_dir, 5)?;
    let output = data_dir.path().join("submission.csv");
    let pipeline = pipeline(2);

    assert_eq!(pipeline.write_submission(&test_dir, &output, Some(3))?, 3);
    assert_eq!(fs::read_to_string(&output)?, "0\ta\n1\ta\n2\ta\n");

    assert_eq!(pipeline.write_submission(&test_dir, &output, Some(10))?, 5);
    assert_eq!(fs::read_to_string(&output)?.lines().count(), 5);

    assert_eq!(pipeline.write_submission(&test_dir, &output, Some(0))?, 0);
    assert!(fs::read_to_string(&output)?.is_empty());
    Ok(())
}

#[test]
fn empty_test_split_writes_an_empty_submission() -> anyhow::Result<()> {
    let data_dir = tempfile::tempdir()?;
    let test_dir = data_dir.path().join("new_test");
    write_test_split(&test_dir, 0)?;
    let output = data_dir.path().join("submission.csv");

    assert_eq!(pipeline(3).write_submission(&test_dir, &output, None)?, 0);
    assert!(fs::read_to_string(&output)?.is_empty());
    Ok(())
}
