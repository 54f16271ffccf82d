// Copyright 2019-present, Laurent Mazare.
// Copyright 2019-present Guillaume Becquin
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

use clap::Parser;
use rust_summarization::SummarizationError;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Converts a `.npz` archive of model weights into a libtorch `.ot` file
#[derive(Parser, Debug)]
#[command(name = "convert-weights")]
struct Args {
    /// `.npz` archive exported from a pretrained checkpoint
    source: PathBuf,
    /// Destination, usually `<param_dir>/<model name>/rust_model.ot`
    destination: PathBuf,
}

pub fn main() -> Result<(), SummarizationError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let tensors = tch::Tensor::read_npz(&args.source)?;
    info!(tensors = tensors.len(), source = %args.source.display(), "weights read");
    tch::Tensor::save_multi(&tensors, &args.destination)?;
    info!(destination = %args.destination.display(), "weights converted");

    Ok(())
}
