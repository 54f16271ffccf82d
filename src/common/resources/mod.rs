//! # Resource definitions for model weights, vocabularies and configuration files
//!
//! Pretrained files are read from a local parameter directory holding one sub-directory per
//! model name:
//! - `config.json`: model configuration
//! - `rust_model.ot`: model weights in libtorch format (see the `convert-weights` binary)
//! - `spiece.model`: SentencePiece vocabulary (T5 and Pegasus)
//! - `vocab.json` and `merges.txt`: byte-level BPE vocabulary and merges (BART)
//!
//! Each file is referenced through a `LocalResource`, whose location is resolved with
//! `get_local_path`. Resolution fails with an IO error naming the file when it does not exist.

mod local;

use crate::common::error::SummarizationError;
pub use local::LocalResource;
use std::path::PathBuf;

/// # Resource Trait that can provide the location of the model, configuration or vocabulary resources
pub trait ResourceProvider {
    /// Provides the local path for a resource.
    ///
    /// # Returns
    ///
    /// * `PathBuf` pointing to the resource file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_summarization::common::resources::{LocalResource, ResourceProvider};
    /// use std::path::PathBuf;
    /// let config_resource = LocalResource::from(PathBuf::from("path/to/config.json"));
    /// let config_path = config_resource.get_local_path();
    /// ```
    fn get_local_path(&self) -> Result<PathBuf, SummarizationError>;
}

/// # Default parameter directory
/// If the environment variable `SUMMARIZATION_PARAM_DIR` is set, pretrained files are read from
/// that location. Otherwise defaults to `$XDG_CACHE_HOME/.rust-summarization`, or the
/// corresponding user cache for the current system, and to `params` when no cache exists.
pub fn default_param_directory() -> PathBuf {
    match std::env::var("SUMMARIZATION_PARAM_DIR") {
        Ok(value) => PathBuf::from(value),
        Err(_) => match dirs::cache_dir() {
            Some(mut cache) => {
                cache.push(".rust-summarization");
                cache
            }
            None => PathBuf::from("params"),
        },
    }
}
