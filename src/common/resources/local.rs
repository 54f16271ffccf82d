use crate::common::error::SummarizationError;
use crate::common::resources::ResourceProvider;
use std::path::PathBuf;

/// # Local resource
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LocalResource {
    /// Local path for the resource
    pub local_path: PathBuf,
}

impl From<PathBuf> for LocalResource {
    fn from(local_path: PathBuf) -> Self {
        Self { local_path }
    }
}

impl ResourceProvider for LocalResource {
    /// Gets the path for a local resource, checking that the file exists.
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
    /// let config_resource = LocalResource {
    ///     local_path: PathBuf::from("path/to/config.json"),
    /// };
    /// let config_path = config_resource.get_local_path();
    /// ```
    fn get_local_path(&self) -> Result<PathBuf, SummarizationError> {
        if self.local_path.is_file() {
            Ok(self.local_path.clone())
        } else {
            Err(SummarizationError::IOError(format!(
                "resource file {} not found",
                self.local_path.display()
            )))
        }
    }
}
