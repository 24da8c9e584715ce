use std::path::PathBuf;

use thiserror::Error;

/// The primary error type that can be produced by Cascade.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to find template \"{0}\"")]
    TemplateNotFound(String),
    #[error("I/O error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to load settings from file {0}")]
    FailedToLoadSettings(PathBuf),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse file listing pattern \"{0}\": {1}")]
    SourceFilePattern(String, glob::PatternError),
    #[error("file listing failed: {0}")]
    FileListing(#[from] glob::GlobError),
    #[error("failed to compile template \"{0}\": {1}")]
    TemplateCompile(String, handlebars::TemplateError),
    #[error("failed to render template \"{0}\": {1}")]
    TemplateRender(String, handlebars::RenderError),
}

impl Error {
    /// Returns whether this error signals that a template name could not be
    /// resolved to a file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TemplateNotFound(_))
    }
}
