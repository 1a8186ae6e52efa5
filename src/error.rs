//! Build errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning content into the output tree
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid front-matter in {path:?}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("layout `{name}` not found (used by {referrer})")]
    LayoutNotFound { name: String, referrer: String },

    #[error("layout cycle: {}", chain.join(" -> "))]
    LayoutCycle { chain: Vec<String> },

    #[error("output {output:?} is written by both {first:?} and {second:?}")]
    DuplicateOutput {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to render {template}")]
    Render {
        template: String,
        #[source]
        source: tera::Error,
    },

    #[error("invalid data file {path:?}: {message}")]
    Data { path: PathBuf, message: String },
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
