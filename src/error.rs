//! Error types for the generation pipeline.

use thiserror::Error;

/// Failures while fetching, parsing or dereferencing a document.
///
/// All variants are tied to the input; the caller can fix the source or the
/// network and retry without restarting anything else.
#[derive(Debug, Error)]
pub enum SpecLoadError {
    #[error("failed to read `{source_name}`: {source}")]
    Read {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch `{source_name}`: {source}")]
    Fetch {
        source_name: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("`{source_name}` is neither valid JSON nor valid YAML: {detail}")]
    InvalidDocument { source_name: String, detail: String },

    #[error("`{source_name}` does not declare a supported OpenAPI version (swagger 2.x or openapi 3.x)")]
    UnsupportedVersion { source_name: String },

    #[error("unresolvable reference `{pointer}` in `{source_name}`")]
    UnresolvedRef { source_name: String, pointer: String },
}

/// Failures while collecting an operation's parameter set.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("operation `{key}` is not present in the document")]
    UnknownOperation { key: String },
}

/// Failures of a full generation run.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error("type synthesis failed: {0}")]
    Synthesize(#[from] crate::synthesizer::SynthesizeError),

    #[error("write failed for `{path}`: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
