//! Request-level failures that abort a pipeline run

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid target '{0}': expected a local directory or owner/repo")]
    InvalidTarget(String),

    #[error("Could not list repository tree: {0}")]
    TreeUnavailable(String),

    #[error("Retrieval mode needs a non-empty query")]
    MissingQuery,

    #[error("Failed to embed the query: {0}")]
    QueryEmbedding(String),
}
