//! Error taxonomy for the compiler core.
//!
//! Ingest and internal errors are fatal and short-circuit the pipeline.
//! Validation errors are accumulated by the gateway pairing & validator
//! pass and reported together so a caller sees every structural problem
//! in one response, not just the first.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid BPMN file: {0}")]
    Ingest(String),

    #[error("unsupported BPMN element <{element}> (id={id})")]
    Unsupported { element: String, id: String },

    #[error("BPMN validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("internal consistency error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;
