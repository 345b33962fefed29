use thiserror::Error;

use crate::orchestrator::MergePhase;

/// Problems with the shape of the reference model handed to the merge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("No primary unit in the merge set")]
    MissingPrimary,

    #[error("More than one primary unit: {first} and {second}")]
    MultiplePrimaries { first: String, second: String },

    #[error("Unit not found: {0}")]
    UnitNotFound(String),
}

/// Configuration load failures. These surface before the merge starts.
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid merge configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures reported by an importer. Always fatal for the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Type {0} was already imported into the output unit")]
    DuplicateType(String),

    #[error("Forwarded type {0} was already imported into the output unit")]
    DuplicateForwardedType(String),

    #[error("Import rejected for {name}: {reason}")]
    Rejected { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Invalid reference model: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid merge options: {0}")]
    Options(#[from] OptionsError),

    #[error("Import failed during {phase}: {source}")]
    Import {
        phase: MergePhase,
        #[source]
        source: ImportError,
    },
}
