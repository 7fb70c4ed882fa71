use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("invalid gene id: {0:?}")]
    InvalidGeneId(String),

    #[error("invalid transcript id: {0:?}")]
    InvalidTranscriptId(String),

    #[error("invalid release number: {0}")]
    InvalidRelease(String),

    #[error("invalid strand: {0}")]
    InvalidStrand(String),

    #[error("batch size must be greater than zero")]
    #[diagnostic(help("pass --batch-size with a positive value"))]
    InvalidBatchSize,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("Ensembl request failed: {0}")]
    EnsemblHttp(String),

    #[error("Ensembl returned status {status}: {message}")]
    EnsemblStatus { status: u16, message: String },

    #[error("unexpected Ensembl response: {0}")]
    EnsemblParse(String),

    #[error("release download failed: {0}")]
    ReleaseHttp(String),

    #[error("release download returned status {status}: {message}")]
    ReleaseStatus { status: u16, message: String },

    #[error("release {0} has not been indexed")]
    #[diagnostic(help("run `kira-gh genes` or `kira-gh fetch` to download and index it"))]
    IndexMissing(String),

    #[error("malformed GTF at line {line}: {message}")]
    GtfParse { line: usize, message: String },

    #[error("no batch files found in {0}")]
    #[diagnostic(help("run `kira-gh fetch` first, or point --output-dir at the batch directory"))]
    NoBatchFiles(String),

    #[error("unreadable batch file {path}: {message}")]
    BatchFileRead { path: String, message: String },

    #[error("batch file {path} has columns that differ from {expected_from}")]
    ColumnMismatch { path: String, expected_from: String },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
