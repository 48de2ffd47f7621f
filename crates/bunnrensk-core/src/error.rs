use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BunnrenskError {
    #[error("PDF text extraction failed: {0}")]
    Extraction(String),

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("pdftotext failed with exit code {code}: {stderr}")]
    PdftotextFailed { code: i32, stderr: String },

    #[error("failed to parse input: {0}")]
    ParseError(String),

    #[error("failed to load reference data from {path}: {reason}")]
    ReferenceLoad { path: PathBuf, reason: String },

    #[error("invalid reference data: {0}")]
    ReferenceInvalid(String),

    #[error("unknown alias overlay '{0}'")]
    UnknownOverlay(String),

    #[error("unresolved parameter label '{label}' (tried: {tried})")]
    UnresolvedParameter { label: String, tried: String },

    #[error("placeholder column '{0}' is not a parameter")]
    PlaceholderLabel(String),

    #[error("integrity violation for sample '{sample_id}': {reason}")]
    Integrity { sample_id: String, reason: String },

    #[error("failed to load config from {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("failed to read workbook: {0}")]
    Workbook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
