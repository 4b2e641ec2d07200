// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to load PDF: {0}")]
    Load(String), // Corrupt, unsupported or encrypted file
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("Completion service returned HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Completion service rejected the API key")]
    Unauthorized,

    #[error("Failed to parse completion response: {0}")]
    Parse(String),

    #[error("Completion response contained no choices")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("PDF read failed: {0}")]
    Pdf(#[from] PdfError),

    #[error("Completion service failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
