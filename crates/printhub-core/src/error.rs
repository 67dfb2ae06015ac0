// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for printhub.

use thiserror::Error;

/// Top-level error type for all printhub operations.
#[derive(Debug, Error)]
pub enum PrinthubError {
    // -- Subprocess errors --
    #[error("failed to run `{program}`: {detail}")]
    Command { program: String, detail: String },

    #[error("`{program}` exited with status {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: i32,
        stderr: String,
    },

    #[error("`{program}` timed out after {secs}s")]
    CommandTimeout { program: String, secs: u64 },

    #[error("program `{0}` is not allowed by the command policy")]
    CommandDenied(String),

    // -- Printer errors --
    #[error("IPP request failed: {0}")]
    IppRequest(String),

    // -- Request validation --
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    // -- Document errors --
    #[error("scan failed: {0}")]
    Scan(String),

    #[error("document conversion failed: {0}")]
    Conversion(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("archive creation failed: {0}")]
    Archive(String),

    // -- Configuration --
    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrinthubError>;
