//! Exit codes and machine-readable errors for the command-line front end.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: Completed, duplicates (or similar images) found
/// - 1: Unexpected failure
/// - 2: Completed, nothing found
/// - 3: Completed, but some files could not be decoded
/// - 130: Interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Duplicates were found.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// The run completed without finding duplicates.
    NoDuplicates = 2,
    /// Results were produced but some files were skipped.
    PartialSuccess = 3,
    /// The run was cancelled.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PD000",
            Self::GeneralError => "PD001",
            Self::NoDuplicates => "PD002",
            Self::PartialSuccess => "PD003",
            Self::Interrupted => "PD130",
        }
    }

    /// Exit code for a completed run that found `found` results and skipped
    /// `skipped` undecodable files.
    #[must_use]
    pub fn for_results(found: usize, skipped: usize) -> Self {
        match (found, skipped) {
            (0, _) => Self::NoDuplicates,
            (_, 0) => Self::Success,
            _ => Self::PartialSuccess,
        }
    }
}

/// Structured error printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
