//! # Report
//!
//! Outcome of a transfer job

use crate::FtpError;

/// A file or directory which could not be transferred
#[derive(Debug)]
pub struct TransferFailure {
    path: String,
    error: FtpError,
}

impl TransferFailure {
    /// Remote path of the failed task
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn error(&self) -> &FtpError {
        &self.error
    }
}

/// What a job did. Paths are remote paths, whatever the direction.
#[derive(Debug, Default)]
pub struct TransferReport {
    files: usize,
    bytes: u64,
    skipped: Vec<String>,
    rejected: Vec<String>,
    failures: Vec<TransferFailure>,
    cancelled: bool,
}

impl TransferReport {
    /// Amount of files whose contents were transferred, fully or from a resume offset
    pub fn files_transferred(&self) -> usize {
        self.files
    }

    /// Amount of bytes moved on data connections, listings excluded
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes
    }

    /// Files left alone because the receiving side already had them whole
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Paths the server answered with 550
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn failures(&self) -> &[TransferFailure] {
        &self.failures
    }

    /// Whether the job was stopped by its cancel token
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether every task completed
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.rejected.is_empty() && self.failures.is_empty()
    }

    pub(crate) fn record_transfer(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }

    pub(crate) fn record_skip(&mut self, path: &str) {
        self.skipped.push(path.to_string());
    }

    pub(crate) fn record_rejection(&mut self, path: &str) {
        self.rejected.push(path.to_string());
    }

    pub(crate) fn record_failure(&mut self, path: &str, error: FtpError) {
        self.failures.push(TransferFailure {
            path: path.to_string(),
            error,
        });
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }
}
