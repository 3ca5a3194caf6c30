//! # Options
//!
//! Immutable settings applied to every data transfer of a session

use std::time::Duration;

use crate::types::{FileType, Mode, TransferFraming};

/// Default amount of times a malformed `PASV` reply is retried
pub const DEFAULT_PASSIVE_RETRIES: usize = 5;
/// Default time to wait for the server to connect back in active mode
pub const DEFAULT_ACTIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for data transfers.
///
/// Options are never mutated in place: every `with_*` method returns a new value.
///
/// ```rust
/// use mirrorftp::{Mode, TransferOptions};
/// use mirrorftp::types::FileType;
///
/// let options = TransferOptions::default()
///     .with_mode(Mode::Active)
///     .with_file_type(FileType::Ascii);
/// assert_eq!(options.mode(), Mode::Active);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    mode: Mode,
    file_type: FileType,
    framing: TransferFraming,
    active_timeout: Duration,
    passive_retries: usize,
    verify_resume: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Passive,
            file_type: FileType::Binary,
            framing: TransferFraming::Stream,
            active_timeout: DEFAULT_ACTIVE_TIMEOUT,
            passive_retries: DEFAULT_PASSIVE_RETRIES,
            verify_resume: true,
        }
    }
}

impl TransferOptions {
    /// Set the data connection mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the representation type sent with `TYPE`
    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    /// Set the transfer framing sent with `MODE`
    pub fn with_framing(mut self, framing: TransferFraming) -> Self {
        self.framing = framing;
        self
    }

    /// Set how long to wait for the server to connect in active mode
    pub fn with_active_timeout(mut self, timeout: Duration) -> Self {
        self.active_timeout = timeout;
        self
    }

    /// Set how many times a malformed `PASV` reply is retried before giving up
    pub fn with_passive_retries(mut self, retries: usize) -> Self {
        self.passive_retries = retries;
        self
    }

    /// When enabled, the remote size is checked with `SIZE` before a partial local file
    /// is trusted as a resume offset.
    pub fn with_resume_verification(mut self, verify: bool) -> Self {
        self.verify_resume = verify;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn framing(&self) -> TransferFraming {
        self.framing
    }

    pub fn active_timeout(&self) -> Duration {
        self.active_timeout
    }

    pub fn passive_retries(&self) -> usize {
        self.passive_retries
    }

    pub fn verify_resume(&self) -> bool {
        self.verify_resume
    }
}
