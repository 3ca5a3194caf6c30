//! # Task
//!
//! Units of work of a transfer job

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which way the bytes flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the server to the local filesystem
    Download,
    /// From the local filesystem to the server
    Upload,
}

/// What is known about the source of a task before it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownKind {
    /// Must be probed: `CWD` on the server, metadata locally
    Unknown,
    File,
    Directory,
}

/// One file or directory to transfer. Directory tasks expand into one task per child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    remote: String,
    local: PathBuf,
    direction: Direction,
    kind: KnownKind,
}

impl TransferTask {
    pub fn new<S: AsRef<str>, P: AsRef<Path>>(
        remote: S,
        local: P,
        direction: Direction,
        kind: KnownKind,
    ) -> Self {
        Self {
            remote: remote.as_ref().to_string(),
            local: local.as_ref().to_path_buf(),
            direction,
            kind,
        }
    }

    /// Task for the entry `name` inside this directory task
    pub fn child(&self, name: &OsStr, kind: KnownKind) -> Self {
        Self {
            remote: join_remote(&self.remote, &name.to_string_lossy()),
            local: self.local.join(name),
            direction: self.direction,
            kind,
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn local(&self) -> &Path {
        &self.local
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> KnownKind {
        self.kind
    }
}

/// Where a file transfer starts, decided from what is already on the receiving side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePlan {
    /// The receiving side already holds the whole file
    Skip,
    /// Transfer from the first byte, discarding what the receiving side holds
    Fresh,
    /// Transfer from this offset
    Resume(u64),
}

impl ResumePlan {
    /// `local` bytes are already downloaded; `remote` is the size reported by the server, if known.
    ///
    /// An unknown remote size trusts the local file.
    pub fn for_download(local: u64, remote: Option<u64>) -> Self {
        match remote {
            _ if local == 0 => Self::Fresh,
            Some(remote) if remote == local => Self::Skip,
            Some(remote) if remote < local => Self::Fresh,
            _ => Self::Resume(local),
        }
    }

    /// `remote` bytes are already uploaded, if known; `local` is the size of the source file
    pub fn for_upload(local: u64, remote: Option<u64>) -> Self {
        match remote {
            Some(remote) if remote == local => Self::Skip,
            Some(remote) if remote > 0 && remote < local => Self::Resume(remote),
            _ => Self::Fresh,
        }
    }

    /// First byte to transfer
    pub fn offset(&self) -> u64 {
        match self {
            Self::Resume(offset) => *offset,
            Self::Skip | Self::Fresh => 0,
        }
    }
}

/// Stops a running job at the next task boundary. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Join a remote directory and an entry name with `/`
pub fn join_remote(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Whether `name` is a single plain path component, so that joining it to a local
/// directory stays inside that directory
pub fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\'])
        && matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        )
}
