//! # Command
//!
//! The set of FTP commands the client issues, and the replies each one accepts as success

use std::fmt;

use crate::types::{FileType, TransferFraming};
use crate::Status;

/// Replies which close a data transfer successfully
pub const TRANSFER_COMPLETE: &[Status] =
    &[Status::ClosingDataConnection, Status::RequestedFileActionOk];

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ftp commands with their arguments
pub enum Command {
    /// Change directory to parent directory
    Cdup,
    /// Change working directory
    Cwd(String),
    /// Any command line, sent verbatim
    Custom(String),
    /// Remove file at specified path
    Dele(String),
    /// List entries at specified path. If path is not provided list entries at current working directory
    List(Option<String>),
    /// Make directory
    Mkd(String),
    /// Set transfer framing
    Mode(TransferFraming),
    /// Ping server
    Noop,
    /// Provide login password
    Pass(String),
    /// Passive mode
    Pasv,
    /// Specifies an address and port to which the server should connect (active mode)
    Port(String),
    /// Print working directory
    Pwd,
    /// Quit
    Quit,
    /// Resume transfer from offset
    Rest(u64),
    /// Retrieve file
    Retr(String),
    /// Get file size of specified path
    Size(String),
    /// Put file at specified path
    Store(String),
    /// Set transfer type
    Type(FileType),
    /// Provide user to login as
    User(String),
}

impl Command {
    /// Replies accepted as success for this command.
    ///
    /// Commands opening a data transfer (`LIST`, `RETR`, `STOR`) list their preliminary
    /// replies here; the completion reply is checked against [`TRANSFER_COMPLETE`].
    pub fn success_codes(&self) -> &'static [Status] {
        match self {
            Self::Cdup => &[Status::CommandOk, Status::RequestedFileActionOk],
            Self::Cwd(_) | Self::Dele(_) => &[Status::RequestedFileActionOk],
            Self::Custom(_) => &[],
            Self::List(_) | Self::Retr(_) | Self::Store(_) => {
                &[Status::AboutToSend, Status::AlreadyOpen]
            }
            Self::Mkd(_) | Self::Pwd => &[Status::PathCreated],
            Self::Mode(_) | Self::Noop | Self::Port(_) | Self::Type(_) => &[Status::CommandOk],
            Self::Pass(_) => &[Status::LoggedIn, Status::CommandNotImplemented],
            Self::Pasv => &[Status::PassiveMode],
            Self::Quit => &[Status::Closing],
            Self::Rest(_) => &[Status::RequestFilePending],
            Self::Size(_) => &[Status::File],
            Self::User(_) => &[Status::LoggedIn, Status::NeedPassword],
        }
    }

    /// Command line as it may appear in logs; the password is masked
    pub fn loggable(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ******".to_string(),
            cmd => cmd.to_string().trim_end_matches("\r\n").to_string(),
        }
    }
}

// -- stringify

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cdup => write!(f, "CDUP"),
            Self::Cwd(d) => write!(f, "CWD {d}"),
            Self::Custom(c) => write!(f, "{c}"),
            Self::Dele(p) => write!(f, "DELE {p}"),
            Self::List(p) => match p.as_deref() {
                Some(p) => write!(f, "LIST {p}"),
                None => write!(f, "LIST"),
            },
            Self::Mkd(p) => write!(f, "MKD {p}"),
            Self::Mode(m) => write!(f, "MODE {m}"),
            Self::Noop => write!(f, "NOOP"),
            Self::Pass(p) => write!(f, "PASS {p}"),
            Self::Pasv => write!(f, "PASV"),
            Self::Port(p) => write!(f, "PORT {p}"),
            Self::Pwd => write!(f, "PWD"),
            Self::Quit => write!(f, "QUIT"),
            Self::Rest(offset) => write!(f, "REST {offset}"),
            Self::Retr(p) => write!(f, "RETR {p}"),
            Self::Size(p) => write!(f, "SIZE {p}"),
            Self::Store(p) => write!(f, "STOR {p}"),
            Self::Type(t) => write!(f, "TYPE {t}"),
            Self::User(u) => write!(f, "USER {u}"),
        }?;
        write!(f, "\r\n")
    }
}
