//! # Types
//!
//! The set of valid values for FTP commands, the reply type and the library error

use std::fmt;
use std::string::FromUtf8Error;

use thiserror::Error;

use super::Status;
use crate::list::ParseError;
use crate::status::ReplyClass;

/// A shorthand for a Result whose error type is always an FtpError.
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while using FTP.
#[derive(Debug, Error)]
pub enum FtpError {
    /// The control connection could not be established, broke, or was already closed
    #[error("Connection error: {0}")]
    ConnectionError(std::io::Error),
    /// The reply framing is malformed or the stream ended before a complete reply was read
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    /// The server refused the credentials. The connection is still open.
    #[error("Authentication failed: {0}")]
    AuthenticationError(Response),
    /// The server refused to change directory
    #[error("Navigation failed: {0}")]
    NavigationError(Response),
    /// The server refused a `TYPE` or `MODE` setting
    #[error("Configuration rejected: {0}")]
    ConfigurationError(Response),
    /// The data connection could not be negotiated or established
    #[error("Data channel error: {0}")]
    DataChannelError(String),
    /// Reading or writing file contents failed, either on the data connection or on the local file
    #[error("Transfer error: {0}")]
    TransferError(std::io::Error),
    /// Unexpected response from remote. The command expected a certain response, but got another one.
    /// This means the ftp server refused to perform your request or there was an error while processing it.
    /// Contains the response data.
    #[error("Invalid response: {0}")]
    UnexpectedResponse(Response),
    /// A `LIST` line could not be parsed
    #[error("Listing parse error: {0}")]
    ParseError(#[from] ParseError),
}

impl FtpError {
    /// Returns whether the error leaves the control connection unusable or out of sync,
    /// so that no further command can be issued on it.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::ProtocolError(_))
    }

    /// Returns the server reply carried by the error, if any
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::AuthenticationError(r)
            | Self::NavigationError(r)
            | Self::ConfigurationError(r)
            | Self::UnexpectedResponse(r) => Some(r),
            _ => None,
        }
    }
}

/// Defines a response from the ftp server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Raw 3-digit reply code
    pub code: u32,
    /// Named reply code; [`Status::Unknown`] when the code has no name
    pub status: Status,
    /// Every line of the reply, as received
    pub body: Vec<u8>,
}

/// Representation type used in `TYPE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    /// ASCII text, non-print format control
    Ascii,
    /// Image (binary)
    #[default]
    Binary,
}

/// Transfer framing used in `MODE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferFraming {
    /// Bytes are sent as a plain stream; end of file is the end of the connection
    #[default]
    Stream,
    /// Data is sent as a series of header-prefixed blocks
    Block,
    /// Data is run-length compressed
    Compressed,
}

/// Connection mode for data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// The client listens and tells the server where to connect (`PORT`)
    Active,
    /// The server listens and tells the client where to connect (`PASV`)
    #[default]
    Passive,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message())
    }
}

impl Response {
    /// Instantiates a new `Response`
    pub fn new(code: u32, body: Vec<u8>) -> Self {
        Self {
            code,
            status: Status::from(code),
            body,
        }
    }

    /// Get response as string
    pub fn as_string(&self) -> Result<String, FromUtf8Error> {
        String::from_utf8(self.body.clone()).map(|x| x.trim_end().to_string())
    }

    /// Human readable text of the reply, without the leading code of each line.
    pub fn message(&self) -> String {
        let prefix = self.code.to_string();
        String::from_utf8_lossy(&self.body)
            .lines()
            .map(|line| match line.strip_prefix(prefix.as_str()) {
                Some(rest) if rest.starts_with(' ') || rest.starts_with('-') => &rest[1..],
                Some("") => "",
                _ => line,
            })
            .collect::<Vec<&str>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Whether the reply spans more than one line
    pub fn is_multiline(&self) -> bool {
        String::from_utf8_lossy(&self.body).trim_end().lines().count() > 1
    }

    /// Outcome class of the reply
    pub fn class(&self) -> ReplyClass {
        ReplyClass::of(self.code)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Ascii => write!(f, "A"),
            FileType::Binary => write!(f, "I"),
        }
    }
}

impl fmt::Display for TransferFraming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferFraming::Stream => write!(f, "S"),
            TransferFraming::Block => write!(f, "B"),
            TransferFraming::Compressed => write!(f, "C"),
        }
    }
}
