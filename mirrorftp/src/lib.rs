#![crate_name = "mirrorftp"]
#![crate_type = "lib"]

//! # mirrorftp
//!
//! mirrorftp is a blocking FTP client library, built to mirror whole directory trees
//! between a server and the local filesystem.
//!
//! - Control connection with multi-line reply framing and typed reply codes
//! - Passive and active data connections
//! - Recursive downloads and uploads, driven by an explicit work queue
//! - Resumable transfers with `REST`, checked against the remote size with `SIZE`
//! - Best-effort jobs: a file the server refuses is reported and its siblings still transfer
//! - A parser for the **LIST** command output
//!
//! ## Get started
//!
//! To get started, first add **mirrorftp** to your dependencies:
//!
//! ```toml
//! mirrorftp = "^0.1"
//! ```
//!
//! ## Usage
//!
//! Here is a basic usage example:
//!
//! ```rust,no_run
//! use mirrorftp::{FtpStream, Mode, TransferOptions};
//!
//! let mut ftp_stream = FtpStream::connect("127.0.0.1:10021").unwrap_or_else(|err|
//!     panic!("{}", err)
//! );
//! assert!(ftp_stream.login("test", "test").is_ok());
//!
//! // Mirror a remote directory, using active mode
//! ftp_stream.set_options(TransferOptions::default().with_mode(Mode::Active));
//! let report = ftp_stream.download("/pub", "/tmp/pub").unwrap();
//! for failure in report.failures() {
//!     eprintln!("{}: {}", failure.path(), failure.error());
//! }
//!
//! // Disconnect from server
//! assert!(ftp_stream.quit().is_ok());
//! ```
//!
//! ## Resuming transfers
//!
//! Running the same job twice is cheap: files which are already complete on the receiving side
//! are skipped, and partial files are resumed from their current size.
//!
//! ```rust,no_run
//! use mirrorftp::{CancelToken, FtpStream};
//!
//! let mut ftp_stream = FtpStream::connect("127.0.0.1:10021").unwrap();
//! ftp_stream.login("test", "test").unwrap();
//! let cancel = CancelToken::new();
//! // `cancel.clone()` may be handed to another thread to stop the job
//! let report = ftp_stream.upload_with("/home/omar/photos", "/backup/photos", &cancel).unwrap();
//! println!("{} skipped", report.skipped().len());
//! ```

#![doc(html_playground_url = "https://play.rust-lang.org")]

// -- common deps
#[macro_use]
extern crate lazy_regex;
#[macro_use]
extern crate log;

// -- private
pub(crate) mod command;
mod options;
mod regex;
mod status;
mod stream;
#[cfg(test)]
mod test_server;

// -- public
pub mod codec;
pub mod list;
pub mod transfer;
pub mod types;

// -- export
pub use list::RemoteEntry;
pub use options::TransferOptions;
pub use status::{ReplyClass, Status};
pub use stream::FtpStream;
pub use transfer::{CancelToken, TransferReport};
pub use types::{FtpError, FtpResult, Mode, Response};

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
