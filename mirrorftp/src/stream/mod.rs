//! # Stream
//!
//! The control connection to the FTP server and the commands issued on it

mod data_channel;
mod data_stream;
mod framing;

use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub(crate) use data_channel::PendingDataConnection;
pub(crate) use data_stream::DataStream;

use crate::codec;
use crate::command::{Command, TRANSFER_COMPLETE};
use crate::list::{self, RemoteEntry};
use crate::options::TransferOptions;
use crate::regex::{PWD_RE, SIZE_RE};
use crate::types::{FileType, FtpError, FtpResult, Mode, Response, TransferFraming};
use crate::Status;

/// Time to wait for the completion reply of a transfer whose data connection failed
const ABORTED_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Stream to interface with the FTP server. This interface is only for the command stream.
///
/// Commands are strictly sequential: each call writes one command and blocks until its
/// complete reply has been read.
#[derive(Debug)]
pub struct FtpStream {
    reader: BufReader<TcpStream>,
    options: TransferOptions,
    welcome_msg: Option<String>,
    authenticated: bool,
    closed: bool,
    /// Representation type the server last accepted
    current_type: Option<FileType>,
    /// Framing the server last accepted
    current_framing: TransferFraming,
}

impl FtpStream {
    /// Try to connect to the remote server
    pub fn connect<A: ToSocketAddrs>(addr: A) -> FtpResult<Self> {
        debug!("Connecting to server");
        TcpStream::connect(addr)
            .map_err(FtpError::ConnectionError)
            .and_then(Self::connect_with_stream)
    }

    /// Try to connect to the remote server but with the specified timeout
    pub fn connect_timeout(addr: SocketAddr, timeout: Duration) -> FtpResult<Self> {
        debug!("Connecting to server {addr}");
        TcpStream::connect_timeout(&addr, timeout)
            .map_err(FtpError::ConnectionError)
            .and_then(Self::connect_with_stream)
    }

    /// Connect using provided configured tcp stream
    pub fn connect_with_stream(stream: TcpStream) -> FtpResult<Self> {
        debug!("Established connection with server");
        let mut ftp_stream = Self {
            reader: BufReader::new(stream),
            options: TransferOptions::default(),
            welcome_msg: None,
            authenticated: false,
            closed: false,
            current_type: None,
            current_framing: TransferFraming::Stream,
        };
        debug!("Reading server response...");
        let response = ftp_stream.read_response(Status::Ready)?;
        let welcome_msg = response.message();
        debug!("Server READY; response: {:?}", welcome_msg);
        ftp_stream.welcome_msg = Some(welcome_msg);

        Ok(ftp_stream)
    }

    /// Replace the transfer options
    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.set_options(options);
        self
    }

    /// Replace the transfer options used by the next transfers
    pub fn set_options(&mut self, options: TransferOptions) {
        debug!("Changed transfer options to {:?}", options);
        self.options = options;
    }

    /// Enable active mode for data channel
    pub fn active_mode(self, accept_timeout: Duration) -> Self {
        let options = self
            .options
            .with_mode(Mode::Active)
            .with_active_timeout(accept_timeout);
        self.with_options(options)
    }

    /// Set the data channel transfer mode
    pub fn set_mode(&mut self, mode: Mode) {
        self.set_options(self.options.with_mode(mode));
    }

    /// Transfer options used by the next transfers
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Returns welcome message retrieved from server (if available)
    pub fn welcome_msg(&self) -> Option<&str> {
        self.welcome_msg.as_deref()
    }

    /// Whether `login` succeeded on this connection
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether `quit` was called or the control connection broke
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Address of the server on the control connection
    pub fn peer_addr(&self) -> FtpResult<SocketAddr> {
        self.get_ref().peer_addr().map_err(FtpError::ConnectionError)
    }

    /// Returns a reference to the underlying [`TcpStream`].
    ///
    /// Example:
    /// ```no_run
    /// use mirrorftp::FtpStream;
    /// use std::time::Duration;
    ///
    /// let stream = FtpStream::connect("127.0.0.1:21")
    ///                        .expect("Couldn't connect to the server...");
    /// stream.get_ref().set_read_timeout(Some(Duration::from_secs(10)))
    ///                 .expect("set_read_timeout call failed");
    /// ```
    pub fn get_ref(&self) -> &TcpStream {
        self.reader.get_ref()
    }

    /// Log in to the FTP server.
    ///
    /// A rejection leaves the connection open, so that login may be attempted again.
    pub fn login<S: AsRef<str>>(&mut self, user: S, password: S) -> FtpResult<()> {
        debug!("Signing in with user '{}'", user.as_ref());
        let response = self
            .execute(Command::User(user.as_ref().to_string()))
            .map_err(authentication_error)?;
        if response.status == Status::NeedPassword {
            debug!("Password is required");
            self.execute(Command::Pass(password.as_ref().to_string()))
                .map_err(authentication_error)?;
        }
        debug!("Login OK");
        self.authenticated = true;
        Ok(())
    }

    /// Change the current directory to the path specified.
    pub fn cwd<S: AsRef<str>>(&mut self, path: S) -> FtpResult<()> {
        debug!("Changing working directory to {}", path.as_ref());
        self.execute(Command::Cwd(path.as_ref().to_string()))
            .map_err(navigation_error)
            .map(|_| ())
    }

    /// Move the current directory to the parent directory.
    pub fn cdup(&mut self) -> FtpResult<()> {
        debug!("Going to parent directory");
        self.execute(Command::Cdup)
            .map_err(navigation_error)
            .map(|_| ())
    }

    /// Gets the current directory
    pub fn pwd(&mut self) -> FtpResult<String> {
        debug!("Getting working directory");
        let response = self.execute(Command::Pwd)?;
        let body = String::from_utf8_lossy(&response.body).to_string();
        match PWD_RE.captures(&body) {
            Some(caps) => Ok(caps[1].replace("\"\"", "\"")),
            None => Err(FtpError::UnexpectedResponse(response)),
        }
    }

    /// This does nothing. This is usually just used to keep the connection open.
    pub fn noop(&mut self) -> FtpResult<()> {
        debug!("Pinging server");
        self.execute(Command::Noop).map(|_| ())
    }

    /// This creates a new directory on the server.
    pub fn mkdir<S: AsRef<str>>(&mut self, pathname: S) -> FtpResult<()> {
        debug!("Creating directory at {}", pathname.as_ref());
        self.execute(Command::Mkd(pathname.as_ref().to_string()))
            .map(|_| ())
    }

    /// Remove the remote file from the server.
    pub fn rm<S: AsRef<str>>(&mut self, filename: S) -> FtpResult<()> {
        debug!("Removing file {}", filename.as_ref());
        self.execute(Command::Dele(filename.as_ref().to_string()))
            .map(|_| ())
    }

    /// Retrieves the size of the file in bytes at `pathname` if it exists.
    pub fn size<S: AsRef<str>>(&mut self, pathname: S) -> FtpResult<u64> {
        debug!("Getting file size for {}", pathname.as_ref());
        let response = self.execute(Command::Size(pathname.as_ref().to_string()))?;
        let body = String::from_utf8_lossy(&response.body).to_string();
        match SIZE_RE.captures(&body).map(|caps| caps[1].parse::<u64>()) {
            Some(Ok(size)) => Ok(size),
            _ => Err(FtpError::UnexpectedResponse(response)),
        }
    }

    /// Sets the type of file to be transferred. That is the implementation
    /// of `TYPE` command.
    pub fn transfer_type(&mut self, file_type: FileType) -> FtpResult<()> {
        debug!("Setting transfer type {}", file_type);
        self.execute(Command::Type(file_type))
            .map_err(configuration_error)?;
        self.current_type = Some(file_type);
        Ok(())
    }

    /// Sets the framing of the data connection contents. That is the implementation
    /// of `MODE` command.
    pub fn transfer_framing(&mut self, framing: TransferFraming) -> FtpResult<()> {
        debug!("Setting transfer framing {}", framing);
        self.execute(Command::Mode(framing))
            .map_err(configuration_error)?;
        self.current_framing = framing;
        Ok(())
    }

    /// Quits the current FTP session and closes the connection, whatever the server replies.
    ///
    /// Calling it again does nothing.
    pub fn quit(&mut self) -> FtpResult<()> {
        if self.closed {
            trace!("Stream already closed");
            return Ok(());
        }
        debug!("Quitting stream");
        if let Err(err) = self.execute(Command::Quit) {
            warn!("QUIT failed: {err}");
        }
        self.close();
        Ok(())
    }

    /// Send any command line and return the reply, whatever its code.
    pub fn command<S: AsRef<str>>(&mut self, command: S) -> FtpResult<Response> {
        let command = command.as_ref().to_string();
        debug!("Sending custom command: {}", command);
        self.perform(Command::Custom(command))?;
        self.read_reply()
    }

    /// Execute `LIST` command which returns the detailed file listing in human readable format.
    /// If `pathname` is omited then the list of files in the current directory will be
    /// returned otherwise it will the list of files on `pathname`.
    pub fn list(&mut self, pathname: Option<&str>) -> FtpResult<Vec<String>> {
        debug!(
            "Reading {} directory content",
            pathname.unwrap_or("working")
        );
        let options = self.options;
        let pending = self.prepare_data_connection(&options)?;
        let mut buffer = Vec::new();
        self.receive_with(
            pending,
            Command::List(pathname.map(|x| x.to_string())),
            &mut buffer,
        )?;
        let lines = get_lines(&buffer);
        trace!("Lines from stream {:?}", lines);

        Ok(lines)
    }

    /// Same as [`FtpStream::list`], parsing every line into a [`RemoteEntry`].
    ///
    /// Lines which are not entries, such as `total N`, are skipped, as are `.` and `..`.
    pub fn list_entries(&mut self, pathname: Option<&str>) -> FtpResult<Vec<RemoteEntry>> {
        self.list(pathname)
            .map(|lines| list::parse_listing(lines.as_slice()))
    }

    /// Simple way to retr a file from the server. This stores the file in a buffer in memory.
    pub fn retr_as_buffer<S: AsRef<str>>(&mut self, file_name: S) -> FtpResult<Cursor<Vec<u8>>> {
        debug!("Retrieving '{}'", file_name.as_ref());
        let options = self.options;
        self.apply_transfer_settings(&options)?;
        let pending = self.prepare_data_connection(&options)?;
        let mut buffer = Vec::new();
        self.receive_with(
            pending,
            Command::Retr(file_name.as_ref().to_string()),
            &mut buffer,
        )?;

        Ok(Cursor::new(buffer))
    }

    /// This stores a file on the server.
    /// r argument must be any struct which implemenents the [`Read`] trait.
    /// Returns amount of written bytes
    pub fn put_file<S: AsRef<str>, R: Read>(&mut self, filename: S, r: &mut R) -> FtpResult<u64> {
        debug!("Put file {}", filename.as_ref());
        let options = self.options;
        self.apply_transfer_settings(&options)?;
        let pending = self.prepare_data_connection(&options)?;
        self.send_with(pending, Command::Store(filename.as_ref().to_string()), r)
    }

    // -- transfer internals

    /// Issue `TYPE` and `MODE` only when they differ from what the server last accepted
    pub(crate) fn apply_transfer_settings(&mut self, options: &TransferOptions) -> FtpResult<()> {
        if self.current_type != Some(options.file_type()) {
            self.transfer_type(options.file_type())?;
        }
        if self.current_framing != options.framing() {
            self.transfer_framing(options.framing())?;
        }
        Ok(())
    }

    /// Ask the server to start the next transfer at `offset`
    pub(crate) fn resume_transfer(&mut self, offset: u64) -> FtpResult<()> {
        debug!("Requesting to resume transfer at offset {}", offset);
        self.execute(Command::Rest(offset))?;
        debug!("Resume transfer accepted");
        Ok(())
    }

    /// Send a transfer command on a prepared data connection and copy the data received into
    /// `writer`. The completion reply is always read, even when the copy fails.
    pub(crate) fn receive_with<W: Write>(
        &mut self,
        pending: PendingDataConnection,
        command: Command,
        writer: &mut W,
    ) -> FtpResult<u64> {
        let mut stream = self.open_data_stream(pending, command)?;
        let received = framing::decode(
            self.current_framing,
            framing::filler(self.current_type.unwrap_or_default()),
            &mut stream,
            writer,
        );
        let completion = self.finalize_data_stream(stream);
        let bytes = received.map_err(FtpError::TransferError)?;
        completion?;
        trace!("received {bytes} bytes");
        Ok(bytes)
    }

    /// Send a transfer command on a prepared data connection and copy `reader` into it.
    /// The completion reply is always read, even when the copy fails.
    pub(crate) fn send_with<R: Read>(
        &mut self,
        pending: PendingDataConnection,
        command: Command,
        reader: &mut R,
    ) -> FtpResult<u64> {
        let mut stream = self.open_data_stream(pending, command)?;
        let sent = framing::encode(self.current_framing, reader, &mut stream);
        let completion = self.finalize_data_stream(stream);
        let bytes = sent.map_err(FtpError::TransferError)?;
        completion?;
        trace!("sent {bytes} bytes");
        Ok(bytes)
    }

    /// Send the transfer command; the data connection is established only once the server
    /// accepted it with a preliminary reply.
    fn open_data_stream(
        &mut self,
        pending: PendingDataConnection,
        command: Command,
    ) -> FtpResult<DataStream> {
        self.execute(command)?;
        match pending.establish() {
            Ok(stream) => Ok(stream),
            Err(err) => {
                self.discard_aborted_reply()?;
                Err(err)
            }
        }
    }

    /// The server accepted the transfer command but the data connection never came up:
    /// its completion reply (usually 425) is still due and must be consumed before the
    /// next command.
    fn discard_aborted_reply(&mut self) -> FtpResult<()> {
        let socket = self.get_ref();
        let previous = socket.read_timeout().map_err(FtpError::ConnectionError)?;
        if previous.is_none() {
            socket
                .set_read_timeout(Some(ABORTED_REPLY_TIMEOUT))
                .map_err(FtpError::ConnectionError)?;
        }
        // a reply that doesn't come is a connection error, which closes the stream
        let reply = self.read_reply();
        if !self.closed {
            self.get_ref()
                .set_read_timeout(previous)
                .map_err(FtpError::ConnectionError)?;
        }
        let reply = reply?;
        debug!("discarded reply of aborted transfer: {reply}");
        Ok(())
    }

    /// Close the data connection, then read the completion reply
    fn finalize_data_stream(&mut self, stream: DataStream) -> FtpResult<()> {
        // Drop stream NOTE: must be done first, otherwise server won't return any response
        drop(stream);
        trace!("dropped stream");
        self.read_response_in(TRANSFER_COMPLETE).map(|_| ())
    }

    // -- control channel

    /// Perform `command` and read the reply, which must be one of its success codes
    fn execute(&mut self, command: Command) -> FtpResult<Response> {
        let expected = command.success_codes();
        self.perform(command)?;
        self.read_response_in(expected)
    }

    fn perform(&mut self, command: Command) -> FtpResult<()> {
        if self.closed {
            return Err(FtpError::ConnectionError(
                std::io::ErrorKind::NotConnected.into(),
            ));
        }
        trace!("CC OUT: {}", command.loggable());

        let stream = self.reader.get_mut();
        let result = stream
            .write_all(command.to_string().as_bytes())
            .map_err(FtpError::ConnectionError);
        self.close_on_fatal(result)
    }

    fn read_response(&mut self, expected_code: Status) -> FtpResult<Response> {
        self.read_response_in(&[expected_code])
    }

    fn read_response_in(&mut self, expected_code: &[Status]) -> FtpResult<Response> {
        let response = self.read_reply()?;
        trace!("Code parsed from response: {} ({})", response.status, response.code);
        if expected_code.contains(&response.status) {
            Ok(response)
        } else {
            Err(FtpError::UnexpectedResponse(response))
        }
    }

    /// Read the next reply, whatever its code
    fn read_reply(&mut self) -> FtpResult<Response> {
        if self.closed {
            return Err(FtpError::ConnectionError(
                std::io::ErrorKind::NotConnected.into(),
            ));
        }
        let result = codec::read_response(&mut self.reader);
        self.close_on_fatal(result)
    }

    /// The control connection can't be trusted anymore after a fatal error
    fn close_on_fatal<T>(&mut self, result: FtpResult<T>) -> FtpResult<T> {
        if let Err(err) = &result {
            if err.is_session_fatal() {
                error!("control connection lost: {err}");
                self.close();
            }
        }
        result
    }

    fn close(&mut self) {
        if let Err(err) = self.reader.get_ref().shutdown(Shutdown::Both) {
            trace!("shutdown: {err}");
        }
        self.closed = true;
        self.authenticated = false;
    }
}

fn authentication_error(err: FtpError) -> FtpError {
    match err {
        FtpError::UnexpectedResponse(response) => FtpError::AuthenticationError(response),
        err => err,
    }
}

fn navigation_error(err: FtpError) -> FtpError {
    match err {
        FtpError::UnexpectedResponse(response) => FtpError::NavigationError(response),
        err => err,
    }
}

fn configuration_error(err: FtpError) -> FtpError {
    match err {
        FtpError::UnexpectedResponse(response) => FtpError::ConfigurationError(response),
        err => err,
    }
}

/// Split a listing into lines, dropping line terminators and empty lines
fn get_lines(buffer: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut reader = buffer;
    loop {
        let mut line_buf = vec![];
        match reader.read_until(b'\n', &mut line_buf) {
            Ok(0) | Err(_) => break,
            Ok(len) => {
                let line = String::from_utf8_lossy(&line_buf[..len]);
                let line = line.trim_end_matches(['\r', '\n']);
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
        }
    }
    lines
}
