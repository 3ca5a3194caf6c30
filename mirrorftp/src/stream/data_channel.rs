//! # Data channel
//!
//! Negotiation of the connection carrying file contents and listings, in passive (`PASV`)
//! or active (`PORT`) mode.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use super::{DataStream, FtpStream};
use crate::codec;
use crate::command::Command;
use crate::options::TransferOptions;
use crate::types::{FtpError, FtpResult, Mode};
use crate::Status;

/// Interval between two accept attempts in active mode
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A data connection prepared before the transfer command is sent.
///
/// In passive mode the connection is already dialled; in active mode the server connects
/// back once it accepted the transfer command, so nothing is waited for until then.
#[derive(Debug)]
pub(crate) enum PendingDataConnection {
    Connected(TcpStream),
    Listening {
        listener: TcpListener,
        timeout: Duration,
    },
}

impl PendingDataConnection {
    /// Complete the connection. Must be called only after the server replied 1xx to the
    /// transfer command.
    pub fn establish(self) -> FtpResult<DataStream> {
        match self {
            Self::Connected(stream) => Ok(DataStream::new(stream)),
            Self::Listening { listener, timeout } => {
                let stream = accept_within(&listener, timeout)?;
                Ok(DataStream::new(stream))
            }
        }
    }
}

impl FtpStream {
    /// Prepare the data connection for the next transfer command, according to `options`
    pub(crate) fn prepare_data_connection(
        &mut self,
        options: &TransferOptions,
    ) -> FtpResult<PendingDataConnection> {
        match options.mode() {
            Mode::Passive => self.passive(options.passive_retries()),
            Mode::Active => self.active(options.active_timeout()),
        }
    }

    /// Send `PASV` and dial the advertised port on the control connection's peer.
    ///
    /// The IP in the reply is ignored: servers behind NAT often advertise their private address.
    fn passive(&mut self, retries: usize) -> FtpResult<PendingDataConnection> {
        let mut attempt = 0;
        let advertised = loop {
            debug!("PASV command");
            self.perform(Command::Pasv)?;
            let response = self.read_reply()?;
            if response.status != Status::PassiveMode {
                return Err(FtpError::DataChannelError(format!(
                    "PASV refused: {response}"
                )));
            }
            match codec::parse_passive_address(&response) {
                Ok(addr) => break addr,
                Err(_) if attempt < retries => {
                    attempt += 1;
                    warn!("malformed PASV reply {response}; retrying ({attempt}/{retries})");
                }
                Err(_) => {
                    return Err(FtpError::DataChannelError(format!(
                        "malformed PASV reply after {retries} retries: {response}"
                    )))
                }
            }
        };

        let mut addr = self.peer_addr()?;
        addr.set_port(advertised.port());
        if advertised.ip() != addr.ip() {
            debug!(
                "server advertised {}; connecting to {} instead",
                advertised.ip(),
                addr.ip()
            );
        }
        trace!("Connecting to data channel at {addr}");
        TcpStream::connect(addr)
            .map(PendingDataConnection::Connected)
            .map_err(|err| {
                FtpError::DataChannelError(format!("could not connect to {addr}: {err}"))
            })
    }

    /// Listen on an ephemeral port and announce it with `PORT`
    fn active(&mut self, timeout: Duration) -> FtpResult<PendingDataConnection> {
        debug!("Starting local tcp listener...");
        let listener = TcpListener::bind("0.0.0.0:0").map_err(data_channel_error)?;
        listener
            .set_nonblocking(true)
            .map_err(data_channel_error)?;
        let port = listener.local_addr().map_err(data_channel_error)?.port();
        let ip = self
            .get_ref()
            .local_addr()
            .map_err(FtpError::ConnectionError)?
            .ip();
        let argument = codec::encode_port_argument(SocketAddr::new(ip, port))?;
        debug!("Active mode, listening on {ip}:{port}");

        self.perform(Command::Port(argument))?;
        let response = self.read_reply()?;
        if response.status != Status::CommandOk {
            return Err(FtpError::DataChannelError(format!(
                "PORT refused: {response}"
            )));
        }

        Ok(PendingDataConnection::Listening { listener, timeout })
    }
}

/// Accept exactly one connection on a non-blocking listener, giving up after `timeout`
fn accept_within(listener: &TcpListener, timeout: Duration) -> FtpResult<TcpStream> {
    let start = Instant::now();
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                trace!("Accepted data connection from {addr}");
                // accepted sockets may inherit the non-blocking flag on some platforms
                stream.set_nonblocking(false).map_err(data_channel_error)?;
                break Ok(stream);
            }
            Err(ref err) if err.kind() == ErrorKind::WouldBlock => {
                if start.elapsed() > timeout {
                    break Err(FtpError::DataChannelError(format!(
                        "server did not connect within {}s",
                        timeout.as_secs_f32()
                    )));
                }
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => break Err(data_channel_error(err)),
        }
    }
}

fn data_channel_error(err: io::Error) -> FtpError {
    FtpError::DataChannelError(err.to_string())
}
