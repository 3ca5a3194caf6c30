//! # Codec
//!
//! Framing of control channel replies and of the addresses exchanged in `PASV` and `PORT`

use std::io::BufRead;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::regex::PASV_PORT_RE;
use crate::types::{FtpError, FtpResult, Response};

/// Read one complete reply from `reader`.
///
/// A reply is either a single `NNN text` line or a multi-line reply opened by `NNN-text`
/// and closed by the first line starting with the same code followed by a space.
pub fn read_response<R: BufRead>(reader: &mut R) -> FtpResult<Response> {
    let mut line = Vec::new();
    read_line(reader, &mut line)?;
    trace!("CC IN: {:?}", String::from_utf8_lossy(&line));
    let code = code_from_line(&line)?;
    let mut body = line.clone();

    match line.get(3) {
        Some(b'-') => {
            // multiple line reply
            let prefix = [line[0], line[1], line[2]];
            loop {
                line.clear();
                read_line(reader, &mut line)?;
                trace!("CC IN: {:?}", String::from_utf8_lossy(&line));
                body.extend_from_slice(&line);
                if is_last_line(&line, &prefix) {
                    break;
                }
            }
        }
        Some(b' ') | Some(b'\r') | Some(b'\n') => {}
        _ => {
            return Err(FtpError::ProtocolError(format!(
                "bad reply separator in {:?}",
                String::from_utf8_lossy(&line)
            )))
        }
    }

    Ok(Response::new(code, body))
}

/// Parse the `(h1,h2,h3,h4,p1,p2)` tuple of a `PASV` reply.
///
/// The returned address is the one advertised by the server; the port is `p1 * 256 + p2`.
pub fn parse_passive_address(response: &Response) -> FtpResult<SocketAddr> {
    let response_str = String::from_utf8_lossy(&response.body);
    trace!("PASV response: {}", response_str.trim_end());
    let caps = PASV_PORT_RE
        .captures(&response_str)
        .ok_or_else(|| FtpError::UnexpectedResponse(response.clone()))?;
    let mut fields = [0u8; 6];
    for (i, field) in fields.iter_mut().enumerate() {
        *field = caps[i + 1]
            .parse::<u8>()
            .map_err(|_| FtpError::UnexpectedResponse(response.clone()))?;
    }
    let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = (u16::from(fields[4]) << 8) | u16::from(fields[5]);

    Ok(SocketAddr::new(ip.into(), port))
}

/// Encode `addr` as the `h1,h2,h3,h4,p1,p2` argument of a `PORT` command
pub fn encode_port_argument(addr: SocketAddr) -> FtpResult<String> {
    let ip = match addr.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(ip) => ip.to_ipv4_mapped().ok_or_else(|| {
            FtpError::DataChannelError(format!("PORT cannot advertise IPv6 address {ip}"))
        })?,
    };
    let [h1, h2, h3, h4] = ip.octets();
    let msb = addr.port() / 256;
    let lsb = addr.port() % 256;

    Ok(format!("{h1},{h2},{h3},{h4},{msb},{lsb}"))
}

/// Read bytes from reader until 0x0A. The stream ending before the line does is a protocol error.
fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> FtpResult<usize> {
    let read = reader
        .read_until(0x0A, line)
        .map_err(FtpError::ConnectionError)?;
    if read == 0 || !line.ends_with(b"\n") {
        return Err(FtpError::ProtocolError(
            "stream closed before a complete reply was read".to_string(),
        ));
    }
    Ok(read)
}

/// Get the 3-digit code at the beginning of a reply line
fn code_from_line(line: &[u8]) -> FtpResult<u32> {
    let digits = line
        .get(0..3)
        .filter(|digits| digits.iter().all(u8::is_ascii_digit))
        .ok_or_else(|| {
            FtpError::ProtocolError(format!(
                "reply doesn't start with a code: {:?}",
                String::from_utf8_lossy(line)
            ))
        })?;
    Ok(digits
        .iter()
        .fold(0, |code, digit| code * 10 + u32::from(digit - b'0')))
}

/// Whether `line` closes a multi-line reply opened with `prefix`
fn is_last_line(line: &[u8], prefix: &[u8; 3]) -> bool {
    line.starts_with(prefix)
        && matches!(line.get(3), Some(b' ') | Some(b'\r') | Some(b'\n'))
}
