//! # Framing
//!
//! Contents of the data connection in block (`MODE B`) and compressed (`MODE C`) transfer framing.
//! Stream framing is the identity: the end of file is the end of the connection.

use std::io::{self, ErrorKind, Read, Write};

use crate::types::{FileType, TransferFraming};

/// Descriptor bit: the block ends a record
const DESC_END_OF_RECORD: u8 = 0x80;
/// Descriptor bit: the block is the last one of the file
const DESC_END_OF_FILE: u8 = 0x40;
/// Descriptor bit: the block carries a restart marker, not data
const DESC_RESTART_MARKER: u8 = 0x10;

/// Payload carried by each block we send
const BLOCK_PAYLOAD: usize = 16 * 1024;
/// Longest run of literal bytes in compressed framing
const MAX_LITERAL: usize = 0x7f;
/// Longest replicated run in compressed framing
const MAX_REPLICATED: usize = 0x3f;

/// Byte implied by a filler sequence in compressed framing
pub fn filler(file_type: FileType) -> u8 {
    match file_type {
        FileType::Ascii => b' ',
        FileType::Binary => 0x00,
    }
}

/// Copy the contents read from a data connection into `writer`, removing the framing.
///
/// Returns the amount of payload bytes written.
pub fn decode<R, W>(framing: TransferFraming, filler: u8, reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: Read,
    W: Write,
{
    match framing {
        TransferFraming::Stream => io::copy(reader, writer),
        TransferFraming::Block => decode_blocks(reader, writer),
        TransferFraming::Compressed => decode_compressed(filler, reader, writer),
    }
}

/// Copy `reader` into a data connection, adding the framing.
///
/// Returns the amount of payload bytes read from `reader`.
pub fn encode<R, W>(framing: TransferFraming, reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: Read,
    W: Write,
{
    let bytes = match framing {
        TransferFraming::Stream => io::copy(reader, writer)?,
        TransferFraming::Block => encode_blocks(reader, writer)?,
        TransferFraming::Compressed => encode_compressed(reader, writer)?,
    };
    writer.flush()?;
    Ok(bytes)
}

fn decode_blocks<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<u64> {
    let mut written = 0;
    let mut header = [0u8; 3];
    // some servers close the connection instead of sending an EOF block
    while fill_or_eof(reader, &mut header)? {
        let descriptor = header[0];
        let count = u64::from(u16::from_be_bytes([header[1], header[2]]));
        let mut block = reader.by_ref().take(count);
        if descriptor & DESC_RESTART_MARKER != 0 {
            io::copy(&mut block, &mut io::sink())?;
        } else {
            written += io::copy(&mut block, writer)?;
        }
        if block.limit() > 0 {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "truncated block"));
        }
        if descriptor & DESC_END_OF_RECORD != 0 {
            trace!("end of record");
        }
        if descriptor & DESC_END_OF_FILE != 0 {
            break;
        }
    }
    Ok(written)
}

fn encode_blocks<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<u64> {
    let mut buffer = vec![0u8; BLOCK_PAYLOAD];
    let mut total = 0;
    loop {
        let read = read_some(reader, &mut buffer)?;
        if read == 0 {
            break;
        }
        let [hi, lo] = (read as u16).to_be_bytes();
        writer.write_all(&[0, hi, lo])?;
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
    writer.write_all(&[DESC_END_OF_FILE, 0, 0])?;
    Ok(total)
}

fn decode_compressed<R: Read, W: Write>(filler: u8, reader: &mut R, writer: &mut W) -> io::Result<u64> {
    let mut written = 0;
    let mut byte = [0u8; 1];
    while fill_or_eof(reader, &mut byte)? {
        match byte[0] {
            0x00 => {
                // escape sequence, followed by a descriptor
                if !fill_or_eof(reader, &mut byte)? {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "truncated escape sequence"));
                }
                if byte[0] & DESC_END_OF_FILE != 0 {
                    break;
                }
            }
            header if header & 0x80 == 0 => {
                let count = u64::from(header & 0x7f);
                let mut literal = reader.by_ref().take(count);
                written += io::copy(&mut literal, writer)?;
                if literal.limit() > 0 {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "truncated literal run"));
                }
            }
            header if header & 0xc0 == 0x80 => {
                let count = usize::from(header & 0x3f);
                if !fill_or_eof(reader, &mut byte)? {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "truncated replicated run"));
                }
                writer.write_all(&vec![byte[0]; count])?;
                written += count as u64;
            }
            header => {
                let count = usize::from(header & 0x3f);
                writer.write_all(&vec![filler; count])?;
                written += count as u64;
            }
        }
    }
    Ok(written)
}

fn encode_compressed<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<u64> {
    let mut buffer = vec![0u8; BLOCK_PAYLOAD];
    let mut total = 0;
    loop {
        let read = read_some(reader, &mut buffer)?;
        if read == 0 {
            break;
        }
        compress_chunk(&buffer[..read], writer)?;
        total += read as u64;
    }
    writer.write_all(&[0x00, DESC_END_OF_FILE])?;
    Ok(total)
}

/// Runs of 3 or more equal bytes are replicated; everything else is sent as literals
fn compress_chunk<W: Write>(chunk: &[u8], writer: &mut W) -> io::Result<()> {
    let mut literal_start = 0;
    let mut i = 0;
    while i < chunk.len() {
        let run = chunk[i..]
            .iter()
            .take(MAX_REPLICATED)
            .take_while(|b| **b == chunk[i])
            .count();
        if run >= 3 {
            write_literals(&chunk[literal_start..i], writer)?;
            writer.write_all(&[0x80 | run as u8, chunk[i]])?;
            i += run;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    write_literals(&chunk[literal_start..], writer)
}

fn write_literals<W: Write>(bytes: &[u8], writer: &mut W) -> io::Result<()> {
    for part in bytes.chunks(MAX_LITERAL) {
        writer.write_all(&[part.len() as u8])?;
        writer.write_all(part)?;
    }
    Ok(())
}

/// Fill `buf` entirely. Returns `false` if the stream ended before the first byte.
fn fill_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::Error::new(ErrorKind::UnexpectedEof, "truncated header")),
            Ok(read) => filled += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
