use std::path::PathBuf;
use std::str::FromStr;

use mirrorftp::types::{FileType, TransferFraming};
use mirrorftp::Mode;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Cdup,
    Connect(String),
    Cwd(String),
    Framing(TransferFraming),
    Get(String, PathBuf),
    Help,
    List(Option<String>),
    Login,
    Mkdir(String),
    Mode(Mode),
    Noop,
    Put(PathBuf, String),
    Pwd,
    Quit,
    Rm(String),
    Size(String),
    Type(FileType),
}

impl FromStr for Command {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split string by space
        let mut args = s.split_ascii_whitespace();
        // Match args
        match args.next() {
            Some(cmd) => match cmd.to_ascii_uppercase().as_str() {
                "CDUP" => Ok(Self::Cdup),
                "CONNECT" => match args.next() {
                    Some(addr) => Ok(Self::Connect(addr.to_string())),
                    None => Err("Missing `addr` field"),
                },
                "CWD" => match args.next() {
                    Some(p) => Ok(Self::Cwd(p.to_string())),
                    None => Err("Missing `dir` field"),
                },
                "FRAMING" => match args.next().map(|x| x.to_ascii_uppercase()).as_deref() {
                    Some("STREAM") => Ok(Self::Framing(TransferFraming::Stream)),
                    Some("BLOCK") => Ok(Self::Framing(TransferFraming::Block)),
                    Some("COMPRESSED") => Ok(Self::Framing(TransferFraming::Compressed)),
                    Some(_) => Err("Invalid framing"),
                    None => Err("Missing `framing` field"),
                },
                "GET" => {
                    let remote: String = match args.next() {
                        Some(f) => f.to_string(),
                        None => return Err("Missing `remote` field"),
                    };
                    match args.next() {
                        Some(d) => Ok(Self::Get(remote, PathBuf::from(d))),
                        None => Err("Missing `local` field"),
                    }
                }
                "HELP" => Ok(Self::Help),
                "LIST" => match args.next() {
                    Some(dir) => Ok(Self::List(Some(dir.to_string()))),
                    None => Ok(Self::List(None)),
                },
                "LOGIN" => Ok(Self::Login),
                "MKDIR" => match args.next() {
                    Some(dir) => Ok(Self::Mkdir(dir.to_string())),
                    None => Err("Missing `dir` field"),
                },
                "MODE" => match args.next().map(|x| x.to_ascii_uppercase()).as_deref() {
                    Some("ACTIVE") => Ok(Self::Mode(Mode::Active)),
                    Some("PASSIVE") => Ok(Self::Mode(Mode::Passive)),
                    Some(_) => Err("Invalid mode"),
                    None => Err("Missing `mode` field"),
                },
                "NOOP" => Ok(Self::Noop),
                "PUT" => {
                    let local: PathBuf = match args.next() {
                        Some(l) => PathBuf::from(l),
                        None => return Err("Missing `local` field"),
                    };
                    match args.next() {
                        Some(d) => Ok(Self::Put(local, d.to_string())),
                        None => Err("Missing `remote` field"),
                    }
                }
                "PWD" => Ok(Self::Pwd),
                "QUIT" => Ok(Self::Quit),
                "RM" => match args.next() {
                    Some(file) => Ok(Self::Rm(file.to_string())),
                    None => Err("Missing `file` field"),
                },
                "SIZE" => match args.next() {
                    Some(file) => Ok(Self::Size(file.to_string())),
                    None => Err("Missing `file` field"),
                },
                "TYPE" => match args.next().map(|x| x.to_ascii_uppercase()).as_deref() {
                    Some("ASCII") => Ok(Self::Type(FileType::Ascii)),
                    Some("BINARY") => Ok(Self::Type(FileType::Binary)),
                    Some(_) => Err("Invalid type"),
                    None => Err("Missing `type` field"),
                },
                _ => Err("Unknown command"),
            },
            None => Err("Unknown command"),
        }
    }
}
