//! # List
//!
//! This module exposes the parser for the output of the LIST command.
//! There's no specification regarding the LIST command output, so the parser only understands
//! the common Unix `ls -l` layout:
//!
//! ```text
//! drwxr-xr-x 2 user group 4096 Jan 5 10:00 mydir
//! -rw-r--r-- 1 user group 8192 Nov 5 2018 my file.txt
//! ```
//!
//! Each line is split on whitespace; everything after the eighth field is the file name.
//!
//! ```rust
//! use std::str::FromStr;
//! use mirrorftp::list::RemoteEntry;
//!
//! let entry = RemoteEntry::from_str("drwxr-xr-x 2 user group 4096 Jan 5 10:00 mydir").unwrap();
//! assert!(entry.is_directory());
//! assert_eq!(entry.size(), 4096);
//! assert_eq!(entry.name(), "mydir");
//! ```

mod kind;

use std::convert::TryFrom;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::prelude::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono::Datelike;
use thiserror::Error;

pub use kind::EntryKind;

/// Minimum amount of whitespace separated fields in a listing line
const MIN_FIELDS: usize = 9;

/// Month abbreviations, in calendar order
const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

// -- Entry

/// Describes an entry on the remote system, as reported by one line of a LIST output
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct RemoteEntry {
    /// File name
    name: String,
    /// Whether it is a directory, a file or a symlink
    kind: EntryKind,
    /// Permission string, e.g. `drwxr-xr-x`
    permissions: String,
    /// Hard link count
    links: u64,
    /// Owner user
    owner: String,
    /// Owner group
    group: String,
    /// File size in bytes
    size: u64,
    /// Last time the file was modified
    modified: NaiveDateTime,
}

// -- Error

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("Syntax error: expected at least 9 fields, got {0}")]
    TooFewFields(usize),
    #[error("Bad link count: {0}")]
    BadLinkCount(String),
    #[error("Bad file size: {0}")]
    BadSize(String),
    #[error("Unknown month: {0}")]
    UnknownMonth(String),
    #[error("Invalid date")]
    InvalidDate,
}

impl RemoteEntry {
    // -- getters

    /// Get file name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get the entry kind
    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Get whether entry is a directory
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Get whether entry is a file
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Get whether entry is a symlink
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }

    /// Returns, if available, the file the symlink is pointing to
    pub fn symlink(&self) -> Option<&Path> {
        self.kind.symlink()
    }

    /// Returns the permission string
    pub fn permissions(&self) -> &str {
        self.permissions.as_str()
    }

    /// Returns the hard link count
    pub fn links(&self) -> u64 {
        self.links
    }

    /// Returns the owner user
    pub fn owner(&self) -> &str {
        self.owner.as_str()
    }

    /// Returns the owner group
    pub fn group(&self) -> &str {
        self.group.as_str()
    }

    /// Returned file size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the last time the file was modified
    pub fn modified(&self) -> NaiveDateTime {
        self.modified
    }

    // -- parsers

    /// Parse a LIST output line. When the line carries a time instead of a year,
    /// the current year is assumed.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        Self::parse_line_in_year(line, Utc::now().year())
    }

    fn parse_line_in_year(line: &str, current_year: i32) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            return Err(ParseError::TooFewFields(fields.len()));
        }
        let permissions = fields[0].to_string();
        let links = fields[1]
            .parse::<u64>()
            .map_err(|_| ParseError::BadLinkCount(fields[1].to_string()))?;
        let size = fields[4]
            .parse::<u64>()
            .map_err(|_| ParseError::BadSize(fields[4].to_string()))?;
        let modified = Self::parse_timestamp(fields[5], fields[6], fields[7], current_year)?;
        let name = fields[MIN_FIELDS - 1..].join(" ");
        let (name, kind) = match EntryKind::from_permissions(&permissions) {
            EntryKind::Symlink(_) => {
                let (name, target) = Self::get_name_and_link(&name);
                (name, EntryKind::Symlink(target))
            }
            kind => (name, kind),
        };
        trace!(
            "Found entry with name {}, kind: {:?}, size: {}, modified: {}",
            name,
            kind,
            size,
            modified
        );

        Ok(Self {
            name,
            kind,
            permissions,
            links,
            owner: fields[2].to_string(),
            group: fields[3].to_string(),
            size,
            modified,
        })
    }

    /// Map a month abbreviation to its number (1-12)
    fn month_number(abbr: &str) -> Result<u32, ParseError> {
        let lower = abbr.to_ascii_lowercase();
        MONTHS
            .iter()
            .position(|m| *m == lower)
            .map(|i| i as u32 + 1)
            .ok_or_else(|| ParseError::UnknownMonth(abbr.to_string()))
    }

    /// Parse `Mon DD HH:MM` or `Mon DD YYYY`
    fn parse_timestamp(
        month: &str,
        day: &str,
        time_or_year: &str,
        current_year: i32,
    ) -> Result<NaiveDateTime, ParseError> {
        let month = Self::month_number(month)?;
        let day = day.parse::<u32>().map_err(|_| ParseError::InvalidDate)?;
        let (year, time) = match time_or_year.split_once(':') {
            Some((hours, minutes)) => {
                let hours = hours.parse::<u32>().map_err(|_| ParseError::InvalidDate)?;
                let minutes = minutes.parse::<u32>().map_err(|_| ParseError::InvalidDate)?;
                let time =
                    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or(ParseError::InvalidDate)?;
                (current_year, time)
            }
            None => {
                let year = time_or_year
                    .parse::<i32>()
                    .map_err(|_| ParseError::InvalidDate)?;
                (year, NaiveTime::default())
            }
        };
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(ParseError::InvalidDate)?;

        Ok(NaiveDateTime::new(date, time))
    }

    /// Get name and link from symlink name (`name -> target`)
    fn get_name_and_link(token: &str) -> (String, Option<PathBuf>) {
        match token.split_once(" -> ") {
            Some((name, target)) => (name.to_string(), Some(PathBuf::from(target))),
            None => (token.to_string(), None),
        }
    }
}

impl FromStr for RemoteEntry {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

impl TryFrom<&str> for RemoteEntry {
    type Error = ParseError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        Self::parse_line(line)
    }
}

impl TryFrom<String> for RemoteEntry {
    type Error = ParseError;

    fn try_from(line: String) -> Result<Self, Self::Error> {
        Self::parse_line(line.as_str())
    }
}

/// Parse every line of a LIST output.
///
/// Lines which can't be parsed (e.g. the `total N` header) are skipped; so are the `.` and `..` entries.
pub fn parse_listing<S: AsRef<str>>(lines: &[S]) -> Vec<RemoteEntry> {
    lines
        .iter()
        .filter_map(|line| match RemoteEntry::parse_line(line.as_ref()) {
            Ok(entry) => Some(entry),
            Err(ParseError::TooFewFields(_)) => {
                trace!("Skipping listing line {:?}", line.as_ref());
                None
            }
            Err(err) => {
                debug!("Could not parse listing line {:?}: {}", line.as_ref(), err);
                None
            }
        })
        .filter(|entry| entry.name() != "." && entry.name() != "..")
        .collect()
}
