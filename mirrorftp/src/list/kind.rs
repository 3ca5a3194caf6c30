use std::path::{Path, PathBuf};

/// Describes the kind of a listed entry. Can be `Directory`, `File` or `Symlink`.
/// If `Symlink` the path to the pointed file is provided, when the listing reports it.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum EntryKind {
    /// Directory type
    Directory,
    /// Regular file type
    File,
    /// Symlink type with the path to the pointed file
    Symlink(Option<PathBuf>),
}

impl EntryKind {
    /// Kind described by the first character of a permission string (`d`, `l` or anything else)
    pub fn from_permissions(permissions: &str) -> Self {
        match permissions.chars().next() {
            Some('d') => Self::Directory,
            Some('l') => Self::Symlink(None),
            _ => Self::File,
        }
    }

    /// Returns whether the entry is a directory
    pub fn is_directory(&self) -> bool {
        matches!(self, &EntryKind::Directory)
    }

    /// Returns whether the entry is a file
    pub fn is_file(&self) -> bool {
        matches!(self, &EntryKind::File)
    }

    /// Returns whether the entry is a symlink
    pub fn is_symlink(&self) -> bool {
        matches!(self, &EntryKind::Symlink(_))
    }

    /// get symlink target if any
    pub fn symlink(&self) -> Option<&Path> {
        match self {
            EntryKind::Symlink(Some(p)) => Some(p.as_path()),
            _ => None,
        }
    }
}
