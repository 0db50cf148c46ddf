use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopySide {
    Read,
    Write,
}

impl fmt::Display for CopySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("listing objects failed. container: {container}, marker: {marker:?}")]
    Listing {
        container: String,
        marker: Option<String>,
        #[source]
        source: anyhow::Error,
    },
    #[error("copying an object failed on the {side} side. container: {container}, name: {name}")]
    Copy {
        container: String,
        name: String,
        side: CopySide,
        #[source]
        source: anyhow::Error,
    },
    #[error("persisting a marker failed. path: {}", path.display())]
    MarkerWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cancelled")]
    Cancelled,
    #[error("a name references a parent directory.")]
    DirectoryTraversalError,
}

impl MigrateError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub fn is_cancelled_error(e: &anyhow::Error) -> bool {
    if let Some(err) = e.downcast_ref::<MigrateError>() {
        return err.is_cancelled();
    }

    false
}
