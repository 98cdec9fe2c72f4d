//! Error types for cellhue-core

use std::path::PathBuf;

use thiserror::Error;

use crate::address::CellAddress;

/// Boxed error from a host implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`SheetSource`](crate::host::SheetSource).
#[derive(Debug, Error)]
pub enum HostError {
    /// The host process is gone or never answered.
    #[error("office host unreachable")]
    Unreachable(#[source] BoxError),

    /// The host answered, but the operation failed.
    #[error("host call {operation} failed")]
    Failed {
        operation: String,
        #[source]
        source: BoxError,
    },
}

impl HostError {
    pub fn unreachable(source: impl Into<BoxError>) -> Self {
        HostError::Unreachable(source.into())
    }

    pub fn failed(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        HostError::Failed {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, HostError::Unreachable(_))
    }
}

/// A sheet walk that stopped before finishing.
#[derive(Debug, Error)]
#[error("sheet walk aborted{}", .address.map(|a| format!(" at {a}")).unwrap_or_default())]
pub struct WalkError {
    /// Cell being read when the host failed; `None` before the first cell.
    pub address: Option<CellAddress>,
    #[source]
    pub source: HostError,
}

/// Errors that end a cellhue run
#[derive(Debug, Error)]
pub enum Error {
    /// Input workbook does not exist
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Office host could not be reached
    #[error("cannot reach office host at {endpoint}")]
    HostUnreachable {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    /// Office host could not open the workbook
    #[error("cannot open workbook {}", .path.display())]
    WorkbookOpen {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Host failed while walking a sheet
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// Report could not be written
    #[error("cannot write report to {}", .path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed `RRGGBB` color
    #[error("invalid color '{0}', expected RRGGBB")]
    InvalidColor(String),

    /// Malformed `name=RRGGBB` palette list
    #[error("invalid palette: {0}")]
    InvalidPalette(String),
}
