//! Error types for the LibreOffice host.

use std::path::PathBuf;

use cellhue_core::HostError;
use libreoffice_urp::UrpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("URP protocol error: {0}")]
    Urp(#[from] UrpError),

    #[error("LibreOffice process error: {0}")]
    Process(String),

    #[error("Failed to spawn LibreOffice: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("LibreOffice executable {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("Connection timeout: LibreOffice did not start within {0} seconds")]
    Timeout(u64),

    #[error("Path {} cannot be expressed as a file URL", .0.display())]
    InvalidPath(PathBuf),

    #[error("LibreOffice could not load {url}")]
    WorkbookOpen {
        url: String,
        #[source]
        source: Option<UrpError>,
    },

    #[error("Sheet index {index} out of range, workbook has {count} sheet(s)")]
    NoSuchSheet { index: usize, count: usize },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl BridgeError {
    /// Whether the connection to the office is gone.
    pub fn is_disconnect(&self) -> bool {
        match self {
            BridgeError::Urp(e) => e.is_disconnect(),
            BridgeError::WorkbookOpen {
                source: Some(e), ..
            } => e.is_disconnect(),
            _ => false,
        }
    }

    /// Wrap as a host-trait error for `operation`.
    pub fn into_host_error(self, operation: &str) -> HostError {
        if self.is_disconnect() {
            HostError::unreachable(self)
        } else {
            HostError::failed(operation, self)
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
