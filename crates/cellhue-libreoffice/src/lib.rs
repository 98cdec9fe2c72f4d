//! LibreOffice host for cellhue.
//!
//! Opens workbooks in a running (or spawned) LibreOffice over the UNO
//! Remote Protocol and exposes each worksheet as a
//! [`SheetSource`](cellhue_core::SheetSource): cell text comes from
//! `XTextRange`, paragraphs and text portions from `XEnumerationAccess`,
//! and portion colors from the `CharColor` property.
//!
//! # Architecture
//!
//! ```text
//! cellhue-core walker / extractor
//!     └── Sheet (this crate, SheetSource)
//!           └── UrpConnection (libreoffice-urp crate)
//!                 └── TCP socket to LibreOffice
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use cellhue_core::{walk_sheet, ExtractOptions};
//! use cellhue_libreoffice::LibreOfficeBridge;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut bridge = LibreOfficeBridge::connect("localhost", 2002).await?;
//!
//! let mut wb = bridge.open_workbook(Path::new("Book.xlsx")).await?;
//! let mut sheet = wb.sheet(0).await?;
//! let cells = walk_sheet(&mut sheet, &ExtractOptions::default()).await?;
//! println!("{} non-empty cells", cells.len());
//! drop(sheet);
//!
//! wb.close().await?;
//! bridge.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod error;
pub mod workbook;

pub use bridge::{LibreOfficeBridge, LibreOfficeConfig};
pub use error::BridgeError;
pub use workbook::{Sheet, Workbook};
