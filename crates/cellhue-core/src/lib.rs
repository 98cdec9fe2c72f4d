//! # cellhue-core
//!
//! Host-independent core of cellhue: colored text-run extraction from
//! spreadsheet cells, color classification and report writing.
//!
//! - [`SheetSource`] - what the core needs from an office host
//! - [`extract_runs`] and [`walk_sheet`] - cell and sheet extraction
//! - [`Classifier`] - nearest-palette color naming
//! - [`ReportWriter`] - text and JSON reports
//! - [`MemorySheet`] - an in-memory host
//!
//! ## Example
//!
//! ```rust
//! use cellhue_core::{
//!     walk_sheet, CellAddress, Classifier, ExtractOptions, MemorySheet, Portion, Report,
//!     ReportFormat, ReportWriter, Rgb, SheetReport,
//! };
//!
//! # tokio_test_block(async {
//! let mut sheet = MemorySheet::new("Sheet1");
//! sheet.set_portions(
//!     CellAddress::new(0, 0),
//!     vec![Portion::colored("Hello ", Rgb::BLACK), Portion::colored("World", Rgb::new(255, 0, 0))],
//! );
//!
//! let cells = walk_sheet(&mut sheet, &ExtractOptions::default()).await.unwrap();
//! let report = Report {
//!     sheets: vec![SheetReport { source: "Book.xlsx".into(), index: 0, name: "Sheet1".into(), cells }],
//! };
//!
//! let classifier = Classifier::default();
//! let mut out = Vec::new();
//! ReportWriter::new(&classifier, ReportFormat::Text).write(&report, &mut out).unwrap();
//! assert!(String::from_utf8(out).unwrap().contains("A1\t2\t255,0,0\tred\texplicit\tWorld"));
//! # });
//! # fn tokio_test_block<F: std::future::Future<Output = ()>>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod address;
pub mod classify;
pub mod color;
pub mod error;
pub mod extract;
pub mod host;
pub mod memory;
pub mod report;
pub mod walk;

pub use address::{CellAddress, CellRange};
pub use classify::{Classifier, ClassifierConfig, Metric, Palette, TieBreak, OTHER_LABEL};
pub use color::{ColorSource, Rgb};
pub use error::{BoxError, Error, HostError, Result, WalkError};
pub use extract::{coalesce, extract_runs, ExtractOptions, TextRun};
pub use host::SheetSource;
pub use memory::{MemorySheet, Portion};
pub use report::{Report, ReportFormat, ReportWriter, SheetReport};
pub use walk::{walk_sheet, CellResult};
