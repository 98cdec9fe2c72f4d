//! Report writer
//!
//! The text layout is line oriented and stable:
//!
//! ```text
//! # cellhue report
//! # source: Book.xlsx
//! # sheet 0: Sheet1
//! # cells: 1
//! A1	1	0,0,0	black	explicit	Hello
//! A1	2	255,0,0	red	explicit	World
//! ```
//!
//! Fields are tab separated: address, 1-based run number within the cell,
//! `r,g,b`, palette label, color source and the run text with `\\`, `\n`,
//! `\r` and `\t` escaped. The three `#` lines after the title repeat for
//! every sheet.

use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::classify::Classifier;
use crate::color::ColorSource;
use crate::error::{Error, Result};
use crate::walk::CellResult;

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{other}'")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
        })
    }
}

/// The cells extracted from one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReport {
    /// File name of the workbook the sheet came from.
    pub source: String,
    pub index: usize,
    pub name: String,
    pub cells: Vec<CellResult>,
}

/// All sheets of one run, in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub sheets: Vec<SheetReport>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sheet: SheetReport) {
        self.sheets.push(sheet);
    }

    /// Total number of runs over all sheets.
    pub fn run_count(&self) -> usize {
        self.sheets
            .iter()
            .flat_map(|s| &s.cells)
            .map(|c| c.runs.len())
            .sum()
    }
}

/// Renders a [`Report`], labelling every run with a [`Classifier`].
pub struct ReportWriter<'a> {
    classifier: &'a Classifier,
    format: ReportFormat,
}

impl<'a> ReportWriter<'a> {
    pub fn new(classifier: &'a Classifier, format: ReportFormat) -> Self {
        Self { classifier, format }
    }

    /// Write the report to `path`, replacing any existing file.
    ///
    /// The report is written to a temporary file next to `path` and renamed
    /// over it, so the target is either the complete new report or left as
    /// it was. Missing parent directories are created.
    pub fn write_file<P: AsRef<Path>>(&self, report: &Report, path: P) -> Result<()> {
        let path = path.as_ref();
        self.write_file_inner(report, path)
            .map_err(|source| Error::Report {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(
            path = %path.display(),
            format = %self.format,
            runs = report.run_count(),
            "report written"
        );
        Ok(())
    }

    fn write_file_inner(&self, report: &Report, path: &Path) -> io::Result<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            self.write(report, &mut out)?;
            out.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Render the report to any writer.
    pub fn write<W: Write>(&self, report: &Report, writer: W) -> io::Result<()> {
        match self.format {
            ReportFormat::Text => self.write_text(report, writer),
            ReportFormat::Json => self.write_json(report, writer),
        }
    }

    fn write_text<W: Write>(&self, report: &Report, mut w: W) -> io::Result<()> {
        writeln!(w, "# cellhue report")?;
        for sheet in &report.sheets {
            writeln!(w, "# source: {}", sheet.source)?;
            writeln!(w, "# sheet {}: {}", sheet.index, sheet.name)?;
            writeln!(w, "# cells: {}", sheet.cells.len())?;
            for cell in &sheet.cells {
                for (n, run) in cell.runs.iter().enumerate() {
                    writeln!(
                        w,
                        "{}\t{}\t{},{},{}\t{}\t{}\t{}",
                        cell.address,
                        n + 1,
                        run.color.r,
                        run.color.g,
                        run.color.b,
                        self.classifier.classify(run.color),
                        run.source,
                        escape(&run.text)
                    )?;
                }
            }
        }
        Ok(())
    }

    fn write_json<W: Write>(&self, report: &Report, mut w: W) -> io::Result<()> {
        let view = JsonReport {
            sheets: report
                .sheets
                .iter()
                .map(|sheet| JsonSheet {
                    source: &sheet.source,
                    index: sheet.index,
                    name: &sheet.name,
                    cells: sheet
                        .cells
                        .iter()
                        .map(|cell| JsonCell {
                            address: cell.address.to_string(),
                            runs: cell
                                .runs
                                .iter()
                                .map(|run| JsonRun {
                                    r: run.color.r,
                                    g: run.color.g,
                                    b: run.color.b,
                                    hex: run.color.to_string(),
                                    label: self.classifier.classify(run.color),
                                    is_black: run.color.is_black(),
                                    is_red: run.color.is_red(),
                                    is_blue: run.color.is_blue(),
                                    source: run.source,
                                    text: &run.text,
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        };
        serde_json::to_writer_pretty(&mut w, &view)?;
        writeln!(w)
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    sheets: Vec<JsonSheet<'a>>,
}

#[derive(Serialize)]
struct JsonSheet<'a> {
    source: &'a str,
    index: usize,
    name: &'a str,
    cells: Vec<JsonCell<'a>>,
}

#[derive(Serialize)]
struct JsonCell<'a> {
    address: String,
    runs: Vec<JsonRun<'a>>,
}

#[derive(Serialize)]
struct JsonRun<'a> {
    r: u8,
    g: u8,
    b: u8,
    hex: String,
    label: &'a str,
    is_black: bool,
    is_red: bool,
    is_blue: bool,
    source: ColorSource,
    text: &'a str,
}

/// Escape a run text for the tab-separated layout.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}
