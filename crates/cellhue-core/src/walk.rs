//! Walking a sheet's used range.

use serde::Serialize;

use crate::address::CellAddress;
use crate::color::ColorSource;
use crate::error::{HostError, WalkError};
use crate::extract::{extract_runs, ExtractOptions, TextRun};
use crate::host::SheetSource;

/// The runs of one non-empty cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellResult {
    pub address: CellAddress,
    pub runs: Vec<TextRun>,
}

impl CellResult {
    /// The cell text, rebuilt from its runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

impl Serialize for CellResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("CellResult", 2)?;
        s.serialize_field("address", &self.address.to_string())?;
        s.serialize_field("runs", &self.runs)?;
        s.end()
    }
}

/// Extract every non-empty cell of the used range, row by row.
///
/// Cells whose text is empty are skipped. Every cell handle is given back
/// to the host through [`SheetSource::release_cell`]. The first host error
/// ends the walk; nothing collected so far is returned.
pub async fn walk_sheet<S: SheetSource>(
    source: &mut S,
    options: &ExtractOptions,
) -> Result<Vec<CellResult>, WalkError> {
    let range = source
        .used_range()
        .await
        .map_err(|source| WalkError {
            address: None,
            source,
        })?;
    let Some(range) = range else {
        tracing::debug!("sheet is empty");
        return Ok(Vec::new());
    };
    tracing::debug!(%range, addresses = range.cell_count(), "walking used range");

    let mut results = Vec::new();
    for address in range.cells() {
        let at = |err| WalkError {
            address: Some(address),
            source: err,
        };
        let cell = source.cell(address).await.map_err(at)?;
        let read = read_cell(source, &cell, options).await;
        let released = source.release_cell(cell).await;
        let runs = read.map_err(at)?;
        released.map_err(at)?;

        let Some((text, runs)) = runs else {
            continue;
        };
        let runs = spell_out(runs, text, options, address);
        tracing::debug!("[{}] {address}: {} run(s)", results.len() + 1, runs.len());
        for (n, run) in runs.iter().enumerate() {
            tracing::trace!(
                run = n + 1,
                color = %run.color,
                source = %run.source,
                is_black = run.color.is_black(),
                is_red = run.color.is_red(),
                is_blue = run.color.is_blue(),
                "{address}"
            );
        }
        results.push(CellResult { address, runs });
    }
    tracing::debug!(cells = results.len(), "walk finished");
    Ok(results)
}

/// The cell text and its runs, or `None` for a cell without text.
async fn read_cell<S: SheetSource>(
    source: &mut S,
    cell: &S::Cell,
    options: &ExtractOptions,
) -> Result<Option<(String, Vec<TextRun>)>, HostError> {
    let text = source.cell_text(cell).await?;
    if text.is_empty() {
        return Ok(None);
    }
    let runs = extract_runs(source, cell, options).await?;
    Ok(Some((text, runs)))
}

/// Runs whose texts join to `text`.
///
/// The portions of a formula or a formatted number hold the input, not what
/// the cell shows. Such a cell becomes one run of its whole text, in the
/// color of its first run, or the fallback when it has none.
fn spell_out(
    runs: Vec<TextRun>,
    text: String,
    options: &ExtractOptions,
    address: CellAddress,
) -> Vec<TextRun> {
    let joined: String = runs.iter().map(|r| r.text.as_str()).collect();
    if joined == text {
        return runs;
    }
    tracing::debug!(%address, "text portions differ from the shown text");
    let (color, source) = runs
        .first()
        .map(|r| (r.color, r.source))
        .unwrap_or((options.fallback, ColorSource::Fallback));
    vec![TextRun {
        text,
        color,
        source,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorSource, Rgb};
    use crate::memory::{MemorySheet, Portion};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn row_major_and_skips_empty() {
        let mut sheet = MemorySheet::new("S");
        sheet.set_text(CellAddress::new(1, 0), "A2");
        sheet.set_text(CellAddress::new(0, 1), "B1");
        sheet.set_blank(CellAddress::new(0, 0));
        sheet.set_text(CellAddress::new(1, 1), "");

        let results = walk_sheet(&mut sheet, &ExtractOptions::default()).await.unwrap();
        let order: Vec<String> = results.iter().map(|r| r.address.to_string()).collect();
        assert_eq!(order, ["B1", "A2"]);
    }

    #[tokio::test]
    async fn empty_sheet_yields_nothing() {
        let mut sheet = MemorySheet::new("S");
        assert!(walk_sheet(&mut sheet, &ExtractOptions::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn host_failure_aborts_the_walk() {
        let mut sheet = MemorySheet::new("S");
        sheet.set_text(CellAddress::new(0, 0), "fine");
        sheet.set_text(CellAddress::new(2, 0), "never read");
        sheet.disconnect_at(CellAddress::new(1, 0));

        let err = walk_sheet(&mut sheet, &ExtractOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.address, Some(CellAddress::new(1, 0)));
        assert!(err.source.is_unreachable());
    }

    #[tokio::test]
    async fn shown_text_wins_over_portions() {
        let red = Rgb::new(255, 0, 0);
        let mut sheet = MemorySheet::new("S");
        let formula = CellAddress::new(0, 0);
        sheet.set_portions(formula, vec![Portion::colored("=1+2", red)]);
        sheet.set_displayed(formula, "3");
        let hollow = CellAddress::new(0, 1);
        sheet.set_portions(hollow, vec![Portion::automatic("")]);
        sheet.set_displayed(hollow, "12%");

        let options = ExtractOptions {
            fallback: Rgb::new(9, 9, 9),
            coalesce: false,
        };
        let results = walk_sheet(&mut sheet, &options).await.unwrap();
        assert_eq!(
            results,
            vec![
                CellResult {
                    address: formula,
                    runs: vec![TextRun {
                        text: "3".into(),
                        color: red,
                        source: ColorSource::Explicit,
                    }],
                },
                CellResult {
                    address: hollow,
                    runs: vec![TextRun {
                        text: "12%".into(),
                        color: Rgb::new(9, 9, 9),
                        source: ColorSource::Fallback,
                    }],
                },
            ]
        );
    }

    /// Records the cells handed back through `release_cell`.
    struct Releasing {
        sheet: MemorySheet,
        released: Vec<CellAddress>,
    }

    impl SheetSource for Releasing {
        type Cell = CellAddress;
        type Portion = Portion;

        async fn sheet_name(&mut self) -> Result<String, HostError> {
            self.sheet.sheet_name().await
        }

        async fn used_range(&mut self) -> Result<Option<crate::CellRange>, HostError> {
            self.sheet.used_range().await
        }

        async fn cell(&mut self, address: CellAddress) -> Result<CellAddress, HostError> {
            self.sheet.cell(address).await
        }

        async fn cell_text(&mut self, cell: &CellAddress) -> Result<String, HostError> {
            self.sheet.cell_text(cell).await
        }

        async fn paragraphs(&mut self, cell: &CellAddress) -> Result<Vec<Vec<Portion>>, HostError> {
            self.sheet.paragraphs(cell).await
        }

        async fn portion_text(&mut self, portion: &Portion) -> Result<String, HostError> {
            self.sheet.portion_text(portion).await
        }

        async fn portion_color(&mut self, portion: &Portion) -> Result<Option<Rgb>, HostError> {
            self.sheet.portion_color(portion).await
        }

        async fn release_cell(&mut self, cell: CellAddress) -> Result<(), HostError> {
            self.released.push(cell);
            Ok(())
        }
    }

    #[tokio::test]
    async fn every_visited_cell_is_released() {
        let mut sheet = MemorySheet::new("S");
        sheet.set_text(CellAddress::new(0, 0), "x");
        sheet.set_blank(CellAddress::new(0, 1));
        sheet.set_text(CellAddress::new(1, 1), "y");
        sheet.disconnect_at(CellAddress::new(1, 0));
        let mut host = Releasing {
            sheet,
            released: Vec::new(),
        };

        let err = walk_sheet(&mut host, &ExtractOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.address, Some(CellAddress::new(1, 0)));
        let released: Vec<String> = host.released.iter().map(|a| a.to_string()).collect();
        assert_eq!(released, ["A1", "B1"]);

        host.sheet = MemorySheet::new("S");
        host.sheet.set_text(CellAddress::new(0, 0), "x");
        host.sheet.set_blank(CellAddress::new(1, 0));
        host.released.clear();
        let results = walk_sheet(&mut host, &ExtractOptions::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(host.released.len(), 2);
    }

    #[tokio::test]
    async fn cell_result_serializes_address_as_a1() {
        let result = CellResult {
            address: CellAddress::new(9, 27),
            runs: vec![TextRun {
                text: "x".into(),
                color: Rgb::new(1, 2, 3),
                source: ColorSource::Explicit,
            }],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["address"], "AB10");
        assert_eq!(json["runs"][0]["source"], "explicit");
        assert_eq!(json["runs"][0]["color"]["g"], 2);

        let mut sheet = MemorySheet::new("S");
        sheet.set_portions(CellAddress::new(0, 0), vec![Portion::automatic("x")]);
        let walked = walk_sheet(&mut sheet, &ExtractOptions::default()).await.unwrap();
        assert_eq!(walked[0].text(), "x");
    }
}
