//! An in-memory [`SheetSource`], for tests and for callers that already hold
//! rich text without an office host.

use std::collections::BTreeMap;

use crate::address::{CellAddress, CellRange};
use crate::color::Rgb;
use crate::error::HostError;
use crate::host::SheetSource;

/// A uniformly formatted span; `color: None` means automatic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portion {
    pub text: String,
    pub color: Option<Rgb>,
}

impl Portion {
    pub fn colored(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
        }
    }

    pub fn automatic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }
}

/// A worksheet held in memory.
///
/// A cell set with no text still counts towards the used range, like a
/// formatted but empty cell in a real sheet.
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    name: String,
    cells: BTreeMap<CellAddress, Vec<Vec<Portion>>>,
    displayed: BTreeMap<CellAddress, String>,
    unreachable_at: Option<CellAddress>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_paragraphs(&mut self, address: CellAddress, paragraphs: Vec<Vec<Portion>>) {
        self.cells.insert(address, paragraphs);
    }

    /// Single-paragraph cell.
    pub fn set_portions(&mut self, address: CellAddress, portions: Vec<Portion>) {
        self.set_paragraphs(address, vec![portions]);
    }

    /// Plain text in automatic color; `\n` starts a new paragraph.
    pub fn set_text(&mut self, address: CellAddress, text: &str) {
        let paragraphs = text
            .split('\n')
            .map(|p| {
                if p.is_empty() {
                    Vec::new()
                } else {
                    vec![Portion::automatic(p)]
                }
            })
            .collect();
        self.set_paragraphs(address, paragraphs);
    }

    /// Text shown for the cell when it differs from the text its portions
    /// hold, as for a formula or a formatted number.
    pub fn set_displayed(&mut self, address: CellAddress, text: impl Into<String>) {
        self.cells.entry(address).or_default();
        self.displayed.insert(address, text.into());
    }

    /// Formatted but empty.
    pub fn set_blank(&mut self, address: CellAddress) {
        self.set_paragraphs(address, Vec::new());
    }

    /// Make every access to `address` fail as if the host went away.
    pub fn disconnect_at(&mut self, address: CellAddress) {
        self.unreachable_at = Some(address);
    }

    fn check(&self, address: CellAddress) -> Result<(), HostError> {
        if self.unreachable_at == Some(address) {
            return Err(HostError::unreachable(format!("host went away reading {address}")));
        }
        Ok(())
    }

    fn paragraphs_at(&self, address: CellAddress) -> &[Vec<Portion>] {
        self.cells.get(&address).map(Vec::as_slice).unwrap_or_default()
    }
}

impl SheetSource for MemorySheet {
    type Cell = CellAddress;
    type Portion = Portion;

    async fn sheet_name(&mut self) -> Result<String, HostError> {
        Ok(self.name.clone())
    }

    async fn used_range(&mut self) -> Result<Option<CellRange>, HostError> {
        let mut addresses = self.cells.keys();
        let Some(first) = addresses.next() else {
            return Ok(None);
        };
        let range = addresses.fold(CellRange::single(*first), |range, a| {
            CellRange::new(
                CellAddress::new(range.start.row.min(a.row), range.start.col.min(a.col)),
                CellAddress::new(range.end.row.max(a.row), range.end.col.max(a.col)),
            )
        });
        Ok(Some(range))
    }

    async fn cell(&mut self, address: CellAddress) -> Result<CellAddress, HostError> {
        self.check(address)?;
        Ok(address)
    }

    async fn cell_text(&mut self, cell: &CellAddress) -> Result<String, HostError> {
        self.check(*cell)?;
        if let Some(text) = self.displayed.get(cell) {
            return Ok(text.clone());
        }
        let paragraphs: Vec<String> = self
            .paragraphs_at(*cell)
            .iter()
            .map(|p| p.iter().map(|portion| portion.text.as_str()).collect())
            .collect();
        Ok(paragraphs.join("\n"))
    }

    async fn paragraphs(&mut self, cell: &CellAddress) -> Result<Vec<Vec<Portion>>, HostError> {
        self.check(*cell)?;
        Ok(self.paragraphs_at(*cell).to_vec())
    }

    async fn portion_text(&mut self, portion: &Portion) -> Result<String, HostError> {
        Ok(portion.text.clone())
    }

    async fn portion_color(&mut self, portion: &Portion) -> Result<Option<Rgb>, HostError> {
        Ok(portion.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn used_range_spans_all_set_cells() {
        let mut sheet = MemorySheet::new("S");
        assert_eq!(sheet.used_range().await.unwrap(), None);

        sheet.set_text(CellAddress::new(4, 1), "x");
        sheet.set_blank(CellAddress::new(1, 3));
        let range = sheet.used_range().await.unwrap().unwrap();
        assert_eq!(range.to_string(), "B2:D5");
    }

    #[tokio::test]
    async fn set_text_splits_paragraphs() {
        let mut sheet = MemorySheet::new("S");
        let at = CellAddress::new(0, 0);
        sheet.set_text(at, "one\n\ntwo");
        assert_eq!(sheet.cell_text(&at).await.unwrap(), "one\n\ntwo");
        assert_eq!(sheet.paragraphs(&at).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn displayed_text_overrides_portions() {
        let mut sheet = MemorySheet::new("S");
        let at = CellAddress::new(0, 0);
        sheet.set_portions(at, vec![Portion::automatic("=1+2")]);
        sheet.set_displayed(at, "3");
        assert_eq!(sheet.cell_text(&at).await.unwrap(), "3");
        assert_eq!(sheet.paragraphs(&at).await.unwrap()[0][0].text, "=1+2");
    }

    #[tokio::test]
    async fn disconnect_fails_reads() {
        let mut sheet = MemorySheet::new("S");
        let at = CellAddress::new(0, 0);
        sheet.set_text(at, "x");
        sheet.disconnect_at(at);
        assert!(sheet.cell(at).await.unwrap_err().is_unreachable());
    }
}
