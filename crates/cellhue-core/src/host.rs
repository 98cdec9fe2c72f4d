//! The narrow interface the extractor and walker need from an office host.

use crate::address::{CellAddress, CellRange};
use crate::color::Rgb;
use crate::error::HostError;

/// Read-only access to one worksheet of an open workbook.
///
/// Cells and text portions are host handles; they are only meaningful to the
/// source that produced them. A cell's text is a sequence of paragraphs,
/// each a sequence of portions: contiguous, uniformly formatted spans in
/// document order. The host joins paragraphs with `\n` in the cell string.
#[allow(async_fn_in_trait)]
pub trait SheetSource {
    type Cell;
    type Portion;

    async fn sheet_name(&mut self) -> Result<String, HostError>;

    /// Bounds of all cells with content or formatting. `None` for a sheet
    /// with nothing in it.
    async fn used_range(&mut self) -> Result<Option<CellRange>, HostError>;

    async fn cell(&mut self, address: CellAddress) -> Result<Self::Cell, HostError>;

    /// The cell's full visible text.
    async fn cell_text(&mut self, cell: &Self::Cell) -> Result<String, HostError>;

    async fn paragraphs(
        &mut self,
        cell: &Self::Cell,
    ) -> Result<Vec<Vec<Self::Portion>>, HostError>;

    async fn portion_text(&mut self, portion: &Self::Portion) -> Result<String, HostError>;

    /// Font color of the portion, `None` when it is automatic.
    async fn portion_color(&mut self, portion: &Self::Portion) -> Result<Option<Rgb>, HostError>;

    /// Called once the walker is done with `cell`, whether or not it had
    /// text. Hosts that hand out remote references drop the ones taken for
    /// the cell here.
    async fn release_cell(&mut self, cell: Self::Cell) -> Result<(), HostError> {
        let _ = cell;
        Ok(())
    }
}
