//! Workbook and sheet handles for a document open in LibreOffice.
//!
//! Every interface reference the office sends is counted on its side until
//! it is released. References taken for a single cell are released when the
//! walker hands the cell back; the rest are released when the workbook
//! closes.

use cellhue_core::{CellAddress, CellRange, HostError, Rgb, SheetSource};
use libreoffice_urp::interface::{
    x_cell_range, x_cell_range_addressable, x_closeable, x_enumeration, x_enumeration_access,
    x_index_access, x_named, x_property_set, x_spreadsheet, x_spreadsheet_document, x_text_range,
    x_used_area_cursor, MethodDef,
};
use libreoffice_urp::proxy::returned_proxy;
use libreoffice_urp::{type_names, UnoProxy, UnoValue, UrpConnection};

use crate::error::{BridgeError, Result};

/// `CharColor` value meaning "automatic".
const AUTOMATIC_COLOR: i64 = -1;

/// Call `method` and resolve the interface it returns as `interface`.
/// Both references received are added to `held`.
async fn call_for_object(
    conn: &mut UrpConnection,
    target: &UnoProxy,
    method: &MethodDef,
    args: &[UnoValue],
    interface: &str,
    held: &mut Vec<UnoProxy>,
) -> Result<UnoProxy> {
    let result = conn.call(target, method, args).await?;
    let raw = returned_proxy(method, &result)
        .ok_or_else(|| BridgeError::OperationFailed(format!("{} returned null", method.name)))?;
    held.push(raw.clone());
    qi(conn, &raw, interface, held).await
}

async fn qi(
    conn: &mut UrpConnection,
    proxy: &UnoProxy,
    interface: &str,
    held: &mut Vec<UnoProxy>,
) -> Result<UnoProxy> {
    let found = conn.query_interface(proxy, interface).await?.ok_or_else(|| {
        BridgeError::OperationFailed(format!("object {} does not support {interface}", proxy.oid))
    })?;
    held.push(found.clone());
    Ok(found)
}

/// Release and forget every reference in `held`.
async fn release_all(conn: &mut UrpConnection, held: &mut Vec<UnoProxy>) -> Result<()> {
    for proxy in std::mem::take(held) {
        conn.release(&proxy).await?;
    }
    Ok(())
}

/// A handle to an open spreadsheet document in LibreOffice.
///
/// Borrows the bridge's connection for as long as the document is open.
/// Call [`close`](Self::close) when done.
pub struct Workbook<'a> {
    conn: &'a mut UrpConnection,
    doc: UnoProxy,
    url: String,
    sheets: Option<UnoProxy>,
    /// References that live until the document is closed.
    held: Vec<UnoProxy>,
}

impl<'a> Workbook<'a> {
    pub(crate) fn new(conn: &'a mut UrpConnection, doc: UnoProxy, url: String) -> Self {
        Self {
            conn,
            held: vec![doc.clone()],
            doc,
            url,
            sheets: None,
        }
    }

    /// URL the document was loaded from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The sheet collection as `XIndexAccess`.
    async fn sheets(&mut self) -> Result<UnoProxy> {
        if let Some(sheets) = &self.sheets {
            return Ok(sheets.clone());
        }
        let document = qi(
            self.conn,
            &self.doc,
            type_names::X_SPREADSHEET_DOCUMENT,
            &mut self.held,
        )
        .await?;
        let sheets = call_for_object(
            self.conn,
            &document,
            &x_spreadsheet_document::GET_SHEETS,
            &[],
            type_names::X_INDEX_ACCESS,
            &mut self.held,
        )
        .await?;
        self.sheets = Some(sheets.clone());
        Ok(sheets)
    }

    pub async fn sheet_count(&mut self) -> Result<usize> {
        let sheets = self.sheets().await?;
        let count = self.conn.call(&sheets, &x_index_access::GET_COUNT, &[]).await?;
        count
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| BridgeError::OperationFailed(format!("getCount returned {count:?}")))
    }

    /// The sheet at zero-based `index`.
    pub async fn sheet(&mut self, index: usize) -> Result<Sheet<'_>> {
        let count = self.sheet_count().await?;
        if index >= count {
            return Err(BridgeError::NoSuchSheet { index, count });
        }
        let sheets = self.sheets().await?;
        let position = i32::try_from(index).map_err(|_| BridgeError::NoSuchSheet { index, count })?;
        let spreadsheet = call_for_object(
            self.conn,
            &sheets,
            &x_index_access::GET_BY_INDEX,
            &[UnoValue::Long(position)],
            type_names::X_SPREADSHEET,
            &mut self.held,
        )
        .await?;
        let cells = qi(self.conn, &spreadsheet, type_names::X_CELL_RANGE, &mut self.held).await?;
        tracing::debug!(index, oid = %spreadsheet.oid, "Got sheet");

        Ok(Sheet {
            conn: &mut *self.conn,
            held: &mut self.held,
            scratch: Vec::new(),
            spreadsheet,
            cells,
            index,
        })
    }

    /// Close the document without saving and release every reference taken
    /// through it.
    pub async fn close(mut self) -> Result<()> {
        let closed = self.close_document().await;
        let released = release_all(self.conn, &mut self.held).await;
        closed?;
        released?;
        tracing::info!(url = %self.url, "Closed document");
        Ok(())
    }

    async fn close_document(&mut self) -> Result<()> {
        let closeable = qi(self.conn, &self.doc, type_names::X_CLOSEABLE, &mut self.held).await?;
        self.conn
            .call(&closeable, &x_closeable::CLOSE, &[UnoValue::Bool(true)])
            .await?;
        Ok(())
    }
}

/// One worksheet of an open [`Workbook`], readable as a [`SheetSource`].
///
/// Cells and text portions are handed out as remote object proxies.
pub struct Sheet<'w> {
    conn: &'w mut UrpConnection,
    /// The workbook's references, released when it closes.
    held: &'w mut Vec<UnoProxy>,
    /// References taken for the cell being read.
    scratch: Vec<UnoProxy>,
    spreadsheet: UnoProxy,
    cells: UnoProxy,
    index: usize,
}

impl Sheet<'_> {
    /// Zero-based position of the sheet in its workbook.
    pub fn index(&self) -> usize {
        self.index
    }

    async fn range_address(&mut self) -> Result<CellRange> {
        let cursor = call_for_object(
            self.conn,
            &self.spreadsheet,
            &x_spreadsheet::CREATE_CURSOR,
            &[],
            type_names::X_USED_AREA_CURSOR,
            self.held,
        )
        .await?;
        self.conn
            .call(&cursor, &x_used_area_cursor::GOTO_START_OF_USED_AREA, &[UnoValue::Bool(false)])
            .await?;
        self.conn
            .call(&cursor, &x_used_area_cursor::GOTO_END_OF_USED_AREA, &[UnoValue::Bool(true)])
            .await?;
        let addressable = qi(
            self.conn,
            &cursor,
            type_names::X_CELL_RANGE_ADDRESSABLE,
            self.held,
        )
        .await?;
        let address = self
            .conn
            .call(&addressable, &x_cell_range_addressable::GET_RANGE_ADDRESS, &[])
            .await?;
        range_from_address(&address)
    }

    async fn name(&mut self) -> Result<String> {
        let named = qi(self.conn, &self.spreadsheet, type_names::X_NAMED, self.held).await?;
        let name = self.conn.call(&named, &x_named::GET_NAME, &[]).await?;
        Ok(name.as_str().unwrap_or_default().to_string())
    }

    async fn cell_at(&mut self, address: CellAddress) -> std::result::Result<UnoProxy, HostError> {
        let args = [
            UnoValue::Long(position(address.col, address)?),
            UnoValue::Long(position(address.row, address)?),
        ];
        let method = &x_cell_range::GET_CELL_BY_POSITION;
        let cell = self
            .conn
            .call(&self.cells, method, &args)
            .await
            .map_err(|e| BridgeError::from(e).into_host_error("getCellByPosition"))?;
        let cell = returned_proxy(method, &cell).ok_or_else(|| {
            HostError::failed("getCellByPosition", format!("no cell at {address}"))
        })?;
        self.scratch.push(cell.clone());
        Ok(cell)
    }

    async fn text_of(&mut self, object: &UnoProxy) -> Result<String> {
        let range = qi(self.conn, object, type_names::X_TEXT_RANGE, &mut self.scratch).await?;
        let text = self.conn.call(&range, &x_text_range::GET_STRING, &[]).await?;
        Ok(text.as_str().unwrap_or_default().to_string())
    }

    /// All elements of an `XEnumerationAccess`.
    async fn enumerate(&mut self, object: &UnoProxy) -> Result<Vec<UnoProxy>> {
        let access = qi(
            self.conn,
            object,
            type_names::X_ENUMERATION_ACCESS,
            &mut self.scratch,
        )
        .await?;
        let enumeration = call_for_object(
            self.conn,
            &access,
            &x_enumeration_access::CREATE_ENUMERATION,
            &[],
            type_names::X_ENUMERATION,
            &mut self.scratch,
        )
        .await?;

        let mut elements = Vec::new();
        loop {
            let more = self
                .conn
                .call(&enumeration, &x_enumeration::HAS_MORE_ELEMENTS, &[])
                .await?;
            if more.as_bool() != Some(true) {
                break;
            }
            let element = self
                .conn
                .call(&enumeration, &x_enumeration::NEXT_ELEMENT, &[])
                .await?;
            let element = returned_proxy(&x_enumeration::NEXT_ELEMENT, &element).ok_or_else(|| {
                BridgeError::OperationFailed(format!("enumeration yielded {element:?}"))
            })?;
            self.scratch.push(element.clone());
            elements.push(element);
        }
        Ok(elements)
    }

    async fn char_color(&mut self, portion: &UnoProxy) -> Result<Option<Rgb>> {
        let properties = qi(self.conn, portion, type_names::X_PROPERTY_SET, &mut self.scratch).await?;
        let value = self
            .conn
            .call(
                &properties,
                &x_property_set::GET_PROPERTY_VALUE,
                &[UnoValue::String("CharColor".into())],
            )
            .await?;
        match value.as_i64() {
            Some(AUTOMATIC_COLOR) => Ok(None),
            Some(packed) => Ok(Some(Rgb::from_packed(packed as u32))),
            None if value.is_void() => Ok(None),
            None => Err(BridgeError::OperationFailed(format!(
                "CharColor is {value:?}"
            ))),
        }
    }
}

impl Drop for Sheet<'_> {
    /// References of a cell the walker never handed back stay with the
    /// workbook.
    fn drop(&mut self) {
        self.held.append(&mut self.scratch);
    }
}

/// Convert a `com.sun.star.table.CellRangeAddress` struct.
fn range_from_address(value: &UnoValue) -> Result<CellRange> {
    let fields = match value.unwrap_any() {
        UnoValue::Struct(fields) if fields.len() == 5 => fields,
        other => {
            return Err(BridgeError::OperationFailed(format!(
                "getRangeAddress returned {other:?}"
            )))
        }
    };
    let coord = |i: usize| {
        fields[i]
            .as_i64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| BridgeError::OperationFailed(format!("bad range coordinate {:?}", fields[i])))
    };
    // Sheet, StartColumn, StartRow, EndColumn, EndRow
    Ok(CellRange::new(
        CellAddress::new(coord(2)?, coord(1)?),
        CellAddress::new(coord(4)?, coord(3)?),
    ))
}

fn position(value: u32, address: CellAddress) -> std::result::Result<i32, HostError> {
    i32::try_from(value).map_err(|_| {
        HostError::failed(
            "getCellByPosition",
            format!("{address} is outside the sheet"),
        )
    })
}

impl SheetSource for Sheet<'_> {
    type Cell = UnoProxy;
    type Portion = UnoProxy;

    async fn sheet_name(&mut self) -> std::result::Result<String, HostError> {
        self.name().await.map_err(|e| e.into_host_error("getName"))
    }

    /// The used area is never empty in LibreOffice; a blank sheet reports A1.
    async fn used_range(&mut self) -> std::result::Result<Option<CellRange>, HostError> {
        let range = self
            .range_address()
            .await
            .map_err(|e| e.into_host_error("getRangeAddress"))?;
        Ok(Some(range))
    }

    async fn cell(&mut self, address: CellAddress) -> std::result::Result<UnoProxy, HostError> {
        self.cell_at(address).await
    }

    async fn cell_text(&mut self, cell: &UnoProxy) -> std::result::Result<String, HostError> {
        self.text_of(cell)
            .await
            .map_err(|e| e.into_host_error("getString"))
    }

    async fn paragraphs(
        &mut self,
        cell: &UnoProxy,
    ) -> std::result::Result<Vec<Vec<UnoProxy>>, HostError> {
        let paragraphs = self
            .enumerate(cell)
            .await
            .map_err(|e| e.into_host_error("enumerate paragraphs"))?;
        let mut result = Vec::with_capacity(paragraphs.len());
        for paragraph in &paragraphs {
            let portions = self
                .enumerate(paragraph)
                .await
                .map_err(|e| e.into_host_error("enumerate text portions"))?;
            result.push(portions);
        }
        Ok(result)
    }

    async fn portion_text(&mut self, portion: &UnoProxy) -> std::result::Result<String, HostError> {
        self.text_of(portion)
            .await
            .map_err(|e| e.into_host_error("getString"))
    }

    async fn portion_color(
        &mut self,
        portion: &UnoProxy,
    ) -> std::result::Result<Option<Rgb>, HostError> {
        self.char_color(portion)
            .await
            .map_err(|e| e.into_host_error("getPropertyValue(CharColor)"))
    }

    /// Releases every reference taken since the cell was fetched.
    async fn release_cell(&mut self, cell: UnoProxy) -> std::result::Result<(), HostError> {
        let count = self.scratch.len();
        release_all(self.conn, &mut self.scratch)
            .await
            .map_err(|e| e.into_host_error("release"))?;
        tracing::trace!(oid = %cell.oid, count, "released cell");
        Ok(())
    }
}
