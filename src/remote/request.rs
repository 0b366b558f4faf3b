//! Structured batch requests and their replies, shaped like the remote API's
//! JSON so a transport can submit them as they are.

use crate::database::range::RowRange;
use crate::spreadsheet::sheet::GridProperties;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::SheetId;
use crate::spreadsheet::sheet::SheetProperties;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSheetProperties {
    pub title: String,
    pub grid_properties: GridProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddSheetRequest {
    pub properties: NewSheetProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSheetRequest {
    pub sheet_id: SheetId,
}

/// Property changes for one sheet; only the listed `fields` are applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetPropertiesUpdate {
    pub sheet_id: SheetId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub grid_properties: Option<GridProperties>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateSheetPropertiesRequest {
    pub properties: SheetPropertiesUpdate,
    /// Comma separated field mask
    pub fields: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dimension {
    Rows,
    Columns,
}

/// A half-open span of 0-based grid rows or columns, header row included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: SheetId,
    pub dimension: Dimension,
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeleteDimensionRequest {
    pub range: DimensionRange,
}

/// One structural mutation inside a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    AddSheet(AddSheetRequest),
    DeleteSheet(DeleteSheetRequest),
    UpdateSheetProperties(UpdateSheetPropertiesRequest),
    DeleteDimension(DeleteDimensionRequest),
}

impl Request {
    pub fn add_sheet(title: &str, row_count: usize, column_count: usize) -> Self {
        Request::AddSheet(AddSheetRequest {
            properties: NewSheetProperties {
                title: title.to_owned(),
                grid_properties: GridProperties {
                    row_count,
                    column_count,
                },
            },
        })
    }

    pub fn delete_sheet(sheet_id: SheetId) -> Self {
        Request::DeleteSheet(DeleteSheetRequest { sheet_id })
    }

    pub fn rename_sheet(sheet_id: SheetId, title: &str) -> Self {
        Request::UpdateSheetProperties(UpdateSheetPropertiesRequest {
            properties: SheetPropertiesUpdate {
                sheet_id,
                title: Some(title.to_owned()),
                grid_properties: None,
            },
            fields: "title".to_owned(),
        })
    }

    pub fn resize_sheet(sheet_id: SheetId, row_count: usize, column_count: usize) -> Self {
        Request::UpdateSheetProperties(UpdateSheetPropertiesRequest {
            properties: SheetPropertiesUpdate {
                sheet_id,
                title: None,
                grid_properties: Some(GridProperties {
                    row_count,
                    column_count,
                }),
            },
            fields: "gridProperties.rowCount,gridProperties.columnCount".to_owned(),
        })
    }

    /// Deletes grid rows; `rows` is in grid coordinates (row 0 is the header).
    pub fn delete_rows(sheet_id: SheetId, rows: RowRange) -> Self {
        Request::DeleteDimension(DeleteDimensionRequest {
            range: DimensionRange {
                sheet_id,
                dimension: Dimension::Rows,
                start_index: rows.start,
                end_index: rows.end,
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddSheetReply {
    pub properties: SheetProperties,
}

/// The reply to one request, in the same position as the request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reply {
    AddSheet(AddSheetReply),
    /// Requests without a reply body
    Empty,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReply {
    pub replies: Vec<Reply>,
    /// Every sheet of the document after the batch, present when an echo was requested
    #[serde(default)]
    pub updated_sheets: Vec<Sheet>,
}

impl BatchReply {
    /// The sheet with the given id among the echoed sheets.
    pub fn updated_sheet(&self, sheet_id: SheetId) -> Option<&Sheet> {
        self.updated_sheets
            .iter()
            .find(|sheet| sheet.properties.sheet_id == sheet_id)
    }
}
