//! The spreadsheet backend contract.
//!
//! One trait method per workbook operation; each call is atomic from the
//! backend's point of view, but the backend does not roll back partial
//! side effects across calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A single cell value: number, string, bool, or empty (null)
pub type CellValue = serde_json::Value;

/// A rectangular block of cell values, row-major
pub type Grid = Vec<Vec<CellValue>>;

/// Errors surfaced by a spreadsheet backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Worksheet not found: {0}")]
    WorksheetNotFound(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("{0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Values, formulas and number formats for a range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeData {
    pub address: String,
    pub values: Grid,
    pub formulas: Vec<Vec<String>>,
    pub number_formats: Vec<Vec<String>>,
}

/// The user's current selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionData {
    pub address: String,
    pub values: Grid,
    pub formulas: Vec<Vec<String>>,
    pub row_count: u32,
    pub column_count: u32,
}

/// Worksheet names and the active sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookInfo {
    pub worksheets: Vec<String>,
    pub active_worksheet: String,
}

/// Chart types the backend can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartType {
    ColumnClustered,
    ColumnStacked,
    Line,
    LineMarkers,
    Pie,
    BarClustered,
    Area,
    XYScatter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub data_range: String,
    pub chart_type: ChartType,
    pub title: Option<String>,
}

/// Aggregation functions for pivot data fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Sum,
    Count,
    Average,
    Min,
    Max,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotField {
    pub field: String,
    pub function: Aggregation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotSpec {
    pub source_range: String,
    pub destination_sheet: Option<String>,
    pub row_fields: Vec<String>,
    pub column_fields: Vec<String>,
    pub data_fields: Vec<PivotField>,
}

/// Cell formatting options; unset fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    pub number_format: Option<String>,
    pub font_bold: Option<bool>,
    pub font_size: Option<f64>,
    pub fill_color: Option<String>,
    pub font_color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    Thin,
    Medium,
    Thick,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderEdges {
    All,
    Outline,
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderSpec {
    pub edges: BorderEdges,
    pub style: BorderStyle,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlignment {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentSpec {
    pub horizontal: Option<HorizontalAlignment>,
    pub vertical: Option<VerticalAlignment>,
    pub wrap_text: Option<bool>,
    pub indent: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    GreaterThan,
    LessThan,
    Between,
    NotBetween,
    EqualTo,
    NotEqualTo,
}

/// Conditional formatting rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConditionalRule {
    ColorScale,
    DataBar,
    IconSet,
    CellValue {
        operator: ComparisonOperator,
        value: f64,
        color: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationKind {
    List,
    WholeNumber,
    Decimal,
    Date,
    TextLength,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    pub kind: ValidationKind,
    pub operator: Option<ComparisonOperator>,
    /// For list validation: comma-separated values or a range; for the
    /// numeric kinds: the comparison value
    pub source: Option<String>,
    pub allow_blank: Option<bool>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorksheetAction {
    Create { name: String },
    Delete { name: String },
    Rename { name: String, new_name: String },
    Move { name: String, position: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreezeKind {
    Rows,
    Columns,
    Both,
    Unfreeze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Rows,
    Columns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearKind {
    Contents,
    Formats,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyKind {
    All,
    Values,
    Formulas,
    Formats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveDuplicatesOutcome {
    pub removed: u32,
    pub unique_remaining: u32,
}

/// The live workbook, as seen by the tool layer.
///
/// Operations without an explicit worksheet parameter act on the active
/// sheet. Ranges use A1 notation, optionally with a sheet prefix.
#[async_trait]
pub trait SpreadsheetBackend: Send + Sync {
    // --- reads ---
    async fn read_range(&self, worksheet: Option<&str>, range: &str) -> Result<RangeData>;
    async fn used_range(&self) -> Result<RangeData>;
    async fn selection(&self) -> Result<SelectionData>;
    async fn workbook_info(&self) -> Result<WorkbookInfo>;

    // --- cell mutations ---
    async fn write_range(&self, worksheet: Option<&str>, range: &str, values: Grid)
    -> Result<usize>;
    async fn set_formulas(&self, range: &str, formula: &str) -> Result<usize>;
    async fn clear_range(&self, range: &str, kind: ClearKind) -> Result<()>;
    async fn copy_range(&self, source: &str, destination: &str, kind: CopyKind) -> Result<usize>;

    // --- structure ---
    async fn insert_rows(&self, index: u32, count: u32) -> Result<()>;
    async fn delete_rows(&self, index: u32, count: u32) -> Result<()>;
    async fn sort_range(
        &self,
        range: &str,
        key_column: u32,
        ascending: bool,
        has_headers: bool,
    ) -> Result<()>;
    async fn manage_worksheet(&self, action: WorksheetAction) -> Result<()>;
    async fn remove_duplicates(
        &self,
        range: &str,
        columns: &[u32],
        has_headers: bool,
    ) -> Result<RemoveDuplicatesOutcome>;

    // --- objects ---
    async fn create_table(&self, range: &str, name: &str, has_headers: bool) -> Result<()>;
    async fn create_chart(&self, spec: ChartSpec) -> Result<()>;
    /// Returns the name of the worksheet the pivot table landed on
    async fn create_pivot_table(&self, spec: PivotSpec) -> Result<String>;
    async fn add_comment(&self, cell: &str, text: &str, author: Option<&str>) -> Result<()>;
    async fn add_hyperlink(&self, cell: &str, url: &str, display_text: Option<&str>)
    -> Result<()>;
    async fn define_name(&self, name: &str, range: &str) -> Result<()>;

    // --- formatting & view ---
    async fn apply_format(&self, range: &str, format: CellFormat) -> Result<()>;
    async fn apply_borders(&self, range: &str, spec: BorderSpec) -> Result<()>;
    async fn set_alignment(&self, range: &str, spec: AlignmentSpec) -> Result<()>;
    async fn conditional_format(&self, range: &str, rule: ConditionalRule) -> Result<()>;
    async fn data_validation(&self, range: &str, rule: ValidationRule) -> Result<()>;
    async fn autofilter(&self, range: &str, remove: bool) -> Result<()>;
    async fn merge_cells(&self, range: &str, merge: bool, across: bool) -> Result<()>;
    async fn freeze_panes(&self, kind: FreezeKind, cell: Option<&str>) -> Result<()>;
    async fn hide_rows_columns(&self, range: &str, axis: Axis, hide: bool) -> Result<()>;
    async fn autofit(&self, range: &str, axis: Axis) -> Result<()>;
    async fn protect_range(&self, range: &str, protect: bool) -> Result<()>;
}

/// A shared backend handle, cloned into every tool adapter
pub type SharedBackend = Arc<dyn SpreadsheetBackend>;
