//! Range read/write tools

use async_trait::async_trait;
use gridmate_agent::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{cell_to_string, parse_args};
use crate::backend::{CellValue, ClearKind, CopyKind, Grid, SharedBackend};

/// Read values, formulas and number formats from a range
pub struct ReadRangeTool {
    backend: SharedBackend,
}

impl ReadRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct ReadRangeArgs {
    range: String,
    worksheet: Option<String>,
}

#[async_trait]
impl Tool for ReadRangeTool {
    fn name(&self) -> &str {
        "read_range"
    }

    fn description(&self) -> &str {
        "Read values from a range of cells. Returns the values, formulas, and number formats."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Cell range in A1 notation (e.g., \"A1:B10\" or \"A1\")"
                },
                "worksheet": {
                    "type": "string",
                    "description": "Worksheet name (optional, uses active sheet if not specified)"
                }
            },
            "required": ["range"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: ReadRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self
            .backend
            .read_range(args.worksheet.as_deref(), &args.range)
            .await
        {
            Ok(data) => ToolResult::success(json!({
                "address": data.address,
                "values": data.values,
                "formulas": data.formulas,
                "formats": data.number_formats,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Write a 2D block of values or formulas starting at a cell
pub struct WriteRangeTool {
    backend: SharedBackend,
}

impl WriteRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct WriteRangeArgs {
    range: String,
    values: Grid,
    worksheet: Option<String>,
}

#[async_trait]
impl Tool for WriteRangeTool {
    fn name(&self) -> &str {
        "write_range"
    }

    fn description(&self) -> &str {
        "Write values to a range of cells. Can write text, numbers, or formulas."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Starting cell in A1 notation (e.g., \"A1\")"
                },
                "values": {
                    "type": "array",
                    "description": "2D array of values to write. Each row is an array of cell values.",
                    "items": { "type": "array" }
                },
                "worksheet": {
                    "type": "string",
                    "description": "Worksheet name (optional, uses active sheet if not specified)"
                }
            },
            "required": ["range", "values"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: WriteRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self
            .backend
            .write_range(args.worksheet.as_deref(), &args.range, args.values)
            .await
        {
            Ok(rows) => ToolResult::success(json!({ "range": args.range, "rowsWritten": rows })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Report the user's current selection
pub struct GetSelectionTool {
    backend: SharedBackend,
}

impl GetSelectionTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for GetSelectionTool {
    fn name(&self) -> &str {
        "get_selection"
    }

    fn description(&self) -> &str {
        "Get the currently selected cells, including their address, values, and formulas."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        _arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        match self.backend.selection().await {
            Ok(selection) => ToolResult::success(json!({
                "address": selection.address,
                "values": selection.values,
                "formulas": selection.formulas,
                "rowCount": selection.row_count,
                "columnCount": selection.column_count,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// List worksheets and the active sheet
pub struct GetWorkbookInfoTool {
    backend: SharedBackend,
}

impl GetWorkbookInfoTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for GetWorkbookInfoTool {
    fn name(&self) -> &str {
        "get_workbook_info"
    }

    fn description(&self) -> &str {
        "Get information about the current workbook, including all worksheet names and the active sheet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        _arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        match self.backend.workbook_info().await {
            Ok(info) => ToolResult::success(json!({
                "worksheets": info.worksheets,
                "activeWorksheet": info.active_worksheet,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Fill a range with one formula; relative references shift per cell
pub struct ApplyFormulaTool {
    backend: SharedBackend,
}

impl ApplyFormulaTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct ApplyFormulaArgs {
    range: String,
    formula: String,
}

#[async_trait]
impl Tool for ApplyFormulaTool {
    fn name(&self) -> &str {
        "apply_formula"
    }

    fn description(&self) -> &str {
        "Apply a formula to a cell or range."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Cell or range to apply the formula to"
                },
                "formula": {
                    "type": "string",
                    "description": "Formula to apply (e.g., \"=SUM(A1:A10)\")"
                }
            },
            "required": ["range", "formula"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: ApplyFormulaArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self.backend.set_formulas(&args.range, &args.formula).await {
            Ok(cells) => ToolResult::success(json!({
                "range": args.range,
                "formula": args.formula,
                "cellsAffected": cells,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Clear contents, formats, or both
pub struct ClearRangeTool {
    backend: SharedBackend,
}

impl ClearRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearRangeArgs {
    range: String,
    clear_type: ClearKind,
}

#[async_trait]
impl Tool for ClearRangeTool {
    fn name(&self) -> &str {
        "clear_range"
    }

    fn description(&self) -> &str {
        "Clear contents, formatting, or both from a range."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to clear"
                },
                "clearType": {
                    "type": "string",
                    "description": "What to clear",
                    "enum": ["contents", "formats", "all"]
                }
            },
            "required": ["range", "clearType"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: ClearRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self.backend.clear_range(&args.range, args.clear_type).await {
            Ok(()) => ToolResult::success(json!({
                "range": args.range,
                "clearType": args.clear_type,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Copy data, formulas, or formatting between ranges
pub struct CopyRangeTool {
    backend: SharedBackend,
}

impl CopyRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyRangeArgs {
    source_range: String,
    destination_range: String,
    copy_type: Option<CopyKind>,
}

#[async_trait]
impl Tool for CopyRangeTool {
    fn name(&self) -> &str {
        "copy_range"
    }

    fn description(&self) -> &str {
        "Copy data, formulas, or formatting from one range to another."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sourceRange": {
                    "type": "string",
                    "description": "Source range to copy from"
                },
                "destinationRange": {
                    "type": "string",
                    "description": "Destination range to paste to"
                },
                "copyType": {
                    "type": "string",
                    "description": "What to copy",
                    "enum": ["all", "values", "formulas", "formats"]
                }
            },
            "required": ["sourceRange", "destinationRange"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: CopyRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let kind = args.copy_type.unwrap_or(CopyKind::All);
        match self
            .backend
            .copy_range(&args.source_range, &args.destination_range, kind)
            .await
        {
            Ok(cells) => ToolResult::success(json!({
                "sourceRange": args.source_range,
                "destinationRange": args.destination_range,
                "copyType": kind,
                "cellsCopied": cells,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Find and replace over a range (or the whole used range)
pub struct FindReplaceTool {
    backend: SharedBackend,
}

impl FindReplaceTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindReplaceArgs {
    range: Option<String>,
    find: String,
    replace: String,
    #[serde(default)]
    match_case: bool,
    #[serde(default)]
    match_entire_cell: bool,
}

#[async_trait]
impl Tool for FindReplaceTool {
    fn name(&self) -> &str {
        "find_replace"
    }

    fn description(&self) -> &str {
        "Find and replace text or values in a range. Useful for formatting changes like converting commas to periods in numbers (e.g., \"23,6\" to \"23.6\"), standardizing text formats, or bulk corrections."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to search in (optional, searches active sheet if not specified)"
                },
                "find": {
                    "type": "string",
                    "description": "Text to find"
                },
                "replace": {
                    "type": "string",
                    "description": "Text to replace with"
                },
                "matchCase": {
                    "type": "boolean",
                    "description": "Match case (default: false)"
                },
                "matchEntireCell": {
                    "type": "boolean",
                    "description": "Match entire cell contents (default: false)"
                }
            },
            "required": ["find", "replace"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: FindReplaceArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };

        let data = match &args.range {
            Some(range) => self.backend.read_range(None, range).await,
            None => self.backend.used_range().await,
        };
        let data = match data {
            Ok(data) => data,
            Err(e) => return ToolResult::failure(e.to_string()),
        };

        let (new_values, replaced) = replace_in_grid(
            &data.values,
            &args.find,
            &args.replace,
            args.match_case,
            args.match_entire_cell,
        );

        let anchor = data.address.clone();
        if let Err(e) = self.backend.write_range(None, &anchor, new_values).await {
            return ToolResult::failure(e.to_string());
        }

        ToolResult::success(json!({
            "replaced": replaced,
            "find": args.find,
            "replace": args.replace,
            "range": data.address,
        }))
    }
}

/// Replace occurrences in a grid of values. Returns the new grid and the
/// number of cells changed.
fn replace_in_grid(
    values: &Grid,
    find: &str,
    replace: &str,
    match_case: bool,
    match_entire_cell: bool,
) -> (Grid, usize) {
    let insensitive_pattern = regex::RegexBuilder::new(&regex::escape(find))
        .case_insensitive(true)
        .build()
        .ok();

    let mut replaced = 0usize;
    let new_values: Grid = values
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    let text = cell_to_string(cell);
                    let new_text = if match_entire_cell {
                        let matches = if match_case {
                            text == find
                        } else {
                            text.to_lowercase() == find.to_lowercase()
                        };
                        matches.then(|| replace.to_string())
                    } else if match_case {
                        text.contains(find)
                            .then(|| text.replace(find, replace))
                    } else {
                        insensitive_pattern.as_ref().and_then(|re| {
                            re.is_match(&text).then(|| {
                                re.replace_all(&text, regex::NoExpand(replace)).into_owned()
                            })
                        })
                    };
                    match new_text {
                        Some(new_text) => {
                            replaced += 1;
                            CellValue::String(new_text)
                        }
                        None => cell.clone(),
                    }
                })
                .collect()
        })
        .collect();
    (new_values, replaced)
}

/// Transpose a range into a destination anchored at one cell
pub struct TransposeRangeTool {
    backend: SharedBackend,
}

impl TransposeRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransposeRangeArgs {
    source_range: String,
    destination_cell: String,
}

#[async_trait]
impl Tool for TransposeRangeTool {
    fn name(&self) -> &str {
        "transpose_range"
    }

    fn description(&self) -> &str {
        "Transpose a range (flip rows to columns and vice versa)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sourceRange": {
                    "type": "string",
                    "description": "Source range to transpose"
                },
                "destinationCell": {
                    "type": "string",
                    "description": "Top-left cell where transposed data should be placed"
                }
            },
            "required": ["sourceRange", "destinationCell"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: TransposeRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };

        let data = match self.backend.read_range(None, &args.source_range).await {
            Ok(data) => data,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        if data.values.is_empty() {
            return ToolResult::failure("Source range is empty");
        }

        let rows = data.values.len();
        let cols = data.values[0].len();
        let mut transposed: Grid = vec![vec![CellValue::Null; rows]; cols];
        for (r, row) in data.values.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                transposed[c][r] = value.clone();
            }
        }

        if let Err(e) = self
            .backend
            .write_range(None, &args.destination_cell, transposed)
            .await
        {
            return ToolResult::failure(e.to_string());
        }

        ToolResult::success(json!({
            "sourceRange": args.source_range,
            "destinationCell": args.destination_cell,
            "rows": cols,
            "columns": rows,
        }))
    }
}

/// Split cell text by a delimiter into adjacent columns
pub struct TextToColumnsTool {
    backend: SharedBackend,
}

impl TextToColumnsTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct TextToColumnsArgs {
    range: String,
    delimiter: String,
}

#[async_trait]
impl Tool for TextToColumnsTool {
    fn name(&self) -> &str {
        "text_to_columns"
    }

    fn description(&self) -> &str {
        "Split text in cells by a delimiter into multiple columns."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range containing text to split"
                },
                "delimiter": {
                    "type": "string",
                    "description": "Delimiter to split by (e.g., \",\", \" \", \"|\")"
                }
            },
            "required": ["range", "delimiter"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: TextToColumnsArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        if args.delimiter.is_empty() {
            return ToolResult::failure("Delimiter must not be empty");
        }

        let data = match self.backend.read_range(None, &args.range).await {
            Ok(data) => data,
            Err(e) => return ToolResult::failure(e.to_string()),
        };

        let mut split_rows: Grid = Vec::with_capacity(data.values.len());
        let mut max_columns = 0usize;
        for row in &data.values {
            let mut out_row: Vec<CellValue> = Vec::new();
            for cell in row {
                for part in cell_to_string(cell).split(&args.delimiter) {
                    out_row.push(CellValue::String(part.to_string()));
                }
            }
            max_columns = max_columns.max(out_row.len());
            split_rows.push(out_row);
        }
        for row in &mut split_rows {
            row.resize(max_columns, CellValue::String(String::new()));
        }

        if let Err(e) = self.backend.write_range(None, &data.address, split_rows).await {
            return ToolResult::failure(e.to_string());
        }

        ToolResult::success(json!({
            "range": args.range,
            "delimiter": args.delimiter,
            "columns": max_columns,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SpreadsheetBackend;
    use crate::memory::MemoryWorkbook;
    use serde_json::json;
    use std::sync::Arc;

    fn sandbox() -> (Arc<MemoryWorkbook>, SharedBackend) {
        let workbook = Arc::new(MemoryWorkbook::new());
        let backend: SharedBackend = workbook.clone();
        (workbook, backend)
    }

    #[tokio::test]
    async fn test_write_then_read_through_tools() {
        let (_, backend) = sandbox();
        let write = WriteRangeTool::new(backend.clone());
        let read = ReadRangeTool::new(backend);

        let result = write
            .execute(
                "c1",
                json!({ "range": "A1", "values": [["x", 1], ["y", 2]] }),
                CancellationToken::new(),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(result.details.unwrap()["rowsWritten"], 2);

        let result = read
            .execute("c2", json!({ "range": "A1:B2" }), CancellationToken::new())
            .await;
        let data = result.details.unwrap();
        assert_eq!(data["values"][1][1], 2);
    }

    #[tokio::test]
    async fn test_read_range_missing_argument_fails_cleanly() {
        let (_, backend) = sandbox();
        let read = ReadRangeTool::new(backend);
        let result = read.execute("c1", json!({}), CancellationToken::new()).await;
        assert!(result.is_error);
        assert!(result.text_content().contains("Invalid arguments"));
    }

    #[test]
    fn test_replace_in_grid_case_insensitive_substring() {
        let values: Grid = vec![vec![
            json!("Coffee Shop"),
            json!("COFFEE BAR"),
            json!("tea house"),
        ]];
        let (new_values, replaced) = replace_in_grid(&values, "coffee", "espresso", false, false);
        assert_eq!(replaced, 2);
        assert_eq!(new_values[0][0], json!("espresso Shop"));
        assert_eq!(new_values[0][1], json!("espresso BAR"));
        assert_eq!(new_values[0][2], json!("tea house"));
    }

    #[test]
    fn test_replace_in_grid_entire_cell_and_case() {
        let values: Grid = vec![vec![json!("23,6"), json!("123,60")]];
        let (new_values, replaced) = replace_in_grid(&values, "23,6", "23.6", true, true);
        assert_eq!(replaced, 1);
        assert_eq!(new_values[0][0], json!("23.6"));
        assert_eq!(new_values[0][1], json!("123,60"));
    }

    #[tokio::test]
    async fn test_transpose_writes_flipped_grid() {
        let (workbook, backend) = sandbox();
        backend
            .write_range(None, "A1", vec![vec![json!(1), json!(2), json!(3)]])
            .await
            .unwrap();

        let tool = TransposeRangeTool::new(backend);
        let result = tool
            .execute(
                "c1",
                json!({ "sourceRange": "A1:C1", "destinationCell": "A3" }),
                CancellationToken::new(),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(result.details.unwrap()["rows"], 3);
        assert_eq!(workbook.cell_value("Sheet1", "A5"), json!(3));
    }

    #[tokio::test]
    async fn test_text_to_columns_splits_and_pads() {
        let (workbook, backend) = sandbox();
        backend
            .write_range(None, "A1", vec![vec![json!("a,b,c")], vec![json!("d")]])
            .await
            .unwrap();

        let tool = TextToColumnsTool::new(backend);
        let result = tool
            .execute(
                "c1",
                json!({ "range": "A1:A2", "delimiter": "," }),
                CancellationToken::new(),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(result.details.unwrap()["columns"], 3);
        assert_eq!(workbook.cell_value("Sheet1", "C1"), json!("c"));
        assert_eq!(workbook.cell_value("Sheet1", "B2"), json!(""));
    }
}
