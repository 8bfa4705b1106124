//! Worksheet structure tools

use async_trait::async_trait;
use gridmate_agent::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::parse_args;
use crate::a1;
use crate::backend::{FreezeKind, SharedBackend, WorksheetAction};

/// Create, delete, rename, or reorder worksheets
pub struct ManageWorksheetTool {
    backend: SharedBackend,
}

impl ManageWorksheetTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManageWorksheetArgs {
    action: String,
    name: Option<String>,
    new_name: Option<String>,
    position: Option<u32>,
}

#[async_trait]
impl Tool for ManageWorksheetTool {
    fn name(&self) -> &str {
        "manage_worksheet"
    }

    fn description(&self) -> &str {
        "Create, delete, rename, or reorder worksheets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "Action to perform",
                    "enum": ["create", "delete", "rename", "move"]
                },
                "name": {
                    "type": "string",
                    "description": "Worksheet name (for create/delete/rename)"
                },
                "newName": {
                    "type": "string",
                    "description": "New name (for rename action)"
                },
                "position": {
                    "type": "number",
                    "description": "Position to move to (for move action, 0-based)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: ManageWorksheetArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };

        let require_name = |name: &Option<String>| {
            name.clone()
                .ok_or_else(|| ToolResult::failure("Missing 'name' for worksheet action"))
        };

        let (action, payload) = match args.action.as_str() {
            "create" => {
                let name = match require_name(&args.name) {
                    Ok(name) => name,
                    Err(result) => return result,
                };
                (
                    WorksheetAction::Create { name: name.clone() },
                    json!({ "action": "create", "name": name }),
                )
            }
            "delete" => {
                let name = match require_name(&args.name) {
                    Ok(name) => name,
                    Err(result) => return result,
                };
                (
                    WorksheetAction::Delete { name: name.clone() },
                    json!({ "action": "delete", "name": name }),
                )
            }
            "rename" => {
                let name = match require_name(&args.name) {
                    Ok(name) => name,
                    Err(result) => return result,
                };
                let Some(new_name) = args.new_name else {
                    return ToolResult::failure("Missing 'newName' for rename action");
                };
                (
                    WorksheetAction::Rename {
                        name: name.clone(),
                        new_name: new_name.clone(),
                    },
                    json!({ "action": "rename", "oldName": name, "newName": new_name }),
                )
            }
            "move" => {
                let name = match require_name(&args.name) {
                    Ok(name) => name,
                    Err(result) => return result,
                };
                let Some(position) = args.position else {
                    return ToolResult::failure("Missing 'position' for move action");
                };
                (
                    WorksheetAction::Move {
                        name: name.clone(),
                        position,
                    },
                    json!({ "action": "move", "name": name, "position": position }),
                )
            }
            other => return ToolResult::failure(format!("Invalid worksheet action: {}", other)),
        };

        match self.backend.manage_worksheet(action).await {
            Ok(()) => ToolResult::success(payload),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Insert empty rows
pub struct InsertRowsTool {
    backend: SharedBackend,
}

impl InsertRowsTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct RowSpanArgs {
    index: u32,
    count: u32,
}

#[async_trait]
impl Tool for InsertRowsTool {
    fn name(&self) -> &str {
        "insert_rows"
    }

    fn description(&self) -> &str {
        "Insert new rows into the worksheet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "number",
                    "description": "Row index where to insert (0-based)"
                },
                "count": {
                    "type": "number",
                    "description": "Number of rows to insert"
                }
            },
            "required": ["index", "count"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: RowSpanArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self.backend.insert_rows(args.index, args.count).await {
            Ok(()) => ToolResult::success(json!({ "index": args.index, "count": args.count })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Delete rows
pub struct DeleteRowsTool {
    backend: SharedBackend,
}

impl DeleteRowsTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for DeleteRowsTool {
    fn name(&self) -> &str {
        "delete_rows"
    }

    fn description(&self) -> &str {
        "Delete rows from the worksheet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "number",
                    "description": "Starting row index (0-based)"
                },
                "count": {
                    "type": "number",
                    "description": "Number of rows to delete"
                }
            },
            "required": ["index", "count"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: RowSpanArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self.backend.delete_rows(args.index, args.count).await {
            Ok(()) => ToolResult::success(json!({ "index": args.index, "count": args.count })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Freeze rows/columns so they stay visible while scrolling
pub struct FreezePanesTool {
    backend: SharedBackend,
}

impl FreezePanesTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct FreezePanesArgs {
    #[serde(rename = "type")]
    kind: FreezeKind,
    cell: Option<String>,
}

#[async_trait]
impl Tool for FreezePanesTool {
    fn name(&self) -> &str {
        "freeze_panes"
    }

    fn description(&self) -> &str {
        "Freeze rows and/or columns to keep them visible while scrolling."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "cell": {
                    "type": "string",
                    "description": "Cell where freeze starts (e.g., \"B2\" freezes first row and first column)"
                },
                "type": {
                    "type": "string",
                    "description": "Type of freeze",
                    "enum": ["rows", "columns", "both", "unfreeze"]
                }
            },
            "required": ["type"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: FreezePanesArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        if args.kind != FreezeKind::Unfreeze && args.cell.is_none() {
            return ToolResult::failure("Freezing requires a 'cell' to anchor the panes");
        }
        match self
            .backend
            .freeze_panes(args.kind, args.cell.as_deref())
            .await
        {
            Ok(()) => ToolResult::success(json!({ "type": args.kind, "cell": args.cell })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Sort a range by one of its columns
pub struct SortRangeTool {
    backend: SharedBackend,
}

impl SortRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SortRangeArgs {
    range: String,
    sort_on: String,
    ascending: Option<bool>,
    has_headers: Option<bool>,
}

#[async_trait]
impl Tool for SortRangeTool {
    fn name(&self) -> &str {
        "sort_range"
    }

    fn description(&self) -> &str {
        "Sort a range of cells by one of its columns."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to sort"
                },
                "sortOn": {
                    "type": "string",
                    "description": "Column letter to sort by (e.g., \"A\")"
                },
                "ascending": {
                    "type": "boolean",
                    "description": "Sort in ascending order (default: true)"
                },
                "hasHeaders": {
                    "type": "boolean",
                    "description": "Whether the range has headers (default: true)"
                }
            },
            "required": ["range", "sortOn"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: SortRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };

        let Some(rect) = a1::parse_range(&args.range) else {
            return ToolResult::failure(format!("Invalid range: {}", args.range));
        };
        let Some(sort_col) = a1::column_index(&args.sort_on) else {
            return ToolResult::failure(format!("Invalid sort column: {}", args.sort_on));
        };
        if sort_col < rect.start.col || sort_col > rect.end.col {
            return ToolResult::failure(format!(
                "Sort column {} is outside the range {}",
                args.sort_on, args.range
            ));
        }
        let key_column = (sort_col - rect.start.col) as u32;

        match self
            .backend
            .sort_range(
                &args.range,
                key_column,
                args.ascending.unwrap_or(true),
                args.has_headers.unwrap_or(true),
            )
            .await
        {
            Ok(()) => ToolResult::success(json!({
                "range": args.range,
                "sortedBy": args.sort_on,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Apply or remove an autofilter on a range
pub struct AutofilterTool {
    backend: SharedBackend,
}

impl AutofilterTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct AutofilterArgs {
    range: String,
    #[serde(default)]
    remove: bool,
}

#[async_trait]
impl Tool for AutofilterTool {
    fn name(&self) -> &str {
        "apply_autofilter"
    }

    fn description(&self) -> &str {
        "Apply or remove an autofilter on a range to enable filtering."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to apply filter to"
                },
                "remove": {
                    "type": "boolean",
                    "description": "Remove existing filter (default: false)"
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
        let args: AutofilterArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self.backend.autofilter(&args.range, args.remove).await {
            Ok(()) => ToolResult::success(json!({
                "range": args.range,
                "action": if args.remove { "removed" } else { "applied" },
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SpreadsheetBackend;
    use crate::memory::MemoryWorkbook;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sort_by_letter_relative_to_range() {
        let workbook = Arc::new(MemoryWorkbook::new());
        workbook
            .write_range(
                None,
                "B1",
                vec![
                    vec![json!("amount")],
                    vec![json!(9)],
                    vec![json!(3)],
                ],
            )
            .await
            .unwrap();

        let tool = SortRangeTool::new(workbook.clone());
        let result = tool
            .execute(
                "c1",
                json!({ "range": "B1:B3", "sortOn": "B" }),
                CancellationToken::new(),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(workbook.cell_value("Sheet1", "B2"), json!(3));
    }

    #[tokio::test]
    async fn test_sort_column_outside_range_fails() {
        let workbook = Arc::new(MemoryWorkbook::new());
        let tool = SortRangeTool::new(workbook);
        let result = tool
            .execute(
                "c1",
                json!({ "range": "B1:C3", "sortOn": "F" }),
                CancellationToken::new(),
            )
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("outside the range"));
    }

    #[tokio::test]
    async fn test_manage_worksheet_create_and_invalid_action() {
        let workbook = Arc::new(MemoryWorkbook::new());
        let tool = ManageWorksheetTool::new(workbook.clone());

        let result = tool
            .execute(
                "c1",
                json!({ "action": "create", "name": "Data" }),
                CancellationToken::new(),
            )
            .await;
        assert!(!result.is_error);

        let result = tool
            .execute("c2", json!({ "action": "duplicate" }), CancellationToken::new())
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("Invalid worksheet action"));
    }

    #[tokio::test]
    async fn test_freeze_requires_cell() {
        let workbook = Arc::new(MemoryWorkbook::new());
        let tool = FreezePanesTool::new(workbook);
        let result = tool
            .execute("c1", json!({ "type": "rows" }), CancellationToken::new())
            .await;
        assert!(result.is_error);
    }
}
