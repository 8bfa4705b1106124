//! Tables, charts, pivots and other sheet objects

use async_trait::async_trait;
use gridmate_agent::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::parse_args;
use crate::backend::{
    Aggregation, ChartSpec, ChartType, ComparisonOperator, PivotField, PivotSpec, SharedBackend,
    ValidationKind, ValidationRule,
};

/// Create a formatted table over a range
pub struct CreateTableTool {
    backend: SharedBackend,
}

impl CreateTableTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTableArgs {
    range: String,
    table_name: Option<String>,
    has_headers: Option<bool>,
}

#[async_trait]
impl Tool for CreateTableTool {
    fn name(&self) -> &str {
        "create_table"
    }

    fn description(&self) -> &str {
        "Create a formatted table from a range of data."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Cell range for the table (e.g., \"A1:C10\")"
                },
                "tableName": {
                    "type": "string",
                    "description": "Name for the table"
                },
                "hasHeaders": {
                    "type": "boolean",
                    "description": "Whether the first row contains headers (default: true)"
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
        let args: CreateTableArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let name = args
            .table_name
            .unwrap_or_else(|| format!("Table{}", chrono::Utc::now().timestamp_millis()));
        let has_headers = args.has_headers.unwrap_or(true);

        match self
            .backend
            .create_table(&args.range, &name, has_headers)
            .await
        {
            Ok(()) => ToolResult::success(json!({ "tableName": name, "range": args.range })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Create a chart from a data range
pub struct CreateChartTool {
    backend: SharedBackend,
}

impl CreateChartTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChartArgs {
    data_range: String,
    chart_type: ChartType,
    title: Option<String>,
}

#[async_trait]
impl Tool for CreateChartTool {
    fn name(&self) -> &str {
        "create_chart"
    }

    fn description(&self) -> &str {
        "Create a chart from data in the workbook."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "dataRange": {
                    "type": "string",
                    "description": "Range containing the data to chart"
                },
                "chartType": {
                    "type": "string",
                    "description": "Type of chart to create",
                    "enum": ["ColumnClustered", "ColumnStacked", "Line", "LineMarkers", "Pie", "BarClustered", "Area", "XYScatter"]
                },
                "title": {
                    "type": "string",
                    "description": "Chart title"
                }
            },
            "required": ["dataRange", "chartType"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: CreateChartArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let spec = ChartSpec {
            data_range: args.data_range.clone(),
            chart_type: args.chart_type,
            title: args.title.clone(),
        };
        match self.backend.create_chart(spec).await {
            Ok(()) => ToolResult::success(json!({
                "chartType": args.chart_type,
                "title": args.title,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Create a pivot table on its own worksheet
pub struct CreatePivotTableTool {
    backend: SharedBackend,
}

impl CreatePivotTableTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PivotFieldArgs {
    field: String,
    function: Option<Aggregation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePivotTableArgs {
    source_range: String,
    destination_sheet: Option<String>,
    row_fields: Vec<String>,
    #[serde(default)]
    column_fields: Vec<String>,
    data_fields: Vec<PivotFieldArgs>,
}

#[async_trait]
impl Tool for CreatePivotTableTool {
    fn name(&self) -> &str {
        "create_pivot_table"
    }

    fn description(&self) -> &str {
        "Create a pivot table from a data range. The pivot table is placed on a new worksheet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sourceRange": {
                    "type": "string",
                    "description": "Source data range for the pivot table (e.g., \"A1:D100\")"
                },
                "destinationSheet": {
                    "type": "string",
                    "description": "Name for the worksheet where the pivot table will be created (optional)"
                },
                "rowFields": {
                    "type": "array",
                    "description": "Column names to use as row fields",
                    "items": { "type": "string" }
                },
                "columnFields": {
                    "type": "array",
                    "description": "Column names to use as column fields (optional)",
                    "items": { "type": "string" }
                },
                "dataFields": {
                    "type": "array",
                    "description": "Fields to aggregate in the values area",
                    "items": {
                        "type": "object",
                        "properties": {
                            "field": {
                                "type": "string",
                                "description": "Column name"
                            },
                            "function": {
                                "type": "string",
                                "description": "Aggregation function",
                                "enum": ["Sum", "Count", "Average", "Min", "Max"]
                            }
                        }
                    }
                }
            },
            "required": ["sourceRange", "rowFields", "dataFields"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: CreatePivotTableArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let spec = PivotSpec {
            source_range: args.source_range,
            destination_sheet: args.destination_sheet,
            row_fields: args.row_fields.clone(),
            column_fields: args.column_fields,
            data_fields: args
                .data_fields
                .into_iter()
                .map(|f| PivotField {
                    field: f.field,
                    function: f.function.unwrap_or(Aggregation::Sum),
                })
                .collect(),
        };
        let data_fields: Vec<_> = spec.data_fields.clone();
        match self.backend.create_pivot_table(spec).await {
            Ok(destination) => ToolResult::success(json!({
                "destinationSheet": destination,
                "rowFields": args.row_fields,
                "dataFields": data_fields,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Attach a comment to a cell
pub struct AddCommentTool {
    backend: SharedBackend,
}

impl AddCommentTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct AddCommentArgs {
    cell: String,
    comment: String,
    author: Option<String>,
}

#[async_trait]
impl Tool for AddCommentTool {
    fn name(&self) -> &str {
        "add_comment"
    }

    fn description(&self) -> &str {
        "Add a comment or note to a cell."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "cell": {
                    "type": "string",
                    "description": "Cell address (e.g., \"A1\")"
                },
                "comment": {
                    "type": "string",
                    "description": "Comment text"
                },
                "author": {
                    "type": "string",
                    "description": "Comment author name (optional)"
                }
            },
            "required": ["cell", "comment"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: AddCommentArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self
            .backend
            .add_comment(&args.cell, &args.comment, args.author.as_deref())
            .await
        {
            Ok(()) => ToolResult::success(json!({ "cell": args.cell, "comment": args.comment })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Turn a cell into a hyperlink
pub struct AddHyperlinkTool {
    backend: SharedBackend,
}

impl AddHyperlinkTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddHyperlinkArgs {
    cell: String,
    url: String,
    display_text: Option<String>,
}

#[async_trait]
impl Tool for AddHyperlinkTool {
    fn name(&self) -> &str {
        "add_hyperlink"
    }

    fn description(&self) -> &str {
        "Add a hyperlink to a cell."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "cell": {
                    "type": "string",
                    "description": "Cell to add hyperlink to"
                },
                "url": {
                    "type": "string",
                    "description": "URL or email address (use mailto: for email)"
                },
                "displayText": {
                    "type": "string",
                    "description": "Text to display (optional, uses URL if not specified)"
                }
            },
            "required": ["cell", "url"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: AddHyperlinkArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self
            .backend
            .add_hyperlink(&args.cell, &args.url, args.display_text.as_deref())
            .await
        {
            Ok(()) => ToolResult::success(json!({ "cell": args.cell, "url": args.url })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Define a named range
pub struct CreateNamedRangeTool {
    backend: SharedBackend,
}

impl CreateNamedRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct CreateNamedRangeArgs {
    range: String,
    name: String,
}

#[async_trait]
impl Tool for CreateNamedRangeTool {
    fn name(&self) -> &str {
        "create_named_range"
    }

    fn description(&self) -> &str {
        "Create a named range for easier formula references."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to name"
                },
                "name": {
                    "type": "string",
                    "description": "Name for the range (must start with letter, no spaces)"
                }
            },
            "required": ["range", "name"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: CreateNamedRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self.backend.define_name(&args.name, &args.range).await {
            Ok(()) => ToolResult::success(json!({ "name": args.name, "range": args.range })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Add a data validation rule to cells
pub struct DataValidationTool {
    backend: SharedBackend,
}

impl DataValidationTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataValidationArgs {
    range: String,
    #[serde(rename = "type")]
    kind: ValidationKind,
    operator: Option<ComparisonOperator>,
    source: Option<String>,
    allow_blank: Option<bool>,
    error_message: Option<String>,
}

#[async_trait]
impl Tool for DataValidationTool {
    fn name(&self) -> &str {
        "add_data_validation"
    }

    fn description(&self) -> &str {
        "Add data validation rules to cells (dropdown lists, date validation, number ranges)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Cell range to validate"
                },
                "type": {
                    "type": "string",
                    "description": "Type of validation",
                    "enum": ["list", "wholeNumber", "decimal", "date", "textLength"]
                },
                "operator": {
                    "type": "string",
                    "description": "Comparison operator",
                    "enum": ["between", "notBetween", "equalTo", "notEqualTo", "greaterThan", "lessThan"]
                },
                "source": {
                    "type": "string",
                    "description": "For list type: comma-separated values or range. For others: comparison value"
                },
                "allowBlank": {
                    "type": "boolean",
                    "description": "Allow blank cells (default: true)"
                },
                "errorMessage": {
                    "type": "string",
                    "description": "Error message to show when validation fails"
                }
            },
            "required": ["range", "type"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: DataValidationArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        if args.kind == ValidationKind::List && args.source.is_none() {
            return ToolResult::failure("List validation requires a 'source'");
        }
        let rule = ValidationRule {
            kind: args.kind,
            operator: args.operator,
            source: args.source,
            allow_blank: args.allow_blank,
            error_message: args.error_message,
        };
        match self.backend.data_validation(&args.range, rule).await {
            Ok(()) => ToolResult::success(json!({ "range": args.range, "type": args.kind })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Remove duplicate rows from a range
pub struct RemoveDuplicatesTool {
    backend: SharedBackend,
}

impl RemoveDuplicatesTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveDuplicatesArgs {
    range: String,
    #[serde(default)]
    column_indices: Vec<u32>,
    has_headers: Option<bool>,
}

#[async_trait]
impl Tool for RemoveDuplicatesTool {
    fn name(&self) -> &str {
        "remove_duplicates"
    }

    fn description(&self) -> &str {
        "Remove duplicate rows from a range based on specified columns."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to check for duplicates"
                },
                "columnIndices": {
                    "type": "array",
                    "description": "Column indices to check (0-based). If not specified, checks all columns.",
                    "items": { "type": "number" }
                },
                "hasHeaders": {
                    "type": "boolean",
                    "description": "Whether first row contains headers (default: true)"
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
        let args: RemoveDuplicatesArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self
            .backend
            .remove_duplicates(
                &args.range,
                &args.column_indices,
                args.has_headers.unwrap_or(true),
            )
            .await
        {
            Ok(outcome) => ToolResult::success(json!({
                "range": args.range,
                "removed": outcome.removed,
                "remaining": outcome.unique_remaining,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}
