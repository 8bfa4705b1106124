//! Formatting and view tools

use async_trait::async_trait;
use gridmate_agent::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::parse_args;
use crate::backend::{
    AlignmentSpec, Axis, BorderEdges, BorderSpec, BorderStyle, CellFormat, ComparisonOperator,
    ConditionalRule, HorizontalAlignment, SharedBackend, VerticalAlignment,
};

/// Apply number format, font and fill options to a range
pub struct FormatRangeTool {
    backend: SharedBackend,
}

impl FormatRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct FormatRangeArgs {
    range: String,
    format: CellFormat,
}

#[async_trait]
impl Tool for FormatRangeTool {
    fn name(&self) -> &str {
        "format_range"
    }

    fn description(&self) -> &str {
        "Apply formatting to a range of cells."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Cell range to format"
                },
                "format": {
                    "type": "object",
                    "description": "Formatting options",
                    "properties": {
                        "numberFormat": {
                            "type": "string",
                            "description": "Number format (e.g., \"0.00\", \"$#,##0.00\", \"m/d/yyyy\")"
                        },
                        "fontBold": {
                            "type": "boolean",
                            "description": "Make text bold"
                        },
                        "fontSize": {
                            "type": "number",
                            "description": "Font size in points"
                        },
                        "fillColor": {
                            "type": "string",
                            "description": "Background color (e.g., \"#FF0000\" or \"red\")"
                        },
                        "fontColor": {
                            "type": "string",
                            "description": "Text color"
                        }
                    }
                }
            },
            "required": ["range", "format"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: FormatRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self
            .backend
            .apply_format(&args.range, args.format.clone())
            .await
        {
            Ok(()) => ToolResult::success(json!({ "range": args.range, "format": args.format })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Draw borders on a range
pub struct ApplyBordersTool {
    backend: SharedBackend,
}

impl ApplyBordersTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyBordersArgs {
    range: String,
    border_type: BorderEdges,
    style: Option<BorderStyle>,
    color: Option<String>,
}

#[async_trait]
impl Tool for ApplyBordersTool {
    fn name(&self) -> &str {
        "apply_borders"
    }

    fn description(&self) -> &str {
        "Apply borders to cells."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to apply borders to"
                },
                "borderType": {
                    "type": "string",
                    "description": "Type of border",
                    "enum": ["all", "outline", "top", "bottom", "left", "right"]
                },
                "style": {
                    "type": "string",
                    "description": "Border style",
                    "enum": ["thin", "medium", "thick", "double"]
                },
                "color": {
                    "type": "string",
                    "description": "Border color (hex code, default: black)"
                }
            },
            "required": ["range", "borderType"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: ApplyBordersArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let spec = BorderSpec {
            edges: args.border_type,
            style: args.style.unwrap_or(BorderStyle::Thin),
            color: args.color.unwrap_or_else(|| "#000000".to_string()),
        };
        match self.backend.apply_borders(&args.range, spec).await {
            Ok(()) => ToolResult::success(json!({
                "range": args.range,
                "borderType": args.border_type,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Set text alignment for a range
pub struct SetAlignmentTool {
    backend: SharedBackend,
}

impl SetAlignmentTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetAlignmentArgs {
    range: String,
    horizontal: Option<HorizontalAlignment>,
    vertical: Option<VerticalAlignment>,
    wrap_text: Option<bool>,
    indent: Option<u32>,
}

#[async_trait]
impl Tool for SetAlignmentTool {
    fn name(&self) -> &str {
        "set_alignment"
    }

    fn description(&self) -> &str {
        "Set text alignment for a range."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to align"
                },
                "horizontal": {
                    "type": "string",
                    "description": "Horizontal alignment",
                    "enum": ["left", "center", "right", "justify"]
                },
                "vertical": {
                    "type": "string",
                    "description": "Vertical alignment",
                    "enum": ["top", "middle", "bottom"]
                },
                "wrapText": {
                    "type": "boolean",
                    "description": "Enable text wrapping"
                },
                "indent": {
                    "type": "number",
                    "description": "Indentation level (0-15)"
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
        let args: SetAlignmentArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let spec = AlignmentSpec {
            horizontal: args.horizontal,
            vertical: args.vertical,
            wrap_text: args.wrap_text,
            indent: args.indent,
        };
        match self.backend.set_alignment(&args.range, spec).await {
            Ok(()) => ToolResult::success(json!({
                "range": args.range,
                "alignment": {
                    "horizontal": args.horizontal,
                    "vertical": args.vertical,
                },
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Merge or unmerge cells
pub struct MergeCellsTool {
    backend: SharedBackend,
}

impl MergeCellsTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct MergeCellsArgs {
    range: String,
    merge: bool,
    #[serde(default)]
    across: bool,
}

#[async_trait]
impl Tool for MergeCellsTool {
    fn name(&self) -> &str {
        "merge_cells"
    }

    fn description(&self) -> &str {
        "Merge or unmerge cells in a range."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to merge/unmerge"
                },
                "merge": {
                    "type": "boolean",
                    "description": "True to merge, false to unmerge"
                },
                "across": {
                    "type": "boolean",
                    "description": "If true, merge each row separately (default: false)"
                }
            },
            "required": ["range", "merge"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: MergeCellsArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self
            .backend
            .merge_cells(&args.range, args.merge, args.across)
            .await
        {
            Ok(()) => ToolResult::success(json!({ "range": args.range, "merged": args.merge })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Autofit columns or rows to their content
pub struct AutofitTool {
    backend: SharedBackend,
}

impl AutofitTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct AutofitArgs {
    range: String,
    direction: Axis,
}

#[async_trait]
impl Tool for AutofitTool {
    fn name(&self) -> &str {
        "autofit_columns"
    }

    fn description(&self) -> &str {
        "Automatically resize columns or rows to fit content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to autofit"
                },
                "direction": {
                    "type": "string",
                    "description": "Resize columns or rows",
                    "enum": ["columns", "rows"]
                }
            },
            "required": ["range", "direction"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: AutofitArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self.backend.autofit(&args.range, args.direction).await {
            Ok(()) => ToolResult::success(json!({
                "range": args.range,
                "direction": args.direction,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Hide or unhide rows or columns
pub struct HideUnhideTool {
    backend: SharedBackend,
}

impl HideUnhideTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct HideUnhideArgs {
    range: String,
    #[serde(rename = "type")]
    axis: Axis,
    hide: bool,
}

#[async_trait]
impl Tool for HideUnhideTool {
    fn name(&self) -> &str {
        "hide_unhide"
    }

    fn description(&self) -> &str {
        "Hide or unhide rows or columns."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range of rows or columns to hide/unhide"
                },
                "type": {
                    "type": "string",
                    "description": "What to hide/unhide",
                    "enum": ["rows", "columns"]
                },
                "hide": {
                    "type": "boolean",
                    "description": "True to hide, false to unhide"
                }
            },
            "required": ["range", "type", "hide"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: HideUnhideArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self
            .backend
            .hide_rows_columns(&args.range, args.axis, args.hide)
            .await
        {
            Ok(()) => ToolResult::success(json!({
                "range": args.range,
                "type": args.axis,
                "hidden": args.hide,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Apply conditional formatting rules to a range
pub struct ConditionalFormattingTool {
    backend: SharedBackend,
}

impl ConditionalFormattingTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct ConditionalRuleArgs {
    operator: Option<ComparisonOperator>,
    value: Option<f64>,
    color: Option<String>,
}

#[derive(Deserialize)]
struct ConditionalFormattingArgs {
    range: String,
    #[serde(rename = "type")]
    kind: String,
    rule: Option<ConditionalRuleArgs>,
}

#[async_trait]
impl Tool for ConditionalFormattingTool {
    fn name(&self) -> &str {
        "apply_conditional_formatting"
    }

    fn description(&self) -> &str {
        "Apply conditional formatting to a range based on rules (color scales, data bars, or custom rules)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Cell range to format"
                },
                "type": {
                    "type": "string",
                    "description": "Type of conditional formatting",
                    "enum": ["colorScale", "dataBar", "cellValue", "iconSet"]
                },
                "rule": {
                    "type": "object",
                    "description": "Formatting rule configuration",
                    "properties": {
                        "operator": {
                            "type": "string",
                            "description": "Comparison operator for cellValue type",
                            "enum": ["greaterThan", "lessThan", "between", "equalTo", "notEqualTo"]
                        },
                        "value": {
                            "type": "number",
                            "description": "Value to compare against"
                        },
                        "color": {
                            "type": "string",
                            "description": "Color to apply (hex code)"
                        }
                    }
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
        let args: ConditionalFormattingArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };

        let rule = match args.kind.as_str() {
            "colorScale" => ConditionalRule::ColorScale,
            "dataBar" => ConditionalRule::DataBar,
            "iconSet" => ConditionalRule::IconSet,
            "cellValue" => {
                let Some(rule) = args.rule else {
                    return ToolResult::failure("cellValue formatting requires a rule");
                };
                let Some(value) = rule.value else {
                    return ToolResult::failure("cellValue formatting requires a rule value");
                };
                ConditionalRule::CellValue {
                    operator: rule.operator.unwrap_or(ComparisonOperator::GreaterThan),
                    value,
                    color: rule.color,
                }
            }
            other => {
                return ToolResult::failure(format!("Unknown conditional format type: {}", other));
            }
        };

        match self.backend.conditional_format(&args.range, rule).await {
            Ok(()) => ToolResult::success(json!({ "range": args.range, "type": args.kind })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// Lock or unlock a range against editing
pub struct ProtectRangeTool {
    backend: SharedBackend,
}

impl ProtectRangeTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct ProtectRangeArgs {
    range: String,
    protect: bool,
}

#[async_trait]
impl Tool for ProtectRangeTool {
    fn name(&self) -> &str {
        "protect_range"
    }

    fn description(&self) -> &str {
        "Protect or unprotect a range from editing."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to protect/unprotect"
                },
                "protect": {
                    "type": "boolean",
                    "description": "True to protect, false to unprotect"
                }
            },
            "required": ["range", "protect"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: ProtectRangeArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        match self.backend.protect_range(&args.range, args.protect).await {
            Ok(()) => ToolResult::success(json!({
                "range": args.range,
                "protected": args.protect,
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}
