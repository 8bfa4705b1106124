//! The tool catalogue: one adapter per operation the model can request.

mod analysis;
mod format;
mod objects;
mod range;
mod sheet;

pub use analysis::{
    CalculateStatisticsTool, CheckDuplicatesTool, ConvertCurrencyTool, ExpenseSummaryTool,
    ExportCsvTool, WebSearchTool,
};
pub use format::{
    ApplyBordersTool, ConditionalFormattingTool, FormatRangeTool, HideUnhideTool, MergeCellsTool,
    AutofitTool, ProtectRangeTool, SetAlignmentTool,
};
pub use objects::{
    AddCommentTool, AddHyperlinkTool, CreateChartTool, CreateNamedRangeTool, CreatePivotTableTool,
    CreateTableTool, DataValidationTool, RemoveDuplicatesTool,
};
pub use range::{
    ApplyFormulaTool, ClearRangeTool, CopyRangeTool, FindReplaceTool, GetSelectionTool,
    GetWorkbookInfoTool, ReadRangeTool, TextToColumnsTool, TransposeRangeTool, WriteRangeTool,
};
pub use sheet::{
    AutofilterTool, DeleteRowsTool, FreezePanesTool, InsertRowsTool, ManageWorksheetTool,
    SortRangeTool,
};

use gridmate_agent::{BoxedTool, ToolResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::backend::SharedBackend;

/// The full catalogue wired to one backend, in the order it is advertised
/// to the completion service.
pub fn builtin_tools(backend: SharedBackend) -> Vec<BoxedTool> {
    vec![
        Arc::new(WebSearchTool),
        Arc::new(ReadRangeTool::new(backend.clone())),
        Arc::new(WriteRangeTool::new(backend.clone())),
        Arc::new(GetSelectionTool::new(backend.clone())),
        Arc::new(GetWorkbookInfoTool::new(backend.clone())),
        Arc::new(CreateTableTool::new(backend.clone())),
        Arc::new(CreateChartTool::new(backend.clone())),
        Arc::new(ApplyFormulaTool::new(backend.clone())),
        Arc::new(FormatRangeTool::new(backend.clone())),
        Arc::new(InsertRowsTool::new(backend.clone())),
        Arc::new(DeleteRowsTool::new(backend.clone())),
        Arc::new(SortRangeTool::new(backend.clone())),
        Arc::new(CreatePivotTableTool::new(backend.clone())),
        Arc::new(ConditionalFormattingTool::new(backend.clone())),
        Arc::new(DataValidationTool::new(backend.clone())),
        Arc::new(FindReplaceTool::new(backend.clone())),
        Arc::new(AutofilterTool::new(backend.clone())),
        Arc::new(ManageWorksheetTool::new(backend.clone())),
        Arc::new(ClearRangeTool::new(backend.clone())),
        Arc::new(AddCommentTool::new(backend.clone())),
        Arc::new(AutofitTool::new(backend.clone())),
        Arc::new(CreateNamedRangeTool::new(backend.clone())),
        Arc::new(CopyRangeTool::new(backend.clone())),
        Arc::new(ApplyBordersTool::new(backend.clone())),
        Arc::new(ProtectRangeTool::new(backend.clone())),
        Arc::new(FreezePanesTool::new(backend.clone())),
        Arc::new(MergeCellsTool::new(backend.clone())),
        Arc::new(RemoveDuplicatesTool::new(backend.clone())),
        Arc::new(TransposeRangeTool::new(backend.clone())),
        Arc::new(TextToColumnsTool::new(backend.clone())),
        Arc::new(HideUnhideTool::new(backend.clone())),
        Arc::new(AddHyperlinkTool::new(backend.clone())),
        Arc::new(CalculateStatisticsTool::new(backend.clone())),
        Arc::new(SetAlignmentTool::new(backend.clone())),
        Arc::new(CheckDuplicatesTool::new(backend.clone())),
        Arc::new(ConvertCurrencyTool),
        Arc::new(ExpenseSummaryTool::new(backend.clone())),
        Arc::new(ExportCsvTool::new(backend)),
    ]
}

/// Parse typed tool arguments, converting failures into the normalized
/// invalid-arguments result before the backend is touched.
pub(crate) fn parse_args<T: DeserializeOwned>(
    arguments: serde_json::Value,
) -> Result<T, Box<ToolResult>> {
    serde_json::from_value(arguments)
        .map_err(|e| Box::new(ToolResult::failure(format!("Invalid arguments: {}", e))))
}

/// Render a cell value the way it displays in the grid.
pub(crate) fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryWorkbook;
    use gridmate_agent::Tool;

    #[test]
    fn test_catalogue_has_unique_names() {
        let backend: SharedBackend = Arc::new(MemoryWorkbook::new());
        let tools = builtin_tools(backend);
        let mut names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 38);
    }

    #[test]
    fn test_every_schema_is_an_object() {
        let backend: SharedBackend = Arc::new(MemoryWorkbook::new());
        for tool in builtin_tools(backend) {
            let schema = tool.parameters_schema();
            assert_eq!(schema["type"], "object", "schema of {}", tool.name());
        }
    }
}
