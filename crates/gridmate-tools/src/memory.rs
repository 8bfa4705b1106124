//! In-memory workbook backend.
//!
//! Backs the test suite and the sandbox CLI. Cell contents live in growable
//! grids; operations the grid cannot show (charts, tables, formatting rules)
//! are recorded so callers can assert on them.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::a1::{self, CellRef, RangeRef};
use crate::backend::*;

#[derive(Debug, Clone, Default)]
struct Cell {
    value: CellValue,
    formula: Option<String>,
    number_format: Option<String>,
}

#[derive(Debug, Default)]
struct Sheet {
    name: String,
    cells: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
        }
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        if self.cells.len() <= row {
            self.cells.resize_with(row + 1, Vec::new);
        }
        let row_cells = &mut self.cells[row];
        if row_cells.len() <= col {
            row_cells.resize_with(col + 1, Cell::default);
        }
        &mut row_cells[col]
    }

    fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(row)?.get(col)
    }

    fn write_cell(&mut self, row: usize, col: usize, value: CellValue) {
        let cell = self.cell_mut(row, col);
        // A leading '=' means a formula, as when typing into the grid
        if let Value::String(s) = &value {
            if s.starts_with('=') {
                cell.formula = Some(s.clone());
                cell.value = Value::Null;
                return;
            }
        }
        cell.formula = None;
        cell.value = value;
    }

    fn used_extent(&self) -> (usize, usize) {
        let rows = self.cells.len();
        let cols = self.cells.iter().map(|r| r.len()).max().unwrap_or(0);
        (rows.max(1), cols.max(1))
    }
}

/// Everything recorded that the grid itself cannot represent
#[derive(Debug, Default)]
struct Records {
    tables: Vec<(String, String, bool)>,
    charts: Vec<ChartSpec>,
    pivots: Vec<(PivotSpec, String)>,
    comments: Vec<(String, String, Option<String>)>,
    hyperlinks: Vec<(String, String)>,
    names: Vec<(String, String)>,
    formats: Vec<(String, CellFormat)>,
    borders: Vec<(String, BorderSpec)>,
    alignments: Vec<(String, AlignmentSpec)>,
    conditionals: Vec<(String, ConditionalRule)>,
    validations: Vec<(String, ValidationRule)>,
    filters: Vec<(String, bool)>,
    merges: Vec<(String, bool, bool)>,
    frozen: Option<(FreezeKind, Option<String>)>,
    hidden: Vec<(String, Axis, bool)>,
    autofits: Vec<(String, Axis)>,
    protected: Vec<(String, bool)>,
}

#[derive(Debug)]
struct Inner {
    sheets: Vec<Sheet>,
    active: usize,
    selection: Option<String>,
    records: Records,
}

/// An in-memory workbook implementing the full backend contract
pub struct MemoryWorkbook {
    inner: Mutex<Inner>,
}

impl Default for MemoryWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkbook {
    /// A workbook with a single empty sheet named "Sheet1"
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sheets: vec![Sheet::new("Sheet1")],
                active: 0,
                selection: None,
                records: Records::default(),
            }),
        }
    }

    /// Set the current selection address
    pub fn set_selection(&self, address: impl Into<String>) {
        self.inner.lock().selection = Some(address.into());
    }

    /// A single cell's value, for assertions
    pub fn cell_value(&self, sheet: &str, cell: &str) -> CellValue {
        let inner = self.inner.lock();
        let Some(sheet) = inner.sheets.iter().find(|s| s.name == sheet) else {
            return Value::Null;
        };
        let Some(cell_ref) = a1::parse_cell(cell) else {
            return Value::Null;
        };
        sheet
            .cell(cell_ref.row, cell_ref.col)
            .map(|c| c.value.clone())
            .unwrap_or(Value::Null)
    }

    pub fn charts(&self) -> Vec<ChartSpec> {
        self.inner.lock().records.charts.clone()
    }

    pub fn tables(&self) -> Vec<(String, String, bool)> {
        self.inner.lock().records.tables.clone()
    }

    pub fn pivots(&self) -> Vec<(PivotSpec, String)> {
        self.inner.lock().records.pivots.clone()
    }

    pub fn comments(&self) -> Vec<(String, String, Option<String>)> {
        self.inner.lock().records.comments.clone()
    }

    pub fn hyperlinks(&self) -> Vec<(String, String)> {
        self.inner.lock().records.hyperlinks.clone()
    }

    pub fn named_ranges(&self) -> Vec<(String, String)> {
        self.inner.lock().records.names.clone()
    }

    pub fn formats(&self) -> Vec<(String, CellFormat)> {
        self.inner.lock().records.formats.clone()
    }

    pub fn frozen_panes(&self) -> Option<(FreezeKind, Option<String>)> {
        self.inner.lock().records.frozen.clone()
    }

    pub fn merges(&self) -> Vec<(String, bool, bool)> {
        self.inner.lock().records.merges.clone()
    }

    /// Render a sheet's used range as plain text rows, for the sandbox CLI
    pub fn render_sheet(&self, name: Option<&str>) -> Result<String> {
        let inner = self.inner.lock();
        let sheet = match name {
            Some(n) => inner
                .sheets
                .iter()
                .find(|s| s.name == n)
                .ok_or_else(|| BackendError::WorksheetNotFound(n.to_string()))?,
            None => &inner.sheets[inner.active],
        };
        let (rows, cols) = sheet.used_extent();
        let mut out = String::new();
        for row in 0..rows {
            let mut fields = Vec::with_capacity(cols);
            for col in 0..cols {
                let text = sheet
                    .cell(row, col)
                    .map(|c| match (&c.formula, &c.value) {
                        (Some(f), _) => f.clone(),
                        (None, Value::Null) => String::new(),
                        (None, Value::String(s)) => s.clone(),
                        (None, v) => v.to_string(),
                    })
                    .unwrap_or_default();
                fields.push(text);
            }
            out.push_str(&fields.join("\t"));
            out.push('\n');
        }
        Ok(out)
    }
}

impl Inner {
    fn sheet_index(&self, name: &str) -> Result<usize> {
        self.sheets
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| BackendError::WorksheetNotFound(name.to_string()))
    }

    /// Resolve worksheet param, sheet-prefixed range, or the active sheet.
    fn resolve_sheet(&self, worksheet: Option<&str>, range: &str) -> Result<usize> {
        if let Some(name) = worksheet {
            return self.sheet_index(name);
        }
        if let (Some(name), _) = a1::split_sheet(range) {
            return self.sheet_index(name);
        }
        Ok(self.active)
    }

    fn active_sheet_mut(&mut self) -> &mut Sheet {
        let index = self.active;
        &mut self.sheets[index]
    }
}

fn parse_range(range: &str) -> Result<RangeRef> {
    a1::parse_range(range).ok_or_else(|| BackendError::InvalidRange(range.to_string()))
}

fn parse_cell(cell: &str) -> Result<CellRef> {
    a1::parse_cell(a1::split_sheet(cell).1)
        .ok_or_else(|| BackendError::InvalidRange(cell.to_string()))
}

fn range_data(sheet: &Sheet, rect: RangeRef) -> RangeData {
    let mut values = Vec::with_capacity(rect.rows());
    let mut formulas = Vec::with_capacity(rect.rows());
    let mut number_formats = Vec::with_capacity(rect.rows());
    for row in rect.start.row..=rect.end.row {
        let mut value_row = Vec::with_capacity(rect.cols());
        let mut formula_row = Vec::with_capacity(rect.cols());
        let mut format_row = Vec::with_capacity(rect.cols());
        for col in rect.start.col..=rect.end.col {
            let cell = sheet.cell(row, col);
            value_row.push(cell.map(|c| c.value.clone()).unwrap_or(Value::Null));
            formula_row.push(
                cell.and_then(|c| c.formula.clone())
                    .unwrap_or_default(),
            );
            format_row.push(
                cell.and_then(|c| c.number_format.clone())
                    .unwrap_or_else(|| "General".to_string()),
            );
        }
        values.push(value_row);
        formulas.push(formula_row);
        number_formats.push(format_row);
    }
    RangeData {
        address: format!("{}!{}", sheet.name, a1::format_range(rect)),
        values,
        formulas,
        number_formats,
    }
}

#[async_trait]
impl SpreadsheetBackend for MemoryWorkbook {
    async fn read_range(&self, worksheet: Option<&str>, range: &str) -> Result<RangeData> {
        let inner = self.inner.lock();
        let index = inner.resolve_sheet(worksheet, range)?;
        let rect = parse_range(range)?;
        Ok(range_data(&inner.sheets[index], rect))
    }

    async fn used_range(&self) -> Result<RangeData> {
        let inner = self.inner.lock();
        let sheet = &inner.sheets[inner.active];
        let (rows, cols) = sheet.used_extent();
        let rect = RangeRef {
            start: CellRef { row: 0, col: 0 },
            end: CellRef {
                row: rows - 1,
                col: cols - 1,
            },
        };
        Ok(range_data(sheet, rect))
    }

    async fn selection(&self) -> Result<SelectionData> {
        let inner = self.inner.lock();
        let address = inner.selection.clone().unwrap_or_else(|| "A1".to_string());
        let index = inner.resolve_sheet(None, &address)?;
        let rect = parse_range(&address)?;
        let data = range_data(&inner.sheets[index], rect);
        Ok(SelectionData {
            address: data.address,
            values: data.values,
            formulas: data.formulas,
            row_count: rect.rows() as u32,
            column_count: rect.cols() as u32,
        })
    }

    async fn workbook_info(&self) -> Result<WorkbookInfo> {
        let inner = self.inner.lock();
        Ok(WorkbookInfo {
            worksheets: inner.sheets.iter().map(|s| s.name.clone()).collect(),
            active_worksheet: inner.sheets[inner.active].name.clone(),
        })
    }

    async fn write_range(
        &self,
        worksheet: Option<&str>,
        range: &str,
        values: Grid,
    ) -> Result<usize> {
        let mut inner = self.inner.lock();
        let index = inner.resolve_sheet(worksheet, range)?;
        let rect = parse_range(range)?;
        let sheet = &mut inner.sheets[index];
        for (r, row) in values.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.write_cell(rect.start.row + r, rect.start.col + c, value.clone());
            }
        }
        Ok(values.len())
    }

    async fn set_formulas(&self, range: &str, formula: &str) -> Result<usize> {
        let mut inner = self.inner.lock();
        let index = inner.resolve_sheet(None, range)?;
        let rect = parse_range(range)?;
        let sheet = &mut inner.sheets[index];
        for row in rect.start.row..=rect.end.row {
            for col in rect.start.col..=rect.end.col {
                let cell = sheet.cell_mut(row, col);
                cell.formula = Some(formula.to_string());
                cell.value = Value::Null;
            }
        }
        Ok(rect.rows() * rect.cols())
    }

    async fn clear_range(&self, range: &str, kind: ClearKind) -> Result<()> {
        let mut inner = self.inner.lock();
        let index = inner.resolve_sheet(None, range)?;
        let rect = parse_range(range)?;
        let sheet = &mut inner.sheets[index];
        for row in rect.start.row..=rect.end.row {
            for col in rect.start.col..=rect.end.col {
                let cell = sheet.cell_mut(row, col);
                if kind != ClearKind::Formats {
                    cell.value = Value::Null;
                    cell.formula = None;
                }
                if kind != ClearKind::Contents {
                    cell.number_format = None;
                }
            }
        }
        Ok(())
    }

    async fn copy_range(&self, source: &str, destination: &str, kind: CopyKind) -> Result<usize> {
        let mut inner = self.inner.lock();
        let source_rect = parse_range(source)?;
        let dest_rect = parse_range(destination)?;
        let sheet = inner.active_sheet_mut();

        let single_source = source_rect.rows() == 1 && source_rect.cols() == 1;
        let fill_dest = single_source && (dest_rect.rows() > 1 || dest_rect.cols() > 1);
        let (rows, cols) = if fill_dest {
            (dest_rect.rows(), dest_rect.cols())
        } else {
            (source_rect.rows(), source_rect.cols())
        };

        for r in 0..rows {
            for c in 0..cols {
                let (src_r, src_c) = if fill_dest {
                    (source_rect.start.row, source_rect.start.col)
                } else {
                    (source_rect.start.row + r, source_rect.start.col + c)
                };
                let copied = sheet.cell(src_r, src_c).cloned().unwrap_or_default();
                let target = sheet.cell_mut(dest_rect.start.row + r, dest_rect.start.col + c);
                match kind {
                    CopyKind::All => *target = copied,
                    CopyKind::Values => {
                        target.value = copied.value;
                        target.formula = None;
                    }
                    CopyKind::Formulas => {
                        if copied.formula.is_some() {
                            target.formula = copied.formula;
                            target.value = Value::Null;
                        } else {
                            target.value = copied.value;
                            target.formula = None;
                        }
                    }
                    CopyKind::Formats => {
                        target.number_format = copied.number_format;
                    }
                }
            }
        }
        Ok(rows * cols)
    }

    async fn insert_rows(&self, index: u32, count: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        let sheet = inner.active_sheet_mut();
        let index = (index as usize).min(sheet.cells.len());
        for _ in 0..count {
            sheet.cells.insert(index, Vec::new());
        }
        Ok(())
    }

    async fn delete_rows(&self, index: u32, count: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        let sheet = inner.active_sheet_mut();
        let start = (index as usize).min(sheet.cells.len());
        let end = (start + count as usize).min(sheet.cells.len());
        sheet.cells.drain(start..end);
        Ok(())
    }

    async fn sort_range(
        &self,
        range: &str,
        key_column: u32,
        ascending: bool,
        has_headers: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let rect = parse_range(range)?;
        if key_column as usize >= rect.cols() {
            return Err(BackendError::Operation(format!(
                "Sort column {} is outside the range {}",
                key_column, range
            )));
        }
        let sheet = inner.active_sheet_mut();

        let mut rows: Vec<Vec<Cell>> = (rect.start.row..=rect.end.row)
            .map(|row| {
                (rect.start.col..=rect.end.col)
                    .map(|col| sheet.cell(row, col).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        let data_start = if has_headers { 1 } else { 0 };
        let key = key_column as usize;
        rows[data_start..].sort_by(|a, b| {
            let ordering = compare_cells(&a[key].value, &b[key].value);
            if ascending { ordering } else { ordering.reverse() }
        });

        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                *sheet.cell_mut(rect.start.row + r, rect.start.col + c) = cell;
            }
        }
        Ok(())
    }

    async fn manage_worksheet(&self, action: WorksheetAction) -> Result<()> {
        let mut inner = self.inner.lock();
        match action {
            WorksheetAction::Create { name } => {
                if inner.sheets.iter().any(|s| s.name == name) {
                    return Err(BackendError::Operation(format!(
                        "Worksheet already exists: {}",
                        name
                    )));
                }
                inner.sheets.push(Sheet::new(name));
                inner.active = inner.sheets.len() - 1;
                Ok(())
            }
            WorksheetAction::Delete { name } => {
                let index = inner.sheet_index(&name)?;
                if inner.sheets.len() == 1 {
                    return Err(BackendError::Operation(
                        "Cannot delete the last worksheet".to_string(),
                    ));
                }
                inner.sheets.remove(index);
                if inner.active >= inner.sheets.len() {
                    inner.active = inner.sheets.len() - 1;
                }
                Ok(())
            }
            WorksheetAction::Rename { name, new_name } => {
                if inner.sheets.iter().any(|s| s.name == new_name) {
                    return Err(BackendError::Operation(format!(
                        "Worksheet already exists: {}",
                        new_name
                    )));
                }
                let index = inner.sheet_index(&name)?;
                inner.sheets[index].name = new_name;
                Ok(())
            }
            WorksheetAction::Move { name, position } => {
                let index = inner.sheet_index(&name)?;
                let active_name = inner.sheets[inner.active].name.clone();
                let sheet = inner.sheets.remove(index);
                let position = (position as usize).min(inner.sheets.len());
                inner.sheets.insert(position, sheet);
                inner.active = inner
                    .sheets
                    .iter()
                    .position(|s| s.name == active_name)
                    .unwrap_or(0);
                Ok(())
            }
        }
    }

    async fn remove_duplicates(
        &self,
        range: &str,
        columns: &[u32],
        has_headers: bool,
    ) -> Result<RemoveDuplicatesOutcome> {
        let mut inner = self.inner.lock();
        let rect = parse_range(range)?;
        let sheet = inner.active_sheet_mut();

        let all_rows: Vec<Vec<Cell>> = (rect.start.row..=rect.end.row)
            .map(|row| {
                (rect.start.col..=rect.end.col)
                    .map(|col| sheet.cell(row, col).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        let data_start = if has_headers { 1 } else { 0 };
        let mut seen = std::collections::HashSet::new();
        let mut kept: Vec<Vec<Cell>> = all_rows[..data_start].to_vec();
        let mut removed = 0u32;

        for row in &all_rows[data_start..] {
            let key: String = if columns.is_empty() {
                row.iter()
                    .map(|c| c.value.to_string())
                    .collect::<Vec<_>>()
                    .join("\u{1}")
            } else {
                columns
                    .iter()
                    .map(|&col| {
                        row.get(col as usize)
                            .map(|c| c.value.to_string())
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>()
                    .join("\u{1}")
            };
            if seen.insert(key) {
                kept.push(row.clone());
            } else {
                removed += 1;
            }
        }

        let unique_remaining = (kept.len() - data_start) as u32;
        for r in 0..rect.rows() {
            for c in 0..rect.cols() {
                let cell = sheet.cell_mut(rect.start.row + r, rect.start.col + c);
                *cell = kept.get(r).and_then(|row| row.get(c)).cloned().unwrap_or_default();
            }
        }

        Ok(RemoveDuplicatesOutcome {
            removed,
            unique_remaining,
        })
    }

    async fn create_table(&self, range: &str, name: &str, has_headers: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner
            .records
            .tables
            .push((name.to_string(), range.to_string(), has_headers));
        Ok(())
    }

    async fn create_chart(&self, spec: ChartSpec) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(&spec.data_range)?;
        inner.records.charts.push(spec);
        Ok(())
    }

    async fn create_pivot_table(&self, spec: PivotSpec) -> Result<String> {
        let mut inner = self.inner.lock();
        parse_range(&spec.source_range)?;
        if spec.row_fields.is_empty() || spec.data_fields.is_empty() {
            return Err(BackendError::Operation(
                "A pivot table needs at least one row field and one data field".to_string(),
            ));
        }
        let destination = spec
            .destination_sheet
            .clone()
            .unwrap_or_else(|| "Pivot Table".to_string());
        if !inner.sheets.iter().any(|s| s.name == destination) {
            inner.sheets.push(Sheet::new(destination.clone()));
        }
        inner.records.pivots.push((spec, destination.clone()));
        Ok(destination)
    }

    async fn add_comment(&self, cell: &str, text: &str, author: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_cell(cell)?;
        inner.records.comments.push((
            cell.to_string(),
            text.to_string(),
            author.map(|a| a.to_string()),
        ));
        Ok(())
    }

    async fn add_hyperlink(
        &self,
        cell: &str,
        url: &str,
        display_text: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let cell_ref = parse_cell(cell)?;
        let text = display_text.unwrap_or(url).to_string();
        inner
            .active_sheet_mut()
            .write_cell(cell_ref.row, cell_ref.col, Value::String(text));
        inner
            .records
            .hyperlinks
            .push((cell.to_string(), url.to_string()));
        Ok(())
    }

    async fn define_name(&self, name: &str, range: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner
            .records
            .names
            .push((name.to_string(), range.to_string()));
        Ok(())
    }

    async fn apply_format(&self, range: &str, format: CellFormat) -> Result<()> {
        let mut inner = self.inner.lock();
        let rect = parse_range(range)?;
        if let Some(number_format) = &format.number_format {
            let sheet = inner.active_sheet_mut();
            for row in rect.start.row..=rect.end.row {
                for col in rect.start.col..=rect.end.col {
                    sheet.cell_mut(row, col).number_format = Some(number_format.clone());
                }
            }
        }
        inner.records.formats.push((range.to_string(), format));
        Ok(())
    }

    async fn apply_borders(&self, range: &str, spec: BorderSpec) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.borders.push((range.to_string(), spec));
        Ok(())
    }

    async fn set_alignment(&self, range: &str, spec: AlignmentSpec) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.alignments.push((range.to_string(), spec));
        Ok(())
    }

    async fn conditional_format(&self, range: &str, rule: ConditionalRule) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.conditionals.push((range.to_string(), rule));
        Ok(())
    }

    async fn data_validation(&self, range: &str, rule: ValidationRule) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.validations.push((range.to_string(), rule));
        Ok(())
    }

    async fn autofilter(&self, range: &str, remove: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.filters.push((range.to_string(), remove));
        Ok(())
    }

    async fn merge_cells(&self, range: &str, merge: bool, across: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.merges.push((range.to_string(), merge, across));
        Ok(())
    }

    async fn freeze_panes(&self, kind: FreezeKind, cell: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(cell) = cell {
            parse_cell(cell)?;
        }
        inner.records.frozen = match kind {
            FreezeKind::Unfreeze => None,
            _ => Some((kind, cell.map(|c| c.to_string()))),
        };
        Ok(())
    }

    async fn hide_rows_columns(&self, range: &str, axis: Axis, hide: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.hidden.push((range.to_string(), axis, hide));
        Ok(())
    }

    async fn autofit(&self, range: &str, axis: Axis) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.autofits.push((range.to_string(), axis));
        Ok(())
    }

    async fn protect_range(&self, range: &str, protect: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        parse_range(range)?;
        inner.records.protected.push((range.to_string(), protect));
        Ok(())
    }
}

/// Numbers sort before text; text compares case-insensitively.
fn compare_cells(a: &CellValue, b: &CellValue) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => {
            let x = a.as_str().unwrap_or_default().to_lowercase();
            let y = b.as_str().unwrap_or_default().to_lowercase();
            x.cmp(&y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid(rows: &[&[Value]]) -> Grid {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let wb = MemoryWorkbook::new();
        wb.write_range(None, "A1", grid(&[&[json!("name"), json!("amount")], &[json!("coffee"), json!(4.5)]]))
            .await
            .unwrap();

        let data = wb.read_range(None, "A1:B2").await.unwrap();
        assert_eq!(data.address, "Sheet1!A1:B2");
        assert_eq!(data.values[0][0], json!("name"));
        assert_eq!(data.values[1][1], json!(4.5));
    }

    #[tokio::test]
    async fn test_write_formula_string_becomes_formula() {
        let wb = MemoryWorkbook::new();
        wb.write_range(None, "C1", grid(&[&[json!("=SUM(A1:A3)")]]))
            .await
            .unwrap();
        let data = wb.read_range(None, "C1").await.unwrap();
        assert_eq!(data.formulas[0][0], "=SUM(A1:A3)");
        assert_eq!(data.values[0][0], Value::Null);
    }

    #[tokio::test]
    async fn test_read_range_on_named_sheet() {
        let wb = MemoryWorkbook::new();
        wb.manage_worksheet(WorksheetAction::Create {
            name: "Budget".into(),
        })
        .await
        .unwrap();
        wb.write_range(Some("Budget"), "A1", grid(&[&[json!(1)]]))
            .await
            .unwrap();

        let data = wb.read_range(None, "Budget!A1").await.unwrap();
        assert_eq!(data.values[0][0], json!(1));
        assert!(wb.read_range(Some("Nope"), "A1").await.is_err());
    }

    #[tokio::test]
    async fn test_sort_range_numbers_ascending_with_headers() {
        let wb = MemoryWorkbook::new();
        wb.write_range(
            None,
            "A1",
            grid(&[
                &[json!("amount")],
                &[json!(30)],
                &[json!(10)],
                &[json!(20)],
            ]),
        )
        .await
        .unwrap();

        wb.sort_range("A1:A4", 0, true, true).await.unwrap();

        let data = wb.read_range(None, "A1:A4").await.unwrap();
        assert_eq!(data.values[0][0], json!("amount"));
        assert_eq!(data.values[1][0], json!(10));
        assert_eq!(data.values[3][0], json!(30));
    }

    #[tokio::test]
    async fn test_sort_key_outside_range_fails() {
        let wb = MemoryWorkbook::new();
        assert!(wb.sort_range("A1:B4", 5, true, true).await.is_err());
    }

    #[tokio::test]
    async fn test_insert_and_delete_rows() {
        let wb = MemoryWorkbook::new();
        wb.write_range(None, "A1", grid(&[&[json!("a")], &[json!("b")]]))
            .await
            .unwrap();

        wb.insert_rows(1, 2).await.unwrap();
        assert_eq!(wb.cell_value("Sheet1", "A4"), json!("b"));

        wb.delete_rows(1, 2).await.unwrap();
        assert_eq!(wb.cell_value("Sheet1", "A2"), json!("b"));
    }

    #[tokio::test]
    async fn test_remove_duplicates_keeps_first_occurrence() {
        let wb = MemoryWorkbook::new();
        wb.write_range(
            None,
            "A1",
            grid(&[
                &[json!("merchant"), json!("amount")],
                &[json!("cafe"), json!(4)],
                &[json!("cafe"), json!(4)],
                &[json!("deli"), json!(9)],
            ]),
        )
        .await
        .unwrap();

        let outcome = wb.remove_duplicates("A1:B4", &[], true).await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.unique_remaining, 2);
        assert_eq!(wb.cell_value("Sheet1", "A3"), json!("deli"));
        assert_eq!(wb.cell_value("Sheet1", "A4"), Value::Null);
    }

    #[tokio::test]
    async fn test_manage_worksheet_lifecycle() {
        let wb = MemoryWorkbook::new();
        wb.manage_worksheet(WorksheetAction::Create {
            name: "Data".into(),
        })
        .await
        .unwrap();
        let info = wb.workbook_info().await.unwrap();
        assert_eq!(info.worksheets, vec!["Sheet1", "Data"]);
        assert_eq!(info.active_worksheet, "Data");

        wb.manage_worksheet(WorksheetAction::Rename {
            name: "Data".into(),
            new_name: "Budget".into(),
        })
        .await
        .unwrap();
        assert!(
            wb.manage_worksheet(WorksheetAction::Delete {
                name: "Data".into()
            })
            .await
            .is_err()
        );

        wb.manage_worksheet(WorksheetAction::Delete {
            name: "Budget".into(),
        })
        .await
        .unwrap();
        let info = wb.workbook_info().await.unwrap();
        assert_eq!(info.worksheets, vec!["Sheet1"]);
        // The last sheet cannot be deleted.
        assert!(
            wb.manage_worksheet(WorksheetAction::Delete {
                name: "Sheet1".into()
            })
            .await
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_selection_defaults_to_a1() {
        let wb = MemoryWorkbook::new();
        let selection = wb.selection().await.unwrap();
        assert_eq!(selection.address, "Sheet1!A1");
        assert_eq!(selection.row_count, 1);

        wb.set_selection("B2:C4");
        let selection = wb.selection().await.unwrap();
        assert_eq!(selection.row_count, 3);
        assert_eq!(selection.column_count, 2);
    }

    #[tokio::test]
    async fn test_copy_single_cell_fills_destination() {
        let wb = MemoryWorkbook::new();
        wb.write_range(None, "A1", grid(&[&[json!(7)]])).await.unwrap();
        let copied = wb.copy_range("A1", "B1:B3", CopyKind::Values).await.unwrap();
        assert_eq!(copied, 3);
        assert_eq!(wb.cell_value("Sheet1", "B3"), json!(7));
    }

    #[tokio::test]
    async fn test_pivot_creates_destination_sheet() {
        let wb = MemoryWorkbook::new();
        wb.write_range(None, "A1", grid(&[&[json!("cat"), json!("amt")]]))
            .await
            .unwrap();
        let dest = wb
            .create_pivot_table(PivotSpec {
                source_range: "A1:B10".into(),
                destination_sheet: None,
                row_fields: vec!["cat".into()],
                column_fields: vec![],
                data_fields: vec![PivotField {
                    field: "amt".into(),
                    function: Aggregation::Sum,
                }],
            })
            .await
            .unwrap();
        assert_eq!(dest, "Pivot Table");
        let info = wb.workbook_info().await.unwrap();
        assert!(info.worksheets.contains(&"Pivot Table".to_string()));
    }

    #[tokio::test]
    async fn test_clear_range_contents_keeps_formats() {
        let wb = MemoryWorkbook::new();
        wb.write_range(None, "A1", grid(&[&[json!(5)]])).await.unwrap();
        wb.apply_format(
            "A1",
            CellFormat {
                number_format: Some("0.00".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        wb.clear_range("A1", ClearKind::Contents).await.unwrap();
        let data = wb.read_range(None, "A1").await.unwrap();
        assert_eq!(data.values[0][0], Value::Null);
        assert_eq!(data.number_formats[0][0], "0.00");
    }
}
