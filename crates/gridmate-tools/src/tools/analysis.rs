//! Analysis tools: local computations over fetched cell data.
//!
//! These run against data already resident in the request (or freshly read
//! from the backend) rather than issuing further remote calls. Monetary and
//! statistical results are rounded to 2 decimal places on output only.

use async_trait::async_trait;
use chrono::NaiveDate;
use gridmate_agent::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use super::{cell_to_string, parse_args};
use crate::backend::{CellFormat, CellValue, Grid, SharedBackend};

/// Round to 2 decimal places, standard rounding
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn numeric_values(grid: &Grid) -> Vec<f64> {
    grid.iter()
        .flat_map(|row| row.iter())
        .filter_map(|cell| cell.as_f64())
        .collect()
}

struct Stats {
    count: usize,
    sum: f64,
    mean: f64,
    median: f64,
    min: f64,
    max: f64,
    std_dev: f64,
}

fn compute_stats(values: &[f64]) -> Option<Stats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = sorted.len();
    let sum: f64 = sorted.iter().sum();
    let mean = sum / count as f64;
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    Some(Stats {
        count,
        sum,
        mean,
        median,
        min: sorted[0],
        max: sorted[count - 1],
        std_dev: variance.sqrt(),
    })
}

/// Quote a CSV field when it contains a comma, quote, or newline
fn csv_field(text: &str) -> String {
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn grid_to_csv(grid: &Grid, include_headers: bool) -> String {
    let mut csv = String::new();
    for (i, row) in grid.iter().enumerate() {
        if i == 0 && !include_headers {
            continue;
        }
        let line: Vec<String> = row
            .iter()
            .map(|cell| csv_field(&cell_to_string(cell)))
            .collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }
    csv
}

/// Parse the date formats that show up in typical sheets
fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    None
}

/// Pass-through acknowledgment: the completion service performs the actual
/// search; this just records the query so the conversation log is coherent.
pub struct WebSearchTool;

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information, historical data, exchange rates, prices, or any real-time information. Use this when you need up-to-date information such as current exchange rates, recent events, or pricing, or to verify facts."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query. Be specific and include dates when searching for historical information (e.g., \"EUR to USD exchange rate on 2024-01-15\")"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: WebSearchArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        ToolResult::success(json!({
            "query": args.query,
            "note": "Web search executed. Results integrated into response.",
        }))
    }
}

/// Descriptive statistics for the numbers in a range
pub struct CalculateStatisticsTool {
    backend: SharedBackend,
}

impl CalculateStatisticsTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct CalculateStatisticsArgs {
    range: String,
}

#[async_trait]
impl Tool for CalculateStatisticsTool {
    fn name(&self) -> &str {
        "calculate_statistics"
    }

    fn description(&self) -> &str {
        "Calculate statistics (mean, median, min, max, std dev, count) for a range."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to analyze"
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
        let args: CalculateStatisticsArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let data = match self.backend.read_range(None, &args.range).await {
            Ok(data) => data,
            Err(e) => return ToolResult::failure(e.to_string()),
        };

        let values = numeric_values(&data.values);
        let Some(stats) = compute_stats(&values) else {
            return ToolResult::failure("No numeric values found in range");
        };

        ToolResult::success(json!({
            "range": args.range,
            "count": stats.count,
            "sum": round2(stats.sum),
            "mean": round2(stats.mean),
            "median": round2(stats.median),
            "min": stats.min,
            "max": stats.max,
            "stdDev": round2(stats.std_dev),
        }))
    }
}

/// Scan existing rows for entries similar to a new one
pub struct CheckDuplicatesTool {
    backend: SharedBackend,
}

impl CheckDuplicatesTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct NewEntryArgs {
    date: String,
    merchant: Option<String>,
    amount: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckDuplicatesArgs {
    range: String,
    new_entry: NewEntryArgs,
    date_column: usize,
    merchant_column: usize,
    amount_column: usize,
    tolerance_days: Option<i64>,
}

#[async_trait]
impl Tool for CheckDuplicatesTool {
    fn name(&self) -> &str {
        "check_duplicates"
    }

    fn description(&self) -> &str {
        "Check for potential duplicate expenses before adding new entries. Scans existing data for similar entries based on date, merchant/description, and amount. Returns warnings if potential duplicates are found."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to check for duplicates (e.g., \"A2:E100\")"
                },
                "newEntry": {
                    "type": "object",
                    "description": "The new entry to check against existing data",
                    "properties": {
                        "date": {
                            "type": "string",
                            "description": "Date of the expense"
                        },
                        "merchant": {
                            "type": "string",
                            "description": "Merchant or description"
                        },
                        "amount": {
                            "type": "number",
                            "description": "Amount of the expense"
                        }
                    }
                },
                "dateColumn": {
                    "type": "number",
                    "description": "Column index for date (0-based, e.g., 0 for column A)"
                },
                "merchantColumn": {
                    "type": "number",
                    "description": "Column index for merchant/description"
                },
                "amountColumn": {
                    "type": "number",
                    "description": "Column index for amount"
                },
                "toleranceDays": {
                    "type": "number",
                    "description": "Number of days tolerance for date matching (default: 0)"
                }
            },
            "required": ["range", "newEntry", "dateColumn", "merchantColumn", "amountColumn"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: CheckDuplicatesArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let data = match self.backend.read_range(None, &args.range).await {
            Ok(data) => data,
            Err(e) => return ToolResult::failure(e.to_string()),
        };

        let duplicates = find_duplicates(
            &data.values,
            &args.new_entry,
            args.date_column,
            args.merchant_column,
            args.amount_column,
            args.tolerance_days.unwrap_or(0),
        );

        let message = if duplicates.is_empty() {
            "No duplicates found".to_string()
        } else {
            format!("Found {} potential duplicate(s)", duplicates.len())
        };
        ToolResult::success(json!({
            "hasDuplicates": !duplicates.is_empty(),
            "duplicates": duplicates,
            "message": message,
        }))
    }
}

fn find_duplicates(
    rows: &Grid,
    entry: &NewEntryArgs,
    date_column: usize,
    merchant_column: usize,
    amount_column: usize,
    tolerance_days: i64,
) -> Vec<serde_json::Value> {
    let Some(new_date) = parse_date(&entry.date) else {
        return vec![];
    };
    let new_merchant = entry.merchant.as_deref().unwrap_or("").to_lowercase();

    let mut duplicates = vec![];
    for (index, row) in rows.iter().enumerate() {
        let Some(existing_date) =
            row.get(date_column).and_then(|c| parse_date(&cell_to_string(c)))
        else {
            continue;
        };
        let Some(existing_amount) = row.get(amount_column).and_then(|c| c.as_f64()) else {
            continue;
        };
        let existing_merchant = row
            .get(merchant_column)
            .map(|c| cell_to_string(c).to_lowercase())
            .unwrap_or_default();

        let date_match =
            (new_date - existing_date).num_days().abs() <= tolerance_days;
        let amount_match = (existing_amount - entry.amount).abs() < 0.01;
        let merchant_match = new_merchant.contains(&existing_merchant)
            || existing_merchant.contains(&new_merchant);

        if date_match && amount_match && merchant_match {
            duplicates.push(json!({
                // 1-based row number, assuming a header row above the range
                "row": index + 2,
                "date": existing_date.format("%Y-%m-%d").to_string(),
                "merchant": row.get(merchant_column).map(cell_to_string).unwrap_or_default(),
                "amount": existing_amount,
            }));
        }
    }
    duplicates
}

/// Convert an amount with a given exchange rate
pub struct ConvertCurrencyTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertCurrencyArgs {
    amount: f64,
    from_currency: String,
    to_currency: String,
    exchange_rate: f64,
    date: Option<String>,
}

#[async_trait]
impl Tool for ConvertCurrencyTool {
    fn name(&self) -> &str {
        "convert_currency"
    }

    fn description(&self) -> &str {
        "Convert an amount from one currency to another using a given exchange rate. Use web_search first to get the exchange rate, then use this to perform the conversion and format the result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "description": "Amount to convert"
                },
                "fromCurrency": {
                    "type": "string",
                    "description": "Source currency code (e.g., \"EUR\", \"GBP\", \"JPY\")"
                },
                "toCurrency": {
                    "type": "string",
                    "description": "Target currency code (e.g., \"USD\")"
                },
                "exchangeRate": {
                    "type": "number",
                    "description": "Exchange rate to use for conversion"
                },
                "date": {
                    "type": "string",
                    "description": "Date for the exchange rate (for record keeping)"
                }
            },
            "required": ["amount", "fromCurrency", "toCurrency", "exchangeRate"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: ConvertCurrencyArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let converted = round2(args.amount * args.exchange_rate);
        let formatted = format!(
            "{} {} = {} {} (Rate: {})",
            args.from_currency, args.amount, args.to_currency, converted, args.exchange_rate
        );
        ToolResult::success(json!({
            "originalAmount": args.amount,
            "originalCurrency": args.from_currency,
            "convertedAmount": converted,
            "targetCurrency": args.to_currency,
            "exchangeRate": args.exchange_rate,
            "date": args.date,
            "formatted": formatted,
        }))
    }
}

/// Summarize an expense table and write the report back to the sheet
pub struct ExpenseSummaryTool {
    backend: SharedBackend,
}

impl ExpenseSummaryTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpenseSummaryArgs {
    data_range: String,
    date_column: usize,
    amount_column: usize,
    category_column: Option<usize>,
    output_cell: String,
}

#[async_trait]
impl Tool for ExpenseSummaryTool {
    fn name(&self) -> &str {
        "generate_expense_summary"
    }

    fn description(&self) -> &str {
        "Generate a summary report of expenses from a data range. Creates totals, category breakdowns, date ranges, and statistics."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "dataRange": {
                    "type": "string",
                    "description": "Range containing expense data to summarize"
                },
                "dateColumn": {
                    "type": "number",
                    "description": "Column index for dates (0-based)"
                },
                "amountColumn": {
                    "type": "number",
                    "description": "Column index for amounts (0-based)"
                },
                "categoryColumn": {
                    "type": "number",
                    "description": "Column index for categories (0-based, optional)"
                },
                "outputCell": {
                    "type": "string",
                    "description": "Starting cell for the summary report (e.g., \"A1\")"
                }
            },
            "required": ["dataRange", "dateColumn", "amountColumn", "outputCell"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let args: ExpenseSummaryArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let data = match self.backend.read_range(None, &args.data_range).await {
            Ok(data) => data,
            Err(e) => return ToolResult::failure(e.to_string()),
        };

        let mut total = 0.0;
        let mut count = 0usize;
        let mut dates: Vec<NaiveDate> = vec![];
        let mut categories: BTreeMap<String, f64> = BTreeMap::new();

        // First row is the header
        for row in data.values.iter().skip(1) {
            let Some(amount) = row.get(args.amount_column).and_then(|c| c.as_f64()) else {
                continue;
            };
            total += amount;
            count += 1;
            if let Some(date) =
                row.get(args.date_column).and_then(|c| parse_date(&cell_to_string(c)))
            {
                dates.push(date);
            }
            if let Some(category_column) = args.category_column {
                let category = row
                    .get(category_column)
                    .map(cell_to_string)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "Uncategorized".to_string());
                *categories.entry(category).or_insert(0.0) += amount;
            }
        }

        dates.sort();
        let start_date = dates
            .first()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let end_date = dates
            .last()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let average = if count > 0 { total / count as f64 } else { 0.0 };

        let text = |s: &str| CellValue::String(s.to_string());
        let mut summary: Grid = vec![
            vec![text("EXPENSE SUMMARY REPORT"), text("")],
            vec![text(""), text("")],
            vec![text("Date Range"), text(&format!("{} to {}", start_date, end_date))],
            vec![text("Total Expenses"), json!(round2(total))],
            vec![text("Number of Expenses"), json!(count)],
            vec![text("Average Expense"), json!(round2(average))],
            vec![text(""), text("")],
        ];
        if !categories.is_empty() {
            summary.push(vec![text("BREAKDOWN BY CATEGORY"), text("")]);
            for (category, amount) in &categories {
                summary.push(vec![text(category), json!(round2(*amount))]);
            }
        }

        if let Err(e) = self
            .backend
            .write_range(None, &args.output_cell, summary)
            .await
        {
            return ToolResult::failure(e.to_string());
        }
        // Highlight the report title
        let title_format = CellFormat {
            font_bold: Some(true),
            font_size: Some(14.0),
            fill_color: Some("#4472C4".to_string()),
            font_color: Some("white".to_string()),
            ..Default::default()
        };
        if let Err(e) = self.backend.apply_format(&args.output_cell, title_format).await {
            return ToolResult::failure(e.to_string());
        }

        let categories_json: BTreeMap<String, f64> =
            categories.into_iter().map(|(k, v)| (k, round2(v))).collect();
        ToolResult::success(json!({
            "total": round2(total),
            "count": count,
            "average": round2(average),
            "dateRange": { "start": start_date, "end": end_date },
            "categories": categories_json,
            "summaryLocation": args.output_cell,
        }))
    }
}

/// Render a range as CSV text
pub struct ExportCsvTool {
    backend: SharedBackend,
}

impl ExportCsvTool {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportCsvArgs {
    range: String,
    include_headers: Option<bool>,
}

#[async_trait]
impl Tool for ExportCsvTool {
    fn name(&self) -> &str {
        "export_to_csv"
    }

    fn description(&self) -> &str {
        "Export a range of data to CSV format. Returns the CSV content as text that can be saved or copied."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "range": {
                    "type": "string",
                    "description": "Range to export (e.g., \"A1:E100\")"
                },
                "includeHeaders": {
                    "type": "boolean",
                    "description": "Whether to include the first row as headers (default: true)"
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
        let args: ExportCsvArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(result) => return *result,
        };
        let data = match self.backend.read_range(None, &args.range).await {
            Ok(data) => data,
            Err(e) => return ToolResult::failure(e.to_string()),
        };

        let include_headers = args.include_headers.unwrap_or(true);
        let csv = grid_to_csv(&data.values, include_headers);
        let row_count = data.values.len() - if include_headers { 0 } else { 1 };

        ToolResult::success(json!({
            "csv": csv,
            "rowCount": row_count,
            "message": format!(
                "Exported {} rows to CSV format. Copy the CSV data from the response.",
                data.values.len()
            ),
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

    #[test]
    fn test_round2_standard_rounding() {
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(2.346), 2.35);
        assert_eq!(round2(10.0 / 3.0), 3.33);
        assert_eq!(round2(-2.346), -2.35);
    }

    #[test]
    fn test_compute_stats() {
        let stats = compute_stats(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.sum, 10.0);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        // Population standard deviation of 1..4
        assert!((stats.std_dev - 1.118033988749895).abs() < 1e-9);
    }

    #[test]
    fn test_compute_stats_odd_median_and_empty() {
        let stats = compute_stats(&[5.0, 1.0, 3.0]).unwrap();
        assert_eq!(stats.median, 3.0);
        assert!(compute_stats(&[]).is_none());
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_grid_to_csv_skips_header_when_asked() {
        let grid: Grid = vec![
            vec![json!("name"), json!("amount")],
            vec![json!("coffee, large"), json!(4.5)],
        ];
        let with_headers = grid_to_csv(&grid, true);
        assert_eq!(with_headers, "name,amount\n\"coffee, large\",4.5\n");
        let without = grid_to_csv(&grid, false);
        assert_eq!(without, "\"coffee, large\",4.5\n");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("01/15/2024"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_find_duplicates_tolerance_window() {
        let rows: Grid = vec![
            vec![json!("2024-03-01"), json!("Cafe Luna"), json!(12.5)],
            vec![json!("2024-03-05"), json!("Cafe Luna"), json!(12.5)],
            vec![json!("2024-03-01"), json!("Bookstore"), json!(12.5)],
        ];
        let entry = NewEntryArgs {
            date: "2024-03-02".to_string(),
            merchant: Some("cafe luna".to_string()),
            amount: 12.5,
        };

        let exact = find_duplicates(&rows, &entry, 0, 1, 2, 0);
        assert!(exact.is_empty());

        let tolerant = find_duplicates(&rows, &entry, 0, 1, 2, 1);
        assert_eq!(tolerant.len(), 1);
        assert_eq!(tolerant[0]["row"], 2);
        assert_eq!(tolerant[0]["merchant"], "Cafe Luna");
    }

    #[tokio::test]
    async fn test_statistics_empty_range_fails() {
        let workbook = Arc::new(MemoryWorkbook::new());
        workbook
            .write_range(None, "A1", vec![vec![json!("text only")]])
            .await
            .unwrap();
        let tool = CalculateStatisticsTool::new(workbook);
        let result = tool
            .execute("c1", json!({ "range": "A1:A3" }), CancellationToken::new())
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("No numeric values found in range"));
    }

    #[tokio::test]
    async fn test_statistics_rounds_at_the_boundary() {
        let workbook = Arc::new(MemoryWorkbook::new());
        workbook
            .write_range(
                None,
                "A1",
                vec![vec![json!(1.111)], vec![json!(2.222)], vec![json!(3.333)]],
            )
            .await
            .unwrap();
        let tool = CalculateStatisticsTool::new(workbook);
        let result = tool
            .execute("c1", json!({ "range": "A1:A3" }), CancellationToken::new())
            .await;
        let data = result.details.unwrap();
        assert_eq!(data["count"], 3);
        assert_eq!(data["sum"], 6.67);
        assert_eq!(data["mean"], 2.22);
        assert_eq!(data["median"], 2.222);
    }

    #[tokio::test]
    async fn test_convert_currency_rounds_to_cents() {
        let tool = ConvertCurrencyTool;
        let result = tool
            .execute(
                "c1",
                json!({
                    "amount": 100.0,
                    "fromCurrency": "EUR",
                    "toCurrency": "USD",
                    "exchangeRate": 1.0856
                }),
                CancellationToken::new(),
            )
            .await;
        let data = result.details.unwrap();
        assert_eq!(data["convertedAmount"], 108.56);
        assert_eq!(
            data["formatted"],
            "EUR 100 = USD 108.56 (Rate: 1.0856)"
        );
    }

    #[tokio::test]
    async fn test_web_search_is_a_pass_through() {
        let tool = WebSearchTool;
        let result = tool
            .execute(
                "c1",
                json!({ "query": "EUR to USD rate" }),
                CancellationToken::new(),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(result.details.unwrap()["query"], "EUR to USD rate");
    }

    #[tokio::test]
    async fn test_expense_summary_writes_report_and_totals() {
        let workbook = Arc::new(MemoryWorkbook::new());
        workbook
            .write_range(
                None,
                "A1",
                vec![
                    vec![json!("date"), json!("category"), json!("amount")],
                    vec![json!("2024-02-01"), json!("food"), json!(10.0)],
                    vec![json!("2024-02-10"), json!("travel"), json!(25.5)],
                    vec![json!("2024-02-05"), json!("food"), json!(4.5)],
                ],
            )
            .await
            .unwrap();

        let tool = ExpenseSummaryTool::new(workbook.clone());
        let result = tool
            .execute(
                "c1",
                json!({
                    "dataRange": "A1:C4",
                    "dateColumn": 0,
                    "amountColumn": 2,
                    "categoryColumn": 1,
                    "outputCell": "E1"
                }),
                CancellationToken::new(),
            )
            .await;
        assert!(!result.is_error);

        let data = result.details.unwrap();
        assert_eq!(data["total"], 40.0);
        assert_eq!(data["count"], 3);
        assert_eq!(data["average"], 13.33);
        assert_eq!(data["dateRange"]["start"], "2024-02-01");
        assert_eq!(data["dateRange"]["end"], "2024-02-10");
        assert_eq!(data["categories"]["food"], 14.5);

        // The report landed on the sheet and the title was formatted.
        assert_eq!(
            workbook.cell_value("Sheet1", "E1"),
            json!("EXPENSE SUMMARY REPORT")
        );
        assert_eq!(workbook.formats().len(), 1);
    }

    #[tokio::test]
    async fn test_export_csv_through_tool() {
        let workbook = Arc::new(MemoryWorkbook::new());
        workbook
            .write_range(
                None,
                "A1",
                vec![
                    vec![json!("name"), json!("note")],
                    vec![json!("x"), json!("a,b")],
                ],
            )
            .await
            .unwrap();

        let tool = ExportCsvTool::new(workbook);
        let result = tool
            .execute("c1", json!({ "range": "A1:B2" }), CancellationToken::new())
            .await;
        let data = result.details.unwrap();
        assert_eq!(data["csv"], "name,note\nx,\"a,b\"\n");
        assert_eq!(data["rowCount"], 2);
    }
}
