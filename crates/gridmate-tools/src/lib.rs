//! gridmate-tools: spreadsheet backend contract and tool catalogue
//!
//! The `SpreadsheetBackend` trait is the stable request/response boundary to
//! the live workbook; every tool the model can call is a thin adapter that
//! parses typed arguments, performs one backend operation (or a local
//! computation over fetched data), and returns a normalized result.

pub mod a1;
pub mod backend;
pub mod memory;
pub mod tools;

pub use backend::{BackendError, CellValue, Grid, SharedBackend, SpreadsheetBackend};
pub use memory::MemoryWorkbook;
pub use tools::builtin_tools;
