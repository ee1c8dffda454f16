//! Spreadsheet export of the target database.
//!
//! One workbook is built in memory: a manifest sheet listing every table,
//! then one sheet per table with a header row and all data rows. The file is
//! written once at the end, so a failed export leaves no workbook behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::{ReportSource, SqlValue};
use crate::error::{MigrateError, Result};

/// Rows per worksheet, header included.
const MAX_SHEET_ROWS: usize = 1_048_576;

/// Data rows that fit below the header row.
pub const MAX_DATA_ROWS: usize = MAX_SHEET_ROWS - 1;

/// Longest sheet name Excel accepts.
const MAX_SHEET_NAME_CHARS: usize = 31;

/// Longest string a cell can hold.
const MAX_CELL_CHARS: usize = 32_767;

/// Largest integer an Excel number represents exactly (2^53).
const MAX_EXACT_INT: i64 = 9_007_199_254_740_992;

/// Header written above the manifest's table names.
pub const MANIFEST_HEADER: &str = "table_name";

/// One table sheet in the workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub table: String,
    pub sheet: String,
    pub rows: usize,
}

/// What a finished export wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub path: PathBuf,
    pub manifest_sheet: String,
    pub sheets: Vec<SheetSummary>,
}

impl ReportSummary {
    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|s| s.rows).sum()
    }
}

/// Writes target tables to an `.xlsx` workbook.
#[derive(Debug, Clone)]
pub struct ReportExporter {
    manifest_sheet: String,
}

impl Default for ReportExporter {
    fn default() -> Self {
        Self::new("All tables")
    }
}

impl ReportExporter {
    pub fn new(manifest_sheet: impl Into<String>) -> Self {
        Self {
            manifest_sheet: manifest_sheet.into(),
        }
    }

    /// Export every table `source` lists to `output_path`.
    ///
    /// # Errors
    ///
    /// Export errors when reading a table fails or a table has more rows than
    /// a worksheet holds; Xlsx errors when the workbook cannot be written.
    pub async fn export<R>(&self, source: &mut R, output_path: &Path) -> Result<ReportSummary>
    where
        R: ReportSource + ?Sized,
    {
        let tables = source.list_tables().await?;
        info!("Exporting {} tables to {}", tables.len(), output_path.display());

        let formats = CellFormats::new();
        let mut names = SheetNames::default();
        let mut workbook = Workbook::new();

        let manifest_sheet = names.assign(&self.manifest_sheet);
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name(&manifest_sheet)?;
            sheet.write_string(0, 0, MANIFEST_HEADER)?;
            for (i, table) in tables.iter().enumerate() {
                sheet.write_string(row_num(i + 1)?, 0, table)?;
            }
        }

        let mut sheets = Vec::with_capacity(tables.len());
        for table in &tables {
            let data = source.fetch_table(table).await?;
            check_row_limit(table, data.rows.len())?;

            let sheet_name = names.assign(table);
            let sheet = workbook.add_worksheet();
            sheet.set_name(&sheet_name)?;

            for (col, name) in data.columns.iter().enumerate() {
                sheet.write_string(0, col_num(col)?, name)?;
            }
            for (r, row) in data.rows.iter().enumerate() {
                let excel_row = row_num(r + 1)?;
                for (c, value) in row.iter().enumerate() {
                    write_cell(sheet, excel_row, col_num(c)?, value, &formats)?;
                }
            }

            debug!("{}: {} rows written to sheet '{}'", table, data.rows.len(), sheet_name);
            sheets.push(SheetSummary {
                table: table.clone(),
                sheet: sheet_name,
                rows: data.rows.len(),
            });
        }

        workbook.save(output_path)?;
        info!(
            "Wrote {} with {} table sheets",
            output_path.display(),
            sheets.len()
        );

        Ok(ReportSummary {
            path: output_path.to_path_buf(),
            manifest_sheet,
            sheets,
        })
    }
}

fn check_row_limit(table: &str, rows: usize) -> Result<()> {
    if rows > MAX_DATA_ROWS {
        return Err(MigrateError::Export(format!(
            "table {} has {} rows, a worksheet holds at most {}",
            table, rows, MAX_DATA_ROWS
        )));
    }
    Ok(())
}

fn row_num(idx: usize) -> Result<u32> {
    u32::try_from(idx).map_err(|_| MigrateError::Export(format!("row {} out of range", idx)))
}

fn col_num(idx: usize) -> Result<u16> {
    u16::try_from(idx).map_err(|_| MigrateError::Export(format!("column {} out of range", idx)))
}

/// Number formats for temporal cells.
struct CellFormats {
    date: Format,
    datetime: Format,
    time: Format,
}

impl CellFormats {
    fn new() -> Self {
        Self {
            date: Format::new().set_num_format("yyyy-mm-dd"),
            datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
            time: Format::new().set_num_format("hh:mm:ss"),
        }
    }
}

/// Write one value. NULL leaves the cell blank.
fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &SqlValue<'_>,
    formats: &CellFormats,
) -> Result<()> {
    match value {
        SqlValue::Null(_) => {}
        SqlValue::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        SqlValue::I16(v) => {
            sheet.write_number(row, col, f64::from(*v))?;
        }
        SqlValue::I32(v) => {
            sheet.write_number(row, col, f64::from(*v))?;
        }
        SqlValue::I64(v) => write_integer(sheet, row, col, *v)?,
        SqlValue::F32(v) => write_float(sheet, row, col, f64::from(*v))?,
        SqlValue::F64(v) => write_float(sheet, row, col, *v)?,
        SqlValue::Decimal(d) => match d.to_f64() {
            Some(f) => write_float(sheet, row, col, f)?,
            None => write_text(sheet, row, col, &d.to_string())?,
        },
        SqlValue::Text(s) => write_text(sheet, row, col, s)?,
        SqlValue::Bytes(b) => write_text(sheet, row, col, &format!("0x{}", hex::encode(b)))?,
        SqlValue::Uuid(u) => write_text(sheet, row, col, &u.to_string())?,
        SqlValue::DateTime(dt) => match excel_datetime(dt) {
            Some(x) => {
                sheet.write_datetime_with_format(row, col, &x, &formats.datetime)?;
            }
            None => write_text(sheet, row, col, &dt.to_string())?,
        },
        SqlValue::DateTimeOffset(dto) => match excel_datetime(&dto.naive_utc()) {
            Some(x) => {
                sheet.write_datetime_with_format(row, col, &x, &formats.datetime)?;
            }
            None => write_text(sheet, row, col, &dto.to_rfc3339())?,
        },
        SqlValue::Date(d) => match excel_date(d) {
            Some(x) => {
                sheet.write_datetime_with_format(row, col, &x, &formats.date)?;
            }
            None => write_text(sheet, row, col, &d.to_string())?,
        },
        SqlValue::Time(t) => match excel_time(t) {
            Some(x) => {
                sheet.write_datetime_with_format(row, col, &x, &formats.time)?;
            }
            None => write_text(sheet, row, col, &t.to_string())?,
        },
    }
    Ok(())
}

fn write_integer(sheet: &mut Worksheet, row: u32, col: u16, v: i64) -> Result<()> {
    if v.unsigned_abs() > MAX_EXACT_INT as u64 {
        write_text(sheet, row, col, &v.to_string())
    } else {
        sheet.write_number(row, col, v as f64)?;
        Ok(())
    }
}

fn write_float(sheet: &mut Worksheet, row: u32, col: u16, v: f64) -> Result<()> {
    if v.is_finite() {
        sheet.write_number(row, col, v)?;
        Ok(())
    } else {
        write_text(sheet, row, col, &v.to_string())
    }
}

/// Cells longer than Excel's limit are truncated.
fn write_text(sheet: &mut Worksheet, row: u32, col: u16, s: &str) -> Result<()> {
    match s.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => sheet.write_string(row, col, &s[..idx])?,
        None => sheet.write_string(row, col, s)?,
    };
    Ok(())
}

fn seconds(t: &NaiveTime) -> f64 {
    f64::from(t.second()) + f64::from(t.nanosecond()) / 1_000_000_000.0
}

/// Excel dates run from the 1899-12-31 epoch to 9999-12-31; anything else is `None`.
fn excel_date(d: &NaiveDate) -> Option<ExcelDateTime> {
    let year = u16::try_from(d.year()).ok()?;
    ExcelDateTime::from_ymd(year, d.month() as u8, d.day() as u8).ok()
}

fn excel_datetime(dt: &NaiveDateTime) -> Option<ExcelDateTime> {
    let t = dt.time();
    excel_date(&dt.date())?
        .and_hms(t.hour() as u16, t.minute() as u8, seconds(&t))
        .ok()
}

fn excel_time(t: &NaiveTime) -> Option<ExcelDateTime> {
    ExcelDateTime::from_hms(t.hour() as u16, t.minute() as u8, seconds(t)).ok()
}

/// Assigns unique, Excel-valid sheet names.
#[derive(Debug, Default)]
struct SheetNames {
    used: HashSet<String>,
}

impl SheetNames {
    /// Sanitize `name` and make it unique among assigned names.
    ///
    /// `[]:*?/\` become `_`, leading/trailing apostrophes become `_`, names
    /// are cut to 31 characters and case-insensitive clashes get a `~N`
    /// suffix. A blank name becomes `Sheet`.
    fn assign(&mut self, name: &str) -> String {
        let mut clean: String = name
            .chars()
            .map(|c| match c {
                '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
                c => c,
            })
            .collect();
        if clean.trim().is_empty() {
            clean = "Sheet".to_string();
        }
        if clean.starts_with('\'') {
            clean.replace_range(..1, "_");
        }
        if clean.ends_with('\'') {
            clean.pop();
            clean.push('_');
        }

        let base = truncate_chars(&clean, MAX_SHEET_NAME_CHARS);
        let mut candidate = base.clone();
        let mut n = 1;
        while self.is_taken(&candidate) {
            let suffix = format!("~{}", n);
            let room = MAX_SHEET_NAME_CHARS - suffix.chars().count();
            candidate = format!("{}{}", truncate_chars(&base, room), suffix);
            n += 1;
        }
        self.used.insert(candidate.to_lowercase());
        candidate
    }

    fn is_taken(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        // "History" is reserved by Excel.
        lower == "history" || self.used.contains(&lower)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
