//! Decoding of the first sheet of an uploaded workbook or a CSV export.

use std::io::Cursor;

use calamine::{Data, Reader};

use crate::errors::AppError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Header row plus the non-blank data rows of a sheet, as text cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Decode raw bytes: xlsx/xlsb/ods and legacy xls go through `calamine`,
/// everything else is read as CSV.
pub fn decode(bytes: &[u8]) -> Result<DecodedSheet, AppError> {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        decode_workbook(bytes)
    } else {
        decode_csv(bytes)
    }
}

fn decode_workbook(bytes: &[u8]) -> Result<DecodedSheet, AppError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Parse("Workbook has no sheets".to_string()))??;

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    Ok(collect_rows(rows))
}

fn decode_csv(bytes: &[u8]) -> Result<DecodedSheet, AppError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(collect_rows(rows))
}

/// First row is the header; rows whose cells are all blank are dropped.
fn collect_rows<I>(rows: I) -> DecodedSheet
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut rows = rows.into_iter();
    let Some(headers) = rows.next() else {
        return DecodedSheet::default();
    };

    DecodedSheet {
        headers,
        rows: rows
            .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
            .collect(),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        // Integral numbers (IDs, phone numbers, counts) must not pick up a ".0".
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        // Date cells hold a serial day number; sheet timestamps carry no zone.
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format(DATETIME_FORMAT).to_string())
            .unwrap_or_else(|| dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}
