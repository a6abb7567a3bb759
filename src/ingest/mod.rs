//! Squad ingestion pipeline.
//!
//! A run acquires the sheet bytes (uploaded file or published CSV URL),
//! decodes the first sheet, maps every row to a [`Squad`] and writes all of
//! them as one atomic batch of full-record replacements.

pub mod coords;
pub mod row;
pub mod sheet;

use chrono::Utc;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{IngestionReport, Squad};
use row::{map_row, SheetSchema};

/// Where the sheet of an ingestion run comes from.
#[derive(Debug, Clone)]
pub enum SheetSource {
    /// Workbook or CSV file uploaded by an admin
    Bytes(Vec<u8>),
    /// Published "output=csv" export URL
    Url(String),
}

/// Squads mapped from one sheet, ready to be written.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub squads: Vec<Squad>,
    pub unmapped_columns: Vec<String>,
    pub missing_columns: Vec<String>,
}

/// Run one ingestion end to end and return what was written.
pub async fn ingest(
    repo: &Repository,
    client: &reqwest::Client,
    source: SheetSource,
) -> Result<IngestionReport, AppError> {
    let bytes = match source {
        SheetSource::Bytes(bytes) => bytes,
        SheetSource::Url(url) => fetch_sheet(client, &url).await?,
    };

    let now = Utc::now().to_rfc3339();
    let run = prepare(&bytes, &now)?;

    if !run.unmapped_columns.is_empty() {
        tracing::warn!(
            "Sheet has {} unrecognised columns: {:?}",
            run.unmapped_columns.len(),
            run.unmapped_columns
        );
    }
    if !run.missing_columns.is_empty() {
        tracing::debug!("Sheet is missing columns: {:?}", run.missing_columns);
    }

    repo.replace_squads(&run.squads).await?;
    tracing::info!("Ingested {} squad rows", run.squads.len());

    Ok(IngestionReport {
        count: run.squads.len(),
        unmapped_columns: run.unmapped_columns,
        missing_columns: run.missing_columns,
    })
}

/// Download a published sheet.
pub async fn fetch_sheet(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, AppError> {
    tracing::debug!("Fetching published sheet from {}", url);
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Ingestion(format!(
            "Sheet source returned HTTP {}",
            status.as_u16()
        )));
    }

    Ok(response.bytes().await?.to_vec())
}

/// Decode and map a sheet without touching the store.
pub fn prepare(bytes: &[u8], now: &str) -> Result<PreparedRun, AppError> {
    let decoded = sheet::decode(bytes)?;
    if decoded.rows.is_empty() {
        return Err(AppError::Ingestion("empty sheet".to_string()));
    }

    let schema = SheetSchema::from_headers(&decoded.headers);
    let squads = decoded
        .rows
        .iter()
        .map(|cells| map_row(&schema.row(cells), now))
        .collect();

    Ok(PreparedRun {
        squads,
        unmapped_columns: schema.unmapped_columns().to_vec(),
        missing_columns: schema.missing_columns().to_vec(),
    })
}
