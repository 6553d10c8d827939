//! PostgreSQL data extractor

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use tracing::{debug, info, instrument, warn};

use crate::domain::retrain::{DataExtractor, RawRecordSet, RawValue, RetrainError};

/// Column types the extractor knows how to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    /// Passed through by type name; rejected only if a selected column
    Unsupported,
}

fn classify(type_name: &str) -> ColumnKind {
    match type_name {
        "BOOL" => ColumnKind::Bool,
        "INT2" => ColumnKind::Int2,
        "INT4" => ColumnKind::Int4,
        "INT8" => ColumnKind::Int8,
        "FLOAT4" => ColumnKind::Float4,
        "FLOAT8" => ColumnKind::Float8,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => ColumnKind::Text,
        _ => ColumnKind::Unsupported,
    }
}

fn decode(row: &PgRow, idx: usize, kind: ColumnKind) -> Result<RawValue, sqlx::Error> {
    let value = match kind {
        ColumnKind::Bool => row.try_get::<Option<bool>, _>(idx)?.map(RawValue::Bool),
        ColumnKind::Int2 => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| RawValue::Int(v as i64)),
        ColumnKind::Int4 => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| RawValue::Int(v as i64)),
        ColumnKind::Int8 => row.try_get::<Option<i64>, _>(idx)?.map(RawValue::Int),
        ColumnKind::Float4 => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| RawValue::Float(v as f64)),
        ColumnKind::Float8 => row.try_get::<Option<f64>, _>(idx)?.map(RawValue::Float),
        ColumnKind::Text => row.try_get::<Option<String>, _>(idx)?.map(RawValue::Text),
        ColumnKind::Unsupported => Some(RawValue::Unsupported(
            row.column(idx).type_info().name().to_string(),
        )),
    };

    Ok(value.unwrap_or(RawValue::Null))
}

fn to_record_set(rows: &[PgRow]) -> Result<RawRecordSet, RetrainError> {
    let Some(first) = rows.first() else {
        return Ok(RawRecordSet::default());
    };

    let mut columns = Vec::with_capacity(first.columns().len());
    let mut kinds = Vec::with_capacity(first.columns().len());
    for column in first.columns() {
        let type_name = column.type_info().name();
        let kind = classify(type_name);
        if kind == ColumnKind::Unsupported {
            debug!(
                column = column.name(),
                type_name, "Column type has no decoding, passing through"
            );
        }
        columns.push(column.name().to_string());
        kinds.push(kind);
    }

    let mut raw = RawRecordSet::with_capacity(columns, rows.len());
    for row in rows {
        let values = kinds
            .iter()
            .enumerate()
            .map(|(idx, kind)| decode(row, idx, *kind))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RetrainError::extraction(format!("Failed to decode row: {}", e)))?;
        raw.push_row(values).map_err(RetrainError::extraction)?;
    }

    Ok(raw)
}

/// Runs the configured query over a connection opened for the call
#[derive(Debug, Clone)]
pub struct PostgresExtractor {
    url: String,
    query: String,
    connect_timeout: Duration,
}

impl PostgresExtractor {
    pub fn new(url: impl Into<String>, query: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            query: query.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl DataExtractor for PostgresExtractor {
    #[instrument(skip(self))]
    async fn query(&self) -> Result<RawRecordSet, RetrainError> {
        let mut conn = tokio::time::timeout(self.connect_timeout, PgConnection::connect(&self.url))
            .await
            .map_err(|_| {
                RetrainError::extraction(format!(
                    "Timed out connecting to database after {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| RetrainError::extraction(format!("Failed to connect to database: {}", e)))?;

        debug!("Database connection opened");

        let fetched = sqlx::query(&self.query).fetch_all(&mut conn).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close database connection");
        }

        let rows = fetched
            .map_err(|e| RetrainError::extraction(format!("Query failed: {}", e)))?;
        let raw = to_record_set(&rows)?;

        info!(rows = raw.len(), columns = raw.columns().len(), "Extracted training rows");
        Ok(raw)
    }
}
