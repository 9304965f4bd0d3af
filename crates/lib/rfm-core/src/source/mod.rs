//! Tabular sources: loading files into Arrow buffers and inferring schemas.
//!
//! The graph layer only sees the [`TableLoader`] trait; [`ArrowTableLoader`]
//! is the file-backed implementation used by the daemon.

mod arrow_loader;
pub mod infer;

use std::{error::Error, fmt};

use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::json::ArrayWriter;
use arrow::record_batch::RecordBatch;
use serde_json::Value;

pub use arrow_loader::{ArrowTableLoader, discover_table_files};

#[derive(Debug)]
pub enum LoadError {
    UnsupportedFormat(String),
    Io { path: String, message: String },
    Parse { path: String, message: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat(path) => {
                write!(f, "'{path}' is not a valid CSV or Parquet file")
            }
            Self::Io { path, message } => write!(f, "could not read '{path}': {message}"),
            Self::Parse { path, message } => write!(f, "could not parse '{path}': {message}"),
        }
    }
}

impl Error for LoadError {}

/// Loads a tabular file into memory.
pub trait TableLoader: Send + Sync {
    /// Loads the table stored at `path`.
    ///
    /// # Errors
    /// Returns `LoadError` for unsupported extensions or unreadable content.
    fn load(&self, path: &str) -> Result<TableData, LoadError>;
}

/// In-memory tabular buffer: an Arrow schema plus its record batches.
#[derive(Debug, Clone)]
pub struct TableData {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl TableData {
    #[must_use]
    pub const fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// Builds a buffer from a single batch.
    #[must_use]
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Returns the column chunks for `name`, one per batch.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<ArrayRef>> {
        let index = self.schema.index_of(name).ok()?;
        Some(
            self.batches
                .iter()
                .map(|batch| batch.column(index).clone())
                .collect(),
        )
    }

    /// Renders up to `limit` leading rows as JSON records.
    ///
    /// # Errors
    /// Returns `ArrowError` if a batch cannot be encoded.
    pub fn head_records(&self, limit: usize) -> Result<Vec<Value>, ArrowError> {
        let mut remaining = limit;
        let mut writer = ArrayWriter::new(Vec::new());
        for batch in &self.batches {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.num_rows());
            writer.write(&batch.slice(0, take))?;
            remaining -= take;
        }
        writer.finish()?;
        let bytes = writer.into_inner();
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|err| ArrowError::JsonError(err.to_string()))
    }
}
