use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rfm_store::TableSource;
use rfm_store::schema::{SUFFIX_CSV, SUFFIX_PARQUET, is_table_file};
use tracing::debug;

use super::{LoadError, TableData, TableLoader};

/// Loads `.csv` and `.parquet` files with Arrow.
#[derive(Debug, Clone)]
pub struct ArrowTableLoader {
    infer_rows: Option<usize>,
}

impl ArrowTableLoader {
    /// Creates a loader that scans every CSV record when inferring the schema.
    #[must_use]
    pub const fn new() -> Self {
        Self { infer_rows: None }
    }

    /// Sets how many CSV records are scanned for schema inference; `None` scans all.
    #[must_use]
    pub const fn with_infer_rows(mut self, infer_rows: Option<usize>) -> Self {
        self.infer_rows = infer_rows;
        self
    }

    fn load_csv(&self, path: &str) -> Result<TableData, LoadError> {
        let mut file = File::open(path).map_err(|err| io_error(path, &err))?;
        let format = Format::default().with_header(true);
        let (schema, _) = format
            .infer_schema(&mut file, self.infer_rows)
            .map_err(|err| parse_error(path, &err))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| io_error(path, &err))?;

        let schema = Arc::new(schema);
        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .build(file)
            .map_err(|err| parse_error(path, &err))?;
        let batches = reader
            .collect::<Result<Vec<RecordBatch>, ArrowError>>()
            .map_err(|err| parse_error(path, &err))?;
        Ok(TableData::new(schema, batches))
    }

    fn load_parquet(path: &str) -> Result<TableData, LoadError> {
        let file = File::open(path).map_err(|err| io_error(path, &err))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|err| parse_error(path, &err))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|err| parse_error(path, &err))?;
        let batches = reader
            .collect::<Result<Vec<RecordBatch>, ArrowError>>()
            .map_err(|err| parse_error(path, &err))?;
        Ok(TableData::new(schema, batches))
    }
}

impl Default for ArrowTableLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableLoader for ArrowTableLoader {
    fn load(&self, path: &str) -> Result<TableData, LoadError> {
        let suffix = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let data = match suffix.as_deref() {
            Some(SUFFIX_CSV) => self.load_csv(path)?,
            Some(SUFFIX_PARQUET) => Self::load_parquet(path)?,
            _ => return Err(LoadError::UnsupportedFormat(path.to_string())),
        };
        debug!(path, rows = data.num_rows(), "loaded table file");
        Ok(data)
    }
}

/// Lists table-like files under `root`, sorted by path.
///
/// # Errors
/// Returns `LoadError::Io` if `root` is not a readable directory.
pub fn discover_table_files(root: &Path, recursive: bool) -> Result<Vec<TableSource>, LoadError> {
    let display = root.display().to_string();
    if !root.is_dir() {
        return Err(LoadError::Io {
            path: display,
            message: "directory does not exist".to_string(),
        });
    }

    let mut files = Vec::new();
    collect_table_files(root, recursive, &mut files)?;
    files.sort();

    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        let path = file.display().to_string();
        let bytes = fs::metadata(&file)
            .map_err(|err| io_error(&path, &err))?
            .len();
        sources.push(TableSource { path, bytes });
    }
    Ok(sources)
}

fn collect_table_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    let dir_display = dir.display().to_string();
    let entries = fs::read_dir(dir).map_err(|err| io_error(&dir_display, &err))?;
    for entry in entries {
        let path = entry.map_err(|err| io_error(&dir_display, &err))?.path();
        if path.is_dir() {
            if recursive {
                collect_table_files(&path, recursive, out)?;
            }
        } else if path.to_str().is_some_and(is_table_file) {
            out.push(path);
        }
    }
    Ok(())
}

fn io_error(path: &str, err: &std::io::Error) -> LoadError {
    LoadError::Io {
        path: path.to_string(),
        message: err.to_string(),
    }
}

fn parse_error(path: &str, err: &impl std::fmt::Display) -> LoadError {
    LoadError::Parse {
        path: path.to_string(),
        message: err.to_string(),
    }
}
