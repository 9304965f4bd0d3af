//! Heuristic dtype and semantic type inference over Arrow columns.

use std::collections::HashSet;

use arrow::array::{ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use chrono::{NaiveDate, NaiveDateTime};
use rfm_store::{Dtype, Stype};

const SAMPLE_LIMIT: usize = 10_000;
const MAX_CATEGORIES: usize = 32;
const TEXT_MIN_AVG_LEN: f64 = 32.0;

/// Maps an Arrow data type onto the primitive dtype tracked in metadata.
#[must_use]
pub fn infer_dtype(data_type: &DataType) -> Dtype {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Dtype::Int,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => Dtype::Float,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Dtype::String,
        DataType::Boolean => Dtype::Bool,
        DataType::Date32 | DataType::Date64 => Dtype::Date,
        DataType::Timestamp(_, _) => Dtype::Timestamp,
        DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView
        | DataType::FixedSizeBinary(_) => Dtype::Binary,
        DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _) => Dtype::List,
        _ => Dtype::Unsupported,
    }
}

/// Picks a semantic type for a column; `None` means the column is discarded.
#[must_use]
pub fn infer_stype(name: &str, data_type: &DataType, chunks: &[ArrayRef]) -> Option<Stype> {
    let dtype = infer_dtype(data_type);
    match dtype {
        Dtype::Int | Dtype::String if looks_like_id(name) => Some(Stype::Id),
        Dtype::Int | Dtype::Float => Some(Stype::Numerical),
        Dtype::Bool => Some(Stype::Categorical),
        Dtype::Date | Dtype::Timestamp => Some(Stype::Timestamp),
        Dtype::String => Some(infer_string_stype(name, chunks)),
        Dtype::List => Some(match data_type {
            DataType::List(field) | DataType::LargeList(field) | DataType::FixedSizeList(field, _)
                if infer_dtype(field.data_type()) == Dtype::String =>
            {
                Stype::MultiCategorical
            }
            _ => Stype::Sequence,
        }),
        Dtype::Binary | Dtype::Unsupported => None,
    }
}

fn looks_like_id(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "id"
        || lower.ends_with("_id")
        || lower.ends_with("-id")
        || (name.len() > 2 && name.ends_with("Id"))
}

fn looks_like_time(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ["time", "date", "timestamp", "created", "updated"]
        .iter()
        .any(|hint| lower.contains(hint))
}

fn infer_string_stype(name: &str, chunks: &[ArrayRef]) -> Stype {
    let values = sample_strings(chunks);
    if values.is_empty() {
        return Stype::Categorical;
    }

    if looks_like_time(name) && values.iter().all(|value| parses_as_timestamp(value)) {
        return Stype::Timestamp;
    }

    let distinct: HashSet<&str> = values.iter().map(String::as_str).collect();
    if distinct.len() <= MAX_CATEGORIES || distinct.len() * 2 <= values.len() {
        return Stype::Categorical;
    }

    #[allow(clippy::cast_precision_loss)]
    let avg_len = values.iter().map(String::len).sum::<usize>() as f64 / values.len() as f64;
    if avg_len >= TEXT_MIN_AVG_LEN {
        Stype::Text
    } else {
        Stype::Categorical
    }
}

fn sample_strings(chunks: &[ArrayRef]) -> Vec<String> {
    let mut values = Vec::new();
    for chunk in chunks {
        let Ok(utf8) = cast(chunk.as_ref(), &DataType::Utf8) else {
            continue;
        };
        for value in utf8.as_string::<i32>().iter().flatten() {
            if values.len() >= SAMPLE_LIMIT {
                return values;
            }
            values.push(value.to_string());
        }
    }
    values
}

fn parses_as_timestamp(value: &str) -> bool {
    let trimmed = value.trim();
    chrono::DateTime::parse_from_rfc3339(trimmed).is_ok()
        || NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok()
}
