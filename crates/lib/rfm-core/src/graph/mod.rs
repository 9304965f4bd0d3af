//! Graph metadata: per-table registries, the link set, and validation.

mod mermaid;
mod store;
mod table;

use std::{error::Error, fmt};

use rfm_store::{Dtype, LinkMetadata, Stype};

use crate::source::LoadError;

pub use mermaid::render_mermaid;
pub use store::GraphStore;
pub use table::TableRegistry;

#[derive(Debug)]
pub enum GraphError {
    InvalidName(String),
    DuplicateTable(String),
    UnknownTable(String),
    UnknownColumn { table: String, column: String },
    DuplicateColumn { table: String, column: String },
    DiscardedColumn { table: String, column: String },
    IncompatibleStype { table: String, column: String, stype: Stype, dtype: Dtype },
    KeyConflict { table: String, column: String },
    MissingPrimaryKey(String),
    ForeignKeyIsPrimaryKey(LinkMetadata),
    IncompatibleKeys { link: LinkMetadata, foreign: Dtype, primary: Dtype },
    DuplicateLink(LinkMetadata),
    UnknownLink(LinkMetadata),
    LinksExist(usize),
    Load(LoadError),
    Validation(ValidationError),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid table name: '{name}'"),
            Self::DuplicateTable(name) => write!(f, "table '{name}' already exists"),
            Self::UnknownTable(name) => write!(f, "table '{name}' does not exist"),
            Self::UnknownColumn { table, column } => {
                write!(f, "column '{column}' does not exist in table '{table}'")
            }
            Self::DuplicateColumn { table, column } => {
                write!(f, "column '{column}' is already registered in table '{table}'")
            }
            Self::DiscardedColumn { table, column } => {
                write!(f, "column '{column}' in table '{table}' is discarded")
            }
            Self::IncompatibleStype {
                table,
                column,
                stype,
                dtype,
            } => write!(
                f,
                "semantic type '{stype}' is not supported for column '{column}' in table '{table}' with dtype '{dtype}'"
            ),
            Self::KeyConflict { table, column } => write!(
                f,
                "column '{column}' in table '{table}' cannot be both primary key and time column"
            ),
            Self::MissingPrimaryKey(table) => {
                write!(f, "table '{table}' does not define a primary key")
            }
            Self::ForeignKeyIsPrimaryKey(link) => write!(
                f,
                "foreign key '{}' is the primary key of table '{}'",
                link.foreign_key, link.source_table
            ),
            Self::IncompatibleKeys {
                link,
                foreign,
                primary,
            } => write!(
                f,
                "link {link} joins a '{foreign}' foreign key to a '{primary}' primary key"
            ),
            Self::DuplicateLink(link) => write!(f, "link {link} already exists"),
            Self::UnknownLink(link) => write!(f, "link {link} does not exist"),
            Self::LinksExist(count) => write!(
                f,
                "links can only be inferred for a graph without links ({count} present)"
            ),
            Self::Load(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GraphError {}

impl From<LoadError> for GraphError {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

impl From<ValidationError> for GraphError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

/// Every invariant violation found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "graph validation failed with {} violation(s): {}",
            self.violations.len(),
            self.violations.join("; ")
        )
    }
}

impl Error for ValidationError {}
