use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Primitive storage type of a column, as inferred from the loaded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int,
    Float,
    String,
    Bool,
    Date,
    Timestamp,
    Binary,
    List,
    Unsupported,
}

impl Dtype {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Binary => "binary",
            Self::List => "list",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether a foreign key of this dtype can reference a primary key of `other`.
    #[must_use]
    pub const fn is_key_compatible(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Int, Self::Int) | (Self::String, Self::String)
        )
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic meaning of a column for modeling purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Stype {
    #[serde(rename = "numerical")]
    Numerical,
    #[serde(rename = "categorical")]
    Categorical,
    #[serde(rename = "multicategorical")]
    MultiCategorical,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "ID")]
    Id,
    #[serde(rename = "timestamp")]
    Timestamp,
    #[serde(rename = "sequence")]
    Sequence,
}

impl Stype {
    pub const ALL: [Self; 7] = [
        Self::Numerical,
        Self::Categorical,
        Self::MultiCategorical,
        Self::Text,
        Self::Id,
        Self::Timestamp,
        Self::Sequence,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numerical => "numerical",
            Self::Categorical => "categorical",
            Self::MultiCategorical => "multicategorical",
            Self::Text => "text",
            Self::Id => "ID",
            Self::Timestamp => "timestamp",
            Self::Sequence => "sequence",
        }
    }
}

impl fmt::Display for Stype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown semantic type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStype(pub String);

impl fmt::Display for UnknownStype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown semantic type: {}", self.0)
    }
}

impl std::error::Error for UnknownStype {}

impl FromStr for Stype {
    type Err = UnknownStype;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|stype| stype.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStype(trimmed.to_string()))
    }
}

/// Metadata for a single column. A `None` stype marks the column as discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    pub dtype: Dtype,
    pub stype: Option<Stype>,
}

impl ColumnMetadata {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.stype.is_some()
    }
}

/// Metadata for a single table registered in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableMetadata {
    pub name: String,
    /// Source path the table was loaded from.
    pub path: String,
    /// Row count captured at load time.
    pub num_rows: usize,
    pub columns: Vec<ColumnMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_column: Option<String>,
}

impl TableMetadata {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// A foreign key relationship between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct LinkMetadata {
    /// Name of the source table containing the foreign key.
    pub source_table: String,
    /// Name of the foreign key column.
    pub foreign_key: String,
    /// Name of the destination table containing the primary key.
    pub destination_table: String,
}

impl LinkMetadata {
    #[must_use]
    pub fn new(
        source_table: impl Into<String>,
        foreign_key: impl Into<String>,
        destination_table: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            foreign_key: foreign_key.into(),
            destination_table: destination_table.into(),
        }
    }

    #[must_use]
    pub fn touches(&self, table: &str) -> bool {
        self.source_table == table || self.destination_table == table
    }
}

impl fmt::Display for LinkMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}",
            self.source_table, self.foreign_key, self.destination_table
        )
    }
}

/// Complete metadata schema of a session graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GraphMetadata {
    pub tables: Vec<TableMetadata>,
    pub links: Vec<LinkMetadata>,
}

impl GraphMetadata {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|table| table.name == name)
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.name.clone()).collect()
    }
}

/// A table-like file discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableSource {
    pub path: String,
    pub bytes: u64,
}

/// Snapshot of a session's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SessionStatus {
    pub name: String,
    pub initialized: bool,
    /// Masked prefix of the credential in use.
    pub credential: Option<String>,
    pub tables: Vec<String>,
    pub num_links: usize,
    pub materialized: bool,
}

/// Size of the graph handed to the inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MaterializeSummary {
    pub num_tables: usize,
    pub num_links: usize,
    pub num_rows: usize,
}

impl MaterializeSummary {
    #[must_use]
    pub fn of(graph: &GraphMetadata) -> Self {
        Self {
            num_tables: graph.tables.len(),
            num_links: graph.links.len(),
            num_rows: graph.tables.iter().map(|table| table.num_rows).sum(),
        }
    }
}
