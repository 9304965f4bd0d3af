//! Batch update payloads for graph metadata.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{GraphMetadata, LinkMetadata, Stype};

/// Partial update of a single optional field.
///
/// An omitted field deserializes to `Unset`, an explicit `null` to `Clear`,
/// and any other value to `Set`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Unset,
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns the requested new value, or `None` when the field is left untouched.
    #[must_use]
    pub fn as_change(&self) -> Option<Option<&T>> {
        match self {
            Self::Unset => None,
            Self::Clear => Some(None),
            Self::Set(value) => Some(Some(value)),
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Clear, Self::Set)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(value) => serializer.serialize_some(value),
            Self::Unset | Self::Clear => serializer.serialize_none(),
        }
    }
}

impl<T: JsonSchema> JsonSchema for FieldUpdate<T> {
    fn schema_name() -> Cow<'static, str> {
        Option::<T>::schema_name()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        Option::<T>::json_schema(generator)
    }
}

/// A table to load and register in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AddTableMetadata {
    /// Path to a `.csv` or `.parquet` file.
    pub path: String,
    /// Name of the table in the graph.
    pub name: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub time_column: Option<String>,
}

/// Partial field updates for an existing table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpdateTableMetadata {
    /// Column names mapped to their new semantic type; `null` discards the column.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stypes: BTreeMap<String, Option<Stype>>,
    /// New primary key column; `null` clears it, omission leaves it unchanged.
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unset")]
    pub primary_key: FieldUpdate<String>,
    /// New time column; `null` clears it, omission leaves it unchanged.
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unset")]
    pub time_column: FieldUpdate<String>,
}

/// A batch of graph edits applied item by item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpdateGraphMetadata {
    #[serde(default)]
    pub tables_to_add: Vec<AddTableMetadata>,
    #[serde(default)]
    pub tables_to_update: BTreeMap<String, UpdateTableMetadata>,
    #[serde(default)]
    pub links_to_add: Vec<LinkMetadata>,
    #[serde(default)]
    pub links_to_remove: Vec<LinkMetadata>,
    #[serde(default)]
    pub tables_to_remove: Vec<String>,
}

impl UpdateGraphMetadata {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables_to_add.is_empty()
            && self.tables_to_update.is_empty()
            && self.links_to_add.is_empty()
            && self.links_to_remove.is_empty()
            && self.tables_to_remove.is_empty()
    }
}

/// A failed batch item, keyed by the name of the offending table or link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpdateError {
    pub item: String,
    pub message: String,
}

impl UpdateError {
    #[must_use]
    pub fn new(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.message)
    }
}

/// Result of a batch update: the graph after best-effort application plus errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpdatedGraphMetadata {
    pub graph: GraphMetadata,
    pub errors: Vec<UpdateError>,
    /// Links dropped because a table they touched was removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_links: Vec<LinkMetadata>,
}
