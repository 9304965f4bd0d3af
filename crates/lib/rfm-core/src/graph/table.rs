use rfm_store::schema::stype_supports;
use rfm_store::{ColumnMetadata, Stype, TableMetadata};

use crate::source::TableData;
use crate::source::infer::{infer_dtype, infer_stype};

use super::GraphError;

/// A loaded table together with its column metadata and key designations.
#[derive(Debug, Clone)]
pub struct TableRegistry {
    name: String,
    path: String,
    data: TableData,
    columns: Vec<ColumnMetadata>,
    primary_key: Option<String>,
    time_column: Option<String>,
}

impl TableRegistry {
    /// Registers every column of `data` with inferred types and no keys set.
    ///
    /// # Errors
    /// Returns `GraphError::DuplicateColumn` if the data repeats a column name.
    pub fn from_data(
        name: impl Into<String>,
        path: impl Into<String>,
        data: TableData,
    ) -> Result<Self, GraphError> {
        let field_names: Vec<String> = data
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();
        let mut registry = Self {
            name: name.into(),
            path: path.into(),
            data,
            columns: Vec::with_capacity(field_names.len()),
            primary_key: None,
            time_column: None,
        };
        for field_name in field_names {
            if registry.column_index(&field_name).is_some() {
                return Err(GraphError::DuplicateColumn {
                    table: registry.name,
                    column: field_name,
                });
            }
            registry.add_column(&field_name)?;
        }
        Ok(registry)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn data(&self) -> &TableData {
        &self.data
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|column| column.name == name)
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    #[must_use]
    pub fn time_column(&self) -> Option<&str> {
        self.time_column.as_deref()
    }

    /// Registers a column of the underlying data, inferring its types.
    ///
    /// A previously discarded column gets its inferred semantic type back.
    ///
    /// # Errors
    /// Returns `GraphError` if the data has no such column or it is already active.
    pub fn add_column(&mut self, name: &str) -> Result<&ColumnMetadata, GraphError> {
        let Some(chunks) = self.data.column(name) else {
            return Err(self.unknown_column(name));
        };
        let data_type = self
            .data
            .schema()
            .field_with_name(name)
            .map_err(|_| self.unknown_column(name))?
            .data_type()
            .clone();
        let stype = infer_stype(name, &data_type, &chunks);

        let index = match self.column_index(name) {
            Some(index) if self.columns[index].is_active() => {
                return Err(GraphError::DuplicateColumn {
                    table: self.name.clone(),
                    column: name.to_string(),
                });
            }
            Some(index) => {
                self.columns[index].stype = stype;
                index
            }
            None => {
                self.columns.push(ColumnMetadata {
                    name: name.to_string(),
                    dtype: infer_dtype(&data_type),
                    stype,
                });
                self.columns.len() - 1
            }
        };
        Ok(&self.columns[index])
    }

    /// Discards a column. The descriptor is kept with an empty semantic type.
    ///
    /// # Errors
    /// Returns `GraphError::UnknownColumn` if the column is not registered.
    pub fn remove_column(&mut self, name: &str) -> Result<&ColumnMetadata, GraphError> {
        let index = self.require_column(name)?;
        self.columns[index].stype = None;
        Ok(&self.columns[index])
    }

    /// Sets or discards (`None`) the semantic type of a column.
    ///
    /// # Errors
    /// Returns `GraphError` if the column is unknown or the stype does not fit its dtype.
    pub fn set_stype(
        &mut self,
        name: &str,
        stype: Option<Stype>,
    ) -> Result<&ColumnMetadata, GraphError> {
        let Some(stype) = stype else {
            return self.remove_column(name);
        };
        let index = self.require_column(name)?;
        self.check_supported(index, stype)?;
        self.columns[index].stype = Some(stype);
        Ok(&self.columns[index])
    }

    /// Sets (marking the column as an ID) or clears the primary key.
    ///
    /// # Errors
    /// Returns `GraphError` if the column is unknown, cannot hold an ID, or is the time column.
    pub fn set_primary_key(
        &mut self,
        name: Option<&str>,
    ) -> Result<Option<&ColumnMetadata>, GraphError> {
        let Some(name) = name else {
            self.primary_key = None;
            return Ok(None);
        };
        let index = self.require_column(name)?;
        if self.time_column.as_deref() == Some(name) {
            return Err(self.key_conflict(name));
        }
        self.check_supported(index, Stype::Id)?;
        self.columns[index].stype = Some(Stype::Id);
        self.primary_key = Some(name.to_string());
        Ok(Some(&self.columns[index]))
    }

    /// Sets (marking the column as a timestamp) or clears the time column.
    ///
    /// # Errors
    /// Returns `GraphError` if the column is unknown, cannot hold timestamps, or is the primary key.
    pub fn set_time_column(
        &mut self,
        name: Option<&str>,
    ) -> Result<Option<&ColumnMetadata>, GraphError> {
        let Some(name) = name else {
            self.time_column = None;
            return Ok(None);
        };
        let index = self.require_column(name)?;
        if self.primary_key.as_deref() == Some(name) {
            return Err(self.key_conflict(name));
        }
        self.check_supported(index, Stype::Timestamp)?;
        self.columns[index].stype = Some(Stype::Timestamp);
        self.time_column = Some(name.to_string());
        Ok(Some(&self.columns[index]))
    }

    #[must_use]
    pub fn metadata(&self) -> TableMetadata {
        TableMetadata {
            name: self.name.clone(),
            path: self.path.clone(),
            num_rows: self.num_rows(),
            columns: self.columns.clone(),
            primary_key: self.primary_key.clone(),
            time_column: self.time_column.clone(),
        }
    }

    /// Appends a description of every broken table-level invariant to `out`.
    pub(crate) fn collect_violations(&self, out: &mut Vec<String>) {
        let table = &self.name;
        if let Some(pkey) = self.primary_key.as_deref() {
            match self.column(pkey) {
                None => out.push(format!("table '{table}': primary key '{pkey}' does not exist")),
                Some(column) if column.stype != Some(Stype::Id) => out.push(format!(
                    "table '{table}': primary key '{pkey}' must have semantic type 'ID'"
                )),
                Some(_) => {}
            }
        }
        if let Some(time) = self.time_column.as_deref() {
            match self.column(time) {
                None => out.push(format!("table '{table}': time column '{time}' does not exist")),
                Some(column) if column.stype != Some(Stype::Timestamp) => out.push(format!(
                    "table '{table}': time column '{time}' must have semantic type 'timestamp'"
                )),
                Some(_) => {}
            }
            if self.primary_key.as_deref() == Some(time) {
                out.push(format!(
                    "table '{table}': column '{time}' is both primary key and time column"
                ));
            }
        }
        for column in &self.columns {
            if let Some(stype) = column.stype
                && !stype_supports(stype, column.dtype)
            {
                out.push(format!(
                    "table '{table}': semantic type '{stype}' does not fit column '{}' with dtype '{}'",
                    column.name, column.dtype
                ));
            }
        }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    fn require_column(&self, name: &str) -> Result<usize, GraphError> {
        self.column_index(name)
            .ok_or_else(|| self.unknown_column(name))
    }

    fn check_supported(&self, index: usize, stype: Stype) -> Result<(), GraphError> {
        let column = &self.columns[index];
        if stype_supports(stype, column.dtype) {
            Ok(())
        } else {
            Err(GraphError::IncompatibleStype {
                table: self.name.clone(),
                column: column.name.clone(),
                stype,
                dtype: column.dtype,
            })
        }
    }

    fn unknown_column(&self, name: &str) -> GraphError {
        GraphError::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        }
    }

    fn key_conflict(&self, name: &str) -> GraphError {
        GraphError::KeyConflict {
            table: self.name.clone(),
            column: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use arrow::datatypes::{DataType, Field, Schema};
    use rfm_store::Dtype;

    use super::*;

    fn orders() -> TableRegistry {
        let schema = Arc::new(Schema::new(vec![
            Field::new("USER_ID", DataType::Int64, false),
            Field::new("AMOUNT", DataType::Float64, false),
            Field::new("TIME", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![0, 1])),
                Arc::new(Float64Array::from(vec![9.5, 3.0])),
                Arc::new(StringArray::from(vec!["2025-01-01", "2025-01-02"])),
            ],
        )
        .expect("valid batch");
        TableRegistry::from_data("ORDERS", "ORDERS.csv", TableData::from_batch(batch))
            .expect("unique columns")
    }

    #[test]
    fn repeated_column_names_are_rejected() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("A", DataType::Int64, false),
            Field::new("A", DataType::Int64, false),
            Field::new("B", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1])),
                Arc::new(Int64Array::from(vec![2])),
                Arc::new(StringArray::from(vec!["x"])),
            ],
        )
        .expect("arrow allows repeated field names");
        let err = TableRegistry::from_data("T", "T.csv", TableData::from_batch(batch))
            .expect_err("duplicate header");
        assert!(matches!(
            err,
            GraphError::DuplicateColumn { ref table, ref column } if table == "T" && column == "A"
        ));
    }

    #[test]
    fn registers_all_columns_without_keys() {
        let table = orders();
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.column("USER_ID").and_then(|c| c.stype), Some(Stype::Id));
        assert_eq!(table.column("AMOUNT").map(|c| c.dtype), Some(Dtype::Float));
        assert!(table.primary_key().is_none());
        assert!(table.time_column().is_none());
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn removed_columns_are_kept_as_discarded() {
        let mut table = orders();
        table.remove_column("AMOUNT").expect("remove column");
        let column = table.column("AMOUNT").expect("descriptor kept");
        assert!(!column.is_active());

        let restored = table.add_column("AMOUNT").expect("re-add column");
        assert_eq!(restored.stype, Some(Stype::Numerical));
        assert!(matches!(
            table.add_column("AMOUNT"),
            Err(GraphError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn unknown_time_column_leaves_previous_value() {
        let mut table = orders();
        table.set_time_column(Some("TIME")).expect("set time column");
        let err = table
            .set_time_column(Some("MISSING"))
            .expect_err("unknown column");
        assert!(matches!(err, GraphError::UnknownColumn { .. }));
        assert_eq!(table.time_column(), Some("TIME"));
    }

    #[test]
    fn primary_key_requires_id_capable_dtype() {
        let mut table = orders();
        let err = table
            .set_primary_key(Some("AMOUNT"))
            .expect_err("float column cannot be an ID");
        assert!(matches!(err, GraphError::IncompatibleStype { .. }));
        assert!(table.primary_key().is_none());
    }

    #[test]
    fn column_cannot_be_primary_key_and_time_column() {
        let mut table = orders();
        table.set_time_column(Some("TIME")).expect("set time column");
        let err = table
            .set_primary_key(Some("TIME"))
            .expect_err("key conflict");
        assert!(matches!(err, GraphError::KeyConflict { .. }));
    }

    #[test]
    fn violations_report_incompatible_key_stypes() {
        let mut table = orders();
        table.set_primary_key(Some("USER_ID")).expect("set primary key");
        table
            .set_stype("USER_ID", Some(Stype::Numerical))
            .expect("numerical fits int");
        let mut violations = Vec::new();
        table.collect_violations(&mut violations);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("primary key 'USER_ID'"));
    }
}
