use rfm_store::{AddTableMetadata, GraphMetadata, LinkMetadata, TableMetadata};
use tracing::debug;

use crate::source::TableLoader;

use super::{GraphError, TableRegistry, ValidationError};

/// Ordered table registries plus the foreign-key links between them.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    tables: Vec<TableRegistry>,
    links: Vec<LinkMetadata>,
}

impl GraphStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Builds a fresh snapshot of the current tables and links.
    #[must_use]
    pub fn get(&self) -> GraphMetadata {
        GraphMetadata {
            tables: self.tables.iter().map(TableRegistry::metadata).collect(),
            links: self.links.clone(),
        }
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableRegistry> {
        self.tables.iter().find(|table| table.name() == name)
    }

    /// Mutable access to a table registry.
    ///
    /// # Errors
    /// Returns `GraphError::UnknownTable` if no such table exists.
    pub fn table_mut(&mut self, name: &str) -> Result<&mut TableRegistry, GraphError> {
        self.tables
            .iter_mut()
            .find(|table| table.name() == name)
            .ok_or_else(|| GraphError::UnknownTable(name.to_string()))
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|table| table.name().to_string())
            .collect()
    }

    #[must_use]
    pub fn links(&self) -> &[LinkMetadata] {
        &self.links
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.links.is_empty()
    }

    /// Loads a table file, infers its metadata, applies key overrides, and appends it.
    ///
    /// # Errors
    /// Returns `GraphError` if the name is taken, the file cannot be loaded, or an
    /// explicit key column is invalid. The graph is unchanged on failure.
    pub fn add_table(
        &mut self,
        loader: &dyn TableLoader,
        request: &AddTableMetadata,
    ) -> Result<TableMetadata, GraphError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(GraphError::InvalidName(request.name.clone()));
        }
        if self.table(name).is_some() {
            return Err(GraphError::DuplicateTable(name.to_string()));
        }

        let data = loader.load(&request.path)?;
        let mut registry = TableRegistry::from_data(name, request.path.clone(), data)?;
        if let Some(pkey) = request.primary_key.as_deref() {
            registry.set_primary_key(Some(pkey))?;
        }
        if let Some(time_column) = request.time_column.as_deref() {
            registry.set_time_column(Some(time_column))?;
        }
        self.insert_table(registry)
    }

    /// Appends an already loaded table registry.
    ///
    /// # Errors
    /// Returns `GraphError::DuplicateTable` if the name is taken.
    pub fn insert_table(&mut self, registry: TableRegistry) -> Result<TableMetadata, GraphError> {
        if self.table(registry.name()).is_some() {
            return Err(GraphError::DuplicateTable(registry.name().to_string()));
        }
        let metadata = registry.metadata();
        debug!(table = %metadata.name, columns = metadata.columns.len(), "added table");
        self.tables.push(registry);
        Ok(metadata)
    }

    /// Removes a table and every link touching it, returning the removed links.
    ///
    /// # Errors
    /// Returns `GraphError::UnknownTable` if no such table exists.
    pub fn remove_table(&mut self, name: &str) -> Result<Vec<LinkMetadata>, GraphError> {
        let index = self
            .tables
            .iter()
            .position(|table| table.name() == name)
            .ok_or_else(|| GraphError::UnknownTable(name.to_string()))?;
        self.tables.remove(index);

        let (removed, kept): (Vec<_>, Vec<_>) = self
            .links
            .drain(..)
            .partition(|link| link.touches(name));
        self.links = kept;
        debug!(table = name, removed_links = removed.len(), "removed table");
        Ok(removed)
    }

    /// Adds a foreign-key link.
    ///
    /// # Errors
    /// Returns `GraphError` if an endpoint or the key column is unknown, the
    /// destination has no primary key, the keys are incompatible, or the link exists.
    pub fn link(&mut self, link: &LinkMetadata) -> Result<(), GraphError> {
        self.check_link(link)?;
        if self.links.contains(link) {
            return Err(GraphError::DuplicateLink(link.clone()));
        }
        self.links.push(link.clone());
        debug!(%link, "linked tables");
        Ok(())
    }

    /// Removes an existing link.
    ///
    /// # Errors
    /// Returns `GraphError::UnknownLink` if the exact link does not exist.
    pub fn unlink(&mut self, link: &LinkMetadata) -> Result<(), GraphError> {
        let index = self
            .links
            .iter()
            .position(|existing| existing == link)
            .ok_or_else(|| GraphError::UnknownLink(link.clone()))?;
        self.links.remove(index);
        debug!(%link, "unlinked tables");
        Ok(())
    }

    /// Links every column that shares its name with another table's primary key.
    ///
    /// Only runs on a graph without links. Returns the links that were added.
    ///
    /// # Errors
    /// Returns `GraphError::LinksExist` if the graph already has links.
    pub fn infer_links(&mut self) -> Result<Vec<LinkMetadata>, GraphError> {
        if !self.links.is_empty() {
            return Err(GraphError::LinksExist(self.links.len()));
        }

        let mut candidates = Vec::new();
        for source in &self.tables {
            for column in source.columns().iter().filter(|column| column.is_active()) {
                if source.primary_key() == Some(column.name.as_str()) {
                    continue;
                }
                for destination in &self.tables {
                    let Some(pkey) = destination.primary_key() else {
                        continue;
                    };
                    if pkey.eq_ignore_ascii_case(&column.name) {
                        candidates.push(LinkMetadata::new(
                            source.name(),
                            column.name.clone(),
                            destination.name(),
                        ));
                    }
                }
            }
        }

        let mut added = Vec::new();
        for candidate in candidates {
            if self.link(&candidate).is_ok() {
                added.push(candidate);
            }
        }
        Ok(added)
    }

    /// Re-checks every invariant and reports all violations at once.
    ///
    /// # Errors
    /// Returns `GraphError::Validation` listing each violation found.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut violations = Vec::new();
        for table in &self.tables {
            table.collect_violations(&mut violations);
        }
        for (index, link) in self.links.iter().enumerate() {
            if let Err(err) = self.check_link(link) {
                violations.push(format!("link {link}: {err}"));
            }
            if self.links[..index].contains(link) {
                violations.push(format!("link {link} is duplicated"));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations }.into())
        }
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.links.clear();
    }

    fn check_link(&self, link: &LinkMetadata) -> Result<(), GraphError> {
        let source = self
            .table(&link.source_table)
            .ok_or_else(|| GraphError::UnknownTable(link.source_table.clone()))?;
        let destination = self
            .table(&link.destination_table)
            .ok_or_else(|| GraphError::UnknownTable(link.destination_table.clone()))?;

        let foreign = source
            .column(&link.foreign_key)
            .ok_or_else(|| GraphError::UnknownColumn {
                table: link.source_table.clone(),
                column: link.foreign_key.clone(),
            })?;
        if !foreign.is_active() {
            return Err(GraphError::DiscardedColumn {
                table: link.source_table.clone(),
                column: link.foreign_key.clone(),
            });
        }
        if source.primary_key() == Some(link.foreign_key.as_str()) {
            return Err(GraphError::ForeignKeyIsPrimaryKey(link.clone()));
        }

        let pkey = destination
            .primary_key()
            .and_then(|pkey| destination.column(pkey))
            .ok_or_else(|| GraphError::MissingPrimaryKey(link.destination_table.clone()))?;
        if !foreign.dtype.is_key_compatible(pkey.dtype) {
            return Err(GraphError::IncompatibleKeys {
                link: link.clone(),
                foreign: foreign.dtype,
                primary: pkey.dtype,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use rfm_store::Stype;

    use super::*;
    use crate::source::{LoadError, TableData};

    struct FakeLoader {
        tables: HashMap<String, TableData>,
    }

    impl TableLoader for FakeLoader {
        fn load(&self, path: &str) -> Result<TableData, LoadError> {
            self.tables
                .get(path)
                .cloned()
                .ok_or_else(|| LoadError::Io {
                    path: path.to_string(),
                    message: "not found".to_string(),
                })
        }
    }

    fn table(columns: Vec<(&str, ArrayRef)>) -> TableData {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, array)| array).collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("valid batch");
        TableData::from_batch(batch)
    }

    fn ints(values: &[i64]) -> ArrayRef {
        Arc::new(Int64Array::from(values.to_vec()))
    }

    fn loader() -> FakeLoader {
        let mut tables = HashMap::new();
        tables.insert(
            "USERS.csv".to_string(),
            table(vec![
                ("USER_ID", ints(&[0, 1, 2])),
                ("AGE", ints(&[20, 30, 40])),
                ("GENDER", Arc::new(StringArray::from(vec!["male", "female", "male"]))),
            ]),
        );
        tables.insert(
            "ORDERS.csv".to_string(),
            table(vec![
                ("USER_ID", ints(&[0, 0, 1])),
                ("STORE_ID", ints(&[0, 1, 1])),
                ("AMOUNT", Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0]))),
                (
                    "TIME",
                    Arc::new(StringArray::from(vec!["2025-01-01", "2025-01-02", "2025-01-03"])),
                ),
            ]),
        );
        tables.insert(
            "STORES.csv".to_string(),
            table(vec![
                ("STORE_ID", ints(&[0, 1])),
                ("CAT", Arc::new(StringArray::from(vec!["food", "toys"]))),
            ]),
        );
        FakeLoader { tables }
    }

    fn add(name: &str, pkey: Option<&str>, time: Option<&str>) -> AddTableMetadata {
        AddTableMetadata {
            path: format!("{name}.csv"),
            name: name.to_string(),
            primary_key: pkey.map(str::to_string),
            time_column: time.map(str::to_string),
        }
    }

    fn populated() -> GraphStore {
        let loader = loader();
        let mut graph = GraphStore::new();
        graph
            .add_table(&loader, &add("USERS", Some("USER_ID"), None))
            .expect("add users");
        graph
            .add_table(&loader, &add("ORDERS", None, Some("TIME")))
            .expect("add orders");
        graph
            .add_table(&loader, &add("STORES", Some("STORE_ID"), None))
            .expect("add stores");
        graph
    }

    #[test]
    fn builds_the_three_table_graph() {
        let mut graph = populated();
        graph
            .link(&LinkMetadata::new("ORDERS", "USER_ID", "USERS"))
            .expect("link users");
        graph
            .link(&LinkMetadata::new("ORDERS", "STORE_ID", "STORES"))
            .expect("link stores");

        let snapshot = graph.get();
        assert_eq!(snapshot.tables.len(), 3);
        assert_eq!(snapshot.links.len(), 2);
        assert_eq!(snapshot.table_names(), vec!["USERS", "ORDERS", "STORES"]);
        assert!(graph.validate().is_ok());

        graph
            .unlink(&LinkMetadata::new("ORDERS", "USER_ID", "USERS"))
            .expect("unlink users");
        let removed = graph.remove_table("STORES").expect("remove stores");
        assert_eq!(removed, vec![LinkMetadata::new("ORDERS", "STORE_ID", "STORES")]);

        let snapshot = graph.get();
        assert_eq!(snapshot.tables.len(), 2);
        assert!(snapshot.links.is_empty());
    }

    #[test]
    fn add_table_rejects_duplicates_and_bad_keys() {
        let loader = loader();
        let mut graph = populated();
        assert!(matches!(
            graph.add_table(&loader, &add("USERS", None, None)),
            Err(GraphError::DuplicateTable(_))
        ));

        let mut request = add("USERS", Some("MISSING"), None);
        request.name = "USERS_2".to_string();
        assert!(matches!(
            graph.add_table(&loader, &request),
            Err(GraphError::UnknownColumn { .. })
        ));
        assert!(graph.table("USERS_2").is_none());

        assert!(matches!(
            graph.add_table(&loader, &add("ITEMS", None, None)),
            Err(GraphError::Load(_))
        ));
    }

    #[test]
    fn add_table_rejects_repeated_headers() {
        let mut loader = loader();
        loader.tables.insert(
            "EVENTS.csv".to_string(),
            table(vec![("A", ints(&[1])), ("A", ints(&[2])), ("B", ints(&[3]))]),
        );
        let mut graph = populated();
        let before = graph.table_names();
        assert!(matches!(
            graph.add_table(&loader, &add("EVENTS", None, None)),
            Err(GraphError::DuplicateColumn { .. })
        ));
        assert_eq!(graph.table_names(), before);
    }

    #[test]
    fn link_then_unlink_restores_links() {
        let mut graph = populated();
        graph
            .link(&LinkMetadata::new("ORDERS", "USER_ID", "USERS"))
            .expect("first link");
        let before = graph.links().to_vec();

        let link = LinkMetadata::new("ORDERS", "STORE_ID", "STORES");
        graph.link(&link).expect("link");
        graph.unlink(&link).expect("unlink");
        assert_eq!(graph.links(), before.as_slice());
    }

    #[test]
    fn link_rejections() {
        let mut graph = populated();
        let link = LinkMetadata::new("ORDERS", "USER_ID", "USERS");
        graph.link(&link).expect("link");
        assert!(matches!(graph.link(&link), Err(GraphError::DuplicateLink(_))));
        assert!(matches!(
            graph.link(&LinkMetadata::new("ORDERS", "USER_ID", "ITEMS")),
            Err(GraphError::UnknownTable(_))
        ));
        assert!(matches!(
            graph.link(&LinkMetadata::new("ORDERS", "ITEM_ID", "USERS")),
            Err(GraphError::UnknownColumn { .. })
        ));
        assert!(matches!(
            graph.link(&LinkMetadata::new("USERS", "AGE", "ORDERS")),
            Err(GraphError::MissingPrimaryKey(_))
        ));
        assert!(matches!(
            graph.link(&LinkMetadata::new("USERS", "USER_ID", "STORES")),
            Err(GraphError::ForeignKeyIsPrimaryKey(_))
        ));
        assert!(matches!(
            graph.unlink(&LinkMetadata::new("ORDERS", "STORE_ID", "STORES")),
            Err(GraphError::UnknownLink(_))
        ));
    }

    #[test]
    fn remove_table_cascades_links_on_both_ends() {
        let mut graph = populated();
        graph
            .link(&LinkMetadata::new("ORDERS", "USER_ID", "USERS"))
            .expect("link users");
        graph
            .link(&LinkMetadata::new("ORDERS", "STORE_ID", "STORES"))
            .expect("link stores");

        let removed = graph.remove_table("ORDERS").expect("remove orders");
        assert_eq!(removed.len(), 2);
        assert!(graph.links().is_empty());
        assert!(matches!(
            graph.remove_table("ORDERS"),
            Err(GraphError::UnknownTable(_))
        ));
    }

    #[test]
    fn validate_reports_every_violation_and_is_stable() {
        let mut graph = populated();
        graph
            .link(&LinkMetadata::new("ORDERS", "USER_ID", "USERS"))
            .expect("link users");
        let users = graph.table_mut("USERS").expect("users");
        users
            .set_stype("USER_ID", Some(Stype::Numerical))
            .expect("numerical fits int");
        let orders = graph.table_mut("ORDERS").expect("orders");
        orders.remove_column("USER_ID").expect("discard fkey");

        let first = graph.validate().expect_err("two violations");
        let second = graph.validate().expect_err("still two violations");
        let GraphError::Validation(first) = first else {
            panic!("expected validation error");
        };
        let GraphError::Validation(second) = second else {
            panic!("expected validation error");
        };
        assert_eq!(first.violations.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn infers_links_from_matching_primary_keys() {
        let mut graph = populated();
        let mut inferred = graph.infer_links().expect("infer links");
        inferred.sort_by(|left, right| left.foreign_key.cmp(&right.foreign_key));
        assert_eq!(
            inferred,
            vec![
                LinkMetadata::new("ORDERS", "STORE_ID", "STORES"),
                LinkMetadata::new("ORDERS", "USER_ID", "USERS"),
            ]
        );
        assert!(matches!(graph.infer_links(), Err(GraphError::LinksExist(2))));
    }
}
