//! Best-effort application of batch graph edits.

use rfm_store::{
    LinkMetadata, UpdateError, UpdateGraphMetadata, UpdateTableMetadata, UpdatedGraphMetadata,
};
use tracing::{debug, warn};

use crate::graph::{GraphError, GraphStore};
use crate::source::TableLoader;

/// Result of [`apply_update`].
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub result: UpdatedGraphMetadata,
    /// Whether at least one item changed the graph.
    pub mutated: bool,
}

/// Applies every item of `request` independently.
///
/// Groups run in order: table additions, per-table updates, link removals, link
/// additions, then table removals. A failing item is recorded and processing
/// continues. A final validation failure is recorded as one more error.
pub fn apply_update(
    graph: &mut GraphStore,
    loader: &dyn TableLoader,
    request: &UpdateGraphMetadata,
) -> UpdateOutcome {
    let mut batch = Batch::default();

    for table in &request.tables_to_add {
        let result = graph.add_table(loader, table).map(drop);
        batch.record(&table.name, result);
    }

    for (name, update) in &request.tables_to_update {
        update_table(graph, name, update, &mut batch);
    }

    for link in &request.links_to_remove {
        batch.record(&link.to_string(), graph.unlink(link));
    }

    for link in &request.links_to_add {
        batch.record(&link.to_string(), graph.link(link));
    }

    for name in &request.tables_to_remove {
        match graph.remove_table(name) {
            Ok(removed) => {
                batch.mutated = true;
                batch.removed_links.extend(removed);
            }
            Err(err) => batch.fail(name, &err),
        }
    }

    if let Err(err) = graph.validate() {
        warn!(error = %err, "graph is invalid after batch update");
        batch.errors.push(UpdateError::new("graph", err.to_string()));
    }

    debug!(
        errors = batch.errors.len(),
        mutated = batch.mutated,
        "applied batch update"
    );
    UpdateOutcome {
        result: UpdatedGraphMetadata {
            graph: graph.get(),
            errors: batch.errors,
            removed_links: batch.removed_links,
        },
        mutated: batch.mutated,
    }
}

/// Clears run before sets so a key can move between columns within one update.
fn update_table(graph: &mut GraphStore, name: &str, update: &UpdateTableMetadata, batch: &mut Batch) {
    let table = match graph.table_mut(name) {
        Ok(table) => table,
        Err(err) => {
            batch.fail(name, &err);
            return;
        }
    };

    if let Some(None) = update.primary_key.as_change() {
        batch.record(name, table.set_primary_key(None).map(drop));
    }
    if let Some(None) = update.time_column.as_change() {
        batch.record(name, table.set_time_column(None).map(drop));
    }

    for (column, stype) in &update.stypes {
        let result = table.set_stype(column, *stype).map(drop);
        batch.record(&format!("{name}.{column}"), result);
    }

    if let Some(Some(pkey)) = update.primary_key.as_change() {
        batch.record(name, table.set_primary_key(Some(pkey)).map(drop));
    }
    if let Some(Some(time_column)) = update.time_column.as_change() {
        batch.record(name, table.set_time_column(Some(time_column)).map(drop));
    }
}

#[derive(Default)]
struct Batch {
    errors: Vec<UpdateError>,
    removed_links: Vec<LinkMetadata>,
    mutated: bool,
}

impl Batch {
    fn record(&mut self, item: &str, result: Result<(), GraphError>) {
        match result {
            Ok(()) => self.mutated = true,
            Err(err) => self.fail(item, &err),
        }
    }

    fn fail(&mut self, item: &str, err: &GraphError) {
        warn!(item, error = %err, "batch item failed");
        self.errors.push(UpdateError::new(item, err.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use rfm_store::{AddTableMetadata, FieldUpdate, Stype};

    use super::*;
    use crate::source::{LoadError, TableData};

    struct FakeLoader(HashMap<&'static str, TableData>);

    impl TableLoader for FakeLoader {
        fn load(&self, path: &str) -> Result<TableData, LoadError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| LoadError::UnsupportedFormat(path.to_string()))
        }
    }

    fn data(columns: Vec<(&str, ArrayRef)>) -> TableData {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), false))
            .collect();
        let arrays = columns.into_iter().map(|(_, array)| array).collect();
        TableData::from_batch(
            RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("valid batch"),
        )
    }

    fn ints(values: &[i64]) -> ArrayRef {
        Arc::new(Int64Array::from(values.to_vec()))
    }

    fn loader() -> FakeLoader {
        let mut tables = HashMap::new();
        tables.insert(
            "USERS.csv",
            data(vec![
                ("USER_ID", ints(&[0, 1])),
                ("AGE", ints(&[20, 30])),
                ("GENDER", Arc::new(StringArray::from(vec!["male", "female"]))),
            ]),
        );
        tables.insert(
            "ORDERS.csv",
            data(vec![
                ("USER_ID", ints(&[0, 1])),
                ("STORE_ID", ints(&[0, 0])),
                (
                    "TIME",
                    Arc::new(StringArray::from(vec!["2025-01-01", "2025-01-02"])),
                ),
            ]),
        );
        tables.insert(
            "STORES.csv",
            data(vec![
                ("STORE_ID", ints(&[0])),
                ("CAT", Arc::new(StringArray::from(vec!["food"]))),
            ]),
        );
        FakeLoader(tables)
    }

    fn add(name: &str, pkey: Option<&str>, time: Option<&str>) -> AddTableMetadata {
        AddTableMetadata {
            path: format!("{name}.csv"),
            name: name.to_string(),
            primary_key: pkey.map(str::to_string),
            time_column: time.map(str::to_string),
        }
    }

    fn full_batch() -> UpdateGraphMetadata {
        UpdateGraphMetadata {
            tables_to_add: vec![
                add("USERS", Some("USER_ID"), None),
                add("ORDERS", None, Some("TIME")),
                add("STORES", Some("STORE_ID"), None),
            ],
            links_to_add: vec![
                LinkMetadata::new("ORDERS", "USER_ID", "USERS"),
                LinkMetadata::new("ORDERS", "STORE_ID", "STORES"),
            ],
            ..UpdateGraphMetadata::default()
        }
    }

    #[test]
    fn links_can_reference_tables_added_in_the_same_batch() {
        let mut graph = GraphStore::new();
        let outcome = apply_update(&mut graph, &loader(), &full_batch());
        assert!(outcome.mutated);
        assert!(outcome.result.errors.is_empty());
        assert_eq!(outcome.result.graph.tables.len(), 3);
        assert_eq!(outcome.result.graph.links.len(), 2);
    }

    #[test]
    fn one_bad_item_yields_exactly_one_error() {
        let mut request = full_batch();
        request.tables_to_update.insert(
            "ITEMS".to_string(),
            UpdateTableMetadata {
                primary_key: FieldUpdate::Set("ITEM_ID".to_string()),
                ..UpdateTableMetadata::default()
            },
        );

        let mut graph = GraphStore::new();
        let outcome = apply_update(&mut graph, &loader(), &request);
        assert_eq!(outcome.result.errors.len(), 1);
        assert_eq!(outcome.result.errors[0].item, "ITEMS");
        assert_eq!(outcome.result.graph.tables.len(), 3);
        assert_eq!(outcome.result.graph.links.len(), 2);
    }

    #[test]
    fn omitted_fields_are_left_untouched() {
        let mut graph = GraphStore::new();
        apply_update(&mut graph, &loader(), &full_batch());

        let mut request = UpdateGraphMetadata::default();
        let mut stypes = std::collections::BTreeMap::new();
        stypes.insert("AGE".to_string(), Some(Stype::Categorical));
        stypes.insert("GENDER".to_string(), None);
        request.tables_to_update.insert(
            "USERS".to_string(),
            UpdateTableMetadata {
                stypes,
                ..UpdateTableMetadata::default()
            },
        );
        let outcome = apply_update(&mut graph, &loader(), &request);
        assert!(outcome.result.errors.is_empty());

        let users = outcome.result.graph.table("USERS").expect("users");
        assert_eq!(users.primary_key.as_deref(), Some("USER_ID"));
        assert_eq!(users.column("AGE").and_then(|c| c.stype), Some(Stype::Categorical));
        assert_eq!(users.column("GENDER").and_then(|c| c.stype), None);
    }

    #[test]
    fn primary_key_can_move_to_the_time_column() {
        let mut graph = GraphStore::new();
        apply_update(
            &mut graph,
            &loader(),
            &UpdateGraphMetadata {
                tables_to_add: vec![add("ORDERS", None, Some("TIME"))],
                ..UpdateGraphMetadata::default()
            },
        );

        let mut request = UpdateGraphMetadata::default();
        request.tables_to_update.insert(
            "ORDERS".to_string(),
            UpdateTableMetadata {
                stypes: std::collections::BTreeMap::from([(
                    "TIME".to_string(),
                    Some(Stype::Id),
                )]),
                primary_key: FieldUpdate::Set("TIME".to_string()),
                time_column: FieldUpdate::Clear,
            },
        );
        let outcome = apply_update(&mut graph, &loader(), &request);
        assert!(outcome.result.errors.is_empty(), "{:?}", outcome.result.errors);
        let orders = outcome.result.graph.table("ORDERS").expect("orders");
        assert_eq!(orders.primary_key.as_deref(), Some("TIME"));
        assert!(orders.time_column.is_none());
    }

    #[test]
    fn table_removal_reports_cascaded_links() {
        let mut graph = GraphStore::new();
        apply_update(&mut graph, &loader(), &full_batch());

        let request = UpdateGraphMetadata {
            links_to_remove: vec![LinkMetadata::new("ORDERS", "USER_ID", "USERS")],
            tables_to_remove: vec!["STORES".to_string()],
            ..UpdateGraphMetadata::default()
        };
        let outcome = apply_update(&mut graph, &loader(), &request);
        assert!(outcome.result.errors.is_empty());
        assert_eq!(outcome.result.graph.tables.len(), 2);
        assert!(outcome.result.graph.links.is_empty());
        assert_eq!(
            outcome.result.removed_links,
            vec![LinkMetadata::new("ORDERS", "STORE_ID", "STORES")]
        );
    }

    #[test]
    fn empty_batch_does_not_mutate() {
        let mut graph = GraphStore::new();
        let outcome = apply_update(&mut graph, &loader(), &UpdateGraphMetadata::default());
        assert!(!outcome.mutated);
        assert!(outcome.result.errors.is_empty());
    }
}
