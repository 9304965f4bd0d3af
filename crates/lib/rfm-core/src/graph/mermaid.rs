use rfm_store::{GraphMetadata, TableMetadata};

const INDENT: &str = "    ";

/// Renders the graph as a Mermaid entity-relationship diagram.
///
/// Without `show_columns` only primary key, foreign key and time columns are listed.
#[must_use]
pub fn render_mermaid(graph: &GraphMetadata, show_columns: bool) -> String {
    let mut lines = vec!["erDiagram".to_string()];

    for table in &graph.tables {
        lines.push(format!("{INDENT}{} {{", table.name));
        for row in column_rows(graph, table, show_columns) {
            lines.push(format!("{INDENT}{INDENT}{row}"));
        }
        lines.push(format!("{INDENT}}}"));
    }

    if !graph.links.is_empty() {
        lines.push(String::new());
        for link in &graph.links {
            lines.push(format!(
                "{INDENT}{} o|--o{{ {} : {}",
                link.destination_table, link.source_table, link.foreign_key
            ));
        }
    }

    lines.join("\n")
}

fn column_rows(graph: &GraphMetadata, table: &TableMetadata, show_columns: bool) -> Vec<String> {
    let mut rows = Vec::new();
    for column in &table.columns {
        let Some(stype) = column.stype else {
            continue;
        };
        let is_pkey = table.primary_key.as_deref() == Some(column.name.as_str());
        let is_fkey = graph
            .links
            .iter()
            .any(|link| link.source_table == table.name && link.foreign_key == column.name);
        let is_time = table.time_column.as_deref() == Some(column.name.as_str());
        if !(show_columns || is_pkey || is_fkey || is_time) {
            continue;
        }

        let mut row = format!("{stype} {}", column.name);
        match (is_pkey, is_fkey) {
            (true, true) => row.push_str(" PK, FK"),
            (true, false) => row.push_str(" PK"),
            (false, true) => row.push_str(" FK"),
            (false, false) => {}
        }
        rows.push(row);
    }
    rows
}
