use comfy_table::{presets::NOTHING, *};
use geoprofile::{
    columns::ColumnIndex,
    field_table::FieldRow,
    profile::Profile,
    stat_data::THIS,
    table::{RawData, TableMetadata},
};
use itertools::Itertools;

fn new_table<S: ToString>(header: &[S]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .iter()
                .map(|h| Cell::new(h.to_string()).add_attribute(Attribute::Bold)),
        )
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn right_align_from(table: &mut Table, first: usize) {
    let n_columns = table.column_count();
    for i in first..n_columns {
        if let Some(column) = table.column_mut(i) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
}

pub fn display_tables(tables: &[TableMetadata]) -> Table {
    let mut table = new_table(&["Table", "Title", "Universe", "Releases"]);
    for metadata in tables {
        table.add_row(vec![
            metadata.table_id.clone(),
            metadata.title.clone(),
            metadata.universe.clone(),
            metadata.releases.iter().map(|r| &r.year).join(", "),
        ]);
    }
    table
}

pub fn display_columns(columns: &ColumnIndex) -> Table {
    let mut table = new_table(&["Column ID", "Name"]);
    for (id, info) in columns.iter() {
        table.add_row(vec![
            id.clone(),
            format!("{}{}", "  ".repeat(info.indent), info.name),
        ]);
    }
    table
}

pub fn display_values(data: &RawData) -> Table {
    let mut header = vec!["Column ID".to_string()];
    header.extend(data.keys().cloned());
    let mut table = new_table(&header);
    let column_ids = data
        .values()
        .flat_map(|values| values.estimate.keys())
        .unique();
    for id in column_ids {
        let mut row = vec![id.clone()];
        row.extend(
            data.values()
                .map(|values| format_value(values.estimate.get(id).copied().flatten())),
        );
        table.add_row(row);
    }
    right_align_from(&mut table, 1);
    table
}

pub fn display_rows(rows: &[FieldRow]) -> Table {
    let mut header: Vec<String> = rows
        .first()
        .map(|row| row.fields.keys().cloned().collect())
        .unwrap_or_default();
    header.push("Total".into());
    let n_fields = header.len() - 1;
    let mut table = new_table(&header);
    for row in rows {
        let mut cells: Vec<String> = row.fields.values().cloned().collect();
        cells.push(format_value(row.total));
        table.add_row(cells);
    }
    right_align_from(&mut table, n_fields);
    table
}

pub fn display_profile(profile: &Profile) -> Table {
    let levels: Vec<&str> = std::iter::once(THIS)
        .chain(profile.geography.comparatives.iter().map(String::as_str))
        .collect();
    let mut header = vec!["Section", "Statistic"];
    header.extend(levels.iter().copied());
    let mut table = new_table(&header);
    for (section_name, section) in &profile.sections {
        for entry in section.stats.values() {
            let mut row = vec![section_name.clone(), entry.name.clone()];
            row.extend(
                levels
                    .iter()
                    .map(|level| format_value(entry.values.get(*level).copied())),
            );
            table.add_row(row);
        }
    }
    right_align_from(&mut table, 2);
    table
}
