//! Table representation: a `DN` column followed by the sorted union of every
//! attribute name, one row per record. Missing attributes are empty cells.
use std::collections::{BTreeSet, HashMap};

use crate::record::{AttributeSource, Record, build_search_text};

pub const DN_HEADER: &str = "DN";

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
    columns: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<String>,
    search_text: String,
}

impl Table {
    pub fn from_records(records: &[Record]) -> Self {
        let keys: BTreeSet<&str> = records.iter().flat_map(|r| r.keys()).collect();
        let mut headers = Vec::with_capacity(keys.len() + 1);
        headers.push(DN_HEADER.to_string());
        headers.extend(keys.iter().map(|k| k.to_string()));
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, h)| (h.clone(), i))
            .collect();

        let rows = records
            .iter()
            .map(|r| {
                let mut cells = Vec::with_capacity(headers.len());
                cells.push(r.dn.clone());
                for key in &headers[1..] {
                    cells.push(r.attribute(key).unwrap_or_default().to_string());
                }
                let search_text = build_search_text(
                    &cells[0],
                    headers[1..]
                        .iter()
                        .zip(&cells[1..])
                        .filter(|(_, v)| !v.is_empty())
                        .map(|(k, v)| (k.as_str(), v.as_str())),
                );
                TableRow { cells, search_text }
            })
            .collect();

        Self {
            headers,
            rows,
            columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<TableRowRef<'_>> {
        self.rows.get(index).map(|row| TableRowRef { table: self, row })
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = TableRowRef<'_>> {
        self.rows.iter().map(move |row| TableRowRef { table: self, row })
    }
}

/// A row paired with its table so attributes can be looked up by header.
#[derive(Debug, Clone, Copy)]
pub struct TableRowRef<'a> {
    table: &'a Table,
    row: &'a TableRow,
}

impl<'a> TableRowRef<'a> {
    pub fn cells(&self) -> &'a [String] {
        &self.row.cells
    }
}

impl AttributeSource for TableRowRef<'_> {
    fn display_name(&self) -> &str {
        self.row.cells.first().map(String::as_str).unwrap_or_default()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        let idx = *self.table.columns.get(name)?;
        self.row
            .cells
            .get(idx)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        Box::new(
            self.table.headers[1..]
                .iter()
                .zip(self.row.cells.iter().skip(1))
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }

    fn search_text(&self) -> &str {
        &self.row.search_text
    }
}
