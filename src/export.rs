//! CSV export of the table view.
//!
//! Writes the header row followed by one line per table row. By default every
//! row is written regardless of the active filters; `ExportScope::Visible`
//! restricts the output to rows currently shown.
use std::io::Write;
use std::path::Path;

use anyhow::{Result, bail};
use csv::Writer;

use crate::engine::Engine;

pub const EXPORT_FILENAME: &str = "ldap_dump_export.csv";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportScope {
    /// Every row of the table
    #[default]
    All,
    /// Only rows passing the current filters
    Visible,
}

pub fn write_table_csv<W: Write>(engine: &Engine, out: W, scope: ExportScope) -> Result<usize> {
    if engine.table.is_empty() {
        bail!("no table to export");
    }
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(&engine.table.headers)?;
    let mut written = 0;
    for (i, row) in engine.table.iter_rows().enumerate() {
        if scope == ExportScope::Visible && engine.is_row_hidden(i) {
            continue;
        }
        wtr.write_record(row.cells())?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

pub fn save_table_csv<P: AsRef<Path>>(engine: &Engine, path: P, scope: ExportScope) -> Result<usize> {
    let file = std::fs::File::create(path.as_ref())?;
    let written = write_table_csv(engine, file, scope)?;
    log::info!("exported {} rows to {}", written, path.as_ref().display());
    Ok(written)
}
