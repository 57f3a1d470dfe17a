use crate::models::MergedTable;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write the filled table as a comma-separated UTF-8 file, header first.
pub fn write_table(path: &Path, table: &MergedTable) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    write_table_to(file, table).with_context(|| format!("Failed to write {:?}", path))?;

    info!(
        "Wrote {} rows × {} columns to {:?}",
        table.rows.len(),
        table.columns.len(),
        path
    );
    Ok(())
}

pub fn write_table_to<W: Write>(out: W, table: &MergedTable) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.cells.iter().map(|c| c.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}
