//! Station catalog loader (`assets/stazioni.csv`).

use crate::models::{Catalog, Station};
use crate::scraper::cleaner::normalise_station_id;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read station catalog {0:?}")]
    Read(PathBuf, #[source] csv::Error),

    #[error("Station catalog {path:?} has no '{column}' column")]
    MissingIdColumn { path: PathBuf, column: String },
}

/// Read the catalog from `path`. Duplicate ids keep their first row.
pub fn load_catalog(path: &Path, delimiter: u8, id_column: &str) -> Result<Catalog, CatalogError> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CatalogError::Read(path.to_path_buf(), e))?;

    read_catalog(reader, path, id_column)
}

fn read_catalog<R: Read>(
    mut reader: csv::Reader<R>,
    path: &Path,
    id_column: &str,
) -> Result<Catalog, CatalogError> {
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CatalogError::Read(path.to_path_buf(), e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let id_idx = headers
        .iter()
        .position(|h| h == id_column)
        .ok_or_else(|| CatalogError::MissingIdColumn {
            path: path.to_path_buf(),
            column: id_column.to_string(),
        })?;

    let mut seen = HashSet::new();
    let mut stations = Vec::new();
    let mut duplicates = 0usize;

    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };

        let Some(id) = record.get(id_idx).map(normalise_station_id).filter(|id| !id.is_empty())
        else {
            warn!("Row {} in {:?}: empty station id, skipped", i + 1, path);
            continue;
        };

        if !seen.insert(id.clone()) {
            debug!("Duplicate station {} at row {}", id, i + 1);
            duplicates += 1;
            continue;
        }

        let values = (0..headers.len())
            .map(|j| record.get(j).unwrap_or_default().trim().to_string())
            .collect();

        stations.push(Station { id, values });
    }

    info!(
        "{} stations loaded from {:?} ({} duplicates dropped)",
        stations.len(),
        path,
        duplicates
    );

    Ok(Catalog { headers, stations })
}
