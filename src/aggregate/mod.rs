//! Merge per-station series into one wide table.

use crate::models::{Catalog, Cell, MergedRow, MergedTable, Series};
use crate::scraper::cleaner::parse_station_date;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Build the unfilled table: one row per catalog station, catalog columns
/// first, then every observed date in chronological order.
///
/// Excluded names are dropped from both groups when present. Series for ids
/// that are not in the catalog are ignored.
pub fn merge(
    catalog: &Catalog,
    series_by_station: &HashMap<String, Series>,
    excluded: &[String],
) -> MergedTable {
    let excluded: HashSet<&str> = excluded.iter().map(String::as_str).collect();

    let kept_attrs: Vec<usize> = catalog
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !excluded.contains(h.as_str()))
        .map(|(i, _)| i)
        .collect();

    let dates = date_columns(series_by_station, &excluded);

    let mut columns: Vec<String> = kept_attrs.iter().map(|&i| catalog.headers[i].clone()).collect();
    let attribute_columns = columns.len();
    columns.extend(dates.iter().cloned());

    let rows = catalog
        .stations
        .iter()
        .map(|station| {
            let series = series_by_station.get(&station.id);

            let attrs = kept_attrs.iter().map(|&i| match station.values.get(i) {
                Some(v) if !v.is_empty() => Cell::Text(v.clone()),
                _ => Cell::Missing,
            });

            let values = dates.iter().map(|date| {
                match series.and_then(|s| s.get(date)).copied().flatten() {
                    Some(v) => Cell::Value(v),
                    None => Cell::Missing,
                }
            });

            MergedRow {
                station_id: station.id.clone(),
                cells: attrs.chain(values).collect(),
            }
        })
        .collect();

    let orphans = series_by_station
        .keys()
        .filter(|id| !catalog.stations.iter().any(|s| &s.id == *id))
        .count();
    if orphans > 0 {
        debug!("{} series without a catalog station ignored", orphans);
    }

    MergedTable {
        columns,
        rows,
        attribute_columns,
    }
}

/// Union of all dates across stations, oldest first. Dates that do not parse
/// sort after the rest, by text.
fn date_columns(series_by_station: &HashMap<String, Series>, excluded: &HashSet<&str>) -> Vec<String> {
    let mut dates: Vec<String> = series_by_station
        .values()
        .flat_map(|s| s.keys())
        .filter(|d| !excluded.contains(d.as_str()))
        .collect::<HashSet<_>>()
        .into_iter()
        .cloned()
        .collect();

    dates.sort_by_cached_key(|d| (parse_station_date(d).is_none(), parse_station_date(d), d.clone()));
    dates
}
