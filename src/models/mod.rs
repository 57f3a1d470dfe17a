use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

// ── Catalog ───────────────────────────────────────────────────────────────────

/// One monitoring station: its id plus the catalog values, aligned with
/// [`Catalog::headers`].
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub values: Vec<String>,
}

/// The deduplicated station list, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub headers: Vec<String>,
    pub stations: Vec<Station>,
}

impl Catalog {
    pub fn ids(&self) -> Vec<String> {
        self.stations.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

// ── Series ────────────────────────────────────────────────────────────────────

/// A reading is `None` when the page published the record without a usable value.
pub type Reading = Option<f64>;

/// Date string (as published, `DD/MM/YYYY`) → reading, for one station.
pub type Series = HashMap<String, Reading>;

/// One `VALUES[n] = new Array(...)` entry, split into its quoted fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    pub slot: u32,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn date(&self) -> Option<&str> {
        self.fields.get(1).map(String::as_str)
    }
}

// ── Merged table ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Value(f64),
    Missing,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            // Whole numbers keep one decimal so value columns read as floats.
            Cell::Value(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Cell::Value(v) => write!(f, "{}", v),
            Cell::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub station_id: String,
    pub cells: Vec<Cell>,
}

/// Wide table: station attributes first, then one column per observed date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<MergedRow>,
    /// Number of leading columns that come from the catalog.
    pub attribute_columns: usize,
}

impl MergedTable {
    pub fn date_columns(&self) -> &[String] {
        &self.columns[self.attribute_columns..]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, station_id: &str, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .find(|r| r.station_id == station_id)
            .and_then(|r| r.cells.get(idx))
    }

    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .filter(|c| matches!(c, Cell::Missing))
            .count()
    }

    /// Replace every missing cell with `value`. Must be the last step before output.
    pub fn fill_missing(&mut self, value: f64) {
        for cell in self.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
            if matches!(cell, Cell::Missing) {
                *cell = Cell::Value(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Value(5.2).to_string(), "5.2");
        assert_eq!(Cell::Value(0.0).to_string(), "0.0");
        assert_eq!(Cell::Value(-3.0).to_string(), "-3.0");
        assert_eq!(Cell::Text("Pisa".into()).to_string(), "Pisa");
        assert_eq!(Cell::Missing.to_string(), "");
    }

    #[test]
    fn test_fill_missing_touches_only_missing() {
        let mut table = MergedTable {
            columns: vec!["IDStazione".into(), "01/01/2024".into()],
            rows: vec![MergedRow {
                station_id: "TOS1".into(),
                cells: vec![Cell::Text("TOS1".into()), Cell::Missing],
            }],
            attribute_columns: 1,
        };
        assert_eq!(table.missing_count(), 1);
        table.fill_missing(0.0);
        assert_eq!(table.missing_count(), 0);
        assert_eq!(table.cell("TOS1", "01/01/2024"), Some(&Cell::Value(0.0)));
        assert_eq!(table.cell("TOS1", "IDStazione"), Some(&Cell::Text("TOS1".into())));
        assert_eq!(table.date_columns(), ["01/01/2024".to_string()]);
    }
}
