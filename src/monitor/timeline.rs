// src/monitor/timeline.rs

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Columnar telemetry: every column holds one value per row.
///
/// Serializes as a JSON object in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    columns: Vec<String>,
    values: Vec<Vec<Value>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: Vec<String>) -> Self {
        let values = vec![Vec::new(); columns.len()];
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a row. Returns `false` (and changes nothing) when the row
    /// width does not match the columns.
    pub fn push_row(&mut self, row: Vec<Value>) -> bool {
        if row.len() != self.columns.len() {
            return false;
        }
        for (col, v) in self.values.iter_mut().zip(row) {
            col.push(v);
        }
        true
    }
}

impl Serialize for Timeline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}
