use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;

/// In-memory delimited table with a header row.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Empty cells and the usual NaN spellings
pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty()
        || cell.eq_ignore_ascii_case("nan")
        || cell.eq_ignore_ascii_case("na")
        || cell.eq_ignore_ascii_case("null")
}

pub fn parse_number(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Table {
    pub fn read(path: &Path) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("Failed to open dataset {}", path.display()))?;

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.with_context(|| format!("Malformed row in {}", path.display()))?;
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(|c| c.as_str())
    }

    pub fn numeric_values(&self, col: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.get(col).and_then(|c| parse_number(c)))
            .collect()
    }

    /// A column is numeric when it has at least one value and every present value parses
    pub fn is_numeric(&self, col: usize) -> bool {
        let mut seen = false;
        for row in &self.rows {
            match row.get(col) {
                Some(cell) if !is_missing(cell) => {
                    if parse_number(cell).is_none() {
                        return false;
                    }
                    seen = true;
                }
                _ => {}
            }
        }
        seen
    }

    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.headers.len()).filter(|idx| self.is_numeric(*idx)).collect()
    }

    /// Copy of the table without `name`, or `None` when the column is absent
    pub fn without_column(&self, name: &str) -> Option<Table> {
        let drop = self.column_index(name)?;
        let keep = |values: &Vec<String>| -> Vec<String> {
            values
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != drop)
                .map(|(_, v)| v.clone())
                .collect()
        };
        Some(Table {
            headers: keep(&self.headers),
            rows: self.rows.iter().map(keep).collect(),
        })
    }

    /// Drop exact duplicate rows, keeping the first occurrence. Returns the number removed.
    pub fn dedup_rows(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(before);
        self.rows.retain(|row| seen.insert(row.clone()));
        before - self.rows.len()
    }
}
