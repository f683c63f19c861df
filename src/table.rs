//! Tabular input: a delimited file loaded into an in-memory column store.
//!
//! The table keeps every cell as its source string and infers a
//! [`ColumnType`] per column by scanning parses. The inferred type selects a
//! field encoder; the encoders re-parse cells with row-level error context.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

/// Column type inferred from the source data, used to select an encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// Every cell parses as a signed integer.
    Int,
    /// Every cell parses as a float (and at least one is not an integer).
    Float,
    /// Anything else, including file paths and bracketed list literals.
    Str,
}

impl ColumnType {
    /// Lowercase name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Int => "integer",
            ColumnType::Float => "float",
            ColumnType::Str => "string",
        }
    }
}

/// One named source column: raw cells plus the inferred type.
#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    values: Vec<String>,
}

impl Column {
    /// All cells in row order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Cells within a half-open row range.
    pub fn slice(&self, start: usize, end: usize) -> &[String] {
        &self.values[start..end]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// In-memory column store over a headered delimited file.
#[derive(Clone, Debug)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Read a headered CSV file into a column store.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, a record is malformed
    /// (annotated with its row number), or the file has no header row.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(f);

        let headers = rdr
            .headers()
            .with_context(|| format!("read header of {}", path.display()))?
            .clone();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

        let mut rows = 0usize;
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("parse CSV record #{}", i + 1))?;
            for (col, cell) in rec.iter().enumerate() {
                cells[col].push(cell.to_string());
            }
            rows += 1;
        }

        let columns = headers
            .iter()
            .zip(cells)
            .map(|(name, values)| Column {
                name: name.to_string(),
                ty: infer_type(&values),
                values,
            })
            .collect();

        Ok(Table { columns, rows })
    }

    /// Number of data rows (header excluded).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column names in file order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Infer the narrowest [`ColumnType`] that fits every cell.
///
/// Empty columns are `Str`: there is nothing to justify a numeric claim.
fn infer_type(values: &[String]) -> ColumnType {
    if values.is_empty() {
        return ColumnType::Str;
    }
    if values.iter().all(|v| v.trim().parse::<i64>().is_ok()) {
        return ColumnType::Int;
    }
    if values.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
        return ColumnType::Float;
    }
    ColumnType::Str
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> Result<tempfile::NamedTempFile> {
        let mut f = tempfile::NamedTempFile::new()?;
        f.write_all(content.as_bytes())?;
        Ok(f)
    }

    #[test]
    fn infers_column_types() -> Result<()> {
        let f = write_csv("id,score,label\n1,0.5,cat\n2,1.0,dog\n3,2,bird\n")?;
        let t = Table::read_csv(f.path())?;
        assert_eq!(t.rows(), 3);
        assert_eq!(t.column("id").unwrap().ty, ColumnType::Int);
        assert_eq!(t.column("score").unwrap().ty, ColumnType::Float);
        assert_eq!(t.column("label").unwrap().ty, ColumnType::Str);
        Ok(())
    }

    #[test]
    fn slices_are_row_ranges() -> Result<()> {
        let f = write_csv("v\na\nb\nc\nd\n")?;
        let t = Table::read_csv(f.path())?;
        let col = t.column("v").unwrap();
        assert_eq!(col.slice(1, 3), ["b".to_string(), "c".to_string()]);
        Ok(())
    }

    #[test]
    fn missing_column_lookup_is_none() -> Result<()> {
        let f = write_csv("v\n1\n")?;
        let t = Table::read_csv(f.path())?;
        assert!(t.column("nope").is_none());
        Ok(())
    }
}
