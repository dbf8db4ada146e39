use std::io;

use crate::error::Result;
use crate::reader::Reader;
use crate::row::Row;

/// Builds a table projection over a configured CSV reader.
///
/// The projection can skip leading raw lines (capturing their text),
/// treat the first parsed row as column names, and drains every
/// remaining row into a [`Table`].
#[derive(Clone, Debug)]
pub struct TableBuilder {
    skip_lines: usize,
    headers: bool,
}

impl Default for TableBuilder {
    fn default() -> TableBuilder {
        TableBuilder { skip_lines: 0, headers: true }
    }
}

impl TableBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> TableBuilder {
        TableBuilder::default()
    }

    /// The number of raw lines to skip before parsing begins.
    ///
    /// Skipped lines are not parsed as CSV; their raw text is kept and
    /// available from [`Table::skipped_lines`]. The default is 0.
    pub fn skip_lines(&mut self, n: usize) -> &mut TableBuilder {
        self.skip_lines = n;
        self
    }

    /// Whether the first parsed row provides the column names.
    ///
    /// Enabled by default. Header names are trimmed; null or blank names
    /// become `F1`, `F2`, … by position, and duplicates get a `_2`,
    /// `_3`, … suffix. When disabled, columns are named `F1`..`Fn` after
    /// the first data row.
    pub fn headers(&mut self, yes: bool) -> &mut TableBuilder {
        self.headers = yes;
        self
    }

    /// Drain the reader into a table.
    pub fn read<R: io::Read>(&self, rdr: &mut Reader<R>) -> Result<Table> {
        let mut skipped = Vec::with_capacity(self.skip_lines);
        for _ in 0..self.skip_lines {
            match rdr.read_raw_line()? {
                Some(line) => skipped.push(line),
                None => break,
            }
        }

        let mut columns: Vec<String> = vec![];
        if self.headers {
            if let Some(header) = rdr.read()? {
                for (i, cell) in header.iter().enumerate() {
                    let name = cell.unwrap_or("").trim();
                    columns.push(column_name(&columns, name, i));
                }
            }
        }

        let mut rows = vec![];
        while let Some(row) = rdr.read()? {
            if columns.len() < row.len() {
                // A row wider than the header extends the column set.
                for i in columns.len()..row.len() {
                    columns.push(column_name(&columns, "", i));
                }
            }
            rows.push(row);
        }

        // Rows shorter than the final column count are padded with null
        // cells, so every row spans the table's width.
        for row in &mut rows {
            while row.len() < columns.len() {
                row.push_cell(None);
            }
        }

        Ok(Table { columns, rows, skipped })
    }
}

/// Pick a unique column name.
///
/// A blank name becomes `F{i}` by 1-based position; a name already in
/// use gets the first free `_2`, `_3`, … suffix.
fn column_name(taken: &[String], name: &str, i: usize) -> String {
    let base = if name.is_empty() {
        format!("F{}", i + 1)
    } else {
        name.to_string()
    };
    if !taken.iter().any(|t| t == &base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken.iter().any(|t| t == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// A fully-drained CSV table: named columns plus every data row.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
    skipped: Vec<String>,
}

impl Table {
    /// The column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The data rows, each padded to the table's column count.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The raw text of the lines skipped before parsing.
    pub fn skipped_lines(&self) -> &[String] {
        &self.skipped
    }

    /// The number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The cell at the given row and column.
    ///
    /// The outer `Option` is `None` when the position is out of range;
    /// the inner `Option` is `None` when the cell is null.
    pub fn cell(&self, row: usize, col: usize) -> Option<Option<&str>> {
        if col >= self.columns.len() {
            return None;
        }
        self.rows.get(row).map(|r| r.get(col).unwrap_or(None))
    }
}

#[cfg(test)]
mod tests {
    use crate::reader::{Reader, ReaderBuilder};

    use super::TableBuilder;

    fn reader(data: &str) -> Reader<&[u8]> {
        Reader::from_reader(data.as_bytes()).unwrap()
    }

    #[test]
    fn first_row_names_columns() {
        let mut rdr = reader("name,age\nalice,39\nbob,41\n");
        let table = TableBuilder::new().read(&mut rdr).unwrap();
        assert_eq!(table.columns(), &["name", "age"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), Some(Some("alice")));
        assert_eq!(table.cell(1, 1), Some(Some("41")));
    }

    #[test]
    fn blank_and_duplicate_headers_are_renamed() {
        let mut rdr = reader("name, ,name,F2\na,b,c,d\n");
        let table = TableBuilder::new().read(&mut rdr).unwrap();
        assert_eq!(table.columns(), &["name", "F2", "name_2", "F2_2"]);
    }

    #[test]
    fn null_header_cell_gets_positional_name() {
        let mut rdr = ReaderBuilder::new()
            .null_value(Some("NULL"))
            .from_reader("a,NULL,c\n1,2,3\n".as_bytes())
            .unwrap();
        let table = TableBuilder::new().read(&mut rdr).unwrap();
        assert_eq!(table.columns(), &["a", "F2", "c"]);
    }

    #[test]
    fn no_headers_names_columns_by_position() {
        let mut rdr = reader("a,b\nc,d\n");
        let table =
            TableBuilder::new().headers(false).read(&mut rdr).unwrap();
        assert_eq!(table.columns(), &["F1", "F2"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), Some(Some("a")));
    }

    #[test]
    fn skipped_lines_are_captured_raw() {
        let mut rdr = reader("# generated\n# by a tool\na,b\n1,2\n");
        let table =
            TableBuilder::new().skip_lines(2).read(&mut rdr).unwrap();
        assert_eq!(
            table.skipped_lines(),
            &["# generated", "# by a tool"]
        );
        assert_eq!(table.columns(), &["a", "b"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn short_rows_are_padded_with_nulls() {
        let mut rdr = reader("a,b,c\n1\n2,3\n");
        let table = TableBuilder::new().read(&mut rdr).unwrap();
        assert_eq!(table.rows()[0], &[Some("1"), None, None][..]);
        assert_eq!(table.cell(0, 2), Some(None));
    }

    #[test]
    fn wide_rows_extend_the_columns() {
        let mut rdr = reader("a,b\n1,2,3\n4\n");
        let table = TableBuilder::new().read(&mut rdr).unwrap();
        assert_eq!(table.columns(), &["a", "b", "F3"]);
        assert_eq!(table.rows()[1], &[Some("4"), None, None][..]);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let mut rdr = reader("");
        let table = TableBuilder::new().read(&mut rdr).unwrap();
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
        assert_eq!(table.cell(0, 0), None);
    }
}
