use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};

use crate::config::{self, NewLine, Quoting};
use crate::error::Result;
use crate::transcode::EncodingWriter;

/// The qualification override predicate.
///
/// Receives the default decision and the cell content; returning true
/// forces qualification. The predicate can only broaden the default: it
/// is never allowed to suppress qualification of content that requires it.
type QualifyPredicate = dyn Fn(bool, &str) -> bool + Send + Sync;

/// Builds a CSV writer with various configuration knobs.
///
/// Once a `Writer` is built, its configuration cannot be changed: the
/// builder's settings are copied into the writer at construction time.
pub struct WriterBuilder {
    separator: char,
    qualifier: char,
    quoting: Quoting,
    null_value: String,
    new_line: NewLine,
    trailing_new_line: bool,
    encoding: &'static Encoding,
    buffer_capacity: usize,
    should_qualify: Option<Arc<QualifyPredicate>>,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder {
            separator: ',',
            qualifier: '"',
            quoting: Quoting::default(),
            null_value: String::new(),
            new_line: NewLine::default(),
            trailing_new_line: true,
            encoding: UTF_8,
            buffer_capacity: 16 * 1024,
            should_qualify: None,
        }
    }
}

impl fmt::Debug for WriterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WriterBuilder")
            .field("separator", &self.separator)
            .field("qualifier", &self.qualifier)
            .field("quoting", &self.quoting)
            .field("null_value", &self.null_value)
            .field("new_line", &self.new_line)
            .field("trailing_new_line", &self.trailing_new_line)
            .field("encoding", &self.encoding)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("should_qualify", &self.should_qualify.is_some())
            .finish()
    }
}

impl WriterBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// The column separator to use when writing CSV.
    ///
    /// The default is `','`.
    pub fn separator(&mut self, separator: char) -> &mut WriterBuilder {
        self.separator = separator;
        self
    }

    /// The text qualifier to use when writing CSV.
    ///
    /// The default is `'"'`.
    pub fn qualifier(&mut self, qualifier: char) -> &mut WriterBuilder {
        self.qualifier = qualifier;
        self
    }

    /// The text qualification policy.
    ///
    /// `Always` qualifies every cell. `AsNeeded` qualifies only cells
    /// whose content contains the separator, a qualifier character or a
    /// line break. `None` never qualifies and never escapes, leaving the
    /// caller responsible for avoiding ambiguous content.
    ///
    /// The default is `Quoting::Always`.
    pub fn quoting(&mut self, quoting: Quoting) -> &mut WriterBuilder {
        self.quoting = quoting;
        self
    }

    /// The text emitted in place of a null cell.
    ///
    /// The marker is written verbatim and never qualified or escaped, so
    /// it must not contain the separator, the qualifier or line breaks.
    ///
    /// The default is the empty string.
    pub fn null_value(&mut self, marker: &str) -> &mut WriterBuilder {
        self.null_value = marker.to_string();
        self
    }

    /// The line ending written after each row.
    ///
    /// The default is `NewLine::Windows` (`\r\n`).
    pub fn new_line(&mut self, new_line: NewLine) -> &mut WriterBuilder {
        self.new_line = new_line;
        self
    }

    /// Whether the output ends with a line terminator.
    ///
    /// When enabled (the default), every row is followed by a
    /// terminator. When disabled, terminators are written between rows
    /// only, so the final row ends the output without one.
    pub fn trailing_new_line(&mut self, yes: bool) -> &mut WriterBuilder {
        self.trailing_new_line = yes;
        self
    }

    /// The encoding of the output stream.
    ///
    /// The default is UTF-8. Unmappable characters are written as
    /// numeric character references; UTF-16 output falls back to UTF-8.
    pub fn encoding(
        &mut self,
        encoding: &'static Encoding,
    ) -> &mut WriterBuilder {
        self.encoding = encoding;
        self
    }

    /// The capacity of the output buffer, in bytes.
    ///
    /// The default is 16 KiB.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut WriterBuilder {
        self.buffer_capacity = capacity;
        self
    }

    /// Install a qualification override for `Quoting::AsNeeded`.
    ///
    /// The predicate receives the default decision and the cell content.
    /// Returning true qualifies a cell the default policy would leave
    /// bare. The override can only broaden qualification: content that
    /// requires qualification is qualified regardless of what the
    /// predicate returns.
    pub fn should_qualify<F>(&mut self, predicate: F) -> &mut WriterBuilder
    where
        F: Fn(bool, &str) -> bool + Send + Sync + 'static,
    {
        self.should_qualify = Some(Arc::new(predicate));
        self
    }

    /// Build a CSV writer from this configuration and an arbitrary
    /// `io::Write`.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Result<Writer<W>> {
        config::validate(
            self.separator,
            self.qualifier,
            self.quoting,
            Some(&self.null_value),
            self.buffer_capacity,
        )?;
        Ok(Writer {
            out: Some(EncodingWriter::new(
                wtr,
                self.encoding,
                self.buffer_capacity,
            )),
            separator: self.separator,
            qualifier: self.qualifier,
            quoting: self.quoting,
            null_value: self.null_value.clone(),
            eol: self.new_line.as_str(),
            trailing_new_line: self.trailing_new_line,
            should_qualify: self.should_qualify.clone(),
            row_count: 0,
            rowbuf: String::new(),
        })
    }

    /// Build a CSV writer from this configuration for the file at the
    /// given path, truncating it if it exists.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Writer<File>> {
        self.from_writer(File::create(path)?)
    }
}

/// A streaming CSV writer.
///
/// The writer serializes one row of nullable string cells per
/// [`write_row`](Writer::write_row) call, applying the configured
/// qualification policy and escaping embedded qualifiers by doubling
/// them. Null cells are written as the configured null-marker,
/// unqualified and verbatim.
///
/// Output is buffered; call [`flush`](Writer::flush) to push buffered
/// bytes to the underlying stream. Dropping the writer flushes it,
/// ignoring errors, like `std::io::BufWriter`. Use
/// [`into_inner`](Writer::into_inner) to flush and recover the stream,
/// or construct the writer over `&mut W` when the caller must keep
/// ownership of the stream.
///
/// # Example
///
/// ```
/// use uncsv::{Quoting, WriterBuilder};
///
/// let mut builder = WriterBuilder::new();
/// builder.quoting(Quoting::AsNeeded).null_value("NULL");
/// let mut wtr = builder.from_writer(Vec::new())?;
/// wtr.write_row(vec![Some("a"), Some("b,b"), None])?;
/// let data = wtr.into_inner()?;
/// assert_eq!(data, b"a,\"b,b\",NULL\r\n");
/// # Ok::<(), uncsv::Error>(())
/// ```
pub struct Writer<W: io::Write> {
    // Always present; taken only by into_inner, which consumes self.
    out: Option<EncodingWriter<W>>,
    separator: char,
    qualifier: char,
    quoting: Quoting,
    null_value: String,
    eol: &'static str,
    trailing_new_line: bool,
    should_qualify: Option<Arc<QualifyPredicate>>,
    row_count: u64,
    // Reused per-row accumulation buffer.
    rowbuf: String,
}

impl Writer<File> {
    /// Create a CSV writer with default settings for the file at the
    /// given path, truncating it if it exists.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Writer<File>> {
        WriterBuilder::new().from_path(path)
    }
}

impl<W: io::Write> Writer<W> {
    /// Create a CSV writer with default settings from an arbitrary
    /// `io::Write`.
    pub fn from_writer(wtr: W) -> Result<Writer<W>> {
        WriterBuilder::new().from_writer(wtr)
    }

    /// Write one row.
    ///
    /// Cells are joined with the separator and the row is terminated
    /// according to the line-ending configuration. An empty iterator
    /// writes an empty row.
    pub fn write_row<I, T>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = Option<T>>,
        T: AsRef<str>,
    {
        let mut rowbuf = std::mem::take(&mut self.rowbuf);
        rowbuf.clear();
        for (i, cell) in cells.into_iter().enumerate() {
            if i > 0 {
                rowbuf.push(self.separator);
            }
            match cell {
                None => rowbuf.push_str(&self.null_value),
                Some(ref cell) => self.convert_cell(cell.as_ref(), &mut rowbuf),
            }
        }
        let out = self.out.as_mut().expect("writer stream missing");
        if !self.trailing_new_line && self.row_count > 0 {
            out.write_str(self.eol)?;
        }
        out.write_str(&rowbuf)?;
        if self.trailing_new_line {
            out.write_str(self.eol)?;
        }
        self.row_count += 1;
        self.rowbuf = rowbuf;
        Ok(())
    }

    /// Serialize one cell into the row buffer, deciding qualification
    /// and escaping embedded qualifiers by doubling them.
    fn convert_cell(&self, cell: &str, rowbuf: &mut String) {
        let qualify = match self.quoting {
            Quoting::Always => true,
            Quoting::None => false,
            Quoting::AsNeeded => {
                let needed = cell.contains(self.separator)
                    || cell.contains(self.qualifier)
                    || cell.contains('\r')
                    || cell.contains('\n');
                match self.should_qualify {
                    // The override can broaden the decision, never
                    // suppress it.
                    Some(ref pred) => needed || pred(needed, cell),
                    None => needed,
                }
            }
        };
        if qualify {
            rowbuf.push(self.qualifier);
            for c in cell.chars() {
                if c == self.qualifier {
                    rowbuf.push(self.qualifier);
                }
                rowbuf.push(c);
            }
            rowbuf.push(self.qualifier);
        } else {
            rowbuf.push_str(cell);
        }
    }

    /// Push buffered output through the encoder to the underlying stream
    /// and flush it.
    pub fn flush(&mut self) -> Result<()> {
        self.out.as_mut().expect("writer stream missing").flush()?;
        Ok(())
    }

    /// The number of rows written so far.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Flush and return the underlying stream.
    ///
    /// Stateful encodings have their closing sequence written here (or
    /// on drop).
    pub fn into_inner(mut self) -> Result<W> {
        let mut out = self.out.take().expect("writer stream missing");
        out.finish()?;
        Ok(out.into_inner())
    }
}

impl<W: io::Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if let Some(ref mut out) = self.out {
            let _ = out.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{NewLine, Quoting};

    use super::{Writer, WriterBuilder};

    fn written<F>(configure: F, rows: &[Vec<Option<&str>>]) -> String
    where
        F: FnOnce(&mut WriterBuilder),
    {
        let mut builder = WriterBuilder::new();
        configure(&mut builder);
        let mut wtr = builder.from_writer(Vec::new()).unwrap();
        for row in rows {
            wtr.write_row(row.clone()).unwrap();
        }
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn always_qualifies_everything_but_nulls() {
        let got = written(
            |b| {
                b.null_value("NULL").new_line(NewLine::Unix);
            },
            &[vec![Some("1"), Some("2"), None]],
        );
        assert_eq!(got, "\"1\",\"2\",NULL\n");
    }

    #[test]
    fn as_needed_leaves_plain_cells_bare() {
        let got = written(
            |b| {
                b.quoting(Quoting::AsNeeded).new_line(NewLine::Unix);
            },
            &[vec![Some("a"), Some("b"), Some("")]],
        );
        assert_eq!(got, "a,b,\n");
    }

    #[test]
    fn as_needed_qualifies_special_content() {
        let got = written(
            |b| {
                b.quoting(Quoting::AsNeeded).new_line(NewLine::Unix);
            },
            &[vec![
                Some("a,b"),
                Some("line\nbreak"),
                Some("cr\rhere"),
                Some("say \"hi\""),
            ]],
        );
        assert_eq!(
            got,
            "\"a,b\",\"line\nbreak\",\"cr\rhere\",\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn none_never_qualifies_or_escapes() {
        let got = written(
            |b| {
                b.quoting(Quoting::None).new_line(NewLine::Unix);
            },
            &[vec![Some("a,b"), Some("say \"hi\"")]],
        );
        assert_eq!(got, "a,b,say \"hi\"\n");
    }

    #[test]
    fn null_marker_is_never_qualified() {
        let got = written(
            |b| {
                b.null_value("NULL").new_line(NewLine::Unix);
            },
            &[vec![None, None]],
        );
        assert_eq!(got, "NULL,NULL\n");
    }

    #[test]
    fn default_null_marker_is_empty() {
        let got = written(
            |b| {
                b.quoting(Quoting::AsNeeded).new_line(NewLine::Unix);
            },
            &[vec![Some("a"), None, Some("b")]],
        );
        assert_eq!(got, "a,,b\n");
    }

    #[test]
    fn new_line_modes() {
        for (mode, eol) in [
            (NewLine::Windows, "\r\n"),
            (NewLine::Unix, "\n"),
            (NewLine::OldMac, "\r"),
        ]
        .iter()
        {
            let got = written(
                |b| {
                    b.quoting(Quoting::AsNeeded).new_line(*mode);
                },
                &[vec![Some("a")], vec![Some("b")]],
            );
            assert_eq!(got, format!("a{}b{}", eol, eol));
        }
    }

    #[test]
    fn no_trailing_new_line_writes_terminators_between_rows() {
        let got = written(
            |b| {
                b.quoting(Quoting::AsNeeded)
                    .new_line(NewLine::Unix)
                    .trailing_new_line(false);
            },
            &[vec![Some("a")], vec![Some("b")], vec![Some("c")]],
        );
        assert_eq!(got, "a\nb\nc");
    }

    #[test]
    fn override_broadens_qualification() {
        let got = written(
            |b| {
                b.quoting(Quoting::AsNeeded)
                    .new_line(NewLine::Unix)
                    .should_qualify(|_, cell| cell.starts_with('0'));
            },
            &[vec![Some("007"), Some("700")]],
        );
        assert_eq!(got, "\"007\",700\n");
    }

    #[test]
    fn override_cannot_suppress_qualification() {
        let got = written(
            |b| {
                b.quoting(Quoting::AsNeeded)
                    .new_line(NewLine::Unix)
                    .should_qualify(|_, _| false);
            },
            &[vec![Some("a,b")]],
        );
        assert_eq!(got, "\"a,b\"\n");
    }

    #[test]
    fn custom_separator_and_qualifier() {
        let got = written(
            |b| {
                b.separator(';')
                    .qualifier('\'')
                    .quoting(Quoting::AsNeeded)
                    .new_line(NewLine::Unix);
            },
            &[vec![Some("a;b"), Some("it's")]],
        );
        assert_eq!(got, "'a;b','it''s'\n");
    }

    #[test]
    fn empty_row_writes_only_a_terminator() {
        let got = written(
            |b| {
                b.quoting(Quoting::AsNeeded).new_line(NewLine::Unix);
            },
            &[vec![]],
        );
        assert_eq!(got, "\n");
    }

    #[test]
    fn row_count_advances_per_row() {
        let mut wtr = Writer::from_writer(Vec::new()).unwrap();
        assert_eq!(wtr.row_count(), 0);
        wtr.write_row(vec![Some("a")]).unwrap();
        wtr.write_row(vec![Some("b")]).unwrap();
        assert_eq!(wtr.row_count(), 2);
    }

    #[test]
    fn rejects_marker_needing_qualification() {
        let res = WriterBuilder::new()
            .null_value("N,A")
            .from_writer(Vec::new());
        assert!(res.is_err());
    }

    #[test]
    fn writes_through_a_mutable_reference() {
        let mut buf = Vec::new();
        {
            let mut builder = WriterBuilder::new();
            builder.quoting(Quoting::AsNeeded).new_line(NewLine::Unix);
            let mut wtr = builder.from_writer(&mut buf).unwrap();
            wtr.write_row(vec![Some("a")]).unwrap();
            wtr.flush().unwrap();
        }
        // The caller still owns the stream.
        assert_eq!(buf, b"a\n");
    }
}
