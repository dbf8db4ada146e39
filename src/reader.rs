use std::fs::File;
use std::io;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};

use crate::config::{self, Quoting};
use crate::error::Result;
use crate::row::Row;
use crate::transcode::DecodingReader;

/// Builds a CSV reader with various configuration knobs.
///
/// Once a `Reader` is built, its configuration cannot be changed: the
/// builder's settings are copied into the reader at construction time.
#[derive(Clone, Debug)]
pub struct ReaderBuilder {
    separator: char,
    qualifier: char,
    quoting: Quoting,
    null_value: Option<String>,
    encoding: &'static Encoding,
    bom_sniffing: bool,
    buffer_capacity: usize,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            separator: ',',
            qualifier: '"',
            quoting: Quoting::default(),
            null_value: None,
            encoding: UTF_8,
            bom_sniffing: false,
            buffer_capacity: 16 * 1024,
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// The column separator to use when parsing CSV.
    ///
    /// The default is `','`.
    pub fn separator(&mut self, separator: char) -> &mut ReaderBuilder {
        self.separator = separator;
        self
    }

    /// The text qualifier to use when parsing CSV.
    ///
    /// The default is `'"'`.
    pub fn qualifier(&mut self, qualifier: char) -> &mut ReaderBuilder {
        self.qualifier = qualifier;
        self
    }

    /// The text qualification policy.
    ///
    /// When reading, `Always` and `AsNeeded` behave identically:
    /// qualifiers are recognized opportunistically wherever they open a
    /// cell. `None` disables qualifier recognition entirely, and with it
    /// null-marker recognition.
    ///
    /// The default is `Quoting::Always`.
    pub fn quoting(&mut self, quoting: Quoting) -> &mut ReaderBuilder {
        self.quoting = quoting;
        self
    }

    /// The null-marker to recognize when parsing CSV.
    ///
    /// A cell becomes null when its entire *unqualified* content equals
    /// this marker, compared case-sensitively. A qualified cell with the
    /// same text stays a literal string. The marker must not contain the
    /// separator, the qualifier or line breaks.
    ///
    /// By default no marker is recognized.
    pub fn null_value(
        &mut self,
        marker: Option<&str>,
    ) -> &mut ReaderBuilder {
        self.null_value = marker.map(|m| m.to_string());
        self
    }

    /// The encoding of the source stream.
    ///
    /// The default is UTF-8. Malformed sequences are replaced with
    /// U+FFFD; decoding never fails.
    pub fn encoding(
        &mut self,
        encoding: &'static Encoding,
    ) -> &mut ReaderBuilder {
        self.encoding = encoding;
        self
    }

    /// Whether a byte-order mark may override the configured encoding.
    ///
    /// When enabled, a UTF-8 or UTF-16 BOM at the start of the stream
    /// switches the decoder accordingly. When disabled (the default),
    /// only the configured encoding's own BOM is stripped.
    pub fn bom_sniffing(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.bom_sniffing = yes;
        self
    }

    /// The capacity of the transcoding buffer, in bytes.
    ///
    /// The default is 16 KiB. This is a performance knob only; any
    /// non-zero value parses identically.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.buffer_capacity = capacity;
        self
    }

    /// Build a CSV reader from this configuration and an arbitrary
    /// `io::Read`.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Result<Reader<R>> {
        config::validate(
            self.separator,
            self.qualifier,
            self.quoting,
            self.null_value.as_deref(),
            self.buffer_capacity,
        )?;
        Ok(Reader {
            src: DecodingReader::new(
                rdr,
                self.encoding,
                self.bom_sniffing,
                self.buffer_capacity,
            ),
            separator: self.separator,
            qualifier: self.qualifier,
            quoting: self.quoting,
            null_value: self.null_value.clone(),
            peeked: false,
            current: None,
            eof: false,
            row_count: 0,
            line: 1,
            max_cell: 0,
            max_cols: 0,
        })
    }

    /// Build a CSV reader from this configuration for the file at the
    /// given path.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Reader<File>> {
        self.from_reader(File::open(path)?)
    }
}

/// The parser's position within the current row.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// At the start of a cell, where a qualifier may open.
    CellStart,
    /// Inside unqualified content. Qualifier characters are literal here.
    InUnqualifiedCell,
    /// Inside qualified content. Separators and line breaks are literal
    /// here.
    InQualifiedCell,
    /// A qualifier was read while qualification was open. It either
    /// closes the cell's qualification or, when followed by another
    /// qualifier, escapes one literal qualifier character.
    QualifierSeen,
}

/// A streaming CSV reader.
///
/// The reader pulls one logical row at a time from an encoded byte
/// stream. Rows are sequences of nullable string cells and may vary in
/// length; the row sequence is forward-only and non-restartable, apart
/// from the single-row [`peek`](Reader::peek) lookahead.
///
/// The parser never rejects malformed content. Mismatched qualifiers and
/// stray characters always produce *some* deterministic row, because
/// real-world CSV is frequently non-conformant. Only configuration
/// errors at construction time can fail.
///
/// # Example
///
/// ```
/// use uncsv::ReaderBuilder;
///
/// let data = "a,\"b,b\",NULL\n";
/// let mut rdr = ReaderBuilder::new()
///     .null_value(Some("NULL"))
///     .from_reader(data.as_bytes())?;
/// let row = rdr.read()?.unwrap();
/// assert_eq!(row, &[Some("a"), Some("b,b"), None][..]);
/// assert_eq!(rdr.read()?, None);
/// # Ok::<(), uncsv::Error>(())
/// ```
pub struct Reader<R> {
    src: DecodingReader<R>,
    separator: char,
    qualifier: char,
    quoting: Quoting,
    null_value: Option<String>,
    /// When set, `current` holds the row cached by `peek`.
    peeked: bool,
    current: Option<Row>,
    eof: bool,
    row_count: u64,
    line: u64,
    // Largest cell length and cell count seen so far, used to size the
    // buffers of subsequent rows.
    max_cell: usize,
    max_cols: usize,
}

impl Reader<File> {
    /// Create a CSV reader with default settings for the file at the
    /// given path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Reader<File>> {
        ReaderBuilder::new().from_path(path)
    }
}

impl<R: io::Read> Reader<R> {
    /// Create a CSV reader with default settings from an arbitrary
    /// `io::Read`.
    pub fn from_reader(rdr: R) -> Result<Reader<R>> {
        ReaderBuilder::new().from_reader(rdr)
    }

    /// Read the next row, advancing past it.
    ///
    /// Returns `Ok(None)` once the stream is exhausted. A final line
    /// consisting of a single empty unqualified cell (the trailing blank
    /// line most CSV files end with) is not reported as a row.
    pub fn read(&mut self) -> Result<Option<Row>> {
        let row = if self.peeked {
            self.peeked = false;
            self.current.take()
        } else {
            self.parse_row()?
        };
        if row.is_some() {
            self.row_count += 1;
        }
        Ok(row)
    }

    /// Read the next row without consuming it.
    ///
    /// The parsed row is cached; the next call to `read` returns the
    /// cached row instead of re-parsing. Lookahead is limited to a single
    /// row: repeated `peek` calls return the same row.
    pub fn peek(&mut self) -> Result<Option<&Row>> {
        if !self.peeked {
            self.current = self.parse_row()?;
            self.peeked = true;
        }
        Ok(self.current.as_ref())
    }

    /// Returns a borrowing iterator over the remaining rows.
    pub fn rows(&mut self) -> Rows<R> {
        Rows { rdr: self }
    }

    /// Returns an owning iterator over the remaining rows.
    pub fn into_rows(self) -> RowsIntoIter<R> {
        RowsIntoIter { rdr: self }
    }

    /// True once the underlying stream is exhausted and no peeked row is
    /// pending.
    pub fn is_done(&self) -> bool {
        self.eof && !(self.peeked && self.current.is_some())
    }

    /// The number of rows returned by `read` so far.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// The current 1-based line number in the underlying stream, counting
    /// `\r\n`, `\n` and `\r` terminators alike.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Read one raw line without parsing it, advancing past its
    /// terminator.
    ///
    /// Returns the line's text, excluding the terminator, or `Ok(None)`
    /// at end of stream. This reads from the current stream position, so
    /// it must not be mixed with `peek` lookahead.
    pub fn read_raw_line(&mut self) -> Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        let mut text = String::new();
        let mut any = false;
        loop {
            match self.src.next_char()? {
                None => {
                    self.eof = true;
                    break;
                }
                Some('\n') => {
                    self.line += 1;
                    break;
                }
                Some('\r') => {
                    if self.src.peek_char()? == Some('\n') {
                        self.src.next_char()?;
                    }
                    self.line += 1;
                    break;
                }
                Some(c) => {
                    any = true;
                    text.push(c);
                }
            }
        }
        if self.eof && !any {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    /// Parse one row from the stream.
    ///
    /// This is the core state machine. It processes the decoded input one
    /// character at a time with single-character lookahead (used only to
    /// fold CRLF into one terminator) and always terminates with a
    /// deterministic row, no matter how mismatched the qualifiers are.
    fn parse_row(&mut self) -> Result<Option<Row>> {
        if self.eof {
            return Ok(None);
        }
        let mut cells: Vec<Option<String>> = Vec::with_capacity(self.max_cols);
        let mut buf = String::with_capacity(self.max_cell);
        let mut state = State::CellStart;
        // Whether the current cell opened a qualifier, and whether it
        // closed one. An unqualified cell matching the null-marker becomes
        // null; a closed cell never does.
        let mut qualified = false;
        let mut closed = false;

        let at_eof = loop {
            let c = match self.src.next_char()? {
                Some(c) => c,
                None => break true,
            };
            match state {
                State::InQualifiedCell => {
                    if c == self.qualifier {
                        state = State::QualifierSeen;
                    } else {
                        // Separators and line breaks are ordinary content
                        // while qualification is open.
                        if c == '\n' {
                            self.line += 1;
                        }
                        buf.push(c);
                    }
                }
                State::QualifierSeen if c == self.qualifier => {
                    // Escape by doubling: one literal qualifier, and
                    // qualification stays open.
                    buf.push(self.qualifier);
                    state = State::InQualifiedCell;
                }
                _ => {
                    if state == State::QualifierSeen {
                        // The qualifier seen last was a real close.
                        closed = true;
                        state = State::InUnqualifiedCell;
                    }
                    if c == self.separator {
                        self.push_cell(&mut cells, &mut buf, closed);
                        qualified = false;
                        closed = false;
                        state = State::CellStart;
                    } else if c == '\n' {
                        self.line += 1;
                        break false;
                    } else if c == '\r' {
                        // Fold an immediately following LF into this
                        // terminator.
                        if self.src.peek_char()? == Some('\n') {
                            self.src.next_char()?;
                        }
                        self.line += 1;
                        break false;
                    } else if state == State::CellStart
                        && self.quoting.is_enabled()
                        && c == self.qualifier
                    {
                        qualified = true;
                        state = State::InQualifiedCell;
                    } else {
                        buf.push(c);
                        state = State::InUnqualifiedCell;
                    }
                }
            }
        };
        if at_eof {
            self.eof = true;
            // Ignore the last unqualified lonely empty cell of the
            // stream. This is the blank line most CSV files end with.
            if cells.is_empty() && buf.is_empty() && !qualified {
                return Ok(None);
            }
        }
        if state == State::QualifierSeen {
            closed = true;
        }
        self.push_cell(&mut cells, &mut buf, closed);
        if cells.len() > self.max_cols {
            self.max_cols = cells.len();
        }
        Ok(Some(Row::from(cells)))
    }

    /// Finish the current cell: convert to null when appropriate and
    /// reset the cell buffer, keeping its allocation.
    fn push_cell(
        &mut self,
        cells: &mut Vec<Option<String>>,
        buf: &mut String,
        closed: bool,
    ) {
        if buf.len() > self.max_cell {
            self.max_cell = buf.len();
        }
        let is_null = self.quoting.is_enabled()
            && !closed
            && self.null_value.as_deref() == Some(buf.as_str());
        let cell = if is_null { None } else { Some(buf.clone()) };
        cells.push(cell);
        buf.clear();
    }
}

/// A borrowing iterator over the rows of a `Reader`.
pub struct Rows<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
}

impl<'r, R: io::Read> Iterator for Rows<'r, R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        match self.rdr.read() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// An owning iterator over the rows of a `Reader`.
pub struct RowsIntoIter<R> {
    rdr: Reader<R>,
}

impl<R: io::Read> Iterator for RowsIntoIter<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        match self.rdr.read() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
