/*!
Streaming CSV reading and writing with nullable cells.

This crate provides a row-oriented CSV reader and writer whose cells are
nullable strings. A configurable null-marker distinguishes null cells
from empty ones: an *unqualified* cell whose entire content equals the
marker reads back as null, while a qualified (quoted) cell with the same
text stays a literal string. The writer applies the symmetric encoding
rules, so rows round-trip exactly.

The parser is deliberately tolerant. Real-world CSV is frequently
non-conformant, so mismatched qualifiers and stray characters are never
an error: the reader always finds *a* deterministic parse. `\r\n`, `\n`
and `\r` are all accepted as row terminators, rows may vary in length,
and the trailing blank line most files end with is suppressed.

# Example

```
use uncsv::{Quoting, ReaderBuilder, WriterBuilder};

let data = "1,2,3,NULL\naa,\"b,b\",\"NULL\",cc\n,,,\n";

let mut rdr = ReaderBuilder::new()
    .quoting(Quoting::AsNeeded)
    .null_value(Some("NULL"))
    .from_reader(data.as_bytes())?;

let mut builder = WriterBuilder::new();
builder.quoting(Quoting::AsNeeded).null_value("NULL");
let mut wtr = builder.from_writer(Vec::new())?;

while let Some(row) = rdr.read()? {
    wtr.write_row(&row)?;
}
# Ok::<(), uncsv::Error>(())
```

# Encodings

Byte streams are decoded and encoded through
[`encoding_rs`](https://docs.rs/encoding-rs), re-exported as
`uncsv::encoding_rs`. The default is UTF-8; any encoding from the
Encoding Standard can be configured, and the reader can optionally sniff
a byte-order mark. Decoding never fails: malformed sequences become
U+FFFD.

# Crate features

* `serde` (enabled by default) provides `Serialize` and `Deserialize`
  for [`Row`] as a sequence of nullable strings.
*/

#![deny(missing_docs)]

pub use crate::config::{NewLine, Quoting};
pub use crate::error::{Error, Result};
pub use crate::reader::{Reader, ReaderBuilder, Rows, RowsIntoIter};
pub use crate::row::{Row, RowIntoIter, RowIter};
pub use crate::table::{Table, TableBuilder};
pub use crate::writer::{Writer, WriterBuilder};

pub use encoding_rs;

mod config;
mod error;
mod reader;
mod row;
mod table;
mod transcode;
mod writer;
