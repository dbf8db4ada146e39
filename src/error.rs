use std::error;
use std::fmt;
use std::io;
use std::result;

/// A type alias for `Result<T, uncsv::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when reading or writing CSV data.
///
/// Note that malformed CSV content is never an error. The parser always
/// finds *a* parse for any input, so the only failure modes are I/O errors
/// from the underlying stream and invalid configuration detected when a
/// builder is consumed.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading from or writing to the
    /// underlying stream.
    Io(io::Error),
    /// A configuration error detected when building a reader or writer.
    ///
    /// This occurs when the separator, qualifier and null-marker are not
    /// mutually compatible (e.g., the null-marker contains the separator)
    /// or when a buffer capacity is zero.
    Config(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Config(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::Config(ref msg) => {
                write!(f, "CSV configuration error: {}", msg)
            }
        }
    }
}

impl Error {
    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        match *self {
            Error::Io(_) => true,
            _ => false,
        }
    }
}
