use std::ascii;
use std::error;
use std::fmt;
use std::io;
use std::result;

/// A type alias for `Result<T, fastcsv::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when reading or writing delimited data.
#[derive(Debug)]
pub enum Error {
    /// An I/O error from the underlying byte source or sink.
    ///
    /// These are propagated unchanged and are never retried internally.
    /// Unlike the other kinds below, an I/O error may leave the stream
    /// unusable.
    Io(io::Error),
    /// Malformed quoting, or end of input inside a quoted cell.
    Syntax {
        /// The line on which the error was observed. Lines are counted
        /// from 1 by occurrences of `\n`.
        line: u64,
        /// What exactly was malformed.
        err: SyntaxError,
    },
    /// A cell's bytes did not parse as the requested type.
    Convert(ConvertError),
    /// A cell was requested at an index the current row does not have.
    ///
    /// This is a usage error, not a parse error. It covers by-position
    /// access past the last cell, sequential pulls after the row is
    /// exhausted and access before any row has been scanned (in which
    /// case `len` is `0`).
    CellOutOfBounds {
        /// The requested cell index.
        index: usize,
        /// The number of cells in the current row.
        len: usize,
    },
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::Syntax { line, ref err } => {
                write!(f, "CSV parse error: line {}: {}", line, err)
            }
            Error::Convert(ref err) => {
                write!(f, "CSV conversion error: {}", err)
            }
            Error::CellOutOfBounds { index, len } => {
                write!(
                    f,
                    "CSV usage error: cell index {} out of bounds \
                     for a row of {} cells",
                    index, len
                )
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Syntax { ref err, .. } => Some(err),
            Error::Convert(ref err) => Some(err),
            Error::CellOutOfBounds { .. } => None,
        }
    }
}

/// The ways in which quoting can be malformed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyntaxError {
    /// The input ended inside a quoted cell.
    UnclosedQuote,
    /// A byte other than a separator or whitespace immediately followed
    /// a closing quote.
    CharAfterQuote(u8),
    /// A byte other than a separator appeared while whitespace after a
    /// quoted cell was being consumed.
    CharAfterQuotedCell(u8),
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SyntaxError::UnclosedQuote => {
                write!(f, "unexpected end of input inside quoted cell")
            }
            SyntaxError::CharAfterQuote(b) => {
                write!(
                    f,
                    "unexpected character '{}' after closing quote",
                    ascii::escape_default(b)
                )
            }
            SyntaxError::CharAfterQuotedCell(b) => {
                write!(
                    f,
                    "unexpected character '{}' after quoted cell",
                    ascii::escape_default(b)
                )
            }
        }
    }
}

impl error::Error for SyntaxError {}

/// An error converting a cell to a typed value.
///
/// The error carries the offending cell text (decoded lossily if it was
/// not valid UTF-8) and the name of the requested type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConvertError {
    text: String,
    target: &'static str,
}

impl ConvertError {
    pub(crate) fn new(field: &[u8], target: &'static str) -> ConvertError {
        ConvertError {
            text: String::from_utf8_lossy(field).into_owned(),
            target: target,
        }
    }

    /// The text of the cell that failed to convert.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The name of the type the cell was requested as.
    pub fn target(&self) -> &'static str {
        self.target
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "cannot convert '{}' to {}", self.text, self.target)
    }
}

impl error::Error for ConvertError {}
