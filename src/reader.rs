use std::cmp;
use std::io;

use crate::error::{Error, Result, SyntaxError};
use crate::row::Row;

/// Default capacity of the read buffer.
const DEFAULT_BUFFER_SIZE: usize = 4096;

/// The tokenizer state during a single cell scan.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// Before any cell content. Leading whitespace is skipped here.
    Begin,
    /// Inside an unquoted cell.
    InCell,
    /// Inside a quoted cell.
    InQuote,
    /// Saw a quote inside a quoted cell: either an escaped quote or the
    /// end of the quoted part.
    InQuoteQuote,
    /// After the closing quote, consuming whitespace up to a separator.
    TrailingWhiteSpace,
    /// Saw `\r`; the next byte decides whether it terminated the row.
    PendingCr,
}

/// A streaming reader for comma-delimited rows of cells.
///
/// The reader pulls bytes from an `io::Read` source into a fixed-size
/// internal buffer and tokenizes them one row at a time. All cells of
/// the current row share one accumulation buffer, so reading does not
/// allocate per cell; accessors return slices into that buffer and are
/// invalidated by the next call to `next_row` (the borrow checker
/// enforces this).
///
/// The dialect is lenient CSV: comma-delimited, double-quote-escaped
/// cells, `\n`, `\r\n` or end of input as row terminators. A quote
/// inside an unquoted cell is ordinary data, as is a `\r` not followed
/// by `\n` or a separator. Space and tab around a cell are trimmed in
/// front of any cell and after the closing quote of a quoted one;
/// whitespace inside quotes is preserved.
///
/// Note that a source whose last row is terminated by a line break
/// yields one final row containing a single empty cell, as does an
/// empty source. This mirrors end-of-stream being treated as the end of
/// a (possibly empty) cell.
pub struct Reader<R> {
    rdr: R,
    /// The read buffer; its logical content is `buf[pos..filled]`.
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    /// Cell accumulator and boundary table for the current row.
    row: Row,
    /// Index of the next cell handed out by the sequential accessors.
    cursor: usize,
    /// No more cells in the current row.
    row_done: bool,
    /// The source is exhausted. Sticky once set.
    stream_done: bool,
    /// 1-based line number, incremented on every `\n` seen.
    line: u64,
}

impl<R: io::Read> Reader<R> {
    /// Creates a new reader from an arbitrary `io::Read`.
    pub fn from_reader(rdr: R) -> Reader<R> {
        Reader::with_capacity(DEFAULT_BUFFER_SIZE, rdr)
    }

    /// Creates a new reader with a read buffer of `capacity` bytes.
    ///
    /// The capacity is clamped to at least one byte.
    pub fn with_capacity(capacity: usize, rdr: R) -> Reader<R> {
        Reader {
            rdr: rdr,
            buf: vec![0; cmp::max(1, capacity)],
            pos: 0,
            filled: 0,
            row: Row::new(),
            cursor: 0,
            row_done: false,
            stream_done: false,
            line: 1,
        }
    }

    /// Rebind this reader to a new byte source.
    ///
    /// The read buffer and the row storage keep their allocations, which
    /// amortizes them across many input streams.
    pub fn rebind(&mut self, rdr: R) {
        self.rdr = rdr;
        self.pos = 0;
        self.filled = 0;
        self.row.clear();
        self.cursor = 0;
        self.row_done = false;
        self.stream_done = false;
        self.line = 1;
    }

    /// Returns the current line number.
    ///
    /// Line numbers start at `1`, count occurrences of `\n` and are
    /// reset by `rebind`.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Returns true if and only if the source is exhausted.
    pub fn is_done(&self) -> bool {
        self.stream_done
    }

    /// Scan the next row, replacing the current one.
    ///
    /// Returns `Ok(false)` once the source is exhausted. A syntax error
    /// is local to the row being scanned: the reader stays usable and
    /// the following call starts a fresh row at the current position.
    pub fn next_row(&mut self) -> Result<bool> {
        if self.stream_done {
            return Ok(false);
        }
        self.row.clear();
        self.cursor = 0;
        self.row_done = false;
        while !self.row_done {
            self.scan_cell()?;
        }
        Ok(true)
    }

    /// The current row.
    ///
    /// The borrow is tied to the reader, so any view obtained here must
    /// be dropped before the next `next_row` call.
    pub fn row(&self) -> &Row {
        &self.row
    }

    /// Returns true if the sequential accessors have not yet consumed
    /// every cell of the current row.
    pub fn has_next_cell(&self) -> bool {
        self.cursor < self.row.len()
    }

    /// Return the next cell as raw bytes.
    pub fn next_bytes(&mut self) -> Result<&[u8]> {
        let i = self.advance()?;
        self.row.bytes(i)
    }

    /// Return the next cell as text.
    pub fn next_text(&mut self) -> Result<&str> {
        let i = self.advance()?;
        self.row.text(i)
    }

    /// Return the next cell parsed as an integer.
    pub fn next_int(&mut self) -> Result<i64> {
        let i = self.advance()?;
        self.row.int(i)
    }

    /// Return the next cell parsed as a float.
    pub fn next_float(&mut self) -> Result<f64> {
        let i = self.advance()?;
        self.row.float(i)
    }

    /// Return the next cell parsed as a boolean.
    pub fn next_boolean(&mut self) -> Result<bool> {
        let i = self.advance()?;
        self.row.boolean(i)
    }

    /// The entire current row as owned text cells.
    pub fn text_row(&self) -> Result<Vec<String>> {
        let mut cells = Vec::with_capacity(self.row.len());
        for i in 0..self.row.len() {
            cells.push(self.row.text(i)?.to_string());
        }
        Ok(cells)
    }

    fn advance(&mut self) -> Result<usize> {
        if self.cursor >= self.row.len() {
            return Err(Error::CellOutOfBounds {
                index: self.cursor,
                len: self.row.len(),
            });
        }
        let i = self.cursor;
        self.cursor += 1;
        Ok(i)
    }

    /// Scan one cell into the accumulator.
    ///
    /// Sets `row_done` when the cell ended its row and `stream_done`
    /// when the source is exhausted.
    fn scan_cell(&mut self) -> Result<()> {
        let mut state = State::Begin;
        loop {
            if self.pos >= self.filled {
                self.refill()?;
                if self.filled == 0 {
                    self.row_done = true;
                    self.stream_done = true;
                    if state == State::InQuote {
                        return Err(self.syntax(SyntaxError::UnclosedQuote));
                    }
                    // A pending `\r` acts as the terminator here and is
                    // not part of the cell.
                    self.row.end_cell();
                    return Ok(());
                }
            }
            while self.pos < self.filled {
                let c = self.buf[self.pos];
                self.pos += 1;
                if c == b'\n' {
                    self.line += 1;
                }
                match state {
                    State::Begin => match c {
                        b'"' => state = State::InQuote,
                        b',' => {
                            self.row.end_cell();
                            return Ok(());
                        }
                        b' ' | b'\t' => {}
                        b'\r' => state = State::PendingCr,
                        b'\n' => {
                            self.row_done = true;
                            self.row.end_cell();
                            return Ok(());
                        }
                        _ => {
                            self.row.push_byte(c);
                            state = State::InCell;
                        }
                    },
                    State::InCell => match c {
                        b',' => {
                            self.row.end_cell();
                            return Ok(());
                        }
                        b'\r' => state = State::PendingCr,
                        b'\n' => {
                            self.row_done = true;
                            self.row.end_cell();
                            return Ok(());
                        }
                        // A quote here is data, not syntax.
                        _ => self.row.push_byte(c),
                    },
                    State::InQuote => match c {
                        b'"' => state = State::InQuoteQuote,
                        _ => self.row.push_byte(c),
                    },
                    State::InQuoteQuote => match c {
                        b'"' => {
                            // Doubled quote: one literal quote.
                            self.row.push_byte(b'"');
                            state = State::InQuote;
                        }
                        b',' => {
                            self.row.end_cell();
                            return Ok(());
                        }
                        b' ' | b'\t' => state = State::TrailingWhiteSpace,
                        b'\r' => state = State::PendingCr,
                        b'\n' => {
                            self.row_done = true;
                            self.row.end_cell();
                            return Ok(());
                        }
                        _ => {
                            return Err(
                                self.syntax(SyntaxError::CharAfterQuote(c))
                            );
                        }
                    },
                    State::TrailingWhiteSpace => match c {
                        b',' => {
                            self.row.end_cell();
                            return Ok(());
                        }
                        b' ' | b'\t' => {}
                        b'\r' => state = State::PendingCr,
                        b'\n' => {
                            self.row_done = true;
                            self.row.end_cell();
                            return Ok(());
                        }
                        _ => {
                            return Err(self
                                .syntax(SyntaxError::CharAfterQuotedCell(c)));
                        }
                    },
                    State::PendingCr => match c {
                        b',' => {
                            self.row.push_byte(b'\r');
                            self.row.end_cell();
                            return Ok(());
                        }
                        // `\r\r` keeps one literal `\r` as data and the
                        // newest one pending, which handles `\r\r\n`.
                        b'\r' => self.row.push_byte(b'\r'),
                        b'\n' => {
                            self.row_done = true;
                            self.row.end_cell();
                            return Ok(());
                        }
                        _ => {
                            self.row.push_byte(b'\r');
                            self.row.push_byte(c);
                            state = State::InCell;
                        }
                    },
                }
            }
        }
    }

    /// Request the next chunk from the source into the same storage.
    ///
    /// A zero-length read marks the end of the stream; any read error is
    /// propagated unchanged, without retry.
    fn refill(&mut self) -> Result<()> {
        let n = self.rdr.read(&mut self.buf)?;
        self.pos = 0;
        self.filled = n;
        Ok(())
    }

    fn syntax(&self, err: SyntaxError) -> Error {
        Error::Syntax { line: self.line, err: err }
    }
}
