use std::fmt;
use std::ops;
use std::str;

use bstr::ByteSlice;

use crate::error::{ConvertError, Error, Result};

/// A single row of cells stored as raw bytes.
///
/// All cells live contiguously in one buffer, and a boundary table with
/// one more entry than there are cells records where each cell starts
/// and ends. Clearing a row truncates the logical contents but keeps the
/// backing storage, so a row reused across scans settles into a steady
/// state with no further allocation.
#[derive(Clone, Eq, PartialEq)]
pub struct Row {
    /// All cells in this row, concatenated without separators.
    cells: Vec<u8>,
    /// Cell `i` occupies `cells[bounds[i]..bounds[i + 1]]`. The first
    /// entry is always `0` and offsets never decrease.
    bounds: Vec<usize>,
}

impl Default for Row {
    fn default() -> Row {
        Row::new()
    }
}

impl Row {
    /// Create a new empty `Row`.
    pub fn new() -> Row {
        Row { cells: Vec::new(), bounds: vec![0] }
    }

    /// Create a new empty `Row` with room for `bytes` of cell data and
    /// `cells` cells.
    pub fn with_capacity(bytes: usize, cells: usize) -> Row {
        let mut bounds = Vec::with_capacity(cells + 1);
        bounds.push(0);
        Row { cells: Vec::with_capacity(bytes), bounds: bounds }
    }

    /// Returns the number of cells in this row.
    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Returns true if and only if this row has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear this row so that it has zero cells.
    ///
    /// The backing storage is kept.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.bounds.truncate(1);
    }

    /// Return the raw bytes of the cell at index `i`.
    ///
    /// If no cell at index `i` exists, then this returns `None`.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        let start = *self.bounds.get(i)?;
        let end = *self.bounds.get(i + 1)?;
        Some(&self.cells[start..end])
    }

    /// Returns an iterator over all cells in this row.
    pub fn iter(&self) -> RowIter {
        RowIter { row: self, i: 0 }
    }

    /// Return the cell at index `i` as raw bytes.
    ///
    /// Unlike `get`, an index past the last cell is a usage error.
    pub fn bytes(&self, i: usize) -> Result<&[u8]> {
        self.get(i)
            .ok_or(Error::CellOutOfBounds { index: i, len: self.len() })
    }

    /// Return the cell at index `i` as text.
    ///
    /// A cell that is not valid UTF-8 is a conversion error.
    pub fn text(&self, i: usize) -> Result<&str> {
        let field = self.bytes(i)?;
        str::from_utf8(field)
            .map_err(|_| Error::Convert(ConvertError::new(field, "string")))
    }

    /// Return the cell at index `i` parsed as an integer.
    pub fn int(&self, i: usize) -> Result<i64> {
        self.parse(i, "integer")
    }

    /// Return the cell at index `i` parsed as a float.
    pub fn float(&self, i: usize) -> Result<f64> {
        self.parse(i, "float")
    }

    /// Return the cell at index `i` parsed as a boolean.
    ///
    /// Only the literal cells `true` and `false` parse.
    pub fn boolean(&self, i: usize) -> Result<bool> {
        self.parse(i, "boolean")
    }

    fn parse<T: str::FromStr>(
        &self,
        i: usize,
        target: &'static str,
    ) -> Result<T> {
        let field = self.bytes(i)?;
        str::from_utf8(field)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Convert(ConvertError::new(field, target)))
    }

    /// Add one byte to the cell currently being accumulated.
    pub(crate) fn push_byte(&mut self, b: u8) {
        self.cells.push(b);
    }

    /// Terminate the cell currently being accumulated.
    pub(crate) fn end_cell(&mut self) {
        self.bounds.push(self.cells.len());
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|cell| cell.as_bstr())).finish()
    }
}

impl ops::Index<usize> for Row {
    type Output = [u8];
    fn index(&self, i: usize) -> &[u8] {
        self.get(i).unwrap()
    }
}

impl<'a> IntoIterator for &'a Row {
    type IntoIter = RowIter<'a>;
    type Item = &'a [u8];
    fn into_iter(self) -> RowIter<'a> {
        self.iter()
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for Row {
    fn eq(&self, other: &Vec<T>) -> bool {
        iter_eq(self, other)
    }
}

impl<T: AsRef<[u8]>> PartialEq<[T]> for Row {
    fn eq(&self, other: &[T]) -> bool {
        iter_eq(self, other)
    }
}

fn iter_eq<T: AsRef<[u8]>>(row: &Row, other: &[T]) -> bool {
    row.len() == other.len()
        && row.iter().zip(other).all(|(a, b)| a == b.as_ref())
}

/// An iterator over the cells in a row.
pub struct RowIter<'a> {
    row: &'a Row,
    i: usize,
}

impl<'a> Iterator for RowIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let cell = self.row.get(self.i)?;
        self.i += 1;
        Some(cell)
    }
}
