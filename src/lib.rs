/*!
Streaming CSV reading and writing with minimal allocation.

The reader tokenizes a byte stream into rows of cells through a small
state machine, accumulating all cells of a row in one reused buffer
instead of allocating a string per cell. The writer serializes typed
values into one reused line buffer, quoting a field only when its
content requires it.

# Example

```
use fastcsv::{Reader, Writer};

let mut wtr = Writer::from_writer(vec![]);
wtr.write_text("city");
wtr.write_int(3);
wtr.write_float(1.5);
wtr.finish_line().unwrap();

let data = wtr.into_inner();
assert_eq!(data, b"city,3,1.5\n".to_vec());

let mut rdr = Reader::from_reader(&*data);
assert!(rdr.next_row().unwrap());
assert_eq!(rdr.next_text().unwrap(), "city");
assert_eq!(rdr.next_int().unwrap(), 3);
assert_eq!(rdr.next_float().unwrap(), 1.5);
```
*/

pub use crate::error::{ConvertError, Error, Result, SyntaxError};
pub use crate::reader::Reader;
pub use crate::row::{Row, RowIter};
pub use crate::writer::Writer;

mod error;
mod reader;
mod row;
mod writer;
