use std::io;

use bstr::decode_utf8;

use crate::error::Result;

/// A writer for comma-delimited rows of typed values.
///
/// Values are appended one at a time to a line-local buffer, with
/// separators inserted between them and quoting applied only when a
/// field requires it. `finish_line` hands the completed line to the
/// sink in a single write. The line buffer is reused across lines, so
/// writing does not allocate per field once it has grown to the size of
/// the longest line.
///
/// A field is quoted if it contains a comma, quote, carriage return or
/// line feed, or if its first character is whitespace; embedded quotes
/// are doubled. Empty fields are never quoted. Numbers and booleans
/// never need quoting.
pub struct Writer<W> {
    wtr: W,
    /// The serialized current line, separators and quoting included.
    line: Vec<u8>,
    /// Number of fields appended to the current line.
    cells: usize,
    /// Also quote a field exactly equal to `\.`.
    quote_copy_terminator: bool,
}

impl<W: io::Write> Writer<W> {
    /// Creates a new writer that pushes lines to the `io::Write` given.
    ///
    /// Lines are written to the sink as they are finished; no buffering
    /// is added beyond the line itself.
    pub fn from_writer(wtr: W) -> Writer<W> {
        Writer {
            wtr: wtr,
            line: Vec::with_capacity(1024),
            cells: 0,
            quote_copy_terminator: false,
        }
    }

    /// Also quote a field exactly equal to `\.`, the PostgreSQL `COPY`
    /// end-of-data marker.
    ///
    /// Some consumers treat a line consisting of that two-character
    /// sequence as the end of the stream. This is a compatibility rule
    /// on top of the delimited-text grammar and is disabled by default.
    pub fn quote_copy_terminator(mut self, yes: bool) -> Writer<W> {
        self.quote_copy_terminator = yes;
        self
    }

    /// Append a text field, quoting it if necessary.
    pub fn write_text(&mut self, field: &str) {
        self.separator();
        if self.text_needs_quotes(field) {
            self.quote_into(field.as_bytes());
        } else {
            self.line.extend_from_slice(field.as_bytes());
        }
    }

    /// Append a raw byte field, quoting it if necessary.
    ///
    /// The field is treated as string data that happens to be available
    /// as bytes; only its first character is ever decoded (for the
    /// leading-whitespace test).
    pub fn write_bytes(&mut self, field: &[u8]) {
        self.separator();
        if self.bytes_need_quotes(field) {
            self.quote_into(field);
        } else {
            self.line.extend_from_slice(field);
        }
    }

    /// Append an integer field in plain decimal.
    pub fn write_int(&mut self, v: i64) {
        self.separator();
        let mut buf = itoa::Buffer::new();
        self.line.extend_from_slice(buf.format(v).as_bytes());
    }

    /// Append a float field in its shortest round-trippable form.
    ///
    /// Non-finite values are written as `NaN`, `inf` or `-inf`.
    pub fn write_float(&mut self, v: f64) {
        self.separator();
        let mut buf = ryu::Buffer::new();
        self.line.extend_from_slice(buf.format(v).as_bytes());
    }

    /// Append a boolean field as `true` or `false`.
    pub fn write_bool(&mut self, v: bool) {
        self.separator();
        let text: &[u8] = if v { b"true" } else { b"false" };
        self.line.extend_from_slice(text);
    }

    /// Append an intentionally absent value as an empty field.
    pub fn skip(&mut self) {
        self.separator();
    }

    /// Finish the current line and write it to the sink in one call.
    ///
    /// The line buffer and field counter are cleared whether or not the
    /// write succeeds, so a failed flush does not leak stale content
    /// into later lines.
    pub fn finish_line(&mut self) -> Result<()> {
        self.line.push(b'\n');
        let res = self.wtr.write_all(&self.line);
        self.line.clear();
        self.cells = 0;
        res?;
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }

    /// Returns a reference to the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.wtr
    }

    /// Returns a mutable reference to the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.wtr
    }

    /// Unwrap this writer, returning the underlying sink.
    ///
    /// Any unfinished line is discarded.
    pub fn into_inner(self) -> W {
        self.wtr
    }

    fn separator(&mut self) {
        if self.cells > 0 {
            self.line.push(b',');
        }
        self.cells += 1;
    }

    fn text_needs_quotes(&self, field: &str) -> bool {
        if field.is_empty() {
            return false;
        }
        if field.bytes().any(is_special) {
            return true;
        }
        if self.quote_copy_terminator && field == "\\." {
            return true;
        }
        field.chars().next().map_or(false, |c| c.is_whitespace())
    }

    fn bytes_need_quotes(&self, field: &[u8]) -> bool {
        if field.is_empty() {
            return false;
        }
        if field.iter().cloned().any(is_special) {
            return true;
        }
        if self.quote_copy_terminator && field == b"\\." {
            return true;
        }
        // Only the first character matters, so the field is never
        // decoded as a whole. A leading invalid sequence is not
        // whitespace.
        match decode_utf8(field) {
            (Some(first), _) => first.is_whitespace(),
            (None, _) => false,
        }
    }

    /// Append `field` wrapped in quotes, doubling each embedded quote.
    fn quote_into(&mut self, mut field: &[u8]) {
        self.line.push(b'"');
        while let Some(i) = field.iter().position(|&b| b == b'"') {
            self.line.extend_from_slice(&field[..i]);
            self.line.extend_from_slice(b"\"\"");
            field = &field[i + 1..];
        }
        self.line.extend_from_slice(field);
        self.line.push(b'"');
    }
}

fn is_special(b: u8) -> bool {
    match b {
        b',' | b'"' | b'\r' | b'\n' => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use super::Writer;

    fn written<F>(f: F) -> String
    where
        F: FnOnce(&mut Writer<Vec<u8>>),
    {
        let mut wtr = Writer::from_writer(vec![]);
        f(&mut wtr);
        String::from_utf8(wtr.into_inner()).unwrap()
    }

    fn header(wtr: &mut Writer<Vec<u8>>, cells: &[&str]) {
        for cell in cells {
            wtr.write_text(cell);
        }
        wtr.finish_line().unwrap();
    }

    #[test]
    fn basic() {
        let got = written(|w| {
            header(w, &["a", "b", "c", "d", "e", "f"]);
            w.write_int(1);
            w.write_text("hat");
            w.write_bytes(b"abc");
            w.write_float(1.73849);
            w.write_bool(false);
            w.write_bool(true);
            w.finish_line().unwrap();
        });
        assert_eq!(got, "a,b,c,d,e,f\n1,hat,abc,1.73849,false,true\n");
    }

    #[test]
    fn negative_float() {
        let got = written(|w| {
            w.write_float(-1.73849);
            w.finish_line().unwrap();
        });
        assert_eq!(got, "-1.73849\n");
    }

    #[test]
    fn newline_forces_quotes() {
        let got = written(|w| {
            w.write_text("hat\nlemon");
            w.write_bytes(b"ab\nc");
            w.finish_line().unwrap();
        });
        assert_eq!(got, "\"hat\nlemon\",\"ab\nc\"\n");
    }

    #[test]
    fn newline_utf8() {
        let got = written(|w| {
            w.write_text("hat\u{a7}\n\u{a7}lemon");
            w.finish_line().unwrap();
        });
        assert_eq!(got, "\"hat\u{a7}\n\u{a7}lemon\"\n");
    }

    #[test]
    fn comma_forces_quotes() {
        let got = written(|w| {
            w.write_text("hat,lemon");
            w.write_bytes(b"abc,");
            w.finish_line().unwrap();
        });
        assert_eq!(got, "\"hat,lemon\",\"abc,\"\n");
    }

    #[test]
    fn quotes_are_doubled() {
        let got = written(|w| {
            w.write_text("hat\"lemon");
            w.write_bytes(b"abc\"");
            w.finish_line().unwrap();
        });
        assert_eq!(got, "\"hat\"\"lemon\",\"abc\"\"\"\n");
    }

    #[test]
    fn leading_space_forces_quotes() {
        let got = written(|w| {
            w.write_text(" hatlemon");
            w.write_bytes(b" bc");
            w.finish_line().unwrap();
        });
        assert_eq!(got, "\" hatlemon\",\" bc\"\n");
    }

    #[test]
    fn leading_unicode_space_forces_quotes() {
        // U+00A0 NO-BREAK SPACE is whitespace but not ASCII.
        let got = written(|w| {
            w.write_text("\u{a0}hat");
            w.write_bytes("\u{a0}hat".as_bytes());
            w.finish_line().unwrap();
        });
        assert_eq!(got, "\"\u{a0}hat\",\"\u{a0}hat\"\n");
    }

    #[test]
    fn internal_space_stays_bare() {
        let got = written(|w| {
            w.write_text("hat lemon");
            w.finish_line().unwrap();
        });
        assert_eq!(got, "hat lemon\n");
    }

    #[test]
    fn invalid_leading_utf8_is_not_whitespace() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_bytes(b"\xFFhat");
        wtr.finish_line().unwrap();
        assert_eq!(wtr.into_inner(), b"\xFFhat\n".to_vec());
    }

    #[test]
    fn empty_field_is_never_quoted() {
        let got = written(|w| {
            w.write_text("");
            w.write_bytes(b"");
            w.finish_line().unwrap();
        });
        assert_eq!(got, ",\n");
    }

    #[test]
    fn skip_emits_empty_field() {
        let got = written(|w| {
            w.write_int(1);
            w.skip();
            w.write_bytes(b"abc");
            w.finish_line().unwrap();
        });
        assert_eq!(got, "1,,abc\n");
    }

    #[test]
    fn copy_terminator_off_by_default() {
        let got = written(|w| {
            w.write_text("\\.");
            w.write_bytes(b"\\.");
            w.finish_line().unwrap();
        });
        assert_eq!(got, "\\.,\\.\n");
    }

    #[test]
    fn copy_terminator_quotes_when_enabled() {
        let mut wtr = Writer::from_writer(vec![]).quote_copy_terminator(true);
        wtr.write_text("\\.");
        wtr.write_bytes(b"\\.");
        // A field merely containing the sequence is unaffected.
        wtr.write_text("a\\.b");
        wtr.finish_line().unwrap();
        let got = String::from_utf8(wtr.into_inner()).unwrap();
        assert_eq!(got, "\"\\.\",\"\\.\",a\\.b\n");
    }

    #[test]
    fn non_finite_floats() {
        let got = written(|w| {
            w.write_float(f64::NAN);
            w.write_float(f64::INFINITY);
            w.write_float(f64::NEG_INFINITY);
            w.finish_line().unwrap();
        });
        assert_eq!(got, "NaN,inf,-inf\n");
    }

    #[test]
    fn failed_flush_clears_the_line() {
        struct FailOnce {
            failed: bool,
            out: Vec<u8>,
        }
        impl Write for FailOnce {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                if !self.failed {
                    self.failed = true;
                    return Err(io::Error::new(io::ErrorKind::Other, "full"));
                }
                self.out.write(buf)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let sink = FailOnce { failed: false, out: vec![] };
        let mut wtr = Writer::from_writer(sink);
        wtr.write_text("lost");
        assert!(wtr.finish_line().is_err());

        // The failed line must not leak into the next one.
        wtr.write_text("kept");
        wtr.finish_line().unwrap();
        assert_eq!(wtr.get_ref().out, b"kept\n");
    }
}
