//! The parser: scanner primitives, scalar recognizers, the value extractor,
//! and the document assembler, all driving a cursor over the input bytes.

#[cfg(test)]
#[path = "./parser_tests.rs"]
mod tests;

use crate::{
    Span,
    array::Array,
    error::{Error, ErrorKind},
    table::Table,
    time::DateTime,
    value::{Key, Value},
};
use std::collections::hash_map::Entry;

/// Nesting limit for arrays and inline tables.
const MAX_RECURSION_DEPTH: i16 = 128;

/// Tables with at least this many entries are tracked in the hash index;
/// smaller ones use a linear scan.
const INDEXED_TABLE_THRESHOLD: usize = 8;

/// Marker for "the error details are already in the parser state".
#[derive(Copy, Clone)]
struct ParseError;

struct Parser<'s> {
    src: &'s str,
    bytes: &'s [u8],
    cursor: usize,

    // Error context, populated just before returning ParseError.
    error_span: Span,
    error_kind: Option<ErrorKind>,

    /// Source of per-table discriminators for the duplicate-key index.
    table_ids: u32,
    /// Maps (table id, key name) to the entry index within that table.
    /// Only tables past [`INDEXED_TABLE_THRESHOLD`] live here.
    index: foldhash::HashMap<(u32, String), usize>,
}

impl<'s> Parser<'s> {
    fn new(input: &'s str) -> Self {
        Parser {
            src: input,
            bytes: input.as_bytes(),
            cursor: 0,
            error_span: Span::new(0, 0),
            error_kind: None,
            table_ids: 0,
            index: foldhash::HashMap::default(),
        }
    }

    fn alloc_table_id(&mut self) -> u32 {
        let id = self.table_ids;
        self.table_ids += 1;
        id
    }

    #[cold]
    fn set_error(&mut self, start: usize, end: Option<usize>, kind: ErrorKind) -> ParseError {
        self.error_span = Span::new(start as u32, end.unwrap_or(start + 1) as u32);
        self.error_kind = Some(kind);
        ParseError
    }

    #[cold]
    fn set_error_span(&mut self, span: Span, kind: ErrorKind) -> ParseError {
        self.error_span = span;
        self.error_kind = Some(kind);
        ParseError
    }

    #[cold]
    fn set_duplicate_key_error(&mut self, first: Span, second: Span, key: &str) -> ParseError {
        self.error_span = second;
        self.error_kind = Some(ErrorKind::DuplicateKey {
            key: key.into(),
            first,
        });
        ParseError
    }

    fn take_error(&mut self) -> Error {
        let kind = self
            .error_kind
            .take()
            .expect("take_error called without error");
        Error {
            kind,
            span: self.error_span,
            line_info: None,
        }
    }

    // ── scanner primitives ──────────────────────────────────────────

    #[inline]
    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.cursor).copied()
    }

    #[inline]
    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.cursor + offset).copied()
    }

    #[inline]
    fn eat_byte(&mut self, b: u8) -> bool {
        if self.peek_byte() == Some(b) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect_byte(&mut self, b: u8) -> Result<(), ParseError> {
        if self.eat_byte(b) {
            Ok(())
        } else {
            let start = self.cursor;
            let (found, end) = self.scan_token_desc_and_end();
            Err(self.set_error(
                start,
                Some(end),
                ErrorKind::Wanted {
                    expected: describe_byte(b),
                    found,
                },
            ))
        }
    }

    fn eat_whitespace(&mut self) {
        while let Some(b' ' | b'\t') = self.peek_byte() {
            self.cursor += 1;
        }
    }

    fn eat_newline(&mut self) -> bool {
        match self.peek_byte() {
            Some(b'\n') => {
                self.cursor += 1;
                true
            }
            Some(b'\r') if self.peek_byte_at(1) == Some(b'\n') => {
                self.cursor += 2;
                true
            }
            _ => false,
        }
    }

    fn eat_newline_or_eof(&mut self) -> Result<(), ParseError> {
        if self.peek_byte().is_none() || self.eat_newline() {
            Ok(())
        } else {
            let start = self.cursor;
            let (found, end) = self.scan_token_desc_and_end();
            Err(self.set_error(
                start,
                Some(end),
                ErrorKind::Wanted {
                    expected: "a newline",
                    found,
                },
            ))
        }
    }

    /// Consumes a `#` comment through its terminating newline (or EOF).
    /// Returns `false` when the cursor is not at a comment.
    fn eat_comment(&mut self) -> Result<bool, ParseError> {
        if !self.eat_byte(b'#') {
            return Ok(false);
        }
        // Tab and printable or non-ASCII bytes only; other control
        // characters may not appear in a comment.
        while let Some(0x09 | 0x20..=0x7E | 0x80..) = self.peek_byte() {
            self.cursor += 1;
        }
        match self.peek_byte() {
            None | Some(b'\n') => {}
            Some(b'\r') if self.peek_byte_at(1) == Some(b'\n') => {}
            Some(_) => {
                let c = self.char_at_cursor();
                return Err(self.set_error(self.cursor, None, ErrorKind::InvalidCharInComment(c)));
            }
        }
        self.eat_newline_or_eof().map(|()| true)
    }

    /// Skips whitespace, newlines, and comments. Used between array
    /// elements, where all three are permitted.
    fn eat_void(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek_byte() {
                Some(b' ' | b'\t' | b'\n') => self.cursor += 1,
                Some(b'\r') if self.peek_byte_at(1) == Some(b'\n') => self.cursor += 2,
                Some(b'#') => {
                    self.eat_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Skips whitespace inside an inline table, where a newline is a hard
    /// error rather than a separator.
    fn eat_inline_whitespace(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek_byte() {
                Some(b' ' | b'\t') => self.cursor += 1,
                Some(b'\n') => {
                    return Err(self.set_error(
                        self.cursor,
                        None,
                        ErrorKind::NewlineInInlineTable,
                    ));
                }
                Some(b'\r') if self.peek_byte_at(1) == Some(b'\n') => {
                    return Err(self.set_error(
                        self.cursor,
                        None,
                        ErrorKind::NewlineInInlineTable,
                    ));
                }
                _ => return Ok(()),
            }
        }
    }

    fn char_at_cursor(&self) -> char {
        self.src
            .get(self.cursor..)
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// Describes the "token" at the cursor and where it ends, for
    /// `expected X, found Y` errors.
    fn scan_token_desc_and_end(&self) -> (&'static str, usize) {
        let Some(b) = self.peek_byte() else {
            return ("eof", self.bytes.len());
        };
        match b {
            b'\n' => ("a newline", self.cursor + 1),
            b'\r' => ("a carriage return", self.cursor + 1),
            b' ' | b'\t' => {
                let mut end = self.cursor + 1;
                while let Some(b' ' | b'\t') = self.bytes.get(end).copied() {
                    end += 1;
                }
                ("whitespace", end)
            }
            b'#' => ("a comment", self.cursor + 1),
            b'\'' | b'"' => ("a string", self.cursor + 1),
            _ if is_keylike_byte(b) => {
                let mut end = self.cursor + 1;
                while end < self.bytes.len() && is_keylike_byte(self.bytes[end]) {
                    end += 1;
                }
                ("an identifier", end)
            }
            _ => (
                describe_byte(b),
                self.cursor + self.char_at_cursor().len_utf8(),
            ),
        }
    }

    // ── keys ────────────────────────────────────────────────────────

    fn read_keylike(&mut self) -> &'s str {
        let start = self.cursor;
        while self.peek_byte().is_some_and(is_keylike_byte) {
            self.cursor += 1;
        }
        let src: &'s str = self.src;
        &src[start..self.cursor]
    }

    /// A single key part: bare, or a single-line quoted string.
    fn read_table_key(&mut self) -> Result<Key, ParseError> {
        match self.peek_byte() {
            None => Err(self.set_error(
                self.bytes.len(),
                None,
                ErrorKind::Wanted {
                    expected: "a table key",
                    found: "eof",
                },
            )),
            Some(q @ (b'"' | b'\'')) => {
                let start = self.cursor;
                self.cursor += 1;
                let (name, span, multiline) = self.read_string(start, q)?;
                if multiline {
                    return Err(self.set_error(
                        start,
                        Some(span.end as usize),
                        ErrorKind::MultilineStringKey,
                    ));
                }
                Ok(Key { name, span })
            }
            Some(b) if is_keylike_byte(b) => {
                let start = self.cursor;
                let name = self.read_keylike().to_string();
                Ok(Key {
                    name,
                    span: Span::new(start as u32, self.cursor as u32),
                })
            }
            Some(_) => {
                let start = self.cursor;
                let (found, end) = self.scan_token_desc_and_end();
                Err(self.set_error(
                    start,
                    Some(end),
                    ErrorKind::Wanted {
                        expected: "a table key",
                        found,
                    },
                ))
            }
        }
    }

    // ── strings ─────────────────────────────────────────────────────

    /// Reads a string whose opening delimiter sits at `start`; the cursor is
    /// just past it. Detects the triple-delimiter multi-line form. Returns
    /// the unescaped content, its span, and whether it was multi-line.
    fn read_string(&mut self, start: usize, delim: u8) -> Result<(String, Span, bool), ParseError> {
        let mut multiline = false;
        if self.eat_byte(delim) {
            if self.eat_byte(delim) {
                multiline = true;
            } else {
                let at = (start + 1) as u32;
                return Ok((String::new(), Span::new(at, at), false));
            }
        }

        let mut content_start = self.cursor;
        if multiline {
            // A newline immediately after the opening delimiter is stripped.
            if self.eat_newline() {
                content_start = self.cursor;
            }
        }

        let mut buf = String::new();
        let mut flush_from = content_start;
        loop {
            let i = self.cursor;
            let Some(&b) = self.bytes.get(i) else {
                return Err(self.set_error(start, None, ErrorKind::UnterminatedString));
            };
            self.cursor = i + 1;

            match b {
                b'\r' => {
                    if !self.eat_byte(b'\n') {
                        return Err(self.set_error(i, None, ErrorKind::InvalidCharInString('\r')));
                    }
                    if !multiline {
                        return Err(self.set_error(i, None, ErrorKind::InvalidCharInString('\n')));
                    }
                }
                b'\n' => {
                    if !multiline {
                        return Err(self.set_error(i, None, ErrorKind::InvalidCharInString('\n')));
                    }
                }
                d if d == delim => {
                    let (span, end) = if multiline {
                        if !self.eat_byte(delim) {
                            continue;
                        }
                        if !self.eat_byte(delim) {
                            continue;
                        }
                        // The first run of three delimiters closes the
                        // string; up to two more belong to the content. A
                        // sixth is left in the stream and rejected by the
                        // caller's newline check.
                        let mut extra = 0;
                        if self.eat_byte(delim) {
                            extra += 1;
                        }
                        if self.eat_byte(delim) {
                            extra += 1;
                        }
                        let end = i + extra;
                        (Span::new(content_start as u32, end as u32), end)
                    } else {
                        (Span::new((start + 1) as u32, i as u32), i)
                    };

                    let content = if buf.is_empty() && flush_from == content_start {
                        self.src[content_start..end].to_string()
                    } else {
                        buf.push_str(&self.src[flush_from..end]);
                        buf
                    };
                    return Ok((content, span, multiline));
                }
                b'\\' if delim == b'"' => {
                    buf.push_str(&self.src[flush_from..i]);
                    self.read_basic_escape(&mut buf, start, multiline)?;
                    flush_from = self.cursor;
                }
                0x09 | 0x20..=0x7E | 0x80.. => {}
                _ => {
                    return Err(self.set_error(i, None, ErrorKind::InvalidCharInString(b as char)));
                }
            }
        }
    }

    fn read_basic_escape(
        &mut self,
        buf: &mut String,
        string_start: usize,
        multi: bool,
    ) -> Result<(), ParseError> {
        let i = self.cursor;
        let Some(&b) = self.bytes.get(i) else {
            return Err(self.set_error(string_start, None, ErrorKind::UnterminatedString));
        };
        self.cursor = i + 1;
        match b {
            b'"' => buf.push('"'),
            b'\\' => buf.push('\\'),
            b'b' => buf.push('\u{8}'),
            b'f' => buf.push('\u{c}'),
            b'n' => buf.push('\n'),
            b'r' => buf.push('\r'),
            b't' => buf.push('\t'),
            b'u' => buf.push(self.read_hex(4, string_start, i)?),
            b'U' => buf.push(self.read_hex(8, string_start, i)?),
            b' ' | b'\t' | b'\n' | b'\r' if multi => self.line_ending_escape(b, i)?,
            _ => {
                self.cursor = i;
                let c = self.char_at_cursor();
                return Err(self.set_error(i, None, ErrorKind::InvalidEscape(c)));
            }
        }
        Ok(())
    }

    /// A backslash followed by whitespace that includes a newline consumes
    /// all whitespace up to the next non-whitespace character.
    fn line_ending_escape(&mut self, first: u8, at: usize) -> Result<(), ParseError> {
        let on_newline = match first {
            b'\n' => true,
            b'\r' => {
                if !self.eat_byte(b'\n') {
                    return Err(self.set_error(at, None, ErrorKind::InvalidCharInString('\r')));
                }
                true
            }
            _ => false,
        };
        if !on_newline {
            // Trailing spaces and tabs after the backslash must reach a
            // newline before any other character.
            loop {
                match self.peek_byte() {
                    Some(b' ' | b'\t') => self.cursor += 1,
                    Some(b'\n') => {
                        self.cursor += 1;
                        break;
                    }
                    Some(b'\r') if self.peek_byte_at(1) == Some(b'\n') => {
                        self.cursor += 2;
                        break;
                    }
                    _ => {
                        return Err(self.set_error(
                            at,
                            None,
                            ErrorKind::InvalidEscape(first as char),
                        ));
                    }
                }
            }
        }
        loop {
            match self.peek_byte() {
                Some(b' ' | b'\t' | b'\n') => self.cursor += 1,
                Some(b'\r') if self.peek_byte_at(1) == Some(b'\n') => self.cursor += 2,
                _ => return Ok(()),
            }
        }
    }

    fn read_hex(
        &mut self,
        n: usize,
        string_start: usize,
        escape_start: usize,
    ) -> Result<char, ParseError> {
        let mut val: u32 = 0;
        for _ in 0..n {
            let Some(&byte) = self.bytes.get(self.cursor) else {
                return Err(self.set_error(string_start, None, ErrorKind::UnterminatedString));
            };
            let Some(digit) = (byte as char).to_digit(16) else {
                let c = self.char_at_cursor();
                return Err(self.set_error(self.cursor, None, ErrorKind::InvalidHexEscape(c)));
            };
            val = (val << 4) | digit;
            self.cursor += 1;
        }
        // from_u32 rejects surrogates and values past the last code point.
        match char::from_u32(val) {
            Some(ch) => Ok(ch),
            None => Err(self.set_error(
                escape_start,
                Some(escape_start + n + 1),
                ErrorKind::InvalidEscapeValue(val),
            )),
        }
    }

    // ── numbers and date-times ──────────────────────────────────────

    #[cold]
    fn invalid_number(&mut self, at: usize) -> ParseError {
        self.set_error(at, Some(self.cursor.max(at + 1)), ErrorKind::InvalidNumber)
    }

    /// Classifies a keylike token that starts with a digit: a base-prefixed
    /// or decimal integer, a float, or a date-time. `at` is the offset of
    /// the token's sign, if any, otherwise its first digit.
    fn number(
        &mut self,
        at: usize,
        token: &'s str,
        explicit_sign: bool,
        negative: bool,
    ) -> Result<Value, ParseError> {
        let span = Span::new(at as u32, self.cursor as u32);

        // Base-prefixed integers. TOML forbids signs on these, so only
        // match when the token is the whole value.
        if !explicit_sign
            && let [b'0', format, rest @ ..] = token.as_bytes()
        {
            match format {
                b'x' => return self.integer_radix(rest, span, 16),
                b'o' => return self.integer_radix(rest, span, 8),
                b'b' => return self.integer_radix(rest, span, 2),
                _ => {}
            }
        }

        // A dot right after the token begins the fractional part of a
        // float ('.' is not keylike, so it ended the token scan).
        if self.eat_byte(b'.') {
            return match self.peek_byte() {
                Some(b) if is_keylike_byte(b) => {
                    let fraction = self.read_keylike();
                    let f = self.float(at, token, Some(fraction), negative)?;
                    Ok(Value::Float(f))
                }
                _ => Err(self.invalid_number(at)),
            };
        }

        // Date-times are scanned from the raw bytes because ':' is not a
        // keylike byte and never made it into the token.
        if !explicit_sign {
            let head = &self.bytes[at..];
            let temporal = matches!(head, [a, b, b':', ..] if a.is_ascii_digit() && b.is_ascii_digit())
                || matches!(head, [_, _, _, _, b'-', _, _, b'-', ..]);
            if temporal {
                let Some((consumed, value)) = DateTime::scan(head) else {
                    return Err(self.set_error(at, Some(self.cursor), ErrorKind::InvalidDateTime));
                };
                self.cursor = at + consumed;
                return Ok(Value::DateTime(value));
            }
        }

        match self.integer_decimal(token.as_bytes(), span, negative) {
            Ok(v) => Ok(v),
            Err(e) => {
                // A decimal-looking token with an exponent marker is a float.
                if token.bytes().any(|b| b == b'e' || b == b'E') {
                    let f = self.float(at, token, None, negative)?;
                    return Ok(Value::Float(f));
                }
                Err(e)
            }
        }
    }

    fn integer_decimal(
        &mut self,
        bytes: &[u8],
        span: Span,
        negative: bool,
    ) -> Result<Value, ParseError> {
        let mut acc: u64 = 0;
        let mut has_digit = false;
        let mut prev_underscore = false;
        let mut leading_zero = false;
        for &b in bytes {
            if b == b'_' {
                if !has_digit || prev_underscore {
                    return Err(self.set_error_span(span, ErrorKind::InvalidNumber));
                }
                prev_underscore = true;
                continue;
            }
            if !b.is_ascii_digit() || leading_zero {
                return Err(self.set_error_span(span, ErrorKind::InvalidNumber));
            }
            if !has_digit && b == b'0' {
                leading_zero = true;
            }
            has_digit = true;
            prev_underscore = false;
            acc = match acc
                .checked_mul(10)
                .and_then(|a| a.checked_add((b - b'0') as u64))
            {
                Some(v) => v,
                None => return Err(self.set_error_span(span, ErrorKind::IntegerOutOfRange)),
            };
        }
        if !has_digit || prev_underscore {
            return Err(self.set_error_span(span, ErrorKind::InvalidNumber));
        }
        let max = i64::MAX as u64 + negative as u64;
        if acc > max {
            return Err(self.set_error_span(span, ErrorKind::IntegerOutOfRange));
        }
        let value = if negative {
            (acc as i64).wrapping_neg()
        } else {
            acc as i64
        };
        Ok(Value::Integer(value))
    }

    /// Hex, octal, and binary integers share one loop; `bytes` is the part
    /// after the `0x`/`0o`/`0b` prefix.
    fn integer_radix(&mut self, bytes: &[u8], span: Span, radix: u32) -> Result<Value, ParseError> {
        let mut acc: u64 = 0;
        let mut has_digit = false;
        let mut prev_underscore = false;
        for &b in bytes {
            if b == b'_' {
                if !has_digit || prev_underscore {
                    return Err(self.set_error_span(span, ErrorKind::InvalidNumber));
                }
                prev_underscore = true;
                continue;
            }
            let Some(digit) = (b as char).to_digit(radix) else {
                return Err(self.set_error_span(span, ErrorKind::InvalidNumber));
            };
            has_digit = true;
            prev_underscore = false;
            acc = match acc
                .checked_mul(radix as u64)
                .and_then(|a| a.checked_add(digit as u64))
            {
                Some(v) => v,
                None => return Err(self.set_error_span(span, ErrorKind::IntegerOutOfRange)),
            };
        }
        if !has_digit || prev_underscore {
            return Err(self.set_error_span(span, ErrorKind::InvalidNumber));
        }
        if acc > i64::MAX as u64 {
            return Err(self.set_error_span(span, ErrorKind::IntegerOutOfRange));
        }
        Ok(Value::Integer(acc as i64))
    }

    fn float(
        &mut self,
        at: usize,
        whole: &str,
        fraction: Option<&'s str>,
        negative: bool,
    ) -> Result<f64, ParseError> {
        // No leading zeros in the integer part (00.5, -01.0).
        if let [b'0', b'0'..=b'9' | b'_', ..] = whole.as_bytes() {
            return Err(self.invalid_number(at));
        }

        let mut text = String::new();
        if negative {
            text.push('-');
        }
        if !push_stripped(&mut text, whole) {
            return Err(self.invalid_number(at));
        }

        let mut last = whole;
        if let Some(fraction) = fraction {
            if !matches!(fraction.as_bytes().first(), Some(b'0'..=b'9')) {
                return Err(self.invalid_number(at));
            }
            text.push('.');
            if !push_stripped(&mut text, fraction) {
                return Err(self.invalid_number(at));
            }
            last = fraction;
        }

        // When the token ends in e/E, a '+' and the exponent digits arrive
        // as separate tokens ('-' is keylike, so "1e-5" stays whole).
        if matches!(last.as_bytes().last(), Some(b'e' | b'E')) {
            self.eat_byte(b'+');
            match self.peek_byte() {
                Some(b) if is_keylike_byte(b) && b != b'-' => {
                    let exponent = self.read_keylike();
                    if !push_stripped(&mut text, exponent) {
                        return Err(self.invalid_number(at));
                    }
                }
                _ => return Err(self.invalid_number(at)),
            }
        }

        match text.parse::<f64>() {
            // -0.0 compares equal to 0.0; TOML treats them as the same
            // value, so negative zero normalizes to positive.
            Ok(n) if n == 0.0 => Ok(0.0),
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(self.invalid_number(at)),
        }
    }

    // ── values ──────────────────────────────────────────────────────

    /// Parses the value at the cursor, dispatching on its first byte.
    fn value(&mut self, depth_remaining: i16) -> Result<Value, ParseError> {
        let at = self.cursor;
        let Some(byte) = self.peek_byte() else {
            return Err(self.set_error(self.bytes.len(), None, ErrorKind::UnexpectedEof));
        };
        match byte {
            b'"' | b'\'' => {
                self.cursor += 1;
                let (content, _, _) = self.read_string(at, byte)?;
                return Ok(Value::String(content));
            }
            b'{' => {
                self.cursor += 1;
                let mut table = Table::with_id(self.alloc_table_id());
                self.inline_table_contents(&mut table, depth_remaining - 1)?;
                table.set_frozen();
                return Ok(Value::Table(table));
            }
            b'[' => {
                self.cursor += 1;
                let mut array = Array::new();
                self.array_contents(&mut array, depth_remaining - 1)?;
                return Ok(Value::Array(array));
            }
            _ => {}
        }

        let negative = byte == b'-';
        let explicit_sign = negative || byte == b'+';
        if explicit_sign {
            self.cursor += 1;
        }
        let token = self.read_keylike();

        match token {
            "true" if !explicit_sign => return Ok(Value::Boolean(true)),
            "false" if !explicit_sign => return Ok(Value::Boolean(false)),
            "inf" => {
                return Ok(Value::Float(if negative {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                }));
            }
            "nan" => return Ok(Value::Float(f64::NAN)),
            _ => {}
        }

        if token.as_bytes().first().is_some_and(u8::is_ascii_digit) {
            self.number(at, token, explicit_sign, negative)
        } else if byte == b'\r' {
            Err(self.set_error(at, None, ErrorKind::Unexpected('\r')))
        } else if token.as_bytes().first().is_some_and(u8::is_ascii_alphabetic) {
            Err(self.set_error(at, Some(self.cursor), ErrorKind::UnquotedString))
        } else {
            self.cursor = at;
            let (found, end) = self.scan_token_desc_and_end();
            Err(self.set_error(
                at,
                Some(end),
                ErrorKind::Wanted {
                    expected: "a value",
                    found,
                },
            ))
        }
    }

    /// Array elements may be separated by newlines and comments; a trailing
    /// comma is permitted.
    fn array_contents(&mut self, out: &mut Array, depth_remaining: i16) -> Result<(), ParseError> {
        if depth_remaining < 0 {
            return Err(self.set_error(self.cursor, None, ErrorKind::RecursionLimit));
        }
        loop {
            self.eat_void()?;
            if self.eat_byte(b']') {
                return Ok(());
            }
            let value = self.value(depth_remaining)?;
            out.push(value);
            self.eat_void()?;
            if !self.eat_byte(b',') {
                break;
            }
        }
        self.eat_void()?;
        self.expect_byte(b']')
    }

    /// Inline tables sit on one line: no newlines, no trailing comma.
    /// After the closing brace the caller freezes the table.
    fn inline_table_contents(
        &mut self,
        out: &mut Table,
        depth_remaining: i16,
    ) -> Result<(), ParseError> {
        if depth_remaining < 0 {
            return Err(self.set_error(self.cursor, None, ErrorKind::RecursionLimit));
        }
        self.eat_inline_whitespace()?;
        if self.eat_byte(b'}') {
            return Ok(());
        }
        loop {
            let mut table_ref: &mut Table = &mut *out;
            let mut key = self.read_table_key()?;
            self.eat_whitespace();
            while self.eat_byte(b'.') {
                self.eat_whitespace();
                table_ref = self.navigate_dotted_key(table_ref, key)?;
                key = self.read_table_key()?;
                self.eat_whitespace();
            }
            self.expect_byte(b'=')?;
            self.eat_inline_whitespace()?;

            let value = self.value(depth_remaining)?;
            self.insert_value(table_ref, key, value)?;

            self.eat_inline_whitespace()?;
            if self.eat_byte(b'}') {
                return Ok(());
            }
            self.expect_byte(b',')?;
            self.eat_inline_whitespace()?;
            // A `}` here would be a trailing comma; the next iteration's
            // key read rejects it.
        }
    }

    // ── tree navigation ─────────────────────────────────────────────

    /// Steps through one intermediate segment of a dotted key, creating the
    /// table if absent. New tables are tagged dotted; existing ones must be
    /// open tables that no header has claimed.
    fn navigate_dotted_key<'t>(
        &mut self,
        table: &'t mut Table,
        key: Key,
    ) -> Result<&'t mut Table, ParseError> {
        if let Some(idx) = self.indexed_find(table, &key.name) {
            let (first, extensible) = {
                let (existing_key, value) = &table.entries()[idx];
                let extensible =
                    matches!(value, Value::Table(t) if !t.is_frozen() && !t.is_header());
                (existing_key.span, extensible)
            };
            if !extensible {
                return Err(self.set_error_span(key.span, ErrorKind::DottedKeyInvalidType { first }));
            }
            match &mut table.entries_mut()[idx].1 {
                Value::Table(t) => Ok(t),
                _ => unreachable!(),
            }
        } else {
            let mut child = Table::with_id(self.alloc_table_id());
            child.set_dotted();
            let idx = self.insert_unchecked(table, key, Value::Table(child));
            match &mut table.entries_mut()[idx].1 {
                Value::Table(t) => Ok(t),
                _ => unreachable!(),
            }
        }
    }

    /// Steps through one intermediate segment of a table header (`a` in
    /// `[a.b.c]`). Creates implicit tables with no flag bits; an existing
    /// array-of-tables navigates into its last entry.
    fn navigate_header_intermediate<'t>(
        &mut self,
        table: &'t mut Table,
        key: Key,
    ) -> Result<&'t mut Table, ParseError> {
        if let Some(idx) = self.indexed_find(table, &key.name) {
            let (first, into_array) = {
                let (existing_key, value) = &table.entries()[idx];
                let into_array = match value {
                    Value::Table(t) if !t.is_frozen() => Some(false),
                    Value::Array(a) if a.aot => Some(true),
                    _ => None,
                };
                (existing_key.span, into_array)
            };
            let Some(into_array) = into_array else {
                return Err(self.set_duplicate_key_error(first, key.span, &key.name));
            };
            let value = &mut table.entries_mut()[idx].1;
            if into_array {
                // Array-of-tables entries are always tables by construction.
                match value.as_array_mut().and_then(Array::last_mut) {
                    Some(Value::Table(t)) => Ok(t),
                    _ => unreachable!(),
                }
            } else {
                match value {
                    Value::Table(t) => Ok(t),
                    _ => unreachable!(),
                }
            }
        } else {
            let child = Table::with_id(self.alloc_table_id());
            let idx = self.insert_unchecked(table, key, Value::Table(child));
            match &mut table.entries_mut()[idx].1 {
                Value::Table(t) => Ok(t),
                _ => unreachable!(),
            }
        }
    }

    /// The final segment of a standard table header `[a.b.c]`. The named
    /// table must not be frozen, dotted-created, or already declared by a
    /// header.
    fn navigate_header_table_final<'t>(
        &mut self,
        table: &'t mut Table,
        key: Key,
        header: Span,
    ) -> Result<&'t mut Table, ParseError> {
        enum Verdict {
            Open,
            Collision,
            Redeclared,
        }
        if let Some(idx) = self.indexed_find(table, &key.name) {
            let (first, verdict) = {
                let (existing_key, value) = &table.entries()[idx];
                let verdict = match value {
                    Value::Table(t) if t.is_frozen() || t.is_dotted() => Verdict::Collision,
                    Value::Table(t) if t.is_header() => Verdict::Redeclared,
                    Value::Table(_) => Verdict::Open,
                    _ => Verdict::Collision,
                };
                (existing_key.span, verdict)
            };
            match verdict {
                Verdict::Collision => Err(self.set_duplicate_key_error(first, key.span, &key.name)),
                Verdict::Redeclared => Err(self.set_error_span(
                    header,
                    ErrorKind::DuplicateTable {
                        name: key.name,
                        first,
                    },
                )),
                Verdict::Open => match &mut table.entries_mut()[idx].1 {
                    Value::Table(t) => {
                        t.set_header();
                        Ok(t)
                    }
                    _ => unreachable!(),
                },
            }
        } else {
            let mut child = Table::with_id(self.alloc_table_id());
            child.set_header();
            let idx = self.insert_unchecked(table, key, Value::Table(child));
            match &mut table.entries_mut()[idx].1 {
                Value::Table(t) => Ok(t),
                _ => unreachable!(),
            }
        }
    }

    /// The final segment of an array-of-tables header `[[a.b]]`. Appends a
    /// fresh table to the array, creating the array on first sight.
    fn navigate_header_array_final<'t>(
        &mut self,
        table: &'t mut Table,
        key: Key,
    ) -> Result<&'t mut Table, ParseError> {
        enum Verdict {
            Append,
            Redefine,
            Collision,
        }
        if let Some(idx) = self.indexed_find(table, &key.name) {
            let (first, verdict) = {
                let (existing_key, value) = &table.entries()[idx];
                let verdict = match value {
                    Value::Array(a) if a.aot => Verdict::Append,
                    Value::Table(_) => Verdict::Redefine,
                    _ => Verdict::Collision,
                };
                (existing_key.span, verdict)
            };
            match verdict {
                Verdict::Redefine => {
                    Err(self.set_error_span(key.span, ErrorKind::RedefineAsArray))
                }
                Verdict::Collision => {
                    Err(self.set_duplicate_key_error(first, key.span, &key.name))
                }
                Verdict::Append => {
                    let mut entry = Table::with_id(self.alloc_table_id());
                    entry.set_header();
                    match table.entries_mut()[idx].1.as_array_mut() {
                        Some(array) => {
                            array.push(Value::Table(entry));
                            match array.last_mut() {
                                Some(Value::Table(t)) => Ok(t),
                                _ => unreachable!(),
                            }
                        }
                        None => unreachable!(),
                    }
                }
            }
        } else {
            let mut entry = Table::with_id(self.alloc_table_id());
            entry.set_header();
            let mut array = Array::new();
            array.aot = true;
            array.push(Value::Table(entry));
            let idx = self.insert_unchecked(table, key, Value::Array(array));
            match table.entries_mut()[idx].1.as_array_mut().and_then(Array::last_mut) {
                Some(Value::Table(t)) => Ok(t),
                _ => unreachable!(),
            }
        }
    }

    // ── duplicate detection ─────────────────────────────────────────

    /// Inserts a value, rejecting duplicate keys. Large tables consult the
    /// hash index; small ones scan.
    fn insert_value(&mut self, table: &mut Table, key: Key, value: Value) -> Result<(), ParseError> {
        if table.len() < INDEXED_TABLE_THRESHOLD {
            if let Some(idx) = table.find_index(&key.name) {
                let first = table.entries()[idx].0.span;
                return Err(self.set_duplicate_key_error(first, key.span, &key.name));
            }
            table.push(key, value);
            return Ok(());
        }

        if table.len() == INDEXED_TABLE_THRESHOLD {
            self.index_existing_entries(table);
        }
        match self.index.entry((table.id, key.name.clone())) {
            Entry::Occupied(occupied) => {
                let first = table.entries()[*occupied.get()].0.span;
                Err(self.set_duplicate_key_error(first, key.span, &key.name))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(table.len());
                table.push(key, value);
                Ok(())
            }
        }
    }

    /// Inserts a key already known to be absent, keeping the index current.
    /// Returns the new entry's position.
    fn insert_unchecked(&mut self, table: &mut Table, key: Key, value: Value) -> usize {
        let len = table.len();
        if len >= INDEXED_TABLE_THRESHOLD {
            if len == INDEXED_TABLE_THRESHOLD {
                self.index_existing_entries(table);
            }
            self.index.insert((table.id, key.name.clone()), len);
        }
        table.push(key, value);
        len
    }

    #[cold]
    fn index_existing_entries(&mut self, table: &Table) {
        for (i, (key, _)) in table.entries().iter().enumerate() {
            self.index.insert((table.id, key.name.clone()), i);
        }
    }

    /// Looks up a key's entry index: via the hash index for tables that
    /// crossed the threshold, linear scan otherwise.
    fn indexed_find(&self, table: &Table, name: &str) -> Option<usize> {
        if table.len() > INDEXED_TABLE_THRESHOLD {
            self.index.get(&(table.id, name.to_string())).copied()
        } else {
            table.find_index(name)
        }
    }

    // ── document assembly ───────────────────────────────────────────

    fn parse_document(&mut self) -> Result<Table, ParseError> {
        let mut root = Table::with_id(self.alloc_table_id());
        // Key-value lines before any header land in the root table.
        self.key_value_lines(&mut root)?;
        while self.peek_byte().is_some() {
            self.table_block(&mut root)?;
        }
        Ok(root)
    }

    /// One `[header]` or `[[header]]` and the key-value lines below it.
    fn table_block(&mut self, root: &mut Table) -> Result<(), ParseError> {
        let target = self.process_table_header(root)?;
        self.key_value_lines(target)
    }

    /// Consumes blank lines, comments, and `key = value` lines into
    /// `target` until a table header or EOF.
    fn key_value_lines(&mut self, target: &mut Table) -> Result<(), ParseError> {
        loop {
            self.eat_whitespace();
            if self.eat_comment()? || self.eat_newline() {
                continue;
            }
            match self.peek_byte() {
                None | Some(b'[') => return Ok(()),
                Some(b'\r') => {
                    return Err(self.set_error(self.cursor, None, ErrorKind::Unexpected('\r')));
                }
                Some(_) => self.process_key_value(target)?,
            }
        }
    }

    fn process_table_header<'t>(
        &mut self,
        root: &'t mut Table,
    ) -> Result<&'t mut Table, ParseError> {
        let header_start = self.cursor;
        self.expect_byte(b'[')?;
        let is_array = self.eat_byte(b'[');

        let mut current = root;
        self.eat_whitespace();
        let mut key = self.read_table_key()?;
        loop {
            self.eat_whitespace();
            if !self.eat_byte(b'.') {
                break;
            }
            self.eat_whitespace();
            current = self.navigate_header_intermediate(current, key)?;
            key = self.read_table_key()?;
        }
        self.expect_byte(b']')?;
        if is_array {
            self.expect_byte(b']')?;
        }

        self.eat_whitespace();
        if !self.eat_comment()? {
            self.eat_newline_or_eof()?;
        }
        let header = Span::new(header_start as u32, self.cursor as u32);

        if is_array {
            self.navigate_header_array_final(current, key)
        } else {
            self.navigate_header_table_final(current, key, header)
        }
    }

    fn process_key_value(&mut self, target: &mut Table) -> Result<(), ParseError> {
        let mut table_ref: &mut Table = target;
        let mut key = self.read_table_key()?;
        self.eat_whitespace();
        while self.eat_byte(b'.') {
            self.eat_whitespace();
            table_ref = self.navigate_dotted_key(table_ref, key)?;
            key = self.read_table_key()?;
            self.eat_whitespace();
        }
        self.expect_byte(b'=')?;
        self.eat_whitespace();

        let value = self.value(MAX_RECURSION_DEPTH)?;
        self.insert_value(table_ref, key, value)?;

        // The assignment lands before the line discipline is checked, so a
        // second `key = value` on the same line fails here.
        self.eat_whitespace();
        if !self.eat_comment()? {
            self.eat_newline_or_eof()?;
        }
        Ok(())
    }
}

/// Parses a TOML document into its root [`Table`].
///
/// On failure the returned [`Error`] carries the byte span of the problem
/// and the 1-based line and column derived from it.
pub fn parse(s: &str) -> Result<Table, Error> {
    // Spans store u32 byte offsets.
    if s.len() > u32::MAX as usize {
        return Err(Error {
            kind: ErrorKind::InputTooLarge,
            span: Span::new(0, 0),
            line_info: Some((1, 1)),
        });
    }
    // TOML forbids a byte-order mark; it is not stripped.
    if s.as_bytes().starts_with(b"\xef\xbb\xbf") {
        return Err(Error {
            kind: ErrorKind::ByteOrderMark,
            span: Span::new(0, 3),
            line_info: Some((1, 1)),
        });
    }

    let mut parser = Parser::new(s);
    match parser.parse_document() {
        Ok(root) => Ok(root),
        Err(ParseError) => {
            let mut error = parser.take_error();
            error.line_info = Some(line_column(s, error.span.start as usize));
            Err(error)
        }
    }
}

/// 1-based line and column of a byte offset. Columns count characters from
/// the start of the line.
fn line_column(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset.min(src.len())];
    let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Appends a numeric token to `dst` with its underscores removed.
/// Returns `false` when an underscore is not flanked by digits on both
/// sides. Tokens are keylike, so every byte is ASCII.
fn push_stripped(dst: &mut String, part: &str) -> bool {
    let bytes = part.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            let after_digit = i > 0 && bytes[i - 1].is_ascii_digit();
            let before_digit = bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
            if !after_digit || !before_digit {
                return false;
            }
        } else {
            dst.push(b as char);
        }
    }
    true
}

#[inline]
fn is_keylike_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn describe_byte(b: u8) -> &'static str {
    match b {
        b'\n' => "a newline",
        b' ' | b'\t' => "whitespace",
        b'=' => "an equals",
        b'.' => "a period",
        b',' => "a comma",
        b':' => "a colon",
        b'+' => "a plus",
        b'{' => "a left brace",
        b'}' => "a right brace",
        b'[' => "a left bracket",
        b']' => "a right bracket",
        b'\'' | b'"' => "a string",
        _ if is_keylike_byte(b) => "an identifier",
        _ => "a character",
    }
}
