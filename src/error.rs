//! The parse error surface: a single error type discriminated by kind,
//! carrying the byte span where the failure was detected.

#[cfg(test)]
#[path = "./error_tests.rs"]
mod tests;

use crate::Span;
use std::fmt::{self, Display};
use thiserror::Error as ThisError;

/// Error produced when parsing a TOML document.
///
/// Every error carries the byte [`Span`] at which it was detected. Errors
/// returned from [`parse`](crate::parse) additionally carry the 1-based
/// line and column derived from that offset.
#[derive(Debug, Clone)]
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// The span where the error occurs.
    ///
    /// Note some [`ErrorKind`]s contain additional span information, e.g.
    /// the location of the first definition of a duplicated key.
    pub span: Span,
    /// 1-based line and column of `span.start`, filled in by
    /// [`parse`](crate::parse).
    pub line_info: Option<(usize, usize)>,
}

impl Error {
    /// Byte offset at which the error was detected.
    #[inline]
    pub fn offset(&self) -> usize {
        self.span.start as usize
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)?;
        if let Some((line, column)) = self.line_info {
            write!(f, " at line {line}, column {column}")?;
        }
        Ok(())
    }
}

impl From<(ErrorKind, Span)> for Error {
    fn from((kind, span): (ErrorKind, Span)) -> Self {
        Self {
            kind,
            span,
            line_info: None,
        }
    }
}

/// Everything that can go wrong while parsing.
///
/// The variants cover four families of failures: lexical (strings, escapes,
/// control characters), numeric (integers, floats, date-times), structural
/// (missing or misplaced punctuation), and semantic (key redefinition and
/// table-flavor conflicts).
#[derive(Debug, Clone, PartialEq, ThisError)]
#[non_exhaustive]
pub enum ErrorKind {
    /// EOF was reached while looking for a value or delimiter.
    #[error("unexpected eof encountered")]
    UnexpectedEof,

    /// The input is larger than the maximum supported size of 4GiB.
    #[error("input is too large (maximum 4GiB)")]
    InputTooLarge,

    /// The input starts with a UTF-8 byte-order mark, which TOML forbids.
    #[error("byte-order mark is not permitted")]
    ByteOrderMark,

    /// A character not allowed in a string was found, e.g. a raw control
    /// character or a bare carriage return.
    #[error("invalid character in string: {0:?}")]
    InvalidCharInString(char),

    /// A control character other than tab appeared in a comment.
    #[error("invalid character in comment: {0:?}")]
    InvalidCharInComment(char),

    /// An invalid character followed a backslash in a basic string.
    #[error("invalid escape character in string: {0:?}")]
    InvalidEscape(char),

    /// A non-hex character appeared in a `\u`/`\U` escape.
    #[error("invalid hex escape character in string: {0:?}")]
    InvalidHexEscape(char),

    /// A `\u`/`\U` escape named a value that is not a Unicode scalar,
    /// e.g. a surrogate code point.
    #[error("invalid escape value: {0:#x}")]
    InvalidEscapeValue(u32),

    /// An unexpected character was encountered, typically a stray byte
    /// where a statement should begin.
    #[error("unexpected character found: {0:?}")]
    Unexpected(char),

    /// EOF was found before the closing delimiter of a string.
    #[error("unterminated string")]
    UnterminatedString,

    /// A number failed to parse: malformed digits, misplaced underscore,
    /// or a forbidden leading zero.
    #[error("invalid number")]
    InvalidNumber,

    /// An integer does not fit in a signed 64-bit value.
    #[error("integer value cannot be represented losslessly")]
    IntegerOutOfRange,

    /// A token shaped like a date or time had out-of-range components.
    #[error("invalid date-time")]
    InvalidDateTime,

    /// A bare word appeared where a value was expected.
    #[error("invalid TOML value, did you mean to use a quoted string?")]
    UnquotedString,

    /// Multi-line strings are not allowed as keys.
    #[error("multiline strings are not allowed for key")]
    MultilineStringKey,

    /// A newline appeared inside an inline table literal.
    #[error("newline is not permitted inside an inline table")]
    NewlineInInlineTable,

    /// Arrays and inline tables nest deeper than the supported limit.
    #[error("maximum recursion depth exceeded")]
    RecursionLimit,

    /// Wanted one sort of token, but found another.
    #[error("expected {expected}, found {found}")]
    Wanted {
        /// Expected token type.
        expected: &'static str,
        /// Actually found token type.
        found: &'static str,
    },

    /// A table header names an already-defined table.
    #[error("redefinition of table `{name}`")]
    DuplicateTable {
        /// The name of the duplicate table.
        name: String,
        /// The span where the table was first defined.
        first: Span,
    },

    /// A key was assigned twice in the same table.
    #[error("duplicate key: `{key}`")]
    DuplicateKey {
        /// The duplicate key.
        key: String,
        /// The span where the key was first defined.
        first: Span,
    },

    /// A `[[header]]` names a path already holding a plain table.
    #[error("table redefined as array")]
    RedefineAsArray,

    /// A dotted key attempted to traverse something that is not an open
    /// table, e.g. a scalar value or a frozen inline table.
    #[error("dotted key attempted to extend non-table type")]
    DottedKeyInvalidType {
        /// The span where the offending entry was first defined.
        first: Span,
    },
}

#[cfg(feature = "reporting")]
#[cfg_attr(docsrs, doc(cfg(feature = "reporting")))]
impl Error {
    /// Converts this [`Error`] into a [`codespan_reporting::diagnostic::Diagnostic`].
    pub fn to_diagnostic<FileId: Copy + PartialEq>(
        &self,
        fid: FileId,
    ) -> codespan_reporting::diagnostic::Diagnostic<FileId> {
        use codespan_reporting::diagnostic::{Diagnostic, Label};

        let diag = Diagnostic::error().with_message(self.kind.to_string());
        let primary = Label::primary(fid, self.span);

        match &self.kind {
            ErrorKind::DuplicateKey { first, .. } => diag.with_labels(vec![
                primary.with_message("duplicate key"),
                Label::secondary(fid, *first).with_message("first defined here"),
            ]),
            ErrorKind::DuplicateTable { first, .. } => diag.with_labels(vec![
                primary.with_message("duplicate table"),
                Label::secondary(fid, *first).with_message("first defined here"),
            ]),
            ErrorKind::DottedKeyInvalidType { first } => diag.with_labels(vec![
                primary.with_message("attempted to extend here"),
                Label::secondary(fid, *first).with_message("non-extensible entry"),
            ]),
            ErrorKind::Wanted { expected, .. } => {
                diag.with_labels(vec![primary.with_message(format!("expected {expected}"))])
            }
            ErrorKind::UnterminatedString => diag.with_labels(vec![
                primary.with_message("string opened here is never closed"),
            ]),
            _ => diag.with_labels(vec![primary]),
        }
    }
}
