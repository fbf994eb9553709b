//! Formula error *values*.
//!
//! Everything past the parser fails as data, not as `Err`: a bad
//! function name, a missing defined name, or a division by zero all
//! produce a [`CellError`] that flows through evaluation results and
//! is rendered by the host as the usual `#NAME?`-style placeholder.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The error codes this engine can produce.
///
/// Names are CamelCase while `Display` renders them exactly as a
/// spreadsheet shows them (`#DIV/0!`, ...).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CellErrorKind {
    Null,
    Div,
    Value,
    Ref,
    Name,
    Num,
    Na,
    /// Cyclic defined-name resolution.
    Circ,
}

impl fmt::Display for CellErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "#NULL!",
            Self::Div => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::Circ => "#CIRC!",
        })
    }
}

impl CellErrorKind {
    /// Parse a canonical error code, e.g. `"#REF!"`.
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "#NULL!" => Some(Self::Null),
            "#DIV/0!" => Some(Self::Div),
            "#VALUE!" => Some(Self::Value),
            "#REF!" => Some(Self::Ref),
            "#NAME?" => Some(Self::Name),
            "#NUM!" => Some(Self::Num),
            "#N/A" => Some(Self::Na),
            "#CIRC!" => Some(Self::Circ),
            _ => None,
        }
    }
}

/// An error value: the mandatory code plus an optional human message.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellError {
    pub kind: CellErrorKind,
    pub message: Option<String>,
}

impl CellError {
    pub fn new(kind: CellErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Build from a literal error code found in formula text.
    /// Unknown codes fall back to `#VALUE!` with the raw text attached.
    pub fn from_code(s: &str) -> Self {
        match CellErrorKind::from_code(s) {
            Some(kind) => Self::new(kind),
            None => Self::new(CellErrorKind::Value).with_message(s.to_string()),
        }
    }
}

impl From<CellErrorKind> for CellError {
    fn from(kind: CellErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for CellError {}

impl PartialEq<str> for CellError {
    fn eq(&self, other: &str) -> bool {
        self.kind.to_string() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in [
            CellErrorKind::Null,
            CellErrorKind::Div,
            CellErrorKind::Value,
            CellErrorKind::Ref,
            CellErrorKind::Name,
            CellErrorKind::Num,
            CellErrorKind::Na,
            CellErrorKind::Circ,
        ] {
            assert_eq!(CellErrorKind::from_code(&kind.to_string()), Some(kind));
        }
    }

    #[test]
    fn unknown_code_degrades_to_value() {
        let err = CellError::from_code("#GETTING_DATA");
        assert_eq!(err.kind, CellErrorKind::Value);
        assert_eq!(err.message.as_deref(), Some("#GETTING_DATA"));
    }

    #[test]
    fn display_includes_message() {
        let err = CellError::new(CellErrorKind::Name).with_message("no such name");
        assert_eq!(err.to_string(), "#NAME?: no such name");
    }
}
