//! Formula tokenizer.
//!
//! Lexing is driven by an explicit, priority-ordered table of
//! `(TokenKind, pattern)` pairs. At each cursor position the table is
//! tried top to bottom and the first pattern that matches at the
//! start of the remaining text wins; the order of [`PATTERN_TABLE`]
//! is therefore load-bearing and documented inline.
//!
//! Whitespace is matched and silently discarded. The spreadsheet
//! "intersection" operator is a literal space between two references,
//! so it leaves no token behind; the parser recovers it from the
//! adjacency of two reference-shaped tokens.

use std::error::Error;
use std::fmt::{self, Display};

use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kind of a token.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace,
    String,
    ErrorLiteral,
    Boolean,
    Number,
    /// External-workbook marker, e.g. `[Book1.xlsx]`.
    Bracket,
    /// Quoted sheet prefix including the trailing `!`, e.g. `'My Sheet'!`.
    QuotedSheet,
    /// Bare sheet prefix including the trailing `!`, e.g. `Sheet1!`.
    Sheet,
    /// A cell coordinate such as `A1` or `$B$2`.
    Cell,
    /// Column letters only, e.g. `A` or `$BC`.
    Column,
    /// An identifier: function name or defined name.
    Name,
    Operator,
    OpenParen,
    CloseParen,
    Comma,
    Colon,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A token with its byte span in the scanned text (the formula with
/// any leading `=` stripped).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {:?}>", self.kind, self.text)
    }
}

/// Lexing failed: no pattern in the table matched at `pos`.
#[derive(Debug)]
pub struct LexError {
    pub remainder: String,
    pub pos: usize,
}

impl Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LexError at byte {}: no token matches {:?}",
            self.pos, self.remainder
        )
    }
}

impl Error for LexError {}

/// The ordered pattern table. Priority is the listed order:
///
/// 1. `Whitespace`, matched first so it can be discarded early.
/// 2. `String` before anything else that could contain a quote.
/// 3. `ErrorLiteral` before `Name` (both can start with a letter run
///    once the `#` is consumed; the `#` anchors this one).
/// 4. `Boolean` before `Cell`/`Column`/`Name` so `TRUE` is never a
///    column run.
/// 5. `Number` (with scientific notation and decimals).
/// 6. `Bracket`, `QuotedSheet`, `Sheet`: reference prefixes; the
///    sheet patterns include the trailing `!` so `Sheet1!` never
///    lexes as a name.
/// 7. `Cell` before `Column` before `Name`: longest reference shape
///    first; the cell/column vs. name ambiguity is settled by
///    [`tokenize`]'s longer-identifier rule.
/// 8. Operators (two-character comparisons before single characters),
///    then the punctuation singletons.
static PATTERN_TABLE: Lazy<Vec<(TokenKind, Regex)>> = Lazy::new(|| {
    let table: &[(TokenKind, &str)] = &[
        (TokenKind::Whitespace, r"^[ \t\r\n]+"),
        (TokenKind::String, r#"^"(?:[^"]|"")*""#),
        (
            TokenKind::ErrorLiteral,
            r"^#(?:NULL!|DIV/0!|VALUE!|REF!|NAME\?|NUM!|N/A|CIRC!|GETTING_DATA)",
        ),
        (TokenKind::Boolean, r"^(?:TRUE|FALSE)\b"),
        (TokenKind::Number, r"^[0-9]+(?:\.[0-9]+)?(?:[Ee][+-]?[0-9]+)?"),
        (TokenKind::Bracket, r"^\[[^\]]*\]"),
        (TokenKind::QuotedSheet, r"^'(?:[^']|'')*'!"),
        (TokenKind::Sheet, r"^[A-Za-z_][A-Za-z0-9_.]*!"),
        (TokenKind::Cell, r"^\$?[A-Za-z]{1,3}\$?[0-9]+"),
        (TokenKind::Column, r"^\$?[A-Za-z]{1,3}"),
        (TokenKind::Name, r"^[A-Za-z_][A-Za-z0-9_.]*"),
        (TokenKind::Operator, r"^(?:<=|>=|<>|[-+*/^&%=<>])"),
        (TokenKind::OpenParen, r"^\("),
        (TokenKind::CloseParen, r"^\)"),
        (TokenKind::Comma, r"^,"),
        (TokenKind::Colon, r"^:"),
    ];
    table
        .iter()
        .map(|(kind, pat)| (*kind, Regex::new(pat).expect("static token pattern")))
        .collect()
});

/// Identifier pattern used by the cell-vs-name disambiguation rule.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*").expect("static name pattern"));

/// Lex a formula into tokens.
///
/// A leading `=` is stripped before scanning; token spans are byte
/// offsets into the stripped text. Whitespace tokens are never
/// emitted. Calling again retokenizes from scratch; there is no
/// mid-stream restart.
///
/// Disambiguation: when the `Cell` or `Column` pattern wins but the
/// identifier pattern matches a strictly longer run at the same
/// position, the longer run is emitted as a `Name` token instead.
/// This keeps `LOG10` a cell-shaped token (same length both ways,
/// resolved at parse time by a following `(`) while `rate1x` lexes
/// as one name rather than a cell plus garbage.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    let body = text.strip_prefix('=').unwrap_or(text);
    let mut tokens = Vec::with_capacity(body.len() / 2);
    let mut pos = 0;

    while pos < body.len() {
        let rest = &body[pos..];
        let hit = PATTERN_TABLE
            .iter()
            .find_map(|(kind, pattern)| pattern.find(rest).map(|m| (*kind, m.end())));

        let (mut kind, mut len) = match hit {
            Some(hit) => hit,
            None => {
                return Err(LexError {
                    remainder: rest.to_string(),
                    pos,
                })
            }
        };

        if matches!(kind, TokenKind::Cell | TokenKind::Column) {
            if let Some(m) = NAME_PATTERN.find(rest) {
                if m.end() > len {
                    kind = TokenKind::Name;
                    len = m.end();
                }
            }
        }

        if kind != TokenKind::Whitespace {
            tokens.push(Token {
                kind,
                text: rest[..len].to_string(),
                start: pos,
                end: pos + len,
            });
        }
        pos += len;
    }

    Ok(tokens)
}
