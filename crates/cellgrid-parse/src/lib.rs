//! Formula text to AST: tokenizer and operator-precedence parser.

pub mod parser;
pub mod tokenizer;

pub use parser::{parse, parse_formula, AstNode, ParseError, Reference};
pub use tokenizer::{tokenize, LexError, Token, TokenKind};

pub use cellgrid_common as common;
