//! Operator-precedence parser producing the formula AST.

use std::error::Error;
use std::fmt::{self, Display};

use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::tokenizer::{tokenize, LexError, Token, TokenKind};
use cellgrid_common::{CellError, RangeRef, Value};

/// A fatal parse failure. Everything value-shaped degrades to a
/// [`AstNode::Constant`] instead; this error is reserved for
/// structurally broken formulas (unmatched group, dangling operator,
/// trailing tokens).
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub position: Option<usize>,
}

impl ParseError {
    fn at(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position: Some(position),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "ParseError at token {}: {}", pos, self.message),
            None => write!(f, "ParseError: {}", self.message),
        }
    }
}

impl Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.to_string(),
            position: None,
        }
    }
}

/// A reference to something outside the formula's own text.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// A defined name, resolved by the host to formula text.
    Name {
        sheet: Option<String>,
        name: String,
    },
    /// A cell or rectangular range. `start`/`end` keep the raw token
    /// text for display; `range` is the parsed geometry.
    Cells {
        sheet: Option<String>,
        start: String,
        end: String,
        range: RangeRef,
    },
}

impl Reference {
    pub fn range(&self) -> Option<&RangeRef> {
        match self {
            Reference::Cells { range, .. } => Some(range),
            Reference::Name { .. } => None,
        }
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            Reference::Name { sheet, .. } | Reference::Cells { sheet, .. } => sheet.as_deref(),
        }
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Name { sheet, name } => match sheet {
                Some(s) => write!(f, "{s}!{name}"),
                None => write!(f, "{name}"),
            },
            Reference::Cells {
                sheet, start, end, ..
            } => {
                if let Some(s) = sheet {
                    write!(f, "{s}!")?;
                }
                if start == end {
                    write!(f, "{start}")
                } else {
                    write!(f, "{start}:{end}")
                }
            }
        }
    }
}

/// One node of the formula AST. Immutable once built; owned
/// exclusively by its parse tree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Reference(Reference),
    /// Adjacent references folded from the whitespace intersection
    /// operator, e.g. `A1:B3 B2:C4`.
    Intersection(Vec<Reference>),
    /// A parenthesised comma list, e.g. `(A1:A3, C1:C3)`.
    Union(Vec<AstNode>),
    BinaryOp {
        op: String,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    UnaryOp {
        op: String,
        operand: Box<AstNode>,
        postfix: bool,
    },
    FunctionCall {
        name: String,
        args: Vec<AstNode>,
    },
    Constant(Value),
}

impl AstNode {
    /// All references embedded anywhere in this tree, in source order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            AstNode::Reference(r) => out.push(r),
            AstNode::Intersection(refs) => out.extend(refs.iter()),
            AstNode::Union(children) => {
                for child in children {
                    child.collect_references(out);
                }
            }
            AstNode::BinaryOp { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            AstNode::UnaryOp { operand, .. } => operand.collect_references(out),
            AstNode::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
            AstNode::Constant(_) => {}
        }
    }
}

/// Binary operator precedence, low to high. All levels are
/// left-associative, including `^` (matching spreadsheet behaviour,
/// where `2^3^2` is `(2^3)^2 = 64`).
fn precedence(op: &str) -> Option<u8> {
    match op {
        "=" | "<" | ">" | "<=" | ">=" | "<>" => Some(1),
        "&" => Some(2),
        "+" | "-" => Some(3),
        "*" | "/" => Some(4),
        "^" => Some(5),
        _ => None,
    }
}

/// Parse a formula string (leading `=` optional) to an AST.
pub fn parse(text: &str) -> Result<AstNode, ParseError> {
    let tokens = tokenize(text)?;
    parse_formula(tokens)
}

/// Parse an already-lexed token sequence to an AST.
pub fn parse_formula(tokens: Vec<Token>) -> Result<AstNode, ParseError> {
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    if parser.tokens.is_empty() {
        return Ok(AstNode::Constant(Value::Empty));
    }
    let ast = parser.parse_expression()?;
    if parser.position < parser.tokens.len() {
        return Err(ParseError::at(
            format!("unexpected token {}", parser.tokens[parser.position]),
            parser.position,
        ));
    }
    Ok(ast)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.position + ahead)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.position].clone();
        self.position += 1;
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().map(|t| t.kind) == Some(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn parse_expression(&mut self) -> Result<AstNode, ParseError> {
        self.parse_binary_op(0)
    }

    fn parse_binary_op(&mut self, min_precedence: u8) -> Result<AstNode, ParseError> {
        let mut left = self.parse_unary_op()?;

        while let Some(token) = self.peek() {
            if token.kind != TokenKind::Operator {
                break;
            }
            let prec = match precedence(&token.text) {
                Some(p) => p,
                None => break, // '%' handled as postfix
            };
            if prec < min_precedence {
                break;
            }
            let op = self.bump().text;
            let right = self.parse_binary_op(prec + 1)?;
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary_op(&mut self) -> Result<AstNode, ParseError> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Operator && (token.text == "+" || token.text == "-") {
                let op = self.bump().text;
                let operand = self.parse_unary_op()?;
                return Ok(AstNode::UnaryOp {
                    op,
                    operand: Box::new(operand),
                    postfix: false,
                });
            }
        }
        self.parse_postfix_op()
    }

    fn parse_postfix_op(&mut self) -> Result<AstNode, ParseError> {
        let mut expr = self.parse_primary()?;
        while self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Operator && t.text == "%")
        {
            let op = self.bump().text;
            expr = AstNode::UnaryOp {
                op,
                operand: Box::new(expr),
                postfix: true,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<AstNode, ParseError> {
        let token = match self.peek() {
            Some(t) => t.clone(),
            None => {
                return Err(ParseError {
                    message: "unexpected end of formula".to_string(),
                    position: Some(self.position),
                })
            }
        };

        match token.kind {
            TokenKind::OpenParen => {
                self.position += 1;
                self.parse_group()
            }
            TokenKind::Number => {
                self.position += 1;
                let n = token.text.parse::<f64>().map_err(|_| {
                    ParseError::at(format!("invalid number {:?}", token.text), self.position)
                })?;
                Ok(AstNode::Constant(Value::Number(n)))
            }
            TokenKind::String => {
                self.position += 1;
                let inner = &token.text[1..token.text.len() - 1];
                Ok(AstNode::Constant(Value::Text(inner.replace("\"\"", "\""))))
            }
            TokenKind::Boolean => {
                self.position += 1;
                Ok(AstNode::Constant(Value::Boolean(token.text == "TRUE")))
            }
            TokenKind::ErrorLiteral => {
                self.position += 1;
                Ok(AstNode::Constant(Value::Error(CellError::from_code(
                    &token.text,
                ))))
            }
            // Function call: a name-shaped or cell-shaped token
            // directly followed by "(". This also resolves the LOG10
            // ambiguity left open by the tokenizer.
            TokenKind::Name | TokenKind::Cell | TokenKind::Column
                if self.peek_at(1).map(|t| t.kind) == Some(TokenKind::OpenParen) =>
            {
                self.position += 2;
                let args = self.parse_function_arguments()?;
                Ok(AstNode::FunctionCall {
                    name: token.text,
                    args,
                })
            }
            TokenKind::Bracket
            | TokenKind::QuotedSheet
            | TokenKind::Sheet
            | TokenKind::Cell
            | TokenKind::Column
            | TokenKind::Name => self.parse_reference_chain(),
            _ => Err(ParseError::at(
                format!("unexpected token {token}"),
                self.position,
            )),
        }
    }

    /// `(` already consumed. A plain group closes on `)`; a top-level
    /// comma list becomes a Union node.
    fn parse_group(&mut self) -> Result<AstNode, ParseError> {
        let first = self.parse_expression()?;
        if self.eat(TokenKind::CloseParen) {
            return Ok(first);
        }
        if self.peek().map(|t| t.kind) != Some(TokenKind::Comma) {
            return Err(ParseError::at("expected ')' to close group", self.position));
        }

        let mut children = vec![first];
        while self.eat(TokenKind::Comma) {
            children.push(self.parse_expression()?);
        }
        if !self.eat(TokenKind::CloseParen) {
            return Err(ParseError::at("expected ')' to close union", self.position));
        }
        Ok(AstNode::Union(children))
    }

    fn parse_function_arguments(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut args = Vec::new();
        if self.eat(TokenKind::CloseParen) {
            return Ok(args);
        }

        loop {
            match self.peek().map(|t| t.kind) {
                // Consecutive separators are an omitted argument.
                Some(TokenKind::Comma) => args.push(AstNode::Constant(Value::Empty)),
                Some(TokenKind::CloseParen) => {
                    args.push(AstNode::Constant(Value::Empty));
                }
                _ => args.push(self.parse_expression()?),
            }
            if self.eat(TokenKind::Comma) {
                continue;
            }
            if self.eat(TokenKind::CloseParen) {
                return Ok(args);
            }
            return Err(ParseError::at(
                "expected ',' or ')' in function arguments",
                self.position,
            ));
        }
    }

    /// Parse one reference, then fold any immediately following
    /// reference-shaped tokens into an Intersection node. Adjacency is
    /// the only trace the discarded whitespace operator leaves.
    fn parse_reference_chain(&mut self) -> Result<AstNode, ParseError> {
        let first = match self.try_parse_reference() {
            Some(r) => r,
            // Not shapeable as a reference: degrade to a constant leaf
            // instead of failing the whole formula.
            None => {
                let token = self.bump();
                return Ok(AstNode::Constant(Value::Text(token.text)));
            }
        };

        let mut refs: SmallVec<[Reference; 2]> = SmallVec::new();
        refs.push(first);
        while self.starts_reference() {
            match self.try_parse_reference() {
                Some(r) => refs.push(r),
                None => break,
            }
        }

        if refs.len() == 1 {
            Ok(AstNode::Reference(refs.remove(0)))
        } else {
            Ok(AstNode::Intersection(refs.into_vec()))
        }
    }

    /// Whether the current token can begin a reference. A name
    /// followed by `(` is a function call, not a reference.
    fn starts_reference(&self) -> bool {
        match self.peek().map(|t| t.kind) {
            Some(
                TokenKind::Bracket
                | TokenKind::QuotedSheet
                | TokenKind::Sheet
                | TokenKind::Cell
                | TokenKind::Column,
            ) => true,
            Some(TokenKind::Name) => self.peek_at(1).map(|t| t.kind) != Some(TokenKind::OpenParen),
            _ => false,
        }
    }

    /// Attempt to shape the upcoming tokens into a reference. Returns
    /// `None` without consuming anything when they cannot be.
    fn try_parse_reference(&mut self) -> Option<Reference> {
        let checkpoint = self.position;

        // External-workbook marker: consumed, not retained.
        self.eat(TokenKind::Bracket);

        let sheet = match self.peek().map(|t| t.kind) {
            Some(TokenKind::QuotedSheet) => {
                let text = self.bump().text;
                // Strip the trailing "!", then the quotes, then
                // unescape doubled quotes.
                let inner = &text[1..text.len() - 2];
                Some(inner.replace("''", "'"))
            }
            Some(TokenKind::Sheet) => {
                let text = self.bump().text;
                Some(text[..text.len() - 1].to_string())
            }
            _ => None,
        };

        let reference = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Column) => {
                let start = self.bump().text;
                let start_col = column_number(&start)?;
                if self.peek().map(|t| t.kind) == Some(TokenKind::Colon)
                    && self.peek_at(1).map(|t| t.kind) == Some(TokenKind::Column)
                {
                    self.position += 1;
                    let end = self.bump().text;
                    let end_col = column_number(&end)?;
                    Some(Reference::Cells {
                        sheet,
                        range: RangeRef::full_column(start_col, end_col),
                        start,
                        end,
                    })
                } else {
                    // A lone column token is still a full-column
                    // reference, never an identifier.
                    Some(Reference::Cells {
                        sheet,
                        range: RangeRef::full_column(start_col, start_col),
                        end: start.clone(),
                        start,
                    })
                }
            }
            Some(TokenKind::Cell) => {
                let start = self.bump().text;
                let (start_row, start_col) = cell_coord(&start)?;
                if self.eat(TokenKind::Colon) {
                    // The end part may itself carry a sheet prefix or
                    // be name-shaped; anything that does not parse as
                    // a cell degenerates to the start cell.
                    if self.peek().map(|t| t.kind) == Some(TokenKind::Sheet)
                        && self.peek_at(1).map(|t| t.kind) == Some(TokenKind::Cell)
                    {
                        self.position += 1;
                    }
                    let end = match self.peek().map(|t| t.kind) {
                        Some(TokenKind::Cell | TokenKind::Name) => self.bump().text,
                        _ => {
                            self.position = checkpoint;
                            return None;
                        }
                    };
                    let (end_row, end_col) = cell_coord(&end).unwrap_or((start_row, start_col));
                    Some(Reference::Cells {
                        sheet,
                        range: RangeRef::new(start_row, start_col, end_row, end_col),
                        start,
                        end,
                    })
                } else {
                    Some(Reference::Cells {
                        sheet,
                        range: RangeRef::single(start_row, start_col),
                        end: start.clone(),
                        start,
                    })
                }
            }
            Some(TokenKind::Name) => {
                let name = self.bump().text;
                Some(Reference::Name { sheet, name })
            }
            _ => None,
        };

        if reference.is_none() {
            self.position = checkpoint;
        }
        reference
    }
}

/// Convert column letters to a 0-based column index, `A` = 0.
/// Checked arithmetic: absurd letter runs return `None`.
fn column_number(text: &str) -> Option<u32> {
    let letters = text.trim_start_matches('$');
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut result = 0u32;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        result = result
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as u32)?;
    }
    Some(result - 1)
}

/// Parse a cell token such as `$B$2` into 0-based (row, col).
fn cell_coord(text: &str) -> Option<(u32, u32)> {
    let body = text.trim_start_matches('$');
    let split = body.find(|c: char| c == '$' || c.is_ascii_digit())?;
    let col = column_number(&body[..split])?;
    let row_text = body[split..].trim_start_matches('$');
    let row = row_text.parse::<u32>().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgrid_common::MAX_ROW;

    fn ref_parse(text: &str) -> Reference {
        match parse(text).unwrap() {
            AstNode::Reference(r) => r,
            other => panic!("expected reference, got {other:?}"),
        }
    }

    #[test]
    fn bounded_range() {
        let r = ref_parse("=A1:B2");
        assert_eq!(r.range(), Some(&RangeRef::new(0, 0, 1, 1)));
    }

    #[test]
    fn lone_column_is_full_column() {
        let r = ref_parse("=A");
        assert_eq!(r.range(), Some(&RangeRef::full_column(0, 0)));
    }

    #[test]
    fn column_pair_is_full_column_range() {
        let r = ref_parse("=B:D");
        assert_eq!(r.range(), Some(&RangeRef::new(0, 1, MAX_ROW, 3)));
    }

    #[test]
    fn sheet_prefix_is_captured() {
        let r = ref_parse("=Sheet1!A1");
        assert_eq!(r.sheet(), Some("Sheet1"));
        assert_eq!(r.range(), Some(&RangeRef::single(0, 0)));
    }

    #[test]
    fn quoted_sheet_is_unescaped() {
        let r = ref_parse("='It''s data'!A1");
        assert_eq!(r.sheet(), Some("It's data"));
    }

    #[test]
    fn workbook_bracket_is_discarded() {
        let r = ref_parse("=[Book1.xlsx]Sheet1!A1");
        assert_eq!(r.sheet(), Some("Sheet1"));
    }

    #[test]
    fn absolute_markers_are_ignored_in_geometry() {
        let r = ref_parse("=$B$2");
        assert_eq!(r.range(), Some(&RangeRef::single(1, 1)));
    }

    #[test]
    fn precedence_orders_mul_over_add() {
        let ast = parse("=1+2*3").unwrap();
        match ast {
            AstNode::BinaryOp { op, right, .. } => {
                assert_eq!(op, "+");
                assert!(matches!(*right, AstNode::BinaryOp { ref op, .. } if op == "*"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn comparison_binds_loosest() {
        let ast = parse("=A1+1>B1&\"x\"").unwrap();
        assert!(matches!(ast, AstNode::BinaryOp { ref op, .. } if op == ">"));
    }

    #[test]
    fn exponent_is_left_associative() {
        let ast = parse("=2^3^2").unwrap();
        match ast {
            AstNode::BinaryOp { op, left, .. } => {
                assert_eq!(op, "^");
                assert!(matches!(*left, AstNode::BinaryOp { ref op, .. } if op == "^"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn percent_is_postfix() {
        let ast = parse("=50%").unwrap();
        assert!(matches!(
            ast,
            AstNode::UnaryOp {
                ref op,
                postfix: true,
                ..
            } if op == "%"
        ));
    }

    #[test]
    fn function_call_with_range_arg() {
        let ast = parse("=SUM(A1:A3,2)").unwrap();
        match ast {
            AstNode::FunctionCall { name, args } => {
                assert_eq!(name, "SUM");
                assert_eq!(args.len(), 2);
                assert!(matches!(args[0], AstNode::Reference(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cell_shaped_function_name() {
        let ast = parse("=LOG10(100)").unwrap();
        assert!(matches!(ast, AstNode::FunctionCall { ref name, .. } if name == "LOG10"));
    }

    #[test]
    fn omitted_argument_is_empty() {
        let ast = parse("=IF(A1,,2)").unwrap();
        match ast {
            AstNode::FunctionCall { args, .. } => {
                assert_eq!(args.len(), 3);
                assert_eq!(args[1], AstNode::Constant(Value::Empty));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn comma_group_is_union() {
        let ast = parse("=(A1:A2,B1:B2)").unwrap();
        match ast {
            AstNode::Union(children) => assert_eq!(children.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn adjacent_references_fold_to_intersection() {
        let ast = parse("=A1:B3 B2:C4").unwrap();
        match ast {
            AstNode::Intersection(refs) => assert_eq!(refs.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn defined_name_is_a_reference() {
        let r = ref_parse("=GrandTotal");
        assert!(matches!(r, Reference::Name { ref name, .. } if name == "GrandTotal"));
    }

    #[test]
    fn unmatched_paren_is_fatal() {
        assert!(parse("=(1+2").is_err());
        assert!(parse("=SUM(1,2").is_err());
    }

    #[test]
    fn trailing_tokens_are_fatal() {
        assert!(parse("=1 2").is_err());
    }

    #[test]
    fn dangling_operator_is_fatal() {
        assert!(parse("=1+").is_err());
    }

    #[test]
    fn references_are_collected_in_order() {
        let ast = parse("=SUM(A1:A3)+Sheet2!B1").unwrap();
        let refs = ast.references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].sheet(), Some("Sheet2"));
    }
}
