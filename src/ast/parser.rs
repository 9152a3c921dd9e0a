use crate::ast::{self, Ast, ClassItem, Position, Span};
use std::{cell::Cell, result};

type Result<T> = result::Result<T, ast::Error>;

pub const DEFAULT_NEST_LIMIT: u32 = 250;

/// Recursive descent parser for a single pattern.
///
/// ```text
/// alternation := concat ('|' concat)*
/// concat      := repetition*
/// repetition  := primary ('*' | '+' | '?')?
/// primary     := '[' '^'? class ']' | '(' alternation ')' | '.' | literal
/// ```
pub struct Parser {
    p: String,
    pos: Cell<Position>,
    depth: Cell<u32>,
    nest_limit: u32,
}

impl Parser {
    pub fn new(p: String) -> Self {
        Parser {
            p,
            pos: Cell::new(Position::new(0)),
            depth: Cell::new(0),
            nest_limit: DEFAULT_NEST_LIMIT,
        }
    }

    /// Bounds how deeply groups may nest. Parsing recurses once per group.
    pub fn nest_limit(mut self, limit: u32) -> Self {
        self.nest_limit = limit;
        self
    }

    fn pattern(&self) -> &str {
        &self.p
    }

    fn pos(&self) -> Position {
        self.pos.get()
    }

    fn span(&self) -> Span {
        Span::point(self.pos())
    }

    fn span_char(&self) -> Span {
        Span::new(
            self.pos(),
            Position {
                offset: self.offset() + self.char().len_utf8(),
            },
        )
    }

    fn error(&self, span: Span, kind: ast::ErrorKind) -> ast::Error {
        ast::Error {
            kind,
            pattern: self.pattern().to_string(),
            span,
        }
    }

    fn offset(&self) -> usize {
        self.pos().offset
    }

    fn bump(&self) -> bool {
        if self.is_eof() {
            return false;
        }
        self.pos
            .set(Position::new(self.pos().offset + self.char().len_utf8()));
        !self.is_eof()
    }

    fn is_eof(&self) -> bool {
        self.offset() == self.p.len()
    }

    /// The current character. Callers check `is_eof` first.
    fn char(&self) -> char {
        self.char_at(self.offset())
    }

    fn char_at(&self, i: usize) -> char {
        self.pattern()[i..]
            .chars()
            .next()
            .unwrap_or_else(|| panic!("expected char at offset {}", i))
    }

    fn peek(&self) -> Option<char> {
        if self.is_eof() {
            return None;
        }
        self.pattern()[self.offset() + self.char().len_utf8()..]
            .chars()
            .next()
    }

    pub fn parse(&self) -> Result<Ast> {
        let ast = self.parse_alternation()?;
        if !self.is_eof() {
            // An alternation only stops early on a `)` it did not open.
            return Err(self.error(self.span_char(), ast::ErrorKind::GroupUnopened));
        }
        Ok(ast)
    }

    fn parse_alternation(&self) -> Result<Ast> {
        let start = self.pos();
        let mut asts = vec![self.parse_concat()?];
        while !self.is_eof() && self.char() == '|' {
            self.bump();
            asts.push(self.parse_concat()?);
        }
        let alt = ast::Alternation {
            span: Span::new(start, self.pos()),
            asts,
        };
        Ok(alt.into_ast())
    }

    fn parse_concat(&self) -> Result<Ast> {
        let mut concat = ast::Concat::new(self.span());
        while !self.is_eof() && self.char() != '|' && self.char() != ')' {
            concat.asts.push(self.parse_repetition()?);
        }
        concat.span.end = self.pos();
        Ok(concat.into_ast())
    }

    fn parse_repetition(&self) -> Result<Ast> {
        let start = self.pos();
        let ast = self.parse_primary()?;
        if self.is_eof() {
            return Ok(ast);
        }
        let kind = match self.char() {
            '?' => ast::RepetitionKind::ZeroOrOne,
            '*' => ast::RepetitionKind::ZeroOrMore,
            '+' => ast::RepetitionKind::OneOrMore,
            _ => return Ok(ast),
        };
        let op_start = self.pos();
        self.bump();
        Ok(Ast::Repetition(ast::Repetition {
            span: Span::new(start, self.pos()),
            op: ast::RepetitionOp {
                span: Span::new(op_start, self.pos()),
                kind,
            },
            ast: Box::new(ast),
        }))
    }

    fn parse_primary(&self) -> Result<Ast> {
        match self.char() {
            '[' => self.parse_class(),
            '(' => self.parse_group(),
            '.' => {
                let span = self.span_char();
                self.bump();
                Ok(Ast::Dot(ast::Dot { span }))
            }
            '\\' => Ok(Ast::Literal(self.parse_escape()?)),
            '?' | '*' | '+' => {
                Err(self.error(self.span_char(), ast::ErrorKind::RepetitionMissing))
            }
            '^' | '$' => Err(self.error(self.span_char(), ast::ErrorKind::UnsupportedMeta)),
            _ => Ok(Ast::Literal(self.parse_verbatim())),
        }
    }

    fn parse_verbatim(&self) -> ast::Literal {
        let l = ast::Literal {
            span: self.span_char(),
            kind: ast::LiteralKind::Verbatim,
            c: self.char(),
        };
        self.bump();
        l
    }

    fn parse_escape(&self) -> Result<ast::Literal> {
        assert_eq!(self.char(), '\\');
        let start = self.pos();
        if !self.bump() {
            return Err(self.error(
                Span::new(start, self.pos()),
                ast::ErrorKind::EscapeUnexpectedEof,
            ));
        }
        let c = self.char();
        let span = Span::new(start, self.span_char().end);
        if !is_escapable(c) {
            return Err(self.error(span, ast::ErrorKind::EscapeUnrecognized));
        }
        self.bump();
        Ok(ast::Literal {
            span,
            kind: ast::LiteralKind::Escaped,
            c,
        })
    }

    fn parse_group(&self) -> Result<Ast> {
        assert_eq!(self.char(), '(');
        let open = self.span_char();
        let depth = self.depth.get() + 1;
        if depth > self.nest_limit {
            return Err(self.error(
                open,
                ast::ErrorKind::NestLimitExceeded(self.nest_limit),
            ));
        }
        self.depth.set(depth);
        self.bump();

        let ast = self.parse_alternation()?;
        if self.is_eof() {
            return Err(self.error(open, ast::ErrorKind::GroupUnclosed));
        }
        assert_eq!(self.char(), ')');
        self.bump();
        self.depth.set(depth - 1);

        Ok(Ast::Group(ast::Group {
            span: Span::new(open.start, self.pos()),
            ast: Box::new(ast),
        }))
    }

    fn parse_class(&self) -> Result<Ast> {
        assert_eq!(self.char(), '[');
        let open = self.span_char();
        self.bump();
        let negated = !self.is_eof() && self.char() == '^';
        if negated {
            self.bump();
        }

        let mut items = vec![];
        loop {
            if self.is_eof() {
                return Err(self.error(open, ast::ErrorKind::ClassUnclosed));
            }
            if self.char() == ']' {
                break;
            }
            let (lo, lo_span) = self.parse_class_byte()?;
            if self.is_eof() {
                return Err(self.error(open, ast::ErrorKind::ClassUnclosed));
            }
            if self.char() == '-' && !matches!(self.peek(), None | Some(']')) {
                self.bump();
                let (hi, hi_span) = self.parse_class_byte()?;
                if lo > hi {
                    return Err(self.error(
                        Span::new(lo_span.start, hi_span.end),
                        ast::ErrorKind::ClassRangeInvalid,
                    ));
                }
                items.push(ClassItem::Range(lo, hi));
            } else {
                items.push(ClassItem::Byte(lo));
            }
        }
        self.bump();

        let span = Span::new(open.start, self.pos());
        if items.is_empty() {
            return Err(self.error(span, ast::ErrorKind::ClassEmpty));
        }
        Ok(Ast::Class(ast::Class {
            span,
            negated,
            items,
        }))
    }

    fn parse_class_byte(&self) -> Result<(u8, Span)> {
        let lit = if self.char() == '\\' {
            self.parse_escape()?
        } else {
            self.parse_verbatim()
        };
        if !lit.c.is_ascii() {
            return Err(self.error(lit.span, ast::ErrorKind::ClassNotAscii));
        }
        Ok((lit.c as u8, lit.span))
    }
}

fn is_escapable(c: char) -> bool {
    matches!(
        c,
        '.' | '^' | '$' | '|' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '\\' | '-'
    )
}
