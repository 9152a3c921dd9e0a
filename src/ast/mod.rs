use std::fmt;
use thiserror::Error;

pub mod parser;

/// A parsed pattern.
///
/// Every node owns its children through `Box`/`Vec`, so dropping the root
/// releases the whole tree.
#[derive(Debug, PartialEq, Eq)]
pub enum Ast {
    /// Matches the empty string, e.g. `()` or either side of `a|`.
    Empty(Empty),
    /// A single (possibly escaped) character.
    Literal(Literal),
    /// `.`, any single byte.
    Dot(Dot),
    /// `[...]` or `[^...]`.
    Class(Class),
    Concat(Concat),
    Alternation(Alternation),
    Repetition(Repetition),
    Group(Group),
}

impl Ast {
    pub fn span(&self) -> &Span {
        match *self {
            Ast::Empty(ref x) => &x.span,
            Ast::Literal(ref x) => &x.span,
            Ast::Dot(ref x) => &x.span,
            Ast::Class(ref x) => &x.span,
            Ast::Concat(ref x) => &x.span,
            Ast::Alternation(ref x) => &x.span,
            Ast::Repetition(ref x) => &x.span,
            Ast::Group(ref x) => &x.span,
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = depth * 2;
        match *self {
            Ast::Empty(_) => writeln!(f, "{:pad$}Empty", ""),
            Ast::Literal(ref lit) => writeln!(f, "{:pad$}Literal {:?}", "", lit.c),
            Ast::Dot(_) => writeln!(f, "{:pad$}Dot", ""),
            Ast::Class(ref class) => writeln!(f, "{:pad$}Class {}", "", class),
            Ast::Concat(ref concat) => {
                writeln!(f, "{:pad$}Concat", "")?;
                concat.asts.iter().try_for_each(|a| a.fmt_tree(f, depth + 1))
            }
            Ast::Alternation(ref alt) => {
                writeln!(f, "{:pad$}Alternation", "")?;
                alt.asts.iter().try_for_each(|a| a.fmt_tree(f, depth + 1))
            }
            Ast::Repetition(ref rep) => {
                writeln!(f, "{:pad$}Repetition {}", "", rep.op.kind)?;
                rep.ast.fmt_tree(f, depth + 1)
            }
            Ast::Group(ref group) => {
                writeln!(f, "{:pad$}Group", "")?;
                group.ast.fmt_tree(f, depth + 1)
            }
        }
    }
}

/// Renders the tree one node per line, children indented below parents.
impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

#[derive(PartialEq, Debug, Eq)]
pub struct Alternation {
    span: Span,
    pub asts: Vec<Ast>,
}

impl Alternation {
    pub fn into_ast(mut self) -> Ast {
        match self.asts.len() {
            0 => Ast::Empty(Empty { span: self.span }),
            1 => self.asts.pop().expect("length checked"),
            _ => Ast::Alternation(self),
        }
    }
}

#[derive(PartialEq, Debug, Eq)]
pub struct Group {
    span: Span,
    pub ast: Box<Ast>,
}

#[derive(PartialEq, Debug, Eq)]
pub struct Empty {
    span: Span,
}

#[derive(PartialEq, Debug, Eq)]
pub struct Dot {
    span: Span,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Concat {
    span: Span,
    pub asts: Vec<Ast>,
}

impl Concat {
    fn new(span: Span) -> Concat {
        Concat { span, asts: vec![] }
    }

    fn into_ast(mut self) -> Ast {
        match self.asts.len() {
            0 => Ast::Empty(Empty { span: self.span }),
            1 => self.asts.pop().expect("length checked"),
            _ => Ast::Concat(self),
        }
    }

    pub fn asts(&self) -> &[Ast] {
        self.asts.as_ref()
    }
}

#[derive(PartialEq, Debug, Eq)]
pub struct Literal {
    span: Span,
    pub kind: LiteralKind,
    pub c: char,
}

#[derive(PartialEq, Debug, Eq)]
pub enum LiteralKind {
    Verbatim, // `a` or `0`
    Escaped,  // `\*` or `\[`
}

/// A bracketed character class. Only ASCII bytes and byte ranges can appear
/// inside, so a negated class never contains `.`, a concatenation or a
/// repetition.
#[derive(PartialEq, Debug, Eq)]
pub struct Class {
    span: Span,
    pub negated: bool,
    pub items: Vec<ClassItem>,
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.negated { "[^" } else { "[" })?;
        for item in &self.items {
            match *item {
                ClassItem::Byte(b) => write!(f, "{}", b.escape_ascii())?,
                ClassItem::Range(lo, hi) => {
                    write!(f, "{}-{}", lo.escape_ascii(), hi.escape_ascii())?
                }
            }
        }
        f.write_str("]")
    }
}

#[derive(PartialEq, Debug, Eq, Clone, Copy)]
pub enum ClassItem {
    Byte(u8),
    /// Inclusive on both ends, `lo <= hi`.
    Range(u8, u8),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Repetition {
    span: Span,
    pub op: RepetitionOp,
    pub ast: Box<Ast>,
}

impl Repetition {
    pub fn kind(&self) -> RepetitionKind {
        self.op.kind
    }
}

#[derive(PartialEq, Debug, Eq)]
pub struct RepetitionOp {
    span: Span,
    pub kind: RepetitionKind,
}

#[derive(PartialEq, Debug, Eq, Copy, Clone)]
pub enum RepetitionKind {
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl fmt::Display for RepetitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            RepetitionKind::ZeroOrOne => "?",
            RepetitionKind::ZeroOrMore => "*",
            RepetitionKind::OneOrMore => "+",
        })
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Position {
    pub offset: usize,
}

impl Position {
    pub fn new(offset: usize) -> Position {
        Position { offset }
    }
}

/// A half-open byte range into the pattern.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Span {
    start: Position,
    end: Position,
}

impl Span {
    pub fn point(pos: Position) -> Span {
        Span {
            start: pos,
            end: pos,
        }
    }

    pub(crate) fn new(start: Position, end: Position) -> Span {
        Span { start, end }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({:?}, {:?})", self.start, self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.offset, self.end.offset)
    }
}

/// A syntax error found while parsing a single pattern.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind} at {span} in pattern `{pattern}`")]
pub struct Error {
    kind: ErrorKind,
    pattern: String,
    span: Span,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ErrorKind {
    #[error("repetition operator missing expression")]
    RepetitionMissing,
    #[error("unopened group")]
    GroupUnopened,
    #[error("unclosed group")]
    GroupUnclosed,
    #[error("unclosed character class")]
    ClassUnclosed,
    #[error("empty character class")]
    ClassEmpty,
    #[error("invalid character class range, the start must be <= the end")]
    ClassRangeInvalid,
    #[error("character classes only support ASCII")]
    ClassNotAscii,
    #[error("incomplete escape sequence, reached end of pattern")]
    EscapeUnexpectedEof,
    #[error("unrecognized escape sequence")]
    EscapeUnrecognized,
    #[error("unsupported meta character")]
    UnsupportedMeta,
    #[error("exceeded the maximum group nesting depth ({0})")]
    NestLimitExceeded(u32),
}
