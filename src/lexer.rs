use std::ops::Range;

use log::{debug, trace};
use smallvec::SmallVec;

use crate::ast::parser::{Parser, DEFAULT_NEST_LIMIT};
use crate::automata::compiler::{Compiler, DEFAULT_MAX_INSTS};
use crate::automata::program::{Program, Tag};
use crate::errors::{Error, LexError};
use crate::executor::{Cache, PikeExecutor};

/// One entry of a rule table: a pattern and the tag reported when it wins.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rule<'p> {
    pub pattern: &'p str,
    pub tag: Tag,
}

impl<'p> Rule<'p> {
    pub fn new(pattern: &'p str, tag: Tag) -> Rule<'p> {
        Rule { pattern, tag }
    }
}

impl<'p> From<(&'p str, Tag)> for Rule<'p> {
    fn from((pattern, tag): (&'p str, Tag)) -> Self {
        Rule { pattern, tag }
    }
}

/// Builder for a [`Lexer`].
///
/// Rule order matters: when two rules match the same number of bytes, the
/// one added first wins.
///
/// # Examples
///
/// ```
/// use pikelex::lexer::LexerBuilder;
///
/// const ID: u32 = 1;
/// const WS: u32 = 2;
///
/// let lexer = LexerBuilder::new()
///     .rule("[a-z]+", ID)
///     .rule(" +", WS)
///     .skip(WS)
///     .build("let  x")
///     .unwrap();
/// let words: Vec<_> = lexer.map(|t| t.unwrap().as_str().unwrap()).collect();
/// assert_eq!(words, vec!["let", "x"]);
/// ```
#[derive(Clone, Debug)]
pub struct LexerBuilder {
    rules: Vec<(String, Tag)>,
    skip: SmallVec<[Tag; 4]>,
    nest_limit: u32,
    max_insts: usize,
}

impl Default for LexerBuilder {
    fn default() -> Self {
        LexerBuilder::new()
    }
}

impl LexerBuilder {
    pub fn new() -> Self {
        LexerBuilder {
            rules: vec![],
            skip: SmallVec::new(),
            nest_limit: DEFAULT_NEST_LIMIT,
            max_insts: DEFAULT_MAX_INSTS,
        }
    }

    /// Appends a rule to the table.
    pub fn rule(mut self, pattern: &str, tag: Tag) -> Self {
        self.rules.push((pattern.to_owned(), tag));
        self
    }

    /// Appends every rule of `rules`, in order.
    pub fn rules<'p, I, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule<'p>>,
    {
        for rule in rules {
            let Rule { pattern, tag } = rule.into();
            self.rules.push((pattern.to_owned(), tag));
        }
        self
    }

    /// Tokens tagged `tag` are consumed without being returned. Empty
    /// matches are still returned so that the caller sees them.
    pub fn skip(mut self, tag: Tag) -> Self {
        if !self.skip.contains(&tag) {
            self.skip.push(tag);
        }
        self
    }

    /// Maximum group nesting depth accepted in a pattern.
    pub fn nest_limit(mut self, limit: u32) -> Self {
        self.nest_limit = limit;
        self
    }

    /// Maximum number of instructions of the compiled program.
    pub fn max_insts(mut self, max_insts: usize) -> Self {
        self.max_insts = max_insts;
        self
    }

    /// Parses and compiles the whole table. Any malformed pattern aborts
    /// compilation; the error carries the index of the rule.
    pub fn compile(&self) -> Result<Program, Error> {
        let asts = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, (pattern, tag))| {
                Parser::new(pattern.clone())
                    .nest_limit(self.nest_limit)
                    .parse()
                    .map(|ast| (ast, *tag))
                    .map_err(|source| Error::Syntax { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Compiler::new().max_insts(self.max_insts).compile(&asts)
    }

    pub fn build<'t>(&self, input: &'t str) -> Result<Lexer<'t>, Error> {
        let program = self.compile()?;
        debug!("lexer ready: {} skipped tags", self.skip.len());
        Ok(Lexer {
            cache: Cache::new(&program),
            program,
            skip: self.skip.clone(),
            input,
            pos: 0,
            end: false,
        })
    }
}

/// A maximal-munch tokenizer over one input string.
///
/// Every call to [`next_token`](Lexer::next_token) runs the compiled rules
/// anchored at the cursor and advances it past the longest match. The
/// compiled program and the scratch thread lists live as long as the lexer.
///
/// A rule that can match the empty string produces an empty token without
/// moving the cursor; calling again yields the same token forever.
pub struct Lexer<'t> {
    program: Program,
    cache: Cache,
    skip: SmallVec<[Tag; 4]>,
    input: &'t str,
    pos: usize,
    end: bool,
}

impl<'t> Lexer<'t> {
    /// Compiles `rules` with default options and starts lexing `input`.
    pub fn new<'p, I, R>(rules: I, input: &'t str) -> Result<Lexer<'t>, Error>
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule<'p>>,
    {
        LexerBuilder::new().rules(rules).build(input)
    }

    pub fn builder() -> LexerBuilder {
        LexerBuilder::new()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True once a match has reached the end of the input.
    pub fn is_end(&self) -> bool {
        self.end
    }

    /// Produces the next token.
    ///
    /// Returns `None` once the end of the input has been reached, and
    /// `Some(Err(_))` if no rule matches at the cursor, in which case the
    /// cursor does not move.
    pub fn next_token(&mut self) -> Option<Result<Token<'t>, LexError>> {
        loop {
            if self.end {
                return None;
            }
            let start = self.pos;
            let input = self.input.as_bytes();
            let m = match PikeExecutor::new(&self.program).exec(&mut self.cache, input, start) {
                Some(m) => m,
                None => {
                    trace!("no rule matches at offset {}", start);
                    self.end = start == input.len();
                    return Some(Err(LexError { offset: start }));
                }
            };
            self.pos = m.offset();
            self.end = self.pos == input.len();
            let token = Token {
                tag: m.tag(),
                input,
                start,
                end: self.pos,
                last: self.end,
            };
            if !token.is_empty() && self.skip.contains(&token.tag) {
                continue;
            }
            trace!("token {} at {}..{}", token.tag, token.start, token.end);
            return Some(Ok(token));
        }
    }

    /// Moves the cursor past the character under it, to recover from a
    /// [`LexError`]. Returns false if the cursor was already at the end.
    pub fn resync(&mut self) -> bool {
        if self.pos >= self.input.len() {
            self.end = true;
            return false;
        }
        self.pos += 1;
        while !self.input.is_char_boundary(self.pos) {
            self.pos += 1;
        }
        self.end = self.pos == self.input.len();
        true
    }

    /// Reuses the compiled rules and scratch space for another input.
    pub fn rebind<'u>(self, input: &'u str) -> Lexer<'u> {
        Lexer {
            program: self.program,
            cache: self.cache,
            skip: self.skip,
            input,
            pos: 0,
            end: false,
        }
    }
}

impl<'t> Iterator for Lexer<'t> {
    type Item = Result<Token<'t>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("pos", &self.pos)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

/// A matched token referencing the lexed input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Token<'t> {
    tag: Tag,
    input: &'t [u8],
    start: usize,
    end: usize,
    last: bool,
}

impl<'t> Token<'t> {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset one past the token.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if this token reaches the end of the input.
    pub fn is_last(&self) -> bool {
        self.last
    }

    pub fn as_bytes(&self) -> &'t [u8] {
        &self.input[self.start..self.end]
    }

    /// The token text, or `None` if `.` split a multi-byte character.
    pub fn as_str(&self) -> Option<&'t str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WS: Tag = 0;
    const ID: Tag = 1;

    fn tokens(lexer: Lexer<'_>) -> Vec<(Tag, usize, usize)> {
        lexer
            .map(|t| {
                let t = t.expect("should lex");
                (t.tag(), t.start(), t.end())
            })
            .collect()
    }

    #[test]
    fn cursor_advances() {
        let mut lexer = Lexer::new([(" ", WS), ("[a-z]", ID)], "  x").unwrap();
        let t = lexer.next_token().unwrap().unwrap();
        assert_eq!((t.tag(), t.len(), lexer.position()), (WS, 1, 1));
        let t = lexer.next_token().unwrap().unwrap();
        assert_eq!((t.tag(), t.len(), lexer.position()), (WS, 1, 2));
        assert!(!lexer.is_end());
        let t = lexer.next_token().unwrap().unwrap();
        assert_eq!((t.tag(), t.len(), lexer.position()), (ID, 1, 3));
        assert!(t.is_last());
        assert!(lexer.is_end());
        assert_eq!(lexer.next_token(), None);
        assert_eq!(lexer.next_token(), None);
    }

    #[test]
    fn skip_tags() {
        let lexer = LexerBuilder::new()
            .rule(" +", WS)
            .rule("[a-z]+", ID)
            .skip(WS)
            .build(" ab  cd ")
            .unwrap();
        assert_eq!(tokens(lexer), vec![(ID, 1, 3), (ID, 5, 7)]);
    }

    #[test]
    fn empty_input() {
        let mut lexer = Lexer::new([("a*", ID)], "").unwrap();
        let t = lexer.next_token().unwrap().unwrap();
        assert!(t.is_empty() && t.is_last());
        assert_eq!(lexer.next_token(), None);

        let mut lexer = Lexer::new([("a", ID)], "").unwrap();
        assert_eq!(lexer.next_token(), Some(Err(LexError { offset: 0 })));
        assert_eq!(lexer.next_token(), None);
    }

    #[test]
    fn lexical_error_and_resync() {
        let mut lexer = Lexer::new([("[a-z]+", ID)], "ab€cd").unwrap();
        assert_eq!(lexer.next_token().unwrap().unwrap().range(), 0..2);
        assert_eq!(lexer.next_token(), Some(Err(LexError { offset: 2 })));
        assert_eq!(lexer.next_token(), Some(Err(LexError { offset: 2 })));
        assert!(lexer.resync());
        assert_eq!(lexer.position(), 5);
        assert_eq!(lexer.next_token().unwrap().unwrap().as_str(), Some("cd"));
        assert_eq!(lexer.next_token(), None);
        assert!(!lexer.resync());
    }

    #[test]
    fn rebind_keeps_rules() {
        let lexer = LexerBuilder::new()
            .rule("[0-9]+", ID)
            .rule(" ", WS)
            .skip(WS)
            .build("1 22")
            .unwrap();
        let insts = lexer.program().len();
        let lexer = lexer.rebind("333 4");
        assert_eq!(lexer.program().len(), insts);
        assert_eq!(tokens(lexer), vec![(ID, 0, 3), (ID, 4, 5)]);
    }

    #[test]
    fn syntax_error_names_rule() {
        let err = Lexer::new([("a", ID), ("b", ID), ("(c", ID)], "abc").unwrap_err();
        match err {
            Error::Syntax { index, source } => {
                assert_eq!(index, 2);
                assert_eq!(source.pattern(), "(c");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let empty: [Rule<'_>; 0] = [];
        assert_eq!(Lexer::new(empty, "x").unwrap_err(), Error::NoRules);
    }

    #[test]
    fn max_insts() {
        let err = LexerBuilder::new()
            .rule("abcdef", ID)
            .max_insts(4)
            .build("abcdef")
            .unwrap_err();
        assert_eq!(err, Error::ProgramTooBig { limit: 4 });
    }

    #[test]
    fn dot_may_split_characters() {
        let mut lexer = Lexer::new([(".", ID)], "é").unwrap();
        let t = lexer.next_token().unwrap().unwrap();
        assert_eq!(t.as_bytes(), &[0xc3]);
        assert_eq!(t.as_str(), None);
    }
}
