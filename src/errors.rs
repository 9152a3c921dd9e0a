use crate::ast;
use thiserror::Error;

/// Errors returned while compiling a rule table.
///
/// Compilation is all-or-nothing: on error, nothing built so far is kept.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("rule {index}: {source}")]
    Syntax {
        /// Position of the offending rule in the table.
        index: usize,
        #[source]
        source: ast::Error,
    },

    #[error("compiled program exceeds the limit of {limit} instructions")]
    ProgramTooBig { limit: usize },

    #[error("rule table is empty")]
    NoRules,
}

/// No rule matches at `offset`.
///
/// Not fatal to the lexer: the cursor stays put and the caller may
/// [`resync`](crate::lexer::Lexer::resync) past the offending character.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
#[error("no rule matches at offset {offset}")]
pub struct LexError {
    pub offset: usize,
}
