/*! A regular-expression driven lexer.

Patterns are parsed into an [`ast::Ast`], compiled together into one
[`automata::program::Program`] and run by a Pike VM
([`executor::PikeExecutor`]) that reports the longest match anchored at a
given offset. [`lexer::Lexer`] drives the VM over an input to produce
tokens.

```
use pikelex::Lexer;

const NUM: u32 = 1;
const ID: u32 = 2;

let mut lexer = Lexer::new([("[0-9]+", NUM), ("[a-z][a-z0-9]*", ID)], "x86").unwrap();
let token = lexer.next_token().unwrap().unwrap();
assert_eq!((token.tag(), token.as_str()), (ID, Some("x86")));
assert!(lexer.next_token().is_none());
```
*/

pub mod ast;
pub mod automata;
pub mod errors;
pub mod executor;
pub mod lexer;

pub use automata::program::Tag;
pub use errors::{Error, LexError};
pub use lexer::{Lexer, LexerBuilder, Rule, Token};
