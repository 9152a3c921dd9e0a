use std::result;

use log::debug;
use smallvec::SmallVec;

use crate::{
    ast,
    automata::program::{Inst, InstPtr, InstSplit, Program, Tag},
    errors::Error,
};

/// Default bound on program size, a 16-bit instruction address space.
pub const DEFAULT_MAX_INSTS: usize = 1 << 16;

type Result<T> = result::Result<T, Error>;

/// An instruction whose jump targets may not be known yet.
#[derive(Debug, Eq, PartialEq)]
enum MaybeInst {
    Compiled(Inst),
    Split,
    Jmp,
}

impl MaybeInst {
    fn unwrap(self) -> Inst {
        match self {
            MaybeInst::Compiled(inst) => inst,
            _ => unreachable!(
                "must be called on a compiled instruction, \
                 instead it was called on: {:?}",
                self
            ),
        }
    }

    fn fill_split(&mut self, goto1: InstPtr, goto2: InstPtr) {
        match *self {
            MaybeInst::Split => {}
            _ => unreachable!(
                "must be called on Split instruction, \
                 instead it was called on: {:?}",
                self
            ),
        }
        *self = MaybeInst::Compiled(Inst::Split(InstSplit { goto1, goto2 }));
    }

    fn fill(&mut self, goto: InstPtr) {
        match *self {
            MaybeInst::Jmp => *self = MaybeInst::Compiled(Inst::Jmp(goto)),
            _ => unreachable!("only a Jmp can be filled, got: {:?}", self),
        }
    }
}

/// Placeholder addresses waiting for the same forward target.
type Holes = SmallVec<[InstPtr; 4]>;

/// Lowers an ordered list of patterns into one [`Program`].
///
/// Each pattern but the last is guarded by a `Split` whose second branch
/// leads to the next pattern, so every pattern is tried from the same start
/// and a lower `Match` address means an earlier rule.
pub struct Compiler {
    insts: Vec<MaybeInst>,
    max_insts: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler {
            insts: vec![],
            max_insts: DEFAULT_MAX_INSTS,
        }
    }

    /// Upper bound on the number of emitted instructions.
    pub fn max_insts(mut self, max_insts: usize) -> Compiler {
        self.max_insts = max_insts;
        self
    }

    pub fn compile(mut self, patterns: &[(ast::Ast, Tag)]) -> Result<Program> {
        let ((last, last_tag), init) = patterns.split_last().ok_or(Error::NoRules)?;
        for (ast, tag) in init {
            let split = self.push_hole(MaybeInst::Split)?;
            let body = self.next();
            self.c(ast)?;
            self.push_compiled(Inst::Match(*tag))?;
            let next = self.next();
            self.insts[split].fill_split(body, next);
        }
        self.c(last)?;
        self.push_compiled(Inst::Match(*last_tag))?;

        let mut insts = self
            .insts
            .into_iter()
            .map(MaybeInst::unwrap)
            .collect::<Vec<_>>();
        insts.shrink_to_fit();
        debug!(
            "compiled {} patterns into {} instructions",
            patterns.len(),
            insts.len()
        );
        Ok(Program { insts, start: 0 })
    }

    fn next(&self) -> InstPtr {
        self.insts.len()
    }

    fn push(&mut self, inst: MaybeInst) -> Result<InstPtr> {
        if self.insts.len() >= self.max_insts {
            return Err(Error::ProgramTooBig {
                limit: self.max_insts,
            });
        }
        let pc = self.insts.len();
        self.insts.push(inst);
        Ok(pc)
    }

    fn push_compiled(&mut self, inst: Inst) -> Result<InstPtr> {
        self.push(MaybeInst::Compiled(inst))
    }

    fn push_hole(&mut self, hole: MaybeInst) -> Result<InstPtr> {
        self.push(hole)
    }

    fn fill_to_next(&mut self, holes: Holes) {
        let next = self.next();
        for pc in holes {
            self.insts[pc].fill(next);
        }
    }

    fn c(&mut self, ast: &ast::Ast) -> Result<()> {
        match *ast {
            ast::Ast::Empty(_) => Ok(()),
            ast::Ast::Literal(ref literal) => self.c_char(literal.c),
            ast::Ast::Dot(_) => self.push_compiled(Inst::AnyChar).map(drop),
            ast::Ast::Class(ref class) => self.c_class(class),
            ast::Ast::Concat(ref concat) => concat.asts().iter().try_for_each(|a| self.c(a)),
            ast::Ast::Alternation(ref alternation) => self.c_alternation(&alternation.asts),
            ast::Ast::Repetition(ref repetition) => {
                self.c_repetition(repetition.kind(), repetition.ast.as_ref())
            }
            ast::Ast::Group(ref group) => self.c(group.ast.as_ref()),
        }
    }

    fn c_char(&mut self, c: char) -> Result<()> {
        let mut buf = [0; 4];
        for &b in c.encode_utf8(&mut buf).as_bytes() {
            self.push_compiled(Inst::Char(b))?;
        }
        Ok(())
    }

    /// `split L1, L2; L1: e1; jmp L3; L2: e2; L3:`, nested to the right for
    /// more than two branches.
    fn c_alternation(&mut self, alt: &[ast::Ast]) -> Result<()> {
        self.c_branches(alt, |c, ast| c.c(ast))
    }

    fn c_branches<T, F>(&mut self, branches: &[T], mut emit: F) -> Result<()>
    where
        F: FnMut(&mut Compiler, &T) -> Result<()>,
    {
        let Some((last, init)) = branches.split_last() else {
            return Ok(());
        };
        let mut holes = Holes::new();
        for branch in init {
            let split = self.push_hole(MaybeInst::Split)?;
            let goto1 = self.next();
            emit(self, branch)?;
            holes.push(self.push_hole(MaybeInst::Jmp)?);
            let goto2 = self.next();
            self.insts[split].fill_split(goto1, goto2);
        }
        emit(self, last)?;
        self.fill_to_next(holes);
        Ok(())
    }

    /// A class is an alternation of byte tests. A negated class is a run of
    /// assertions rejecting each excluded byte, then `any` to consume.
    fn c_class(&mut self, class: &ast::Class) -> Result<()> {
        if class.negated {
            for item in &class.items {
                match *item {
                    ast::ClassItem::Byte(b) => self.push_compiled(Inst::NotChar(b))?,
                    ast::ClassItem::Range(lo, hi) => {
                        self.push_compiled(Inst::NotRange(lo, hi))?
                    }
                };
            }
            return self.push_compiled(Inst::AnyChar).map(drop);
        }
        self.c_branches(&class.items, |c, item| {
            let inst = match *item {
                ast::ClassItem::Byte(b) => Inst::Char(b),
                ast::ClassItem::Range(lo, hi) => Inst::Range(lo, hi),
            };
            c.push_compiled(inst).map(drop)
        })
    }

    fn c_repetition(&mut self, kind: ast::RepetitionKind, ast: &ast::Ast) -> Result<()> {
        match kind {
            ast::RepetitionKind::ZeroOrOne => self.c_zero_or_one(ast),
            ast::RepetitionKind::ZeroOrMore => self.c_zero_or_more(ast),
            ast::RepetitionKind::OneOrMore => self.c_one_or_more(ast),
        }
    }

    /// `split L1, L2; L1: e; L2:`
    fn c_zero_or_one(&mut self, ast: &ast::Ast) -> Result<()> {
        let split = self.push_hole(MaybeInst::Split)?;
        let body = self.next();
        self.c(ast)?;
        let next = self.next();
        self.insts[split].fill_split(body, next);
        Ok(())
    }

    /// `L1: split L2, L3; L2: e; jmp L1; L3:`
    fn c_zero_or_more(&mut self, ast: &ast::Ast) -> Result<()> {
        let split = self.push_hole(MaybeInst::Split)?;
        let body = self.next();
        self.c(ast)?;
        self.push_compiled(Inst::Jmp(split))?;
        let next = self.next();
        self.insts[split].fill_split(body, next);
        Ok(())
    }

    /// `L1: e; split L1, L2; L2:`
    fn c_one_or_more(&mut self, ast: &ast::Ast) -> Result<()> {
        let body = self.next();
        self.c(ast)?;
        let split = self.next();
        self.push_compiled(Inst::Split(InstSplit {
            goto1: body,
            goto2: split + 1,
        }))
        .map(drop)
    }
}
