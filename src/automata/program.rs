use std::fmt;

/// Index of an instruction inside [`Program::insts`].
pub type InstPtr = usize;

/// Caller-chosen identifier of a rule, reported back on a match.
pub type Tag = u32;

/// A single VM instruction.
///
/// Byte tests (`Char`, `Range`, `AnyChar`) consume one input byte and
/// continue at `pc + 1` in the next step. `NotChar` and `NotRange` inspect
/// the current byte without consuming it and continue at `pc + 1` in the same
/// step, so a run of them followed by `AnyChar` implements a negated class.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Inst {
    Match(Tag),
    AnyChar,
    Char(u8),
    NotChar(u8),
    Range(u8, u8),
    NotRange(u8, u8),
    Split(InstSplit),
    Jmp(InstPtr),
}

/// Forks the thread. `goto1` has priority over `goto2`.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct InstSplit {
    pub goto1: InstPtr,
    pub goto2: InstPtr,
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Inst::Match(tag) => write!(f, "match {}", tag),
            Inst::AnyChar => write!(f, "any"),
            Inst::Char(c) => write!(f, "char '{}'", c.escape_ascii()),
            Inst::NotChar(c) => write!(f, "not char '{}'", c.escape_ascii()),
            Inst::Range(lo, hi) => {
                write!(f, "range '{}', '{}'", lo.escape_ascii(), hi.escape_ascii())
            }
            Inst::NotRange(lo, hi) => {
                write!(f, "not range '{}', '{}'", lo.escape_ascii(), hi.escape_ascii())
            }
            Inst::Split(InstSplit { goto1, goto2 }) => {
                write!(f, "split {:04}, {:04}", goto1, goto2)
            }
            Inst::Jmp(goto) => write!(f, "jmp {:04}", goto),
        }
    }
}

/// Compiled byte-code for an ordered set of rules. Immutable once built.
#[derive(Debug, Eq, PartialEq)]
pub struct Program {
    pub insts: Vec<Inst>,
    pub start: InstPtr,
}

impl Program {
    /// Number of instructions, which also bounds the size of a thread list.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }
}

/// Disassembly listing, one `address: instruction` per line.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pc, inst) in self.insts.iter().enumerate() {
            writeln!(f, "{:04}: {}", pc, inst)?;
        }
        Ok(())
    }
}
