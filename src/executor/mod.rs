use std::mem;

use crate::automata::program::{Inst, InstPtr, InstSplit, Program, Tag};

/// The best match found by one anchored run: which rule, and where it ends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HalfMatch {
    tag: Tag,
    offset: usize,
}

impl HalfMatch {
    pub fn new(tag: Tag, offset: usize) -> HalfMatch {
        HalfMatch { tag, offset }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// One past the last matched byte.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// An insertion-ordered set of instruction pointers.
///
/// Membership is checked through `sparse`, which is never cleared: an entry
/// only counts when `dense` points back at it, so `clear` is O(1).
#[derive(Clone, Debug)]
struct Threads {
    dense: Vec<InstPtr>,
    sparse: Box<[usize]>,
}

impl Threads {
    fn new(capacity: usize) -> Threads {
        Threads {
            dense: Vec::with_capacity(capacity),
            sparse: vec![0; capacity].into_boxed_slice(),
        }
    }

    fn capacity(&self) -> usize {
        self.sparse.len()
    }

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    fn get(&self, i: usize) -> InstPtr {
        self.dense[i]
    }

    fn contains(&self, pc: InstPtr) -> bool {
        let i = self.sparse[pc];
        i < self.dense.len() && self.dense[i] == pc
    }

    /// Returns false if `pc` was already present.
    fn insert(&mut self, pc: InstPtr) -> bool {
        if self.contains(pc) {
            return false;
        }
        self.sparse[pc] = self.dense.len();
        self.dense.push(pc);
        true
    }

    fn clear(&mut self) {
        self.dense.clear();
    }
}

/// Scratch space for [`PikeExecutor::exec`], sized to a program.
///
/// A cache belongs to one session and is reused by every match attempt in
/// it, so matching never allocates once the cache exists.
#[derive(Clone, Debug)]
pub struct Cache {
    clist: Threads,
    nlist: Threads,
}

impl Cache {
    pub fn new(program: &Program) -> Cache {
        Cache {
            clist: Threads::new(program.len()),
            nlist: Threads::new(program.len()),
        }
    }

    /// Clears both thread lists, reallocating only if `program` has a
    /// different size than the one this cache was built for.
    pub fn reset(&mut self, program: &Program) {
        if self.clist.capacity() != program.len() {
            *self = Cache::new(program);
        }
        self.clist.clear();
        self.nlist.clear();
    }
}

/// Simulates every NFA thread of a program in lock step over the input.
///
/// Each address is live at most once per step, so a run costs
/// O(program length) per input byte whatever the patterns look like.
pub struct PikeExecutor<'a> {
    program: &'a Program,
}

impl<'a> PikeExecutor<'a> {
    pub fn new(program: &'a Program) -> PikeExecutor<'a> {
        PikeExecutor { program }
    }

    /// Runs the program anchored at `start`.
    ///
    /// Returns the match ending furthest into `input`; between matches that
    /// end at the same offset, the one whose `Match` instruction has the
    /// lowest address, which is the earliest rule. A `start` past the end of
    /// `input` never matches.
    pub fn exec(&self, cache: &mut Cache, input: &[u8], start: usize) -> Option<HalfMatch> {
        if start > input.len() {
            return None;
        }
        cache.reset(self.program);
        let Cache {
            ref mut clist,
            ref mut nlist,
        } = *cache;

        let mut best: Option<(InstPtr, HalfMatch)> = None;
        let mut at = start;
        clist.insert(self.program.start);
        loop {
            let byte = input.get(at).copied();
            // `clist` grows while it is walked: epsilon transitions and
            // passed assertions add threads for this same offset.
            let mut i = 0;
            while i < clist.len() {
                let pc = clist.get(i);
                i += 1;
                match self.program.insts[pc] {
                    Inst::Match(tag) => {
                        let better = match best {
                            None => true,
                            Some((best_pc, m)) => {
                                at > m.offset || (at == m.offset && pc < best_pc)
                            }
                        };
                        if better {
                            best = Some((pc, HalfMatch::new(tag, at)));
                        }
                    }
                    Inst::AnyChar => {
                        if byte.is_some() {
                            nlist.insert(pc + 1);
                        }
                    }
                    Inst::Char(c) => {
                        if byte == Some(c) {
                            nlist.insert(pc + 1);
                        }
                    }
                    Inst::Range(lo, hi) => {
                        if matches!(byte, Some(b) if lo <= b && b <= hi) {
                            nlist.insert(pc + 1);
                        }
                    }
                    Inst::NotChar(c) => {
                        if matches!(byte, Some(b) if b != c) {
                            clist.insert(pc + 1);
                        }
                    }
                    Inst::NotRange(lo, hi) => {
                        if matches!(byte, Some(b) if b < lo || hi < b) {
                            clist.insert(pc + 1);
                        }
                    }
                    Inst::Split(InstSplit { goto1, goto2 }) => {
                        clist.insert(goto1);
                        clist.insert(goto2);
                    }
                    Inst::Jmp(goto) => {
                        clist.insert(goto);
                    }
                }
            }
            clist.clear();

            if nlist.is_empty() || byte.is_none() {
                break;
            }
            mem::swap(clist, nlist);
            at += 1;
        }
        nlist.clear();
        best.map(|(_, m)| m)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::{Cache, HalfMatch, PikeExecutor};
    use crate::ast::parser::Parser;
    use crate::automata::compiler::Compiler;
    use crate::automata::program::{Inst, InstPtr, InstSplit, Program, Tag};
    use pretty_assertions::assert_eq;

    fn c(rules: &[(&str, Tag)]) -> Program {
        let asts: Vec<_> = rules
            .iter()
            .map(|&(s, tag)| {
                let ast = Parser::new(s.to_string())
                    .parse()
                    .expect("should be valid ast");
                (ast, tag)
            })
            .collect();
        Compiler::new().compile(&asts).expect("should be valid")
    }

    fn pike(program: &Program, input: &str, start: usize) -> Option<HalfMatch> {
        let mut cache = Cache::new(program);
        PikeExecutor::new(program).exec(&mut cache, input.as_bytes(), start)
    }

    fn hm(tag: Tag, offset: usize) -> Option<HalfMatch> {
        Some(HalfMatch::new(tag, offset))
    }

    /// Explores every (instruction, offset) pair reachable from the start by
    /// plain depth-first search. Slow, but obviously right.
    struct RecursiveExecutor<'a> {
        program: &'a Program,
        input: &'a [u8],
        seen: HashSet<(InstPtr, usize)>,
        best: Option<(InstPtr, HalfMatch)>,
    }

    impl<'a> RecursiveExecutor<'a> {
        fn exec(program: &'a Program, input: &'a str, start: usize) -> Option<HalfMatch> {
            let mut ex = RecursiveExecutor {
                program,
                input: input.as_bytes(),
                seen: HashSet::new(),
                best: None,
            };
            ex.m(program.start, start);
            ex.best.map(|(_, m)| m)
        }

        fn m(&mut self, pc: InstPtr, at: usize) {
            if !self.seen.insert((pc, at)) {
                return;
            }
            let byte = self.input.get(at).copied();
            match self.program.insts[pc] {
                Inst::Match(tag) => {
                    let better = match self.best {
                        None => true,
                        Some((best_pc, m)) => {
                            at > m.offset() || (at == m.offset() && pc < best_pc)
                        }
                    };
                    if better {
                        self.best = Some((pc, HalfMatch::new(tag, at)));
                    }
                }
                Inst::AnyChar if byte.is_some() => self.m(pc + 1, at + 1),
                Inst::Char(c) if byte == Some(c) => self.m(pc + 1, at + 1),
                Inst::Range(lo, hi) if matches!(byte, Some(b) if lo <= b && b <= hi) => {
                    self.m(pc + 1, at + 1)
                }
                Inst::NotChar(c) if matches!(byte, Some(b) if b != c) => self.m(pc + 1, at),
                Inst::NotRange(lo, hi) if matches!(byte, Some(b) if b < lo || hi < b) => {
                    self.m(pc + 1, at)
                }
                Inst::Split(InstSplit { goto1, goto2 }) => {
                    self.m(goto1, at);
                    self.m(goto2, at);
                }
                Inst::Jmp(goto) => self.m(goto, at),
                _ => {}
            }
        }
    }

    #[test]
    fn longest_match() {
        let p = &c(&[("[a-z]+", 7)]);
        assert_eq!(pike(p, "hello1", 0), hm(7, 5));
        assert_eq!(pike(p, "hello", 0), hm(7, 5));
        assert_eq!(pike(p, "1hello", 0), None);
        assert_eq!(pike(p, "1hello", 1), hm(7, 6));

        let p = &c(&[("a(bc|cd)*e", 1)]);
        assert_eq!(pike(p, "abccdbcef", 0), hm(1, 8));
        assert_eq!(pike(p, "abccd", 0), None);
    }

    #[test]
    fn zero_width() {
        let p = &c(&[("a?", 1)]);
        assert_eq!(pike(p, "b", 0), hm(1, 0));
        assert_eq!(pike(p, "", 0), hm(1, 0));
        let p = &c(&[("a*", 1)]);
        assert_eq!(pike(p, "b", 0), hm(1, 0));
        assert_eq!(pike(p, "aab", 0), hm(1, 2));
    }

    #[test]
    fn earlier_rule_wins_ties() {
        let p = &c(&[("if", 1), ("[_a-zA-Z][_a-zA-Z0-9]*", 2)]);
        assert_eq!(pike(p, "if", 0), hm(1, 2));
        assert_eq!(pike(p, "if(", 0), hm(1, 2));
        assert_eq!(pike(p, "iffy", 0), hm(2, 4));

        let p = &c(&[("[a-z]+", 2), ("if", 1)]);
        assert_eq!(pike(p, "if", 0), hm(2, 2));
    }

    #[test]
    fn negated_class() {
        let p = &c(&[("[^a]", 1)]);
        assert_eq!(pike(p, "b", 0), hm(1, 1));
        assert_eq!(pike(p, "a", 0), None);
        assert_eq!(pike(p, "", 0), None);

        // The assertions do not consume, the trailing `any` does.
        let p = &c(&[("[^ab]c", 1)]);
        assert_eq!(pike(p, "cc", 0), hm(1, 2));
        assert_eq!(pike(p, "ac", 0), None);
        assert_eq!(pike(p, "bc", 0), None);

        let p = &c(&[("\"[^\"]*\"", 1)]);
        assert_eq!(pike(p, r#""abc" x"#, 0), hm(1, 5));
    }

    #[test]
    fn start_past_end() {
        let p = &c(&[("a*", 1)]);
        assert_eq!(pike(p, "ab", 2), hm(1, 2));
        assert_eq!(pike(p, "ab", 3), None);
        assert_eq!(pike(p, "ab", 5), None);
    }

    #[test]
    fn cache_is_reusable() {
        let p = &c(&[("ab", 1), ("a", 2)]);
        let other = &c(&[("[0-9]+", 3)]);
        let mut cache = Cache::new(p);
        let ex = PikeExecutor::new(p);
        assert_eq!(ex.exec(&mut cache, b"ab", 0), hm(1, 2));
        assert_eq!(ex.exec(&mut cache, b"ac", 0), hm(2, 1));
        assert_eq!(ex.exec(&mut cache, b"c", 0), None);
        // A cache sized for another program is resized on demand.
        assert_eq!(
            PikeExecutor::new(other).exec(&mut cache, b"42", 0),
            hm(3, 2)
        );
    }

    #[test]
    fn pathological_nested_star() {
        let p = &c(&[("(a*)*b", 1)]);
        let input = "a".repeat(20_000);
        assert_eq!(pike(p, &input, 0), None);
        assert_eq!(pike(p, &(input + "b"), 0), hm(1, 20_001));
    }

    #[test]
    fn agrees_with_recursive() {
        let rules: &[&[(&str, Tag)]] = &[
            &[("ab", 1), ("a", 2), ("b*", 3)],
            &[("(a|ab)(c|bcd)(d*)", 1)],
            &[("(a*)*b", 1), ("a+", 2)],
            &[("[^a-c]+x", 1), ("[a-c]+", 2)],
            &[("x?x?x?xxx", 1), ("x*", 2)],
            &[("(a|b|)+c", 1), ("()", 2)],
            &[("if", 1), ("[a-z]+", 2), (".", 3)],
            &[("'(\\\\n|\\\\'|\\\\\\\\|[^\\\\'])'", 1), ("'", 2)],
        ];
        let inputs = [
            "", "a", "ab", "abcd", "abcdd", "aaab", "aaa", "dex", "xxxx", "xx", "abbac",
            "iffy", "if", "'a'", "'\\''", "'\\n'", "''", "zz9",
        ];
        for table in rules {
            let p = &c(table);
            for input in inputs {
                for start in 0..=input.len() {
                    assert_eq!(
                        pike(p, input, start),
                        RecursiveExecutor::exec(p, input, start),
                        "rules {:?} on {:?} at {}",
                        table,
                        input,
                        start
                    );
                }
            }
        }
    }
}
