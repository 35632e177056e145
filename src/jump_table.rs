use crate::error::{ProgramError, UnmatchedBracketKind};
use crate::instruction::Instruction;
use crate::program::Program;

/// Matching loop boundaries of a [`Program`], precomputed for O(1) jumps.
///
/// `jumps[i]` holds the partner of the bracket at `i` (either direction) and
/// is `None` for every other instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JumpTable {
    jumps: Vec<Option<usize>>,
    pairs: usize,
}

impl JumpTable {
    /// Pair every `[` with its `]` by nesting depth.
    ///
    /// Fails on the first `]` with nothing to close, or, after the scan, on
    /// the innermost `[` left open.
    pub fn build(program: &Program) -> Result<Self, ProgramError> {
        let mut jumps = vec![None; program.len()];
        let mut stack: Vec<usize> = Vec::new();
        let mut pairs = 0;

        for (ip, op) in program.instructions().iter().enumerate() {
            match op {
                Instruction::LoopStart => stack.push(ip),
                Instruction::LoopEnd => {
                    let Some(open) = stack.pop() else {
                        return Err(unmatched(program, ip, UnmatchedBracketKind::Close));
                    };
                    jumps[open] = Some(ip);
                    jumps[ip] = Some(open);
                    pairs += 1;
                }
                _ => {}
            }
        }

        if let Some(open) = stack.last().copied() {
            return Err(unmatched(program, open, UnmatchedBracketKind::Open));
        }

        Ok(Self { jumps, pairs })
    }

    /// Position of the `]` closing the `[` at `open`.
    pub fn close_for(&self, open: usize) -> Option<usize> {
        self.partner(open).filter(|&close| close > open)
    }

    /// Position of the `[` opened by the `]` at `close`.
    pub fn open_for(&self, close: usize) -> Option<usize> {
        self.partner(close).filter(|&open| open < close)
    }

    /// `(open, close)` pairs in order of the opening bracket.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.jumps
            .iter()
            .enumerate()
            .filter_map(|(ip, jump)| jump.filter(|&close| close > ip).map(|close| (ip, close)))
    }

    /// Number of matched loops.
    pub fn len(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    fn partner(&self, ip: usize) -> Option<usize> {
        self.jumps.get(ip).copied().flatten()
    }
}

fn unmatched(program: &Program, ip: usize, kind: UnmatchedBracketKind) -> ProgramError {
    ProgramError::UnmatchedBracket {
        ip,
        offset: program.source_offset(ip).unwrap_or(ip),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(code: &str) -> Result<JumpTable, ProgramError> {
        JumpTable::build(&Program::parse(code))
    }

    #[test]
    fn no_loops_gives_empty_table() {
        let jumps = table("+-.,<>").expect("valid");
        assert!(jumps.is_empty());
        assert_eq!(jumps.pairs().count(), 0);
    }

    #[test]
    fn adjacent_loops_match_their_own_brackets() {
        let jumps = table("[-][+]").expect("valid");
        assert_eq!(jumps.pairs().collect::<Vec<_>>(), vec![(0, 2), (3, 5)]);
    }

    #[test]
    fn nested_loops_match_by_depth() {
        let jumps = table("[[-]+]").expect("valid");
        assert_eq!(jumps.close_for(0), Some(5));
        assert_eq!(jumps.close_for(1), Some(3));
        assert_eq!(jumps.open_for(5), Some(0));
        assert_eq!(jumps.open_for(3), Some(1));
        assert_eq!(jumps.len(), 2);
    }

    #[test]
    fn lookups_refuse_the_wrong_direction() {
        let jumps = table("[]").expect("valid");
        assert_eq!(jumps.close_for(1), None);
        assert_eq!(jumps.open_for(0), None);
        assert_eq!(jumps.close_for(7), None);
    }

    #[test]
    fn stray_close_is_rejected_with_its_position() {
        let err = table("+ ]").unwrap_err();
        assert_eq!(
            err,
            ProgramError::UnmatchedBracket { ip: 1, offset: 2, kind: UnmatchedBracketKind::Close }
        );
    }

    #[test]
    fn leftover_open_reports_the_innermost() {
        let err = table("[[]").unwrap_err();
        assert_eq!(
            err,
            ProgramError::UnmatchedBracket { ip: 0, offset: 0, kind: UnmatchedBracketKind::Open }
        );
        let err = table("[][[").unwrap_err();
        assert!(matches!(
            err,
            ProgramError::UnmatchedBracket { ip: 3, kind: UnmatchedBracketKind::Open, .. }
        ));
    }

    fn balanced() -> impl Strategy<Value = String> {
        let leaf = "[+\\-<>.,]{0,3}";
        leaf.prop_recursive(4, 64, 4, |inner| {
            prop::collection::vec(inner, 1..4).prop_map(|parts| {
                parts.iter().map(|p| format!("[{p}]")).collect::<String>()
            })
        })
    }

    proptest! {
        #[test]
        fn pairs_are_forward_and_invertible(code in balanced()) {
            let program = Program::parse(&code);
            let jumps = JumpTable::build(&program).expect("balanced input");
            let brackets = program
                .instructions()
                .iter()
                .filter(|op| matches!(op, Instruction::LoopStart | Instruction::LoopEnd))
                .count();
            prop_assert_eq!(jumps.len() * 2, brackets);
            for (open, close) in jumps.pairs() {
                prop_assert!(close > open);
                prop_assert_eq!(program.get(open), Some(Instruction::LoopStart));
                prop_assert_eq!(program.get(close), Some(Instruction::LoopEnd));
                prop_assert_eq!(jumps.open_for(close), Some(open));
            }
        }
    }
}
