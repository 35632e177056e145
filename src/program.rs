use crate::instruction::{Dialect, Instruction};

/// A filtered, immutable instruction sequence.
///
/// Every character the dialect does not recognise is dropped, which is how
/// Brainfuck spells comments. The character offset of each kept instruction
/// in the original text is remembered so errors can point back at the source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    offsets: Vec<usize>,
    dialect: Dialect,
}

impl Program {
    /// Filter `source` with the standard eight-instruction dialect.
    pub fn parse(source: &str) -> Self {
        Self::parse_with(source, Dialect::Standard)
    }

    /// Filter `source`, recognising the instructions of `dialect`. Never fails.
    pub fn parse_with(source: &str, dialect: Dialect) -> Self {
        let mut instructions = Vec::new();
        let mut offsets = Vec::new();
        for (offset, ch) in source.chars().enumerate() {
            if let Some(op) = Instruction::from_char(ch, dialect) {
                instructions.push(op);
                offsets.push(offset);
            }
        }
        Self { instructions, offsets, dialect }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, ip: usize) -> Option<Instruction> {
        self.instructions.get(ip).copied()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Character offset in the original source of the instruction at `ip`.
    pub fn source_offset(&self, ip: usize) -> Option<usize> {
        self.offsets.get(ip).copied()
    }

    /// Render the filtered program back to text, comments removed.
    pub fn to_source(&self) -> String {
        self.instructions.iter().map(|op| op.symbol()).collect()
    }
}
