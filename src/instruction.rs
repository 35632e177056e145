use std::fmt;

/// One Brainfuck operation.
///
/// `Inspect` (`#`) is an extension that dumps the start of the tape; it is
/// only recognised by [`Dialect::WithInspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Right,
    Left,
    Increment,
    Decrement,
    Output,
    Input,
    LoopStart,
    LoopEnd,
    Inspect,
}

/// Which characters the loader treats as instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// The eight classic instructions `><+-.,[]`.
    #[default]
    Standard,
    /// The classic set plus `#`.
    WithInspect,
}

impl Instruction {
    /// Decode a source character, or `None` if it is a comment.
    pub fn from_char(ch: char, dialect: Dialect) -> Option<Self> {
        let op = match ch {
            '>' => Instruction::Right,
            '<' => Instruction::Left,
            '+' => Instruction::Increment,
            '-' => Instruction::Decrement,
            '.' => Instruction::Output,
            ',' => Instruction::Input,
            '[' => Instruction::LoopStart,
            ']' => Instruction::LoopEnd,
            '#' if dialect == Dialect::WithInspect => Instruction::Inspect,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> char {
        match self {
            Instruction::Right => '>',
            Instruction::Left => '<',
            Instruction::Increment => '+',
            Instruction::Decrement => '-',
            Instruction::Output => '.',
            Instruction::Input => ',',
            Instruction::LoopStart => '[',
            Instruction::LoopEnd => ']',
            Instruction::Inspect => '#',
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_decode_back_to_the_same_instruction() {
        for ch in "><+-.,[]#".chars() {
            let op = Instruction::from_char(ch, Dialect::WithInspect).expect("known symbol");
            assert_eq!(op.symbol(), ch);
        }
    }

    #[test]
    fn hash_is_a_comment_in_the_standard_dialect() {
        assert_eq!(Instruction::from_char('#', Dialect::Standard), None);
        assert_eq!(Instruction::from_char('#', Dialect::WithInspect), Some(Instruction::Inspect));
    }

    #[test]
    fn other_characters_are_comments() {
        for ch in ['a', ' ', '\n', '0', 'é', '!'] {
            assert_eq!(Instruction::from_char(ch, Dialect::WithInspect), None);
        }
    }
}
