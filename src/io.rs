//! Character I/O seen by the machine.
//!
//! The machine never touches process streams directly: `,` and `.` go through
//! a [`CharIo`], so tests and embedders can swap stdin/stdout for buffers.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::machine::Snapshot;

/// One-character-at-a-time input and output.
pub trait CharIo {
    /// Next input code point, or `None` at end of input.
    fn read_char(&mut self) -> io::Result<Option<u32>>;

    /// Emit the character whose code point is `code`.
    fn write_char(&mut self, code: u32) -> io::Result<()>;

    /// Receive a tape dump produced by `#`.
    fn inspect(&mut self, _snapshot: &Snapshot) -> io::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: CharIo + ?Sized> CharIo for &mut T {
    fn read_char(&mut self) -> io::Result<Option<u32>> {
        (**self).read_char()
    }

    fn write_char(&mut self, code: u32) -> io::Result<()> {
        (**self).write_char(code)
    }

    fn inspect(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        (**self).inspect(snapshot)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// UTF-8 byte streams: input decoded one character at a time, output encoded
/// as UTF-8. Tape dumps go to stderr so stdout carries only program output.
pub struct StreamIo<R, W> {
    reader: R,
    writer: W,
}

/// The process's stdin and stdout.
pub type StdIo = StreamIo<io::Stdin, io::Stdout>;

impl StdIo {
    pub fn stdio() -> Self {
        StreamIo::new(io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> StreamIo<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: Read, W: Write> CharIo for StreamIo<R, W> {
    /// End of input is only reported between characters. A stream that stops
    /// inside a multi-byte character is malformed input, not end of input, and
    /// fails with `InvalidData`.
    fn read_char(&mut self) -> io::Result<Option<u32>> {
        let mut buf = [0u8; 4];
        loop {
            match self.reader.read(&mut buf[..1]) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let width = utf8_width(buf[0])
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "input is not valid UTF-8"))?;
        self.reader.read_exact(&mut buf[1..width]).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                io::Error::new(io::ErrorKind::InvalidData, "input ends inside a UTF-8 character")
            }
            _ => e,
        })?;
        let decoded = std::str::from_utf8(&buf[..width])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(decoded.chars().next().map(u32::from))
    }

    fn write_char(&mut self, code: u32) -> io::Result<()> {
        let ch = char::from_u32(code).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("cell value {code:#x} is not a Unicode scalar value"),
            )
        })?;
        let mut buf = [0u8; 4];
        self.writer.write_all(ch.encode_utf8(&mut buf).as_bytes())
    }

    fn inspect(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        self.writer.flush()?;
        let mut stderr = io::stderr().lock();
        write!(stderr, "{}", snapshot.render())?;
        stderr.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

/// In-memory input queue and output buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryIo {
    input: VecDeque<u32>,
    output: Vec<u32>,
    snapshots: Vec<Snapshot>,
}

impl MemoryIo {
    /// Queue the characters of `input` for `,` to consume.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().map(u32::from).collect(),
            ..Self::default()
        }
    }

    pub fn from_codes(input: impl IntoIterator<Item = u32>) -> Self {
        Self {
            input: input.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn output(&self) -> &[u32] {
        &self.output
    }

    /// Output as text; code points that are not characters become U+FFFD.
    pub fn output_string(&self) -> String {
        self.output
            .iter()
            .map(|&code| char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    pub fn take_output(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.output)
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }
}

impl CharIo for MemoryIo {
    fn read_char(&mut self) -> io::Result<Option<u32>> {
        Ok(self.input.pop_front())
    }

    fn write_char(&mut self, code: u32) -> io::Result<()> {
        self.output.push(code);
        Ok(())
    }

    fn inspect(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}
