use std::io::{self, BufRead, ErrorKind};

/// A character reader over a byte stream with line tracking.
///
/// Decodes UTF-8 one character at a time, so it never needs more than the
/// buffered reader already holds. Invalid sequences decode to U+FFFD.
/// Supports exactly one level of push-back.
pub struct Cursor<R> {
    inner: R,
    /// Newlines consumed so far.
    line: usize,
    /// The most recent read, kept so it can be pushed back.
    last: Option<(char, usize)>,
    /// A pushed back read, returned by the next call to `next_char`.
    pushed: Option<(char, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupClass {
    Newline,
    Space,
    Text,
}

impl GroupClass {
    fn of(ch: char) -> Self {
        if ch == '\n' {
            GroupClass::Newline
        } else if ch.is_whitespace() {
            GroupClass::Space
        } else {
            GroupClass::Text
        }
    }
}

impl<R: BufRead> Cursor<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            last: None,
            pushed: None,
        }
    }

    /// Number of newlines consumed so far.
    pub fn current_line(&self) -> usize {
        self.line
    }

    /// Reads one character and its encoded length in bytes. `None` at end of stream.
    pub fn next_char(&mut self) -> io::Result<Option<(char, usize)>> {
        let next = match self.pushed.take() {
            Some(read) => Some(read),
            None => self.decode_char()?,
        };
        if let Some(('\n', _)) = next {
            self.line += 1;
        }
        self.last = next;
        Ok(next)
    }

    /// Undoes the most recent `next_char`.
    ///
    /// Two push-backs without a read in between are not supported.
    pub fn push_back(&mut self) {
        debug_assert!(self.pushed.is_none(), "cursor supports one push-back");
        if let Some(read) = self.last.take() {
            if read.0 == '\n' {
                self.line -= 1;
            }
            self.pushed = Some(read);
        }
    }

    /// Reads one group: a single newline, a run of other whitespace, or a run
    /// of non-whitespace. `None` only if the stream is already exhausted; a
    /// run cut short by the end of the stream is still returned.
    pub fn read_group(&mut self) -> io::Result<Option<String>> {
        let Some((first, _)) = self.next_char()? else {
            return Ok(None);
        };
        let mut group = String::from(first);
        let class = GroupClass::of(first);
        if class == GroupClass::Newline {
            return Ok(Some(group));
        }

        while let Some((ch, _)) = self.next_char()? {
            if GroupClass::of(ch) != class {
                self.push_back();
                break;
            }
            group.push(ch);
        }
        Ok(Some(group))
    }

    fn decode_char(&mut self) -> io::Result<Option<(char, usize)>> {
        let Some(first) = self.next_byte()? else {
            return Ok(None);
        };
        let width = utf8_width(first);
        if width == 1 {
            return Ok(Some((char::from(first), 1)));
        }
        if width == 0 {
            return Ok(Some((char::REPLACEMENT_CHARACTER, 1)));
        }

        let mut bytes = [first, 0, 0, 0];
        let mut len = 1;
        while len < width {
            match self.peek_byte()? {
                Some(b) if b & 0xC0 == 0x80 => {
                    bytes[len] = b;
                    len += 1;
                    self.inner.consume(1);
                }
                _ => break,
            }
        }

        let ch = std::str::from_utf8(&bytes[..len])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Ok(Some((ch, len)))
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.inner.consume(1);
        }
        Ok(byte)
    }
}

/// Encoded length implied by a UTF-8 leading byte, 0 if it cannot lead a sequence.
fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}
