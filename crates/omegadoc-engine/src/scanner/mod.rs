// The examples below describe the syntax and are not documents themselves.
// #!/usr/bin/env omegadoc ignore-this-file

//! Extraction scanner.
//!
//! Finds embedded documents in a byte stream. A document opens with the
//! marker followed by `<<IDENT`, optional `key:value` attributes and a
//! destination path on the same line. The body runs from the next line up to
//! the next literal `IDENT`, or to the end of the stream:
//!
//! ```text
//! #!/usr/bin/env omegadoc <<IDENT section:intro docs/overview.md
//! Everything here ends up in docs/overview.md.
//! IDENT
//! ```
//!
//! The marker followed by `ignore-this-file` before any document has been
//! completed makes the scanner return nothing for the whole stream.
//!
//! The scan is a pull-based state machine over [`Cursor`]: one state per
//! stage, each stage a method returning the next state.

pub mod cursor;
pub mod matcher;


use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::models::{Document, PendingDocument};
use cursor::Cursor;
use matcher::SentinelMatcher;

/// The marker, as the sequence of groups the cursor produces for it.
pub const MARKER_PIECES: [&str; 4] = ["#!/usr/bin/env", " ", "omegadoc", " "];

/// Follows the marker to open a document; the rest of the token is the
/// delimiting identifier.
pub const BEGIN_PREFIX: &str = "<<";

/// Follows the marker to form the ignore directive.
pub const IGNORE_DIRECTIVE: &str = "ignore-this-file";

/// Full opening statement prefix, as it appears in a file.
pub const BEGIN_MARKER: &str = "#!/usr/bin/env omegadoc <<";

/// Full ignore directive, as it appears in a file.
pub const IGNORE_MARKER: &str = "#!/usr/bin/env omegadoc ignore-this-file";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error(
        "malformed attribute {token:?} on line {line} of {}: expected key:value",
        .path.display()
    )]
    MalformedAttribute {
        path: PathBuf,
        line: usize,
        token: String,
    },
}

impl ScanError {
    /// The stream the error occurred in.
    pub fn path(&self) -> &Path {
        match self {
            ScanError::Io { path, .. } | ScanError::MalformedAttribute { path, .. } => path,
        }
    }
}

/// Extracts every document in `reader`, in stream order.
///
/// `source_path` is only recorded on the documents and in errors.
pub fn parse_documents<R: Read>(source_path: &Path, reader: R) -> Result<Vec<Document>, ScanError> {
    Scan {
        source_path,
        cursor: Cursor::new(BufReader::new(reader)),
        documents: Vec::new(),
    }
    .run()
}

#[derive(Debug)]
enum State {
    SeekingMarker,
    Dispatching,
    ParsingHeader(PendingDocument),
    CapturingBody(PendingDocument),
    Finished,
}

struct Scan<'a, R> {
    source_path: &'a Path,
    cursor: Cursor<R>,
    documents: Vec<Document>,
}

impl<R: io::BufRead> Scan<'_, R> {
    fn run(mut self) -> Result<Vec<Document>, ScanError> {
        let mut state = State::SeekingMarker;
        loop {
            state = match state {
                State::SeekingMarker => self.seek_marker()?,
                State::Dispatching => self.dispatch()?,
                State::ParsingHeader(pending) => self.parse_header(pending)?,
                State::CapturingBody(pending) => self.capture_body(pending)?,
                State::Finished => return Ok(self.documents),
            };
        }
    }

    /// Consumes groups until the whole marker has been read.
    ///
    /// A group that breaks a partial match is checked again against the first
    /// marker piece instead of being skipped, so
    /// `#!/usr/bin/env #!/usr/bin/env omegadoc <<X` still opens a document.
    fn seek_marker(&mut self) -> Result<State, ScanError> {
        let mut matched = 0;
        while let Some(group) = self.read_group()? {
            if group == MARKER_PIECES[matched] {
                matched += 1;
            } else {
                matched = usize::from(group == MARKER_PIECES[0]);
            }
            if matched == MARKER_PIECES.len() {
                return Ok(State::Dispatching);
            }
        }
        Ok(State::Finished)
    }

    fn dispatch(&mut self) -> Result<State, ScanError> {
        let Some(group) = self.read_group()? else {
            return Ok(State::Finished);
        };

        if group == IGNORE_DIRECTIVE {
            if self.documents.is_empty() {
                log::debug!(
                    "{}: ignore directive on line {}, skipping file",
                    self.source_path.display(),
                    self.cursor.current_line()
                );
                return Ok(State::Finished);
            }
            log::debug!(
                "{}: ignore directive on line {} follows a document and has no effect",
                self.source_path.display(),
                self.cursor.current_line()
            );
            return Ok(State::SeekingMarker);
        }

        match group.strip_prefix(BEGIN_PREFIX) {
            Some(delimiter) if !delimiter.is_empty() => {
                let start_line = self.cursor.current_line();
                log::debug!(
                    "{}: found beginning of document on line {start_line} (delimiter {delimiter:?})",
                    self.source_path.display()
                );
                Ok(State::ParsingHeader(PendingDocument::new(
                    self.source_path,
                    delimiter.to_string(),
                    start_line,
                )))
            }
            _ => Ok(State::SeekingMarker),
        }
    }

    /// Reads attributes up to the destination path, then the path itself.
    fn parse_header(&mut self, mut pending: PendingDocument) -> Result<State, ScanError> {
        while let Some(group) = self.read_group()? {
            if group == "\n" {
                log::debug!(
                    "{}: document on line {} has no destination path, dropping it",
                    self.source_path.display(),
                    self.cursor.current_line() - 1
                );
                return Ok(State::SeekingMarker);
            }
            if group.starts_with(char::is_whitespace) {
                continue;
            }
            if group.contains(':') {
                let (key, value) = self.split_attribute(&group)?;
                pending.push_attribute(key, value);
                continue;
            }

            pending.push_path(&group);
            return self.read_destination(pending);
        }
        Ok(State::Finished)
    }

    /// The path runs to the end of the line, spaces included.
    fn read_destination(&mut self, mut pending: PendingDocument) -> Result<State, ScanError> {
        while let Some(ch) = self.next_char()? {
            if ch == '\n' {
                return Ok(State::CapturingBody(pending));
            }
            pending.push_path_char(ch);
        }
        Ok(State::Finished)
    }

    fn capture_body(&mut self, mut pending: PendingDocument) -> Result<State, ScanError> {
        let mut matcher = SentinelMatcher::new(pending.delimiter());
        while let Some(ch) = self.next_char()? {
            pending.push_body_char(ch);
            if matcher.push(ch) {
                pending.strip_sentinel();
                self.finalize(pending);
                return Ok(State::SeekingMarker);
            }
        }

        // Running out of input is a valid way to end a document.
        log::debug!(
            "{}: stream ended inside a document body ({} characters of {:?} matched)",
            self.source_path.display(),
            matcher.matched(),
            pending.delimiter()
        );
        self.finalize(pending);
        Ok(State::Finished)
    }

    fn finalize(&mut self, pending: PendingDocument) {
        if let Some(doc) = pending.finish() {
            log::debug!(
                "{}: extracted document for {:?} ({} bytes)",
                self.source_path.display(),
                doc.destination_path,
                doc.body.len()
            );
            self.documents.push(doc);
        }
    }

    /// Splits on the first `:`. Either side may be empty.
    fn split_attribute<'g>(&self, token: &'g str) -> Result<(&'g str, &'g str), ScanError> {
        match token.split_once(':') {
            Some(pair) => Ok(pair),
            None => Err(ScanError::MalformedAttribute {
                path: self.source_path.to_path_buf(),
                line: self.cursor.current_line(),
                token: token.to_string(),
            }),
        }
    }

    fn read_group(&mut self) -> Result<Option<String>, ScanError> {
        self.cursor.read_group().map_err(|source| ScanError::Io {
            path: self.source_path.to_path_buf(),
            source,
        })
    }

    fn next_char(&mut self) -> Result<Option<char>, ScanError> {
        match self.cursor.next_char() {
            Ok(read) => Ok(read.map(|(ch, _)| ch)),
            Err(source) => Err(ScanError::Io {
                path: self.source_path.to_path_buf(),
                source,
            }),
        }
    }
}
