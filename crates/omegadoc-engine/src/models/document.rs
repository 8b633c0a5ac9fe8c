use std::path::{Path, PathBuf};

/// A `key:value` pair declared in a document header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One extracted document together with its destination and provenance.
///
/// Produced by the scanner once a block is complete; postprocessors build new
/// values rather than editing a scanned document in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    /// The stream the document was found in.
    pub source_path: PathBuf,
    /// Where the body should be written, relative to the output root. Kept
    /// verbatim, including trailing whitespace.
    pub destination_path: String,
    /// Header attributes in declaration order. Duplicate keys are kept.
    pub attributes: Vec<Attribute>,
    /// Everything between the header line and the closing identifier.
    pub body: String,
    /// Newlines consumed before the opening statement was recognized (0-based).
    pub start_line: usize,
    /// Browsable link to the source, filled in after extraction.
    pub source_url: Option<String>,
}

impl Document {
    /// Value of the first attribute whose key matches `key` case-insensitively.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key.eq_ignore_ascii_case(key))
            .map(|attr| attr.value.as_str())
    }

    pub fn is_markdown(&self) -> bool {
        self.destination_path.ends_with(".md")
    }
}

/// Mutable precursor of a [`Document`] while its header and body are being read.
#[derive(Debug)]
pub(crate) struct PendingDocument {
    source_path: PathBuf,
    delimiter: String,
    destination_path: String,
    attributes: Vec<Attribute>,
    body: String,
    start_line: usize,
}

impl PendingDocument {
    pub(crate) fn new(source_path: &Path, delimiter: String, start_line: usize) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            delimiter,
            destination_path: String::new(),
            attributes: Vec::new(),
            body: String::new(),
            start_line,
        }
    }

    pub(crate) fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub(crate) fn push_attribute(&mut self, key: &str, value: &str) {
        self.attributes.push(Attribute::new(key, value));
    }

    pub(crate) fn push_path(&mut self, text: &str) {
        self.destination_path.push_str(text);
    }

    pub(crate) fn push_path_char(&mut self, ch: char) {
        self.destination_path.push(ch);
    }

    pub(crate) fn push_body_char(&mut self, ch: char) {
        self.body.push(ch);
    }

    /// Drops the closing identifier, which was buffered into the body while it
    /// was being matched.
    pub(crate) fn strip_sentinel(&mut self) {
        let keep = self.body.len().saturating_sub(self.delimiter.len());
        debug_assert!(self.body[keep..] == self.delimiter);
        self.body.truncate(keep);
    }

    /// Converts into the final record. `None` if no destination was parsed.
    pub(crate) fn finish(self) -> Option<Document> {
        if self.destination_path.is_empty() {
            return None;
        }
        Some(Document {
            source_path: self.source_path,
            destination_path: self.destination_path,
            attributes: self.attributes,
            body: self.body,
            start_line: self.start_line,
            source_url: None,
        })
    }
}
