use std::ops::Range;

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag};
use relative_path::RelativePath;

use super::{PostprocessError, Postprocessor};
use crate::models::Document;

/// Points links between markdown documents at the `.html` files they will be
/// rendered to.
///
/// Link targets are taken as paths from the output root and rewritten
/// relative to the directory of the linking document, so the tree can be
/// served from any prefix. Only the link destination text changes; everything
/// else in the body is kept byte for byte.
///
/// | before                 | after                     |
/// |------------------------|---------------------------|
/// | `[link](thing.md)`     | `[link](thing.html)`      |
/// | `[link](a/b.md#usage)` | `[link](a/b.html#usage)`  |
/// | `[word](other.html)`   | unchanged                 |
/// | `[web](https://x/y.md)`| unchanged                 |
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownLinkRewriter;

impl Postprocessor for MarkdownLinkRewriter {
    fn name(&self) -> &str {
        "MarkdownLinkRewriter"
    }

    fn description(&self) -> &str {
        "Changes internal links which point to '.md' paths so they point to '.html' instead, \
         relative to the linking document. Links to external pages are not modified."
    }

    fn rank(&self) -> i32 {
        40
    }

    fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>, PostprocessError> {
        Ok(docs
            .into_iter()
            .map(|mut doc| {
                if doc.destination_path.is_empty() || doc.is_markdown() {
                    doc.body = rewrite_links(&doc.destination_path, &doc.body);
                }
                doc
            })
            .collect())
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Rewrites every inline markdown link in `body`, as seen from a document
/// placed at `doc_destination`.
pub fn rewrite_links(doc_destination: &str, body: &str) -> String {
    let mut edits = Vec::new();
    for (event, range) in Parser::new_ext(body, markdown_options()).into_offset_iter() {
        let Event::Start(Tag::Link {
            link_type: LinkType::Inline,
            dest_url,
            title,
            ..
        }) = event
        else {
            continue;
        };
        let Some(replacement) = rewrite_target(doc_destination, &dest_url) else {
            continue;
        };
        match locate_destination(body, range, &dest_url, &title) {
            Some(at) => {
                log::debug!("{doc_destination}: link {dest_url:?} -> {replacement:?}");
                edits.push((at, replacement));
            }
            // Escaped or bracketed destinations differ from their source text.
            None => log::debug!("{doc_destination}: cannot locate link {dest_url:?}, leaving it"),
        }
    }
    splice(body, edits)
}

fn rewrite_target(doc_destination: &str, dest: &str) -> Option<String> {
    if dest.starts_with('#') || dest.starts_with("//") || has_scheme(dest) {
        return None;
    }
    let (path, fragment) = match dest.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (dest, None),
    };
    let stem = path.strip_suffix(".md")?;
    let relative = relative_to_document(doc_destination, stem);
    Some(match fragment {
        Some(fragment) => format!("{relative}.html#{fragment}"),
        None => format!("{relative}.html"),
    })
}

fn has_scheme(dest: &str) -> bool {
    dest.split_once(':').is_some_and(|(scheme, _)| {
        scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Path from the directory of `doc_destination` to `target`, both relative
/// to the output root.
fn relative_to_document(doc_destination: &str, target: &str) -> String {
    let doc = RelativePath::new(doc_destination.trim_start_matches('/')).normalize();
    let target = RelativePath::new(target.trim_start_matches('/')).normalize();

    let mut from: Vec<&str> = segments(doc.as_str());
    from.pop();
    let to = segments(target.as_str());

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut parts = vec![".."; from.len() - common];
    parts.extend_from_slice(&to[common..]);
    parts.join("/")
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Byte range of the destination text inside the link spanning `link`.
fn locate_destination(body: &str, link: Range<usize>, dest: &str, title: &str) -> Option<Range<usize>> {
    let source = &body[link.clone()];
    let end = if title.is_empty() {
        source.len()
    } else {
        source.rfind(title)?
    };
    let start = source[..end].rfind(dest)?;
    Some(link.start + start..link.start + start + dest.len())
}

fn splice(body: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    if edits.is_empty() {
        return body.to_string();
    }
    edits.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(body.len());
    let mut pos = 0;
    for (range, replacement) in edits {
        out.push_str(&body[pos..range.start]);
        out.push_str(&replacement);
        pos = range.end;
    }
    out.push_str(&body[pos..]);
    out
}
