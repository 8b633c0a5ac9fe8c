use super::{PostprocessError, Postprocessor};
use crate::models::Document;

/// Appends a link back to the source file to every document that has a
/// source URL. Assumes the body is markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceLinkAdder;

impl Postprocessor for SourceLinkAdder {
    fn name(&self) -> &str {
        "SourceLinkAdder"
    }

    fn description(&self) -> &str {
        "Appends a markdown link to the file and line each document was extracted from, \
         so readers can jump straight to where the text is maintained."
    }

    fn rank(&self) -> i32 {
        50
    }

    fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>, PostprocessError> {
        Ok(docs
            .into_iter()
            .map(|mut doc| {
                if let Some(url) = doc.source_url.as_deref() {
                    doc.body = format!(
                        "{}\n\n[Link to the source of this document: {url}]({url})\n",
                        doc.body
                    );
                }
                doc
            })
            .collect())
    }
}
