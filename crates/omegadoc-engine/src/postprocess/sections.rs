use std::collections::HashMap;

use super::{PostprocessError, Postprocessor};
use crate::models::Document;

const SECTION_KEY: &str = "section";

/// Merges documents that share a destination and carry a `section`
/// attribute into one document, ordered by section value.
///
/// Documents without a section are passed through untouched, as is any
/// destination claimed by a single document.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionsCompiler;

impl Postprocessor for SectionsCompiler {
    fn name(&self) -> &str {
        "SectionsCompiler"
    }

    fn description(&self) -> &str {
        "Compiles documents with the same destination but different `section` attributes \
         into one document, concatenating bodies in the order of the section values. \
         Lets one logical document be written in several places."
    }

    fn rank(&self) -> i32 {
        60
    }

    fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>, PostprocessError> {
        let mut out = Vec::with_capacity(docs.len());
        for group in group_by_destination(docs) {
            if group.len() < 2 {
                out.extend(group);
                continue;
            }

            let (mut sectioned, plain): (Vec<_>, Vec<_>) = group
                .into_iter()
                .partition(|doc| doc.attribute(SECTION_KEY).is_some_and(|s| !s.is_empty()));
            out.extend(plain);

            sectioned.sort_by(|a, b| a.attribute(SECTION_KEY).cmp(&b.attribute(SECTION_KEY)));
            if let Some(compiled) = compile(sectioned) {
                out.push(compiled);
            }
        }
        Ok(out)
    }
}

/// Groups in order of each destination's first appearance.
fn group_by_destination(docs: Vec<Document>) -> Vec<Vec<Document>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Document>> = Vec::new();
    for doc in docs {
        match index.get(&doc.destination_path) {
            Some(&i) => groups[i].push(doc),
            None => {
                index.insert(doc.destination_path.clone(), groups.len());
                groups.push(vec![doc]);
            }
        }
    }
    groups
}

fn compile(sections: Vec<Document>) -> Option<Document> {
    let mut sections = sections.into_iter();
    let mut compiled = sections.next()?;
    log::debug!(
        "Compiling sections of {} starting with {}",
        compiled.destination_path,
        compiled.source_path.display()
    );
    for section in sections {
        compiled.attributes.extend(section.attributes);
        compiled.body.push_str(&section.body);
    }
    Some(compiled)
}
