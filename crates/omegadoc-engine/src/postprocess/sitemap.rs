use std::fmt::{self, Write as _};

use super::{PostprocessError, Postprocessor};
use crate::models::Document;

const INDEX_PATH: &str = "index.md";

/// Appends a nested list linking to every document to the top-level
/// `index.md`, creating that document when no one declared it.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateSiteMap;

impl Postprocessor for GenerateSiteMap {
    fn name(&self) -> &str {
        "GenerateSiteMap"
    }

    fn description(&self) -> &str {
        "Generates a page which links to all documents. If no top-level 'index.md' \
         is declared, an empty one is created; the sitemap is then appended to it."
    }

    fn rank(&self) -> i32 {
        35
    }

    fn apply(&self, mut docs: Vec<Document>) -> Result<Vec<Document>, PostprocessError> {
        if docs.is_empty() {
            return Ok(docs);
        }

        let mut root = Vec::new();
        for doc in &docs {
            let segments: Vec<&str> = doc
                .destination_path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .collect();
            insert(&mut root, &segments);
        }
        root.sort_by(|a, b| a.name.cmp(&b.name));

        let mut listing = String::new();
        for node in &root {
            render(&mut listing, node, "", 0).map_err(|err| PostprocessError::Failed {
                stage: self.name().to_string(),
                message: err.to_string(),
            })?;
        }

        let index = match docs.iter().position(|doc| doc.destination_path == INDEX_PATH) {
            Some(i) => i,
            None => {
                docs.push(Document {
                    destination_path: INDEX_PATH.to_string(),
                    ..Default::default()
                });
                docs.len() - 1
            }
        };
        let index = &mut docs[index];
        index.body = format!("{}\n# Sitemap\n\n{listing}\n", index.body);
        Ok(docs)
    }
}

#[derive(Debug)]
struct Node {
    name: String,
    children: Vec<Node>,
}

impl Node {
    fn is_dir(&self) -> bool {
        !self.children.is_empty()
    }
}

fn insert(nodes: &mut Vec<Node>, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let i = match nodes.iter().position(|node| node.name == *first) {
        Some(i) => i,
        None => {
            nodes.push(Node {
                name: first.to_string(),
                children: Vec::new(),
            });
            nodes.len() - 1
        }
    };
    insert(&mut nodes[i].children, rest);
}

fn render(out: &mut String, node: &Node, parent: &str, depth: usize) -> fmt::Result {
    let path = if parent.is_empty() {
        node.name.clone()
    } else {
        format!("{parent}/{}", node.name)
    };
    let indent = "\t".repeat(depth);

    if !node.is_dir() {
        return writeln!(out, "{indent}- [{}]({path})", node.name);
    }

    writeln!(out, "{indent}- [{}/]({path}/)", node.name)?;
    // Files before directories, index pages first.
    let mut children: Vec<&Node> = node.children.iter().collect();
    children.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    for child in children {
        render(out, child, &path, depth + 1)?;
    }
    Ok(())
}

fn sort_key(node: &Node) -> (bool, bool, &str) {
    (node.is_dir(), !node.name.starts_with("index"), &node.name)
}
