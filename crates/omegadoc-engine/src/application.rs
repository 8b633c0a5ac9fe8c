//! End-to-end run: find candidate streams, extract their documents, annotate
//! and postprocess them, then place them under the output root.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::io::{FindError, Finder, PlaceError, Placement, Placer};
use crate::models::Document;
use crate::postprocess::{Pipeline, PostprocessError};
use crate::scanner::{ScanError, parse_documents};
use crate::source_url::UrlResolver;

/// Errors that stop a run before anything is placed.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Find(#[from] FindError),
    #[error(transparent)]
    Postprocess(#[from] PostprocessError),
}

/// What a run did. Failures of single streams or documents are collected
/// here instead of aborting the run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Candidate streams handed out by the finder.
    pub streams: usize,
    /// Documents extracted, before postprocessing.
    pub extracted: usize,
    pub placed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub stream_failures: Vec<ScanError>,
    pub placement_failures: Vec<PlaceError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.stream_failures.is_empty() && self.placement_failures.is_empty()
    }
}

pub struct Controller {
    finder: Box<dyn Finder>,
    resolver: Option<Box<dyn UrlResolver>>,
    pipeline: Pipeline,
    placer: Box<dyn Placer>,
}

impl Controller {
    pub fn new(finder: Box<dyn Finder>, pipeline: Pipeline, placer: Box<dyn Placer>) -> Self {
        Self {
            finder,
            resolver: None,
            pipeline,
            placer,
        }
    }

    /// Fill in `source_url` on every document before postprocessing.
    pub fn with_resolver(mut self, resolver: Box<dyn UrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn generate_tree(&self, input: &Path, output: &Path) -> Result<RunReport, ControllerError> {
        log::debug!(
            "Generating tree from {} into {}",
            input.display(),
            output.display()
        );
        let mut report = RunReport::default();

        let streams: Vec<_> = self.finder.find(input)?.into_iter().collect();
        report.streams = streams.len();

        let scanned: Vec<_> = streams
            .into_par_iter()
            .map(|(path, reader)| {
                let result = parse_documents(&path, reader);
                (path, result)
            })
            .collect();

        let mut docs = Vec::new();
        let mut without_documents = 0;
        for (path, result) in scanned {
            match result {
                Ok(found) if found.is_empty() => {
                    log::debug!("No documents extracted from {}", path.display());
                    without_documents += 1;
                }
                Ok(found) => docs.extend(found),
                Err(err) => {
                    log::error!("{err}");
                    report.stream_failures.push(err);
                }
            }
        }
        report.extracted = docs.len();

        if let Some(resolver) = &self.resolver {
            resolve_source_urls(resolver.as_ref(), &mut docs);
        }

        let docs = self.pipeline.apply(docs)?;

        if without_documents > 0 {
            log::info!(
                "{without_documents} of {} files with potential documents produced none",
                report.streams
            );
        }

        for doc in &docs {
            match self.placer.place(output, doc) {
                Ok(Placement::Written(path)) => report.placed.push(path),
                Ok(Placement::Skipped(path)) => report.skipped.push(path),
                Err(err) => {
                    log::error!("{err}");
                    report.placement_failures.push(err);
                }
            }
        }

        Ok(report)
    }
}

fn resolve_source_urls(resolver: &dyn UrlResolver, docs: &mut [Document]) {
    docs.par_iter_mut().for_each(|doc| {
        match resolver.resolve(&doc.source_path, doc.start_line) {
            Ok(url) => doc.source_url = url,
            Err(err) => log::warn!(
                "No source link for document {} from {}: {err}",
                doc.destination_path,
                doc.source_path.display()
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{FsPlacer, MemoryFinder, OnExisting, Streams};
    use crate::scanner::BEGIN_MARKER;
    use crate::source_url::ResolveError;
    use crate::tests::{create_test_dir, create_test_file};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::{self as stdio, Read};

    fn block(delimiter: &str, header: &str, body: &str) -> String {
        format!("{BEGIN_MARKER}{delimiter} {header}\n{body}{delimiter}\n")
    }

    /// Links every source to a fixed host; refuses sources named `private`.
    struct FixedResolver;

    impl UrlResolver for FixedResolver {
        fn resolve(&self, source_path: &Path, start_line: usize) -> Result<Option<String>, ResolveError> {
            if source_path.ends_with("private.rs") {
                return Err(ResolveError::Path {
                    path: source_path.to_path_buf(),
                });
            }
            Ok(Some(format!(
                "https://example.com{}#L{}",
                source_path.display(),
                start_line + 1
            )))
        }
    }

    fn controller(finder: MemoryFinder, pipeline: Pipeline) -> Controller {
        Controller::new(Box::new(finder), pipeline, Box::new(FsPlacer::default()))
    }

    #[test]
    fn test_generate_tree_places_documents() {
        // Given two sources, one with two documents
        let finder = MemoryFinder::new()
            .add(
                "/src/main.rs",
                format!("fn main() {{}}\n{}", block("END", "docs/main.md", "Main docs\n")),
            )
            .add(
                "/src/lib.rs",
                format!(
                    "{}{}",
                    block("EOF", "docs/lib.md", "Lib docs\n"),
                    block("EOF", "notes.txt", "plain\n")
                ),
            );
        let out = create_test_dir();

        // When generating the tree without postprocessing
        let report = controller(finder, Pipeline::new(Vec::new()))
            .generate_tree(Path::new("/src"), out.path())
            .unwrap();

        // Then every document is written
        assert!(report.is_success());
        assert_eq!(report.streams, 2);
        assert_eq!(report.extracted, 3);
        assert_eq!(report.placed.len(), 3);
        assert_eq!(
            fs::read_to_string(out.path().join("docs/main.md")).unwrap(),
            "Main docs\n"
        );
        assert_eq!(
            fs::read_to_string(out.path().join("notes.txt")).unwrap(),
            "plain\n"
        );
    }

    /// Reader that fails part way through a document.
    struct Truncated(stdio::Cursor<Vec<u8>>);

    impl Read for Truncated {
        fn read(&mut self, buf: &mut [u8]) -> stdio::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(stdio::Error::other("connection reset")),
                n => Ok(n),
            }
        }
    }

    /// Serves `good` from memory plus a `bad.rs` stream that fails to read.
    struct OneBrokenStream {
        good: MemoryFinder,
    }

    impl Finder for OneBrokenStream {
        fn find(&self, root: &Path) -> Result<Streams, FindError> {
            let mut streams = self.good.find(root)?;
            let partial = format!("{BEGIN_MARKER}END out/bad.md\nnever");
            streams.insert(
                root.join("bad.rs"),
                Box::new(Truncated(stdio::Cursor::new(partial.into_bytes()))),
            );
            Ok(streams)
        }
    }

    #[test]
    fn test_failed_stream_does_not_stop_siblings() {
        let finder = OneBrokenStream {
            good: MemoryFinder::new().add("/src/good.rs", block("END", "out/good.md", "fine\n")),
        };
        let out = create_test_dir();

        let report = Controller::new(
            Box::new(finder),
            Pipeline::new(Vec::new()),
            Box::new(FsPlacer::default()),
        )
        .generate_tree(Path::new("/src"), out.path())
        .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.stream_failures.len(), 1);
        assert_eq!(report.stream_failures[0].path(), Path::new("/src/bad.rs"));
        assert!(out.path().join("out/good.md").exists());
        assert!(!out.path().join("out/bad.md").exists());
    }

    #[test]
    fn test_placement_failures_are_collected() {
        // Given an output tree that already holds one destination
        let finder = MemoryFinder::new().add(
            "/src/a.rs",
            format!(
                "{}{}",
                block("END", "taken.md", "new\n"),
                block("END", "free.md", "new\n")
            ),
        );
        let out = create_test_dir();
        create_test_file(&out, "taken.md", "old\n");

        // When placing with the default policy
        let report = controller(finder, Pipeline::new(Vec::new()))
            .generate_tree(Path::new("/src"), out.path())
            .unwrap();

        // Then the existing file is kept and the other document still written
        assert_eq!(report.placement_failures.len(), 1);
        assert_eq!(report.placed, vec![out.path().join("free.md")]);
        assert_eq!(fs::read_to_string(out.path().join("taken.md")).unwrap(), "old\n");
    }

    #[test]
    fn test_ignore_policy_reports_skips() {
        let finder = MemoryFinder::new().add("/src/a.rs", block("END", "taken.md", "new\n"));
        let out = create_test_dir();
        create_test_file(&out, "taken.md", "old\n");
        let controller = Controller::new(
            Box::new(finder),
            Pipeline::new(Vec::new()),
            Box::new(FsPlacer::new(OnExisting::Ignore)),
        );

        let report = controller.generate_tree(Path::new("/src"), out.path()).unwrap();

        assert!(report.is_success());
        assert_eq!(report.skipped, vec![out.path().join("taken.md")]);
    }

    #[test]
    fn test_source_links_and_sections_with_standard_pipeline() {
        // Given a document split into sections across two files
        let finder = MemoryFinder::new()
            .add(
                "/src/a.rs",
                format!("\n\n{}", block("END", "section:2 guide.md", "Second\n")),
            )
            .add(
                "/src/b.rs",
                block("END", "section:1 guide.md", "First, see [more](more.md)\n"),
            )
            .add("/src/private.rs", block("END", "more.md", "More\n"));
        let out = create_test_dir();

        // When running the standard pipeline with a resolver
        let report = controller(finder, Pipeline::standard())
            .with_resolver(Box::new(FixedResolver))
            .generate_tree(Path::new("/src"), out.path())
            .unwrap();

        // Then sections are merged in order with their source links,
        // and a sitemap index is generated
        assert!(report.is_success());
        assert_eq!(
            fs::read_to_string(out.path().join("guide.md")).unwrap(),
            "First, see [more](more.html)\n\n\n\
             [Link to the source of this document: https://example.com/src/b.rs#L1](https://example.com/src/b.rs#L1)\n\
             Second\n\n\n\
             [Link to the source of this document: https://example.com/src/a.rs#L3](https://example.com/src/a.rs#L3)\n"
        );
        assert_eq!(
            fs::read_to_string(out.path().join("more.md")).unwrap(),
            "More\n"
        );
        assert_eq!(
            fs::read_to_string(out.path().join("index.md")).unwrap(),
            "\n# Sitemap\n\n- [guide.md](guide.html)\n- [more.md](more.html)\n\n"
        );
    }

    #[test]
    fn test_find_error_aborts_run() {
        let out = create_test_dir();
        let controller = Controller::new(
            Box::new(crate::io::WalkFinder::new()),
            Pipeline::standard(),
            Box::new(FsPlacer::default()),
        );

        let result = controller.generate_tree(Path::new("/this/path/does/not/exist"), out.path());

        assert!(matches!(result, Err(ControllerError::Find(_))));
    }
}
