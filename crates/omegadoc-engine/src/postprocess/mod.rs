//! Whole-set transformations applied to extracted documents before placement.
//!
//! Each [`Postprocessor`] sees every document of the run at once and returns
//! the new set. A [`Pipeline`] runs them in ascending rank order; equal ranks
//! keep the order they were given in.

pub mod links;
pub mod sections;
pub mod sitemap;
pub mod source_links;

pub use links::MarkdownLinkRewriter;
pub use sections::SectionsCompiler;
pub use sitemap::GenerateSiteMap;
pub use source_links::SourceLinkAdder;

use crate::models::Document;

#[derive(Debug, thiserror::Error)]
pub enum PostprocessError {
    #[error("Postprocessor {stage} failed: {message}")]
    Failed { stage: String, message: String },
    #[error("Unknown postprocessor {0:?}")]
    UnknownStage(String),
}

pub trait Postprocessor: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Lower ranks run first.
    fn rank(&self) -> i32;
    fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>, PostprocessError>;
}

pub struct Pipeline {
    stages: Vec<Box<dyn Postprocessor>>,
}

impl Pipeline {
    pub fn new(mut stages: Vec<Box<dyn Postprocessor>>) -> Self {
        stages.sort_by_key(|stage| stage.rank());
        Self { stages }
    }

    /// The built-in postprocessors.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(SourceLinkAdder),
            Box::new(SectionsCompiler),
            Box::new(GenerateSiteMap),
            Box::new(MarkdownLinkRewriter),
        ])
    }

    /// Drops the stages named in `names` (case-insensitive).
    pub fn without<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, PostprocessError> {
        for name in names {
            let name = name.as_ref();
            let before = self.stages.len();
            self.stages
                .retain(|stage| !stage.name().eq_ignore_ascii_case(name));
            if self.stages.len() == before {
                return Err(PostprocessError::UnknownStage(name.to_string()));
            }
        }
        Ok(self)
    }

    /// Stages in the order they run.
    pub fn stages(&self) -> impl Iterator<Item = &dyn Postprocessor> {
        self.stages.iter().map(|stage| stage.as_ref())
    }

    pub fn apply(&self, mut docs: Vec<Document>) -> Result<Vec<Document>, PostprocessError> {
        for stage in &self.stages {
            let before = docs.len();
            docs = stage.apply(docs)?;
            log::debug!(
                "{} (rank {}): {before} documents in, {} out",
                stage.name(),
                stage.rank(),
                docs.len()
            );
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Appends its tag to every body so the run order shows in the output.
    struct Tagger {
        tag: &'static str,
        rank: i32,
    }

    impl Postprocessor for Tagger {
        fn name(&self) -> &str {
            self.tag
        }

        fn description(&self) -> &str {
            "appends a tag"
        }

        fn rank(&self) -> i32 {
            self.rank
        }

        fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>, PostprocessError> {
            Ok(docs
                .into_iter()
                .map(|mut doc| {
                    doc.body.push_str(self.tag);
                    doc
                })
                .collect())
        }
    }

    struct Failing;

    impl Postprocessor for Failing {
        fn name(&self) -> &str {
            "Failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        fn rank(&self) -> i32 {
            0
        }

        fn apply(&self, _docs: Vec<Document>) -> Result<Vec<Document>, PostprocessError> {
            Err(PostprocessError::Failed {
                stage: self.name().to_string(),
                message: "boom".to_string(),
            })
        }
    }

    fn tagger(tag: &'static str, rank: i32) -> Box<dyn Postprocessor> {
        Box::new(Tagger { tag, rank })
    }

    fn one_doc() -> Vec<Document> {
        vec![Document {
            destination_path: "a.txt".to_string(),
            ..Default::default()
        }]
    }

    #[test]
    fn test_stages_run_by_rank_then_registration_order() {
        // Given stages registered out of rank order, two sharing a rank
        let pipeline = Pipeline::new(vec![
            tagger("c", 30),
            tagger("a", 10),
            tagger("b1", 20),
            tagger("b2", 20),
        ]);

        // When applying the pipeline
        let docs = pipeline.apply(one_doc()).unwrap();

        // Then lower ranks ran first and ties kept their order
        assert_eq!(docs[0].body, "ab1b2c");
    }

    #[test]
    fn test_standard_pipeline_order() {
        let pipeline = Pipeline::standard();
        let names: Vec<&str> = pipeline.stages().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "GenerateSiteMap",
                "MarkdownLinkRewriter",
                "SourceLinkAdder",
                "SectionsCompiler"
            ]
        );
    }

    #[test]
    fn test_without_drops_named_stages() {
        let pipeline = Pipeline::standard()
            .without(&["generatesitemap", "SectionsCompiler"])
            .unwrap();

        let names: Vec<&str> = pipeline.stages().map(|s| s.name()).collect();

        assert_eq!(names, vec!["MarkdownLinkRewriter", "SourceLinkAdder"]);
    }

    #[test]
    fn test_without_rejects_unknown_names() {
        let result = Pipeline::standard().without(&["NoSuchStage"]);
        assert!(matches!(result, Err(PostprocessError::UnknownStage(name)) if name == "NoSuchStage"));
    }

    #[test]
    fn test_stage_error_aborts_pipeline() {
        let pipeline = Pipeline::new(vec![tagger("late", 99), Box::new(Failing)]);

        let err = pipeline.apply(one_doc()).unwrap_err();

        assert_eq!(err.to_string(), "Postprocessor Failing failed: boom");
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let docs = Pipeline::new(Vec::new()).apply(one_doc()).unwrap();
        assert_eq!(docs, one_doc());
    }
}
