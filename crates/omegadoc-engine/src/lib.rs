pub mod application;
pub mod io;
pub mod models;
pub mod postprocess;
pub mod scanner;
pub mod source_url;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use application::{Controller, ControllerError, RunReport};
pub use io::{
    FindError, Finder, FsPlacer, MemoryFinder, OnExisting, PlaceError, Placement, Placer,
    WalkFinder,
};
pub use models::{Attribute, Document};
pub use postprocess::{Pipeline, PostprocessError, Postprocessor};
pub use scanner::{ScanError, parse_documents};
pub use source_url::{GitUrlResolver, ResolveError, UrlResolver};
