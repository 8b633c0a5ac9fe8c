pub mod document;

pub use document::{Attribute, Document};
pub(crate) use document::PendingDocument;
