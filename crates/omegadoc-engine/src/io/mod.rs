//! Filesystem collaborators of the scanner: locating candidate streams and
//! writing extracted documents into the output tree.

pub mod finder;
pub mod placer;

pub use finder::{FindError, Finder, MemoryFinder, Streams, WalkFinder};
pub use placer::{FsPlacer, OnExisting, ParseOnExistingError, PlaceError, Placement, Placer};
