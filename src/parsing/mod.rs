//! Reading JSON:API fragments and deriving values from file names.

pub mod json_tree;
pub mod utils;

pub use json_tree::{FieldPathReader, KeyPathRetrieveCounts, ParseSettings};
