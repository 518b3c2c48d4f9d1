// src/graph/mod.rs

//! Artifacts and the dependency graph that links them to rules.

pub mod file;
pub mod file_types;
pub mod hash;
pub mod paths;
pub mod state;

pub use file::File;
pub use file_types::{Classification, FileTypes};
pub use paths::{PathContext, normalize};
pub use state::{Node, State};
