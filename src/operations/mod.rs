//! Engine operations

pub mod indexing;
