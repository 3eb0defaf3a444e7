//! Pure selection machinery: filtering, scoring, budgeting, chunking

pub mod cache;
pub mod chunker;
pub mod filter;
pub mod scorer;
pub mod selector;
pub mod snapshot;
pub mod tree;
