//! Helpers shared by sniffs: line endings and output escaping, sniff code
//! handling, declaration names and naming conventions, and function
//! parameter parsing.

pub mod common;
pub mod functions;
pub mod names;
