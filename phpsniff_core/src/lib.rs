//! `phpsniff_core` is the engine behind the `phpsniff` PHP style checker. It
//! turns PHP source into an indexed token sequence, dispatches every token
//! to the sniffs that registered for its kind, collects their diagnostics
//! and fixes, and repeats until the fixes converge.
//!
//! ## Processing Pipeline
//!
//! ```text
//! PHP source
//!   -> Tokenizer (lossless tokens with line, column and structural pairs)
//!   -> Scanner (invokes registered sniffs once per matching token)
//!   -> Diagnostic sink (dedupes, applies phpcs: suppressions, asks the fix policy)
//!   -> Fixer (atomic changesets, conflicting ones are dropped for the pass)
//!   -> rendered text, tokenized again until a pass accepts no fix
//! ```
//!
//! ## Modules
//!
//! - [`config`] loads `phpsniff.toml`.
//! - [`project`] discovers files and runs batches of them in parallel.
//! - [`sniffs`] holds the built-in sniffs and their catalogue.
//! - [`utils`] has the helpers sniffs share: name case checks, parameter
//!   parsing and message formatting.
//!
//! ## Quick Start
//!
//! ```rust
//! use phpsniff_core::EngineOptions;
//! use phpsniff_core::FileStatus;
//! use phpsniff_core::Ruleset;
//! use phpsniff_core::run;
//!
//! let ruleset = Ruleset::from_config(None).unwrap();
//! let outcome = run("<?php\necho 1;\n", &ruleset, &EngineOptions::default()).unwrap();
//!
//! assert_eq!(outcome.status, FileStatus::Fixed);
//! assert_eq!(outcome.text, "<?php\ndeclare(strict_types=1);\necho 1;\n");
//! ```

pub use config::*;
pub use diagnostics::*;
pub use engine::*;
pub use error::*;
pub use fixer::*;
pub use lexer::tokenize;
pub use navigator::Search;
pub use project::*;
pub use scanner::*;
pub use sniff::*;
pub use suppression::*;
pub use tokens::*;

pub mod config;
mod diagnostics;
mod engine;
#[allow(unused_assignments)]
mod error;
mod fixer;
pub(crate) mod lexer;
mod navigator;
pub mod project;
mod scanner;
mod sniff;
pub mod sniffs;
pub(crate) mod structure;
mod suppression;
pub mod tokens;
pub mod utils;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
