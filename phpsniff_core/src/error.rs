use miette::Diagnostic;
use thiserror::Error;

use crate::Diagnostic as StyleDiagnostic;
use crate::RuleFaultRecord;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum SniffError {
	#[error(transparent)]
	#[diagnostic(code(phpsniff::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(phpsniff::config_parse),
		help("check that phpsniff.toml is valid TOML with `sniffs`, [options] and/or [exclude] sections")
	)]
	ConfigParse(String),

	#[error("unknown sniff: `{0}`")]
	#[diagnostic(
		code(phpsniff::unknown_sniff),
		help("run `phpsniff list` to see every available sniff code")
	)]
	UnknownSniff(String),

	#[error("invalid options for sniff `{sniff}`: {reason}")]
	#[diagnostic(code(phpsniff::invalid_option))]
	InvalidOption { sniff: String, reason: String },

	#[error("invalid pattern `{pattern}`: {reason}")]
	#[diagnostic(code(phpsniff::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },

	#[error("file too large: `{path}` is {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(phpsniff::file_too_large),
		help("increase `max_file_size` in phpsniff.toml or exclude this file")
	)]
	FileTooLarge { path: String, size: u64, limit: u64 },

	#[error("file is not valid UTF-8: `{path}`")]
	#[diagnostic(code(phpsniff::invalid_encoding))]
	InvalidEncoding { path: String },

	#[error("processing exceeded the {limit_ms}ms time limit during pass {pass}")]
	#[diagnostic(
		code(phpsniff::timeout),
		help("raise `timeout_ms` in phpsniff.toml or disable the slow sniff")
	)]
	Timeout {
		limit_ms: u128,
		pass: usize,
		partial: Vec<StyleDiagnostic>,
		/// Sniff faults recorded before the deadline passed.
		faults: Vec<RuleFaultRecord>,
	},

	#[error("processing was cancelled after pass {pass}")]
	#[diagnostic(code(phpsniff::cancelled))]
	Cancelled {
		pass: usize,
		partial: Vec<StyleDiagnostic>,
	},
}

impl SniffError {
	/// Diagnostics collected before a timeout or cancellation stopped the
	/// file. Empty for every other variant.
	pub fn partial_diagnostics(&self) -> &[StyleDiagnostic] {
		match self {
			Self::Timeout { partial, .. } | Self::Cancelled { partial, .. } => partial,
			_ => &[],
		}
	}

	/// Sniff faults recorded before a timeout stopped the file.
	pub fn faults(&self) -> &[RuleFaultRecord] {
		match self {
			Self::Timeout { faults, .. } => faults,
			_ => &[],
		}
	}
}

/// A programming error inside a sniff.
///
/// Faults are never reported as style violations. The engine disables the
/// offending sniff for the rest of the file and records the fault next to
/// the file's diagnostics.
#[derive(Debug, Clone, Diagnostic, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuleFault {
	#[error("token {index} of kind `{found}` is not supported here; expected {expected}")]
	#[diagnostic(code(phpsniff::rule_fault::unsupported_token))]
	UnsupportedToken {
		index: usize,
		found: String,
		expected: String,
	},

	#[error("a changeset is already open")]
	#[diagnostic(
		code(phpsniff::rule_fault::nested_changeset),
		help("close the current changeset with `end_changeset` before starting another")
	)]
	NestedChangeset,

	#[error("no changeset is open")]
	#[diagnostic(
		code(phpsniff::rule_fault::no_changeset),
		help("wrap fixer edits in `begin_changeset` / `end_changeset`")
	)]
	NoChangeset,

	#[error("the sniff returned while a changeset was still open")]
	#[diagnostic(code(phpsniff::rule_fault::unclosed_changeset))]
	UnclosedChangeset,

	#[error("token index {index} is out of range (sequence length {len})")]
	#[diagnostic(code(phpsniff::rule_fault::index_out_of_range))]
	IndexOutOfRange { index: usize, len: usize },

	#[error("{0}")]
	#[diagnostic(code(phpsniff::rule_fault::custom))]
	Custom(String),
}

pub type SniffResult<T> = Result<T, SniffError>;
pub type RuleResult<T> = Result<T, RuleFault>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
