use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::Suppressions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Warning,
	Error,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Warning => f.write_str("warning"),
			Self::Error => f.write_str("error"),
		}
	}
}

/// A style violation reported by a sniff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
	/// Index of the token the violation was reported on.
	pub position: usize,
	/// 1-indexed line number.
	pub line: usize,
	/// 1-indexed column number.
	pub column: usize,
	/// Full code, e.g. `PSR2.Classes.ClassDeclaration.SpaceAfterName`.
	pub code: String,
	pub message: String,
	pub severity: Severity,
	pub fixable: bool,
}

/// Decides whether a fixable diagnostic may be fixed right now.
pub trait FixPolicy: fmt::Debug + Send + Sync {
	/// `permitted` is the number of fixes this policy has already allowed in
	/// the current pass.
	fn allow_fix(&self, diagnostic: &Diagnostic, permitted: usize) -> bool;
}

/// Every fixable diagnostic may be fixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl FixPolicy for AllowAll {
	fn allow_fix(&self, _diagnostic: &Diagnostic, _permitted: usize) -> bool {
		true
	}
}

/// Report only. Used by `check`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl FixPolicy for DenyAll {
	fn allow_fix(&self, _diagnostic: &Diagnostic, _permitted: usize) -> bool {
		false
	}
}

/// Allow the first `n` fixes of every pass.
#[derive(Debug, Clone, Copy)]
pub struct FirstN(pub usize);

impl FixPolicy for FirstN {
	fn allow_fix(&self, _diagnostic: &Diagnostic, permitted: usize) -> bool {
		permitted < self.0
	}
}

/// What happened to a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
	/// Suppressed or a duplicate of an earlier `(position, code)`.
	Rejected,
	Recorded,
	/// Recorded, and the caller may apply its fix now.
	FixPermitted,
}

impl ReportOutcome {
	pub fn is_accepted(self) -> bool {
		self != Self::Rejected
	}

	pub fn fix_permitted(self) -> bool {
		self == Self::FixPermitted
	}
}

/// Collects the diagnostics of one pass.
#[derive(Debug)]
pub struct DiagnosticSink {
	suppressions: Suppressions,
	policy: Arc<dyn FixPolicy>,
	seen: HashSet<(usize, String)>,
	diagnostics: Vec<Diagnostic>,
	error_count: usize,
	warning_count: usize,
	fixable_count: usize,
	permitted_fixes: usize,
}

impl DiagnosticSink {
	pub fn new(suppressions: Suppressions, policy: Arc<dyn FixPolicy>) -> Self {
		Self {
			suppressions,
			policy,
			seen: HashSet::new(),
			diagnostics: Vec::new(),
			error_count: 0,
			warning_count: 0,
			fixable_count: 0,
			permitted_fixes: 0,
		}
	}

	/// Record `diagnostic` unless it is suppressed or `(position, code)` was
	/// already reported this pass. The first report wins.
	pub fn report(&mut self, diagnostic: Diagnostic) -> ReportOutcome {
		if self
			.suppressions
			.is_suppressed(diagnostic.line, &diagnostic.code)
		{
			return ReportOutcome::Rejected;
		}

		if !self
			.seen
			.insert((diagnostic.position, diagnostic.code.clone()))
		{
			return ReportOutcome::Rejected;
		}

		match diagnostic.severity {
			Severity::Error => self.error_count += 1,
			Severity::Warning => self.warning_count += 1,
		}

		let mut outcome = ReportOutcome::Recorded;

		if diagnostic.fixable {
			self.fixable_count += 1;

			if self.policy.allow_fix(&diagnostic, self.permitted_fixes) {
				self.permitted_fixes += 1;
				outcome = ReportOutcome::FixPermitted;
			}
		}

		self.diagnostics.push(diagnostic);
		outcome
	}

	pub fn suppressions(&self) -> &Suppressions {
		&self.suppressions
	}

	pub fn diagnostics(&self) -> &[Diagnostic] {
		&self.diagnostics
	}

	pub fn error_count(&self) -> usize {
		self.error_count
	}

	pub fn warning_count(&self) -> usize {
		self.warning_count
	}

	pub fn fixable_count(&self) -> usize {
		self.fixable_count
	}

	/// The diagnostics sorted by position and code.
	pub fn into_diagnostics(self) -> Vec<Diagnostic> {
		let mut diagnostics = self.diagnostics;
		diagnostics.sort_by(|a, b| (a.position, &a.code).cmp(&(b.position, &b.code)));
		diagnostics
	}
}
