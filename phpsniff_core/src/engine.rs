use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::AllowAll;
use crate::DenyAll;
use crate::Diagnostic;
use crate::DiagnosticSink;
use crate::FixPolicy;
use crate::Fixer;
use crate::RuleFaultRecord;
use crate::RuleRegistry;
use crate::Ruleset;
use crate::ScanInterrupt;
use crate::SniffError;
use crate::SniffResult;
use crate::Suppressions;
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::tokenize;

/// A shared flag that stops file processing at the next pass boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
	pub fn cancel(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}
}

/// Options for processing one file.
#[derive(Debug, Clone)]
pub struct EngineOptions {
	/// Cap on tokenize and scan passes.
	pub max_iterations: usize,
	/// Per-file time limit, checked between sniff invocations.
	pub timeout: Option<Duration>,
	/// Decides which fixable diagnostics are fixed in each pass.
	pub policy: Arc<dyn FixPolicy>,
	pub cancel: Option<CancelFlag>,
}

impl Default for EngineOptions {
	fn default() -> Self {
		Self {
			max_iterations: DEFAULT_MAX_ITERATIONS,
			timeout: None,
			policy: Arc::new(AllowAll),
			cancel: None,
		}
	}
}

/// How processing of a file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
	/// No fix was applied.
	Unchanged,
	/// Fixes were applied and the last pass produced none.
	Fixed,
	/// The pass limit was reached while sniffs still produced fixes.
	NotConverged,
}

/// The result of processing one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
	pub status: FileStatus,
	/// The final rendered text.
	pub text: String,
	/// Diagnostics of the last pass, sorted by position and code.
	pub diagnostics: Vec<Diagnostic>,
	/// Sniff faults across every pass. Each faulting sniff appears once.
	pub faults: Vec<RuleFaultRecord>,
	/// Tokenize and scan passes performed.
	pub iterations: usize,
	/// Changesets accepted across every pass.
	pub fixes_applied: usize,
	/// `true` when the file carries `phpcs:ignoreFile`.
	pub ignored: bool,
}

impl FileOutcome {
	pub fn changed(&self) -> bool {
		self.fixes_applied > 0
	}
}

struct PassResult {
	diagnostics: Vec<Diagnostic>,
	rendered: String,
	fixed_count: usize,
	ignored: bool,
}

/// Check `source` in a single pass. Fixes are never permitted and the text
/// is returned unchanged.
#[tracing::instrument(skip_all, level = "debug")]
pub fn check_source(source: &str, ruleset: &Ruleset, options: &EngineOptions) -> SniffResult<FileOutcome> {
	let options = EngineOptions {
		policy: Arc::new(DenyAll),
		..options.clone()
	};
	let deadline = options.timeout.map(|timeout| Instant::now() + timeout);

	if options
		.cancel
		.as_ref()
		.is_some_and(CancelFlag::is_cancelled)
	{
		return Err(SniffError::Cancelled {
			pass: 0,
			partial: Vec::new(),
		});
	}

	let mut faults = Vec::new();
	let result = match run_pass(source, ruleset, &options, &BTreeSet::new(), deadline, &mut faults) {
		Ok(result) => result,
		Err(partial) => return Err(timeout_error(&options, 1, partial, faults)),
	};

	Ok(FileOutcome {
		status: FileStatus::Unchanged,
		text: source.to_string(),
		diagnostics: result.diagnostics,
		faults,
		iterations: 1,
		fixes_applied: 0,
		ignored: result.ignored,
	})
}

/// Run the convergence loop on `source`.
///
/// Each pass tokenizes the current text, scans it with fresh sniff
/// instances and renders the accepted fixes. The loop stops after the first
/// pass that accepts no fix, or with [`FileStatus::NotConverged`] once
/// `max_iterations` passes have run. Sniffs that fault stay disabled for
/// the remaining passes.
#[tracing::instrument(skip_all, level = "debug")]
pub fn run(source: &str, ruleset: &Ruleset, options: &EngineOptions) -> SniffResult<FileOutcome> {
	let started = Instant::now();
	let deadline = options.timeout.map(|timeout| started + timeout);
	let max_iterations = options.max_iterations.max(1);
	let mut text = source.to_string();
	let mut disabled: BTreeSet<String> = BTreeSet::new();
	let mut faults: Vec<RuleFaultRecord> = Vec::new();
	let mut diagnostics: Vec<Diagnostic> = Vec::new();
	let mut fixes_applied = 0;

	for pass in 1..=max_iterations {
		if options
			.cancel
			.as_ref()
			.is_some_and(CancelFlag::is_cancelled)
		{
			return Err(SniffError::Cancelled {
				pass: pass - 1,
				partial: diagnostics,
			});
		}

		let mut pass_faults = Vec::new();
		let result = run_pass(&text, ruleset, options, &disabled, deadline, &mut pass_faults);

		for record in pass_faults {
			disabled.insert(record.sniff.clone());
			faults.push(record);
		}

		let result = match result {
			Ok(result) => result,
			Err(partial) => return Err(timeout_error(options, pass, partial, faults)),
		};

		debug!(pass, diagnostics = result.diagnostics.len(), fixed = result.fixed_count, "pass complete");
		diagnostics = result.diagnostics;

		if result.fixed_count == 0 || result.ignored || result.rendered == text {
			let status = if fixes_applied > 0 {
				FileStatus::Fixed
			} else {
				FileStatus::Unchanged
			};

			return Ok(FileOutcome {
				status,
				text,
				diagnostics,
				faults,
				iterations: pass,
				fixes_applied,
				ignored: result.ignored,
			});
		}

		fixes_applied += result.fixed_count;
		text = result.rendered;
	}

	warn!(max_iterations, fixes_applied, "fixes did not converge");

	Ok(FileOutcome {
		status: FileStatus::NotConverged,
		text,
		diagnostics,
		faults,
		iterations: max_iterations,
		fixes_applied,
		ignored: false,
	})
}

fn timeout_error(
	options: &EngineOptions,
	pass: usize,
	partial: Vec<Diagnostic>,
	faults: Vec<RuleFaultRecord>,
) -> SniffError {
	let limit_ms = options.timeout.map_or(0, |timeout| timeout.as_millis());
	warn!(pass, timeout = ?options.timeout, faults = faults.len(), "file processing timed out");

	SniffError::Timeout {
		limit_ms,
		pass,
		partial,
		faults,
	}
}

/// One tokenize, scan and render cycle. A timeout returns the diagnostics
/// collected so far.
fn run_pass(
	text: &str,
	ruleset: &Ruleset,
	options: &EngineOptions,
	disabled: &BTreeSet<String>,
	deadline: Option<Instant>,
	faults: &mut Vec<RuleFaultRecord>,
) -> Result<PassResult, Vec<Diagnostic>> {
	let tokens = tokenize(text);
	let suppressions = Suppressions::from_tokens(&tokens);

	if suppressions.is_file_ignored() {
		return Ok(PassResult {
			diagnostics: Vec::new(),
			rendered: text.to_string(),
			fixed_count: 0,
			ignored: true,
		});
	}

	let mut sink = DiagnosticSink::new(suppressions, Arc::clone(&options.policy));
	let mut fixer = Fixer::new(&tokens);
	let mut registry = RuleRegistry::new(ruleset, disabled);

	if let Err(ScanInterrupt::Deadline) = registry.scan(&tokens, &mut sink, &mut fixer, deadline, faults) {
		return Err(sink.into_diagnostics());
	}

	let fixed_count = fixer.fixed_count();
	let rendered = if fixed_count > 0 {
		fixer.render()
	} else {
		text.to_string()
	};

	Ok(PassResult {
		diagnostics: sink.into_diagnostics(),
		rendered,
		fixed_count,
		ignored: false,
	})
}
