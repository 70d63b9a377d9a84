use std::collections::BTreeSet;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::DiagnosticSink;
use crate::Fixer;
use crate::ProcessFlow;
use crate::RuleFault;
use crate::Ruleset;
use crate::Sniff;
use crate::SniffFile;
use crate::TokenKind;
use crate::TokenSequence;

/// A sniff fault recorded against the file it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFaultRecord {
	/// Code of the faulting sniff.
	pub sniff: String,
	/// The token the sniff was invoked for.
	pub position: usize,
	#[serde(serialize_with = "serialize_fault")]
	pub fault: RuleFault,
}

fn serialize_fault<S: serde::Serializer>(fault: &RuleFault, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.collect_str(fault)
}

struct RegisteredSniff<'r> {
	code: &'r str,
	sniff: Box<dyn Sniff>,
	disabled: bool,
}

/// Why a scan stopped before the end of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanInterrupt {
	/// The per-file deadline passed.
	Deadline,
}

/// Freshly instantiated sniffs with a kind to sniff lookup.
pub struct RuleRegistry<'r> {
	sniffs: Vec<RegisteredSniff<'r>>,
	listeners: Vec<Vec<usize>>,
}

impl<'r> RuleRegistry<'r> {
	/// Instantiate every sniff of `ruleset` except those in `disabled`.
	pub fn new(ruleset: &'r Ruleset, disabled: &BTreeSet<String>) -> Self {
		let mut listeners = vec![Vec::new(); TokenKind::ALL.len()];
		let mut sniffs = Vec::with_capacity(ruleset.len());

		for configured in ruleset.iter() {
			if disabled.contains(configured.code()) {
				continue;
			}

			let sniff = configured.instantiate();
			let handle = sniffs.len();

			for kind in sniff.register().iter() {
				listeners[kind as usize].push(handle);
			}

			sniffs.push(RegisteredSniff {
				code: configured.code(),
				sniff,
				disabled: false,
			});
		}

		Self { sniffs, listeners }
	}

	/// Codes of the sniffs listening for `kind`, in registration order.
	pub fn listeners(&self, kind: TokenKind) -> impl Iterator<Item = &str> {
		self.listeners[kind as usize]
			.iter()
			.map(|handle| self.sniffs[*handle].code)
	}

	/// Scan `tokens` once from the start, invoking every interested sniff for
	/// each token.
	///
	/// Skip requests move the scan forward to the furthest requested
	/// position, never backward. A faulting sniff has its open changeset
	/// rolled back and is disabled for the rest of the scan. The deadline is
	/// checked before every invocation.
	pub fn scan<'a>(
		&mut self,
		tokens: &'a TokenSequence,
		sink: &mut DiagnosticSink,
		fixer: &mut Fixer<'a>,
		deadline: Option<Instant>,
		faults: &mut Vec<RuleFaultRecord>,
	) -> Result<(), ScanInterrupt> {
		let mut position = 0;

		while position < tokens.len() {
			let kind = tokens[position].kind;
			let mut next = position + 1;

			for &handle in &self.listeners[kind as usize] {
				if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
					return Err(ScanInterrupt::Deadline);
				}

				let registered = &mut self.sniffs[handle];

				if registered.disabled {
					continue;
				}

				let mut file = SniffFile::new(tokens, sink, fixer, registered.code);
				let mut result = registered.sniff.process(&mut file, position);

				if fixer.in_changeset() {
					fixer.rollback_changeset();

					if result.is_ok() {
						result = Err(RuleFault::UnclosedChangeset);
					}
				}

				match result {
					Ok(ProcessFlow::Continue) => {}
					Ok(ProcessFlow::SkipTo(target)) => {
						if target > next {
							debug!(sniff = registered.code, from = position, to = target, "skip requested");
							next = target;
						}
					}
					Err(fault) => {
						warn!(sniff = registered.code, position, %fault, "sniff faulted and is disabled for this file");
						registered.disabled = true;
						faults.push(RuleFaultRecord {
							sniff: registered.code.to_string(),
							position,
							fault,
						});
					}
				}
			}

			position = next;
		}

		Ok(())
	}

	/// Codes of sniffs that faulted during a scan.
	pub fn disabled(&self) -> impl Iterator<Item = &str> {
		self.sniffs
			.iter()
			.filter(|registered| registered.disabled)
			.map(|registered| registered.code)
	}
}
