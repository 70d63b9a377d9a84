use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crate::ConfiguredSniff;
use crate::Diagnostic;
use crate::KindSet;
use crate::PhpsniffConfig;
use crate::ProcessFlow;
use crate::RuleFault;
use crate::RuleResult;
use crate::Ruleset;
use crate::Sniff;
use crate::SniffFile;
use crate::SniffResult;
use crate::TokenKind;
use crate::tokens::EMPTY_TOKENS;

pub fn configured<S>(code: &str, sniff: S) -> ConfiguredSniff
where
	S: Sniff + Clone + Sync + 'static,
{
	ConfiguredSniff::new(code, move || sniff.clone())
}

/// A ruleset holding only the built-in sniff `code`, with `options` as its
/// TOML option table.
pub fn builtin(code: &str, options: &str) -> SniffResult<Ruleset> {
	let config = PhpsniffConfig::parse(&format!("sniffs = [\"{code}\"]\n[options.\"{code}\"]\n{options}\n"))?;
	Ruleset::from_config(Some(&config))
}

/// Kinds of every token that is not whitespace or a comment.
pub fn significant_kinds(source: &str) -> Vec<TokenKind> {
	crate::tokenize(source)
		.iter()
		.filter(|token| !EMPTY_TOKENS.contains(token.kind))
		.map(|token| token.kind)
		.collect()
}

/// Replaces identifiers reading `from` with `to`.
#[derive(Debug, Clone)]
pub struct ReplaceSniff {
	pub from: &'static str,
	pub to: &'static str,
}

impl Sniff for ReplaceSniff {
	fn register(&self) -> KindSet {
		TokenKind::String.into()
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		if file.tokens()[ptr].content != self.from {
			return Ok(ProcessFlow::Continue);
		}

		let error = format!("Expected \"{}\"; found \"{}\"", self.to, self.from);

		if file.add_fixable_error(error, ptr, "Found")? {
			file.fixer().replace_token(ptr, self.to)?;
		}

		Ok(ProcessFlow::Continue)
	}
}

pub fn replace(code: &str, from: &'static str, to: &'static str) -> ConfiguredSniff {
	configured(code, ReplaceSniff { from, to })
}

/// Uppercases every identifier that has a lowercase letter.
#[derive(Debug, Clone)]
pub struct UppercaseSniff;

impl Sniff for UppercaseSniff {
	fn register(&self) -> KindSet {
		TokenKind::String.into()
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		let content = &file.tokens()[ptr].content;
		let upper = content.to_uppercase();

		if *content == upper {
			return Ok(ProcessFlow::Continue);
		}

		let error = format!("Expected \"{upper}\"; found \"{content}\"");

		if file.add_fixable_error(error, ptr, "Lowercase")? {
			file.fixer().replace_token(ptr, upper)?;
		}

		Ok(ProcessFlow::Continue)
	}
}

/// Sleeps for `delay` on every identifier.
#[derive(Debug, Clone)]
pub struct SlowSniff {
	pub delay: Duration,
}

impl Sniff for SlowSniff {
	fn register(&self) -> KindSet {
		TokenKind::String.into()
	}

	fn process(&mut self, _file: &mut SniffFile<'_, '_>, _ptr: usize) -> RuleResult<ProcessFlow> {
		std::thread::sleep(self.delay);

		Ok(ProcessFlow::Continue)
	}
}

/// Faults on the open tag.
#[derive(Debug, Clone)]
pub struct FaultySniff;

impl Sniff for FaultySniff {
	fn register(&self) -> KindSet {
		TokenKind::OpenTag.into()
	}

	fn process(&mut self, _file: &mut SniffFile<'_, '_>, _ptr: usize) -> RuleResult<ProcessFlow> {
		Err(RuleFault::Custom("boom".to_string()))
	}
}

/// Opens a changeset and returns without closing it.
#[derive(Debug, Clone)]
pub struct UnclosedSniff;

impl Sniff for UnclosedSniff {
	fn register(&self) -> KindSet {
		TokenKind::String.into()
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		let fixer = file.fixer();
		fixer.begin_changeset()?;
		fixer.replace(ptr, "changed")?;

		Ok(ProcessFlow::Continue)
	}
}

/// Requests a skip to `target` when it sees the identifier `skip`.
#[derive(Debug, Clone)]
pub struct SkipSniff {
	pub target: usize,
}

impl Sniff for SkipSniff {
	fn register(&self) -> KindSet {
		TokenKind::String.into()
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		if file.tokens()[ptr].content == "skip" {
			return Ok(ProcessFlow::SkipTo(self.target));
		}

		Ok(ProcessFlow::Continue)
	}
}

/// Remembers the content of every identifier it is invoked for.
#[derive(Debug, Clone, Default)]
pub struct RecordingSniff {
	pub seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingSniff {
	pub fn seen(&self) -> Vec<String> {
		self.seen
			.lock()
			.unwrap_or_else(|e| panic!("poisoned: {e}"))
			.clone()
	}
}

impl Sniff for RecordingSniff {
	fn register(&self) -> KindSet {
		TokenKind::String.into()
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		self.seen
			.lock()
			.unwrap_or_else(|e| panic!("poisoned: {e}"))
			.push(file.tokens()[ptr].content.clone());

		Ok(ProcessFlow::Continue)
	}
}

pub fn codes(diagnostics: &[Diagnostic]) -> Vec<&str> {
	diagnostics
		.iter()
		.map(|diagnostic| diagnostic.code.as_str())
		.collect()
}

pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
	let path = root.join(relative);

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
	}

	std::fs::write(&path, content).unwrap_or_else(|e| panic!("write: {e}"));
	path
}
