use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Diagnostic;
use crate::DiagnosticSink;
use crate::Fixer;
use crate::KindSet;
use crate::PhpsniffConfig;
use crate::RuleFault;
use crate::RuleResult;
use crate::Severity;
use crate::SniffError;
use crate::SniffResult;
use crate::TokenSequence;
use crate::sniffs::CATALOGUE;

/// What the scanner does after a sniff returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessFlow {
	/// Keep scanning at the next token.
	Continue,
	/// Resume scanning at this index. Targets at or before the current
	/// token are ignored. A target past the end stops the scan for every
	/// sniff.
	SkipTo(usize),
}

/// A style check run against a token sequence.
///
/// A fresh instance is created for every pass of every file, so fields
/// hold file-scoped state only.
///
/// # Determinism
///
/// Conflicting fixes are never merged. When two sniffs edit the same token
/// in one pass, the later changeset is dropped and the engine relies on
/// the sniff reporting the same violation, with the same fix, in the next
/// pass. A sniff whose messages or fixes depend on anything but the token
/// sequence and its options may therefore never converge.
pub trait Sniff: Send {
	/// The token kinds this sniff is invoked for. Called once per pass.
	fn register(&self) -> KindSet;

	/// Inspect the token at `ptr`.
	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow>;
}

/// The view of a file handed to [`Sniff::process`].
pub struct SniffFile<'a, 'b> {
	tokens: &'a TokenSequence,
	sink: &'b mut DiagnosticSink,
	fixer: &'b mut Fixer<'a>,
	code: &'b str,
}

impl<'a, 'b> SniffFile<'a, 'b> {
	pub fn new(
		tokens: &'a TokenSequence,
		sink: &'b mut DiagnosticSink,
		fixer: &'b mut Fixer<'a>,
		code: &'b str,
	) -> Self {
		Self {
			tokens,
			sink,
			fixer,
			code,
		}
	}

	pub fn tokens(&self) -> &'a TokenSequence {
		self.tokens
	}

	pub fn fixer(&mut self) -> &mut Fixer<'a> {
		self.fixer
	}

	/// The line ending of the file.
	pub fn eol(&self) -> &'static str {
		self.tokens.eol()
	}

	/// The code of the running sniff.
	pub fn sniff_code(&self) -> &str {
		self.code
	}

	pub fn add_error(&mut self, message: impl Into<String>, ptr: usize, code: &str) -> RuleResult<bool> {
		self.add(message.into(), ptr, code, Severity::Error, false)
	}

	pub fn add_warning(&mut self, message: impl Into<String>, ptr: usize, code: &str) -> RuleResult<bool> {
		self.add(message.into(), ptr, code, Severity::Warning, false)
	}

	/// Report a fixable error. Returns `true` when the sniff should apply
	/// its fix now.
	pub fn add_fixable_error(
		&mut self,
		message: impl Into<String>,
		ptr: usize,
		code: &str,
	) -> RuleResult<bool> {
		self.add(message.into(), ptr, code, Severity::Error, true)
	}

	/// Report a fixable warning. Returns `true` when the sniff should apply
	/// its fix now.
	pub fn add_fixable_warning(
		&mut self,
		message: impl Into<String>,
		ptr: usize,
		code: &str,
	) -> RuleResult<bool> {
		self.add(message.into(), ptr, code, Severity::Warning, true)
	}

	fn add(
		&mut self,
		message: String,
		ptr: usize,
		code: &str,
		severity: Severity,
		fixable: bool,
	) -> RuleResult<bool> {
		let token = self.tokens.get(ptr).ok_or(RuleFault::IndexOutOfRange {
			index: ptr,
			len: self.tokens.len(),
		})?;
		let diagnostic = Diagnostic {
			position: ptr,
			line: token.line,
			column: token.column,
			code: format!("{}.{code}", self.code),
			message,
			severity,
			fixable,
		};
		let outcome = self.sink.report(diagnostic);

		if fixable {
			Ok(outcome.fix_permitted())
		} else {
			Ok(outcome.is_accepted())
		}
	}
}

type SniffFactory = Arc<dyn Fn() -> Box<dyn Sniff> + Send + Sync>;

/// An entry of the built-in catalogue.
#[derive(Debug, Clone, Copy)]
pub struct SniffDefinition {
	/// `Standard.Category.Sniff`
	pub code: &'static str,
	pub description: &'static str,
	/// Validate options and produce a ready to instantiate sniff.
	pub configure: fn(Option<&toml::Value>) -> SniffResult<ConfiguredSniff>,
}

/// A sniff with resolved options.
#[derive(Clone)]
pub struct ConfiguredSniff {
	code: String,
	options: toml::Table,
	factory: SniffFactory,
}

impl ConfiguredSniff {
	/// A sniff without options.
	pub fn new<F, S>(code: impl Into<String>, factory: F) -> Self
	where
		F: Fn() -> S + Send + Sync + 'static,
		S: Sniff + 'static,
	{
		Self {
			code: code.into(),
			options: toml::Table::new(),
			factory: Arc::new(move || -> Box<dyn Sniff> { Box::new(factory()) }),
		}
	}

	/// Deserialize `options` (falling back to `O::default()`) and bind them
	/// to `build`.
	pub fn with_options<O, S>(code: &str, options: Option<&toml::Value>, build: fn(O) -> S) -> SniffResult<Self>
	where
		O: DeserializeOwned + Serialize + Default + Clone + Send + Sync + 'static,
		S: Sniff + 'static,
	{
		let invalid = |reason: String| SniffError::InvalidOption {
			sniff: code.to_string(),
			reason,
		};
		let parsed: O = match options {
			Some(value) => {
				value
					.clone()
					.try_into()
					.map_err(|error: toml::de::Error| invalid(error.message().to_string()))?
			}
			None => O::default(),
		};
		let table = toml::Table::try_from(&parsed).map_err(|error| invalid(error.to_string()))?;

		Ok(Self {
			code: code.to_string(),
			options: table,
			factory: Arc::new(move || -> Box<dyn Sniff> { Box::new(build(parsed.clone())) }),
		})
	}

	pub fn code(&self) -> &str {
		&self.code
	}

	/// The effective options, defaults included.
	pub fn options(&self) -> &toml::Table {
		&self.options
	}

	pub fn instantiate(&self) -> Box<dyn Sniff> {
		(self.factory)()
	}
}

impl fmt::Debug for ConfiguredSniff {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConfiguredSniff")
			.field("code", &self.code)
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}

/// The ordered, immutable list of enabled sniffs.
///
/// Built once at startup and shared by reference with every file.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
	sniffs: Vec<ConfiguredSniff>,
}

impl Ruleset {
	pub fn new(sniffs: Vec<ConfiguredSniff>) -> Self {
		Self { sniffs }
	}

	/// Resolve the sniffs enabled by `config`, every built-in when there is
	/// no config.
	pub fn from_config(config: Option<&PhpsniffConfig>) -> SniffResult<Self> {
		let selected: Vec<&str> = match config.and_then(|config| config.sniffs.as_deref()) {
			Some(codes) => codes.iter().map(String::as_str).collect(),
			None => CATALOGUE.iter().map(|definition| definition.code).collect(),
		};
		let excluded = config.map(|config| &config.exclude_sniffs[..]).unwrap_or_default();

		if let Some(config) = config {
			for code in config.options.keys().chain(excluded) {
				find_definition(code)?;
			}
		}

		let mut sniffs = Vec::with_capacity(selected.len());

		for code in selected {
			let definition = find_definition(code)?;

			if excluded.iter().any(|excluded| excluded == code)
				|| sniffs
					.iter()
					.any(|sniff: &ConfiguredSniff| sniff.code == definition.code)
			{
				continue;
			}

			let options = config.and_then(|config| config.options.get(code));
			sniffs.push((definition.configure)(options)?);
		}

		Ok(Self { sniffs })
	}

	/// Keep only the sniffs named in `codes`, in ruleset order.
	pub fn restrict(&self, codes: &[String]) -> SniffResult<Self> {
		for code in codes {
			find_definition(code)?;
		}

		let sniffs = self
			.sniffs
			.iter()
			.filter(|sniff| codes.iter().any(|code| *code == sniff.code))
			.cloned()
			.collect();

		Ok(Self { sniffs })
	}

	pub fn push(&mut self, sniff: ConfiguredSniff) {
		self.sniffs.push(sniff);
	}

	pub fn iter(&self) -> impl Iterator<Item = &ConfiguredSniff> {
		self.sniffs.iter()
	}

	pub fn len(&self) -> usize {
		self.sniffs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sniffs.is_empty()
	}
}

/// Look up a built-in sniff by its `Standard.Category.Sniff` code.
pub fn find_definition(code: &str) -> SniffResult<&'static SniffDefinition> {
	CATALOGUE
		.iter()
		.find(|definition| definition.code == code)
		.ok_or_else(|| SniffError::UnknownSniff(code.to_string()))
}
