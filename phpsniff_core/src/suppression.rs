use crate::TokenKind;
use crate::TokenSequence;
use crate::tokens::PHPCS_ANNOTATION_TOKENS;
use crate::utils::common::code_matches;

/// Which codes an annotation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CodeFilter {
	All,
	Codes(Vec<String>),
}

impl CodeFilter {
	fn parse(codes: Vec<String>) -> Self {
		if codes.is_empty() {
			Self::All
		} else {
			Self::Codes(codes)
		}
	}

	fn matches(&self, code: &str) -> bool {
		match self {
			Self::All => true,
			Self::Codes(codes) => codes.iter().any(|prefix| code_matches(prefix, code)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Toggle {
	line: usize,
	enable: bool,
	filter: CodeFilter,
}

/// Replayed `disable` / `enable` state at one line.
#[derive(Debug, Default)]
struct ToggleState {
	all: bool,
	disabled: Vec<String>,
	/// Codes re-enabled while everything else is disabled.
	exceptions: Vec<String>,
}

impl ToggleState {
	fn apply(&mut self, toggle: &Toggle) {
		match (&toggle.filter, toggle.enable) {
			(CodeFilter::All, false) => {
				self.all = true;
				self.disabled.clear();
				self.exceptions.clear();
			}
			(CodeFilter::All, true) => *self = Self::default(),
			(CodeFilter::Codes(codes), false) => {
				if self.all {
					self.exceptions
						.retain(|exception| !codes.iter().any(|code| code_matches(code, exception)));
				} else {
					self.disabled.extend(codes.iter().cloned());
				}
			}
			(CodeFilter::Codes(codes), true) => {
				if self.all {
					self.exceptions.extend(codes.iter().cloned());
				} else {
					self.disabled
						.retain(|disabled| !codes.iter().any(|code| code_matches(code, disabled)));
				}
			}
		}
	}

	fn suppresses(&self, code: &str) -> bool {
		if self.all {
			return !self
				.exceptions
				.iter()
				.any(|exception| code_matches(exception, code));
		}

		self.disabled.iter().any(|prefix| code_matches(prefix, code))
	}
}

/// Inline `phpcs:` suppression annotations of one token sequence.
///
/// * `phpcs:ignoreFile` silences the whole file.
/// * `phpcs:disable [codes]` and `phpcs:enable [codes]` toggle reporting
///   from their line onward.
/// * `phpcs:ignore [codes]` silences its own line when it trails code and
///   the following line otherwise.
///
/// Code lists are comma separated and may be followed by a `-- note`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suppressions {
	ignore_file: bool,
	toggles: Vec<Toggle>,
	ignored_lines: Vec<(usize, CodeFilter)>,
}

impl Suppressions {
	pub fn from_tokens(tokens: &TokenSequence) -> Self {
		let mut suppressions = Self::default();

		for token in tokens.iter().filter(|token| token.is(PHPCS_ANNOTATION_TOKENS)) {
			let filter = CodeFilter::parse(annotation_codes(&token.content));

			match token.kind {
				TokenKind::PhpcsIgnoreFile => suppressions.ignore_file = true,
				TokenKind::PhpcsDisable | TokenKind::PhpcsEnable => {
					suppressions.toggles.push(Toggle {
						line: token.line,
						enable: token.kind == TokenKind::PhpcsEnable,
						filter,
					});
				}
				TokenKind::PhpcsIgnore => {
					let trailing = token.index > 0
						&& tokens
							.find_first_on_line(TokenKind::Whitespace, token.index - 1, true)
							.is_some_and(|first| tokens[first].line == token.line);
					let line = if trailing { token.line } else { token.line + 1 };

					suppressions.ignored_lines.push((line, filter));
				}
				_ => {}
			}
		}

		suppressions
	}

	/// `true` when `phpcs:ignoreFile` appears anywhere in the file.
	pub fn is_file_ignored(&self) -> bool {
		self.ignore_file
	}

	/// `true` when a diagnostic with `code` on `line` must not be reported.
	pub fn is_suppressed(&self, line: usize, code: &str) -> bool {
		if self.ignore_file {
			return true;
		}

		if self
			.ignored_lines
			.iter()
			.any(|(ignored, filter)| *ignored == line && filter.matches(code))
		{
			return true;
		}

		let mut state = ToggleState::default();

		for toggle in self.toggles.iter().take_while(|toggle| toggle.line <= line) {
			state.apply(toggle);
		}

		state.suppresses(code)
	}
}

/// The code list of an annotation comment such as
/// `// phpcs:disable Generic.PHP, PSR2 -- legacy`.
fn annotation_codes(comment: &str) -> Vec<String> {
	let text = comment
		.trim_start_matches("//")
		.trim_start_matches('#')
		.trim_start_matches("/*")
		.trim_end_matches("*/")
		.trim();
	let Some(command) = text.get(6..) else {
		return Vec::new();
	};
	let arguments = command.trim_start_matches(|c: char| c.is_ascii_alphabetic());
	let arguments = arguments.split("--").next().unwrap_or_default();

	arguments
		.split(',')
		.map(str::trim)
		.filter(|code| !code.is_empty())
		.map(ToString::to_string)
		.collect()
}
