use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::SniffError;

/// Detect the line ending used by `contents` from its first line break.
/// Files without any line break are treated as using `\n`.
pub fn detect_line_endings(contents: &str) -> &'static str {
	let Some(position) = contents.find(['\r', '\n']) else {
		return "\n";
	};

	let rest = &contents.as_bytes()[position..];
	match rest {
		[b'\r', b'\n', ..] => "\r\n",
		[b'\r', ..] => "\r",
		_ => "\n",
	}
}

/// Make invisible characters visible for use in messages. Characters listed
/// in `exclude` are left untouched.
pub fn prepare_for_output(content: &str, exclude: &[char]) -> String {
	let mut output = String::with_capacity(content.len());

	for character in content.chars() {
		if exclude.contains(&character) {
			output.push(character);
			continue;
		}

		match character {
			'\r' => output.push_str("\\r"),
			'\n' => output.push_str("\\n"),
			'\t' => output.push_str("\\t"),
			' ' => output.push('·'),
			_ => output.push(character),
		}
	}

	output
}

/// Remove `basepath` from the front of `path`. Returns `.` when nothing is
/// left.
pub fn strip_basepath(path: &Path, basepath: Option<&Path>) -> String {
	let Some(basepath) = basepath.filter(|base| !base.as_os_str().is_empty()) else {
		return path.display().to_string();
	};

	let stripped = path.strip_prefix(basepath).unwrap_or(path);
	let display = stripped.display().to_string();

	if display.is_empty() {
		".".to_string()
	} else {
		display
	}
}

/// A sniff code such as `PSR2.Classes.ClassDeclaration`, optionally with the
/// violation code (`...ClassDeclaration.SpaceAfterName`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SniffCode {
	pub standard: String,
	pub category: String,
	pub sniff: String,
	pub code: Option<String>,
}

impl SniffCode {
	/// The code without the violation part.
	pub fn sniff_code(&self) -> String {
		sniff_code(&self.standard, &self.category, &self.sniff)
	}
}

impl FromStr for SniffCode {
	type Err = SniffError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		let parts: Vec<&str> = value.split('.').collect();
		let valid = parts
			.iter()
			.all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));

		match parts[..] {
			[standard, category, sniff] if valid => Ok(Self {
				standard: standard.to_string(),
				category: category.to_string(),
				sniff: sniff.to_string(),
				code: None,
			}),
			[standard, category, sniff, code] if valid => Ok(Self {
				standard: standard.to_string(),
				category: category.to_string(),
				sniff: sniff.to_string(),
				code: Some(code.to_string()),
			}),
			_ => Err(SniffError::UnknownSniff(value.to_string())),
		}
	}
}

impl fmt::Display for SniffCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.standard, self.category, self.sniff)?;

		if let Some(code) = &self.code {
			write!(f, ".{code}")?;
		}

		Ok(())
	}
}

pub fn sniff_code(standard: &str, category: &str, sniff: &str) -> String {
	format!("{standard}.{category}.{sniff}")
}

/// `true` when `prefix` names `code` or one of its `.`-separated parents.
pub fn code_matches(prefix: &str, code: &str) -> bool {
	code == prefix
		|| code
			.strip_prefix(prefix)
			.is_some_and(|rest| rest.starts_with('.'))
}
