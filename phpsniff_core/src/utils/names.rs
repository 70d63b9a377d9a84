//! Naming convention checks and conversions.

use std::sync::LazyLock;

use regex::Captures;
use regex::Regex;

use crate::RuleFault;
use crate::RuleResult;
use crate::TokenKind;
use crate::TokenSequence;

static PHP_LABEL: LazyLock<Regex> =
	LazyLock::new(|| pattern(r"^[a-zA-Z_\x7f-\x{10FFFF}][a-zA-Z0-9_\x7f-\x{10FFFF}]*$"));
static SNAKE_CASE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[a-z0-9]+(?:_[a-z0-9]+)*$"));
static UPPER_SNAKE_CASE: LazyLock<Regex> =
	LazyLock::new(|| pattern(r"^[A-Z][A-Za-z0-9]*(?:_[A-Z][A-Za-z0-9]*)*$"));
static UPPER_SNAKE_CASE_STRICT: LazyLock<Regex> =
	LazyLock::new(|| pattern(r"^[A-Z][a-z0-9]*(?:_[A-Z][a-z0-9]*)*$"));
static MACRO_CASE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[A-Z0-9]+(?:_[A-Z0-9]+)*$"));
static KEBAB_CASE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[a-z0-9]+(?:-[a-z0-9]+)*$"));
static TRAIN_CASE: LazyLock<Regex> =
	LazyLock::new(|| pattern(r"^[A-Z][A-Za-z0-9]*(?:-[A-Z][A-Za-z0-9]*)*$"));
static TRAIN_CASE_STRICT: LazyLock<Regex> =
	LazyLock::new(|| pattern(r"^[A-Z][a-z0-9]*(?:-[A-Z][a-z0-9]*)*$"));
static COBOL_CASE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[A-Z0-9]+(?:-[A-Z0-9]+)*$"));
static CONSECUTIVE_CAPS: LazyLock<Regex> = LazyLock::new(|| pattern(r"([A-Z])([A-Z]+)([A-Z]|\b|$)"));

fn pattern(source: &str) -> Regex {
	Regex::new(source).expect("static pattern compiles")
}

/// The declared name of a class, interface, trait, enum or function.
///
/// Returns `None` for closures, anonymous classes and declarations that
/// are missing their name. Any other token is a [`RuleFault`].
pub fn get_declaration_name(tokens: &TokenSequence, ptr: usize) -> RuleResult<Option<String>> {
	let token = tokens.get(ptr).ok_or(RuleFault::IndexOutOfRange {
		index: ptr,
		len: tokens.len(),
	})?;

	match token.kind {
		TokenKind::AnonClass | TokenKind::Closure => return Ok(None),
		TokenKind::Function
		| TokenKind::Class
		| TokenKind::Interface
		| TokenKind::Trait
		| TokenKind::Enum => {}
		other => {
			return Err(RuleFault::UnsupportedToken {
				index: ptr,
				found: other.name().to_string(),
				expected: "T_FUNCTION, T_CLASS, T_INTERFACE, T_TRAIT or T_ENUM".to_string(),
			});
		}
	}

	let name = tokens
		.next_non_empty(ptr + 1)
		.filter(|next| tokens[*next].kind == TokenKind::String)
		.map(|next| tokens[next].content.clone());

	Ok(name)
}

/// `true` when `name` is in camel caps.
///
/// * `class_format` requires a leading capital (and ignores `public`).
/// * `public` requires a leading lowercase letter; private names must start
///   with a single underscore instead.
/// * `strict` forbids two capitals in a row. Relaxed mode allows acronyms.
pub fn is_camel_caps(name: &str, class_format: bool, public: bool, strict: bool) -> bool {
	let chars: Vec<char> = name.chars().collect();
	let mut rest = &chars[..];

	if class_format {
		if !rest.first().is_some_and(char::is_ascii_uppercase) {
			return false;
		}
	} else {
		if !public {
			let Some(('_', tail)) = rest.split_first() else {
				return false;
			};
			rest = tail;
		}

		let lower_start = rest.first().is_some_and(char::is_ascii_lowercase);
		let acronym_start = !strict && rest.iter().take_while(|c| c.is_ascii_uppercase()).count() >= 2;

		if !lower_start && !acronym_start {
			return false;
		}
	}

	if !chars.iter().skip(1).all(char::is_ascii_alphanumeric) {
		return false;
	}

	if strict {
		let mut last_was_caps = class_format;

		for character in chars.iter().skip(1) {
			let is_caps = !character.is_ascii_digit() && !character.is_lowercase();

			if is_caps && last_was_caps {
				return false;
			}

			last_was_caps = is_caps;
		}
	}

	true
}

/// `true` when `name` looks like `Underscore_Name`: a leading capital and a
/// capital after every underscore.
pub fn is_underscore_name(name: &str) -> bool {
	if name.contains(' ') || !name.starts_with(|c: char| c.is_ascii_uppercase()) {
		return false;
	}

	name.split('_')
		.filter_map(|bit| bit.chars().next())
		.all(|first| first.to_uppercase().eq([first]))
}

/// `true` when `name` is usable as a PHP identifier.
pub fn is_valid_php_name(name: &str) -> bool {
	PHP_LABEL.is_match(name)
}

pub fn is_snake_case(name: &str) -> bool {
	SNAKE_CASE.is_match(name)
}

pub fn to_snake_case(name: &str) -> String {
	separate_words(name, '-', '_')
}

/// `Upper_Snake_Case`. Strict mode forbids consecutive capitals within a
/// word.
pub fn is_upper_snake_case(name: &str, strict: bool) -> bool {
	if strict {
		UPPER_SNAKE_CASE_STRICT.is_match(name)
	} else {
		UPPER_SNAKE_CASE.is_match(name)
	}
}

pub fn is_macro_case(name: &str) -> bool {
	MACRO_CASE.is_match(name)
}

pub fn is_kebab_case(name: &str) -> bool {
	KEBAB_CASE.is_match(name)
}

/// Convert to `kebab-case`. Returns an empty string when the result would
/// not be valid kebab case.
pub fn to_kebab_case(name: &str) -> String {
	let converted = separate_words(name, '_', '-');

	if is_kebab_case(&converted) {
		converted
	} else {
		String::new()
	}
}

/// `Train-Case`. Strict mode forbids consecutive capitals within a word.
pub fn is_train_case(name: &str, strict: bool) -> bool {
	if strict {
		TRAIN_CASE_STRICT.is_match(name)
	} else {
		TRAIN_CASE.is_match(name)
	}
}

pub fn is_cobol_case(name: &str) -> bool {
	COBOL_CASE.is_match(name)
}

pub fn ltrim_numbers(name: &str) -> &str {
	name.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Lowercase the inside of capital runs: `HTTPServer` becomes `HttpServer`.
pub fn lower_consecutive_caps(name: &str) -> String {
	CONSECUTIVE_CAPS
		.replace_all(name, |captures: &Captures<'_>| {
			format!("{}{}{}", &captures[1], captures[2].to_lowercase(), &captures[3])
		})
		.into_owned()
}

fn separate_words(name: &str, from: char, to: char) -> String {
	let mut separated = String::with_capacity(name.len() + 4);

	for character in name.chars() {
		if character == from {
			separated.push(to);
		} else if character.is_ascii_uppercase() {
			separated.push(to);
			separated.push(character.to_ascii_lowercase());
		} else {
			separated.push(character.to_ascii_lowercase());
		}
	}

	let doubled = format!("{to}{to}");
	separated.replace(&doubled, &to.to_string()).trim_matches(to).to_string()
}
