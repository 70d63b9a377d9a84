use crate::ConfiguredSniff;
use crate::KindSet;
use crate::ProcessFlow;
use crate::RuleResult;
use crate::Sniff;
use crate::SniffDefinition;
use crate::SniffFile;
use crate::SniffResult;
use crate::TokenKind;
use crate::TokenSequence;

pub const CODE: &str = "Generic.PHP.RequireStrictTypes";

pub const DEFINITION: SniffDefinition = SniffDefinition {
	code: CODE,
	description: "Requires a `declare(strict_types=1)` statement at the top of every file.",
	configure,
};

fn configure(_options: Option<&toml::Value>) -> SniffResult<ConfiguredSniff> {
	Ok(ConfiguredSniff::new(CODE, RequireStrictTypes::default))
}

#[derive(Debug, Default)]
pub struct RequireStrictTypes {
	checked: bool,
}

/// Where the `strict_types` directive was found.
struct Directive {
	/// The value token, when there is one.
	value: Option<usize>,
}

impl Sniff for RequireStrictTypes {
	fn register(&self) -> KindSet {
		TokenKind::OpenTag.into()
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		// Only the first open tag matters. Later ones are usually embedded in
		// HTML.
		if self.checked {
			return Ok(ProcessFlow::Continue);
		}

		self.checked = true;
		let tokens = file.tokens();

		match find_directive(tokens, ptr) {
			Some(Directive { value: Some(value) }) if tokens[value].content.trim() == "0" => {
				let error = "The strict_types declaration must be enabled";

				if file.add_fixable_error(error, value, "Disabled")? {
					file.fixer().replace_token(value, "1")?;
				}
			}
			Some(_) => {}
			None => {
				let error = "Missing required strict_types declaration";

				if file.add_fixable_error(error, ptr, "MissingDeclaration")? {
					let eol = file.eol();
					let declaration = format!("declare(strict_types=1);{eol}");
					let fixer = file.fixer();
					fixer.begin_changeset()?;

					match tokens.next_non_empty(ptr + 1) {
						Some(first) => fixer.insert_before(first, &declaration)?,
						// `<?php` at the very end of the file has no separator.
						None if !tokens[ptr].content.ends_with(char::is_whitespace) => {
							fixer.insert_after(ptr, &format!("{eol}{declaration}"))?;
						}
						None => fixer.insert_after(ptr, &declaration)?,
					}

					fixer.end_changeset()?;
				}
			}
		}

		Ok(ProcessFlow::Continue)
	}
}

/// Look for `strict_types` in the `declare` statements directly after the
/// open tag.
fn find_directive(tokens: &TokenSequence, open_tag: usize) -> Option<Directive> {
	let mut current = tokens.next_non_empty(open_tag + 1)?;

	while tokens[current].kind == TokenKind::Declare {
		let opener = tokens.find_next(TokenKind::OpenParenthesis, current + 1, None, false)?;
		let closer = tokens.parenthesis_closer(opener)?;
		let directive = (opener + 1..closer).find(|index| {
			tokens[*index].kind == TokenKind::String
				&& tokens[*index].content.eq_ignore_ascii_case("strict_types")
		});

		if let Some(directive) = directive {
			let value = tokens
				.next_non_empty(directive + 1)
				.filter(|equal| tokens[*equal].kind == TokenKind::Equal)
				.and_then(|equal| tokens.next_non_empty(equal + 1))
				.filter(|value| *value < closer);

			return Some(Directive { value });
		}

		let after = tokens.next_non_empty(closer + 1)?;
		let end = match tokens[after].kind {
			TokenKind::OpenCurlyBracket => tokens[after].structural.scope_closer?,
			TokenKind::Semicolon => after,
			_ => return None,
		};

		current = tokens.next_non_empty(end + 1)?;
	}

	None
}
