use serde::Deserialize;
use serde::Serialize;

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
use crate::tokens::COMMENT_TOKENS;
use crate::tokens::EMPTY_TOKENS;
use crate::tokens::METHOD_PREFIX_TOKENS;
use crate::tokens::OO_SCOPE_TOKENS;
use crate::tokens::PHPCS_ANNOTATION_TOKENS;

pub const CODE: &str = "Squiz.WhiteSpace.MemberVarSpacing";

pub const DEFINITION: SniffDefinition = SniffDefinition {
	code: CODE,
	description: "Checks the blank lines before property declarations and inside their comment and attribute preamble.",
	configure,
};

fn configure(options: Option<&toml::Value>) -> SniffResult<ConfiguredSniff> {
	ConfiguredSniff::with_options(CODE, options, MemberVarSpacing::new)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct MemberVarSpacingOptions {
	/// Blank lines between member vars.
	pub spacing: usize,
	/// Blank lines between the opening brace and the first member var.
	pub spacing_before_first: usize,
}

impl Default for MemberVarSpacingOptions {
	fn default() -> Self {
		Self {
			spacing: 1,
			spacing_before_first: 1,
		}
	}
}

#[derive(Debug)]
pub struct MemberVarSpacing {
	options: MemberVarSpacingOptions,
	/// Variables before this index belong to an already checked declaration.
	resume_at: usize,
}

impl MemberVarSpacing {
	pub fn new(options: MemberVarSpacingOptions) -> Self {
		Self {
			options,
			resume_at: 0,
		}
	}

	fn check_preamble(
		file: &mut SniffFile<'_, '_>,
		start: usize,
		start_of_statement: usize,
	) -> RuleResult<()> {
		let tokens = file.tokens();
		let mut index = start;

		while index < start_of_statement {
			// Blank lines inside doc comments and attributes are left alone.
			if let Some(closer) = tokens
				.attribute_closer(index)
				.or_else(|| tokens.comment_closer(index))
				.filter(|closer| *closer > index)
			{
				index = closer + 1;
				continue;
			}

			let token = &tokens[index];
			let after_annotation = index
				.checked_sub(1)
				.is_some_and(|previous| PHPCS_ANNOTATION_TOKENS.contains(tokens[previous].kind));

			if token.column != 1
				|| token.kind != TokenKind::Whitespace
				|| tokens.line(index + 1) == Some(token.line)
				|| after_annotation
			{
				index += 1;
				continue;
			}

			let Some(next) = tokens.find_next(TokenKind::Whitespace, index + 1, None, true) else {
				break;
			};
			let found = tokens[next].line - token.line;
			let error = format!(
				"Expected no blank lines between the member var comment/attributes and the declaration; {found} found"
			);

			if file.add_fixable_error(error, index, "BlankLineInPreamble")? {
				let fixer = file.fixer();
				fixer.begin_changeset()?;

				for blank in index..next {
					if tokens[blank].line == tokens[next].line {
						break;
					}

					fixer.remove(blank)?;
				}

				fixer.end_changeset()?;
			}

			index = next + 1;
		}

		Ok(())
	}
}

impl Sniff for MemberVarSpacing {
	fn register(&self) -> KindSet {
		TokenKind::Variable.into()
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		let tokens = file.tokens();

		if ptr < self.resume_at || !is_member_var(tokens, ptr) {
			return Ok(ProcessFlow::Continue);
		}

		let Some(end_of_previous) = ptr.checked_sub(1).and_then(|start| {
			tokens
				.search(KindSet::of(&[
					TokenKind::Semicolon,
					TokenKind::OpenCurlyBracket,
					TokenKind::CloseCurlyBracket,
				]))
				.local()
				.previous(start, None)
		}) else {
			return Ok(ProcessFlow::Continue);
		};

		// A property without a modifier is a parse error.
		let Some(start_of_statement) = tokens
			.search(METHOD_PREFIX_TOKENS | TokenKind::Var)
			.local()
			.next(end_of_previous + 1, Some(ptr))
		else {
			return Ok(ProcessFlow::Continue);
		};

		if let Some(end) = tokens.search(TokenKind::Semicolon).local().next(ptr + 1, None) {
			self.resume_at = end;
		}

		let start = preamble_start(tokens, start_of_statement);
		Self::check_preamble(file, start, start_of_statement)?;

		let first = tokens
			.find_first_on_line(EMPTY_TOKENS, start, true)
			.unwrap_or(start);
		let Some(prev) = first.checked_sub(1).and_then(|start| tokens.previous_non_empty(start)) else {
			return Ok(ProcessFlow::Continue);
		};
		let owner = tokens[prev].structural.scope_condition.map(|owner| tokens[owner].kind);

		// Spacing after a method body is left to function spacing checks.
		if tokens[prev].kind == TokenKind::CloseCurlyBracket && owner == Some(TokenKind::Function) {
			return Ok(ProcessFlow::Continue);
		}

		let is_first = tokens[prev].kind == TokenKind::OpenCurlyBracket
			&& owner.is_some_and(|kind| OO_SCOPE_TOKENS.contains(kind));
		let (spacing, code, message) = if is_first {
			(self.options.spacing_before_first, "FirstIncorrect", "before first member var")
		} else {
			(self.options.spacing, "Incorrect", "before member var")
		};
		let found = tokens[first].line.saturating_sub(tokens[prev].line + 1);

		if found == spacing {
			return Ok(ProcessFlow::Continue);
		}

		let error = format!("Expected {spacing} blank line(s) {message}; {found} found");

		if file.add_fixable_error(error, start_of_statement, code)? {
			let fixer = file.fixer();
			fixer.begin_changeset()?;

			for index in prev + 1..first {
				if tokens[index].line == tokens[prev].line {
					continue;
				}

				if tokens[index].line == tokens[first].line {
					for _ in 0..spacing {
						fixer.add_newline_before(index)?;
					}

					break;
				}

				fixer.remove(index)?;
			}

			fixer.end_changeset()?;
		}

		Ok(ProcessFlow::Continue)
	}
}

/// A variable declared directly in a class-like body.
fn is_member_var(tokens: &TokenSequence, ptr: usize) -> bool {
	tokens[ptr].structural.nested_parentheses.is_empty()
		&& tokens
			.innermost_condition(ptr)
			.is_some_and(|owner| OO_SCOPE_TOKENS.contains(tokens[owner].kind))
}

/// The first token of the attributes and comment that belong to the
/// declaration starting at `start_of_statement`.
fn preamble_start(tokens: &TokenSequence, start_of_statement: usize) -> usize {
	let mut start = start_of_statement;
	let mut seen_comment = false;
	let mut prev = start_of_statement;

	while prev > 0 {
		prev -= 1;
		let token = &tokens[prev];

		if token.kind == TokenKind::Whitespace {
			continue;
		}

		if let Some(opener) = tokens.attribute_opener(prev) {
			prev = opener;
			start = prev;
			continue;
		}

		if !seen_comment && token.kind == TokenKind::DocCommentClose {
			let Some(opener) = tokens.comment_opener(prev) else {
				break;
			};

			prev = opener;
			start = prev;
			seen_comment = true;
			continue;
		}

		// A comment on a line of its own belongs to the declaration, along
		// with the comments on the lines directly above it.
		if !seen_comment && COMMENT_TOKENS.contains(token.kind) {
			let own_line = prev
				.checked_sub(1)
				.and_then(|before| tokens.previous_non_empty(before))
				.is_none_or(|content| tokens[content].line != token.line);

			if own_line {
				let mut start_of_comment = prev;

				for find in (1..prev).rev() {
					if tokens[find].kind == TokenKind::Whitespace {
						continue;
					}

					if COMMENT_TOKENS.contains(tokens[find].kind)
						&& tokens[find].line + 1 == tokens[start_of_comment].line
					{
						start_of_comment = find;
						continue;
					}

					break;
				}

				start = start_of_comment;
			}
		}

		break;
	}

	start
}
