use crate::tokens::EMPTY_TOKENS;
use crate::tokens::KindSet;
use crate::tokens::TokenKind;
use crate::tokens::TokenSequence;

/// A configurable token search. Build one with [`TokenSequence::search`].
///
/// ```rust
/// use phpsniff_core::TokenKind;
/// use phpsniff_core::tokenize;
///
/// let tokens = tokenize("<?php foo(1); bar(2);");
/// let bar = tokens
/// 	.search(TokenKind::String)
/// 	.value("bar")
/// 	.next(0, None);
/// assert_eq!(bar.map(|index| tokens[index].content.as_str()), Some("bar"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Search<'a> {
	tokens: &'a TokenSequence,
	kinds: KindSet,
	exclude: bool,
	value: Option<&'a str>,
	local: bool,
}

impl<'a> Search<'a> {
	/// Match tokens whose kind is *not* in the set.
	#[must_use]
	pub fn exclude(mut self) -> Self {
		self.exclude = true;
		self
	}

	/// Additionally require the token content to equal `value`.
	#[must_use]
	pub fn value(mut self, value: &'a str) -> Self {
		self.value = Some(value);
		self
	}

	/// Stay within the current statement. Forward searches stop at the first
	/// `;` that is not itself a match. Backward searches step over closed
	/// bracket, parenthesis and scope groups and stop at `;`.
	#[must_use]
	pub fn local(mut self) -> Self {
		self.local = true;
		self
	}

	fn matches(&self, index: usize) -> bool {
		let token = &self.tokens[index];
		let found = self.kinds.contains(token.kind) != self.exclude;

		found && self.value.is_none_or(|value| token.content == value)
	}

	/// Search forward over `[start, end)`. `end` defaults to the end of the
	/// sequence.
	pub fn next(&self, start: usize, end: Option<usize>) -> Option<usize> {
		let end = end.map_or(self.tokens.len(), |end| end.min(self.tokens.len()));

		for index in start..end {
			if self.matches(index) {
				return Some(index);
			}

			if self.local && self.tokens[index].kind == TokenKind::Semicolon {
				break;
			}
		}

		None
	}

	/// Search backward from `start` down to `end` inclusive. `end` defaults
	/// to the first token.
	pub fn previous(&self, start: usize, end: Option<usize>) -> Option<usize> {
		if self.tokens.is_empty() {
			return None;
		}

		let end = end.unwrap_or(0);
		let mut index = start.min(self.tokens.len() - 1);

		while index >= end {
			if self.matches(index) {
				return Some(index);
			}

			if self.local {
				let token = &self.tokens[index];
				let refs = &token.structural;

				if token.kind == TokenKind::Semicolon {
					break;
				}

				// Jump to the opener of a group that closes here.
				if refs.closer == Some(index) {
					if let Some(opener) = refs.opener.filter(|opener| *opener < index) {
						index = opener;
					}
				}
			}

			if index == 0 {
				break;
			}

			index -= 1;
		}

		None
	}
}

impl TokenSequence {
	/// Start building a search for `kinds`.
	pub fn search(&self, kinds: impl Into<KindSet>) -> Search<'_> {
		Search {
			tokens: self,
			kinds: kinds.into(),
			exclude: false,
			value: None,
			local: false,
		}
	}

	/// The first token in `[start, end)` whose kind is in `kinds`, or not in
	/// `kinds` when `exclude` is set.
	pub fn find_next(
		&self,
		kinds: impl Into<KindSet>,
		start: usize,
		end: Option<usize>,
		exclude: bool,
	) -> Option<usize> {
		let search = self.search(kinds);
		let search = if exclude { search.exclude() } else { search };

		search.next(start, end)
	}

	/// The last token from `start` down to `end` (inclusive) whose kind is in
	/// `kinds`, or not in `kinds` when `exclude` is set.
	pub fn find_previous(
		&self,
		kinds: impl Into<KindSet>,
		start: usize,
		end: Option<usize>,
		exclude: bool,
	) -> Option<usize> {
		let search = self.search(kinds);
		let search = if exclude { search.exclude() } else { search };

		search.previous(start, end)
	}

	/// The first token at or after `start` that is not whitespace or a
	/// comment.
	pub fn next_non_empty(&self, start: usize) -> Option<usize> {
		self.find_next(EMPTY_TOKENS, start, None, true)
	}

	/// The last token at or before `start` that is not whitespace or a
	/// comment.
	pub fn previous_non_empty(&self, start: usize) -> Option<usize> {
		self.find_previous(EMPTY_TOKENS, start, None, true)
	}

	/// The first token on the line of `start`, at or before `start`, whose
	/// kind is in `kinds` (or not in `kinds` when `exclude` is set).
	pub fn find_first_on_line(
		&self,
		kinds: impl Into<KindSet>,
		start: usize,
		exclude: bool,
	) -> Option<usize> {
		let kinds = kinds.into();
		let line = self.get(start)?.line;
		let mut found = None;

		for index in (0..=start).rev() {
			let token = &self[index];

			if token.line < line {
				break;
			}

			if kinds.contains(token.kind) != exclude {
				found = Some(index);
			}
		}

		found
	}

	/// The token that ends the statement containing `start`: the next `;` or
	/// close tag outside of nested groups, or the last token before an
	/// enclosing closer. Falls back to the last token of the sequence.
	pub fn find_end_of_statement(&self, start: usize) -> usize {
		let last = self.len().saturating_sub(1);
		let mut index = start;

		while index <= last {
			let token = &self[index];
			let refs = &token.structural;

			match token.kind {
				TokenKind::Semicolon | TokenKind::CloseTag => return index,
				TokenKind::CloseCurlyBracket
				| TokenKind::CloseParenthesis
				| TokenKind::CloseSquareBracket
					if refs.opener.is_some_and(|opener| opener < start) =>
				{
					return self.previous_non_empty(index.saturating_sub(1)).unwrap_or(start);
				}
				_ => {}
			}

			match refs.closer {
				Some(closer) if refs.opener == Some(index) && closer > index => index = closer + 1,
				_ => index += 1,
			}
		}

		last
	}

	/// The first significant token of the statement containing `start`.
	pub fn find_start_of_statement(&self, start: usize) -> usize {
		let mut index = start;

		while index > 0 {
			let previous = index - 1;
			let token = &self[previous];
			let refs = &token.structural;

			match token.kind {
				TokenKind::Semicolon
				| TokenKind::OpenTag
				| TokenKind::OpenTagWithEcho
				| TokenKind::CloseTag
				| TokenKind::OpenCurlyBracket
				| TokenKind::OpenParenthesis
				| TokenKind::OpenSquareBracket
				| TokenKind::AttributeOpen => break,
				TokenKind::CloseCurlyBracket if refs.scope_condition.is_some() => break,
				_ => {}
			}

			index = match refs.opener {
				Some(opener) if refs.closer == Some(previous) && opener < previous => opener,
				_ => previous,
			};
		}

		self.next_non_empty(index).filter(|found| *found <= start).unwrap_or(start)
	}
}
