use logos::Logos;

use crate::structure::annotate;
use crate::tokens::EMPTY_TOKENS;
use crate::tokens::StructuralRefs;
use crate::tokens::Token;
use crate::tokens::TokenKind;
use crate::tokens::TokenSequence;
use crate::utils::common::detect_line_endings;

/// Raw tokens produced by logos for the PHP portions of a file.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum RawToken {
	#[token("?>")]
	CloseTag,
	#[regex(r"[ \t\r\n]+")]
	Whitespace,
	#[regex(r"//([^\n\r?]|\?[^>\n\r])*", allow_greedy = true)]
	LineComment,
	#[regex(r"#(([^\[\n\r?]|\?[^>\n\r])([^\n\r?]|\?[^>\n\r])*)?", allow_greedy = true)]
	HashComment,
	#[regex(r"/\*([^*]|\*+[^*/])*\*+/", allow_greedy = true)]
	BlockComment,
	#[regex(r"/\*([^*]|\*+[^*/])*\**", allow_greedy = true)]
	UnterminatedBlockComment,
	#[regex(r"'([^'\\]|\\(.|\n))*'", allow_greedy = true)]
	SingleQuotedString,
	#[regex(r"'([^'\\]|\\(.|\n))*", allow_greedy = true)]
	UnterminatedSingleQuotedString,
	#[regex(r#""([^"\\]|\\(.|\n))*""#, allow_greedy = true)]
	DoubleQuotedString,
	#[regex(r#""([^"\\]|\\(.|\n))*"#, allow_greedy = true)]
	UnterminatedDoubleQuotedString,
	#[regex(r"`[^`]*`?", allow_greedy = true)]
	Backtick,
	#[regex(r#"<<<[ \t]*("[A-Za-z_][A-Za-z0-9_]*"|'[A-Za-z_][A-Za-z0-9_]*'|[A-Za-z_][A-Za-z0-9_]*)"#)]
	HeredocStart,
	#[regex(r"\$[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*", allow_greedy = true)]
	Variable,
	#[regex(r"0[xX][0-9a-fA-F_]+|0[bB][01_]+|[0-9][0-9_]*")]
	LNumber,
	#[regex(r"([0-9][0-9_]*)?\.[0-9][0-9_]*([eE][+-]?[0-9]+)?|[0-9][0-9_]*\.([eE][+-]?[0-9]+)?|[0-9][0-9_]*[eE][+-]?[0-9]+")]
	DNumber,
	#[regex(r"[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*", allow_greedy = true)]
	Ident,
	#[token("#[")]
	AttributeOpen,
	#[token("{")]
	OpenCurly,
	#[token("}")]
	CloseCurly,
	#[token("(")]
	OpenParen,
	#[token(")")]
	CloseParen,
	#[token("[")]
	OpenSquare,
	#[token("]")]
	CloseSquare,
	#[token(";")]
	Semicolon,
	#[token(",")]
	Comma,
	#[token("\\")]
	NsSeparator,
	#[token(":")]
	Colon,
	#[token("::")]
	DoubleColon,
	#[token("->")]
	ObjectOperator,
	#[token("?->")]
	NullsafeObjectOperator,
	#[token("=>")]
	DoubleArrow,
	#[token("=")]
	Equal,
	#[token("&")]
	BitwiseAnd,
	#[token("...")]
	Ellipsis,
	#[token("?")]
	InlineThen,
	#[regex(r"===?|!==?|<>|<=>|<=?|>=?|\+\+|--|\*\*=?|[-+*/%.|^&]=|<<=?|>>=?|\?\?=?|&&|\|\||[-+*/%.!|^~@$]")]
	Operator,
}

impl RawToken {
	fn kind(self) -> TokenKind {
		match self {
			Self::CloseTag => TokenKind::CloseTag,
			Self::Whitespace => TokenKind::Whitespace,
			Self::LineComment
			| Self::HashComment
			| Self::BlockComment
			| Self::UnterminatedBlockComment => TokenKind::Comment,
			Self::SingleQuotedString | Self::UnterminatedSingleQuotedString => {
				TokenKind::ConstantString
			}
			Self::DoubleQuotedString | Self::UnterminatedDoubleQuotedString => {
				TokenKind::DoubleQuotedString
			}
			Self::Backtick => TokenKind::Backtick,
			Self::HeredocStart => TokenKind::Heredoc,
			Self::Variable => TokenKind::Variable,
			Self::LNumber => TokenKind::LNumber,
			Self::DNumber => TokenKind::DNumber,
			Self::Ident => TokenKind::String,
			Self::AttributeOpen => TokenKind::AttributeOpen,
			Self::OpenCurly => TokenKind::OpenCurlyBracket,
			Self::CloseCurly => TokenKind::CloseCurlyBracket,
			Self::OpenParen => TokenKind::OpenParenthesis,
			Self::CloseParen => TokenKind::CloseParenthesis,
			Self::OpenSquare => TokenKind::OpenSquareBracket,
			Self::CloseSquare => TokenKind::CloseSquareBracket,
			Self::Semicolon => TokenKind::Semicolon,
			Self::Comma => TokenKind::Comma,
			Self::NsSeparator => TokenKind::NsSeparator,
			Self::Colon => TokenKind::Colon,
			Self::DoubleColon => TokenKind::DoubleColon,
			Self::ObjectOperator => TokenKind::ObjectOperator,
			Self::NullsafeObjectOperator => TokenKind::NullsafeObjectOperator,
			Self::DoubleArrow => TokenKind::DoubleArrow,
			Self::Equal => TokenKind::Equal,
			Self::BitwiseAnd => TokenKind::BitwiseAnd,
			Self::Ellipsis => TokenKind::Ellipsis,
			Self::InlineThen => TokenKind::InlineThen,
			Self::Operator => TokenKind::Operator,
		}
	}
}

/// Context states for the walker.
enum LexerContext {
	/// Outside of PHP tags.
	Html,
	/// Inside PHP tags.
	Php,
}

/// Walks the source, switching between inline HTML and logos-driven PHP
/// lexing, and collects `(kind, content)` pieces.
struct TokenWalker<'a> {
	source: &'a str,
	/// Byte offset of the next unconsumed character.
	offset: usize,
	/// The character that ends a line for this source.
	line_break: char,
	context: LexerContext,
	pieces: Vec<(TokenKind, &'a str)>,
}

impl<'a> TokenWalker<'a> {
	fn new(source: &'a str, eol: &str) -> Self {
		Self {
			source,
			offset: 0,
			line_break: if eol == "\r" { '\r' } else { '\n' },
			context: LexerContext::Html,
			pieces: Vec::new(),
		}
	}

	fn rest(&self) -> &'a str {
		&self.source[self.offset..]
	}

	fn push(&mut self, kind: TokenKind, len: usize) {
		let content = &self.source[self.offset..self.offset + len];
		self.offset += len;

		if !content.is_empty() {
			self.pieces.push((kind, content));
		}
	}

	/// Push a piece, splitting it after every line break.
	fn push_lines(&mut self, kind: TokenKind, len: usize) {
		let content = &self.source[self.offset..self.offset + len];
		self.offset += len;

		for line in content.split_inclusive(self.line_break) {
			self.pieces.push((kind, line));
		}
	}

	fn process(mut self) -> Vec<(TokenKind, &'a str)> {
		while self.offset < self.source.len() {
			match self.context {
				LexerContext::Html => self.process_html(),
				LexerContext::Php => self.process_php(),
			}
		}

		self.pieces
	}

	fn process_html(&mut self) {
		let Some(start) = memstr(self.rest().as_bytes(), b"<?") else {
			let len = self.rest().len();
			self.push(TokenKind::InlineHtml, len);
			return;
		};

		self.push(TokenKind::InlineHtml, start);

		let rest = self.rest();
		let (kind, mut len) = if rest
			.get(2..5)
			.is_some_and(|tag| tag.eq_ignore_ascii_case("php"))
		{
			(TokenKind::OpenTag, 5)
		} else if rest[2..].starts_with('=') {
			(TokenKind::OpenTagWithEcho, 3)
		} else {
			(TokenKind::OpenTag, 2)
		};

		if kind == TokenKind::OpenTag {
			len += leading_line_ending_or_blank(&rest[len..]);
		}

		self.push(kind, len);
		self.context = LexerContext::Php;
	}

	fn process_php(&mut self) {
		let rest = self.rest();
		let mut lexer = RawToken::lexer(rest);

		while let Some(result) = lexer.next() {
			let span = lexer.span();
			let slice = lexer.slice();

			let Ok(raw) = result else {
				self.push(TokenKind::Unknown, slice.len());
				continue;
			};

			match raw {
				RawToken::CloseTag => {
					let len = 2 + leading_line_ending(&rest[span.end..]);
					self.push(TokenKind::CloseTag, len);
					self.context = LexerContext::Html;
					return;
				}
				RawToken::HeredocStart => {
					self.push_heredoc(slice);
					return;
				}
				RawToken::Whitespace | RawToken::BlockComment | RawToken::UnterminatedBlockComment => {
					if raw != RawToken::Whitespace && is_doc_comment(slice) {
						self.push_doc_comment(slice);
					} else if raw == RawToken::BlockComment && !slice.contains(self.line_break) {
						let kind = annotation_kind(slice).unwrap_or(TokenKind::Comment);
						self.push(kind, slice.len());
					} else {
						self.push_lines(raw.kind(), slice.len());
					}
				}
				RawToken::LineComment | RawToken::HashComment => {
					let kind = annotation_kind(slice).unwrap_or(TokenKind::Comment);
					self.push(kind, slice.len());
				}
				RawToken::DoubleQuotedString | RawToken::UnterminatedDoubleQuotedString => {
					let kind = if slice.contains('$') {
						TokenKind::DoubleQuotedString
					} else {
						TokenKind::ConstantString
					};
					self.push(kind, slice.len());
				}
				RawToken::Ident => {
					let kind = TokenKind::keyword(slice).unwrap_or(TokenKind::String);
					self.push(kind, slice.len());
				}
				_ => self.push(raw.kind(), slice.len()),
			}
		}

		// The lexer ran out of input.
		self.offset = self.source.len();
	}

	/// Consume a heredoc or nowdoc whose opening `<<<LABEL` is at `offset`.
	/// Unterminated bodies extend to the end of the input.
	fn push_heredoc(&mut self, opening: &str) {
		let label = opening[3..].trim_start_matches([' ', '\t']);
		let kind = if label.starts_with('\'') {
			TokenKind::Nowdoc
		} else {
			TokenKind::Heredoc
		};
		let label = label.trim_matches(['\'', '"']);
		let rest = self.rest();
		let mut len = rest.len();
		let mut line_start = opening.len();

		while let Some(found) = rest[line_start..].find(self.line_break) {
			line_start += found + self.line_break.len_utf8();
			let line = rest[line_start..].trim_start_matches([' ', '\t']);

			if line.starts_with(label)
				&& !line[label.len()..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
			{
				len = rest.len() - line.len() + label.len();
				break;
			}
		}

		self.push(kind, len);
	}

	/// Split a doc comment into its open tag, stars, tags, strings,
	/// whitespace and close tag.
	fn push_doc_comment(&mut self, slice: &'a str) {
		let start = self.offset;
		self.offset += slice.len();

		let (body, close) = match slice.strip_suffix("*/") {
			Some(body) if slice.len() >= 5 => (&body[3..], Some(&slice[slice.len() - 2..])),
			_ => (&slice[3..], None),
		};

		self.pieces
			.push((TokenKind::DocCommentOpen, &self.source[start..start + 3]));

		for line in body.split_inclusive(self.line_break) {
			let content = line.trim_end_matches(['\r', '\n']);
			let line_ending = &line[content.len()..];
			let mut rest = content;
			let mut at_line_start = true;

			while !rest.is_empty() {
				let blank = rest.len() - rest.trim_start_matches([' ', '\t']).len();

				if blank > 0 {
					self.pieces
						.push((TokenKind::DocCommentWhitespace, &rest[..blank]));
					rest = &rest[blank..];
					continue;
				}

				if at_line_start && rest.starts_with('*') {
					self.pieces.push((TokenKind::DocCommentStar, &rest[..1]));
					rest = &rest[1..];
					at_line_start = false;
					continue;
				}

				at_line_start = false;

				if rest.starts_with('@') {
					let len = 1 + rest[1..]
						.find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '\\' | ':')))
						.unwrap_or(rest.len() - 1);
					self.pieces.push((TokenKind::DocCommentTag, &rest[..len]));
					rest = &rest[len..];
					continue;
				}

				let text = rest.trim_end_matches([' ', '\t']);
				self.pieces.push((TokenKind::DocCommentString, text));
				rest = &rest[text.len()..];
			}

			if !line_ending.is_empty() {
				self.pieces
					.push((TokenKind::DocCommentWhitespace, line_ending));
			}
		}

		if let Some(close) = close {
			self.pieces.push((TokenKind::DocCommentClose, close));
		}
	}
}

fn is_doc_comment(slice: &str) -> bool {
	slice.starts_with("/**") && slice != "/**/"
}

/// Classify a `phpcs:` annotation comment. Only single line comments can
/// carry annotations.
fn annotation_kind(comment: &str) -> Option<TokenKind> {
	let text = comment
		.trim_start_matches("//")
		.trim_start_matches('#')
		.trim_start_matches("/*")
		.trim_end_matches("*/")
		.trim();
	let command = text.get(..6)?;

	if !command.eq_ignore_ascii_case("phpcs:") {
		return None;
	}

	let command = text[6..].to_ascii_lowercase();
	let kind = if command.starts_with("ignorefile") {
		TokenKind::PhpcsIgnoreFile
	} else if command.starts_with("ignore") {
		TokenKind::PhpcsIgnore
	} else if command.starts_with("disable") {
		TokenKind::PhpcsDisable
	} else if command.starts_with("enable") {
		TokenKind::PhpcsEnable
	} else if command.starts_with("set") {
		TokenKind::PhpcsSet
	} else {
		return None;
	};

	Some(kind)
}

fn leading_line_ending(text: &str) -> usize {
	if text.starts_with("\r\n") {
		2
	} else if text.starts_with(['\n', '\r']) {
		1
	} else {
		0
	}
}

fn leading_line_ending_or_blank(text: &str) -> usize {
	match leading_line_ending(text) {
		0 if text.starts_with([' ', '\t']) => 1,
		len => len,
	}
}

/// Position the raw pieces: assign indices, lines, columns and lengths.
fn build_tokens(pieces: Vec<(TokenKind, &str)>, eol: &str) -> Vec<Token> {
	let line_break = if eol == "\r" { '\r' } else { '\n' };
	let mut line = 1;
	let mut column = 1;

	pieces
		.into_iter()
		.enumerate()
		.map(|(index, (kind, content))| {
			let length = content.chars().count();
			let token = Token {
				index,
				kind,
				content: content.to_string(),
				line,
				column,
				length,
				structural: StructuralRefs::default(),
			};

			for character in content.chars() {
				if character == line_break {
					line += 1;
					column = 1;
				} else {
					column += 1;
				}
			}

			token
		})
		.collect()
}

/// Kinds that depend on their neighbours: closures, anonymous classes,
/// arrow functions, soft keywords and keywords used as names.
fn retokenize(tokens: &mut [Token]) {
	let significant: Vec<usize> = tokens
		.iter()
		.filter(|token| !EMPTY_TOKENS.contains(token.kind))
		.map(|token| token.index)
		.collect();

	for (position, &index) in significant.iter().enumerate() {
		let previous = position
			.checked_sub(1)
			.map(|previous| tokens[significant[previous]].kind);
		let next = significant.get(position + 1).map(|&next| tokens[next].kind);
		let after_next = significant
			.get(position + 2)
			.map(|&after_next| tokens[after_next].kind);
		let kind = tokens[index].kind;

		let is_keyword = TokenKind::keyword(&tokens[index].content).is_some();
		let named_position = matches!(
			previous,
			Some(
				TokenKind::ObjectOperator
					| TokenKind::NullsafeObjectOperator
					| TokenKind::DoubleColon
					| TokenKind::Function
					| TokenKind::Const
			)
		);

		let new_kind = match kind {
			_ if is_keyword && named_position => TokenKind::String,
			TokenKind::Function
				if next == Some(TokenKind::OpenParenthesis)
					|| (next == Some(TokenKind::BitwiseAnd)
						&& after_next == Some(TokenKind::OpenParenthesis)) =>
			{
				TokenKind::Closure
			}
			TokenKind::Class if previous == Some(TokenKind::New) => TokenKind::AnonClass,
			TokenKind::Fn
				if next != Some(TokenKind::OpenParenthesis) && next != Some(TokenKind::BitwiseAnd) =>
			{
				TokenKind::String
			}
			TokenKind::Enum if next != Some(TokenKind::String) => TokenKind::String,
			TokenKind::Match if next != Some(TokenKind::OpenParenthesis) => TokenKind::String,
			_ => kind,
		};

		tokens[index].kind = new_kind;
	}
}

/// Convert source text into an indexed, structurally annotated token
/// sequence.
///
/// Tokenizing never fails: unterminated strings, comments and heredocs run
/// to the end of the input and unclassifiable bytes become
/// [`TokenKind::Unknown`] tokens. Concatenating every token's content
/// reproduces `source` exactly.
pub fn tokenize(source: &str) -> TokenSequence {
	let eol = detect_line_endings(source);
	let pieces = TokenWalker::new(source, eol).process();
	let mut tokens = build_tokens(pieces, eol);

	retokenize(&mut tokens);
	annotate(&mut tokens);

	TokenSequence::new(tokens, eol)
}

pub fn memstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack
		.windows(needle.len())
		.position(|window| window == needle)
}
