use std::fmt;
use std::ops::BitOr;

use derive_more::Deref;
use serde::Serialize;

macro_rules! token_kinds {
	($($(#[$meta:meta])* $variant:ident => $name:literal,)+) => {
		/// The lexical kind of a [`Token`].
		///
		/// Names mirror the `T_*` constants PHP_CodeSniffer rules are written
		/// against so sniff authors can translate checks directly.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
		#[repr(u8)]
		pub enum TokenKind {
			$($(#[$meta])* $variant,)+
		}

		impl TokenKind {
			/// Every kind in declaration order.
			pub const ALL: &'static [TokenKind] = &[$(TokenKind::$variant,)+];

			/// The `T_*` style name of this kind.
			pub const fn name(self) -> &'static str {
				match self {
					$(TokenKind::$variant => $name,)+
				}
			}
		}
	};
}

token_kinds! {
	/// Text outside of PHP tags.
	InlineHtml => "T_INLINE_HTML",
	/// `<?php` or the short `<?` tag, including one trailing whitespace.
	OpenTag => "T_OPEN_TAG",
	/// `<?=`
	OpenTagWithEcho => "T_OPEN_TAG_WITH_ECHO",
	/// `?>`, including one directly following line ending.
	CloseTag => "T_CLOSE_TAG",
	Whitespace => "T_WHITESPACE",
	/// `//`, `#` and non-doc block comments (one token per line).
	Comment => "T_COMMENT",
	DocCommentOpen => "T_DOC_COMMENT_OPEN_TAG",
	DocCommentClose => "T_DOC_COMMENT_CLOSE_TAG",
	DocCommentStar => "T_DOC_COMMENT_STAR",
	DocCommentWhitespace => "T_DOC_COMMENT_WHITESPACE",
	DocCommentTag => "T_DOC_COMMENT_TAG",
	DocCommentString => "T_DOC_COMMENT_STRING",
	PhpcsDisable => "T_PHPCS_DISABLE",
	PhpcsEnable => "T_PHPCS_ENABLE",
	PhpcsIgnore => "T_PHPCS_IGNORE",
	PhpcsIgnoreFile => "T_PHPCS_IGNORE_FILE",
	PhpcsSet => "T_PHPCS_SET",
	Variable => "T_VARIABLE",
	/// Any identifier that is not a keyword.
	String => "T_STRING",
	/// A quoted string without interpolation.
	ConstantString => "T_CONSTANT_ENCAPSED_STRING",
	/// A double quoted string containing `$`.
	DoubleQuotedString => "T_DOUBLE_QUOTED_STRING",
	Heredoc => "T_HEREDOC",
	Nowdoc => "T_NOWDOC",
	Backtick => "T_BACKTICK",
	LNumber => "T_LNUMBER",
	DNumber => "T_DNUMBER",
	Abstract => "T_ABSTRACT",
	AnonClass => "T_ANON_CLASS",
	Array => "T_ARRAY",
	As => "T_AS",
	Break => "T_BREAK",
	Case => "T_CASE",
	Catch => "T_CATCH",
	Class => "T_CLASS",
	Closure => "T_CLOSURE",
	Const => "T_CONST",
	Continue => "T_CONTINUE",
	Declare => "T_DECLARE",
	Default => "T_DEFAULT",
	Do => "T_DO",
	Echo => "T_ECHO",
	Else => "T_ELSE",
	Elseif => "T_ELSEIF",
	Enum => "T_ENUM",
	Extends => "T_EXTENDS",
	Final => "T_FINAL",
	Finally => "T_FINALLY",
	Fn => "T_FN",
	For => "T_FOR",
	Foreach => "T_FOREACH",
	Function => "T_FUNCTION",
	Global => "T_GLOBAL",
	If => "T_IF",
	Implements => "T_IMPLEMENTS",
	Instanceof => "T_INSTANCEOF",
	Interface => "T_INTERFACE",
	Match => "T_MATCH",
	Namespace => "T_NAMESPACE",
	New => "T_NEW",
	Print => "T_PRINT",
	Private => "T_PRIVATE",
	Protected => "T_PROTECTED",
	Public => "T_PUBLIC",
	Readonly => "T_READONLY",
	Return => "T_RETURN",
	Static => "T_STATIC",
	Switch => "T_SWITCH",
	Throw => "T_THROW",
	Trait => "T_TRAIT",
	Try => "T_TRY",
	Use => "T_USE",
	Var => "T_VAR",
	While => "T_WHILE",
	Yield => "T_YIELD",
	OpenCurlyBracket => "T_OPEN_CURLY_BRACKET",
	CloseCurlyBracket => "T_CLOSE_CURLY_BRACKET",
	OpenParenthesis => "T_OPEN_PARENTHESIS",
	CloseParenthesis => "T_CLOSE_PARENTHESIS",
	OpenSquareBracket => "T_OPEN_SQUARE_BRACKET",
	CloseSquareBracket => "T_CLOSE_SQUARE_BRACKET",
	/// `#[`
	AttributeOpen => "T_ATTRIBUTE",
	Semicolon => "T_SEMICOLON",
	Comma => "T_COMMA",
	/// `\`
	NsSeparator => "T_NS_SEPARATOR",
	Colon => "T_COLON",
	DoubleColon => "T_DOUBLE_COLON",
	ObjectOperator => "T_OBJECT_OPERATOR",
	NullsafeObjectOperator => "T_NULLSAFE_OBJECT_OPERATOR",
	DoubleArrow => "T_DOUBLE_ARROW",
	Equal => "T_EQUAL",
	/// `&`
	BitwiseAnd => "T_BITWISE_AND",
	Ellipsis => "T_ELLIPSIS",
	/// `?`, either a ternary or a nullable type marker.
	InlineThen => "T_INLINE_THEN",
	/// Every other operator.
	Operator => "T_OPERATOR",
	/// Input the lexer could not classify.
	Unknown => "T_UNKNOWN",
}

const _: () = assert!(TokenKind::ALL.len() <= 128);

impl TokenKind {
	/// Keyword lookup for an identifier. PHP keywords are case-insensitive.
	pub fn keyword(ident: &str) -> Option<Self> {
		let kind = match ident.to_ascii_lowercase().as_str() {
			"abstract" => Self::Abstract,
			"array" => Self::Array,
			"as" => Self::As,
			"break" => Self::Break,
			"case" => Self::Case,
			"catch" => Self::Catch,
			"class" => Self::Class,
			"const" => Self::Const,
			"continue" => Self::Continue,
			"declare" => Self::Declare,
			"default" => Self::Default,
			"do" => Self::Do,
			"echo" => Self::Echo,
			"else" => Self::Else,
			"elseif" => Self::Elseif,
			"enum" => Self::Enum,
			"extends" => Self::Extends,
			"final" => Self::Final,
			"finally" => Self::Finally,
			"fn" => Self::Fn,
			"for" => Self::For,
			"foreach" => Self::Foreach,
			"function" => Self::Function,
			"global" => Self::Global,
			"if" => Self::If,
			"implements" => Self::Implements,
			"instanceof" => Self::Instanceof,
			"interface" => Self::Interface,
			"match" => Self::Match,
			"namespace" => Self::Namespace,
			"new" => Self::New,
			"print" => Self::Print,
			"private" => Self::Private,
			"protected" => Self::Protected,
			"public" => Self::Public,
			"readonly" => Self::Readonly,
			"return" => Self::Return,
			"static" => Self::Static,
			"switch" => Self::Switch,
			"throw" => Self::Throw,
			"trait" => Self::Trait,
			"try" => Self::Try,
			"use" => Self::Use,
			"var" => Self::Var,
			"while" => Self::While,
			"yield" => Self::Yield,
			_ => return None,
		};

		Some(kind)
	}

	const fn bit(self) -> u128 {
		1 << (self as u8)
	}
}

impl fmt::Display for TokenKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A set of [`TokenKind`]s, stored as a bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KindSet(u128);

impl KindSet {
	/// The set containing no kinds.
	pub const NONE: Self = Self(0);

	pub const fn of(kinds: &[TokenKind]) -> Self {
		let mut bits = 0;
		let mut index = 0;

		while index < kinds.len() {
			bits |= kinds[index].bit();
			index += 1;
		}

		Self(bits)
	}

	pub const fn contains(self, kind: TokenKind) -> bool {
		self.0 & kind.bit() != 0
	}

	pub const fn union(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}

	pub const fn with(self, kind: TokenKind) -> Self {
		Self(self.0 | kind.bit())
	}

	pub const fn without(self, kind: TokenKind) -> Self {
		Self(self.0 & !kind.bit())
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	pub fn iter(self) -> impl Iterator<Item = TokenKind> {
		TokenKind::ALL
			.iter()
			.copied()
			.filter(move |kind| self.contains(*kind))
	}
}

impl From<TokenKind> for KindSet {
	fn from(kind: TokenKind) -> Self {
		Self(kind.bit())
	}
}

impl<const N: usize> From<[TokenKind; N]> for KindSet {
	fn from(kinds: [TokenKind; N]) -> Self {
		Self::of(&kinds)
	}
}

impl BitOr for KindSet {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		self.union(rhs)
	}
}

impl BitOr<TokenKind> for KindSet {
	type Output = Self;

	fn bitor(self, rhs: TokenKind) -> Self {
		self.with(rhs)
	}
}

impl fmt::Debug for KindSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.iter().map(TokenKind::name)).finish()
	}
}

/// `phpcs:` annotation comments.
pub const PHPCS_ANNOTATION_TOKENS: KindSet = KindSet::of(&[
	TokenKind::PhpcsDisable,
	TokenKind::PhpcsEnable,
	TokenKind::PhpcsIgnore,
	TokenKind::PhpcsIgnoreFile,
	TokenKind::PhpcsSet,
]);

/// Comments of every flavour, doc comment pieces and annotations included.
pub const COMMENT_TOKENS: KindSet = KindSet::of(&[
	TokenKind::Comment,
	TokenKind::DocCommentOpen,
	TokenKind::DocCommentClose,
	TokenKind::DocCommentStar,
	TokenKind::DocCommentWhitespace,
	TokenKind::DocCommentTag,
	TokenKind::DocCommentString,
])
.union(PHPCS_ANNOTATION_TOKENS);

/// Tokens without meaning to the program: whitespace and comments.
pub const EMPTY_TOKENS: KindSet = COMMENT_TOKENS.with(TokenKind::Whitespace);

/// Tokens that open an object-oriented scope.
pub const OO_SCOPE_TOKENS: KindSet = KindSet::of(&[
	TokenKind::Class,
	TokenKind::AnonClass,
	TokenKind::Interface,
	TokenKind::Trait,
	TokenKind::Enum,
]);

/// Tokens that may own a curly brace scope.
pub const SCOPE_OWNER_TOKENS: KindSet = OO_SCOPE_TOKENS.union(KindSet::of(&[
	TokenKind::Function,
	TokenKind::Closure,
	TokenKind::Namespace,
	TokenKind::If,
	TokenKind::Elseif,
	TokenKind::Else,
	TokenKind::While,
	TokenKind::Do,
	TokenKind::For,
	TokenKind::Foreach,
	TokenKind::Switch,
	TokenKind::Try,
	TokenKind::Catch,
	TokenKind::Finally,
	TokenKind::Match,
	TokenKind::Declare,
]));

/// Modifiers that may precede a method or property.
pub const METHOD_PREFIX_TOKENS: KindSet = KindSet::of(&[
	TokenKind::Public,
	TokenKind::Private,
	TokenKind::Protected,
	TokenKind::Static,
	TokenKind::Abstract,
	TokenKind::Final,
	TokenKind::Readonly,
]);

/// Keywords whose parentheses belong to them (`if (...)`, `function (...)`).
pub const PARENTHESIS_OWNER_TOKENS: KindSet = KindSet::of(&[
	TokenKind::Function,
	TokenKind::Closure,
	TokenKind::Fn,
	TokenKind::AnonClass,
	TokenKind::If,
	TokenKind::Elseif,
	TokenKind::While,
	TokenKind::For,
	TokenKind::Foreach,
	TokenKind::Switch,
	TokenKind::Catch,
	TokenKind::Match,
	TokenKind::Declare,
	TokenKind::Array,
]);

pub const OPENER_TOKENS: KindSet = KindSet::of(&[
	TokenKind::OpenCurlyBracket,
	TokenKind::OpenParenthesis,
	TokenKind::OpenSquareBracket,
	TokenKind::AttributeOpen,
]);

pub const CLOSER_TOKENS: KindSet = KindSet::of(&[
	TokenKind::CloseCurlyBracket,
	TokenKind::CloseParenthesis,
	TokenKind::CloseSquareBracket,
]);

/// Cross references filled in by the structural pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralRefs {
	/// Index of the opener of the pair this token belongs to. Set on both
	/// the opener (pointing at itself) and the closer.
	pub opener: Option<usize>,
	/// Index of the closer of the pair. `None` on an opener that was never
	/// closed.
	pub closer: Option<usize>,
	/// The keyword owning the scope. Set on the owner, its opener and its
	/// closer.
	pub scope_condition: Option<usize>,
	pub scope_opener: Option<usize>,
	pub scope_closer: Option<usize>,
	/// The keyword owning a parenthesis pair, on both parentheses and the
	/// owner itself.
	pub parenthesis_owner: Option<usize>,
	/// Openers of every parenthesis pair enclosing this token, outermost
	/// first.
	pub nested_parentheses: Vec<usize>,
	/// Curly brace nesting depth.
	pub level: usize,
	/// Scope owners enclosing this token, outermost first.
	pub conditions: Vec<usize>,
}

/// One lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	pub index: usize,
	pub kind: TokenKind,
	pub content: String,
	/// 1-based line of the first character.
	pub line: usize,
	/// 1-based column of the first character, counted in characters.
	pub column: usize,
	/// Number of characters in `content`.
	pub length: usize,
	pub structural: StructuralRefs,
}

impl Token {
	pub fn is(&self, kinds: impl Into<KindSet>) -> bool {
		kinds.into().contains(self.kind)
	}

	pub fn is_empty_token(&self) -> bool {
		EMPTY_TOKENS.contains(self.kind)
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}:{} {:?}", self.kind, self.line, self.column, self.content)
	}
}

/// The ordered tokens of one source text.
///
/// Positions are stable for one pass only. Any accepted fix invalidates
/// them until the rendered text has been tokenized again.
#[derive(Debug, Clone, Default, Deref)]
pub struct TokenSequence {
	#[deref]
	tokens: Vec<Token>,
	eol: &'static str,
}

impl TokenSequence {
	pub(crate) fn new(tokens: Vec<Token>, eol: &'static str) -> Self {
		Self { tokens, eol }
	}

	/// The line ending detected for the source.
	pub fn eol(&self) -> &'static str {
		self.eol
	}

	/// Reassemble the original source.
	pub fn source(&self) -> String {
		self.tokens.iter().map(|token| token.content.as_str()).collect()
	}

	pub fn kind(&self, index: usize) -> Option<TokenKind> {
		self.tokens.get(index).map(|token| token.kind)
	}

	/// `true` when the token at `index` exists and is one of `kinds`.
	pub fn is(&self, index: usize, kinds: impl Into<KindSet>) -> bool {
		let kinds = kinds.into();
		self.tokens
			.get(index)
			.is_some_and(|token| kinds.contains(token.kind))
	}

	pub fn line(&self, index: usize) -> Option<usize> {
		self.tokens.get(index).map(|token| token.line)
	}

	fn pair_of(&self, index: usize, opener_kinds: KindSet) -> Option<(usize, Option<usize>)> {
		let refs = &self.tokens.get(index)?.structural;
		let opener = refs.opener?;

		if opener_kinds.contains(self.tokens[opener].kind) {
			Some((opener, refs.closer))
		} else {
			None
		}
	}

	pub fn bracket_opener(&self, index: usize) -> Option<usize> {
		self.pair_of(index, KindSet::of(&[TokenKind::OpenCurlyBracket, TokenKind::OpenSquareBracket]))
			.map(|(opener, _)| opener)
	}

	pub fn bracket_closer(&self, index: usize) -> Option<usize> {
		self.pair_of(index, KindSet::of(&[TokenKind::OpenCurlyBracket, TokenKind::OpenSquareBracket]))
			.and_then(|(_, closer)| closer)
	}

	pub fn parenthesis_opener(&self, index: usize) -> Option<usize> {
		self.pair_of(index, TokenKind::OpenParenthesis.into())
			.map(|(opener, _)| opener)
	}

	pub fn parenthesis_closer(&self, index: usize) -> Option<usize> {
		self.pair_of(index, TokenKind::OpenParenthesis.into())
			.and_then(|(_, closer)| closer)
	}

	pub fn attribute_opener(&self, index: usize) -> Option<usize> {
		self.pair_of(index, TokenKind::AttributeOpen.into())
			.map(|(opener, _)| opener)
	}

	pub fn attribute_closer(&self, index: usize) -> Option<usize> {
		self.pair_of(index, TokenKind::AttributeOpen.into())
			.and_then(|(_, closer)| closer)
	}

	pub fn comment_opener(&self, index: usize) -> Option<usize> {
		self.pair_of(index, TokenKind::DocCommentOpen.into())
			.map(|(opener, _)| opener)
	}

	pub fn comment_closer(&self, index: usize) -> Option<usize> {
		self.pair_of(index, TokenKind::DocCommentOpen.into())
			.and_then(|(_, closer)| closer)
	}

	/// The innermost scope owner enclosing `index`.
	pub fn innermost_condition(&self, index: usize) -> Option<usize> {
		self.tokens
			.get(index)
			.and_then(|token| token.structural.conditions.last().copied())
	}

	/// `true` when `index` sits directly inside one of `kinds` scopes.
	pub fn has_condition(&self, index: usize, kinds: impl Into<KindSet>) -> bool {
		let kinds = kinds.into();
		self.tokens.get(index).is_some_and(|token| {
			token
				.structural
				.conditions
				.iter()
				.any(|condition| kinds.contains(self.tokens[*condition].kind))
		})
	}
}
