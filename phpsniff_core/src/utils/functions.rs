//! Helpers for function and method declarations.

use crate::RuleFault;
use crate::RuleResult;
use crate::TokenKind;
use crate::TokenSequence;
use crate::tokens::EMPTY_TOKENS;
use crate::tokens::OPENER_TOKENS;

/// One parameter of a function declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodParameter {
	/// Index of the parameter variable.
	pub token: usize,
	/// The variable name including `$`.
	pub name: String,
	/// The full source of the parameter, trimmed.
	pub content: String,
	pub pass_by_reference: bool,
	/// `...$rest`
	pub variable_length: bool,
	/// The declared type with comments and whitespace removed, `?` included.
	pub type_hint: String,
	pub nullable_type: bool,
	/// The default value expression, trimmed.
	pub default: Option<String>,
	pub has_attributes: bool,
	/// Constructor property promotion visibility.
	pub visibility: Option<String>,
}

#[derive(Debug, Default)]
struct ParameterBuilder {
	start: Option<usize>,
	default_start: Option<usize>,
	parameter: MethodParameter,
	named: bool,
}

impl ParameterBuilder {
	fn finish(self, tokens: &TokenSequence, end: usize) -> Option<MethodParameter> {
		if !self.named {
			return None;
		}

		let mut parameter = self.parameter;
		let start = self.start.unwrap_or(parameter.token);
		parameter.content = joined(tokens, start, end);
		parameter.default = self.default_start.map(|start| joined(tokens, start, end));

		Some(parameter)
	}
}

/// The parameters of the function, closure or arrow function at `ptr`.
pub fn get_method_parameters(tokens: &TokenSequence, ptr: usize) -> RuleResult<Vec<MethodParameter>> {
	let token = tokens.get(ptr).ok_or(RuleFault::IndexOutOfRange {
		index: ptr,
		len: tokens.len(),
	})?;

	if !token.is([TokenKind::Function, TokenKind::Closure, TokenKind::Fn]) {
		return Err(RuleFault::UnsupportedToken {
			index: ptr,
			found: token.kind.name().to_string(),
			expected: "T_FUNCTION, T_CLOSURE or T_FN".to_string(),
		});
	}

	let Some(opener) = tokens.find_next(TokenKind::OpenParenthesis, ptr + 1, None, false) else {
		return Ok(Vec::new());
	};
	let Some(closer) = tokens.parenthesis_closer(opener) else {
		return Ok(Vec::new());
	};

	let mut parameters = Vec::new();
	let mut builder = ParameterBuilder::default();
	let mut index = opener + 1;

	while index < closer {
		let token = &tokens[index];

		if builder.start.is_none() && !EMPTY_TOKENS.contains(token.kind) {
			builder.start = Some(index);
		}

		let in_default = builder.default_start.is_some();
		let parameter = &mut builder.parameter;

		match token.kind {
			TokenKind::Comma => {
				parameters.extend(std::mem::take(&mut builder).finish(tokens, index));
				index += 1;
				continue;
			}
			TokenKind::AttributeOpen => parameter.has_attributes = true,
			TokenKind::Public | TokenKind::Protected | TokenKind::Private if !builder.named => {
				parameter.visibility = Some(token.content.to_ascii_lowercase());
			}
			TokenKind::BitwiseAnd if !in_default && !builder.named => parameter.pass_by_reference = true,
			TokenKind::Ellipsis if !in_default => parameter.variable_length = true,
			TokenKind::Variable if !builder.named => {
				parameter.token = index;
				parameter.name.clone_from(&token.content);
				builder.named = true;
			}
			TokenKind::InlineThen if !builder.named => {
				parameter.nullable_type = true;
				parameter.type_hint.push('?');
			}
			TokenKind::String
			| TokenKind::NsSeparator
			| TokenKind::Array
			| TokenKind::Static
			| TokenKind::Operator
				if !builder.named =>
			{
				parameter.type_hint.push_str(&token.content);
			}
			TokenKind::Equal if !in_default => {
				builder.default_start = tokens.next_non_empty(index + 1).filter(|next| *next < closer);
			}
			_ => {}
		}

		// Commas inside nested groups belong to the default value.
		index = match token.structural.closer {
			Some(group_closer) if OPENER_TOKENS.contains(token.kind) && group_closer > index => group_closer + 1,
			_ => index + 1,
		};
	}

	parameters.extend(builder.finish(tokens, closer));

	Ok(parameters)
}

fn joined(tokens: &TokenSequence, start: usize, end: usize) -> String {
	tokens[start..end]
		.iter()
		.map(|token| token.content.as_str())
		.collect::<String>()
		.trim()
		.to_string()
}
