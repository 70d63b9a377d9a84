use crate::tokens::EMPTY_TOKENS;
use crate::tokens::PARENTHESIS_OWNER_TOKENS;
use crate::tokens::SCOPE_OWNER_TOKENS;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// An opener waiting for its closer.
#[derive(Debug, Clone, Copy)]
struct Frame {
	index: usize,
	kind: TokenKind,
	/// Scope owner claimed by a curly brace.
	owner: Option<usize>,
}

/// A scope owner keyword waiting for its curly brace.
#[derive(Debug, Clone, Copy)]
struct PendingOwner {
	index: usize,
	kind: TokenKind,
	/// Stack depth at which the owner appeared.
	depth: usize,
}

/// Fill in [`crate::StructuralRefs`] for every token in a single pass.
///
/// Pairs are matched with a stack. A closer whose opener is not on top of
/// the stack closes the nearest matching opener below it, leaving the
/// openers in between unmatched, so pairs never cross. A closer without any
/// matching opener stays unmatched.
pub(crate) fn annotate(tokens: &mut [Token]) {
	let mut stack: Vec<Frame> = Vec::new();
	let mut pending: Vec<PendingOwner> = Vec::new();
	let mut conditions: Vec<usize> = Vec::new();
	let mut parentheses: Vec<usize> = Vec::new();

	link_doc_comments(tokens);

	for index in 0..tokens.len() {
		let kind = tokens[index].kind;

		match kind {
			TokenKind::OpenCurlyBracket => {
				assign_context(&mut tokens[index], &stack, &conditions, &parentheses);
				let owner = claim_owner(&mut pending, stack.len());

				if let Some(owner) = owner {
					for position in [owner, index] {
						let refs = &mut tokens[position].structural;
						refs.scope_condition = Some(owner);
						refs.scope_opener = Some(index);
					}
				}

				tokens[index].structural.opener = Some(index);
				stack.push(Frame { index, kind, owner });
				refresh(&stack, &mut conditions, &mut parentheses);
			}
			TokenKind::OpenParenthesis | TokenKind::OpenSquareBracket | TokenKind::AttributeOpen => {
				assign_context(&mut tokens[index], &stack, &conditions, &parentheses);
				tokens[index].structural.opener = Some(index);

				if kind == TokenKind::OpenParenthesis {
					if let Some(owner) = parenthesis_owner(tokens, index) {
						tokens[index].structural.parenthesis_owner = Some(owner);
						tokens[owner].structural.parenthesis_owner = Some(owner);
					}
				}

				stack.push(Frame {
					index,
					kind,
					owner: None,
				});
				refresh(&stack, &mut conditions, &mut parentheses);
			}
			TokenKind::CloseCurlyBracket
			| TokenKind::CloseParenthesis
			| TokenKind::CloseSquareBracket => {
				let matched = stack
					.iter()
					.rposition(|frame| closes(kind, frame.kind))
					.map(|position| {
						let frame = stack[position];
						stack.truncate(position);
						frame
					});

				refresh(&stack, &mut conditions, &mut parentheses);
				assign_context(&mut tokens[index], &stack, &conditions, &parentheses);

				let Some(frame) = matched else {
					continue;
				};

				let owner = tokens[frame.index].structural.parenthesis_owner;
				tokens[frame.index].structural.closer = Some(index);
				let refs = &mut tokens[index].structural;
				refs.opener = Some(frame.index);
				refs.closer = Some(index);
				refs.parenthesis_owner = owner;

				if let Some(owner) = frame.owner {
					for position in [owner, frame.index, index] {
						let refs = &mut tokens[position].structural;
						refs.scope_condition = Some(owner);
						refs.scope_opener = Some(frame.index);
						refs.scope_closer = Some(index);
					}
				}
			}
			TokenKind::Semicolon => {
				assign_context(&mut tokens[index], &stack, &conditions, &parentheses);
				pending.retain(|owner| owner.depth < stack.len());
			}
			TokenKind::Colon => {
				assign_context(&mut tokens[index], &stack, &conditions, &parentheses);

				// Alternative control structure syntax (`if ($a):`) never opens a
				// curly scope.
				if pending.last().is_some_and(|owner| {
					owner.depth == stack.len()
						&& !matches!(
							owner.kind,
							TokenKind::Function | TokenKind::Closure | TokenKind::Enum
						)
				}) {
					pending.pop();
				}
			}
			_ => {
				assign_context(&mut tokens[index], &stack, &conditions, &parentheses);

				if SCOPE_OWNER_TOKENS.contains(kind) && !is_else_if(tokens, index) {
					pending.push(PendingOwner {
						index,
						kind,
						depth: stack.len(),
					});
				}
			}
		}
	}
}

fn closes(closer: TokenKind, opener: TokenKind) -> bool {
	matches!(
		(closer, opener),
		(TokenKind::CloseCurlyBracket, TokenKind::OpenCurlyBracket)
			| (TokenKind::CloseParenthesis, TokenKind::OpenParenthesis)
			| (
				TokenKind::CloseSquareBracket,
				TokenKind::OpenSquareBracket | TokenKind::AttributeOpen
			)
	)
}

fn claim_owner(pending: &mut Vec<PendingOwner>, depth: usize) -> Option<usize> {
	while pending.last().is_some_and(|owner| owner.depth > depth) {
		pending.pop();
	}

	if pending.last().is_some_and(|owner| owner.depth == depth) {
		return pending.pop().map(|owner| owner.index);
	}

	None
}

fn refresh(stack: &[Frame], conditions: &mut Vec<usize>, parentheses: &mut Vec<usize>) {
	conditions.clear();
	conditions.extend(stack.iter().filter_map(|frame| frame.owner));
	parentheses.clear();
	parentheses.extend(
		stack
			.iter()
			.filter(|frame| frame.kind == TokenKind::OpenParenthesis)
			.map(|frame| frame.index),
	);
}

fn assign_context(token: &mut Token, stack: &[Frame], conditions: &[usize], parentheses: &[usize]) {
	let refs = &mut token.structural;
	refs.level = stack
		.iter()
		.filter(|frame| frame.kind == TokenKind::OpenCurlyBracket)
		.count();
	refs.conditions = conditions.to_vec();
	refs.nested_parentheses = parentheses.to_vec();
}

fn previous_significant(tokens: &[Token], index: usize) -> Option<usize> {
	(0..index)
		.rev()
		.find(|&position| !EMPTY_TOKENS.contains(tokens[position].kind))
}

fn next_significant(tokens: &[Token], index: usize) -> Option<usize> {
	(index + 1..tokens.len()).find(|&position| !EMPTY_TOKENS.contains(tokens[position].kind))
}

/// `else if` is two tokens but only the `if` owns the scope.
fn is_else_if(tokens: &[Token], index: usize) -> bool {
	tokens[index].kind == TokenKind::Else
		&& next_significant(tokens, index).is_some_and(|next| tokens[next].kind == TokenKind::If)
}

/// The keyword a parenthesis belongs to: `if (`, `function (`, `function
/// name(`, `function &name(`.
fn parenthesis_owner(tokens: &[Token], index: usize) -> Option<usize> {
	let previous = previous_significant(tokens, index)?;

	if PARENTHESIS_OWNER_TOKENS.contains(tokens[previous].kind) {
		return Some(previous);
	}

	if tokens[previous].kind != TokenKind::String {
		return None;
	}

	let mut before = previous_significant(tokens, previous)?;

	if tokens[before].kind == TokenKind::BitwiseAnd {
		before = previous_significant(tokens, before)?;
	}

	(tokens[before].kind == TokenKind::Function).then_some(before)
}

/// Doc comment open and close tags are produced next to each other by the
/// lexer, so pairing them is a forward search.
fn link_doc_comments(tokens: &mut [Token]) {
	let mut open: Option<usize> = None;

	for index in 0..tokens.len() {
		match tokens[index].kind {
			TokenKind::DocCommentOpen => {
				tokens[index].structural.opener = Some(index);
				open = Some(index);
			}
			TokenKind::DocCommentClose => {
				if let Some(opener) = open.take() {
					tokens[opener].structural.closer = Some(index);
					tokens[index].structural.opener = Some(opener);
					tokens[index].structural.closer = Some(index);
				}
			}
			TokenKind::DocCommentStar
			| TokenKind::DocCommentWhitespace
			| TokenKind::DocCommentTag
			| TokenKind::DocCommentString => {}
			_ => open = None,
		}
	}
}
