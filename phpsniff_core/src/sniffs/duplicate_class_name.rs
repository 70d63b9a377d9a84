use std::collections::HashMap;

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
use crate::utils::names::get_declaration_name;

pub const CODE: &str = "Generic.Classes.DuplicateClassName";

pub const DEFINITION: SniffDefinition = SniffDefinition {
	code: CODE,
	description: "Warns when a class, interface, trait or enum name is declared twice in one file.",
	configure,
};

fn configure(_options: Option<&toml::Value>) -> SniffResult<ConfiguredSniff> {
	Ok(ConfiguredSniff::new(CODE, DuplicateClassName::default))
}

#[derive(Debug, Default)]
pub struct DuplicateClassName {
	namespace: String,
	/// Lowercased qualified name to the line of its first declaration.
	found: HashMap<String, usize>,
}

impl Sniff for DuplicateClassName {
	fn register(&self) -> KindSet {
		KindSet::of(&[
			TokenKind::Namespace,
			TokenKind::Class,
			TokenKind::Interface,
			TokenKind::Trait,
			TokenKind::Enum,
		])
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		let tokens = file.tokens();

		if tokens[ptr].kind == TokenKind::Namespace {
			if let Some(namespace) = declared_namespace(tokens, ptr) {
				self.namespace = namespace;
			}

			return Ok(ProcessFlow::Continue);
		}

		let Some(name) = get_declaration_name(tokens, ptr)? else {
			return Ok(ProcessFlow::Continue);
		};
		let qualified = if self.namespace.is_empty() {
			name
		} else {
			format!("{}\\{name}", self.namespace)
		};

		match self.found.get(&qualified.to_lowercase()) {
			Some(line) => {
				let error = format!(
					"Duplicate {} name \"{qualified}\" found; first defined in this file on line {line}",
					tokens[ptr].content.to_lowercase()
				);
				file.add_warning(error, ptr, "Found")?;
			}
			None => {
				self.found.insert(qualified.to_lowercase(), tokens[ptr].line);
			}
		}

		Ok(ProcessFlow::Continue)
	}
}

/// The name declared by the `namespace` keyword at `ptr`. Empty for the
/// global namespace block and `None` when the keyword is used as an
/// operator (`namespace\foo()`).
fn declared_namespace(tokens: &TokenSequence, ptr: usize) -> Option<String> {
	let mut current = tokens.next_non_empty(ptr + 1)?;

	match tokens[current].kind {
		TokenKind::OpenCurlyBracket => return Some(String::new()),
		TokenKind::String => {}
		_ => return None,
	}

	let mut name = String::new();

	while matches!(tokens[current].kind, TokenKind::String | TokenKind::NsSeparator) {
		name.push_str(&tokens[current].content);

		match tokens.next_non_empty(current + 1) {
			Some(next) => current = next,
			None => break,
		}
	}

	Some(name)
}
