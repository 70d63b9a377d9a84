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
use crate::utils::common::prepare_for_output;

pub const CODE: &str = "Generic.WhiteSpace.NamespaceSeparatorSpacing";

pub const DEFINITION: SniffDefinition = SniffDefinition {
	code: CODE,
	description: "Disallows whitespace around namespace separators inside qualified names.",
	configure,
};

fn configure(options: Option<&toml::Value>) -> SniffResult<ConfiguredSniff> {
	ConfiguredSniff::with_options(CODE, options, NamespaceSeparatorSpacing::new)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct NamespaceSeparatorSpacingOptions {
	/// Allow line breaks inside very long qualified names.
	pub ignore_newlines: bool,
}

#[derive(Debug)]
pub struct NamespaceSeparatorSpacing {
	options: NamespaceSeparatorSpacingOptions,
}

impl NamespaceSeparatorSpacing {
	pub fn new(options: NamespaceSeparatorSpacingOptions) -> Self {
		Self { options }
	}

	/// Check the gap between the separator and the name part at `name`.
	/// `gap` is the token range between them.
	fn check_gap(
		&self,
		file: &mut SniffFile<'_, '_>,
		ptr: usize,
		name: usize,
		gap: std::ops::Range<usize>,
		code: &str,
		side: &str,
	) -> RuleResult<()> {
		let tokens = file.tokens();

		if gap.is_empty() || tokens[name].kind != TokenKind::String {
			return Ok(());
		}

		if self.options.ignore_newlines && tokens[name].line != tokens[ptr].line {
			return Ok(());
		}

		let found: String = tokens[gap.clone()]
			.iter()
			.map(|token| token.content.as_str())
			.collect();
		let error = format!(
			"Expected no space {side} the namespace separator; found \"{}\"",
			prepare_for_output(&found, &[])
		);
		let only_whitespace = tokens[gap.clone()]
			.iter()
			.all(|token| token.kind == TokenKind::Whitespace);

		if !only_whitespace {
			file.add_error(error, ptr, code)?;
			return Ok(());
		}

		if file.add_fixable_error(error, ptr, code)? {
			let fixer = file.fixer();
			fixer.begin_changeset()?;

			for index in gap {
				fixer.remove(index)?;
			}

			fixer.end_changeset()?;
		}

		Ok(())
	}
}

impl Sniff for NamespaceSeparatorSpacing {
	fn register(&self) -> KindSet {
		TokenKind::NsSeparator.into()
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		let tokens = file.tokens();

		if let Some(previous) = ptr.checked_sub(1).and_then(|start| tokens.previous_non_empty(start)) {
			self.check_gap(file, ptr, previous, previous + 1..ptr, "SpaceBefore", "before")?;
		}

		if let Some(next) = tokens.next_non_empty(ptr + 1) {
			self.check_gap(file, ptr, next, ptr + 1..next, "SpaceAfter", "after")?;
		}

		Ok(ProcessFlow::Continue)
	}
}
