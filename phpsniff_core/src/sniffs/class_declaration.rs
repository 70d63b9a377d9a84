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
use crate::tokens::EMPTY_TOKENS;
use crate::tokens::PHPCS_ANNOTATION_TOKENS;

pub const CODE: &str = "PSR2.Classes.ClassDeclaration";

pub const DEFINITION: SniffDefinition = SniffDefinition {
	code: CODE,
	description: "Checks the spacing of class declarations, their extends and implements lists and the closing brace.",
	configure,
};

fn configure(options: Option<&toml::Value>) -> SniffResult<ConfiguredSniff> {
	ConfiguredSniff::with_options(CODE, options, ClassDeclaration::new)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassDeclarationOptions {
	/// Spaces each line of a multi-line implements list is indented by,
	/// relative to the keyword.
	pub indent: usize,
}

impl Default for ClassDeclarationOptions {
	fn default() -> Self {
		Self { indent: 4 }
	}
}

#[derive(Debug)]
pub struct ClassDeclaration {
	options: ClassDeclarationOptions,
}

impl ClassDeclaration {
	pub fn new(options: ClassDeclarationOptions) -> Self {
		Self { options }
	}

	/// The spacing between an `abstract` or `final` modifier and the keyword.
	fn check_modifier(file: &mut SniffFile<'_, '_>, ptr: usize, kind_name: &str) -> RuleResult<()> {
		let tokens = file.tokens();
		let Some(before) = ptr.checked_sub(1) else {
			return Ok(());
		};
		let Some(modifier) = tokens
			.previous_non_empty(before)
			.filter(|modifier| matches!(tokens[*modifier].kind, TokenKind::Abstract | TokenKind::Final))
		else {
			return Ok(());
		};

		let modifier_name = tokens[modifier].content.to_lowercase();
		let non_whitespace = tokens.find_previous(TokenKind::Whitespace, before, None, true);
		// A comment between the two makes the fix ambiguous.
		let fixable = non_whitespace == Some(modifier);

		if tokens[ptr].line == tokens[modifier].line {
			let code = "SpaceBeforeKeyword";

			if !fixable {
				let error = format!("Expected 1 space between {modifier_name} and {kind_name} keywords; comment found");
				file.add_error(error, ptr, code)?;
			} else if tokens[before].length != 1 {
				let error = format!(
					"Expected 1 space between {modifier_name} and {kind_name} keywords; {} found",
					tokens[before].length
				);

				if file.add_fixable_error(error, ptr, code)? {
					file.fixer().replace_token(before, " ")?;
				}
			}

			return Ok(());
		}

		let error = format!("Expected 1 space between {modifier_name} and {kind_name} keywords; newline found");
		let code = "NewlineBeforeKeyword";

		if !fixable {
			file.add_error(error, ptr, code)?;
		} else if file.add_fixable_error(error, ptr, code)? {
			let fixer = file.fixer();
			fixer.begin_changeset()?;

			for index in modifier + 1..before {
				fixer.remove(index)?;
			}

			fixer.replace(before, " ")?;
			fixer.end_changeset()?;
		}

		Ok(())
	}

	fn process_open(&self, file: &mut SniffFile<'_, '_>, ptr: usize, opener: usize) -> RuleResult<()> {
		let tokens = file.tokens();
		let kind_name = tokens[ptr].content.to_lowercase();

		Self::check_modifier(file, ptr, &kind_name)?;

		let class_indent = tokens
			.find_first_on_line(KindSet::NONE, ptr, true)
			.filter(|first| tokens[*first].kind == TokenKind::Whitespace && *first < ptr)
			.map_or(0, |first| tokens[first].length);

		let Some(class_name) = tokens.find_next(TokenKind::String, ptr, Some(opener), false) else {
			return Ok(());
		};

		if let Some(gap) = tokens
			.get(ptr + 1)
			.filter(|gap| gap.kind == TokenKind::Whitespace && gap.length != 1)
		{
			let error = format!(
				"Expected 1 space between {kind_name} keyword and {kind_name} name; {} found",
				gap.length
			);

			if file.add_fixable_error(error, ptr, "SpaceAfterKeyword")? {
				file.fixer().replace_token(ptr + 1, " ")?;
			}
		}

		if tokens.line(class_name + 2) == Some(tokens[class_name].line)
			&& let Some(gap) = tokens
				.get(class_name + 1)
				.filter(|gap| gap.kind == TokenKind::Whitespace && gap.length != 1)
		{
			let error = format!("Expected 1 space after {kind_name} name; {} found", gap.length);

			if file.add_fixable_error(error, class_name, "SpaceAfterName")? {
				file.fixer().replace_token(class_name + 1, " ")?;
			}
		}

		for (kind, word, title) in [
			(TokenKind::Extends, "extends", "Extends"),
			(TokenKind::Implements, "implements", "Implements"),
		] {
			let Some(keyword) = tokens.find_next(kind, ptr + 1, Some(opener), false) else {
				continue;
			};

			if tokens[keyword].line != tokens[ptr].line {
				let error = format!("The {word} keyword must be on the same line as the {kind_name} name");

				if file.add_fixable_error(error, keyword, &format!("{title}Line"))? {
					let eol_len = file.eol().chars().count();
					let fixer = file.fixer();
					fixer.begin_changeset()?;

					for index in ptr + 1..keyword {
						if tokens.line(index + 1) != Some(tokens[index].line) {
							fixer.truncate_suffix(index, eol_len)?;
						}
					}

					fixer.insert_before(keyword, " ")?;
					fixer.end_changeset()?;
				}

				continue;
			}

			// The space after the keyword is checked along with the names.
			let before = keyword - 1;

			if tokens[before].kind == TokenKind::Whitespace && tokens[before].length != 1 {
				let error = format!("Expected 1 space before {word} keyword; {} found", tokens[before].length);

				if file.add_fixable_error(error, keyword, &format!("SpaceBefore{title}"))? {
					file.fixer().replace_token(before, " ")?;
				}
			}
		}

		self.check_names(file, ptr, opener, class_name, class_indent)
	}

	/// Check the names listed after the class name. Interfaces list their
	/// parents after `extends`, everything else after `implements`.
	fn check_names(
		&self,
		file: &mut SniffFile<'_, '_>,
		ptr: usize,
		opener: usize,
		class_name: usize,
		class_indent: usize,
	) -> RuleResult<()> {
		let tokens = file.tokens();
		let (keyword_kind, list_word) = if tokens[ptr].kind == TokenKind::Interface {
			(TokenKind::Extends, "extends")
		} else {
			(TokenKind::Implements, "implements")
		};
		let list_keyword = tokens.find_next(keyword_kind, ptr + 1, Some(opener), false);
		let multi_line = list_keyword.is_some_and(|keyword| {
			tokens
				.find_previous(EMPTY_TOKENS, opener - 1, Some(keyword), true)
				.is_some_and(|last| tokens[last].line != tokens[keyword].line)
		});
		let names: Vec<usize> = (class_name + 2..opener.saturating_sub(1))
			.filter(|index| tokens.is(*index, KindSet::of(&[TokenKind::String, keyword_kind])))
			.collect();

		let mut in_list = false;

		for (position, &name) in names.iter().enumerate() {
			if tokens[name].kind == keyword_kind {
				in_list = true;
				continue;
			}

			let previous = tokens.kind(name - 1);
			let qualified_part =
				previous == Some(TokenKind::NsSeparator) && tokens.kind(name - 2) == Some(TokenKind::String);

			if in_list
				&& multi_line
				&& !qualified_part
				&& let Some(keyword) = list_keyword
			{
				self.check_multi_line_name(file, name, keyword, list_word, class_indent)?;
			} else if !qualified_part {
				Self::check_space_before_name(file, name)?;
			}

			if in_list && position + 1 != names.len() {
				Self::check_space_before_comma(file, name)?;
			}
		}

		Ok(())
	}

	fn check_multi_line_name(
		&self,
		file: &mut SniffFile<'_, '_>,
		name: usize,
		keyword: usize,
		list_word: &str,
		class_indent: usize,
	) -> RuleResult<()> {
		let tokens = file.tokens();
		let Some(prev) = tokens.find_previous(
			KindSet::of(&[TokenKind::NsSeparator, TokenKind::Whitespace]),
			name - 1,
			Some(keyword),
			true,
		) else {
			return Ok(());
		};

		let interface_label = if list_word == "extends" { "ExtendsInterface" } else { "Interface" };
		let wrong_line = if prev == keyword {
			(tokens[name].line != tokens[prev].line + 1).then(|| {
				(
					format!(
						"The first item in a multi-line {list_word} list must be on the line following the {list_word} keyword"
					),
					format!("First{interface_label}SameLine"),
				)
			})
		} else {
			(tokens[prev].line + 1 != tokens[name].line).then(|| {
				(
					format!("Only one interface may be specified per line in a multi-line {list_word} declaration"),
					format!("{interface_label}SameLine"),
				)
			})
		};

		if let Some((error, code)) = wrong_line {
			if file.add_fixable_error(error, name, &code)? {
				let fixer = file.fixer();
				fixer.begin_changeset()?;

				for index in prev + 1..name {
					if tokens[index].kind != TokenKind::Whitespace {
						break;
					}

					fixer.remove(index)?;
				}

				fixer.add_newline(prev)?;
				fixer.end_changeset()?;
			}

			return Ok(());
		}

		let Some(whitespace) = tokens.find_previous(TokenKind::Whitespace, name - 1, Some(keyword), false) else {
			return Ok(());
		};
		let found = if tokens[whitespace].line == tokens[name].line {
			tokens[whitespace].length
		} else {
			0
		};
		let expected = class_indent + self.options.indent;

		if found == expected {
			return Ok(());
		}

		let error = format!("Expected {expected} spaces before interface name; {found} found");

		if file.add_fixable_error(error, name, "InterfaceWrongIndent")? {
			let padding = " ".repeat(expected);
			let fixer = file.fixer();
			fixer.begin_changeset()?;

			if found == 0 {
				fixer.insert_after(whitespace, &padding)?;
			} else {
				fixer.replace(whitespace, padding)?;
			}

			fixer.end_changeset()?;
		}

		Ok(())
	}

	fn check_space_before_name(file: &mut SniffFile<'_, '_>, name: usize) -> RuleResult<()> {
		let tokens = file.tokens();
		let content = &tokens[name].content;
		let (prev, start) = if tokens.kind(name - 1) == Some(TokenKind::NsSeparator) {
			(name - 2, name - 1)
		} else {
			(name - 1, name)
		};

		if tokens[prev].kind == TokenKind::Comma {
			let error = format!("Expected 1 space before \"{content}\"; 0 found");

			if file.add_fixable_error(error, start, "NoSpaceBeforeName")? {
				let fixer = file.fixer();
				fixer.begin_changeset()?;
				fixer.insert_before(start, " ")?;
				fixer.end_changeset()?;
			}

			return Ok(());
		}

		if tokens[prev].kind == TokenKind::Whitespace && tokens[prev].length != 1 {
			let error = format!("Expected 1 space before \"{content}\"; {} found", tokens[prev].length);

			if file.add_fixable_error(error, name, "SpaceBeforeName")? {
				file.fixer().replace_token(prev, " ")?;
			}
		}

		Ok(())
	}

	fn check_space_before_comma(file: &mut SniffFile<'_, '_>, name: usize) -> RuleResult<()> {
		let tokens = file.tokens();

		if tokens.kind(name + 1) != Some(TokenKind::Whitespace) {
			return Ok(());
		}

		let next = tokens.find_next(TokenKind::Whitespace, name + 1, None, true);

		if next.is_none_or(|next| tokens[next].kind != TokenKind::Comma) {
			return Ok(());
		}

		let error = format!(
			"Expected 0 spaces between \"{}\" and comma; {} found",
			tokens[name].content,
			tokens[name + 1].length
		);

		if file.add_fixable_error(error, name, "SpaceBeforeComma")? {
			file.fixer().replace_token(name + 1, "")?;
		}

		Ok(())
	}

	fn process_close(file: &mut SniffFile<'_, '_>, ptr: usize, opener: usize) -> RuleResult<()> {
		let tokens = file.tokens();
		let Some(closer) = tokens[ptr].structural.scope_closer else {
			return Ok(());
		};
		let eol = file.eol();

		if let Some(prev) = tokens.find_previous(TokenKind::Whitespace, closer - 1, None, true)
			&& prev != opener
			&& tokens[prev].line + 1 != tokens[closer].line
		{
			let error = format!(
				"The closing brace for the {} must go on the next line after the body",
				tokens[ptr].content
			);

			if file.add_fixable_error(error, closer, "CloseBraceAfterBody")? {
				let fixer = file.fixer();
				fixer.begin_changeset()?;

				for index in prev + 1..closer {
					fixer.remove(index)?;
				}

				if !tokens[prev].content.contains(eol) {
					fixer.add_newline_before(closer)?;
				}

				fixer.end_changeset()?;
			}
		}

		// Trailing comments such as `//end class` are allowed.
		let ignored = PHPCS_ANNOTATION_TOKENS
			.with(TokenKind::Whitespace)
			.with(TokenKind::Comment);

		if let Some(next) = tokens.find_next(ignored, closer + 1, None, true)
			&& tokens[next].content != eol
			&& tokens[next].line == tokens[closer].line
		{
			let error = format!(
				"Closing {} brace must be on a line by itself",
				tokens[ptr].content.to_lowercase()
			);
			file.add_error(error, closer, "CloseBraceSameLine")?;
		}

		Ok(())
	}
}

impl Sniff for ClassDeclaration {
	fn register(&self) -> KindSet {
		KindSet::of(&[TokenKind::Class, TokenKind::Interface, TokenKind::Trait])
	}

	fn process(&mut self, file: &mut SniffFile<'_, '_>, ptr: usize) -> RuleResult<ProcessFlow> {
		// Declarations without a body are still being typed.
		let Some(opener) = file.tokens()[ptr].structural.scope_opener else {
			return Ok(ProcessFlow::Continue);
		};

		self.process_open(file, ptr, opener)?;
		Self::process_close(file, ptr, opener)?;

		Ok(ProcessFlow::Continue)
	}
}
