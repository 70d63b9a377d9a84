use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;
use similar_asserts::assert_eq;

use super::__fixtures::*;
use super::*;
use crate::sniffs::class_declaration;
use crate::sniffs::duplicate_class_name;
use crate::sniffs::member_var_spacing;
use crate::sniffs::namespace_separator_spacing;
use crate::sniffs::require_strict_types;
use crate::utils::common::SniffCode;
use crate::utils::common::code_matches;
use crate::utils::common::detect_line_endings;
use crate::utils::common::prepare_for_output;
use crate::utils::common::strip_basepath;
use crate::utils::functions::get_method_parameters;
use crate::utils::names;
use crate::utils::names::get_declaration_name;

// --- Tokenizer tests ---

#[rstest]
#[case::empty("")]
#[case::html_only("<p>hello</p>\n")]
#[case::simple("<?php\necho 1;\n")]
#[case::crlf("<?php\r\nif ($a) {\r\n    echo 'x';\r\n}\r\n")]
#[case::close_tag("<?php echo 1; ?>\n<p>hi</p>\n<?= $a ?>")]
#[case::unterminated_string("<?php echo 'abc")]
#[case::unterminated_comment("<?php /* never closed")]
#[case::heredoc("<?php\n$a = <<<EOT\nhello $name\nEOT;\n")]
#[case::unknown_bytes("<?php \u{1} \u{7f}")]
#[case::unicode("<?php\n$naïve = '日本';\n")]
fn tokenize_is_lossless(#[case] source: &str) {
	let tokens = tokenize(source);
	assert_eq!(tokens.source(), source);
}

#[test]
fn tokenize_assigns_positions() {
	let tokens = tokenize("<?php\n$a = 1;\n");
	let positions: Vec<(TokenKind, &str, usize, usize)> = tokens
		.iter()
		.map(|token| (token.kind, token.content.as_str(), token.line, token.column))
		.collect();

	assert_eq!(
		positions,
		vec![
			(TokenKind::OpenTag, "<?php\n", 1, 1),
			(TokenKind::Variable, "$a", 2, 1),
			(TokenKind::Whitespace, " ", 2, 3),
			(TokenKind::Equal, "=", 2, 4),
			(TokenKind::Whitespace, " ", 2, 5),
			(TokenKind::LNumber, "1", 2, 6),
			(TokenKind::Semicolon, ";", 2, 7),
			(TokenKind::Whitespace, "\n", 2, 8),
		]
	);
	assert!(
		tokens
			.iter()
			.enumerate()
			.all(|(index, token)| token.index == index)
	);
}

#[test]
fn tokenize_detects_line_endings() {
	let tokens = tokenize("<?php\r\necho 1;\r\necho 2;\r\n");

	assert_eq!(tokens.eol(), "\r\n");
	assert_eq!(tokens.search(TokenKind::Echo).next(2, None).and_then(|echo| tokens.line(echo)), Some(3));
}

#[test]
fn tokenize_splits_whitespace_after_line_breaks() {
	let tokens = tokenize("<?php\n$a;\n\n    $b;");
	let whitespace: Vec<&str> = tokens
		.iter()
		.filter(|token| token.kind == TokenKind::Whitespace)
		.map(|token| token.content.as_str())
		.collect();

	assert_eq!(whitespace, vec!["\n", "\n", "    "]);
}

#[rstest]
#[case::closure("<?php function() {};", vec![
	TokenKind::OpenTag,
	TokenKind::Closure,
	TokenKind::OpenParenthesis,
	TokenKind::CloseParenthesis,
	TokenKind::OpenCurlyBracket,
	TokenKind::CloseCurlyBracket,
	TokenKind::Semicolon,
])]
#[case::anonymous_class("<?php new class {};", vec![
	TokenKind::OpenTag,
	TokenKind::New,
	TokenKind::AnonClass,
	TokenKind::OpenCurlyBracket,
	TokenKind::CloseCurlyBracket,
	TokenKind::Semicolon,
])]
#[case::class_constant("<?php Foo::class;", vec![
	TokenKind::OpenTag,
	TokenKind::String,
	TokenKind::DoubleColon,
	TokenKind::String,
	TokenKind::Semicolon,
])]
#[case::keyword_property("<?php $a->echo;", vec![
	TokenKind::OpenTag,
	TokenKind::Variable,
	TokenKind::ObjectOperator,
	TokenKind::String,
	TokenKind::Semicolon,
])]
#[case::arrow_function("<?php fn($a) => $a;", vec![
	TokenKind::OpenTag,
	TokenKind::Fn,
	TokenKind::OpenParenthesis,
	TokenKind::Variable,
	TokenKind::CloseParenthesis,
	TokenKind::DoubleArrow,
	TokenKind::Variable,
	TokenKind::Semicolon,
])]
#[case::enum_declaration("<?php enum Suit {}", vec![
	TokenKind::OpenTag,
	TokenKind::Enum,
	TokenKind::String,
	TokenKind::OpenCurlyBracket,
	TokenKind::CloseCurlyBracket,
])]
#[case::enum_as_name("<?php echo enum;", vec![
	TokenKind::OpenTag,
	TokenKind::Echo,
	TokenKind::String,
	TokenKind::Semicolon,
])]
#[case::uppercase_keyword("<?php CLASS Foo {}", vec![
	TokenKind::OpenTag,
	TokenKind::Class,
	TokenKind::String,
	TokenKind::OpenCurlyBracket,
	TokenKind::CloseCurlyBracket,
])]
#[case::attribute("<?php #[Attr] function f() {}", vec![
	TokenKind::OpenTag,
	TokenKind::AttributeOpen,
	TokenKind::String,
	TokenKind::CloseSquareBracket,
	TokenKind::Function,
	TokenKind::String,
	TokenKind::OpenParenthesis,
	TokenKind::CloseParenthesis,
	TokenKind::OpenCurlyBracket,
	TokenKind::CloseCurlyBracket,
])]
#[case::heredoc("<?php $a = <<<'EOT'\nraw\nEOT;", vec![
	TokenKind::OpenTag,
	TokenKind::Variable,
	TokenKind::Equal,
	TokenKind::Nowdoc,
	TokenKind::Semicolon,
])]
#[case::close_tag("<?php echo 1; ?>\n<p>", vec![
	TokenKind::OpenTag,
	TokenKind::Echo,
	TokenKind::LNumber,
	TokenKind::Semicolon,
	TokenKind::CloseTag,
	TokenKind::InlineHtml,
])]
fn tokenize_classifies_kinds(#[case] source: &str, #[case] expected: Vec<TokenKind>) {
	assert_eq!(significant_kinds(source), expected);
}

#[test]
fn tokenize_splits_doc_comments() {
	let tokens = tokenize("<?php\n/**\n * @param int $a\n */\n");
	let pieces: Vec<(TokenKind, &str)> = tokens
		.iter()
		.map(|token| (token.kind, token.content.as_str()))
		.collect();

	assert_eq!(
		pieces,
		vec![
			(TokenKind::OpenTag, "<?php\n"),
			(TokenKind::DocCommentOpen, "/**"),
			(TokenKind::DocCommentWhitespace, "\n"),
			(TokenKind::DocCommentWhitespace, " "),
			(TokenKind::DocCommentStar, "*"),
			(TokenKind::DocCommentWhitespace, " "),
			(TokenKind::DocCommentTag, "@param"),
			(TokenKind::DocCommentWhitespace, " "),
			(TokenKind::DocCommentString, "int $a"),
			(TokenKind::DocCommentWhitespace, "\n"),
			(TokenKind::DocCommentWhitespace, " "),
			(TokenKind::DocCommentClose, "*/"),
			(TokenKind::Whitespace, "\n"),
		]
	);
	assert_eq!(tokens.comment_closer(1), Some(11));
	assert_eq!(tokens.comment_opener(11), Some(1));
}

#[test]
fn tokenize_splits_block_comments_per_line() {
	let tokens = tokenize("<?php /* a\n b */");
	let comments: Vec<&str> = tokens
		.iter()
		.filter(|token| token.kind == TokenKind::Comment)
		.map(|token| token.content.as_str())
		.collect();

	assert_eq!(comments, vec!["/* a\n", " b */"]);
}

#[rstest]
#[case::disable("// phpcs:disable", TokenKind::PhpcsDisable)]
#[case::enable("// phpcs:enable Generic.PHP", TokenKind::PhpcsEnable)]
#[case::ignore("# phpcs:ignore", TokenKind::PhpcsIgnore)]
#[case::ignore_file("/* phpcs:ignoreFile */", TokenKind::PhpcsIgnoreFile)]
#[case::set("// phpcs:set Generic.PHP.Foo bar 1", TokenKind::PhpcsSet)]
#[case::plain("// just a comment", TokenKind::Comment)]
fn tokenize_classifies_annotations(#[case] comment: &str, #[case] expected: TokenKind) {
	let tokens = tokenize(&format!("<?php {comment}"));
	assert_eq!(tokens.kind(1), Some(expected));
}

#[test]
fn structure_links_scopes_and_conditions() {
	let tokens = tokenize(
		"<?php\nclass Foo\n{\n    public function bar($a)\n    {\n        if ($a) {\n            return [1];\n        }\n    }\n}\n",
	);
	let find = |kind: TokenKind| {
		tokens
			.search(kind)
			.next(0, None)
			.unwrap_or_else(|| panic!("missing {kind}"))
	};
	let class = find(TokenKind::Class);
	let function = find(TokenKind::Function);
	let if_keyword = find(TokenKind::If);
	let return_keyword = find(TokenKind::Return);

	let opener = tokens[class].structural.scope_opener.unwrap_or_else(|| panic!("no opener"));
	let closer = tokens[class].structural.scope_closer.unwrap_or_else(|| panic!("no closer"));
	assert_eq!(tokens[opener].kind, TokenKind::OpenCurlyBracket);
	assert_eq!(tokens[closer].kind, TokenKind::CloseCurlyBracket);
	assert_eq!(tokens[closer].structural.scope_condition, Some(class));
	assert_eq!(tokens[opener].structural.scope_closer, Some(closer));
	assert_eq!(tokens.bracket_closer(opener), Some(closer));

	assert_eq!(tokens[return_keyword].structural.conditions, vec![class, function, if_keyword]);
	assert_eq!(tokens[return_keyword].structural.level, 3);
	assert_eq!(tokens.innermost_condition(return_keyword), Some(if_keyword));
	assert!(tokens.has_condition(return_keyword, TokenKind::Function));

	let parameter = tokens
		.search(TokenKind::Variable)
		.next(function, None)
		.unwrap_or_else(|| panic!("missing parameter"));
	let paren = tokens[parameter].structural.nested_parentheses[0];
	assert_eq!(tokens[paren].structural.parenthesis_owner, Some(function));
	assert_eq!(tokens[function].structural.parenthesis_owner, Some(function));

	let if_paren = tokens
		.search(TokenKind::OpenParenthesis)
		.next(if_keyword, None)
		.unwrap_or_else(|| panic!("missing if parenthesis"));
	assert_eq!(tokens[if_paren].structural.parenthesis_owner, Some(if_keyword));
}

#[test]
fn structure_links_attributes() {
	let tokens = tokenize("<?php #[Attr(1)] function f() {}");
	let closer = tokens.attribute_closer(1);

	assert_eq!(closer.and_then(|closer| tokens.kind(closer)), Some(TokenKind::CloseSquareBracket));
	assert_eq!(closer.and_then(|closer| tokens.attribute_opener(closer)), Some(1));
}

#[test]
fn structure_handles_short_open_tag_at_end_of_input() {
	// 0:`<?\n` 1:class 2:` ` 3:X 4:{ 5:`\n` 6:}
	let source = "<?\nclass X{\n}";
	let tokens = tokenize(source);

	assert_eq!(tokens.source(), source);
	assert_eq!(tokens.len(), 7);
	assert_eq!(tokens[1].kind, TokenKind::Class);
	assert_eq!(tokens.bracket_closer(4), Some(6));
	assert_eq!(tokens[1].structural.scope_opener, Some(4));
	assert_eq!(tokens[1].structural.scope_closer, Some(6));
	assert_eq!(tokens[6].structural.scope_condition, Some(1));
	assert_eq!(tokens[6].structural.opener, Some(4));
}

#[test]
fn structure_leaves_unbalanced_closers_unmatched() {
	// `<?php ( ] )`
	let tokens = tokenize("<?php ( ] )");

	assert_eq!(tokens.parenthesis_closer(1), Some(5));
	assert_eq!(tokens[3].structural.opener, None);
}

#[test]
fn structure_never_crosses_pairs() {
	// `<?php { ( } )`
	let tokens = tokenize("<?php { ( } )");

	assert_eq!(tokens.bracket_closer(1), Some(5));
	assert_eq!(tokens[3].structural.closer, None);
	assert_eq!(tokens[7].structural.opener, None);
}

proptest! {
	#[test]
	fn tokenize_is_lossless_and_well_nested(body in r#"[a-z$(){}\[\];,'"/*#?<>=\n -]{0,48}"#) {
		let source = format!("<?php {body}");
		let tokens = tokenize(&source);
		prop_assert_eq!(tokens.source(), source.clone());

		let pairs: Vec<(usize, usize)> = tokens
			.iter()
			.filter(|token| token.structural.opener == Some(token.index))
			.filter_map(|token| {
				token
					.structural
					.closer
					.filter(|closer| *closer > token.index)
					.map(|closer| (token.index, closer))
			})
			.collect();

		for &(opener, closer) in &pairs {
			prop_assert_eq!(tokens[closer].structural.opener, Some(opener));

			for &(other_opener, other_closer) in &pairs {
				prop_assert!(!(opener < other_opener && other_opener < closer && closer < other_closer));
			}
		}

		let again = tokenize(&source);
		prop_assert!(*tokens == *again);
	}
}

// --- Navigator tests ---

#[test]
fn navigator_finds_tokens() {
	// 0:`<?php ` 1:foo 2:( 3:1 4:, 5:` ` 6:[ 7:2 8:, 9:` ` 10:3 11:] 12:) 13:; 14:` ` 15:bar 16:( 17:2 18:) 19:;
	let tokens = tokenize("<?php foo(1, [2, 3]); bar(2);");

	assert_eq!(tokens.find_next(TokenKind::Comma, 0, None, false), Some(4));
	assert_eq!(tokens.find_next(TokenKind::Comma, 5, Some(8), false), None);
	assert_eq!(tokens.find_previous(TokenKind::String, 19, None, false), Some(15));
	assert_eq!(tokens.find_next(EMPTY_TOKENS, 4, None, true), Some(4));
	assert_eq!(tokens.search(TokenKind::LNumber).value("2").next(0, None), Some(7));
	assert_eq!(tokens.next_non_empty(5), Some(6));
	assert_eq!(tokens.previous_non_empty(14), Some(13));
}

#[test]
fn navigator_local_searches_stay_in_the_statement() {
	let tokens = tokenize("<?php foo(1, [2, 3]); bar(2);");

	assert_eq!(tokens.search(TokenKind::String).local().next(2, None), None);
	assert_eq!(tokens.search(TokenKind::String).next(2, None), Some(15));
	assert_eq!(tokens.search(TokenKind::Comma).local().previous(12, None), None);
	assert_eq!(tokens.find_previous(TokenKind::Comma, 12, None, false), Some(8));
}

#[test]
fn navigator_finds_statement_bounds() {
	let tokens = tokenize("<?php foo(1, [2, 3]); bar(2);");

	assert_eq!(tokens.find_end_of_statement(1), 13);
	assert_eq!(tokens.find_end_of_statement(3), 11);
	assert_eq!(tokens.find_start_of_statement(19), 15);
	assert_eq!(tokens.find_start_of_statement(17), 17);
}

#[test]
fn navigator_finds_first_on_line() {
	// 0:`<?php\n` 1:`    ` 2:$a 3:` ` 4:= 5:` ` 6:1 7:; 8:`\n`
	let tokens = tokenize("<?php\n    $a = 1;\n");

	assert_eq!(tokens.find_first_on_line(TokenKind::Whitespace, 6, true), Some(2));
	assert_eq!(tokens.find_first_on_line(KindSet::NONE, 6, true), Some(1));
	assert_eq!(tokens.find_first_on_line(TokenKind::Whitespace, 99, true), None);
}

// --- Suppression and sink tests ---

#[test]
fn suppressions_follow_annotations() {
	let tokens = tokenize(
		"<?php\n$a = 1; // phpcs:ignore\n// phpcs:ignore Foo.Bar -- known\n$b = 2;\n// phpcs:disable\n$c = \
		 3;\n// phpcs:enable Foo.Bar\n$d = 4;\n",
	);
	let suppressions = Suppressions::from_tokens(&tokens);

	assert!(!suppressions.is_file_ignored());
	assert!(suppressions.is_suppressed(2, "Any.Thing.At.All"));
	assert!(!suppressions.is_suppressed(3, "Any.Thing.At.All"));
	assert!(suppressions.is_suppressed(4, "Foo.Bar.Baz"));
	assert!(!suppressions.is_suppressed(4, "Foo.Other.Baz"));
	assert!(suppressions.is_suppressed(6, "X.Y.Z"));
	assert!(!suppressions.is_suppressed(8, "Foo.Bar.Baz"));
	assert!(suppressions.is_suppressed(8, "X.Y.Z"));
}

#[test]
fn suppressions_ignore_whole_file() {
	let suppressions = Suppressions::from_tokens(&tokenize("<?php\n// phpcs:ignoreFile\necho 1;\n"));

	assert!(suppressions.is_file_ignored());
	assert!(suppressions.is_suppressed(1, "Generic.PHP.RequireStrictTypes.MissingDeclaration"));
}

fn diagnostic(position: usize, code: &str, fixable: bool) -> Diagnostic {
	Diagnostic {
		position,
		line: 1,
		column: position + 1,
		code: code.to_string(),
		message: "message".to_string(),
		severity: Severity::Error,
		fixable,
	}
}

#[test]
fn sink_dedupes_by_position_and_code() {
	let mut sink = DiagnosticSink::new(Suppressions::default(), Arc::new(AllowAll));

	assert_eq!(sink.report(diagnostic(3, "A.B.C.D", true)), ReportOutcome::FixPermitted);
	assert_eq!(sink.report(diagnostic(3, "A.B.C.D", true)), ReportOutcome::Rejected);
	assert_eq!(sink.report(diagnostic(3, "A.B.C.E", false)), ReportOutcome::Recorded);
	assert_eq!(sink.report(diagnostic(1, "A.B.C.D", false)), ReportOutcome::Recorded);
	assert_eq!(sink.error_count(), 3);
	assert_eq!(sink.fixable_count(), 1);

	let diagnostics = sink.into_diagnostics();
	let order: Vec<(usize, &str)> = diagnostics
		.iter()
		.map(|diagnostic| (diagnostic.position, diagnostic.code.as_str()))
		.collect();
	assert_eq!(order, vec![(1, "A.B.C.D"), (3, "A.B.C.D"), (3, "A.B.C.E")]);
}

#[test]
fn sink_applies_fix_policy() {
	let mut sink = DiagnosticSink::new(Suppressions::default(), Arc::new(FirstN(1)));

	assert_eq!(sink.report(diagnostic(1, "A.B.C.D", true)), ReportOutcome::FixPermitted);
	assert_eq!(sink.report(diagnostic(2, "A.B.C.D", true)), ReportOutcome::Recorded);

	let mut sink = DiagnosticSink::new(Suppressions::default(), Arc::new(DenyAll));
	assert_eq!(sink.report(diagnostic(1, "A.B.C.D", true)), ReportOutcome::Recorded);
}

#[test]
fn sink_rejects_suppressed_diagnostics() {
	let tokens = tokenize("<?php // phpcs:disable A.B\n");
	let mut sink = DiagnosticSink::new(Suppressions::from_tokens(&tokens), Arc::new(AllowAll));

	assert_eq!(sink.report(diagnostic(0, "A.B.C.D", true)), ReportOutcome::Rejected);
	assert_eq!(sink.report(diagnostic(0, "A.X.C.D", true)), ReportOutcome::FixPermitted);
	assert_eq!(sink.diagnostics().len(), 1);
}

// --- Fixer tests ---

#[test]
fn fixer_drops_conflicting_changesets() -> RuleResult<()> {
	// 0:`<?php ` 1:echo 2:` ` 3:$a 4:;
	let tokens = tokenize("<?php echo $a;");
	let mut fixer = Fixer::new(&tokens);

	fixer.begin_changeset()?;
	fixer.replace(3, "$b")?;
	assert!(fixer.end_changeset()?);

	fixer.begin_changeset()?;
	fixer.replace(1, "print")?;
	fixer.replace(3, "$c")?;
	assert!(!fixer.end_changeset()?);

	assert_eq!(fixer.render(), "<?php echo $b;");
	assert_eq!(fixer.fixed_count(), 1);
	assert_eq!(fixer.rejected_count(), 1);

	Ok(())
}

#[test]
fn fixer_ignores_noop_changesets() -> RuleResult<()> {
	let tokens = tokenize("<?php echo $a;");
	let mut fixer = Fixer::new(&tokens);

	fixer.begin_changeset()?;
	fixer.replace(3, "$a")?;
	assert!(!fixer.end_changeset()?);
	assert_eq!(fixer.fixed_count(), 0);
	assert_eq!(fixer.rejected_count(), 0);

	Ok(())
}

#[test]
fn fixer_composes_edits_within_a_changeset() -> RuleResult<()> {
	let tokens = tokenize("<?php echo $a;\n");
	let mut fixer = Fixer::new(&tokens);

	fixer.begin_changeset()?;
	fixer.insert_before(3, "&")?;
	fixer.insert_after(3, "!")?;
	assert_eq!(fixer.content(3)?, "&$a!");
	fixer.truncate_suffix(5, 1)?;
	fixer.add_newline(4)?;
	fixer.end_changeset()?;

	assert_eq!(fixer.render(), "<?php echo &$a!;\n");

	Ok(())
}

#[test]
fn fixer_rolls_back_open_changesets() -> RuleResult<()> {
	let tokens = tokenize("<?php echo $a;");
	let mut fixer = Fixer::new(&tokens);

	fixer.begin_changeset()?;
	fixer.remove(3)?;
	assert!(fixer.in_changeset());
	fixer.rollback_changeset();

	assert!(!fixer.in_changeset());
	assert_eq!(fixer.render(), "<?php echo $a;");

	Ok(())
}

#[test]
fn fixer_rejects_misuse() -> RuleResult<()> {
	let tokens = tokenize("<?php echo $a;");
	let mut fixer = Fixer::new(&tokens);

	assert_eq!(fixer.replace(3, "$b"), Err(RuleFault::NoChangeset));
	assert_eq!(fixer.end_changeset(), Err(RuleFault::NoChangeset));

	fixer.begin_changeset()?;
	assert_eq!(fixer.begin_changeset(), Err(RuleFault::NestedChangeset));
	assert_eq!(fixer.replace(99, "x"), Err(RuleFault::IndexOutOfRange { index: 99, len: 5 }));

	Ok(())
}

// --- Scanner tests ---

#[test]
fn registry_indexes_listeners_by_kind() {
	let ruleset = Ruleset::new(vec![
		configured("Test.Skip.Sniff", SkipSniff { target: 0 }),
		configured("Test.Fault.Sniff", FaultySniff),
	]);
	let registry = RuleRegistry::new(&ruleset, &BTreeSet::new());

	assert_eq!(registry.listeners(TokenKind::String).collect::<Vec<_>>(), vec!["Test.Skip.Sniff"]);
	assert_eq!(registry.listeners(TokenKind::OpenTag).collect::<Vec<_>>(), vec!["Test.Fault.Sniff"]);
	assert_eq!(registry.listeners(TokenKind::Variable).count(), 0);

	let disabled = BTreeSet::from(["Test.Fault.Sniff".to_string()]);
	let registry = RuleRegistry::new(&ruleset, &disabled);
	assert_eq!(registry.listeners(TokenKind::OpenTag).count(), 0);
}

#[rstest]
#[case::forward(10, vec!["a", "skip", "c"])]
#[case::backward(2, vec!["a", "skip", "b", "c"])]
#[case::past_the_end(100, vec!["a", "skip"])]
fn scanner_honors_skip_requests(#[case] target: usize, #[case] expected: Vec<&str>) -> SniffResult<()> {
	// 0:`<?php ` 1:a 2:; 3:` ` 4:skip 5:; 6:` ` 7:b 8:; 9:` ` 10:c 11:;
	let recorder = RecordingSniff::default();
	let ruleset = Ruleset::new(vec![
		configured("Test.Skip.Sniff", SkipSniff { target }),
		configured("Test.Record.Sniff", recorder.clone()),
	]);

	check_source("<?php a; skip; b; c;", &ruleset, &EngineOptions::default())?;
	assert_eq!(recorder.seen(), expected);

	Ok(())
}

#[test]
#[tracing_test::traced_test]
fn scanner_disables_faulting_sniffs() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![
		configured("Test.Fault.Sniff", FaultySniff),
		replace("Test.Replace.Sniff", "foo", "bar"),
	]);
	let outcome = run("<?php foo;", &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Fixed);
	assert_eq!(outcome.text, "<?php bar;");
	assert_eq!(outcome.iterations, 2);
	assert_eq!(
		outcome.faults,
		vec![RuleFaultRecord {
			sniff: "Test.Fault.Sniff".to_string(),
			position: 0,
			fault: RuleFault::Custom("boom".to_string()),
		}]
	);
	assert!(logs_contain("sniff faulted"));

	Ok(())
}

#[test]
fn scanner_rolls_back_unclosed_changesets() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![configured("Test.Unclosed.Sniff", UnclosedSniff)]);
	let outcome = run("<?php foo; bar;", &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Unchanged);
	assert_eq!(outcome.text, "<?php foo; bar;");
	assert_eq!(outcome.faults.len(), 1);
	assert_eq!(outcome.faults[0].fault, RuleFault::UnclosedChangeset);
	assert_eq!(outcome.faults[0].position, 1);

	Ok(())
}

// --- Engine tests ---

#[test]
fn engine_converges() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![replace("Test.Replace.Sniff", "foo", "bar")]);
	let outcome = run("<?php foo;", &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Fixed);
	assert_eq!(outcome.text, "<?php bar;");
	assert_eq!(outcome.iterations, 2);
	assert_eq!(outcome.fixes_applied, 1);
	assert!(outcome.diagnostics.is_empty());
	assert!(outcome.changed());

	Ok(())
}

#[test]
fn engine_leaves_clean_files_unchanged() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![replace("Test.Replace.Sniff", "foo", "bar")]);
	let outcome = run("<?php baz;", &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Unchanged);
	assert_eq!(outcome.iterations, 1);
	assert!(!outcome.changed());

	Ok(())
}

#[test]
#[tracing_test::traced_test]
fn engine_reports_non_convergence() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![
		replace("Test.Fight.Forward", "foo", "bar"),
		replace("Test.Fight.Back", "bar", "foo"),
	]);
	let options = EngineOptions {
		max_iterations: 5,
		..EngineOptions::default()
	};
	let outcome = run("<?php foo;", &ruleset, &options)?;

	assert_eq!(outcome.status, FileStatus::NotConverged);
	assert_eq!(outcome.iterations, 5);
	assert_eq!(outcome.fixes_applied, 5);
	assert_eq!(outcome.text, "<?php bar;");
	assert_eq!(codes(&outcome.diagnostics), vec!["Test.Fight.Forward.Found"]);
	assert!(logs_contain("fixes did not converge"));

	Ok(())
}

#[test]
fn engine_retries_conflicting_fixes() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![
		replace("Test.Replace.Bar", "foo", "bar"),
		replace("Test.Replace.Baz", "foo", "baz"),
	]);
	let outcome = run("<?php foo;", &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Fixed);
	assert_eq!(outcome.text, "<?php bar;");
	assert_eq!(outcome.fixes_applied, 1);
	assert_eq!(outcome.iterations, 2);

	Ok(())
}

#[test]
fn engine_applies_the_losing_fix_in_a_later_pass() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![
		replace("Test.Replace.Bar", "foo", "bar"),
		configured("Test.Case.Upper", UppercaseSniff),
	]);
	let outcome = run("<?php foo;", &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Fixed);
	assert_eq!(outcome.text, "<?php BAR;");
	assert_eq!(outcome.iterations, 3);
	assert_eq!(outcome.fixes_applied, 2);
	assert!(outcome.diagnostics.is_empty());

	Ok(())
}

#[test]
fn scanner_keeps_conflicting_diagnostics_fixable() {
	// 0:`<?php ` 1:foo 2:;
	let tokens = tokenize("<?php foo;");
	let ruleset = Ruleset::new(vec![
		replace("Test.Replace.Bar", "foo", "X"),
		replace("Test.Replace.Baz", "foo", "Y"),
	]);
	let mut registry = RuleRegistry::new(&ruleset, &BTreeSet::new());
	let mut sink = DiagnosticSink::new(Suppressions::from_tokens(&tokens), Arc::new(AllowAll));
	let mut fixer = Fixer::new(&tokens);
	let mut faults = Vec::new();

	assert!(registry.scan(&tokens, &mut sink, &mut fixer, None, &mut faults).is_ok());
	assert!(faults.is_empty());
	assert_eq!(fixer.render(), "<?php X;");
	assert_eq!(fixer.fixed_count(), 1);
	assert_eq!(fixer.rejected_count(), 1);

	let diagnostics = sink.into_diagnostics();
	assert_eq!(codes(&diagnostics), vec!["Test.Replace.Bar.Found", "Test.Replace.Baz.Found"]);
	assert!(diagnostics.iter().all(|diagnostic| diagnostic.fixable));
	assert!(diagnostics.iter().all(|diagnostic| diagnostic.position == 1));
}

#[rstest]
#[case::missing_declaration("<?php\necho 1;\n")]
#[case::class_spacing("<?php\nfinal  class  Foo   extends Bar implements  A ,B\n{\n    public $a;\n\n\n    public $b;\n}\n")]
#[case::namespace_spacing("<?php\nnamespace App \\ Models;\n\nuse Foo \\Bar;\n")]
#[case::disabled_strict_types("<?php\ndeclare(strict_types=0);\nclass A\n{\n}\nclass A\n{\n}\n")]
fn engine_output_is_a_fixed_point(#[case] source: &str) -> SniffResult<()> {
	let ruleset = Ruleset::from_config(None)?;
	let first = run(source, &ruleset, &EngineOptions::default())?;
	let second = run(&first.text, &ruleset, &EngineOptions::default())?;

	assert_ne!(first.status, FileStatus::NotConverged);
	assert_eq!(second.status, FileStatus::Unchanged);
	assert_eq!(second.fixes_applied, 0);
	assert_eq!(second.iterations, 1);
	assert_eq!(second.text, first.text);

	Ok(())
}

proptest! {
	#[test]
	fn converged_output_needs_no_further_fixes(
		fragments in prop::collection::vec(
			prop::sample::select(vec![
				"namespace App \\ Models;\n",
				"use Foo\\ Bar;\n",
				"declare(strict_types=0);\n",
				"class  Foo   extends Bar{\n}\n",
				"final class Baz implements A ,B {\n    public $a;\n\n\n    public $b;\n}\n",
				"interface I {}\n",
				"echo foo;\n",
				"\n",
			]),
			0..8,
		)
	) {
		let ruleset = Ruleset::from_config(None).map_err(|e| TestCaseError::fail(e.to_string()))?;
		let source = format!("<?php\n{}", fragments.concat());
		let first = run(&source, &ruleset, &EngineOptions::default())
			.map_err(|e| TestCaseError::fail(e.to_string()))?;
		prop_assume!(first.status != FileStatus::NotConverged && first.faults.is_empty());

		let second = run(&first.text, &ruleset, &EngineOptions::default())
			.map_err(|e| TestCaseError::fail(e.to_string()))?;
		prop_assert_eq!(second.fixes_applied, 0);
		prop_assert_eq!(second.text, first.text);
	}
}

#[test]
fn engine_limits_fixes_per_pass() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![replace("Test.Replace.Sniff", "foo", "bar")]);
	let options = EngineOptions {
		policy: Arc::new(FirstN(1)),
		..EngineOptions::default()
	};
	let outcome = run("<?php foo; foo;", &ruleset, &options)?;

	assert_eq!(outcome.text, "<?php bar; bar;");
	assert_eq!(outcome.iterations, 3);
	assert_eq!(outcome.fixes_applied, 2);

	Ok(())
}

#[test]
fn engine_check_never_fixes() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![replace("Test.Replace.Sniff", "foo", "bar")]);
	let outcome = check_source("<?php foo; foo;", &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Unchanged);
	assert_eq!(outcome.text, "<?php foo; foo;");
	assert_eq!(outcome.iterations, 1);
	assert_eq!(outcome.diagnostics.len(), 2);
	assert!(outcome.diagnostics.iter().all(|diagnostic| diagnostic.fixable));
	assert_eq!(outcome.diagnostics[0].message, "Expected \"bar\"; found \"foo\"");
	assert_eq!((outcome.diagnostics[1].line, outcome.diagnostics[1].column), (1, 12));

	Ok(())
}

#[test]
fn engine_respects_trailing_ignore() -> SniffResult<()> {
	let ruleset = Ruleset::new(vec![replace("Test.Replace.Sniff", "foo", "bar")]);
	let source = "<?php foo; // phpcs:ignore Test.Replace\nfoo;\n";
	let outcome = run(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.text, "<?php foo; // phpcs:ignore Test.Replace\nbar;\n");

	Ok(())
}

#[test]
fn engine_skips_ignored_files() -> SniffResult<()> {
	let ruleset = Ruleset::from_config(None)?;
	let source = "<?php\n// phpcs:ignoreFile\necho 1;\n";
	let outcome = run(source, &ruleset, &EngineOptions::default())?;

	assert!(outcome.ignored);
	assert_eq!(outcome.status, FileStatus::Unchanged);
	assert_eq!(outcome.text, source);
	assert!(outcome.diagnostics.is_empty());

	Ok(())
}

#[test]
fn engine_stops_when_cancelled() {
	let cancel = CancelFlag::default();
	cancel.cancel();
	let options = EngineOptions {
		cancel: Some(cancel),
		..EngineOptions::default()
	};
	let ruleset = Ruleset::new(vec![replace("Test.Replace.Sniff", "foo", "bar")]);

	assert!(matches!(
		run("<?php foo;", &ruleset, &options),
		Err(SniffError::Cancelled { pass: 0, .. })
	));
	assert!(matches!(
		check_source("<?php foo;", &ruleset, &options),
		Err(SniffError::Cancelled { pass: 0, .. })
	));
}

#[test]
fn engine_times_out() {
	let options = EngineOptions {
		timeout: Some(Duration::ZERO),
		..EngineOptions::default()
	};
	let ruleset = Ruleset::new(vec![replace("Test.Replace.Sniff", "foo", "bar")]);
	let Err(error) = run("<?php foo;", &ruleset, &options) else {
		panic!("expected a timeout");
	};

	assert!(matches!(error, SniffError::Timeout { pass: 1, limit_ms: 0, .. }));
	assert!(error.partial_diagnostics().is_empty());
}

#[test]
fn engine_timeout_keeps_sniff_faults() {
	let options = EngineOptions {
		timeout: Some(Duration::from_millis(200)),
		..EngineOptions::default()
	};
	let ruleset = Ruleset::new(vec![
		configured("Test.Fault.Sniff", FaultySniff),
		configured("Test.Slow.Sniff", SlowSniff {
			delay: Duration::from_millis(300),
		}),
	]);
	let Err(error) = run("<?php foo; bar;", &ruleset, &options) else {
		panic!("expected a timeout");
	};

	assert!(matches!(error, SniffError::Timeout { pass: 1, .. }));
	let faults: Vec<&str> = error.faults().iter().map(|fault| fault.sniff.as_str()).collect();
	assert_eq!(faults, vec!["Test.Fault.Sniff"]);
	assert_eq!(error.faults()[0].position, 0);
}

#[test]
fn engine_runs_every_builtin_sniff() -> SniffResult<()> {
	let ruleset = Ruleset::from_config(None)?;
	let source = "<?php\nnamespace App;\n\nclass  Foo\n{\n    public $a;\n}\n";
	let outcome = run(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Fixed);
	assert_eq!(
		outcome.text,
		"<?php\ndeclare(strict_types=1);\nnamespace App;\n\nclass Foo\n{\n\n    public $a;\n}\n"
	);
	assert_eq!(outcome.fixes_applied, 3);
	assert_eq!(outcome.iterations, 2);
	assert!(outcome.faults.is_empty());

	Ok(())
}

// --- Ruleset and config tests ---

#[test]
fn ruleset_defaults_to_the_catalogue() -> SniffResult<()> {
	let ruleset = Ruleset::from_config(None)?;
	let codes: Vec<&str> = ruleset.iter().map(ConfiguredSniff::code).collect();
	let expected: Vec<&str> = sniffs::CATALOGUE
		.iter()
		.map(|definition| definition.code)
		.collect();

	assert_eq!(codes, expected);

	Ok(())
}

#[test]
fn ruleset_applies_selection_and_exclusions() -> SniffResult<()> {
	let config = PhpsniffConfig::parse(&format!(
		"sniffs = [\"{}\", \"{}\"]\nexclude_sniffs = [\"{}\"]\n",
		class_declaration::CODE,
		require_strict_types::CODE,
		class_declaration::CODE
	))?;
	let ruleset = Ruleset::from_config(Some(&config))?;
	let codes: Vec<&str> = ruleset.iter().map(ConfiguredSniff::code).collect();

	assert_eq!(codes, vec![require_strict_types::CODE]);

	let all = Ruleset::from_config(None)?;
	let restricted = all.restrict(&[member_var_spacing::CODE.to_string()])?;
	assert_eq!(restricted.len(), 1);

	Ok(())
}

#[test]
fn ruleset_resolves_options_with_defaults() -> SniffResult<()> {
	let ruleset = builtin(member_var_spacing::CODE, "spacing = 2")?;
	let options = ruleset
		.iter()
		.next()
		.map(|sniff| sniff.options().clone())
		.unwrap_or_default();

	assert_eq!(options.get("spacing").and_then(toml::Value::as_integer), Some(2));
	assert_eq!(options.get("spacingBeforeFirst").and_then(toml::Value::as_integer), Some(1));

	Ok(())
}

#[rstest]
#[case::unknown_selected("sniffs = [\"Nope.Nope.Nope\"]\n")]
#[case::unknown_excluded("exclude_sniffs = [\"Nope.Nope.Nope\"]\n")]
#[case::unknown_options("[options.\"Nope.Nope.Nope\"]\nvalue = 1\n")]
fn ruleset_rejects_unknown_sniffs(#[case] content: &str) -> SniffResult<()> {
	let config = PhpsniffConfig::parse(content)?;
	let result = Ruleset::from_config(Some(&config));

	assert!(matches!(result, Err(SniffError::UnknownSniff(code)) if code == "Nope.Nope.Nope"));

	Ok(())
}

#[rstest]
#[case::unknown_field(class_declaration::CODE, "indnt = 2")]
#[case::wrong_type(class_declaration::CODE, "indent = \"four\"")]
#[case::negative(member_var_spacing::CODE, "spacing = -1")]
fn ruleset_rejects_invalid_options(#[case] code: &str, #[case] options: &str) {
	assert!(matches!(builtin(code, options), Err(SniffError::InvalidOption { sniff, .. }) if sniff == code));
}

#[test]
fn config_parses_every_section() -> SniffResult<()> {
	let config = PhpsniffConfig::parse(
		r#"
sniffs = ["PSR2.Classes.ClassDeclaration"]
extensions = ["php"]
max_iterations = 7
timeout_ms = 250
max_file_size = 1024
disable_gitignore = true

[options."PSR2.Classes.ClassDeclaration"]
indent = 2

[exclude]
patterns = ["vendor/"]

[include]
patterns = ["src/**/*.php"]
"#,
	)?;

	assert_eq!(config.sniffs, Some(vec!["PSR2.Classes.ClassDeclaration".to_string()]));
	assert_eq!(config.extensions, vec!["php".to_string()]);
	assert_eq!(config.max_iterations, 7);
	assert_eq!(config.max_file_size, 1024);
	assert!(config.disable_gitignore);
	assert_eq!(config.exclude.patterns, vec!["vendor/".to_string()]);
	assert_eq!(config.include.patterns, vec!["src/**/*.php".to_string()]);

	let options = BatchOptions::from_config(Some(&config));
	assert_eq!(options.engine.max_iterations, 7);
	assert_eq!(options.engine.timeout, Some(Duration::from_millis(250)));
	assert_eq!(options.max_file_size, 1024);

	Ok(())
}

#[test]
fn config_defaults() -> SniffResult<()> {
	let config = PhpsniffConfig::parse("")?;

	assert_eq!(config.sniffs, None);
	assert_eq!(config.extensions, vec!["php".to_string(), "inc".to_string()]);
	assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
	assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
	assert_eq!(config.timeout_ms, None);

	Ok(())
}

#[test]
fn config_rejects_invalid_toml() {
	assert!(matches!(PhpsniffConfig::parse("max_iterations = \"many\""), Err(SniffError::ConfigParse(_))));
	assert!(matches!(PhpsniffConfig::parse("sniffs = ["), Err(SniffError::ConfigParse(_))));
}

#[test]
fn config_load_follows_candidate_order() -> SniffResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	assert!(PhpsniffConfig::load(tmp.path())?.is_none());

	write_file(tmp.path(), ".config/phpsniff.toml", "max_iterations = 3\n");
	let config = PhpsniffConfig::load(tmp.path())?;
	assert_eq!(config.map(|config| config.max_iterations), Some(3));

	write_file(tmp.path(), "phpsniff.toml", "max_iterations = 4\n");
	let config = PhpsniffConfig::load(tmp.path())?;
	assert_eq!(config.map(|config| config.max_iterations), Some(4));
	assert_eq!(PhpsniffConfig::resolve_path(tmp.path()), Some(tmp.path().join("phpsniff.toml")));

	Ok(())
}

// --- Utility tests ---

#[rstest]
#[case::camel("thisIsCamel", false, true, true, true)]
#[case::leading_capital("ThisIsCamel", false, true, true, false)]
#[case::class_format("ThisIsCamel", true, true, true, true)]
#[case::class_lowercase("thisIsCamel", true, true, true, false)]
#[case::private("_private", false, false, true, true)]
#[case::private_without_underscore("private", false, false, true, false)]
#[case::strict_acronym("getHTTPResponse", false, true, true, false)]
#[case::relaxed_acronym("getHTTPResponse", false, true, false, true)]
#[case::private_digits("_i18N", false, false, true, true)]
#[case::underscore("has_underscore", false, true, false, false)]
fn camel_caps(
	#[case] name: &str,
	#[case] class_format: bool,
	#[case] public: bool,
	#[case] strict: bool,
	#[case] expected: bool,
) {
	assert_eq!(names::is_camel_caps(name, class_format, public, strict), expected);
}

#[test]
fn naming_conventions() {
	assert!(names::is_underscore_name("My_Class_Name"));
	assert!(!names::is_underscore_name("My_class"));
	assert!(!names::is_underscore_name("my_Class"));
	assert!(names::is_valid_php_name("_foo1"));
	assert!(!names::is_valid_php_name("1foo"));
	assert!(names::is_snake_case("snake_case_1"));
	assert!(!names::is_snake_case("Snake"));
	assert!(names::is_upper_snake_case("Upper_Snake", true));
	assert!(!names::is_upper_snake_case("Upper_SNAKE", true));
	assert!(names::is_upper_snake_case("Upper_SNAKE", false));
	assert!(names::is_macro_case("MACRO_CASE_2"));
	assert!(names::is_kebab_case("kebab-case"));
	assert!(names::is_train_case("Train-Case", true));
	assert!(!names::is_train_case("Train-CASE", true));
	assert!(names::is_train_case("Train-CASE", false));
	assert!(names::is_cobol_case("COBOL-CASE"));
}

#[rstest]
#[case::snake_from_camel(names::to_snake_case("MyClassName"), "my_class_name")]
#[case::snake_from_kebab(names::to_snake_case("my-var"), "my_var")]
#[case::kebab_from_camel(names::to_kebab_case("myVarName"), "my-var-name")]
#[case::kebab_from_snake(names::to_kebab_case("my_var"), "my-var")]
#[case::kebab_invalid(names::to_kebab_case("bad$"), "")]
#[case::acronym(names::lower_consecutive_caps("HTTPServer"), "HttpServer")]
#[case::trailing_acronym(names::lower_consecutive_caps("getURL"), "getUrl")]
#[case::numbers(names::ltrim_numbers("123abc").to_string(), "abc")]
fn name_conversions(#[case] converted: String, #[case] expected: &str) {
	assert_eq!(converted, expected);
}

#[rstest]
#[case::class("<?php class Foo {}", 1, Some("Foo"))]
#[case::function("<?php function bar() {}", 1, Some("bar"))]
#[case::closure("<?php function() {};", 1, None)]
#[case::anonymous_class("<?php new class {};", 3, None)]
fn declaration_names(#[case] source: &str, #[case] ptr: usize, #[case] expected: Option<&str>) -> RuleResult<()> {
	let tokens = tokenize(source);
	assert_eq!(get_declaration_name(&tokens, ptr)?.as_deref(), expected);

	Ok(())
}

#[test]
fn declaration_name_rejects_other_tokens() {
	let tokens = tokenize("<?php $a;");

	assert!(matches!(
		get_declaration_name(&tokens, 1),
		Err(RuleFault::UnsupportedToken { index: 1, .. })
	));
}

#[test]
fn method_parameters() -> RuleResult<()> {
	let tokens = tokenize(
		"<?php function f(?int $a = 1, &$b, string ...$rest, #[Attr] private array $c = [1, 2]) {}",
	);
	let parameters = get_method_parameters(&tokens, 1)?;
	let summary: Vec<(&str, &str, &str, Option<&str>)> = parameters
		.iter()
		.map(|parameter| {
			(
				parameter.name.as_str(),
				parameter.content.as_str(),
				parameter.type_hint.as_str(),
				parameter.default.as_deref(),
			)
		})
		.collect();

	assert_eq!(
		summary,
		vec![
			("$a", "?int $a = 1", "?int", Some("1")),
			("$b", "&$b", "", None),
			("$rest", "string ...$rest", "string", None),
			("$c", "#[Attr] private array $c = [1, 2]", "array", Some("[1, 2]")),
		]
	);
	assert!(parameters[0].nullable_type);
	assert!(parameters[1].pass_by_reference);
	assert!(parameters[2].variable_length);
	assert!(parameters[3].has_attributes);
	assert_eq!(parameters[3].visibility.as_deref(), Some("private"));
	assert_eq!(tokens[parameters[0].token].content, "$a");

	Ok(())
}

#[test]
fn method_parameters_require_a_function() {
	let tokens = tokenize("<?php $a;");

	assert!(matches!(
		get_method_parameters(&tokens, 1),
		Err(RuleFault::UnsupportedToken { .. })
	));
	assert_eq!(get_method_parameters(&tokenize("<?php fn() => 1;"), 1), Ok(Vec::new()));
}

#[rstest]
#[case::lf("a\nb", "\n")]
#[case::crlf("a\r\nb", "\r\n")]
#[case::cr("a\rb", "\r")]
#[case::none("ab", "\n")]
fn line_endings(#[case] contents: &str, #[case] expected: &str) {
	assert_eq!(detect_line_endings(contents), expected);
}

#[test]
fn common_helpers() -> SniffResult<()> {
	assert_eq!(prepare_for_output(" \t\n", &[]), "·\\t\\n");
	assert_eq!(prepare_for_output(" \t\n", &['\n']), "·\\t\n");
	assert_eq!(strip_basepath(Path::new("/a/b/c.php"), Some(Path::new("/a"))), "b/c.php");
	assert_eq!(strip_basepath(Path::new("/a"), Some(Path::new("/a"))), ".");
	assert_eq!(strip_basepath(Path::new("/a/b"), None), "/a/b");
	assert!(code_matches("PSR2.Classes", "PSR2.Classes.ClassDeclaration.SpaceAfterName"));
	assert!(!code_matches("PSR2.Class", "PSR2.Classes.ClassDeclaration"));

	let code: SniffCode = "PSR2.Classes.ClassDeclaration.SpaceAfterName".parse()?;
	assert_eq!(code.code.as_deref(), Some("SpaceAfterName"));
	assert_eq!(code.sniff_code(), "PSR2.Classes.ClassDeclaration");
	assert_eq!(code.to_string(), "PSR2.Classes.ClassDeclaration.SpaceAfterName");
	assert!(matches!("PSR2.Classes".parse::<SniffCode>(), Err(SniffError::UnknownSniff(_))));

	Ok(())
}

// --- Built-in sniff tests ---

#[rstest]
#[case::missing("<?php\necho 1;\n", "<?php\ndeclare(strict_types=1);\necho 1;\n")]
#[case::disabled("<?php\ndeclare(strict_types=0);\n", "<?php\ndeclare(strict_types=1);\n")]
#[case::bare_open_tag("<?php", "<?php\ndeclare(strict_types=1);\n")]
#[case::after_other_directive(
	"<?php\ndeclare(ticks=1);\ndeclare(strict_types=1);\n",
	"<?php\ndeclare(ticks=1);\ndeclare(strict_types=1);\n"
)]
#[case::crlf("<?php\r\necho 1;\r\n", "<?php\r\ndeclare(strict_types=1);\r\necho 1;\r\n")]
fn require_strict_types_fixes(#[case] source: &str, #[case] expected: &str) -> SniffResult<()> {
	let ruleset = builtin(require_strict_types::CODE, "")?;
	let outcome = run(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.text, expected);
	assert!(outcome.diagnostics.is_empty());

	Ok(())
}

#[test]
fn require_strict_types_reports_codes() -> SniffResult<()> {
	let ruleset = builtin(require_strict_types::CODE, "")?;
	let missing = check_source("<?php\necho 1;\n", &ruleset, &EngineOptions::default())?;
	let disabled = check_source("<?php\ndeclare(strict_types=0);\n", &ruleset, &EngineOptions::default())?;

	assert_eq!(codes(&missing.diagnostics), vec!["Generic.PHP.RequireStrictTypes.MissingDeclaration"]);
	assert_eq!(missing.diagnostics[0].message, "Missing required strict_types declaration");
	assert_eq!(codes(&disabled.diagnostics), vec!["Generic.PHP.RequireStrictTypes.Disabled"]);
	assert_eq!(disabled.diagnostics[0].message, "The strict_types declaration must be enabled");

	Ok(())
}

#[test]
fn require_strict_types_respects_disable() -> SniffResult<()> {
	let ruleset = builtin(require_strict_types::CODE, "")?;
	let source = "<?php // phpcs:disable Generic.PHP\necho 1;\n";
	let outcome = run(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.status, FileStatus::Unchanged);
	assert!(outcome.diagnostics.is_empty());

	Ok(())
}

#[test]
fn namespace_separator_spacing_fixes_whitespace() -> SniffResult<()> {
	let ruleset = builtin(namespace_separator_spacing::CODE, "")?;
	let source = "<?php\nuse Foo \\ Bar;\n";
	let checked = check_source(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(
		codes(&checked.diagnostics),
		vec![
			"Generic.WhiteSpace.NamespaceSeparatorSpacing.SpaceAfter",
			"Generic.WhiteSpace.NamespaceSeparatorSpacing.SpaceBefore",
		]
	);
	assert_eq!(
		checked.diagnostics[1].message,
		"Expected no space before the namespace separator; found \"·\""
	);

	let fixed = run(source, &ruleset, &EngineOptions::default())?;
	assert_eq!(fixed.text, "<?php\nuse Foo\\Bar;\n");
	assert_eq!(fixed.fixes_applied, 2);

	Ok(())
}

#[test]
fn namespace_separator_spacing_leaves_comments() -> SniffResult<()> {
	let ruleset = builtin(namespace_separator_spacing::CODE, "")?;
	let source = "<?php\nuse Foo /* x */\\Bar;\n";
	let outcome = run(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.text, source);
	assert_eq!(outcome.diagnostics.len(), 1);
	assert!(!outcome.diagnostics[0].fixable);

	Ok(())
}

#[rstest]
#[case::newlines_reported("", "<?php\nuse Foo\\Bar;\n")]
#[case::newlines_ignored("ignoreNewlines = true", "<?php\nuse Foo\n\\Bar;\n")]
fn namespace_separator_spacing_newlines(#[case] options: &str, #[case] expected: &str) -> SniffResult<()> {
	let ruleset = builtin(namespace_separator_spacing::CODE, options)?;
	let outcome = run("<?php\nuse Foo\n\\Bar;\n", &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.text, expected);

	Ok(())
}

#[test]
fn duplicate_class_name_warns_within_a_namespace() -> SniffResult<()> {
	let ruleset = builtin(duplicate_class_name::CODE, "")?;
	let source = "<?php\nnamespace App;\nclass Foo {}\ninterface Foo {}\nnamespace Other;\nclass Foo {}\n";
	let outcome = check_source(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.diagnostics.len(), 1);
	let warning = &outcome.diagnostics[0];
	assert_eq!(warning.code, "Generic.Classes.DuplicateClassName.Found");
	assert_eq!(warning.severity, Severity::Warning);
	assert_eq!(warning.line, 4);
	assert_eq!(
		warning.message,
		"Duplicate interface name \"App\\Foo\" found; first defined in this file on line 3"
	);

	Ok(())
}

#[test]
fn duplicate_class_name_ignores_case_and_anonymous_classes() -> SniffResult<()> {
	let ruleset = builtin(duplicate_class_name::CODE, "")?;
	let source = "<?php\nclass foo {}\n$a = new class {};\n$b = new class {};\ntrait FOO {}\n";
	let outcome = check_source(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.diagnostics.len(), 1);
	assert_eq!(outcome.diagnostics[0].line, 5);

	Ok(())
}

#[test]
fn member_var_spacing_fixes_blank_lines() -> SniffResult<()> {
	let ruleset = builtin(member_var_spacing::CODE, "")?;
	let source = "<?php\nclass Foo\n{\n    public $a;\n    public $b;\n}\n";
	let checked = check_source(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(
		codes(&checked.diagnostics),
		vec![
			"Squiz.WhiteSpace.MemberVarSpacing.FirstIncorrect",
			"Squiz.WhiteSpace.MemberVarSpacing.Incorrect",
		]
	);
	assert_eq!(checked.diagnostics[0].message, "Expected 1 blank line(s) before first member var; 0 found");
	assert_eq!(checked.diagnostics[1].message, "Expected 1 blank line(s) before member var; 0 found");

	let fixed = run(source, &ruleset, &EngineOptions::default())?;
	assert_eq!(fixed.text, "<?php\nclass Foo\n{\n\n    public $a;\n\n    public $b;\n}\n");
	assert_eq!(fixed.status, FileStatus::Fixed);

	Ok(())
}

#[test]
fn member_var_spacing_removes_extra_lines() -> SniffResult<()> {
	let ruleset = builtin(member_var_spacing::CODE, "spacingBeforeFirst = 0")?;
	let source = "<?php\nclass Foo\n{\n    public $a;\n\n\n\n    public $b;\n}\n";
	let outcome = run(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.text, "<?php\nclass Foo\n{\n    public $a;\n\n    public $b;\n}\n");

	Ok(())
}

#[test]
fn member_var_spacing_checks_the_preamble() -> SniffResult<()> {
	let ruleset = builtin(member_var_spacing::CODE, "spacingBeforeFirst = 0")?;
	let source = "<?php\nclass Foo\n{\n    /** Doc */\n\n    public $a;\n}\n";
	let checked = check_source(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(codes(&checked.diagnostics), vec!["Squiz.WhiteSpace.MemberVarSpacing.BlankLineInPreamble"]);
	assert_eq!(
		checked.diagnostics[0].message,
		"Expected no blank lines between the member var comment/attributes and the declaration; 1 found"
	);

	let fixed = run(source, &ruleset, &EngineOptions::default())?;
	assert_eq!(fixed.text, "<?php\nclass Foo\n{\n    /** Doc */\n    public $a;\n}\n");

	Ok(())
}

#[test]
fn member_var_spacing_ignores_locals_and_parameters() -> SniffResult<()> {
	let ruleset = builtin(member_var_spacing::CODE, "spacingBeforeFirst = 0")?;
	let source = "<?php\nclass Foo\n{\n    public function bar($a)\n    {\n        $b = $a;\n    }\n}\n";
	let outcome = check_source(source, &ruleset, &EngineOptions::default())?;

	assert!(outcome.diagnostics.is_empty());

	Ok(())
}

#[test]
fn class_declaration_reports_spacing() -> SniffResult<()> {
	let ruleset = builtin(class_declaration::CODE, "")?;
	let source = "<?php\nclass  Foo   extends Bar\n{\n}\n";
	let checked = check_source(source, &ruleset, &EngineOptions::default())?;
	let messages: Vec<(&str, &str)> = checked
		.diagnostics
		.iter()
		.map(|diagnostic| (diagnostic.code.as_str(), diagnostic.message.as_str()))
		.collect();

	assert_eq!(
		messages,
		vec![
			(
				"PSR2.Classes.ClassDeclaration.SpaceAfterKeyword",
				"Expected 1 space between class keyword and class name; 2 found"
			),
			("PSR2.Classes.ClassDeclaration.SpaceAfterName", "Expected 1 space after class name; 3 found"),
			(
				"PSR2.Classes.ClassDeclaration.SpaceBeforeExtends",
				"Expected 1 space before extends keyword; 3 found"
			),
		]
	);

	let fixed = run(source, &ruleset, &EngineOptions::default())?;
	assert_eq!(fixed.text, "<?php\nclass Foo extends Bar\n{\n}\n");
	assert_eq!(fixed.fixes_applied, 2);

	Ok(())
}

#[rstest]
#[case::modifier_on_own_line("<?php\nfinal\nclass Foo\n{\n}\n", "<?php\nfinal class Foo\n{\n}\n")]
#[case::brace_after_body(
	"<?php\nclass Foo\n{\n    public $a;}\n",
	"<?php\nclass Foo\n{\n    public $a;\n}\n"
)]
#[case::multi_line_implements(
	"<?php\nclass Foo implements\n    Bar, Baz\n{\n}\n",
	"<?php\nclass Foo implements\n    Bar,\n    Baz\n{\n}\n"
)]
fn class_declaration_fixes(#[case] source: &str, #[case] expected: &str) -> SniffResult<()> {
	let ruleset = builtin(class_declaration::CODE, "")?;
	let outcome = run(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.text, expected);
	assert_eq!(outcome.status, FileStatus::Fixed);
	assert!(outcome.diagnostics.is_empty());

	Ok(())
}

#[rstest]
#[case::code_after_brace("<?php\nclass Foo\n{\n} echo 1;\n", 1)]
#[case::comment_after_brace("<?php\nclass Foo\n{\n} // end\n", 0)]
fn class_declaration_closing_brace_line(#[case] source: &str, #[case] expected: usize) -> SniffResult<()> {
	let ruleset = builtin(class_declaration::CODE, "")?;
	let outcome = check_source(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(outcome.diagnostics.len(), expected);

	if let Some(diagnostic) = outcome.diagnostics.first() {
		assert_eq!(diagnostic.code, "PSR2.Classes.ClassDeclaration.CloseBraceSameLine");
		assert_eq!(diagnostic.message, "Closing class brace must be on a line by itself");
		assert!(!diagnostic.fixable);
	}

	Ok(())
}

#[test]
fn class_declaration_uses_configured_indent() -> SniffResult<()> {
	let ruleset = builtin(class_declaration::CODE, "indent = 2")?;
	let source = "<?php\nclass Foo implements\n    Bar\n{\n}\n";
	let outcome = check_source(source, &ruleset, &EngineOptions::default())?;

	assert_eq!(codes(&outcome.diagnostics), vec!["PSR2.Classes.ClassDeclaration.InterfaceWrongIndent"]);
	assert_eq!(outcome.diagnostics[0].message, "Expected 2 spaces before interface name; 4 found");

	Ok(())
}

// --- Project tests ---

fn project_fixture() -> tempfile::TempDir {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_file(tmp.path(), "src/a.php", "<?php\necho 1;\n");
	write_file(tmp.path(), "src/b.inc", "<?php\ndeclare(strict_types=1);\necho 2;\n");
	write_file(tmp.path(), "src/c.txt", "not php\n");
	write_file(tmp.path(), "vendor/x.php", "<?php\necho 3;\n");
	write_file(tmp.path(), "node_modules/z.php", "<?php\necho 4;\n");
	write_file(tmp.path(), ".hidden/y.php", "<?php\necho 5;\n");
	tmp
}

#[test]
fn discover_files_walks_the_project() -> SniffResult<()> {
	let tmp = project_fixture();
	let root = tmp.path();
	let options = ScanOptions {
		exclude_patterns: vec!["vendor/".to_string()],
		..ScanOptions::default()
	};

	assert_eq!(discover_files(root, &[], &options)?, vec![root.join("src/a.php"), root.join("src/b.inc")]);
	assert_eq!(
		discover_files(root, &[], &ScanOptions::default())?,
		vec![root.join("src/a.php"), root.join("src/b.inc"), root.join("vendor/x.php")]
	);

	Ok(())
}

#[test]
fn discover_files_accepts_explicit_paths() -> SniffResult<()> {
	let tmp = project_fixture();
	let root = tmp.path();
	let paths = [PathBuf::from("src/c.txt"), PathBuf::from("vendor"), PathBuf::from("src/c.txt")];

	assert_eq!(
		discover_files(root, &paths, &ScanOptions::default())?,
		vec![root.join("src/c.txt"), root.join("vendor/x.php")]
	);
	assert!(matches!(
		discover_files(root, &[PathBuf::from("missing.php")], &ScanOptions::default()),
		Err(SniffError::Io(_))
	));

	Ok(())
}

#[test]
fn discover_files_applies_include_and_gitignore() -> SniffResult<()> {
	let tmp = project_fixture();
	let root = tmp.path();
	let config = PhpsniffConfig::parse("[include]\npatterns = [\"src/*.inc\"]\n")?;

	assert_eq!(
		discover_files(root, &[], &ScanOptions::from_config(Some(&config))?)?,
		vec![root.join("src/b.inc")]
	);

	write_file(root, ".gitignore", "src/a.php\n");
	let options = ScanOptions {
		exclude_patterns: vec!["vendor/".to_string()],
		..ScanOptions::default()
	};
	assert_eq!(discover_files(root, &[], &options)?, vec![root.join("src/b.inc")]);

	let options = ScanOptions {
		disable_gitignore: true,
		..options
	};
	assert_eq!(discover_files(root, &[], &options)?, vec![root.join("src/a.php"), root.join("src/b.inc")]);

	Ok(())
}

#[test]
fn scan_options_reject_invalid_globs() -> SniffResult<()> {
	let config = PhpsniffConfig::parse("[include]\npatterns = [\"src/[\"]\n")?;

	assert!(matches!(ScanOptions::from_config(Some(&config)), Err(SniffError::InvalidPattern { .. })));

	Ok(())
}

#[test]
fn run_batch_writes_fixed_files() -> SniffResult<()> {
	let tmp = project_fixture();
	let root = tmp.path();
	let files = vec![root.join("src/b.inc"), root.join("src/a.php")];
	let ruleset = Ruleset::from_config(None)?;
	let report = run_batch(&files, &ruleset, RunMode::Fix { dry_run: false }, &BatchOptions::default())?;

	let paths: Vec<PathBuf> = report.files.iter().map(|file| file.path.clone()).collect();
	assert_eq!(paths, vec![root.join("src/a.php"), root.join("src/b.inc")]);
	assert!(report.files[0].written);
	assert!(!report.files[1].written);

	let written = std::fs::read_to_string(root.join("src/a.php"))?;
	assert_eq!(written, "<?php\ndeclare(strict_types=1);\necho 1;\n");

	let summary = report.summary();
	assert_eq!(summary.files, 2);
	assert_eq!(summary.fixed_files, 1);
	assert_eq!(summary.fixes_applied, 1);
	assert_eq!(summary.errors, 0);
	assert_eq!(summary.exit_code(), 1);

	Ok(())
}

#[test]
fn run_batch_dry_run_keeps_files() -> SniffResult<()> {
	let tmp = project_fixture();
	let root = tmp.path();
	let files = vec![root.join("src/a.php")];
	let ruleset = Ruleset::from_config(None)?;
	let report = run_batch(&files, &ruleset, RunMode::Fix { dry_run: true }, &BatchOptions::default())?;

	assert!(!report.files[0].written);
	assert_eq!(report.files[0].fixed_text(), Some("<?php\ndeclare(strict_types=1);\necho 1;\n"));
	assert_eq!(std::fs::read_to_string(root.join("src/a.php"))?, "<?php\necho 1;\n");

	Ok(())
}

#[test]
fn run_batch_check_counts_diagnostics() -> SniffResult<()> {
	let tmp = project_fixture();
	let root = tmp.path();
	let files = vec![root.join("src/a.php"), root.join("src/b.inc")];
	let ruleset = Ruleset::from_config(None)?;
	let summary = run_batch(&files, &ruleset, RunMode::Check, &BatchOptions::default())?.summary();

	assert_eq!(summary.errors, 1);
	assert_eq!(summary.fixable, 1);
	assert_eq!(summary.unfixable_errors, 0);
	assert_eq!(summary.exit_code(), 1);
	assert_eq!(std::fs::read_to_string(root.join("src/a.php"))?, "<?php\necho 1;\n");

	Ok(())
}

#[test]
fn run_batch_reports_input_faults() -> SniffResult<()> {
	let tmp = project_fixture();
	let root = tmp.path();
	let binary = root.join("src/binary.php");
	std::fs::write(&binary, [0xff, 0xfe, 0x00])?;
	let files = vec![root.join("src/a.php"), binary];
	let ruleset = Ruleset::from_config(None)?;
	let options = BatchOptions {
		max_file_size: 8,
		..BatchOptions::default()
	};
	let report = run_batch(&files, &ruleset, RunMode::Check, &options)?;

	assert!(matches!(report.files[0].result, Err(SniffError::FileTooLarge { limit: 8, .. })));
	assert!(matches!(report.files[1].result, Err(SniffError::InvalidEncoding { .. })));
	assert_eq!(report.summary().failed, 2);
	assert_eq!(report.summary().exit_code(), 2);

	Ok(())
}

#[rstest]
#[case::clean(Summary::default(), 0)]
#[case::warnings(Summary { warnings: 1, ..Summary::default() }, 1)]
#[case::fixable(Summary { errors: 2, fixable: 2, ..Summary::default() }, 1)]
#[case::fixed(Summary { fixed_files: 1, fixes_applied: 3, ..Summary::default() }, 1)]
#[case::unfixable(Summary { errors: 1, unfixable_errors: 1, ..Summary::default() }, 2)]
#[case::faults(Summary { faults: 1, ..Summary::default() }, 2)]
#[case::not_converged(Summary { not_converged: 1, ..Summary::default() }, 2)]
#[case::failed(Summary { failed: 1, ..Summary::default() }, 2)]
fn summary_exit_codes(#[case] summary: Summary, #[case] expected: i32) {
	assert_eq!(summary.exit_code(), expected);
}
