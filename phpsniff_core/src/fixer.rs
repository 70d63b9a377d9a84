use std::collections::BTreeMap;

use tracing::trace;

use crate::RuleFault;
use crate::RuleResult;
use crate::TokenSequence;

/// Collects the edits of one pass.
///
/// Every edit belongs to a changeset opened with
/// [`begin_changeset`](Self::begin_changeset) and closed with
/// [`end_changeset`](Self::end_changeset). A closed changeset is accepted
/// as a whole, or discarded as a whole when it touches a token that an
/// earlier changeset of the same pass already changed. Discarded fixes are
/// retried in the next pass against the re-tokenized text.
///
/// ```rust
/// use phpsniff_core::Fixer;
/// use phpsniff_core::tokenize;
///
/// let tokens = tokenize("<?php echo $a;");
/// let mut fixer = Fixer::new(&tokens);
///
/// fixer.begin_changeset().unwrap();
/// fixer.replace(3, "$b").unwrap();
/// assert!(fixer.end_changeset().unwrap());
/// assert_eq!(fixer.render(), "<?php echo $b;");
/// ```
#[derive(Debug)]
pub struct Fixer<'a> {
	tokens: &'a TokenSequence,
	accepted: BTreeMap<usize, String>,
	changeset: Option<BTreeMap<usize, String>>,
	fixed_count: usize,
	rejected_count: usize,
}

impl<'a> Fixer<'a> {
	pub fn new(tokens: &'a TokenSequence) -> Self {
		Self {
			tokens,
			accepted: BTreeMap::new(),
			changeset: None,
			fixed_count: 0,
			rejected_count: 0,
		}
	}

	pub fn tokens(&self) -> &'a TokenSequence {
		self.tokens
	}

	/// Number of changesets accepted in this pass.
	pub fn fixed_count(&self) -> usize {
		self.fixed_count
	}

	/// Number of changesets discarded because of a conflict.
	pub fn rejected_count(&self) -> usize {
		self.rejected_count
	}

	pub fn in_changeset(&self) -> bool {
		self.changeset.is_some()
	}

	pub fn begin_changeset(&mut self) -> RuleResult<()> {
		if self.changeset.is_some() {
			return Err(RuleFault::NestedChangeset);
		}

		self.changeset = Some(BTreeMap::new());
		Ok(())
	}

	/// Close the open changeset. Returns `true` when it was accepted.
	///
	/// Empty changesets (including ones where every edit was a no-op) are
	/// neither accepted nor counted.
	pub fn end_changeset(&mut self) -> RuleResult<bool> {
		let changeset = self.changeset.take().ok_or(RuleFault::NoChangeset)?;

		if changeset.is_empty() {
			return Ok(false);
		}

		if let Some(conflict) = changeset
			.keys()
			.find(|index| self.accepted.contains_key(index))
		{
			trace!(token = conflict, edits = changeset.len(), "changeset conflicts with an earlier fix");
			self.rejected_count += 1;
			return Ok(false);
		}

		self.accepted.extend(changeset);
		self.fixed_count += 1;

		Ok(true)
	}

	/// Drop the open changeset without applying it.
	pub fn rollback_changeset(&mut self) {
		if let Some(changeset) = self.changeset.take() {
			trace!(edits = changeset.len(), "changeset rolled back");
		}
	}

	/// The content of `index` as seen by the open changeset: its pending edit
	/// when there is one, the original content otherwise.
	pub fn content(&self, index: usize) -> RuleResult<&str> {
		let original = self.original(index)?;
		let pending = self
			.changeset
			.as_ref()
			.and_then(|changeset| changeset.get(&index));

		Ok(pending.map_or(original, String::as_str))
	}

	/// Overwrite the rendered content of one token.
	pub fn replace(&mut self, index: usize, content: impl Into<String>) -> RuleResult<()> {
		let original = self.original(index)?;
		let content = content.into();
		let changeset = self.changeset.as_mut().ok_or(RuleFault::NoChangeset)?;

		if content == original {
			changeset.remove(&index);
		} else {
			changeset.insert(index, content);
		}

		Ok(())
	}

	/// Replace one token in a changeset of its own.
	pub fn replace_token(&mut self, index: usize, content: impl Into<String>) -> RuleResult<bool> {
		self.begin_changeset()?;
		self.replace(index, content)?;
		self.end_changeset()
	}

	pub fn insert_before(&mut self, index: usize, text: &str) -> RuleResult<()> {
		let content = format!("{text}{}", self.content(index)?);
		self.replace(index, content)
	}

	pub fn insert_after(&mut self, index: usize, text: &str) -> RuleResult<()> {
		let content = format!("{}{text}", self.content(index)?);
		self.replace(index, content)
	}

	/// Render the token as nothing.
	pub fn remove(&mut self, index: usize) -> RuleResult<()> {
		self.replace(index, "")
	}

	/// Drop the last `count` characters of the token's rendered content.
	pub fn truncate_suffix(&mut self, index: usize, count: usize) -> RuleResult<()> {
		let current = self.content(index)?;
		let keep = current.chars().count().saturating_sub(count);
		let content: String = current.chars().take(keep).collect();

		self.replace(index, content)
	}

	/// Append the file's line ending to the token.
	pub fn add_newline(&mut self, index: usize) -> RuleResult<()> {
		let eol = self.tokens.eol();
		self.insert_after(index, eol)
	}

	/// Prepend the file's line ending to the token.
	pub fn add_newline_before(&mut self, index: usize) -> RuleResult<()> {
		let eol = self.tokens.eol();
		self.insert_before(index, eol)
	}

	/// The text produced by applying every accepted edit. Edits still pending
	/// in an open changeset are not included.
	pub fn render(&self) -> String {
		self.tokens
			.iter()
			.map(|token| {
				self.accepted
					.get(&token.index)
					.map_or(token.content.as_str(), String::as_str)
			})
			.collect()
	}

	fn original(&self, index: usize) -> RuleResult<&'a str> {
		let tokens = self.tokens;
		tokens
			.get(index)
			.map(|token| token.content.as_str())
			.ok_or(RuleFault::IndexOutOfRange {
				index,
				len: tokens.len(),
			})
	}
}
